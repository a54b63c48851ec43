//! Name-to-slot directory carried in the byte block.
//!
//! The writer assigns nonce slots to named caches in registration order
//! and publishes the assignment through the byte block, so a reader
//! process can find the slot for a cache by name without a round trip.
//!
//! Encoding: each name as UTF-8 followed by a NUL, in slot order,
//! terminated by an empty name (a second NUL).
//!
//! ```text
//! "users\0packages\0\0"   ->   users = slot 0, packages = slot 1
//! ```
//!
//! Every publication stores a new non-zero hash. Readers keep their
//! parsed copy until the hash changes.

use indexmap::IndexMap;
use picnonce_core::{DirectoryError, NonceSlot, ReadConfig, UNSET_HASH};

use crate::descriptor::NonceStoreRef;
use crate::seqlock::read_byte_block;

/// Writer-side directory. Owns the authoritative name list.
#[derive(Clone, Debug)]
pub struct NonceDirectory {
    slots: IndexMap<String, NonceSlot>,
    /// The encoded list, always ending in the empty-name terminator.
    encoded: Vec<u8>,
}

impl NonceDirectory {
    /// An empty directory. Nothing is published until the first
    /// [`register`](Self::register).
    pub fn new() -> Self {
        Self {
            slots: IndexMap::new(),
            encoded: vec![0],
        }
    }

    /// Adopt the directory already published in `store`, e.g. after the
    /// writer restarts against an existing region.
    pub fn load(store: NonceStoreRef<'_>, config: ReadConfig) -> Result<Self, DirectoryError> {
        let mut buf = vec![0u8; store.max_byte().max(0) as usize];
        let read = read_byte_block(store, &mut buf, config)?;
        let mut directory = Self::new();
        for (name, _) in decode(&buf[..read.len], store.max_nonce()) {
            directory.push(name);
        }
        tracing::debug!(
            names = directory.len(),
            hash = read.hash,
            "loaded nonce directory"
        );
        Ok(directory)
    }

    /// Return the slot for `name`, assigning and publishing the next free
    /// slot if the name is new.
    pub fn register(
        &mut self,
        store: NonceStoreRef<'_>,
        name: &str,
    ) -> Result<NonceSlot, DirectoryError> {
        if let Some(&slot) = self.slots.get(name) {
            return Ok(slot);
        }
        if name.is_empty() || name.contains('\0') {
            return Err(DirectoryError::InvalidName {
                name: name.to_owned(),
            });
        }
        let capacity = store.max_nonce();
        if self.slots.len() >= capacity.max(0) as usize {
            return Err(DirectoryError::Full { capacity });
        }
        let required = self.encoded.len() + name.len() + 1;
        let block_len = store.max_byte().max(0) as usize;
        if required > block_len {
            return Err(DirectoryError::BlockOverflow {
                required,
                capacity: block_len,
            });
        }

        let slot = self.push(name.to_owned());
        let hash = next_hash(store.get_hash());
        store.set_byte_block(hash, &self.encoded);
        tracing::debug!(name, slot = slot.index(), hash, "registered cache slot");
        Ok(slot)
    }

    fn push(&mut self, name: String) -> NonceSlot {
        let slot = NonceSlot(self.slots.len() as i32);
        self.encoded.pop();
        self.encoded.extend_from_slice(name.as_bytes());
        self.encoded.push(0);
        self.encoded.push(0);
        self.slots.insert(name, slot);
        slot
    }

    /// The slot assigned to `name`, if any.
    pub fn slot(&self, name: &str) -> Option<NonceSlot> {
        self.slots.get(name).copied()
    }

    /// Registered names with their slots, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, NonceSlot)> {
        self.slots.iter().map(|(name, &slot)| (name.as_str(), slot))
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no names are registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Reader-side directory cache.
///
/// Re-reads the byte block only when the published hash differs from
/// the one it last parsed, so steady-state lookups cost one atomic load
/// and a map probe.
#[derive(Debug)]
pub struct DirectoryReader {
    config: ReadConfig,
    hash: Option<i32>,
    slots: IndexMap<String, NonceSlot>,
    buf: Vec<u8>,
}

impl DirectoryReader {
    /// A reader that has not parsed anything yet.
    pub fn new(config: ReadConfig) -> Self {
        Self {
            config,
            hash: None,
            slots: IndexMap::new(),
            buf: Vec::new(),
        }
    }

    /// Re-parse the directory if its hash changed.
    ///
    /// Returns whether a re-parse happened.
    pub fn refresh(&mut self, store: NonceStoreRef<'_>) -> Result<bool, DirectoryError> {
        if self.hash == Some(store.get_hash()) {
            return Ok(false);
        }
        self.buf.resize(store.max_byte().max(0) as usize, 0);
        let read = read_byte_block(store, &mut self.buf, self.config)?;
        self.slots = decode(&self.buf[..read.len], store.max_nonce());
        self.hash = Some(read.hash);
        Ok(true)
    }

    /// Look up the slot for `name`, refreshing first if needed.
    pub fn lookup(
        &mut self,
        store: NonceStoreRef<'_>,
        name: &str,
    ) -> Result<Option<NonceSlot>, DirectoryError> {
        self.refresh(store)?;
        Ok(self.slots.get(name).copied())
    }

    /// Hash of the last parsed directory, if any has been parsed.
    pub fn hash(&self) -> Option<i32> {
        self.hash
    }

    /// Names from the last parse, in slot order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }
}

impl Default for NonceDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for DirectoryReader {
    fn default() -> Self {
        Self::new(ReadConfig::default())
    }
}

/// Next publication hash: never [`UNSET_HASH`], always different from
/// `current`.
fn next_hash(current: i32) -> i32 {
    match current.wrapping_add(1) {
        UNSET_HASH => UNSET_HASH + 1,
        h => h,
    }
}

/// Parse at most `max_nonce` names; any beyond that have no slot.
fn decode(bytes: &[u8], max_nonce: i32) -> IndexMap<String, NonceSlot> {
    bytes
        .split(|&b| b == 0)
        .take_while(|name| !name.is_empty())
        .take(max_nonce.max(0) as usize)
        .enumerate()
        .map(|(i, name)| {
            (
                String::from_utf8_lossy(name).into_owned(),
                NonceSlot(i as i32),
            )
        })
        .collect()
}
