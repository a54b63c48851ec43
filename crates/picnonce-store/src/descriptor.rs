//! The block header and the typed view over a block.
//!
//! [`NonceStore`] is the fixed 24-byte header at the start of every
//! block. Its fields are fixed-width integers only: the header is mapped
//! at a different address in every process, and is shared between 32-bit
//! and 64-bit processes, so no pointer or `usize` may appear in it. The
//! nonce and byte arrays are located by offsets from the header itself.
//!
//! [`NonceStoreRef`] is the view callers use. It carries a pointer with
//! provenance over the whole block (header and both arrays), which a
//! plain `&NonceStore` cannot.

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicI32, AtomicI64, AtomicU32, AtomicU8, Ordering};

use picnonce_core::config::{
    BlockConfig, BlockConfigError, BLOCK_ALIGN, HEADER_BYTES, NONCE_BYTES,
};
use picnonce_core::{LayoutError, UNSET_NONCE};

#[cfg(not(target_has_atomic = "64"))]
compile_error!("picnonce-store requires native 64-bit atomics for cross-process nonces");

/// Fixed-size header of a nonce block.
///
/// Layout (fixed-width fields only, no compiler padding):
///
/// ```text
/// 0   max_nonce     i32
/// 4   max_byte      i32
/// 8   nonce_offset  i32   (from the header's own address)
/// 12  byte_offset   i32   (from the header's own address)
/// 16  byte_hash     AtomicI32
/// 20  write_seq     AtomicU32  (the explicit padding word)
/// ```
///
/// The sizing and offset fields are written once, before the region is
/// shared, and never change. `write_seq` is even while no byte-block
/// write is in progress and zero in a fresh block.
#[repr(C, align(8))]
pub struct NonceStore {
    max_nonce: i32,
    max_byte: i32,
    nonce_offset: i32,
    byte_offset: i32,
    byte_hash: AtomicI32,
    write_seq: AtomicU32,
}

// The header is ABI independent: same size and alignment on every target.
const _: () = assert!(std::mem::size_of::<NonceStore>() == HEADER_BYTES);
const _: () = assert!(std::mem::align_of::<NonceStore>() == BLOCK_ALIGN);
const _: () = assert!(std::mem::size_of::<AtomicI64>() == NONCE_BYTES);
const _: () = assert!(std::mem::align_of::<AtomicI64>() == NONCE_BYTES);
const _: () = assert!(std::mem::size_of::<AtomicU8>() == 1);

impl NonceStore {
    /// Build a header from the two capacities and the offsets of the two
    /// arrays from the header's address.
    pub(crate) const fn new(
        max_nonce: i32,
        max_byte: i32,
        nonce_offset: i32,
        byte_offset: i32,
    ) -> Self {
        Self {
            max_nonce,
            max_byte,
            nonce_offset,
            byte_offset,
            byte_hash: AtomicI32::new(0),
            write_seq: AtomicU32::new(0),
        }
    }

    /// Capacity of the nonce array.
    pub fn max_nonce(&self) -> i32 {
        self.max_nonce
    }

    /// Capacity of the byte array.
    pub fn max_byte(&self) -> i32 {
        self.max_byte
    }

    /// Offset of the nonce array from the header.
    pub fn nonce_offset(&self) -> i32 {
        self.nonce_offset
    }

    /// Offset of the byte array from the header.
    pub fn byte_offset(&self) -> i32 {
        self.byte_offset
    }

    /// The sizing parameters as a [`BlockConfig`].
    pub fn config(&self) -> BlockConfig {
        BlockConfig::new(self.max_nonce, self.max_byte)
    }

    /// Check that this header describes arrays lying inside a region of
    /// `region_len` bytes that starts at the header.
    ///
    /// The capacities must pass [`BlockConfig::validate`]. The arrays must
    /// follow the header in order (header, nonces, bytes), must not
    /// overlap, and the nonce array must be 8-aligned.
    pub fn check(&self, region_len: usize) -> Result<BlockConfig, LayoutError> {
        let config = self.config();
        config.validate().map_err(|err| LayoutError::CorruptHeader {
            reason: match err {
                BlockConfigError::NonPositive { .. } => "capacity is not positive",
                BlockConfigError::UnalignedByteCount { .. } => {
                    "byte count is not a multiple of 8"
                }
            },
        })?;
        if self.nonce_offset < 0 || self.byte_offset < 0 {
            return Err(LayoutError::CorruptHeader {
                reason: "negative array offset",
            });
        }
        let nonce_start = self.nonce_offset as usize;
        let byte_start = self.byte_offset as usize;
        if nonce_start < HEADER_BYTES {
            return Err(LayoutError::CorruptHeader {
                reason: "nonce array overlaps header",
            });
        }
        if nonce_start % BLOCK_ALIGN != 0 {
            return Err(LayoutError::CorruptHeader {
                reason: "nonce array is not 8-byte aligned",
            });
        }
        let nonce_end = (self.max_nonce as usize)
            .checked_mul(NONCE_BYTES)
            .and_then(|len| len.checked_add(nonce_start))
            .ok_or(LayoutError::CorruptHeader {
                reason: "nonce array size overflows",
            })?;
        if byte_start < nonce_end {
            return Err(LayoutError::CorruptHeader {
                reason: "byte array overlaps nonce array",
            });
        }
        let byte_end = byte_start
            .checked_add(self.max_byte as usize)
            .ok_or(LayoutError::CorruptHeader {
                reason: "byte array size overflows",
            })?;
        if byte_end > region_len {
            return Err(LayoutError::RegionTooSmall {
                required: byte_end,
                actual: region_len,
            });
        }
        Ok(config)
    }
}

#[cfg(test)]
impl NonceStore {
    pub(crate) fn write_seq_for_test(&self) -> &AtomicU32 {
        &self.write_seq
    }
}

impl fmt::Debug for NonceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonceStore")
            .field("max_nonce", &self.max_nonce)
            .field("max_byte", &self.max_byte)
            .field("nonce_offset", &self.nonce_offset)
            .field("byte_offset", &self.byte_offset)
            .field("byte_hash", &self.byte_hash.load(Ordering::Relaxed))
            .field("write_seq", &self.write_seq.load(Ordering::Relaxed))
            .finish()
    }
}

/// Typed view over one nonce block.
///
/// Obtained from [`CacheNonce::store`](crate::CacheNonce::store) in the
/// process that owns the block, or from
/// [`region::attach`](crate::region::attach) in any process mapping it.
/// Copying the view is free; it is a single pointer.
///
/// None of the accessors block, allocate, or panic. An index outside
/// `[0, max_nonce)` reads as [`UNSET_NONCE`] and is refused by
/// [`set_nonce`](Self::set_nonce).
#[derive(Clone, Copy)]
pub struct NonceStoreRef<'a> {
    base: NonNull<NonceStore>,
    _marker: PhantomData<&'a NonceStore>,
}

// SAFETY: every field reachable through the view is either immutable
// after construction or an atomic, so sharing the view between threads
// is no different from sharing a `&NonceStore` together with its arrays.
#[allow(unsafe_code)]
unsafe impl Send for NonceStoreRef<'_> {}
// SAFETY: see above.
#[allow(unsafe_code)]
unsafe impl Sync for NonceStoreRef<'_> {}

impl<'a> NonceStoreRef<'a> {
    /// Wrap a pointer to a block header.
    ///
    /// # Safety
    ///
    /// `base` must point to an initialised header whose offsets and
    /// capacities describe arrays inside the same allocation, the pointer
    /// must carry provenance over that whole allocation, and the
    /// allocation must outlive `'a`.
    #[allow(unsafe_code)]
    pub unsafe fn from_raw(base: NonNull<NonceStore>) -> Self {
        Self {
            base,
            _marker: PhantomData,
        }
    }

    /// Raw pointer to the header, for handing across an FFI boundary.
    pub fn as_ptr(&self) -> *const NonceStore {
        self.base.as_ptr()
    }

    /// The header.
    #[allow(unsafe_code)]
    pub fn header(&self) -> &'a NonceStore {
        // SAFETY: `from_raw` requires an initialised header living for 'a.
        unsafe { self.base.as_ref() }
    }

    /// Capacity of the nonce array.
    pub fn max_nonce(&self) -> i32 {
        self.header().max_nonce
    }

    /// Capacity of the byte array.
    pub fn max_byte(&self) -> i32 {
        self.header().max_byte
    }

    /// The nonce array, located relative to the header.
    #[allow(unsafe_code)]
    fn nonces(&self) -> &'a [AtomicI64] {
        let header = self.header();
        // SAFETY: `from_raw` guarantees the offset and length describe an
        // 8-aligned array of initialised atomics inside the allocation.
        unsafe {
            let ptr = self
                .base
                .as_ptr()
                .cast::<u8>()
                .add(header.nonce_offset as usize)
                .cast::<AtomicI64>();
            std::slice::from_raw_parts(ptr, header.max_nonce as usize)
        }
    }

    /// The byte array, located relative to the header.
    #[allow(unsafe_code)]
    fn bytes(&self) -> &'a [AtomicU8] {
        let header = self.header();
        // SAFETY: as for `nonces`; `AtomicU8` has alignment 1.
        unsafe {
            let ptr = self
                .base
                .as_ptr()
                .cast::<u8>()
                .add(header.byte_offset as usize)
                .cast::<AtomicU8>();
            std::slice::from_raw_parts(ptr, header.max_byte as usize)
        }
    }

    fn slot(&self, index: i32) -> Option<&'a AtomicI64> {
        let index = usize::try_from(index).ok()?;
        self.nonces().get(index)
    }

    /// Load the nonce at `index`, or [`UNSET_NONCE`] if out of range.
    #[inline]
    pub fn get_nonce(&self, index: i32) -> i64 {
        match self.slot(index) {
            Some(slot) => slot.load(Ordering::SeqCst),
            None => UNSET_NONCE,
        }
    }

    /// Store `value` at `index`. Returns `false`, touching nothing, if
    /// the index is out of range.
    #[inline]
    pub fn set_nonce(&self, index: i32, value: i64) -> bool {
        match self.slot(index) {
            Some(slot) => {
                slot.store(value, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Load the byte-block hash.
    #[inline]
    pub fn get_hash(&self) -> i32 {
        self.header().byte_hash.load(Ordering::Acquire)
    }

    /// Copy the byte block into `out` and return the hash observed
    /// before the copy.
    ///
    /// Copies `min(out.len(), max_byte)` bytes; the rest of `out` is left
    /// untouched. The copy is not atomic: compare the returned hash with
    /// [`get_hash`](Self::get_hash) afterwards, or use
    /// [`read_byte_block`](crate::read_byte_block) which does the full
    /// retry protocol.
    pub fn get_byte_block(&self, out: &mut [u8]) -> i32 {
        let hash = self.get_hash();
        for (dst, src) in out.iter_mut().zip(self.bytes()) {
            *dst = src.load(Ordering::Relaxed);
        }
        hash
    }

    /// Copy `data` into the byte block, then publish `hash`.
    ///
    /// Copies `min(data.len(), max_byte)` bytes; bytes past that keep
    /// their previous contents. The hash is stored last with release
    /// ordering. While the copy runs the header's write sequence is odd,
    /// so a concurrent [`read_byte_block`](crate::read_byte_block) can
    /// never accept a mixture of two payloads.
    ///
    /// There must be at most one writer at a time. The block does not
    /// arbitrate between writers.
    pub fn set_byte_block(&self, hash: i32, data: &[u8]) {
        let header = self.header();
        let seq = header.write_seq.load(Ordering::Relaxed);
        header.write_seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        for (dst, &src) in self.bytes().iter().zip(data) {
            dst.store(src, Ordering::Relaxed);
        }
        header.byte_hash.store(hash, Ordering::Release);
        header.write_seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Sequence value at the start of a read.
    #[inline]
    pub(crate) fn begin_read(&self) -> u32 {
        self.header().write_seq.load(Ordering::Acquire)
    }

    /// Sequence value at the end of a read. Orders every byte load made
    /// since [`begin_read`](Self::begin_read) before the returned load.
    #[inline]
    pub(crate) fn end_read(&self) -> u32 {
        fence(Ordering::Acquire);
        self.header().write_seq.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for NonceStoreRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NonceStoreRef").field(self.header()).finish()
    }
}
