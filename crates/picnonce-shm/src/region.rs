//! Owned backing allocation and access-checked handles.
//!
//! [`SharedRegion::create`] allocates and initialises the structure once.
//! Handles are cheap clones of an `Arc`; each carries an [`Access`] mode
//! fixed at creation. Mutating calls on a read-only handle fail with
//! [`SharedMemoryError::ReadOnly`] and leave the region untouched.

use std::fmt;
use std::sync::Arc;

use picnonce_core::{ReadConfig, SharedMemoryError, TornRead};
use picnonce_store::{
    read_byte_block, ByteBlockRead, NonceSlot, NonceStamp, NonceStore, NonceStoreRef,
};

use crate::memory::ApplicationSharedMemory;

/// Whether a handle may mutate the region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// The system server's handle.
    ReadWrite,
    /// An application's handle.
    ReadOnly,
}

/// Handle to an application shared-memory region.
#[derive(Clone)]
pub struct SharedRegion {
    memory: Arc<ApplicationSharedMemory>,
    access: Access,
}

impl SharedRegion {
    /// Allocate and initialise a region, returning its mutable handle.
    pub fn create() -> Result<Self, SharedMemoryError> {
        let memory = Arc::new(ApplicationSharedMemory::new());
        memory.validate()?;
        tracing::info!(
            bytes = ApplicationSharedMemory::SIZE,
            "created application shared memory"
        );
        Ok(Self {
            memory,
            access: Access::ReadWrite,
        })
    }

    /// A read-only handle to the same region.
    pub fn read_only(&self) -> Self {
        tracing::debug!("duplicated shared memory handle as read-only");
        Self {
            memory: Arc::clone(&self.memory),
            access: Access::ReadOnly,
        }
    }

    /// This handle's access mode.
    pub fn access(&self) -> Access {
        self.access
    }

    /// Whether this handle may mutate the region.
    pub fn is_mutable(&self) -> bool {
        self.access == Access::ReadWrite
    }

    /// Whether two handles refer to the same region.
    pub fn same_region(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.memory, &other.memory)
    }

    fn writable(&self) -> Result<&ApplicationSharedMemory, SharedMemoryError> {
        match self.access {
            Access::ReadWrite => Ok(&self.memory),
            Access::ReadOnly => Err(SharedMemoryError::ReadOnly),
        }
    }

    /// Publish the latest network time.
    pub fn set_latest_network_time(&self, millis: i64) -> Result<(), SharedMemoryError> {
        self.writable()?.set_latest_network_time(millis);
        Ok(())
    }

    /// The latest network time, if one has been published.
    pub fn latest_network_time(&self) -> Result<i64, SharedMemoryError> {
        self.memory.latest_network_time()
    }

    /// Publish the system feature versions. Write-once.
    pub fn write_system_features(&self, features: &[i32]) -> Result<(), SharedMemoryError> {
        self.writable()?.system_features().write(features)
    }

    /// The published system feature versions.
    pub fn read_system_features(&self) -> Vec<i32> {
        self.memory.system_features().read()
    }

    /// Copy the published feature versions into `out`. See
    /// [`SystemFeaturesCache::read_into`](crate::SystemFeaturesCache::read_into).
    pub fn read_system_features_into(&self, out: &mut [i32]) -> usize {
        self.memory.system_features().read_into(out)
    }

    /// The system nonce block, for the writer.
    pub fn system_nonce_block(&self) -> Result<NonceStoreRef<'_>, SharedMemoryError> {
        Ok(self.writable()?.system_pic().store())
    }

    /// Read access to the system nonce block, for any handle.
    pub fn system_nonces(&self) -> SystemNonceReader<'_> {
        SystemNonceReader {
            store: self.memory.system_pic().store(),
        }
    }

    /// Address of the system nonce block header, for handing to C.
    ///
    /// Holders of a read-only handle must only read through it.
    pub fn system_nonce_ptr(&self) -> *const NonceStore {
        self.memory.system_pic().store().as_ptr()
    }
}

impl fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRegion")
            .field("access", &self.access)
            .field("addr", &Arc::as_ptr(&self.memory))
            .finish()
    }
}

/// Read-only view of the system nonce block.
#[derive(Clone, Copy, Debug)]
pub struct SystemNonceReader<'a> {
    store: NonceStoreRef<'a>,
}

impl SystemNonceReader<'_> {
    /// See [`NonceStoreRef::max_nonce`].
    pub fn max_nonce(&self) -> i32 {
        self.store.max_nonce()
    }

    /// See [`NonceStoreRef::max_byte`].
    pub fn max_byte(&self) -> i32 {
        self.store.max_byte()
    }

    /// See [`NonceStoreRef::get_nonce`].
    pub fn get_nonce(&self, index: i32) -> i64 {
        self.store.get_nonce(index)
    }

    /// See [`NonceStoreRef::get_hash`].
    pub fn get_hash(&self) -> i32 {
        self.store.get_hash()
    }

    /// See [`NonceStoreRef::get_byte_block`].
    pub fn get_byte_block(&self, out: &mut [u8]) -> i32 {
        self.store.get_byte_block(out)
    }

    /// See [`read_byte_block`].
    pub fn read_byte_block(
        &self,
        out: &mut [u8],
        config: ReadConfig,
    ) -> Result<ByteBlockRead, TornRead> {
        read_byte_block(self.store, out, config)
    }

    /// Capture a validity stamp for `slot`.
    pub fn stamp(&self, slot: NonceSlot) -> NonceStamp {
        NonceStamp::capture(self.store, slot)
    }

    /// Whether `stamp` is still current.
    pub fn is_current(&self, stamp: &NonceStamp) -> bool {
        stamp.is_current(self.store)
    }
}
