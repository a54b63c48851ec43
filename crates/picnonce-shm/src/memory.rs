//! The fixed-layout structure shared between the system server and
//! application processes.
//!
//! Only fixed-width types appear here, so 32-bit and 64-bit processes
//! agree on every offset. The assertions below fail the build if that
//! ever stops being true.

use std::mem::{offset_of, size_of};
use std::sync::atomic::{AtomicI64, Ordering};

use picnonce_core::{LayoutError, SharedMemoryError};
use picnonce_store::SystemCacheNonce;

use crate::features::SystemFeaturesCache;

/// Network-time value meaning "never published".
pub const INVALID_NETWORK_TIME: i64 = -1;

/// Everything the system server shares with applications.
#[repr(C, align(8))]
pub struct ApplicationSharedMemory {
    latest_network_time: AtomicI64,
    system_features: SystemFeaturesCache,
    system_pic: SystemCacheNonce,
}

const _: () = assert!(
    size_of::<ApplicationSharedMemory>()
        == size_of::<i64>() + size_of::<SystemFeaturesCache>() + size_of::<SystemCacheNonce>()
);
const _: () = assert!(offset_of!(ApplicationSharedMemory, system_features) == size_of::<i64>());
const _: () = assert!(
    offset_of!(ApplicationSharedMemory, system_pic)
        == offset_of!(ApplicationSharedMemory, system_features) + size_of::<SystemFeaturesCache>()
);
const _: () = assert!(offset_of!(ApplicationSharedMemory, system_pic) == 8 + 2056);

const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<ApplicationSharedMemory>();
};

impl ApplicationSharedMemory {
    /// Size of the shared structure in bytes.
    pub const SIZE: usize = size_of::<Self>();

    /// Offset of the system nonce block from the start of the structure.
    pub const SYSTEM_PIC_OFFSET: usize = offset_of!(Self, system_pic);

    /// A freshly initialised region: no network time, no features, and
    /// an all-zero system nonce block.
    pub const fn new() -> Self {
        Self {
            latest_network_time: AtomicI64::new(INVALID_NETWORK_TIME),
            system_features: SystemFeaturesCache::new(),
            system_pic: SystemCacheNonce::new(),
        }
    }

    /// Publish the latest network time.
    pub fn set_latest_network_time(&self, millis: i64) {
        self.latest_network_time.store(millis, Ordering::SeqCst);
    }

    /// The latest network time, or `NetworkTimeUnavailable` if none has
    /// been published.
    pub fn latest_network_time(&self) -> Result<i64, SharedMemoryError> {
        match self.latest_network_time.load(Ordering::SeqCst) {
            INVALID_NETWORK_TIME => Err(SharedMemoryError::NetworkTimeUnavailable),
            millis => Ok(millis),
        }
    }

    /// The raw network-time word, [`INVALID_NETWORK_TIME`] included.
    pub fn latest_network_time_raw(&self) -> i64 {
        self.latest_network_time.load(Ordering::SeqCst)
    }

    /// The system features cache.
    pub fn system_features(&self) -> &SystemFeaturesCache {
        &self.system_features
    }

    /// The system nonce block.
    pub fn system_pic(&self) -> &SystemCacheNonce {
        &self.system_pic
    }

    /// Check that the embedded nonce block header still describes a
    /// system-sized block lying inside the structure.
    pub fn validate(&self) -> Result<(), SharedMemoryError> {
        let header = self.system_pic.header();
        let config = header.check(SystemCacheNonce::SIZE)?;
        if config != SystemCacheNonce::CONFIG {
            return Err(LayoutError::CorruptHeader {
                reason: "system nonce block has unexpected sizing",
            }
            .into());
        }
        Ok(())
    }
}

impl Default for ApplicationSharedMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_fixed() {
        assert_eq!(ApplicationSharedMemory::SIZE, 8 + 2056 + 24 + 128 * 8 + 8192);
        assert_eq!(ApplicationSharedMemory::SYSTEM_PIC_OFFSET, 2064);
        assert_eq!(std::mem::align_of::<ApplicationSharedMemory>(), 8);
    }

    #[test]
    fn fresh_memory() {
        let memory = Box::new(ApplicationSharedMemory::new());
        assert_eq!(
            memory.latest_network_time(),
            Err(SharedMemoryError::NetworkTimeUnavailable)
        );
        assert_eq!(memory.latest_network_time_raw(), INVALID_NETWORK_TIME);
        assert!(memory.system_features().is_empty());
        assert_eq!(memory.system_pic().max_nonce(), 128);
        assert_eq!(memory.system_pic().get_hash(), 0);
        memory.validate().unwrap();
    }

    #[test]
    fn network_time_round_trip() {
        let memory = Box::new(ApplicationSharedMemory::new());
        memory.set_latest_network_time(1_700_000_000_000);
        assert_eq!(memory.latest_network_time(), Ok(1_700_000_000_000));
        memory.set_latest_network_time(INVALID_NETWORK_TIME);
        assert_eq!(
            memory.latest_network_time(),
            Err(SharedMemoryError::NetworkTimeUnavailable)
        );
    }
}
