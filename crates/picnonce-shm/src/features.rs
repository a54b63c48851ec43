//! Write-once cache of system feature versions.
//!
//! The length word is the publication barrier: the writer stores every
//! version before storing the length, and readers load the length before
//! any version. A non-zero length means the cache is written and frozen.

use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

use picnonce_core::SharedMemoryError;

/// Capacity of the cache. Enough for the SDK-defined feature set.
pub const MAX_SYSTEM_FEATURES: usize = 512;

/// Fixed-size array of feature versions plus its published length.
///
/// ```text
/// 0     features  [i32; 512]
/// 2048  length    AtomicI64
/// ```
#[repr(C, align(8))]
pub struct SystemFeaturesCache {
    features: [AtomicI32; MAX_SYSTEM_FEATURES],
    len: AtomicI64,
}

const _: () = assert!(
    std::mem::size_of::<SystemFeaturesCache>()
        == std::mem::size_of::<i32>() * MAX_SYSTEM_FEATURES + std::mem::size_of::<i64>()
);

impl SystemFeaturesCache {
    /// An empty, unwritten cache.
    pub const fn new() -> Self {
        Self {
            features: [const { AtomicI32::new(0) }; MAX_SYSTEM_FEATURES],
            len: AtomicI64::new(0),
        }
    }

    /// Publish `features`.
    ///
    /// Fails if a non-empty list was already published, or if `features`
    /// exceeds [`MAX_SYSTEM_FEATURES`]. Writing an empty list publishes
    /// nothing and leaves the cache writable. Only the region's single
    /// writer may call this.
    pub fn write(&self, features: &[i32]) -> Result<(), SharedMemoryError> {
        if self.is_written() {
            tracing::warn!("system features cache already written");
            return Err(SharedMemoryError::FeaturesAlreadyWritten);
        }
        if features.len() > MAX_SYSTEM_FEATURES {
            tracing::warn!(
                max = MAX_SYSTEM_FEATURES,
                requested = features.len(),
                "too many system features"
            );
            return Err(SharedMemoryError::TooManyFeatures {
                max: MAX_SYSTEM_FEATURES,
                requested: features.len(),
            });
        }
        for (slot, &version) in self.features.iter().zip(features) {
            slot.store(version, Ordering::Relaxed);
        }
        self.len.store(features.len() as i64, Ordering::SeqCst);
        Ok(())
    }

    /// Number of published versions.
    pub fn len(&self) -> usize {
        self.len
            .load(Ordering::SeqCst)
            .clamp(0, MAX_SYSTEM_FEATURES as i64) as usize
    }

    /// Whether nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a non-empty list has been published.
    pub fn is_written(&self) -> bool {
        !self.is_empty()
    }

    /// Copy the published versions into `out`, returning the total number
    /// published. Copies `min(out.len(), len)` entries.
    pub fn read_into(&self, out: &mut [i32]) -> usize {
        let len = self.len();
        for (dst, src) in out.iter_mut().zip(&self.features[..len]) {
            *dst = src.load(Ordering::Relaxed);
        }
        len
    }

    /// The published versions.
    pub fn read(&self) -> Vec<i32> {
        let mut out = vec![0; self.len()];
        let len = self.read_into(&mut out);
        out.truncate(len);
        out
    }
}

impl Default for SystemFeaturesCache {
    fn default() -> Self {
        Self::new()
    }
}
