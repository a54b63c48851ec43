//! Application shared-memory region.
//!
//! The system server owns one [`ApplicationSharedMemory`] and shares it
//! with every application process. It carries three independent pieces
//! of state:
//!
//! - the latest network time, as a Unix-epoch millisecond offset at zero
//!   elapsed realtime;
//! - the [`SystemFeaturesCache`], a write-once array of feature versions;
//! - the system nonce block, a [`SystemCacheNonce`] through which the
//!   server invalidates caches held by applications.
//!
//! [`SharedRegion`] is the handle type: it owns the allocation through an
//! `Arc` and is either mutable or read-only.
//!
//! [`SystemCacheNonce`]: picnonce_store::SystemCacheNonce

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod features;
pub mod memory;
pub mod region;

pub use features::{SystemFeaturesCache, MAX_SYSTEM_FEATURES};
pub use memory::{ApplicationSharedMemory, INVALID_NETWORK_TIME};
pub use region::{Access, SharedRegion, SystemNonceReader};

pub use picnonce_core::SharedMemoryError;
