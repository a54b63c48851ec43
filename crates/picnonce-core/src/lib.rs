//! Core types for picnonce shared-memory nonce stores.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary used throughout the workspace: slot identifiers and
//! sentinels, the run-time view of block sizing, and the error types
//! returned by the slow (placement, directory, region) paths.
//!
//! The hot accessors in `picnonce-store` never return these errors;
//! they degrade to sentinel values instead.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod id;

pub use config::{BlockConfig, BlockConfigError, ReadConfig};
pub use error::{DirectoryError, LayoutError, SharedMemoryError, TornRead};
pub use id::{NonceSlot, UNSET_HASH, UNSET_NONCE};
