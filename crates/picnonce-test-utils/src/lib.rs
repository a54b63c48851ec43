//! Test utilities for picnonce development.
//!
//! Provides 8-aligned scratch regions that stand in for shared-memory
//! mappings, deterministic per-version payloads for torn-read detection,
//! and a writer/readers harness for concurrency tests.
//!
//! Deliberately independent of `picnonce-store` types so that the store
//! crate's own unit tests can use it without a second copy of the crate.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod payload;
pub mod region;
pub mod stress;

pub use payload::{fill_payload, payload_for, verify_payload};
pub use region::AlignedRegion;
pub use stress::{run_concurrent, ReadOutcome, ReaderReport};
