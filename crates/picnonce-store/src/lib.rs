//! Cross-process cache-invalidation nonce blocks.
//!
//! A nonce block is a fixed-layout region of shared memory through which
//! one writer process tells any number of reader processes, without a
//! round trip, whether results they cached are still valid.
//!
//! # Architecture
//!
//! ```text
//! CacheNonce<N, M>            (owns the memory; placed once by the writer)
//! ├── NonceStore header       (fixed 24 bytes, offsets not pointers)
//! ├── [AtomicI64; N] nonces   (one independent slot per named cache)
//! └── [AtomicU8; M] bytes     (opaque payload guarded by hash + write seq)
//!
//! NonceStoreRef               (typed view; what every process calls)
//! ├── get/set_nonce, get_hash, get/set_byte_block   (never block or panic)
//! ├── read_byte_block          (seqlock reader with bounded retry)
//! ├── NonceStamp / invalidate  (consumer validity protocol)
//! └── NonceDirectory / DirectoryReader (slot names in the byte block)
//! ```
//!
//! Position independence: the header stores the two arrays' offsets from
//! itself, computed once in the writer. Any process mapping the same
//! bytes at any address recomputes `header + offset` and lands on its own
//! valid address for each array.
//!
//! This crate is one of two that may contain `unsafe` code (along with
//! `picnonce-ffi`), confined to `descriptor`, `block`, and `region`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod block;
pub mod descriptor;
pub mod directory;
pub mod region;
pub mod seqlock;
pub mod validity;

// Public re-exports for the primary API surface.
pub use block::{CacheNonce, SystemCacheNonce};
pub use descriptor::{NonceStore, NonceStoreRef};
pub use directory::{DirectoryReader, NonceDirectory};
pub use seqlock::{read_byte_block, ByteBlockRead};
pub use validity::{invalidate, NonceStamp};

pub use picnonce_core::{
    BlockConfig, DirectoryError, LayoutError, NonceSlot, ReadConfig, TornRead, UNSET_HASH,
    UNSET_NONCE,
};
