//! Benchmark fixtures for picnonce.
//!
//! - [`populated_system_block`]: a system-sized block with every nonce set
//! - [`cache_names`]: deterministic cache names for directory benches
//! - [`registered_directory`]: a system block carrying a full directory

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use picnonce_store::{NonceDirectory, SystemCacheNonce};

/// A heap system block with nonce `i` set to `i + 1` for every slot.
pub fn populated_system_block() -> Box<SystemCacheNonce> {
    let block = SystemCacheNonce::boxed();
    for i in 0..SystemCacheNonce::MAX_NONCE_COUNT {
        block.set_nonce(i, i as i64 + 1);
    }
    block
}

/// `count` cache names of the shape used by system caches.
pub fn cache_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("cache_key.system.{i}")).collect()
}

/// A system block whose byte block carries a directory of `count` names.
///
/// # Panics
///
/// If `count` exceeds the block's nonce or byte capacity.
pub fn registered_directory(count: usize) -> (Box<SystemCacheNonce>, NonceDirectory) {
    let block = SystemCacheNonce::boxed();
    let mut directory = NonceDirectory::new();
    for name in cache_names(count) {
        directory
            .register(block.store(), &name)
            .expect("bench directory fits the system block");
    }
    (block, directory)
}
