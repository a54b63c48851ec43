//! Reader side of the byte-block protocol.
//!
//! The byte block is guarded by two header words: the caller-chosen hash
//! (published last by the writer) and the write sequence (odd while a
//! write is in progress). A read is accepted only if the sequence was
//! even before the copy and unchanged after it, and the hash did not
//! change across the copy. Otherwise the copy is discarded and retried,
//! up to [`ReadConfig::max_attempts`] times.
//!
//! The reader never waits on the writer: a writer stalled mid-copy makes
//! every attempt fail and the call returns [`TornRead`].

use std::hint;

use picnonce_core::{ReadConfig, TornRead};

use crate::descriptor::NonceStoreRef;

/// Result of a consistent byte-block read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteBlockRead {
    /// The hash the copied payload was published with.
    pub hash: i32,
    /// Number of bytes copied into the caller's buffer.
    pub len: usize,
    /// How many copies it took (1 when uncontended).
    pub attempts: u32,
}

/// Copy the byte block into `out` using the full retry protocol.
///
/// On success every copied byte came from the single write that
/// published `hash`. Copies `min(out.len(), max_byte)` bytes.
pub fn read_byte_block(
    store: NonceStoreRef<'_>,
    out: &mut [u8],
    config: ReadConfig,
) -> Result<ByteBlockRead, TornRead> {
    let len = out.len().min(store.max_byte().max(0) as usize);
    let attempts = config.max_attempts.max(1);
    for attempt in 1..=attempts {
        let seq_before = store.begin_read();
        if seq_before & 1 == 0 {
            let hash = store.get_byte_block(&mut out[..len]);
            let seq_after = store.end_read();
            if seq_before == seq_after && hash == store.get_hash() {
                return Ok(ByteBlockRead {
                    hash,
                    len,
                    attempts: attempt,
                });
            }
        }
        hint::spin_loop();
    }
    Err(TornRead { attempts })
}

impl NonceStoreRef<'_> {
    /// Shorthand for [`read_byte_block`] with the default [`ReadConfig`].
    pub fn read_byte_block(&self, out: &mut [u8]) -> Result<ByteBlockRead, TornRead> {
        read_byte_block(*self, out, ReadConfig::default())
    }
}
