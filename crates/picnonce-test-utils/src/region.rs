//! 8-aligned scratch memory standing in for a shared mapping.

use picnonce_core::config::BLOCK_ALIGN;
use picnonce_core::BlockConfig;

/// Heap region with 8-byte alignment, zero-initialised.
///
/// Backed by `Vec<u64>` so the base address is always 8-aligned. Two
/// regions never share an address, which makes [`AlignedRegion::relocated`]
/// a stand-in for the same bytes mapped at a different virtual address.
#[derive(Clone, Debug)]
pub struct AlignedRegion {
    words: Vec<u64>,
    len: usize,
}

impl AlignedRegion {
    /// A zeroed region of at least `len` bytes.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(BLOCK_ALIGN)],
            len,
        }
    }

    /// A zeroed region sized exactly for a block with `config`.
    pub fn for_config(config: BlockConfig) -> Self {
        Self::new(config.region_bytes())
    }

    /// A region initialised with a copy of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut region = Self::new(bytes.len());
        for (word, chunk) in region.words.iter_mut().zip(bytes.chunks(BLOCK_ALIGN)) {
            let mut buf = [0u8; BLOCK_ALIGN];
            buf[..chunk.len()].copy_from_slice(chunk);
            *word = u64::from_ne_bytes(buf);
        }
        region
    }

    /// Copy these bytes into a fresh region at a different address.
    pub fn relocated(&self) -> Self {
        Self::from_bytes(&self.to_bytes())
    }

    /// Length in bytes, as a transport would report it.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the region is zero-length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base pointer for reads.
    pub fn as_ptr(&self) -> *const u8 {
        self.words.as_ptr().cast()
    }

    /// Base pointer for writes.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.words.as_mut_ptr().cast()
    }

    /// Base address, for asserting two regions differ.
    pub fn addr(&self) -> usize {
        self.as_ptr() as usize
    }

    /// Copy of the region's bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out: Vec<u8> = self.words.iter().flat_map(|w| w.to_ne_bytes()).collect();
        out.truncate(self.len);
        out
    }
}
