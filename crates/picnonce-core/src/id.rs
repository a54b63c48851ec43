//! Slot identifiers and the unset sentinels.
//!
//! Every value that crosses the shared-memory boundary is a fixed-width
//! integer. Slot indices are `i32` so that 32-bit and 64-bit processes
//! agree on their width, and so that a negative index from a foreign
//! caller is representable (and rejected) rather than wrapping.

use std::fmt;

/// Value of a nonce slot that has never been invalidated.
///
/// Also returned by `get_nonce` for an out-of-range index.
pub const UNSET_NONCE: i64 = 0;

/// Value of the byte-block hash before the first publication.
pub const UNSET_HASH: i32 = 0;

/// Identifies one nonce slot within a block.
///
/// `NonceSlot(n)` is the n-th entry of the nonce array. The meaning of a
/// slot (which cache it guards) is assigned by the writer and fixed for
/// the lifetime of the shared region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonceSlot(pub i32);

impl NonceSlot {
    /// The raw index as passed to the store accessors.
    pub fn index(self) -> i32 {
        self.0
    }

    /// Whether this slot lies in `[0, max_nonce)`.
    pub fn in_range(self, max_nonce: i32) -> bool {
        self.0 >= 0 && self.0 < max_nonce
    }
}

impl fmt::Display for NonceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for NonceSlot {
    fn from(v: i32) -> Self {
        Self(v)
    }
}
