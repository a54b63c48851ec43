//! Block sizing and reader configuration.
//!
//! The physical layout of a nonce block is fixed at compile time by its
//! `N` (nonce count) and `M` (byte count) parameters. [`BlockConfig`]
//! mirrors those constants at run time so that placement code can size
//! regions and validate a header found in memory.

use std::fmt;

/// Size in bytes of the fixed block header.
///
/// Four `i32` sizing fields, the atomic `i32` byte-block hash and one
/// `i32` word of explicit padding. Architecture independent.
pub const HEADER_BYTES: usize = 24;

/// Width in bytes of one nonce slot.
pub const NONCE_BYTES: usize = 8;

/// Alignment every block (and every region holding one) must have.
pub const BLOCK_ALIGN: usize = 8;

/// Run-time description of a block's sizing parameters.
///
/// Both counts are `i32` to match the header fields exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockConfig {
    /// Capacity of the nonce array.
    pub max_nonce: i32,
    /// Capacity of the byte array.
    pub max_byte: i32,
}

impl BlockConfig {
    /// Sizing of the system-server block: 128 nonces, 8 KiB of bytes.
    pub const SYSTEM: Self = Self::new(128, 8192);

    /// Create a config. No validation; see [`BlockConfig::validate`].
    pub const fn new(max_nonce: i32, max_byte: i32) -> Self {
        Self {
            max_nonce,
            max_byte,
        }
    }

    /// Check that this config describes a layout with no hidden padding.
    ///
    /// Both counts must be positive, and the byte count must be a
    /// multiple of [`BLOCK_ALIGN`] so that the block's total size is
    /// exactly `HEADER_BYTES + 8 * max_nonce + max_byte`.
    pub fn validate(&self) -> Result<(), BlockConfigError> {
        if self.max_nonce <= 0 {
            return Err(BlockConfigError::NonPositive {
                field: "max_nonce",
                value: self.max_nonce,
            });
        }
        if self.max_byte <= 0 {
            return Err(BlockConfigError::NonPositive {
                field: "max_byte",
                value: self.max_byte,
            });
        }
        if self.max_byte as usize % BLOCK_ALIGN != 0 {
            return Err(BlockConfigError::UnalignedByteCount {
                max_byte: self.max_byte,
            });
        }
        Ok(())
    }

    /// Offset of the nonce array from the start of the block.
    pub const fn nonce_offset(&self) -> usize {
        HEADER_BYTES
    }

    /// Offset of the byte array from the start of the block.
    pub const fn byte_offset(&self) -> usize {
        HEADER_BYTES + NONCE_BYTES * self.max_nonce as usize
    }

    /// Total size of a block with this sizing, in bytes.
    ///
    /// This is the size the creation transport must allocate.
    pub const fn region_bytes(&self) -> usize {
        self.byte_offset() + self.max_byte as usize
    }
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self::SYSTEM
    }
}

/// A [`BlockConfig`] that cannot describe a padding-free block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockConfigError {
    /// A count was zero or negative.
    NonPositive {
        /// Which count.
        field: &'static str,
        /// The rejected value.
        value: i32,
    },
    /// The byte count would leave tail padding after the byte array.
    UnalignedByteCount {
        /// The rejected byte count.
        max_byte: i32,
    },
}

impl fmt::Display for BlockConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositive { field, value } => {
                write!(f, "{field} must be positive, got {value}")
            }
            Self::UnalignedByteCount { max_byte } => {
                write!(
                    f,
                    "max_byte must be a multiple of {BLOCK_ALIGN}, got {max_byte}"
                )
            }
        }
    }
}

impl std::error::Error for BlockConfigError {}

/// Configuration for the byte-block reader's retry loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadConfig {
    /// How many copies to attempt before reporting a torn read.
    ///
    /// Default: 16. Must be at least 1.
    pub max_attempts: u32,
}

impl ReadConfig {
    /// Default attempt cap.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 16;

    /// Create a reader config with the given attempt cap.
    ///
    /// A cap of zero is raised to one: the reader always copies at least once.
    pub const fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
        }
    }
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_config_region_size() {
        let cfg = BlockConfig::SYSTEM;
        assert_eq!(cfg.region_bytes(), 24 + 128 * 8 + 8192);
        assert_eq!(cfg.nonce_offset(), 24);
        assert_eq!(cfg.byte_offset(), 24 + 1024);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_positive_counts() {
        assert!(matches!(
            BlockConfig::new(0, 8).validate(),
            Err(BlockConfigError::NonPositive {
                field: "max_nonce",
                ..
            })
        ));
        assert!(matches!(
            BlockConfig::new(4, -8).validate(),
            Err(BlockConfigError::NonPositive {
                field: "max_byte",
                ..
            })
        ));
    }

    #[test]
    fn validate_rejects_tail_padding() {
        assert_eq!(
            BlockConfig::new(4, 12).validate(),
            Err(BlockConfigError::UnalignedByteCount { max_byte: 12 })
        );
    }

    #[test]
    fn read_config_never_zero() {
        assert_eq!(ReadConfig::new(0).max_attempts, 1);
        assert_eq!(ReadConfig::default().max_attempts, 16);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn region_bytes_is_header_plus_arrays(
                n in 1i32..4096,
                m8 in 1i32..4096,
            ) {
                let cfg = BlockConfig::new(n, m8 * 8);
                prop_assert!(cfg.validate().is_ok());
                prop_assert_eq!(
                    cfg.region_bytes(),
                    HEADER_BYTES + 8 * n as usize + (m8 * 8) as usize
                );
                prop_assert_eq!(cfg.region_bytes() % BLOCK_ALIGN, 0);
            }
        }
    }
}
