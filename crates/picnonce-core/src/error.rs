//! Error types for the slow paths of picnonce.
//!
//! Organised by subsystem: region placement and attachment, the
//! byte-block reader, the slot directory, and the application
//! shared-memory composite. None of these are produced by the nonce
//! accessors themselves, which report out-of-range access through
//! sentinel values.

use std::error::Error;
use std::fmt;

/// Errors from placing a block into, or attaching to, a raw region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutError {
    /// The region pointer was null.
    NullRegion,
    /// The region does not start on the required alignment.
    Misaligned {
        /// Address of the region.
        addr: usize,
        /// Required alignment in bytes.
        align: usize,
    },
    /// The region is shorter than the block it must hold.
    RegionTooSmall {
        /// Bytes the block needs.
        required: usize,
        /// Bytes the region provides.
        actual: usize,
    },
    /// A header found in an existing region describes an impossible layout.
    CorruptHeader {
        /// What was wrong with it.
        reason: &'static str,
    },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullRegion => write!(f, "region pointer is null"),
            Self::Misaligned { addr, align } => {
                write!(f, "region at {addr:#x} is not {align}-byte aligned")
            }
            Self::RegionTooSmall { required, actual } => {
                write!(
                    f,
                    "region too small: block needs {required} bytes, region has {actual}"
                )
            }
            Self::CorruptHeader { reason } => write!(f, "corrupt block header: {reason}"),
        }
    }
}

impl Error for LayoutError {}

/// The byte-block reader gave up after repeated concurrent writes.
///
/// Every attempt observed a writer in progress or a changed version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TornRead {
    /// Number of copies attempted.
    pub attempts: u32,
}

impl fmt::Display for TornRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "byte block torn on every read ({} attempts)",
            self.attempts
        )
    }
}

impl Error for TornRead {}

/// Errors from the slot directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirectoryError {
    /// Names must be non-empty and must not contain NUL.
    InvalidName {
        /// The rejected name.
        name: String,
    },
    /// Every nonce slot already has an owner.
    Full {
        /// Number of nonce slots in the block.
        capacity: i32,
    },
    /// The encoded name list does not fit in the byte block.
    BlockOverflow {
        /// Bytes the encoded list needs.
        required: usize,
        /// Bytes the byte block provides.
        capacity: usize,
    },
    /// The directory could not be read consistently.
    Torn(TornRead),
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName { name } => write!(f, "invalid cache name {name:?}"),
            Self::Full { capacity } => {
                write!(f, "all {capacity} nonce slots are assigned")
            }
            Self::BlockOverflow { required, capacity } => {
                write!(
                    f,
                    "directory needs {required} bytes, byte block holds {capacity}"
                )
            }
            Self::Torn(e) => write!(f, "directory read failed: {e}"),
        }
    }
}

impl Error for DirectoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Torn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TornRead> for DirectoryError {
    fn from(e: TornRead) -> Self {
        Self::Torn(e)
    }
}

/// Errors from the application shared-memory region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SharedMemoryError {
    /// Mutation attempted through a read-only handle.
    ReadOnly,
    /// The system features cache is write-once and was already written.
    FeaturesAlreadyWritten,
    /// More feature versions than the cache can hold.
    TooManyFeatures {
        /// Capacity of the cache.
        max: usize,
        /// Number of versions offered.
        requested: usize,
    },
    /// No network time has been published yet.
    NetworkTimeUnavailable,
    /// The backing region could not hold the shared structure.
    Layout(LayoutError),
}

impl fmt::Display for SharedMemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "shared memory handle is read-only"),
            Self::FeaturesAlreadyWritten => write!(f, "system features cache already written"),
            Self::TooManyFeatures { max, requested } => {
                write!(
                    f,
                    "system features cache only supports {max} elements ({requested} requested)"
                )
            }
            Self::NetworkTimeUnavailable => write!(f, "no network time has been published"),
            Self::Layout(e) => write!(f, "shared memory layout: {e}"),
        }
    }
}

impl Error for SharedMemoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Layout(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LayoutError> for SharedMemoryError {
    fn from(e: LayoutError) -> Self {
        Self::Layout(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_error_exposes_torn_source() {
        let e = DirectoryError::from(TornRead { attempts: 3 });
        assert!(e.source().is_some());
        assert_eq!(
            e.to_string(),
            "directory read failed: byte block torn on every read (3 attempts)"
        );
    }

    #[test]
    fn too_many_features_message() {
        let e = SharedMemoryError::TooManyFeatures {
            max: 512,
            requested: 5000,
        };
        assert_eq!(
            e.to_string(),
            "system features cache only supports 512 elements (5000 requested)"
        );
    }

    #[test]
    fn misaligned_message_is_hex() {
        let e = LayoutError::Misaligned {
            addr: 0x1003,
            align: 8,
        };
        assert_eq!(e.to_string(), "region at 0x1003 is not 8-byte aligned");
    }
}
