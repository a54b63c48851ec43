//! C-compatible status codes.
//!
//! `Ok` is zero and every error is negative. Values are ABI-stable:
//! never renumber a variant.

use picnonce_core::{LayoutError, SharedMemoryError, TornRead};

/// Status code returned by every status-returning FFI function.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PicStatus {
    /// Success.
    Ok = 0,
    /// Handle is invalid or was already destroyed.
    InvalidHandle = -1,
    /// A required pointer is null, or an argument is out of range.
    InvalidArgument = -2,
    /// Caller-provided buffer is too small; the required length was
    /// still written.
    BufferTooSmall = -3,
    /// Mutation attempted through a read-only handle.
    ReadOnly = -4,
    /// The system features cache was already written.
    FeaturesAlreadyWritten = -5,
    /// More feature versions than the cache holds.
    TooManyFeatures = -6,
    /// No network time has been published.
    NetworkTimeUnavailable = -7,
    /// A region or header failed layout validation.
    LayoutInvalid = -8,
    /// Every byte-block read attempt overlapped a write.
    TornRead = -9,
    /// Internal error, e.g. a handle table poisoned by an earlier panic.
    InternalError = -20,
    /// A Rust panic was caught at the FFI boundary.
    Panicked = -128,
}

impl From<&SharedMemoryError> for PicStatus {
    fn from(e: &SharedMemoryError) -> Self {
        match e {
            SharedMemoryError::ReadOnly => PicStatus::ReadOnly,
            SharedMemoryError::FeaturesAlreadyWritten => PicStatus::FeaturesAlreadyWritten,
            SharedMemoryError::TooManyFeatures { .. } => PicStatus::TooManyFeatures,
            SharedMemoryError::NetworkTimeUnavailable => PicStatus::NetworkTimeUnavailable,
            SharedMemoryError::Layout(_) => PicStatus::LayoutInvalid,
        }
    }
}

impl From<&LayoutError> for PicStatus {
    fn from(_e: &LayoutError) -> Self {
        PicStatus::LayoutInvalid
    }
}

impl From<&TornRead> for PicStatus {
    fn from(_e: &TornRead) -> Self {
        PicStatus::TornRead
    }
}
