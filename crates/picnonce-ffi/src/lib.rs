//! C ABI for picnonce.
//!
//! Exposes the nonce block accessors and the application shared-memory
//! region to C and to other languages through C. This crate is one of
//! two that may contain `unsafe` code (along with `picnonce-store`).
//!
//! Status-returning functions run inside `ffi_guard!`, which turns a
//! panic into [`PicStatus::Panicked`] instead of unwinding into C. The
//! hot `pic_nonce_*` accessors cannot panic and are not wrapped.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

/// Run an FFI body, converting a panic into [`PicStatus::Panicked`].
///
/// The body evaluates to an `i32` status; `return` inside it returns
/// from the guarded closure.
macro_rules! ffi_guard {
    ($body:block) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| -> i32 { $body })) {
            Ok(status) => status,
            Err(_) => $crate::status::PicStatus::Panicked as i32,
        }
    };
}

/// Lock a handle table, returning [`PicStatus::InternalError`] from the
/// enclosing guarded body if the mutex is poisoned.
macro_rules! ffi_lock {
    ($table:expr) => {
        match $table.lock() {
            Ok(guard) => guard,
            Err(_) => return $crate::status::PicStatus::InternalError as i32,
        }
    };
}

pub mod handle;
pub mod nonce;
pub mod shm;
pub mod status;

pub use nonce::PicNonceStore;
pub use status::PicStatus;
