//! Hot accessors over a raw nonce block pointer.
//!
//! These are the calls an application makes on every cache lookup. They
//! take no locks, allocate nothing, and cannot panic. A null block
//! pointer degrades to the same sentinels as an out-of-range index:
//! `0` for reads, `false` (or no effect) for writes.
//!
//! A non-null `PicNonceStore` pointer must come from
//! [`pic_shm_system_nonce_block`](crate::shm::pic_shm_system_nonce_block)
//! or [`pic_nonce_attach`], and the memory behind it must still be
//! alive.

use std::ptr::NonNull;

use picnonce_core::{ReadConfig, UNSET_HASH, UNSET_NONCE};
use picnonce_store::{read_byte_block, NonceStore, NonceStoreRef};

use crate::status::PicStatus;

/// Opaque nonce block header, as seen from C.
#[repr(C)]
pub struct PicNonceStore {
    _private: [u8; 0],
}

/// View the block behind a C pointer.
#[allow(unsafe_code)]
fn view<'a>(store: *const PicNonceStore) -> Option<NonceStoreRef<'a>> {
    let header = NonNull::new(store.cast_mut())?.cast::<NonceStore>();
    // SAFETY: non-null pointers are headers handed out by this crate,
    // whose memory the caller keeps alive for the call.
    Some(unsafe { NonceStoreRef::from_raw(header) })
}

/// Capacity of the nonce array, or 0 for a null block.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_nonce_max_nonce(store: *const PicNonceStore) -> i32 {
    view(store).map_or(0, |s| s.max_nonce())
}

/// Capacity of the byte block, or 0 for a null block.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_nonce_max_byte(store: *const PicNonceStore) -> i32 {
    view(store).map_or(0, |s| s.max_byte())
}

/// The nonce at `index`, or 0 if the block is null or the index is out
/// of range.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_nonce_get(store: *const PicNonceStore, index: i32) -> i64 {
    view(store).map_or(UNSET_NONCE, |s| s.get_nonce(index))
}

/// Store `value` at `index`. Returns `false`, touching nothing, if the
/// block is null or the index is out of range.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_nonce_set(store: *const PicNonceStore, index: i32, value: i64) -> bool {
    view(store).is_some_and(|s| s.set_nonce(index, value))
}

/// The byte-block hash, or 0 for a null block.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_nonce_hash(store: *const PicNonceStore) -> i32 {
    view(store).map_or(UNSET_HASH, |s| s.get_hash())
}

/// Copy up to `len` bytes of the byte block into `out` and return the
/// hash observed before the copy.
///
/// Not torn-read safe on its own: compare the result with
/// `pic_nonce_hash` afterwards, or use `pic_nonce_read_byte_block`.
/// Returns 0 and copies nothing if `store` or `out` is null.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_nonce_get_byte_block(
    store: *const PicNonceStore,
    out: *mut u8,
    len: usize,
) -> i32 {
    let Some(store) = view(store) else {
        return UNSET_HASH;
    };
    if out.is_null() {
        return UNSET_HASH;
    }
    // SAFETY: caller guarantees `out` is valid for `len` writable bytes.
    let out = unsafe { std::slice::from_raw_parts_mut(out, len) };
    store.get_byte_block(out)
}

/// Copy up to `len` bytes from `data` into the byte block, then publish
/// `hash`. Does nothing if `store` is null, or if `data` is null with a
/// non-zero `len`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_nonce_set_byte_block(
    store: *const PicNonceStore,
    hash: i32,
    data: *const u8,
    len: usize,
) {
    let Some(store) = view(store) else {
        return;
    };
    let data: &[u8] = if len == 0 {
        &[]
    } else if data.is_null() {
        return;
    } else {
        // SAFETY: caller guarantees `data` is valid for `len` bytes.
        unsafe { std::slice::from_raw_parts(data, len) }
    };
    store.set_byte_block(hash, data);
}

/// Consistent read of the byte block with bounded retry.
///
/// Copies up to `len` bytes into `out` and writes the hash they were
/// published with to `hash_out`. `max_attempts` of 0 uses the default.
/// Returns `PIC_STATUS_TORN_READ` if every attempt overlapped a write.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_nonce_read_byte_block(
    store: *const PicNonceStore,
    out: *mut u8,
    len: usize,
    max_attempts: u32,
    hash_out: *mut i32,
) -> i32 {
    let Some(store) = view(store) else {
        return PicStatus::InvalidArgument as i32;
    };
    if out.is_null() || hash_out.is_null() {
        return PicStatus::InvalidArgument as i32;
    }
    let config = match max_attempts {
        0 => ReadConfig::default(),
        n => ReadConfig::new(n),
    };
    // SAFETY: caller guarantees `out` is valid for `len` writable bytes.
    let out = unsafe { std::slice::from_raw_parts_mut(out, len) };
    match read_byte_block(store, out, config) {
        Ok(read) => {
            // SAFETY: checked non-null; caller guarantees validity.
            unsafe { *hash_out = read.hash };
            PicStatus::Ok as i32
        }
        Err(e) => PicStatus::from(&e) as i32,
    }
}

/// Attach to a nonce block at the start of a region the caller mapped.
///
/// Validates the header against `len` and writes the block pointer to
/// `store_out`. The region must stay mapped while the pointer is used.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_nonce_attach(
    region: *const u8,
    len: usize,
    store_out: *mut *const PicNonceStore,
) -> i32 {
    ffi_guard!({
        if store_out.is_null() {
            return PicStatus::InvalidArgument as i32;
        }
        // SAFETY: caller guarantees `region` is valid for `len` bytes and
        // initialised by the block's writer.
        match unsafe { NonceStoreRef::attach(region, len) } {
            Ok(store) => {
                // SAFETY: checked non-null; caller guarantees validity.
                unsafe { *store_out = store.as_ptr().cast() };
                PicStatus::Ok as i32
            }
            Err(e) => PicStatus::from(&e) as i32,
        }
    })
}
