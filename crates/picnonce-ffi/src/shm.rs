//! Application shared-memory lifecycle FFI: create, duplicate as
//! read-only, destroy, and the region's network-time, features, and
//! system nonce block.
//!
//! Each handle owns a [`SharedRegion`]. The global table lock is held
//! only to look up or change a handle; the region itself is reached
//! through a cloned handle outside the lock.

use std::sync::Mutex;

use picnonce_shm::SharedRegion;

use crate::handle::HandleTable;
use crate::nonce::PicNonceStore;
use crate::status::PicStatus;

static REGIONS: Mutex<HandleTable<SharedRegion>> = Mutex::new(HandleTable::new());

/// Clone the region behind a handle, briefly locking the table.
fn get_region(handle: u64) -> Option<SharedRegion> {
    REGIONS.lock().ok()?.get(handle).cloned()
}

/// Create a region and write its mutable handle to `handle_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_shm_create(handle_out: *mut u64) -> i32 {
    ffi_guard!({
        if handle_out.is_null() {
            return PicStatus::InvalidArgument as i32;
        }
        let region = match SharedRegion::create() {
            Ok(r) => r,
            Err(e) => return PicStatus::from(&e) as i32,
        };
        let handle = ffi_lock!(REGIONS).insert(region);
        tracing::debug!(handle, "shared memory handle created");
        // SAFETY: checked non-null; caller guarantees validity.
        unsafe { *handle_out = handle };
        PicStatus::Ok as i32
    })
}

/// Issue a read-only handle to the region behind `handle`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_shm_dup_read_only(handle: u64, handle_out: *mut u64) -> i32 {
    ffi_guard!({
        if handle_out.is_null() {
            return PicStatus::InvalidArgument as i32;
        }
        let mut table = ffi_lock!(REGIONS);
        let Some(region) = table.get(handle) else {
            return PicStatus::InvalidHandle as i32;
        };
        let read_only = region.read_only();
        let dup = table.insert(read_only);
        tracing::debug!(handle, dup, "shared memory handle duplicated read-only");
        // SAFETY: checked non-null; caller guarantees validity.
        unsafe { *handle_out = dup };
        PicStatus::Ok as i32
    })
}

/// Release a handle. The region is freed once its last handle is gone.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_shm_destroy(handle: u64) -> i32 {
    ffi_guard!({
        let mut table = ffi_lock!(REGIONS);
        match table.remove(handle) {
            Some(_) => {
                tracing::debug!(handle, live = table.len(), "shared memory handle destroyed");
                PicStatus::Ok as i32
            }
            None => PicStatus::InvalidHandle as i32,
        }
    })
}

/// Whether `handle` may mutate its region. Writes 1 or 0 to `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_shm_is_mutable(handle: u64, out: *mut bool) -> i32 {
    ffi_guard!({
        if out.is_null() {
            return PicStatus::InvalidArgument as i32;
        }
        let Some(region) = get_region(handle) else {
            return PicStatus::InvalidHandle as i32;
        };
        // SAFETY: checked non-null; caller guarantees validity.
        unsafe { *out = region.is_mutable() };
        PicStatus::Ok as i32
    })
}

/// Write the address of the region's system nonce block to `store_out`.
///
/// The pointer works with every `pic_nonce_*` accessor and stays valid
/// while any handle to the region is alive. Holders of a read-only
/// handle must not call the mutating accessors on it.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_shm_system_nonce_block(
    handle: u64,
    store_out: *mut *const PicNonceStore,
) -> i32 {
    ffi_guard!({
        if store_out.is_null() {
            return PicStatus::InvalidArgument as i32;
        }
        let Some(region) = get_region(handle) else {
            return PicStatus::InvalidHandle as i32;
        };
        // SAFETY: checked non-null; caller guarantees validity.
        unsafe { *store_out = region.system_nonce_ptr().cast() };
        PicStatus::Ok as i32
    })
}

/// Publish the latest network time (Unix-epoch milliseconds at zero
/// elapsed realtime).
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_shm_set_network_time(handle: u64, millis: i64) -> i32 {
    ffi_guard!({
        let Some(region) = get_region(handle) else {
            return PicStatus::InvalidHandle as i32;
        };
        match region.set_latest_network_time(millis) {
            Ok(()) => PicStatus::Ok as i32,
            Err(e) => PicStatus::from(&e) as i32,
        }
    })
}

/// Read the latest network time into `millis_out`.
///
/// Returns `PIC_STATUS_NETWORK_TIME_UNAVAILABLE` if none was published.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_shm_get_network_time(handle: u64, millis_out: *mut i64) -> i32 {
    ffi_guard!({
        if millis_out.is_null() {
            return PicStatus::InvalidArgument as i32;
        }
        let Some(region) = get_region(handle) else {
            return PicStatus::InvalidHandle as i32;
        };
        match region.latest_network_time() {
            Ok(millis) => {
                // SAFETY: checked non-null; caller guarantees validity.
                unsafe { *millis_out = millis };
                PicStatus::Ok as i32
            }
            Err(e) => PicStatus::from(&e) as i32,
        }
    })
}

/// Publish `len` feature versions from `features`. Write-once.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_shm_write_features(handle: u64, features: *const i32, len: usize) -> i32 {
    ffi_guard!({
        let features: &[i32] = if len == 0 {
            &[]
        } else if features.is_null() {
            return PicStatus::InvalidArgument as i32;
        } else {
            // SAFETY: caller guarantees `features` is valid for `len` reads.
            unsafe { std::slice::from_raw_parts(features, len) }
        };
        let Some(region) = get_region(handle) else {
            return PicStatus::InvalidHandle as i32;
        };
        match region.write_system_features(features) {
            Ok(()) => PicStatus::Ok as i32,
            Err(e) => PicStatus::from(&e) as i32,
        }
    })
}

/// Copy the published feature versions into `out` (capacity `cap`).
///
/// Always writes the published count to `len_out`. Returns
/// `PIC_STATUS_BUFFER_TOO_SMALL` without copying if `cap` is smaller.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn pic_shm_read_features(
    handle: u64,
    out: *mut i32,
    cap: usize,
    len_out: *mut usize,
) -> i32 {
    ffi_guard!({
        if len_out.is_null() {
            return PicStatus::InvalidArgument as i32;
        }
        let Some(region) = get_region(handle) else {
            return PicStatus::InvalidHandle as i32;
        };
        let features = region.read_system_features();
        // SAFETY: checked non-null; caller guarantees validity.
        unsafe { *len_out = features.len() };
        if features.is_empty() {
            return PicStatus::Ok as i32;
        }
        if out.is_null() || cap < features.len() {
            return PicStatus::BufferTooSmall as i32;
        }
        // SAFETY: caller guarantees `out` is valid for `cap` writes.
        let out = unsafe { std::slice::from_raw_parts_mut(out, cap) };
        out[..features.len()].copy_from_slice(&features);
        PicStatus::Ok as i32
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nonce::{pic_nonce_get, pic_nonce_hash, pic_nonce_max_nonce, pic_nonce_set};
    use std::ptr;

    fn create() -> u64 {
        let mut handle = 0;
        assert_eq!(pic_shm_create(&mut handle), PicStatus::Ok as i32);
        handle
    }

    fn dup(handle: u64) -> u64 {
        let mut out = 0;
        assert_eq!(pic_shm_dup_read_only(handle, &mut out), PicStatus::Ok as i32);
        out
    }

    fn block(handle: u64) -> *const PicNonceStore {
        let mut store = ptr::null();
        assert_eq!(
            pic_shm_system_nonce_block(handle, &mut store),
            PicStatus::Ok as i32
        );
        store
    }

    #[test]
    fn create_and_destroy() {
        let h = create();
        assert_eq!(pic_shm_destroy(h), PicStatus::Ok as i32);
        assert_eq!(pic_shm_destroy(h), PicStatus::InvalidHandle as i32);
        assert_eq!(pic_shm_set_network_time(h, 1), PicStatus::InvalidHandle as i32);
    }

    #[test]
    fn null_out_pointers_are_rejected() {
        assert_eq!(
            pic_shm_create(ptr::null_mut()),
            PicStatus::InvalidArgument as i32
        );
        let h = create();
        assert_eq!(
            pic_shm_dup_read_only(h, ptr::null_mut()),
            PicStatus::InvalidArgument as i32
        );
        assert_eq!(
            pic_shm_get_network_time(h, ptr::null_mut()),
            PicStatus::InvalidArgument as i32
        );
        assert_eq!(
            pic_shm_system_nonce_block(h, ptr::null_mut()),
            PicStatus::InvalidArgument as i32
        );
        assert_eq!(
            pic_shm_write_features(h, ptr::null(), 3),
            PicStatus::InvalidArgument as i32
        );
        pic_shm_destroy(h);
    }

    #[test]
    fn read_only_handle_shares_but_cannot_write() {
        let writer = create();
        let reader = dup(writer);
        let mut mutable = true;
        assert_eq!(pic_shm_is_mutable(reader, &mut mutable), PicStatus::Ok as i32);
        assert!(!mutable);

        let mut millis = 0;
        assert_eq!(
            pic_shm_get_network_time(reader, &mut millis),
            PicStatus::NetworkTimeUnavailable as i32
        );
        assert_eq!(pic_shm_set_network_time(writer, 1234), PicStatus::Ok as i32);
        assert_eq!(pic_shm_get_network_time(reader, &mut millis), PicStatus::Ok as i32);
        assert_eq!(millis, 1234);
        assert_eq!(
            pic_shm_set_network_time(reader, 1),
            PicStatus::ReadOnly as i32
        );

        let features = [4, 5, 6];
        assert_eq!(
            pic_shm_write_features(reader, features.as_ptr(), 3),
            PicStatus::ReadOnly as i32
        );
        assert_eq!(
            pic_shm_write_features(writer, features.as_ptr(), 3),
            PicStatus::Ok as i32
        );
        assert_eq!(
            pic_shm_write_features(writer, features.as_ptr(), 3),
            PicStatus::FeaturesAlreadyWritten as i32
        );

        pic_shm_destroy(writer);
        pic_shm_destroy(reader);
    }

    #[test]
    fn region_outlives_its_first_handle() {
        let writer = create();
        let reader = dup(writer);
        let store = block(writer);
        assert!(pic_nonce_set(store, 3, 8));
        pic_shm_destroy(writer);

        assert_eq!(pic_nonce_get(block(reader), 3), 8);
        assert_eq!(pic_nonce_max_nonce(block(reader)), 128);
        assert_eq!(pic_nonce_hash(block(reader)), 0);
        pic_shm_destroy(reader);
    }

    #[test]
    fn features_read_back() {
        let h = create();
        let mut len = 99;
        assert_eq!(
            pic_shm_read_features(h, ptr::null_mut(), 0, &mut len),
            PicStatus::Ok as i32
        );
        assert_eq!(len, 0);

        let features = [10, 20, 30];
        pic_shm_write_features(h, features.as_ptr(), 3);
        let mut small = [0; 2];
        assert_eq!(
            pic_shm_read_features(h, small.as_mut_ptr(), 2, &mut len),
            PicStatus::BufferTooSmall as i32
        );
        assert_eq!(len, 3);
        let mut out = [0; 8];
        assert_eq!(
            pic_shm_read_features(h, out.as_mut_ptr(), 8, &mut len),
            PicStatus::Ok as i32
        );
        assert_eq!(&out[..3], &features);
        pic_shm_destroy(h);
    }

    #[test]
    fn too_many_features() {
        let h = create();
        let features = vec![1; 513];
        assert_eq!(
            pic_shm_write_features(h, features.as_ptr(), features.len()),
            PicStatus::TooManyFeatures as i32
        );
        pic_shm_destroy(h);
    }
}
