//! Placing blocks into, and attaching to, raw mapped regions.
//!
//! The creation transport hands each process a base pointer and a
//! length. The owning process calls [`place`] once to construct the
//! block; every other process calls [`attach`] to get a view, without
//! knowing `N` or `M` at compile time. Both validate the region before
//! touching it.

#![allow(unsafe_code)]

use std::ptr::NonNull;

use picnonce_core::config::{BLOCK_ALIGN, HEADER_BYTES};
use picnonce_core::LayoutError;

use crate::block::CacheNonce;
use crate::descriptor::{NonceStore, NonceStoreRef};

/// Validate a region's base pointer and length.
fn check_region(ptr: *const u8, len: usize, required: usize) -> Result<NonNull<u8>, LayoutError> {
    let base = NonNull::new(ptr.cast_mut()).ok_or(LayoutError::NullRegion)?;
    let addr = ptr as usize;
    if addr % BLOCK_ALIGN != 0 {
        return Err(LayoutError::Misaligned {
            addr,
            align: BLOCK_ALIGN,
        });
    }
    if len < required {
        return Err(LayoutError::RegionTooSmall {
            required,
            actual: len,
        });
    }
    Ok(base)
}

/// Construct a zeroed `CacheNonce<N, M>` at the start of a region.
///
/// # Safety
///
/// `ptr` must be valid for reads and writes of `len` bytes for `'a`, and
/// no other thread or process may access the first
/// `CacheNonce::<N, M>::SIZE` bytes until this returns.
pub unsafe fn place<'a, const N: usize, const M: usize>(
    ptr: *mut u8,
    len: usize,
) -> Result<&'a CacheNonce<N, M>, LayoutError> {
    let base = check_region(ptr, len, CacheNonce::<N, M>::SIZE)?;
    // SAFETY: the region is non-null, aligned, and large enough; the
    // caller guarantees exclusive access during construction.
    let block = unsafe { CacheNonce::<N, M>::init_in_place(base.as_ptr().cast()) };
    tracing::debug!(
        addr = base.as_ptr() as usize,
        max_nonce = N,
        max_byte = M,
        "placed nonce block"
    );
    Ok(block)
}

/// Attach to a block previously placed at the start of a region.
///
/// Reads the header, checks that its offsets and capacities describe
/// arrays inside the region, and returns a view. The block may have been
/// placed by another process at a different virtual address.
///
/// # Safety
///
/// `ptr` must be valid for reads of `len` bytes for `'a` (and for writes
/// too, if the view is used to mutate). The header must have been
/// initialised before this call in a way that happens-before it, which
/// the transport that shared the region provides.
pub unsafe fn attach<'a>(ptr: *const u8, len: usize) -> Result<NonceStoreRef<'a>, LayoutError> {
    let base = check_region(ptr, len, HEADER_BYTES)?;
    let header = base.cast::<NonceStore>();
    // SAFETY: the first 24 bytes are readable, aligned, and initialised.
    let config = unsafe { header.as_ref() }.check(len)?;
    tracing::debug!(
        addr = ptr as usize,
        max_nonce = config.max_nonce,
        max_byte = config.max_byte,
        "attached to nonce block"
    );
    // SAFETY: `check` proved both arrays lie inside the region, and the
    // pointer came from the caller's region pointer, so it carries
    // provenance over all of it.
    Ok(unsafe { NonceStoreRef::from_raw(header) })
}

impl<'a> NonceStoreRef<'a> {
    /// Attach to a block at the start of a mapped region.
    ///
    /// See [`attach`].
    ///
    /// # Safety
    ///
    /// As for [`attach`].
    pub unsafe fn attach(ptr: *const u8, len: usize) -> Result<Self, LayoutError> {
        // SAFETY: forwarded to the caller.
        unsafe { attach(ptr, len) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 8-aligned scratch memory.
    fn region(words: usize) -> Vec<u64> {
        vec![0u64; words]
    }

    #[test]
    fn place_then_attach() {
        let mut mem = region(16);
        let len = mem.len() * 8;
        let ptr = mem.as_mut_ptr().cast::<u8>();
        let block = unsafe { place::<4, 8>(ptr, len) }.unwrap();
        block.set_nonce(3, 77);
        block.set_byte_block(5, b"payload!");

        let view = unsafe { attach(ptr, len) }.unwrap();
        assert_eq!(view.max_nonce(), 4);
        assert_eq!(view.max_byte(), 8);
        assert_eq!(view.get_nonce(3), 77);
        let mut out = [0u8; 8];
        assert_eq!(view.read_byte_block(&mut out).unwrap().hash, 5);
        assert_eq!(&out, b"payload!");
    }

    #[test]
    fn place_rejects_bad_regions() {
        let mut mem = region(16);
        let ptr = mem.as_mut_ptr().cast::<u8>();
        assert_eq!(
            unsafe { place::<4, 8>(std::ptr::null_mut(), 128) }.err(),
            Some(LayoutError::NullRegion)
        );
        assert_eq!(
            unsafe { place::<4, 8>(ptr.wrapping_add(4), 120) }.err(),
            Some(LayoutError::Misaligned {
                addr: ptr as usize + 4,
                align: 8
            })
        );
        assert_eq!(
            unsafe { place::<4, 8>(ptr, 63) }.err(),
            Some(LayoutError::RegionTooSmall {
                required: 64,
                actual: 63
            })
        );
    }

    #[test]
    fn attach_rejects_garbage_header() {
        let mut mem = region(8);
        mem[0] = u64::MAX;
        let ptr = mem.as_ptr().cast::<u8>();
        assert!(matches!(
            unsafe { attach(ptr, 64) },
            Err(LayoutError::CorruptHeader { .. })
        ));
    }

    #[test]
    fn attach_rejects_truncated_region() {
        let mut mem = region(16);
        let ptr = mem.as_mut_ptr().cast::<u8>();
        unsafe { place::<4, 8>(ptr, 128) }.unwrap();
        assert_eq!(
            unsafe { attach(ptr, 40) }.err(),
            Some(LayoutError::RegionTooSmall {
                required: 64,
                actual: 40
            })
        );
    }
}
