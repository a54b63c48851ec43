//! Concrete, size-parameterised nonce blocks.
//!
//! A [`CacheNonce<N, M>`] places a [`NonceStore`] header, `N` atomic
//! 64-bit nonces and `M` bytes contiguously in one allocation, with no
//! padding anywhere: `size_of == 24 + 8 * N + M`. The compile-time check
//! [`CacheNonce::LAYOUT`] rejects parameters that would break that
//! equality (including an `M` that is not a multiple of 8).
//!
//! Blocks embedded in a Rust-owned struct are built by value with
//! [`CacheNonce::new`]. Blocks living in a region the writer did not
//! allocate through Rust are initialised in place with
//! [`CacheNonce::init_in_place`] or [`region::place`](crate::region::place).

use std::mem::{offset_of, MaybeUninit};
use std::ptr::{addr_of_mut, NonNull};
use std::sync::atomic::{AtomicI64, AtomicU8};

use picnonce_core::config::{BlockConfig, BLOCK_ALIGN, HEADER_BYTES, NONCE_BYTES};

use crate::descriptor::{NonceStore, NonceStoreRef};

/// A nonce block holding `N` nonces and `M` bytes.
///
/// All nonces, the byte-block hash and every byte start at zero. The
/// block is `Sync`: all mutable state is atomic.
#[repr(C, align(8))]
pub struct CacheNonce<const N: usize, const M: usize> {
    header: NonceStore,
    nonces: [AtomicI64; N],
    bytes: [AtomicU8; M],
}

/// The block used by the system server: 128 nonces, 8 KiB of bytes.
pub type SystemCacheNonce = CacheNonce<128, 8192>;

const _: () = assert!(
    std::mem::size_of::<SystemCacheNonce>()
        == HEADER_BYTES
            + SystemCacheNonce::MAX_NONCE_COUNT as usize * NONCE_BYTES
            + SystemCacheNonce::MAX_BYTE_COUNT as usize
);

impl<const N: usize, const M: usize> CacheNonce<N, M> {
    /// Number of nonce slots, as stored in the header.
    pub const MAX_NONCE_COUNT: i32 = N as i32;

    /// Number of bytes in the byte block, as stored in the header.
    pub const MAX_BYTE_COUNT: i32 = M as i32;

    /// The sizing as a run-time config.
    pub const CONFIG: BlockConfig = BlockConfig::new(N as i32, M as i32);

    /// Compile-time layout check, evaluated when a block type is first
    /// constructed. Fails the build for parameters that would introduce
    /// padding or overflow the `i32` header fields.
    pub const LAYOUT: () = {
        assert!(N > 0, "a nonce block needs at least one nonce");
        assert!(M > 0, "a nonce block needs at least one byte");
        assert!(M % BLOCK_ALIGN == 0, "byte count must be a multiple of 8");
        assert!(
            HEADER_BYTES + N * NONCE_BYTES + M <= i32::MAX as usize,
            "block does not fit i32 offsets"
        );
        assert!(std::mem::size_of::<Self>() == HEADER_BYTES + N * NONCE_BYTES + M);
    };

    /// Total size of this block type in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// A zeroed block, by value.
    ///
    /// The header offsets are the arrays' positions within the block,
    /// which is where the header finds them once the block is placed at
    /// any address.
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::LAYOUT;
        Self {
            header: NonceStore::new(
                N as i32,
                M as i32,
                offset_of!(Self, nonces) as i32,
                offset_of!(Self, bytes) as i32,
            ),
            nonces: [const { AtomicI64::new(0) }; N],
            bytes: [const { AtomicU8::new(0) }; M],
        }
    }

    /// Construct and zero a block at `ptr`, computing the array offsets
    /// from the addresses the arrays actually occupy.
    ///
    /// # Safety
    ///
    /// `ptr` must be non-null, aligned to 8, valid for writes of
    /// [`Self::SIZE`] bytes, and not concurrently accessed by anyone else
    /// until this returns. The returned reference must not outlive the
    /// memory.
    #[allow(unsafe_code)]
    pub unsafe fn init_in_place<'a>(ptr: *mut Self) -> &'a Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::LAYOUT;

        // SAFETY: caller guarantees `ptr` is valid for writes of the
        // whole block. All-zero bytes are a valid `[AtomicI64; N]` and
        // `[AtomicU8; M]`.
        unsafe {
            let nonces = addr_of_mut!((*ptr).nonces);
            let bytes = addr_of_mut!((*ptr).bytes);
            nonces.write_bytes(0, 1);
            bytes.write_bytes(0, 1);

            let header = NonceStore::new(
                N as i32,
                M as i32,
                offset_from_base(ptr, nonces),
                offset_from_base(ptr, bytes),
            );
            addr_of_mut!((*ptr).header).write(header);
            &*ptr
        }
    }

    /// Allocate a zeroed block on the heap.
    ///
    /// Mostly useful for the owning process before it copies or maps the
    /// block elsewhere, and for tests.
    #[allow(unsafe_code)]
    pub fn boxed() -> Box<Self> {
        let mut slot: Box<MaybeUninit<Self>> = Box::new_uninit();
        // SAFETY: a fresh Box allocation is valid, aligned, and unshared.
        unsafe {
            Self::init_in_place(slot.as_mut_ptr());
            slot.assume_init()
        }
    }

    /// The typed view over this block.
    #[allow(unsafe_code)]
    pub fn store(&self) -> NonceStoreRef<'_> {
        // SAFETY: the pointer is derived from `&self`, so it carries
        // provenance over the header and both arrays, which
        // `init_in_place` described with in-bounds offsets.
        unsafe { NonceStoreRef::from_raw(NonNull::from(self).cast()) }
    }

    /// The block header.
    pub fn header(&self) -> &NonceStore {
        &self.header
    }

    /// See [`NonceStoreRef::max_nonce`].
    pub fn max_nonce(&self) -> i32 {
        self.header.max_nonce()
    }

    /// See [`NonceStoreRef::max_byte`].
    pub fn max_byte(&self) -> i32 {
        self.header.max_byte()
    }

    /// See [`NonceStoreRef::get_nonce`].
    pub fn get_nonce(&self, index: i32) -> i64 {
        self.store().get_nonce(index)
    }

    /// See [`NonceStoreRef::set_nonce`].
    pub fn set_nonce(&self, index: i32, value: i64) -> bool {
        self.store().set_nonce(index, value)
    }

    /// See [`NonceStoreRef::get_hash`].
    pub fn get_hash(&self) -> i32 {
        self.store().get_hash()
    }

    /// See [`NonceStoreRef::get_byte_block`].
    pub fn get_byte_block(&self, out: &mut [u8]) -> i32 {
        self.store().get_byte_block(out)
    }

    /// See [`NonceStoreRef::set_byte_block`].
    pub fn set_byte_block(&self, hash: i32, data: &[u8]) {
        self.store().set_byte_block(hash, data)
    }

    /// Copy the whole block into a byte image, e.g. to move it into a
    /// mapping at another address.
    ///
    /// Every field is read with its own atomic load, so the image is safe
    /// to take while writers run, but is only consistent per field.
    pub fn to_bytes(&self) -> Vec<u8> {
        let store = self.store();
        let header = &self.header;
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&header.max_nonce().to_ne_bytes());
        out.extend_from_slice(&header.max_byte().to_ne_bytes());
        out.extend_from_slice(&header.nonce_offset().to_ne_bytes());
        out.extend_from_slice(&header.byte_offset().to_ne_bytes());
        out.extend_from_slice(&store.get_hash().to_ne_bytes());
        out.extend_from_slice(&store.begin_read().to_ne_bytes());
        for index in 0..N as i32 {
            out.extend_from_slice(&store.get_nonce(index).to_ne_bytes());
        }
        let start = out.len();
        out.resize(start + M, 0);
        store.get_byte_block(&mut out[start..]);
        out
    }
}

impl<const N: usize, const M: usize> Default for CacheNonce<N, M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte distance from `base` to `member`, as stored in the header.
fn offset_from_base<B, T>(base: *const B, member: *const T) -> i32 {
    (member as usize - base as usize) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use picnonce_core::{UNSET_HASH, UNSET_NONCE};

    #[test]
    fn size_has_no_hidden_padding() {
        assert_eq!(CacheNonce::<4, 8>::SIZE, 24 + 4 * 8 + 8);
        assert_eq!(CacheNonce::<1, 8>::SIZE, 24 + 8 + 8);
        assert_eq!(CacheNonce::<3, 24>::SIZE, 24 + 3 * 8 + 24);
        assert_eq!(SystemCacheNonce::SIZE, 24 + 128 * 8 + 8192);
        assert_eq!(std::mem::align_of::<SystemCacheNonce>(), 8);
    }

    #[test]
    fn offsets_match_field_positions() {
        let block = CacheNonce::<4, 8>::boxed();
        let header = block.header();
        assert_eq!(
            header.nonce_offset() as usize,
            std::mem::offset_of!(CacheNonce<4, 8>, nonces)
        );
        assert_eq!(
            header.byte_offset() as usize,
            std::mem::offset_of!(CacheNonce<4, 8>, bytes)
        );
        assert_eq!(header.nonce_offset(), 24);
        assert_eq!(header.byte_offset(), 56);
    }

    #[test]
    fn by_value_matches_in_place() {
        let by_value = CacheNonce::<4, 16>::new();
        let in_place = CacheNonce::<4, 16>::boxed();
        assert_eq!(by_value.to_bytes(), in_place.to_bytes());
        by_value.set_nonce(3, 5);
        assert_eq!(by_value.store().get_nonce(3), 5);
    }

    #[test]
    fn fresh_block_is_all_zero() {
        let block = SystemCacheNonce::boxed();
        assert_eq!(block.max_nonce(), 128);
        assert_eq!(block.max_byte(), 8192);
        for i in 0..128 {
            assert_eq!(block.get_nonce(i), UNSET_NONCE);
        }
        assert_eq!(block.get_hash(), UNSET_HASH);
        let mut out = vec![0xaau8; 8192];
        block.get_byte_block(&mut out);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn to_bytes_images_header_and_arrays() {
        let block = CacheNonce::<2, 16>::boxed();
        block.set_nonce(1, 0x0102_0304);
        block.set_byte_block(7, b"hi");
        let raw = block.to_bytes();
        assert_eq!(raw.len(), 24 + 16 + 16);
        assert_eq!(i32::from_ne_bytes(raw[0..4].try_into().unwrap()), 2);
        assert_eq!(i32::from_ne_bytes(raw[4..8].try_into().unwrap()), 16);
        assert_eq!(i32::from_ne_bytes(raw[8..12].try_into().unwrap()), 24);
        assert_eq!(i32::from_ne_bytes(raw[12..16].try_into().unwrap()), 40);
        assert_eq!(i32::from_ne_bytes(raw[16..20].try_into().unwrap()), 7);
        assert_eq!(u32::from_ne_bytes(raw[20..24].try_into().unwrap()), 2);
        assert_eq!(i64::from_ne_bytes(raw[24..32].try_into().unwrap()), 0);
        assert_eq!(
            i64::from_ne_bytes(raw[32..40].try_into().unwrap()),
            0x0102_0304
        );
        assert_eq!(&raw[40..42], b"hi");
        assert!(raw[42..].iter().all(|&b| b == 0));
    }

    #[test]
    fn small_block_set_get_publish() {
        let block = CacheNonce::<4, 8>::boxed();
        assert!(block.set_nonce(2, 99));
        assert_eq!(block.get_nonce(2), 99);
        assert_eq!(block.get_nonce(5), 0);
        block.set_byte_block(1, b"ABCDEFGH");
        assert_eq!(block.get_hash(), 1);
        let mut out = [0u8; 8];
        assert_eq!(block.get_byte_block(&mut out), 1);
        assert_eq!(&out, b"ABCDEFGH");
    }

    #[test]
    fn out_of_range_set_touches_nothing() {
        let block = CacheNonce::<4, 8>::boxed();
        for i in 0..4 {
            block.set_nonce(i, 10 + i as i64);
        }
        assert!(!block.set_nonce(4, 123));
        assert!(!block.set_nonce(1000, 123));
        for i in 0..4 {
            assert_eq!(block.get_nonce(i), 10 + i as i64);
        }
    }

    #[test]
    fn block_is_send_and_sync() {
        fn assert<T: Send + Sync>() {}
        assert::<SystemCacheNonce>();
        assert::<NonceStoreRef<'static>>();
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn set_then_get_in_range(index in 0i32..16, value in any::<i64>()) {
                let block = CacheNonce::<16, 8>::boxed();
                prop_assert!(block.set_nonce(index, value));
                prop_assert_eq!(block.get_nonce(index), value);
            }

            #[test]
            fn out_of_range_is_sentinel(
                index in prop_oneof![i32::MIN..0i32, 16i32..i32::MAX],
                value in any::<i64>(),
            ) {
                let block = CacheNonce::<16, 8>::boxed();
                for i in 0..16 {
                    block.set_nonce(i, i as i64 + 1);
                }
                prop_assert_eq!(block.get_nonce(index), UNSET_NONCE);
                prop_assert!(!block.set_nonce(index, value));
                for i in 0..16 {
                    prop_assert_eq!(block.get_nonce(i), i as i64 + 1);
                }
            }

            #[test]
            fn byte_block_round_trip(
                hash in any::<i32>(),
                data in proptest::collection::vec(any::<u8>(), 0..=64),
            ) {
                let block = CacheNonce::<1, 64>::boxed();
                block.set_byte_block(hash, &data);
                let mut out = vec![0u8; data.len()];
                prop_assert_eq!(block.get_byte_block(&mut out), hash);
                prop_assert_eq!(block.get_hash(), hash);
                prop_assert_eq!(out, data);
            }
        }
    }
}
