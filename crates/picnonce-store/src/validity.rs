//! Nonce-based validity checks for cached results.
//!
//! A consumer captures the nonce of the slot guarding its cache when it
//! stores a result. On lookup it compares the captured value with the
//! slot's current value: any difference means the result is stale.
//!
//! Per slot the nonce moves `0 -> n -> n' -> ...`, bumped by the single
//! writer on each invalidation. Slots are independent; there is no
//! ordering between them.

use picnonce_core::{NonceSlot, UNSET_NONCE};

use crate::descriptor::NonceStoreRef;

/// The nonce observed for one slot at the moment a result was cached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct NonceStamp {
    slot: NonceSlot,
    nonce: i64,
}

impl NonceStamp {
    /// Record the current nonce of `slot`.
    ///
    /// An out-of-range slot captures [`UNSET_NONCE`], which is never
    /// current.
    pub fn capture(store: NonceStoreRef<'_>, slot: NonceSlot) -> Self {
        Self {
            slot,
            nonce: store.get_nonce(slot.index()),
        }
    }

    /// The slot this stamp guards.
    pub fn slot(&self) -> NonceSlot {
        self.slot
    }

    /// The captured nonce.
    pub fn nonce(&self) -> i64 {
        self.nonce
    }

    /// Whether a result cached under this stamp may still be served.
    ///
    /// False if the slot has been invalidated since capture, and always
    /// false for a stamp taken while the slot was unset: an unset slot
    /// has no writer behind it to report invalidations.
    #[inline]
    pub fn is_current(&self, store: NonceStoreRef<'_>) -> bool {
        self.nonce != UNSET_NONCE && store.get_nonce(self.slot.index()) == self.nonce
    }
}

/// Writer-side invalidation: advance the nonce of `slot`.
///
/// The next value is the current value plus one, skipping
/// [`UNSET_NONCE`] on wraparound. Returns the new nonce, or `None` if the
/// slot is out of range. Must only be called by the block's single writer.
pub fn invalidate(store: NonceStoreRef<'_>, slot: NonceSlot) -> Option<i64> {
    if !slot.in_range(store.max_nonce()) {
        return None;
    }
    let next = match store.get_nonce(slot.index()).wrapping_add(1) {
        UNSET_NONCE => UNSET_NONCE + 1,
        n => n,
    };
    store.set_nonce(slot.index(), next).then_some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheNonce;

    #[test]
    fn stamp_goes_stale_on_invalidate() {
        let block = CacheNonce::<4, 8>::boxed();
        let store = block.store();
        let slot = NonceSlot(1);
        assert_eq!(invalidate(store, slot), Some(1));

        let stamp = NonceStamp::capture(store, slot);
        assert_eq!(stamp.nonce(), 1);
        assert!(stamp.is_current(store));

        assert_eq!(invalidate(store, slot), Some(2));
        assert!(!stamp.is_current(store));
        assert!(NonceStamp::capture(store, slot).is_current(store));
    }

    #[test]
    fn unset_slot_is_never_current() {
        let block = CacheNonce::<4, 8>::boxed();
        let store = block.store();
        let stamp = NonceStamp::capture(store, NonceSlot(0));
        assert_eq!(stamp.nonce(), UNSET_NONCE);
        assert!(!stamp.is_current(store));
    }

    #[test]
    fn other_slots_are_independent() {
        let block = CacheNonce::<4, 8>::boxed();
        let store = block.store();
        invalidate(store, NonceSlot(0));
        invalidate(store, NonceSlot(3));
        let stamp0 = NonceStamp::capture(store, NonceSlot(0));
        invalidate(store, NonceSlot(3));
        assert!(stamp0.is_current(store));
    }

    #[test]
    fn out_of_range_invalidate_is_refused() {
        let block = CacheNonce::<4, 8>::boxed();
        let store = block.store();
        assert_eq!(invalidate(store, NonceSlot(4)), None);
        assert_eq!(invalidate(store, NonceSlot(-1)), None);
        let stamp = NonceStamp::capture(store, NonceSlot(9));
        assert!(!stamp.is_current(store));
    }

    #[test]
    fn wraparound_skips_unset() {
        let block = CacheNonce::<1, 8>::boxed();
        let store = block.store();
        store.set_nonce(0, -1);
        assert_eq!(invalidate(store, NonceSlot(0)), Some(1));
        store.set_nonce(0, i64::MAX);
        assert_eq!(invalidate(store, NonceSlot(0)), Some(i64::MIN));
    }
}
