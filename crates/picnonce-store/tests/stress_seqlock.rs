//! Integration test: concurrent byte-block readers never accept a torn copy.
//!
//! One writer republishes the byte block with a fresh deterministic
//! payload per version while several readers run the full read protocol.
//! Every accepted copy must be exactly the payload of the version it was
//! accepted under.

use std::sync::atomic::{AtomicI64, Ordering};

use picnonce_store::{invalidate, read_byte_block, CacheNonce, NonceSlot, NonceStamp, ReadConfig};
use picnonce_test_utils::{
    fill_payload, payload_for, run_concurrent, verify_payload, ReadOutcome,
};

const LEN: usize = 256;
const INITIAL: i32 = -1;

#[test]
fn accepted_reads_are_never_mixed() {
    let block = CacheNonce::<4, LEN>::boxed();
    let store = block.store();
    store.set_byte_block(INITIAL, &payload_for(INITIAL, LEN));

    let mut payload = vec![0u8; LEN];
    let reports = run_concurrent(
        4,
        2_000,
        |version| {
            let version = version as i32;
            fill_payload(version, &mut payload);
            store.set_byte_block(version, &payload);
        },
        |_| {
            let mut out = [0u8; LEN];
            match read_byte_block(store, &mut out, ReadConfig::new(64)) {
                Ok(read) => ReadOutcome::Accepted {
                    consistent: read.len == LEN && verify_payload(read.hash, &out),
                },
                Err(_) => ReadOutcome::Torn,
            }
        },
    );

    assert_eq!(reports.len(), 4);
    for report in &reports {
        assert_eq!(report.mismatched, 0, "reader {} accepted a torn copy", report.reader);
        assert!(report.accepted >= 1);
    }

    let mut out = [0u8; LEN];
    let read = store.read_byte_block(&mut out).unwrap();
    assert_eq!(read.hash, 2_000);
    assert!(verify_payload(2_000, &out));
}

#[test]
fn short_writes_keep_the_tail() {
    let block = CacheNonce::<1, 16>::boxed();
    block.set_byte_block(1, b"0123456789abcdef");
    block.set_byte_block(2, b"XY");
    let mut out = [0u8; 16];
    assert_eq!(block.store().read_byte_block(&mut out).unwrap().hash, 2);
    assert_eq!(&out, b"XY23456789abcdef");
}

#[test]
fn nonces_never_move_backwards_for_readers() {
    const READERS: usize = 3;
    let block = CacheNonce::<8, 8>::boxed();
    let store = block.store();
    let seen: Vec<AtomicI64> = (0..READERS * 8).map(|_| AtomicI64::new(0)).collect();

    let reports = run_concurrent(
        READERS,
        5_000,
        |i| {
            invalidate(store, NonceSlot((i % 8) as i32));
        },
        |reader| {
            let mut monotonic = true;
            for slot in 0..8 {
                let now = store.get_nonce(slot);
                let last = &seen[reader * 8 + slot as usize];
                if now < last.load(Ordering::Relaxed) {
                    monotonic = false;
                }
                last.store(now, Ordering::Relaxed);
            }
            ReadOutcome::Accepted {
                consistent: monotonic,
            }
        },
    );

    for report in &reports {
        assert_eq!(report.mismatched, 0);
    }
    for slot in 0..8 {
        assert_eq!(store.get_nonce(slot), 625);
    }
}

#[test]
fn stamps_taken_before_invalidation_go_stale_across_threads() {
    let block = CacheNonce::<2, 8>::boxed();
    let store = block.store();
    let slot = NonceSlot(1);
    invalidate(store, slot);
    let stamp = NonceStamp::capture(store, slot);
    assert!(stamp.is_current(store));

    std::thread::scope(|s| {
        s.spawn(|| invalidate(store, slot));
    });

    assert!(!stamp.is_current(store));
    assert_eq!(store.get_nonce(1), 2);
    assert_eq!(NonceStamp::capture(store, NonceSlot(0)).nonce(), 0);
}
