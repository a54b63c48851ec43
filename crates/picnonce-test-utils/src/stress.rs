//! One-writer, many-reader stress harness.
//!
//! The writer runs a fixed number of iterations on the calling thread's
//! scope; readers spin until the writer finishes and report what they
//! saw over a channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::unbounded;

/// What a single reader attempt observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The read was accepted; `consistent` says whether the copied bytes
    /// matched the accepted hash.
    Accepted {
        /// Whether the payload verified against its hash.
        consistent: bool,
    },
    /// The read gave up after exhausting its retries.
    Torn,
}

/// Per-reader tallies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReaderReport {
    /// Reader index, `0..readers`.
    pub reader: usize,
    /// Accepted reads that verified.
    pub accepted: u64,
    /// Reads that returned torn.
    pub torn: u64,
    /// Accepted reads whose bytes did not match their hash.
    pub mismatched: u64,
}

/// Run `writer(i)` for `i in 1..=writes` while `readers` threads call
/// `reader(index)` in a loop. Returns one report per reader, ordered by
/// reader index.
///
/// Every reader performs at least one read after the writer finishes.
pub fn run_concurrent<W, R>(readers: usize, writes: u32, mut writer: W, reader: R) -> Vec<ReaderReport>
where
    W: FnMut(u32) + Send,
    R: Fn(usize) -> ReadOutcome + Sync,
{
    let done = AtomicBool::new(false);
    let (tx, rx) = unbounded();

    thread::scope(|s| {
        for index in 0..readers {
            let tx = tx.clone();
            let done = &done;
            let reader = &reader;
            s.spawn(move || {
                let mut report = ReaderReport {
                    reader: index,
                    ..ReaderReport::default()
                };
                loop {
                    let finished = done.load(Ordering::Acquire);
                    match reader(index) {
                        ReadOutcome::Accepted { consistent: true } => report.accepted += 1,
                        ReadOutcome::Accepted { consistent: false } => report.mismatched += 1,
                        ReadOutcome::Torn => report.torn += 1,
                    }
                    if finished {
                        break;
                    }
                }
                let _ = tx.send(report);
            });
        }
        drop(tx);

        s.spawn(|| {
            for i in 1..=writes {
                writer(i);
            }
            done.store(true, Ordering::Release);
        });
    });

    let mut reports: Vec<ReaderReport> = rx.iter().collect();
    reports.sort_by_key(|r| r.reader);
    reports
}
