// ── Transaction ids ──
//
// Every streaming command carries a `tid` in 1..=99. The service echoes it
// back but responses are matched positionally, so ids only need to cycle.

use std::sync::atomic::{AtomicU32, Ordering};

const MIN_TID: u32 = 1;
const MAX_TID: u32 = 99;

/// Lock-free cycling transaction id source.
///
/// Starts at 1 and advances before returning, so the first id handed out
/// is 2. After 99 the sequence wraps to 1; 0 is never produced.
#[derive(Debug)]
pub struct TransactionCounter {
    current: AtomicU32,
}

impl Default for TransactionCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionCounter {
    pub fn new() -> Self {
        Self {
            current: AtomicU32::new(MIN_TID),
        }
    }

    /// Advance and return the next id.
    pub fn next(&self) -> u32 {
        let advance = |tid: u32| if tid >= MAX_TID { MIN_TID } else { tid + 1 };
        // The closure never returns `None`, so `fetch_update` always succeeds.
        match self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |tid| Some(advance(tid)))
        {
            Ok(previous) | Err(previous) => advance(previous),
        }
    }
}
