//! The dispatch state machine: a monotonic cursor over the candidate
//! space plus the first-found-result latch.
//!
//! All of it sits behind one mutex on the server side; the lock
//! acquisition order is the total order of chunk grants, which is what
//! keeps grants pairwise disjoint and strictly increasing.

use gridcrack_core::candidates::TOTAL_CANDIDATES;
use gridcrack_core::messages::{ChunkAssign, CrackResult};

/// Answer to a chunk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// Work: a slice of the candidate space, disjoint from every
    /// previous grant.
    Chunk(ChunkAssign),
    /// No further work — the password was found or the space is
    /// exhausted.  Terminal and idempotent.
    Stop,
}

pub struct DispatchState {
    next_chunk_start: u64,
    chunk_size: u64,
    result: Option<CrackResult>,
}

impl DispatchState {
    pub fn new(chunk_size: u64) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        Self {
            next_chunk_start: 0,
            chunk_size,
            result: None,
        }
    }

    /// Serve one chunk request.
    ///
    /// Once the latch is set or the cursor hits the end of the space,
    /// every call returns [`Grant::Stop`] forever.
    pub fn grant(&mut self) -> Grant {
        if self.result.is_some() || self.next_chunk_start == TOTAL_CANDIDATES {
            return Grant::Stop;
        }
        let count = self.chunk_size.min(TOTAL_CANDIDATES - self.next_chunk_start);
        let chunk = ChunkAssign {
            start_idx: self.next_chunk_start,
            count,
        };
        self.next_chunk_start += count;
        Grant::Chunk(chunk)
    }

    /// Latch a found result.  Returns `true` only for the first found
    /// result of the run; not-found results and late duplicates are
    /// ignored.
    pub fn latch(&mut self, result: CrackResult) -> bool {
        if !result.found || self.result.is_some() {
            return false;
        }
        self.result = Some(result);
        true
    }

    pub fn found(&self) -> bool {
        self.result.is_some()
    }

    pub fn result(&self) -> Option<&CrackResult> {
        self.result.as_ref()
    }

    /// Frontier of unassigned indices; equals the total count of
    /// candidates ever granted.
    pub fn cursor(&self) -> u64 {
        self.next_chunk_start
    }
}
