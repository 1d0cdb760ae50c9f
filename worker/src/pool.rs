//! The cracking pool: a fixed set of blocking threads striding through
//! one chunk of the candidate space.
//!
//! Thread `i` of `T` visits `start+i, start+i+T, start+i+2T, …`, so the
//! threads cover the chunk without coordination, progress is uniform
//! across the chunk and every thread observes a cancellation within one
//! hash probe.  Shared state is a handful of atomics plus one
//! mutex-guarded buffer for the found cleartext.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use gridcrack_core::candidates::{self, PW_MAX_LEN};
use gridcrack_core::crypt;
use gridcrack_core::messages::{Algorithm, ChunkAssign, CrackJob, HeartbeatResponse};
use log::trace;
use parking_lot::Mutex;

/// Counters and flags shared between the cracking threads, the reader
/// task and the main task.
pub struct Counters {
    found: AtomicBool,
    stop_requested: AtomicBool,
    tested: AtomicU64,
    last_reported: AtomicU64,
    threads_active: AtomicU32,
    password: Mutex<String>,
    job_ack: Instant,
}

impl Counters {
    /// Create the shared state; call once, right after the job arrived.
    pub fn new() -> Self {
        Self {
            found: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            tested: AtomicU64::new(0),
            last_reported: AtomicU64::new(0),
            threads_active: AtomicU32::new(0),
            password: Mutex::new(String::new()),
            job_ack: Instant::now(),
        }
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Relaxed);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Relaxed)
    }

    pub fn found(&self) -> bool {
        self.found.load(Ordering::Acquire)
    }

    /// First writer wins; later callers see `false` and their candidate
    /// is discarded.
    fn mark_found(&self, password: &str) -> bool {
        if self
            .found
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            *self.password.lock() = password.to_owned();
            return true;
        }
        false
    }

    /// The found cleartext; empty unless [`Counters::found`] is true.
    pub fn password(&self) -> String {
        self.password.lock().clone()
    }

    pub fn total_tested(&self) -> u64 {
        self.tested.load(Ordering::Relaxed)
    }

    /// Milliseconds since job acknowledgment.
    pub fn crack_time_ms(&self) -> f64 {
        self.job_ack.elapsed().as_secs_f64() * 1000.0
    }

    /// Produce one heartbeat sample and advance the delta bookmark.
    ///
    /// Only the reader task calls this, so the exchange on
    /// `last_reported` makes the reported deltas sum exactly to the
    /// total at the time of the last sample.
    pub fn heartbeat_sample(&self) -> HeartbeatResponse {
        let total = self.tested.load(Ordering::Relaxed);
        let last = self.last_reported.swap(total, Ordering::Relaxed);
        let elapsed = self.job_ack.elapsed().as_secs_f64();
        HeartbeatResponse {
            delta_tested: total - last,
            total_tested: total,
            threads_active: self.threads_active.load(Ordering::Relaxed),
            current_rate: if elapsed > 0.0 { total as f64 / elapsed } else { 0.0 },
        }
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one chunk.
#[derive(Debug)]
pub struct ChunkOutcome {
    pub found: bool,
    pub elapsed: Duration,
}

/// Crack `[chunk.start_idx, chunk.start_idx + chunk.count)` with
/// `threads` parallel threads, returning once every thread joined.
pub async fn crack_chunk(
    job: &CrackJob,
    salt_template: &str,
    chunk: ChunkAssign,
    threads: usize,
    counters: Arc<Counters>,
) -> Result<ChunkOutcome> {
    let started = Instant::now();
    let threads = threads.max(1);

    let mut handles = Vec::with_capacity(threads);
    for thread_idx in 0..threads {
        let counters = Arc::clone(&counters);
        let template = salt_template.to_owned();
        let target = job.target_hash.clone();
        let algorithm = job.algorithm;
        handles.push(tokio::task::spawn_blocking(move || {
            crack_stride(
                algorithm,
                &template,
                &target,
                chunk,
                thread_idx as u64,
                threads as u64,
                &counters,
            );
        }));
    }
    for handle in handles {
        handle.await.context("cracking thread panicked")?;
    }

    Ok(ChunkOutcome {
        found: counters.found(),
        elapsed: started.elapsed(),
    })
}

fn crack_stride(
    algorithm: Algorithm,
    salt_template: &str,
    target_hash: &str,
    chunk: ChunkAssign,
    thread_idx: u64,
    stride: u64,
    counters: &Counters,
) {
    counters.threads_active.fetch_add(1, Ordering::Relaxed);

    let end = chunk.start_idx + chunk.count;
    let mut buf = [0u8; PW_MAX_LEN];
    let mut idx = chunk.start_idx + thread_idx;

    while idx < end {
        if counters.found() || counters.stop_requested() {
            break;
        }

        let Some(len) = candidates::password_at(idx, &mut buf) else {
            break;
        };
        let Ok(password) = std::str::from_utf8(&buf[..len]) else {
            idx += stride;
            continue;
        };

        match crypt::crypt(password, salt_template) {
            Ok(hash) => {
                if let Some(digest) = crypt::digest_suffix(&hash, algorithm) {
                    if digest == target_hash {
                        counters.mark_found(password);
                    }
                }
                counters.tested.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                // Skip the candidate; a flaky primitive must not kill the chunk.
                trace!("hash primitive failed at index {idx}: {e}");
            }
        }

        idx += stride;
    }

    counters.threads_active.fetch_sub(1, Ordering::Relaxed);
}
