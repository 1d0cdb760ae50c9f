//! The controller's TCP server: accepts workers, promotes them through
//! registration, serves chunk requests, fans out heartbeat requests and
//! broadcasts stop once a result is latched.
//!
//! One task per connection; all dispatch state sits behind a single
//! mutex in [`crate::dispatch`], so chunk grants are totally ordered by
//! lock acquisition no matter how many workers are pulling.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use gridcrack_core::messages::{CrackJob, CrackResult};
use gridcrack_core::wire::{self, Frame, WireError};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::time::interval;

use crate::dispatch::{DispatchState, Grant};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port; 0 binds an ephemeral port.
    pub port: u16,
    pub heartbeat_interval: Duration,
    /// Candidates per chunk grant.
    pub chunk_size: u64,
}

/// What a finished run looked like, for the summary panel and the exit
/// code.
#[derive(Debug)]
pub struct RunSummary {
    /// The winning result; `None` when the space was exhausted or every
    /// worker disconnected first.
    pub result: Option<CrackResult>,
    pub workers_seen: usize,
    pub heartbeats_sent: u64,
    pub heartbeats_received: u64,
    pub chunks_assigned: u64,
    /// Final cursor position: total candidates ever granted.
    pub candidates_dispatched: u64,
    /// Wall time of the first job send after a registration.
    pub dispatch_latency: Option<Duration>,
    /// Wall time of the stop broadcast after the winning result.
    pub stop_broadcast: Option<Duration>,
}

struct SlotHandle {
    writer: Arc<AsyncMutex<OwnedWriteHalf>>,
}

struct Shared {
    job: CrackJob,
    dispatch: Mutex<DispatchState>,
    /// Registered slots only; a slot enters after its job send and
    /// leaves when its connection task finishes.
    slots: Mutex<HashMap<u64, SlotHandle>>,
    workers_seen: AtomicUsize,
    active: AtomicUsize,
    heartbeats_sent: AtomicU64,
    heartbeats_received: AtomicU64,
    chunks_assigned: AtomicU64,
    first_job_latency: Mutex<Option<Duration>>,
    stop_broadcast: Mutex<Option<Duration>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Shared {
    fn signal_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Send `MSG_STOP` to every registered slot except the winner.
    async fn broadcast_stop(&self, except: u64) {
        let started = Instant::now();
        let slots: Vec<(u64, Arc<AsyncMutex<OwnedWriteHalf>>)> = self
            .slots
            .lock()
            .iter()
            .filter(|(id, _)| **id != except)
            .map(|(id, slot)| (*id, slot.writer.clone()))
            .collect();

        let mut stopped = 0usize;
        for (slot_id, writer) in slots {
            let mut w = writer.lock().await;
            match wire::write_frame(&mut *w, &Frame::Stop).await {
                Ok(()) => stopped += 1,
                Err(e) => debug!("stop to worker #{slot_id} failed: {e}"),
            }
        }
        info!("broadcast stop to {stopped} workers");
        *self.stop_broadcast.lock() = Some(started.elapsed());
    }
}

pub struct Server {
    listener: TcpListener,
    shared: Arc<Shared>,
    heartbeat_interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    pub async fn bind(config: ServerConfig, job: CrackJob) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", config.port))
            .await
            .with_context(|| format!("cannot bind port {}", config.port))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            job,
            dispatch: Mutex::new(DispatchState::new(config.chunk_size)),
            slots: Mutex::new(HashMap::new()),
            workers_seen: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            heartbeats_sent: AtomicU64::new(0),
            heartbeats_received: AtomicU64::new(0),
            chunks_assigned: AtomicU64::new(0),
            first_job_latency: Mutex::new(None),
            stop_broadcast: Mutex::new(None),
            shutdown_tx,
        });

        Ok(Self {
            listener,
            shared,
            heartbeat_interval: config.heartbeat_interval,
            shutdown_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("listener has no local address")
    }

    /// Accept and serve workers until the run terminates: result found
    /// and stops broadcast, every attached worker gone, or a fatal
    /// accept error.
    pub async fn run(self) -> Result<RunSummary> {
        let Server {
            listener,
            shared,
            heartbeat_interval,
            mut shutdown_rx,
        } = self;

        if let Ok(addr) = listener.local_addr() {
            info!("listening on {addr}, waiting for workers");
        }

        let heartbeat_task = tokio::spawn(heartbeat_loop(
            shared.clone(),
            heartbeat_interval,
            shutdown_rx.clone(),
        ));

        let mut next_slot_id: u64 = 1;
        let mut fatal: Option<anyhow::Error> = None;
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let slot_id = next_slot_id;
                        next_slot_id += 1;
                        shared.workers_seen.fetch_add(1, Ordering::Relaxed);
                        shared.active.fetch_add(1, Ordering::AcqRel);
                        info!("connection #{slot_id} accepted from {addr}");
                        tokio::spawn(serve_connection(
                            shared.clone(),
                            slot_id,
                            stream,
                            addr,
                            shutdown_rx.clone(),
                        ));
                    }
                    Err(e) => {
                        error!("accept failed: {e}");
                        fatal = Some(anyhow::Error::new(e).context("accept failed"));
                        shared.signal_shutdown();
                        break;
                    }
                },
                _ = shutdown_rx.changed() => break,
            }
        }
        heartbeat_task.abort();

        if let Some(e) = fatal {
            return Err(e);
        }

        let dispatch = shared.dispatch.lock();
        let summary = RunSummary {
            result: dispatch.result().cloned(),
            workers_seen: shared.workers_seen.load(Ordering::Relaxed),
            heartbeats_sent: shared.heartbeats_sent.load(Ordering::Relaxed),
            heartbeats_received: shared.heartbeats_received.load(Ordering::Relaxed),
            chunks_assigned: shared.chunks_assigned.load(Ordering::Relaxed),
            candidates_dispatched: dispatch.cursor(),
            dispatch_latency: *shared.first_job_latency.lock(),
            stop_broadcast: *shared.stop_broadcast.lock(),
        };
        drop(dispatch);
        Ok(summary)
    }
}

/// Drive one worker connection from accept to close.
async fn serve_connection(
    shared: Arc<Shared>,
    slot_id: u64,
    stream: TcpStream,
    addr: SocketAddr,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let (mut reader, write_half) = stream.into_split();
    let writer = Arc::new(AsyncMutex::new(write_half));

    // ACCEPTED state: the first inbound frame must be a registration.
    let registered = match wire::read_frame(&mut reader).await {
        Ok(Frame::Register) => true,
        Ok(other) => {
            warn!(
                "connection #{slot_id} sent {:?} before registering, dropping",
                other.tag()
            );
            false
        }
        Err(e) => {
            warn!("connection #{slot_id} failed during handshake: {e}");
            false
        }
    };

    if registered {
        info!("worker #{slot_id} registered from {addr}");
        let send_started = Instant::now();
        let sent = {
            let mut w = writer.lock().await;
            wire::write_frame(&mut *w, &Frame::Job(shared.job.clone())).await
        };
        match sent {
            Ok(()) => {
                {
                    let mut first = shared.first_job_latency.lock();
                    if first.is_none() {
                        *first = Some(send_started.elapsed());
                    }
                }
                debug!(
                    "sent job to worker #{slot_id}: algorithm={} salt={}",
                    shared.job.algorithm, shared.job.salt
                );
                shared
                    .slots
                    .lock()
                    .insert(slot_id, SlotHandle { writer: writer.clone() });
                serve_registered(&shared, slot_id, &mut reader, &writer, &mut shutdown_rx).await;
                shared.slots.lock().remove(&slot_id);
            }
            Err(e) => warn!("failed to send job to worker #{slot_id}: {e}"),
        }
    }

    let remaining = shared.active.fetch_sub(1, Ordering::AcqRel) - 1;
    debug!("connection #{slot_id} closed, {remaining} still attached");
    if remaining == 0 {
        // The last attached worker is gone; found or not, the run is over.
        shared.signal_shutdown();
    }
}

/// REGISTERED state: serve chunk requests, heartbeat responses and the
/// terminal result until the worker drops or the run shuts down.
async fn serve_registered(
    shared: &Arc<Shared>,
    slot_id: u64,
    reader: &mut OwnedReadHalf,
    writer: &Arc<AsyncMutex<OwnedWriteHalf>>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        let frame = tokio::select! {
            frame = wire::read_frame(reader) => frame,
            _ = shutdown_rx.changed() => {
                debug!("run finished, releasing worker #{slot_id}");
                return;
            }
        };

        match frame {
            Ok(Frame::RequestChunk) => {
                let reply = match shared.dispatch.lock().grant() {
                    Grant::Chunk(chunk) => {
                        shared.chunks_assigned.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            "worker #{slot_id} granted chunk start={} count={}",
                            chunk.start_idx, chunk.count
                        );
                        Frame::ChunkAssign(chunk)
                    }
                    Grant::Stop => {
                        debug!("worker #{slot_id} gets stop, no work left");
                        Frame::Stop
                    }
                };
                let mut w = writer.lock().await;
                if let Err(e) = wire::write_frame(&mut *w, &reply).await {
                    warn!("write to worker #{slot_id} failed: {e}");
                    return;
                }
            }
            Ok(Frame::HeartbeatResp(hb)) => {
                shared.heartbeats_received.fetch_add(1, Ordering::Relaxed);
                info!(
                    "[heartbeat] worker #{slot_id}: delta={} total={} threads={} rate={:.0}/s",
                    hb.delta_tested, hb.total_tested, hb.threads_active, hb.current_rate
                );
            }
            Ok(Frame::Result(result)) => {
                if result.found {
                    let first = shared.dispatch.lock().latch(result.clone());
                    if first {
                        info!(
                            "worker #{slot_id} found the password in {:.3} ms",
                            result.crack_time_ms
                        );
                        shared.broadcast_stop(slot_id).await;
                        shared.signal_shutdown();
                    } else {
                        debug!("late found result from worker #{slot_id} ignored");
                    }
                } else {
                    debug!(
                        "worker #{slot_id} finished without a find ({:.3} ms)",
                        result.crack_time_ms
                    );
                }
            }
            Ok(other) => {
                warn!(
                    "unexpected {:?} from worker #{slot_id}, dropping",
                    other.tag()
                );
                return;
            }
            Err(WireError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("worker #{slot_id} disconnected");
                return;
            }
            Err(e) => {
                warn!("protocol error from worker #{slot_id}: {e}, dropping");
                return;
            }
        }
    }
}

/// Tick every heartbeat interval and request a progress sample from
/// every registered worker.
async fn heartbeat_loop(
    shared: Arc<Shared>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    // interval fires immediately; swallow that first tick so the first
    // request goes out one full period after startup.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_rx.changed() => return,
        }

        let slots: Vec<(u64, Arc<AsyncMutex<OwnedWriteHalf>>)> = shared
            .slots
            .lock()
            .iter()
            .map(|(id, slot)| (*id, slot.writer.clone()))
            .collect();
        if slots.is_empty() {
            continue;
        }

        let mut sent = 0usize;
        for (slot_id, writer) in slots {
            let mut w = writer.lock().await;
            match wire::write_frame(&mut *w, &Frame::HeartbeatReq).await {
                Ok(()) => {
                    sent += 1;
                    shared.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => debug!("heartbeat to worker #{slot_id} failed: {e}"),
            }
        }
        debug!("[heartbeat] requested progress from {sent} workers");
    }
}
