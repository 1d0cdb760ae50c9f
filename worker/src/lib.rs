//! GridCrack worker — connects to a controller, registers, and cracks
//! assigned chunks of the candidate space with a thread pool until a
//! password is found, the space is exhausted, or a stop arrives.
//!
//! The binary in `main.rs` is a thin CLI shell; [`run`] carries the
//! whole lifecycle so integration tests can drive a worker in-process.

pub mod pool;
pub mod reader;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use gridcrack_core::messages::CrackResult;
use gridcrack_core::wire::{self, Frame};
use log::{debug, info};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use pool::Counters;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub controller: String,
    pub port: u16,
    pub threads: usize,
}

/// What one worker run amounted to, for the summary panel and the exit
/// code.
#[derive(Debug)]
pub struct WorkerOutcome {
    pub found: bool,
    pub password: Option<String>,
    pub total_tested: u64,
    pub crack_time_ms: f64,
}

/// Full worker lifecycle: connect, register, receive the job, crack
/// chunks until done.  Exactly one terminal result frame is sent.
pub async fn run(config: WorkerConfig) -> Result<WorkerOutcome> {
    let addr = format!("{}:{}", config.controller, config.port);
    info!("connecting to controller at {addr}");
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;
    info!("connected");

    let (mut read_half, write_half) = stream.into_split();
    let writer = Arc::new(AsyncMutex::new(write_half));

    {
        let mut w = writer.lock().await;
        wire::write_frame(&mut *w, &Frame::Register)
            .await
            .context("registration failed")?;
    }
    info!("registered, waiting for job");

    // The job must be the first inbound frame; anything else is fatal.
    let job = match wire::read_frame(&mut read_half)
        .await
        .context("controller hung up before sending a job")?
    {
        Frame::Job(job) => job,
        other => bail!("expected job from controller, got {:?}", other.tag()),
    };
    info!(
        "job received: algorithm={} salt={}",
        job.algorithm.name(),
        job.salt
    );
    let salt_template = job.algorithm.salt_template(&job.salt);

    let counters = Arc::new(Counters::new());
    let (event_tx, mut event_rx) = mpsc::channel(4);
    let reader_task = tokio::spawn(reader::run(
        read_half,
        Arc::clone(&writer),
        Arc::clone(&counters),
        event_tx,
    ));

    let mut found_password: Option<String> = None;

    loop {
        {
            let mut w = writer.lock().await;
            // A failed request means the controller is gone; finish up
            // the same way an explicit stop would.
            if let Err(e) = wire::write_frame(&mut *w, &Frame::RequestChunk).await {
                debug!("chunk request failed: {e}");
                break;
            }
        }

        // Wait for the reader to deliver a chunk or a stop.
        let event = match event_rx.recv().await {
            Some(event) => event,
            None => reader::Event::Stop,
        };

        match event {
            reader::Event::Stop => {
                info!("stop received, no more work or password found elsewhere");
                break;
            }
            reader::Event::Chunk(chunk) if chunk.count == 0 => break,
            reader::Event::Chunk(chunk) => {
                debug!("chunk: start={} count={}", chunk.start_idx, chunk.count);
                let outcome =
                    pool::crack_chunk(&job, &salt_template, chunk, config.threads, Arc::clone(&counters))
                        .await?;
                debug!(
                    "chunk done in {:.1} ms ({} tested so far)",
                    outcome.elapsed.as_secs_f64() * 1000.0,
                    counters.total_tested()
                );

                if counters.stop_requested() {
                    info!("stop received during chunk");
                    break;
                }
                if outcome.found {
                    let password = counters.password();
                    let result = CrackResult {
                        found: true,
                        password: password.clone(),
                        crack_time_ms: counters.crack_time_ms(),
                    };
                    let mut w = writer.lock().await;
                    wire::write_frame(&mut *w, &Frame::Result(result))
                        .await
                        .context("result delivery failed")?;
                    info!("password found: \"{password}\"");
                    found_password = Some(password);
                    break;
                }
            }
        }
    }

    if found_password.is_none() {
        let result = CrackResult {
            found: false,
            password: String::new(),
            crack_time_ms: counters.crack_time_ms(),
        };
        let mut w = writer.lock().await;
        // The controller may already be gone; a failed final report is
        // not an error.
        if let Err(e) = wire::write_frame(&mut *w, &Frame::Result(result)).await {
            debug!("final result not delivered: {e}");
        }
    }

    reader_task.abort();

    Ok(WorkerOutcome {
        found: found_password.is_some(),
        password: found_password,
        total_tested: counters.total_tested(),
        crack_time_ms: counters.crack_time_ms(),
    })
}
