//! The reader task: sole consumer of inbound bytes on the worker socket.
//!
//! Heartbeat requests are answered in place from the shared counters;
//! chunk assignments and stop conditions (explicit stop, socket closure,
//! protocol error) are forwarded to the main task through the event
//! channel.  Outbound writes go through the shared write lock because
//! the main task writes on the same socket.

use std::io;
use std::sync::Arc;

use gridcrack_core::messages::ChunkAssign;
use gridcrack_core::wire::{self, Frame, WireError};
use log::{debug, warn};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::pool::Counters;

/// What the reader hands to the main task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Chunk(ChunkAssign),
    /// Terminal: explicit stop, controller gone, or protocol error.
    Stop,
}

pub async fn run(
    mut reader: OwnedReadHalf,
    writer: Arc<AsyncMutex<OwnedWriteHalf>>,
    counters: Arc<Counters>,
    events: mpsc::Sender<Event>,
) {
    loop {
        let frame = match wire::read_frame(&mut reader).await {
            Ok(frame) => frame,
            Err(WireError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                debug!("controller closed the connection");
                counters.request_stop();
                let _ = events.send(Event::Stop).await;
                return;
            }
            Err(e) => {
                warn!("protocol error from controller: {e}");
                counters.request_stop();
                let _ = events.send(Event::Stop).await;
                return;
            }
        };

        match frame {
            Frame::HeartbeatReq => {
                let sample = counters.heartbeat_sample();
                let mut w = writer.lock().await;
                if let Err(e) = wire::write_frame(&mut *w, &Frame::HeartbeatResp(sample)).await {
                    debug!("heartbeat response failed: {e}");
                }
            }
            Frame::Stop => {
                debug!("stop received from controller");
                counters.request_stop();
                if events.send(Event::Stop).await.is_err() {
                    return;
                }
            }
            Frame::ChunkAssign(chunk) => {
                if events.send(Event::Chunk(chunk)).await.is_err() {
                    return;
                }
            }
            other => {
                warn!("unexpected {:?} from controller", other.tag());
                counters.request_stop();
                let _ = events.send(Event::Stop).await;
                return;
            }
        }
    }
}
