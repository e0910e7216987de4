//! The `Sink` half of BufferExchange: a bounded TCP listener that
//! accepts connections from `Source`s, runs the connect + per-batch
//! handshake (spec.md 4.2), and hands completed batches off to the
//! owning task through a channel rather than holding a reference back
//! to it (spec.md 9 design note: breaks the `Sink`<->`Task` reference
//! cycle the original design implied).

use crate::cursor::{FileCursor, SequenceCursor, SnapshotCursor};
use crate::enums::{BufferType, Connect, Transfer};
use crate::error::{Result, TransportErrorKind};
use crate::header::Header;
use crate::protocol::{
    self, read_batch_header, read_buffer_type, write_admission, write_completion, write_connect,
    CursorValue, IncomingBatch,
};
use priter_core::TaskId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{debug, info, warn};

/// A batch handed up to the owning task once a connection's payload has
/// been fully read and its cursor advanced.
#[derive(Debug)]
pub struct ReceivedBatch {
    pub source: TaskId,
    pub buffer_type: BufferType,
    pub header: Header,
    pub payload: Vec<u8>,
}

/// Events a `Sink` emits to whatever task owns it.
#[derive(Debug)]
pub enum SinkEvent {
    Batch(ReceivedBatch),
    ConnectionClosed { source: TaskId, buffer_type: BufferType },
}

/// Per-`(source, BufferType)` dedup cursor, shaped by the `BufferType`
/// it serves (spec.md 4.2).
enum CursorState {
    File(FileCursor),
    Snapshot(SnapshotCursor),
    Sequence(SequenceCursor),
}

impl CursorState {
    fn initial(kind: BufferType) -> Self {
        match kind {
            BufferType::File => CursorState::File(FileCursor::new(0)),
            BufferType::Snapshot => CursorState::Snapshot(SnapshotCursor::new(0.0)),
            BufferType::Stream | BufferType::PkvBuf => {
                CursorState::Sequence(SequenceCursor::new(0))
            }
        }
    }

    fn accept(&mut self, header: &Header) -> (Transfer, CursorValue) {
        match (self, header) {
            (CursorState::File(c), Header::File(h)) => {
                (c.accept(h.first_id, h.last_id), CursorValue::Spill(c.cursor()))
            }
            (CursorState::Snapshot(c), Header::Snapshot(h)) => {
                (c.accept(h.progress), CursorValue::Progress(c.cursor()))
            }
            (CursorState::Sequence(c), Header::Stream(h)) => {
                (c.accept(h.sequence), CursorValue::Sequence(c.cursor()))
            }
            (CursorState::Sequence(c), Header::PkvBuf(h)) => {
                (c.accept(h.iteration), CursorValue::Sequence(c.cursor()))
            }
            _ => unreachable!("cursor shape always matches its own BufferType"),
        }
    }
}

fn payload_len(header: &Header) -> u64 {
    match header {
        Header::File(h) => h.compressed,
        Header::Snapshot(h) => h.bytes,
        Header::Stream(h) => h.bytes,
        Header::PkvBuf(h) => h.bytes,
    }
}

type CursorTable = Arc<Mutex<HashMap<(TaskId, u8), CursorState>>>;

/// A bounded TCP endpoint accepting `Source` connections for one task.
pub struct Sink {
    listener: TcpListener,
    max_connections: usize,
    events: mpsc::Sender<SinkEvent>,
    cursors: CursorTable,
}

impl Sink {
    pub async fn bind(addr: impl tokio::net::ToSocketAddrs, max_connections: usize) -> Result<(Self, mpsc::Receiver<SinkEvent>)> {
        let listener = TcpListener::bind(addr).await?;
        let (tx, rx) = mpsc::channel(max_connections.max(1) * 4);
        Ok((
            Self {
                listener,
                max_connections,
                events: tx,
                cursors: Arc::new(Mutex::new(HashMap::new())),
            },
            rx,
        ))
    }

    /// A handle that can reset this sink's per-`(source, BufferType)`
    /// cursors independently of the accept loop, for rollback-to-checkpoint
    /// (spec.md 4.3: "cursors on all downstream sources are reset to c").
    pub fn rollback_handle(&self) -> RollbackHandle {
        RollbackHandle {
            cursors: Arc::clone(&self.cursors),
        }
    }

    /// Accepts connections forever, spawning a handler task per
    /// connection bounded by `max_connections` via a semaphore — the
    /// async analog of the teacher's `ThreadPool::spawn` capacity bound,
    /// since the handshake here is I/O-bound rather than CPU-bound.
    pub async fn run(self) -> Result<()> {
        let permits = Arc::new(Semaphore::new(self.max_connections));
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let permit = match Arc::clone(&permits).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => None,
            };

            let events = self.events.clone();
            let cursors = Arc::clone(&self.cursors);

            if permit.is_none() {
                tokio::spawn(async move {
                    let mut stream = stream;
                    if let Err(err) = write_connect(&mut stream, Connect::ConnectionsFull).await {
                        warn!(%peer, %err, "failed to notify peer of full connection pool");
                    }
                });
                continue;
            }

            tokio::spawn(async move {
                let _permit = permit;
                if let Err(err) = handle_connection(stream, events, cursors).await {
                    debug!(%peer, %err, "connection handler exited with an error");
                }
            });
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    events: mpsc::Sender<SinkEvent>,
    cursors: CursorTable,
) -> Result<()> {
    write_connect(&mut stream, Connect::Open).await?;
    let buffer_type = read_buffer_type(&mut stream).await?;
    info!(?buffer_type, "accepted buffer connection");

    let mut last_source: Option<TaskId> = None;

    loop {
        match read_batch_header(&mut stream, buffer_type).await? {
            IncomingBatch::Close => break,
            IncomingBatch::Header(header) => {
                let source = header.owner();
                last_source = Some(source);

                // The dedup decision is header-only, so it belongs in the
                // admission reply: a replayed or out-of-order batch is
                // turned away before its payload is ever transferred.
                let (outcome, cursor) = {
                    let mut table = cursors.lock().await;
                    let entry = table
                        .entry((source, buffer_type.to_byte()))
                        .or_insert_with(|| CursorState::initial(buffer_type));
                    entry.accept(&header)
                };

                if outcome != Transfer::Success {
                    write_admission(&mut stream, Transfer::Ignore).await?;
                    continue;
                }

                write_admission(&mut stream, Transfer::Ready).await?;

                let len = payload_len(&header) as usize;
                let mut payload = vec![0u8; len];
                stream.read_exact(&mut payload).await?;

                write_completion(&mut stream, outcome, cursor).await?;

                let batch = ReceivedBatch {
                    source,
                    buffer_type,
                    header,
                    payload,
                };
                if events.send(SinkEvent::Batch(batch)).await.is_err() {
                    return Err(TransportErrorKind::Terminated.into());
                }
            }
        }
    }

    if let Some(source) = last_source {
        let _ = events
            .send(SinkEvent::ConnectionClosed { source, buffer_type })
            .await;
    }
    Ok(())
}

// Re-exported so callers only need `priter_transport::sink::*`.
pub use protocol::CursorValue as BatchCursor;

/// The value a rolled-back cursor is reset to, shaped per `BufferType`
/// the same way `CursorValue` is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RollbackCursor {
    Spill(i64),
    Progress(f32),
    Sequence(i64),
}

/// A cloneable reference to a `Sink`'s cursor table, used to roll a
/// single `(source, BufferType)` cursor back to a checkpoint value
/// without holding a reference into the running accept loop.
#[derive(Clone)]
pub struct RollbackHandle {
    cursors: CursorTable,
}

impl RollbackHandle {
    pub async fn rollback(&self, source: TaskId, buffer_type: BufferType, to: RollbackCursor) {
        let mut table = self.cursors.lock().await;
        let entry = table
            .entry((source, buffer_type.to_byte()))
            .or_insert_with(|| CursorState::initial(buffer_type));
        match (entry, to) {
            (CursorState::File(c), RollbackCursor::Spill(v)) => c.rollback_to(v),
            (CursorState::Snapshot(c), RollbackCursor::Progress(v)) => c.rollback_to(v),
            (CursorState::Sequence(c), RollbackCursor::Sequence(v)) => c.rollback_to(v),
            _ => {}
        }
    }
}
