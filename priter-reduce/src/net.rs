//! The reduce-side half of the BufferExchange wiring: emitting
//! activation batches (PKVBUF) to every map task, and a per-iteration
//! STREAM marker so downstream sinks can advance their cursors
//! (spec.md 4.5 steps 3-4).

use priter_core::{Result as CoreResult, TaskId};
use priter_transport::{BufferType, Header, PkvBufferHeader, RetryPolicy, Source, StreamHeader};
use std::net::SocketAddr;
use tokio::sync::Mutex;

/// The seam the iteration coordinator emits through — kept as a trait
/// so the phase loop can be tested without real sockets.
#[async_trait::async_trait]
pub trait DownstreamEmitter: Send + Sync {
    /// Sends an already-encoded `KV` batch of `(key, iState)` pairs to
    /// one map partition's PKVBUF input.
    async fn emit_activation(&self, partition: usize, iteration: i64, payload: Vec<u8>) -> CoreResult<()>;

    /// Sends the per-iteration STREAM marker (spec.md 4.5 step 4).
    async fn emit_stream_marker(&self, partition: usize, iteration: i64) -> CoreResult<()>;
}

/// One lazily-connected destination (spec.md 4.2: "Source ... connects
/// lazily"), holding both the PKVBUF and STREAM-marker connections to
/// a single map task.
struct Destination {
    addr: SocketAddr,
    pkv: Mutex<Option<Source>>,
    stream: Mutex<Option<Source>>,
}

/// A `DownstreamEmitter` backed by real TCP `Source`s, one pair per map
/// partition.
pub struct TcpDownstreamEmitter {
    task_id: TaskId,
    destinations: Vec<Destination>,
    retry: RetryPolicy,
}

impl TcpDownstreamEmitter {
    pub fn new(task_id: TaskId, map_addrs: Vec<SocketAddr>) -> Self {
        let destinations = map_addrs
            .into_iter()
            .map(|addr| Destination {
                addr,
                pkv: Mutex::new(None),
                stream: Mutex::new(None),
            })
            .collect();
        Self {
            task_id,
            destinations,
            retry: RetryPolicy::default(),
        }
    }
}

#[async_trait::async_trait]
impl DownstreamEmitter for TcpDownstreamEmitter {
    async fn emit_activation(&self, partition: usize, iteration: i64, payload: Vec<u8>) -> CoreResult<()> {
        let dest = &self.destinations[partition];
        let mut slot = dest.pkv.lock().await;
        if slot.is_none() {
            *slot = Some(Source::connect(dest.addr, BufferType::PkvBuf).await?);
        }
        let header = Header::PkvBuf(PkvBufferHeader {
            owner: self.task_id,
            iteration,
            bytes: payload.len() as u64,
        });
        slot.as_mut()
            .unwrap()
            .send_batch(&header, &payload, self.retry)
            .await?;
        Ok(())
    }

    async fn emit_stream_marker(&self, partition: usize, iteration: i64) -> CoreResult<()> {
        let dest = &self.destinations[partition];
        let mut slot = dest.stream.lock().await;
        if slot.is_none() {
            *slot = Some(Source::connect(dest.addr, BufferType::Stream).await?);
        }
        let header = Header::Stream(StreamHeader {
            owner: self.task_id,
            sequence: iteration,
            bytes: 0,
        });
        slot.as_mut().unwrap().send_batch(&header, &[], self.retry).await?;
        Ok(())
    }
}
