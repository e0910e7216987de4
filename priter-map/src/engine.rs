//! The `ActivationEngine` (spec.md 4.4): ties the loaded `Subgraph`, the
//! `InputPKVBuffer`, and the `PartitionedEmitter` together into the map
//! task's per-iteration activation pass, and drains a `SinkEvent` stream
//! the same way the reduce side's `Coordinator` does (spec.md 9 design
//! note: no back-reference into the owning `Sink`).

use crate::buffer::InputPkvBuffer;
use crate::callbacks::ActivationLogic;
use crate::emitter::{PartitionedEmitter, UpstreamEmitter};
use crate::subgraph::Subgraph;
use crate::wire::decode_kv_batch;
use priter_core::{BlobStore, Result};
use priter_transport::{BufferType, Header, SinkEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// One map task's activation engine: a loaded static subgraph partition,
/// the single `InputPKVBuffer` input channel, and the partitioned
/// downstream emitter.
pub struct ActivationEngine<L: ActivationLogic, U: UpstreamEmitter, B: BlobStore> {
    logic: L,
    subgraph: Subgraph<L>,
    buffer: Arc<InputPkvBuffer<L::Key, L::IState>>,
    emitter: PartitionedEmitter<L, U, B>,
    num_reduce_partitions: usize,
}

impl<L: ActivationLogic, U: UpstreamEmitter, B: BlobStore> ActivationEngine<L, U, B> {
    pub fn new(
        logic: L,
        subgraph: Subgraph<L>,
        emitter: PartitionedEmitter<L, U, B>,
        num_reduce_partitions: usize,
    ) -> Self {
        Self {
            logic,
            subgraph,
            buffer: Arc::new(InputPkvBuffer::new()),
            emitter,
            num_reduce_partitions,
        }
    }

    /// A cloneable handle to this engine's input buffer, for seeding it
    /// with `init` before the run loop starts.
    pub fn buffer(&self) -> Arc<InputPkvBuffer<L::Key, L::IState>> {
        Arc::clone(&self.buffer)
    }

    /// Decodes one PKVBUF batch and feeds it into the input buffer.
    fn ingest(&self, iteration: i64, payload: &[u8]) -> Result<bool> {
        let pairs = decode_kv_batch(payload)?;
        Ok(self.buffer.read(iteration, pairs))
    }

    /// Drains every record currently queued, invoking `activate` (or the
    /// zero-delta fan-out) for each, then flushes the partitioned
    /// emitter for `iteration` (spec.md 4.4: "`next()` ... returns false
    /// when empty, signaling the map iteration is complete").
    async fn run_iteration(&self, iteration: i64) -> Result<()> {
        let mut processed = 0usize;
        while let Some((key, value)) = self.buffer.next() {
            self.activate_one(&key, &value);
            processed += 1;
        }
        debug!(iteration, processed, "activation pass drained input buffer");
        self.emitter.flush(iteration).await
    }

    fn activate_one(&self, key: &L::Key, value: &L::IState) {
        match self.subgraph.get(key) {
            Some(static_data) => {
                let emitter = &self.emitter;
                let mut emit = |k: L::Key, delta: L::Delta| emitter.emit(k, delta);
                self.logic.activate(key, value, static_data, &mut emit);
            }
            None => {
                // spec.md 4.4 "Failure semantics": a key absent from the
                // loaded subgraph is still fanned out with a zero delta
                // to every partition, preserving global progress
                // accounting rather than silently dropping the key.
                for partition in 0..self.num_reduce_partitions {
                    self.emitter
                        .emit_to(partition, key.clone(), self.logic.zero_delta());
                }
            }
        }
    }

    /// Drains `events` until the channel closes: PKVBUF batches are
    /// decoded into the input buffer; STREAM batches (spec.md 4.5 step 4,
    /// the reducer's per-iteration marker) trigger one activation pass
    /// over whatever has accumulated since the last marker.
    pub async fn run(&self, mut events: mpsc::Receiver<SinkEvent>) -> Result<()> {
        while let Some(event) = events.recv().await {
            match event {
                SinkEvent::Batch(batch) if batch.buffer_type == BufferType::PkvBuf => {
                    let Header::PkvBuf(header) = &batch.header else {
                        unreachable!("filtered to BufferType::PkvBuf above");
                    };
                    self.ingest(header.iteration, &batch.payload)?;
                }
                SinkEvent::Batch(batch) if batch.buffer_type == BufferType::Stream => {
                    let Header::Stream(header) = &batch.header else {
                        unreachable!("filtered to BufferType::Stream above");
                    };
                    self.run_iteration(header.sequence).await?;
                }
                SinkEvent::Batch(_) | SinkEvent::ConnectionClosed { .. } => {}
            }
        }
        Ok(())
    }
}
