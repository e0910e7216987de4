//! Partitioned emission of activation deltas back to the reduce side
//! (spec.md 4.4 "Activation"): the user's `emit` callback fans a key out
//! by `partitioner(k')`, the emitter batches per destination reduce
//! partition, either spilling to a durable per-partition file or holding
//! the batch purely in memory (`priter.transfer.mem`), and flushes each
//! partition's batch as one STREAM frame once an iteration's activation
//! pass completes.

use crate::callbacks::ActivationLogic;
use crate::wire::encode_kv_batch;
use priter_core::{join, BlobStore, Result as CoreResult, TaskId};
use priter_transport::{BufferType, Header, RetryPolicy, Source, StreamHeader};
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::sync::Mutex as AsyncMutex;

/// The seam `ActivationEngine` emits deltas through — kept as a trait
/// so the activation pass can be tested without real sockets.
#[async_trait::async_trait]
pub trait UpstreamEmitter: Send + Sync {
    /// Sends an already-encoded `KV` batch of `(key, delta)` pairs to
    /// one reduce partition's STREAM input.
    async fn emit_delta_batch(&self, partition: usize, iteration: i64, payload: Vec<u8>) -> CoreResult<()>;
}

/// One lazily-connected STREAM destination to a single reduce task.
struct Destination {
    addr: SocketAddr,
    source: AsyncMutex<Option<Source>>,
}

/// An `UpstreamEmitter` backed by real TCP `Source`s, one per reduce
/// partition, mirroring `priter_reduce::net::TcpDownstreamEmitter`.
pub struct TcpUpstreamEmitter {
    task_id: TaskId,
    destinations: Vec<Destination>,
    retry: RetryPolicy,
}

impl TcpUpstreamEmitter {
    pub fn new(task_id: TaskId, reduce_addrs: Vec<SocketAddr>) -> Self {
        let destinations = reduce_addrs
            .into_iter()
            .map(|addr| Destination {
                addr,
                source: AsyncMutex::new(None),
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
impl UpstreamEmitter for TcpUpstreamEmitter {
    async fn emit_delta_batch(&self, partition: usize, iteration: i64, payload: Vec<u8>) -> CoreResult<()> {
        let dest = &self.destinations[partition];
        let mut slot = dest.source.lock().await;
        if slot.is_none() {
            *slot = Some(Source::connect(dest.addr, BufferType::Stream).await?);
        }
        let header = Header::Stream(StreamHeader {
            owner: self.task_id,
            sequence: iteration,
            bytes: payload.len() as u64,
        });
        slot.as_mut()
            .unwrap()
            .send_batch(&header, &payload, self.retry)
            .await?;
        Ok(())
    }
}

/// Per-partition staging for one map task's emitted deltas (spec.md 4.4:
/// "enqueues it in the per-partition output file ... or the in-memory
/// queue"). The batch always lives in memory between `emit` and `flush`
/// (building a record stream needs the whole batch at once); when
/// `transfer_mem` is off, each `emit` additionally spills a durable
/// one-record copy to the blob store under the map task's own directory,
/// as a crash-recovery artifact independent of the in-memory path.
pub struct PartitionedEmitter<L: ActivationLogic, U: UpstreamEmitter, B: BlobStore> {
    logic: std::marker::PhantomData<L>,
    partitions: Vec<Mutex<Vec<(L::Key, L::Delta)>>>,
    upstream: U,
    blob: Option<B>,
    out_dir: String,
    map_task_id: TaskId,
    transfer_mem: bool,
    partitioner: Box<dyn Fn(&L::Key) -> usize + Send + Sync>,
}

impl<L: ActivationLogic, U: UpstreamEmitter, B: BlobStore> PartitionedEmitter<L, U, B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        num_partitions: usize,
        upstream: U,
        blob: Option<B>,
        out_dir: impl Into<String>,
        map_task_id: TaskId,
        transfer_mem: bool,
        partitioner: Box<dyn Fn(&L::Key) -> usize + Send + Sync>,
    ) -> Self {
        let mut partitions = Vec::with_capacity(num_partitions.max(1));
        partitions.resize_with(num_partitions.max(1), || Mutex::new(Vec::new()));
        Self {
            logic: std::marker::PhantomData,
            partitions,
            upstream,
            blob,
            out_dir: out_dir.into(),
            map_task_id,
            transfer_mem,
            partitioner,
        }
    }

    fn spill_path(&self, partition: usize) -> String {
        join(&[
            &self.out_dir,
            &format!("map-{}", self.map_task_id),
            &format!("part-{partition}-spill"),
        ])
    }

    /// Stages one `(key, delta)` pair for its destination reduce
    /// partition, per `partitioner(key)`.
    pub fn emit(&self, key: L::Key, delta: L::Delta) {
        self.emit_to((self.partitioner)(&key), key, delta);
    }

    /// Stages `(key, delta)` directly against `partition`, bypassing the
    /// partitioner — used by the zero-delta fan-out policy (spec.md 4.4
    /// "Failure semantics"), which targets every partition regardless
    /// of what `partitioner(key)` would otherwise select.
    pub fn emit_to(&self, partition: usize, key: L::Key, delta: L::Delta) {
        let partition = partition % self.partitions.len().max(1);
        if !self.transfer_mem {
            if let Some(blob) = &self.blob {
                if let Ok(bytes) = encode_kv_batch(std::slice::from_ref(&(key.clone(), delta.clone()))) {
                    let _ = blob.append(&self.spill_path(partition), &bytes);
                }
            }
        }
        self.partitions[partition].lock().unwrap().push((key, delta));
    }

    /// Sends every non-empty partition's staged batch as one STREAM
    /// frame for `iteration`, then clears the in-memory staging (spec.md
    /// 4.5's per-iteration emission boundary, mirrored on the map side).
    pub async fn flush(&self, iteration: i64) -> CoreResult<()> {
        for (partition, slot) in self.partitions.iter().enumerate() {
            let batch = {
                let mut guard = slot.lock().unwrap();
                std::mem::take(&mut *guard)
            };
            if batch.is_empty() {
                continue;
            }
            let payload = encode_kv_batch(&batch)?;
            self.upstream
                .emit_delta_batch(partition, iteration, payload)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use priter_core::LocalBlobStore;
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Clone)]
    struct NoopLogic;
    impl ActivationLogic for NoopLogic {
        type Key = u32;
        type IState = f64;
        type Delta = f64;
        type Static = ();
        fn parse_static(&self, _: &str) -> Option<(u32, ())> {
            None
        }
        fn activate(&self, _: &u32, _: &f64, _: &(), _: &mut dyn FnMut(u32, f64)) {}
        fn zero_delta(&self) -> f64 {
            0.0
        }
    }

    struct RecordingEmitter {
        sent: Arc<StdMutex<Vec<(usize, i64, Vec<u8>)>>>,
    }

    #[async_trait::async_trait]
    impl UpstreamEmitter for RecordingEmitter {
        async fn emit_delta_batch(&self, partition: usize, iteration: i64, payload: Vec<u8>) -> CoreResult<()> {
            self.sent.lock().unwrap().push((partition, iteration, payload));
            Ok(())
        }
    }

    #[tokio::test]
    async fn flush_sends_only_nonempty_partitions_and_clears_them() {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let emitter = PartitionedEmitter::<NoopLogic, _, LocalBlobStore>::new(
            3,
            RecordingEmitter { sent: Arc::clone(&sent) },
            None,
            "out",
            0,
            true,
            Box::new(|k: &u32| *k as usize),
        );

        emitter.emit_to(0, 1, 1.5);
        emitter.emit_to(0, 2, 2.5);
        emitter.flush(7).await.unwrap();

        let recorded = sent.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, 0);
        assert_eq!(recorded[0].1, 7);

        drop(recorded);
        emitter.flush(8).await.unwrap();
        assert_eq!(sent.lock().unwrap().len(), 1); // nothing staged, no second send
    }

    #[tokio::test]
    async fn partitioner_routes_emit_by_key() {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let emitter = PartitionedEmitter::<NoopLogic, _, LocalBlobStore>::new(
            4,
            RecordingEmitter { sent: Arc::clone(&sent) },
            None,
            "out",
            0,
            true,
            Box::new(|k: &u32| *k as usize % 4),
        );
        emitter.emit(5, 1.0); // partition 1
        emitter.flush(0).await.unwrap();
        assert_eq!(sent.lock().unwrap()[0].0, 1);
    }

    #[tokio::test]
    async fn disk_mode_spills_a_durable_copy_per_emit() {
        let dir = tempfile::tempdir().unwrap();
        let blob = LocalBlobStore::new(dir.path()).unwrap();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let emitter = PartitionedEmitter::<NoopLogic, _, LocalBlobStore>::new(
            1,
            RecordingEmitter { sent: Arc::clone(&sent) },
            Some(blob.clone()),
            "out",
            3,
            false,
            Box::new(|_: &u32| 0),
        );
        emitter.emit(1, 1.0);
        assert!(blob.exists("out/map-3/part-0-spill"));
    }
}
