//! The reduce-side iteration coordinator (spec.md 4.3 state machine,
//! 4.5 phase loop). Drains a `SinkEvent` channel rather than holding a
//! back-reference into the `Sink` (spec.md 9 design note).

use crate::callbacks::UserLogic;
use crate::net::DownstreamEmitter;
use crate::snapshot::SnapshotWriter;
use crate::state::StateStore;
use crate::termination::TerminationDetector;
use crate::wire::{decode_kv_batch, encode_kv_batch};
use priter_core::{
    BlobStore, Checkpoint, Config, IterationCompletionEvent, SnapshotCompletionEvent, TaskId,
    Umbilical,
};
use priter_transport::{BufferType, Header, ReceivedBatch, SinkEvent, SyncRegime};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// How often the async-by-time ticker polls for idle time (spec.md 5:
/// "One ticker thread per asynchronous-time STREAM handler"). Fine
/// enough to resolve a 100ms `priter.job.async.time.thresh` without
/// spinning; regimes other than `AsyncByTimeRegime` ignore every tick
/// (`SyncRegime::tick`'s default no-op).
const TICK_GRANULARITY: Duration = Duration::from_millis(20);

/// Groups the pieces one reducer task's coordinator needs, beyond the
/// `StateStore` itself, so `Coordinator::new`'s signature stays small.
pub struct CoordinatorConfig {
    pub task_id: TaskId,
    pub job_id: String,
    pub num_map_partitions: usize,
}

/// Drives one reducer task through the wait/select/update/emit/snapshot/
/// terminate phases (spec.md 4.5), fed by a `SinkEvent` stream for the
/// STREAM inputs it receives from map tasks.
pub struct Coordinator<L, B, E, U>
where
    L: UserLogic,
    B: BlobStore,
    E: DownstreamEmitter,
    U: Umbilical,
{
    cfg: CoordinatorConfig,
    config: Config,
    store: Arc<StateStore<L>>,
    snapshot: SnapshotWriter<B>,
    termination: TerminationDetector<L>,
    regime: Box<dyn SyncRegime>,
    emitter: Arc<E>,
    umbilical: Arc<U>,
    partitioner: Arc<dyn Fn(&L::Key) -> usize + Send + Sync>,
    iteration: u64,
    last_snapshot_at: Instant,
    last_snapshot_id: Option<u64>,
    cursors: HashMap<TaskId, i64>,
    last_activity: Instant,
}

impl<L, B, E, U> Coordinator<L, B, E, U>
where
    L: UserLogic,
    B: BlobStore,
    E: DownstreamEmitter,
    U: Umbilical,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: CoordinatorConfig,
        config: Config,
        store: Arc<StateStore<L>>,
        snapshot: SnapshotWriter<B>,
        regime: Box<dyn SyncRegime>,
        emitter: Arc<E>,
        umbilical: Arc<U>,
        partitioner: Arc<dyn Fn(&L::Key) -> usize + Send + Sync>,
    ) -> Self {
        let termination = TerminationDetector::new(config.stop_difference, config.stop_max_time);
        Self {
            cfg,
            config,
            store,
            snapshot,
            termination,
            regime,
            emitter,
            umbilical,
            partitioner,
            iteration: 0,
            last_snapshot_at: Instant::now(),
            last_snapshot_id: None,
            cursors: HashMap::new(),
            last_activity: Instant::now(),
        }
    }

    /// Drains `events` until convergence, `stopMaxTime`, or the channel
    /// closes. Only `SinkEvent::Batch` carrying a STREAM header drives
    /// the state machine; other buffer types are handled by whichever
    /// component owns that concern (FILE/SNAPSHOT readers, the map
    /// side's PKVBUF consumer).
    pub async fn run(&mut self, mut events: mpsc::Receiver<SinkEvent>) -> priter_core::Result<IterationCompletionEvent> {
        let mut ticker = tokio::time::interval(TICK_GRANULARITY);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let fired = tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        return Err(priter_core::PriterErrorKind::Logical.into());
                    };
                    match event {
                        SinkEvent::Batch(batch) if batch.buffer_type == BufferType::Stream => {
                            self.ingest_stream_batch(batch)?
                        }
                        SinkEvent::Batch(_) => false,
                        SinkEvent::ConnectionClosed { .. } => false,
                    }
                }
                _ = ticker.tick() => {
                    self.regime.tick(self.last_activity.elapsed())
                }
            };

            if fired {
                if let Some(done) = self.run_phase().await? {
                    return Ok(done);
                }
            }
        }
    }

    /// Merges every `(key, delta)` pair in a received STREAM batch and
    /// records the arrival with the sync regime, returning whether the
    /// reducer should fire (`spillIter`).
    fn ingest_stream_batch(&mut self, batch: ReceivedBatch) -> priter_core::Result<bool> {
        let Header::Stream(header) = &batch.header else {
            unreachable!("filtered to BufferType::Stream above");
        };
        self.cursors.insert(batch.source, header.sequence);

        let pairs: Vec<(L::Key, L::IState)> = decode_kv_batch(&batch.payload)?;
        for (key, delta) in &pairs {
            self.store.merge_delta(key, delta);
        }
        debug!(source = batch.source, count = pairs.len(), "merged stream batch");
        self.last_activity = Instant::now();

        Ok(self.regime.record_arrival(batch.source))
    }

    /// One pass through SELECTING -> emit PKVBUF -> maybe SNAPSHOTTING
    /// -> check termination (spec.md 4.5 steps 3-6). Returns
    /// `Some(event)` once the reducer has converged or timed out.
    async fn run_phase(&mut self) -> priter_core::Result<Option<IterationCompletionEvent>> {
        let selected = self.store.select_activation(&self.config);

        let mut buckets: Vec<Vec<(L::Key, L::IState)>> =
            (0..self.cfg.num_map_partitions).map(|_| Vec::new()).collect();
        for entry in &selected {
            let delta = self
                .store
                .apply_update(&entry.key, &entry.i_state, &entry.c_state);
            let partition = (self.partitioner)(&entry.key) % self.cfg.num_map_partitions.max(1);
            buckets[partition].push((entry.key.clone(), delta));
        }

        for (partition, bucket) in buckets.into_iter().enumerate() {
            if !bucket.is_empty() {
                let payload = encode_kv_batch(&bucket)?;
                self.emitter
                    .emit_activation(partition, self.iteration as i64, payload)
                    .await?;
            }
        }
        for partition in 0..self.cfg.num_map_partitions {
            self.emitter
                .emit_stream_marker(partition, self.iteration as i64)
                .await?;
        }

        self.iteration += 1;
        self.regime.reset();
        self.last_activity = Instant::now();

        if self.last_snapshot_at.elapsed() >= self.config.snapshot_interval {
            let id = self.snapshot.write(&self.store, self.config.snapshot_topk)?;
            self.last_snapshot_id = Some(id);
            self.last_snapshot_at = Instant::now();
            self.umbilical
                .snapshot_commit(SnapshotCompletionEvent {
                    task_id: self.cfg.task_id,
                    snapshot_id: id,
                })
                .await?;
            info!(snapshot_id = id, "snapshot committed");
        }

        let sample_k = self.config.snapshot_topk.max(1);
        if let Some(reason) = self.termination.check(&self.store, sample_k) {
            let checkpoint = Checkpoint {
                iteration: self.iteration,
                cursors: self.cursors.iter().map(|(&k, &v)| (k, v)).collect(),
            };
            let event = IterationCompletionEvent {
                iteration_num: self.iteration,
                task_id: self.cfg.task_id,
                checkpoint,
                snapshot_checkpoint: self.last_snapshot_id,
                job_id: self.cfg.job_id.clone(),
            };
            self.umbilical.after_iter_commit(event.clone()).await?;
            info!(?reason, iteration = self.iteration, "reducer task terminating");
            return Ok(Some(event));
        }

        Ok(None)
    }
}
