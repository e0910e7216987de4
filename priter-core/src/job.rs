use crate::config::Config;
use crate::error::Result;

/// Identifies one reduce or map task within a job.
pub type TaskId = u32;

/// A reducer's monotonically increasing snapshot identifier (spec.md 3,
/// invariant 5: "Snapshot n is strictly ordered after snapshot n-1").
pub type SnapshotId = u64;

/// The coordinator-initiated persistence point spec.md's glossary calls a
/// checkpoint: an iteration id plus the cursor per source at that point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// The iteration number this checkpoint was taken at.
    pub iteration: u64,
    /// Per-source cursor values at the time of the checkpoint, keyed by
    /// the source's task id.
    pub cursors: Vec<(TaskId, i64)>,
}

/// Reported once a reducer durably flushes a snapshot (spec.md 4.5 step 5).
#[derive(Debug, Clone)]
pub struct SnapshotCompletionEvent {
    /// The task that produced the snapshot.
    pub task_id: TaskId,
    /// The snapshot's id.
    pub snapshot_id: SnapshotId,
}

/// Reported once a reducer converges or times out (spec.md 4.5 step 6).
#[derive(Debug, Clone)]
pub struct IterationCompletionEvent {
    /// The final iteration number reached.
    pub iteration_num: u64,
    /// The task that completed.
    pub task_id: TaskId,
    /// The last checkpoint taken before completion.
    pub checkpoint: Checkpoint,
    /// The last snapshot id written before completion, if any.
    pub snapshot_checkpoint: Option<SnapshotId>,
    /// The job this task belonged to.
    pub job_id: String,
}

/// The capability set a task uses to talk back to the host job driver
/// (spec.md 9, "Design Notes": `Umbilical` capability set). Kept as an
/// injected trait object rather than a static/global RPC proxy, so tests
/// can supply an in-memory fake.
#[async_trait::async_trait]
pub trait Umbilical: Send + Sync {
    /// Reports free-text task status, analogous to a Hadoop task's
    /// periodic status string.
    async fn status_update(&self, task_id: TaskId, message: &str) -> Result<()>;

    /// The liveness heartbeat; spec.md 7 category 6 ties a missed
    /// cadence to a host-initiated task restart.
    async fn ping(&self, task_id: TaskId) -> Result<()>;

    /// Reports that a task has fully exited (success or failure).
    async fn done(&self, task_id: TaskId) -> Result<()>;

    /// Reports a durably-flushed snapshot.
    async fn snapshot_commit(&self, event: SnapshotCompletionEvent) -> Result<()>;

    /// Reports iteration/convergence completion.
    async fn after_iter_commit(&self, event: IterationCompletionEvent) -> Result<()>;

    /// Asked by a restarted task: which checkpoint should it roll back to?
    async fn rollback_check(&self, task_id: TaskId) -> Result<Option<Checkpoint>>;
}

/// Handle to a submitted job, returned by `IterativeJob::submit`.
pub struct JobHandle {
    /// The job's id, as assigned by the host job-submission layer.
    pub job_id: String,
}

/// The single interface this core exposes to a host runtime (spec.md 9):
/// everything about cluster job submission, task placement, and restart
/// lives outside this trait's implementation.
#[async_trait::async_trait]
pub trait IterativeJob: Send + Sync {
    /// Initializes the job from a parsed configuration.
    async fn init(&mut self, config: Config) -> Result<()>;

    /// Submits the job for execution, returning a handle the driver polls.
    async fn submit(&mut self) -> Result<JobHandle>;
}
