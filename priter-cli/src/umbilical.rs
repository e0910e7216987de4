//! A `tracing`-backed `Umbilical` (spec.md 9: the injected capability
//! set replacing the original design's static `JobClient` RPC proxy).
//! Real deployments would route these calls to the host job driver;
//! this CLI has no driver process to route them to, so it just logs —
//! the same role the teacher's `kvs-server` gives `tracing::info!` at
//! its own lifecycle points.

use async_trait::async_trait;
use priter_core::{
    Checkpoint, IterationCompletionEvent, Result, SnapshotCompletionEvent, TaskId, Umbilical,
};
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingUmbilical;

#[async_trait]
impl Umbilical for LoggingUmbilical {
    async fn status_update(&self, task_id: TaskId, message: &str) -> Result<()> {
        info!(task_id, message, "status update");
        Ok(())
    }

    async fn ping(&self, task_id: TaskId) -> Result<()> {
        info!(task_id, "ping");
        Ok(())
    }

    async fn done(&self, task_id: TaskId) -> Result<()> {
        info!(task_id, "task done");
        Ok(())
    }

    async fn snapshot_commit(&self, event: SnapshotCompletionEvent) -> Result<()> {
        info!(task_id = event.task_id, snapshot_id = event.snapshot_id, "snapshot committed");
        Ok(())
    }

    async fn after_iter_commit(&self, event: IterationCompletionEvent) -> Result<()> {
        info!(
            task_id = event.task_id,
            iteration = event.iteration_num,
            job_id = %event.job_id,
            "iteration completed"
        );
        Ok(())
    }

    async fn rollback_check(&self, task_id: TaskId) -> Result<Option<Checkpoint>> {
        info!(task_id, "rollback check: no driver-tracked checkpoint, starting fresh");
        Ok(None)
    }
}
