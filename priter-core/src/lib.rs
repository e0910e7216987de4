#![warn(rust_2018_idioms)]

//! Shared configuration, error taxonomy, blob-store abstraction, and job
//! traits for the priority-iteration runtime core: the pieces every other
//! crate in this workspace (`priter-codec`, `priter-transport`,
//! `priter-reduce`, `priter-map`) depends on.

mod blobstore;
mod config;
mod error;
mod job;
mod logging;
mod thread_pool;

#[macro_use]
extern crate failure;

pub use blobstore::{join, BlobStore, LocalBlobStore};
pub use config::{Config, SelectionPolicy, SyncRegime};
pub use error::{PriterError, PriterErrorKind, Result};
pub use job::{
    Checkpoint, IterationCompletionEvent, IterativeJob, JobHandle, SnapshotCompletionEvent,
    SnapshotId, TaskId, Umbilical,
};
pub use logging::init_logging;
pub use thread_pool::{NaiveThreadPool, RayonThreadPool, SharedQueueThreadPool, ThreadPool};
