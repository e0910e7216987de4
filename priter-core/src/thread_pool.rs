//! Bounded worker pools for CPU-bound work the async I/O tasks hand off
//! rather than run inline — `selectActivation`/`update` on the reduce
//! side, `activate` on the map side (spec.md 9 "Concurrency control",
//! SPEC_FULL §2/§4: "A thread pool sized `min(maxConnections,
//! max(numInputs, 5))`"). Three implementations, same trait, mirroring
//! the teacher's `thread_pool` module.

use crate::error::Result;
use std::thread;

/// A pool capable of spawning and managing threads to perform tasks.
pub trait ThreadPool: Clone + Send + 'static {
    /// Creates a new instance sized for `capacity` concurrent workers.
    fn new(capacity: usize) -> Result<Self>
    where
        Self: Sized;

    /// Spawns `f` to run on the pool.
    fn spawn<F: FnOnce() + Send + 'static>(&self, f: F);
}

/// Spawns a new OS thread per task; `capacity` is ignored. Useful as a
/// baseline and in tests where bounding concurrency doesn't matter.
#[derive(Debug, Clone)]
pub struct NaiveThreadPool;

impl ThreadPool for NaiveThreadPool {
    fn new(_capacity: usize) -> Result<Self> {
        Ok(Self)
    }

    fn spawn<F: FnOnce() + Send + 'static>(&self, f: F) {
        thread::spawn(f);
    }
}

/// A fixed set of worker threads pulling closures off a shared
/// unbounded `crossbeam` queue. A panicking worker is replaced so the
/// pool's effective capacity never shrinks.
#[derive(Clone)]
pub struct SharedQueueThreadPool {
    sender: crossbeam::channel::Sender<Box<dyn FnOnce() + Send + 'static>>,
}

impl ThreadPool for SharedQueueThreadPool {
    fn new(capacity: usize) -> Result<Self> {
        let (tx, rx) = crossbeam::channel::unbounded::<Box<dyn FnOnce() + Send + 'static>>();
        for _ in 0..capacity.max(1) {
            let rx = TaskReceiver(rx.clone());
            thread::spawn(move || run_task(rx));
        }
        Ok(Self { sender: tx })
    }

    fn spawn<F: FnOnce() + Send + 'static>(&self, f: F) {
        // the receiving threads never all exit while `self` is alive, so
        // this channel always has a live receiver.
        self.sender
            .send(Box::new(f))
            .expect("thread pool has no live workers");
    }
}

#[derive(Clone)]
struct TaskReceiver(crossbeam::channel::Receiver<Box<dyn FnOnce() + Send + 'static>>);

impl Drop for TaskReceiver {
    fn drop(&mut self) {
        if thread::panicking() {
            let rx = self.0.clone();
            thread::spawn(move || run_task(TaskReceiver(rx)));
        }
    }
}

fn run_task(rx: TaskReceiver) {
    loop {
        match rx.0.recv() {
            Ok(task) => task(),
            Err(_) => {
                tracing::debug!("thread pool queue closed, worker exiting");
                break;
            }
        }
    }
}

/// A `rayon`-backed pool, for work that benefits from work-stealing
/// (`selectActivation` over a large key set, in particular).
#[derive(Clone)]
pub struct RayonThreadPool {
    pool: std::sync::Arc<rayon::ThreadPool>,
}

impl ThreadPool for RayonThreadPool {
    fn new(capacity: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(capacity.max(1))
            .build()
            .map_err(|_| crate::error::PriterErrorKind::Config)?;
        Ok(Self {
            pool: std::sync::Arc::new(pool),
        })
    }

    fn spawn<F: FnOnce() + Send + 'static>(&self, f: F) {
        self.pool.spawn(f);
    }
}
