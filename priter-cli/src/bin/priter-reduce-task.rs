//! Runs one reducer task: binds a `Sink`, drives the `PriorityStateEngine`
//! through the iteration coordinator's phases, and emits activation
//! batches to every map task (spec.md 4.3, 4.5). Argument/config-file
//! parsing mirrors the teacher's `kvs-server` binary.

use clap::Parser;
use priter_cli::config_file;
use priter_cli::rank::RankReduceLogic;
use priter_cli::umbilical::LoggingUmbilical;
use priter_core::{Config, LocalBlobStore, SyncRegime as ConfigSyncRegime};
use priter_reduce::{Coordinator, CoordinatorConfig, SnapshotWriter, StateStore, TcpDownstreamEmitter};
use priter_transport::{AsyncByTimeRegime, AsyncBySelfRegime, Sink, StrictRegime, SyncRegime};
use std::net::SocketAddr;
use std::process::exit;
use std::sync::Arc;
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Socket address this reducer task binds its `Sink` to.
    #[clap(long)]
    addr: SocketAddr,

    /// Path to a flat `key=value` `priter.*` job config file.
    #[clap(long)]
    config: std::path::PathBuf,

    /// Blob-store root this task reads/writes under; snapshots and the
    /// execution-queue spill live at `<data_dir>/out/...` (spec.md 6's
    /// `<outDir>` is a path relative to this root).
    #[clap(long)]
    data_dir: std::path::PathBuf,

    /// This task's id, used as `owner` on every header it emits.
    #[clap(long)]
    task_id: u32,

    /// The job id reported on `IterationCompletionEvent`.
    #[clap(long, default_value = "priter-job")]
    job_id: String,

    /// One address per map task this reducer emits PKVBUF/STREAM
    /// traffic to; repeat the flag once per map task.
    #[clap(long = "map-addr")]
    map_addrs: Vec<SocketAddr>,

    /// `update`'s damping factor (spec.md 8 scenario 1).
    #[clap(long, default_value_t = 0.8)]
    damping: f64,

    /// The baseline every key's `cState` starts at (spec.md 8 scenario 1).
    #[clap(long, default_value_t = 0.2)]
    retain: f64,
}

#[tokio::main]
async fn main() {
    priter_core::init_logging(Level::INFO);
    let args = Args::parse();

    if let Err(err) = run(args).await {
        error!(%err, "reduce task exited with an error");
        exit(1);
    }
}

async fn run(args: Args) -> priter_core::Result<()> {
    let raw = config_file::load(&args.config)?;
    let config = Config::from_map(&raw)?;

    let blob = LocalBlobStore::new(&args.data_dir)?;

    let logic = RankReduceLogic {
        damping: args.damping,
        retain: args.retain,
    };
    let store = Arc::new(StateStore::with_shards(logic, 16));
    let snapshot = SnapshotWriter::new(blob, "out", args.task_id);

    let num_map_partitions = args.map_addrs.len().max(1);
    let regime: Box<dyn SyncRegime> = match config.sync_regime {
        ConfigSyncRegime::Strict => Box::new(StrictRegime::new(num_map_partitions)),
        ConfigSyncRegime::AsyncByTime => {
            Box::new(AsyncByTimeRegime::new(num_map_partitions, config.async_time_thresh))
        }
        ConfigSyncRegime::AsyncBySelf => {
            Box::new(AsyncBySelfRegime::new(args.task_id, num_map_partitions))
        }
    };

    let emitter = Arc::new(TcpDownstreamEmitter::new(args.task_id, args.map_addrs.clone()));
    let umbilical = Arc::new(LoggingUmbilical);
    let partitioner: Arc<dyn Fn(&u64) -> usize + Send + Sync> = Arc::new(|key: &u64| *key as usize);

    let (sink, events) = Sink::bind(args.addr, config.max_connections).await?;
    info!(addr = %args.addr, task_id = args.task_id, "reduce task listening");
    tokio::spawn(sink.run());

    let cfg = CoordinatorConfig {
        task_id: args.task_id,
        job_id: args.job_id,
        num_map_partitions,
    };
    let mut coordinator = Coordinator::new(cfg, config, store, snapshot, regime, emitter, umbilical, partitioner);

    let outcome = coordinator.run(events).await?;
    info!(iteration = outcome.iteration_num, checkpoint = ?outcome.checkpoint, "reduce task finished");
    Ok(())
}
