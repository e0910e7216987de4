//! Runs one map task: loads its static subgraph partition, binds a
//! `Sink` for PKVBUF/STREAM traffic from the reducers, and drives the
//! `ActivationEngine` through its per-iteration activation pass (spec.md
//! 4.4). Argument/config-file parsing mirrors the teacher's
//! `kvs-server` binary.

use clap::Parser;
use priter_cli::config_file;
use priter_cli::rank::RankMapLogic;
use priter_core::{Config, LocalBlobStore};
use priter_map::{ActivationEngine, PartitionedEmitter, Subgraph, TcpUpstreamEmitter};
use priter_transport::Sink;
use std::net::SocketAddr;
use std::process::exit;
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Socket address this map task binds its `Sink` to.
    #[clap(long)]
    addr: SocketAddr,

    /// Path to a flat `key=value` `priter.*` job config file.
    #[clap(long)]
    config: std::path::PathBuf,

    /// Blob-store root this task reads/writes under; the static
    /// partition loads from `<data_dir>/in/subgraph/part<partition_id>`
    /// and any disk-spilled output lives under `<data_dir>/out/...`.
    #[clap(long)]
    data_dir: std::path::PathBuf,

    /// This task's id, used as `owner` on every STREAM header it emits.
    #[clap(long)]
    task_id: u32,

    /// Which static partition (`part<partition_id>`) this task loads.
    #[clap(long)]
    partition_id: u32,

    /// One address per reduce task this map task emits STREAM delta
    /// batches to; repeat the flag once per reduce task. Index in this
    /// list doubles as the reduce partition id `partitioner` routes to.
    #[clap(long = "reduce-addr")]
    reduce_addrs: Vec<SocketAddr>,
}

#[tokio::main]
async fn main() {
    priter_core::init_logging(Level::INFO);
    let args = Args::parse();

    if let Err(err) = run(args).await {
        error!(%err, "map task exited with an error");
        exit(1);
    }
}

async fn run(args: Args) -> priter_core::Result<()> {
    let raw = config_file::load(&args.config)?;
    let config = Config::from_map(&raw)?;

    let blob = LocalBlobStore::new(&args.data_dir)?;
    let logic = RankMapLogic;
    let subgraph = Subgraph::load(&blob, "in", args.partition_id, &logic)?;
    info!(
        partition_id = args.partition_id,
        keys = subgraph.len(),
        "subgraph partition loaded"
    );

    let num_reduce_partitions = args.reduce_addrs.len().max(1);
    let upstream = TcpUpstreamEmitter::new(args.task_id, args.reduce_addrs.clone());
    let spill_blob = if config.transfer_mem { None } else { Some(blob) };
    let partitioner: Box<dyn Fn(&u64) -> usize + Send + Sync> =
        Box::new(move |key: &u64| (*key as usize) % num_reduce_partitions);
    let emitter = PartitionedEmitter::new(
        num_reduce_partitions,
        upstream,
        spill_blob,
        "out",
        args.task_id,
        config.transfer_mem,
        partitioner,
    );

    let engine = ActivationEngine::new(logic, subgraph, emitter, num_reduce_partitions);

    let (sink, events) = Sink::bind(args.addr, config.max_connections).await?;
    info!(addr = %args.addr, task_id = args.task_id, "map task listening");
    tokio::spawn(sink.run());

    engine.run(events).await?;
    info!(task_id = args.task_id, "map task finished");
    Ok(())
}
