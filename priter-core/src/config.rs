use crate::error::{PriterErrorKind, Result};
use failure::ResultExt;
use std::collections::HashMap;
use std::time::Duration;

/// Selection policy for `selectActivation` (spec.md 4.3): either a fixed
/// fraction of the key space or a fixed queue length, never both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionPolicy {
    /// `priter.queue.portion`: fraction `alpha` of `|keys|`.
    Portion(f64),
    /// `priter.queue.uniqlength`: a fixed `execQueueLen`.
    FixedLength(usize),
}

/// The STREAM synchronization regime a reducer's handler runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRegime {
    /// Fire only once every expected input has arrived this iteration.
    Strict,
    /// Fire on a ticker timeout, or immediately once the round completes.
    AsyncByTime,
    /// Fire once the same-partition input arrives (after the first round).
    AsyncBySelf,
}

/// Typed view over the recognized `priter.*` / `mapred.*` / `io.*`
/// configuration keys (spec.md 6). Unrecognized keys are ignored rather
/// than rejected, matching a Hadoop-`Configuration`-style permissive load.
#[derive(Debug, Clone)]
pub struct Config {
    /// `priter.job`
    pub job_enabled: bool,
    /// `priter.graph.partitions`
    pub partitions: usize,
    /// `priter.graph.nodes`
    pub nodes: usize,
    /// `priter.snapshot.interval`
    pub snapshot_interval: Duration,
    /// `priter.snapshot.topk`
    pub snapshot_topk: usize,
    /// `priter.queue.portion` / `priter.queue.uniqlength`
    pub selection: SelectionPolicy,
    /// `priter.stop.difference`
    pub stop_difference: f64,
    /// `priter.stop.maxtime`
    pub stop_max_time: Duration,
    /// `priter.job.mapsync` / `priter.job.async.time` / `priter.job.async.self`
    pub sync_regime: SyncRegime,
    /// `priter.job.async.time.thresh`
    pub async_time_thresh: Duration,
    /// `priter.job.inmem`
    pub in_mem: bool,
    /// `priter.job.syncupdate`
    pub sync_update: bool,
    /// `priter.transfer.mem`
    pub transfer_mem: bool,
    /// `mapred.reduce.parallel.copies`, default 20000
    pub max_connections: usize,
    /// `io.file.buffer.size`, default 131072 (128 KiB)
    pub reader_window: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            job_enabled: false,
            partitions: 1,
            nodes: 0,
            snapshot_interval: Duration::from_millis(60_000),
            snapshot_topk: 100,
            selection: SelectionPolicy::FixedLength(1),
            stop_difference: 0.01,
            stop_max_time: Duration::from_millis(u64::MAX),
            sync_regime: SyncRegime::Strict,
            async_time_thresh: Duration::from_millis(1000),
            in_mem: false,
            sync_update: false,
            transfer_mem: false,
            max_connections: 20_000,
            reader_window: 128 * 1024,
        }
    }
}

impl Config {
    /// Builds a `Config` from a loosely-typed key/value map, the shape a
    /// host job-submission layer would hand this core after parsing a
    /// job's configuration file. Unknown keys are dropped silently; a
    /// recognized key whose value cannot be parsed is a `Config` error.
    pub fn from_map(raw: &HashMap<String, String>) -> Result<Self> {
        let mut cfg = Config::default();

        if let Some(v) = raw.get("priter.job") {
            cfg.job_enabled = parse_bool(v)?;
        }
        if let Some(v) = raw.get("priter.graph.partitions") {
            cfg.partitions = parse_usize(v)?;
        }
        if let Some(v) = raw.get("priter.graph.nodes") {
            cfg.nodes = parse_usize(v)?;
        }
        if let Some(v) = raw.get("priter.snapshot.interval") {
            cfg.snapshot_interval = Duration::from_millis(parse_u64(v)?);
        }
        if let Some(v) = raw.get("priter.snapshot.topk") {
            cfg.snapshot_topk = parse_usize(v)?;
        }

        let portion = raw
            .get("priter.queue.portion")
            .map(|v| parse_f64(v))
            .transpose()?
            .filter(|&a| a > 0.0);
        let uniqlength = raw
            .get("priter.queue.uniqlength")
            .map(|v| parse_usize(v))
            .transpose()?;
        cfg.selection = match (portion, uniqlength) {
            (Some(alpha), _) => SelectionPolicy::Portion(alpha),
            (None, Some(n)) => SelectionPolicy::FixedLength(n),
            (None, None) => cfg.selection,
        };

        if let Some(v) = raw.get("priter.stop.difference") {
            cfg.stop_difference = parse_f64(v)?;
        }
        if let Some(v) = raw.get("priter.stop.maxtime") {
            cfg.stop_max_time = Duration::from_millis(parse_u64(v)?);
        }

        let mapsync = raw.get("priter.job.mapsync").map(|v| parse_bool(v)).transpose()?;
        let async_time = raw.get("priter.job.async.time").map(|v| parse_bool(v)).transpose()?;
        let async_self = raw.get("priter.job.async.self").map(|v| parse_bool(v)).transpose()?;
        cfg.sync_regime = if async_self == Some(true) {
            SyncRegime::AsyncBySelf
        } else if async_time == Some(true) {
            SyncRegime::AsyncByTime
        } else if mapsync == Some(true) || mapsync.is_none() {
            SyncRegime::Strict
        } else {
            cfg.sync_regime
        };

        if let Some(v) = raw.get("priter.job.async.time.thresh") {
            cfg.async_time_thresh = Duration::from_millis(parse_u64(v)?);
        }
        if let Some(v) = raw.get("priter.job.inmem") {
            cfg.in_mem = parse_bool(v)?;
        }
        if let Some(v) = raw.get("priter.job.syncupdate") {
            cfg.sync_update = parse_bool(v)?;
        }
        if let Some(v) = raw.get("priter.transfer.mem") {
            cfg.transfer_mem = parse_bool(v)?;
        }
        if let Some(v) = raw.get("mapred.reduce.parallel.copies") {
            cfg.max_connections = parse_usize(v)?;
        }
        if let Some(v) = raw.get("io.file.buffer.size") {
            cfg.reader_window = parse_usize(v)?;
        }

        Ok(cfg)
    }
}

fn parse_bool(v: &str) -> Result<bool> {
    v.trim()
        .parse::<bool>()
        .context(PriterErrorKind::Config)
        .map_err(Into::into)
}

fn parse_usize(v: &str) -> Result<usize> {
    v.trim()
        .parse::<usize>()
        .context(PriterErrorKind::Config)
        .map_err(Into::into)
}

fn parse_u64(v: &str) -> Result<u64> {
    v.trim()
        .parse::<u64>()
        .context(PriterErrorKind::Config)
        .map_err(Into::into)
}

fn parse_f64(v: &str) -> Result<f64> {
    v.trim()
        .parse::<f64>()
        .context(PriterErrorKind::Config)
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_map_empty() {
        let cfg = Config::from_map(&HashMap::new()).unwrap();
        assert_eq!(cfg.max_connections, 20_000);
        assert_eq!(cfg.reader_window, 131_072);
        assert_eq!(cfg.sync_regime, SyncRegime::Strict);
    }

    #[test]
    fn portion_wins_over_uniqlength_when_both_present() {
        let mut raw = HashMap::new();
        raw.insert("priter.queue.portion".to_string(), "0.2".to_string());
        raw.insert("priter.queue.uniqlength".to_string(), "50".to_string());
        let cfg = Config::from_map(&raw).unwrap();
        assert_eq!(cfg.selection, SelectionPolicy::Portion(0.2));
    }

    #[test]
    fn uniqlength_used_when_portion_absent() {
        let mut raw = HashMap::new();
        raw.insert("priter.queue.uniqlength".to_string(), "50".to_string());
        let cfg = Config::from_map(&raw).unwrap();
        assert_eq!(cfg.selection, SelectionPolicy::FixedLength(50));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut raw = HashMap::new();
        raw.insert("some.unrelated.key".to_string(), "42".to_string());
        assert!(Config::from_map(&raw).is_ok());
    }

    #[test]
    fn async_self_takes_priority_over_async_time() {
        let mut raw = HashMap::new();
        raw.insert("priter.job.async.time".to_string(), "true".to_string());
        raw.insert("priter.job.async.self".to_string(), "true".to_string());
        let cfg = Config::from_map(&raw).unwrap();
        assert_eq!(cfg.sync_regime, SyncRegime::AsyncBySelf);
    }

    #[test]
    fn malformed_value_is_config_error() {
        let mut raw = HashMap::new();
        raw.insert("priter.graph.partitions".to_string(), "not-a-number".to_string());
        let err = Config::from_map(&raw).unwrap_err();
        assert_eq!(err.kind(), PriterErrorKind::Config);
    }
}
