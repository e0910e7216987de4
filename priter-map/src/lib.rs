#![warn(rust_2018_idioms)]

//! The map side of the priority-iteration runtime: the pluggable
//! `ActivationLogic`, the static `Subgraph` partition loader, the
//! `InputPKVBuffer` that accumulates activation input, the partitioned
//! delta emitter, and the `ActivationEngine` that drives them through
//! one map task's per-iteration pass (spec.md 4.4).

mod buffer;
mod callbacks;
mod emitter;
mod engine;
mod subgraph;
mod wire;

pub use buffer::InputPkvBuffer;
pub use callbacks::ActivationLogic;
pub use emitter::{PartitionedEmitter, TcpUpstreamEmitter, UpstreamEmitter};
pub use engine::ActivationEngine;
pub use subgraph::Subgraph;
pub use wire::{decode_kv_batch, encode_kv_batch};
