#![warn(rust_2018_idioms)]

//! The reduce side of the priority-iteration runtime: the per-key
//! `(iState, cState, staticData)` store, the `selectActivation`/`update`
//! selector, snapshot writing, convergence detection, and the iteration
//! coordinator that drives them through the phases spec.md 4.3/4.5
//! describe (see crate docs on each module for the exact mapping).

mod callbacks;
mod coordinator;
mod exequeue;
mod net;
mod snapshot;
mod state;
mod termination;
mod wire;

pub use callbacks::UserLogic;
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use exequeue::append_exequeue;
pub use net::{DownstreamEmitter, TcpDownstreamEmitter};
pub use snapshot::{Sample, SnapshotWriter};
pub use state::{SelectedEntry, StateSample, StateStore};
pub use termination::{StopReason, TerminationDetector};
pub use wire::{decode_kv_batch, encode_kv_batch};
