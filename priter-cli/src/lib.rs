#![warn(rust_2018_idioms)]

//! Shared pieces for the `priter-reduce-task`/`priter-map-task` binaries:
//! the concrete demo job logic, the config-file loader, and a
//! logging-only `Umbilical`.

pub mod config_file;
pub mod rank;
pub mod umbilical;
