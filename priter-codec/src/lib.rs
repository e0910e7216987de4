#![warn(rust_2018_idioms)]

//! Self-delimiting record codec and framed files (spec.md 4.1, 6): five
//! record shapes, VInt length prefixes, EOF sentinel rows, a windowed
//! reader with corrupted-buffer spill, and an optional
//! compression+checksum block wrapper.

mod block;
mod error;
mod reader;
mod record;
mod vint;
mod writer;

#[macro_use]
extern crate failure;

pub use block::{BlockReader, BlockStats, BlockWriter};
pub use error::{CodecError, CodecErrorKind, Result};
pub use reader::{RecordReader, DEFAULT_WINDOW};
pub use record::{Record, RecordKind};
pub use vint::{read_vint, write_vint, EOF_MARKER};
pub use writer::{CodecStats, RecordWriter};
