//! The BufferExchange transport plane: typed headers, the wire
//! handshake, per-handler cursors, STREAM synchronization regimes, and
//! the `Sink`/`Source` endpoints built on top of them (spec.md 4, 6, 7).

#![warn(rust_2018_idioms)]

#[macro_use]
extern crate failure;

pub mod cursor;
pub mod enums;
pub mod error;
pub mod header;
pub mod protocol;
pub mod regime;
pub mod sink;
pub mod source;

pub use cursor::{FileCursor, SequenceCursor, SnapshotCursor};
pub use enums::{BufferType, Connect, Transfer, CLOSE_PREAMBLE, DATA_PREAMBLE};
pub use error::{Result, TransportError, TransportErrorKind};
pub use header::{FileHeader, Header, PkvBufferHeader, SnapshotHeader, StreamHeader};
pub use protocol::CursorValue;
pub use regime::{AsyncByTimeRegime, AsyncBySelfRegime, StrictRegime, SyncRegime};
pub use sink::{ReceivedBatch, RollbackCursor, RollbackHandle, Sink, SinkEvent};
pub use source::{RetryPolicy, Source};
