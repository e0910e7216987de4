use failure::{Backtrace, Context, Fail};
use priter_core::{PriterError, PriterErrorKind};
use std::fmt;
use std::io;

/// Transport-local error type, the same `failure::Context` shape as
/// `priter-core::PriterError` and `priter-codec::CodecError`.
#[derive(Debug)]
pub struct TransportError {
    inner: Context<TransportErrorKind>,
}

/// Failure categories specific to the BufferExchange plane (spec.md 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Fail)]
pub enum TransportErrorKind {
    /// Unexpected enum byte, truncated header, or a pre-header preamble
    /// that was neither the data sentinel nor the close marker.
    #[fail(display = "protocol error")]
    Protocol,
    /// Read/write failure on the socket.
    #[fail(display = "io error")]
    Io,
    /// The remote replied `TERMINATE`; the source must not reconnect.
    #[fail(display = "remote terminated the connection permanently")]
    Terminated,
    /// A handler slot could not be obtained because `maxConnections` was
    /// already in use.
    #[fail(display = "connections full")]
    ConnectionsFull,
    /// An accepted batch's header cursor did not match the handler's
    /// dedup rule for its `BufferType`, but was also not a prior/replay
    /// cursor (out-of-order arrival ahead of its expected cursor).
    #[fail(display = "cursor out of order")]
    CursorOutOfOrder,
    /// The remote replied `RETRY`: the batch was not applied and the
    /// source must close this connection and reconnect before
    /// resending (spec.md 7), rather than resend on the same socket.
    #[fail(display = "remote asked for a reconnect before retrying")]
    Retry,
}

impl TransportError {
    pub fn kind(&self) -> TransportErrorKind {
        *self.inner.get_context()
    }
}

impl Fail for TransportError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl From<TransportErrorKind> for TransportError {
    fn from(kind: TransportErrorKind) -> TransportError {
        TransportError {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<TransportErrorKind>> for TransportError {
    fn from(context: Context<TransportErrorKind>) -> TransportError {
        TransportError { inner: context }
    }
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> TransportError {
        error.context(TransportErrorKind::Io).into()
    }
}

impl From<priter_codec::CodecError> for TransportError {
    fn from(error: priter_codec::CodecError) -> TransportError {
        error.context(TransportErrorKind::Protocol).into()
    }
}

impl From<TransportError> for PriterError {
    fn from(error: TransportError) -> PriterError {
        let kind = match error.kind() {
            TransportErrorKind::Io => PriterErrorKind::Io,
            TransportErrorKind::Protocol
            | TransportErrorKind::CursorOutOfOrder
            | TransportErrorKind::ConnectionsFull
            | TransportErrorKind::Retry => PriterErrorKind::Protocol,
            TransportErrorKind::Terminated => PriterErrorKind::Logical,
        };
        kind.into()
    }
}

/// Result type used throughout the transport crate.
pub type Result<T> = core::result::Result<T, TransportError>;
