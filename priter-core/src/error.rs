use failure::{Backtrace, Context, Fail};
use std::fmt;
use std::io;

/// Error type shared by every crate in the priority-iteration runtime.
#[derive(Debug)]
pub struct PriterError {
    inner: Context<PriterErrorKind>,
}

/// The six error categories from the failure-handling design (protocol,
/// I/O, codec, logical, convergence-timeout, liveness), plus a couple of
/// config/blob-store variants needed to thread errors through this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Fail)]
pub enum PriterErrorKind {
    /// Unexpected enum value, truncated header, or malformed frame.
    #[fail(display = "protocol error")]
    Protocol,
    /// Read/write failure on a socket or blob-store file.
    #[fail(display = "io error")]
    Io,
    /// Deserialization failure of an opaque user value.
    #[fail(display = "codec error")]
    Codec,
    /// Negative length outside the EOF sentinel rule, or cursor regression
    /// without an accompanying rollback.
    #[fail(display = "logical error")]
    Logical,
    /// Wall-clock budget (`stopMaxTime`) exceeded; orderly, not fatal.
    #[fail(display = "convergence timeout")]
    ConvergenceTimeout,
    /// The umbilical ping cadence lapsed.
    #[fail(display = "task liveness lost")]
    Liveness,
    /// A recognized configuration key held a value of the wrong shape.
    #[fail(display = "configuration error")]
    Config,
    /// The blob store could not satisfy an open/read/write/append request.
    #[fail(display = "blob store error")]
    BlobStore,
}

impl PriterError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> PriterErrorKind {
        *self.inner.get_context()
    }
}

impl Fail for PriterError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl fmt::Display for PriterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl From<PriterErrorKind> for PriterError {
    fn from(kind: PriterErrorKind) -> PriterError {
        PriterError {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<PriterErrorKind>> for PriterError {
    fn from(context: Context<PriterErrorKind>) -> PriterError {
        PriterError { inner: context }
    }
}

impl From<io::Error> for PriterError {
    fn from(error: io::Error) -> PriterError {
        error.context(PriterErrorKind::Io).into()
    }
}

/// Result type used throughout the runtime.
pub type Result<T> = core::result::Result<T, PriterError>;
