use failure::{Backtrace, Context, Fail};
use priter_core::{PriterError, PriterErrorKind};
use std::fmt;
use std::io;

/// Codec-local error type, mirroring the teacher's `KVError`/`KVErrorKind`
/// split (a `failure::Context` wrapped by a named kind) rather than a
/// hand-rolled enum with manual `Display` impls.
#[derive(Debug)]
pub struct CodecError {
    inner: Context<CodecErrorKind>,
}

/// Failure categories specific to the record codec (spec.md 4.1, 7, 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Fail)]
pub enum CodecErrorKind {
    /// A declared field length was negative and did not match the EOF
    /// sentinel, or the EOF sentinel appeared on only some of a
    /// record's fields.
    #[fail(display = "malformed length prefix")]
    MalformedLength,
    /// A read came up short of the length declared by its field prefix.
    #[fail(display = "short read past declared field length")]
    ShortRead,
    /// The trailing checksum did not match the decompressed payload.
    #[fail(display = "checksum mismatch")]
    ChecksumMismatch,
    /// I/O failure on the underlying reader/writer.
    #[fail(display = "io error")]
    Io,
    /// A VInt header byte encoded a byte-count outside `1..=9`.
    #[fail(display = "invalid vint header")]
    InvalidVInt,
    /// `append_*` was called with a record kind that didn't match the
    /// file's fixed kind.
    #[fail(display = "record kind mismatch")]
    KindMismatch,
}

impl CodecError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> CodecErrorKind {
        *self.inner.get_context()
    }
}

impl Fail for CodecError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl From<CodecErrorKind> for CodecError {
    fn from(kind: CodecErrorKind) -> CodecError {
        CodecError {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<CodecErrorKind>> for CodecError {
    fn from(context: Context<CodecErrorKind>) -> CodecError {
        CodecError { inner: context }
    }
}

impl From<io::Error> for CodecError {
    fn from(error: io::Error) -> CodecError {
        error.context(CodecErrorKind::Io).into()
    }
}

impl From<CodecError> for PriterError {
    fn from(error: CodecError) -> PriterError {
        let kind = match error.kind() {
            CodecErrorKind::Io => PriterErrorKind::Io,
            CodecErrorKind::MalformedLength | CodecErrorKind::InvalidVInt => {
                PriterErrorKind::Logical
            }
            CodecErrorKind::ShortRead
            | CodecErrorKind::ChecksumMismatch
            | CodecErrorKind::KindMismatch => PriterErrorKind::Codec,
        };
        kind.into()
    }
}

/// Result type used throughout the codec crate.
pub type Result<T> = core::result::Result<T, CodecError>;
