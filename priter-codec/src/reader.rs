use crate::error::{CodecErrorKind, Result};
use crate::record::{Record, RecordKind};
use crate::vint::{read_vint, EOF_MARKER};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::error;

/// Default minimum size of the reader's internal window buffer
/// (spec.md 4.1: "default 128 KiB").
pub const DEFAULT_WINDOW: usize = 128 * 1024;

/// Reads a homogeneous stream of one `RecordKind`, mirroring
/// `RecordWriter`. Lazily grows an internal window buffer to the max of
/// `min_window` and the next record's size rounded up to a power of two,
/// and can spill a corrupted window to disk for post-mortem before
/// rethrowing (spec.md 4.1: "Failure semantics").
pub struct RecordReader<R: Read> {
    reader: R,
    kind: RecordKind,
    window: Vec<u8>,
    min_window: usize,
    spill_dir: Option<PathBuf>,
}

impl<R: Read> RecordReader<R> {
    /// Creates a reader fixed to `kind`, with the default window size and
    /// no spill directory configured.
    pub fn new(reader: R, kind: RecordKind) -> Self {
        Self::with_window(reader, kind, DEFAULT_WINDOW)
    }

    /// Creates a reader with an explicit minimum window size (the
    /// `io.file.buffer.size` configuration key, spec.md 6).
    pub fn with_window(reader: R, kind: RecordKind, min_window: usize) -> Self {
        Self {
            reader,
            kind,
            window: Vec::with_capacity(min_window),
            min_window,
            spill_dir: None,
        }
    }

    /// Configures a directory corrupted window contents are dumped to
    /// before a read error is propagated. Task-specific in production;
    /// tests typically leave this unset.
    pub fn set_spill_dir(&mut self, dir: impl Into<PathBuf>) {
        self.spill_dir = Some(dir.into());
    }

    fn grow_window(&mut self, needed: usize) {
        let target = needed.next_power_of_two().max(self.min_window);
        if self.window.capacity() < target {
            let additional = target - self.window.capacity();
            self.window.reserve(additional);
        }
    }

    fn read_field(&mut self, len: usize) -> Result<Vec<u8>> {
        self.grow_window(len);
        let mut buf = vec![0u8; len];
        if let Err(io_err) = self.reader.read_exact(&mut buf) {
            self.spill(&buf, "short read past declared field length");
            return Err(std::io::Error::from(io_err).into());
        }
        Ok(buf)
    }

    fn spill(&self, partial: &[u8], reason: &str) {
        let Some(dir) = &self.spill_dir else {
            return;
        };
        if fs::create_dir_all(dir).is_err() {
            return;
        }
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path = dir.join(format!("{:?}-corrupt-{stamp}.bin", self.kind));
        if fs::write(&path, partial).is_err() {
            error!("failed to spill corrupted record buffer to {path:?}");
        } else {
            error!(reason, path = %path.display(), "spilled corrupted record buffer");
        }
    }

    /// Reads the next record, or `Ok(None)` once the EOF sentinel row is
    /// observed.
    ///
    /// A single negative length that does not match the EOF sentinel, or
    /// a sentinel row where only some fields carry the marker, is a hard
    /// `MalformedLength` error (spec.md 8: "Sentinel detection").
    pub fn next(&mut self) -> Result<Option<Record>> {
        let field_count = self.kind.field_count();
        let mut lengths = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            lengths.push(read_vint(&mut self.reader)?);
        }

        let eof_count = lengths.iter().filter(|&&l| l == EOF_MARKER).count();
        if eof_count == field_count {
            return Ok(None);
        }
        if eof_count > 0 {
            return Err(CodecErrorKind::MalformedLength.into());
        }
        if lengths.iter().any(|&l| l < 0) {
            return Err(CodecErrorKind::MalformedLength.into());
        }

        let mut fields = Vec::with_capacity(field_count);
        for len in lengths {
            fields.push(self.read_field(len as usize)?);
        }

        Ok(Some(Record::from_fields(self.kind, fields)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vint::write_vint;
    use crate::writer::RecordWriter;

    #[test]
    fn window_grows_past_default_for_large_records() {
        let mut buf = Vec::new();
        let large = vec![7u8; DEFAULT_WINDOW * 3];
        {
            let mut writer = RecordWriter::new(&mut buf, RecordKind::Kv);
            writer.append_kv(b"k", &large).unwrap();
            writer.close().unwrap();
        }

        let mut reader = RecordReader::new(&buf[..], RecordKind::Kv);
        let record = reader.next().unwrap().unwrap();
        match record {
            Record::Kv { value, .. } => assert_eq!(value, large),
            _ => panic!("wrong kind"),
        }
        assert!(reader.window.capacity() >= DEFAULT_WINDOW * 4);
    }

    #[test]
    fn negative_length_not_matching_sentinel_is_an_error() {
        let mut buf = Vec::new();
        write_vint(&mut buf, -5).unwrap();
        write_vint(&mut buf, 1).unwrap();
        buf.push(b'x');

        let mut reader = RecordReader::new(&buf[..], RecordKind::Kv);
        let err = reader.next().unwrap_err();
        assert_eq!(err.kind(), CodecErrorKind::MalformedLength);
    }

    #[test]
    fn partial_sentinel_row_is_an_error() {
        // first field is EOF marker, second is a real (non-negative) length:
        // inconsistent sentinel row.
        let mut buf = Vec::new();
        write_vint(&mut buf, EOF_MARKER).unwrap();
        write_vint(&mut buf, 1).unwrap();
        buf.push(b'x');

        let mut reader = RecordReader::new(&buf[..], RecordKind::Kv);
        let err = reader.next().unwrap_err();
        assert_eq!(err.kind(), CodecErrorKind::MalformedLength);
    }
}
