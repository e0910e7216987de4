use crate::error::{CodecErrorKind, Result};
use crate::record::{Record, RecordKind};
use crate::vint::{write_vint, EOF_MARKER};
use std::io::Write;

/// Running totals published once a `RecordWriter` is closed (spec.md
/// 4.1: "updates running totals of (decompressed, compressed) bytes and
/// record count").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecStats {
    /// Bytes written before any compression layer, including framing.
    pub decompressed_bytes: u64,
    /// Bytes actually written to the underlying writer, including
    /// framing. Equal to `decompressed_bytes` unless `W` itself is a
    /// compressing writer (see `crate::block`).
    pub compressed_bytes: u64,
    /// Number of data records written (the EOF sentinel is not counted).
    pub record_count: u64,
}

/// Writes a homogeneous stream of one `RecordKind`, terminated by an EOF
/// sentinel row, to an underlying `Write`r.
pub struct RecordWriter<W: Write> {
    writer: W,
    kind: RecordKind,
    stats: CodecStats,
    closed: bool,
}

impl<W: Write> RecordWriter<W> {
    /// Creates a writer fixed to `kind` for its whole lifetime.
    pub fn new(writer: W, kind: RecordKind) -> Self {
        Self {
            writer,
            kind,
            stats: CodecStats::default(),
            closed: false,
        }
    }

    /// Appends `record`; its kind must match this writer's fixed kind.
    pub fn append(&mut self, record: &Record) -> Result<()> {
        if record.kind() != self.kind {
            return Err(CodecErrorKind::KindMismatch.into());
        }
        let mut written = 0u64;
        for field in record.fields() {
            written += write_field(&mut self.writer, field)?;
        }
        self.stats.decompressed_bytes += written;
        self.stats.compressed_bytes += written;
        self.stats.record_count += 1;
        Ok(())
    }

    /// `appendKV`
    pub fn append_kv(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.append(&Record::Kv {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// `appendPKV`
    pub fn append_pkv(&mut self, priority: &[u8], key: &[u8], value: &[u8]) -> Result<()> {
        self.append(&Record::Pkv {
            priority: priority.to_vec(),
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// `appendStateRec`
    pub fn append_state_rec(&mut self, key: &[u8], i_state: &[u8], c_state: &[u8]) -> Result<()> {
        self.append(&Record::StateRec {
            key: key.to_vec(),
            i_state: i_state.to_vec(),
            c_state: c_state.to_vec(),
        })
    }

    /// `appendPQRec`
    pub fn append_pq_rec(&mut self, key: &[u8], i_state: &[u8], static_data: &[u8]) -> Result<()> {
        self.append(&Record::PqRec {
            key: key.to_vec(),
            i_state: i_state.to_vec(),
            static_data: static_data.to_vec(),
        })
    }

    /// `appendStaticRec`
    pub fn append_static_rec(&mut self, key: &[u8], static_data: &[u8]) -> Result<()> {
        self.append(&Record::StaticRec {
            key: key.to_vec(),
            static_data: static_data.to_vec(),
        })
    }

    /// Writes the EOF sentinel row (one marker per field slot) and
    /// flushes the underlying writer. Returns the final totals.
    ///
    /// Idempotent: calling `close` twice returns the same stats without
    /// writing a second sentinel row.
    pub fn close(&mut self) -> Result<CodecStats> {
        if !self.closed {
            let mut written = 0u64;
            for _ in 0..self.kind.field_count() {
                written += vint_len(EOF_MARKER) as u64;
                write_vint(&mut self.writer, EOF_MARKER)?;
            }
            self.writer.flush()?;
            self.stats.decompressed_bytes += written;
            self.stats.compressed_bytes += written;
            self.closed = true;
        }
        Ok(self.stats)
    }

    /// Current running totals without closing the stream.
    pub fn stats(&self) -> CodecStats {
        self.stats
    }

    /// Consumes the writer and returns the underlying `W`, e.g. to hand
    /// a `BlockWriter` back to `block::BlockWriter::finish` once the
    /// record stream has been closed. Callers are responsible for
    /// calling `close` first; this does not write the EOF row itself.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn write_field<W: Write>(w: &mut W, field: &[u8]) -> Result<u64> {
    write_vint(w, field.len() as i64)?;
    w.write_all(field)?;
    Ok(vint_len(field.len() as i64) as u64 + field.len() as u64)
}

fn vint_len(value: i64) -> usize {
    let mut buf = Vec::with_capacity(9);
    // infallible: writing to a Vec never fails
    write_vint(&mut buf, value).expect("vint encode into Vec cannot fail");
    buf.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::RecordReader;

    #[test]
    fn writes_and_closes_kv_stream() {
        let mut buf = Vec::new();
        {
            let mut writer = RecordWriter::new(&mut buf, RecordKind::Kv);
            writer.append_kv(b"k1", b"v1").unwrap();
            writer.append_kv(b"k2", b"v2").unwrap();
            let stats = writer.close().unwrap();
            assert_eq!(stats.record_count, 2);
        }

        let mut reader = RecordReader::new(&buf[..], RecordKind::Kv);
        let r1 = reader.next().unwrap().unwrap();
        assert_eq!(
            r1,
            Record::Kv {
                key: b"k1".to_vec(),
                value: b"v1".to_vec()
            }
        );
        let r2 = reader.next().unwrap().unwrap();
        assert_eq!(
            r2,
            Record::Kv {
                key: b"k2".to_vec(),
                value: b"v2".to_vec()
            }
        );
        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn zero_length_field_is_not_eof() {
        let mut buf = Vec::new();
        {
            let mut writer = RecordWriter::new(&mut buf, RecordKind::Kv);
            writer.append_kv(b"", b"v").unwrap();
            writer.close().unwrap();
        }
        let mut reader = RecordReader::new(&buf[..], RecordKind::Kv);
        let record = reader.next().unwrap().unwrap();
        assert_eq!(
            record,
            Record::Kv {
                key: Vec::new(),
                value: b"v".to_vec()
            }
        );
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let mut buf = Vec::new();
        let mut writer = RecordWriter::new(&mut buf, RecordKind::Kv);
        let err = writer
            .append(&Record::StaticRec {
                key: b"k".to_vec(),
                static_data: b"d".to_vec(),
            })
            .unwrap_err();
        assert_eq!(err.kind(), CodecErrorKind::KindMismatch);
    }
}
