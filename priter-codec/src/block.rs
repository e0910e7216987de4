//! Optional block-compression and trailing-checksum layer that a record
//! stream can be wrapped in (spec.md 4.1). Compression is deflate via
//! `flate2`; the trailing checksum is CRC32 via `crc32fast` — both drawn
//! from the `vectordotdev-vector` pack repo's disk buffer codec, which
//! pairs exactly these two crates for the same purpose.
//!
//! The trailer format (not specified by spec.md, which only requires
//! that *a* trailing checksum exist) is a big-endian `u32` CRC32 of the
//! decompressed bytes followed by a big-endian `u64` decompressed byte
//! count, appended after the compressed stream.

use crate::error::{CodecErrorKind, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Wraps an underlying writer with deflate compression and CRC32
/// checksumming of the pre-compression bytes.
pub struct BlockWriter<W: Write> {
    encoder: DeflateEncoder<W>,
    hasher: Hasher,
    decompressed_bytes: u64,
}

impl<W: Write> BlockWriter<W> {
    /// Wraps `inner` with the default compression level.
    pub fn new(inner: W) -> Self {
        Self {
            encoder: DeflateEncoder::new(inner, Compression::default()),
            hasher: Hasher::new(),
            decompressed_bytes: 0,
        }
    }

    /// Flushes the compressor, writes the trailing checksum segment, and
    /// returns the underlying writer along with the final counts.
    pub fn finish(mut self) -> Result<(W, BlockStats)> {
        self.encoder.flush()?;
        let compressed_bytes = self.encoder.total_out();
        let mut inner = self.encoder.finish()?;
        let crc = self.hasher.finalize();
        inner.write_u32::<BigEndian>(crc)?;
        inner.write_u64::<BigEndian>(self.decompressed_bytes)?;
        Ok((
            inner,
            BlockStats {
                decompressed_bytes: self.decompressed_bytes,
                compressed_bytes,
            },
        ))
    }
}

impl<W: Write> Write for BlockWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.encoder.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.decompressed_bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.encoder.flush()
    }
}

/// Final byte counts published by `BlockWriter::finish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStats {
    /// Bytes written before compression.
    pub decompressed_bytes: u64,
    /// Bytes written to the underlying writer (compressed stream only,
    /// excluding the trailer).
    pub compressed_bytes: u64,
}

/// Wraps an underlying reader with deflate decompression and CRC32
/// verification against the trailer written by `BlockWriter`.
pub struct BlockReader<R: Read> {
    decoder: DeflateDecoder<R>,
    hasher: Hasher,
}

impl<R: Read> BlockReader<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            decoder: DeflateDecoder::new(inner),
            hasher: Hasher::new(),
        }
    }

    /// Consumes the reader once the decompressed stream has been fully
    /// read (the caller must have read to EOF, e.g. via `RecordReader`
    /// observing the sentinel row), verifying the trailing checksum.
    pub fn finish(self) -> Result<R> {
        let mut inner = self.decoder.into_inner();
        let stored_crc = inner.read_u32::<BigEndian>()?;
        let _stored_len = inner.read_u64::<BigEndian>()?;
        let computed = self.hasher.finalize();
        if computed != stored_crc {
            return Err(CodecErrorKind::ChecksumMismatch.into());
        }
        Ok(inner)
    }
}

impl<R: Read> Read for BlockReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.decoder.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
