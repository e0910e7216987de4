//! Header types carried at the transport layer (spec.md 3). All
//! integers are big-endian on the wire (spec.md 6).

use crate::error::Result;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use priter_core::TaskId;
use std::io::{Read, Write};

/// Ordered, resumable header for the FILE buffer type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileHeader {
    pub owner: TaskId,
    pub run_id: u64,
    /// Inclusive range of spill-ids carried by this batch.
    pub first_id: i64,
    pub last_id: i64,
    pub compressed: u64,
    pub decompressed: u64,
    pub progress: f32,
    pub eof: bool,
}

/// Idempotent-by-`progress` header for the SNAPSHOT buffer type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotHeader {
    pub owner: TaskId,
    pub progress: f32,
    pub eof: bool,
    pub bytes: u64,
}

/// Strictly-sequenced header for the STREAM buffer type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamHeader {
    pub owner: TaskId,
    pub sequence: i64,
    pub bytes: u64,
}

/// One-per-iteration-per-source header for the PKVBUF buffer type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PkvBufferHeader {
    pub owner: TaskId,
    pub iteration: i64,
    pub bytes: u64,
}

/// The four header shapes, tagged for dispatch by `BufferType`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Header {
    File(FileHeader),
    Snapshot(SnapshotHeader),
    Stream(StreamHeader),
    PkvBuf(PkvBufferHeader),
}

impl Header {
    pub fn owner(&self) -> TaskId {
        match self {
            Header::File(h) => h.owner,
            Header::Snapshot(h) => h.owner,
            Header::Stream(h) => h.owner,
            Header::PkvBuf(h) => h.owner,
        }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        match self {
            Header::File(h) => {
                w.write_u32::<BigEndian>(h.owner)?;
                w.write_u64::<BigEndian>(h.run_id)?;
                w.write_i64::<BigEndian>(h.first_id)?;
                w.write_i64::<BigEndian>(h.last_id)?;
                w.write_u64::<BigEndian>(h.compressed)?;
                w.write_u64::<BigEndian>(h.decompressed)?;
                w.write_f32::<BigEndian>(h.progress)?;
                w.write_u8(h.eof as u8)?;
            }
            Header::Snapshot(h) => {
                w.write_u32::<BigEndian>(h.owner)?;
                w.write_f32::<BigEndian>(h.progress)?;
                w.write_u8(h.eof as u8)?;
                w.write_u64::<BigEndian>(h.bytes)?;
            }
            Header::Stream(h) => {
                w.write_u32::<BigEndian>(h.owner)?;
                w.write_i64::<BigEndian>(h.sequence)?;
                w.write_u64::<BigEndian>(h.bytes)?;
            }
            Header::PkvBuf(h) => {
                w.write_u32::<BigEndian>(h.owner)?;
                w.write_i64::<BigEndian>(h.iteration)?;
                w.write_u64::<BigEndian>(h.bytes)?;
            }
        }
        Ok(())
    }

    pub fn read_file<R: Read>(r: &mut R) -> Result<FileHeader> {
        Ok(FileHeader {
            owner: r.read_u32::<BigEndian>()?,
            run_id: r.read_u64::<BigEndian>()?,
            first_id: r.read_i64::<BigEndian>()?,
            last_id: r.read_i64::<BigEndian>()?,
            compressed: r.read_u64::<BigEndian>()?,
            decompressed: r.read_u64::<BigEndian>()?,
            progress: r.read_f32::<BigEndian>()?,
            eof: r.read_u8()? != 0,
        })
    }

    pub fn read_snapshot<R: Read>(r: &mut R) -> Result<SnapshotHeader> {
        Ok(SnapshotHeader {
            owner: r.read_u32::<BigEndian>()?,
            progress: r.read_f32::<BigEndian>()?,
            eof: r.read_u8()? != 0,
            bytes: r.read_u64::<BigEndian>()?,
        })
    }

    pub fn read_stream<R: Read>(r: &mut R) -> Result<StreamHeader> {
        Ok(StreamHeader {
            owner: r.read_u32::<BigEndian>()?,
            sequence: r.read_i64::<BigEndian>()?,
            bytes: r.read_u64::<BigEndian>()?,
        })
    }

    pub fn read_pkvbuf<R: Read>(r: &mut R) -> Result<PkvBufferHeader> {
        Ok(PkvBufferHeader {
            owner: r.read_u32::<BigEndian>()?,
            iteration: r.read_i64::<BigEndian>()?,
            bytes: r.read_u64::<BigEndian>()?,
        })
    }
}
