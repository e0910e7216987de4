//! Wire-level read/write primitives for the BufferExchange handshake
//! (spec.md 4.2, 6). Two legs are distinguished:
//!
//! 1. **Connect handshake**: once per TCP connection, the sink answers
//!    with a [`Connect`] decision as soon as it accepts the connection,
//!    and only on [`Connect::Open`] does the source name the
//!    `BufferType` it wants to talk about.
//! 2. **Per-batch exchange**: the source sends a preamble (data or
//!    close), a typed [`Header`], and — if the sink answered
//!    [`Transfer::Ready`] — the payload bytes named by the header. The
//!    sink's reply happens twice: once immediately after the header
//!    (the admission decision, from the header alone), and once more
//!    after the payload has been read and applied to the cursor (the
//!    final [`Transfer::Success`]/[`Transfer::Retry`] plus the handler's
//!    updated cursor). This mirrors the fact that a handler can reject a
//!    batch before paying for the transfer, but can only confirm receipt
//!    after the transfer completes.
//!
//! All integers are big-endian (spec.md 6).

use crate::enums::{BufferType, Connect, Transfer, CLOSE_PREAMBLE, DATA_PREAMBLE};
use crate::error::{Result, TransportErrorKind};
use crate::header::Header;
use byteorder::{BigEndian, ByteOrder};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// The handler's dedup cursor, shaped per `BufferType` (spec.md 4.2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CursorValue {
    Spill(i64),
    Progress(f32),
    Sequence(i64),
}

impl CursorValue {
    fn to_bytes(self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        match self {
            CursorValue::Spill(v) | CursorValue::Sequence(v) => {
                BigEndian::write_i64(&mut buf, v)
            }
            CursorValue::Progress(v) => {
                BigEndian::write_f32(&mut buf[..4], v);
            }
        }
        buf
    }

    fn from_bytes(kind: BufferType, buf: [u8; 8]) -> CursorValue {
        match kind {
            BufferType::File => CursorValue::Spill(BigEndian::read_i64(&buf)),
            BufferType::Snapshot => CursorValue::Progress(BigEndian::read_f32(&buf[..4])),
            BufferType::Stream | BufferType::PkvBuf => {
                CursorValue::Sequence(BigEndian::read_i64(&buf))
            }
        }
    }
}

/// Sent by a source immediately after connecting: which handler it
/// wants to talk to.
pub async fn write_buffer_type<W: AsyncWrite + Unpin>(w: &mut W, kind: BufferType) -> Result<()> {
    w.write_u8(kind.to_byte()).await?;
    Ok(())
}

pub async fn read_buffer_type<R: AsyncRead + Unpin>(r: &mut R) -> Result<BufferType> {
    let byte = r.read_u8().await?;
    BufferType::from_byte(byte)
}

/// The sink's reply to the connect handshake.
pub async fn write_connect<W: AsyncWrite + Unpin>(w: &mut W, decision: Connect) -> Result<()> {
    w.write_u8(decision.to_byte()).await?;
    Ok(())
}

pub async fn read_connect<R: AsyncRead + Unpin>(r: &mut R) -> Result<Connect> {
    let byte = r.read_u8().await?;
    Connect::from_byte(byte)
}

/// Writes the data preamble followed by the header, serialized through
/// `Header::write`'s synchronous `Write` impl into a scratch buffer.
pub async fn write_batch_header<W: AsyncWrite + Unpin>(w: &mut W, header: &Header) -> Result<()> {
    w.write_i32(DATA_PREAMBLE).await?;
    let mut buf = Vec::new();
    header.write(&mut buf)?;
    w.write_all(&buf).await?;
    Ok(())
}

/// Writes the close preamble, signaling the source has no more batches
/// for this connection (spec.md 6).
pub async fn write_close_preamble<W: AsyncWrite + Unpin>(w: &mut W) -> Result<()> {
    w.write_i32(CLOSE_PREAMBLE).await?;
    Ok(())
}

/// A header read off the wire, or `None` if the sender signaled close.
pub enum IncomingBatch {
    Header(Header),
    Close,
}

/// Byte length of each header shape on the wire (spec.md 6), used to
/// read a header's bytes eagerly before parsing them synchronously —
/// `Header::read_*` takes a blocking `std::io::Read`, and every header
/// is small and fixed-size, so there is no benefit to a second,
/// async-native parser for the same layout.
fn header_wire_len(kind: BufferType) -> usize {
    match kind {
        BufferType::File => 4 + 8 + 8 + 8 + 8 + 8 + 4 + 1,
        BufferType::Snapshot => 4 + 4 + 1 + 8,
        BufferType::Stream => 4 + 8 + 8,
        BufferType::PkvBuf => 4 + 8 + 8,
    }
}

pub async fn read_batch_header<R: AsyncRead + Unpin>(
    r: &mut R,
    kind: BufferType,
) -> Result<IncomingBatch> {
    let preamble = r.read_i32().await?;
    if preamble == CLOSE_PREAMBLE {
        return Ok(IncomingBatch::Close);
    }
    if preamble != DATA_PREAMBLE {
        return Err(TransportErrorKind::Protocol.into());
    }
    let mut buf = vec![0u8; header_wire_len(kind)];
    r.read_exact(&mut buf).await?;
    let mut cursor = std::io::Cursor::new(buf);
    let header = match kind {
        BufferType::File => Header::File(Header::read_file(&mut cursor)?),
        BufferType::Snapshot => Header::Snapshot(Header::read_snapshot(&mut cursor)?),
        BufferType::Stream => Header::Stream(Header::read_stream(&mut cursor)?),
        BufferType::PkvBuf => Header::PkvBuf(Header::read_pkvbuf(&mut cursor)?),
    };
    Ok(IncomingBatch::Header(header))
}

/// The sink's first-phase reply: an admission decision based on the
/// header alone, before any payload has been transferred.
pub async fn write_admission<W: AsyncWrite + Unpin>(w: &mut W, decision: Transfer) -> Result<()> {
    w.write_u8(decision.to_byte()).await?;
    Ok(())
}

pub async fn read_admission<R: AsyncRead + Unpin>(r: &mut R) -> Result<Transfer> {
    let byte = r.read_u8().await?;
    Transfer::from_byte(byte)
}

/// The sink's second-phase reply: the outcome after the payload has
/// been read and applied to the handler's cursor.
pub async fn write_completion<W: AsyncWrite + Unpin>(
    w: &mut W,
    outcome: Transfer,
    cursor: CursorValue,
) -> Result<()> {
    w.write_u8(outcome.to_byte()).await?;
    w.write_all(&cursor.to_bytes()).await?;
    Ok(())
}

pub async fn read_completion<R: AsyncRead + Unpin>(
    r: &mut R,
    kind: BufferType,
) -> Result<(Transfer, CursorValue)> {
    let byte = r.read_u8().await?;
    let outcome = Transfer::from_byte(byte)?;
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).await?;
    Ok((outcome, CursorValue::from_bytes(kind, buf)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::StreamHeader;
    use tokio::io::duplex;

    #[tokio::test]
    async fn connect_handshake_round_trips() {
        let (mut a, mut b) = duplex(64);
        write_connect(&mut b, Connect::Open).await.unwrap();
        let decision = read_connect(&mut a).await.unwrap();
        assert_eq!(decision, Connect::Open);

        write_buffer_type(&mut a, BufferType::Stream).await.unwrap();
        let kind = read_buffer_type(&mut b).await.unwrap();
        assert_eq!(kind, BufferType::Stream);
    }

    #[tokio::test]
    async fn batch_header_and_two_phase_reply_round_trip() {
        let (mut a, mut b) = duplex(256);
        let header = Header::Stream(StreamHeader {
            owner: 3,
            sequence: 7,
            bytes: 10,
        });
        write_batch_header(&mut a, &header).await.unwrap();
        let incoming = read_batch_header(&mut b, BufferType::Stream).await.unwrap();
        match incoming {
            IncomingBatch::Header(Header::Stream(h)) => assert_eq!(h, StreamHeader {
                owner: 3,
                sequence: 7,
                bytes: 10,
            }),
            _ => panic!("expected a stream header"),
        }

        write_admission(&mut b, Transfer::Ready).await.unwrap();
        assert_eq!(read_admission(&mut a).await.unwrap(), Transfer::Ready);

        write_completion(&mut b, Transfer::Success, CursorValue::Sequence(8))
            .await
            .unwrap();
        let (outcome, cursor) = read_completion(&mut a, BufferType::Stream).await.unwrap();
        assert_eq!(outcome, Transfer::Success);
        assert_eq!(cursor, CursorValue::Sequence(8));
    }

    #[tokio::test]
    async fn close_preamble_is_reported_as_close() {
        let (mut a, mut b) = duplex(64);
        write_close_preamble(&mut a).await.unwrap();
        match read_batch_header(&mut b, BufferType::Stream).await.unwrap() {
            IncomingBatch::Close => {}
            IncomingBatch::Header(_) => panic!("expected close"),
        }
    }
}
