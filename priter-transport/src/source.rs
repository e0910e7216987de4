//! The `Source` half of BufferExchange: a TCP client that opens one
//! connection per `(remote, BufferType)`, runs the connect handshake,
//! and sends batches through the two-phase exchange with retry on I/O
//! failure (spec.md 7: "A Source retries a batch on I/O error with
//! exponential backoff up to a configured ceiling before giving up").

use crate::enums::{BufferType, Connect, Transfer};
use crate::error::{Result, TransportErrorKind};
use crate::header::Header;
use crate::protocol::{
    read_admission, read_completion, read_connect, write_batch_header, write_buffer_type,
    write_close_preamble, CursorValue,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Retry policy for a single batch send (spec.md 7).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Dials `addr` and runs the connect handshake: the sink replies with
/// its `Connect` decision first, and only on `Open` does the source
/// name the `BufferType` it wants to talk about (spec.md 4.2, 6).
async fn handshake(addr: SocketAddr, buffer_type: BufferType) -> Result<TcpStream> {
    let mut stream = TcpStream::connect(addr).await?;
    match read_connect(&mut stream).await? {
        Connect::Open => {
            write_buffer_type(&mut stream, buffer_type).await?;
            Ok(stream)
        }
        Connect::ConnectionsFull => Err(TransportErrorKind::ConnectionsFull.into()),
        Connect::BufferComplete | Connect::Closed => Err(TransportErrorKind::Terminated.into()),
        Connect::Error => Err(TransportErrorKind::Protocol.into()),
    }
}

/// A connected, handshaken endpoint ready to send batches of one
/// `BufferType` to one remote `Sink`.
pub struct Source {
    stream: TcpStream,
    addr: SocketAddr,
    buffer_type: BufferType,
    terminated: bool,
}

impl Source {
    /// Connects and runs the connect handshake. Returns
    /// `TransportErrorKind::ConnectionsFull` if the remote has no free
    /// handler slot, or `Terminated` if the remote has permanently
    /// closed this buffer.
    pub async fn connect(addr: SocketAddr, buffer_type: BufferType) -> Result<Self> {
        let stream = handshake(addr, buffer_type).await?;
        Ok(Self {
            stream,
            addr,
            buffer_type,
            terminated: false,
        })
    }

    /// Closes the current connection and redials, per spec.md 7: "A
    /// RETRY forces a close-and-reconnect," not a resend on the same
    /// socket.
    async fn reconnect(&mut self) -> Result<()> {
        let _ = self.stream.shutdown().await;
        self.stream = handshake(self.addr, self.buffer_type).await?;
        Ok(())
    }

    /// Sends one batch, retrying the full round trip on I/O error with
    /// exponential backoff. Returns the sink's final cursor on success.
    pub async fn send_batch(
        &mut self,
        header: &Header,
        payload: &[u8],
        policy: RetryPolicy,
    ) -> Result<CursorValue> {
        if self.terminated {
            return Err(TransportErrorKind::Terminated.into());
        }

        let mut backoff = policy.initial_backoff;
        let mut last_err = None;

        for attempt in 0..policy.max_attempts {
            match self.try_send_once(header, payload).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    match err.kind() {
                        TransportErrorKind::Terminated => {
                            self.terminated = true;
                            return Err(err);
                        }
                        TransportErrorKind::Retry => {
                            debug!(attempt, "sink replied RETRY, closing and reconnecting");
                            self.reconnect().await?;
                        }
                        _ => {
                            warn!(attempt, %err, "batch send failed, retrying");
                        }
                    }
                    last_err = Some(err);
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(policy.max_backoff);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| TransportErrorKind::Io.into()))
    }

    async fn try_send_once(&mut self, header: &Header, payload: &[u8]) -> Result<CursorValue> {
        write_batch_header(&mut self.stream, header).await?;

        let admission = read_admission(&mut self.stream).await?;
        match admission {
            Transfer::Ready => {}
            Transfer::Ignore => {
                debug!("sink ignored a replayed batch");
                return Ok(CursorValue::Sequence(-1));
            }
            Transfer::Retry => return Err(TransportErrorKind::Retry.into()),
            Transfer::Terminate | Transfer::Closed => {
                return Err(TransportErrorKind::Terminated.into())
            }
            Transfer::Success => return Err(TransportErrorKind::Protocol.into()),
        }

        self.stream.write_all(payload).await?;

        let (outcome, cursor) = read_completion(&mut self.stream, self.buffer_type).await?;
        match outcome {
            Transfer::Success => Ok(cursor),
            Transfer::Ignore => {
                debug!("sink ignored a batch it had already admitted");
                Ok(CursorValue::Sequence(-1))
            }
            Transfer::Retry => Err(TransportErrorKind::Retry.into()),
            Transfer::Terminate | Transfer::Closed => {
                Err(TransportErrorKind::Terminated.into())
            }
            Transfer::Ready => Err(TransportErrorKind::Protocol.into()),
        }
    }

    /// Signals the remote that no more batches are coming on this
    /// connection (spec.md 6 close preamble).
    pub async fn close(mut self) -> Result<()> {
        write_close_preamble(&mut self.stream).await?;
        self.stream.shutdown().await?;
        Ok(())
    }
}
