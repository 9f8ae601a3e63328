//! Transport abstraction for the host's command interface.
//!
//! Implementation details (TCP, in-memory channels) are hidden behind
//! the [`TransportDuplex`] trait so the server/client framing and the
//! tests never care which one is underneath.
//!
//! Frames on the wire are a little-endian u32 length followed by that
//! many payload bytes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Upper bound on a single frame. Anything larger is a protocol error,
/// not a legitimate command.
const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// A request/response byte transport. One `recv_bytes` is expected to
/// be answered by one `send_bytes`.
#[async_trait]
pub trait TransportDuplex: Send + Sync {
    /// Receive the next full frame/message as bytes.
    async fn recv_bytes(&mut self) -> Result<Vec<u8>>;

    /// Send a full frame/message.
    async fn send_bytes(&mut self, data: &[u8]) -> Result<()>;
}

async fn read_frame(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let len = stream.read_u32_le().await.context("Connection closed")?;
    if len > MAX_FRAME_BYTES {
        anyhow::bail!("Frame of {} bytes exceeds protocol limit", len);
    }
    let mut buf = vec![0u8; len as usize];
    stream
        .read_exact(&mut buf)
        .await
        .context("Failed to read frame payload")?;
    Ok(buf)
}

async fn write_frame(stream: &mut TcpStream, data: &[u8]) -> Result<()> {
    stream.write_u32_le(data.len() as u32).await?;
    stream.write_all(data).await?;
    stream.flush().await?;
    Ok(())
}

/// Server side of the command interface. Accepts one client at a time
/// (REP-style): a connection is served until it disconnects, then the
/// next one is accepted.
pub struct TcpServerDuplex {
    listener: TcpListener,
    conn: Option<TcpStream>,
}

impl TcpServerDuplex {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind command interface to {}", addr))?;
        Ok(Self {
            listener,
            conn: None,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

#[async_trait]
impl TransportDuplex for TcpServerDuplex {
    async fn recv_bytes(&mut self) -> Result<Vec<u8>> {
        loop {
            if self.conn.is_none() {
                let (stream, _peer) = self
                    .listener
                    .accept()
                    .await
                    .context("Failed to accept connection")?;
                self.conn = Some(stream);
            }
            if let Some(stream) = self.conn.as_mut() {
                match read_frame(stream).await {
                    Ok(frame) => return Ok(frame),
                    // Client went away; wait for the next one.
                    Err(_) => self.conn = None,
                }
            }
        }
    }

    async fn send_bytes(&mut self, data: &[u8]) -> Result<()> {
        match self.conn.as_mut() {
            Some(stream) => write_frame(stream, data).await,
            None => anyhow::bail!("No client connected to respond to"),
        }
    }
}

/// Client side of the command interface.
pub struct TcpClientDuplex {
    stream: TcpStream,
}

impl TcpClientDuplex {
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("Failed to connect to {}", addr))?;
        Ok(Self { stream })
    }
}

#[async_trait]
impl TransportDuplex for TcpClientDuplex {
    async fn recv_bytes(&mut self) -> Result<Vec<u8>> {
        read_frame(&mut self.stream).await
    }

    async fn send_bytes(&mut self, data: &[u8]) -> Result<()> {
        write_frame(&mut self.stream, data).await
    }
}

/// In-memory transport over tokio MPSC channels, mainly for tests.
pub struct MemoryDuplex {
    sender: mpsc::Sender<Vec<u8>>,
    receiver: mpsc::Receiver<Vec<u8>>,
}

impl MemoryDuplex {
    /// Creates two connected endpoints: what one sends, the other
    /// receives.
    pub fn pair() -> (MemoryDuplex, MemoryDuplex) {
        let (a_tx, a_rx) = mpsc::channel(32);
        let (b_tx, b_rx) = mpsc::channel(32);
        (
            MemoryDuplex {
                sender: a_tx,
                receiver: b_rx,
            },
            MemoryDuplex {
                sender: b_tx,
                receiver: a_rx,
            },
        )
    }
}

#[async_trait]
impl TransportDuplex for MemoryDuplex {
    async fn recv_bytes(&mut self) -> Result<Vec<u8>> {
        self.receiver
            .recv()
            .await
            .ok_or_else(|| anyhow::anyhow!("Memory channel closed"))
    }

    async fn send_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.sender
            .send(data.to_vec())
            .await
            .map_err(|_| anyhow::anyhow!("Failed to send to memory channel"))
    }
}
