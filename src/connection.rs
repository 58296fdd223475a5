use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

/// Upper bound on the bytes returned by a single `receive_chunk` call.
pub const RECV_CHUNK_SIZE: usize = 1024;

pub struct Connection {
    stream: TcpStream,
}

impl Connection {
    /// Establishes the TCP connection. No retry: a refused or unreachable
    /// peer is terminal.
    pub async fn connect(address: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(address)
            .await
            .context("Failed to connect to server")?;
        Ok(Self { stream })
    }

    /// Sends the `LOGIN <username>` line. Fire-and-forget: no acknowledgment
    /// is awaited from the server.
    pub async fn login(&mut self, username: &str) -> Result<()> {
        self.stream
            .write_all(format!("LOGIN {username}\n").as_bytes())
            .await
            .context("Failed to send login")?;
        Ok(())
    }

    /// Splits the connection into its two independent directions, so the
    /// send and receive loops need no lock over the socket.
    pub fn into_split(self) -> (ConnectionReader, ConnectionWriter) {
        let (read_half, write_half) = self.stream.into_split();
        let reader = ConnectionReader {
            read_half,
            buffer: BytesMut::with_capacity(RECV_CHUNK_SIZE),
        };
        let writer = ConnectionWriter { write_half };
        (reader, writer)
    }
}

/// One bounded read's worth of inbound bytes. Chunks carry no framing: a
/// server message may span two chunks and one chunk may carry several
/// messages.
#[derive(Debug, PartialEq)]
pub enum Chunk {
    Data(Bytes),
    Closed,
}

pub struct ConnectionReader {
    read_half: OwnedReadHalf,
    buffer: BytesMut,
}

impl ConnectionReader {
    /// Reads up to `RECV_CHUNK_SIZE` bytes, blocking until the peer sends
    /// something or closes. A zero-length read is the peer's orderly
    /// shutdown.
    pub async fn receive_chunk(&mut self) -> Result<Chunk> {
        self.buffer.reserve(RECV_CHUNK_SIZE);
        let received = self.read_half.read_buf(&mut self.buffer).await?;
        if received == 0 {
            return Ok(Chunk::Closed);
        }
        Ok(Chunk::Data(self.buffer.split().freeze()))
    }
}

pub struct ConnectionWriter {
    write_half: OwnedWriteHalf,
}

impl ConnectionWriter {
    /// Transmits one line plus its `\n` delimiter. A short or failed write
    /// is an error; the caller must stop sending once one fails.
    pub async fn send(&mut self, line: &str) -> Result<()> {
        self.write_half.write_all(line.as_bytes()).await?;
        self.write_half.write_all(b"\n").await?;
        Ok(())
    }

    /// Half-closes the write direction. Errors are ignored: teardown is
    /// already underway when this is called.
    pub async fn close(mut self) {
        let _ = self.write_half.shutdown().await;
    }
}
