use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;

use crate::connection::{Chunk, ConnectionReader, ConnectionWriter};
use crate::console::{self, OutputSink};

/// The reserved input token that ends the session on purpose. It is still
/// transmitted, so the server can clean up its side.
pub const QUIT_SENTINEL: &str = "/quit";

/// One connect-to-disconnect lifetime: the split connection, the output
/// sink shared by both loops, and the username fixed at login.
pub struct Session {
    username: String,
    reader: ConnectionReader,
    writer: ConnectionWriter,
    sink: OutputSink,
}

impl Session {
    pub fn new(
        username: String,
        reader: ConnectionReader,
        writer: ConnectionWriter,
        sink: OutputSink,
    ) -> Self {
        Self {
            username,
            reader,
            writer,
            sink,
        }
    }

    /// Runs the duplex session: the receive loop as a spawned task, the
    /// send loop on the current one. Returns once both loops have
    /// terminated and the connection's write half is closed.
    pub async fn run(self, input: impl AsyncBufRead + Unpin) -> Result<()> {
        let Session {
            username,
            reader,
            writer,
            sink,
        } = self;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let receiver = tokio::spawn(receive_loop(reader, sink.clone(), shutdown_rx));

        send_loop(input, writer, &sink).await;

        // The write half is closed; tell the receive loop to stop waiting
        // on the socket instead of relying on close-unblocks-read
        // platform semantics.
        let _ = shutdown_tx.send(true);
        receiver.await?;

        info!("Session ended. username={username}");
        Ok(())
    }
}

/// Surfaces every received chunk through the sink, in delivery order,
/// until the peer closes, a read fails, or the send path signals shutdown.
/// Any receive failure is terminal: the loop never resumes.
async fn receive_loop(
    mut reader: ConnectionReader,
    sink: OutputSink,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            chunk = reader.receive_chunk() => {
                match chunk {
                    Ok(Chunk::Data(data)) => {
                        debug!("Received {} bytes", data.len());
                        sink.message(console::format_incoming(&data));
                    }
                    Ok(Chunk::Closed) => {
                        info!("Server closed the connection");
                        sink.status("Server disconnected.");
                        break;
                    }
                    Err(err) => {
                        warn!("Receive failed: {err}");
                        sink.status("Error receiving data.");
                        break;
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                // User-initiated shutdown, not a disconnect: no notice.
                break;
            }
        }
    }
}

/// Forwards each input line to the server until the quit sentinel, input
/// exhaustion, or a failed send. Closes the write half on every exit path.
async fn send_loop(
    input: impl AsyncBufRead + Unpin,
    mut writer: ConnectionWriter,
    sink: &OutputSink,
) {
    let mut lines = input.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line == QUIT_SENTINEL {
                    // Best effort: shutdown is already underway if this
                    // fails, so the failure is not reported.
                    let _ = writer.send(QUIT_SENTINEL).await;
                    break;
                }
                if let Err(err) = writer.send(&line).await {
                    warn!("Send failed: {err}");
                    sink.status("Failed to send message.");
                    break;
                }
            }
            // End of console input is an implicit quit.
            Ok(None) => break,
            Err(err) => {
                warn!("Console input failed: {err}");
                break;
            }
        }
    }
    writer.close().await;
}
