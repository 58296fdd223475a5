use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Cloneable handle through which both session loops emit console lines.
///
/// All output funnels into a single-consumer channel drained by one writer
/// task, so concurrent writes can never tear a line.
#[derive(Clone)]
pub struct OutputSink {
    tx: mpsc::UnboundedSender<String>,
}

impl OutputSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues a server-originated line, written verbatim.
    pub fn message(&self, text: impl Into<String>) {
        // The writer only goes away at shutdown; a line queued after that
        // would never be seen anyway.
        let _ = self.tx.send(text.into());
    }

    /// Queues a client status notice.
    pub fn status(&self, text: &str) {
        let _ = self.tx.send(format_status(text));
    }
}

/// Decorates a status notice so it stands apart from chat traffic.
pub fn format_status(text: &str) -> String {
    format!("* {text}")
}

/// Prepares one received chunk for display. The chunk's own trailing
/// newline (present when the server sent a complete line) would otherwise
/// double with the one the writer appends.
pub fn format_incoming(chunk: &[u8]) -> String {
    let text = String::from_utf8_lossy(chunk);
    match text.strip_suffix('\n') {
        Some(stripped) => stripped.to_string(),
        None => text.into_owned(),
    }
}

/// Drains queued lines into `out`, one `write_all` per line, until every
/// sink handle has been dropped.
pub async fn write_lines(mut rx: mpsc::UnboundedReceiver<String>, mut out: impl AsyncWrite + Unpin) {
    while let Some(line) = rx.recv().await {
        if out.write_all(format!("{line}\n").as_bytes()).await.is_err() {
            break;
        }
    }
    let _ = out.flush().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_incoming_strips_one_trailing_newline() {
        assert_eq!(format_incoming(b"[ana] hi\n"), "[ana] hi");
        assert_eq!(format_incoming(b"partial messa"), "partial messa");
        assert_eq!(format_incoming(b"one\ntwo\n"), "one\ntwo");
    }

    #[test]
    fn test_format_incoming_tolerates_invalid_utf8() {
        assert_eq!(format_incoming(&[0x68, 0x69, 0xff]), "hi\u{fffd}");
    }

    #[test]
    fn test_format_status() {
        assert_eq!(format_status("Server disconnected."), "* Server disconnected.");
    }
}
