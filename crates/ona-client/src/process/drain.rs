//! Background reader that owns the engine's stdout.
//!
//! The drain task is the single producer on the output channel. It never
//! forwards errors: when stdout ends or fails, the task exits and the closed
//! channel tells the [`BatchReader`](crate::batch::BatchReader) the engine is
//! gone.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle to the running drain task.
#[derive(Debug)]
pub struct OutputDrain {
    cancel: CancellationToken,
}

impl OutputDrain {
    /// Spawn the drain over `reader` and return it with the receiving end of
    /// its channel.
    pub fn spawn<R>(reader: R) -> (Self, mpsc::UnboundedReceiver<String>)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(drain_loop(reader, tx, cancel.clone()));
        (Self { cancel }, rx)
    }

    /// Stop the task. Lines already queued stay readable.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for OutputDrain {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn drain_loop<R>(reader: R, tx: mpsc::UnboundedSender<String>, cancel: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("output drain cancelled");
                break;
            }
            read = reader.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => {
                debug!("engine stdout closed");
                break;
            }
            Ok(_) => {
                // Lossy decoding keeps garbage bytes visible instead of
                // killing the drain on invalid UTF-8.
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim_end();
                if line.is_empty() {
                    continue;
                }
                if tx.send(line.to_string()).is_err() {
                    debug!("output receiver dropped, stopping drain");
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "error reading engine stdout");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn forwards_trimmed_non_empty_lines_in_order() {
        let input: &[u8] = b"first line  \n\n   \nsecond\r\nthird";
        let (_drain, mut rx) = OutputDrain::spawn(input);

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        assert_eq!(lines, vec!["first line", "second", "third"]);
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced_not_dropped() {
        let input: &[u8] = b"ok\n\xff\xfegarbage\nafter\n";
        let (_drain, mut rx) = OutputDrain::spawn(input);

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with("garbage"));
        assert_eq!(lines[2], "after");
    }

    #[tokio::test]
    async fn stop_closes_channel_while_writer_is_open() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let (drain, mut rx) = OutputDrain::spawn(reader);

        writer.write_all(b"hello\n").await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));

        drain.stop();
        assert_eq!(rx.recv().await, None);
        drop(writer);
    }
}
