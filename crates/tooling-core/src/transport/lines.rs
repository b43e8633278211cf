//! Newline-delimited JSON framing

use crate::error::{ToolingError, ToolingResult};
use crate::protocol::RpcMessage;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Reads one message per line
pub struct MessageReader<R> {
    reader: BufReader<R>,
    /// Line buffer for reading
    line_buffer: String,
    /// Set once the underlying stream failed
    failed: bool,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line_buffer: String::new(),
            failed: false,
        }
    }

    /// Read the next message.
    ///
    /// Returns `None` at end of stream and after a read failure. Blank lines
    /// are skipped. A line that is not a valid message, including one that
    /// is not UTF-8, yields `Some(Err(..))` and the stream stays usable.
    pub async fn next_message(&mut self) -> Option<ToolingResult<RpcMessage>> {
        if self.failed {
            return None;
        }

        loop {
            self.line_buffer.clear();

            let bytes_read = match self.reader.read_line(&mut self.line_buffer).await {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    return Some(Err(e.into()));
                }
                Err(e) => {
                    error!("Failed to read from input: {}", e);
                    self.failed = true;
                    return None;
                }
            };

            if bytes_read == 0 {
                return None;
            }

            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }

            return Some(serde_json::from_str(line).map_err(ToolingError::from));
        }
    }
}

/// Writes one message per line and flushes after each
pub struct MessageWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn write_message(&mut self, message: &RpcMessage) -> ToolingResult<()> {
        let json = serde_json::to_string(message)?;

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }
}

enum Frame {
    Message(RpcMessage),
    Close,
}

/// Cloneable handle that queues messages for the writer task
#[derive(Clone)]
pub struct Outbound {
    sender: mpsc::UnboundedSender<Frame>,
}

impl Outbound {
    /// Queue a message. Returns an error once the writer has stopped.
    pub fn send(&self, message: RpcMessage) -> ToolingResult<()> {
        self.sender
            .send(Frame::Message(message))
            .map_err(|_| ToolingError::connection_closed("Outbound channel closed"))
    }

    /// Ask the writer to flush what is queued and stop
    pub fn close(&self) {
        let _ = self.sender.send(Frame::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Spawn the writer task for `writer`
pub fn spawn_writer<W>(writer: W) -> (Outbound, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (sender, receiver) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_writer(MessageWriter::new(writer), receiver));
    (Outbound { sender }, handle)
}

async fn run_writer<W: AsyncWrite + Unpin>(
    mut writer: MessageWriter<W>,
    mut receiver: mpsc::UnboundedReceiver<Frame>,
) {
    while let Some(frame) = receiver.recv().await {
        match frame {
            Frame::Message(message) => {
                if let Err(e) = writer.write_message(&message).await {
                    error!("Failed to write message: {}", e);
                    break;
                }
            }
            Frame::Close => {
                debug!("Writer closed");
                break;
            }
        }
    }

    receiver.close();
    let dropped = std::iter::from_fn(|| receiver.try_recv().ok()).count();
    if dropped > 0 {
        warn!("Dropped {} unsent messages", dropped);
    }
}
