//! Message transport
//!
//! The session only sees whole JSON values. Framing lives behind [`Transport`]
//! so tests can script a conversation without any byte-level encoding.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest message body accepted from the client
pub const MAX_CONTENT_LENGTH: usize = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame arrived but its body is not a JSON value
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait Transport: Send {
    /// Next message from the client, or `None` once the stream has ended
    async fn receive(&mut self) -> Result<Option<Value>, TransportError>;

    async fn send(&mut self, message: Value) -> Result<(), TransportError>;
}

/// `Content-Length` framed JSON-RPC over a pair of byte streams
pub struct StdioTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }

    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut content_length: Option<usize> = None;
        let mut header = String::new();
        let mut read_any = false;

        loop {
            header.clear();
            let n = self.reader.read_line(&mut header).await?;
            if n == 0 {
                if read_any {
                    return Err(TransportError::InvalidHeader(
                        "stream ended inside header".to_string(),
                    ));
                }
                return Ok(None);
            }
            read_any = true;

            let trimmed = header.trim();
            if trimmed.is_empty() {
                break;
            }

            let Some((name, value)) = trimmed.split_once(':') else {
                return Err(TransportError::InvalidHeader(trimmed.to_string()));
            };
            if name.trim().eq_ignore_ascii_case("Content-Length") {
                let length = value
                    .trim()
                    .parse()
                    .map_err(|_| TransportError::InvalidHeader(trimmed.to_string()))?;
                content_length = Some(length);
            }
        }

        let length = content_length
            .ok_or_else(|| TransportError::InvalidHeader("missing Content-Length".to_string()))?;
        if length > MAX_CONTENT_LENGTH {
            return Err(TransportError::InvalidHeader(format!(
                "Content-Length {} exceeds the {} byte limit",
                length, MAX_CONTENT_LENGTH
            )));
        }
        let mut body = vec![0u8; length];
        self.reader.read_exact(&mut body).await?;
        Ok(Some(body))
    }
}

#[async_trait]
impl<R, W> Transport for StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn receive(&mut self) -> Result<Option<Value>, TransportError> {
        let Some(body) = self.read_frame().await? else {
            return Ok(None);
        };

        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| TransportError::Malformed(e.to_string()))
    }

    async fn send(&mut self, message: Value) -> Result<(), TransportError> {
        let body = message.to_string();
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        self.writer.write_all(header.as_bytes()).await?;
        self.writer.write_all(body.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
