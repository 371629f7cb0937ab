use std::collections::HashMap;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::WriteHalf;
use tokio::sync::mpsc;

use crate::http::response::{Frame, StatusCode};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Byte sink a response is written to.
pub trait Transport: AsyncWrite + Unpin + Send {
    /// Disables (`true`) or re-enables write coalescing. Sinks without
    /// such a knob ignore it.
    fn set_nodelay(&mut self, _on: bool) -> std::io::Result<()> {
        Ok(())
    }
}

impl Transport for TcpStream {
    fn set_nodelay(&mut self, on: bool) -> std::io::Result<()> {
        TcpStream::set_nodelay(self, on)
    }
}

impl Transport for WriteHalf<'_> {
    fn set_nodelay(&mut self, on: bool) -> std::io::Result<()> {
        AsRef::<TcpStream>::as_ref(self).set_nodelay(on)
    }
}

impl Transport for Vec<u8> {}

impl Transport for tokio::io::DuplexStream {}

fn serialize_head(status: StatusCode, headers: &HashMap<String, String>) -> Vec<u8> {
    let mut buf = Vec::new();

    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        status.as_u16(),
        status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    for (k, v) in headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    buf.extend_from_slice(b"\r\n");
    buf
}

/// Drains the frames queued by an [`Outgoing`](crate::http::response::Outgoing)
/// handle into a transport.
///
/// Status and headers are collected until the first body frame (or the end
/// of the response) and then committed in one write. Without an explicit
/// `Content-Length` the body is delimited by closing the connection.
pub struct ResponseWriter {
    frames: mpsc::UnboundedReceiver<Frame>,
    status: StatusCode,
    headers: HashMap<String, String>,
    head_sent: bool,
    written: usize,
}

impl ResponseWriter {
    pub fn new(frames: mpsc::UnboundedReceiver<Frame>) -> Self {
        Self {
            frames,
            status: StatusCode::Ok,
            headers: HashMap::new(),
            head_sent: false,
            written: 0,
        }
    }

    /// Body bytes written so far.
    pub fn body_len(&self) -> usize {
        self.written
    }

    async fn commit_head<T: Transport>(&mut self, stream: &mut T) -> anyhow::Result<()> {
        if self.head_sent {
            return Ok(());
        }
        let has_length = self
            .headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case("Content-Length"));
        if !has_length {
            self.headers
                .insert("Connection".to_string(), "close".to_string());
        }
        stream
            .write_all(&serialize_head(self.status, &self.headers))
            .await?;
        self.head_sent = true;
        Ok(())
    }

    /// Runs until the response ends, then flushes. If every handle is dropped
    /// without ending, the response is ended implicitly.
    pub async fn write_to_stream<T: Transport>(&mut self, stream: &mut T) -> anyhow::Result<()> {
        while let Some(frame) = self.frames.recv().await {
            match frame {
                Frame::Status(status) if self.head_sent => {
                    tracing::warn!(status = status.as_u16(), "status set after head was sent");
                }
                Frame::Status(status) => self.status = status,
                Frame::Header(key, _) if self.head_sent => {
                    tracing::warn!(header = %key, "header set after head was sent");
                }
                Frame::Header(key, value) => {
                    self.headers.insert(key, value);
                }
                Frame::NoDelay(on) => {
                    if let Err(e) = stream.set_nodelay(on) {
                        tracing::debug!(error = %e, "failed to toggle nodelay");
                    }
                }
                Frame::Data(chunk) => {
                    self.commit_head(stream).await?;
                    stream.write_all(&chunk).await?;
                    stream.flush().await?;
                    self.written += chunk.len();
                }
                Frame::Pipe(mut reader) => {
                    self.commit_head(stream).await?;
                    let n = tokio::io::copy(&mut reader, stream).await?;
                    self.written += n as usize;
                    break;
                }
                Frame::End => break,
            }
        }

        self.commit_head(stream).await?;
        stream.flush().await?;
        Ok(())
    }
}
