use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};

/// HTTP status codes the server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 202 Accepted, the provisional status of a delayed response
    Accepted,
    /// 204 No Content
    NoContent,
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// ```
    /// # use holdfast::http::response::StatusCode;
    /// assert_eq!(StatusCode::Accepted.as_u16(), 202);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Accepted => 202,
            StatusCode::NoContent => 204,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
        }
    }

    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Accepted => "Accepted",
            StatusCode::NoContent => "No Content",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

/// A complete, buffered response. Used for routes that answer immediately.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Fluent builder for [`Response`].
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the response, filling in `Content-Length` unless already set.
    pub fn build(mut self) -> Response {
        self.headers
            .entry("Content-Length".to_string())
            .or_insert_with(|| self.body.len().to_string());

        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Response {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        ResponseBuilder::new(StatusCode::Ok).body(body).build()
    }

    pub fn not_found() -> Self {
        ResponseBuilder::new(StatusCode::NotFound)
            .body(b"404 Not Found".to_vec())
            .build()
    }

    pub fn bad_request() -> Self {
        ResponseBuilder::new(StatusCode::BadRequest)
            .body(b"400 Bad Request".to_vec())
            .build()
    }
}

/// Byte sources that can be piped into a response body.
pub type BodyReader = Box<dyn AsyncRead + Send + Unpin>;

/// One instruction from a response handle to the connection writer.
pub enum Frame {
    Status(StatusCode),
    Header(String, String),
    /// Toggle transport-level write coalescing (Nagle) off (`true`) or on.
    NoDelay(bool),
    Data(Bytes),
    Pipe(BodyReader),
    End,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Frame::Status(s) => f.debug_tuple("Status").field(s).finish(),
            Frame::Header(k, v) => f.debug_tuple("Header").field(k).field(v).finish(),
            Frame::NoDelay(on) => f.debug_tuple("NoDelay").field(on).finish(),
            Frame::Data(b) => f.debug_tuple("Data").field(&b.len()).finish(),
            Frame::Pipe(_) => f.write_str("Pipe"),
            Frame::End => f.write_str("End"),
        }
    }
}

#[derive(Debug)]
struct Shared {
    finished: watch::Sender<bool>,
    status: watch::Sender<StatusCode>,
}

/// Cloneable handle to an in-flight response.
///
/// Every call is non-blocking: frames are queued for the connection's
/// [`ResponseWriter`](crate::http::writer::ResponseWriter), which commits the
/// head lazily on the first body byte. Once [`end`](Self::end) has been
/// called by any clone, further writes are dropped.
#[derive(Debug, Clone)]
pub struct Outgoing {
    tx: mpsc::UnboundedSender<Frame>,
    shared: Arc<Shared>,
}

impl Outgoing {
    /// Creates a response handle and the receiving end for its writer.
    pub fn channel() -> (Outgoing, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (finished, _) = watch::channel(false);
        let (status, _) = watch::channel(StatusCode::Ok);
        let shared = Arc::new(Shared { finished, status });
        (Outgoing { tx, shared }, rx)
    }

    fn push(&self, frame: Frame) -> bool {
        if self.is_finished() {
            tracing::trace!(?frame, "dropping frame for finished response");
            return false;
        }
        self.tx.send(frame).is_ok()
    }

    pub fn set_status(&self, status: StatusCode) {
        self.shared.status.send_replace(status);
        self.push(Frame::Status(status));
    }

    /// Last status set through any clone of this handle.
    pub fn status(&self) -> StatusCode {
        *self.shared.status.borrow()
    }

    pub fn set_header(&self, key: impl Into<String>, value: impl Into<String>) {
        self.push(Frame::Header(key.into(), value.into()));
    }

    pub fn set_nodelay(&self, on: bool) {
        self.push(Frame::NoDelay(on));
    }

    /// Queues body bytes. Returns false if the response already ended or
    /// the connection is gone.
    pub fn write(&self, chunk: impl Into<Bytes>) -> bool {
        self.push(Frame::Data(chunk.into()))
    }

    /// Streams `reader` into the body and ends the response when it is
    /// exhausted.
    pub fn pipe(&self, reader: BodyReader) -> bool {
        let queued = self.push(Frame::Pipe(reader));
        self.shared.finished.send_replace(true);
        queued
    }

    /// Finishes the response. Idempotent.
    pub fn end(&self) -> bool {
        let queued = self.push(Frame::End);
        self.shared.finished.send_replace(true);
        queued
    }

    /// Writes a buffered [`Response`] in one go and ends.
    pub fn send(&self, response: Response) -> bool {
        self.set_status(response.status);
        for (k, v) in response.headers {
            self.set_header(k, v);
        }
        if !response.body.is_empty() {
            self.write(response.body);
        }
        self.end()
    }

    pub fn is_finished(&self) -> bool {
        *self.shared.finished.borrow() || self.tx.is_closed()
    }

    /// Resolves once the response was ended through any handle, or the
    /// writer side went away.
    pub async fn closed(&self) {
        let mut finished = self.shared.finished.subscribe();
        tokio::select! {
            _ = self.tx.closed() => {}
            _ = finished.wait_for(|done| *done) => {}
        }
    }
}
