//! Completion values and the handle used to deliver them.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::http::response::BodyReader;

/// Result value rendered into the response body.
#[derive(Default)]
pub enum Payload {
    /// Nothing to render; the response ends with an empty body.
    #[default]
    Empty,
    Bytes(Bytes),
    Text(String),
    /// Piped as-is; the response ends when the reader is exhausted.
    Stream(BodyReader),
    /// Serialized to JSON text.
    Json(serde_json::Value),
}

impl Payload {
    pub fn json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Self> {
        Ok(Payload::Json(serde_json::to_value(value)?))
    }

    pub fn stream(reader: impl tokio::io::AsyncRead + Send + Unpin + 'static) -> Self {
        Payload::Stream(Box::new(reader))
    }

    /// Moves the payload out, leaving [`Payload::Empty`] behind.
    pub fn take(&mut self) -> Payload {
        std::mem::take(self)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Empty => f.write_str("Empty"),
            Payload::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Payload::Text(t) => f.debug_tuple("Text").field(&t.len()).finish(),
            Payload::Stream(_) => f.write_str("Stream"),
            Payload::Json(v) => f.debug_tuple("Json").field(v).finish(),
        }
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Payload::Empty
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes.into())
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(value: Option<T>) -> Self {
        value.map_or(Payload::Empty, Into::into)
    }
}

pub type PendingResult = Pin<Box<dyn Future<Output = anyhow::Result<Payload>> + Send>>;

/// The three shapes a completion can take.
pub enum Outcome {
    Value(Payload),
    Error(anyhow::Error),
    /// Settles later; its result is fed back as `Value` or `Error`.
    Pending(PendingResult),
}

impl Outcome {
    pub fn value(payload: impl Into<Payload>) -> Self {
        Outcome::Value(payload.into())
    }

    pub fn error(err: impl Into<anyhow::Error>) -> Self {
        Outcome::Error(err.into())
    }

    pub fn pending<F, P>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<P>> + Send + 'static,
        P: Into<Payload>,
    {
        Outcome::Pending(Box::pin(async move { future.await.map(Into::into) }))
    }
}

impl<P: Into<Payload>> From<anyhow::Result<P>> for Outcome {
    fn from(result: anyhow::Result<P>) -> Self {
        match result {
            Ok(payload) => Outcome::Value(payload.into()),
            Err(err) => Outcome::Error(err),
        }
    }
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Value(p) => f.debug_tuple("Value").field(p).finish(),
            Outcome::Error(e) => f.debug_tuple("Error").field(&e.to_string()).finish(),
            Outcome::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// What a call to `end` did.
#[derive(Debug)]
pub enum Ended {
    /// This call finalized the response.
    Finalized,
    /// The response was already finalized; nothing happened.
    Ignored,
    /// A pending outcome was chained; the handle resolves once it settled
    /// and was fed back (true if the controller was still there to take it).
    Chained(JoinHandle<bool>),
}

pub(crate) enum Command {
    End(Outcome),
    Stop,
}

/// Cloneable, `Send` handle bound to one controller's `end`.
///
/// Returned by `wait`/`start`. Every method is fire-and-forget; the
/// controller's loop processes the requests in arrival order and only the
/// first completion takes effect.
#[derive(Clone, Debug)]
pub struct Completion {
    tx: mpsc::UnboundedSender<Command>,
}

impl Completion {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { tx }
    }

    /// Delivers an outcome. Pending outcomes are awaited on a spawned task
    /// first. Returns false if the controller is gone.
    pub fn end(&self, outcome: Outcome) -> bool {
        match outcome {
            Outcome::Pending(future) => {
                drop(self.settle(future));
                !self.tx.is_closed()
            }
            outcome => self.tx.send(Command::End(outcome)).is_ok(),
        }
    }

    pub fn done(&self, payload: impl Into<Payload>) -> bool {
        self.end(Outcome::value(payload))
    }

    pub fn fail(&self, err: impl Into<anyhow::Error>) -> bool {
        self.end(Outcome::error(err))
    }

    /// Awaits `future` on a new task and feeds its result back.
    ///
    /// The future is dropped unfinished once the controller has finalized
    /// or gone away; the handle then resolves to false.
    pub fn settle<F, P>(&self, future: F) -> JoinHandle<bool>
    where
        F: Future<Output = anyhow::Result<P>> + Send + 'static,
        P: Into<Payload>,
    {
        let completion = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = future => completion.end(Outcome::from(result)),
                _ = completion.tx.closed() => {
                    tracing::debug!("controller gone, dropping pending outcome");
                    false
                }
            }
        })
    }

    /// Cancels the controller's timers without finalizing.
    pub fn stop(&self) -> bool {
        self.tx.send(Command::Stop).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
