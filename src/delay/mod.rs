//! Delayed responses.
//!
//! A [`DelayedResponse`] binds to one request/response pair and holds the
//! response open until a long-running operation completes. While it waits
//! it can send a heartbeat byte at a fixed cadence so intermediaries do not
//! drop an idle connection.
//!
//! # Lifecycle
//!
//! ```text
//!  build ──► wait(timeout) ─────────────┐
//!    │                                   ├──► run() loop ──► finalized once
//!    └─────► start(interval, delay, t) ──┘        ▲
//!                                                  │
//!     Completion::end / settle / timeout / client abort
//! ```
//!
//! All triggers (completion commands, timers, client abort, the response
//! being ended elsewhere) are serialized through the `select!` in
//! [`DelayedResponse::run`]; the first one that finalizes wins and every
//! later one is a no-op.
//!
//! # Example
//!
//! ```ignore
//! let mut delay = DelayedResponse::new(incoming, outgoing);
//! delay.json();
//! let completion = delay.start(None, None, Some(Duration::from_secs(30)))?;
//! completion.settle(async move { Ok(Payload::json(&compute().await)?) });
//! delay.run().await?;
//! ```

pub mod events;
pub mod outcome;
pub mod state;
pub mod timers;

use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::DelayError;
use crate::http::request::Incoming;
use crate::http::response::{Outgoing, StatusCode};

pub use events::{Context, Event, EventKind, Observer, Observers};
pub use outcome::{Completion, Ended, Outcome, Payload, PendingResult};
pub use state::{Phase, Trigger};
pub use timers::{Fired, Timers};

use outcome::Command;

/// Heartbeat cadence when `start` is given none.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Byte written on each heartbeat tick unless a "heartbeat" observer is
/// registered. Insignificant whitespace for JSON and most text formats.
pub const DEFAULT_HEARTBEAT: u8 = b' ';

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Failure sink used when no "error" observer is registered.
pub type ErrorContinuation = Box<dyn FnOnce(anyhow::Error) + Send>;

enum Resolution {
    Value(Payload),
    Failed(anyhow::Error),
    TimedOut(Duration),
}

/// Builder for [`DelayedResponse`].
#[derive(Default)]
pub struct Builder {
    request: Option<Incoming>,
    response: Option<Outgoing>,
    on_error: Option<ErrorContinuation>,
    heartbeat: Option<u8>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(mut self, request: Incoming) -> Self {
        self.request = Some(request);
        self
    }

    pub fn response(mut self, response: Outgoing) -> Self {
        self.response = Some(response);
        self
    }

    pub fn on_error(mut self, next: impl FnOnce(anyhow::Error) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(next));
        self
    }

    pub fn heartbeat(mut self, byte: u8) -> Self {
        self.heartbeat = Some(byte);
        self
    }

    pub fn build(self) -> Result<DelayedResponse, DelayError> {
        let request = self.request.ok_or(DelayError::InvalidArgument("request"))?;
        let response = self.response.ok_or(DelayError::InvalidArgument("response"))?;

        let mut delay = DelayedResponse::new(request, response);
        delay.on_error = self.on_error;
        delay.heartbeat = self.heartbeat.unwrap_or(DEFAULT_HEARTBEAT);
        Ok(delay)
    }
}

/// Per-request controller that holds a response open until completion.
pub struct DelayedResponse {
    request: Incoming,
    response: Outgoing,
    on_error: Option<ErrorContinuation>,
    observers: Observers,
    heartbeat: u8,
    phase: Phase,
    timers: Timers,
    /// Set while `start` has write coalescing disabled.
    nodelay: bool,
    completion: Completion,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl DelayedResponse {
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub fn new(request: Incoming, response: Outgoing) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            request,
            response,
            on_error: None,
            observers: Observers::new(),
            heartbeat: DEFAULT_HEARTBEAT,
            phase: Phase::Idle,
            timers: Timers::new(),
            nodelay: false,
            completion: Completion::new(tx),
            commands: rx,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn response(&self) -> &Outgoing {
        &self.response
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// A handle bound to this controller's `end`, usable before `wait`/`start`.
    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    /// Marks the response as JSON.
    pub fn json(&mut self) -> &mut Self {
        self.response.set_header("Content-Type", JSON_CONTENT_TYPE);
        self
    }

    pub fn on(
        &mut self,
        kind: EventKind,
        observer: impl FnMut(&Context<'_>, &mut Event<'_>) + Send + 'static,
    ) -> &mut Self {
        self.observers.register(kind, Box::new(observer));
        self
    }

    /// Takes over rendering. The observer must end the response itself.
    pub fn on_done(
        &mut self,
        mut f: impl FnMut(&Context<'_>, &mut Payload) + Send + 'static,
    ) -> &mut Self {
        self.on(EventKind::Done, move |ctx, event| {
            if let Event::Done(payload) = event {
                f(ctx, &mut **payload);
            }
        })
    }

    pub fn on_error(
        &mut self,
        mut f: impl FnMut(&Context<'_>, &anyhow::Error) + Send + 'static,
    ) -> &mut Self {
        self.on(EventKind::Error, move |ctx, event| {
            if let Event::Error(err) = event {
                f(ctx, *err);
            }
        })
    }

    /// Turns an idle timeout into a non-error outcome.
    pub fn on_cancel(&mut self, mut f: impl FnMut(&Context<'_>) + Send + 'static) -> &mut Self {
        self.on(EventKind::Cancel, move |ctx, _| f(ctx))
    }

    /// Takes over ending the response when the client disconnects.
    pub fn on_abort(&mut self, mut f: impl FnMut(&Context<'_>) + Send + 'static) -> &mut Self {
        self.on(EventKind::Abort, move |ctx, _| f(ctx))
    }

    pub fn on_poll(&mut self, mut f: impl FnMut(&Context<'_>) + Send + 'static) -> &mut Self {
        self.on(EventKind::Poll, move |ctx, _| f(ctx))
    }

    /// Replaces the automatic heartbeat byte.
    pub fn on_heartbeat(&mut self, mut f: impl FnMut(&Context<'_>) + Send + 'static) -> &mut Self {
        self.on(EventKind::Heartbeat, move |ctx, _| f(ctx))
    }

    /// Waits without keepalive traffic, optionally bounded by `timeout`.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<Completion, DelayError> {
        let next = self.phase.on(Trigger::Wait)?;
        self.phase = next.unwrap_or(self.phase);

        if let Some(after) = timeout {
            self.timers.arm_timeout(after);
        }
        tracing::debug!(path = %self.request.request.path, ?timeout, "delayed response waiting");
        Ok(self.completion.clone())
    }

    /// Commits to long-polling: sets 202 Accepted, disables write
    /// coalescing and writes a heartbeat every `interval` once
    /// `initial_delay` has passed.
    pub fn start(
        &mut self,
        interval: Option<Duration>,
        initial_delay: Option<Duration>,
        timeout: Option<Duration>,
    ) -> Result<Completion, DelayError> {
        let next = self.phase.on(Trigger::Start)?;
        self.phase = next.unwrap_or(self.phase);

        let interval = interval.unwrap_or(DEFAULT_INTERVAL);
        let initial_delay = initial_delay.unwrap_or(interval);

        self.response.set_status(StatusCode::Accepted);
        self.response.set_nodelay(true);
        self.nodelay = true;

        self.timers.arm_initial_delay(initial_delay, interval);
        if let Some(after) = timeout {
            self.timers.arm_timeout(after);
        }
        tracing::debug!(
            path = %self.request.request.path,
            ?interval,
            ?initial_delay,
            ?timeout,
            "delayed response polling"
        );
        Ok(self.completion.clone())
    }

    fn teardown(&mut self) {
        self.timers.clear();
        if self.nodelay {
            self.response.set_nodelay(false);
            self.nodelay = false;
        }
    }

    /// Cancels every timer and restores write coalescing. Never writes to
    /// or ends the response. Idempotent.
    pub fn stop(&mut self) {
        self.teardown();
        if let Ok(Some(next)) = self.phase.on(Trigger::Stop) {
            tracing::debug!(path = %self.request.request.path, "delayed response stopped");
            self.phase = next;
        }
    }

    /// Finalizes the response with `outcome`, at most once.
    ///
    /// A pending outcome is chained instead: it is awaited on its own task
    /// and its result fed back through the completion handle. An error that
    /// no observer or continuation handles is returned as `Err`.
    pub fn end(&mut self, outcome: Outcome) -> anyhow::Result<Ended> {
        match outcome {
            Outcome::Pending(future) => Ok(Ended::Chained(self.completion.settle(future))),
            Outcome::Value(payload) => self.finalize(Trigger::End, Resolution::Value(payload)),
            Outcome::Error(err) => self.finalize(Trigger::End, Resolution::Failed(err)),
        }
    }

    fn notify(&mut self, event: Event<'_>) -> bool {
        let ctx = Context {
            response: &self.response,
            completion: &self.completion,
        };
        self.observers.dispatch(&ctx, event)
    }

    fn finalize(&mut self, trigger: Trigger, resolution: Resolution) -> anyhow::Result<Ended> {
        let Ok(Some(next)) = self.phase.on(trigger) else {
            tracing::warn!(
                path = %self.request.request.path,
                "end called after the response was finalized"
            );
            return Ok(Ended::Ignored);
        };
        self.phase = next;
        self.teardown();
        self.commands.close();

        match resolution {
            Resolution::TimedOut(after) => {
                if self.notify(Event::Cancel) {
                    return Ok(Ended::Finalized);
                }
                self.fail(anyhow::Error::new(DelayError::Timeout(after)))
            }
            Resolution::Failed(err) => self.fail(err),
            Resolution::Value(mut payload) => {
                if !self.notify(Event::Done(&mut payload)) {
                    self.render(payload)?;
                }
                Ok(Ended::Finalized)
            }
        }
    }

    fn fail(&mut self, err: anyhow::Error) -> anyhow::Result<Ended> {
        if self.notify(Event::Error(&err)) {
            return Ok(Ended::Finalized);
        }
        if let Some(next) = self.on_error.take() {
            next(err);
            return Ok(Ended::Finalized);
        }
        tracing::error!(path = %self.request.request.path, error = %err, "unhandled delayed response error");
        Err(err)
    }

    fn render(&mut self, payload: Payload) -> anyhow::Result<()> {
        match payload {
            Payload::Empty => {}
            Payload::Bytes(bytes) => {
                self.response.write(bytes);
            }
            Payload::Text(text) => {
                self.response.write(text);
            }
            Payload::Stream(reader) => {
                self.response.pipe(reader);
                return Ok(());
            }
            Payload::Json(value) => {
                self.response.write(serde_json::to_vec(&value)?);
            }
        }
        self.response.end();
        Ok(())
    }

    fn on_abort_signal(&mut self) {
        self.stop();
        let Ok(Some(next)) = self.phase.on(Trigger::Abort) else {
            return;
        };
        self.phase = next;
        // Cancels outstanding settle tasks.
        self.commands.close();
        tracing::info!(path = %self.request.request.path, "client aborted delayed response");

        if !self.notify(Event::Abort) {
            self.response.end();
        }
    }

    fn on_timeout(&mut self, after: Duration) -> anyhow::Result<()> {
        tracing::info!(path = %self.request.request.path, ?after, "delayed response timed out");
        self.response.set_status(StatusCode::Accepted);
        self.finalize(Trigger::Timeout, Resolution::TimedOut(after))?;
        Ok(())
    }

    fn on_tick(&mut self) -> anyhow::Result<()> {
        tracing::trace!(path = %self.request.request.path, "heartbeat tick");
        self.notify(Event::Poll);

        // Poll observers may have finished or stopped us.
        while let Ok(command) = self.commands.try_recv() {
            self.handle(command)?;
        }
        if self.phase != Phase::Polling {
            return Ok(());
        }

        if !self.notify(Event::Heartbeat) {
            self.response.write(vec![self.heartbeat]);
        }
        Ok(())
    }

    fn handle(&mut self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::End(outcome) => {
                self.end(outcome)?;
            }
            Command::Stop => self.stop(),
        }
        Ok(())
    }

    /// Drives the controller until the response is finalized or closed by
    /// someone else.
    ///
    /// Returns `Err` with an error nobody handled: no "error" observer, no
    /// error continuation.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let abort = self.request.abort.clone();
        let response = self.response.clone();

        while !self.phase.is_ended() {
            tokio::select! {
                biased;

                Some(command) = self.commands.recv() => self.handle(command)?,

                _ = abort.aborted() => self.on_abort_signal(),

                _ = response.closed() => {
                    tracing::debug!(path = %self.request.request.path, "response closed before finalization");
                    self.stop();
                    break;
                }

                fired = self.timers.next() => match fired {
                    Fired::Timeout(after) => self.on_timeout(after)?,
                    Fired::InitialDelay => {}
                    Fired::Tick => self.on_tick()?,
                },
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for DelayedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedResponse")
            .field("path", &self.request.request.path)
            .field("phase", &self.phase)
            .field("timers", &self.timers)
            .field("observers", &self.observers)
            .finish()
    }
}
