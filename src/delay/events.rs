//! Named lifecycle notifications and the observer registry.
//!
//! Observers are plain closures run synchronously, in registration order,
//! on the controller's own task. [`Observers::dispatch`] reports whether
//! anyone was listening, because several paths fall back to a default
//! behavior when nobody is.

use std::collections::HashMap;

use crate::delay::outcome::{Completion, Payload};
use crate::http::response::Outgoing;

/// Notification names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Done,
    Error,
    Cancel,
    Abort,
    Poll,
    Heartbeat,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Done => "done",
            EventKind::Error => "error",
            EventKind::Cancel => "cancel",
            EventKind::Abort => "abort",
            EventKind::Poll => "poll",
            EventKind::Heartbeat => "heartbeat",
        }
    }
}

/// A notification together with its argument.
///
/// `Done` hands out the payload mutably so a rendering observer can take a
/// stream out of it with [`Payload::take`].
pub enum Event<'a> {
    Done(&'a mut Payload),
    Error(&'a anyhow::Error),
    Cancel,
    Abort,
    Poll,
    Heartbeat,
}

impl Event<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Done(_) => EventKind::Done,
            Event::Error(_) => EventKind::Error,
            Event::Cancel => EventKind::Cancel,
            Event::Abort => EventKind::Abort,
            Event::Poll => EventKind::Poll,
            Event::Heartbeat => EventKind::Heartbeat,
        }
    }
}

/// What an observer may touch while it runs.
pub struct Context<'a> {
    /// The response being delayed. Clone it to keep writing after the
    /// observer returns.
    pub response: &'a Outgoing,
    /// Completion handle of the same controller.
    pub completion: &'a Completion,
}

pub type Observer = Box<dyn FnMut(&Context<'_>, &mut Event<'_>) + Send>;

#[derive(Default)]
pub struct Observers {
    map: HashMap<EventKind, Vec<Observer>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: EventKind, observer: Observer) {
        self.map.entry(kind).or_default().push(observer);
    }

    pub fn has(&self, kind: EventKind) -> bool {
        self.map.get(&kind).is_some_and(|list| !list.is_empty())
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.map.get(&kind).map_or(0, Vec::len)
    }

    /// Runs every observer registered for the event's kind. Returns false
    /// when there were none.
    pub fn dispatch(&mut self, ctx: &Context<'_>, mut event: Event<'_>) -> bool {
        let Some(list) = self.map.get_mut(&event.kind()) else {
            return false;
        };
        if list.is_empty() {
            return false;
        }
        tracing::trace!(event = event.kind().as_str(), observers = list.len(), "dispatch");
        for observer in list.iter_mut() {
            observer(ctx, &mut event);
        }
        true
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut m = f.debug_map();
        for (kind, list) in &self.map {
            m.entry(&kind.as_str(), &list.len());
        }
        m.finish()
    }
}
