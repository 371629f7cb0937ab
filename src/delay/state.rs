use crate::error::DelayError;

/// Lifecycle of one delayed response.
///
/// ```text
///   Idle ──wait──► Waiting ──┐
///     │                      ├──end / timeout / abort──► Ended
///     └──start──► Polling ───┤
///                            └──stop──► Stopped ──end / abort──► Ended
/// ```
///
/// `Idle` can also be ended directly. `wait`/`start` are only accepted in
/// `Idle`; everything else is a no-op outside the states listed above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Waiting,
    Polling,
    Ended,
    Stopped,
}

/// Triggers that move a [`Phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Wait,
    Start,
    Timeout,
    End,
    Abort,
    Stop,
}

impl Phase {
    /// True once `wait` or `start` was accepted.
    pub fn is_started(&self) -> bool {
        !matches!(self, Phase::Idle)
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, Phase::Ended)
    }

    /// Next phase for `trigger`, or `None` if the trigger is a no-op here.
    ///
    /// A second `wait`/`start` is an error rather than a no-op.
    pub fn on(self, trigger: Trigger) -> Result<Option<Phase>, DelayError> {
        use Phase::*;
        use Trigger::*;

        let next = match (self, trigger) {
            (Idle, Wait) => Some(Waiting),
            (Idle, Start) => Some(Polling),
            (_, Wait | Start) => return Err(DelayError::AlreadyStarted),

            (Waiting | Polling, Timeout) => Some(Ended),
            (Idle | Waiting | Polling | Stopped, End | Abort) => Some(Ended),
            (Waiting | Polling, Stop) => Some(Stopped),

            _ => None,
        };
        Ok(next)
    }
}
