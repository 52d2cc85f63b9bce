/// Engine lifecycle states
///
/// A crawl moves strictly forward: `Running` until the work drains or an
/// operator stops it, then `Stopped`.
use std::fmt;

/// Represents the current state of a crawl engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EngineState {
    /// Dispatch loops are pulling work from the queues
    Running = 0,

    /// Both queues are empty and nothing is in flight; shutdown is imminent
    Draining = 1,

    /// The stop signal has been broadcast; no new work is dispatched
    Stopped = 2,
}

impl EngineState {
    /// Returns true if work may still be dispatched
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true once the stop signal has been broadcast
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns true if moving from `self` to `next` is legal
    ///
    /// `Running -> Stopped` is allowed directly for an operator stop.
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::Draining)
                | (Self::Running, Self::Stopped)
                | (Self::Draining, Self::Stopped)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Draining => "DRAINING",
            Self::Stopped => "STOPPED",
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
