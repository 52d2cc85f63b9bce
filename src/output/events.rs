//! Crawl event stream
//!
//! Every step of a crawl is reported as a [`CrawlEvent`]: a GET before each
//! fetch, a SAVE before each file write, and one terminal OK, SKIP or FAIL
//! per response, bracketed by START and END. Events are logged through
//! `tracing` and, when a subscriber is attached, forwarded over a channel.

use std::fmt;
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Kind of crawl event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    Get,
    Save,
    Ok,
    Skip,
    Fail,
    End,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Get => "GET",
            Self::Save => "SAVE",
            Self::Ok => "OK",
            Self::Skip => "SKIP",
            Self::Fail => "FAIL",
            Self::End => "END",
        }
    }

    /// Returns true for the per-response terminal kinds
    pub fn is_outcome(&self) -> bool {
        matches!(self, Self::Ok | Self::Skip | Self::Fail)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observable crawl event
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlEvent {
    /// Seconds since the emitter was created
    pub timestamp_seconds: f64,

    pub kind: EventKind,

    /// URL, file path or failure reason
    pub detail: String,
}

impl fmt::Display for CrawlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:6.4} [{}]", self.timestamp_seconds, self.kind)?;
        if !self.detail.is_empty() {
            write!(f, " {}", self.detail)?;
        }
        Ok(())
    }
}

/// Produces timestamped events for one crawl run
#[derive(Debug)]
pub struct EventEmitter {
    started: Instant,
    subscriber: Mutex<Option<UnboundedSender<CrawlEvent>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            subscriber: Mutex::new(None),
        }
    }

    /// Attaches a subscriber, replacing any previous one
    pub fn subscribe(&self) -> UnboundedReceiver<CrawlEvent> {
        let (tx, rx) = unbounded_channel();
        match self.subscriber.lock() {
            Ok(mut subscriber) => *subscriber = Some(tx),
            Err(poisoned) => *poisoned.into_inner() = Some(tx),
        }
        rx
    }

    /// Records an event
    pub fn emit(&self, kind: EventKind, detail: impl Into<String>) {
        let event = CrawlEvent {
            timestamp_seconds: self.started.elapsed().as_secs_f64(),
            kind,
            detail: detail.into(),
        };

        match kind {
            EventKind::Fail => tracing::warn!("{}", event),
            EventKind::Skip => tracing::debug!("{}", event),
            _ => tracing::info!("{}", event),
        }

        if let Ok(subscriber) = self.subscriber.lock() {
            if let Some(subscriber) = subscriber.as_ref() {
                // A dropped receiver just means nobody is listening any more
                let _ = subscriber.send(event);
            }
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
