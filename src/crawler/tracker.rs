//! In-flight work accounting
//!
//! Two counters, one per queue, are incremented when an item is enqueued and
//! decremented only when the task handling it has finished, including any
//! follow-up items it enqueued. A fetch task enqueues its response before
//! releasing its URL slot, and a response task enqueues its follow URLs before
//! releasing its response slot, so the pair reads zero/zero only when no work
//! exists anywhere. Both counters sit behind one lock so they are always
//! observed together.

use std::sync::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InFlightCounts {
    /// URL tasks outstanding
    pub urls: usize,

    /// Response tasks outstanding
    pub responses: usize,
}

impl InFlightCounts {
    pub fn is_idle(&self) -> bool {
        self.urls == 0 && self.responses == 0
    }
}

#[derive(Debug, Clone, Copy)]
enum Queue {
    Urls,
    Responses,
}

/// Shared outstanding-work counters with an idle notification
#[derive(Debug, Default)]
pub struct InFlight {
    counts: Mutex<InFlightCounts>,
    idle: Notify,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url_queued(&self) {
        self.adjust(Queue::Urls, true);
    }

    pub fn url_completed(&self) {
        self.adjust(Queue::Urls, false);
    }

    pub fn response_queued(&self) {
        self.adjust(Queue::Responses, true);
    }

    pub fn response_completed(&self) {
        self.adjust(Queue::Responses, false);
    }

    /// Releases one URL slot when dropped
    pub fn url_task(&self) -> TaskGuard<'_> {
        TaskGuard {
            in_flight: self,
            queue: Queue::Urls,
        }
    }

    /// Releases one response slot when dropped
    pub fn response_task(&self) -> TaskGuard<'_> {
        TaskGuard {
            in_flight: self,
            queue: Queue::Responses,
        }
    }

    /// Current counter values, read together
    pub fn counts(&self) -> InFlightCounts {
        match self.counts.lock() {
            Ok(counts) => *counts,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.counts().is_idle()
    }

    /// Waits until both counters are zero
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    fn adjust(&self, queue: Queue, increment: bool) {
        let now_idle = {
            let mut counts = match self.counts.lock() {
                Ok(counts) => counts,
                Err(poisoned) => poisoned.into_inner(),
            };
            let counter = match queue {
                Queue::Urls => &mut counts.urls,
                Queue::Responses => &mut counts.responses,
            };
            if increment {
                *counter += 1;
            } else {
                debug_assert!(*counter > 0, "{:?} counter underflow", queue);
                *counter = counter.saturating_sub(1);
            }
            !increment && counts.is_idle()
        };

        if now_idle {
            self.idle.notify_one();
        }
    }
}

/// Marks one task complete when dropped
#[derive(Debug)]
pub struct TaskGuard<'a> {
    in_flight: &'a InFlight,
    queue: Queue,
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.adjust(self.queue, false);
    }
}
