//! One-exchange-at-a-time gate
//!
//! The busy flag and the pending queue are only ever touched from the
//! conversation actor, so each check-and-set happens in one step with no
//! suspension point in between.

use std::collections::VecDeque;

/// FIFO of user texts submitted while an exchange was in flight.
///
/// Unbounded on purpose: every submission is already in the transcript, so
/// dropping one here would leave a user message that never gets a reply.
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: VecDeque<String>,
}

impl PendingQueue {
    pub fn enqueue(&mut self, text: String) {
        self.entries.push_back(text);
    }

    pub fn dequeue_oldest(&mut self) -> Option<String> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Work handed to the exchange worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub text: String,
    /// Wait out the cooldown before calling the remote service
    pub after_cooldown: bool,
}

/// Owns the busy flag and the pending queue
#[derive(Debug, Default)]
pub struct Dispatcher {
    busy: bool,
    queue: PendingQueue,
}

impl Dispatcher {
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Start an exchange now, or queue the text behind the current one
    pub fn offer(&mut self, text: String) -> Option<Job> {
        if self.busy {
            self.queue.enqueue(text);
            return None;
        }
        self.busy = true;
        Some(Job {
            text,
            after_cooldown: false,
        })
    }

    /// The in-flight exchange is done; hand back the next queued entry.
    ///
    /// The flag is re-taken immediately for the next entry, so anything
    /// submitted during its cooldown queues behind it.
    pub fn finish(&mut self) -> Option<Job> {
        self.busy = false;
        let text = self.queue.dequeue_oldest()?;
        self.busy = true;
        Some(Job {
            text,
            after_cooldown: true,
        })
    }
}
