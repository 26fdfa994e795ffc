//! Central FIFO event queue.
//!
//! Strict first-in-first-out over the `Event` union. The source system
//! rejected foreign values at runtime; here the `Event` enum makes a
//! wrong-type enqueue unrepresentable, so the only runtime failure left is
//! popping an empty queue. Single-threaded contract, no locking.

use crate::domain::Event;
use std::collections::VecDeque;
use thiserror::Error;

/// Errors from queue operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("event queue is empty — check is_empty() before pop()")]
    Empty,
}

/// FIFO queue of engine events.
#[derive(Debug, Default)]
pub struct EventQueue {
    inner: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an event at the back.
    pub fn push(&mut self, event: Event) {
        self.inner.push_back(event);
    }

    /// Dequeue the oldest event.
    pub fn pop(&mut self) -> Result<Event, QueueError> {
        self.inner.pop_front().ok_or(QueueError::Empty)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Drain every queued event in FIFO order.
    pub fn drain(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.inner.drain(..)
    }
}
