//! Bounded multi-producer / single-consumer queue for raw events.
//!
//! Producers are OS callback threads that must never wait, so [`EventQueue::push`]
//! never blocks: when the queue is full the oldest event is discarded to make
//! room for the newest one. Activity detection cares about the most recent
//! signal, not a complete audit of every key press.
//!
//! Besides events the queue carries a coalesced *idle tick* flag. The idle
//! scheduler raises it on a fixed cadence to wake the consumer without taking
//! up capacity, which keeps all state changes on the consumer thread.

use super::event::RawEvent;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Reference capacity for the event queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// Queue was full; the oldest event was discarded.
    DroppedOldest,
    /// Queue is shut down; the event was discarded.
    Closed,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Popped {
    Event(RawEvent),
    IdleTick,
    /// Shut down and fully drained.
    Closed,
}

struct QueueState {
    events: VecDeque<RawEvent>,
    tick: Option<Instant>,
    closed: bool,
}

pub struct EventQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    capacity: usize,
    dropped: AtomicU64,
    refused: AtomicU64,
}

impl EventQueue {
    /// Creates a queue holding at most `capacity` events (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                events: VecDeque::with_capacity(capacity),
                tick: None,
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
            dropped: AtomicU64::new(0),
            refused: AtomicU64::new(0),
        }
    }

    pub fn push(&self, event: RawEvent) -> PushOutcome {
        let mut state = self.state.lock();
        if state.closed {
            self.refused.fetch_add(1, Ordering::Relaxed);
            return PushOutcome::Closed;
        }

        let outcome = if state.events.len() >= self.capacity {
            state.events.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
            PushOutcome::DroppedOldest
        } else {
            PushOutcome::Enqueued
        };
        state.events.push_back(event);
        drop(state);

        self.available.notify_one();
        outcome
    }

    /// Raises the idle tick. Repeated ticks before the consumer runs coalesce.
    pub fn tick(&self) {
        let mut state = self.state.lock();
        if state.closed || state.tick.is_some() {
            return;
        }
        state.tick = Some(Instant::now());
        drop(state);

        self.available.notify_one();
    }

    /// Blocks until an event is available. Returns `None` once the queue is
    /// shut down and empty. Idle ticks are ignored.
    pub fn pop(&self) -> Option<RawEvent> {
        let mut state = self.state.lock();
        loop {
            if let Some(event) = state.events.pop_front() {
                return Some(event);
            }
            if state.closed {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /// Blocks until an event or an idle tick is available.
    ///
    /// A pending tick is served before any event that arrived after it, so the
    /// consumer observes ticks and events in time order. Remaining events are
    /// still drained after shutdown before [`Popped::Closed`] is returned.
    pub fn pop_item(&self) -> Popped {
        let mut state = self.state.lock();
        loop {
            if let Some(tick_at) = state.tick {
                let event_first = state.events.front().is_some_and(|event| event.timestamp <= tick_at);
                if !event_first {
                    state.tick = None;
                    return Popped::IdleTick;
                }
            }
            if let Some(event) = state.events.pop_front() {
                return Popped::Event(event);
            }
            if state.closed {
                return Popped::Closed;
            }
            self.available.wait(&mut state);
        }
    }

    /// Signals shutdown and wakes the consumer. Further pushes are discarded.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.tick = None;
        drop(state);

        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events discarded to make room for newer ones.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Events refused because the queue was already shut down.
    pub fn refused(&self) -> u64 {
        self.refused.load(Ordering::Relaxed)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
