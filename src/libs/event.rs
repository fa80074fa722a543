//! Raw events delivered by event sources.
//!
//! A raw event records only that something happened and when. Key codes,
//! characters and pointer coordinates never make it into this type.

use std::fmt;
use std::time::Instant;

/// Opaque descriptor of a top-level window, as handed out by a source.
///
/// The core never interprets the id; it only passes the handle back to the
/// [`WindowResolver`](crate::libs::source::WindowResolver) that understands it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowHandle {
    pub id: String,
    pub process_id: u32,
}

impl WindowHandle {
    pub fn new(id: impl Into<String>, process_id: u32) -> Self {
        Self { id: id.into(), process_id }
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.process_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Keyboard, mouse button, pointer movement or wheel activity.
    Input,
    /// The foreground window changed. `None` means no window has focus.
    WindowFocusChange(Option<WindowHandle>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub timestamp: Instant,
    pub kind: EventKind,
}

impl RawEvent {
    pub fn input() -> Self {
        Self::input_at(Instant::now())
    }

    pub fn input_at(timestamp: Instant) -> Self {
        Self {
            timestamp,
            kind: EventKind::Input,
        }
    }

    pub fn focus(handle: Option<WindowHandle>) -> Self {
        Self::focus_at(Instant::now(), handle)
    }

    pub fn focus_at(timestamp: Instant, handle: Option<WindowHandle>) -> Self {
        Self {
            timestamp,
            kind: EventKind::WindowFocusChange(handle),
        }
    }
}
