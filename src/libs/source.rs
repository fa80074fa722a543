//! Capability traits for the collaborators that feed the pipeline.
//!
//! Event sources wrap whatever native hook or poller the platform offers.
//! The pipeline only sees a callback it hands to [`EventSource::register`];
//! it never touches platform handles itself.

use super::activity::WindowSnapshot;
use super::error::{ResolveError, SourceError};
use super::event::{RawEvent, WindowHandle};
use parking_lot::Mutex;
use std::sync::Arc;

/// Callback invoked by sources on a thread the pipeline does not own.
/// Implementations must return immediately.
pub type EventCallback = Arc<dyn Fn(RawEvent) + Send + Sync>;

pub trait EventSource: Send {
    fn name(&self) -> &'static str;

    /// Starts delivering events to `callback`.
    fn register(&mut self, callback: EventCallback) -> Result<(), SourceError>;

    /// Stops delivering events. Safe to call when not registered.
    fn unregister(&mut self);
}

/// Resolves an opaque window handle to its title and process name.
///
/// `Ok(None)` means the handle no longer refers to a focused window; `Err`
/// means the lookup itself failed.
pub trait WindowResolver: Send {
    fn resolve(&self, handle: &WindowHandle) -> Result<Option<WindowSnapshot>, ResolveError>;
}

impl<F> WindowResolver for F
where
    F: Fn(&WindowHandle) -> Result<Option<WindowSnapshot>, ResolveError> + Send,
{
    fn resolve(&self, handle: &WindowHandle) -> Result<Option<WindowSnapshot>, ResolveError> {
        self(handle)
    }
}

/// Registers several sources behind a single callback.
#[derive(Default)]
pub struct CompositeSource {
    sources: Vec<Box<dyn EventSource>>,
    registered: usize,
}

impl CompositeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl EventSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl EventSource for CompositeSource {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn register(&mut self, callback: EventCallback) -> Result<(), SourceError> {
        if self.registered > 0 {
            return Err(SourceError::AlreadyRegistered(self.name()));
        }
        for index in 0..self.sources.len() {
            if let Err(e) = self.sources[index].register(callback.clone()) {
                // Roll back the ones that did start.
                for source in self.sources[..index].iter_mut() {
                    source.unregister();
                }
                return Err(e);
            }
        }
        self.registered = self.sources.len();
        Ok(())
    }

    fn unregister(&mut self) {
        for source in self.sources.iter_mut() {
            source.unregister();
        }
        self.registered = 0;
    }
}

/// Source driven by hand through a [`ManualEmitter`].
///
/// Used for replaying recorded events and for exercising the pipeline
/// without OS hooks.
#[derive(Default)]
pub struct ManualSource {
    slot: Arc<Mutex<Option<EventCallback>>>,
}

/// Cloneable handle that feeds events into a [`ManualSource`].
#[derive(Clone)]
pub struct ManualEmitter {
    slot: Arc<Mutex<Option<EventCallback>>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitter(&self) -> ManualEmitter {
        ManualEmitter { slot: self.slot.clone() }
    }
}

impl ManualEmitter {
    /// Delivers `event` if the source is registered. Returns whether it was delivered.
    pub fn emit(&self, event: RawEvent) -> bool {
        let callback = self.slot.lock().clone();
        match callback {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }
}

impl EventSource for ManualSource {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn register(&mut self, callback: EventCallback) -> Result<(), SourceError> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(SourceError::AlreadyRegistered(self.name()));
        }
        *slot = Some(callback);
        Ok(())
    }

    fn unregister(&mut self) {
        self.slot.lock().take();
    }
}
