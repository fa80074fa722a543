//! Desktop adapters: global input hook, foreground window poller and the
//! matching window resolver.
//!
//! These are the only pieces that talk to the OS. Input content never leaves
//! this module: key codes, buttons and coordinates are discarded as soon as
//! the event type is known.

use super::activity::WindowSnapshot;
use super::error::{ResolveError, SourceError};
use super::event::{RawEvent, WindowHandle};
use super::source::{EventCallback, EventSource, WindowResolver};
use active_win_pos_rs::get_active_window;
use parking_lot::{Condvar, Mutex};
use rdev::{listen, Event, EventType};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

const LISTEN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Keyboard and mouse activity through a global `rdev` hook.
///
/// `rdev::listen` blocks its thread for the life of the process and cannot be
/// cancelled, so the listener is started once and [`unregister`] only
/// detaches the callback.
///
/// [`unregister`]: EventSource::unregister
#[derive(Default)]
pub struct RdevInputSource {
    slot: Arc<Mutex<Option<EventCallback>>>,
    listener: Option<thread::JoinHandle<()>>,
}

impl RdevInputSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_activity(event: &Event) -> bool {
        matches!(
            event.event_type,
            EventType::KeyPress(_) | EventType::ButtonPress(_) | EventType::MouseMove { .. } | EventType::Wheel { .. }
        )
    }
}

impl EventSource for RdevInputSource {
    fn name(&self) -> &'static str {
        "input"
    }

    fn register(&mut self, callback: EventCallback) -> Result<(), SourceError> {
        {
            let mut slot = self.slot.lock();
            if slot.is_some() {
                return Err(SourceError::AlreadyRegistered(self.name()));
            }
            *slot = Some(callback);
        }

        if self.listener.is_none() {
            let slot = self.slot.clone();
            let listener = thread::Builder::new()
                .name("actrail-input".to_string())
                .spawn(move || loop {
                    let slot = slot.clone();
                    let result = listen(move |event: Event| {
                        if !Self::is_activity(&event) {
                            return;
                        }
                        let callback = slot.lock().clone();
                        if let Some(callback) = callback {
                            callback(RawEvent::input());
                        }
                    });
                    match result {
                        Ok(()) => break,
                        Err(e) => {
                            tracing::warn!(error = ?e, "input listener failed, restarting");
                            thread::sleep(LISTEN_RETRY_DELAY);
                        }
                    }
                })
                .map_err(|e| {
                    self.slot.lock().take();
                    SourceError::StartFailed {
                        name: "input",
                        reason: e.to_string(),
                    }
                })?;
            self.listener = Some(listener);
        }
        Ok(())
    }

    fn unregister(&mut self) {
        self.slot.lock().take();
    }
}

/// Identity of the foreground window as seen by one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundWindow {
    pub window_id: String,
    pub title: String,
    pub process_id: u32,
}

/// Reads the current foreground window, `None` when nothing has focus.
pub type ForegroundProbe = fn() -> Option<ForegroundWindow>;

pub fn foreground_window() -> Option<ForegroundWindow> {
    get_active_window().ok().map(|window| ForegroundWindow {
        window_id: window.window_id,
        title: window.title,
        process_id: window.process_id as u32,
    })
}

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    fn stop(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }

    fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    /// Sleeps for `interval` or until stopped. Returns true once stopped.
    fn wait(&self, interval: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            self.wake.wait_for(&mut stopped, interval);
        }
        *stopped
    }
}

struct PollerThread {
    signal: Arc<StopSignal>,
    thread: thread::JoinHandle<()>,
}

/// Polls the foreground window and reports focus changes.
///
/// A change is reported when the window id or its title differs from the
/// previous poll, or when focus leaves every window. [`unregister`] wakes and
/// joins the polling thread, so no callback runs after it returns.
///
/// [`unregister`]: EventSource::unregister
pub struct FocusPoller {
    interval: Duration,
    probe: ForegroundProbe,
    running: Option<PollerThread>,
}

impl FocusPoller {
    pub fn new(interval: Duration) -> Self {
        Self::with_probe(interval, foreground_window)
    }

    pub fn with_probe(interval: Duration, probe: ForegroundProbe) -> Self {
        Self {
            interval,
            probe,
            running: None,
        }
    }
}

impl EventSource for FocusPoller {
    fn name(&self) -> &'static str {
        "focus"
    }

    fn register(&mut self, callback: EventCallback) -> Result<(), SourceError> {
        if self.running.is_some() {
            return Err(SourceError::AlreadyRegistered(self.name()));
        }

        let signal = Arc::new(StopSignal::default());
        let interval = self.interval;
        let probe = self.probe;
        let poller_signal = signal.clone();
        let thread = thread::Builder::new()
            .name("actrail-focus".to_string())
            .spawn(move || {
                let mut last: Option<Option<(String, String)>> = None;
                loop {
                    let window = probe();
                    let key = window.as_ref().map(|w| (w.window_id.clone(), w.title.clone()));
                    if last.as_ref() != Some(&key) {
                        if poller_signal.is_stopped() {
                            break;
                        }
                        callback(RawEvent::focus(window.map(|w| WindowHandle::new(w.window_id, w.process_id))));
                        last = Some(key);
                    }
                    if poller_signal.wait(interval) {
                        break;
                    }
                }
            })
            .map_err(|e| SourceError::StartFailed {
                name: "focus",
                reason: e.to_string(),
            })?;

        self.running = Some(PollerThread { signal, thread });
        Ok(())
    }

    fn unregister(&mut self) {
        if let Some(running) = self.running.take() {
            running.signal.stop();
            if running.thread.join().is_err() {
                tracing::warn!("focus poller thread panicked");
            }
        }
    }
}

impl Drop for FocusPoller {
    fn drop(&mut self) {
        self.unregister();
    }
}

/// Resolves a handle by re-reading the foreground window.
///
/// The process name comes from the process table; the window system's app
/// name is the fallback.
pub struct ActiveWindowResolver {
    system: Mutex<System>,
}

impl ActiveWindowResolver {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    fn process_name(&self, process_id: u32) -> Option<String> {
        let pid = Pid::from_u32(process_id);
        let mut system = self.system.lock();
        system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, ProcessRefreshKind::nothing());
        system
            .process(pid)
            .map(|process| process.name().to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
    }
}

impl Default for ActiveWindowResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowResolver for ActiveWindowResolver {
    fn resolve(&self, handle: &WindowHandle) -> Result<Option<WindowSnapshot>, ResolveError> {
        let window = match get_active_window() {
            Ok(window) => window,
            Err(()) => return Ok(None),
        };
        if window.window_id != handle.id {
            return Err(ResolveError::Stale(handle.to_string()));
        }

        let process_name = self.process_name(handle.process_id).unwrap_or(window.app_name);
        Ok(Some(WindowSnapshot::new(window.title, process_name)))
    }
}
