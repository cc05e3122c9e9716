//! Clipboard Bridge.
//!
//! The OS clipboard is shared with every other process on the desktop, so each
//! access goes through a bounded retry loop. No lock is held while the loop
//! sleeps between attempts.

use crate::errors::ClipboardError;
use crate::utils::RetryPolicy;
use arboard::Clipboard;
use log::{debug, warn};
use std::sync::Mutex;
use std::time::Duration;

/// What the rest of the pipeline sees of the clipboard.
pub trait ClipboardPort: Send + Sync {
    /// Current text content. `None` when the clipboard holds no text or could
    /// not be opened within the retry budget.
    fn read(&self) -> Option<String>;

    /// Replace the clipboard content. Writing `""` clears the clipboard.
    fn write(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Failure of a single clipboard access attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Another process holds the clipboard right now.
    Busy,
    Failed(String),
}

/// One-shot clipboard access, no retrying.
pub trait ClipboardBackend: Send + Sync {
    fn try_read(&self) -> Result<Option<String>, BackendError>;
    fn try_write(&self, text: &str) -> Result<(), BackendError>;
}

/// Wraps a backend with the bounded acquisition retry every clipboard access needs.
pub struct ClipboardBridge<B> {
    backend: B,
    policy: RetryPolicy,
}

impl<B: ClipboardBackend> ClipboardBridge<B> {
    pub fn new(backend: B, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn with_retry<T>(
        &self,
        what: &str,
        mut op: impl FnMut(&B) -> Result<T, BackendError>,
    ) -> Result<T, ClipboardError> {
        self.policy
            .retry(what, |_| op(&self.backend))
            .map_err(|last| match last {
                BackendError::Busy => ClipboardError::Busy {
                    attempts: self.policy.attempts,
                },
                BackendError::Failed(message) => ClipboardError::Unavailable(message),
            })
    }
}

impl<B: ClipboardBackend> ClipboardPort for ClipboardBridge<B> {
    fn read(&self) -> Option<String> {
        match self.with_retry("Clipboard read", |b| b.try_read()) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read clipboard: {}", e);
                None
            }
        }
    }

    fn write(&self, text: &str) -> Result<(), ClipboardError> {
        self.with_retry("Clipboard write", |b| b.try_write(text))
    }
}

type Opener<H> = Box<dyn Fn() -> Result<H, BackendError> + Send + Sync>;

/// One handle kept open between operations and reopened after a hard failure.
///
/// On X11 and Wayland the process that last wrote the clipboard serves its
/// content, so the handle has to outlive each write for other applications
/// (and the paste that follows) to see it.
struct CachedHandle<H> {
    slot: Mutex<Option<H>>,
    open: Opener<H>,
}

impl<H> CachedHandle<H> {
    fn new(open: Opener<H>) -> Self {
        Self {
            slot: Mutex::new(None),
            open,
        }
    }

    fn with<T>(
        &self,
        op: impl FnOnce(&mut H) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        let mut handle = match slot.take() {
            Some(handle) => handle,
            None => {
                debug!("Opening clipboard handle");
                (self.open)()?
            }
        };

        let result = op(&mut handle);
        match &result {
            // A busy clipboard says nothing about our handle; dropping it would
            // also drop any content this process is serving.
            Ok(_) | Err(BackendError::Busy) => *slot = Some(handle),
            Err(BackendError::Failed(e)) => debug!("Discarding clipboard handle: {}", e),
        }
        result
    }
}

/// The real OS clipboard via arboard.
pub struct SystemClipboard {
    handle: CachedHandle<Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self {
            handle: CachedHandle::new(Box::new(|| {
                Clipboard::new().map_err(map_arboard_error)
            })),
        }
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

fn map_arboard_error(e: arboard::Error) -> BackendError {
    match e {
        arboard::Error::ClipboardOccupied => BackendError::Busy,
        other => BackendError::Failed(other.to_string()),
    }
}

impl ClipboardBackend for SystemClipboard {
    fn try_read(&self) -> Result<Option<String>, BackendError> {
        self.handle.with(|clipboard| match clipboard.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(map_arboard_error(e)),
        })
    }

    fn try_write(&self, text: &str) -> Result<(), BackendError> {
        self.handle.with(|clipboard| {
            if text.is_empty() {
                clipboard.clear().map_err(map_arboard_error)
            } else {
                clipboard.set_text(text).map_err(map_arboard_error)
            }
        })
    }
}

/// Clipboard content saved so it can be put back later. Absent text is stored
/// as `None` and restored by clearing the clipboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardSnapshot(Option<String>);

impl ClipboardSnapshot {
    pub fn capture(clipboard: &dyn ClipboardPort) -> Self {
        Self(clipboard.read())
    }

    pub fn text(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.text().is_empty()
    }
}

/// Scoped snapshot: takes a snapshot on creation and writes it back exactly once,
/// either through [`ClipboardRestoreGuard::restore`] or on drop.
///
/// The write-back is preceded by `delay` so a paste issued just before has time
/// to read the clipboard.
pub struct ClipboardRestoreGuard<'a> {
    clipboard: &'a dyn ClipboardPort,
    snapshot: ClipboardSnapshot,
    delay: Duration,
    restored: bool,
}

impl<'a> ClipboardRestoreGuard<'a> {
    pub fn take(clipboard: &'a dyn ClipboardPort, delay: Duration) -> Self {
        let snapshot = ClipboardSnapshot::capture(clipboard);
        debug!(
            "Clipboard snapshot taken ({} chars)",
            snapshot.text().chars().count()
        );
        Self {
            clipboard,
            snapshot,
            delay,
            restored: false,
        }
    }

    pub fn snapshot(&self) -> &ClipboardSnapshot {
        &self.snapshot
    }

    /// Restore now and report the outcome instead of only logging it.
    pub fn restore(mut self) -> Result<(), ClipboardError> {
        self.restored = true;
        self.write_back()
    }

    fn write_back(&self) -> Result<(), ClipboardError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.clipboard.write(self.snapshot.text())
    }
}

impl Drop for ClipboardRestoreGuard<'_> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        if let Err(e) = self.write_back() {
            warn!("Failed to restore clipboard: {}", e);
        }
    }
}
