//! Selection Capturer: reads the current selection through a simulated copy
//! without leaving the user's clipboard changed.

use crate::clipboard::{ClipboardPort, ClipboardRestoreGuard};
use crate::errors::{CaptureError, InjectionError};
use crate::input::InputPort;
use crate::utils::RetryPolicy;
use log::debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTiming {
    pub copy_retry: RetryPolicy,
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    /// Wait before the pre-capture clipboard is written back.
    pub restore_delay: Duration,
    /// 0 disables the limit.
    pub max_chars: usize,
}

impl Default for CaptureTiming {
    fn default() -> Self {
        Self {
            copy_retry: RetryPolicy::new(3, Duration::from_millis(50)),
            poll_attempts: 10,
            poll_interval: Duration::from_millis(50),
            restore_delay: Duration::from_millis(200),
            max_chars: 0,
        }
    }
}

pub struct SelectionCapturer {
    clipboard: Arc<dyn ClipboardPort>,
    input: Arc<dyn InputPort>,
    timing: CaptureTiming,
}

impl SelectionCapturer {
    pub fn new(
        clipboard: Arc<dyn ClipboardPort>,
        input: Arc<dyn InputPort>,
        timing: CaptureTiming,
    ) -> Self {
        Self {
            clipboard,
            input,
            timing,
        }
    }

    /// Returns the selected text, guaranteed non-empty.
    ///
    /// Blocking: sleeps between retries and polls. Whatever the outcome, the
    /// clipboard is written back to its pre-capture content before returning.
    pub fn capture(&self) -> Result<String, CaptureError> {
        let start = Instant::now();
        let clipboard = self.clipboard.as_ref();
        let _restore = ClipboardRestoreGuard::take(clipboard, self.timing.restore_delay);

        // A stale value must not be mistaken for the fresh copy.
        clipboard.write("")?;

        let copy_retry = self.timing.copy_retry;
        copy_retry
            .run("Copy gesture", || self.input.simulate_copy())
            .ok_or(InjectionError::NotDelivered {
                gesture: "copy",
                attempts: copy_retry.attempts,
            })?;

        let text = self.poll_for_text().ok_or(CaptureError::NoSelection)?;

        let chars = text.chars().count();
        if self.timing.max_chars > 0 && chars > self.timing.max_chars {
            return Err(CaptureError::TooLarge {
                chars,
                max: self.timing.max_chars,
            });
        }

        debug!("Selection captured in {:?} ({} chars)", start.elapsed(), chars);
        Ok(text)
    }

    fn poll_for_text(&self) -> Option<String> {
        for attempt in 1..=self.timing.poll_attempts {
            if let Some(text) = self.clipboard.read().filter(|t| !t.is_empty()) {
                debug!("Clipboard populated after {} poll(s)", attempt);
                return Some(text);
            }
            std::thread::sleep(self.timing.poll_interval);
        }
        None
    }
}
