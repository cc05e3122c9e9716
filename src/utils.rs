use log::debug;
use std::fmt::Debug;
use std::time::Duration;

#[cfg(target_os = "linux")]
use std::process::Command;

/// Bounded retry budget: `attempts` tries with a fixed `delay` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Runs `op` until it succeeds or the budget is spent, returning the last
    /// error in the latter case. `op` receives the 1-based attempt number.
    /// The delay is only slept between attempts, never after the last one.
    pub fn retry<T, E: Debug>(
        &self,
        what: &str,
        mut op: impl FnMut(u32) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    debug!("{} failed (attempt {}/{}): {:?}", what, attempt, self.attempts, e);
                    if attempt >= self.attempts {
                        return Err(e);
                    }
                }
            }
            std::thread::sleep(self.delay);
            attempt += 1;
        }
    }

    /// [`retry`](Self::retry) for operations that only report success or failure.
    /// Returns the number of attempts used, `None` when every attempt failed.
    pub fn run(&self, what: &str, mut op: impl FnMut() -> bool) -> Option<u32> {
        self.retry(what, |attempt| {
            if op() {
                Ok(attempt)
            } else {
                Err("not delivered")
            }
        })
        .ok()
    }
}

/// Check if using the Wayland display server protocol
#[cfg(target_os = "linux")]
pub fn is_wayland() -> bool {
    std::env::var("WAYLAND_DISPLAY").is_ok()
        || std::env::var("XDG_SESSION_TYPE")
            .map(|v| v.to_lowercase() == "wayland")
            .unwrap_or(false)
}

/// Check whether an external helper binary is on PATH.
#[cfg(target_os = "linux")]
pub fn is_tool_available(tool: &str) -> bool {
    Command::new("which")
        .arg(tool)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
