//! Pipeline Session Management
//!
//! Single-flight guard for the translate-selection pipeline. `PipelineSession`
//! is an RAII guard:
//! - Claiming one moves the state from Idle to Capturing, or fails when a
//!   pipeline is already running (the trigger is dropped, not queued)
//! - Dropping it puts the state back to Idle, whichever way the pipeline ended

use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard};

/// Where the single pipeline currently is. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// No pipeline in progress; the next trigger may start one
    #[default]
    Idle,
    Capturing,
    Translating,
    Replacing,
}

impl PipelineState {
    fn can_advance_to(self, next: PipelineState) -> bool {
        matches!(
            (self, next),
            (PipelineState::Capturing, PipelineState::Translating)
                | (PipelineState::Translating, PipelineState::Replacing)
        )
    }
}

/// Owner of the process-wide pipeline state.
#[derive(Debug, Clone, Default)]
pub struct SessionManager {
    state: Arc<Mutex<PipelineState>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> PipelineState {
        *self.lock()
    }

    /// Claims the pipeline. Returns `None` if one is already in flight.
    pub fn try_begin(&self) -> Option<PipelineSession> {
        let mut state = self.lock();
        if *state != PipelineState::Idle {
            debug!("try_begin: pipeline busy ({:?}), dropping trigger", *state);
            return None;
        }
        *state = PipelineState::Capturing;
        debug!("try_begin: Idle -> Capturing");
        Some(PipelineSession {
            state: Arc::clone(&self.state),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Proof that this caller owns the running pipeline.
#[derive(Debug)]
pub struct PipelineSession {
    state: Arc<Mutex<PipelineState>>,
}

impl PipelineSession {
    pub fn state(&self) -> PipelineState {
        *self.lock()
    }

    /// Moves forward along Capturing -> Translating -> Replacing.
    /// Any other transition is ignored and logged.
    pub fn advance(&self, next: PipelineState) {
        let mut state = self.lock();
        if state.can_advance_to(next) {
            debug!("PipelineSession: {:?} -> {:?}", *state, next);
            *state = next;
        } else {
            warn!(
                "PipelineSession: ignoring invalid transition {:?} -> {:?}",
                *state, next
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for PipelineSession {
    fn drop(&mut self) {
        let mut state = self.lock();
        debug!("PipelineSession: {:?} -> Idle", *state);
        *state = PipelineState::Idle;
    }
}
