//! Pipeline Coordinator: the single entry point the trigger calls into.
//!
//! Idle -> Capturing -> Translating -> Replacing -> Idle, with any failure going
//! straight back to Idle. Triggers that arrive while a pipeline is running are
//! dropped.

use crate::clipboard::{ClipboardPort, ClipboardRestoreGuard};
use crate::errors::{ErrorKind, InjectionError, ReplaceError};
use crate::input::InputPort;
use crate::llm_client::Translator;
use crate::notifications::{LogNotifier, Notifier};
use crate::selection::{CaptureTiming, SelectionCapturer};
use crate::session_manager::{PipelineSession, PipelineState, SessionManager};
use crate::utils::RetryPolicy;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceTiming {
    pub paste_retry: RetryPolicy,
    /// Between writing the translation and sending the paste.
    pub pre_paste_delay: Duration,
    /// After the paste, before the clipboard is put back.
    pub paste_land_delay: Duration,
    /// Extra settle time immediately before the write-back.
    pub restore_delay: Duration,
}

impl Default for ReplaceTiming {
    fn default() -> Self {
        Self {
            paste_retry: RetryPolicy::new(3, Duration::from_millis(50)),
            pre_paste_delay: Duration::from_millis(50),
            paste_land_delay: Duration::from_millis(100),
            restore_delay: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineTiming {
    pub capture: CaptureTiming,
    pub replace: ReplaceTiming,
}

/// What a single trigger ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Another pipeline was already running.
    Dropped,
    NothingSelected,
    CaptureFailed(ErrorKind),
    TranslationFailed(ErrorKind),
    ReplaceFailed(ErrorKind),
    /// A blocking step panicked.
    Aborted,
    Replaced,
}

pub struct PipelineCoordinator {
    clipboard: Arc<dyn ClipboardPort>,
    input: Arc<dyn InputPort>,
    capturer: Arc<SelectionCapturer>,
    translator: Arc<dyn Translator>,
    notifier: Arc<dyn Notifier>,
    sessions: SessionManager,
    replace_timing: ReplaceTiming,
}

impl PipelineCoordinator {
    pub fn new(
        clipboard: Arc<dyn ClipboardPort>,
        input: Arc<dyn InputPort>,
        translator: Arc<dyn Translator>,
        timing: PipelineTiming,
    ) -> Self {
        let capturer = SelectionCapturer::new(clipboard.clone(), input.clone(), timing.capture);
        Self {
            clipboard,
            input,
            capturer: Arc::new(capturer),
            translator,
            notifier: Arc::new(LogNotifier),
            sessions: SessionManager::new(),
            replace_timing: timing.replace,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.sessions.current()
    }

    /// Claims the pipeline and runs it on the Tokio runtime.
    ///
    /// Returns `None` when a pipeline is already in flight. The claim happens
    /// before this returns, so concurrent callers race on it deterministically.
    /// Must be called from within a Tokio runtime.
    pub fn on_trigger(self: &Arc<Self>) -> Option<JoinHandle<PipelineOutcome>> {
        let session = self.sessions.try_begin()?;
        let this = Arc::clone(self);
        Some(tokio::spawn(async move { this.run(session).await }))
    }

    /// Like [`on_trigger`](Self::on_trigger), but waits for the outcome.
    pub async fn trigger(self: &Arc<Self>) -> PipelineOutcome {
        match self.on_trigger() {
            None => PipelineOutcome::Dropped,
            Some(handle) => handle.await.unwrap_or_else(|e| {
                error!("Pipeline task failed: {}", e);
                PipelineOutcome::Aborted
            }),
        }
    }

    async fn run(&self, session: PipelineSession) -> PipelineOutcome {
        let start = Instant::now();

        let capturer = Arc::clone(&self.capturer);
        let captured = match tokio::task::spawn_blocking(move || capturer.capture()).await {
            Ok(result) => result,
            Err(e) => {
                error!("Selection capture task failed: {}", e);
                return PipelineOutcome::Aborted;
            }
        };

        let selected_text = match captured {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NoSelection => {
                debug!("Nothing to translate: {}", e);
                return PipelineOutcome::NothingSelected;
            }
            Err(e) => {
                info!("Selection capture failed: {}", e);
                return PipelineOutcome::CaptureFailed(e.kind());
            }
        };
        debug!("Selected text: {}", selected_text);

        session.advance(PipelineState::Translating);
        let translated = match self.translator.translate(&selected_text).await.into_result() {
            Ok(text) => text,
            Err(e) => {
                self.notifier.notify_failure(e.kind(), &e.to_string());
                return PipelineOutcome::TranslationFailed(e.kind());
            }
        };

        let translated = translated.trim().to_string();
        if translated.is_empty() {
            self.notifier
                .notify_failure(ErrorKind::ParseFailure, "translation is blank");
            return PipelineOutcome::TranslationFailed(ErrorKind::ParseFailure);
        }
        debug!("Translated text: {}", translated);

        session.advance(PipelineState::Replacing);
        let clipboard = Arc::clone(&self.clipboard);
        let input = Arc::clone(&self.input);
        let timing = self.replace_timing;
        let replaced = tokio::task::spawn_blocking(move || {
            replace_selection(clipboard.as_ref(), input.as_ref(), &translated, &timing)
        })
        .await;

        match replaced {
            Ok(Ok(())) => {
                info!("Selection replaced in {:?}", start.elapsed());
                PipelineOutcome::Replaced
            }
            Ok(Err(e)) => {
                self.notifier.notify_failure(e.kind(), &e.to_string());
                PipelineOutcome::ReplaceFailed(e.kind())
            }
            Err(e) => {
                error!("Replace task failed: {}", e);
                PipelineOutcome::Aborted
            }
        }
    }
}

/// Puts `text` on the clipboard, pastes it over the selection, then writes back
/// whatever the clipboard held just before. The write-back also happens when
/// the paste fails.
fn replace_selection(
    clipboard: &dyn ClipboardPort,
    input: &dyn InputPort,
    text: &str,
    timing: &ReplaceTiming,
) -> Result<(), ReplaceError> {
    // Re-snapshot: the clipboard may have changed since capture.
    let restore = ClipboardRestoreGuard::take(clipboard, timing.restore_delay);

    clipboard.write(text)?;
    std::thread::sleep(timing.pre_paste_delay);

    timing
        .paste_retry
        .run("Paste gesture", || input.simulate_paste())
        .ok_or(InjectionError::NotDelivered {
            gesture: "paste",
            attempts: timing.paste_retry.attempts,
        })?;

    std::thread::sleep(timing.paste_land_delay);
    restore.restore()?;
    Ok(())
}
