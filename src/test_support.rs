//! In-memory stand-ins for the OS clipboard, input queue and translation service.

use crate::clipboard::ClipboardPort;
use crate::errors::{ClipboardError, ErrorKind, TranslationError};
use crate::input::InputPort;
use crate::llm_client::{TranslationResult, Translator};
use crate::notifications::Notifier;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct MemoryClipboard {
    content: Mutex<Option<String>>,
    writes: AtomicUsize,
    fail_writes: Mutex<bool>,
    failing_reads: AtomicU32,
}

impl MemoryClipboard {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_text(text: &str) -> Self {
        let clipboard = Self::default();
        *clipboard.content.lock().unwrap() = Some(text.to_string());
        clipboard
    }

    pub fn current(&self) -> Option<String> {
        self.content.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    /// The next `count` reads behave like a clipboard held by another process.
    pub fn fail_reads_for(&self, count: u32) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }
}

impl ClipboardPort for MemoryClipboard {
    fn read(&self) -> Option<String> {
        let failing = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return None;
        }
        self.current()
    }

    fn write(&self, text: &str) -> Result<(), ClipboardError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(ClipboardError::Busy { attempts: 5 });
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.content.lock().unwrap() = if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        };
        Ok(())
    }
}

/// Plays the focused application: a copy puts `selection` on the clipboard,
/// a paste records whatever the clipboard holds at that moment.
pub struct FakeInput {
    clipboard: Arc<MemoryClipboard>,
    selection: Option<String>,
    copy_fails: bool,
    paste_fails: bool,
    copies: AtomicU32,
    pastes: AtomicU32,
    pasted: Mutex<Vec<String>>,
}

impl FakeInput {
    pub fn new(clipboard: Arc<MemoryClipboard>, selection: Option<&str>) -> Self {
        Self {
            clipboard,
            selection: selection.map(str::to_string),
            copy_fails: false,
            paste_fails: false,
            copies: AtomicU32::new(0),
            pastes: AtomicU32::new(0),
            pasted: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_copy(mut self) -> Self {
        self.copy_fails = true;
        self
    }

    pub fn failing_paste(mut self) -> Self {
        self.paste_fails = true;
        self
    }

    pub fn copies(&self) -> u32 {
        self.copies.load(Ordering::SeqCst)
    }

    pub fn pastes(&self) -> u32 {
        self.pastes.load(Ordering::SeqCst)
    }

    pub fn pasted(&self) -> Vec<String> {
        self.pasted.lock().unwrap().clone()
    }
}

impl InputPort for FakeInput {
    fn simulate_copy(&self) -> bool {
        self.copies.fetch_add(1, Ordering::SeqCst);
        if self.copy_fails {
            return false;
        }
        if let Some(selection) = &self.selection {
            self.clipboard.write(selection).unwrap();
        }
        true
    }

    fn simulate_paste(&self) -> bool {
        self.pastes.fetch_add(1, Ordering::SeqCst);
        if self.paste_fails {
            return false;
        }
        let content = self.clipboard.current().unwrap_or_default();
        self.pasted.lock().unwrap().push(content);
        true
    }
}

/// Translator returning a canned reply after an optional delay.
pub struct MockTranslator {
    reply: Result<String, TranslationError>,
    delay: Duration,
    calls: AtomicU32,
    seen: Mutex<Vec<String>>,
}

impl MockTranslator {
    pub fn ok(text: &str) -> Self {
        Self::new(Ok(text.to_string()))
    }

    pub fn failing(error: TranslationError) -> Self {
        Self::new(Err(error))
    }

    fn new(reply: Result<String, TranslationError>) -> Self {
        Self {
            reply,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str) -> TranslationResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(text.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.reply {
            Ok(text) => TranslationResult::succeeded(text.clone()),
            Err(e) => TranslationResult::failed(e.clone()),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(ErrorKind, String)>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(ErrorKind, String)> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_failure(&self, kind: ErrorKind, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((kind, message.to_string()));
    }
}
