//! Error taxonomy for the capture → translate → replace pipeline.
//!
//! Every component error maps onto one [`ErrorKind`]. Where a failure happens
//! decides whether the user hears about it: capture failures are silent, failures
//! during or after translation go through the notifier whatever their kind.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Clipboard owned by another process for longer than the retry budget.
    ResourceBusy,
    /// Synthetic input could not be enqueued.
    InjectionFailed,
    /// Nothing showed up on the clipboard after the copy gesture.
    NoSelection,
    NetworkFailure,
    ParseFailure,
    Timeout,
}

impl ErrorKind {
    /// Timeouts are handled exactly like any other network failure.
    pub fn is_network_failure(self) -> bool {
        matches!(self, ErrorKind::NetworkFailure | ErrorKind::Timeout)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    #[error("clipboard still busy after {attempts} attempts")]
    Busy { attempts: u32 },
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
}

impl ClipboardError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ResourceBusy
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InjectionError {
    #[error("failed to initialise input backend: {0}")]
    Backend(String),
    #[error("{gesture} gesture not delivered after {attempts} attempts")]
    NotDelivered {
        gesture: &'static str,
        attempts: u32,
    },
}

impl InjectionError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InjectionFailed
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("could not clear clipboard before copy: {0}")]
    ResourceBusy(#[from] ClipboardError),
    #[error("copy gesture failed: {0}")]
    InjectionFailed(#[from] InjectionError),
    #[error("no text appeared on the clipboard after copy")]
    NoSelection,
    #[error("selection too large ({chars} characters, max {max})")]
    TooLarge { chars: usize, max: usize },
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::ResourceBusy(_) => ErrorKind::ResourceBusy,
            CaptureError::InjectionFailed(_) => ErrorKind::InjectionFailed,
            CaptureError::NoSelection | CaptureError::TooLarge { .. } => ErrorKind::NoSelection,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplaceError {
    #[error("clipboard access failed during replace: {0}")]
    Clipboard(#[from] ClipboardError),
    #[error("paste failed: {0}")]
    Injection(#[from] InjectionError),
}

impl ReplaceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReplaceError::Clipboard(e) => e.kind(),
            ReplaceError::Injection(e) => e.kind(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("response has no \"{0}\" key")]
    MissingKey(&'static str),
    #[error("response does not match the completion schema: {0}")]
    Schema(String),
    #[error("unterminated string value")]
    UnterminatedString,
    #[error("translated content is empty")]
    EmptyContent,
    #[error("translated content is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslationError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("failed to create request: {0}")]
    RequestCreation(String),
    #[error("failed to send request: {0}")]
    Send(String),
    #[error("failed to receive response: {0}")]
    Receive(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Parse(#[from] ParseError),
}

impl TranslationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranslationError::Timeout(_) => ErrorKind::Timeout,
            TranslationError::Parse(_) => ErrorKind::ParseFailure,
            TranslationError::Connect(_)
            | TranslationError::RequestCreation(_)
            | TranslationError::Send(_)
            | TranslationError::Receive(_)
            | TranslationError::Status { .. } => ErrorKind::NetworkFailure,
        }
    }
}
