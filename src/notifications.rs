//! Failure notification for the translate pipeline.
//!
//! Failures at or after the translation step are reported through a [`Notifier`]
//! with a short, categorised text. Reporting never blocks and never shows a
//! modal dialog. Failures before translation stay silent.

use crate::errors::ErrorKind;
use log::{debug, warn};

/// Error categories for the user-facing message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureCategory {
    TlsCertificate,
    TlsHandshake,
    Timeout,
    NetworkError,
    ServerError,
    ParseError,
    Unknown,
}

impl FailureCategory {
    /// Get the display text for this error category
    pub fn display_text(&self) -> &'static str {
        match self {
            FailureCategory::TlsCertificate => "Certificate error",
            FailureCategory::TlsHandshake => "Connection failed",
            FailureCategory::Timeout => "Request timed out",
            FailureCategory::NetworkError => "Network unavailable",
            FailureCategory::ServerError => "Server error",
            FailureCategory::ParseError => "Invalid response",
            FailureCategory::Unknown => "Translation failed",
        }
    }
}

/// Categorize a failure from its kind, refining network failures by the error text
pub fn categorize_error(kind: ErrorKind, detail: &str) -> FailureCategory {
    match kind {
        ErrorKind::Timeout => return FailureCategory::Timeout,
        ErrorKind::ParseFailure => return FailureCategory::ParseError,
        ErrorKind::NetworkFailure => {}
        _ => return FailureCategory::Unknown,
    }

    let err_lower = detail.to_lowercase();

    if err_lower.contains("certificate")
        || err_lower.contains("unknownissuer")
        || err_lower.contains("certnotvalidforname")
        || err_lower.contains("expired")
    {
        FailureCategory::TlsCertificate
    } else if err_lower.contains("tls")
        || err_lower.contains("handshake")
        || err_lower.contains("ssl")
    {
        FailureCategory::TlsHandshake
    } else if err_lower.contains("timeout") || err_lower.contains("timed out") {
        FailureCategory::Timeout
    } else if err_lower.contains("with status") {
        FailureCategory::ServerError
    } else {
        FailureCategory::NetworkError
    }
}

pub trait Notifier: Send + Sync {
    fn notify_failure(&self, kind: ErrorKind, message: &str);
}

/// Default notifier: one warning line in the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_failure(&self, kind: ErrorKind, message: &str) {
        let category = categorize_error(kind, message);
        debug!("Failure categorized as {:?}: {}", category, message);
        warn!("{}: {}", category.display_text(), message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_tls_certificate() {
        assert_eq!(
            categorize_error(
                ErrorKind::NetworkFailure,
                "connection failed: invalid peer certificate: UnknownIssuer"
            ),
            FailureCategory::TlsCertificate
        );
    }

    #[test]
    fn test_categorize_handshake() {
        assert_eq!(
            categorize_error(ErrorKind::NetworkFailure, "tls handshake eof"),
            FailureCategory::TlsHandshake
        );
    }

    #[test]
    fn test_categorize_timeout() {
        assert_eq!(
            categorize_error(ErrorKind::Timeout, "request timed out: operation timed out"),
            FailureCategory::Timeout
        );
    }

    #[test]
    fn test_categorize_network() {
        assert_eq!(
            categorize_error(
                ErrorKind::NetworkFailure,
                "connection failed: error trying to connect"
            ),
            FailureCategory::NetworkError
        );
    }

    #[test]
    fn test_categorize_server() {
        assert_eq!(
            categorize_error(
                ErrorKind::NetworkFailure,
                "API request failed with status 503: upstream overloaded"
            ),
            FailureCategory::ServerError
        );
    }

    #[test]
    fn test_categorize_parse() {
        assert_eq!(
            categorize_error(ErrorKind::ParseFailure, "failed to parse response"),
            FailureCategory::ParseError
        );
        assert_eq!(FailureCategory::ParseError.display_text(), "Invalid response");
    }

    #[test]
    fn test_categorize_unknown() {
        assert_eq!(
            categorize_error(ErrorKind::ResourceBusy, "clipboard still busy"),
            FailureCategory::Unknown
        );
    }
}
