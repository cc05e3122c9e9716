//! Translation Client: one chat completion call per translation.
//!
//! Failures never cross the public API as `Err`: every call yields a
//! [`TranslationResult`] carrying the classified [`TranslationError`]. No retries
//! happen here; retrying is the coordinator's call.

use crate::errors::{ErrorKind, TranslationError};
use crate::response_parser::parse_completion;
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;
use std::time::{Duration, Instant};

pub const DEFAULT_SYSTEM_PROMPT: &str = "The Following Dialogue Enters Translation Mode, Answering Questions Is Prohibited, Only The Translation Is Returned. If I Send Chinese, You Translate It Into English (Please Convert The English Translation Result To PascalCase Format, For Example: GetObject, Remove All Spaces And Special Symbols). If I Send English, You Translate It Into Chinese. If The Word Is Misspelled Or You Don't Recognize It, You Need To Judge The Probable Meaning And Translate It. Only The Translation Result Is Returned, And No Explanation Or Additional Content Is Allowed.";

/// Everything needed to reach the completion endpoint.
#[derive(Clone)]
pub struct TranslationConfig {
    pub api_key: String,
    pub base_url: String,
    pub completion_path: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
    pub receive_timeout: Duration,
}

impl TranslationConfig {
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.completion_path.trim_start_matches('/')
        )
    }

    /// Upper bound on a single call: connect + send + receive.
    pub fn total_timeout(&self) -> Duration {
        self.connect_timeout + self.send_timeout + self.receive_timeout
    }
}

// The API key stays out of debug output.
impl std::fmt::Debug for TranslationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationConfig")
            .field("endpoint", &self.endpoint())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("connect_timeout", &self.connect_timeout)
            .field("send_timeout", &self.send_timeout)
            .field("receive_timeout", &self.receive_timeout)
            .finish_non_exhaustive()
    }
}

/// Outcome of one translation call. Produced once, consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    pub success: bool,
    pub text: String,
    pub error_detail: String,
    pub failure: Option<TranslationError>,
}

impl TranslationResult {
    pub fn succeeded(text: String) -> Self {
        Self {
            success: true,
            text,
            error_detail: String::new(),
            failure: None,
        }
    }

    pub fn failed(error: TranslationError) -> Self {
        Self {
            success: false,
            text: String::new(),
            error_detail: error.to_string(),
            failure: Some(error),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.failure.as_ref().map(TranslationError::kind)
    }

    pub fn into_result(self) -> Result<String, TranslationError> {
        match self.failure {
            Some(error) => Err(error),
            None => Ok(self.text),
        }
    }
}

impl From<Result<String, TranslationError>> for TranslationResult {
    fn from(result: Result<String, TranslationError>) -> Self {
        match result {
            Ok(text) => Self::succeeded(text),
            Err(error) => Self::failed(error),
        }
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// `text` must be non-empty.
    async fn translate(&self, text: &str) -> TranslationResult;
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

/// HTTP client for the chat completion endpoint. The underlying connection pool
/// is created once and reused for every call.
pub struct TranslationClient {
    client: reqwest::Client,
    config: TranslationConfig,
}

impl TranslationClient {
    pub fn new(config: TranslationConfig) -> Result<Self, TranslationError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.receive_timeout)
            .timeout(config.total_timeout())
            .build()
            .map_err(|e| {
                TranslationError::RequestCreation(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    fn build_request_body(&self, text: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: self.config.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: text.to_string(),
                },
            ],
        }
    }

    async fn request(&self, text: &str) -> Result<String, TranslationError> {
        if text.is_empty() {
            return Err(TranslationError::RequestCreation(
                "source text is empty".to_string(),
            ));
        }

        let url = self.config.endpoint();
        debug!("Sending translation request to: {}", url);

        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&self.build_request_body(text))
            .build()
            .map_err(|e| TranslationError::RequestCreation(e.to_string()))?;

        let mut response = self
            .client
            .execute(request)
            .await
            .map_err(classify_send_error)?;

        let status = response.status();

        let mut body = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) if e.is_timeout() => {
                    return Err(TranslationError::Timeout(e.to_string()))
                }
                Err(e) => return Err(TranslationError::Receive(e.to_string())),
            }
        }

        if !status.is_success() {
            return Err(TranslationError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        debug!("Received {} byte response", body.len());
        Ok(parse_completion(&body)?)
    }
}

fn classify_send_error(e: reqwest::Error) -> TranslationError {
    if e.is_timeout() {
        TranslationError::Timeout(e.to_string())
    } else if e.is_connect() {
        TranslationError::Connect(e.to_string())
    } else if e.is_builder() {
        TranslationError::RequestCreation(e.to_string())
    } else {
        TranslationError::Send(e.to_string())
    }
}

#[async_trait]
impl Translator for TranslationClient {
    async fn translate(&self, text: &str) -> TranslationResult {
        let start = Instant::now();
        let result = self.request(text).await;
        match &result {
            Ok(translated) => info!(
                "Translation completed in {:?} ({} chars -> {} chars)",
                start.elapsed(),
                text.chars().count(),
                translated.chars().count()
            ),
            Err(e) => warn!("Translation failed after {:?}: {}", start.elapsed(), e),
        }
        result.into()
    }
}
