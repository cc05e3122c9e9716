use crate::actions::{PipelineTiming, ReplaceTiming};
use crate::llm_client::{TranslationConfig, DEFAULT_SYSTEM_PROMPT};
use crate::selection::CaptureTiming;
use crate::utils::RetryPolicy;
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR_NAME: &str = "yunsio-translate";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// Custom deserializer to handle both old numeric format (1-5) and new string format ("trace", "debug", etc.)
impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LogLevelVisitor;

        impl<'de> Visitor<'de> for LogLevelVisitor {
            type Value = LogLevel;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a string or integer representing log level")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<LogLevel, E> {
                value.parse().map_err(|_| {
                    E::unknown_variant(value, &["trace", "debug", "info", "warn", "error"])
                })
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<LogLevel, E> {
                match value {
                    1 => Ok(LogLevel::Trace),
                    2 => Ok(LogLevel::Debug),
                    3 => Ok(LogLevel::Info),
                    4 => Ok(LogLevel::Warn),
                    5 => Ok(LogLevel::Error),
                    _ => Err(E::invalid_value(de::Unexpected::Unsigned(value), &"1-5")),
                }
            }
        }

        deserializer.deserialize_any(LogLevelVisitor)
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("unknown log level '{}'", value)),
        }
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

/// User-tunable settings. The API key is deliberately not part of this file;
/// see `secure_keys`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppSettings {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_completion_path")]
    pub completion_path: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
    #[serde(default = "default_copy_retries")]
    pub copy_retries: u32,
    #[serde(default = "default_paste_retries")]
    pub paste_retries: u32,
    #[serde(default = "default_clipboard_retries")]
    pub clipboard_retries: u32,
    #[serde(default = "default_clipboard_retry_delay_ms")]
    pub clipboard_retry_delay_ms: u64,
    /// Wait after each synthesised copy/paste so the target app can react.
    #[serde(default = "default_input_settle_ms")]
    pub input_settle_ms: u64,
    #[serde(default = "default_input_retry_delay_ms")]
    pub input_retry_delay_ms: u64,
    #[serde(default = "default_selection_poll_attempts")]
    pub selection_poll_attempts: u32,
    #[serde(default = "default_selection_poll_interval_ms")]
    pub selection_poll_interval_ms: u64,
    #[serde(default = "default_capture_restore_delay_ms")]
    pub capture_restore_delay_ms: u64,
    #[serde(default = "default_paste_pre_delay_ms")]
    pub paste_pre_delay_ms: u64,
    #[serde(default = "default_paste_land_delay_ms")]
    pub paste_land_delay_ms: u64,
    #[serde(default = "default_replace_restore_delay_ms")]
    pub replace_restore_delay_ms: u64,
    /// 0 disables the limit.
    #[serde(default = "default_max_selection_chars")]
    pub max_selection_chars: usize,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

fn default_api_base_url() -> String {
    "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string()
}

fn default_completion_path() -> String {
    "/chat/completions".to_string()
}

fn default_model_name() -> String {
    "qwen-plus".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_user_agent() -> String {
    "YunsioTranslation/1.0".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_send_timeout_ms() -> u64 {
    10_000
}

fn default_receive_timeout_ms() -> u64 {
    30_000
}

fn default_copy_retries() -> u32 {
    3
}

fn default_paste_retries() -> u32 {
    3
}

fn default_clipboard_retries() -> u32 {
    5
}

fn default_clipboard_retry_delay_ms() -> u64 {
    20
}

fn default_input_settle_ms() -> u64 {
    50
}

fn default_input_retry_delay_ms() -> u64 {
    50
}

fn default_selection_poll_attempts() -> u32 {
    10
}

fn default_selection_poll_interval_ms() -> u64 {
    50
}

fn default_capture_restore_delay_ms() -> u64 {
    200
}

fn default_paste_pre_delay_ms() -> u64 {
    50
}

fn default_paste_land_delay_ms() -> u64 {
    100
}

fn default_replace_restore_delay_ms() -> u64 {
    200
}

fn default_max_selection_chars() -> usize {
    5000
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

pub fn get_default_settings() -> AppSettings {
    AppSettings {
        api_base_url: default_api_base_url(),
        completion_path: default_completion_path(),
        model_name: default_model_name(),
        temperature: default_temperature(),
        max_tokens: default_max_tokens(),
        system_prompt: default_system_prompt(),
        user_agent: default_user_agent(),
        connect_timeout_ms: default_connect_timeout_ms(),
        send_timeout_ms: default_send_timeout_ms(),
        receive_timeout_ms: default_receive_timeout_ms(),
        copy_retries: default_copy_retries(),
        paste_retries: default_paste_retries(),
        clipboard_retries: default_clipboard_retries(),
        clipboard_retry_delay_ms: default_clipboard_retry_delay_ms(),
        input_settle_ms: default_input_settle_ms(),
        input_retry_delay_ms: default_input_retry_delay_ms(),
        selection_poll_attempts: default_selection_poll_attempts(),
        selection_poll_interval_ms: default_selection_poll_interval_ms(),
        capture_restore_delay_ms: default_capture_restore_delay_ms(),
        paste_pre_delay_ms: default_paste_pre_delay_ms(),
        paste_land_delay_ms: default_paste_land_delay_ms(),
        replace_restore_delay_ms: default_replace_restore_delay_ms(),
        max_selection_chars: default_max_selection_chars(),
        log_level: default_log_level(),
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        get_default_settings()
    }
}

impl AppSettings {
    pub fn translation_config(&self, api_key: String) -> TranslationConfig {
        TranslationConfig {
            api_key,
            base_url: self.api_base_url.clone(),
            completion_path: self.completion_path.clone(),
            model: self.model_name.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            system_prompt: self.system_prompt.clone(),
            user_agent: self.user_agent.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            receive_timeout: Duration::from_millis(self.receive_timeout_ms),
        }
    }

    pub fn clipboard_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.clipboard_retries,
            Duration::from_millis(self.clipboard_retry_delay_ms),
        )
    }

    pub fn input_settle(&self) -> Duration {
        Duration::from_millis(self.input_settle_ms)
    }

    pub fn pipeline_timing(&self) -> PipelineTiming {
        let input_retry_delay = Duration::from_millis(self.input_retry_delay_ms);
        PipelineTiming {
            capture: CaptureTiming {
                copy_retry: RetryPolicy::new(self.copy_retries, input_retry_delay),
                poll_attempts: self.selection_poll_attempts,
                poll_interval: Duration::from_millis(self.selection_poll_interval_ms),
                restore_delay: Duration::from_millis(self.capture_restore_delay_ms),
                max_chars: self.max_selection_chars,
            },
            replace: ReplaceTiming {
                paste_retry: RetryPolicy::new(self.paste_retries, input_retry_delay),
                pre_paste_delay: Duration::from_millis(self.paste_pre_delay_ms),
                paste_land_delay: Duration::from_millis(self.paste_land_delay_ms),
                restore_delay: Duration::from_millis(self.replace_restore_delay_ms),
            },
        }
    }
}

/// `<config_dir>/yunsio-translate/settings.json`
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
}

/// Loads settings from `path`, writing defaults when the file does not exist.
///
/// A file that fails to parse is left alone and defaults are used instead.
/// A file missing some keys is rewritten with the defaults filled in.
pub fn load_or_create_app_settings(path: &Path) -> Result<AppSettings> {
    if !path.exists() {
        let default_settings = get_default_settings();
        write_settings(path, &default_settings)?;
        debug!("Created default settings at {}", path.display());
        return Ok(default_settings);
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;

    let value = match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to parse settings {}: {}", path.display(), e);
            return Ok(get_default_settings());
        }
    };
    let stored_keys = value.as_object().map(|o| o.len()).unwrap_or(0);

    match serde_json::from_value::<AppSettings>(value) {
        Ok(settings) => {
            let expected_keys = serde_json::to_value(&settings)?
                .as_object()
                .map(|o| o.len())
                .unwrap_or(0);
            if stored_keys < expected_keys {
                debug!("Settings file is missing keys, writing defaults back");
                write_settings(path, &settings)?;
            }
            Ok(settings)
        }
        Err(e) => {
            warn!("Failed to parse settings {}: {}", path.display(), e);
            Ok(get_default_settings())
        }
    }
}

pub fn write_settings(path: &Path, settings: &AppSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write settings to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE_NAME);

        let settings = load_or_create_app_settings(&path).unwrap();

        assert_eq!(settings, get_default_settings());
        assert!(path.exists());
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"model_name\": \"qwen-plus\""));
        assert!(!written.contains("api_key"));
    }

    #[test]
    fn partial_file_is_filled_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, r#"{"model_name":"qwen-max","receive_timeout_ms":5000}"#).unwrap();

        let settings = load_or_create_app_settings(&path).unwrap();

        assert_eq!(settings.model_name, "qwen-max");
        assert_eq!(settings.receive_timeout_ms, 5000);
        assert_eq!(settings.clipboard_retries, 5);
        let rewritten = std::fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("clipboard_retries"));
    }

    #[test]
    fn unparsable_file_falls_back_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();

        let settings = load_or_create_app_settings(&path).unwrap();

        assert_eq!(settings, get_default_settings());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn log_level_accepts_string_and_legacy_number() {
        let from_str: AppSettings = serde_json::from_str(r#"{"log_level":"DEBUG"}"#).unwrap();
        assert_eq!(from_str.log_level, LogLevel::Debug);
        let from_num: AppSettings = serde_json::from_str(r#"{"log_level":4}"#).unwrap();
        assert_eq!(from_num.log_level, LogLevel::Warn);
        assert!(serde_json::from_str::<AppSettings>(r#"{"log_level":9}"#).is_err());
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn views_use_configured_values() {
        let mut settings = get_default_settings();
        settings.copy_retries = 2;
        settings.receive_timeout_ms = 1;
        settings.capture_restore_delay_ms = 0;

        let config = settings.translation_config("secret".to_string());
        assert_eq!(config.receive_timeout, Duration::from_millis(1));
        assert_eq!(config.model, "qwen-plus");
        assert_eq!(config.api_key, "secret");

        let timing = settings.pipeline_timing();
        assert_eq!(timing.capture.copy_retry.attempts, 2);
        assert_eq!(timing.capture.restore_delay, Duration::ZERO);
        assert_eq!(timing.capture.poll_attempts, 10);
        assert_eq!(timing.replace.paste_retry.attempts, 3);
        assert_eq!(settings.clipboard_retry().attempts, 5);
    }
}
