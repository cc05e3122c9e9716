//! API key resolution.
//!
//! The key is looked up in the `YUNSIO_API_KEY` environment variable first and
//! then in the OS credential store. On Windows the store is the Credential
//! Manager; on other platforms the store functions are stubs that return errors,
//! so the environment variable is the only source there.

use anyhow::{anyhow, Result};
use log::debug;

pub const API_KEY_ENV: &str = "YUNSIO_API_KEY";

const SERVICE_NAME: &str = "yunsio-translate";
const CREDENTIAL_NAME: &str = "translation_api_key";

// ============================================================================
// Windows implementation using keyring crate
// ============================================================================

#[cfg(target_os = "windows")]
pub fn set_api_key(key: &str) -> Result<()> {
    debug!("Storing API key in credential manager: {}", CREDENTIAL_NAME);

    let entry = keyring::Entry::new(SERVICE_NAME, CREDENTIAL_NAME)?;

    if key.trim().is_empty() {
        // Empty key means "forget it"
        match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow!("Failed to delete credential: {}", e)),
        }
    } else {
        entry
            .set_password(key.trim())
            .map_err(|e| anyhow!("Failed to store API key: {}", e))
    }
}

#[cfg(target_os = "windows")]
pub fn get_api_key() -> Result<String> {
    let entry = keyring::Entry::new(SERVICE_NAME, CREDENTIAL_NAME)?;
    match entry.get_password() {
        Ok(key) => Ok(key),
        // Nothing stored is not an error
        Err(keyring::Error::NoEntry) => Ok(String::new()),
        Err(e) => Err(anyhow!("Failed to read API key: {}", e)),
    }
}

// ============================================================================
// Non-Windows stubs
// ============================================================================

#[cfg(not(target_os = "windows"))]
pub fn set_api_key(_key: &str) -> Result<()> {
    Err(anyhow!(
        "Secure key storage is only available on Windows; set {} instead",
        API_KEY_ENV
    ))
}

#[cfg(not(target_os = "windows"))]
pub fn get_api_key() -> Result<String> {
    Err(anyhow!("Secure key storage is only available on Windows"))
}

/// Returns the API key to use for translation requests.
///
/// An empty or missing key is an error: the pipeline cannot do anything
/// useful without one.
pub fn resolve_api_key() -> Result<String> {
    resolve_from(std::env::var(API_KEY_ENV).ok(), get_api_key)
}

fn resolve_from(
    env_value: Option<String>,
    stored: impl FnOnce() -> Result<String>,
) -> Result<String> {
    if let Some(key) = env_value.map(|v| v.trim().to_string()) {
        if !key.is_empty() {
            debug!("Using API key from {}", API_KEY_ENV);
            return Ok(key);
        }
    }

    match stored() {
        Ok(key) if !key.trim().is_empty() => {
            debug!("Using API key from credential store");
            Ok(key.trim().to_string())
        }
        Ok(_) => Err(anyhow!(
            "No API key configured: set {} or store one with --store-key",
            API_KEY_ENV
        )),
        Err(e) => Err(anyhow!(
            "No API key configured: set {} ({})",
            API_KEY_ENV,
            e
        )),
    }
}
