//! Shared configuration for DonorLink.
//!
//! Locates the DonorLink state directory, loads env files, and reads the
//! WhatsApp settings that the notification service needs.
//!
//! # Storage Structure
//!
//! ```text
//! ~/.donorlink/
//! └── config/       # .env.local with secrets and overrides
//! ```
//!
//! The WhatsApp credential store lives wherever `WHATSAPP_DATA_PATH` points
//! (default `.wwebjs_auth` relative to the working directory). Its layout is
//! owned by the automation session.
//!
//! # Environment Variables
//!
//! - `DONORLINK_STATE_DIR`: Override the base state directory
//! - `DONORLINK_CONFIG_DIR`: Override the config directory
//! - `WHATSAPP_DATA_PATH`: Credential store directory for the WhatsApp session
//! - `WHATSAPP_DEFAULT_COUNTRY_CODE`: Calling code prepended to bare numbers (default `91`)
//! - `WHATSAPP_COUNTRY_PREFIXES`: Comma-separated prefixes treated as already
//!   carrying a country code (default `91,1`)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::debug;

use crate::error::{CoreError, Result};

/// Environment variable for custom state directory.
pub const STATE_DIR_ENV: &str = "DONORLINK_STATE_DIR";

/// Environment variable for custom config directory.
pub const CONFIG_DIR_ENV: &str = "DONORLINK_CONFIG_DIR";

/// Environment variable for the WhatsApp credential store.
pub const WHATSAPP_DATA_PATH_ENV: &str = "WHATSAPP_DATA_PATH";

/// Environment variable for the default country calling code.
pub const DEFAULT_COUNTRY_CODE_ENV: &str = "WHATSAPP_DEFAULT_COUNTRY_CODE";

/// Environment variable for recognized country prefixes.
pub const COUNTRY_PREFIXES_ENV: &str = "WHATSAPP_COUNTRY_PREFIXES";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".donorlink";

/// Default credential store, relative to the working directory.
pub const DEFAULT_CREDENTIAL_DIR: &str = ".wwebjs_auth";

/// India.
pub const DEFAULT_COUNTRY_CODE: &str = "91";

/// India and North America.
pub const DEFAULT_COUNTRY_PREFIXES: &[&str] = &["91", "1"];

const CONFIG_SUBDIR: &str = "config";

static STATE_DIR_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// Get the DonorLink state directory.
///
/// The state directory is determined by:
/// 1. `DONORLINK_STATE_DIR` environment variable if set
/// 2. `~/.donorlink` if home directory is available
/// 3. `.donorlink` in current directory as fallback
pub fn state_dir() -> PathBuf {
    STATE_DIR_CACHE
        .get_or_init(|| {
            std::env::var(STATE_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    dirs::home_dir()
                        .map(|h| h.join(DEFAULT_STATE_DIR))
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
                })
        })
        .clone()
}

/// Get the user config directory.
///
/// Defaults to `~/.donorlink/config/` or `DONORLINK_CONFIG_DIR` env var.
pub fn config_dir() -> PathBuf {
    std::env::var(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join(CONFIG_SUBDIR))
}

/// Get the .env.local file path.
pub fn env_file() -> PathBuf {
    config_dir().join(".env.local")
}

/// Load environment files, earlier files taking precedence.
///
/// Reads the config-directory `.env.local` first, then `.env.local` or `.env`
/// from the working directory. Variables already present in the process
/// environment are never overwritten. Returns the files that were loaded.
pub fn load_env_files() -> Vec<PathBuf> {
    let mut loaded = Vec::new();

    let env_path = env_file();
    if env_path.exists() && dotenvy::from_path(&env_path).is_ok() {
        loaded.push(env_path);
    }

    if let Ok(path) = dotenvy::from_filename(".env.local").or_else(|_| dotenvy::dotenv()) {
        loaded.push(path);
    }

    debug!(count = loaded.len(), "Loaded env files");
    loaded
}

/// Credential store path exactly as configured (possibly relative).
pub fn configured_credential_dir() -> PathBuf {
    std::env::var(WHATSAPP_DATA_PATH_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIAL_DIR))
}

/// Credential store path resolved against the working directory.
pub fn credential_dir() -> PathBuf {
    resolve_path(&configured_credential_dir())
}

/// Resolve a possibly relative path against the working directory.
pub fn resolve_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Default country calling code from the environment.
///
/// # Errors
/// Returns [`CoreError::InvalidCountryCode`] if the variable is set to
/// something other than 1-3 digits.
pub fn default_country_code() -> Result<String> {
    match std::env::var(DEFAULT_COUNTRY_CODE_ENV) {
        Ok(raw) if !raw.trim().is_empty() => parse_country_code(&raw),
        _ => Ok(DEFAULT_COUNTRY_CODE.to_string()),
    }
}

/// Recognized country prefixes from the environment.
///
/// # Errors
/// Returns [`CoreError::InvalidCountryCode`] if any listed prefix is invalid.
pub fn country_prefixes() -> Result<Vec<String>> {
    match std::env::var(COUNTRY_PREFIXES_ENV) {
        Ok(raw) if !raw.trim().is_empty() => parse_country_prefixes(&raw),
        _ => Ok(DEFAULT_COUNTRY_PREFIXES.iter().map(|p| p.to_string()).collect()),
    }
}

/// Parse a single country calling code, tolerating a leading `+`.
pub fn parse_country_code(raw: &str) -> Result<String> {
    let code = raw.trim().trim_start_matches('+');
    if code.is_empty() || code.len() > 3 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(CoreError::InvalidCountryCode(raw.to_string()));
    }
    Ok(code.to_string())
}

/// Parse a comma-separated list of country calling codes.
pub fn parse_country_prefixes(raw: &str) -> Result<Vec<String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(parse_country_code)
        .collect()
}
