//! Credential store and environment diagnostics.
//!
//! The WhatsApp session keeps its pairing credentials on disk. When the
//! service misbehaves on a fresh deploy, the usual culprit is a missing or
//! read-only credential directory, so this module probes it without touching
//! the session itself.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::{self, COUNTRY_PREFIXES_ENV, DEFAULT_COUNTRY_CODE_ENV, WHATSAPP_DATA_PATH_ENV};

/// Result of probing the credential directory.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CredentialDirReport {
    /// Path as configured.
    pub configured: PathBuf,
    /// Absolute path actually probed.
    pub resolved: PathBuf,
    /// Whether anything exists at the path.
    pub exists: bool,
    /// Whether the path is a directory (only when it exists).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_directory: Option<bool>,
    /// Whether a probe file could be written and removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writable: Option<bool>,
    /// Error from the write probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_error: Option<String>,
    /// Error from reading metadata, other than "not found".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fs_error: Option<String>,
}

/// Full diagnostics report.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    /// When the report was taken.
    pub time: DateTime<Utc>,
    /// Crate version.
    pub version: String,
    /// Relevant environment variables (None when unset).
    pub env: BTreeMap<String, Option<String>>,
    /// Credential store probe.
    pub credential_dir: CredentialDirReport,
}

/// Probe a credential directory for existence and writability.
pub fn probe_credential_dir(configured: &Path) -> CredentialDirReport {
    let resolved = config::resolve_path(configured);
    let mut report = CredentialDirReport {
        configured: configured.to_path_buf(),
        resolved: resolved.clone(),
        exists: false,
        is_directory: None,
        writable: None,
        write_error: None,
        fs_error: None,
    };

    let metadata = match fs::metadata(&resolved) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return report,
        Err(e) => {
            report.fs_error = Some(e.to_string());
            return report;
        }
    };

    report.exists = true;
    report.is_directory = Some(metadata.is_dir());
    if !metadata.is_dir() {
        return report;
    }

    let probe = resolved.join(format!(
        ".debug_write_test_{}",
        Utc::now().timestamp_millis()
    ));
    match fs::write(&probe, b"ok").and_then(|_| fs::remove_file(&probe)) {
        Ok(()) => report.writable = Some(true),
        Err(e) => {
            debug!(error = %e, path = %probe.display(), "Credential dir write probe failed");
            report.writable = Some(false);
            report.write_error = Some(e.to_string());
        }
    }

    report
}

/// Collect a diagnostics report for the configured credential store.
pub fn collect() -> DiagnosticsReport {
    let env = [WHATSAPP_DATA_PATH_ENV, DEFAULT_COUNTRY_CODE_ENV, COUNTRY_PREFIXES_ENV]
        .into_iter()
        .map(|key| (key.to_string(), std::env::var(key).ok()))
        .collect();

    DiagnosticsReport {
        time: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        env,
        credential_dir: probe_credential_dir(&config::configured_credential_dir()),
    }
}
