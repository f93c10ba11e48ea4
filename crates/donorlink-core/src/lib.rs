//! DonorLink Core - configuration and diagnostics shared by every DonorLink
//! interface.
//!
//! - **config**: state/config directory resolution, env-file loading and the
//!   WhatsApp settings read from the environment
//! - **diagnostics**: credential store probe used by health/debug surfaces

pub mod config;
pub mod diagnostics;
pub mod error;

pub use config::{
    config_dir, configured_credential_dir, country_prefixes, credential_dir, default_country_code,
    env_file, load_env_files, parse_country_code, parse_country_prefixes, state_dir,
};
pub use diagnostics::{
    collect as collect_diagnostics, probe_credential_dir, CredentialDirReport, DiagnosticsReport,
};
pub use error::{CoreError, Result};
