//! WhatsApp service configuration.

use std::path::PathBuf;
use std::time::Duration;

use donorlink_core::config::DEFAULT_CREDENTIAL_DIR;

use crate::address::AddressPolicy;
use crate::error::{Result, WhatsAppError};
use crate::session::LaunchOptions;

/// Browser flags for running inside containers without a setuid sandbox.
pub const DEFAULT_SANDBOX_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--no-zygote",
    "--single-process",
];

/// Configuration for the WhatsApp service.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Persistent credential store.
    pub credential_dir: PathBuf,
    /// Run the browser headless.
    pub headless: bool,
    /// Browser sandbox arguments.
    pub sandbox_args: Vec<String>,
    /// How long `initialize(true)` waits for the ready state.
    pub ready_timeout: Duration,
    /// How often the ready wait re-checks the phase.
    pub ready_poll_interval: Duration,
    /// Delay after each successful bulk send.
    pub bulk_pacing: Duration,
    /// Country-code policy for destination numbers.
    pub address_policy: AddressPolicy,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            credential_dir: PathBuf::from(DEFAULT_CREDENTIAL_DIR),
            headless: true,
            sandbox_args: DEFAULT_SANDBOX_ARGS.iter().map(|a| a.to_string()).collect(),
            ready_timeout: Duration::from_secs(60),
            ready_poll_interval: Duration::from_secs(1),
            bulk_pacing: Duration::from_secs(2),
            address_policy: AddressPolicy::default(),
        }
    }
}

impl WhatsAppConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the credential store and country-code policy from the environment.
    ///
    /// # Errors
    /// Returns an error if a country code variable is malformed.
    pub fn from_env() -> Result<Self> {
        let policy = AddressPolicy::new(
            donorlink_core::default_country_code()?,
            donorlink_core::country_prefixes()?,
        );
        Ok(Self::default()
            .with_credential_dir(donorlink_core::credential_dir())
            .with_address_policy(policy))
    }

    /// Sets the credential store directory.
    pub fn with_credential_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.credential_dir = dir.into();
        self
    }

    /// Sets headless mode.
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Replaces the sandbox arguments.
    pub fn with_sandbox_args(mut self, args: Vec<String>) -> Self {
        self.sandbox_args = args;
        self
    }

    /// Sets the ready timeout.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Sets the ready poll interval.
    pub fn with_ready_poll_interval(mut self, interval: Duration) -> Self {
        self.ready_poll_interval = interval;
        self
    }

    /// Sets the bulk pacing delay.
    pub fn with_bulk_pacing(mut self, pacing: Duration) -> Self {
        self.bulk_pacing = pacing;
        self
    }

    /// Sets the address policy.
    pub fn with_address_policy(mut self, policy: AddressPolicy) -> Self {
        self.address_policy = policy;
        self
    }

    /// Checks that durations and codes are usable.
    pub fn validate(&self) -> Result<()> {
        if self.ready_poll_interval.is_zero() {
            return Err(WhatsAppError::InvalidConfig(
                "ready poll interval must be non-zero".to_string(),
            ));
        }
        if self.ready_timeout < self.ready_poll_interval {
            return Err(WhatsAppError::InvalidConfig(format!(
                "ready timeout {:?} is shorter than poll interval {:?}",
                self.ready_timeout, self.ready_poll_interval
            )));
        }
        if self.credential_dir.as_os_str().is_empty() {
            return Err(WhatsAppError::InvalidConfig(
                "credential directory is empty".to_string(),
            ));
        }
        self.address_policy.validate()
    }

    /// Launch options handed to the session factory.
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            credential_dir: self.credential_dir.clone(),
            headless: self.headless,
            sandbox_args: self.sandbox_args.clone(),
        }
    }
}
