//! Error types for the core crate.

use thiserror::Error;

/// Errors raised while reading DonorLink configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A country calling code was empty or contained non-digits.
    #[error("invalid country code '{0}': expected 1-3 digits")]
    InvalidCountryCode(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
