//! Phone number normalization for WhatsApp direct chats.

use donorlink_core::config::{DEFAULT_COUNTRY_CODE, DEFAULT_COUNTRY_PREFIXES};

use crate::error::{Result, WhatsAppError};

/// Suffix WhatsApp Web uses for one-to-one chats.
pub const DIRECT_CHAT_SUFFIX: &str = "@c.us";

/// Country-code policy applied to donor phone numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPolicy {
    default_country_code: String,
    recognized_prefixes: Vec<String>,
}

impl Default for AddressPolicy {
    fn default() -> Self {
        Self {
            default_country_code: DEFAULT_COUNTRY_CODE.to_string(),
            recognized_prefixes: DEFAULT_COUNTRY_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl AddressPolicy {
    /// Creates a policy.
    pub fn new(default_country_code: impl Into<String>, recognized_prefixes: Vec<String>) -> Self {
        Self {
            default_country_code: default_country_code.into(),
            recognized_prefixes,
        }
    }

    /// Code prepended to numbers without a recognized prefix.
    pub fn default_country_code(&self) -> &str {
        &self.default_country_code
    }

    /// Prefixes treated as already carrying a country code.
    pub fn recognized_prefixes(&self) -> &[String] {
        &self.recognized_prefixes
    }

    /// Normalize a raw number. See [`normalize_address`].
    pub fn normalize(&self, raw: &str) -> String {
        normalize_address(raw, self)
    }

    /// Direct-chat id for a raw number, or `None` if it cannot be addressed.
    ///
    /// Input without any digits is rejected rather than turned into a bare
    /// country code.
    pub fn chat_id_for(&self, raw: &str) -> Option<String> {
        let normalized = self.normalize(raw);
        if raw.chars().any(|c| c.is_ascii_digit()) && is_dialable(&normalized) {
            Some(chat_id(&normalized))
        } else {
            None
        }
    }

    /// Checks that all codes are digits.
    pub fn validate(&self) -> Result<()> {
        let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        if !digits(&self.default_country_code) {
            return Err(WhatsAppError::InvalidConfig(format!(
                "default country code '{}' is not numeric",
                self.default_country_code
            )));
        }
        if let Some(bad) = self.recognized_prefixes.iter().find(|p| !digits(p)) {
            return Err(WhatsAppError::InvalidConfig(format!(
                "country prefix '{bad}' is not numeric"
            )));
        }
        Ok(())
    }
}

/// Strip `+`, whitespace and hyphens, then prepend the default country code
/// unless the digits already start with a recognized prefix.
///
/// Prefix matching is textual, so with the default policy any number starting
/// with `1` is taken as North American.
pub fn normalize_address(raw: &str, policy: &AddressPolicy) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| *c != '+' && *c != '-' && !c.is_whitespace())
        .collect();

    if policy
        .recognized_prefixes
        .iter()
        .any(|prefix| stripped.starts_with(prefix.as_str()))
    {
        stripped
    } else {
        format!("{}{}", policy.default_country_code, stripped)
    }
}

/// Whether a normalized number can be addressed.
pub fn is_dialable(normalized: &str) -> bool {
    !normalized.is_empty() && normalized.chars().all(|c| c.is_ascii_digit())
}

/// Direct-chat id for a normalized number.
pub fn chat_id(normalized: &str) -> String {
    format!("{normalized}{DIRECT_CHAT_SUFFIX}")
}
