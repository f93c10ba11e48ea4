//! Error types for the WhatsApp session crate.
//!
//! None of these escape the public operations of [`crate::WhatsAppService`];
//! they are rendered into status snapshots and send outcomes instead.

use thiserror::Error;

/// Errors raised while building the service.
#[derive(Debug, Error)]
pub enum WhatsAppError {
    /// Configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Shared configuration could not be read.
    #[error(transparent)]
    Core(#[from] donorlink_core::CoreError),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, WhatsAppError>;

/// Failures reported by the browser automation session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The session could not be constructed.
    #[error("failed to launch WhatsApp session: {0}")]
    Launch(String),

    /// The session's own initialize handshake failed.
    #[error("WhatsApp handshake failed: {0}")]
    Handshake(String),

    /// A message could not be delivered.
    #[error("{0}")]
    Send(String),

    /// Teardown failed.
    #[error("failed to destroy WhatsApp session: {0}")]
    Destroy(String),
}

/// Failure to turn a pairing payload into something displayable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QrError {
    /// The payload could not be encoded.
    #[error("failed to encode QR payload: {0}")]
    Encode(String),
}

/// Reasons a single send did not go out.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The address has no digits left after normalization, or has stray characters.
    #[error("Invalid phone number: '{0}'")]
    InvalidAddress(String),

    /// Authenticated but the client has not finished loading chats.
    #[error("WhatsApp is still synchronizing your messages. Please wait a moment and try again.")]
    Synchronizing,

    /// Initialization did not reach the ready state.
    #[error("WhatsApp client is not ready. Please scan the QR code in the Admin panel first.")]
    NotReady,

    /// Ready was reported but the session handle is gone.
    #[error("WhatsApp client not initialized")]
    NoSession,

    /// The automation session rejected the send.
    #[error(transparent)]
    Send(#[from] SessionError),
}

impl DispatchError {
    /// Whether retrying shortly is likely to succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DispatchError::Synchronizing)
    }
}
