//! Contract with the browser automation layer.
//!
//! The automation session drives a headless WhatsApp Web page. It is
//! constructed by a [`SessionFactory`], pushes lifecycle events through an
//! [`EventSink`], and is otherwise only ever touched by the lifecycle manager.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SessionError;

/// Lifecycle events emitted by an automation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new pairing challenge; the payload is the raw QR text.
    Qr(String),
    /// Chats are loaded and messages can be sent.
    Ready,
    /// Pairing succeeded (stored credentials or a scanned QR code).
    Authenticated,
    /// Progress while WhatsApp Web loads.
    LoadingScreen {
        /// Percent complete, as reported.
        percent: u8,
        /// Loading message.
        message: String,
    },
    /// Stored credentials were rejected.
    AuthFailure(String),
    /// The session dropped.
    Disconnected(String),
}

impl SessionEvent {
    /// Short event name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Qr(_) => "qr",
            SessionEvent::Ready => "ready",
            SessionEvent::Authenticated => "authenticated",
            SessionEvent::LoadingScreen { .. } => "loading_screen",
            SessionEvent::AuthFailure(_) => "auth_failure",
            SessionEvent::Disconnected(_) => "disconnected",
        }
    }
}

/// How the automation session should be launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Persistent credential store. Only one live session may hold it.
    pub credential_dir: PathBuf,
    /// Run the browser headless.
    pub headless: bool,
    /// Extra browser arguments for the constrained sandbox profile.
    pub sandbox_args: Vec<String>,
}

/// Channel a session uses to report lifecycle events.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Report an event. Returns false once the manager stopped listening.
    pub fn emit(&self, event: SessionEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Whether the manager stopped listening.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A live automation session.
#[async_trait]
pub trait AutomationSession: Send + Sync {
    /// Bring the session up. Pairing continues through events afterwards.
    async fn initialize(&self) -> Result<(), SessionError>;

    /// Send a text message to a chat id such as `919876543210@c.us`.
    async fn send_message(&self, chat_id: &str, body: &str) -> Result<(), SessionError>;

    /// Tear the session down and release the credential store.
    async fn destroy(&self) -> Result<(), SessionError>;
}

/// Constructs automation sessions.
pub trait SessionFactory: Send + Sync {
    /// Create a session wired to `events`. Must not start bring-up.
    fn create(
        &self,
        options: LaunchOptions,
        events: EventSink,
    ) -> Result<Arc<dyn AutomationSession>, SessionError>;
}
