//! WhatsApp session management for DonorLink.
//!
//! This crate owns the one WhatsApp Web session the application uses to send
//! messages to donors:
//! - `LifecycleManager` - brings the session up at most once at a time,
//!   tracks pairing and readiness, and tears it down on logout
//! - `Dispatcher` - single and paced bulk sends, bringing the session up on
//!   demand
//! - `StatusSnapshot` - read-only view for the admin page
//! - `WhatsAppService` - facade over all of the above, with a process-wide
//!   instance
//!
//! The browser automation itself sits behind [`SessionFactory`] and
//! [`AutomationSession`]; hosts plug in their implementation.
//!
//! # Example
//!
//! ```ignore
//! use donorlink_whatsapp::{WhatsAppConfig, WhatsAppService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WhatsAppConfig::from_env()?;
//!     let service = WhatsAppService::new(config, Arc::new(MyBrowserFactory))?.install();
//!
//!     // Start pairing; the QR code shows up in the status snapshot
//!     service.initialize(false).await;
//!     println!("{}", service.get_status().await.summary());
//!
//!     let outcome = service.send_message("+91 98765-43210", "Thank you!").await;
//!     println!("sent: {}", outcome.success);
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod qr;
pub mod service;
pub mod session;
pub mod state;
pub mod status;

#[cfg(test)]
mod testing;

pub use address::{chat_id, is_dialable, normalize_address, AddressPolicy};
pub use config::WhatsAppConfig;
pub use dispatch::{BulkFailure, BulkRecipient, BulkReport, Dispatcher, SendOutcome};
pub use error::{DispatchError, QrError, Result, SessionError, WhatsAppError};
pub use lifecycle::LifecycleManager;
pub use qr::{QrChallenge, QrEncoder, QrFormat, SvgQrEncoder};
pub use service::{ServiceDiagnostics, WhatsAppService};
pub use session::{AutomationSession, EventSink, LaunchOptions, SessionEvent, SessionFactory};
pub use state::{LoadingProgress, Phase, SessionCounters, SessionState};
pub use status::StatusSnapshot;
