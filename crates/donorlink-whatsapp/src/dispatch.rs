//! Single and bulk message dispatch.
//!
//! Sends never fail with an `Err`; every outcome is reported as a value so
//! callers can show it next to the donor it concerns.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::lifecycle::LifecycleManager;
use crate::state::Readiness;

/// Result of one send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendOutcome {
    fn delivered() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: &DispatchError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// One entry of a bulk send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRecipient {
    /// Phone number as entered.
    pub address: String,
    pub body: String,
}

impl BulkRecipient {
    pub fn new(address: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            body: body.into(),
        }
    }
}

/// A recipient that was not reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    pub address: String,
    pub error: String,
}

/// Summary of a bulk send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub success_count: usize,
    pub failed_count: usize,
    /// Failures in input order.
    pub errors: Vec<BulkFailure>,
}

/// Sends messages through the managed session, bringing it up on demand.
#[derive(Clone)]
pub struct Dispatcher {
    lifecycle: LifecycleManager,
}

impl Dispatcher {
    pub fn new(lifecycle: LifecycleManager) -> Self {
        Self { lifecycle }
    }

    /// Send one message.
    ///
    /// If the session is authenticated but still loading chats, fails fast
    /// with a retry hint. If it is not started, initializes and waits for the
    /// ready state first.
    pub async fn send_message(&self, address: &str, body: &str) -> SendOutcome {
        let result = self.try_send(address, body).await;
        self.lifecycle.record_delivery(result.is_ok()).await;

        match result {
            Ok(()) => SendOutcome::delivered(),
            Err(e) => {
                warn!(address = %address, error = %e, "Error sending WhatsApp message");
                SendOutcome::failed(&e)
            }
        }
    }

    async fn try_send(&self, address: &str, body: &str) -> Result<(), DispatchError> {
        let chat = self
            .lifecycle
            .config()
            .address_policy
            .chat_id_for(address)
            .ok_or_else(|| DispatchError::InvalidAddress(address.to_string()))?;

        let session = match self.lifecycle.readiness().await {
            Readiness::Ready(session) => session,
            Readiness::Synchronizing => return Err(DispatchError::Synchronizing),
            Readiness::NotReady => {
                info!("WhatsApp client not ready, initializing");
                if !self.lifecycle.initialize(true).await {
                    return Err(DispatchError::NotReady);
                }
                match self.lifecycle.readiness().await {
                    Readiness::Ready(session) => session,
                    _ => return Err(DispatchError::NoSession),
                }
            }
        };

        debug!(chat_id = %chat, "Sending WhatsApp message");
        session.send_message(&chat, body).await?;
        info!(chat_id = %chat, "WhatsApp message sent");
        Ok(())
    }

    /// Send to each recipient in order, pausing after every successful send
    /// that is followed by another recipient.
    pub async fn send_bulk(&self, recipients: &[BulkRecipient]) -> BulkReport {
        let pacing = self.lifecycle.config().bulk_pacing;
        let mut report = BulkReport::default();

        for (index, recipient) in recipients.iter().enumerate() {
            let outcome = self.send_message(&recipient.address, &recipient.body).await;
            if outcome.success {
                report.success_count += 1;
                if index + 1 < recipients.len() && !pacing.is_zero() {
                    tokio::time::sleep(pacing).await;
                }
            } else {
                report.failed_count += 1;
                report.errors.push(BulkFailure {
                    address: recipient.address.clone(),
                    error: outcome.error.unwrap_or_default(),
                });
            }
        }

        info!(
            sent = report.success_count,
            failed = report.failed_count,
            "Bulk WhatsApp send finished"
        );
        report
    }
}
