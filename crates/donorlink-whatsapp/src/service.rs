//! The WhatsApp service facade and process-wide instance.

use std::sync::{Arc, OnceLock};

use donorlink_core::{collect_diagnostics, probe_credential_dir, DiagnosticsReport};
use serde::Serialize;
use tracing::info;

use crate::config::WhatsAppConfig;
use crate::dispatch::{BulkRecipient, BulkReport, Dispatcher, SendOutcome};
use crate::error::Result;
use crate::lifecycle::LifecycleManager;
use crate::session::{SessionEvent, SessionFactory};
use crate::status::StatusSnapshot;

static SERVICE: OnceLock<WhatsAppService> = OnceLock::new();

/// Diagnostics combined with the live session status.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceDiagnostics {
    #[serde(flatten)]
    pub report: DiagnosticsReport,
    pub status: StatusSnapshot,
}

/// Entry point for everything WhatsApp.
#[derive(Clone)]
pub struct WhatsAppService {
    lifecycle: LifecycleManager,
    dispatcher: Dispatcher,
}

impl WhatsAppService {
    /// Builds a service after validating the configuration.
    pub fn new(config: WhatsAppConfig, factory: Arc<dyn SessionFactory>) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_lifecycle(LifecycleManager::new(config, factory)))
    }

    /// Wraps an existing manager.
    pub fn from_lifecycle(lifecycle: LifecycleManager) -> Self {
        Self {
            dispatcher: Dispatcher::new(lifecycle.clone()),
            lifecycle,
        }
    }

    /// Make this the process-wide instance.
    ///
    /// The first installed service wins; later calls return it unchanged.
    pub fn install(self) -> &'static WhatsAppService {
        let mut installed = false;
        let service = SERVICE.get_or_init(|| {
            installed = true;
            self
        });
        if installed {
            info!("WhatsApp service installed");
        }
        service
    }

    /// The process-wide instance, if one was installed.
    pub fn global() -> Option<&'static WhatsAppService> {
        SERVICE.get()
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn config(&self) -> &WhatsAppConfig {
        self.lifecycle.config()
    }

    /// See [`LifecycleManager::initialize`].
    pub async fn initialize(&self, wait_for_ready: bool) -> bool {
        self.lifecycle.initialize(wait_for_ready).await
    }

    /// See [`Dispatcher::send_message`].
    pub async fn send_message(&self, address: &str, body: &str) -> SendOutcome {
        self.dispatcher.send_message(address, body).await
    }

    /// See [`Dispatcher::send_bulk`].
    pub async fn send_bulk(&self, recipients: &[BulkRecipient]) -> BulkReport {
        self.dispatcher.send_bulk(recipients).await
    }

    pub async fn get_status(&self) -> StatusSnapshot {
        self.lifecycle.status().await
    }

    pub async fn is_ready(&self) -> bool {
        self.lifecycle.is_ready().await
    }

    /// See [`LifecycleManager::logout`].
    pub async fn logout(&self) -> bool {
        self.lifecycle.logout().await
    }

    /// Apply an event delivered by the host.
    pub async fn apply_event(&self, event: SessionEvent) {
        self.lifecycle.apply_event(event).await;
    }

    /// Environment and credential store checks plus current status.
    pub async fn diagnostics(&self) -> ServiceDiagnostics {
        let mut report = collect_diagnostics();
        report.credential_dir = probe_credential_dir(&self.config().credential_dir);
        ServiceDiagnostics {
            report,
            status: self.get_status().await,
        }
    }
}
