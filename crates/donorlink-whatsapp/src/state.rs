//! Session state and its event-driven transitions.
//!
//! [`SessionState`] is the single mutable record behind the lifecycle
//! manager. All mutation goes through the methods here so the invariants
//! hold after every step:
//!
//! - at most one pending initialization exists
//! - `Ready` implies a session handle and no QR challenge
//! - `Failed` and `Disconnected` imply no session handle
//! - a handle dropped by a disconnect is parked until it has been destroyed
//!
//! Every bring-up attempt gets a new generation number. Events and bring-up
//! completions tagged with an older generation are dropped, which is how a
//! logout or disconnect fences off work still running for the old session.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::qr::{QrChallenge, QrEncoder};
use crate::session::{AutomationSession, SessionEvent};

/// Lifecycle phase of the WhatsApp session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No session has been requested.
    #[default]
    Uninitialized,
    /// Bring-up in progress or waiting for a QR scan.
    Initializing,
    /// Paired, still loading chats.
    Authenticated,
    /// Messages can be sent.
    Ready,
    /// Construction or handshake failed.
    Failed,
    /// The session dropped; needs a new bring-up.
    Disconnected,
}

/// Loading progress reported while WhatsApp Web starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadingProgress {
    /// 0-100.
    pub percent: u8,
    /// Message shown next to the progress bar.
    pub message: String,
}

/// Diagnostic counters since the last logout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounters {
    /// Bring-up attempts started.
    pub bring_ups: u64,
    /// QR challenges rendered.
    pub qr_issued: u64,
    /// Messages delivered.
    pub messages_sent: u64,
    /// Messages that failed.
    pub messages_failed: u64,
}

/// Outcome of a bring-up attempt, as seen by callers attached to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BringUp {
    Pending,
    Started,
    Failed,
}

/// The single in-flight bring-up.
pub(crate) struct PendingInitialization {
    generation: u64,
    outcome: watch::Receiver<BringUp>,
}

/// Result of asking for a usable session.
pub(crate) enum Readiness {
    Ready(Arc<dyn AutomationSession>),
    Synchronizing,
    NotReady,
}

/// Mutable record of the WhatsApp session.
#[derive(Default)]
pub struct SessionState {
    phase: Phase,
    handle: Option<Arc<dyn AutomationSession>>,
    authenticated: bool,
    initialized: bool,
    qr: Option<QrChallenge>,
    last_qr_update: Option<DateTime<Utc>>,
    initialization_error: Option<String>,
    pending: Option<PendingInitialization>,
    loading: LoadingProgress,
    counters: SessionCounters,
    generation: u64,
    retired: Vec<Arc<dyn AutomationSession>>,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("phase", &self.phase)
            .field("has_handle", &self.handle.is_some())
            .field("authenticated", &self.authenticated)
            .field("initialized", &self.initialized)
            .field("qr", &self.qr.as_ref().map(|q| q.issued_at))
            .field("last_qr_update", &self.last_qr_update)
            .field("initialization_error", &self.initialization_error)
            .field("pending", &self.pending.as_ref().map(|p| p.generation))
            .field("loading", &self.loading)
            .field("counters", &self.counters)
            .field("generation", &self.generation)
            .field("retired", &self.retired.len())
            .finish()
    }
}

impl SessionState {
    /// Fresh, uninitialized state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether a session handle is held.
    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// Whether the session reported authentication.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Whether the session's own bring-up completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether a bring-up is in flight.
    pub fn is_initializing(&self) -> bool {
        self.pending.is_some() && !self.initialized
    }

    /// Whether messages can be sent.
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready && self.handle.is_some()
    }

    /// Latest QR challenge.
    pub fn qr_challenge(&self) -> Option<&QrChallenge> {
        self.qr.as_ref()
    }

    /// When the most recent QR challenge arrived. Survives the ready event.
    pub fn last_qr_update(&self) -> Option<DateTime<Utc>> {
        self.last_qr_update
    }

    /// Last fatal error.
    pub fn initialization_error(&self) -> Option<&str> {
        self.initialization_error.as_deref()
    }

    /// Loading progress.
    pub fn loading(&self) -> &LoadingProgress {
        &self.loading
    }

    /// Diagnostic counters.
    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    /// Current attempt generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub(crate) fn pending_outcome(&self) -> Option<watch::Receiver<BringUp>> {
        self.pending.as_ref().map(|p| p.outcome.clone())
    }

    pub(crate) fn readiness(&self) -> Readiness {
        match (&self.handle, self.phase) {
            (Some(handle), Phase::Ready) => Readiness::Ready(Arc::clone(handle)),
            _ if self.authenticated => Readiness::Synchronizing,
            _ => Readiness::NotReady,
        }
    }

    /// Start a new attempt. The caller must have checked that no attempt is
    /// pending and no handle is held.
    pub(crate) fn begin_attempt(&mut self) -> (u64, watch::Sender<BringUp>) {
        debug_assert!(self.pending.is_none() && self.handle.is_none());

        self.generation += 1;
        self.phase = Phase::Initializing;
        self.authenticated = false;
        self.initialized = false;
        self.qr = None;
        self.initialization_error = None;
        self.loading = LoadingProgress::default();
        self.counters.bring_ups += 1;

        let (tx, rx) = watch::channel(BringUp::Pending);
        self.pending = Some(PendingInitialization {
            generation: self.generation,
            outcome: rx,
        });
        (self.generation, tx)
    }

    /// Store the freshly constructed session. False if the attempt was superseded.
    pub(crate) fn attach_handle(
        &mut self,
        generation: u64,
        handle: Arc<dyn AutomationSession>,
    ) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.handle = Some(handle);
        true
    }

    /// Mark bring-up as started. False if the attempt was superseded.
    pub(crate) fn complete_attempt(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) || self.handle.is_none() {
            return false;
        }
        self.initialized = true;
        self.pending = None;
        true
    }

    /// Record a failed attempt and hand back the session for teardown.
    ///
    /// Superseded attempts leave the state alone and return `None`.
    pub(crate) fn fail_attempt(
        &mut self,
        generation: u64,
        message: String,
    ) -> Option<Arc<dyn AutomationSession>> {
        if !self.is_current(generation) {
            return None;
        }
        self.phase = Phase::Failed;
        self.authenticated = false;
        self.initialized = false;
        self.qr = None;
        self.pending = None;
        self.initialization_error = Some(message);
        self.handle.take()
    }

    /// Reset to `Uninitialized`, returning the handle for teardown.
    ///
    /// Sessions retired by a disconnect stay parked for the next holder of
    /// the credential lock.
    pub(crate) fn reset(&mut self) -> Option<Arc<dyn AutomationSession>> {
        let handle = self.handle.take();
        let retired = std::mem::take(&mut self.retired);
        let generation = self.generation + 1;
        *self = Self::default();
        self.generation = generation;
        self.retired = retired;
        handle
    }

    /// Whether disconnected sessions are waiting to be destroyed.
    pub(crate) fn has_retired(&self) -> bool {
        !self.retired.is_empty()
    }

    /// Take the disconnected sessions for teardown.
    pub(crate) fn take_retired(&mut self) -> Vec<Arc<dyn AutomationSession>> {
        std::mem::take(&mut self.retired)
    }

    pub(crate) fn record_delivery(&mut self, delivered: bool) {
        if delivered {
            self.counters.messages_sent += 1;
        } else {
            self.counters.messages_failed += 1;
        }
    }

    /// Apply a lifecycle event.
    pub fn apply(&mut self, event: SessionEvent, encoder: &dyn QrEncoder) {
        debug!(event = event.name(), phase = ?self.phase, "Applying session event");

        match event {
            SessionEvent::Qr(code) => {
                if self.phase == Phase::Ready {
                    warn!("Ignoring QR challenge for a session that is already ready");
                    return;
                }
                if let Some(challenge) = QrChallenge::render(&code, encoder) {
                    self.last_qr_update = Some(challenge.issued_at);
                    self.qr = Some(challenge);
                    self.counters.qr_issued += 1;
                }
            }
            SessionEvent::Ready => {
                if self.handle.is_none() {
                    debug!("Ignoring ready event without a session handle");
                    return;
                }
                info!("WhatsApp client is ready");
                self.phase = Phase::Ready;
                self.qr = None;
            }
            SessionEvent::Authenticated => {
                info!("WhatsApp authenticated");
                self.authenticated = true;
                if self.phase == Phase::Initializing {
                    self.phase = Phase::Authenticated;
                }
            }
            SessionEvent::LoadingScreen { percent, message } => {
                debug!(percent, message = %message, "WhatsApp loading");
                self.loading = LoadingProgress {
                    percent: percent.min(100),
                    message,
                };
            }
            SessionEvent::AuthFailure(reason) => {
                warn!(reason = %reason, "WhatsApp authentication failed");
                self.authenticated = false;
                if matches!(self.phase, Phase::Ready | Phase::Authenticated) {
                    self.phase = Phase::Initializing;
                }
                self.initialization_error = Some(format!("Authentication failed: {reason}"));
            }
            SessionEvent::Disconnected(reason) => {
                warn!(reason = %reason, "WhatsApp client disconnected");
                self.phase = Phase::Disconnected;
                if let Some(handle) = self.handle.take() {
                    self.retired.push(handle);
                }
                self.authenticated = false;
                self.initialized = false;
                self.qr = None;
                self.pending = None;
                self.generation += 1;
            }
        }
    }
}
