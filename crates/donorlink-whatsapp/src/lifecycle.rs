//! Session lifecycle: bring-up, readiness, event wiring and logout.
//!
//! Bring-up runs on a spawned task so that callers who stop waiting do not
//! cancel it. Concurrent `initialize` calls attach to the single pending
//! attempt through a watch channel stored in [`SessionState`].
//!
//! The credential store may only be held by one live session. The manager
//! serializes everything that opens or releases it (session construction and
//! handshake, failed-attempt teardown, logout teardown) behind one lock.
//! Sessions dropped by a disconnect are parked in [`SessionState`] and
//! destroyed by whoever takes the lock next, always before a new session is
//! constructed.

use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::WhatsAppConfig;
use crate::qr::{QrEncoder, SvgQrEncoder};
use crate::session::{AutomationSession, EventSink, SessionEvent, SessionFactory};
use crate::state::{BringUp, Phase, Readiness, SessionState};
use crate::status::StatusSnapshot;

struct Inner {
    config: WhatsAppConfig,
    factory: Arc<dyn SessionFactory>,
    encoder: Arc<dyn QrEncoder>,
    state: RwLock<SessionState>,
    credential_lock: Mutex<()>,
}

impl Inner {
    async fn apply(self: &Arc<Self>, generation: Option<u64>, event: SessionEvent) {
        let retired = {
            let mut state = self.state.write().await;
            if let Some(generation) = generation {
                if !state.is_current(generation) {
                    debug!(
                        event = event.name(),
                        generation,
                        "Dropping event from superseded session"
                    );
                    return;
                }
            }
            state.apply(event, self.encoder.as_ref());
            state.has_retired()
        };

        // the event pump must not wait on the credential lock
        if retired {
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                let _store = inner.credential_lock.lock().await;
                inner.destroy_retired().await;
            });
        }
    }

    /// Destroy disconnected sessions. Callers hold the credential lock.
    async fn destroy_retired(&self) {
        let retired = self.state.write().await.take_retired();
        for session in retired {
            info!("Destroying disconnected WhatsApp session");
            destroy_quietly(session.as_ref()).await;
        }
    }
}

enum Attach {
    Running,
    InFlight(watch::Receiver<BringUp>),
}

/// Owns the WhatsApp session state machine.
///
/// Cloning is cheap; clones share the same session.
#[derive(Clone)]
pub struct LifecycleManager {
    inner: Arc<Inner>,
}

impl LifecycleManager {
    /// Creates a manager with the default QR encoder.
    pub fn new(config: WhatsAppConfig, factory: Arc<dyn SessionFactory>) -> Self {
        Self::with_encoder(config, factory, Arc::new(SvgQrEncoder::default()))
    }

    /// Creates a manager with a custom QR encoder.
    pub fn with_encoder(
        config: WhatsAppConfig,
        factory: Arc<dyn SessionFactory>,
        encoder: Arc<dyn QrEncoder>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                factory,
                encoder,
                state: RwLock::new(SessionState::new()),
                credential_lock: Mutex::new(()),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &WhatsAppConfig {
        &self.inner.config
    }

    /// Ensure a session exists, optionally waiting until it is ready.
    ///
    /// Returns true immediately when already ready. Otherwise joins the
    /// in-flight bring-up, or starts one if there is none. With
    /// `wait_for_ready` false, returns true once bring-up has started (a QR
    /// code may still need scanning). With it true, waits up to the
    /// configured timeout for the ready state.
    pub async fn initialize(&self, wait_for_ready: bool) -> bool {
        let attach = {
            let mut state = self.inner.state.write().await;
            if state.phase() == Phase::Ready {
                return true;
            }
            if let Some(outcome) = state.pending_outcome() {
                debug!("Joining in-flight WhatsApp bring-up");
                Attach::InFlight(outcome)
            } else if state.has_handle() {
                Attach::Running
            } else {
                Attach::InFlight(self.spawn_bring_up(&mut state))
            }
        };

        let started = match attach {
            Attach::Running => true,
            Attach::InFlight(mut outcome) => {
                // Err means the bring-up task went away without reporting
                let finished = outcome
                    .wait_for(|status| *status != BringUp::Pending)
                    .await
                    .map(|status| *status);
                matches!(finished, Ok(BringUp::Started))
            }
        };

        if !started {
            return false;
        }
        if !wait_for_ready {
            return true;
        }
        self.wait_for_ready().await
    }

    /// Wait for the ready state, polling at the configured interval.
    ///
    /// Gives up early when the session fails, disconnects or is logged out.
    pub async fn wait_for_ready(&self) -> bool {
        let poll = self.inner.config.ready_poll_interval;
        let timeout = self.inner.config.ready_timeout;

        let waited = tokio::time::timeout(timeout, async {
            loop {
                match self.phase().await {
                    Phase::Ready => return true,
                    Phase::Failed | Phase::Disconnected | Phase::Uninitialized => return false,
                    Phase::Initializing | Phase::Authenticated => {}
                }
                tokio::time::sleep(poll).await;
            }
        })
        .await;

        match waited {
            Ok(ready) => ready,
            Err(_) => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "Timeout waiting for WhatsApp ready state"
                );
                false
            }
        }
    }

    fn spawn_bring_up(&self, state: &mut SessionState) -> watch::Receiver<BringUp> {
        let (generation, outcome) = state.begin_attempt();
        let rx = outcome.subscribe();
        info!(generation, "Starting WhatsApp session bring-up");

        let manager = self.clone();
        tokio::spawn(async move {
            let status = manager.bring_up(generation).await;
            outcome.send_replace(status);
        });
        rx
    }

    async fn bring_up(&self, generation: u64) -> BringUp {
        let _store = self.inner.credential_lock.lock().await;
        self.inner.destroy_retired().await;

        if !self.inner.state.read().await.is_current(generation) {
            debug!(generation, "Bring-up superseded before construction");
            return BringUp::Failed;
        }

        let (sink, events) = EventSink::channel();
        let session = match self
            .inner
            .factory
            .create(self.inner.config.launch_options(), sink)
        {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Error constructing WhatsApp session");
                self.inner
                    .state
                    .write()
                    .await
                    .fail_attempt(generation, e.to_string());
                return BringUp::Failed;
            }
        };

        let attached = self
            .inner
            .state
            .write()
            .await
            .attach_handle(generation, Arc::clone(&session));
        if !attached {
            debug!(generation, "Bring-up superseded after construction");
            destroy_quietly(session.as_ref()).await;
            return BringUp::Failed;
        }

        tokio::spawn(pump_events(
            Arc::downgrade(&self.inner),
            generation,
            events,
        ));

        match session.initialize().await {
            Ok(()) => {
                if self.inner.state.write().await.complete_attempt(generation) {
                    info!(generation, "WhatsApp session initialize completed");
                    BringUp::Started
                } else {
                    // logout destroys the handle it took; a disconnect parks it
                    debug!(generation, "Bring-up superseded during handshake");
                    self.inner.destroy_retired().await;
                    BringUp::Failed
                }
            }
            Err(e) => {
                warn!(error = %e, "Error initializing WhatsApp");
                let stale = self
                    .inner
                    .state
                    .write()
                    .await
                    .fail_attempt(generation, e.to_string());
                if let Some(session) = stale {
                    destroy_quietly(session.as_ref()).await;
                }
                BringUp::Failed
            }
        }
    }

    /// Apply an event to the current session, bypassing generation checks.
    ///
    /// For hosts that receive lifecycle events out of band.
    pub async fn apply_event(&self, event: SessionEvent) {
        self.inner.apply(None, event).await;
    }

    /// Destroy the session and reset to `Uninitialized`.
    ///
    /// State is reset before teardown, so it is clean even when teardown
    /// fails. Returns false only if the session's destroy call errored.
    pub async fn logout(&self) -> bool {
        let handle = self.inner.state.write().await.reset();
        let _store = self.inner.credential_lock.lock().await;
        self.inner.destroy_retired().await;

        let Some(session) = handle else {
            info!("WhatsApp state reset; no active session");
            return true;
        };

        info!("Logging out WhatsApp client");
        match session.destroy().await {
            Ok(()) => {
                info!("WhatsApp client logged out");
                true
            }
            Err(e) => {
                warn!(error = %e, "Error logging out WhatsApp");
                false
            }
        }
    }

    /// Current phase.
    pub async fn phase(&self) -> Phase {
        self.inner.state.read().await.phase()
    }

    /// Whether messages can be sent right now.
    pub async fn is_ready(&self) -> bool {
        self.inner.state.read().await.is_ready()
    }

    /// Read-only snapshot for status pages.
    pub async fn status(&self) -> StatusSnapshot {
        StatusSnapshot::from(&*self.inner.state.read().await)
    }

    pub(crate) async fn readiness(&self) -> Readiness {
        self.inner.state.read().await.readiness()
    }

    pub(crate) async fn record_delivery(&self, delivered: bool) {
        self.inner.state.write().await.record_delivery(delivered);
    }
}

async fn pump_events(
    inner: Weak<Inner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.apply(Some(generation), event).await;
    }
    debug!(generation, "Session event stream closed");
}

async fn destroy_quietly(session: &dyn AutomationSession) {
    if let Err(e) = session.destroy().await {
        warn!(error = %e, "Error destroying WhatsApp session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use crate::testing::{FakeFactory, Script};

    fn manager(factory: &Arc<FakeFactory>) -> LifecycleManager {
        let factory: Arc<dyn SessionFactory> = Arc::clone(factory) as Arc<dyn SessionFactory>;
        LifecycleManager::new(
            WhatsAppConfig::new().with_ready_timeout(Duration::from_secs(5)),
            factory,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_initialize_builds_one_session() {
        let factory = FakeFactory::new(Script {
            init_delay: Duration::from_millis(500),
            ..Script::ready()
        });
        let manager = manager(&factory);

        let results =
            futures::future::join_all((0..8).map(|_| manager.initialize(true))).await;

        assert!(results.iter().all(|ready| *ready));
        assert_eq!(factory.created(), 1);
        assert!(manager.is_ready().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_failures_agree() {
        let factory = FakeFactory::new(Script {
            init_delay: Duration::from_millis(500),
            init_error: Some("browser crashed".into()),
            ..Script::default()
        });
        let manager = manager(&factory);

        let results =
            futures::future::join_all((0..4).map(|_| manager.initialize(false))).await;

        assert!(results.iter().all(|ok| !*ok));
        assert_eq!(factory.created(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_is_idempotent() {
        let factory = FakeFactory::new(Script::ready());
        let manager = manager(&factory);

        assert!(manager.initialize(true).await);
        assert!(manager.initialize(true).await);
        assert!(manager.initialize(false).await);
        assert_eq!(factory.created(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_options_from_config() {
        let factory = FakeFactory::new(Script::ready());
        let manager = manager(&factory);

        assert!(manager.initialize(true).await);
        let session = factory.last();
        let options = &session.options;
        assert_eq!(options.credential_dir, manager.config().credential_dir);
        assert!(options.headless);
        assert!(options.sandbox_args.iter().any(|a| a == "--disable-gpu"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_without_wait_returns_after_start() {
        let factory = FakeFactory::new(Script::awaiting_scan());
        let manager = manager(&factory);

        assert!(manager.initialize(false).await);
        let status = manager.status().await;
        assert!(status.initialized);
        assert!(status.has_client);
        assert!(!status.ready);

        // a second caller attaches to the running session
        assert!(manager.initialize(false).await);
        assert_eq!(factory.created(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_without_scan() {
        let factory = FakeFactory::new(Script::awaiting_scan());
        let manager = manager(&factory);

        let start = tokio::time::Instant::now();
        assert!(!manager.initialize(true).await);
        assert!(start.elapsed() >= Duration::from_secs(5));

        let status = manager.status().await;
        assert!(status.qr_code.is_some());
        assert!(status.last_qr_update.is_some());
        assert!(status.has_client);
    }

    #[tokio::test(start_paused = true)]
    async fn test_construction_failure() {
        let factory = FakeFactory::new(Script {
            create_error: Some("chromium not found".into()),
            ..Script::default()
        });
        let manager = manager(&factory);

        assert!(!manager.initialize(true).await);
        let status = manager.status().await;
        assert_eq!(status.phase, Phase::Failed);
        assert!(!status.has_client);
        assert!(!status.is_initializing);
        assert!(status.error.unwrap().contains("chromium not found"));

        // next call retries and clears the error
        factory.set_script(Script::ready());
        assert!(manager.initialize(true).await);
        assert_eq!(factory.created(), 2);
        assert!(manager.status().await.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_failure_releases_session() {
        let factory = FakeFactory::new(Script {
            init_error: Some("navigation timeout".into()),
            ..Script::default()
        });
        let manager = manager(&factory);

        assert!(!manager.initialize(false).await);
        assert_eq!(manager.phase().await, Phase::Failed);
        assert_eq!(factory.last().destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_forces_new_session() {
        let factory = FakeFactory::new(Script::ready());
        let manager = manager(&factory);
        assert!(manager.initialize(true).await);

        factory
            .last()
            .emit(SessionEvent::Disconnected("NAVIGATION".into()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!manager.wait_for_ready().await);

        assert!(!manager.is_ready().await);
        let status = manager.status().await;
        assert_eq!(status.phase, Phase::Disconnected);
        assert!(!status.has_client);

        assert!(manager.initialize(true).await);
        assert_eq!(factory.created(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_destroys_session_before_next() {
        let factory = FakeFactory::new(Script::ready());
        let manager = manager(&factory);
        assert!(manager.initialize(true).await);
        let first = factory.last();

        first.emit(SessionEvent::Disconnected("CONFLICT".into()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(first.destroyed.load(Ordering::SeqCst), 1);

        assert!(manager.initialize(true).await);
        assert_eq!(factory.created(), 2);
        assert_eq!(first.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(factory.last().destroyed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_during_handshake_destroys_session() {
        let factory = FakeFactory::new(Script {
            init_delay: Duration::from_secs(10),
            ..Script::ready()
        });
        let manager = manager(&factory);

        let waiting = tokio::spawn({
            let manager = manager.clone();
            async move { manager.initialize(true).await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;

        let first = factory.last();
        first.emit(SessionEvent::Disconnected("NAVIGATION".into()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(manager.phase().await, Phase::Disconnected);
        // still inside its handshake, holding the credential store
        assert_eq!(first.destroyed.load(Ordering::SeqCst), 0);

        assert!(!waiting.await.unwrap());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(first.destroyed.load(Ordering::SeqCst), 1);
        assert!(!manager.status().await.has_client);

        factory.set_script(Script::ready());
        assert!(manager.initialize(true).await);
        assert_eq!(factory.created(), 2);
        assert_eq!(first.destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_qr_timestamp_kept_after_ready() {
        let factory = FakeFactory::new(Script::ready());
        let manager = manager(&factory);
        assert!(manager.initialize(true).await);

        let status = manager.status().await;
        assert!(status.ready);
        assert!(status.qr_code.is_none());
        assert_eq!(status.counters.qr_issued, 1);
        assert!(status.last_qr_update.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_from_old_session_ignored() {
        let factory = FakeFactory::new(Script::ready());
        let manager = manager(&factory);
        assert!(manager.initialize(true).await);
        let old = factory.last();

        assert!(manager.logout().await);
        factory.set_script(Script::awaiting_scan());
        assert!(manager.initialize(false).await);

        old.emit(SessionEvent::Ready);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!manager.is_ready().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_resets_even_if_destroy_fails() {
        let factory = FakeFactory::new(Script {
            destroy_error: Some("browser already gone".into()),
            ..Script::ready()
        });
        let manager = manager(&factory);
        assert!(manager.initialize(true).await);

        assert!(!manager.logout().await);

        let status = manager.status().await;
        assert!(!status.initialized);
        assert!(!status.ready);
        assert!(!status.authenticated);
        assert!(status.qr_code.is_none());
        assert_eq!(status.phase, Phase::Uninitialized);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_without_session() {
        let factory = FakeFactory::new(Script::ready());
        let manager = manager(&factory);
        assert!(manager.logout().await);
        assert_eq!(factory.created(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_during_bring_up() {
        let factory = FakeFactory::new(Script {
            init_delay: Duration::from_secs(10),
            ..Script::ready()
        });
        let manager = manager(&factory);

        let waiting = tokio::spawn({
            let manager = manager.clone();
            async move { manager.initialize(true).await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(manager.logout().await);
        assert!(!waiting.await.unwrap());

        let session = factory.last();
        assert_eq!(session.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(manager.phase().await, Phase::Uninitialized);
        assert!(!manager.status().await.has_client);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_returns_to_initializing() {
        let factory = FakeFactory::new(Script::awaiting_scan());
        let manager = manager(&factory);
        assert!(manager.initialize(false).await);

        manager.apply_event(SessionEvent::Authenticated).await;
        assert_eq!(manager.phase().await, Phase::Authenticated);

        manager
            .apply_event(SessionEvent::AuthFailure("session expired".into()))
            .await;
        let status = manager.status().await;
        assert!(!status.authenticated);
        assert!(status.has_client);
        assert_eq!(status.phase, Phase::Initializing);
    }
}
