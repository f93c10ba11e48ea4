//! Scripted automation sessions for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::SessionError;
use crate::session::{AutomationSession, EventSink, LaunchOptions, SessionEvent, SessionFactory};

/// Session that accepts everything.
pub(crate) struct NullSession;

#[async_trait]
impl AutomationSession for NullSession {
    async fn initialize(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn send_message(&self, _chat_id: &str, _body: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn destroy(&self) -> Result<(), SessionError> {
        Ok(())
    }
}

/// What fake sessions do.
#[derive(Debug, Clone, Default)]
pub(crate) struct Script {
    /// Emitted at the end of `initialize`.
    pub events: Vec<SessionEvent>,
    pub init_delay: Duration,
    pub create_error: Option<String>,
    pub init_error: Option<String>,
    pub destroy_error: Option<String>,
    /// Chat ids whose sends fail.
    pub failing_chats: Vec<String>,
}

impl Script {
    /// Pairs with stored credentials and becomes ready.
    pub fn ready() -> Self {
        Self {
            events: vec![
                SessionEvent::Qr("2@pairing".into()),
                SessionEvent::Authenticated,
                SessionEvent::Ready,
            ],
            ..Self::default()
        }
    }

    /// Shows a QR code and waits forever for a scan.
    pub fn awaiting_scan() -> Self {
        Self {
            events: vec![SessionEvent::Qr("2@pairing".into())],
            ..Self::default()
        }
    }
}

pub(crate) struct FakeSession {
    script: Script,
    sink: EventSink,
    pub options: LaunchOptions,
    pub attempts: Mutex<Vec<(String, Instant)>>,
    pub destroyed: AtomicUsize,
}

impl FakeSession {
    pub fn attempted_chats(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(chat, _)| chat.clone())
            .collect()
    }

    pub fn emit(&self, event: SessionEvent) {
        self.sink.emit(event);
    }
}

#[async_trait]
impl AutomationSession for FakeSession {
    async fn initialize(&self) -> Result<(), SessionError> {
        if !self.script.init_delay.is_zero() {
            tokio::time::sleep(self.script.init_delay).await;
        }
        if let Some(e) = &self.script.init_error {
            return Err(SessionError::Handshake(e.clone()));
        }
        for event in &self.script.events {
            self.sink.emit(event.clone());
        }
        Ok(())
    }

    async fn send_message(&self, chat_id: &str, _body: &str) -> Result<(), SessionError> {
        self.attempts
            .lock()
            .unwrap()
            .push((chat_id.to_string(), Instant::now()));
        if self.script.failing_chats.iter().any(|c| c == chat_id) {
            return Err(SessionError::Send(format!("no such chat: {chat_id}")));
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), SessionError> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        match &self.script.destroy_error {
            Some(e) => Err(SessionError::Destroy(e.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeFactory {
    script: Mutex<Script>,
    pub created: AtomicUsize,
    pub sessions: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakeFactory {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            ..Self::default()
        })
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Arc<FakeSession> {
        Arc::clone(self.sessions.lock().unwrap().last().unwrap())
    }
}

impl SessionFactory for FakeFactory {
    fn create(
        &self,
        options: LaunchOptions,
        events: EventSink,
    ) -> Result<Arc<dyn AutomationSession>, SessionError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap().clone();
        if let Some(e) = &script.create_error {
            return Err(SessionError::Launch(e.clone()));
        }
        let session = Arc::new(FakeSession {
            script,
            sink: events,
            options,
            attempts: Mutex::new(Vec::new()),
            destroyed: AtomicUsize::new(0),
        });
        self.sessions.lock().unwrap().push(Arc::clone(&session));
        Ok(session)
    }
}
