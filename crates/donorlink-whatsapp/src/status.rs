//! Read-only status snapshots for the admin page.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::qr::QrFormat;
use crate::state::{Phase, SessionCounters, SessionState};

/// Point-in-time view of the WhatsApp session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub phase: Phase,
    pub initialized: bool,
    pub authenticated: bool,
    pub ready: bool,
    pub has_client: bool,
    /// Latest pairing challenge, if one is waiting to be scanned.
    pub qr_code: Option<String>,
    pub qr_format: Option<QrFormat>,
    pub is_initializing: bool,
    /// Last bring-up or authentication error.
    pub error: Option<String>,
    /// When the latest QR challenge arrived, kept after pairing.
    pub last_qr_update: Option<DateTime<Utc>>,
    pub loading_percent: u8,
    pub loading_message: String,
    pub counters: SessionCounters,
}

impl From<&SessionState> for StatusSnapshot {
    fn from(state: &SessionState) -> Self {
        let qr = state.qr_challenge();
        Self {
            phase: state.phase(),
            initialized: state.is_initialized(),
            authenticated: state.is_authenticated(),
            ready: state.is_ready(),
            has_client: state.has_handle(),
            qr_code: qr.map(|q| q.payload.clone()),
            qr_format: qr.map(|q| q.format),
            is_initializing: state.is_initializing(),
            error: state.initialization_error().map(str::to_string),
            last_qr_update: state.last_qr_update(),
            loading_percent: state.loading().percent,
            loading_message: state.loading().message.clone(),
            counters: state.counters(),
        }
    }
}

impl StatusSnapshot {
    /// One-line summary for logs and the command line.
    pub fn summary(&self) -> String {
        match self.phase {
            Phase::Ready => "ready".to_string(),
            Phase::Authenticated => format!("synchronizing ({}%)", self.loading_percent),
            Phase::Initializing if self.qr_code.is_some() => "waiting for QR scan".to_string(),
            Phase::Initializing => "starting".to_string(),
            Phase::Failed => format!(
                "failed: {}",
                self.error.as_deref().unwrap_or("unknown error")
            ),
            Phase::Disconnected => "disconnected".to_string(),
            Phase::Uninitialized => "not started".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::qr::SvgQrEncoder;
    use crate::session::SessionEvent;
    use crate::testing::NullSession;

    #[test]
    fn test_snapshot_of_new_state() {
        let snapshot = StatusSnapshot::from(&SessionState::new());

        assert_eq!(snapshot.phase, Phase::Uninitialized);
        assert!(!snapshot.initialized);
        assert!(!snapshot.ready);
        assert!(!snapshot.has_client);
        assert!(snapshot.qr_code.is_none());
        assert!(snapshot.qr_format.is_none());
        assert!(snapshot.last_qr_update.is_none());
        assert_eq!(snapshot.summary(), "not started");
    }

    #[test]
    fn test_snapshot_while_waiting_for_scan() {
        let mut state = SessionState::new();
        let (generation, _tx) = state.begin_attempt();
        assert!(state.attach_handle(generation, Arc::new(NullSession)));
        state.apply(SessionEvent::Qr("2@abc".into()), &SvgQrEncoder::default());

        let snapshot = StatusSnapshot::from(&state);
        assert!(snapshot.is_initializing);
        assert!(snapshot.has_client);
        assert_eq!(snapshot.qr_format, Some(QrFormat::DataUri));
        assert!(snapshot.qr_code.unwrap().starts_with("data:image/svg+xml"));
        assert!(snapshot.last_qr_update.is_some());
        assert_eq!(snapshot.counters.qr_issued, 1);
    }

    #[test]
    fn test_snapshot_after_pairing_keeps_qr_time() {
        let mut state = SessionState::new();
        let (generation, _tx) = state.begin_attempt();
        assert!(state.attach_handle(generation, Arc::new(NullSession)));
        let encoder = SvgQrEncoder::default();
        state.apply(SessionEvent::Qr("2@abc".into()), &encoder);
        state.apply(SessionEvent::Ready, &encoder);

        let snapshot = StatusSnapshot::from(&state);
        assert!(snapshot.ready);
        assert!(snapshot.qr_code.is_none());
        assert!(snapshot.qr_format.is_none());
        assert!(snapshot.last_qr_update.is_some());
    }

    #[test]
    fn test_snapshot_serializes_snake_case() {
        let mut state = SessionState::new();
        let (generation, _tx) = state.begin_attempt();
        let _ = state.fail_attempt(generation, "chromium not found".into());

        let snapshot = StatusSnapshot::from(&state);
        assert_eq!(snapshot.summary(), "failed: chromium not found");

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["phase"], "failed");
        assert_eq!(json["has_client"], false);
        assert_eq!(json["error"], "chromium not found");
        assert_eq!(json["counters"]["bring_ups"], 1);
    }
}
