use serde::{Deserialize, Serialize};

use crate::ids::SessionId;
use crate::messages::Message;

/// Session lifecycle events emitted while the analysis loop runs.
/// Consumers subscribe over a broadcast channel; dropped events are fine,
/// the transcript remains the source of truth.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    #[serde(rename = "message_appended")]
    MessageAppended {
        session_id: SessionId,
        message: Message,
    },

    #[serde(rename = "analysis_started")]
    AnalysisStarted {
        session_id: SessionId,
    },

    #[serde(rename = "followups_ready")]
    FollowupsReady {
        session_id: SessionId,
        count: usize,
    },

    #[serde(rename = "analysis_finalized")]
    AnalysisFinalized {
        session_id: SessionId,
        disease: String,
        confidence: f64,
    },

    #[serde(rename = "analysis_halted")]
    AnalysisHalted {
        session_id: SessionId,
    },

    #[serde(rename = "test_completed")]
    TestCompleted {
        session_id: SessionId,
        test_name: String,
    },

    #[serde(rename = "session_reset")]
    SessionReset {
        session_id: SessionId,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::MessageAppended { session_id, .. }
            | Self::AnalysisStarted { session_id }
            | Self::FollowupsReady { session_id, .. }
            | Self::AnalysisFinalized { session_id, .. }
            | Self::AnalysisHalted { session_id }
            | Self::TestCompleted { session_id, .. }
            | Self::SessionReset { session_id } => session_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageAppended { .. } => "message_appended",
            Self::AnalysisStarted { .. } => "analysis_started",
            Self::FollowupsReady { .. } => "followups_ready",
            Self::AnalysisFinalized { .. } => "analysis_finalized",
            Self::AnalysisHalted { .. } => "analysis_halted",
            Self::TestCompleted { .. } => "test_completed",
            Self::SessionReset { .. } => "session_reset",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_matches_tag() {
        let sid = SessionId::new();
        let ev = SessionEvent::AnalysisFinalized {
            session_id: sid.clone(),
            disease: "Flu".into(),
            confidence: 82.0,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], ev.event_type());
        assert_eq!(json["disease"], "Flu");
    }

    #[test]
    fn session_id_accessor() {
        let sid = SessionId::new();
        let ev = SessionEvent::AnalysisHalted { session_id: sid.clone() };
        assert_eq!(ev.session_id(), &sid);
    }

    #[test]
    fn serde_roundtrip_all_variants() {
        let sid = SessionId::new();
        let events = vec![
            SessionEvent::MessageAppended {
                session_id: sid.clone(),
                message: Message::user("fever"),
            },
            SessionEvent::AnalysisStarted { session_id: sid.clone() },
            SessionEvent::FollowupsReady { session_id: sid.clone(), count: 3 },
            SessionEvent::AnalysisFinalized {
                session_id: sid.clone(),
                disease: "Flu".into(),
                confidence: 82.0,
            },
            SessionEvent::AnalysisHalted { session_id: sid.clone() },
            SessionEvent::TestCompleted { session_id: sid.clone(), test_name: "Diabetes".into() },
            SessionEvent::SessionReset { session_id: sid },
        ];

        for ev in &events {
            let json = serde_json::to_string(ev).unwrap();
            let parsed: SessionEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed.event_type(), ev.event_type());
        }
    }
}
