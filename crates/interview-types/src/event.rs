use serde::{Deserialize, Serialize};

/// Events emitted by the session lifecycle manager.
/// The server drains these into its log; tests assert on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A session was scheduled
    Created {
        session_id: String,
        question_count: usize,
        fallback_questions: bool,
    },

    /// The live call began
    Started { session_id: String },

    /// Starting the call failed and the session was marked FAILED
    Failed { session_id: String, reason: String },

    /// The session reached COMPLETED
    Completed { session_id: String, degraded: bool },

    /// Feedback derivation exceeded its time budget and was abandoned
    FeedbackTimedOut { session_id: String, after_ms: u64 },

    /// Recording call analytics failed (non-fatal)
    AnalyticsFailed { session_id: String },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::Created { session_id, .. }
            | SessionEvent::Started { session_id }
            | SessionEvent::Failed { session_id, .. }
            | SessionEvent::Completed { session_id, .. }
            | SessionEvent::FeedbackTimedOut { session_id, .. }
            | SessionEvent::AnalyticsFailed { session_id } => session_id,
        }
    }
}
