use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an interview session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Scheduled,
    InProgress,
    Completed,
    Failed,
    /// Client-side only; the lifecycle manager never writes it.
    Cancelled,
}

impl SessionStatus {
    /// Forward-only transition rule. Re-entering `InProgress` and
    /// `Completed` is allowed so retries stay idempotent.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Scheduled, InProgress)
                | (Scheduled, Completed)
                | (Scheduled, Failed)
                | (InProgress, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (Completed, Completed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "SCHEDULED",
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Failed => "FAILED",
            SessionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted interview session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub owner_id: String,
    pub role: String,
    pub industry: Option<String>,
    pub difficulty: String,
    /// Planned length in minutes
    pub duration: u32,
    pub session_type: String,
    pub status: SessionStatus,
    pub questions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub overall_score: Option<u8>,
    pub technical_score: Option<u8>,
    pub communication_score: Option<u8>,
    pub confidence_score: Option<u8>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    pub detailed_feedback: Option<String>,
}

impl Session {
    pub fn new(owner_id: impl Into<String>, data: &NewSession, questions: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            role: data.role.trim().to_string(),
            industry: data.industry.clone(),
            difficulty: data.difficulty_or_default().to_string(),
            duration: data.duration.unwrap_or(DEFAULT_DURATION_MINUTES),
            session_type: data.session_type_or_default().to_string(),
            status: SessionStatus::Scheduled,
            questions,
            created_at: now,
            updated_at: now,
            started_at: None,
            ended_at: None,
            overall_score: None,
            technical_score: None,
            communication_score: None,
            confidence_score: None,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            detailed_feedback: None,
        }
    }
}

pub const DEFAULT_DIFFICULTY: &str = "Mid";
pub const DEFAULT_SESSION_TYPE: &str = "Mixed";
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

/// Client request to schedule a new session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSession {
    pub role: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub session_type: Option<String>,
    #[serde(default)]
    pub tech_stack: Option<String>,
    #[serde(default)]
    pub question_count: Option<usize>,
}

impl NewSession {
    pub fn for_role(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Default::default()
        }
    }

    pub fn difficulty_or_default(&self) -> &str {
        non_blank(self.difficulty.as_deref()).unwrap_or(DEFAULT_DIFFICULTY)
    }

    pub fn session_type_or_default(&self) -> &str {
        non_blank(self.session_type.as_deref()).unwrap_or(DEFAULT_SESSION_TYPE)
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// A partial write to a session record.
///
/// `None` fields leave the stored value untouched. Applying a status that
/// the current status cannot move to is rejected, so a store that applies
/// updates atomically enforces the forward-only rule on its own.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub status: Option<SessionStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub overall_score: Option<u8>,
    pub technical_score: Option<u8>,
    pub communication_score: Option<u8>,
    pub confidence_score: Option<u8>,
    pub strengths: Option<Vec<String>>,
    pub weaknesses: Option<Vec<String>>,
    pub detailed_feedback: Option<String>,
}

impl SessionUpdate {
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn apply_to(self, session: &mut Session) -> crate::Result<()> {
        if let Some(next) = self.status {
            if !session.status.can_transition_to(next) {
                return Err(crate::InterviewError::InvalidTransition {
                    from: session.status,
                    to: next,
                });
            }
            session.status = next;
        }
        if self.started_at.is_some() {
            session.started_at = self.started_at;
        }
        if self.ended_at.is_some() {
            session.ended_at = self.ended_at;
        }
        if self.overall_score.is_some() {
            session.overall_score = self.overall_score;
        }
        if self.technical_score.is_some() {
            session.technical_score = self.technical_score;
        }
        if self.communication_score.is_some() {
            session.communication_score = self.communication_score;
        }
        if self.confidence_score.is_some() {
            session.confidence_score = self.confidence_score;
        }
        if let Some(strengths) = self.strengths {
            session.strengths = strengths;
        }
        if let Some(weaknesses) = self.weaknesses {
            session.weaknesses = weaknesses;
        }
        if self.detailed_feedback.is_some() {
            session.detailed_feedback = self.detailed_feedback;
        }
        session.updated_at = Utc::now();
        Ok(())
    }
}
