use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::message::TranscriptMessage;

/// Raw call data kept for diagnostics, one record per session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAnalytics {
    pub session_id: String,
    pub transcript: Option<String>,
    #[serde(default)]
    pub messages: Vec<TranscriptMessage>,
    pub message_count: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub updated_at: DateTime<Utc>,
}

impl CallAnalytics {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            transcript: None,
            messages: Vec::new(),
            message_count: 0,
            started_at: None,
            ended_at: None,
            metadata: Map::new(),
            updated_at: Utc::now(),
        }
    }
}

/// A write to apply to a session's analytics record.
///
/// `None` fields leave the stored value untouched; metadata keys are
/// merged over the existing bag.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsUpdate {
    pub transcript: Option<String>,
    pub messages: Option<Vec<TranscriptMessage>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub metadata: Map<String, Value>,
}

impl AnalyticsUpdate {
    pub fn apply_to(self, record: &mut CallAnalytics) {
        if let Some(transcript) = self.transcript {
            record.transcript = Some(transcript);
        }
        if let Some(messages) = self.messages {
            record.message_count = messages.len();
            record.messages = messages;
        }
        if self.started_at.is_some() {
            record.started_at = self.started_at;
        }
        if self.ended_at.is_some() {
            record.ended_at = self.ended_at;
        }
        for (key, value) in self.metadata {
            record.metadata.insert(key, value);
        }
        record.updated_at = Utc::now();
    }
}
