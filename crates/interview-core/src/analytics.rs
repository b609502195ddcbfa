//! Best-effort recording of raw call data.
//!
//! Analytics are diagnostic, never authoritative: every failure here is
//! logged and swallowed so the completion path keeps going.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use interview_types::{analytics::AnalyticsUpdate, message::TranscriptMessage};
use serde_json::{json, Map, Value};

use crate::ports::AnalyticsStore;

pub struct AnalyticsRecorder {
    store: Arc<dyn AnalyticsStore>,
}

impl AnalyticsRecorder {
    pub fn new(store: Arc<dyn AnalyticsStore>) -> Self {
        Self { store }
    }

    /// Upsert the transcript and message log for a finished call.
    /// Returns whether the write landed.
    pub async fn record_call(
        &self,
        session_id: &str,
        transcript: Option<&str>,
        messages: &[TranscriptMessage],
        started_at: Option<DateTime<Utc>>,
    ) -> bool {
        let mut metadata = Map::new();
        metadata.insert("messageCount".to_string(), json!(messages.len()));

        let update = AnalyticsUpdate {
            transcript: transcript.map(String::from),
            messages: Some(messages.to_vec()),
            started_at,
            ended_at: Some(Utc::now()),
            metadata,
        };

        match self.store.upsert(session_id, update).await {
            Ok(record) => {
                log::info!(
                    "Recorded call analytics for session {} ({} messages)",
                    session_id,
                    record.message_count
                );
                true
            }
            Err(e) => {
                log::warn!("Failed to record call analytics for session {}: {}", session_id, e);
                false
            }
        }
    }

    /// Merge keys into the session's metadata bag.
    pub async fn attach_metadata(&self, session_id: &str, entries: Map<String, Value>) -> bool {
        let update = AnalyticsUpdate {
            metadata: entries,
            ..Default::default()
        };
        match self.store.upsert(session_id, update).await {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Failed to attach analytics metadata for session {}: {}", session_id, e);
                false
            }
        }
    }
}
