//! Session lifecycle: the state machine behind the public operations.
//!
//! SCHEDULED ──start──▶ IN_PROGRESS ──complete──▶ COMPLETED
//!                          │
//!                          └──config failure──▶ FAILED
//!
//! Every operation is scoped to the caller's user record. Only identity,
//! ownership, and "the session is gone" errors reach the caller; everything
//! after that degrades to a completed session with neutral scores.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use interview_types::{
    analytics::CallAnalytics,
    assistant::AssistantConfig,
    config::InterviewPolicy,
    event::SessionEvent,
    feedback::Feedback,
    message::TranscriptMessage,
    session::{NewSession, Session, SessionStatus, SessionUpdate},
    user::{Identity, User},
    InterviewError, Result,
};

use crate::analytics::AnalyticsRecorder;
use crate::assistant::build_assistant_config;
use crate::event_bus::EventBus;
use crate::feedback::{Abandonment, FeedbackDeriver, FeedbackRequest};
use crate::ports::{AnalyticsStore, LlmPort, SessionStore, UserDirectory};
use crate::questions::{QuestionGenerator, QuestionRequest};

/// The collaborators a manager is wired with
#[derive(Clone)]
pub struct ServicePorts {
    pub llm: Arc<dyn LlmPort>,
    pub sessions: Arc<dyn SessionStore>,
    pub analytics: Arc<dyn AnalyticsStore>,
    pub users: Arc<dyn UserDirectory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedSession {
    pub session: Session,
    /// Correlation id for the external interview call
    pub interview_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartedSession {
    pub session: Session,
    pub assistant_config: AssistantConfig,
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletedSession {
    pub session: Session,
    /// `None` when feedback derivation failed or timed out
    pub feedback: Option<Feedback>,
}

pub struct SessionManager {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserDirectory>,
    analytics_store: Arc<dyn AnalyticsStore>,
    questions: QuestionGenerator,
    deriver: Arc<FeedbackDeriver>,
    analytics: AnalyticsRecorder,
    event_bus: EventBus,
    policy: InterviewPolicy,
    locks: SessionLocks,
}

impl SessionManager {
    pub fn new(ports: ServicePorts, policy: InterviewPolicy, event_bus: EventBus) -> Self {
        let deriver = FeedbackDeriver::new(
            ports.llm.clone(),
            ports.sessions.clone(),
            ports.analytics.clone(),
            policy.clone(),
        );
        Self {
            questions: QuestionGenerator::new(ports.llm, policy.clone()),
            deriver: Arc::new(deriver),
            analytics: AnalyticsRecorder::new(ports.analytics.clone()),
            analytics_store: ports.analytics,
            sessions: ports.sessions,
            users: ports.users,
            event_bus,
            policy,
            locks: SessionLocks::default(),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Schedule a new session with generated questions.
    pub async fn create(
        &self,
        data: NewSession,
        caller: Option<&Identity>,
    ) -> Result<CreatedSession> {
        let user = self.authorize(caller).await?;
        if data.role.trim().is_empty() {
            return Err(InterviewError::InvalidInput("role is required".to_string()));
        }

        let generated = self.questions.generate(&QuestionRequest::from(&data)).await;
        let session = Session::new(&user.id, &data, generated.questions);
        let session = self.sessions.create(session).await?;

        log::info!(
            "Scheduled session {} for user {} ({} questions{})",
            session.id,
            user.id,
            session.questions.len(),
            if generated.fallback { ", fallback" } else { "" }
        );
        self.event_bus.emit(SessionEvent::Created {
            session_id: session.id.clone(),
            question_count: session.questions.len(),
            fallback_questions: generated.fallback,
        });

        Ok(CreatedSession {
            session,
            interview_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    /// Move a session into the live call and hand back the assistant config.
    pub async fn start(&self, session_id: &str, caller: Option<&Identity>) -> Result<StartedSession> {
        let user = self.authorize(caller).await?;
        let _guard = self.locks.acquire(session_id).await;

        let session = self.load_owned(session_id, &user).await?;
        if !session.status.can_transition_to(SessionStatus::InProgress) {
            return Err(InterviewError::InvalidTransition {
                from: session.status,
                to: SessionStatus::InProgress,
            });
        }

        let assistant_config = match build_assistant_config(&session) {
            Ok(config) => config,
            Err(e) => {
                self.mark_failed(&session.id, &e).await;
                return Err(e);
            }
        };

        let update = SessionUpdate {
            status: Some(SessionStatus::InProgress),
            started_at: Some(session.started_at.unwrap_or_else(Utc::now)),
            ..Default::default()
        };
        let session = match self.sessions.update(&session.id, update).await {
            Ok(session) => session,
            Err(e) => {
                self.mark_failed(session_id, &e).await;
                return Err(e);
            }
        };

        log::info!("Session {} is in progress", session.id);
        self.event_bus.emit(SessionEvent::Started {
            session_id: session.id.clone(),
        });

        Ok(StartedSession {
            questions: session.questions.clone(),
            session,
            assistant_config,
        })
    }

    /// Terminal transition after the call ends.
    ///
    /// Records analytics (best-effort), derives feedback under a time
    /// budget, and always leaves the session COMPLETED with scores unless
    /// it had already FAILED.
    pub async fn complete(
        &self,
        session_id: &str,
        caller: Option<&Identity>,
        transcript: Option<String>,
        messages: Vec<TranscriptMessage>,
    ) -> Result<CompletedSession> {
        let user = self.authorize(caller).await?;
        let _guard = self.locks.acquire(session_id).await;

        let session = self.load_owned(session_id, &user).await?;

        if !self
            .analytics
            .record_call(
                &session.id,
                transcript.as_deref(),
                &messages,
                session.started_at,
            )
            .await
        {
            self.event_bus.emit(SessionEvent::AnalyticsFailed {
                session_id: session.id.clone(),
            });
        }

        if !session.status.can_transition_to(SessionStatus::Completed) {
            log::warn!(
                "Session {} is {}, leaving status unchanged on completion",
                session.id,
                session.status
            );
            return Ok(CompletedSession {
                session,
                feedback: None,
            });
        }

        let feedback = self
            .derive_with_timeout(FeedbackRequest {
                session_id: session.id.clone(),
                transcript,
                messages,
            })
            .await;

        if feedback.is_none() {
            self.write_degraded_completion(&session.id).await?;
        }

        let session = self.load_owned(&session.id, &user).await?;
        let degraded = feedback.as_ref().map_or(true, |f| f.is_fallback);
        self.event_bus.emit(SessionEvent::Completed {
            session_id: session.id.clone(),
            degraded,
        });

        Ok(CompletedSession { session, feedback })
    }

    pub async fn get(&self, session_id: &str, caller: Option<&Identity>) -> Result<Session> {
        let user = self.authorize(caller).await?;
        self.load_owned(session_id, &user).await
    }

    /// The caller's sessions, newest first.
    pub async fn list(&self, caller: Option<&Identity>) -> Result<Vec<Session>> {
        let user = self.authorize(caller).await?;
        let mut sessions = self.sessions.list_by_owner(&user.id).await?;
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    pub async fn get_analytics(
        &self,
        session_id: &str,
        caller: Option<&Identity>,
    ) -> Result<CallAnalytics> {
        let user = self.authorize(caller).await?;
        let session = self.load_owned(session_id, &user).await?;
        self.analytics_store
            .find(&session.id)
            .await?
            .ok_or_else(|| InterviewError::NotFound(format!("analytics for session {}", session.id)))
    }

    // ─── Internals ───────────────────────────────────────────

    async fn authorize(&self, caller: Option<&Identity>) -> Result<User> {
        let identity = caller.ok_or(InterviewError::Unauthorized)?;
        self.users
            .find_by_identity(identity)
            .await?
            .ok_or_else(|| InterviewError::NotFound("user".to_string()))
    }

    async fn load_owned(&self, session_id: &str, user: &User) -> Result<Session> {
        self.sessions
            .find_owned(session_id, &user.id)
            .await?
            .ok_or_else(|| InterviewError::session_not_found(session_id))
    }

    /// Race derivation against the policy timeout.
    ///
    /// The derivation runs as its own task. If the timeout wins, the task
    /// is left to finish on its own: it is abandoned so it discards its
    /// result instead of writing over the degraded completion. The model
    /// request itself is not interrupted.
    async fn derive_with_timeout(&self, req: FeedbackRequest) -> Option<Feedback> {
        let session_id = req.session_id.clone();
        let abandoned = Abandonment::new();
        let deriver = Arc::clone(&self.deriver);
        let handle = abandoned.clone();
        let task = tokio::spawn(async move { deriver.derive(req, handle).await });

        let budget = Duration::from_secs(self.policy.feedback_timeout_secs);
        match tokio::time::timeout(budget, task).await {
            Ok(Ok(feedback)) => feedback,
            Ok(Err(e)) => {
                log::error!("Feedback task for session {} panicked: {}", session_id, e);
                None
            }
            Err(_) => {
                abandoned.abandon().await;
                let after_ms = budget.as_millis() as u64;
                log::warn!(
                    "Feedback for session {} timed out after {}ms, completing without it",
                    session_id,
                    after_ms
                );
                self.event_bus.emit(SessionEvent::FeedbackTimedOut {
                    session_id,
                    after_ms,
                });
                None
            }
        }
    }

    async fn write_degraded_completion(&self, session_id: &str) -> Result<Session> {
        let neutral = Some(self.policy.neutral_score);
        let update = SessionUpdate {
            status: Some(SessionStatus::Completed),
            started_at: None,
            ended_at: Some(Utc::now()),
            overall_score: neutral,
            technical_score: neutral,
            communication_score: neutral,
            confidence_score: neutral,
            strengths: Some(Vec::new()),
            weaknesses: Some(Vec::new()),
            detailed_feedback: Some(
                "The interview was completed, but detailed feedback could not be generated \
                 in time. Scores shown are neutral placeholders."
                    .to_string(),
            ),
        };
        self.sessions.update(session_id, update).await
    }

    async fn mark_failed(&self, session_id: &str, reason: &InterviewError) {
        log::error!("Starting session {} failed: {}", session_id, reason);
        if let Err(e) = self
            .sessions
            .update(session_id, SessionUpdate::status(SessionStatus::Failed))
            .await
        {
            log::error!("Could not mark session {} as failed: {}", session_id, e);
        }
        self.event_bus.emit(SessionEvent::Failed {
            session_id: session_id.to_string(),
            reason: reason.to_string(),
        });
    }
}

/// Per-session async mutexes serializing `start` and `complete`.
#[derive(Default)]
struct SessionLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SessionLocks {
    async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self
                .inner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop entries nobody is holding or waiting on
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(session_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
