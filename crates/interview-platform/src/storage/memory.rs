//! In-memory storage backends.
//! Fastest option but nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use interview_core::ports::{AnalyticsStore, SessionStore, UserDirectory};
use interview_types::{
    analytics::{AnalyticsUpdate, CallAnalytics},
    session::{Session, SessionUpdate},
    user::{Identity, User},
    InterviewError, Result,
};

// ─── Sessions ────────────────────────────────────────────────

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: Session) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(InterviewError::Storage(format!(
                "session {} already exists",
                session.id
            )));
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn find_owned(&self, id: &str, owner_id: &str) -> Result<Option<Session>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(id)
            .filter(|s| s.owner_id == owner_id)
            .cloned())
    }

    async fn update(&self, id: &str, update: SessionUpdate) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| InterviewError::session_not_found(id))?;
        // Apply to a copy so a rejected transition leaves the stored row untouched
        let mut next = session.clone();
        update.apply_to(&mut next)?;
        *session = next.clone();
        Ok(next)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Session>> {
        let mut owned: Vec<Session> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

// ─── Call Analytics ──────────────────────────────────────────

#[derive(Default)]
pub struct MemoryAnalyticsStore {
    records: RwLock<HashMap<String, CallAnalytics>>,
}

impl MemoryAnalyticsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnalyticsStore for MemoryAnalyticsStore {
    async fn upsert(&self, session_id: &str, update: AnalyticsUpdate) -> Result<CallAnalytics> {
        let mut records = self.records.write().await;
        let record = records
            .entry(session_id.to_string())
            .or_insert_with(|| CallAnalytics::new(session_id));
        update.apply_to(record);
        Ok(record.clone())
    }

    async fn find(&self, session_id: &str) -> Result<Option<CallAnalytics>> {
        Ok(self.records.read().await.get(session_id).cloned())
    }
}

// ─── Users ───────────────────────────────────────────────────

/// Identity → user lookup.
///
/// With auto-provisioning on, an unknown identity gets a fresh user record
/// on first lookup instead of `None`.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<Identity, User>>,
    auto_provision: bool,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_provisioning() -> Self {
        Self {
            auto_provision: true,
            ..Self::default()
        }
    }

    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: RwLock::new(
                users
                    .into_iter()
                    .map(|u| (u.identity.clone(), u))
                    .collect(),
            ),
            auto_provision: false,
        }
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.identity.clone(), user);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_identity(&self, identity: &Identity) -> Result<Option<User>> {
        if let Some(user) = self.users.read().await.get(identity) {
            return Ok(Some(user.clone()));
        }
        if !self.auto_provision {
            return Ok(None);
        }

        let mut users = self.users.write().await;
        let user = users
            .entry(identity.clone())
            .or_insert_with(|| {
                log::info!("Provisioned user record for {}", identity.as_str());
                User::new(identity.clone(), identity.as_str())
            })
            .clone();
        Ok(Some(user))
    }
}
