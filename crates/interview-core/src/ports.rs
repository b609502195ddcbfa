//! Port traits: the hexagonal architecture boundary.
//!
//! These traits are defined here in `interview-core` (pure Rust).
//! Implementations live in `interview-platform` (HTTP and storage adapters).
//! The core never imports platform code; it only depends on these traits.

use async_trait::async_trait;
use interview_types::{
    analytics::{AnalyticsUpdate, CallAnalytics},
    message::Message,
    session::{Session, SessionUpdate},
    user::{Identity, User},
    Result,
};

// ─── LLM Port ────────────────────────────────────────────────

/// Request to send to an LLM.
///
/// `None` overrides fall back to the adapter's configured defaults.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// A single-turn request carrying one user prompt
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(text)],
            model: None,
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Complete (non-streaming) response from an LLM
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: Message,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The text-generation collaborator. Output is free text with no
/// structural guarantees.
#[async_trait]
pub trait LlmPort: Send + Sync {
    /// Non-streaming chat completion
    async fn chat_completion(&self, req: ChatRequest) -> Result<ChatResponse>;

    /// Send one prompt and return the generated text
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self.chat_completion(ChatRequest::prompt(prompt)).await?;
        Ok(response.message.content)
    }
}

// ─── Session Store Port ──────────────────────────────────────

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: Session) -> Result<Session>;

    /// Unscoped lookup, for internal pipeline steps that already hold an
    /// authorized session id
    async fn find_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Lookup scoped to the owning user
    async fn find_owned(&self, id: &str, owner_id: &str) -> Result<Option<Session>>;

    /// Apply a partial update atomically. Fails with `NotFound` if the
    /// session does not exist and `InvalidTransition` if the status change
    /// is not allowed.
    async fn update(&self, id: &str, update: SessionUpdate) -> Result<Session>;

    /// All sessions of one owner, newest first
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Session>>;

    /// Name of this backend (for logging/debug)
    fn backend_name(&self) -> &str;
}

// ─── Analytics Store Port ────────────────────────────────────

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Create the record for `session_id` if absent, then apply `update`
    async fn upsert(&self, session_id: &str, update: AnalyticsUpdate) -> Result<CallAnalytics>;

    async fn find(&self, session_id: &str) -> Result<Option<CallAnalytics>>;
}

// ─── Identity Ports ──────────────────────────────────────────

/// Resolves the caller's identity from whatever credential the transport
/// carried (header value, bearer token, cookie).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, credential: Option<&str>) -> Result<Option<Identity>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_identity(&self, identity: &Identity) -> Result<Option<User>>;
}
