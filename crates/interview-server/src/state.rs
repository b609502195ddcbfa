use std::sync::Arc;

use interview_core::{
    event_bus::EventBus,
    ports::{IdentityProvider, SessionStore},
    ServicePorts, SessionManager,
};
use interview_platform::{
    HeaderIdentityProvider, MemoryAnalyticsStore, MemorySessionStore, MemoryUserDirectory,
    OpenAiCompatProvider,
};
use interview_types::Result;
use tracing::info;

use super::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Composition root: build every adapter from config and wire the manager.
    pub fn new(config: &Config) -> Result<Self> {
        let llm = OpenAiCompatProvider::new(config.service.llm.clone())?;
        let users = if config.auto_provision_users {
            MemoryUserDirectory::auto_provisioning()
        } else {
            MemoryUserDirectory::new()
        };

        let sessions = Arc::new(MemorySessionStore::new());
        info!(
            "Session store: {}, LLM endpoint: {}",
            sessions.backend_name(),
            llm.base_url()
        );

        let ports = ServicePorts {
            llm: Arc::new(llm),
            sessions,
            analytics: Arc::new(MemoryAnalyticsStore::new()),
            users: Arc::new(users),
        };
        let manager = SessionManager::new(ports, config.service.interview.clone(), EventBus::new());

        Ok(Self::from_parts(manager, Arc::new(HeaderIdentityProvider::new())))
    }

    pub fn from_parts(manager: SessionManager, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            manager: Arc::new(manager),
            identity,
        }
    }
}
