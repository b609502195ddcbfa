//! Environment-driven configuration.
//!
//! Every setting has a default; only malformed values are errors.

use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

use interview_types::{
    config::{LlmProvider, ServiceConfig},
    InterviewError, Result,
};

pub struct Config {
    pub service: ServiceConfig,
    /// Create user records for unknown callers instead of rejecting them
    pub auto_provision_users: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut service = ServiceConfig::default();

        service.server.host = try_load(&lookup, "INTERVIEW_HOST", &service.server.host)?;
        service.server.port = try_load(&lookup, "INTERVIEW_PORT", &service.server.port.to_string())?;

        let provider: String = try_load(&lookup, "LLM_PROVIDER", "openai")?;
        service.llm.provider = LlmProvider::from_name(&provider)
            .ok_or_else(|| InterviewError::Config(format!("unknown LLM_PROVIDER {provider}")))?;
        service.llm.model = try_load(&lookup, "LLM_MODEL", &service.llm.model)?;
        service.llm.api_base = lookup("LLM_API_BASE").filter(|v| !v.trim().is_empty());
        service.llm.api_key = lookup("LLM_API_KEY").unwrap_or_else(|| {
            warn!("LLM_API_KEY not set, model calls will fail and degrade to fallbacks");
            String::new()
        });
        service.llm.request_timeout_secs = try_load(
            &lookup,
            "LLM_REQUEST_TIMEOUT_SECS",
            &service.llm.request_timeout_secs.to_string(),
        )?;

        service.interview.feedback_timeout_secs = try_load(
            &lookup,
            "FEEDBACK_TIMEOUT_SECS",
            &service.interview.feedback_timeout_secs.to_string(),
        )?;

        let auto_provision_users = try_load(&lookup, "INTERVIEW_AUTO_PROVISION", "true")?;

        Ok(Self {
            service,
            auto_provision_users,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.service.server.host, self.service.server.port)
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T>
where
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .trim()
        .parse()
        .map_err(|e| InterviewError::Config(format!("invalid {key} value: {e}")))
}
