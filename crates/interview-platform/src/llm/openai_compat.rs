//! OpenAI-compatible LLM adapter.
//!
//! Works with DeepSeek, OpenAI, Gemini's OpenAI endpoint, and any provider
//! using the OpenAI chat completions API format.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use interview_core::ports::*;
use interview_types::{
    config::LlmConfig,
    message::{Message, Role},
    InterviewError, Result,
};

/// Provider that speaks the OpenAI chat completions protocol.
pub struct OpenAiCompatProvider {
    client: Client,
    config: LlmConfig,
    base_url: String,
}

impl OpenAiCompatProvider {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let base_url = config
            .api_base
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();
        if base_url.is_empty() {
            return Err(InterviewError::Config(format!(
                "provider {} needs an explicit api_base",
                config.provider.label()
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| InterviewError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request_body(&self, req: &ChatRequest) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(message_to_json).collect();
        json!({
            "model": req.model.as_deref().unwrap_or(&self.config.model),
            "messages": messages,
            "max_tokens": req.max_tokens.unwrap_or(self.config.max_tokens),
            "temperature": req.temperature.unwrap_or(self.config.temperature),
        })
    }
}

#[async_trait]
impl LlmPort for OpenAiCompatProvider {
    async fn chat_completion(&self, req: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(&req);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(e, self.config.request_timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(http_error(status, &text));
        }

        let data: ApiResponse = response
            .json()
            .await
            .map_err(|e| InterviewError::Llm(format!("malformed response: {}", e)))?;

        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| InterviewError::Llm("No choices in response".to_string()))?;

        let usage = data.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ChatResponse {
            message: parse_api_message(choice.message),
            usage,
        })
    }
}

// ─── API response types ──────────────────────────────────────

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// ─── Helpers ─────────────────────────────────────────────────

fn message_to_json(msg: &Message) -> Value {
    json!({
        "role": msg.role.as_str(),
        "content": msg.content,
    })
}

fn parse_api_message(api: ApiMessage) -> Message {
    let role = match api.role.as_str() {
        "system" => Role::System,
        "user" => Role::User,
        _ => Role::Assistant,
    };
    Message {
        role,
        content: api.content.unwrap_or_default(),
    }
}

/// Transport failures: the request never produced an HTTP status.
fn request_error(e: reqwest::Error, timeout_secs: u64) -> InterviewError {
    if e.is_timeout() {
        InterviewError::Timeout(timeout_secs.saturating_mul(1000))
    } else if e.is_connect() {
        InterviewError::Network(format!("connection failed: {}", e))
    } else {
        InterviewError::Network(e.to_string())
    }
}

fn http_error(status: StatusCode, body: &str) -> InterviewError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            InterviewError::Config(format!("LLM provider rejected credentials (HTTP {})", status))
        }
        _ => InterviewError::Llm(format!("HTTP {}: {}", status, body)),
    }
}
