use serde::{Deserialize, Serialize};

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub llm: LlmConfig,
    pub interview: InterviewPolicy,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key: String,
    pub api_base: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            model: "gpt-4o-mini".to_string(),
            api_key: String::new(),
            api_base: None,
            max_tokens: 2048,
            temperature: 0.7,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    OpenAI,
    DeepSeek,
    Google,
    Custom,
}

impl LlmProvider {
    pub fn default_base_url(&self) -> &str {
        match self {
            LlmProvider::OpenAI => "https://api.openai.com/v1",
            LlmProvider::DeepSeek => "https://api.deepseek.com/v1",
            LlmProvider::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
            LlmProvider::Custom => "",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(LlmProvider::OpenAI),
            "deepseek" => Some(LlmProvider::DeepSeek),
            "google" | "gemini" => Some(LlmProvider::Google),
            "custom" => Some(LlmProvider::Custom),
            _ => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::DeepSeek => "DeepSeek",
            LlmProvider::Google => "Google",
            LlmProvider::Custom => "Custom",
        }
    }
}

/// Scoring and timing policy for the interview pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewPolicy {
    /// Upper bound on feedback derivation during `complete`
    pub feedback_timeout_secs: u64,
    /// Transcripts shorter than this (trimmed, in chars) count as empty
    pub min_transcript_len: usize,
    /// Score used when there is nothing to score, or a category is missing
    pub neutral_score: u8,
    /// Score used when the model answered but its output could not be parsed
    pub degraded_parse_score: u8,
    /// Score used when the model call itself failed
    pub model_error_score: u8,
    /// Length of raw-output excerpts kept for human review
    pub excerpt_len: usize,
    pub default_question_count: usize,
    pub max_question_count: usize,
}

impl Default for InterviewPolicy {
    fn default() -> Self {
        Self {
            feedback_timeout_secs: 30,
            min_transcript_len: 10,
            neutral_score: 50,
            degraded_parse_score: 75,
            model_error_score: 60,
            excerpt_len: 500,
            default_question_count: 5,
            max_question_count: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}
