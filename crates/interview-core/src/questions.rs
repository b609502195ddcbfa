//! Interview question generation.
//!
//! Asks the text-generation model for a JSON array of questions. Any
//! failure (transport error, prose instead of JSON, an empty list) yields
//! a fixed fallback set instead of an error.

use std::sync::Arc;

use interview_types::config::InterviewPolicy;
use interview_types::session::NewSession;

use crate::extract::{outermost_span, speech_safe, strip_code_fences};
use crate::ports::LlmPort;

pub const FALLBACK_QUESTION_COUNT: usize = 8;

/// What the generator needs to know about the interview
#[derive(Debug, Clone)]
pub struct QuestionRequest {
    pub role: String,
    pub difficulty: String,
    pub tech_stack: Option<String>,
    pub session_type: String,
    pub question_count: Option<usize>,
}

impl From<&NewSession> for QuestionRequest {
    fn from(data: &NewSession) -> Self {
        Self {
            role: data.role.trim().to_string(),
            difficulty: data.difficulty_or_default().to_string(),
            tech_stack: data
                .tech_stack
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            session_type: data.session_type_or_default().to_string(),
            question_count: data.question_count,
        }
    }
}

/// Result of a generation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuestions {
    pub questions: Vec<String>,
    /// True when the fixed fallback set was substituted
    pub fallback: bool,
}

pub struct QuestionGenerator {
    llm: Arc<dyn LlmPort>,
    policy: InterviewPolicy,
}

impl QuestionGenerator {
    pub fn new(llm: Arc<dyn LlmPort>, policy: InterviewPolicy) -> Self {
        Self { llm, policy }
    }

    /// Never fails: degraded output is the fallback list.
    pub async fn generate(&self, req: &QuestionRequest) -> GeneratedQuestions {
        let count = req
            .question_count
            .unwrap_or(self.policy.default_question_count)
            .clamp(1, self.policy.max_question_count.max(1));
        let prompt = build_question_prompt(req, count);

        let raw = match self.llm.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Question generation failed for role '{}': {}", req.role, e);
                return self.fallback(req);
            }
        };

        match parse_questions(&raw, count) {
            Some(questions) => {
                log::info!("Generated {} questions for role '{}'", questions.len(), req.role);
                GeneratedQuestions {
                    questions,
                    fallback: false,
                }
            }
            None => {
                log::warn!(
                    "Model output for role '{}' was not a usable question list, using fallback",
                    req.role
                );
                self.fallback(req)
            }
        }
    }

    fn fallback(&self, req: &QuestionRequest) -> GeneratedQuestions {
        GeneratedQuestions {
            questions: fallback_questions(&req.role),
            fallback: true,
        }
    }
}

pub fn build_question_prompt(req: &QuestionRequest, count: usize) -> String {
    let tech_stack = req
        .tech_stack
        .as_deref()
        .unwrap_or("not specified, keep questions technology-agnostic");
    format!(
        "Prepare questions for a job interview.\n\
         The job role is {role}.\n\
         The experience level is {difficulty}.\n\
         The tech stack used in the job is: {tech_stack}.\n\
         The focus between behavioural and technical questions should lean towards: {session_type}.\n\
         The amount of questions required is: {count}.\n\
         Return only the questions, with no additional text.\n\
         The questions are going to be read by a voice assistant, so do not use \"/\" or \"*\" \
         or any other special characters which might break the voice assistant.\n\
         Return the questions formatted as a JSON array of strings, like this:\n\
         [\"Question 1\", \"Question 2\", \"Question 3\"]",
        role = req.role,
        difficulty = req.difficulty,
        tech_stack = tech_stack,
        session_type = req.session_type,
        count = count,
    )
}

/// Extract a JSON array of question strings from model output.
///
/// Non-string entries and entries that sanitize to nothing are dropped;
/// returns `None` when nothing usable remains.
pub fn parse_questions(raw: &str, max: usize) -> Option<Vec<String>> {
    let cleaned = strip_code_fences(raw);
    let span = outermost_span(cleaned, '[', ']')?;
    let values: Vec<serde_json::Value> = serde_json::from_str(span).ok()?;

    let questions: Vec<String> = values
        .iter()
        .filter_map(|v| v.as_str())
        .map(speech_safe)
        .filter(|q| !q.is_empty())
        .take(max)
        .collect();

    (!questions.is_empty()).then_some(questions)
}

/// The fixed question set used when generation degrades.
pub fn fallback_questions(role: &str) -> Vec<String> {
    let role = speech_safe(role);
    let role = if role.is_empty() { "this".to_string() } else { role };
    [
        "Tell me about yourself and your professional background.".to_string(),
        format!("What interests you most about the {} role?", role),
        "Describe a challenging project you worked on and how you handled it.".to_string(),
        "How do you stay up to date with developments in your field?".to_string(),
        "Tell me about a time you disagreed with a teammate and how you resolved it.".to_string(),
        "How do you prioritize your work when you have several deadlines at once?".to_string(),
        "Describe a mistake you made at work and what you learned from it.".to_string(),
        "Where do you see yourself professionally in the next few years?".to_string(),
    ]
    .into_iter()
    .map(|q| speech_safe(&q))
    .collect()
}
