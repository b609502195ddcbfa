//! Feedback derivation: transcript in, scored session out.
//!
//! Pipeline:
//! 1. Normalize the transcript (structured messages win over raw text)
//! 2. Short-circuit empty interviews to a neutral document
//! 3. Ask the model for a JSON feedback document
//! 4. Parse it through the repair ladder (first strategy that succeeds wins)
//! 5. Normalize the structure and write scores back to the session
//!
//! Nothing downstream of "the session exists" is allowed to fail: a model
//! error or unparseable output still produces a persisted document.

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use regex::Regex;
use serde_json::{json, Map, Value};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use interview_types::{
    config::InterviewPolicy,
    feedback::{
        uniform_categories, CategoryScore, Feedback, COMMUNICATION_SKILLS,
        CONFIDENCE_AND_CLARITY, FEEDBACK_CATEGORIES, TECHNICAL_KNOWLEDGE,
    },
    message::{render_transcript, TranscriptMessage},
    session::{SessionStatus, SessionUpdate},
    InterviewError, Result,
};

use crate::analytics::AnalyticsRecorder;
use crate::extract::{excerpt, outermost_span, strip_code_fences};
use crate::ports::{AnalyticsStore, LlmPort, SessionStore};

pub const NO_TRANSCRIPT_COMMENT: &str = "No transcript provided";
pub const MODEL_ERROR_COMMENT: &str = "model error";
pub const UNPARSED_COMMENT: &str = "Auto-generated: the scoring response could not be parsed";

/// Shared between the manager and one derivation run.
///
/// Once abandoned, the run may still finish computing but never writes.
/// Abandoning waits for a write already in flight, so after `abandon`
/// returns no derivation write can land.
#[derive(Clone, Default)]
pub struct Abandonment {
    token: CancellationToken,
    gate: Arc<AsyncMutex<()>>,
}

impl Abandonment {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn abandon(&self) {
        let _gate = self.gate.lock().await;
        self.token.cancel();
    }

    pub fn is_abandoned(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Permission to write; `None` once abandoned. Hold it across the write.
    pub async fn write_guard(&self) -> Option<MutexGuard<'_, ()>> {
        let gate = self.gate.lock().await;
        (!self.token.is_cancelled()).then_some(gate)
    }
}

/// Input to one derivation run
#[derive(Debug, Clone)]
pub struct FeedbackRequest {
    pub session_id: String,
    pub transcript: Option<String>,
    pub messages: Vec<TranscriptMessage>,
}

pub struct FeedbackDeriver {
    llm: Arc<dyn LlmPort>,
    sessions: Arc<dyn SessionStore>,
    analytics: AnalyticsRecorder,
    policy: InterviewPolicy,
}

impl FeedbackDeriver {
    pub fn new(
        llm: Arc<dyn LlmPort>,
        sessions: Arc<dyn SessionStore>,
        analytics: Arc<dyn AnalyticsStore>,
        policy: InterviewPolicy,
    ) -> Self {
        Self {
            llm,
            sessions,
            analytics: AnalyticsRecorder::new(analytics),
            policy,
        }
    }

    /// Derive, persist, and return feedback for a session.
    ///
    /// `None` means derivation did not run at all (the session is gone or
    /// the store failed). Once `abandoned` is tripped the result is
    /// still computed but never written.
    pub async fn derive(&self, req: FeedbackRequest, abandoned: Abandonment) -> Option<Feedback> {
        match self.try_derive(&req, &abandoned).await {
            Ok(feedback) => Some(feedback),
            Err(e) => {
                log::error!(
                    "Feedback derivation for session {} did not run: {}",
                    req.session_id,
                    e
                );
                None
            }
        }
    }

    async fn try_derive(
        &self,
        req: &FeedbackRequest,
        abandoned: &Abandonment,
    ) -> Result<Feedback> {
        if self.sessions.find_by_id(&req.session_id).await?.is_none() {
            return Err(InterviewError::session_not_found(&req.session_id));
        }

        let min_len = self.policy.min_transcript_len;
        let transcript = normalize_transcript(req.transcript.as_deref(), &req.messages, min_len);
        if transcript.chars().count() < min_len {
            log::info!(
                "Session {} has no usable transcript ({} chars), writing neutral feedback",
                req.session_id,
                transcript.chars().count()
            );
            let feedback = empty_transcript_feedback(&self.policy);
            self.persist(&req.session_id, &feedback, None, abandoned).await?;
            return Ok(feedback);
        }

        let prompt = build_feedback_prompt(&transcript);
        let mut diagnostics = Map::new();

        let (feedback, raw) = match self.llm.generate(&prompt).await {
            Ok(raw) => {
                let parsed = parse_feedback(&raw, &self.policy);
                match parsed.strategy {
                    Some(ParseStrategy::WholeResponse) => {}
                    Some(strategy) => log::warn!(
                        "Feedback for session {} recovered via {}",
                        req.session_id,
                        strategy.name()
                    ),
                    None => log::warn!(
                        "Feedback for session {} unparseable, synthesized default document",
                        req.session_id
                    ),
                }
                diagnostics.insert("rawFeedback".to_string(), json!(raw));
                diagnostics.insert(
                    "feedbackParse".to_string(),
                    json!(parsed.strategy.map(|s| s.name()).unwrap_or("default")),
                );
                (parsed.feedback, Some(raw))
            }
            Err(e) => {
                log::warn!("Scoring model failed for session {}: {}", req.session_id, e);
                diagnostics.insert("feedbackError".to_string(), json!(e.to_string()));
                (model_error_feedback(&self.policy), None)
            }
        };

        self.persist(&req.session_id, &feedback, raw.as_deref(), abandoned)
            .await?;

        if !abandoned.is_abandoned() {
            self.analytics
                .attach_metadata(&req.session_id, diagnostics)
                .await;
        }

        Ok(feedback)
    }

    async fn persist(
        &self,
        session_id: &str,
        feedback: &Feedback,
        raw: Option<&str>,
        abandoned: &Abandonment,
    ) -> Result<()> {
        let Some(_gate) = abandoned.write_guard().await else {
            log::warn!(
                "Feedback derivation for session {} was abandoned, discarding its result",
                session_id
            );
            return Ok(());
        };
        let update = completion_update(feedback, raw, &self.policy);
        self.sessions.update(session_id, update).await?;
        log::info!(
            "Session {} completed with overall score {}{}",
            session_id,
            feedback.total_score,
            if feedback.is_fallback { " (fallback)" } else { "" }
        );
        Ok(())
    }
}

// ─── Transcript & Prompt ─────────────────────────────────────

/// Prefer the structured message log when it reaches `min_len` characters,
/// else the raw transcript when that does. If neither does, the longer of
/// the two is returned and the caller treats it as empty.
pub fn normalize_transcript(
    transcript: Option<&str>,
    messages: &[TranscriptMessage],
    min_len: usize,
) -> String {
    let rendered = render_transcript(messages);
    let raw = transcript.map(str::trim).unwrap_or_default();
    let rendered_len = rendered.trim().chars().count();
    if rendered_len >= min_len || rendered_len >= raw.chars().count() {
        rendered.trim().to_string()
    } else {
        raw.to_string()
    }
}

pub fn build_feedback_prompt(transcript: &str) -> String {
    let categories = FEEDBACK_CATEGORIES
        .iter()
        .map(|name| format!("- **{}**", name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an AI interviewer analyzing a mock interview. Your task is to evaluate \
         the candidate based on structured categories. Be thorough and detailed in your \
         analysis. Don't be lenient with the candidate. If there are mistakes or areas \
         for improvement, point them out.\n\
         \n\
         Transcript:\n\
         {transcript}\n\
         \n\
         Please score the candidate from 0 to 100 in the following areas. Do not add \
         categories other than the ones provided:\n\
         {categories}\n\
         \n\
         Respond with ONLY a JSON object, no markdown and no commentary, in exactly this shape:\n\
         {{\n  \"totalScore\": <0-100>,\n  \"categoryScores\": [\n    \
         {{\"name\": \"Communication Skills\", \"score\": <0-100>, \"comment\": \"...\"}},\n    \
         {{\"name\": \"Technical Knowledge\", \"score\": <0-100>, \"comment\": \"...\"}},\n    \
         {{\"name\": \"Problem Solving\", \"score\": <0-100>, \"comment\": \"...\"}},\n    \
         {{\"name\": \"Cultural Fit\", \"score\": <0-100>, \"comment\": \"...\"}},\n    \
         {{\"name\": \"Confidence and Clarity\", \"score\": <0-100>, \"comment\": \"...\"}}\n  ],\n  \
         \"strengths\": [\"...\"],\n  \"areasForImprovement\": [\"...\"],\n  \
         \"finalAssessment\": \"...\"\n}}",
        transcript = transcript,
        categories = categories,
    )
}

// ─── Repair Ladder ───────────────────────────────────────────

/// One way of turning raw model output into a feedback document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// The (fence-stripped) response is the JSON document
    WholeResponse,
    /// The document is the outermost `{...}` span inside surrounding prose
    BraceSpan,
    /// No JSON at all; salvage a total score from the text
    ScoreRecovery,
}

/// Strategies in the order they are tried.
pub const REPAIR_LADDER: [ParseStrategy; 3] = [
    ParseStrategy::WholeResponse,
    ParseStrategy::BraceSpan,
    ParseStrategy::ScoreRecovery,
];

impl ParseStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ParseStrategy::WholeResponse => "whole-response",
            ParseStrategy::BraceSpan => "brace-span",
            ParseStrategy::ScoreRecovery => "score-recovery",
        }
    }

    pub fn apply(&self, raw: &str, policy: &InterviewPolicy) -> Option<Feedback> {
        match self {
            ParseStrategy::WholeResponse => parse_document(strip_code_fences(raw), policy),
            ParseStrategy::BraceSpan => outermost_span(strip_code_fences(raw), '{', '}')
                .and_then(|span| parse_document(span, policy)),
            ParseStrategy::ScoreRecovery => {
                recover_score(raw).map(|score| unparsed_feedback(Some(score), raw, policy))
            }
        }
    }
}

/// Outcome of running the repair ladder
#[derive(Debug, Clone)]
pub struct ParsedFeedback {
    pub feedback: Feedback,
    /// The strategy that succeeded; `None` when the default was synthesized
    pub strategy: Option<ParseStrategy>,
}

/// Run the repair ladder. Always yields a document.
pub fn parse_feedback(raw: &str, policy: &InterviewPolicy) -> ParsedFeedback {
    REPAIR_LADDER
        .iter()
        .find_map(|strategy| {
            strategy.apply(raw, policy).map(|feedback| ParsedFeedback {
                feedback,
                strategy: Some(*strategy),
            })
        })
        .unwrap_or_else(|| ParsedFeedback {
            feedback: unparsed_feedback(None, raw, policy),
            strategy: None,
        })
}

fn parse_document(text: &str, policy: &InterviewPolicy) -> Option<Feedback> {
    let value: Value = serde_json::from_str(text).ok()?;
    value.as_object().map(|obj| normalize_document(obj, policy))
}

/// Coerce a loosely-shaped JSON object into a well-formed document.
pub fn normalize_document(obj: &Map<String, Value>, policy: &InterviewPolicy) -> Feedback {
    let parsed_total = obj.get("totalScore").and_then(score_value);
    let total = parsed_total.unwrap_or(policy.degraded_parse_score);

    let parsed_categories: Vec<CategoryScore> = obj
        .get("categoryScores")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| category_entry(entry, total))
                .collect()
        })
        .unwrap_or_default();
    let synthesized = parsed_categories.is_empty();

    Feedback {
        total_score: total,
        category_scores: complete_categories(parsed_categories, total),
        strengths: string_list(obj.get("strengths")),
        areas_for_improvement: string_list(
            obj.get("areasForImprovement")
                .or_else(|| obj.get("areas_for_improvement")),
        ),
        final_assessment: obj
            .get("finalAssessment")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        is_fallback: parsed_total.is_none() && synthesized,
    }
}

fn category_entry(entry: &Value, default_score: u8) -> Option<CategoryScore> {
    let obj = entry.as_object()?;
    let name = obj.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }
    Some(CategoryScore {
        name: name.to_string(),
        score: obj.get("score").and_then(score_value).unwrap_or(default_score),
        comment: obj
            .get("comment")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
    })
}

/// Exactly five entries: the model's own first, then any missing standard
/// categories at the total score.
fn complete_categories(mut categories: Vec<CategoryScore>, total: u8) -> Vec<CategoryScore> {
    if categories.is_empty() {
        return uniform_categories(total, "Score derived from the overall assessment.");
    }
    for name in FEEDBACK_CATEGORIES {
        if categories.len() >= FEEDBACK_CATEGORIES.len() {
            break;
        }
        if !categories.iter().any(|c| c.name.eq_ignore_ascii_case(name)) {
            categories.push(CategoryScore {
                name: name.to_string(),
                score: total,
                comment: "Not assessed separately.".to_string(),
            });
        }
    }
    categories.truncate(FEEDBACK_CATEGORIES.len());
    categories
}

/// A score from a JSON number or numeric string, rounded and clamped to 0..=100.
fn score_value(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.split('/').next()?.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then(|| n.round().clamp(0.0, 100.0) as u8)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn score_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r#"(?i)total\s*_?score"?\s*[:=]\s*(\d{1,3})"#).expect("valid regex"),
            Regex::new(r"\b(\d{1,3})\s*/\s*100\b").expect("valid regex"),
            Regex::new(r"\b(\d{1,3})\b").expect("valid regex"),
        ]
    })
}

/// Salvage a 0..=100 total score from free text: a labeled total first,
/// then `NN/100`, then any bare 1–3 digit number in range.
pub fn recover_score(raw: &str) -> Option<u8> {
    score_patterns().iter().find_map(|pattern| {
        pattern
            .captures_iter(raw)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<u16>().ok())
            .find(|n| *n <= 100)
            .map(|n| n as u8)
    })
}

// ─── Degraded Documents ──────────────────────────────────────

/// The document for an interview with nothing to score.
pub fn empty_transcript_feedback(policy: &InterviewPolicy) -> Feedback {
    Feedback {
        final_assessment: "No transcript was captured for this interview, so the \
                           answers could not be assessed."
            .to_string(),
        ..Feedback::uniform(policy.neutral_score, NO_TRANSCRIPT_COMMENT)
    }
}

/// The document used when the scoring model call itself failed.
pub fn model_error_feedback(policy: &InterviewPolicy) -> Feedback {
    Feedback {
        final_assessment: "Feedback could not be generated because the scoring model \
                           returned an error. These scores are provisional."
            .to_string(),
        ..Feedback::uniform(policy.model_error_score, MODEL_ERROR_COMMENT)
    }
}

/// The document for output no strategy could parse as JSON.
pub fn unparsed_feedback(score: Option<u8>, raw: &str, policy: &InterviewPolicy) -> Feedback {
    let final_assessment = if raw.trim().is_empty() {
        "The scoring model returned an empty response.".to_string()
    } else {
        excerpt(raw, policy.excerpt_len)
    };
    Feedback {
        total_score: score.unwrap_or(policy.degraded_parse_score),
        final_assessment,
        ..Feedback::uniform(policy.degraded_parse_score, UNPARSED_COMMENT)
    }
}

// ─── Persistence ─────────────────────────────────────────────

/// The session write for a derived document: COMPLETED, stamped, scored.
pub fn completion_update(
    feedback: &Feedback,
    raw: Option<&str>,
    policy: &InterviewPolicy,
) -> SessionUpdate {
    let detailed_feedback = if !feedback.final_assessment.trim().is_empty() {
        feedback.final_assessment.clone()
    } else if let Some(raw) = raw.filter(|r| !r.trim().is_empty()) {
        excerpt(raw, policy.excerpt_len)
    } else {
        "Feedback was generated without a written assessment.".to_string()
    };

    SessionUpdate {
        status: Some(SessionStatus::Completed),
        started_at: None,
        ended_at: Some(Utc::now()),
        overall_score: Some(feedback.total_score),
        technical_score: Some(feedback.category_score_or(TECHNICAL_KNOWLEDGE, policy.neutral_score)),
        communication_score: Some(
            feedback.category_score_or(COMMUNICATION_SKILLS, policy.neutral_score),
        ),
        confidence_score: Some(
            feedback.category_score_or(CONFIDENCE_AND_CLARITY, policy.neutral_score),
        ),
        strengths: Some(feedback.strengths.clone()),
        weaknesses: Some(feedback.areas_for_improvement.clone()),
        detailed_feedback: Some(detailed_feedback),
    }
}
