use serde::{Deserialize, Serialize};

pub const COMMUNICATION_SKILLS: &str = "Communication Skills";
pub const TECHNICAL_KNOWLEDGE: &str = "Technical Knowledge";
pub const PROBLEM_SOLVING: &str = "Problem Solving";
pub const CULTURAL_FIT: &str = "Cultural Fit";
pub const CONFIDENCE_AND_CLARITY: &str = "Confidence and Clarity";

/// The five scoring categories, in the order the model is asked to emit them.
pub const FEEDBACK_CATEGORIES: [&str; 5] = [
    COMMUNICATION_SKILLS,
    TECHNICAL_KNOWLEDGE,
    PROBLEM_SOLVING,
    CULTURAL_FIT,
    CONFIDENCE_AND_CLARITY,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub name: String,
    pub score: u8,
    #[serde(default)]
    pub comment: String,
}

/// Scored feedback for one interview, as produced by the model.
///
/// Field names are camelCase because this is the exact JSON shape the
/// scoring prompt asks the model to return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub total_score: u8,
    pub category_scores: Vec<CategoryScore>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas_for_improvement: Vec<String>,
    #[serde(default)]
    pub final_assessment: String,
    /// Set when the document was synthesized rather than parsed.
    #[serde(default)]
    pub is_fallback: bool,
}

impl Feedback {
    /// A document with every category at `score` and the same comment.
    pub fn uniform(score: u8, comment: &str) -> Self {
        Self {
            total_score: score,
            category_scores: uniform_categories(score, comment),
            strengths: Vec::new(),
            areas_for_improvement: Vec::new(),
            final_assessment: String::new(),
            is_fallback: true,
        }
    }

    pub fn category(&self, name: &str) -> Option<&CategoryScore> {
        self.category_scores
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn category_score_or(&self, name: &str, default: u8) -> u8 {
        self.category(name).map(|c| c.score).unwrap_or(default)
    }
}

pub fn uniform_categories(score: u8, comment: &str) -> Vec<CategoryScore> {
    FEEDBACK_CATEGORIES
        .iter()
        .map(|name| CategoryScore {
            name: name.to_string(),
            score,
            comment: comment.to_string(),
        })
        .collect()
}
