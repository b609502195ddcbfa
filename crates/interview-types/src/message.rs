use serde::{Deserialize, Serialize};

/// Role in a chat exchange with the text-generation model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message sent to or received from the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// One entry of a call transcript as delivered by the client.
///
/// The voice SDK hands over either bare strings or objects whose field
/// names vary between SDK versions (`role`/`speaker`, `content`/`message`/
/// `text`). Both shapes are accepted here and nowhere else. Anything else
/// is kept as `Other` so one odd entry cannot reject the whole log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranscriptMessage {
    PlainText(String),
    Structured {
        #[serde(alias = "speaker", default = "unknown_role")]
        role: String,
        #[serde(alias = "message", alias = "text")]
        content: String,
    },
    /// Unrecognized entry; stored as received, never rendered.
    Other(serde_json::Value),
}

fn unknown_role() -> String {
    "unknown".to_string()
}

impl TranscriptMessage {
    pub fn structured(role: impl Into<String>, content: impl Into<String>) -> Self {
        TranscriptMessage::Structured {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            TranscriptMessage::PlainText(text) => text,
            TranscriptMessage::Structured { content, .. } => content,
            TranscriptMessage::Other(_) => "",
        }
    }

    /// Render as a transcript line: `"<role>: <content>"`, or the bare
    /// text for plain entries. Empty entries render to `None`.
    pub fn render_line(&self) -> Option<String> {
        match self {
            TranscriptMessage::PlainText(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            TranscriptMessage::Structured { role, content } => {
                let content = content.trim();
                (!content.is_empty()).then(|| format!("{}: {}", role.trim(), content))
            }
            TranscriptMessage::Other(_) => None,
        }
    }
}

/// Render a message log into newline-joined transcript lines.
pub fn render_transcript(messages: &[TranscriptMessage]) -> String {
    messages
        .iter()
        .filter_map(TranscriptMessage::render_line)
        .collect::<Vec<_>>()
        .join("\n")
}
