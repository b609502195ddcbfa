//! Configuration handed to the voice-call SDK to drive a live interview.
//!
//! Serialized camelCase to match the SDK's JSON contract.

use serde::{Deserialize, Serialize};

use crate::message::Message;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    pub name: String,
    pub first_message: String,
    pub transcriber: TranscriberConfig,
    pub voice: VoiceConfig,
    pub model: AssistantModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriberConfig {
    pub provider: String,
    pub model: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub provider: String,
    pub voice_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub speed: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantModel {
    pub provider: String,
    pub model: String,
    pub messages: Vec<Message>,
}

impl AssistantConfig {
    /// The system instruction given to the conversational model.
    pub fn system_prompt(&self) -> Option<&str> {
        self.model
            .messages
            .iter()
            .find(|m| m.role == crate::message::Role::System)
            .map(|m| m.content.as_str())
    }
}
