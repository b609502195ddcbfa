//! Builds the voice-assistant configuration for a live interview call.

use interview_types::{
    assistant::{AssistantConfig, AssistantModel, TranscriberConfig, VoiceConfig},
    message::Message,
    session::Session,
    InterviewError, Result,
};

use crate::extract::speech_safe;

const ASSISTANT_NAME: &str = "Interviewer";

/// Render a session into the config the voice-call SDK consumes.
///
/// Pure and deterministic; fails only when the session has no questions
/// to ask.
pub fn build_assistant_config(session: &Session) -> Result<AssistantConfig> {
    if session.questions.is_empty() {
        return Err(InterviewError::InvalidInput(format!(
            "session {} has no interview questions",
            session.id
        )));
    }

    let role = speech_safe(&session.role);

    Ok(AssistantConfig {
        name: ASSISTANT_NAME.to_string(),
        first_message: format!(
            "Hello! Thank you for taking the time to speak with me today. \
             I'm excited to learn more about you and your interest in the {} position.",
            role
        ),
        transcriber: TranscriberConfig {
            provider: "deepgram".to_string(),
            model: "nova-2".to_string(),
            language: "en".to_string(),
        },
        voice: VoiceConfig {
            provider: "11labs".to_string(),
            voice_id: "sarah".to_string(),
            stability: 0.4,
            similarity_boost: 0.8,
            speed: 0.9,
            style: 0.5,
            use_speaker_boost: true,
        },
        model: AssistantModel {
            provider: "openai".to_string(),
            model: "gpt-4".to_string(),
            messages: vec![Message::system(interviewer_prompt(session, &role))],
        },
    })
}

fn interviewer_prompt(session: &Session, role: &str) -> String {
    let question_lines = session
        .questions
        .iter()
        .map(|q| format!("- {}", q))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a professional job interviewer conducting a real-time voice interview \
         with a candidate for a {difficulty} {role} position ({session_type} interview). \
         Your goal is to assess their qualifications, motivation, and fit for the role.\n\
         \n\
         Interview guidelines:\n\
         Follow the structured question flow:\n\
         {questions}\n\
         \n\
         Engage naturally and react appropriately:\n\
         - Listen actively to responses and acknowledge them before moving forward.\n\
         - Ask brief follow-up questions if a response is vague or requires more detail.\n\
         - Keep the conversation flowing smoothly while maintaining control.\n\
         \n\
         Be professional, yet warm and welcoming:\n\
         - Use official yet friendly language.\n\
         - Keep responses concise and to the point, like in a real voice interview.\n\
         - Avoid robotic phrasing and sound natural and conversational.\n\
         \n\
         Conclude the interview properly:\n\
         - Thank the candidate for their time.\n\
         - Inform them that the company will reach out soon with feedback.\n\
         - End the conversation on a polite and positive note.\n\
         \n\
         Your responses are spoken aloud. Keep them short and never use characters \
         such as slashes or asterisks that break voice synthesis.",
        difficulty = speech_safe(&session.difficulty),
        role = role,
        session_type = speech_safe(&session.session_type),
        questions = question_lines,
    )
}
