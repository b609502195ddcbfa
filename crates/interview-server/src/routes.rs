use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use interview_core::{CompletedSession, CreatedSession, StartedSession};
use interview_platform::USER_ID_HEADER;
use interview_types::{
    analytics::CallAnalytics,
    message::TranscriptMessage,
    session::{NewSession, Session},
    user::Identity,
};

use super::{error::ApiError, state::AppState};

/// The resolved caller; `None` when the request carried no usable identity.
pub struct Caller(pub Option<Identity>);

impl Caller {
    fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let credential = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok());
        Ok(Caller(state.identity.resolve(credential).await?))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteSession {
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub messages: Vec<TranscriptMessage>,
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn create_session_handler(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<NewSession>,
) -> Result<(StatusCode, Json<CreatedSession>), ApiError> {
    let created = state.manager.create(payload, caller.identity()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn start_session_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<StartedSession>, ApiError> {
    Ok(Json(state.manager.start(&id, caller.identity()).await?))
}

pub async fn complete_session_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<CompleteSession>,
) -> Result<Json<CompletedSession>, ApiError> {
    let completed = state
        .manager
        .complete(&id, caller.identity(), payload.transcript, payload.messages)
        .await?;
    Ok(Json(completed))
}

pub async fn list_sessions_handler(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<Session>>, ApiError> {
    Ok(Json(state.manager.list(caller.identity()).await?))
}

pub async fn get_session_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.manager.get(&id, caller.identity()).await?))
}

pub async fn get_analytics_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<CallAnalytics>, ApiError> {
    Ok(Json(state.manager.get_analytics(&id, caller.identity()).await?))
}
