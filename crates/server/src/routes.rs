//! Control surface for the query pipeline.
//!
//! JSON API Endpoints:
//! - `GET  /tools`: list tools exposed by the tool server
//! - `POST /query`: run one turn in a session and return the new messages
//! - `POST /reset`: clear a session transcript
//! - `POST /export`: write a session transcript to the export directory

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use gamedex_agent::runtime::{AgentRuntime, TurnState, DEFAULT_SESSION};
use gamedex_core::domain::message::Message;
use gamedex_core::errors::{ApplicationError, FailureKind, InterfaceError};
use gamedex_core::tooling::ToolDescriptor;
use gamedex_core::transcript::TranscriptExporter;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::sessions::SessionStore;

#[derive(Clone)]
pub struct ApiState {
    pub runtime: Arc<AgentRuntime>,
    pub sessions: Arc<SessionStore>,
    pub exporter: TranscriptExporter,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub session_id: String,
    pub correlation_id: String,
    pub state: TurnState,
    pub failure: Option<FailureKind>,
    pub degraded: Vec<FailureKind>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub session_id: String,
    pub cleared: usize,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub session_id: String,
    pub path: String,
    pub message_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: &'static str,
    pub detail: String,
    pub correlation_id: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/query", post(submit_query))
        .route("/reset", post(reset_session))
        .route("/export", post(export_session))
        .with_state(state)
}

pub async fn list_tools(State(state): State<ApiState>) -> ApiResult<ToolsResponse> {
    let correlation_id = Uuid::new_v4().to_string();
    match state.runtime.tools().list().await {
        Ok(tools) => Ok(Json(ToolsResponse { tools })),
        Err(tool_error) => {
            error!(
                event_name = "api.tools.failed",
                correlation_id = %correlation_id,
                error = %tool_error,
                "listing tools failed"
            );
            Err(interface_error(
                ApplicationError::Integration(tool_error.to_string()).into_interface(correlation_id),
            ))
        }
    }
}

pub async fn submit_query(
    State(state): State<ApiState>,
    Json(body): Json<QueryRequest>,
) -> ApiResult<QueryResponse> {
    let query = body.query.trim();
    if query.is_empty() {
        return Err(interface_error(
            ApplicationError::InvalidRequest("query must not be empty".to_string())
                .into_interface(Uuid::new_v4().to_string()),
        ));
    }

    let session_id = session_or_default(body.session_id);
    let transcript = state.sessions.session(&session_id).await;
    let mut transcript = transcript.lock().await;
    let outcome = state.runtime.handle_in_session(&session_id, query, &mut transcript).await;

    Ok(Json(QueryResponse {
        session_id,
        correlation_id: outcome.correlation_id,
        state: outcome.state,
        failure: outcome.failure,
        degraded: outcome.degraded,
        messages: outcome.messages,
    }))
}

pub async fn reset_session(
    State(state): State<ApiState>,
    body: Option<Json<SessionRequest>>,
) -> ApiResult<ResetResponse> {
    let session_id = session_or_default(body.and_then(|Json(request)| request.session_id));
    let cleared = state.sessions.reset(&session_id).await;
    Ok(Json(ResetResponse { session_id, cleared }))
}

pub async fn export_session(
    State(state): State<ApiState>,
    body: Option<Json<SessionRequest>>,
) -> ApiResult<ExportResponse> {
    let session_id = session_or_default(body.and_then(|Json(request)| request.session_id));
    let correlation_id = Uuid::new_v4().to_string();

    let Some(transcript) = state.sessions.existing(&session_id).await else {
        return Err(interface_error(
            ApplicationError::NotFound(format!("session `{session_id}` does not exist"))
                .into_interface(correlation_id),
        ));
    };
    let transcript = transcript.lock().await;
    match state.exporter.export(&transcript) {
        Ok(path) => {
            info!(
                event_name = "api.export.completed",
                correlation_id = %correlation_id,
                session_id = %session_id,
                path = %path.display(),
                "session exported"
            );
            Ok(Json(ExportResponse {
                session_id,
                path: path.display().to_string(),
                message_count: transcript.len(),
            }))
        }
        Err(export_error) => {
            error!(
                event_name = "api.export.failed",
                correlation_id = %correlation_id,
                session_id = %session_id,
                failure = FailureKind::ExportFailed.as_str(),
                error = %export_error,
                "session export failed"
            );
            Err(interface_error(
                ApplicationError::Export(export_error.to_string()).into_interface(correlation_id),
            ))
        }
    }
}

fn session_or_default(session_id: Option<String>) -> String {
    session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION.to_string())
}

fn interface_error(error: InterfaceError) -> (StatusCode, Json<ApiError>) {
    let status = match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let detail = match &error {
        InterfaceError::BadRequest { message, .. }
        | InterfaceError::NotFound { message, .. }
        | InterfaceError::ServiceUnavailable { message, .. }
        | InterfaceError::Internal { message, .. } => message.clone(),
    };

    (
        status,
        Json(ApiError {
            error: error.user_message(),
            detail,
            correlation_id: error.correlation_id().to_string(),
        }),
    )
}
