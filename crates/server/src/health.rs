use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use gamedex_core::tooling::ToolServer;
use serde::Serialize;

use crate::sessions::SessionStore;

#[derive(Clone)]
pub struct HealthState {
    tool_server: Arc<dyn ToolServer>,
    sessions: Arc<SessionStore>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub tools: HealthCheck,
    pub active_sessions: usize,
    pub checked_at: String,
}

pub fn router(tool_server: Arc<dyn ToolServer>, sessions: Arc<SessionStore>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { tool_server, sessions })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let tools = tools_check(state.tool_server.as_ref()).await;
    let ready = tools.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "gamedex-server runtime initialized".to_string(),
        },
        tools,
        active_sessions: state.sessions.len().await,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn tools_check(tool_server: &dyn ToolServer) -> HealthCheck {
    match tool_server.list_tools().await {
        Ok(tools) if !tools.is_empty() => {
            HealthCheck { status: "ready", detail: format!("{} tools registered", tools.len()) }
        }
        Ok(_) => HealthCheck { status: "degraded", detail: "no tools registered".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("tool listing failed: {error}") }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};
    use gamedex_core::tooling::{CallToolResult, ToolDescriptor, ToolServer, ToolServerError};
    use serde_json::{json, Value};

    use crate::health::{health, HealthState};
    use crate::sessions::SessionStore;

    struct FixedTools {
        available: bool,
    }

    #[async_trait]
    impl ToolServer for FixedTools {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolServerError> {
            if !self.available {
                return Err(ToolServerError::Unavailable("tool host stopped".to_string()));
            }
            Ok(vec![ToolDescriptor {
                name: "get_docs".to_string(),
                description: "docs".to_string(),
                input_schema: json!({}),
            }])
        }

        async fn call_tool(&self, name: &str, _args: Value) -> Result<CallToolResult, ToolServerError> {
            Err(ToolServerError::UnknownTool(name.to_string()))
        }
    }

    fn state(available: bool) -> HealthState {
        HealthState {
            tool_server: Arc::new(FixedTools { available }),
            sessions: Arc::new(SessionStore::default()),
        }
    }

    #[tokio::test]
    async fn health_returns_ready_when_tools_are_listed() {
        let (status, Json(payload)) = health(State(state(true))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.tools.detail, "1 tools registered");
        assert_eq!(payload.active_sessions, 0);
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_tools_fail() {
        let (status, Json(payload)) = health(State(state(false))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.tools.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
