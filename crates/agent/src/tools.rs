use std::sync::Arc;

use gamedex_core::tooling::{ToolDescriptor, ToolServer, ToolServerError};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub const SEARCH_GAME_INFO_TOOL: &str = "search_game_info";
pub const GET_DOCS_TOOL: &str = "get_docs";

/// Returned when a tool answers with no content at all.
pub const NO_RESULT: &str = "No result.";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error(transparent)]
    Server(#[from] ToolServerError),
    #[error("tool `{tool}` reported an error: {message}")]
    Failed { tool: String, message: String },
}

/// Thin pass-through from the runtime to a [`ToolServer`].
#[derive(Clone)]
pub struct ToolInvoker {
    server: Arc<dyn ToolServer>,
}

impl ToolInvoker {
    pub fn new(server: Arc<dyn ToolServer>) -> Self {
        Self { server }
    }

    pub async fn list(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        Ok(self.server.list_tools().await?)
    }

    pub async fn invoke(&self, tool_name: &str, args: Value) -> Result<String, ToolError> {
        debug!(event_name = "tool.invoke.started", tool = tool_name, args = %args, "invoking tool");

        let result = self.server.call_tool(tool_name, args).await?;
        if result.is_error {
            let message = result.first_text().unwrap_or("tool returned an error").to_string();
            warn!(
                event_name = "tool.invoke.error_result",
                tool = tool_name,
                error = %message,
                "tool reported failure"
            );
            return Err(ToolError::Failed { tool: tool_name.to_string(), message });
        }

        Ok(result.first_text().map(str::to_owned).unwrap_or_else(|| NO_RESULT.to_string()))
    }
}
