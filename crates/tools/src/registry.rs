use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use gamedex_core::config::AppConfig;
use gamedex_core::tooling::{CallToolResult, ToolDescriptor, ToolServer, ToolServerError};
use serde_json::Value;
use tracing::{debug, warn};

use crate::docs::DocsTool;
use crate::igdb::GameInfoTool;
use crate::ToolResult;

#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;
    async fn call(&self, args: Value) -> ToolResult<String>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry with the game lookup and documentation tools wired from config.
    pub fn from_config(config: &AppConfig) -> ToolResult<Self> {
        let mut registry = Self::default();
        registry.register(GameInfoTool::from_config(&config.igdb)?);
        registry.register(DocsTool::from_config(&config.search)?);
        Ok(registry)
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.descriptor().name, Arc::new(tool));
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }
}

#[async_trait]
impl ToolServer for ToolRegistry {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolServerError> {
        Ok(self.tools.values().map(|tool| tool.descriptor()).collect())
    }

    async fn call_tool(&self, name: &str, args: Value) -> Result<CallToolResult, ToolServerError> {
        let tool =
            self.tools.get(name).ok_or_else(|| ToolServerError::UnknownTool(name.to_string()))?;

        debug!(event_name = "tool.call.started", tool = name, args = %args, "tool called");
        match tool.call(args).await {
            Ok(text) => Ok(CallToolResult::text(text)),
            Err(error) if error.is_caller_error() => Err(ToolServerError::InvalidArguments {
                tool: name.to_string(),
                message: error.to_string(),
            }),
            Err(error) => {
                warn!(event_name = "tool.call.failed", tool = name, error = %error, "tool call failed");
                Ok(CallToolResult::error(error.to_string()))
            }
        }
    }
}
