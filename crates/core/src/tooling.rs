use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::message::ContentItem;

/// Text the documentation tool answers with when the web search is empty.
pub const NO_DOCUMENTATION_FOUND: &str = "No results found";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<ContentItem>,
    #[serde(default)]
    pub is_error: bool,
}

impl CallToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self { content: vec![ContentItem::text(text)], is_error: false }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { content: vec![ContentItem::text(text)], is_error: true }
    }

    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(ContentItem::as_text)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolServerError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid arguments for `{tool}`: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("tool server unavailable: {0}")]
    Unavailable(String),
}

/// Request/response boundary to whatever process hosts the tools.
#[async_trait]
pub trait ToolServer: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolServerError>;
    async fn call_tool(&self, name: &str, args: Value) -> Result<CallToolResult, ToolServerError>;
}
