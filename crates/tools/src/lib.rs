//! GameDex tool server
//!
//! Hosts the tools the agent runtime can call through the
//! [`ToolServer`](gamedex_core::tooling::ToolServer) boundary.
//!
//! ## Tools
//!
//! - `search_game_info`: structured game lookup against IGDB
//! - `get_docs`: site-scoped web search over library documentation
//!
//! Tools run in-process behind [`ToolRegistry`]; failures inside a tool come
//! back as error results rather than transport errors.

pub mod docs;
pub mod html;
pub mod igdb;
mod registry;

pub use docs::DocsTool;
pub use igdb::GameInfoTool;
pub use registry::{Tool, ToolRegistry};

use thiserror::Error;

/// Errors raised while executing a single tool call
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("tool is not configured: {0}")]
    NotConfigured(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),
}

impl ToolError {
    /// Input errors are the caller's fault and are reported as such; every
    /// other failure becomes an error result the caller can read.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, ToolError::InvalidInput(_))
    }
}

pub type ToolResult<T> = Result<T, ToolError>;

pub(crate) fn parse_args<T>(tool: &str, args: serde_json::Value) -> ToolResult<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(args)
        .map_err(|error| ToolError::InvalidInput(format!("{tool}: {error}")))
}
