pub mod config;
pub mod domain;
pub mod errors;
pub mod tooling;
pub mod transcript;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::context::{Passage, RetrievedContext};
pub use domain::intent::{IntentAction, IntentDecision, IntentParseError};
pub use domain::message::{ContentItem, Message, MessageContent, Role};
pub use errors::{ApplicationError, FailureKind, InterfaceError};
pub use tooling::{CallToolResult, ToolDescriptor, ToolServer, ToolServerError};
pub use transcript::{ExportError, Transcript, TranscriptExporter};
