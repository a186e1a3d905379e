use std::sync::Arc;

use gamedex_core::domain::intent::{IntentDecision, IntentParseError};
use gamedex_core::domain::message::Message;
use thiserror::Error;
use tracing::{error, info};

use crate::llm::{CompletionRequest, LlmClient, LlmError};

pub const ROUTER_PROMPT: &str = r#"You are a smart assistant router.

Classify the user's message:
- "game_info": for any video game questions.
- "get_docs": for coding, libraries.
- "general": for general questions.

Respond in JSON format only.

Examples:
{"action": "game_info", "game_name": "Witcher 3", "user_friendly_response": "Here's info about Witcher 3:"}
{"action": "get_docs", "query": "Streaming API", "library": "openai", "user_friendly_response": "..."}
{"action": "general", "user_friendly_response": "..."}
"#;

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("classifier output could not be parsed: {source}")]
    Unparseable {
        raw: String,
        #[source]
        source: IntentParseError,
    },
    #[error(transparent)]
    Llm(#[from] LlmError),
}

pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        Self { llm, max_tokens }
    }

    /// One completion, no retry.
    pub async fn classify(&self, query: &str) -> Result<IntentDecision, ClassificationError> {
        let request = CompletionRequest::new(
            vec![Message::system(ROUTER_PROMPT), Message::user(query)],
            self.max_tokens,
        );
        let raw = self.llm.complete(request).await?;

        match IntentDecision::parse(&raw, query) {
            Ok(decision) => {
                info!(
                    event_name = "classifier.decision",
                    action = decision.action.as_str(),
                    hint = decision.user_friendly_response.as_deref().unwrap_or(""),
                    "query classified"
                );
                Ok(decision)
            }
            Err(source) => {
                error!(
                    event_name = "classifier.parse_failed",
                    raw_output = %raw,
                    error = %source,
                    "classifier output was not a JSON object"
                );
                Err(ClassificationError::Unparseable { raw, source })
            }
        }
    }
}
