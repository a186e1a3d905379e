use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// The handling strategy selected for one query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum IntentAction {
    GameInfo { game_name: String },
    GetDocs { query: String, library: Option<String> },
    General,
}

impl IntentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GameInfo { .. } => "game_info",
            Self::GetDocs { .. } => "get_docs",
            Self::General => "general",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentDecision {
    #[serde(flatten)]
    pub action: IntentAction,
    pub user_friendly_response: Option<String>,
}

#[derive(Debug, Error)]
pub enum IntentParseError {
    #[error("classifier output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("classifier output must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

impl IntentDecision {
    /// Parses raw classifier output. Missing or unrecognized actions map to
    /// `General`; only malformed JSON is an error.
    pub fn parse(raw: &str, query: &str) -> Result<Self, IntentParseError> {
        let value: Value = serde_json::from_str(strip_code_fence(raw))?;
        let object = match &value {
            Value::Object(object) => object,
            other => return Err(IntentParseError::NotAnObject(json_kind(other))),
        };

        let action = match string_field(object, "action").as_deref() {
            Some("game_info") => IntentAction::GameInfo {
                game_name: string_field(object, "game_name").unwrap_or_else(|| query.to_string()),
            },
            Some("get_docs") => IntentAction::GetDocs {
                query: string_field(object, "query").unwrap_or_else(|| query.to_string()),
                library: string_field(object, "library"),
            },
            _ => IntentAction::General,
        };

        Ok(Self { action, user_friendly_response: string_field(object, "user_friendly_response") })
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::{IntentAction, IntentDecision, IntentParseError};

    #[test]
    fn parses_game_info_with_hint() {
        let decision = IntentDecision::parse(
            r#"{"action": "game_info", "game_name": "Witcher 3", "user_friendly_response": "Here's info about Witcher 3:"}"#,
            "Tell me about Witcher 3",
        )
        .expect("valid decision");

        assert_eq!(decision.action, IntentAction::GameInfo { game_name: "Witcher 3".to_string() });
        assert_eq!(
            decision.user_friendly_response.as_deref(),
            Some("Here's info about Witcher 3:")
        );
    }

    #[test]
    fn game_info_without_name_falls_back_to_query() {
        let decision = IntentDecision::parse(r#"{"action": "game_info"}"#, "is hades any good")
            .expect("valid decision");

        assert_eq!(
            decision.action,
            IntentAction::GameInfo { game_name: "is hades any good".to_string() }
        );
    }

    #[test]
    fn parses_get_docs_and_keeps_missing_library_empty() {
        let decision =
            IntentDecision::parse(r#"{"action": "get_docs", "query": "Streaming API"}"#, "q")
                .expect("valid decision");

        assert_eq!(
            decision.action,
            IntentAction::GetDocs { query: "Streaming API".to_string(), library: None }
        );
    }

    #[test]
    fn unknown_or_missing_action_is_general() {
        let unknown = IntentDecision::parse(r#"{"action": "book_flight"}"#, "q").expect("unknown");
        let missing =
            IntentDecision::parse(r#"{"user_friendly_response": "hi"}"#, "q").expect("missing");

        assert_eq!(unknown.action, IntentAction::General);
        assert_eq!(missing.action, IntentAction::General);
        assert_eq!(missing.user_friendly_response.as_deref(), Some("hi"));
    }

    #[test]
    fn tolerates_fenced_json() {
        let decision = IntentDecision::parse("```json\n{\"action\": \"general\"}\n```", "q")
            .expect("fenced json");
        assert_eq!(decision.action, IntentAction::General);
    }

    #[test]
    fn prose_is_rejected() {
        let error = IntentDecision::parse("Sure! This looks like a game question.", "q")
            .expect_err("prose must fail");
        assert!(matches!(error, IntentParseError::InvalidJson(_)));
    }

    #[test]
    fn non_object_json_is_rejected() {
        let error = IntentDecision::parse(r#"["game_info"]"#, "q").expect_err("array must fail");
        assert!(matches!(error, IntentParseError::NotAnObject("array")));
    }
}
