use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use gamedex_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }
    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field::new("llm.provider", format!("{:?}", config.llm.provider), &["GAMEDEX_LLM_PROVIDER"]),
        Field::new("llm.model", config.llm.model.as_str(), &["GAMEDEX_LLM_MODEL"]),
        Field::new("llm.base_url", config.llm.endpoint_base(), &["GAMEDEX_LLM_BASE_URL"]),
        Field::new("llm.api_key", optional_secret(config.llm.api_key.as_ref()), &["GAMEDEX_LLM_API_KEY"]),
        Field::new(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["GAMEDEX_LLM_TIMEOUT_SECS"],
        ),
        Field::new(
            "embedding.base_url",
            config.embedding.base_url.as_str(),
            &["GAMEDEX_EMBEDDING_BASE_URL"],
        ),
        Field::new("embedding.model", config.embedding.model.as_str(), &["GAMEDEX_EMBEDDING_MODEL"]),
        Field::new(
            "embedding.dimension",
            config.embedding.dimension.to_string(),
            &["GAMEDEX_EMBEDDING_DIMENSION"],
        ),
        Field::new(
            "embedding.api_key",
            optional_secret(config.embedding.api_key.as_ref()),
            &["GAMEDEX_EMBEDDING_API_KEY"],
        ),
        Field::new("vector_index.host", config.vector_index.host.as_str(), &["GAMEDEX_VECTOR_INDEX_HOST"]),
        Field::new(
            "vector_index.api_key",
            redact_token(config.vector_index.api_key.expose_secret()),
            &["GAMEDEX_VECTOR_INDEX_API_KEY"],
        ),
        Field::new(
            "vector_index.namespace",
            config.vector_index.namespace.as_deref().unwrap_or("<unset>"),
            &["GAMEDEX_VECTOR_INDEX_NAMESPACE"],
        ),
        Field::new("igdb.client_id", config.igdb.client_id.as_str(), &["GAMEDEX_IGDB_CLIENT_ID"]),
        Field::new(
            "igdb.client_secret",
            redact_token(config.igdb.client_secret.expose_secret()),
            &["GAMEDEX_IGDB_CLIENT_SECRET"],
        ),
        Field::new("search.endpoint", config.search.endpoint.as_str(), &["GAMEDEX_SEARCH_ENDPOINT"]),
        Field::new(
            "search.api_key",
            optional_secret(config.search.api_key.as_ref()),
            &["GAMEDEX_SEARCH_API_KEY"],
        ),
        Field::new("search.results_per_query", config.search.results_per_query.to_string(), &[]),
        Field::new(
            "orchestrator.call_timeout_secs",
            config.orchestrator.call_timeout_secs.to_string(),
            &["GAMEDEX_ORCHESTRATOR_CALL_TIMEOUT_SECS"],
        ),
        Field::new(
            "orchestrator.retrieval_top_k",
            config.orchestrator.retrieval_top_k.to_string(),
            &["GAMEDEX_ORCHESTRATOR_RETRIEVAL_TOP_K"],
        ),
        Field::new(
            "server.bind_address",
            config.server.bind_address.as_str(),
            &["GAMEDEX_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port.to_string(), &["GAMEDEX_SERVER_PORT"]),
        Field::new(
            "export.directory",
            config.export.directory.display().to_string(),
            &["GAMEDEX_EXPORT_DIRECTORY"],
        ),
        Field::new(
            "export.flush_on_shutdown",
            config.export.flush_on_shutdown.to_string(),
            &["GAMEDEX_EXPORT_FLUSH_ON_SHUTDOWN"],
        ),
        Field::new(
            "logging.level",
            config.logging.level.as_str(),
            &["GAMEDEX_LOGGING_LEVEL", "GAMEDEX_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["GAMEDEX_LOGGING_FORMAT", "GAMEDEX_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("gamedex.toml"), PathBuf::from("config/gamedex.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn optional_secret(secret: Option<&SecretString>) -> String {
    secret.map(|secret| redact_token(secret.expose_secret())).unwrap_or_else(|| "<unset>".to_string())
}

/// Keeps a provider prefix such as `gsk-` so operators can tell keys apart.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn redaction_keeps_only_the_key_prefix() {
        assert_eq!(redact_token("gsk-abcdef123"), "gsk-***");
        assert_eq!(redact_token("abcdef123"), "<redacted>");
        assert_eq!(redact_token("   "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc: Value = "[llm]\nmodel = \"llama3-8b-8192\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
