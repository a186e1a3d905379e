use std::env;
use std::sync::{Mutex, OnceLock};

use gamedex_cli::commands::{ask, config, tools};
use serde_json::Value;

const REQUIRED_VARS: [(&str, &str); 5] = [
    ("GAMEDEX_LLM_API_KEY", "gsk-test-secret"),
    ("GAMEDEX_VECTOR_INDEX_HOST", "https://games-index.example.io"),
    ("GAMEDEX_VECTOR_INDEX_API_KEY", "pcsk-test-secret"),
    ("GAMEDEX_IGDB_CLIENT_ID", "igdb-client"),
    ("GAMEDEX_IGDB_CLIENT_SECRET", "igdb-secret-value"),
];

#[test]
fn config_reports_sources_and_redacts_secrets() {
    with_env(&REQUIRED_VARS, || {
        let output = config::run();

        assert!(output.starts_with("effective config"));
        assert!(output.contains("- llm.api_key = gsk-*** (source: env (GAMEDEX_LLM_API_KEY))"));
        assert!(output.contains("- llm.model = llama3-70b-8192 (source: default)"));
        assert!(output.contains("- search.api_key = <unset> (source: default)"));
        assert!(!output.contains("gsk-test-secret"));
        assert!(!output.contains("pcsk-test-secret"));
        assert!(!output.contains("igdb-secret-value"));
    });
}

#[test]
fn config_reports_log_level_alias_as_its_source() {
    let mut vars = REQUIRED_VARS.to_vec();
    vars.push(("GAMEDEX_LOG_LEVEL", "debug"));
    with_env(&vars, || {
        let output = config::run();
        assert!(output.contains("- logging.level = debug (source: env (GAMEDEX_LOG_LEVEL))"));
    });
}

#[test]
fn config_reports_validation_failure_without_credentials() {
    with_env(&[], || {
        assert!(config::run().starts_with("config validation failed"));
    });
}

#[test]
fn tools_lists_both_registered_tools() {
    with_env(&REQUIRED_VARS, || {
        let result = tools::run();
        assert_eq!(result.exit_code, 0, "expected tool listing to succeed");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "tools");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "2 tools registered");

        let names = payload["data"]
            .as_array()
            .expect("tool array")
            .iter()
            .map(|tool| tool["name"].as_str().unwrap_or_default().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["get_docs", "search_game_info"]);
    });
}

#[test]
fn tools_returns_config_failure_without_credentials() {
    with_env(&[], || {
        let result = tools::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "tools");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn ask_rejects_blank_query_before_loading_config() {
    with_env(&[], || {
        let result = ask::run("   ", false);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["error_class"], "invalid_request");
    });
}

#[test]
fn ask_returns_config_failure_without_credentials() {
    with_env(&[], || {
        let result = ask::run("Tell me about Hades", false);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload.get("data").is_none());
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be json")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "GAMEDEX_LLM_PROVIDER",
        "GAMEDEX_LLM_API_KEY",
        "GAMEDEX_LLM_BASE_URL",
        "GAMEDEX_LLM_MODEL",
        "GAMEDEX_LLM_TIMEOUT_SECS",
        "GAMEDEX_EMBEDDING_BASE_URL",
        "GAMEDEX_EMBEDDING_API_KEY",
        "GAMEDEX_EMBEDDING_MODEL",
        "GAMEDEX_EMBEDDING_DIMENSION",
        "GAMEDEX_VECTOR_INDEX_HOST",
        "GAMEDEX_VECTOR_INDEX_API_KEY",
        "GAMEDEX_VECTOR_INDEX_NAMESPACE",
        "GAMEDEX_IGDB_CLIENT_ID",
        "GAMEDEX_IGDB_CLIENT_SECRET",
        "GAMEDEX_SEARCH_API_KEY",
        "GAMEDEX_SEARCH_ENDPOINT",
        "GAMEDEX_ORCHESTRATOR_CALL_TIMEOUT_SECS",
        "GAMEDEX_ORCHESTRATOR_RETRIEVAL_TOP_K",
        "GAMEDEX_SERVER_BIND_ADDRESS",
        "GAMEDEX_SERVER_PORT",
        "GAMEDEX_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "GAMEDEX_EXPORT_DIRECTORY",
        "GAMEDEX_EXPORT_FLUSH_ON_SHUTDOWN",
        "GAMEDEX_LOGGING_LEVEL",
        "GAMEDEX_LOGGING_FORMAT",
        "GAMEDEX_LOG_LEVEL",
        "GAMEDEX_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
