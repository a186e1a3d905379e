use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub vector_index: VectorIndexConfig,
    pub igdb: IgdbConfig,
    pub search: SearchConfig,
    pub orchestrator: OrchestratorConfig,
    pub server: ServerConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub dimension: usize,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct VectorIndexConfig {
    pub host: String,
    pub api_key: SecretString,
    pub namespace: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct IgdbConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub token_url: String,
    pub api_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub api_key: Option<SecretString>,
    pub endpoint: String,
    pub results_per_query: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub call_timeout_secs: u64,
    pub retrieval_top_k: u32,
    pub classifier_max_tokens: u32,
    pub answer_max_tokens: u32,
    pub chat_max_tokens: u32,
    pub docs_context_chars: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ExportConfig {
    pub directory: PathBuf,
    pub flush_on_shutdown: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Groq,
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub vector_index_host: Option<String>,
    pub vector_index_api_key: Option<String>,
    pub igdb_client_id: Option<String>,
    pub igdb_client_secret: Option<String>,
    pub search_api_key: Option<String>,
    pub server_port: Option<u16>,
    pub export_directory: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Groq,
                api_key: None,
                base_url: None,
                model: "llama3-70b-8192".to_string(),
                timeout_secs: 60,
            },
            embedding: EmbeddingConfig {
                base_url: "http://localhost:11434/v1".to_string(),
                api_key: None,
                model: "all-minilm".to_string(),
                dimension: 384,
                timeout_secs: 30,
            },
            vector_index: VectorIndexConfig {
                host: String::new(),
                api_key: String::new().into(),
                namespace: None,
                timeout_secs: 30,
            },
            igdb: IgdbConfig {
                client_id: String::new(),
                client_secret: String::new().into(),
                token_url: "https://id.twitch.tv/oauth2/token".to_string(),
                api_url: "https://api.igdb.com/v4".to_string(),
                timeout_secs: 15,
            },
            search: SearchConfig {
                api_key: None,
                endpoint: "https://google.serper.dev/search".to_string(),
                results_per_query: 2,
                timeout_secs: 30,
            },
            orchestrator: OrchestratorConfig {
                call_timeout_secs: 90,
                retrieval_top_k: 5,
                classifier_max_tokens: 150,
                answer_max_tokens: 700,
                chat_max_tokens: 500,
                docs_context_chars: 12_000,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            export: ExportConfig {
                directory: PathBuf::from("conversations"),
                flush_on_shutdown: true,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected groq|openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LlmConfig {
    pub fn endpoint_base(&self) -> &str {
        self.base_url.as_deref().unwrap_or_else(|| self.provider.default_base_url())
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("gamedex.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(embedding) = patch.embedding {
            if let Some(base_url) = embedding.base_url {
                self.embedding.base_url = base_url;
            }
            if let Some(embedding_api_key_value) = embedding.api_key {
                self.embedding.api_key = Some(secret_value(embedding_api_key_value));
            }
            if let Some(model) = embedding.model {
                self.embedding.model = model;
            }
            if let Some(dimension) = embedding.dimension {
                self.embedding.dimension = dimension;
            }
            if let Some(timeout_secs) = embedding.timeout_secs {
                self.embedding.timeout_secs = timeout_secs;
            }
        }

        if let Some(vector_index) = patch.vector_index {
            if let Some(host) = vector_index.host {
                self.vector_index.host = host;
            }
            if let Some(index_api_key_value) = vector_index.api_key {
                self.vector_index.api_key = secret_value(index_api_key_value);
            }
            if let Some(namespace) = vector_index.namespace {
                self.vector_index.namespace = Some(namespace);
            }
            if let Some(timeout_secs) = vector_index.timeout_secs {
                self.vector_index.timeout_secs = timeout_secs;
            }
        }

        if let Some(igdb) = patch.igdb {
            if let Some(client_id) = igdb.client_id {
                self.igdb.client_id = client_id;
            }
            if let Some(client_secret_value) = igdb.client_secret {
                self.igdb.client_secret = secret_value(client_secret_value);
            }
            if let Some(token_url) = igdb.token_url {
                self.igdb.token_url = token_url;
            }
            if let Some(api_url) = igdb.api_url {
                self.igdb.api_url = api_url;
            }
            if let Some(timeout_secs) = igdb.timeout_secs {
                self.igdb.timeout_secs = timeout_secs;
            }
        }

        if let Some(search) = patch.search {
            if let Some(search_api_key_value) = search.api_key {
                self.search.api_key = Some(secret_value(search_api_key_value));
            }
            if let Some(endpoint) = search.endpoint {
                self.search.endpoint = endpoint;
            }
            if let Some(results_per_query) = search.results_per_query {
                self.search.results_per_query = results_per_query;
            }
            if let Some(timeout_secs) = search.timeout_secs {
                self.search.timeout_secs = timeout_secs;
            }
        }

        if let Some(orchestrator) = patch.orchestrator {
            if let Some(call_timeout_secs) = orchestrator.call_timeout_secs {
                self.orchestrator.call_timeout_secs = call_timeout_secs;
            }
            if let Some(retrieval_top_k) = orchestrator.retrieval_top_k {
                self.orchestrator.retrieval_top_k = retrieval_top_k;
            }
            if let Some(classifier_max_tokens) = orchestrator.classifier_max_tokens {
                self.orchestrator.classifier_max_tokens = classifier_max_tokens;
            }
            if let Some(answer_max_tokens) = orchestrator.answer_max_tokens {
                self.orchestrator.answer_max_tokens = answer_max_tokens;
            }
            if let Some(chat_max_tokens) = orchestrator.chat_max_tokens {
                self.orchestrator.chat_max_tokens = chat_max_tokens;
            }
            if let Some(docs_context_chars) = orchestrator.docs_context_chars {
                self.orchestrator.docs_context_chars = docs_context_chars;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(export) = patch.export {
            if let Some(directory) = export.directory {
                self.export.directory = directory;
            }
            if let Some(flush_on_shutdown) = export.flush_on_shutdown {
                self.export.flush_on_shutdown = flush_on_shutdown;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("GAMEDEX_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("GAMEDEX_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("GAMEDEX_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("GAMEDEX_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("GAMEDEX_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("GAMEDEX_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GAMEDEX_EMBEDDING_BASE_URL") {
            self.embedding.base_url = value;
        }
        if let Some(value) = read_env("GAMEDEX_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("GAMEDEX_EMBEDDING_MODEL") {
            self.embedding.model = value;
        }
        if let Some(value) = read_env("GAMEDEX_EMBEDDING_DIMENSION") {
            self.embedding.dimension = parse_usize("GAMEDEX_EMBEDDING_DIMENSION", &value)?;
        }

        if let Some(value) = read_env("GAMEDEX_VECTOR_INDEX_HOST") {
            self.vector_index.host = value;
        }
        if let Some(value) = read_env("GAMEDEX_VECTOR_INDEX_API_KEY") {
            self.vector_index.api_key = secret_value(value);
        }
        if let Some(value) = read_env("GAMEDEX_VECTOR_INDEX_NAMESPACE") {
            self.vector_index.namespace = Some(value);
        }

        if let Some(value) = read_env("GAMEDEX_IGDB_CLIENT_ID") {
            self.igdb.client_id = value;
        }
        if let Some(value) = read_env("GAMEDEX_IGDB_CLIENT_SECRET") {
            self.igdb.client_secret = secret_value(value);
        }

        if let Some(value) = read_env("GAMEDEX_SEARCH_API_KEY") {
            self.search.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("GAMEDEX_SEARCH_ENDPOINT") {
            self.search.endpoint = value;
        }

        if let Some(value) = read_env("GAMEDEX_ORCHESTRATOR_CALL_TIMEOUT_SECS") {
            self.orchestrator.call_timeout_secs =
                parse_u64("GAMEDEX_ORCHESTRATOR_CALL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("GAMEDEX_ORCHESTRATOR_RETRIEVAL_TOP_K") {
            self.orchestrator.retrieval_top_k =
                parse_u32("GAMEDEX_ORCHESTRATOR_RETRIEVAL_TOP_K", &value)?;
        }

        if let Some(value) = read_env("GAMEDEX_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("GAMEDEX_SERVER_PORT") {
            self.server.port = parse_u16("GAMEDEX_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("GAMEDEX_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("GAMEDEX_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("GAMEDEX_EXPORT_DIRECTORY") {
            self.export.directory = PathBuf::from(value);
        }
        if let Some(value) = read_env("GAMEDEX_EXPORT_FLUSH_ON_SHUTDOWN") {
            self.export.flush_on_shutdown =
                parse_bool("GAMEDEX_EXPORT_FLUSH_ON_SHUTDOWN", &value)?;
        }

        let log_level = read_env("GAMEDEX_LOGGING_LEVEL").or_else(|| read_env("GAMEDEX_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GAMEDEX_LOGGING_FORMAT").or_else(|| read_env("GAMEDEX_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(host) = overrides.vector_index_host {
            self.vector_index.host = host;
        }
        if let Some(index_api_key) = overrides.vector_index_api_key {
            self.vector_index.api_key = secret_value(index_api_key);
        }
        if let Some(client_id) = overrides.igdb_client_id {
            self.igdb.client_id = client_id;
        }
        if let Some(client_secret) = overrides.igdb_client_secret {
            self.igdb.client_secret = secret_value(client_secret);
        }
        if let Some(search_api_key) = overrides.search_api_key {
            self.search.api_key = Some(secret_value(search_api_key));
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(directory) = overrides.export_directory {
            self.export.directory = directory;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_embedding(&self.embedding)?;
        validate_vector_index(&self.vector_index)?;
        validate_igdb(&self.igdb)?;
        validate_search(&self.search)?;
        validate_orchestrator(&self.orchestrator)?;
        validate_server(&self.server)?;
        validate_export(&self.export)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("gamedex.toml"), PathBuf::from("config/gamedex.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn validate_timeout(key: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value > 300 {
        return Err(ConfigError::Validation(format!("{key} must be in range 1..=300")));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    validate_timeout("llm.timeout_secs", llm.timeout_secs)?;

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    match llm.provider {
        LlmProvider::Groq | LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for groq/openai providers".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {}
    }

    validate_http_url("llm.base_url", llm.endpoint_base())
}

fn validate_embedding(embedding: &EmbeddingConfig) -> Result<(), ConfigError> {
    validate_http_url("embedding.base_url", &embedding.base_url)?;
    validate_timeout("embedding.timeout_secs", embedding.timeout_secs)?;

    if embedding.dimension == 0 {
        return Err(ConfigError::Validation(
            "embedding.dimension must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_vector_index(vector_index: &VectorIndexConfig) -> Result<(), ConfigError> {
    let host = vector_index.host.trim();
    if host.is_empty() {
        return Err(ConfigError::Validation(
            "vector_index.host is required. Copy the index host from your vector database console (e.g. https://steam-games-index-xxxx.svc.pinecone.io)".to_string(),
        ));
    }
    validate_http_url("vector_index.host", host)?;

    if vector_index.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation("vector_index.api_key is required".to_string()));
    }

    validate_timeout("vector_index.timeout_secs", vector_index.timeout_secs)
}

fn validate_igdb(igdb: &IgdbConfig) -> Result<(), ConfigError> {
    if igdb.client_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "igdb.client_id is required. Register an application at https://dev.twitch.tv/console/apps".to_string(),
        ));
    }
    if igdb.client_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "igdb.client_secret is required. Generate it next to the client id in the Twitch developer console".to_string(),
        ));
    }

    validate_http_url("igdb.token_url", &igdb.token_url)?;
    validate_http_url("igdb.api_url", &igdb.api_url)?;
    validate_timeout("igdb.timeout_secs", igdb.timeout_secs)
}

fn validate_search(search: &SearchConfig) -> Result<(), ConfigError> {
    validate_http_url("search.endpoint", &search.endpoint)?;
    validate_timeout("search.timeout_secs", search.timeout_secs)?;

    if search.results_per_query == 0 || search.results_per_query > 10 {
        return Err(ConfigError::Validation(
            "search.results_per_query must be in range 1..=10".to_string(),
        ));
    }

    Ok(())
}

fn validate_orchestrator(orchestrator: &OrchestratorConfig) -> Result<(), ConfigError> {
    validate_timeout("orchestrator.call_timeout_secs", orchestrator.call_timeout_secs)?;

    if orchestrator.retrieval_top_k == 0 || orchestrator.retrieval_top_k > 100 {
        return Err(ConfigError::Validation(
            "orchestrator.retrieval_top_k must be in range 1..=100".to_string(),
        ));
    }

    let budgets = [
        ("orchestrator.classifier_max_tokens", orchestrator.classifier_max_tokens),
        ("orchestrator.answer_max_tokens", orchestrator.answer_max_tokens),
        ("orchestrator.chat_max_tokens", orchestrator.chat_max_tokens),
    ];
    for (key, value) in budgets {
        if value == 0 {
            return Err(ConfigError::Validation(format!("{key} must be greater than zero")));
        }
    }

    if orchestrator.docs_context_chars == 0 {
        return Err(ConfigError::Validation(
            "orchestrator.docs_context_chars must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_export(export: &ExportConfig) -> Result<(), ConfigError> {
    if export.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation("export.directory must not be empty".to_string()));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    embedding: Option<EmbeddingPatch>,
    vector_index: Option<VectorIndexPatch>,
    igdb: Option<IgdbPatch>,
    search: Option<SearchPatch>,
    orchestrator: Option<OrchestratorPatch>,
    server: Option<ServerPatch>,
    export: Option<ExportPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    dimension: Option<usize>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct VectorIndexPatch {
    host: Option<String>,
    api_key: Option<String>,
    namespace: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct IgdbPatch {
    client_id: Option<String>,
    client_secret: Option<String>,
    token_url: Option<String>,
    api_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPatch {
    api_key: Option<String>,
    endpoint: Option<String>,
    results_per_query: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct OrchestratorPatch {
    call_timeout_secs: Option<u64>,
    retrieval_top_k: Option<u32>,
    classifier_max_tokens: Option<u32>,
    answer_max_tokens: Option<u32>,
    chat_max_tokens: Option<u32>,
    docs_context_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ExportPatch {
    directory: Option<PathBuf>,
    flush_on_shutdown: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const REQUIRED_VARS: [(&str, &str); 5] = [
        ("GAMEDEX_LLM_API_KEY", "gsk-test"),
        ("GAMEDEX_VECTOR_INDEX_HOST", "https://games-index.example.io"),
        ("GAMEDEX_VECTOR_INDEX_API_KEY", "pc-test"),
        ("GAMEDEX_IGDB_CLIENT_ID", "client-test"),
        ("GAMEDEX_IGDB_CLIENT_SECRET", "secret-test"),
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_required_vars() {
        for (key, value) in REQUIRED_VARS {
            env::set_var(key, value);
        }
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
        for (key, _) in REQUIRED_VARS {
            env::remove_var(key);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_the_game_assistant_profile() {
        let config = AppConfig::default();

        assert_eq!(config.llm.provider, LlmProvider::Groq);
        assert_eq!(config.llm.model, "llama3-70b-8192");
        assert_eq!(config.llm.endpoint_base(), "https://api.groq.com/openai/v1");
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.orchestrator.retrieval_top_k, 5);
        assert_eq!(config.orchestrator.classifier_max_tokens, 150);
        assert_eq!(config.orchestrator.answer_max_tokens, 700);
        assert_eq!(config.orchestrator.chat_max_tokens, 500);
        assert_eq!(config.export.directory, PathBuf::from("conversations"));
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_GAMEDEX_IGDB_ID", "id-from-env");
        env::set_var("TEST_GAMEDEX_IGDB_SECRET", "secret-from-env");
        env::set_var("GAMEDEX_LLM_API_KEY", "gsk-test");
        env::set_var("GAMEDEX_VECTOR_INDEX_HOST", "https://games-index.example.io");
        env::set_var("GAMEDEX_VECTOR_INDEX_API_KEY", "pc-test");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("gamedex.toml");
            fs::write(
                &path,
                r#"
[igdb]
client_id = "${TEST_GAMEDEX_IGDB_ID}"
client_secret = "${TEST_GAMEDEX_IGDB_SECRET}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.igdb.client_id == "id-from-env", "client id should be interpolated")?;
            ensure(
                config.igdb.client_secret.expose_secret() == "secret-from-env",
                "client secret should be interpolated",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_GAMEDEX_IGDB_ID", "TEST_GAMEDEX_IGDB_SECRET"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("GAMEDEX_LOG_LEVEL", "warn");
        env::set_var("GAMEDEX_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["GAMEDEX_LOG_LEVEL", "GAMEDEX_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("GAMEDEX_LLM_MODEL", "model-from-env");
        env::set_var("GAMEDEX_SERVER_PORT", "9100");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("gamedex.toml");
            fs::write(
                &path,
                r#"
[llm]
model = "model-from-file"

[server]
port = 9000

[export]
directory = "from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    llm_model: Some("model-from-override".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.model == "model-from-override", "override model should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.server.port == 9100, "env port should win over file")?;
            ensure(
                config.export.directory == PathBuf::from("from-file"),
                "file export directory should win over default",
            )?;
            Ok(())
        })();

        clear_vars(&["GAMEDEX_LLM_MODEL", "GAMEDEX_SERVER_PORT"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::remove_var("GAMEDEX_VECTOR_INDEX_HOST");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("vector_index.host")
            );
            ensure(has_message, "validation failure should mention vector_index.host")
        })();

        clear_vars(&[]);
        result
    }

    #[test]
    fn invalid_numeric_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("GAMEDEX_ORCHESTRATOR_RETRIEVAL_TOP_K", "five");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected override failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "GAMEDEX_ORCHESTRATOR_RETRIEVAL_TOP_K"
                ),
                "override error should name the variable",
            )
        })();

        clear_vars(&["GAMEDEX_ORCHESTRATOR_RETRIEVAL_TOP_K"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("GAMEDEX_LLM_API_KEY", "gsk-secret-value");
        env::set_var("GAMEDEX_IGDB_CLIENT_SECRET", "igdb-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("gsk-secret-value"), "debug output should not contain llm key")?;
            ensure(
                !debug.contains("igdb-secret-value"),
                "debug output should not contain igdb secret",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&[]);
        result
    }
}
