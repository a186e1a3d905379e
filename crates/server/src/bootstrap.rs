use std::sync::Arc;

use axum::Router;
use gamedex_agent::llm::{LlmError, OpenAiCompatibleClient};
use gamedex_agent::retrieval::{HttpEmbedder, PineconeIndex, RetrievalError, Retriever};
use gamedex_agent::runtime::{AgentRuntime, RuntimeSettings};
use gamedex_agent::tools::ToolInvoker;
use gamedex_core::config::{AppConfig, ConfigError, LoadOptions};
use gamedex_core::tooling::ToolServer;
use gamedex_core::transcript::TranscriptExporter;
use gamedex_tools::{ToolError, ToolRegistry};
use thiserror::Error;
use tracing::{info, warn};

use crate::health;
use crate::routes::{self, ApiState};
use crate::sessions::SessionStore;

/// Owns every long-lived handle. Dropping it releases them; [`shutdown`]
/// additionally flushes sessions to disk first.
///
/// [`shutdown`]: Application::shutdown
pub struct Application {
    pub config: AppConfig,
    pub runtime: Arc<AgentRuntime>,
    pub tool_server: Arc<dyn ToolServer>,
    pub sessions: Arc<SessionStore>,
    pub exporter: TranscriptExporter,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("language model client setup failed: {0}")]
    Llm(#[from] LlmError),
    #[error("retrieval client setup failed: {0}")]
    Retrieval(#[from] RetrievalError),
    #[error("tool registry setup failed: {0}")]
    Tools(#[from] ToolError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let llm = Arc::new(OpenAiCompatibleClient::from_config(&config.llm)?);
    info!(
        event_name = "system.bootstrap.llm_ready",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        model = %config.llm.model,
        "language model client ready"
    );

    let retriever = Retriever::new(
        Arc::new(HttpEmbedder::from_config(&config.embedding)?),
        Arc::new(PineconeIndex::from_config(&config.vector_index)?),
        config.embedding.dimension,
    );

    let registry = ToolRegistry::from_config(&config)?;
    if config.search.api_key.is_none() {
        warn!(
            event_name = "system.bootstrap.docs_search_disabled",
            correlation_id = "bootstrap",
            "search.api_key is not set; get_docs calls will fail"
        );
    }
    info!(
        event_name = "system.bootstrap.tools_registered",
        correlation_id = "bootstrap",
        tools = ?registry.names(),
        "tool registry ready"
    );
    let tool_server: Arc<dyn ToolServer> = Arc::new(registry);

    let runtime = AgentRuntime::new(
        llm,
        retriever,
        ToolInvoker::new(tool_server.clone()),
        RuntimeSettings::from(&config.orchestrator),
    );
    let exporter = TranscriptExporter::new(config.export.directory.clone());

    Ok(Application {
        config,
        runtime: Arc::new(runtime),
        tool_server,
        sessions: Arc::new(SessionStore::default()),
        exporter,
    })
}

impl Application {
    pub fn router(&self) -> Router {
        routes::router(ApiState {
            runtime: self.runtime.clone(),
            sessions: self.sessions.clone(),
            exporter: self.exporter.clone(),
        })
        .merge(health::router(self.tool_server.clone(), self.sessions.clone()))
    }

    /// Flushes non-empty sessions when configured to, then drops every handle.
    /// Returns the number of sessions written.
    pub async fn shutdown(self) -> usize {
        if !self.config.export.flush_on_shutdown {
            info!(
                event_name = "system.shutdown.flush_skipped",
                correlation_id = "shutdown",
                "session flush disabled"
            );
            return 0;
        }

        let reports = self.sessions.flush_all(&self.exporter).await;
        let written = reports.iter().filter(|report| report.result.is_ok()).count();
        info!(
            event_name = "system.shutdown.flushed",
            correlation_id = "shutdown",
            sessions = reports.len(),
            written,
            "sessions flushed to export directory"
        );
        written
    }
}
