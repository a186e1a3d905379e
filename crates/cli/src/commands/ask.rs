use std::sync::Arc;

use anyhow::{Context, Result};
use gamedex_agent::llm::OpenAiCompatibleClient;
use gamedex_agent::retrieval::{HttpEmbedder, PineconeIndex, Retriever};
use gamedex_agent::runtime::{AgentRuntime, RuntimeSettings, TurnOutcome, TurnState};
use gamedex_agent::tools::ToolInvoker;
use gamedex_core::config::AppConfig;
use gamedex_core::errors::FailureKind;
use gamedex_core::transcript::{Transcript, TranscriptExporter};
use gamedex_tools::ToolRegistry;
use serde::Serialize;

use crate::commands::{
    current_thread_runtime, load_config, CommandResult, ADAPTER_EXIT_CODE,
    INVALID_INPUT_EXIT_CODE, TURN_FAILED_EXIT_CODE,
};

const COMMAND: &str = "ask";

#[derive(Debug, Serialize)]
struct AskReport {
    turn: TurnOutcome,
    export_path: Option<String>,
}

pub fn run(query: &str, export: bool) -> CommandResult {
    let query = query.trim();
    if query.is_empty() {
        return CommandResult::failure(
            COMMAND,
            "invalid_request",
            "query must not be empty",
            INVALID_INPUT_EXIT_CODE,
        );
    }

    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match current_thread_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(execute(&config, query, export))
}

async fn execute(config: &AppConfig, query: &str, export: bool) -> CommandResult {
    let agent = match build_agent(config) {
        Ok(agent) => agent,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "adapter_setup",
                format!("{error:#}"),
                ADAPTER_EXIT_CODE,
            );
        }
    };

    let mut transcript = Transcript::new();
    let turn = agent.handle(query, &mut transcript).await;

    let export_path = if export {
        match TranscriptExporter::new(config.export.directory.clone()).export(&transcript) {
            Ok(path) => Some(path.display().to_string()),
            Err(error) => {
                return CommandResult::failure(
                    COMMAND,
                    FailureKind::ExportFailed.as_str(),
                    error.to_string(),
                    TURN_FAILED_EXIT_CODE,
                );
            }
        }
    } else {
        None
    };

    let state = turn.state;
    let failure = turn.failure;
    let data = match serde_json::to_value(AskReport { turn, export_path }) {
        Ok(data) => data,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "serialization",
                error.to_string(),
                TURN_FAILED_EXIT_CODE,
            );
        }
    };

    match (state, failure) {
        (TurnState::Failed, Some(kind)) => CommandResult::failure_with_data(
            COMMAND,
            kind.as_str(),
            "turn failed; the reply explains what went wrong",
            TURN_FAILED_EXIT_CODE,
            Some(data),
        ),
        _ => CommandResult::success(COMMAND, "turn completed", data),
    }
}

fn build_agent(config: &AppConfig) -> Result<AgentRuntime> {
    let llm = OpenAiCompatibleClient::from_config(&config.llm)
        .context("building language model client")?;
    let embedder =
        HttpEmbedder::from_config(&config.embedding).context("building embedding client")?;
    let index =
        PineconeIndex::from_config(&config.vector_index).context("building vector index client")?;
    let registry = ToolRegistry::from_config(config).context("building tool registry")?;

    Ok(AgentRuntime::new(
        Arc::new(llm),
        Retriever::new(Arc::new(embedder), Arc::new(index), config.embedding.dimension),
        ToolInvoker::new(Arc::new(registry)),
        RuntimeSettings::from(&config.orchestrator),
    ))
}
