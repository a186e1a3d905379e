use gamedex_core::tooling::ToolServer;
use gamedex_tools::ToolRegistry;

use crate::commands::{current_thread_runtime, load_config, CommandResult, ADAPTER_EXIT_CODE};

const COMMAND: &str = "tools";

pub fn run() -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let registry = match ToolRegistry::from_config(&config) {
        Ok(registry) => registry,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "tool_setup",
                error.to_string(),
                ADAPTER_EXIT_CODE,
            );
        }
    };

    let runtime = match current_thread_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let listed = runtime.block_on(registry.list_tools()).map_err(|error| error.to_string());
    let data = listed.and_then(|tools| {
        let count = tools.len();
        serde_json::to_value(tools).map(|value| (count, value)).map_err(|error| error.to_string())
    });

    match data {
        Ok((count, value)) => {
            CommandResult::success(COMMAND, format!("{count} tools registered"), value)
        }
        Err(message) => {
            CommandResult::failure(COMMAND, "tool_listing", message, ADAPTER_EXIT_CODE)
        }
    }
}
