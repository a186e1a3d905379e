pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "gamedex",
    about = "GameDex operator CLI",
    long_about = "Inspect GameDex configuration, list registered tools, and run single query turns.",
    after_help = "Examples:\n  gamedex config\n  gamedex tools\n  gamedex ask \"Tell me about Hades\" --export"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "List the tools registered with the in-process tool server")]
    Tools,
    #[command(about = "Run one query turn against the configured providers and print the result")]
    Ask {
        #[arg(help = "The question to classify and answer")]
        query: String,
        #[arg(long, help = "Write the resulting transcript to the export directory")]
        export: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Tools => commands::tools::run(),
        Command::Ask { query, export } => commands::ask::run(&query, export),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
