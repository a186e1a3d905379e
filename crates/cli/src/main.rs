use std::process::ExitCode;

fn main() -> ExitCode {
    gamedex_cli::run()
}
