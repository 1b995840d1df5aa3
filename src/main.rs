// Entrypoint for the `feishu` binary.
// - Keeps `main` small: set up logging, parse arguments, hand off to `ui`.
// - Every failure ends up as one `❌ ... failed` line and exit status 1.

use clap::Parser;
use feishu_cli::cli::Cli;
use feishu_cli::config::default_config_path;
use feishu_cli::ui::{self, Output};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    // FEISHU_LOG takes the usual filter syntax, e.g. `feishu_cli=debug`.
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("FEISHU_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = default_config_path();
    let out = Output { json: cli.json };
    match ui::run(&cli.command, &config_path, out) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("❌ {} failed: {}", ui::operation(&cli.command), e);
            Ok(ExitCode::FAILURE)
        }
    }
}
