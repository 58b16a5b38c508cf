//! steward command-line entry point

mod cli;
mod commands;
mod errors;
mod output;
mod tracing;

use clap::Parser;
use std::sync::Arc;
use steward_core::{Config, ProcessRunner, RunContext};

use crate::cli::{Cli, Commands};
use crate::commands::CommandExecutor;
use crate::errors::{CliError, USAGE_EXIT_CODE, report_error};
use crate::output::Renderer;
use crate::tracing::TracingConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version output are not errors
            let code = if e.use_stderr() { USAGE_EXIT_CODE } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let code = match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            let code = error.exit_code();
            report_error(error);
            code
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32, CliError> {
    let tracing_config = TracingConfig::from_flags(cli.json, cli.level);
    crate::tracing::init_tracing(tracing_config).map_err(|e| CliError::tracing(e.to_string()))?;

    let ctx = RunContext::new(cli.command.name());
    // `version` works even with a broken configuration file
    let config = if matches!(cli.command, Commands::Version) {
        Config::default()
    } else {
        Config::load(cli.config.as_deref()).map_err(CliError::config)?
    };
    ::tracing::debug!(
        parent: ctx.span(),
        config = %errors::describe_config(cli.config.as_ref()),
        "Configuration loaded"
    );

    let executor = CommandExecutor::new(
        ctx,
        config,
        Arc::new(ProcessRunner::new()),
        Renderer::new(cli.format),
    );
    let mut stdout = std::io::stdout().lock();
    executor.execute(cli.command, &mut stdout).await
}
