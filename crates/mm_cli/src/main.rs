//! MarketMind CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or missing configuration
//! - 3: Stage aborted after exhausting repairs
//! - 4: External call failure

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mm_core::CoreError;
use mm_pipeline::PipelineError;

mod commands;

use commands::{Cli, Commands};

/// Variable read before `RUST_LOG`.
const LOG_ENV: &str = "MARKETMIND_LOG";

const CRATES: [&str; 7] = ["mm_cli", "mm_core", "mm_schema", "mm_store", "mm_agents", "mm_llm", "mm_pipeline"];

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const STAGE_ABORTED: u8 = 3;
    pub const EXTERNAL_FAILURE: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(log_filter(cli.verbose, cli.quiet))
        .try_init();

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Status(args) => commands::status::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Filter from `MARKETMIND_LOG`, then `RUST_LOG`, then the flag-derived default.
fn log_filter(verbose: bool, quiet: bool) -> EnvFilter {
    let from_env = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
        .ok()
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok());

    from_env.unwrap_or_else(|| EnvFilter::new(default_directives(verbose, quiet)))
}

fn default_directives(verbose: bool, quiet: bool) -> String {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let mut directives = vec!["warn".to_string()];
    directives.extend(CRATES.iter().map(|c| format!("{}={}", c, level)));
    directives.join(",")
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(err) = e.downcast_ref::<PipelineError>() {
        return match err {
            PipelineError::ConfigMissing(_) | PipelineError::InvalidInput(_) => ExitCodes::INVALID_ARGS,
            PipelineError::StageAborted { .. } => ExitCodes::STAGE_ABORTED,
            PipelineError::ExternalCallFailure { .. } => ExitCodes::EXTERNAL_FAILURE,
            _ => ExitCodes::GENERAL_ERROR,
        };
    }

    match e.downcast_ref::<CoreError>() {
        Some(CoreError::InvalidInput(_)) | Some(CoreError::InvalidSettings { .. }) => ExitCodes::INVALID_ARGS,
        _ => ExitCodes::GENERAL_ERROR,
    }
}
