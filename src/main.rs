//! capability-mcp: MCP server exposing registered capabilities over stdio
//!
//! stdout carries protocol messages only; all logging goes to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use capability_mcp::builtin;
use capability_mcp::config;
use capability_mcp::error::ServeError;
use capability_mcp::mcp::McpServer;

/// MCP server exposing registered tools, resources, and prompts.
///
/// Speaks line-delimited JSON-RPC 2.0 on stdin/stdout.
#[derive(Parser, Debug)]
#[command(name = "capability-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,

    /// Do not register the built-in demonstration capabilities
    #[arg(long)]
    no_builtins: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Writes the licence notice to stderr; stdout is reserved for protocol messages.
fn print_license_notice() {
    eprintln!(
        "{} {}  Copyright (C) 2026  The Embedded Society",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("This program comes with ABSOLUTELY NO WARRANTY.");
    eprintln!(
        "This is free software, licensed under {}.",
        env!("CARGO_PKG_LICENSE")
    );
    eprintln!();
}

/// Entry point for the capability-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nConfig read from: {}", default_path.display());
                }
            }
            return ExitCode::FAILURE;
        }
    };

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    // GPLv3 Section 5d notice
    print_license_notice();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting capability-mcp server"
    );

    let mut builder = McpServer::builder()
        .server_info(cfg.server.server_info())
        .require_initialize(cfg.session.require_initialize);

    if cfg.builtins.enabled && !args.no_builtins {
        builder = builtin::install(builder);
    }

    let server = builder.build();

    info!(
        name = %server.server_info().name,
        require_initialize = cfg.session.require_initialize,
        "MCP server ready, waiting for client connection..."
    );

    // Run the server
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(server.run()) {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(ServeError::Cancelled) => {
            info!("Server stopped by shutdown signal");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn license_matches_manifest() {
        assert_eq!(env!("CARGO_PKG_LICENSE"), "GPL-3.0-or-later");
    }

    #[test]
    fn log_level_precedence() {
        assert_eq!(get_log_level(0, true, "trace"), Level::ERROR);
        assert_eq!(get_log_level(2, false, "error"), Level::DEBUG);
        assert_eq!(get_log_level(0, false, "INFO"), Level::INFO);
        assert_eq!(get_log_level(0, false, "nonsense"), Level::WARN);
        assert_eq!(get_log_level(5, false, "warn"), Level::TRACE);
    }
}
