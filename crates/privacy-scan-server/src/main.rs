// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(
    name = "privacy-scan",
    about = "Privacy compliance scanner: consent, cookies, tracking and disclosure checks for a web page",
    version,
    after_help = "Run 'privacy-scan <command> --help' for details on each command."
)]
struct Cli {
    /// Scan config file (JSON). Also reads PRIVACY_SCAN_CONFIG.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a single page and print the report
    Scan {
        /// URL to scan (http or https)
        url: String,
        /// Entry navigation timeout per attempt, in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Entry navigation attempts
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Save a full-page screenshot to the configured directory
        #[arg(long)]
        screenshot: bool,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
        /// Audit log path (defaults to ~/.privacy-scan/audit.jsonl)
        #[arg(long)]
        audit_log: Option<String>,
        /// Do not append the scan to the audit log
        #[arg(long)]
        no_audit: bool,
    },
    /// Serve the REST API
    Serve {
        /// Listen address (host:port)
        #[arg(long, default_value = "127.0.0.1:8000")]
        addr: String,
        /// Remediation catalog file replacing the embedded one
        #[arg(long)]
        catalog: Option<String>,
        /// Audit log path (defaults to ~/.privacy-scan/audit.jsonl)
        #[arg(long)]
        audit_log: Option<String>,
        /// Do not write an audit log
        #[arg(long)]
        no_audit: bool,
    },
    /// List the detection rules
    Rules {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the remediation snippet for a violation id
    Fix {
        /// Violation id (e.g. "cookies_before_consent")
        violation_id: String,
        /// Remediation catalog file replacing the embedded one
        #[arg(long)]
        catalog: Option<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    match cli.command {
        Commands::Scan {
            url,
            timeout_ms,
            max_attempts,
            screenshot,
            json,
            audit_log,
            no_audit,
        } => {
            let args = cli::scan_cmd::ScanArgs {
                url,
                timeout_ms,
                max_attempts,
                screenshot,
                json,
                audit_log,
                no_audit,
            };
            cli::scan_cmd::run(cli.config.as_deref(), args).await
        }
        Commands::Serve {
            addr,
            catalog,
            audit_log,
            no_audit,
        } => {
            let args = cli::serve_cmd::ServeArgs {
                addr,
                catalog,
                audit_log,
                no_audit,
            };
            cli::serve_cmd::run(cli.config.as_deref(), args).await
        }
        Commands::Rules { json } => cli::rules_cmd::run(json),
        Commands::Fix {
            violation_id,
            catalog,
        } => cli::rules_cmd::fix(&violation_id, catalog.as_deref()),
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "privacy-scan",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

/// Logs go to stderr so `--json` output on stdout stays clean.
fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
