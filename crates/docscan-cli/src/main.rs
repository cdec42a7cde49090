// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docscan: scan-view binarization and skew correction for photographed documents.
//
// Entry point. Initialises logging, parses the command line and maps pipeline
// errors to exit codes.

mod cli;
mod commands;

use clap::Parser;
use docscan_core::human_errors::humanize_error;
use tracing_subscriber::EnvFilter;

use cli::{Cli, ExitCode};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    tracing::info!("docscan starting");

    let mut stdout = std::io::stdout().lock();
    match commands::run(&cli, &mut stdout) {
        Ok(()) => ExitCode::Success.into(),
        Err(err) => {
            let code = ExitCode::for_error(&err);
            tracing::error!(error = %err, stage = %err.stage(), "docscan failed");
            eprintln!("Error: {}", humanize_error(&err));
            eprintln!("({})", code.description());
            code.into()
        }
    }
}

/// Logs go to stderr so stdout carries only the skew estimate.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
