// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand implementations. Each loads the configuration, applies flag
// overrides, runs the pipeline and writes its outputs.

use std::io::Write;
use std::path::Path;

use docscan_core::config::{DocscanConfig, ScanSettings};
use docscan_core::error::Result;
use docscan_document::image::processor::{load_image, save_image};
use docscan_document::render::{DirectorySink, NullSink, RenderSink};
use docscan_document::scan::deskew::SkewEstimate;
use docscan_document::scan::enhance::scan_view;
use docscan_document::SkewEstimator;
use tracing::{debug, info, instrument};

use crate::cli::{Cli, Commands, DeskewArgs, ProcessArgs, ScanArgs};

pub const SCANNED_FILE: &str = "scanned.png";
pub const ROTATED_FILE: &str = "rotated.png";

/// Run the parsed command. Skew estimates are written to `out` as JSON.
pub fn run(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let mut sink = make_sink(cli.preview_dir.as_deref())?;

    match &cli.command {
        Commands::Scan(args) => run_scan(args, &config, sink.as_mut()),
        Commands::Deskew(args) => {
            let estimate = run_deskew(args, &config, sink.as_mut())?;
            print_estimate(&estimate, out)
        }
        Commands::Process(args) => {
            let estimate = run_process(args, &config, sink.as_mut())?;
            print_estimate(&estimate, out)
        }
    }
}

/// The file at `path`, or the reference defaults.
pub fn load_config(path: Option<&Path>) -> Result<DocscanConfig> {
    match path {
        Some(path) => DocscanConfig::load(path),
        None => {
            debug!("No configuration file; using defaults");
            Ok(DocscanConfig::default())
        }
    }
}

fn make_sink(preview_dir: Option<&Path>) -> Result<Box<dyn RenderSink>> {
    Ok(match preview_dir {
        Some(dir) => Box::new(DirectorySink::new(dir)?),
        None => Box::new(NullSink),
    })
}

/// Scan settings with the command-line overrides applied.
fn scan_settings(args: &ScanArgs, config: &DocscanConfig) -> ScanSettings {
    let mut settings = config.scan.clone();
    if args.collage {
        settings.collage = true;
    }
    if let Some(height) = args.height {
        settings.resize = true;
        settings.target_height = height;
    }
    settings
}

#[instrument(skip_all, fields(input = %args.input.display()))]
fn run_scan(args: &ScanArgs, config: &DocscanConfig, sink: &mut dyn RenderSink) -> Result<()> {
    let settings = scan_settings(args, config);
    let output = scan_view(&args.input, &settings, sink)?;
    save_image(&args.output, &output.rendition)?;
    info!(output = %args.output.display(), "Scanned rendition written");
    Ok(())
}

#[instrument(skip_all, fields(input = %args.input.display()))]
fn run_deskew(
    args: &DeskewArgs,
    config: &DocscanConfig,
    sink: &mut dyn RenderSink,
) -> Result<SkewEstimate> {
    let image = load_image(&args.input)?;
    let output = SkewEstimator::from_config(config).deskew(&image, sink)?;
    save_image(&args.output, &output.rotated)?;
    info!(output = %args.output.display(), "Rotated rendition written");
    Ok(output.estimate)
}

#[instrument(skip_all, fields(input = %args.input.display()))]
fn run_process(
    args: &ProcessArgs,
    config: &DocscanConfig,
    sink: &mut dyn RenderSink,
) -> Result<SkewEstimate> {
    std::fs::create_dir_all(&args.out_dir)?;

    let scan = scan_view(&args.input, &config.scan, sink)?;
    save_image(args.out_dir.join(SCANNED_FILE), &scan.rendition)?;

    let output = SkewEstimator::from_config(config).deskew(&scan.rendition, sink)?;
    save_image(args.out_dir.join(ROTATED_FILE), &output.rotated)?;

    info!(out_dir = %args.out_dir.display(), "Scan and deskew written");
    Ok(output.estimate)
}

fn print_estimate(estimate: &SkewEstimate, out: &mut dyn Write) -> Result<()> {
    let json = serde_json::to_string_pretty(estimate)?;
    writeln!(out, "{json}")?;
    Ok(())
}
