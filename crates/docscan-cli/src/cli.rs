// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface: clap definitions and process exit codes.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docscan_core::error::DocscanError;
use docscan_core::types::Stage;

/// Exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    /// Bad arguments, configuration or parameter values.
    InvalidArgs = 2,
    /// Input missing or not a decodable image.
    InputNotFound = 3,
    /// Output could not be written.
    OutputError = 4,
    /// Nothing to detect, or detection produced no usable result.
    ProcessingError = 5,
}

impl ExitCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::InvalidArgs => "Invalid arguments or parameters",
            ExitCode::InputNotFound => "Input image not found or undecodable",
            ExitCode::OutputError => "Output error (permission denied, disk full, etc.)",
            ExitCode::ProcessingError => "Processing error",
        }
    }

    /// Exit code reported for a pipeline error.
    pub fn for_error(err: &DocscanError) -> Self {
        match err {
            DocscanError::InvalidParameter { .. }
            | DocscanError::Config(_)
            | DocscanError::Serialization(_) => ExitCode::InvalidArgs,
            DocscanError::InvalidInput(_) => ExitCode::InputNotFound,
            DocscanError::ImageError { stage: Stage::Save, .. } | DocscanError::Io(_) => {
                ExitCode::OutputError
            }
            DocscanError::ImageError { .. }
            | DocscanError::NoEdgesDetected { .. }
            | DocscanError::DegenerateAggregation => ExitCode::ProcessingError,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.code())
    }
}

/// Scan-view binarization and skew correction for photographed documents
#[derive(Parser, Debug)]
#[command(name = "docscan")]
#[command(version)]
#[command(about = "Scan-view binarization and skew correction for photographed documents", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON configuration file; command-line flags override its values
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write intermediate renders (original, scanned, edges, rotated) here
    #[arg(long, global = true, value_name = "DIR")]
    pub preview_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Binarize a photographed page into a scanned rendition
    Scan(ScanArgs),
    /// Estimate the skew of an image and rotate it straight
    Deskew(DeskewArgs),
    /// Scan, then deskew the scanned rendition
    Process(ProcessArgs),
}

#[derive(clap::Args, Debug)]
pub struct ScanArgs {
    /// Input image
    pub input: PathBuf,

    /// Output image (PNG recommended)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Place the original and the scanned rendition side by side
    #[arg(long)]
    pub collage: bool,

    /// Resize the output to this height in pixels
    #[arg(long, value_name = "N")]
    pub height: Option<u32>,
}

#[derive(clap::Args, Debug)]
pub struct DeskewArgs {
    /// Input image
    pub input: PathBuf,

    /// Output image for the rotated rendition
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct ProcessArgs {
    /// Input image
    pub input: PathBuf,

    /// Directory receiving scanned.png and rotated.png
    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,
}
