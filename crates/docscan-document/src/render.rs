// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Render sinks: where intermediate and final images are shown.
//
// The pipeline never needs a display surface. It hands labelled images to a
// sink; headless runs use `NullSink`, previews go to a directory.

use std::path::{Path, PathBuf};

use docscan_core::error::Result;
use image::DynamicImage;
use tracing::{debug, trace};

use crate::image::processor::save_image;

/// Receives labelled images as the pipeline produces them.
pub trait RenderSink {
    /// Present `image` under `label` (e.g. "original", "scanned", "edges").
    fn render(&mut self, label: &str, image: &DynamicImage) -> Result<()>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn render(&mut self, label: &str, _image: &DynamicImage) -> Result<()> {
        trace!(label, "NullSink discarding render");
        Ok(())
    }
}

/// Writes each render to `<dir>/<label>.png`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create the sink, creating `dir` if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RenderSink for DirectorySink {
    fn render(&mut self, label: &str, image: &DynamicImage) -> Result<()> {
        let path = self.dir.join(format!("{label}.png"));
        debug!(label, path = %path.display(), "Writing preview");
        save_image(&path, image)
    }
}

/// Keeps every render in memory, in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub frames: Vec<(String, DynamicImage)>,
}

impl RecordingSink {
    pub fn labels(&self) -> Vec<&str> {
        self.frames.iter().map(|(label, _)| label.as_str()).collect()
    }
}

impl RenderSink for RecordingSink {
    fn render(&mut self, label: &str, image: &DynamicImage) -> Result<()> {
        self.frames.push((label.to_string(), image.clone()));
        Ok(())
    }
}
