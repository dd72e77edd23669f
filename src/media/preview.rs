//! Local preview for the `--show` debug mode of the CLI.
//!
//! There is no window system dependency: the latest annotated frame is kept
//! as a PNG under the temp directory for an external viewer, and
//! `wait_for_quit` blocks until the operator types `q`.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage};

pub struct Preview {
    path: PathBuf,
}

impl Preview {
    pub fn new(title: &str) -> Self {
        let stem: String = title
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let path = std::env::temp_dir().join(format!("recognizer-preview-{stem}.png"));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the preview image.
    pub fn update(&self, frame: &RgbImage) -> Result<()> {
        frame
            .save_with_format(&self.path, ImageFormat::Png)
            .with_context(|| format!("write preview {}", self.path.display()))
    }

    /// Block until a line starting with `q` arrives on stdin, or stdin closes.
    pub fn wait_for_quit(&self) -> Result<()> {
        log::info!("preview at {} (type q + enter to close)", self.path.display());
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = line.context("read preview input")?;
            if line.trim_start().starts_with('q') {
                break;
            }
        }
        Ok(())
    }
}
