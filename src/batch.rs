// src/batch.rs
//
// Batch input/output: detection files in, event reports out.
// A detection file holds one RawFrame JSON object per line.

use crate::pipeline::SessionReport;
use crate::types::{BatchConfig, RawFrame};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub struct BatchProcessor {
    config: BatchConfig,
}

impl BatchProcessor {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub fn find_detection_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let wanted = self.config.extension.to_ascii_lowercase();

        for entry in WalkDir::new(&self.config.input_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.to_ascii_lowercase() == wanted);
            if matches {
                files.push(path.to_path_buf());
            }
        }

        info!("Found {} detection file(s)", files.len());
        Ok(files)
    }

    /// Reads every frame of a detection file. Unparseable lines are logged
    /// and skipped; the second value counts them.
    pub fn read_frames(&self, path: &Path) -> Result<(Vec<RawFrame>, usize)> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        parse_frames(BufReader::new(file))
            .with_context(|| format!("reading {}", path.display()))
    }

    /// `<output_dir>/<stem>.events.json`
    pub fn report_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "session".to_string());
        PathBuf::from(&self.config.output_dir).join(format!("{}.events.json", stem))
    }

    pub fn write_report(&self, path: &Path, report: &SessionReport) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), report)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Report written: {}", path.display());
        Ok(())
    }
}

pub fn parse_frames(reader: impl BufRead) -> Result<(Vec<RawFrame>, usize)> {
    let mut frames = Vec::new();
    let mut skipped = 0;
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match RawFrame::from_json(&line) {
            Ok(frame) => frames.push(frame),
            Err(e) => {
                warn!("line {}: {}", n + 1, e);
                skipped += 1;
            }
        }
    }
    Ok((frames, skipped))
}
