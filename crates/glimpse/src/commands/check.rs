//! Batch normalization check.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Result};
use glimpse_preview::SOURCE_EXTENSIONS;
use glimpse_source::{extract_component_name, normalize, syntax_errors};
use rayon::prelude::*;
use walkdir::WalkDir;

use super::read_source;

/// Outcome of checking one source file.
#[derive(Debug)]
pub struct CheckReport {
    pub path: PathBuf,
    pub component: Option<String>,
    pub errors: Vec<String>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.component.is_some() && self.errors.is_empty()
    }
}

/// Normalize one file and report what a compiler would trip on.
pub fn check_file(path: &Path) -> Result<CheckReport> {
    let source = read_source(path, false)?;
    let normalized = normalize(&source);

    Ok(CheckReport {
        path: path.to_path_buf(),
        component: extract_component_name(&source),
        errors: syntax_errors(&normalized),
    })
}

/// Find component sources under `dir`.
pub fn discover_sources(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let ext = e.path().extension().and_then(|e| e.to_str()).unwrap_or("");
            SOURCE_EXTENSIONS.contains(&ext)
        })
        .map(|e| e.into_path())
        .collect()
}

/// Run the check command.
pub fn run(dir: &Path) -> Result<()> {
    let start = Instant::now();
    if !dir.exists() {
        bail!("Directory not found: {}", dir.display());
    }

    let sources = discover_sources(dir);
    let reports: Vec<Result<CheckReport>> = sources.par_iter().map(|p| check_file(p)).collect();

    let mut failed = 0;
    for report in reports {
        let report = report?;
        if report.passed() {
            continue;
        }
        failed += 1;
        if report.component.is_none() {
            tracing::warn!("{}: no component name found", report.path.display());
        }
        for error in &report.errors {
            tracing::warn!("{}: {}", report.path.display(), error);
        }
    }

    tracing::info!(
        "Checked {} files in {}ms, {} with problems",
        sources.len(),
        start.elapsed().as_millis(),
        failed
    );

    if failed > 0 {
        bail!("{failed} of {} files failed the check", sources.len());
    }
    Ok(())
}
