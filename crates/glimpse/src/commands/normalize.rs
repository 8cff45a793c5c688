//! Print normalized source.

use std::path::Path;

use anyhow::Result;
use glimpse_source::{normalize, syntax_errors};

use super::read_source;

/// Run the normalize command.
pub fn run(file: &Path, markdown: bool) -> Result<()> {
    let source = read_source(file, markdown)?;
    let normalized = normalize(&source);

    for error in syntax_errors(&normalized) {
        tracing::warn!("{}: {}", file.display(), error);
    }

    println!("{normalized}");
    Ok(())
}
