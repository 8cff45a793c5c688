//! Print the component name of a source file.

use std::path::Path;

use anyhow::{bail, Result};
use glimpse_source::find_component_name;

use super::read_source;

/// Run the extract command.
pub fn run(file: &Path, markdown: bool) -> Result<()> {
    let source = read_source(file, markdown)?;

    let Some(found) = find_component_name(&source) else {
        bail!("No component name found in {}", file.display());
    };

    tracing::debug!("Matched {:?} pattern", found.kind);
    println!("{}", found.name);
    Ok(())
}
