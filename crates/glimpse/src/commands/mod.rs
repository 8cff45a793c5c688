pub mod check;
pub mod extract;
pub mod init;
pub mod normalize;
pub mod preview;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use glimpse_source::unwrap_response;

/// Read a source file, unwrapping markdown responses.
///
/// `.md` and `.mdx` files are always treated as generator responses.
pub fn read_source(path: &Path, markdown: bool) -> Result<String> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if markdown || ext == "md" || ext == "mdx" {
        Ok(unwrap_response(&content))
    } else {
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn unwraps_markdown_files() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("answer.md");
        fs::write(&path, "Here you go:\n\n```tsx\nconst A = () => <p />;\n```\n").unwrap();
        assert_eq!(read_source(&path, false).unwrap(), "const A = () => <p />;\n");
    }

    #[test]
    fn reads_source_files_verbatim() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("A.tsx");
        fs::write(&path, "const A = () => <p />;").unwrap();
        assert_eq!(read_source(&path, false).unwrap(), "const A = () => <p />;");
        assert!(read_source(&temp.path().join("missing.tsx"), false).is_err());
    }
}
