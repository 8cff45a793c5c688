//! Code fence handling for generator output.

use regex::Regex;
use std::sync::LazyLock;

/// Source dialect named by a code fence info string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    Tsx,
    Jsx,
    TypeScript,
    JavaScript,
    #[default]
    Unknown,
}

impl Dialect {
    /// Parse a dialect from a code fence info string (`tsx`, `jsx title="x"`, ...).
    pub fn from_info(info: &str) -> Self {
        let lang = info.split_whitespace().next().unwrap_or("");
        match lang.to_lowercase().as_str() {
            "tsx" => Self::Tsx,
            "jsx" => Self::Jsx,
            "ts" | "typescript" => Self::TypeScript,
            "js" | "javascript" => Self::JavaScript,
            _ => Self::Unknown,
        }
    }

    /// Whether a block in this dialect can hold a component source.
    pub fn is_component_source(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

static OPENING_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A\s*(?:```|~~~)[A-Za-z0-9_+.-]*[^\n]*\n").expect("Invalid opening fence regex")
});

static CLOSING_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n?[ \t]*(?:```|~~~)[ \t]*\s*\z").expect("Invalid closing fence regex")
});

/// Remove a leading fence line (with optional dialect tag) and a trailing fence line.
///
/// Either side is removed independently, so a truncated response that only
/// opened a fence is still unwrapped.
pub fn strip_fences(source: &str) -> String {
    let without_open = OPENING_FENCE_RE.replace(source, "");
    CLOSING_FENCE_RE.replace(&without_open, "").into_owned()
}
