//! Exported component name extraction.

use regex::Regex;
use std::sync::LazyLock;

// Pattern classes, tried in this order. A later class is only consulted when
// every earlier class found nothing anywhere in the source.
static BINDING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\bexport\s+)?\b(?:const|let|var)\s+([A-Z][A-Za-z0-9_$]*)\s*[:=]")
        .expect("Invalid binding regex")
});

static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\bexport\s+(?:default\s+)?)?\b(?:async\s+)?function\s*\*?\s*([A-Z][A-Za-z0-9_$]*)")
        .expect("Invalid function regex")
});

static EXPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bexport\s+(?:default\s+([A-Z][A-Za-z0-9_$]*)|\{\s*([A-Z][A-Za-z0-9_$]*))")
        .expect("Invalid export regex")
});

/// Which pattern class produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// `const Name = ...` / `let Name: T = ...`
    Binding,
    /// `function Name(...)`
    Function,
    /// `export default Name` / `export { Name }`
    Export,
}

/// A located component identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentName {
    pub name: String,
    pub kind: MatchKind,
}

/// Find the component identifier and the pattern class that matched.
pub fn find_component_name(source: &str) -> Option<ComponentName> {
    if let Some(cap) = BINDING_RE.captures(source) {
        return Some(ComponentName {
            name: cap[1].to_string(),
            kind: MatchKind::Binding,
        });
    }

    if let Some(cap) = FUNCTION_RE.captures(source) {
        return Some(ComponentName {
            name: cap[1].to_string(),
            kind: MatchKind::Function,
        });
    }

    EXPORT_RE.captures(source).and_then(|cap| {
        cap.get(1)
            .or_else(|| cap.get(2))
            .map(|m| ComponentName {
                name: m.as_str().to_string(),
                kind: MatchKind::Export,
            })
    })
}

/// Extract the exported component name from source text.
pub fn extract_component_name(source: &str) -> Option<String> {
    find_component_name(source).map(|found| found.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_arrow_component() {
        let source = "const Counter = () => <div />;";
        assert_eq!(extract_component_name(source), Some("Counter".to_string()));
    }

    #[test]
    fn extracts_annotated_binding() {
        let source = "export const Card: React.FC<CardProps> = ({ title }) => <h2>{title}</h2>;";
        let found = find_component_name(source).unwrap();
        assert_eq!(found.name, "Card");
        assert_eq!(found.kind, MatchKind::Binding);
    }

    #[test]
    fn extracts_function_declaration() {
        let source = "export default function Dashboard() {\n  return <main />;\n}";
        let found = find_component_name(source).unwrap();
        assert_eq!(found.name, "Dashboard");
        assert_eq!(found.kind, MatchKind::Function);
    }

    #[test]
    fn binding_wins_over_earlier_function() {
        let source = r#"
function Helper() { return null; }

const Panel = () => <Helper />;
"#;
        assert_eq!(extract_component_name(source), Some("Panel".to_string()));
    }

    #[test]
    fn ignores_lowercase_bindings() {
        let source = "const items = [];\nfunction Widget() { return null; }";
        assert_eq!(extract_component_name(source), Some("Widget".to_string()));
    }

    #[test]
    fn falls_back_to_explicit_export() {
        let source = "Stats = wrap(base);\nexport default Stats;";
        let found = find_component_name(source).unwrap();
        assert_eq!(found.name, "Stats");
        assert_eq!(found.kind, MatchKind::Export);

        assert_eq!(
            extract_component_name("export { Toolbar };"),
            Some("Toolbar".to_string())
        );
    }

    #[test]
    fn returns_none_without_candidates() {
        assert_eq!(extract_component_name("<div>hello</div>"), None);
        assert_eq!(extract_component_name("const x = 1;"), None);
        assert_eq!(extract_component_name(""), None);
    }
}
