//! Unwrapping component source from markdown-formatted generator responses.

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};

use crate::fence::Dialect;

/// A fenced code block found in a generator response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseBlock {
    /// Dialect named by the fence info string
    pub dialect: Dialect,

    /// Block body, without the fences
    pub source: String,

    /// Optional filename hint (`tsx filename="Card.tsx"`)
    pub filename: Option<String>,
}

/// Collect every fenced code block in a markdown response.
///
/// Indented blocks are ignored: plain source text often has indented lines
/// that markdown would otherwise read as code.
pub fn code_blocks(response: &str) -> Vec<ResponseBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, String)> = None; // (info, body)

    for event in Parser::new(response) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                current = Some((info.to_string(), String::new()));
            }
            Event::Text(text) => {
                if let Some((_, ref mut body)) = current {
                    body.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((info, body)) = current.take() {
                    blocks.push(ResponseBlock {
                        dialect: Dialect::from_info(&info),
                        source: body,
                        filename: extract_filename(&info),
                    });
                }
            }
            _ => {}
        }
    }

    blocks
}

/// Pick the component source out of a generator response.
///
/// Prefers the first block in a script dialect, then the first fenced block
/// of any kind, and returns the response unchanged when it has no fences.
pub fn unwrap_response(response: &str) -> String {
    if !response.contains("```") && !response.contains("~~~") {
        return response.to_string();
    }

    let blocks = code_blocks(response);
    blocks
        .iter()
        .find(|b| b.dialect.is_component_source())
        .or_else(|| blocks.first())
        .map(|b| b.source.clone())
        .unwrap_or_else(|| response.to_string())
}

/// Extract a filename from a fence info string.
///
/// Supports `tsx filename="Card.tsx"` and `tsx file=Card.tsx`.
fn extract_filename(info: &str) -> Option<String> {
    if let Some(start) = info.find("filename=\"") {
        let rest = &info[start + 10..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }

    if let Some(start) = info.find("file=") {
        let rest = &info[start + 5..];
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let filename = rest[..end].trim_matches('"');
        if !filename.is_empty() {
            return Some(filename.to_string());
        }
    }

    None
}
