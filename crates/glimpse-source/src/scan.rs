//! Delimiter-aware scanning helpers used by the normalizer.
//!
//! The bracket helpers balance brackets and split at top-level commas,
//! nothing more. They do not track strings, which is why callers refuse to
//! touch text that contains quotes. [`literal_spans`] is a small lexer for
//! the other direction: it finds string contents and JSX text so that
//! rewrites aimed at code can be run with those spans hidden.

use std::ops::Range;

/// Index of the `)` matching the `(` at `open`.
pub(crate) fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }

    let mut depth = 0usize;
    for (offset, &b) in bytes[open..].iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Index of the `(` matching the `)` at `close`, scanning backwards.
pub(crate) fn matching_paren_backward(text: &str, close: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(close) != Some(&b')') {
        return None;
    }

    let mut depth = 0usize;
    for idx in (0..=close).rev() {
        match bytes[idx] {
            b')' => depth += 1,
            b'(' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// End index (exclusive) of the generic argument list opened by the `<` at `open`.
///
/// Arrow tokens (`=>`) inside function types do not close the list. Gives up
/// at a statement terminator so an unbalanced comparison is never consumed.
pub(crate) fn generic_args_end(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'<') {
        return None;
    }

    let mut depth = 0usize;
    for idx in open..bytes.len() {
        match bytes[idx] {
            b'<' => depth += 1,
            b'>' if idx > 0 && bytes[idx - 1] == b'=' => {}
            b'>' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            b';' => return None,
            _ => {}
        }
    }
    None
}

/// Quotes and angle brackets mean the text is markup or a string, not a parameter list.
pub(crate) fn looks_like_markup(params: &str) -> bool {
    params
        .replace("=>", "")
        .contains(['\'', '"', '`', '<', '>'])
}

/// Split at commas that are not nested inside brackets.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Position of the first top-level `:` or default-value `=` in a parameter.
fn first_top_level_marker(param: &str) -> Option<(usize, char)> {
    let bytes = param.as_bytes();
    let mut depth = 0i32;

    for (idx, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b':' if depth == 0 => return Some((idx, ':')),
            b'=' if depth == 0 && bytes.get(idx + 1) != Some(&b'>') => return Some((idx, '=')),
            _ => {}
        }
    }
    None
}

/// Position of the default-value `=` that ends an annotation.
fn default_value_start(annotation: &str) -> Option<usize> {
    let bytes = annotation.as_bytes();
    let mut depth = 0i32;

    for (idx, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'=' if depth == 0 && bytes.get(idx + 1) != Some(&b'>') => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Strip the annotation from one parameter, or `None` when it has none.
fn strip_annotation(param: &str) -> Option<String> {
    let (colon, marker) = first_top_level_marker(param)?;
    if marker != ':' {
        return None;
    }

    let binding = param[..colon].trim_end().trim_end_matches('?').trim_end();
    let annotation = &param[colon + 1..];

    let mut out = binding.to_string();
    match default_value_start(annotation) {
        Some(eq) => {
            out.push(' ');
            out.push_str(annotation[eq..].trim_start());
        }
        None => {
            let trailing = &param[param.trim_end().len()..];
            out.push_str(trailing);
        }
    }
    Some(out)
}

/// Remove type annotations from a parameter list body (the text between the parens).
///
/// Returns `None` when nothing changed or the text looks like markup.
pub(crate) fn strip_parameter_types(params: &str) -> Option<String> {
    if looks_like_markup(params) {
        return None;
    }

    let mut changed = false;
    let mut out = String::with_capacity(params.len());

    for (idx, part) in split_top_level(params).into_iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        match strip_annotation(part) {
            Some(stripped) => {
                changed = true;
                out.push_str(&stripped);
            }
            None => out.push_str(part),
        }
    }

    changed.then_some(out)
}

/// Placeholder delimiters for hidden spans. Private-use characters, so no
/// rewrite pattern treats them as identifier or punctuation.
const HIDE_OPEN: char = '\u{E000}';
const HIDE_CLOSE: char = '\u{E001}';

#[derive(Debug, Clone, Copy)]
enum Mode {
    /// Script code, counting `{` opened at this level
    Code(usize),
    /// Inside `<tag ...>` or `</tag>`
    Tag { closing: bool },
    /// Between an opening and a closing tag
    Children,
}

/// Byte ranges holding string literal contents and JSX text.
///
/// Quotes stay outside the ranges. Expression containers (`{...}`) inside
/// markup are scanned as code again. Apostrophes in JSX text are text.
pub(crate) fn literal_spans(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut stack = vec![Mode::Code(0)];
    let mut text_start: Option<usize> = None;
    let mut idx = 0;

    while idx < bytes.len() {
        let top = stack.len() - 1;
        let mode = stack[top];
        let b = bytes[idx];

        match mode {
            Mode::Code(braces) => match b {
                b'\'' | b'"' | b'`' => {
                    let end = string_end(bytes, idx);
                    spans.push(idx + 1..end);
                    idx = end + 1;
                    continue;
                }
                b'/' if bytes.get(idx + 1) == Some(&b'/') => {
                    idx = bytes[idx..]
                        .iter()
                        .position(|&c| c == b'\n')
                        .map_or(bytes.len(), |p| idx + p);
                    continue;
                }
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    idx = text[idx + 2..]
                        .find("*/")
                        .map_or(bytes.len(), |p| idx + 2 + p + 2);
                    continue;
                }
                b'{' => stack[top] = Mode::Code(braces + 1),
                b'}' if braces > 0 => stack[top] = Mode::Code(braces - 1),
                b'}' if top > 0 => {
                    stack.pop();
                }
                b'<' if opens_element(bytes, idx) => stack.push(Mode::Tag { closing: false }),
                _ => {}
            },
            Mode::Tag { closing } => match b {
                b'\'' | b'"' => {
                    let end = string_end(bytes, idx);
                    spans.push(idx + 1..end);
                    idx = end + 1;
                    continue;
                }
                b'{' => stack.push(Mode::Code(0)),
                b'/' if bytes.get(idx + 1) == Some(&b'>') => {
                    stack.pop();
                    idx += 2;
                    continue;
                }
                b'>' => {
                    stack.pop();
                    if !closing {
                        stack.push(Mode::Children);
                    }
                }
                _ => {}
            },
            Mode::Children => match b {
                b'{' | b'<' => {
                    if let Some(start) = text_start.take() {
                        push_text(text, &mut spans, start..idx);
                    }
                    if b == b'{' {
                        stack.push(Mode::Code(0));
                    } else if bytes.get(idx + 1) == Some(&b'/') {
                        stack.pop();
                        stack.push(Mode::Tag { closing: true });
                        idx += 2;
                        continue;
                    } else {
                        stack.push(Mode::Tag { closing: false });
                    }
                }
                _ => {
                    text_start.get_or_insert(idx);
                }
            },
        }
        idx += 1;
    }

    if let Some(start) = text_start {
        push_text(text, &mut spans, start..bytes.len());
    }
    spans.retain(|span| !span.is_empty());
    spans
}

fn push_text(text: &str, spans: &mut Vec<Range<usize>>, span: Range<usize>) {
    if !text[span.clone()].trim().is_empty() {
        spans.push(span);
    }
}

/// Index of the quote closing the string opened at `open`, or of the line
/// end for an unterminated single-line string.
fn string_end(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    let mut idx = open + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 1,
            b'\n' if quote != b'`' => return idx,
            c if c == quote => return idx,
            _ => {}
        }
        idx += 1;
    }
    bytes.len()
}

/// Whether the `<` at `idx` starts an element rather than a comparison or
/// a type argument list.
fn opens_element(bytes: &[u8], idx: usize) -> bool {
    if !matches!(bytes.get(idx + 1), Some(c) if c.is_ascii_alphabetic() || *c == b'>') {
        return false;
    }

    let before = bytes[..idx].trim_ascii_end();
    match before.last() {
        None => true,
        Some(b')' | b']') => false,
        Some(&c) if c.is_ascii_alphanumeric() || c == b'_' || c == b'$' => {
            let word_start = before
                .iter()
                .rposition(|&c| !(c.is_ascii_alphanumeric() || c == b'_' || c == b'$'))
                .map_or(0, |p| p + 1);
            matches!(
                &before[word_start..],
                b"return" | b"yield" | b"await" | b"default" | b"case"
            )
        }
        Some(_) => true,
    }
}

/// Text with its string contents and JSX text replaced by placeholders.
pub(crate) struct Masked {
    text: String,
    hidden: Vec<String>,
}

impl Masked {
    pub(crate) fn new(text: &str) -> Self {
        let mut masked = String::with_capacity(text.len());
        let mut hidden = Vec::new();
        let mut cursor = 0;

        for span in literal_spans(text) {
            let original = &text[span.clone()];
            masked.push_str(&text[cursor..span.start]);
            masked.push(HIDE_OPEN);
            masked.push_str(&hidden.len().to_string());
            // Keep line structure for patterns that stop at line ends.
            for _ in 0..original.matches('\n').count() {
                masked.push('\n');
            }
            masked.push(HIDE_CLOSE);
            hidden.push(original.to_string());
            cursor = span.end;
        }
        masked.push_str(&text[cursor..]);

        Self {
            text: masked,
            hidden,
        }
    }

    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    /// Put the hidden spans back into a rewritten copy of [`text`](Self::text).
    pub(crate) fn restore(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(HIDE_OPEN) {
            out.push_str(&rest[..start]);
            let after = &rest[start + HIDE_OPEN.len_utf8()..];
            let Some(end) = after.find(HIDE_CLOSE) else {
                out.push_str(&rest[start..]);
                return out;
            };

            let index: Option<usize> = after[..end].trim_end_matches('\n').parse().ok();
            match index.and_then(|i| self.hidden.get(i)) {
                Some(original) => out.push_str(original),
                None => out.push_str(&rest[start..start + HIDE_OPEN.len_utf8() + end + HIDE_CLOSE.len_utf8()]),
            }
            rest = &after[end + HIDE_CLOSE.len_utf8()..];
        }

        out.push_str(rest);
        out
    }
}

/// Apply `rewrite` to the code in `text`, leaving strings and JSX text as they were.
pub(crate) fn outside_literals(text: &str, rewrite: impl FnOnce(&str) -> String) -> String {
    if text.contains([HIDE_OPEN, HIDE_CLOSE]) {
        return rewrite(text);
    }
    let masked = Masked::new(text);
    masked.restore(&rewrite(masked.text()))
}
