//! Syntax diagnostics for normalized output.

use oxc_allocator::Allocator;
use oxc_parser::Parser;
use oxc_span::SourceType;

/// Parse normalized source as plain JSX and report what the parser rejects.
///
/// Anything reported here is type syntax the normalizer left behind (or a
/// genuine error in the generated code); the compiler would reject it too.
pub fn syntax_errors(source: &str) -> Vec<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::jsx()).parse();

    ret.errors.iter().map(|e| e.to_string()).collect()
}

/// Whether normalized source parses cleanly as JSX.
pub fn is_valid_jsx(source: &str) -> bool {
    syntax_errors(source).is_empty()
}
