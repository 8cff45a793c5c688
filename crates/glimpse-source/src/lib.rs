//! Source handling for generated component code.
//!
//! Finds the component identifier in raw TSX and rewrites the source into
//! plain JSX a compiler can take, leaving markup untouched.

pub mod fence;
pub mod identifier;
pub mod normalize;
pub mod response;
mod scan;
pub mod syntax;

pub use fence::{strip_fences, Dialect};
pub use identifier::{extract_component_name, find_component_name, ComponentName, MatchKind};
pub use normalize::normalize;
pub use response::{code_blocks, unwrap_response, ResponseBlock};
pub use syntax::{is_valid_jsx, syntax_errors};
