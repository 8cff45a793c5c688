//! TSX to executable-JSX normalization.
//!
//! A fixed sequence of textual rewrites. None of them parses a grammar and
//! the order matters: later passes assume earlier ones already removed
//! imports, declarations and generic parameter lists.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::fence::strip_fences;
use crate::scan::{
    generic_args_end, matching_paren, matching_paren_backward, outside_literals,
    strip_parameter_types,
};

/// Normalize generated TSX source into plain JSX.
///
/// Always returns a string. Whether the result is valid only shows up later,
/// when it is compiled. The passes that would otherwise match ordinary prose
/// (`as`, `!`, `): `, `let x: `) run with strings and JSX text hidden.
pub fn normalize(source: &str) -> String {
    let text = strip_fences(source);
    let text = remove_imports(&text);
    let text = remove_interfaces(&text);
    let text = remove_type_aliases(&text);
    let text = strip_export_qualifiers(&text);
    let text = strip_component_type_idioms(&text);
    let text = strip_generic_parameters(&text);
    let text = outside_literals(&text, strip_return_types);
    let text = strip_parameter_annotations(&text);
    let text = outside_literals(&text, strip_type_assertions);
    let text = outside_literals(&text, strip_variable_annotations);
    let text = strip_hook_generics(&text);
    collapse_blank_lines(&text)
}

// Imports

static TYPE_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s+type\s[^;'"]*?\bfrom\s*['"][^'"\n]+['"][ \t]*;?[ \t]*(?:\r?\n|\z)"#)
        .expect("Invalid type import regex")
});

static NAMED_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s+[^;'"]*?\bfrom\s*['"][^'"\n]+['"][ \t]*;?[ \t]*(?:\r?\n|\z)"#)
        .expect("Invalid named import regex")
});

static SIDE_EFFECT_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s*['"][^'"\n]+['"][ \t]*;?[ \t]*(?:\r?\n|\z)"#)
        .expect("Invalid side-effect import regex")
});

fn remove_imports(text: &str) -> String {
    let text = TYPE_IMPORT_RE.replace_all(text, "");
    let text = NAMED_IMPORT_RE.replace_all(&text, "");
    SIDE_EFFECT_IMPORT_RE.replace_all(&text, "").into_owned()
}

// Interfaces

static INTERFACE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:export\s+(?:default\s+)?)?(?:declare\s+)?interface\s+[A-Za-z_$][\w$]*[^{\n]*\{[^\n]*\}[ \t]*;?[ \t]*(?:\r?\n|\z)",
    )
    .expect("Invalid single-line interface regex")
});

// Ends at the first line holding only `}`. A nested member body closed on a
// line of its own ends the match early.
static INTERFACE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ms)^[ \t]*(?:export\s+(?:default\s+)?)?(?:declare\s+)?interface\s+[A-Za-z_$][\w$]*[^{\n]*\{[ \t]*\r?\n.*?^[ \t]*\}[ \t]*;?[ \t]*(?:\r?\n|\z)",
    )
    .expect("Invalid interface block regex")
});

fn remove_interfaces(text: &str) -> String {
    let text = INTERFACE_LINE_RE.replace_all(text, "");
    INTERFACE_BLOCK_RE.replace_all(&text, "").into_owned()
}

// Type aliases

static TYPE_ALIAS_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ms)^[ \t]*(?:export\s+)?(?:declare\s+)?type\s+[A-Za-z_$][\w$]*(?:<[^\n]*?>)?[ \t]*=[ \t]*\{[ \t]*\r?\n.*?^[ \t]*\}[^\n]*(?:\r?\n|\z)",
    )
    .expect("Invalid type alias block regex")
});

static TYPE_ALIAS_UNION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:export\s+)?(?:declare\s+)?type\s+[A-Za-z_$][\w$]*(?:<[^\n]*?>)?[ \t]*=[ \t]*\r?\n(?:[ \t]*[|&][^\n]*(?:\r?\n|\z))+",
    )
    .expect("Invalid union type alias regex")
});

static TYPE_ALIAS_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:export\s+)?(?:declare\s+)?type\s+[A-Za-z_$][\w$]*(?:<[^\n]*?>)?[ \t]*=[ \t]*(?:[^\s{][^\n]*|\{[^\n]*\}[^\n]*)(?:\r?\n|\z)(?:[ \t]*[|&][^\n]*(?:\r?\n|\z))*",
    )
    .expect("Invalid type alias regex")
});

fn remove_type_aliases(text: &str) -> String {
    let text = TYPE_ALIAS_BLOCK_RE.replace_all(text, "");
    let text = TYPE_ALIAS_UNION_RE.replace_all(&text, "");
    TYPE_ALIAS_LINE_RE.replace_all(&text, "").into_owned()
}

// Exports

static EXPORT_DEFAULT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*export\s+default\s+[A-Za-z_$][\w$]*[ \t]*;?[ \t]*(?:\r?\n|\z)")
        .expect("Invalid default export regex")
});

static EXPORT_LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*export\s*(?:type\s*)?\{[^}]*\}(?:\s*from\s*['"][^'"\n]*['"])?[ \t]*;?[ \t]*(?:\r?\n|\z)"#,
    )
    .expect("Invalid export list regex")
});

static EXPORT_QUALIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([ \t]*)export\s+(?:default\s+)?").expect("Invalid export qualifier regex")
});

fn strip_export_qualifiers(text: &str) -> String {
    let text = EXPORT_DEFAULT_NAME_RE.replace_all(text, "");
    let text = EXPORT_LIST_RE.replace_all(&text, "");
    EXPORT_QUALIFIER_RE.replace_all(&text, "$1").into_owned()
}

// Component typing idioms: `const Card: React.FC<CardProps> = ...`

static COMPONENT_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b((?:const|let|var)\s+[A-Z][\w$]*)\s*:\s*(?:React\s*\.\s*)?(?:FC|FunctionComponent|VFC|VoidFunctionComponent|SFC|ComponentType|ElementType|NamedExoticComponent|ForwardRefExoticComponent|MemoExoticComponent)\b(?:\s*<[^\n]*?>)?\s*=",
    )
    .expect("Invalid component type regex")
});

fn strip_component_type_idioms(text: &str) -> String {
    COMPONENT_TYPE_RE.replace_all(text, "$1 =").into_owned()
}

// Generic parameter lists before `(`

static FUNCTION_GENERIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\bfunction\s*\*?\s*[A-Za-z_$][\w$]*)\s*<[^<>()\n]*(?:<[^<>()\n]*>[^<>()\n]*)*>\s*\(",
    )
    .expect("Invalid function generic regex")
});

// In TSX a generic arrow has to be written `<T,>` or `<T extends X>`; a bare
// `<T>` would be an element, so those two shapes are all that is matched.
static ARROW_GENERIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"([=(,:?]\s*(?:async\s+)?)<\s*[A-Za-z_$][\w$]*\s*(?:,[^<>()\n]*|\s+extends\s+[^<>()\n]*(?:<[^<>()\n]*>[^<>()\n]*)*)>\s*\(",
    )
    .expect("Invalid arrow generic regex")
});

fn strip_generic_parameters(text: &str) -> String {
    let text = FUNCTION_GENERIC_RE.replace_all(text, "$1(");
    ARROW_GENERIC_RE.replace_all(&text, "${1}(").into_owned()
}

// Return types, only directly before `=>` or `{`

static RETURN_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\)[ \t]*:[ \t]*[A-Za-z_$'"][^=;{}()\n]*?[ \t]*(=>|\{)"#)
        .expect("Invalid return type regex")
});

fn strip_return_types(text: &str) -> String {
    RETURN_TYPE_RE.replace_all(text, ") $1").into_owned()
}

// Parameter annotations

static ARROW_PARAMS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\)\s*=>").expect("Invalid arrow params regex"));

static FUNCTION_PARAMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bfunction\s*\*?\s*(?:[A-Za-z_$][\w$]*)?\s*\(").expect("Invalid function params regex")
});

static HOOK_CALLBACK_PARAMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:useState|useReducer|useMemo|useCallback|useEffect|useLayoutEffect)\s*\(\s*(?:async\s*)?(?:function\s*)?\(",
    )
    .expect("Invalid hook callback params regex")
});

/// A pending rewrite of the text between a pair of parens.
struct ParamEdit {
    open: usize,
    close: usize,
    replacement: String,
}

fn param_edit(text: &str, open: usize, close: usize) -> Option<ParamEdit> {
    let replacement = strip_parameter_types(&text[open + 1..close])?;
    Some(ParamEdit {
        open,
        close,
        replacement,
    })
}

fn strip_parameter_annotations(text: &str) -> String {
    let mut edits = Vec::new();

    for m in ARROW_PARAMS_RE.find_iter(text) {
        let close = m.start();
        if let Some(open) = matching_paren_backward(text, close) {
            edits.extend(param_edit(text, open, close));
        }
    }

    for m in FUNCTION_PARAMS_RE
        .find_iter(text)
        .chain(HOOK_CALLBACK_PARAMS_RE.find_iter(text))
    {
        let open = m.end() - 1;
        if let Some(close) = matching_paren(text, open) {
            edits.extend(param_edit(text, open, close));
        }
    }

    if edits.is_empty() {
        return text.to_string();
    }

    // Outer lists first; anything nested in an accepted edit was rewritten with it.
    edits.sort_by(|a, b| a.open.cmp(&b.open).then(b.close.cmp(&a.close)));

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for edit in edits {
        if edit.open < cursor {
            continue;
        }
        out.push_str(&text[cursor..=edit.open]);
        out.push_str(&edit.replacement);
        cursor = edit.close;
    }
    out.push_str(&text[cursor..]);
    out
}

// Assertions

static AS_CONST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+as\s+const\b").expect("Invalid as-const regex"));

static AS_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"([\w$)\]}])\s+(?:as|satisfies)\s+[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*(?:<[^;\n]*?>)?(?:\[\])*(?:\s*\|\s*[A-Za-z_$][\w$]*(?:\[\])*)*([ \t]*[)\];,}])",
    )
    .expect("Invalid type assertion regex")
});

static NON_NULL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\w$)\]])!([.\[])").expect("Invalid non-null regex"));

fn strip_type_assertions(text: &str) -> String {
    let mut current = AS_CONST_RE.replace_all(text, "").into_owned();

    // `x as unknown as T` unwinds one assertion per pass.
    loop {
        let next = AS_TYPE_RE.replace_all(&current, "$1$2");
        if next == current {
            break;
        }
        current = next.into_owned();
    }

    NON_NULL_RE.replace_all(&current, "$1$2").into_owned()
}

// Variable annotations

static VAR_ANNOTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(const|let|var)(\s+(?:[A-Za-z_$][\w$]*|\{[^{}]*\}|\[[^\[\]]*\]))\s*:\s*(?:[^=;\n]|=>)+?\s*=([^=>])",
    )
    .expect("Invalid variable annotation regex")
});

static UNINITIALIZED_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(let|var)(\s+[A-Za-z_$][\w$]*)\s*:\s*[^=;\n]+;").expect("Invalid declaration regex")
});

fn strip_variable_annotations(text: &str) -> String {
    let text = VAR_ANNOTATION_RE.replace_all(text, |caps: &Captures| {
        format!("{}{} ={}", &caps[1], &caps[2], &caps[3])
    });
    UNINITIALIZED_VAR_RE.replace_all(&text, "$1$2;").into_owned()
}

// Generic arguments on built-in hooks: `useState<Record<string, Item[]>>(...)`

static HOOK_GENERIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:useState|useRef|useMemo|useCallback|useReducer|useContext|createContext|forwardRef|memo)\s*<",
    )
    .expect("Invalid hook generic regex")
});

fn strip_hook_generics(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for m in HOOK_GENERIC_RE.find_iter(text) {
        if m.start() < cursor {
            continue;
        }
        let open = m.end() - 1;
        let Some(end) = generic_args_end(text, open) else {
            continue;
        };
        if !text[end..].trim_start().starts_with('(') {
            continue;
        }

        let name_end = text[..open].trim_end().len();
        out.push_str(&text[cursor..name_end]);
        cursor = end;
    }

    out.push_str(&text[cursor..]);
    out
}

// Blank lines

static BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\r?\n){3,}").expect("Invalid blank lines regex"));

fn collapse_blank_lines(text: &str) -> String {
    BLANK_LINES_RE.replace_all(text, "\n\n\n").trim().to_string()
}
