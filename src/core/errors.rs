//! Parse error types.
//!
//! Errors are a closed sum of kinds (§4.3.6/§7): the parser never
//! retries, it aborts at the first offending character and surfaces
//! `(offset, kind)`. `ParseErrorKind` is the closed sum, expressed with
//! `thiserror` the way the rest of this crate's ambient stack favors
//! library-backed idioms over hand-rolled `Display` impls (the teacher's
//! own `Cargo.toml` already depends on `thiserror`, though its
//! hand-written `errors.rs` didn't use it, this repo does). `ParseError`
//! wraps a `kind` with the `offset` and original `pattern` text needed to
//! render a human-readable, line/column-located message and an
//! LSP-`Diagnostic`-shaped JSON value, both kept close to the teacher's
//! `STRlingParseError::format_error`/`to_lsp_diagnostic`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of ways a pattern can fail to parse (§4.3.6).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ParseErrorKind {
    #[error("unknown modifier '{0}'")]
    UnknownModifier(char),
    #[error("no end delimiter")]
    NoEndDelimiter,
    #[error("empty regex")]
    EmptyRegex,
    #[error("too many parentheses")]
    TooManyParens,
    #[error("not enough parentheses")]
    NotEnoughParens,
    #[error("illegal escape at end of pattern")]
    IllegalEscapeAtEnd,
    #[error("illegal {{m,n}} range: min greater than max")]
    IllegalRange,
    #[error("reversed range in character class")]
    ReversedClassRange,
    #[error("unterminated character class")]
    UnterminatedBracket,
    #[error("unterminated comment")]
    UnterminatedComment,
    #[error("unrecognised grouping construct")]
    UnrecognisedGrouping,
    #[error("reference to undefined group")]
    UndefinedBackreference,
    #[error("reference to undefined subroutine")]
    UndefinedSubroutine,
    #[error("reference to undefined named group")]
    UndefinedNamedReference,
    #[error("malformed named reference")]
    MalformedNamedReference,
    #[error("duplicate group name")]
    DuplicateName,
    #[error("different names refer to the same capture slot")]
    NameSlotCollision,
    #[error("capture group zero cannot be referenced")]
    GroupZeroReference,
    #[error("capture number out of range")]
    CaptureNumberOutOfRange,
    #[error("nothing to quantify")]
    NothingToQuantify,
    #[error("nested quantifier")]
    NestedQuantifier,
    #[error("too many alternatives in conditional group")]
    TooManyConditionalAlternatives,
    #[error("(?(DEFINE)...) may only contain a single branch")]
    DefineGroupMultipleBranches,
    #[error("missing control character after \\c")]
    MissingControlChar,
    #[error("too few hex digits")]
    TooFewHexDigits,
    #[error("incomplete \\p{{...}} property name")]
    IncompletePropertyName,
    #[error("unknown backtracking verb")]
    UnknownVerb,
    #[error("unrecognised escape sequence")]
    UnrecognisedEscape,
    #[error("internal error: {0}")]
    Internal(String),
}

/// A parse failure: its kind, the byte/code-point offset into the raw
/// user pattern where it was detected, and the preprocessed body text
/// (so the offset can be located without re-threading the original
/// string through every call site).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
    pub pattern: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, offset: usize, pattern: impl Into<String>) -> Self {
        ParseError {
            kind,
            offset,
            pattern: pattern.into(),
        }
    }

    /// A human-readable, multi-line rendering with a caret under the
    /// offending position and an instructional hint, in the shape of the
    /// teacher's `STRlingParseError::format_error`.
    pub fn render(&self) -> String {
        let message = self.kind.to_string();
        if self.pattern.is_empty() {
            return format!("{} at position {}", message, self.offset);
        }

        let mut parts = vec![
            format!("Parse error: {}", message),
            String::new(),
            format!("> {}", self.pattern),
            format!(">  {}^", " ".repeat(self.offset)),
        ];

        if let Some(hint) = crate::core::hint_engine::get_hint(&self.kind) {
            parts.push(String::new());
            parts.push(format!("Hint: {}", hint));
        }

        parts.join("\n")
    }

    /// Convert to an LSP `Diagnostic`-shaped JSON value.
    pub fn to_lsp_diagnostic(&self) -> serde_json::Value {
        let mut message = self.kind.to_string();
        if let Some(hint) = crate::core::hint_engine::get_hint(&self.kind) {
            message.push_str("\n\nHint: ");
            message.push_str(&hint);
        }

        serde_json::json!({
            "range": {
                "start": {"line": 0, "character": self.offset},
                "end": {"line": 0, "character": self.offset + 1},
            },
            "severity": 1,
            "message": message,
            "source": "pcre-regex-core",
        })
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at offset {})", self.kind, self.offset)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_caret() {
        let err = ParseError::new(ParseErrorKind::UnterminatedBracket, 3, "ab[cd");
        let rendered = err.render();
        assert!(rendered.contains("unterminated character class"));
        assert!(rendered.contains('^'));
    }

    #[test]
    fn lsp_diagnostic_has_expected_shape() {
        let err = ParseError::new(ParseErrorKind::EmptyRegex, 0, "");
        let diag = err.to_lsp_diagnostic();
        assert_eq!(diag["severity"], 1);
        assert_eq!(diag["source"], "pcre-regex-core");
    }
}
