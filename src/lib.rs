//! `pcre_regex_core` (a PCRE-compatible regex front end).
//!
//! This crate implements the *front end* of a PCRE-compatible regular
//! expression engine: a pattern parser, its AST, a UTF-8→UTF-16 byte-range
//! transformer, and a bytecode writer producing a linear opcode program for
//! a backtracking virtual machine. It deliberately stops there: the
//! matcher that executes the program, the user-facing `Regex` facade, and
//! locale/culture tables are all out of scope (see `core::writer` and
//! `SPEC_FULL.md`).
//!
//! ```text
//! pattern text
//!   -> core::preprocessor   (delimiters, trailing modifiers, (*PRAGMA)s)
//!   -> core::parser         (recursive-descent parse into RegexNode)
//!   -> core::utf16          (optional UTF-8 byte-range canonicalisation)
//!   -> core::writer         (RegexNode -> RegexCode bytecode)
//!   -> core::validator      (bytecode well-formedness check)
//! ```
//!
//! # Modules
//!
//! - [`core::options`] / [`core::nodes`] / [`core::charclass`]: shared
//!   value types threaded through every stage.
//! - [`core::errors`] / [`core::hint_engine`]: the closed parse-error sum
//!   and its diagnostic hints.
//! - [`core::capture`]: capture-slot and branch-reset bookkeeping.
//! - [`core::preprocessor`] / [`core::parser`]: turn pattern text into a
//!   `RegexNode` tree plus the `Options` it implied.
//! - [`core::utf16`]: the UTF-8→UTF-16 tree-rewrite pass.
//! - [`core::writer`]: `RegexNode` → `RegexCode` bytecode emission.
//! - [`core::escape`] / [`core::replacement`]: the surrounding text
//!   utilities (escaping, the replacement minilanguage).
//! - [`core::validator`]: bytecode well-formedness checks.

pub mod core;

pub use crate::core::errors::{ParseError, ParseErrorKind};
pub use crate::core::nodes::{NodeFlags, RegexNode, Verb};
pub use crate::core::options::{BsrMode, NewlineMode, Options};
pub use crate::core::parser::Parser;
pub use crate::core::preprocessor::{preprocess, Preprocessed};
pub use crate::core::writer::{write, Inst, RegexCode};

/// Parses a delimited PCRE pattern string (e.g. `"/foo.*bar/i"`) all the
/// way to a bytecode program: preprocess, parse, transform, write. This is
/// the one-call convenience path the CLI and tests use; callers who need
/// the intermediate AST should drive `core::preprocessor`/`core::parser`
/// directly instead.
pub fn compile(pattern: &str) -> Result<RegexCode, ParseError> {
    let preprocessed = preprocess(pattern).map_err(|kind| ParseError::new(kind, 0, pattern))?;
    let parser = Parser::new(&preprocessed.body, preprocessed.options)?;
    let (tree, captures) = parser.parse()?;
    let tree = crate::core::utf16::transform(&tree);
    Ok(write(&tree, &captures, &preprocessed.options))
}
