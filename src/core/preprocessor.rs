//! Pattern preprocessor (§4.1): trailing modifier scan, delimiter strip,
//! and leading `(*NAME)` pragma consumption. Runs once, before the main
//! parser ever sees the pattern body.

use crate::core::errors::ParseErrorKind;
use crate::core::options::{BsrMode, NewlineMode, Options};
use regex::Regex;
use std::sync::OnceLock;

/// Result of preprocessing: the bare body text (delimiters and trailing
/// modifiers stripped, leading pragmas consumed) plus the options they
/// implied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprocessed {
    pub body: String,
    pub options: Options,
}

fn pragma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\(\*([A-Z0-9_]+)\)").unwrap())
}

/// Runs all three preprocessing steps over `input`, in order (§4.1).
pub fn preprocess(input: &str) -> Result<Preprocessed, ParseErrorKind> {
    let mut options = Options::new();

    let close_delim = leading_delimiter(input)?;
    if !has_closing_delimiter(input, close_delim) {
        return Err(ParseErrorKind::NoEndDelimiter);
    }

    let end_of_body = trailing_modifier_scan(input, &mut options)?;
    let before_modifiers = &input[..end_of_body];

    let body = delimiter_strip(before_modifiers)?;
    let body = leading_pragma_scan(body, &mut options);

    Ok(Preprocessed {
        body: body.to_string(),
        options,
    })
}

/// The closing delimiter `input`'s opening character expects, i.e. the
/// mirror of the first non-whitespace character (§4.1.2). Consumes
/// nothing; `delimiter_strip` re-derives the same pair once the body
/// boundary is known.
fn leading_delimiter(input: &str) -> Result<char, ParseErrorKind> {
    let open = input
        .trim_start()
        .chars()
        .next()
        .ok_or(ParseErrorKind::NoEndDelimiter)?;
    if open.is_alphanumeric() || open == '\\' {
        return Err(ParseErrorKind::NoEndDelimiter);
    }
    Ok(mirror(open))
}

/// True if `close` occurs anywhere after the opening delimiter. Checked
/// before the trailing-modifier scan so a genuinely unterminated pattern
/// (e.g. `/abc` with no closing `/`) is reported as a missing delimiter
/// rather than having its trailing letters misread as modifiers and
/// rejected one at a time as unknown.
fn has_closing_delimiter(input: &str, close: char) -> bool {
    input.trim_start().chars().skip(1).any(|c| c == close)
}

/// Step 1 (§4.1.1): scans from the right for trailing modifier letters,
/// tolerating interspersed whitespace, until a non-letter non-whitespace
/// character is reached. Returns the byte index one past the last
/// non-modifier character (the new end-of-body).
fn trailing_modifier_scan(input: &str, options: &mut Options) -> Result<usize, ParseErrorKind> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut i = chars.len();
    while i > 0 {
        let (_, ch) = chars[i - 1];
        if ch.is_whitespace() {
            i -= 1;
            continue;
        }
        if ch.is_ascii_alphabetic() {
            if !options.apply_letter(ch) {
                return Err(ParseErrorKind::UnknownModifier(ch));
            }
            i -= 1;
            continue;
        }
        break;
    }
    Ok(if i == chars.len() {
        input.len()
    } else {
        chars[i].0
    })
}

/// Step 2 (§4.1.2): strips the opening/closing delimiter pair. The body
/// is handed back as a `&str` slice of `input`.
fn delimiter_strip(input: &str) -> Result<&str, ParseErrorKind> {
    let trimmed = input.trim_start();
    let mut chars = trimmed.chars();
    let open = chars.next().ok_or(ParseErrorKind::NoEndDelimiter)?;
    if open.is_alphanumeric() || open == '\\' {
        return Err(ParseErrorKind::NoEndDelimiter);
    }
    let expected_close = mirror(open);

    let rest = chars.as_str();
    let close_idx = rest
        .char_indices()
        .next_back()
        .ok_or(ParseErrorKind::NoEndDelimiter)?
        .0;
    let close = rest[close_idx..].chars().next().unwrap();
    if close != expected_close {
        return Err(ParseErrorKind::NoEndDelimiter);
    }
    Ok(&rest[..close_idx])
}

fn mirror(open: char) -> char {
    match open {
        '[' => ']',
        '(' => ')',
        '{' => '}',
        '<' => '>',
        other => other,
    }
}

/// Step 3 (§4.1.3): repeatedly consumes leading `(*NAME)` sequences that
/// select newline/encoding pragmas. Stops at the first sequence whose
/// name it doesn't recognise, leaving it for the main parser (it may be
/// a backtracking verb like `(*PRUNE)` instead).
fn leading_pragma_scan<'a>(mut body: &'a str, options: &mut Options) -> &'a str {
    loop {
        let Some(m) = pragma_re().captures(body) else {
            break;
        };
        let name = &m[1];
        let recognised = match name {
            "UTF8" => {
                options.utf8 = true;
                true
            }
            "BSR_UNICODE" => {
                options.bsr = BsrMode::Unicode;
                true
            }
            "BSR_ANYCRLF" => {
                options.bsr = BsrMode::AnyCrlf;
                true
            }
            "CR" => {
                options.newline = NewlineMode::Cr;
                true
            }
            "LF" => {
                options.newline = NewlineMode::Lf;
                true
            }
            "CRLF" => {
                options.newline = NewlineMode::Crlf;
                true
            }
            "ANYCRLF" => {
                options.newline = NewlineMode::AnyCrlf;
                true
            }
            "ANY" => {
                options.newline = NewlineMode::Any;
                true
            }
            _ => false,
        };
        if !recognised {
            break;
        }
        body = &body[m.get(0).unwrap().end()..];
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_slash_delimiters_and_trailing_i() {
        let p = preprocess("/abc/i").unwrap();
        assert_eq!(p.body, "abc");
        assert!(p.options.ignore_case);
    }

    #[test]
    fn bracket_mirrors_are_accepted() {
        let p = preprocess("{abc}").unwrap();
        assert_eq!(p.body, "abc");
    }

    #[test]
    fn unknown_modifier_errors() {
        let err = preprocess("/abc/q").unwrap_err();
        assert_eq!(err, ParseErrorKind::UnknownModifier('q'));
    }

    #[test]
    fn leading_pragma_sets_newline_mode() {
        let p = preprocess("/(*CRLF)^a/").unwrap();
        assert_eq!(p.body, "^a");
        assert_eq!(p.options.newline, NewlineMode::Crlf);
    }

    #[test]
    fn unknown_leading_pragma_left_for_main_parser() {
        let p = preprocess("/(*PRUNE)a/").unwrap();
        assert_eq!(p.body, "(*PRUNE)a");
    }

    #[test]
    fn no_end_delimiter_when_open_has_no_close() {
        assert_eq!(preprocess("/abc").unwrap_err(), ParseErrorKind::NoEndDelimiter);
    }

    #[test]
    fn trailing_letters_that_look_like_modifiers_still_report_missing_delimiter() {
        // "/imsx" has no closing "/" at all; every trailing letter happens
        // to be a recognised modifier, so a scan that doesn't check for
        // the delimiter first would accept it instead of rejecting it.
        assert_eq!(preprocess("/imsx").unwrap_err(), ParseErrorKind::NoEndDelimiter);
    }

    #[test]
    fn alphanumeric_opening_delimiter_rejected() {
        assert_eq!(preprocess("aabca").unwrap_err(), ParseErrorKind::NoEndDelimiter);
    }
}
