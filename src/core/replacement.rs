//! Replacement minilanguage (§6): parses a substitution template into a
//! sequence of literal runs and back-reference substitutions, the way a
//! `s/pattern/replacement/` construct's right-hand side is interpreted.
//!
//! Per the module inventory, this reuses the main parser's digit/name
//! scanning shape (`parser::parse`'s numeric-vs-named disambiguation for
//! `\k<name>`/`\g{name}`) rather than inventing a second grammar: `$N`/
//! `\N` read a run of digits the same way a backreference does, and
//! `${name}` is looked up against the same `CaptureState` the pattern
//! itself populated.

use crate::core::capture::CaptureState;
use crate::core::errors::ParseErrorKind;
use crate::core::options::Options;

/// One piece of a parsed replacement template.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplacementPart {
    Literal(String),
    /// `$&`: the whole match.
    WholeMatch,
    /// `` $` ``: text before the match.
    LeftContext,
    /// `$'`: text after the match.
    RightContext,
    /// `$+`: the last group that participated.
    LastGroup,
    /// `$_`: the whole input string.
    WholeInput,
    /// `$N` / `\N`: numbered capture group.
    Group(i32),
    /// `${name}`: named capture group.
    NamedGroup(String),
}

/// A parsed replacement template, ready to be rendered against a match.
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    pub parts: Vec<ReplacementPart>,
    pub right_to_left: bool,
}

/// Parses `raw` into a `Replacement`. `captures` resolves `${name}`
/// references against the slots the pattern itself assigned; an unknown
/// name is a `UndefinedNamedReference` error rather than being left as a
/// literal, the same treatment a pattern body gives an unknown `\k<name>`.
pub fn parse_replacement(
    raw: &str,
    options: &Options,
    captures: &CaptureState,
) -> Result<Replacement, ParseErrorKind> {
    let chars: Vec<char> = raw.chars().collect();
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    macro_rules! flush_literal {
        () => {
            if !literal.is_empty() {
                parts.push(ReplacementPart::Literal(std::mem::take(&mut literal)));
            }
        };
    }

    while i < chars.len() {
        match chars[i] {
            '$' => {
                i += 1;
                i = parse_dollar(&chars, i, &mut parts, &mut literal, captures)?;
            }
            '\\' => {
                i += 1;
                let ch = *chars.get(i).ok_or(ParseErrorKind::IllegalEscapeAtEnd)?;
                if ch == '\\' {
                    literal.push('\\');
                    i += 1;
                } else if ch.is_ascii_digit() {
                    let (slot, next) = read_digits(&chars, i);
                    flush_literal!();
                    parts.push(ReplacementPart::Group(slot));
                    i = next;
                } else {
                    literal.push(ch);
                    i += 1;
                }
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }
    flush_literal!();
    Ok(Replacement { parts, right_to_left: options.right_to_left })
}

fn parse_dollar(
    chars: &[char],
    i: usize,
    parts: &mut Vec<ReplacementPart>,
    literal: &mut String,
    captures: &CaptureState,
) -> Result<usize, ParseErrorKind> {
    macro_rules! flush_literal {
        () => {
            if !literal.is_empty() {
                parts.push(ReplacementPart::Literal(std::mem::take(literal)));
            }
        };
    }

    match chars.get(i) {
        Some('$') => {
            literal.push('$');
            Ok(i + 1)
        }
        Some('&') => {
            flush_literal!();
            parts.push(ReplacementPart::WholeMatch);
            Ok(i + 1)
        }
        Some('`') => {
            flush_literal!();
            parts.push(ReplacementPart::LeftContext);
            Ok(i + 1)
        }
        Some('\'') => {
            flush_literal!();
            parts.push(ReplacementPart::RightContext);
            Ok(i + 1)
        }
        Some('+') => {
            flush_literal!();
            parts.push(ReplacementPart::LastGroup);
            Ok(i + 1)
        }
        Some('_') => {
            flush_literal!();
            parts.push(ReplacementPart::WholeInput);
            Ok(i + 1)
        }
        Some('{') => {
            let mut j = i + 1;
            let mut name = String::new();
            while let Some(&c) = chars.get(j) {
                if c == '}' {
                    break;
                }
                name.push(c);
                j += 1;
            }
            if chars.get(j) != Some(&'}') {
                return Err(ParseErrorKind::MalformedNamedReference);
            }
            j += 1;
            flush_literal!();
            if let Ok(n) = name.parse::<i32>() {
                parts.push(ReplacementPart::Group(n));
            } else {
                if captures.slot_for_name(&name).is_none() {
                    return Err(ParseErrorKind::UndefinedNamedReference);
                }
                parts.push(ReplacementPart::NamedGroup(name));
            }
            Ok(j)
        }
        Some(c) if c.is_ascii_digit() => {
            let (slot, next) = read_digits(chars, i);
            flush_literal!();
            parts.push(ReplacementPart::Group(slot));
            Ok(next)
        }
        _ => {
            literal.push('$');
            Ok(i)
        }
    }
}

fn read_digits(chars: &[char], start: usize) -> (i32, usize) {
    let mut j = start;
    let mut digits = String::new();
    while let Some(&c) = chars.get(j) {
        if c.is_ascii_digit() {
            digits.push(c);
            j += 1;
        } else {
            break;
        }
    }
    (digits.parse().unwrap_or(0), j)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_literal_passes_through() {
        let caps = CaptureState::new();
        let r = parse_replacement("hello world", &Options::new(), &caps).unwrap();
        assert_eq!(r.parts, vec![ReplacementPart::Literal("hello world".into())]);
    }

    #[test]
    fn numbered_group_references() {
        let caps = CaptureState::new();
        let r = parse_replacement("$1-$2", &Options::new(), &caps).unwrap();
        assert_eq!(
            r.parts,
            vec![
                ReplacementPart::Group(1),
                ReplacementPart::Literal("-".into()),
                ReplacementPart::Group(2),
            ]
        );
    }

    #[test]
    fn backslash_numbered_group_reference() {
        let caps = CaptureState::new();
        let r = parse_replacement("\\1", &Options::new(), &caps).unwrap();
        assert_eq!(r.parts, vec![ReplacementPart::Group(1)]);
    }

    #[test]
    fn whole_match_and_context_tokens() {
        let caps = CaptureState::new();
        let r = parse_replacement("$`-$&-$'", &Options::new(), &caps).unwrap();
        assert_eq!(
            r.parts,
            vec![
                ReplacementPart::LeftContext,
                ReplacementPart::Literal("-".into()),
                ReplacementPart::WholeMatch,
                ReplacementPart::Literal("-".into()),
                ReplacementPart::RightContext,
            ]
        );
    }

    #[test]
    fn named_group_reference_requires_known_name() {
        let mut caps = CaptureState::new();
        caps.note_open(1, 0);
        caps.note_name("word", 1, false).unwrap();
        let r = parse_replacement("${word}", &Options::new(), &caps).unwrap();
        assert_eq!(r.parts, vec![ReplacementPart::NamedGroup("word".into())]);

        let err = parse_replacement("${missing}", &Options::new(), &caps).unwrap_err();
        assert_eq!(err, ParseErrorKind::UndefinedNamedReference);
    }

    #[test]
    fn escaped_dollar_is_literal() {
        let caps = CaptureState::new();
        let r = parse_replacement("$$5", &Options::new(), &caps).unwrap();
        assert_eq!(r.parts, vec![ReplacementPart::Literal("$5".into())]);
    }
}
