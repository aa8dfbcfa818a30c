//! Escape/unescape utilities (§6): the small text-level helpers exposed
//! alongside the parser for callers that need to turn a literal string
//! into a safe-to-embed pattern fragment, or invert a handwritten escape
//! sequence back into the character it denotes.
//!
//! `escape_char` here plays the same role as the teacher's
//! `emitters/pcre2.rs::escape_char`/`escape_class_char`: a small per-char
//! lookup deciding which characters need a backslash. `unescape` mirrors
//! the parser's own character-escape scanner (`\n`, `\t`, `\xHH`,
//! `\x{...}`, `\uHHHH`, `\cX`) but runs with `allowNonSpecial = true`: any
//! backslash followed by a character this table doesn't recognise is
//! taken as that literal character rather than rejected, since this
//! function has no `Options::extra` context to decide otherwise.

use crate::core::errors::ParseErrorKind;

/// Characters that are metacharacters somewhere in the PCRE grammar and
/// so must be escaped to appear literally in a pattern.
const METACHARS: [char; 15] = [
    '|', '(', ')', '[', ']', '{', '}', '^', '$', '*', '+', '?', '\\', ' ', '#',
];

/// Escapes every metacharacter and whitespace control character in `s` so
/// the result can be embedded literally in a pattern body.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0C}' => out.push_str("\\f"),
            c if METACHARS.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Inverts `escape`, and more generally any handwritten escape sequence
/// using the character-escape vocabulary the main parser recognises
/// outside classes (`\a \b \e \f \n \r \t \v`, `\cX`, `\xHH`, `\x{...}`,
/// `\uHHHH`), plus `allowNonSpecial` literal fallback for anything else.
pub fn unescape(s: &str) -> Result<String, ParseErrorKind> {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' {
            let (ch, next) = unescape_one(&chars, i + 1)?;
            out.push(ch);
            i = next;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    Ok(out)
}

fn unescape_one(chars: &[char], i: usize) -> Result<(char, usize), ParseErrorKind> {
    let ch = *chars.get(i).ok_or(ParseErrorKind::IllegalEscapeAtEnd)?;
    match ch {
        'a' => Ok(('\u{07}', i + 1)),
        'b' => Ok(('\u{08}', i + 1)),
        'e' => Ok(('\u{1B}', i + 1)),
        'f' => Ok(('\u{0C}', i + 1)),
        'n' => Ok(('\n', i + 1)),
        'r' => Ok(('\r', i + 1)),
        't' => Ok(('\t', i + 1)),
        'v' => Ok(('\u{0B}', i + 1)),
        'c' => {
            let control = *chars.get(i + 1).ok_or(ParseErrorKind::MissingControlChar)?;
            let upper = control.to_ascii_uppercase();
            let code = (upper as u32) ^ 0x40;
            Ok((char::from_u32(code).unwrap_or('\0'), i + 2))
        }
        'x' => unescape_hex(chars, i),
        'u' => unescape_unicode(chars, i),
        other => Ok((other, i + 1)),
    }
}

fn unescape_hex(chars: &[char], i: usize) -> Result<(char, usize), ParseErrorKind> {
    if chars.get(i + 1) == Some(&'{') {
        let mut j = i + 2;
        let mut hex = String::new();
        while let Some(&c) = chars.get(j) {
            if c == '}' {
                break;
            }
            hex.push(c);
            j += 1;
        }
        if hex.is_empty() || chars.get(j) != Some(&'}') {
            return Err(ParseErrorKind::TooFewHexDigits);
        }
        let value = u32::from_str_radix(&hex, 16).map_err(|_| ParseErrorKind::TooFewHexDigits)?;
        let c = char::from_u32(value).ok_or(ParseErrorKind::TooFewHexDigits)?;
        Ok((c, j + 1))
    } else {
        let mut hex = String::new();
        let mut j = i + 1;
        while hex.len() < 2 {
            match chars.get(j) {
                Some(&c) if c.is_ascii_hexdigit() => {
                    hex.push(c);
                    j += 1;
                }
                _ => break,
            }
        }
        if hex.is_empty() {
            return Err(ParseErrorKind::TooFewHexDigits);
        }
        let value = u32::from_str_radix(&hex, 16).unwrap_or(0);
        Ok((char::from_u32(value).unwrap_or('\0'), j))
    }
}

fn unescape_unicode(chars: &[char], i: usize) -> Result<(char, usize), ParseErrorKind> {
    let mut hex = String::new();
    let mut j = i + 1;
    while hex.len() < 4 {
        match chars.get(j) {
            Some(&c) if c.is_ascii_hexdigit() => {
                hex.push(c);
                j += 1;
            }
            _ => break,
        }
    }
    if hex.len() < 4 {
        return Err(ParseErrorKind::TooFewHexDigits);
    }
    let value = u32::from_str_radix(&hex, 16).unwrap_or(0);
    let c = char::from_u32(value).ok_or(ParseErrorKind::TooFewHexDigits)?;
    Ok((c, j))
}
