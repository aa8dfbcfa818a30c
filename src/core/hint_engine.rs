//! Context-aware error hints.
//!
//! Maps a `ParseErrorKind` to an optional, instructional one-line hint.
//! Kept as its own module (rather than folded into `errors.rs`) because
//! that's how the teacher split it: a tiny lookup table is much easier
//! to extend in isolation than inline inside the error-rendering code.

use crate::core::errors::ParseErrorKind;

/// Returns a hint for the given error kind, or `None` if this kind has no
/// canned advice (callers fall back to just the bare message).
pub fn get_hint(kind: &ParseErrorKind) -> Option<String> {
    use ParseErrorKind::*;
    let hint = match kind {
        UnknownModifier(ch) => format!(
            "'{}' isn't a recognised trailing modifier. Valid letters are \
            i, m, s, x, n, A, D, S, U, u, X, J, e.",
            ch
        ),
        NoEndDelimiter => {
            "The pattern must be wrapped in matching delimiters, e.g. /.../ \
            or #...#. Check that the closing delimiter is present and \
            matches the opening one."
                .to_string()
        }
        EmptyRegex => "A pattern body cannot be empty between its delimiters.".to_string(),
        TooManyParens => "There is a ')' with no matching '('. Remove it or add the opening '('.".to_string(),
        NotEnoughParens => {
            "A '(' was opened but never closed. Add the matching ')'.".to_string()
        }
        IllegalEscapeAtEnd => {
            "A '\\' appeared as the very last character. Escapes need a \
            character (or digits) after the backslash."
                .to_string()
        }
        IllegalRange => {
            "In a {m,n} quantifier, the minimum must not exceed the maximum.".to_string()
        }
        ReversedClassRange => {
            "In a character class range like a-z, the first character must \
            sort before (or equal) the second."
                .to_string()
        }
        UnterminatedBracket => {
            "This character class was opened with '[' but never closed. Add \
            a matching ']'."
                .to_string()
        }
        UnterminatedComment => {
            "A (?#...) comment was opened but never closed with ')'.".to_string()
        }
        UnrecognisedGrouping => {
            "This '(?...)' sequence doesn't match any known grouping \
            construct. Check the character right after '(?'."
                .to_string()
        }
        UndefinedBackreference => {
            "This back-reference refers to a capture group number that \
            doesn't exist in the pattern."
                .to_string()
        }
        UndefinedSubroutine => {
            "This subroutine call refers to a capture group that doesn't \
            exist in the pattern."
                .to_string()
        }
        UndefinedNamedReference => {
            "This reference uses a group name that was never defined with \
            (?<name>...), (?P<name>...), or (?'name'...)."
                .to_string()
        }
        MalformedNamedReference => {
            "A named reference like \\k<name> or \\g{name} is missing its \
            closing delimiter or contains invalid characters."
                .to_string()
        }
        DuplicateName => {
            "This group name is already used earlier in the pattern. Enable \
            the J modifier to allow duplicate names, or rename this group."
                .to_string()
        }
        NameSlotCollision => {
            "Two different group names ended up mapped to the same capture \
            slot; this is only meaningful inside a (?|...) branch-reset \
            group."
                .to_string()
        }
        GroupZeroReference => {
            "Group 0 is the whole match and cannot be referenced by number.".to_string()
        }
        CaptureNumberOutOfRange => {
            "This numbered reference is larger than the number of capture \
            groups in the pattern."
                .to_string()
        }
        NothingToQuantify => {
            "A quantifier (*, +, ?, or {m,n}) must follow something to \
            repeat."
                .to_string()
        }
        NestedQuantifier => {
            "A quantifier cannot be applied directly to another quantifier. \
            Wrap the inner quantified atom in a group first."
                .to_string()
        }
        TooManyConditionalAlternatives => {
            "A (?(cond)yes|no) conditional can have at most two branches.".to_string()
        }
        DefineGroupMultipleBranches => {
            "(?(DEFINE)...) may only contain a single branch; it exists to \
            hold named/numbered subroutines, not to be matched itself."
                .to_string()
        }
        MissingControlChar => {
            "\\c must be followed by a control character, e.g. \\cA.".to_string()
        }
        TooFewHexDigits => {
            "This hex escape doesn't have enough digits (\\xHH needs two, \
            \\x{...} needs at least one inside the braces)."
                .to_string()
        }
        IncompletePropertyName => {
            "\\p{...} / \\P{...} need a property name inside the braces, or \
            use the single-letter shorthand \\pL."
                .to_string()
        }
        UnknownVerb => {
            "This (*VERB) name isn't recognised. Known verbs are ACCEPT, \
            FAIL, F, COMMIT, PRUNE, SKIP, and THEN."
                .to_string()
        }
        UnrecognisedEscape => {
            "This backslash escape isn't recognised, and the X (extra) \
            modifier is active, so unknown escapes are treated as errors \
            instead of literal characters."
                .to_string()
        }
        Internal(_) => return None,
    };
    Some(hint)
}
