//! Regex compilation options.
//!
//! `Options` is a bitset of parsing/matching options plus two mutually
//! exclusive sub-fields (newline convention and `\R` convention). It is a
//! pure value type: it carries no compilation state of its own. The parser
//! is the one who maintains a *stack* of these (see `core::parser`) so that
//! inline `(?ims-x)` switches and grouping constructs can save/restore
//! local overrides.

use serde::{Deserialize, Serialize};

/// Which characters/sequences are treated as a line terminator for `^`,
/// `$`, `.` and `\R`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NewlineMode {
    /// `(*LF)`, the default: only `\n` ends a line.
    #[default]
    Lf,
    /// `(*CR)`: only `\r` ends a line.
    Cr,
    /// `(*CRLF)`: only `\r\n` ends a line.
    Crlf,
    /// `(*ANY)`: any Unicode line terminator ends a line.
    Any,
    /// `(*ANYCRLF)`: `\r`, `\n`, or `\r\n` end a line.
    AnyCrlf,
}

/// Which sequence `\R` matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BsrMode {
    /// `(*BSR_UNICODE)`, the default: `\R` matches any Unicode newline.
    #[default]
    Unicode,
    /// `(*BSR_ANYCRLF)`: `\R` matches only `\r`, `\n`, or `\r\n`.
    AnyCrlf,
}

/// A complete set of parsing/matching options for one compilation.
///
/// Cloned cheaply (it is `Copy`) every time the parser pushes a new frame
/// onto its options stack for a group or an inline `(?ims-x)` switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    pub ignore_case: bool,
    pub multiline: bool,
    /// `.` matches newline characters too ("dot-all" / PCRE's `s`).
    pub singleline: bool,
    /// Pattern whitespace and `#...` comments are ignored outside classes.
    pub extended: bool,
    /// Unnamed groups do not auto-number; only named/explicit captures do.
    pub explicit_capture: bool,
    pub right_to_left: bool,
    pub ecma_script: bool,
    pub culture_invariant: bool,

    pub anchored: bool,
    pub dollar_end_only: bool,
    /// Inverts the default greediness of `*`, `+`, `?`, `{m,n}` (not `+`-suffixed possessive ones).
    pub ungreedy: bool,
    pub utf8: bool,
    /// Forbids meaningless `\letter` escapes (they are errors instead of literals).
    pub extra: bool,
    /// Allows distinct named groups to validly share one capture slot.
    pub dup_names: bool,

    pub newline: NewlineMode,
    pub bsr: BsrMode,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            ignore_case: false,
            multiline: false,
            singleline: false,
            extended: false,
            explicit_capture: false,
            right_to_left: false,
            ecma_script: false,
            culture_invariant: false,
            anchored: false,
            dollar_end_only: false,
            ungreedy: false,
            utf8: false,
            extra: false,
            dup_names: false,
            newline: NewlineMode::default(),
            bsr: BsrMode::default(),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Options::default()
    }

    /// Applies one trailing-modifier or inline `(?...)` letter to this set
    /// of options. Returns `false` if the letter is not a recognised
    /// modifier (the caller decides whether that is an error or a no-op,
    /// since the two call sites treat unknown letters differently: the
    /// trailing-modifier scan in `preprocessor` rejects them, while inline
    /// `(?letter)` switches inside the parser reuse the same table for the
    /// letters that *are* legal there).
    pub fn apply_letter(&mut self, ch: char) -> bool {
        match ch {
            'i' => self.ignore_case = true,
            'm' => self.multiline = true,
            's' => self.singleline = true,
            'x' => self.extended = true,
            'n' => self.explicit_capture = true,
            'A' => self.anchored = true,
            'D' => self.dollar_end_only = true,
            'S' => {} // study hint, ignored
            'U' => self.ungreedy = true,
            'u' => self.utf8 = true,
            'X' => self.extra = true,
            'J' => self.dup_names = true,
            'e' => {} // deprecated eval modifier, ignored
            _ => return false,
        }
        true
    }

    /// Clears the flag that `apply_letter` would have set, for the `-x`
    /// half of an inline `(?ims-x)` switch. Letters with no bit backing
    /// them (`S`, `e`) are accepted as no-ops, same as `apply_letter`.
    pub fn clear_letter(&mut self, ch: char) -> bool {
        match ch {
            'i' => self.ignore_case = false,
            'm' => self.multiline = false,
            's' => self.singleline = false,
            'x' => self.extended = false,
            'n' => self.explicit_capture = false,
            'A' => self.anchored = false,
            'D' => self.dollar_end_only = false,
            'S' => {}
            'U' => self.ungreedy = false,
            'u' => self.utf8 = false,
            'X' => self.extra = false,
            'J' => self.dup_names = false,
            'e' => {}
            _ => return false,
        }
        true
    }

    /// Only the subset of letters legal inline, i.e. everything except
    /// the PCRE-pragma-only axes (`A`, `D`, `U`, `u`, `X`, `J` are in fact
    /// legal inline too in this dialect; callers that want a narrower
    /// subset filter before calling `apply_letter`).
    pub fn is_known_modifier_letter(ch: char) -> bool {
        matches!(
            ch,
            'i' | 'm' | 's' | 'x' | 'n' | 'A' | 'D' | 'S' | 'U' | 'u' | 'X' | 'J' | 'e'
        )
    }
}
