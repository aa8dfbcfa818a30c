//! Character-class builder.
//!
//! Accumulates ranges, Unicode-category references, and (optionally) the
//! case-insensitive closure of both into an opaque serialised "set
//! string" (§2.3). The writer embeds this string verbatim as a `Set`
//! node's payload; the matching engine (out of scope here) is the one
//! that interprets it at run time.
//!
//! Ranges are stored as `u32` code units rather than `char`. Most callers
//! only ever build classes out of real characters (`add_char`/`add_range`
//! take `char`), but the UTF-8→UTF-16 transformer (§4.4) needs to
//! represent UTF-16 surrogate code units (0xD800-0xDFFF), which are not
//! valid `char` values at all, so the representation has to be able to
//! hold them from the ground up.
//!
//! The serialisation format is deliberately simple and total: a negation
//! flag, a length-prefixed list of sorted/merged ranges (each code unit
//! written as 8 hex digits so surrogate values round-trip exactly), and a
//! length-prefixed list of signed category references. It is canonical
//! (ranges are always sorted and merged before being written out), which
//! is what gives the UTF-8→UTF-16 transformer's idempotence property
//! (§8) a cheap proof: re-running the builder over the same logical
//! content always yields the same string.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharClassError(pub String);

impl fmt::Display for CharClassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for CharClassError {}

/// A parsed-back view of a set string, used by the UTF-8→UTF-16
/// transformer (which needs to recognise specific single-range sets
/// like `[\x80-\xBF]`) and by tests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedSet {
    pub negated: bool,
    pub ranges: Vec<(u32, u32)>,
    pub categories: Vec<(bool, String)>,
}

impl ParsedSet {
    /// If this set is exactly one non-negated range (the shape the
    /// UTF-8→UTF-16 transformer matches against), return it.
    pub fn as_single_range(&self) -> Option<(u32, u32)> {
        if !self.negated && self.categories.is_empty() && self.ranges.len() == 1 {
            Some(self.ranges[0])
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CharClassBuilder {
    negated: bool,
    ranges: Vec<(u32, u32)>,
    categories: Vec<(bool, String)>,
}

impl CharClassBuilder {
    pub fn new() -> Self {
        CharClassBuilder::default()
    }

    pub fn set_negated(&mut self, negated: bool) -> &mut Self {
        self.negated = negated;
        self
    }

    pub fn negated(&self) -> bool {
        self.negated
    }

    pub fn add_char(&mut self, c: char) -> &mut Self {
        self.ranges.push((c as u32, c as u32));
        self
    }

    /// Adds `lo..=hi`. Fails if `lo > hi` (§4.3.2: "A range `a-b` requires
    /// `a <= b`").
    pub fn add_range(&mut self, lo: char, hi: char) -> Result<&mut Self, CharClassError> {
        self.add_code_range(lo as u32, hi as u32)
    }

    /// Adds `lo..=hi` in terms of raw UTF-16/Unicode code units rather
    /// than `char`, for callers (the UTF-8→UTF-16 transformer) that build
    /// synthetic surrogate ranges no `char` could ever represent.
    pub fn add_code_range(&mut self, lo: u32, hi: u32) -> Result<&mut Self, CharClassError> {
        if lo > hi {
            return Err(CharClassError(format!(
                "reversed range in class: {:#x}-{:#x}",
                lo, hi
            )));
        }
        self.ranges.push((lo, hi));
        Ok(self)
    }

    /// Adds a named Unicode property reference (`\p{Name}` / `\P{Name}`,
    /// or the single-letter shorthand `\pL`).
    pub fn add_category(&mut self, name: &str, negated: bool) -> &mut Self {
        self.categories.push((negated, name.to_string()));
        self
    }

    /// Adds the PCRE `\d`/`\D`/`\w`/`\W`/`\s`/`\S` shorthands. `ecma`
    /// selects the slightly different ECMAScript whitespace/word tables
    /// (§4.3.4: "with ECMAScript variants under `ECMAScript`").
    pub fn add_shorthand(&mut self, letter: char, ecma: bool) -> &mut Self {
        match letter {
            'd' => {
                self.add_range('0', '9').unwrap();
            }
            'D' => {
                self.add_negated_digit();
            }
            'w' => {
                self.add_word_ranges();
            }
            'W' => {
                self.add_negated_word();
            }
            's' => {
                self.add_space_ranges(ecma);
            }
            'S' => {
                self.add_negated_space(ecma);
            }
            _ => {}
        }
        self
    }

    fn add_word_ranges(&mut self) {
        self.add_range('a', 'z').unwrap();
        self.add_range('A', 'Z').unwrap();
        self.add_range('0', '9').unwrap();
        self.add_char('_');
    }

    fn add_space_ranges(&mut self, ecma: bool) {
        for c in [' ', '\t', '\n', '\u{000B}', '\u{000C}', '\r'] {
            self.add_char(c);
        }
        if ecma {
            for c in ['\u{00A0}', '\u{FEFF}', '\u{2028}', '\u{2029}'] {
                self.add_char(c);
            }
        }
    }

    /// The negated shorthands are expressed as a *separate* negated
    /// sub-builder merged in as a whole-class negation is not
    /// compositional with ranges already present, so these are only
    /// legal when building a single-shorthand class (the common case:
    /// `[\D]`, or `\D` used outside of `[...]`, both of which produce a
    /// fresh class containing exactly this shorthand).
    fn add_negated_digit(&mut self) {
        self.negated = true;
        self.add_range('0', '9').unwrap();
    }

    fn add_negated_word(&mut self) {
        self.negated = true;
        self.add_word_ranges();
    }

    fn add_negated_space(&mut self, ecma: bool) {
        self.negated = true;
        self.add_space_ranges(ecma);
    }

    /// Closes the class under simple case folding: for every alphabetic
    /// range or char already present, also add its opposite-case form.
    /// This approximates "closed under lowercasing per the active
    /// locale" (§4.3.2) with the locale-independent Unicode simple case
    /// mapping rather than a culture table, since no culture/locale data
    /// is part of this crate's scope (§1: locale lookup is an external
    /// collaborator).
    pub fn apply_case_insensitive(&mut self) -> &mut Self {
        let mut extra = Vec::new();
        for &(lo, hi) in &self.ranges {
            if hi - lo > 1000 {
                // Large ranges (e.g. whole Unicode categories already
                // folded via `\p{...}`) are left alone; folding them
                // char-by-char would be wasteful and they are already
                // case-complete for the categories we emit.
                continue;
            }
            let mut c = lo;
            while c <= hi {
                if let Some(ch) = char::from_u32(c) {
                    for folded in case_fold_variants(ch) {
                        extra.push((folded as u32, folded as u32));
                    }
                }
                c += 1;
            }
        }
        self.ranges.extend(extra);
        self
    }

    /// Sorts and merges overlapping/adjacent ranges. Called by
    /// `to_set_string` so the output is always canonical.
    pub fn normalize(&mut self) {
        self.ranges.sort_by_key(|&(lo, _)| lo);
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(self.ranges.len());
        for &(lo, hi) in &self.ranges {
            if let Some(last) = merged.last_mut() {
                let last_hi = last.1;
                if lo <= last_hi.saturating_add(1) {
                    if hi > last_hi {
                        last.1 = hi;
                    }
                    continue;
                }
            }
            merged.push((lo, hi));
        }
        self.ranges = merged;
        self.categories.sort();
        self.categories.dedup();
    }

    /// Serialises this class into its canonical opaque string form. Each
    /// range is written as two 8-digit lowercase hex fields back to back,
    /// since a surrogate code unit can never be pushed into a `String` as
    /// a `char`.
    pub fn to_set_string(&self) -> String {
        let mut clone = self.clone();
        clone.normalize();
        let mut out = String::new();
        out.push(if clone.negated { '1' } else { '0' });
        out.push_str(&clone.ranges.len().to_string());
        out.push(':');
        for (lo, hi) in &clone.ranges {
            out.push_str(&format!("{:08x}{:08x}", lo, hi));
        }
        out.push_str(&clone.categories.len().to_string());
        out.push(':');
        for (neg, name) in &clone.categories {
            out.push(if *neg { '-' } else { '+' });
            out.push_str(name);
            out.push(';');
        }
        out
    }

    /// Parses a set string back out, for the UTF-8→UTF-16 transformer and
    /// for tests. Returns `None` on malformed input (this format is only
    /// ever produced by `to_set_string`, so malformed input means a bug
    /// upstream, not a user-facing error).
    pub fn parse_set_string(s: &str) -> Option<ParsedSet> {
        let mut chars = s.chars();
        let negated = match chars.next()? {
            '0' => false,
            '1' => true,
            _ => return None,
        };
        let rest: String = chars.collect();
        let (range_count_str, rest) = rest.split_once(':')?;
        let range_count: usize = range_count_str.parse().ok()?;
        if rest.len() < range_count * 16 {
            return None;
        }
        let mut ranges = Vec::with_capacity(range_count);
        let mut pos = 0usize;
        for _ in 0..range_count {
            let lo = u32::from_str_radix(&rest[pos..pos + 8], 16).ok()?;
            let hi = u32::from_str_radix(&rest[pos + 8..pos + 16], 16).ok()?;
            ranges.push((lo, hi));
            pos += 16;
        }
        let remainder = &rest[pos..];
        let (cat_count_str, mut remainder) = remainder.split_once(':')?;
        let cat_count: usize = cat_count_str.parse().ok()?;
        let mut categories = Vec::with_capacity(cat_count);
        for _ in 0..cat_count {
            let sign = remainder.chars().next()?;
            let neg = sign == '-';
            let rest_after_sign = &remainder[sign.len_utf8()..];
            let (name, after) = rest_after_sign.split_once(';')?;
            categories.push((neg, name.to_string()));
            remainder = after;
        }
        Some(ParsedSet {
            negated,
            ranges,
            categories,
        })
    }
}

/// Returns the other-case variant(s) of `ch`, if any, using the
/// locale-independent Unicode simple case mapping.
fn case_fold_variants(ch: char) -> Vec<char> {
    let mut out = Vec::new();
    for up in ch.to_uppercase() {
        if up != ch {
            out.push(up);
        }
    }
    for lo in ch.to_lowercase() {
        if lo != ch {
            out.push(lo);
        }
    }
    out
}
