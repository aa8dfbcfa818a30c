//! UTF-8 → UTF-16 transformer (§4.4).
//!
//! Applied to the AST before emission. Walks every `Concatenate` node and
//! recognises fixed-shape runs of children (a literal byte (`One`), a
//! single byte-range class (`Set`), or a small fixed-count repeat of one
//! (`Setloop` with `min == max <= 3`)) that together spell out one UTF-8
//! encoding shape, and replaces the run with the equivalent UTF-16
//! code-unit range(s). Anything that doesn't match one of the eight
//! shapes in the table is left untouched; this is a pure canonicalisation
//! step, not something match semantics depend on.

use crate::core::charclass::CharClassBuilder;
use crate::core::nodes::{NodeFlags, RegexNode};

/// Applies the transformer to `node` and everything beneath it, returning
/// a new tree. `node` itself is not mutated.
pub fn transform(node: &RegexNode) -> RegexNode {
    use RegexNode::*;
    match node {
        Concatenate { children } => {
            let transformed: Vec<RegexNode> = children.iter().map(transform).collect();
            Concatenate { children: transform_run(transformed) }
        }
        Alternate { children } => Alternate { children: children.iter().map(transform).collect() },
        Group { child } => Group { child: Box::new(transform(child)) },
        Capture { slot, uncap, child } => Capture {
            slot: *slot,
            uncap: *uncap,
            child: Box::new(transform(child)),
        },
        Require { child } => Require { child: Box::new(transform(child)) },
        Prevent { child } => Prevent { child: Box::new(transform(child)) },
        Greedy { child } => Greedy { child: Box::new(transform(child)) },
        DefinitionGroup { child } => DefinitionGroup { child: Box::new(transform(child)) },
        Loop { min, max, child } => Loop { min: *min, max: *max, child: Box::new(transform(child)) },
        Lazyloop { min, max, child } => Lazyloop { min: *min, max: *max, child: Box::new(transform(child)) },
        Testref { slot, yes, no } => Testref {
            slot: *slot,
            yes: Box::new(transform(yes)),
            no: no.as_ref().map(|n| Box::new(transform(n))),
        },
        Testgroup { condition, yes, no } => Testgroup {
            condition: Box::new(transform(condition)),
            yes: Box::new(transform(yes)),
            no: no.as_ref().map(|n| Box::new(transform(n))),
        },
        other => other.clone(),
    }
}

/// Slides a window over `children`, replacing every recognised UTF-8
/// shape with its UTF-16 equivalent, and leaving unmatched nodes in
/// place.
fn transform_run(children: Vec<RegexNode>) -> Vec<RegexNode> {
    let mut out = Vec::with_capacity(children.len());
    let mut i = 0;
    while i < children.len() {
        if let Some((consumed, replacement)) = try_match_at(&children[i..]) {
            out.extend(replacement);
            i += consumed;
        } else {
            out.push(children[i].clone());
            i += 1;
        }
    }
    out
}

/// One byte-range an atom expands to. A literal byte is `(b, b)`.
type ByteRange = (u32, u32);

struct Template {
    pattern: &'static [ByteRange],
    build: fn() -> Vec<RegexNode>,
}

fn templates() -> &'static [Template] {
    // Table from §4.4. Longer (4-range) templates are listed first so an
    // ambiguous prefix never gets claimed by a shorter template first.
    // In practice the leading-byte ranges across all eight rows are
    // pairwise disjoint, so this ordering is a defensive measure rather
    // than a load-bearing one.
    const TABLE: &[Template] = &[
        Template { pattern: &[(0xF0, 0xF0), (0x90, 0xBF), (0x80, 0xBF), (0x80, 0xBF)], build: build_f0 },
        Template { pattern: &[(0xF1, 0xF3), (0x80, 0xBF), (0x80, 0xBF), (0x80, 0xBF)], build: build_f1_f3 },
        Template { pattern: &[(0xF4, 0xF4), (0x80, 0x8F), (0x80, 0xBF), (0x80, 0xBF)], build: build_f4 },
        Template { pattern: &[(0xE0, 0xE0), (0xA0, 0xBF), (0x80, 0xBF)], build: build_e0 },
        Template { pattern: &[(0xE1, 0xEC), (0x80, 0xBF), (0x80, 0xBF)], build: build_e1_ec },
        Template { pattern: &[(0xED, 0xED), (0x80, 0x9F), (0x80, 0xBF)], build: build_ed },
        Template { pattern: &[(0xEE, 0xEF), (0x80, 0xBF), (0x80, 0xBF)], build: build_ee_ef },
        Template { pattern: &[(0xC2, 0xDF), (0x80, 0xBF)], build: build_c2_df },
    ];
    TABLE
}

fn set_node(lo: u32, hi: u32) -> RegexNode {
    let mut builder = CharClassBuilder::new();
    builder.add_code_range(lo, hi).expect("table ranges are non-reversed");
    RegexNode::Set { set: builder.to_set_string(), flags: NodeFlags::none() }
}

fn build_c2_df() -> Vec<RegexNode> {
    vec![set_node(0x0080, 0x07FF)]
}
fn build_e0() -> Vec<RegexNode> {
    vec![set_node(0x0800, 0x0FFF)]
}
fn build_e1_ec() -> Vec<RegexNode> {
    vec![set_node(0x1000, 0xCFFF)]
}
fn build_ed() -> Vec<RegexNode> {
    vec![set_node(0xD000, 0xD7FF)]
}
fn build_ee_ef() -> Vec<RegexNode> {
    vec![set_node(0xE000, 0xFFFF)]
}
fn build_f0() -> Vec<RegexNode> {
    vec![set_node(0xD800, 0xD8BF), set_node(0xDC00, 0xDFFF)]
}
fn build_f1_f3() -> Vec<RegexNode> {
    vec![set_node(0xD8C0, 0xDBBF), set_node(0xDC00, 0xDFFF)]
}
fn build_f4() -> Vec<RegexNode> {
    vec![set_node(0xDBC0, 0xDBFF), set_node(0xDC00, 0xDFFF)]
}

/// Tries to match one of the eight templates starting at `slice[0]`.
/// Returns the number of original child nodes consumed and their
/// replacement, or `None` if nothing matches here.
fn try_match_at(slice: &[RegexNode]) -> Option<(usize, Vec<RegexNode>)> {
    let mut ranges: Vec<ByteRange> = Vec::new();
    let mut boundaries: Vec<usize> = Vec::new();
    for node in slice {
        if ranges.len() >= 4 {
            break;
        }
        match expand_atom(node) {
            Some(tuples) => {
                ranges.extend(tuples);
                boundaries.push(ranges.len());
            }
            None => break,
        }
    }

    for template in templates() {
        let need = template.pattern.len();
        if ranges.len() < need {
            continue;
        }
        if ranges[..need] != *template.pattern {
            continue;
        }
        if let Some(children_used) = boundaries.iter().position(|&b| b == need) {
            return Some((children_used + 1, (template.build)()));
        }
    }
    None
}

/// Expands one child node into the byte range(s) it stands for, or
/// `None` if it isn't one of the shapes this transformer recognises
/// (a literal byte, a single-range class, or a fixed-count repeat of
/// one with `min == max <= 3`).
fn expand_atom(node: &RegexNode) -> Option<Vec<ByteRange>> {
    match node {
        RegexNode::One { ch, .. } => {
            let b = *ch as u32;
            (b <= 0xFF).then_some(vec![(b, b)])
        }
        RegexNode::Set { set, .. } => {
            let parsed = CharClassBuilder::parse_set_string(set)?;
            let (lo, hi) = parsed.as_single_range()?;
            (hi <= 0xFF).then_some(vec![(lo, hi)])
        }
        RegexNode::Setloop { set, min, max, .. } if min == max && (1..=3).contains(min) => {
            let parsed = CharClassBuilder::parse_set_string(set)?;
            let (lo, hi) = parsed.as_single_range()?;
            (hi <= 0xFF).then_some(vec![(lo, hi); *min as usize])
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::nodes::RegexNode;

    fn byte_set(lo: u8, hi: u8) -> RegexNode {
        let mut b = CharClassBuilder::new();
        b.add_range(lo as char, hi as char).unwrap();
        RegexNode::Set { set: b.to_set_string(), flags: NodeFlags::none() }
    }

    fn expect_single_range(node: &RegexNode, lo: u32, hi: u32) {
        match node {
            RegexNode::Set { set, .. } => {
                let parsed = CharClassBuilder::parse_set_string(set).unwrap();
                assert_eq!(parsed.as_single_range(), Some((lo, hi)));
            }
            other => panic!("expected Set, got {other:?}"),
        }
    }

    #[test]
    fn two_byte_sequence_becomes_single_range() {
        let input = RegexNode::Concatenate {
            children: vec![byte_set(0xC2, 0xDF), byte_set(0x80, 0xBF)],
        };
        let out = transform(&input);
        match out {
            RegexNode::Concatenate { children } => {
                assert_eq!(children.len(), 1);
                expect_single_range(&children[0], 0x0080, 0x07FF);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn three_byte_literal_prefix_sequence() {
        let input = RegexNode::Concatenate {
            children: vec![
                RegexNode::One { ch: '\u{E0}', flags: NodeFlags::none() },
                byte_set(0xA0, 0xBF),
                byte_set(0x80, 0xBF),
            ],
        };
        let out = transform(&input);
        match out {
            RegexNode::Concatenate { children } => {
                assert_eq!(children.len(), 1);
                expect_single_range(&children[0], 0x0800, 0x0FFF);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn setloop_unrolls_for_repeated_continuation_byte() {
        let set = byte_set(0x80, 0xBF);
        let inner_set = match &set {
            RegexNode::Set { set, .. } => set.clone(),
            _ => unreachable!(),
        };
        let input = RegexNode::Concatenate {
            children: vec![
                byte_set(0xE1, 0xEC),
                RegexNode::Setloop { set: inner_set, min: 2, max: 2, flags: NodeFlags::none() },
            ],
        };
        let out = transform(&input);
        match out {
            RegexNode::Concatenate { children } => {
                assert_eq!(children.len(), 1);
                expect_single_range(&children[0], 0x1000, 0xCFFF);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn four_byte_sequence_yields_surrogate_pair() {
        let input = RegexNode::Concatenate {
            children: vec![
                RegexNode::One { ch: '\u{F0}', flags: NodeFlags::none() },
                byte_set(0x90, 0xBF),
                byte_set(0x80, 0xBF),
                byte_set(0x80, 0xBF),
            ],
        };
        let out = transform(&input);
        match out {
            RegexNode::Concatenate { children } => {
                assert_eq!(children.len(), 2);
                expect_single_range(&children[0], 0xD800, 0xD8BF);
                expect_single_range(&children[1], 0xDC00, 0xDFFF);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unmatched_run_is_left_intact() {
        let input = RegexNode::Concatenate {
            children: vec![byte_set(0x41, 0x5A), byte_set(0x30, 0x39)],
        };
        let out = transform(&input);
        match out {
            RegexNode::Concatenate { children } => assert_eq!(children.len(), 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn transform_is_idempotent() {
        let input = RegexNode::Concatenate {
            children: vec![byte_set(0xC2, 0xDF), byte_set(0x80, 0xBF)],
        };
        let once = transform(&input);
        let twice = transform(&once);
        assert_eq!(once, twice);
    }
}
