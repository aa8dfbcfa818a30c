//! Regex AST node definitions.
//!
//! `RegexNode` is the single polymorphic tree node shared by the parser,
//! the UTF-8→UTF-16 transformer, and the writer (§3.2 of the design). It
//! is a closed, tagged sum type: no virtual dispatch, one exhaustive
//! `match` per consumer, the same shape the teacher's `core::nodes::Node`
//! uses for its own (much smaller) grammar.
//!
//! Invariants (enforced by the parser, not by the type system):
//! - `Concatenate`/`Alternate` may have any number of children, including
//!   zero.
//! - `Testgroup` always carries a `yes` branch and an optional `no`
//!   branch (2 or 3 effective children).
//! - `Testref` is the same shape as `Testgroup` but keyed by a capture
//!   slot instead of an assertion.
//! - Quantified loop nodes carry `min <= max`, with `max == UNBOUNDED`
//!   standing in for "no upper bound".
//! - There is exactly one root node for a compiled pattern, and it is
//!   always `Capture { slot: 0, .. }` wrapping the whole pattern.

use serde::{Deserialize, Serialize};

/// Sentinel used in place of an `Option` for quantifier upper bounds,
/// matching how the writer needs to compare `max` against a fixed value
/// in several places without unwrapping an `Option` on every arithmetic
/// site.
pub const UNBOUNDED: i32 = i32::MAX;

/// Per-node flags the writer folds into the two high bits of every
/// opcode it emits for that node (§4.5: "Two high bits OR'd into every
/// op to carry right-to-left and case-insensitive flags for the
/// instruction"). These are not part of the surface grammar's node
/// *shape* so much as annotations captured from the options stack at
/// the moment the node was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NodeFlags {
    pub case_insensitive: bool,
    pub right_to_left: bool,
}

impl NodeFlags {
    pub fn none() -> Self {
        NodeFlags::default()
    }
}

/// Which backtracking-control verb a `(*VERB)` sequence named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verb {
    Accept,
    Commit,
    Prune,
    Skip,
    Then,
    // Note: `(*FAIL)`/`(*F)` is not represented here; per §4.3.3 it is
    // synthesized directly as `RegexNode::Nothing`.
}

/// The AST node type. See the module doc for invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RegexNode {
    /// A single literal character.
    One { ch: char, flags: NodeFlags },
    /// Any character except the given one.
    Notone { ch: char, flags: NodeFlags },
    /// A run of two or more literal characters (coalesced by the parser).
    Multi { text: String, flags: NodeFlags },
    /// A character class, serialised via `core::charclass`.
    Set { set: String, flags: NodeFlags },
    /// A numbered back-reference, keyed by external capture slot.
    Ref { slot: i32, flags: NodeFlags },

    Oneloop { ch: char, min: i32, max: i32, flags: NodeFlags },
    Onelazy { ch: char, min: i32, max: i32, flags: NodeFlags },
    Notoneloop { ch: char, min: i32, max: i32, flags: NodeFlags },
    Notonelazy { ch: char, min: i32, max: i32, flags: NodeFlags },
    Setloop { set: String, min: i32, max: i32, flags: NodeFlags },
    Setlazy { set: String, min: i32, max: i32, flags: NodeFlags },

    /// A run of sibling nodes matched in sequence.
    Concatenate { children: Vec<RegexNode> },
    /// A choice between sibling branches, tried in order.
    Alternate { children: Vec<RegexNode> },
    /// A plain (non-capturing, non-atomic) grouping, e.g. the body of an
    /// option-switch scope that doesn't itself need a bytecode wrapper
    /// beyond scoping.
    Group { child: Box<RegexNode> },
    /// A capturing group. `uncap` is `Some(slot)` for balancing-group
    /// style close-then-reopen forms; `None` otherwise.
    Capture { slot: i32, uncap: Option<i32>, child: Box<RegexNode> },
    /// Positive lookaround (lookahead if `flags.right_to_left` was unset
    /// on entry, lookbehind if it was set before the body was parsed).
    Require { child: Box<RegexNode> },
    /// Negative lookaround.
    Prevent { child: Box<RegexNode> },
    /// Atomic / possessive group: once matched, never re-entered.
    Greedy { child: Box<RegexNode> },
    /// `(?(N)yes|no)` conditional keyed by whether capture slot `slot`
    /// has participated in the match.
    Testref {
        slot: i32,
        yes: Box<RegexNode>,
        no: Option<Box<RegexNode>>,
    },
    /// `(?(assertion)yes|no)` conditional keyed by a zero-width assertion.
    Testgroup {
        condition: Box<RegexNode>,
        yes: Box<RegexNode>,
        no: Option<Box<RegexNode>>,
    },
    /// `(?(DEFINE)...)`: never matched directly, only called via
    /// `CallSubroutine`.
    DefinitionGroup { child: Box<RegexNode> },
    /// A counted loop around a (possibly compound) body.
    Loop { min: i32, max: i32, child: Box<RegexNode> },
    /// As `Loop`, but lazy (matches as few repetitions as possible).
    Lazyloop { min: i32, max: i32, child: Box<RegexNode> },
    /// `(?N)`, `(?&name)`, `(?+N)`, `(?-N)`, `(?P>name)`, `(?R)`: calls
    /// into the subtree captured at the given slot. Holds a slot number,
    /// never a pointer, so the AST stays acyclic even for recursive
    /// patterns (§9, "Cyclic references").
    CallSubroutine { slot: i32 },
    /// `(*PRUNE)`, `(*COMMIT)`, `(*SKIP)`, `(*THEN)`, `(*ACCEPT)`.
    BacktrackingVerb { verb: Verb, label: Option<String> },
    /// `\K`: resets the reported start of the overall match.
    ResetMatchStart,

    /// `^` under the default (non-multiline) LF convention.
    Bol,
    /// `$` under the default (non-multiline) LF convention.
    Eol,
    /// `\A`.
    Beginning,
    /// `\z`.
    End,
    /// `\Z`.
    EndZ,
    /// `\G`.
    Start,

    Boundary,
    NonBoundary,
    EcmaBoundary,
    NonEcmaBoundary,

    /// A construct that matched but contributes nothing (e.g. an empty
    /// alternation branch, or `(?#...)` comment residue).
    Empty,
    /// Always fails; the `(*FAIL)`/`(*F)` verb lowers to this.
    Nothing,
}

impl RegexNode {
    /// Returns this node's direct children, used by the UTF-8→UTF-16
    /// transformer and by generic tree walks (e.g. feature detection,
    /// well-formedness checks) that don't need the full match-arm
    /// treatment the writer requires.
    pub fn children(&self) -> Vec<&RegexNode> {
        use RegexNode::*;
        match self {
            Concatenate { children } | Alternate { children } => children.iter().collect(),
            Group { child }
            | Require { child }
            | Prevent { child }
            | Greedy { child }
            | DefinitionGroup { child }
            | Capture { child, .. }
            | Loop { child, .. }
            | Lazyloop { child, .. } => vec![child.as_ref()],
            Testref { yes, no, .. } => {
                let mut v = vec![yes.as_ref()];
                if let Some(no) = no {
                    v.push(no.as_ref());
                }
                v
            }
            Testgroup { condition, yes, no } => {
                let mut v = vec![condition.as_ref(), yes.as_ref()];
                if let Some(no) = no {
                    v.push(no.as_ref());
                }
                v
            }
            _ => vec![],
        }
    }

    /// True for the single-character leaf kind the UTF-8→UTF-16
    /// transformer and the writer's literal-prefix derivation both need
    /// to recognise without a full `match`.
    pub fn is_one(&self) -> bool {
        matches!(self, RegexNode::One { .. })
    }

    pub fn is_set(&self) -> bool {
        matches!(self, RegexNode::Set { .. })
    }
}
