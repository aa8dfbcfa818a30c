//! Bytecode writer (§3.5, §4.5): walks the AST once, post-order, emitting a
//! flat `RegexCode` program for a backtracking virtual machine. The matcher
//! that executes this program is out of scope (§1); this module only has
//! to produce a well-formed program (§8).
//!
//! The emitter loop follows the teacher corpus's back-patch-by-index
//! technique almost verbatim: `examples/zmbush-regex/src/compile.rs`'s
//! `empty_split`/`set_split`/`empty_jump`/`set_jump` push a placeholder
//! instruction, remember its index, and mutate it in place once the target
//! offset is known. This module does the same (`emit`/`patch_target`), but
//! against the richer opcode set spec §4.5 calls for (mark/jump/count
//! opcodes for a backtracking VM, not the four-instruction `Inst` set a
//! Thompson NFA needs).
//!
//! One documented simplification versus a from-scratch "explicit stack"
//! writer: emission here is an ordinary recursive tree walk (`emit_node`
//! calling itself on children) rather than a hand-threaded work-stack. A
//! pattern that reached the parser's own explicit-stack depth limit already
//! produced a bounded-depth AST, so the writer's recursion depth is bounded
//! by exactly the same limit (see DESIGN.md).

use crate::core::capture::CaptureState;
use crate::core::charclass::CharClassBuilder;
use crate::core::nodes::{NodeFlags, RegexNode, Verb, UNBOUNDED};
use crate::core::options::Options;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Case-insensitive / right-to-left flags, folded into every opcode the
/// writer emits for a node (§4.5: "two high bits OR'd into every op").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InstFlags {
    pub case_insensitive: bool,
    pub right_to_left: bool,
}

fn to_inst_flags(flags: NodeFlags) -> InstFlags {
    InstFlags {
        case_insensitive: flags.case_insensitive,
        right_to_left: flags.right_to_left,
    }
}

/// One instruction in the bytecode program (§4.5). Variant payloads carry
/// their own operands directly rather than sharing a flat `i32` operand
/// array with the teacher's four-opcode `Inst`, since this program's
/// opcode set is heterogeneous enough (mark/count/branch pairs) that a
/// tagged enum is both safer and easier to read than indexing into a
/// shared operand slot by convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Inst {
    One { ch: char, flags: InstFlags },
    Notone { ch: char, flags: InstFlags },
    Multi { str_idx: usize, flags: InstFlags },
    Set { str_idx: usize, flags: InstFlags },

    Oneloop { ch: char, min: i32, max: i32, flags: InstFlags },
    Onelazy { ch: char, min: i32, max: i32, flags: InstFlags },
    Notoneloop { ch: char, min: i32, max: i32, flags: InstFlags },
    Notonelazy { ch: char, min: i32, max: i32, flags: InstFlags },
    Setloop { str_idx: usize, min: i32, max: i32, flags: InstFlags },
    Setlazy { str_idx: usize, min: i32, max: i32, flags: InstFlags },

    Onerep { ch: char, count: i32, flags: InstFlags },
    Notonerep { ch: char, count: i32, flags: InstFlags },
    Setrep { str_idx: usize, count: i32, flags: InstFlags },

    /// Jump forward to `target` only as a last resort (i.e. after the
    /// fall-through path has been exhausted by backtracking).
    Lazybranch { target: usize },
    /// Unconditional jump to `target`.
    Goto { target: usize },
    Setjump,
    Forejump,
    Backjump,
    Setmark,
    Getmark,
    Nullmark,
    Setcount { value: i32 },
    Nullcount,
    Branchmark { target: usize },
    Branchcount { target: usize },
    Lazybranchmark { target: usize },
    Lazybranchcount { target: usize },

    /// Closes capture slot `open_slot` (opened by the `Setmark` this
    /// instruction pairs with); `close_slot` is the balancing-group
    /// `uncap` slot, or `-1` when there isn't one.
    Capturemark { open_slot: i32, close_slot: i32 },

    Ref { slot: i32, flags: InstFlags },
    Testref { slot: i32 },

    Bol,
    Eol,
    Boundary,
    Nonboundary,
    EcmaBoundary,
    NonEcmaBoundary,
    Beginning,
    Start,
    EndZ,
    End,

    ResetMatchStart,
    CallSubroutine { slot: i32 },
    /// `(*PRUNE)`/`(*COMMIT)`/`(*SKIP)`/`(*THEN)`/`(*ACCEPT)`. The matcher
    /// (out of scope) owns the actual backtracking-stack surgery; this
    /// opcode only carries which verb and its optional `(*THEN:label)`-
    /// style name for it to act on.
    BacktrackingVerb { verb: Verb, label: Option<usize> },
    Stop,
    Nothing,
}

/// Simple bad-character shift table for the program's single literal
/// prefix (§4.5's restricted, single-prefix Boyer–Moore-ish table, see
/// `derive_literal_prefix`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoyerMoore {
    pub pattern: String,
    pub case_insensitive: bool,
    /// Last occurrence of each character in `pattern`, distance from the
    /// end; characters not present default to `pattern.chars().count()`
    /// at lookup time in the (out-of-scope) matcher.
    pub bad_char_shift: HashMap<char, usize>,
}

impl BoyerMoore {
    fn build(pattern: &str, case_insensitive: bool) -> Self {
        let chars: Vec<char> = pattern.chars().collect();
        let len = chars.len();
        let mut bad_char_shift = HashMap::new();
        for (i, &c) in chars.iter().enumerate() {
            let key = if case_insensitive { c.to_ascii_lowercase() } else { c };
            bad_char_shift.insert(key, len - i - 1);
        }
        BoyerMoore {
            pattern: pattern.to_string(),
            case_insensitive,
            bad_char_shift,
        }
    }
}

/// Which anchoring assertions open the program, summarising `\A`/`\G`/`^`
/// so the (out-of-scope) matcher can skip scanning positions it already
/// knows cannot match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AnchorMask {
    pub beginning: bool,
    pub start: bool,
    pub bol: bool,
    /// Mirrors `Options::anchored`: the caller asked for an implicit `\A`
    /// regardless of what the pattern body itself opens with.
    pub anchored_option: bool,
}

/// The compiled program (§3.5): a flat instruction stream plus the side
/// tables the matcher needs to interpret it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexCode {
    pub codes: Vec<Inst>,
    /// Deduplicated literal/set-string table; `Multi`/`Set`/`Setloop`/
    /// `Setlazy`/`Setrep` index into this by position.
    pub strings: Vec<String>,
    /// Number of distinct backtracking-frame "track" slots the matcher
    /// must allocate (one per alternation/loop/capture encountered).
    pub track_count: i32,
    /// Dense remap from external (parser-assigned, possibly sparse)
    /// capture slot numbers to `0..cap_size` (`MapCapnum`, §3.3/§4.5).
    pub cap_map: HashMap<i32, i32>,
    /// One past the highest dense capture slot in use.
    pub cap_size: i32,
    /// Dense capture slot -> code position right after its `Setmark`,
    /// used to resolve `CallSubroutine` targets.
    pub cap_positions: HashMap<i32, usize>,
    pub literal_prefix: Option<String>,
    pub literal_prefix_case_insensitive: bool,
    pub boyer_moore: Option<BoyerMoore>,
    /// Opaque `core::charclass` set string for the first character the
    /// match could possibly start with, or `None` if no single set
    /// captures it.
    pub first_chars: Option<String>,
    pub anchors: AnchorMask,
    pub right_to_left: bool,
}

struct Writer {
    codes: Vec<Inst>,
    strings: Vec<String>,
    string_index: HashMap<String, usize>,
    track_count: i32,
    cap_positions: HashMap<i32, usize>,
}

impl Writer {
    fn new() -> Self {
        Writer {
            codes: Vec::new(),
            strings: Vec::new(),
            string_index: HashMap::new(),
            track_count: 0,
            cap_positions: HashMap::new(),
        }
    }

    fn intern(&mut self, s: &str) -> usize {
        if let Some(&idx) = self.string_index.get(s) {
            return idx;
        }
        let idx = self.strings.len();
        self.strings.push(s.to_string());
        self.string_index.insert(s.to_string(), idx);
        idx
    }

    fn emit(&mut self, inst: Inst) -> usize {
        self.codes.push(inst);
        self.codes.len() - 1
    }

    fn here(&self) -> usize {
        self.codes.len()
    }

    /// Back-patches a previously emitted branch instruction's target, the
    /// same "push placeholder, remember index, patch later" technique as
    /// the teacher's `set_split`/`set_jump`.
    fn patch_target(&mut self, idx: usize, target: usize) {
        match &mut self.codes[idx] {
            Inst::Lazybranch { target: t }
            | Inst::Goto { target: t }
            | Inst::Branchmark { target: t }
            | Inst::Branchcount { target: t }
            | Inst::Lazybranchmark { target: t }
            | Inst::Lazybranchcount { target: t } => *t = target,
            other => panic!("patch_target called on non-branch instruction: {other:?}"),
        }
    }

    fn emit_node(&mut self, node: &RegexNode, cap_map: &HashMap<i32, i32>) {
        use RegexNode::*;
        match node {
            One { ch, flags } => {
                self.emit(Inst::One { ch: *ch, flags: to_inst_flags(*flags) });
            }
            Notone { ch, flags } => {
                self.emit(Inst::Notone { ch: *ch, flags: to_inst_flags(*flags) });
            }
            Multi { text, flags } => {
                let idx = self.intern(text);
                self.emit(Inst::Multi { str_idx: idx, flags: to_inst_flags(*flags) });
            }
            Set { set, flags } => {
                let idx = self.intern(set);
                self.emit(Inst::Set { str_idx: idx, flags: to_inst_flags(*flags) });
            }
            Ref { slot, flags } => {
                let mapped = *cap_map.get(slot).unwrap_or(slot);
                self.emit(Inst::Ref { slot: mapped, flags: to_inst_flags(*flags) });
            }

            Oneloop { ch, min, max, flags } => {
                self.emit_char_loop(*ch, *min, *max, false, false, to_inst_flags(*flags))
            }
            Onelazy { ch, min, max, flags } => {
                self.emit_char_loop(*ch, *min, *max, true, false, to_inst_flags(*flags))
            }
            Notoneloop { ch, min, max, flags } => {
                self.emit_char_loop(*ch, *min, *max, false, true, to_inst_flags(*flags))
            }
            Notonelazy { ch, min, max, flags } => {
                self.emit_char_loop(*ch, *min, *max, true, true, to_inst_flags(*flags))
            }
            Setloop { set, min, max, flags } => {
                self.emit_set_loop(set, *min, *max, false, to_inst_flags(*flags))
            }
            Setlazy { set, min, max, flags } => {
                self.emit_set_loop(set, *min, *max, true, to_inst_flags(*flags))
            }

            Concatenate { children } => {
                for child in children {
                    self.emit_node(child, cap_map);
                }
            }
            Alternate { children } => self.emit_alternate(children, cap_map),
            Group { child } => self.emit_node(child, cap_map),
            Capture { slot, uncap, child } => self.emit_capture(*slot, *uncap, child, cap_map),
            Require { child } => self.emit_require(child, cap_map),
            Prevent { child } => self.emit_prevent(child, cap_map),
            Greedy { child } => self.emit_greedy(child, cap_map),
            // Never matched directly; only reachable via CallSubroutine.
            DefinitionGroup { .. } => {}
            Loop { min, max, child } => self.emit_loop(*min, *max, child, false, cap_map),
            Lazyloop { min, max, child } => self.emit_loop(*min, *max, child, true, cap_map),
            Testref { slot, yes, no } => self.emit_testref(*slot, yes, no.as_deref(), cap_map),
            Testgroup { condition, yes, no } => {
                self.emit_testgroup(condition, yes, no.as_deref(), cap_map)
            }
            CallSubroutine { slot } => {
                let mapped = *cap_map.get(slot).unwrap_or(slot);
                self.emit(Inst::CallSubroutine { slot: mapped });
            }
            BacktrackingVerb { verb, label } => {
                let label_idx = label.as_ref().map(|l| self.intern(l));
                self.emit(Inst::BacktrackingVerb { verb: *verb, label: label_idx });
            }
            ResetMatchStart => {
                self.emit(Inst::ResetMatchStart);
            }

            Bol => { self.emit(Inst::Bol); }
            Eol => { self.emit(Inst::Eol); }
            Beginning => { self.emit(Inst::Beginning); }
            End => { self.emit(Inst::End); }
            EndZ => { self.emit(Inst::EndZ); }
            Start => { self.emit(Inst::Start); }
            Boundary => { self.emit(Inst::Boundary); }
            NonBoundary => { self.emit(Inst::Nonboundary); }
            EcmaBoundary => { self.emit(Inst::EcmaBoundary); }
            NonEcmaBoundary => { self.emit(Inst::NonEcmaBoundary); }

            Empty => {}
            Nothing => {
                self.emit(Inst::Nothing);
            }
        };
    }

    fn emit_char_loop(&mut self, ch: char, min: i32, max: i32, lazy: bool, notone: bool, flags: InstFlags) {
        if min > 0 {
            self.emit(if notone {
                Inst::Notonerep { ch, count: min, flags }
            } else {
                Inst::Onerep { ch, count: min, flags }
            });
        }
        let remaining = if max == UNBOUNDED { UNBOUNDED } else { max - min };
        if remaining != 0 {
            self.emit(match (notone, lazy) {
                (false, false) => Inst::Oneloop { ch, min: 0, max: remaining, flags },
                (false, true) => Inst::Onelazy { ch, min: 0, max: remaining, flags },
                (true, false) => Inst::Notoneloop { ch, min: 0, max: remaining, flags },
                (true, true) => Inst::Notonelazy { ch, min: 0, max: remaining, flags },
            });
            self.track_count += 1;
        }
    }

    fn emit_set_loop(&mut self, set: &str, min: i32, max: i32, lazy: bool, flags: InstFlags) {
        let idx = self.intern(set);
        if min > 0 {
            self.emit(Inst::Setrep { str_idx: idx, count: min, flags });
        }
        let remaining = if max == UNBOUNDED { UNBOUNDED } else { max - min };
        if remaining != 0 {
            self.emit(if lazy {
                Inst::Setlazy { str_idx: idx, min: 0, max: remaining, flags }
            } else {
                Inst::Setloop { str_idx: idx, min: 0, max: remaining, flags }
            });
            self.track_count += 1;
        }
    }

    fn emit_alternate(&mut self, children: &[RegexNode], cap_map: &HashMap<i32, i32>) {
        if children.is_empty() {
            return;
        }
        let mut goto_patches = Vec::new();
        for (i, child) in children.iter().enumerate() {
            if i + 1 == children.len() {
                self.emit_node(child, cap_map);
                continue;
            }
            let lazybranch = self.emit(Inst::Lazybranch { target: 0 });
            self.emit_node(child, cap_map);
            goto_patches.push(self.emit(Inst::Goto { target: 0 }));
            let next_branch = self.here();
            self.patch_target(lazybranch, next_branch);
        }
        let end = self.here();
        for idx in goto_patches {
            self.patch_target(idx, end);
        }
        self.track_count += 1;
    }

    fn emit_capture(&mut self, slot: i32, uncap: Option<i32>, child: &RegexNode, cap_map: &HashMap<i32, i32>) {
        let mapped_open = *cap_map.get(&slot).unwrap_or(&slot);
        self.emit(Inst::Setmark);
        self.cap_positions.insert(mapped_open, self.here());
        self.emit_node(child, cap_map);
        let mapped_uncap = uncap
            .map(|u| *cap_map.get(&u).unwrap_or(&u))
            .unwrap_or(-1);
        self.emit(Inst::Capturemark { open_slot: mapped_open, close_slot: mapped_uncap });
        self.track_count += 1;
    }

    fn emit_require(&mut self, child: &RegexNode, cap_map: &HashMap<i32, i32>) {
        self.emit(Inst::Setjump);
        self.emit(Inst::Setmark);
        self.emit_node(child, cap_map);
        self.emit(Inst::Getmark);
        self.emit(Inst::Forejump);
    }

    fn emit_prevent(&mut self, child: &RegexNode, cap_map: &HashMap<i32, i32>) {
        self.emit(Inst::Setjump);
        let lazybranch = self.emit(Inst::Lazybranch { target: 0 });
        self.emit_node(child, cap_map);
        self.emit(Inst::Backjump);
        let here = self.here();
        self.patch_target(lazybranch, here);
        self.emit(Inst::Forejump);
    }

    fn emit_greedy(&mut self, child: &RegexNode, cap_map: &HashMap<i32, i32>) {
        self.emit(Inst::Setjump);
        self.emit_node(child, cap_map);
        self.emit(Inst::Forejump);
    }

    fn emit_loop(&mut self, min: i32, max: i32, child: &RegexNode, lazy: bool, cap_map: &HashMap<i32, i32>) {
        let counted = max != UNBOUNDED || min > 1;
        if counted {
            if min == 0 {
                self.emit(Inst::Nullcount);
            } else {
                self.emit(Inst::Setcount { value: 1 - min });
            }
        } else if min == 0 {
            self.emit(Inst::Nullmark);
        } else {
            self.emit(Inst::Setmark);
        }

        let early_exit = if min == 0 {
            Some(self.emit(Inst::Goto { target: 0 }))
        } else {
            None
        };

        let loop_start = self.here();
        self.emit_node(child, cap_map);

        self.emit(match (counted, lazy) {
            (true, false) => Inst::Branchcount { target: loop_start },
            (true, true) => Inst::Lazybranchcount { target: loop_start },
            (false, false) => Inst::Branchmark { target: loop_start },
            (false, true) => Inst::Lazybranchmark { target: loop_start },
        });

        let end = self.here();
        if let Some(idx) = early_exit {
            self.patch_target(idx, end);
        }
        self.track_count += 1;
    }

    fn emit_testref(&mut self, slot: i32, yes: &RegexNode, no: Option<&RegexNode>, cap_map: &HashMap<i32, i32>) {
        let mapped = *cap_map.get(&slot).unwrap_or(&slot);
        self.emit(Inst::Setjump);
        let lazybranch = self.emit(Inst::Lazybranch { target: 0 });
        self.emit(Inst::Testref { slot: mapped });
        self.emit(Inst::Forejump);
        self.emit_node(yes, cap_map);
        let goto_end = self.emit(Inst::Goto { target: 0 });
        let else_start = self.here();
        self.patch_target(lazybranch, else_start);
        if let Some(no) = no {
            self.emit_node(no, cap_map);
        }
        let end = self.here();
        self.patch_target(goto_end, end);
        self.track_count += 1;
    }

    fn emit_testgroup(&mut self, condition: &RegexNode, yes: &RegexNode, no: Option<&RegexNode>, cap_map: &HashMap<i32, i32>) {
        self.emit(Inst::Setjump);
        self.emit(Inst::Setmark);
        let lazybranch = self.emit(Inst::Lazybranch { target: 0 });
        self.emit_node(condition, cap_map);
        self.emit(Inst::Getmark);
        self.emit(Inst::Forejump);
        self.emit_node(yes, cap_map);
        let goto_end = self.emit(Inst::Goto { target: 0 });
        let else_start = self.here();
        self.patch_target(lazybranch, else_start);
        if let Some(no) = no {
            self.emit_node(no, cap_map);
        }
        let end = self.here();
        self.patch_target(goto_end, end);
        self.track_count += 1;
    }
}

/// `MapCapnum` (§3.3): builds the dense remap from external (parser-
/// assigned) capture slots to `0..cap_size`. Slot 0 (the whole match)
/// always maps to dense slot 0; the remaining external slots are sorted
/// and assigned densely in order.
pub fn build_capture_remap(captures: &CaptureState) -> (HashMap<i32, i32>, i32) {
    let mut external: Vec<i32> = captures.caps.keys().copied().filter(|&s| s != 0).collect();
    external.sort_unstable();

    let mut map = HashMap::with_capacity(external.len() + 1);
    map.insert(0, 0);
    let mut next_dense = 1;
    for slot in external {
        map.insert(slot, next_dense);
        next_dense += 1;
    }
    (map, next_dense)
}

/// Strips the program's own leading `Lazybranch` and the root capture's
/// `Setmark` (neither consumes input) so prefix/anchor derivation sees
/// the first instruction that actually matches something.
fn skip_leading_wrapper(codes: &[Inst]) -> &[Inst] {
    let mut i = 0;
    if matches!(codes.first(), Some(Inst::Lazybranch { .. })) {
        i += 1;
    }
    while matches!(codes.get(i), Some(Inst::Setmark)) {
        i += 1;
    }
    &codes[i..]
}

/// Derives the single fixed literal prefix the program starts with, if
/// any, plus a Boyer–Moore-ish bad-character table for it (§4.5,
/// restricted per the module doc to one literal run rather than a full
/// prefix-alternation search).
fn derive_literal_prefix(codes: &[Inst]) -> (Option<String>, bool, Option<BoyerMoore>) {
    let body = skip_leading_wrapper(codes);
    let mut prefix = String::new();
    let mut case_insensitive = false;
    let mut started = false;

    for inst in body {
        match inst {
            Inst::One { ch, flags } | Inst::Onerep { ch, count: _, flags } => {
                if !started {
                    case_insensitive = flags.case_insensitive;
                    started = true;
                } else if flags.case_insensitive != case_insensitive {
                    break;
                }
                prefix.push(*ch);
            }
            _ => break,
        }
    }

    if prefix.is_empty() {
        (None, false, None)
    } else {
        let bm = BoyerMoore::build(&prefix, case_insensitive);
        (Some(prefix), case_insensitive, Some(bm))
    }
}

/// Derives the opaque `charclass` set string for the first character the
/// match could start with, when the leading instruction recognises one
/// without needing a full alternation walk.
fn derive_first_chars(codes: &[Inst], strings: &[String]) -> Option<String> {
    let body = skip_leading_wrapper(codes);
    match body.first()? {
        Inst::One { ch, .. } | Inst::Onerep { ch, .. } => {
            let mut builder = CharClassBuilder::new();
            builder.add_char(*ch);
            Some(builder.to_set_string())
        }
        Inst::Set { str_idx, .. } | Inst::Setrep { str_idx, .. } => strings.get(*str_idx).cloned(),
        _ => None,
    }
}

fn derive_anchors(codes: &[Inst], options: &Options) -> AnchorMask {
    let body = skip_leading_wrapper(codes);
    let mut mask = AnchorMask {
        anchored_option: options.anchored,
        ..AnchorMask::default()
    };
    match body.first() {
        Some(Inst::Beginning) => mask.beginning = true,
        Some(Inst::Start) => mask.start = true,
        Some(Inst::Bol) => mask.bol = true,
        _ => {}
    }
    mask
}

/// Writes `tree` (the root, always `Capture { slot: 0, .. }`) into a
/// `RegexCode` program (§3.5, §4.5): root wrapped in a `Lazybranch`/`Stop`
/// pair, capture slots densely remapped, and literal-prefix/first-char/
/// anchor hints derived from the finished instruction stream.
pub fn write(tree: &RegexNode, captures: &CaptureState, options: &Options) -> RegexCode {
    let mut writer = Writer::new();
    let (cap_map, cap_size) = build_capture_remap(captures);

    let lazybranch = writer.emit(Inst::Lazybranch { target: 0 });
    writer.emit_node(tree, &cap_map);
    let end = writer.here();
    writer.patch_target(lazybranch, end);
    writer.emit(Inst::Stop);

    let (literal_prefix, literal_prefix_case_insensitive, boyer_moore) =
        derive_literal_prefix(&writer.codes);
    let first_chars = derive_first_chars(&writer.codes, &writer.strings);
    let anchors = derive_anchors(&writer.codes, options);

    RegexCode {
        codes: writer.codes,
        strings: writer.strings,
        track_count: writer.track_count,
        cap_map,
        cap_size,
        cap_positions: writer.cap_positions,
        literal_prefix,
        literal_prefix_case_insensitive,
        boyer_moore,
        first_chars,
        anchors,
        right_to_left: options.right_to_left,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::nodes::NodeFlags;

    fn root(child: RegexNode) -> RegexNode {
        RegexNode::Capture { slot: 0, uncap: None, child: Box::new(child) }
    }

    #[test]
    fn literal_concatenation_emits_ones_and_stop() {
        let tree = root(RegexNode::Concatenate {
            children: vec![
                RegexNode::One { ch: 'a', flags: NodeFlags::none() },
                RegexNode::One { ch: 'b', flags: NodeFlags::none() },
            ],
        });
        let caps = CaptureState::new();
        let code = write(&tree, &caps, &Options::new());
        assert!(matches!(code.codes.last(), Some(Inst::Stop)));
        assert_eq!(code.literal_prefix.as_deref(), Some("ab"));
        assert_eq!(code.cap_size, 1);
    }

    #[test]
    fn alternate_branches_patch_to_shared_end() {
        let tree = root(RegexNode::Alternate {
            children: vec![
                RegexNode::One { ch: 'a', flags: NodeFlags::none() },
                RegexNode::One { ch: 'b', flags: NodeFlags::none() },
                RegexNode::One { ch: 'c', flags: NodeFlags::none() },
            ],
        });
        let caps = CaptureState::new();
        let code = write(&tree, &caps, &Options::new());
        for inst in &code.codes {
            if let Inst::Lazybranch { target } | Inst::Goto { target } = inst {
                assert!(*target <= code.codes.len());
            }
        }
    }

    #[test]
    fn capture_slots_are_densely_remapped() {
        let mut caps = CaptureState::new();
        caps.note_open(0, 0);
        caps.note_open(3, 1);
        caps.note_open(7, 4);
        let tree = root(RegexNode::Concatenate {
            children: vec![
                RegexNode::Capture {
                    slot: 3,
                    uncap: None,
                    child: Box::new(RegexNode::One { ch: 'x', flags: NodeFlags::none() }),
                },
                RegexNode::Capture {
                    slot: 7,
                    uncap: None,
                    child: Box::new(RegexNode::One { ch: 'y', flags: NodeFlags::none() }),
                },
            ],
        });
        let code = write(&tree, &caps, &Options::new());
        assert_eq!(code.cap_size, 3);
        assert_eq!(code.cap_map[&0], 0);
        assert_eq!(code.cap_map[&3], 1);
        assert_eq!(code.cap_map[&7], 2);
    }

    #[test]
    fn unbounded_loop_with_zero_minimum_has_early_exit() {
        let tree = root(RegexNode::Loop {
            min: 0,
            max: UNBOUNDED,
            child: Box::new(RegexNode::One { ch: 'a', flags: NodeFlags::none() }),
        });
        let caps = CaptureState::new();
        let code = write(&tree, &caps, &Options::new());
        assert!(code.codes.iter().any(|i| matches!(i, Inst::Nullmark)));
        assert!(code.codes.iter().any(|i| matches!(i, Inst::Branchmark { .. })));
    }

    #[test]
    fn bounded_loop_uses_counted_form() {
        let tree = root(RegexNode::Loop {
            min: 2,
            max: 5,
            child: Box::new(RegexNode::One { ch: 'a', flags: NodeFlags::none() }),
        });
        let caps = CaptureState::new();
        let code = write(&tree, &caps, &Options::new());
        assert!(code.codes.iter().any(|i| matches!(i, Inst::Setcount { value: -1 })));
        assert!(code.codes.iter().any(|i| matches!(i, Inst::Onerep { count: 2, .. })));
        assert!(code.codes.iter().any(|i| matches!(i, Inst::Branchcount { .. })));
    }

    #[test]
    fn anchored_beginning_is_detected() {
        let tree = root(RegexNode::Concatenate {
            children: vec![RegexNode::Beginning, RegexNode::One { ch: 'a', flags: NodeFlags::none() }],
        });
        let caps = CaptureState::new();
        let code = write(&tree, &caps, &Options::new());
        assert!(code.anchors.beginning);
    }
}
