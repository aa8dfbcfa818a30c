//! Main pattern parser (§4.3).
//!
//! A hand-written, stack-driven scanner over a character cursor. Per the
//! design notes (§9, "Recursion vs explicit stack"), group/alternation
//! nesting is **not** threaded through the host call stack: deeply
//! nested alternations occur in real-world patterns, so `Parser` keeps
//! an explicit `Vec<Frame>` of in-progress groups instead of recursing
//! into itself for every `(`. Character-class and escape scanning stay
//! as ordinary (non-recursive, bounded) helper calls, the way the
//! teacher's own `Cursor`-driven scanner reads characters.

use crate::core::capture::{BranchResetFrame, CaptureState};
use crate::core::charclass::CharClassBuilder;
use crate::core::errors::{ParseError, ParseErrorKind};
use crate::core::nodes::{NodeFlags, RegexNode, Verb, UNBOUNDED};
use crate::core::options::{NewlineMode, Options};

/// Cursor for tracking position in the pattern body. Unlike the teacher's
/// `chars().nth(i)` cursor, this one snapshots the body into a `Vec<char>`
/// up front so every `peek`/`take` is O(1) rather than O(n): the same
/// external shape (`peek_char`, `take`, `match_str`), a cheaper backing
/// store.
#[derive(Debug, Clone)]
struct Cursor {
    chars: Vec<char>,
    i: usize,
}

impl Cursor {
    fn new(body: &str) -> Self {
        Cursor {
            chars: body.chars().collect(),
            i: 0,
        }
    }

    fn eof(&self) -> bool {
        self.i >= self.chars.len()
    }

    fn peek_char(&self, n: usize) -> Option<char> {
        self.chars.get(self.i + n).copied()
    }

    fn take(&mut self) -> Option<char> {
        let ch = self.chars.get(self.i).copied();
        if ch.is_some() {
            self.i += 1;
        }
        ch
    }

    fn match_str(&mut self, s: &str) -> bool {
        let s_chars: Vec<char> = s.chars().collect();
        if self.chars[self.i..].starts_with(s_chars.as_slice()) {
            self.i += s_chars.len();
            true
        } else {
            false
        }
    }

    fn rewind_to(&mut self, pos: usize) {
        self.i = pos;
    }
}

/// One in-progress group. Sibling of the teacher's `group`/`alternation`/
/// `concatenation` "registers", folded into a single struct per stack
/// frame instead of three parallel linked chains.
struct Frame {
    kind: GroupKind,
    options: Options,
    /// Children of the alternative currently being built.
    concatenation: Vec<RegexNode>,
    /// Completed alternatives (each flattened into one node at `|`/`)`).
    alternation: Vec<RegexNode>,
    /// True immediately after a quantifier was applied to the last
    /// pushed atom: a second quantifier character here is a
    /// `NestedQuantifier` error.
    just_quantified: bool,
    /// Position of the frame's opening `(` (or 0 for the root), used in
    /// the "not enough parens" error report.
    open_pos: usize,
    /// For `(?|...)` groups: the branch-reset bookkeeping.
    branch_reset: Option<BranchResetFrame>,
    /// True for the synthetic `Require`/`Prevent` frame that holds a
    /// `(?(?=...)...)`-style conditional's *condition*: on close its
    /// resulting node is stashed in `Parser::pending_condition` instead
    /// of being appended to the enclosing frame's concatenation, since it
    /// isn't matched in sequence: it's inspected once, then discarded.
    is_condition: bool,
}

enum GroupKind {
    Root,
    Plain,
    Capture { slot: i32, uncap: Option<i32> },
    Require { right_to_left_on_entry: bool },
    Prevent { right_to_left_on_entry: bool },
    Greedy,
    Testref { slot: i32 },
    Testgroup { condition: Box<RegexNode> },
    DefinitionGroup,
}

pub struct Parser<'a> {
    cursor: Cursor,
    pattern: &'a str,
    stack: Vec<Frame>,
    options: Options,
    captures: CaptureState,
    /// Set by `close_group` when it pops an `is_condition` frame; read
    /// and cleared by `open_conditional` right after driving that frame
    /// to closure.
    pending_condition: Option<RegexNode>,
}

impl<'a> Parser<'a> {
    pub fn new(pattern: &'a str, initial_options: Options) -> Result<Self, ParseError> {
        let captures = prescan_captures(pattern, &initial_options)
            .map_err(|kind| ParseError::new(kind, 0, pattern))?;
        Ok(Parser {
            cursor: Cursor::new(pattern),
            pattern,
            stack: vec![Frame {
                kind: GroupKind::Root,
                options: initial_options,
                concatenation: Vec::new(),
                alternation: Vec::new(),
                just_quantified: false,
                open_pos: 0,
                branch_reset: None,
                is_condition: false,
            }],
            options: initial_options,
            captures,
            pending_condition: None,
        })
    }

    fn err(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind, self.cursor.i, self.pattern)
    }

    fn err_at(&self, kind: ParseErrorKind, pos: usize) -> ParseError {
        ParseError::new(kind, pos, self.pattern)
    }

    fn node_flags(&self) -> NodeFlags {
        NodeFlags {
            case_insensitive: self.options.ignore_case,
            right_to_left: self.options.right_to_left,
        }
    }

    fn top(&mut self) -> &mut Frame {
        self.stack.last_mut().expect("parser stack is never empty")
    }

    /// Drives the whole pattern body to completion and returns the root
    /// `Capture(slot=0)` node (§3.2: "exactly one root... an outer
    /// implicit Capture(slot=0) wrapping the whole pattern") together with
    /// the capture-slot bookkeeping the writer needs to build its dense
    /// remap (§3.3).
    pub fn parse(mut self) -> Result<(RegexNode, CaptureState), ParseError> {
        if self.pattern.is_empty() {
            return Err(self.err(ParseErrorKind::EmptyRegex));
        }

        loop {
            self.skip_extended_trivia();
            if self.cursor.eof() {
                break;
            }
            let ch = self.cursor.peek_char(0).unwrap();
            match ch {
                '(' => self.open_group()?,
                ')' => self.close_group()?,
                '|' => self.alternate()?,
                '[' => {
                    let set = self.parse_class()?;
                    self.push_atom(set)?;
                }
                '\\' => {
                    let node = self.scan_escape()?;
                    self.push_atom(node)?;
                }
                '^' => {
                    self.cursor.take();
                    let node = self.make_bol();
                    self.push_atom_no_quantify_check(node);
                }
                '$' => {
                    self.cursor.take();
                    let node = self.make_eol();
                    self.push_atom_no_quantify_check(node);
                }
                '.' => {
                    self.cursor.take();
                    let node = self.make_dot();
                    self.push_atom(node)?;
                }
                '*' | '+' | '?' => self.apply_trailing_quantifier()?,
                '{' => {
                    if self.try_apply_brace_quantifier()? {
                        // consumed
                    } else {
                        self.push_literal_char('{')?;
                    }
                }
                _ => {
                    self.scan_literal_run()?;
                }
            }
        }

        if self.stack.len() != 1 {
            return Err(self.err(ParseErrorKind::NotEnoughParens));
        }

        let body = self.finish_frame_body();
        let root = RegexNode::Capture {
            slot: 0,
            uncap: None,
            child: Box::new(body),
        };
        Ok((root, self.captures))
    }

    // ---- Extended-mode trivia -------------------------------------

    fn skip_extended_trivia(&mut self) {
        if !self.options.extended {
            return;
        }
        loop {
            match self.cursor.peek_char(0) {
                Some(c) if c.is_whitespace() => {
                    self.cursor.take();
                }
                Some('#') => {
                    while let Some(c) = self.cursor.peek_char(0) {
                        if c == '\n' {
                            break;
                        }
                        self.cursor.take();
                    }
                }
                _ => break,
            }
        }
    }

    // ---- Literal runs -----------------------------------------------

    fn scan_literal_run(&mut self) -> Result<(), ParseError> {
        let mut run = String::new();
        loop {
            self.skip_extended_trivia();
            match self.cursor.peek_char(0) {
                Some(c) if !is_special(c, self.options.extended) => {
                    run.push(c);
                    self.cursor.take();
                }
                _ => break,
            }
        }
        if run.is_empty() {
            // A special character landed here that scan_literal_run
            // doesn't own (shouldn't happen; every special is dispatched
            // by the caller). Defensive no-op.
            return Ok(());
        }
        let node = self.coalesce_run(run);
        self.push_atom(node)
    }

    fn push_literal_char(&mut self, ch: char) -> Result<(), ParseError> {
        self.cursor.take();
        let node = RegexNode::One {
            ch,
            flags: self.node_flags(),
        };
        self.push_atom(node)
    }

    fn coalesce_run(&self, run: String) -> RegexNode {
        let flags = self.node_flags();
        let mut chars = run.chars();
        if run.chars().count() == 1 {
            RegexNode::One {
                ch: chars.next().unwrap(),
                flags,
            }
        } else {
            RegexNode::Multi { text: run, flags }
        }
    }

    // ---- Atom / quantifier plumbing ---------------------------------

    fn push_atom(&mut self, node: RegexNode) -> Result<(), ParseError> {
        self.top().concatenation.push(node);
        self.top().just_quantified = false;
        self.maybe_apply_quantifier()
    }

    /// For zero-width assertions: pushes the node but does not itself
    /// invite a `maybe_apply_quantifier` scan beyond the normal one (kept
    /// distinct only for readability at call sites; PCRE does allow
    /// quantifying an assertion, nonsensical as that is, so behaviour is
    /// identical to `push_atom`).
    fn push_atom_no_quantify_check(&mut self, node: RegexNode) {
        self.top().concatenation.push(node);
        self.top().just_quantified = false;
    }

    fn maybe_apply_quantifier(&mut self) -> Result<(), ParseError> {
        match self.cursor.peek_char(0) {
            Some('*') | Some('+') | Some('?') => self.apply_trailing_quantifier(),
            Some('{') => {
                self.try_apply_brace_quantifier()?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn apply_trailing_quantifier(&mut self) -> Result<(), ParseError> {
        let pos = self.cursor.i;
        let ch = self.cursor.take().unwrap();
        let (min, max) = match ch {
            '*' => (0, UNBOUNDED),
            '+' => (1, UNBOUNDED),
            '?' => (0, 1),
            _ => unreachable!(),
        };
        self.finish_quantifier(min, max, pos)
    }

    /// Tries to parse `{m}`, `{m,}`, or `{m,n}` at the cursor. Returns
    /// `Ok(true)` if a quantifier was recognised and applied, `Ok(false)`
    /// if `{` does not begin a valid quantifier (PCRE treats it as a
    /// literal `{` in that case).
    fn try_apply_brace_quantifier(&mut self) -> Result<bool, ParseError> {
        let start = self.cursor.i;
        self.cursor.take(); // '{'
        let min_str = self.take_digits();
        let mut max_str: Option<String> = None;
        let mut has_comma = false;
        if self.cursor.peek_char(0) == Some(',') {
            has_comma = true;
            self.cursor.take();
            max_str = Some(self.take_digits());
        }
        if self.cursor.peek_char(0) != Some('}') || (min_str.is_empty() && !has_comma) {
            self.cursor.rewind_to(start);
            return Ok(false);
        }
        self.cursor.take(); // '}'

        let min: i32 = if min_str.is_empty() { 0 } else { min_str.parse().unwrap_or(UNBOUNDED) };
        let max: i32 = if !has_comma {
            min
        } else if let Some(ref s) = max_str {
            if s.is_empty() {
                UNBOUNDED
            } else {
                s.parse().unwrap_or(UNBOUNDED)
            }
        } else {
            UNBOUNDED
        };

        if min > max {
            return Err(self.err_at(ParseErrorKind::IllegalRange, start));
        }

        self.finish_quantifier(min, max, start)?;
        Ok(true)
    }

    fn take_digits(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.cursor.peek_char(0) {
            if c.is_ascii_digit() {
                s.push(c);
                self.cursor.take();
            } else {
                break;
            }
        }
        s
    }

    fn finish_quantifier(&mut self, min: i32, max: i32, pos: usize) -> Result<(), ParseError> {
        if self.top().just_quantified {
            return Err(self.err_at(ParseErrorKind::NestedQuantifier, pos));
        }
        let atom = self
            .top()
            .concatenation
            .pop()
            .ok_or_else(|| self.err_at(ParseErrorKind::NothingToQuantify, pos))?;

        let mut lazy = false;
        let mut possessive = false;
        match self.cursor.peek_char(0) {
            Some('?') => {
                lazy = true;
                self.cursor.take();
            }
            Some('+') => {
                possessive = true;
                self.cursor.take();
            }
            _ => {}
        }
        if self.options.ungreedy && !possessive {
            lazy = !lazy;
        }

        let quantified = self.wrap_quantified(atom, min, max, lazy, possessive);
        self.top().concatenation.push(quantified);
        self.top().just_quantified = true;
        Ok(())
    }

    fn wrap_quantified(
        &self,
        atom: RegexNode,
        min: i32,
        max: i32,
        lazy: bool,
        possessive: bool,
    ) -> RegexNode {
        let flags = self.node_flags();
        let looped = match atom {
            RegexNode::One { ch, .. } => {
                if lazy {
                    RegexNode::Onelazy { ch, min, max, flags }
                } else {
                    RegexNode::Oneloop { ch, min, max, flags }
                }
            }
            RegexNode::Notone { ch, .. } => {
                if lazy {
                    RegexNode::Notonelazy { ch, min, max, flags }
                } else {
                    RegexNode::Notoneloop { ch, min, max, flags }
                }
            }
            RegexNode::Set { set, .. } => {
                if lazy {
                    RegexNode::Setlazy { set, min, max, flags }
                } else {
                    RegexNode::Setloop { set, min, max, flags }
                }
            }
            other => {
                if lazy {
                    RegexNode::Lazyloop { min, max, child: Box::new(other) }
                } else {
                    RegexNode::Loop { min, max, child: Box::new(other) }
                }
            }
        };
        if possessive {
            RegexNode::Greedy { child: Box::new(looped) }
        } else {
            looped
        }
    }

    // ---- Alternation & group close -----------------------------------

    fn alternate(&mut self) -> Result<(), ParseError> {
        self.cursor.take();
        if matches!(self.top().kind, GroupKind::DefinitionGroup) {
            return Err(self.err(ParseErrorKind::DefineGroupMultipleBranches));
        }
        let alt_count_limit = matches!(
            self.top().kind,
            GroupKind::Testref { .. } | GroupKind::Testgroup { .. }
        );
        let branch = self.finish_frame_body();
        self.top().alternation.push(branch);
        if alt_count_limit && self.top().alternation.len() >= 2 {
            return Err(self.err(ParseErrorKind::TooManyConditionalAlternatives));
        }
        if let Some(br) = self.top().branch_reset.clone() {
            let resumed = br.start_autocap;
            let mut br = br;
            br.max_autocap = br.max_autocap.max(self.captures.next_auto());
            self.top().branch_reset = Some(br);
            self.captures.set_next_auto(resumed);
        }
        Ok(())
    }

    /// Folds the current frame's in-progress concatenation into the
    /// accumulated `alternation`, and returns the single resulting node:
    /// an `Alternate` if more than one branch was seen, else the lone
    /// branch (or `Empty` if the whole group was empty).
    fn finish_frame_body(&mut self) -> RegexNode {
        let frame = self.top();
        let concat = std::mem::take(&mut frame.concatenation);
        let node = match concat.len() {
            0 => RegexNode::Empty,
            1 => concat.into_iter().next().unwrap(),
            _ => RegexNode::Concatenate { children: concat },
        };
        if frame.alternation.is_empty() {
            node
        } else {
            frame.alternation.push(node);
            let alts = std::mem::take(&mut frame.alternation);
            RegexNode::Alternate { children: alts }
        }
    }

    fn close_group(&mut self) -> Result<(), ParseError> {
        let close_pos = self.cursor.i;
        self.cursor.take();

        if self.stack.len() == 1 {
            return Err(self.err_at(ParseErrorKind::TooManyParens, close_pos));
        }
        if matches!(self.top().kind, GroupKind::DefinitionGroup) && !self.top().alternation.is_empty()
        {
            return Err(self.err_at(ParseErrorKind::DefineGroupMultipleBranches, close_pos));
        }

        let body = self.finish_frame_body();
        let frame = self.stack.pop().unwrap();
        self.options = self.stack.last().unwrap().options;

        if let Some(br) = frame.branch_reset {
            self.captures.set_next_auto(br.max_autocap.max(self.captures.next_auto()));
        }

        let node = match frame.kind {
            GroupKind::Root => unreachable!("root frame is never closed via ')'"),
            GroupKind::Plain => RegexNode::Group { child: Box::new(body) },
            GroupKind::Capture { slot, uncap } => {
                RegexNode::Capture { slot, uncap, child: Box::new(body) }
            }
            GroupKind::Require { .. } => RegexNode::Require { child: Box::new(body) },
            GroupKind::Prevent { .. } => RegexNode::Prevent { child: Box::new(body) },
            GroupKind::Greedy => RegexNode::Greedy { child: Box::new(body) },
            GroupKind::Testref { slot } => {
                let (yes, no) = self.split_conditional_alternatives(body);
                RegexNode::Testref { slot, yes: Box::new(yes), no: no.map(Box::new) }
            }
            GroupKind::Testgroup { condition } => {
                let (yes, no) = self.split_conditional_alternatives(body);
                RegexNode::Testgroup { condition, yes: Box::new(yes), no: no.map(Box::new) }
            }
            GroupKind::DefinitionGroup => RegexNode::DefinitionGroup { child: Box::new(body) },
        };

        if frame.is_condition {
            self.pending_condition = Some(node);
            return Ok(());
        }

        self.top().concatenation.push(node);
        self.top().just_quantified = false;
        self.maybe_apply_quantifier()
    }

    /// A `(?(cond)yes|no)` body was parsed with the plain `Alternate`
    /// machinery (it shares `|` handling with everything else); this
    /// pulls the (already capped to ≤ 2 by `alternate()`) branches back
    /// apart into `(yes, Option<no>)`.
    fn split_conditional_alternatives(&self, body: RegexNode) -> (RegexNode, Option<RegexNode>) {
        match body {
            RegexNode::Alternate { mut children } => {
                let no = if children.len() > 1 { Some(children.remove(1)) } else { None };
                let yes = children.remove(0);
                (yes, no)
            }
            other => (other, None),
        }
    }

    // ---- Group opening (§4.3.3) ---------------------------------------

    fn open_group(&mut self) -> Result<(), ParseError> {
        let open_pos = self.cursor.i;
        self.cursor.take(); // '('

        if self.cursor.peek_char(0) == Some('*') {
            return self.open_verb_or_pragma(open_pos);
        }
        if self.cursor.peek_char(0) != Some('?') {
            return self.open_plain_or_capture(open_pos, true);
        }

        self.cursor.take(); // '?'
        match self.cursor.peek_char(0) {
            Some(':') => {
                self.cursor.take();
                self.push_frame(GroupKind::Plain, open_pos);
                Ok(())
            }
            Some('P') => self.open_p_form(open_pos),
            Some('\'') => self.open_quoted_name(open_pos, '\''),
            Some('<') => self.open_angle_form(open_pos),
            Some('=') => {
                self.cursor.take();
                self.push_lookaround(true, false, open_pos)
            }
            Some('!') => {
                self.cursor.take();
                self.push_lookaround(false, false, open_pos)
            }
            Some('>') => {
                self.cursor.take();
                self.push_frame(GroupKind::Greedy, open_pos);
                Ok(())
            }
            Some('|') => {
                self.cursor.take();
                self.open_branch_reset(open_pos);
                Ok(())
            }
            Some('(') => self.open_conditional(open_pos),
            Some('&') => {
                self.cursor.take();
                self.open_subroutine_by_name(open_pos)
            }
            Some('R') => {
                self.cursor.take();
                self.close_and_push(RegexNode::CallSubroutine { slot: 0 })
            }
            Some(c) if c == '+' || c == '-' || c.is_ascii_digit() => {
                self.open_subroutine_by_relative_or_absolute_number(open_pos)
            }
            Some(c) if c.is_alphabetic() || c == '-' => self.open_option_switch(open_pos),
            _ => Err(self.err_at(ParseErrorKind::UnrecognisedGrouping, open_pos)),
        }
    }

    fn close_and_push(&mut self, node: RegexNode) -> Result<(), ParseError> {
        if self.cursor.peek_char(0) != Some(')') {
            return Err(self.err(ParseErrorKind::UnrecognisedGrouping));
        }
        self.cursor.take();
        self.push_atom(node)
    }

    fn push_frame(&mut self, kind: GroupKind, open_pos: usize) {
        self.push_frame_ex(kind, open_pos, false);
    }

    fn push_frame_ex(&mut self, kind: GroupKind, open_pos: usize, is_condition: bool) {
        let options = self.options;
        self.stack.push(Frame {
            kind,
            options,
            concatenation: Vec::new(),
            alternation: Vec::new(),
            just_quantified: false,
            open_pos,
            branch_reset: None,
            is_condition,
        });
    }

    fn push_lookaround(&mut self, positive: bool, behind: bool, open_pos: usize) -> Result<(), ParseError> {
        let on_entry = self.options.right_to_left;
        self.options.right_to_left = behind;
        if positive {
            self.push_frame(GroupKind::Require { right_to_left_on_entry: on_entry }, open_pos);
        } else {
            self.push_frame(GroupKind::Prevent { right_to_left_on_entry: on_entry }, open_pos);
        }
        Ok(())
    }

    /// Like `push_lookaround`, but marks the frame as a conditional's
    /// condition (see `Frame::is_condition`) and does not expect its own
    /// leading `(`: the caller (`open_conditional`) already consumed the
    /// one shared paren before dispatching here.
    fn push_condition_lookaround(&mut self, positive: bool, behind: bool, open_pos: usize) {
        let on_entry = self.options.right_to_left;
        self.options.right_to_left = behind;
        if positive {
            self.push_frame_ex(GroupKind::Require { right_to_left_on_entry: on_entry }, open_pos, true);
        } else {
            self.push_frame_ex(GroupKind::Prevent { right_to_left_on_entry: on_entry }, open_pos, true);
        }
    }

    fn open_verb_or_pragma(&mut self, open_pos: usize) -> Result<(), ParseError> {
        self.cursor.take(); // '*'
        let mut name = String::new();
        while let Some(c) = self.cursor.peek_char(0) {
            if c == ')' || c == ':' {
                break;
            }
            name.push(c);
            self.cursor.take();
        }
        let label = if self.cursor.peek_char(0) == Some(':') {
            self.cursor.take();
            let mut label = String::new();
            while let Some(c) = self.cursor.peek_char(0) {
                if c == ')' {
                    break;
                }
                label.push(c);
                self.cursor.take();
            }
            Some(label)
        } else {
            None
        };
        if self.cursor.peek_char(0) != Some(')') {
            return Err(self.err_at(ParseErrorKind::UnknownVerb, open_pos));
        }
        self.cursor.take();

        let node = match name.as_str() {
            "ACCEPT" => RegexNode::BacktrackingVerb { verb: Verb::Accept, label },
            "COMMIT" => RegexNode::BacktrackingVerb { verb: Verb::Commit, label },
            "PRUNE" => RegexNode::BacktrackingVerb { verb: Verb::Prune, label },
            "SKIP" => RegexNode::BacktrackingVerb { verb: Verb::Skip, label },
            "THEN" => RegexNode::BacktrackingVerb { verb: Verb::Then, label },
            "FAIL" | "F" => RegexNode::Nothing,
            _ => return Err(self.err_at(ParseErrorKind::UnknownVerb, open_pos)),
        };
        self.push_atom(node)
    }

    fn open_p_form(&mut self, open_pos: usize) -> Result<(), ParseError> {
        self.cursor.take(); // 'P'
        match self.cursor.peek_char(0) {
            Some('<') => {
                self.cursor.take();
                self.open_named_capture(open_pos, '<', '>')
            }
            Some('=') => {
                self.cursor.take();
                self.open_backreference_by_name(open_pos)
            }
            Some('>') => {
                self.cursor.take();
                self.open_subroutine_by_name(open_pos)
            }
            _ => Err(self.err_at(ParseErrorKind::UnrecognisedGrouping, open_pos)),
        }
    }

    fn open_quoted_name(&mut self, open_pos: usize, open_delim: char) -> Result<(), ParseError> {
        self.cursor.take(); // delimiter
        self.open_named_capture(open_pos, open_delim, '\'')
    }

    fn open_angle_form(&mut self, open_pos: usize) -> Result<(), ParseError> {
        // (?<name>...), (?<=...), (?<!...)
        if self.cursor.peek_char(1) == Some('=') {
            self.cursor.take();
            self.cursor.take();
            return self.push_lookaround(true, true, open_pos);
        }
        if self.cursor.peek_char(1) == Some('!') {
            self.cursor.take();
            self.cursor.take();
            return self.push_lookaround(false, true, open_pos);
        }
        self.cursor.take(); // '<'
        self.open_named_capture(open_pos, '<', '>')
    }

    fn open_named_capture(&mut self, open_pos: usize, _open: char, close: char) -> Result<(), ParseError> {
        let mut name = String::new();
        while let Some(c) = self.cursor.peek_char(0) {
            if c == close {
                break;
            }
            name.push(c);
            self.cursor.take();
        }
        if self.cursor.peek_char(0) != Some(close) {
            return Err(self.err_at(ParseErrorKind::MalformedNamedReference, open_pos));
        }
        self.cursor.take();
        let slot = self
            .captures
            .slot_for_name(&name)
            .ok_or_else(|| self.err_at(ParseErrorKind::UndefinedNamedReference, open_pos))?;
        self.push_frame(GroupKind::Capture { slot, uncap: None }, open_pos);
        Ok(())
    }

    fn open_backreference_by_name(&mut self, open_pos: usize) -> Result<(), ParseError> {
        let mut name = String::new();
        while let Some(c) = self.cursor.peek_char(0) {
            if c == ')' {
                break;
            }
            name.push(c);
            self.cursor.take();
        }
        if self.cursor.peek_char(0) != Some(')') {
            return Err(self.err_at(ParseErrorKind::MalformedNamedReference, open_pos));
        }
        self.cursor.take();
        let slot = self
            .captures
            .slot_for_name(&name)
            .ok_or_else(|| self.err_at(ParseErrorKind::UndefinedNamedReference, open_pos))?;
        self.push_atom(RegexNode::Ref { slot, flags: self.node_flags() })
    }

    fn open_subroutine_by_name(&mut self, open_pos: usize) -> Result<(), ParseError> {
        let mut name = String::new();
        while let Some(c) = self.cursor.peek_char(0) {
            if c == ')' {
                break;
            }
            name.push(c);
            self.cursor.take();
        }
        if self.cursor.peek_char(0) != Some(')') {
            return Err(self.err_at(ParseErrorKind::MalformedNamedReference, open_pos));
        }
        self.cursor.take();
        let slot = self
            .captures
            .slot_for_name(&name)
            .ok_or_else(|| self.err_at(ParseErrorKind::UndefinedSubroutine, open_pos))?;
        self.push_atom(RegexNode::CallSubroutine { slot })
    }

    fn open_subroutine_by_relative_or_absolute_number(&mut self, open_pos: usize) -> Result<(), ParseError> {
        let sign = self.cursor.peek_char(0);
        if sign == Some('+') || sign == Some('-') {
            self.cursor.take();
        }
        let digits = self.take_digits();
        if digits.is_empty() || self.cursor.peek_char(0) != Some(')') {
            return Err(self.err_at(ParseErrorKind::UnrecognisedGrouping, open_pos));
        }
        self.cursor.take();
        let n: i32 = digits.parse().map_err(|_| self.err_at(ParseErrorKind::CaptureNumberOutOfRange, open_pos))?;
        let slot = match sign {
            Some('+') => self.captures.next_auto() + n - 1,
            Some('-') => self.captures.next_auto() - n,
            _ => n,
        };
        if !self.captures.is_defined(slot) || slot == 0 {
            return Err(self.err_at(ParseErrorKind::UndefinedSubroutine, open_pos));
        }
        self.push_atom(RegexNode::CallSubroutine { slot })
    }

    fn open_branch_reset(&mut self, open_pos: usize) {
        let start = self.captures.next_auto();
        self.push_frame(GroupKind::Plain, open_pos);
        self.top().branch_reset = Some(BranchResetFrame::new(start));
    }

    fn open_conditional(&mut self, open_pos: usize) -> Result<(), ParseError> {
        self.cursor.take(); // second '('
        if self.cursor.match_str("DEFINE") {
            if self.cursor.peek_char(0) != Some(')') {
                return Err(self.err_at(ParseErrorKind::UnrecognisedGrouping, open_pos));
            }
            self.cursor.take();
            self.push_frame(GroupKind::DefinitionGroup, open_pos);
            return Ok(());
        }

        // Numbered/named backreference condition: (?(N)...), (?(name)...).
        let save = self.cursor.i;
        let digits = self.take_digits();
        if !digits.is_empty() && self.cursor.peek_char(0) == Some(')') {
            self.cursor.take();
            let slot: i32 = digits.parse().unwrap_or(0);
            if slot == 0 {
                return Err(self.err_at(ParseErrorKind::GroupZeroReference, open_pos));
            }
            if !self.captures.is_defined(slot) {
                return Err(self.err_at(ParseErrorKind::UndefinedBackreference, open_pos));
            }
            self.push_frame(GroupKind::Testref { slot }, open_pos);
            return Ok(());
        }
        self.cursor.rewind_to(save);

        if self.cursor.peek_char(0) != Some(')') && self.cursor.peek_char(0) != Some('(') {
            let mut name = String::new();
            while let Some(c) = self.cursor.peek_char(0) {
                if c == ')' {
                    break;
                }
                name.push(c);
                self.cursor.take();
            }
            if self.cursor.peek_char(0) == Some(')') {
                if let Some(slot) = self.captures.slot_for_name(&name) {
                    self.cursor.take();
                    self.push_frame(GroupKind::Testref { slot }, open_pos);
                    return Ok(());
                }
            }
            self.cursor.rewind_to(save);
        }

        // Assertion condition: (?(?=...)yes|no), (?(?!...)yes|no), etc.
        // The single '(' already consumed above (as "second '('") is this
        // assertion group's own opening paren, so its `?=`/`?!`/`?<=`/
        // `?<!` marker is parsed inline here rather than via `open_group`
        // (which would expect a fresh, unconsumed leading '(').
        let prev_len = self.stack.len();
        match (self.cursor.peek_char(0), self.cursor.peek_char(1), self.cursor.peek_char(2)) {
            (Some('?'), Some('='), _) => {
                self.cursor.take();
                self.cursor.take();
                self.push_condition_lookaround(true, false, open_pos);
            }
            (Some('?'), Some('!'), _) => {
                self.cursor.take();
                self.cursor.take();
                self.push_condition_lookaround(false, false, open_pos);
            }
            (Some('?'), Some('<'), Some('=')) => {
                self.cursor.take();
                self.cursor.take();
                self.cursor.take();
                self.push_condition_lookaround(true, true, open_pos);
            }
            (Some('?'), Some('<'), Some('!')) => {
                self.cursor.take();
                self.cursor.take();
                self.cursor.take();
                self.push_condition_lookaround(false, true, open_pos);
            }
            _ => return Err(self.err_at(ParseErrorKind::UnrecognisedGrouping, open_pos)),
        }
        // Drive the ordinary dispatch loop until that frame closes via
        // its own trailing ')' (handled by `close_group`, which notices
        // `is_condition` and stashes the result in `pending_condition`
        // instead of appending it to the enclosing concatenation).
        self.drive_nested_group_to_close(prev_len)?;
        let condition_node = self
            .pending_condition
            .take()
            .ok_or_else(|| self.err_at(ParseErrorKind::UnrecognisedGrouping, open_pos))?;
        self.push_frame(GroupKind::Testgroup { condition: Box::new(condition_node) }, open_pos);
        Ok(())
    }

    /// Runs the ordinary per-character dispatch loop until the frame
    /// depth returns to `target_len`, i.e. until the just-opened
    /// assertion condition group closes itself via its own `)`. This is
    /// the one place the parser recurses into its own loop rather than
    /// looping at the top level, since a conditional's condition is a
    /// fully nested sub-grammar bounded to a single assertion group.
    fn drive_nested_group_to_close(&mut self, target_len: usize) -> Result<(), ParseError> {
        while self.stack.len() > target_len {
            self.skip_extended_trivia();
            if self.cursor.eof() {
                return Err(self.err(ParseErrorKind::NotEnoughParens));
            }
            let ch = self.cursor.peek_char(0).unwrap();
            match ch {
                '(' => self.open_group()?,
                ')' => self.close_group()?,
                '|' => self.alternate()?,
                '[' => {
                    let set = self.parse_class()?;
                    self.push_atom(set)?;
                }
                '\\' => {
                    let node = self.scan_escape()?;
                    self.push_atom(node)?;
                }
                '^' => {
                    self.cursor.take();
                    let node = self.make_bol();
                    self.push_atom_no_quantify_check(node);
                }
                '$' => {
                    self.cursor.take();
                    let node = self.make_eol();
                    self.push_atom_no_quantify_check(node);
                }
                '.' => {
                    self.cursor.take();
                    let node = self.make_dot();
                    self.push_atom(node)?;
                }
                _ => self.scan_literal_run()?,
            }
        }
        Ok(())
    }

    fn open_option_switch(&mut self, open_pos: usize) -> Result<(), ParseError> {
        let mut new_opts = self.options;
        let mut clearing = false;
        loop {
            match self.cursor.peek_char(0) {
                Some('-') => {
                    clearing = true;
                    self.cursor.take();
                }
                Some(':') | Some(')') => break,
                Some(c) => {
                    let applied = if clearing { new_opts.clear_letter(c) } else { new_opts.apply_letter(c) };
                    if !applied {
                        return Err(self.err_at(ParseErrorKind::UnrecognisedGrouping, open_pos));
                    }
                    self.cursor.take();
                }
                None => return Err(self.err_at(ParseErrorKind::UnrecognisedGrouping, open_pos)),
            }
        }
        match self.cursor.peek_char(0) {
            Some(':') => {
                self.cursor.take();
                self.options = new_opts;
                self.push_frame(GroupKind::Plain, open_pos);
                Ok(())
            }
            Some(')') => {
                self.cursor.take();
                // Tail-less switch: modifies the *enclosing* scope for
                // the remainder of the current group, with no new frame.
                self.options = new_opts;
                self.top().options = new_opts;
                Ok(())
            }
            _ => Err(self.err_at(ParseErrorKind::UnrecognisedGrouping, open_pos)),
        }
    }

    fn open_plain_or_capture(&mut self, open_pos: usize, _bare: bool) -> Result<(), ParseError> {
        if self.options.explicit_capture {
            self.push_frame(GroupKind::Plain, open_pos);
            return Ok(());
        }
        let slot = self.captures.next_auto_slot();
        self.captures.note_open(slot, open_pos);
        self.push_frame(GroupKind::Capture { slot, uncap: None }, open_pos);
        Ok(())
    }

    // ---- Character classes (§4.3.2) ------------------------------------

    fn parse_class(&mut self) -> Result<RegexNode, ParseError> {
        let open_pos = self.cursor.i;
        self.cursor.take(); // '['
        let mut builder = CharClassBuilder::new();
        if self.cursor.peek_char(0) == Some('^') {
            builder.set_negated(true);
            self.cursor.take();
        }
        let mut first = true;
        loop {
            match self.cursor.peek_char(0) {
                None => return Err(self.err_at(ParseErrorKind::UnterminatedBracket, open_pos)),
                Some(']') if !first => {
                    self.cursor.take();
                    break;
                }
                Some('[') if self.cursor.peek_char(1) == Some(':') => {
                    self.skip_posix_class();
                }
                Some('\\') => {
                    self.cursor.take();
                    self.scan_class_escape(&mut builder)?;
                }
                Some(lo) => {
                    self.cursor.take();
                    if self.cursor.peek_char(0) == Some('-')
                        && self.cursor.peek_char(1).is_some()
                        && self.cursor.peek_char(1) != Some(']')
                    {
                        self.cursor.take(); // '-'
                        let hi = if self.cursor.peek_char(0) == Some('\\') {
                            self.cursor.take();
                            self.scan_char_escape_literal(open_pos)?
                        } else {
                            self.cursor.take().unwrap()
                        };
                        builder
                            .add_range(lo, hi)
                            .map_err(|_| self.err_at(ParseErrorKind::ReversedClassRange, open_pos))?;
                    } else {
                        builder.add_char(lo);
                    }
                }
            }
            first = false;
        }
        if self.options.ignore_case {
            builder.apply_case_insensitive();
        }
        Ok(RegexNode::Set { set: builder.to_set_string(), flags: self.node_flags() })
    }

    fn skip_posix_class(&mut self) {
        self.cursor.take();
        self.cursor.take();
        while let Some(c) = self.cursor.peek_char(0) {
            if c == ':' && self.cursor.peek_char(1) == Some(']') {
                self.cursor.take();
                self.cursor.take();
                break;
            }
            self.cursor.take();
        }
    }

    fn scan_class_escape(&mut self, builder: &mut CharClassBuilder) -> Result<(), ParseError> {
        let pos = self.cursor.i;
        let ch = self.cursor.peek_char(0).ok_or_else(|| self.err_at(ParseErrorKind::IllegalEscapeAtEnd, pos))?;
        match ch {
            'd' | 'D' | 'w' | 'W' | 's' | 'S' => {
                self.cursor.take();
                builder.add_shorthand(ch, self.options.ecma_script);
                Ok(())
            }
            'p' | 'P' => {
                self.cursor.take();
                let (name, negate_prop) = self.scan_property_name(pos)?;
                builder.add_category(&name, (ch == 'P') ^ negate_prop);
                Ok(())
            }
            _ => {
                let literal = self.scan_char_escape_literal(pos)?;
                builder.add_char(literal);
                Ok(())
            }
        }
    }

    /// For the top-level `\` dispatch (outside a class): returns the
    /// fully formed node for whatever the escape denotes.
    fn scan_escape(&mut self) -> Result<RegexNode, ParseError> {
        let backslash_pos = self.cursor.i;
        self.cursor.take(); // '\'
        let ch = self
            .cursor
            .peek_char(0)
            .ok_or_else(|| self.err_at(ParseErrorKind::IllegalEscapeAtEnd, backslash_pos))?;

        let flags = self.node_flags();
        match ch {
            'b' => {
                self.cursor.take();
                Ok(if self.options.ecma_script { RegexNode::EcmaBoundary } else { RegexNode::Boundary })
            }
            'B' => {
                self.cursor.take();
                Ok(if self.options.ecma_script { RegexNode::NonEcmaBoundary } else { RegexNode::NonBoundary })
            }
            'A' => {
                self.cursor.take();
                Ok(RegexNode::Beginning)
            }
            'G' => {
                self.cursor.take();
                Ok(RegexNode::Start)
            }
            'z' => {
                self.cursor.take();
                Ok(RegexNode::End)
            }
            'Z' => {
                self.cursor.take();
                Ok(self.make_endz())
            }
            'K' => {
                self.cursor.take();
                Ok(RegexNode::ResetMatchStart)
            }
            'd' | 'D' | 'w' | 'W' | 's' | 'S' => {
                self.cursor.take();
                let mut builder = CharClassBuilder::new();
                builder.add_shorthand(ch, self.options.ecma_script);
                if self.options.ignore_case {
                    builder.apply_case_insensitive();
                }
                Ok(RegexNode::Set { set: builder.to_set_string(), flags })
            }
            'p' | 'P' => {
                self.cursor.take();
                let (name, negate_prop) = self.scan_property_name(backslash_pos)?;
                let mut builder = CharClassBuilder::new();
                builder.add_category(&name, (ch == 'P') ^ negate_prop);
                Ok(RegexNode::Set { set: builder.to_set_string(), flags })
            }
            'R' => {
                self.cursor.take();
                Ok(self.make_bsr())
            }
            'k' => {
                self.cursor.take();
                self.scan_named_backreference(backslash_pos)
            }
            'g' => {
                self.cursor.take();
                self.scan_g_backreference(backslash_pos)
            }
            '0'..='9' => self.scan_numeric_escape(backslash_pos),
            _ => {
                let literal = self.scan_char_escape_literal(backslash_pos)?;
                Ok(RegexNode::One { ch: literal, flags })
            }
        }
    }

    fn scan_property_name(&mut self, pos: usize) -> Result<(String, bool), ParseError> {
        if self.cursor.peek_char(0) == Some('{') {
            self.cursor.take();
            let mut name = String::new();
            while let Some(c) = self.cursor.peek_char(0) {
                if c == '}' {
                    break;
                }
                name.push(c);
                self.cursor.take();
            }
            if self.cursor.peek_char(0) != Some('}') {
                return Err(self.err_at(ParseErrorKind::IncompletePropertyName, pos));
            }
            self.cursor.take();
            if let Some(stripped) = name.strip_prefix('^') {
                Ok((stripped.to_string(), true))
            } else {
                Ok((name, false))
            }
        } else {
            let c = self.cursor.take().ok_or_else(|| self.err_at(ParseErrorKind::IncompletePropertyName, pos))?;
            Ok((c.to_string(), false))
        }
    }

    fn scan_named_backreference(&mut self, pos: usize) -> Result<RegexNode, ParseError> {
        let close = match self.cursor.peek_char(0) {
            Some('<') => '>',
            Some('\'') => '\'',
            Some('{') => '}',
            _ => return Err(self.err_at(ParseErrorKind::MalformedNamedReference, pos)),
        };
        self.cursor.take();
        let mut name = String::new();
        while let Some(c) = self.cursor.peek_char(0) {
            if c == close {
                break;
            }
            name.push(c);
            self.cursor.take();
        }
        if self.cursor.peek_char(0) != Some(close) {
            return Err(self.err_at(ParseErrorKind::MalformedNamedReference, pos));
        }
        self.cursor.take();
        let slot = self
            .captures
            .slot_for_name(&name)
            .ok_or_else(|| self.err_at(ParseErrorKind::UndefinedNamedReference, pos))?;
        Ok(RegexNode::Ref { slot, flags: self.node_flags() })
    }

    fn scan_g_backreference(&mut self, pos: usize) -> Result<RegexNode, ParseError> {
        match self.cursor.peek_char(0) {
            Some('{') => {
                self.cursor.take();
                let mut body = String::new();
                while let Some(c) = self.cursor.peek_char(0) {
                    if c == '}' {
                        break;
                    }
                    body.push(c);
                    self.cursor.take();
                }
                if self.cursor.peek_char(0) != Some('}') {
                    return Err(self.err_at(ParseErrorKind::MalformedNamedReference, pos));
                }
                self.cursor.take();
                self.resolve_g_body(&body, pos)
            }
            Some('<') => {
                self.cursor.take();
                let mut name = String::new();
                while let Some(c) = self.cursor.peek_char(0) {
                    if c == '>' {
                        break;
                    }
                    name.push(c);
                    self.cursor.take();
                }
                self.cursor.take();
                self.resolve_g_body(&name, pos)
            }
            Some('\'') => {
                self.cursor.take();
                let mut name = String::new();
                while let Some(c) = self.cursor.peek_char(0) {
                    if c == '\'' {
                        break;
                    }
                    name.push(c);
                    self.cursor.take();
                }
                self.cursor.take();
                self.resolve_g_body(&name, pos)
            }
            _ => {
                let digits = self.take_signed_digits();
                self.resolve_g_body(&digits, pos)
            }
        }
    }

    fn take_signed_digits(&mut self) -> String {
        let mut s = String::new();
        if matches!(self.cursor.peek_char(0), Some('+') | Some('-')) {
            s.push(self.cursor.take().unwrap());
        }
        s.push_str(&self.take_digits());
        s
    }

    fn resolve_g_body(&mut self, body: &str, pos: usize) -> Result<RegexNode, ParseError> {
        if let Ok(n) = body.parse::<i32>() {
            let slot = if body.starts_with('+') {
                self.captures.next_auto() + n - 1
            } else if body.starts_with('-') {
                self.captures.next_auto() + n
            } else {
                n
            };
            if slot == 0 {
                return Err(self.err_at(ParseErrorKind::GroupZeroReference, pos));
            }
            if !self.captures.is_defined(slot) {
                return Err(self.err_at(ParseErrorKind::UndefinedBackreference, pos));
            }
            return Ok(RegexNode::Ref { slot, flags: self.node_flags() });
        }
        let slot = self
            .captures
            .slot_for_name(body)
            .ok_or_else(|| self.err_at(ParseErrorKind::UndefinedNamedReference, pos))?;
        Ok(RegexNode::Ref { slot, flags: self.node_flags() })
    }

    fn scan_numeric_escape(&mut self, pos: usize) -> Result<RegexNode, ParseError> {
        if self.cursor.peek_char(0) == Some('0') {
            self.cursor.take();
            let mut digits = String::new();
            for _ in 0..2 {
                match self.cursor.peek_char(0) {
                    Some(c) if ('0'..='7').contains(&c) => {
                        digits.push(c);
                        self.cursor.take();
                    }
                    _ => break,
                }
            }
            let value = u32::from_str_radix(&digits, 8).unwrap_or(0);
            let ch = char::from_u32(value).unwrap_or('\0');
            return Ok(RegexNode::One { ch, flags: self.node_flags() });
        }

        let start = self.cursor.i;
        let digits = self.take_digits();
        if self.options.ecma_script {
            let mut len = digits.len();
            loop {
                let n: i32 = digits[..len].parse().unwrap_or(0);
                if n != 0 && self.captures.is_defined(n) {
                    self.cursor.rewind_to(start + len);
                    return Ok(RegexNode::Ref { slot: n, flags: self.node_flags() });
                }
                if len <= 1 {
                    break;
                }
                len -= 1;
            }
            self.cursor.rewind_to(start);
            let ch = self.cursor.take().unwrap();
            return Ok(RegexNode::One { ch, flags: self.node_flags() });
        }

        let n: i32 = digits.parse().map_err(|_| self.err_at(ParseErrorKind::UndefinedBackreference, pos))?;
        if n == 0 {
            return Err(self.err_at(ParseErrorKind::GroupZeroReference, pos));
        }
        if !self.captures.is_defined(n) {
            return Err(self.err_at(ParseErrorKind::UndefinedBackreference, pos));
        }
        Ok(RegexNode::Ref { slot: n, flags: self.node_flags() })
    }

    /// Scans one character escape to its literal `char` value, used
    /// both for top-level `\x`/`\c`/etc. escapes and inside character
    /// classes. Assumes the leading `\` has already been consumed and
    /// the cursor sits on the letter/digit after it.
    fn scan_char_escape_literal(&mut self, pos: usize) -> Result<char, ParseError> {
        let ch = self
            .cursor
            .take()
            .ok_or_else(|| self.err_at(ParseErrorKind::IllegalEscapeAtEnd, pos))?;
        match ch {
            'a' => Ok('\u{07}'),
            'b' => Ok('\u{08}'),
            'e' => Ok('\u{1B}'),
            'f' => Ok('\u{0C}'),
            'n' => Ok('\n'),
            'r' => Ok('\r'),
            't' => Ok('\t'),
            'v' => Ok('\u{0B}'),
            'c' => {
                let control = self.cursor.take().ok_or_else(|| self.err_at(ParseErrorKind::MissingControlChar, pos))?;
                let upper = control.to_ascii_uppercase();
                Ok(char::from_u32((upper as u32) ^ 0x40).unwrap_or('\0'))
            }
            'x' => {
                if self.cursor.peek_char(0) == Some('{') {
                    self.cursor.take();
                    let mut hex = String::new();
                    while let Some(c) = self.cursor.peek_char(0) {
                        if c == '}' {
                            break;
                        }
                        hex.push(c);
                        self.cursor.take();
                    }
                    if hex.is_empty() || self.cursor.peek_char(0) != Some('}') {
                        return Err(self.err_at(ParseErrorKind::TooFewHexDigits, pos));
                    }
                    self.cursor.take();
                    let value = u32::from_str_radix(&hex, 16).map_err(|_| self.err_at(ParseErrorKind::TooFewHexDigits, pos))?;
                    char::from_u32(value).ok_or_else(|| self.err_at(ParseErrorKind::TooFewHexDigits, pos))
                } else {
                    let mut hex = String::new();
                    for _ in 0..2 {
                        match self.cursor.peek_char(0) {
                            Some(c) if c.is_ascii_hexdigit() => {
                                hex.push(c);
                                self.cursor.take();
                            }
                            _ => break,
                        }
                    }
                    if hex.is_empty() {
                        return Err(self.err_at(ParseErrorKind::TooFewHexDigits, pos));
                    }
                    let value = u32::from_str_radix(&hex, 16).unwrap_or(0);
                    Ok(char::from_u32(value).unwrap_or('\0'))
                }
            }
            'u' => {
                let mut hex = String::new();
                for _ in 0..4 {
                    match self.cursor.peek_char(0) {
                        Some(c) if c.is_ascii_hexdigit() => {
                            hex.push(c);
                            self.cursor.take();
                        }
                        _ => break,
                    }
                }
                if hex.len() < 4 {
                    return Err(self.err_at(ParseErrorKind::TooFewHexDigits, pos));
                }
                let value = u32::from_str_radix(&hex, 16).unwrap_or(0);
                char::from_u32(value).ok_or_else(|| self.err_at(ParseErrorKind::TooFewHexDigits, pos))
            }
            c if c.is_ascii_alphabetic() => {
                if self.options.extra {
                    Err(self.err_at(ParseErrorKind::UnrecognisedEscape, pos))
                } else {
                    Ok(c)
                }
            }
            c => Ok(c),
        }
    }

    // ---- Newline-convention pseudo-nodes (§4.3.5) ----------------------

    fn newline_chars(&self) -> Vec<char> {
        match self.options.newline {
            NewlineMode::Lf => vec!['\n'],
            NewlineMode::Cr => vec!['\r'],
            NewlineMode::Crlf => vec!['\r', '\n'],
            NewlineMode::AnyCrlf => vec!['\r', '\n'],
            NewlineMode::Any => vec!['\r', '\n', '\u{0B}', '\u{0C}', '\u{85}', '\u{2028}', '\u{2029}'],
        }
    }

    fn make_dot(&self) -> RegexNode {
        let mut builder = CharClassBuilder::new();
        builder.set_negated(true);
        if !self.options.singleline {
            for c in self.newline_chars() {
                builder.add_char(c);
            }
        }
        RegexNode::Set { set: builder.to_set_string(), flags: self.node_flags() }
    }

    fn make_bol(&self) -> RegexNode {
        if self.options.multiline {
            if matches!(self.options.newline, NewlineMode::Lf) {
                RegexNode::Bol
            } else {
                // Synthesised: \A or preceded by one of the newline chars.
                RegexNode::Require {
                    child: Box::new(self.build_newline_lookbehind()),
                }
            }
        } else {
            RegexNode::Beginning
        }
    }

    fn make_eol(&self) -> RegexNode {
        if self.options.dollar_end_only && !self.options.multiline {
            return self.make_endz();
        }
        if self.options.multiline {
            if matches!(self.options.newline, NewlineMode::Lf) {
                RegexNode::Eol
            } else {
                RegexNode::Require { child: Box::new(self.build_newline_lookahead()) }
            }
        } else if matches!(self.options.newline, NewlineMode::Lf) {
            RegexNode::Eol
        } else {
            RegexNode::Require { child: Box::new(self.build_newline_lookahead()) }
        }
    }

    /// `\Z` under a non-LF convention synthesises a lookahead over an
    /// optional newline sequence followed by `\z` (§4.3.4).
    fn make_endz(&self) -> RegexNode {
        if matches!(self.options.newline, NewlineMode::Lf) {
            return RegexNode::EndZ;
        }
        RegexNode::Require { child: Box::new(self.build_newline_lookahead()) }
    }

    fn newline_set_node(&self) -> RegexNode {
        let mut builder = CharClassBuilder::new();
        for c in self.newline_chars() {
            builder.add_char(c);
        }
        RegexNode::Set { set: builder.to_set_string(), flags: self.node_flags() }
    }

    /// `(?>crlf|[newline-chars])?\z`-shaped lookahead, atomic so it
    /// commits to the longest terminator it can find.
    fn build_newline_lookahead(&self) -> RegexNode {
        let optional_terminator = if matches!(self.options.newline, NewlineMode::Crlf | NewlineMode::AnyCrlf | NewlineMode::Any) {
            let crlf = RegexNode::Multi { text: "\r\n".to_string(), flags: self.node_flags() };
            let alt = RegexNode::Alternate { children: vec![crlf, self.newline_set_node()] };
            RegexNode::Greedy { child: Box::new(alt) }
        } else {
            self.newline_set_node()
        };
        RegexNode::Concatenate {
            children: vec![
                RegexNode::Loop { min: 0, max: 1, child: Box::new(optional_terminator) },
                RegexNode::End,
            ],
        }
    }

    fn build_newline_lookbehind(&self) -> RegexNode {
        RegexNode::Alternate {
            children: vec![RegexNode::Beginning, self.newline_set_node()],
        }
    }

    /// `\R`: atomic alternation of `\r\n`, `\r`, `\n`, and (Unicode/UTF-8
    /// mode) VT, FF, NEL, LS, PS, per §4.3.4.
    fn make_bsr(&self) -> RegexNode {
        let flags = self.node_flags();
        let mut alts = vec![
            RegexNode::Multi { text: "\r\n".to_string(), flags },
            RegexNode::One { ch: '\r', flags },
            RegexNode::One { ch: '\n', flags },
        ];
        if matches!(self.options.bsr, crate::core::options::BsrMode::Unicode) {
            for c in ['\u{0B}', '\u{0C}', '\u{85}', '\u{2028}', '\u{2029}'] {
                alts.push(RegexNode::One { ch: c, flags });
            }
        }
        RegexNode::Greedy { child: Box::new(RegexNode::Alternate { children: alts }) }
    }
}

fn is_special(ch: char, extended: bool) -> bool {
    if extended && (ch.is_whitespace() || ch == '#') {
        return true;
    }
    matches!(ch, '(' | ')' | '|' | '[' | '\\' | '^' | '$' | '.' | '*' | '+' | '?' | '{')
}

/// Capture prescan (§4.2): a single pass over the body, with no AST
/// emission, that mimics the main parser's tokenisation closely enough
/// to populate `caps`/`capnames`/`captop` before the real parse begins
/// (back-references and subroutine calls need the full table up front,
/// including ones that appear textually before their target).
fn prescan_captures(body: &str, initial_options: &Options) -> Result<CaptureState, ParseErrorKind> {
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0usize;
    let mut captures = CaptureState::new();
    let mut options = *initial_options;
    let mut ignore_next_paren = false;
    let mut branch_stack: Vec<(i32, i32)> = Vec::new(); // (start_autocap, max_autocap)

    while i < chars.len() {
        let c = chars[i];
        if options.extended && c.is_whitespace() {
            i += 1;
            continue;
        }
        if options.extended && c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        match c {
            '\\' => {
                i += 1;
                i = prescan_skip_escape(&chars, i);
            }
            '[' => {
                i += 1;
                i = prescan_skip_class(&chars, i);
            }
            '(' => {
                if chars.get(i + 1) == Some(&'?') && chars.get(i + 2) == Some(&'#') {
                    i += 3;
                    while i < chars.len() && chars[i] != ')' {
                        i += 1;
                    }
                    i += 1;
                    continue;
                }
                if chars.get(i + 1) == Some(&'*') {
                    i += 2;
                    while i < chars.len() && chars[i] != ')' {
                        i += 1;
                    }
                    i += 1;
                    continue;
                }
                if chars.get(i + 1) == Some(&'?') {
                    let (new_i, kind) = prescan_group_tail(&chars, i + 2);
                    i = new_i;
                    match kind {
                        PrescanGroupKind::Named(name) => {
                            let slot = captures.next_auto_slot();
                            captures.note_open(slot, i);
                            captures.note_name(&name, slot, options.dup_names)?;
                        }
                        PrescanGroupKind::BranchReset => {
                            branch_stack.push((captures.next_auto(), captures.next_auto()));
                        }
                        PrescanGroupKind::Conditional => {
                            ignore_next_paren = true;
                        }
                        PrescanGroupKind::OptionsInline(on, off) => {
                            for ch in on.chars() {
                                options.apply_letter(ch);
                            }
                            for ch in off.chars() {
                                options.clear_letter(ch);
                            }
                        }
                        PrescanGroupKind::Other => {}
                    }
                } else {
                    i += 1;
                    if ignore_next_paren {
                        ignore_next_paren = false;
                    } else if !options.explicit_capture {
                        let slot = captures.next_auto_slot();
                        captures.note_open(slot, i);
                    }
                }
            }
            ')' => {
                i += 1;
                if let Some((start, max)) = branch_stack.pop() {
                    let observed_max = captures.next_auto().max(max);
                    captures.set_next_auto(observed_max);
                    let _ = start;
                }
            }
            '|' => {
                i += 1;
                if let Some((start, max)) = branch_stack.last_mut() {
                    *max = (*max).max(captures.next_auto());
                    captures.set_next_auto(*start);
                }
            }
            _ => {
                i += 1;
            }
        }
    }
    captures.assign_name_slots();
    Ok(captures)
}

enum PrescanGroupKind {
    Named(String),
    BranchReset,
    Conditional,
    OptionsInline(String, String),
    Other,
}

fn prescan_group_tail(chars: &[char], mut i: usize) -> (usize, PrescanGroupKind) {
    match chars.get(i) {
        Some('P') if chars.get(i + 1) == Some(&'<') => {
            i += 2;
            let (name, new_i) = prescan_take_until(chars, i, '>');
            (new_i, PrescanGroupKind::Named(name))
        }
        Some('P') => (i + 1, PrescanGroupKind::Other),
        Some('<') if chars.get(i + 1) == Some(&'=') || chars.get(i + 1) == Some(&'!') => {
            (i + 2, PrescanGroupKind::Other)
        }
        Some('<') => {
            i += 1;
            let (name, new_i) = prescan_take_until(chars, i, '>');
            (new_i, PrescanGroupKind::Named(name))
        }
        Some('\'') => {
            i += 1;
            let (name, new_i) = prescan_take_until(chars, i, '\'');
            (new_i, PrescanGroupKind::Named(name))
        }
        Some('|') => (i + 1, PrescanGroupKind::BranchReset),
        Some('(') => (i + 1, PrescanGroupKind::Conditional),
        Some(c) if *c == ':' || *c == '=' || *c == '!' || *c == '>' || *c == '&' || *c == 'R' => {
            (i + 1, PrescanGroupKind::Other)
        }
        Some(c) if c.is_ascii_digit() || *c == '+' || *c == '-' => (i + 1, PrescanGroupKind::Other),
        Some(_) => {
            let mut on = String::new();
            let mut off = String::new();
            let mut clearing = false;
            while let Some(c) = chars.get(i) {
                if *c == ':' || *c == ')' {
                    break;
                }
                if *c == '-' {
                    clearing = true;
                } else if clearing {
                    off.push(*c);
                } else {
                    on.push(*c);
                }
                i += 1;
            }
            (i, PrescanGroupKind::OptionsInline(on, off))
        }
        None => (i, PrescanGroupKind::Other),
    }
}

fn prescan_take_until(chars: &[char], mut i: usize, close: char) -> (String, usize) {
    let mut s = String::new();
    while let Some(c) = chars.get(i) {
        if *c == close {
            i += 1;
            break;
        }
        s.push(*c);
        i += 1;
    }
    (s, i)
}

fn prescan_skip_escape(chars: &[char], mut i: usize) -> usize {
    match chars.get(i) {
        Some('x') => {
            i += 1;
            if chars.get(i) == Some(&'{') {
                i += 1;
                while let Some(c) = chars.get(i) {
                    i += 1;
                    if *c == '}' {
                        break;
                    }
                }
            } else {
                for _ in 0..2 {
                    if matches!(chars.get(i), Some(c) if c.is_ascii_hexdigit()) {
                        i += 1;
                    }
                }
            }
            i
        }
        Some('u') => {
            i += 1;
            for _ in 0..4 {
                if matches!(chars.get(i), Some(c) if c.is_ascii_hexdigit()) {
                    i += 1;
                }
            }
            i
        }
        Some('p') | Some('P') => {
            i += 1;
            if chars.get(i) == Some(&'{') {
                while let Some(c) = chars.get(i) {
                    i += 1;
                    if *c == '}' {
                        break;
                    }
                }
            } else {
                i += 1;
            }
            i
        }
        Some('k') => {
            i += 1;
            let close = match chars.get(i) {
                Some('<') => Some('>'),
                Some('\'') => Some('\''),
                Some('{') => Some('}'),
                _ => None,
            };
            if let Some(close) = close {
                i += 1;
                while let Some(c) = chars.get(i) {
                    i += 1;
                    if *c == close {
                        break;
                    }
                }
            }
            i
        }
        Some('g') => {
            i += 1;
            match chars.get(i) {
                Some('{') | Some('<') | Some('\'') => {
                    let close = match chars.get(i) {
                        Some('{') => '}',
                        Some('<') => '>',
                        _ => '\'',
                    };
                    i += 1;
                    while let Some(c) = chars.get(i) {
                        i += 1;
                        if *c == close {
                            break;
                        }
                    }
                    i
                }
                _ => {
                    if matches!(chars.get(i), Some('+') | Some('-')) {
                        i += 1;
                    }
                    while matches!(chars.get(i), Some(c) if c.is_ascii_digit()) {
                        i += 1;
                    }
                    i
                }
            }
        }
        Some(_) => i + 1,
        None => i,
    }
}

fn prescan_skip_class(chars: &[char], mut i: usize) -> usize {
    if chars.get(i) == Some(&'^') {
        i += 1;
    }
    let mut first = true;
    loop {
        match chars.get(i) {
            None => return i,
            Some(']') if !first => return i + 1,
            Some('\\') => {
                i += 1;
                i = prescan_skip_escape(chars, i + 1) - 1;
                i += 1;
            }
            Some(_) => i += 1,
        }
        first = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::Options;

    fn parse_ok(pattern: &str) -> RegexNode {
        Parser::new(pattern, Options::new()).unwrap().parse().unwrap().0
    }

    #[test]
    fn parses_simple_literal() {
        let node = parse_ok("abc");
        match node {
            RegexNode::Capture { slot: 0, child, .. } => match *child {
                RegexNode::Multi { text, .. } => assert_eq!(text, "abc"),
                other => panic!("unexpected: {other:?}"),
            },
            other => panic!("unexpected root: {other:?}"),
        }
    }

    #[test]
    fn parses_three_captures() {
        let node = parse_ok("(foo)(bar)(baz)");
        let opts = Options::new();
        let mut p = Parser::new("(foo)(bar)(baz)", opts).unwrap();
        assert_eq!(p.captures.captop, 4);
        let _ = node;
    }

    #[test]
    fn nothing_to_quantify_errors() {
        let err = Parser::new("*abc", Options::new()).unwrap().parse().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NothingToQuantify);
    }

    #[test]
    fn nested_quantifier_errors() {
        let err = Parser::new("a**", Options::new()).unwrap().parse().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NestedQuantifier);
    }

    #[test]
    fn unmatched_close_paren_errors() {
        let err = Parser::new("a)", Options::new()).unwrap().parse().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TooManyParens);
    }

    #[test]
    fn unmatched_open_paren_errors() {
        let err = Parser::new("(a", Options::new()).unwrap().parse().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NotEnoughParens);
    }

    #[test]
    fn named_group_and_backreference() {
        let node = parse_ok("(?<foo>a)\\k<foo>");
        let _ = node;
    }

    #[test]
    fn branch_reset_shares_slots() {
        let opts = Options::new();
        let p = Parser::new("(?|(a)|(b)|(c))", opts).unwrap();
        assert_eq!(p.captures.captop, 2);
    }

    #[test]
    fn quantifier_on_group_produces_loop_node() {
        let node = parse_ok("(?:ab)+");
        match node {
            RegexNode::Capture { child, .. } => match *child {
                RegexNode::Loop { min, max, .. } => {
                    assert_eq!(min, 1);
                    assert_eq!(max, UNBOUNDED);
                }
                other => panic!("unexpected: {other:?}"),
            },
            other => panic!("unexpected root: {other:?}"),
        }
    }
}
