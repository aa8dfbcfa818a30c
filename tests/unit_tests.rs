//! Per-feature parser tests, one module per grammar area, each driving
//! `Parser` directly and asserting on the resulting `RegexNode` shape.

use pcre_regex_core::core::capture::CaptureState;
use pcre_regex_core::core::nodes::{RegexNode, Verb};
use pcre_regex_core::core::options::Options;
use pcre_regex_core::core::parser::Parser;
use pcre_regex_core::ParseErrorKind;

fn parse(pattern: &str) -> (RegexNode, CaptureState) {
    Parser::new(pattern, Options::new()).unwrap().parse().unwrap()
}

fn parse_err(pattern: &str) -> ParseErrorKind {
    match Parser::new(pattern, Options::new()) {
        Err(e) => e.kind,
        Ok(p) => p.parse().unwrap_err().kind,
    }
}

fn body(tree: &RegexNode) -> &RegexNode {
    match tree {
        RegexNode::Capture { slot: 0, child, .. } => child.as_ref(),
        other => panic!("expected root Capture(slot=0), got {other:?}"),
    }
}

#[cfg(test)]
mod anchors {
    use super::*;

    #[test]
    fn caret_is_bol() {
        let (tree, _) = parse("^a");
        match body(&tree) {
            RegexNode::Concatenate { children } => assert!(matches!(children[0], RegexNode::Bol)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn backslash_a_is_beginning() {
        let (tree, _) = parse(r"\Aa");
        match body(&tree) {
            RegexNode::Concatenate { children } => {
                assert!(matches!(children[0], RegexNode::Beginning))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn backslash_z_is_end() {
        let (tree, _) = parse(r"a\z");
        match body(&tree) {
            RegexNode::Concatenate { children } => assert!(matches!(children[1], RegexNode::End)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn backslash_cap_z_is_endz() {
        let (tree, _) = parse(r"a\Z");
        match body(&tree) {
            RegexNode::Concatenate { children } => {
                assert!(matches!(children[1], RegexNode::EndZ))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn word_boundary_escapes() {
        let (tree, _) = parse(r"\ba\B");
        match body(&tree) {
            RegexNode::Concatenate { children } => {
                assert!(matches!(children[0], RegexNode::Boundary));
                assert!(matches!(children[2], RegexNode::NonBoundary));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn multiple_anchors_in_a_row_are_kept_distinct() {
        let (tree, _) = parse("^^^");
        match body(&tree) {
            RegexNode::Concatenate { children } => {
                assert_eq!(children.len(), 3);
                assert!(children.iter().all(|c| matches!(c, RegexNode::Bol)));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}

#[cfg(test)]
mod literals_and_escapes {
    use super::*;

    #[test]
    fn plain_run_becomes_multi() {
        let (tree, _) = parse("hello");
        match body(&tree) {
            RegexNode::Multi { text, .. } => assert_eq!(text, "hello"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn single_char_stays_one() {
        let (tree, _) = parse("a");
        match body(&tree) {
            RegexNode::One { ch, .. } => assert_eq!(*ch, 'a'),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn hex_escape_produces_literal_char() {
        let (tree, _) = parse(r"\x41");
        match body(&tree) {
            RegexNode::One { ch, .. } => assert_eq!(*ch, 'A'),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn control_escape_resolves_to_literal_char() {
        let (tree, _) = parse(r"\n");
        match body(&tree) {
            RegexNode::One { ch, .. } => assert_eq!(*ch, '\n'),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn dot_lowers_to_a_negated_newline_set() {
        let (tree, _) = parse(".");
        match body(&tree) {
            RegexNode::Set { .. } => {}
            other => panic!("unexpected dot lowering: {other:?}"),
        }
    }

    #[test]
    fn trailing_backslash_errors() {
        assert_eq!(parse_err("abc\\"), ParseErrorKind::IllegalEscapeAtEnd);
    }
}

#[cfg(test)]
mod quantifiers {
    use super::*;
    use pcre_regex_core::core::nodes::UNBOUNDED;

    #[test]
    fn star_is_unbounded_loop() {
        let (tree, _) = parse("a*");
        match body(&tree) {
            RegexNode::Oneloop { min, max, .. } => {
                assert_eq!(*min, 0);
                assert_eq!(*max, UNBOUNDED);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn plus_requires_one() {
        let (tree, _) = parse("a+");
        match body(&tree) {
            RegexNode::Oneloop { min, max, .. } => {
                assert_eq!(*min, 1);
                assert_eq!(*max, UNBOUNDED);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn question_mark_is_zero_or_one() {
        let (tree, _) = parse("a?");
        match body(&tree) {
            RegexNode::Oneloop { min, max, .. } => {
                assert_eq!(*min, 0);
                assert_eq!(*max, 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn lazy_star_becomes_lazy_node() {
        let (tree, _) = parse("a*?");
        match body(&tree) {
            RegexNode::Onelazy { min, max, .. } => {
                assert_eq!(*min, 0);
                assert_eq!(*max, UNBOUNDED);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn possessive_plus_wraps_in_greedy() {
        let (tree, _) = parse("a++");
        match body(&tree) {
            RegexNode::Greedy { child } => assert!(matches!(**child, RegexNode::Oneloop { .. })),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn brace_quantifier_sets_bounds() {
        let (tree, _) = parse("a{2,5}");
        match body(&tree) {
            RegexNode::Oneloop { min, max, .. } => {
                assert_eq!(*min, 2);
                assert_eq!(*max, 5);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn quantifier_on_a_group_wraps_a_loop_node() {
        let (tree, _) = parse("(ab)+");
        match body(&tree) {
            RegexNode::Loop { child, min, .. } => {
                assert_eq!(*min, 1);
                assert!(matches!(**child, RegexNode::Capture { .. }));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unrecognised_brace_is_a_literal() {
        let (tree, _) = parse("a{z}");
        match body(&tree) {
            RegexNode::Concatenate { children } => assert_eq!(children.len(), 4),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn nothing_to_quantify_errors() {
        assert_eq!(parse_err("*abc"), ParseErrorKind::NothingToQuantify);
    }

    #[test]
    fn nested_quantifier_errors() {
        assert_eq!(parse_err("a**"), ParseErrorKind::NestedQuantifier);
    }

    #[test]
    fn reversed_brace_range_errors() {
        assert_eq!(parse_err("a{5,2}"), ParseErrorKind::IllegalRange);
    }
}

#[cfg(test)]
mod groups {
    use super::*;

    #[test]
    fn plain_group_captures_slot_one() {
        let (tree, captures) = parse("(a)");
        match body(&tree) {
            RegexNode::Capture { slot, .. } => assert_eq!(*slot, 1),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(captures.is_defined(1));
    }

    #[test]
    fn non_capturing_group_is_plain() {
        let (tree, _) = parse("(?:ab)");
        match body(&tree) {
            RegexNode::Group { .. } => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn named_group_records_name() {
        let (_, captures) = parse("(?<word>a)");
        assert_eq!(captures.slot_for_name("word"), Some(1));
    }

    #[test]
    fn atomic_group_is_greedy_node() {
        let (tree, _) = parse("(?>a)");
        match body(&tree) {
            RegexNode::Greedy { .. } => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn nested_groups_nest_capture_nodes() {
        let (tree, _) = parse("((a))");
        match body(&tree) {
            RegexNode::Capture { child, .. } => {
                assert!(matches!(**child, RegexNode::Capture { .. }))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unbalanced_open_paren_errors() {
        assert_eq!(parse_err("(a"), ParseErrorKind::NotEnoughParens);
    }

    #[test]
    fn unbalanced_close_paren_errors() {
        assert_eq!(parse_err("a)"), ParseErrorKind::TooManyParens);
    }

    #[test]
    fn branch_reset_shares_slots_across_alternatives() {
        let (_, captures) = parse("(?|(a)|(b))");
        assert_eq!(captures.captop, 2);
    }

    #[test]
    fn duplicate_name_without_dup_names_errors() {
        assert_eq!(parse_err("(?<w>a)(?<w>b)"), ParseErrorKind::DuplicateName);
    }
}

#[cfg(test)]
mod lookarounds {
    use super::*;

    #[test]
    fn positive_lookahead_is_require() {
        let (tree, _) = parse("(?=a)");
        match body(&tree) {
            RegexNode::Require { .. } => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn negative_lookahead_is_prevent() {
        let (tree, _) = parse("(?!a)");
        match body(&tree) {
            RegexNode::Prevent { .. } => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn positive_lookbehind_is_require() {
        let (tree, _) = parse("(?<=a)");
        match body(&tree) {
            RegexNode::Require { .. } => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn negative_lookbehind_is_prevent() {
        let (tree, _) = parse("(?<!a)");
        match body(&tree) {
            RegexNode::Prevent { .. } => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn lookahead_followed_by_more_pattern_stays_in_sequence() {
        let (tree, _) = parse("a(?=b)");
        match body(&tree) {
            RegexNode::Concatenate { children } => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[1], RegexNode::Require { .. }));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}

#[cfg(test)]
mod alternation {
    use super::*;

    #[test]
    fn pipe_produces_alternate() {
        let (tree, _) = parse("a|b|c");
        match body(&tree) {
            RegexNode::Alternate { children } => assert_eq!(children.len(), 3),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn empty_alternative_is_allowed() {
        let (tree, _) = parse("a|");
        match body(&tree) {
            RegexNode::Alternate { children } => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[1], RegexNode::Empty));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn branches_are_concatenations_when_multi_atom() {
        let (tree, _) = parse("ab|cd");
        match body(&tree) {
            RegexNode::Alternate { children } => {
                assert_eq!(children.len(), 2);
                for child in children {
                    assert!(matches!(child, RegexNode::Multi { .. }));
                }
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}

#[cfg(test)]
mod backreferences_and_conditionals {
    use super::*;

    #[test]
    fn numeric_backreference_resolves_to_ref_node() {
        let (tree, _) = parse(r"(a)\1");
        match body(&tree) {
            RegexNode::Concatenate { children } => {
                assert!(matches!(children[1], RegexNode::Ref { slot: 1, .. }))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn undefined_backreference_errors() {
        assert_eq!(parse_err(r"\1"), ParseErrorKind::UndefinedBackreference);
    }

    #[test]
    fn named_backreference_via_k() {
        let (tree, _) = parse(r"(?<w>a)\k<w>");
        match body(&tree) {
            RegexNode::Concatenate { children } => {
                assert!(matches!(children[1], RegexNode::Ref { slot: 1, .. }))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn numeric_conditional_is_testref() {
        let (tree, _) = parse(r"(a)(?(1)b|c)");
        match body(&tree) {
            RegexNode::Concatenate { children } => {
                assert!(matches!(children[1], RegexNode::Testref { slot: 1, .. }))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn assertion_conditional_is_testgroup() {
        let (tree, _) = parse(r"(?(?=a)b|c)");
        match body(&tree) {
            RegexNode::Testgroup { .. } => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn subroutine_call_holds_a_slot_not_a_pointer() {
        let (tree, _) = parse(r"(a)(?1)");
        match body(&tree) {
            RegexNode::Concatenate { children } => {
                assert!(matches!(children[1], RegexNode::CallSubroutine { slot: 1 }))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}

#[cfg(test)]
mod verbs {
    use super::*;

    #[test]
    fn accept_verb_is_backtracking_verb_node() {
        let (tree, _) = parse("a(*ACCEPT)b");
        match body(&tree) {
            RegexNode::Concatenate { children } => assert!(matches!(
                children[1],
                RegexNode::BacktrackingVerb { verb: Verb::Accept, .. }
            )),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn fail_verb_lowers_to_nothing() {
        let (tree, _) = parse("a(*FAIL)");
        match body(&tree) {
            RegexNode::Concatenate { children } => {
                assert!(matches!(children[1], RegexNode::Nothing))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_verb_errors() {
        assert_eq!(parse_err("(*NOTAVERB)"), ParseErrorKind::UnknownVerb);
    }
}

#[cfg(test)]
mod newline_conventions {
    use super::*;
    use pcre_regex_core::core::options::NewlineMode;
    use pcre_regex_core::preprocess;

    #[test]
    fn crlf_pragma_changes_newline_mode() {
        let p = preprocess("/(*CRLF)^a/").unwrap();
        assert_eq!(p.options.newline, NewlineMode::Crlf);
    }

    #[test]
    fn default_newline_mode_is_lf() {
        let p = preprocess("/a/").unwrap();
        assert_eq!(p.options.newline, NewlineMode::Lf);
    }
}

#[cfg(test)]
mod errors {
    use super::*;

    #[test]
    fn unterminated_class_errors() {
        assert_eq!(parse_err("[abc"), ParseErrorKind::UnterminatedBracket);
    }

    #[test]
    fn reversed_class_range_errors() {
        assert_eq!(parse_err("[z-a]"), ParseErrorKind::ReversedClassRange);
    }

    #[test]
    fn empty_pattern_errors() {
        let err = Parser::new("", Options::new()).unwrap().parse().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::EmptyRegex);
    }
}
