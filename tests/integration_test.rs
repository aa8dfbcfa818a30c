//! End-to-end tests driving the crate's public entry points: `compile`,
//! `preprocess`, the escape/replacement helpers, and bytecode validation
//! together, rather than any single module in isolation.

use pcre_regex_core::core::escape::{escape, unescape};
use pcre_regex_core::core::replacement::{parse_replacement, ReplacementPart};
use pcre_regex_core::core::utf16;
use pcre_regex_core::core::validator::validate;
use pcre_regex_core::{compile, preprocess, Options, Parser};

#[test]
fn compile_runs_the_whole_pipeline_and_produces_valid_bytecode() {
    let code = compile("/(foo|bar)+baz/i").expect("pattern should compile");
    assert!(code.cap_size >= 1);
    validate(&code).expect("writer output must be well-formed");
}

#[test]
fn compile_surfaces_a_structured_error_on_bad_syntax() {
    let err = compile("/(foo/").unwrap_err();
    let diagnostic = err.to_lsp_diagnostic();
    assert_eq!(diagnostic["source"].as_str(), Some("pcre-regex-core"));
    assert!(diagnostic["message"].is_string());
}

#[test]
fn compile_rejects_an_unterminated_pattern_with_no_end_delimiter() {
    let err = compile("/abc").unwrap_err();
    assert_eq!(err.kind, pcre_regex_core::ParseErrorKind::NoEndDelimiter);
}

#[test]
fn trailing_modifiers_affect_the_compiled_program() {
    let case_sensitive = compile("/abc/").unwrap();
    let case_insensitive = compile("/abc/i").unwrap();
    assert_ne!(
        serde_json::to_string(&case_sensitive).unwrap(),
        serde_json::to_string(&case_insensitive).unwrap()
    );
}

#[test]
fn preprocess_then_parse_then_transform_then_write_matches_compile() {
    let pattern = "/a\u{E0}\u{A0}\u{80}z/";
    let preprocessed = preprocess(pattern).unwrap();
    let parser = Parser::new(&preprocessed.body, preprocessed.options).unwrap();
    let (tree, captures) = parser.parse().unwrap();
    let transformed = utf16::transform(&tree);
    let code = pcre_regex_core::write(&transformed, &captures, &preprocessed.options);
    validate(&code).unwrap();

    let via_compile = compile(pattern).unwrap();
    assert_eq!(
        serde_json::to_string(&code).unwrap(),
        serde_json::to_string(&via_compile).unwrap()
    );
}

#[test]
fn escape_then_unescape_round_trips_arbitrary_text() {
    for s in ["plain text", "a.b*(c)?", "line1\nline2\ttab", "# comment-looking text"] {
        assert_eq!(unescape(&escape(s)).unwrap(), s);
    }
}

#[test]
fn escaped_text_compiles_as_a_literal_match_for_itself() {
    let raw = "3.14 (pi)?";
    let pattern = format!("/{}/", escape(raw));
    let code = compile(&pattern).expect("escaped text must be a valid pattern body");
    validate(&code).unwrap();
}

#[test]
fn replacement_template_resolves_named_groups_against_the_pattern_that_produced_them() {
    let preprocessed = preprocess("/(?<year>\\d{4})-(?<month>\\d{2})/").unwrap();
    let parser = Parser::new(&preprocessed.body, preprocessed.options).unwrap();
    let (_tree, captures) = parser.parse().unwrap();

    let replacement =
        parse_replacement("${month}/${year}", &preprocessed.options, &captures).unwrap();
    assert_eq!(
        replacement.parts,
        vec![
            ReplacementPart::NamedGroup("month".into()),
            ReplacementPart::Literal("/".into()),
            ReplacementPart::NamedGroup("year".into()),
        ]
    );
}

#[test]
fn replacement_template_rejects_a_name_the_pattern_never_defined() {
    let preprocessed = preprocess("/(?<year>\\d{4})/").unwrap();
    let parser = Parser::new(&preprocessed.body, preprocessed.options).unwrap();
    let (_tree, captures) = parser.parse().unwrap();

    let err = parse_replacement("${bogus}", &preprocessed.options, &captures).unwrap_err();
    assert_eq!(err, pcre_regex_core::ParseErrorKind::UndefinedNamedReference);
}

#[test]
fn ungreedy_option_inverts_quantifier_laziness_in_the_compiled_program() {
    let greedy = compile("/a*/").unwrap();
    let ungreedy = compile("/a*/U").unwrap();
    assert_ne!(
        serde_json::to_string(&greedy).unwrap(),
        serde_json::to_string(&ungreedy).unwrap()
    );
    validate(&greedy).unwrap();
    validate(&ungreedy).unwrap();
}

#[test]
fn deeply_alternated_pattern_compiles_without_overflowing_the_parser() {
    let alternatives: Vec<String> = (0..200).map(|i| format!("a{i}")).collect();
    let pattern = format!("/{}/", alternatives.join("|"));
    let code = compile(&pattern).expect("wide alternation should parse and write cleanly");
    validate(&code).unwrap();
}

#[test]
fn deeply_nested_groups_compile_without_overflowing_the_parser() {
    let open = "(".repeat(150);
    let close = ")".repeat(150);
    let pattern = format!("/{open}a{close}/");
    let code = compile(&pattern).expect("deep nesting should parse and write cleanly");
    validate(&code).unwrap();
}
