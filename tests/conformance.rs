//! Fixture-driven conformance sweep: each `tests/fixtures/*.json` file
//! names a delimited pattern and the shape its parse should (or should
//! not) produce, so new fixtures can be dropped in without touching this
//! file.

use glob::glob;
use pcre_regex_core::core::utf16;
use pcre_regex_core::{preprocess, write, ParseErrorKind, Parser, RegexNode};
use serde::Deserialize;
use std::fs;

#[derive(Deserialize)]
struct Fixture {
    name: String,
    pattern: String,
    expect_ok: bool,
    expect_root_child_kind: Option<String>,
    expect_cap_size: Option<i32>,
    expect_error_kind: Option<String>,
}

fn root_child_kind(tree: &RegexNode) -> String {
    let child = match tree {
        RegexNode::Capture { slot: 0, child, .. } => child.as_ref(),
        other => panic!("expected root Capture(slot=0), got {other:?}"),
    };
    let json = serde_json::to_value(child).unwrap();
    json["kind"].as_str().unwrap().to_string()
}

fn error_kind_name(kind: &ParseErrorKind) -> String {
    serde_json::to_value(kind).unwrap()["kind"].as_str().unwrap().to_string()
}

#[test]
fn fixtures_match_their_expected_shape() {
    let pattern = format!("{}/tests/fixtures/*.json", env!("CARGO_MANIFEST_DIR"));
    let paths: Vec<_> = glob(&pattern).expect("fixture glob pattern must be valid").collect();
    assert!(!paths.is_empty(), "expected at least one fixture under tests/fixtures");

    let mut checked = 0;
    for entry in paths {
        let path = entry.expect("fixture path must be readable");
        let content = fs::read_to_string(&path).expect("failed to read fixture file");
        let fixture: Fixture = serde_json::from_str(&content)
            .unwrap_or_else(|e| panic!("malformed fixture {}: {e}", path.display()));

        let outcome = preprocess(&fixture.pattern)
            .and_then(|pre| {
                Parser::new(&pre.body, pre.options)
                    .map_err(|e| e.kind)
                    .and_then(|p| p.parse().map_err(|e| e.kind).map(|(tree, caps)| (tree, caps, pre.options)))
            });

        match outcome {
            Ok((tree, captures, options)) => {
                assert!(fixture.expect_ok, "fixture {} expected to fail but parsed", fixture.name);
                let tree = utf16::transform(&tree);

                if let Some(expected_kind) = &fixture.expect_root_child_kind {
                    assert_eq!(
                        &root_child_kind(&tree),
                        expected_kind,
                        "fixture {} root child kind mismatch",
                        fixture.name
                    );
                }
                if let Some(expected_cap_size) = fixture.expect_cap_size {
                    let code = write(&tree, &captures, &options);
                    assert_eq!(code.cap_size, expected_cap_size, "fixture {} cap_size mismatch", fixture.name);
                }
            }
            Err(kind) => {
                assert!(!fixture.expect_ok, "fixture {} expected to parse but failed with {kind:?}", fixture.name);
                if let Some(expected) = &fixture.expect_error_kind {
                    assert_eq!(&error_kind_name(&kind), expected, "fixture {} error kind mismatch", fixture.name);
                }
            }
        }
        checked += 1;
    }
    assert!(checked > 0, "no conformance fixtures were exercised");
}
