#![allow(missing_docs)]

mod common;

use std::fs;

use confbind::{ConfErrorKind, Options, ParseError};
use facet::Facet;
use indoc::indoc;

#[derive(Facet, Debug, Default)]
struct Config {
    a: String,
    b: i32,
    c: String,
    d: String,
}

const JSON: &str = indoc! {r#"
    {
        "a": "foo",
        "b": 1,
        "c": "${CONFBIND_LOAD_PLAIN}",
        "d": "abcd!@#$112"
    }
"#};

#[test]
fn json_and_yaml_files_without_env() {
    common::setup();

    for extension in ["json", "yaml", "yml"] {
        let path = common::temp_file(&format!("plain.{extension}"), JSON);
        let value: Config = confbind::must_load(&path, &Options::new());
        fs::remove_file(&path).unwrap();

        assert_eq!(value.a, "foo");
        assert_eq!(value.b, 1);
        assert_eq!(value.c, "${CONFBIND_LOAD_PLAIN}");
        assert_eq!(value.d, "abcd!@#$112");
    }
}

#[test]
fn references_stay_literal_without_env() {
    common::setup();

    let path = common::temp_file(
        "literal.toml",
        indoc! {r#"
            a = "foo"
            b = 1
            c = "${CONFBIND_LOAD_LITERAL}"
            d = "abcd!@#112"
        "#},
    );
    let plain: Config = confbind::must_load(&path, &Options::new());
    fs::remove_file(&path).unwrap();
    assert_eq!(plain.c, "${CONFBIND_LOAD_LITERAL}");
}

#[test]
fn unexpanded_references_do_not_parse_as_numbers() {
    common::setup();

    let text = r#"{"a": "foo", "b": "${CONFBIND_LOAD_NUMBER}", "c": "x", "d": "y"}"#;
    let err = confbind::from_str::<Config>(text, confbind::Format::Json, &Options::new())
        .unwrap_err();
    match err.kind() {
        ConfErrorKind::TypeMismatch { path, message } => {
            assert_eq!(path, "b");
            assert!(message.contains("${CONFBIND_LOAD_NUMBER}"), "{message}");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn kdl_file() {
    common::setup();

    let path = common::temp_file(
        "config.KDL",
        indoc! {r#"
            a "foo"
            b 1
            c "bar"
            d "baz"
        "#},
    );
    let value: Config = confbind::load(&path, &Options::new()).unwrap();
    fs::remove_file(&path).unwrap();
    assert_eq!(value.b, 1);
    assert_eq!(value.d, "baz");
}

#[test]
fn missing_file() {
    common::setup();

    let err = confbind::load::<Config>("definitely/not/here.json", &Options::new()).unwrap_err();
    assert!(matches!(err.kind(), ConfErrorKind::Io(_)));
}

#[test]
fn unrecognized_extension() {
    common::setup();

    let err = confbind::load::<Config>("not_a_file", &Options::new()).unwrap_err();
    assert!(matches!(err.kind(), ConfErrorKind::UnsupportedFormat(_)));

    let path = common::temp_file("hello.txt", "hello");
    let err = confbind::load::<Config>(&path, &Options::new()).unwrap_err();
    fs::remove_file(&path).unwrap();
    assert!(matches!(err.kind(), ConfErrorKind::UnsupportedFormat(_)));
}

#[test]
#[should_panic(expected = "not_a_file")]
fn must_load_panics() {
    let _: Config = confbind::must_load("not_a_file", &Options::new());
}

#[test]
fn malformed_documents() {
    common::setup();

    #[derive(Facet, Debug, Default)]
    struct Empty {}

    let err = confbind::from_json_str::<Empty>("hello").unwrap_err();
    assert!(matches!(err.kind(), ConfErrorKind::Parse(ParseError::Json(_))));

    let err = confbind::from_toml_str::<Empty>("hello").unwrap_err();
    assert!(matches!(err.kind(), ConfErrorKind::Parse(ParseError::Toml(_))));

    let err = confbind::from_yaml_str::<Empty>("':hello").unwrap_err();
    assert!(matches!(err.kind(), ConfErrorKind::Parse(ParseError::Yaml(_))));

    let err = confbind::from_kdl_str::<Empty>("node {").unwrap_err();
    assert!(matches!(err.kind(), ConfErrorKind::Parse(ParseError::Kdl(_))));
}

#[test]
fn documents_must_be_mappings() {
    common::setup();

    let err = confbind::from_json_str::<Config>("[1, 2]").unwrap_err();
    assert!(matches!(err.kind(), ConfErrorKind::TypeMismatch { .. }));
}

#[test]
fn mismatched_values_name_their_path() {
    common::setup();

    let err = confbind::from_json_str::<Config>(r#"{"a": "x", "b": "one"}"#).unwrap_err();
    match err.kind() {
        ConfErrorKind::TypeMismatch { path, .. } => assert_eq!(path, "b"),
        other => panic!("unexpected error {other}"),
    }

    let err = confbind::from_json_str::<Config>(r#"{"a": {"nested": true}}"#).unwrap_err();
    assert!(err.to_string().starts_with("type mismatch for field a:"));
}
