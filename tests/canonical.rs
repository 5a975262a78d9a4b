#![allow(missing_docs)]

mod common;

use confbind::{Format, Options};
use facet::Facet;
use indoc::indoc;

#[derive(Facet, Debug)]
struct Tagged {
    #[facet(rename = "A")]
    first: String,
    #[facet(rename = "b")]
    second: String,
}

#[derive(Facet, Debug)]
struct Untagged {
    a: String,
    b: String,
}

fn check(text: &str, format: Format) {
    let tagged: Tagged = confbind::from_str(text, format, &Options::new()).unwrap();
    assert_eq!(tagged.first, "foo");
    assert_eq!(tagged.second, "bar");

    let untagged: Untagged = confbind::from_str(text, format, &Options::new()).unwrap();
    assert_eq!(untagged.a, "foo");
    assert_eq!(untagged.b, "bar");
}

#[test]
fn json_keys_match_case_insensitively() {
    common::setup();
    check(r#"{"a": "foo", "B": "bar"}"#, Format::Json);
}

#[test]
fn toml_keys_match_case_insensitively() {
    common::setup();
    check(
        indoc! {r#"
            a = "foo"
            B = "bar"
        "#},
        Format::Toml,
    );
}

#[test]
fn yaml_keys_match_case_insensitively() {
    common::setup();
    check(
        indoc! {"
            a: foo
            B: bar
        "},
        Format::Yaml,
    );
}

#[test]
fn kdl_keys_match_case_insensitively() {
    common::setup();
    check(
        indoc! {r#"
            a "foo"
            B "bar"
        "#},
        Format::Kdl,
    );
}

#[test]
fn later_spelling_of_a_key_wins() {
    common::setup();
    let value: Untagged = confbind::from_json_str(r#"{"a": "x", "b": "first", "B": "second"}"#).unwrap();
    assert_eq!(value.b, "second");

    let value: Untagged = confbind::from_json_str(r#"{"a": "x", "B": "first", "b": "second"}"#).unwrap();
    assert_eq!(value.b, "second");
}

#[test]
fn unknown_keys_are_ignored() {
    common::setup();
    let value: Untagged =
        confbind::from_json_str(r#"{"a": "foo", "b": "bar", "c": [1, 2], "D": {"e": null}}"#).unwrap();
    assert_eq!(value.a, "foo");
    assert_eq!(value.b, "bar");
}

#[test]
fn sequence_of_structs() {
    common::setup();

    #[derive(Facet, Debug)]
    struct User {
        name: String,
    }

    #[derive(Facet, Debug)]
    struct Users {
        users: Vec<User>,
    }

    let value: Users =
        confbind::from_json_str(r#"{"users": [{"name": "foo"}, {"Name": "bar"}]}"#).unwrap();
    let names: Vec<_> = value.users.iter().map(|user| user.name.as_str()).collect();
    assert_eq!(names, ["foo", "bar"]);
}

#[test]
fn scalars_are_coerced() {
    common::setup();

    #[derive(Facet, Debug)]
    struct Scalars {
        port: u16,
        ratio: f32,
        enabled: bool,
        label: String,
        count: i64,
    }

    let value: Scalars = confbind::from_yaml_str(indoc! {r#"
        port: "8080"
        ratio: 1
        enabled: "true"
        label: 42
        count: 3.0
    "#})
    .unwrap();
    assert_eq!(value.port, 8080);
    assert_eq!(value.ratio, 1.0);
    assert!(value.enabled);
    assert_eq!(value.label, "42");
    assert_eq!(value.count, 3);
}

#[test]
fn same_document_in_every_format() {
    common::setup();

    #[derive(Facet, Debug, PartialEq)]
    struct Server {
        host: String,
        ports: Vec<u16>,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct Root {
        name: String,
        server: Server,
    }

    let json = r#"{"Name": "app", "Server": {"Host": "localhost", "Ports": [80, 443]}}"#;
    let yaml = indoc! {"
        Name: app
        Server:
          Host: localhost
          Ports: [80, 443]
    "};
    let toml = indoc! {r#"
        Name = "app"

        [Server]
        Host = "localhost"
        Ports = [80, 443]
    "#};
    let kdl = indoc! {r#"
        Name "app"
        Server {
            Host "localhost"
            Ports 80 443
        }
    "#};

    let expected: Root = confbind::from_json_str(json).unwrap();
    assert_eq!(expected.server.ports, [80, 443]);
    assert_eq!(confbind::from_yaml_str::<Root>(yaml).unwrap(), expected);
    assert_eq!(confbind::from_toml_str::<Root>(toml).unwrap(), expected);
    assert_eq!(confbind::from_kdl_str::<Root>(kdl).unwrap(), expected);
}

#[test]
fn null_counts_as_absent() {
    common::setup();

    #[derive(Facet, Debug)]
    struct Limits {
        #[facet(fallback = "10")]
        burst: u32,
        #[facet(optional)]
        note: String,
    }

    let value: Limits = confbind::from_json_str(r#"{"burst": null, "note": null}"#).unwrap();
    assert_eq!(value.burst, 10);
    assert!(value.note.is_empty());
}
