#![allow(missing_docs)]

mod common;

use std::{collections::HashMap, sync::Arc, thread};

use confbind::{Binding, Duration, FieldKind, Namespace};
use facet::Facet;

#[derive(Facet, Debug, Default)]
#[facet(transparent)]
struct Labels(HashMap<String, String>);

#[derive(Facet, Debug, Default)]
struct Endpoint {
    url: String,
}

#[derive(Facet, Debug, Default)]
struct Common {
    name: String,
    #[facet(flatten)]
    labels: Labels,
}

#[derive(Facet, Debug, Default)]
struct Service {
    #[facet(flatten)]
    common: Common,
    #[facet(rename = "Upstream")]
    endpoint: Endpoint,
    backup: Option<Endpoint>,
    tags: Vec<String>,
    timeout: Duration,
}

#[test]
fn namespaces_are_cached() {
    common::setup();

    let first = Namespace::of::<Service>().unwrap();
    let second = confbind::namespace_of::<Service>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn namespaces_are_shared_across_threads() {
    common::setup();

    let handles: Vec<_> = (0..8)
        .map(|_| thread::spawn(|| Namespace::of::<Endpoint>().unwrap()))
        .collect();
    let namespaces: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    assert!(namespaces.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn keys_and_kinds() {
    common::setup();

    let namespace = Namespace::of::<Service>().unwrap();
    let keys: Vec<_> = namespace.keys().collect();
    assert_eq!(
        keys,
        ["name", "labels", "upstream", "backup", "tags", "timeout"]
    );

    let kinds: Vec<_> = namespace.bindings().iter().map(Binding::kind).collect();
    assert_eq!(
        kinds,
        [
            FieldKind::Scalar,
            FieldKind::Map,
            FieldKind::Composite,
            FieldKind::Composite,
            FieldKind::Slice,
            FieldKind::Scalar,
        ]
    );

    let name = namespace.get("NAME").unwrap().as_leaf().unwrap();
    assert_eq!(name.path().to_string(), "common.name");

    let backup = namespace.get("backup").unwrap().as_composite().unwrap();
    assert!(!backup.is_merged());
    assert_eq!(backup.owners()[0].path().to_string(), "backup");
    assert!(!backup.owners()[0].is_optional());
    assert!(Arc::ptr_eq(
        backup.owners()[0].namespace(),
        &Namespace::of::<Endpoint>().unwrap()
    ));
}

#[test]
fn non_struct_types_have_no_namespace() {
    common::setup();

    assert!(Namespace::of::<u32>().is_err());
    assert!(Namespace::of::<Vec<Endpoint>>().is_err());
}

#[test]
fn opaque_fields_are_unsupported() {
    common::setup();

    #[derive(Facet, Debug, Default)]
    struct Worker {
        name: String,
        jobs: HashMap<u8, String>,
    }

    let namespace = Namespace::of::<Worker>().unwrap();
    let jobs = namespace.get("jobs").unwrap();
    assert_eq!(jobs.kind(), FieldKind::Unsupported);

    let value: Worker = confbind::from_json_str(r#"{"name": "w"}"#).unwrap();
    assert!(value.jobs.is_empty());
}

#[test]
fn binding_through_every_kind() {
    common::setup();

    let value: Service = confbind::from_yaml_str(indoc::indoc! {"
        name: api
        labels:
          Team: core
        upstream:
          url: http://a
        backup:
          url: http://b
        tags: [x, y]
        timeout: 5s
    "})
    .unwrap();

    assert_eq!(value.common.name, "api");
    assert_eq!(value.common.labels.0["Team"], "core");
    assert_eq!(value.endpoint.url, "http://a");
    assert_eq!(value.backup.map(|endpoint| endpoint.url).as_deref(), Some("http://b"));
    assert_eq!(value.tags, ["x", "y"]);
    assert_eq!(value.timeout, Duration::from_secs(5));
}
