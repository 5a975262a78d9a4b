#![allow(missing_docs)]

mod common;

use std::collections::HashMap;

use confbind::{ConfErrorKind, Duration, fill_default};
use facet::Facet;

#[test]
fn non_struct_targets_are_rejected() {
    common::setup();

    let mut port = 8080u16;
    let err = fill_default(&mut port).unwrap_err();
    assert!(matches!(err.kind(), ConfErrorKind::InvalidDefault(_)));
}

#[test]
fn empty_structs_are_accepted() {
    common::setup();

    #[derive(Facet, Debug, Default)]
    struct Empty {}

    fill_default(&mut Empty::default()).unwrap();
    fill_default(&mut Some(Empty::default())).unwrap();
    assert!(fill_default(&mut None::<Empty>).is_err());
}

#[test]
fn defaults() {
    common::setup();

    #[derive(Facet, Debug, Default)]
    struct St {
        #[facet(fallback = "a")]
        a: String,
        b: String,
        #[facet(default = 3)]
        c: u8,
    }

    let mut value = St::default();
    fill_default(&mut value).unwrap();
    assert_eq!(value.a, "a");
    assert!(value.b.is_empty());
    assert_eq!(value.c, 3);
}

#[test]
fn fields_with_values_are_rejected() {
    common::setup();

    #[derive(Facet, Debug, Default)]
    struct St {
        #[facet(fallback = "a")]
        a: String,
        b: String,
    }

    let mut value = St {
        a: "b".into(),
        ..St::default()
    };
    let err = fill_default(&mut value).unwrap_err();
    assert!(matches!(err.kind(), ConfErrorKind::InvalidDefault(msg) if msg.contains("a")));
    assert_eq!(value.a, "b");
}

#[test]
fn nested_structs_and_named_scalars() {
    common::setup();

    #[derive(Facet, Debug, Default, PartialEq)]
    #[facet(transparent)]
    struct Port(u16);

    #[derive(Facet, Debug, Default)]
    struct Pool {
        #[facet(fallback = "8")]
        size: u32,
        #[facet(fallback = "1m")]
        idle: Duration,
    }

    #[derive(Facet, Debug, Default)]
    struct Database {
        #[facet(fallback = "5432")]
        port: Port,
        pool: Pool,
        replica: Option<Pool>,
    }

    let mut value = Database::default();
    fill_default(&mut value).unwrap();
    assert_eq!(value.port, Port(5432));
    assert_eq!(value.pool.size, 8);
    assert_eq!(value.pool.idle, Duration::from_secs(60));
    assert!(value.replica.is_none());

    let mut value = Database {
        replica: Some(Pool::default()),
        ..Database::default()
    };
    fill_default(&mut value).unwrap();
    assert_eq!(value.replica.map(|pool| pool.size), Some(8));
}

#[test]
fn values_without_directives_survive() {
    common::setup();

    #[derive(Facet, Debug, Default, PartialEq)]
    struct Route {
        #[facet(fallback = "1")]
        weight: u8,
        target: String,
    }

    #[derive(Facet, Debug, Default)]
    struct Router {
        #[facet(fallback = "edge")]
        name: String,
        routes: Vec<Route>,
        labels: HashMap<String, String>,
        timeout: Duration,
        limit: Option<u64>,
    }

    let mut value = Router {
        routes: vec![Route {
            weight: 0,
            target: "a".into(),
        }],
        labels: HashMap::from([("zone".to_string(), "eu".to_string())]),
        timeout: Duration::from_millis(250),
        limit: Some(0),
        ..Router::default()
    };
    fill_default(&mut value).unwrap();
    assert_eq!(value.name, "edge");
    assert_eq!(
        value.routes,
        [Route {
            weight: 0,
            target: "a".into()
        }]
    );
    assert_eq!(value.labels["zone"], "eu");
    assert_eq!(value.timeout, Duration::from_millis(250));
    assert_eq!(value.limit, Some(0));
}

#[test]
fn unparsable_default() {
    common::setup();

    #[derive(Facet, Debug, Default)]
    struct St {
        #[facet(fallback = "http")]
        port: u16,
    }

    let err = fill_default(&mut St::default()).unwrap_err();
    assert!(matches!(err.kind(), ConfErrorKind::InvalidDefault(msg) if msg.contains("port")));
}
