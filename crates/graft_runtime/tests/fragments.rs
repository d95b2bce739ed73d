//! Fragment expansion and per-type argument handling at execution time.

use graft_core::Map;
use graft_runtime::{Args, Data, FnResolver, Object, Resolver, Root};
use graft_schema::Field;
use serde_json::json;

#[test]
fn test_fragment_cycle_is_an_error() {
    let mut root = Root::default();
    root.parse_sdl("type Query { title: String }").unwrap();
    root.set_data(json!({"title": "Songs"}));

    // Parsed without validation, so the cycle reaches the executor.
    let doc =
        graft_schema::parse_executable("{ ...F } fragment F on Query { title ...F }", root.registry())
            .unwrap();
    let response = serde_json::to_value(root.resolve_executable(&doc, None, &Map::new())).unwrap();
    assert_eq!(
        response,
        json!({
            "data": {"title": "Songs"},
            "errors": [{
                "message": "resolve error: fragment cycle through F",
                "path": ["fragment at 1:3"]
            }]
        })
    );
}

#[test]
fn test_fragment_used_twice_is_not_a_cycle() {
    let mut root = Root::default();
    root.parse_sdl("type Song { name: String }\ntype Query { first: Song, second: Song }")
        .unwrap();
    root.set_data(json!({"first": {"name": "Lucky Girl"}, "second": {"name": "Misread"}}));

    let response = root.resolve_string(
        "{ first { ...S } second { ...S } }\nfragment S on Song { name }",
        None,
        &Map::new(),
    );
    assert!(response.is_ok());
    assert_eq!(
        response.data.to_json(),
        json!({"first": {"name": "Lucky Girl"}, "second": {"name": "Misread"}})
    );
}

const NAMED: &str = r#"
interface Named { name: String }
type Track implements Named { name(short: Boolean = true): String }
type Clip implements Named { name(lang: String = "en"): String }
type Query { items: [Named] }
"#;

fn arg_names(args: &Args) -> Data {
    let names: Vec<&str> = args.iter().map(|(name, _)| name.as_str()).collect();
    Data::from(names.join(","))
}

struct Track;

impl Resolver for Track {
    fn resolve(&self, _field: &Field, args: &Args) -> graft_core::Result<Data> {
        Ok(arg_names(args))
    }
}

impl Object for Track {
    fn as_resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

struct Clip;

impl Resolver for Clip {
    fn resolve(&self, _field: &Field, args: &Args) -> graft_core::Result<Data> {
        Ok(arg_names(args))
    }
}

impl Object for Clip {
    fn as_resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

#[test]
fn test_arguments_follow_the_runtime_type() {
    let mut root = Root::default();
    root.parse_sdl(NAMED).unwrap();
    root.set_data(Data::object(FnResolver::new(|_, _| {
        Ok(Data::from(vec![
            Data::object(Track),
            Data::object(Clip),
            Data::object(Track),
        ]))
    })));

    let response = root.resolve_string("{ items { name } }", None, &Map::new());
    assert!(response.is_ok());
    assert_eq!(
        response.data.to_json(),
        json!({"items": [{"name": "short"}, {"name": "lang"}, {"name": "short"}]})
    );
}
