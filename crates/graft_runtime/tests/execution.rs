//! End-to-end execution tests: SDL, request, JSON response.

use graft_core::{Error, Map, Value};
use graft_runtime::{
    BindingBuilder, Data, FnResolver, Object, Resolver, ResolverMap, Response, Root, RootConfig,
};
use graft_schema::Field;
use serde_json::json;

const SONGS: &str = r#"
enum Genre { ROCK POP INDIE }

type Artist {
  name: String!
  songs(genre: Genre): [Song]
  origin: [String]
}

type Song {
  name: String
  artist: Artist
  duration: Int
  genre: Genre
}

type Query {
  title: String
  artist(name: String!): Artist
  artists: [Artist]
  songs(genre: Genre): [Song]
}
"#;

fn songs_data() -> serde_json::Value {
    json!({
        "title": "Songs",
        "artists": [
            {
                "name": "Fazerdaze",
                "origin": ["Wellington", "New Zealand"],
                "songs": [
                    {"name": "Lucky Girl", "duration": 181, "genre": "INDIE"},
                    {"name": "Jennifer", "duration": 214, "genre": "POP"}
                ]
            },
            {
                "name": "Viagra Boys",
                "origin": ["Stockholm"],
                "songs": [{"name": "Down In The Basement", "duration": 248, "genre": "ROCK"}]
            }
        ]
    })
}

fn songs_root() -> Root {
    let mut root = Root::default();
    root.parse_sdl(SONGS).unwrap();
    root.set_data(songs_data());
    root
}

fn run(root: &Root, query: &str) -> serde_json::Value {
    serde_json::to_value(root.resolve_string(query, None, &Map::new())).unwrap()
}

fn vars(json: serde_json::Value) -> Map {
    match Value::from(json) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[test]
fn test_simple_field() {
    let root = songs_root();
    assert_eq!(run(&root, "{title}"), json!({"data": {"title": "Songs"}}));
}

#[test]
fn test_missing_object_is_null() {
    let root = songs_root();
    assert_eq!(
        run(&root, r#"{artist(name:"Frazerdaze"){name}}"#),
        json!({"data": {"artist": null}})
    );
}

#[test]
fn test_unknown_field() {
    let root = songs_root();
    assert_eq!(
        run(&root, "{X}"),
        json!({
            "data": {},
            "errors": [{"message": "resolve error: X is not a field in Query", "path": ["X"]}]
        })
    );
}

#[test]
fn test_nested_lists() {
    let root = songs_root();
    assert_eq!(
        run(&root, "{ artists { name origin songs { name duration genre } } }"),
        json!({"data": {"artists": [
            {
                "name": "Fazerdaze",
                "origin": ["Wellington", "New Zealand"],
                "songs": [
                    {"name": "Lucky Girl", "duration": 181, "genre": "INDIE"},
                    {"name": "Jennifer", "duration": 214, "genre": "POP"}
                ]
            },
            {
                "name": "Viagra Boys",
                "origin": ["Stockholm"],
                "songs": [{"name": "Down In The Basement", "duration": 248, "genre": "ROCK"}]
            }
        ]}})
    );
}

#[test]
fn test_alias_and_typename() {
    let root = songs_root();
    assert_eq!(
        run(&root, "{ name: title, __typename }"),
        json!({"data": {"name": "Songs", "__typename": "Query"}})
    );
}

#[test]
fn test_list_element_errors_carry_index() {
    let mut root = songs_root();
    root.set_data(json!({"artists": [{"name": "Fazerdaze"}, {"origin": ["Nowhere"]}]}));
    assert_eq!(
        run(&root, "{ artists { name } }"),
        json!({
            "data": {"artists": [{"name": "Fazerdaze"}, {"name": null}]},
            "errors": [{
                "message": "resolve error: null returned for non-null String!",
                "path": ["artists", 1, "name"]
            }]
        })
    );
}

fn filtering_root() -> Root {
    let mut root = songs_root();
    let all = Value::from(songs_data());
    let query = ResolverMap::new("Query")
        .with_fn("songs", move |_, args| {
            let genre = args.get_as::<String>("genre");
            let songs = all
                .get("artists")
                .and_then(Value::as_list)
                .unwrap_or_default()
                .iter()
                .filter_map(|artist| artist.get("songs").and_then(Value::as_list))
                .flatten()
                .filter(|song| {
                    genre.is_none() || song.get("genre").and_then(Value::as_str) == genre.as_deref()
                })
                .cloned()
                .collect::<Vec<_>>();
            Ok(Data::from(Value::List(songs)))
        })
        .with_fallback(songs_data());
    root.set_data(Data::object(query));
    root
}

#[test]
fn test_enum_argument() {
    let root = filtering_root();
    assert_eq!(
        run(&root, "{ title songs(genre: ROCK) { name } }"),
        json!({"data": {"title": "Songs", "songs": [{"name": "Down In The Basement"}]}})
    );
}

#[test]
fn test_invalid_enum_argument() {
    let root = filtering_root();
    assert_eq!(
        run(&root, "{ songs(genre: JAZZ) { name } }"),
        json!({
            "data": {"songs": null},
            "errors": [{"message": "resolve error: JAZZ is not a valid Genre value", "path": ["songs"]}]
        })
    );
}

#[test]
fn test_variables() {
    let root = filtering_root();
    let doc = root
        .parse_executable("query ByGenre($g: Genre = ROCK) { songs(genre: $g) { name } }")
        .unwrap();

    let response = root.resolve_executable(&doc, Some("ByGenre"), &vars(json!({"g": "POP"})));
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"data": {"songs": [{"name": "Jennifer"}]}})
    );

    let response = root.resolve_executable(&doc, None, &Map::new());
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"data": {"songs": [{"name": "Down In The Basement"}]}})
    );
}

#[test]
fn test_required_variable_missing() {
    let root = songs_root();
    let response = root.resolve_string(
        "query ($n: String!) { artist(name: $n) { name } }",
        None,
        &Map::new(),
    );
    assert_eq!(response.data, Value::Null);
    assert_eq!(
        response.errors.as_slice()[0].message,
        "variable $n of required type String! was not provided"
    );
}

#[test]
fn test_missing_required_argument() {
    let root = songs_root();
    assert_eq!(
        run(&root, "{ artist { name } }"),
        json!({
            "data": {"artist": null},
            "errors": [{"message": "resolve error: missing required argument name", "path": ["artist"]}]
        })
    );
}

#[test]
fn test_skip_and_include() {
    let root = songs_root();
    assert_eq!(
        run(&root, "{ title @skip(if: true) artists @include(if: false) { name } }"),
        json!({"data": {}})
    );

    let response = root.resolve_string(
        "query ($s: Boolean!) { title @skip(if: $s) }",
        None,
        &vars(json!({"s": false})),
    );
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"data": {"title": "Songs"}})
    );
}

#[test]
fn test_invalid_skip_variable_is_a_warning() {
    let root = songs_root();
    let response: Response =
        root.resolve_string("query ($s: Boolean) { title @include(if: $s) }", None, &Map::new());
    assert_eq!(response.data.to_json(), json!({}));
    assert_eq!(response.errors.len(), 1);
    assert!(response.errors.as_slice()[0].is_warning());
    assert!(response.is_ok());
}

#[test]
fn test_fragments() {
    let root = songs_root();
    assert_eq!(
        run(
            &root,
            "{ artists { ...ArtistName ... on Artist { origin } } }\nfragment ArtistName on Artist { name }"
        ),
        json!({"data": {"artists": [
            {"name": "Fazerdaze", "origin": ["Wellington", "New Zealand"]},
            {"name": "Viagra Boys", "origin": ["Stockholm"]}
        ]}})
    );
}

#[test]
fn test_fragment_errors_are_labelled() {
    let mut root = songs_root();
    root.set_data(json!({"artists": [{"origin": []}]}));
    let response = root.resolve_string(
        "{ artists { ...A } }\nfragment A on Artist { name }",
        None,
        &Map::new(),
    );
    let err = &response.errors.as_slice()[0];
    assert_eq!(
        err.to_value().to_json()["path"],
        json!(["artists", 0, "fragment at 1:13", "name"])
    );
}

#[test]
fn test_parse_errors_fail_the_request() {
    let root = songs_root();
    let response = root.resolve_string("{ title", None, &Map::new());
    assert_eq!(response.data, Value::Null);
    assert!(!response.is_ok());
}

struct Looping;

impl Resolver for Looping {
    fn resolve(&self, field: &Field, _args: &graft_runtime::Args) -> graft_core::Result<Data> {
        match field.name.as_str() {
            "name" => Ok(Data::from("loop")),
            "next" => Ok(Data::object(Looping)),
            other => Err(Error::resolve(format!("no field {other}"))),
        }
    }
}

impl Object for Looping {
    fn type_name(&self) -> &str {
        "Node"
    }

    fn as_resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

#[test]
fn test_depth_budget() {
    let mut root = Root::new(RootConfig::new().with_max_depth(3));
    root.parse_sdl("type Node { name: String, next: Node }\ntype Query { node: Node }")
        .unwrap();
    root.set_data(Data::object(FnResolver::new(|_, _| Ok(Data::object(Looping)))));

    assert_eq!(
        run(&root, "{ node { name next { name next { name next { name } } } } }"),
        json!({"data": {"node": {
            "name": "loop",
            "next": {"name": "loop", "next": {"name": "loop", "next": null}}
        }}})
    );
}

#[derive(Clone)]
struct Artist {
    name: String,
    songs: Vec<Song>,
}

#[derive(Clone)]
struct Song {
    name: String,
    seconds: i64,
}

impl Object for Artist {}
impl Object for Song {}

#[test]
fn test_bound_native_types() {
    let mut root = songs_root();
    root.bind(
        BindingBuilder::<Artist>::new("Artist")
            .field("name", |a| a.name.clone())
            .field("songs", |a| {
                a.songs.iter().cloned().map(Data::object).collect::<Vec<_>>()
            }),
    );
    root.bind(
        BindingBuilder::<Song>::new("Song")
            .field("name", |s| s.name.clone())
            .try_field("duration", |s| {
                if s.seconds < 0 {
                    Err(Error::resolve("unknown duration"))
                } else {
                    Ok(s.seconds)
                }
            }),
    );
    let artist = Artist {
        name: "Fazerdaze".into(),
        songs: vec![
            Song {
                name: "Lucky Girl".into(),
                seconds: 181,
            },
            Song {
                name: "Misread".into(),
                seconds: -1,
            },
        ],
    };
    root.set_data(Data::object(
        ResolverMap::new("Query")
            .with_fn("artists", move |_, _| Ok(Data::from(vec![Data::object(artist.clone())]))),
    ));

    assert_eq!(
        run(&root, "{ artists { name songs { name duration } } }"),
        json!({
            "data": {"artists": [{"name": "Fazerdaze", "songs": [
                {"name": "Lucky Girl", "duration": 181},
                {"name": "Misread", "duration": null}
            ]}]},
            "errors": [{
                "message": "resolve error: unknown duration",
                "path": ["artists", 0, "songs", 1, "duration"]
            }]
        })
    );
}

#[test]
fn test_unbound_native_type() {
    let mut root = songs_root();
    root.set_data(Data::object(
        ResolverMap::new("Query").with_fn("artists", |_, _| {
            Ok(Data::from(vec![Data::object(Artist {
                name: "Fazerdaze".into(),
                songs: Vec::new(),
            })]))
        }),
    ));
    assert_eq!(
        run(&root, "{ artists { name } }"),
        json!({
            "data": {"artists": [{"name": null}]},
            "errors": [{
                "message": "meta error: no binding registered for Artist",
                "path": ["artists", 0, "name"]
            }]
        })
    );
}

const MEDIA: &str = r#"
type Track { name: String }
type Clip @impl(type: "Video") { title: String }
union Media = Track | Clip
type Query { media: [Media] }
"#;

#[test]
fn test_untyped_union_by_typename() {
    let mut root = Root::default();
    root.parse_sdl(MEDIA).unwrap();
    root.set_data(json!({"media": [
        {"__typename": "Track", "name": "Lucky Girl"},
        {"__typename": "Clip", "title": "Live"},
        {"name": "Unknown"}
    ]}));

    assert_eq!(
        run(&root, "{ media { __typename ... on Track { name } ... on Clip { title } } }"),
        json!({
            "data": {"media": [
                {"__typename": "Track", "name": "Lucky Girl"},
                {"__typename": "Clip", "title": "Live"},
                null
            ]},
            "errors": [{
                "message": "resolve error: can not determine the Media member type for object",
                "path": ["media", 2]
            }]
        })
    );
}

struct Track;

impl Resolver for Track {
    fn resolve(&self, _field: &Field, _args: &graft_runtime::Args) -> graft_core::Result<Data> {
        Ok(Data::from("Lucky Girl"))
    }
}

impl Object for Track {
    fn as_resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

struct Video;

impl Resolver for Video {
    fn resolve(&self, _field: &Field, _args: &graft_runtime::Args) -> graft_core::Result<Data> {
        Ok(Data::from("Live"))
    }
}

impl Object for Video {
    fn as_resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

struct Poster;

impl Resolver for Poster {
    fn resolve(&self, _field: &Field, _args: &graft_runtime::Args) -> graft_core::Result<Data> {
        Ok(Data::from("Tour"))
    }
}

impl Object for Poster {
    fn as_resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

#[test]
fn test_native_union_discrimination() {
    let mut root = Root::default();
    root.parse_sdl(MEDIA).unwrap();
    root.set_data(Data::object(FnResolver::new(|_, _| {
        Ok(Data::from(vec![
            Data::object(Track),
            Data::object(Video),
            Data::object(Poster),
        ]))
    })));
    let query = "{ media { __typename } }";

    let response = run(&root, query);
    assert_eq!(
        response["data"],
        json!({"media": [{"__typename": "Track"}, {"__typename": "Clip"}, null]})
    );
    assert_eq!(
        response["errors"][0]["message"],
        "resolve error: can not determine the Media member type for Poster"
    );

    root.register_impl::<Poster>("Clip");
    assert_eq!(
        run(&root, query),
        json!({"data": {"media": [
            {"__typename": "Track"},
            {"__typename": "Clip"},
            {"__typename": "Clip"}
        ]}})
    );
}

#[test]
fn test_introspection() {
    let root = songs_root();
    assert_eq!(
        run(
            &root,
            r#"{
              __schema { queryType { name } mutationType { name } }
              __type(name: "Song") { name kind fields { name type { kind name ofType { name } } } }
            }"#
        ),
        json!({"data": {
            "__schema": {"queryType": {"name": "Query"}, "mutationType": null},
            "__type": {
                "name": "Song",
                "kind": "OBJECT",
                "fields": [
                    {"name": "name", "type": {"kind": "SCALAR", "name": "String", "ofType": null}},
                    {"name": "artist", "type": {"kind": "OBJECT", "name": "Artist", "ofType": null}},
                    {"name": "duration", "type": {"kind": "SCALAR", "name": "Int", "ofType": null}},
                    {"name": "genre", "type": {"kind": "ENUM", "name": "Genre", "ofType": null}}
                ]
            }
        }})
    );
}

#[test]
fn test_introspection_wrappers_and_unknown_type() {
    let root = songs_root();
    assert_eq!(
        run(
            &root,
            r#"{ __type(name: "Artist") { fields { name type { kind ofType { kind name } } } } missing: __type(name: "Nope") { name } }"#
        ),
        json!({"data": {
            "__type": {"fields": [
                {"name": "name", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "String"}}},
                {"name": "songs", "type": {"kind": "LIST", "ofType": {"kind": "OBJECT", "name": "Song"}}},
                {"name": "origin", "type": {"kind": "LIST", "ofType": {"kind": "SCALAR", "name": "String"}}}
            ]},
            "missing": null
        }})
    );
}

#[test]
fn test_introspection_only_on_query_root() {
    let root = songs_root();
    let response = run(&root, "{ artists { __schema { queryType { name } } } }");
    assert_eq!(
        response["errors"][0]["message"],
        "resolve error: __schema is not a field in Artist"
    );
}
