//! Runs the commands over files in a temporary directory.

use clap::Parser;
use graft_cli::{run, Cli};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCHEMA: &str = "enum Genre { ROCK POP }\ntype Song { name: String genre: Genre }\ntype Query { songs(genre: Genre): [Song] }\n";

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn run_args(args: &[&str]) -> i32 {
    let mut argv = vec!["graft", "--quiet"];
    argv.extend_from_slice(args);
    run(Cli::parse_from(argv)).unwrap()
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_check_valid_schema_and_query() {
    let dir = TempDir::new().unwrap();
    let schema = write(&dir, "schema.graphql", SCHEMA);
    let query = write(&dir, "songs.graphql", "{ songs(genre: ROCK) { name } }");
    assert_eq!(run_args(&["check", arg(&schema), "--query", arg(&query)]), 0);
}

#[test]
fn test_check_reports_errors() {
    let dir = TempDir::new().unwrap();
    let schema = write(&dir, "schema.graphql", "type Query { song: Song }");
    assert_eq!(run_args(&["check", arg(&schema)]), 1);

    let schema = write(&dir, "ok.graphql", SCHEMA);
    let query = write(&dir, "bad.graphql", "query ($g: Song) { songs(genre: $g) { name } }");
    assert_eq!(run_args(&["check", arg(&schema), "--query", arg(&query)]), 1);
}

#[test]
fn test_fmt_rewrites_and_checks() {
    let dir = TempDir::new().unwrap();
    let schema = write(&dir, "schema.graphql", "type Query{title:String}");

    assert_eq!(run_args(&["fmt", "--check", arg(&schema)]), 1);
    assert_eq!(run_args(&["fmt", arg(&schema)]), 0);
    assert!(fs::read_to_string(&schema).unwrap().contains("type Query {"));
    assert_eq!(run_args(&["fmt", "--check", arg(&schema)]), 0);
}

#[test]
fn test_exec() {
    let dir = TempDir::new().unwrap();
    let schema = write(&dir, "schema.graphql", SCHEMA);
    let data = write(
        &dir,
        "songs.json",
        r#"{"songs": [{"name": "Lucky Girl", "genre": "POP"}]}"#,
    );
    let query = write(&dir, "q.graphql", "{ songs { name genre } }");
    let ok = run_args(&[
        "exec", "--schema", arg(&schema), "--data", arg(&data), "--query", arg(&query), "--sort",
    ]);
    assert_eq!(ok, 0);

    let missing = write(&dir, "missing.graphql", "{ albums { name } }");
    let failed = run_args(&["exec", "--schema", arg(&schema), "--query", arg(&missing)]);
    assert_eq!(failed, 1);
}

#[test]
fn test_exec_rejects_non_object_vars() {
    let dir = TempDir::new().unwrap();
    let schema = write(&dir, "schema.graphql", SCHEMA);
    let query = write(&dir, "q.graphql", "{ songs { name } }");
    let cli = Cli::parse_from([
        "graft", "exec", "--schema", arg(&schema), "--query", arg(&query), "--vars", "[1]",
    ]);
    assert!(run(cli).is_err());
}
