//! Command-line interface for graft.
//!
//! # Usage
//!
//! ```bash
//! # Validate schema files, and request documents against them
//! graft check schema.graphql --query songs.graphql
//!
//! # Rewrite schema files as canonical SDL
//! graft fmt schema.graphql
//!
//! # Resolve a request against JSON data
//! graft exec --schema schema.graphql --data songs.json --query songs.graphql
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use graft_core::{Errors, Map, Value, WriteOptions};
use graft_runtime::Root;
use graft_schema::SdlOptions;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "graft")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check schema files and request documents for errors
    Check {
        /// Schema files, loaded in order into one schema
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Request documents to validate against the schema
        #[arg(long = "query")]
        queries: Vec<PathBuf>,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },

    /// Rewrite schema files as canonical SDL
    #[command(alias = "format")]
    Fmt {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Check if files are formatted (don't modify)
        #[arg(long)]
        check: bool,

        /// Drop description strings
        #[arg(long)]
        no_descriptions: bool,
    },

    /// Resolve a request against JSON data
    Exec {
        /// Schema file path
        #[arg(short, long)]
        schema: PathBuf,

        /// JSON file holding the query root data
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Request document path
        #[arg(short = 'Q', long)]
        query: PathBuf,

        /// Operation to run when the document holds several
        #[arg(long)]
        op: Option<String>,

        /// Variables as a JSON object
        #[arg(long)]
        vars: Option<String>,

        /// Sort object keys in the output
        #[arg(long)]
        sort: bool,

        /// Indent the output by this many spaces
        #[arg(long)]
        indent: Option<usize>,

        /// Accept strings where enum values are expected
        #[arg(long)]
        relaxed: bool,
    },
}

pub fn run(cli: Cli) -> Result<i32, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Check {
            files,
            queries,
            strict,
        } => check_files(&files, &queries, strict, cli.verbose, cli.quiet),
        Commands::Fmt {
            files,
            check,
            no_descriptions,
        } => {
            let options = SdlOptions::new().with_descriptions(!no_descriptions);
            format_files(&files, check, &options, cli.verbose)
        }
        Commands::Exec {
            schema,
            data,
            query,
            op,
            vars,
            sort,
            indent,
            relaxed,
        } => {
            let request = ExecRequest {
                schema,
                data,
                query,
                op,
                vars,
                relaxed,
            };
            let mut options = WriteOptions::new().with_sort_keys(sort);
            if let Some(indent) = indent {
                options = options.with_indent(indent);
            }
            exec(&request, &options)
        }
    }
}

/// Prints each error under a file heading. Returns true if any of them is
/// not a warning.
fn report(file: &Path, errors: &Errors, strict: bool) -> bool {
    let failed = if strict {
        !errors.is_empty()
    } else {
        errors.has_errors()
    };
    let heading = if failed {
        "Error".red().bold()
    } else {
        "Warning".yellow().bold()
    };
    eprintln!("{heading} {}", file.display());
    for error in errors.iter() {
        eprintln!("{:?}", miette::Report::new(error.clone()));
    }
    failed
}

fn check_files(
    files: &[PathBuf],
    queries: &[PathBuf],
    strict: bool,
    verbose: bool,
    quiet: bool,
) -> Result<i32, Box<dyn std::error::Error>> {
    let mut has_errors = false;
    let mut root = Root::default();

    for file in files {
        if verbose {
            println!("{} {}", "Checking".blue(), file.display());
        }
        let source = std::fs::read_to_string(file)?;
        match root.parse_sdl(&source) {
            Ok(()) => {
                tracing::debug!(file = %file.display(), "schema loaded");
                if verbose {
                    println!("{} {}", "OK".green(), file.display());
                }
            }
            Err(errors) => has_errors |= report(file, &errors, strict),
        }
    }

    for file in queries {
        if verbose {
            println!("{} {}", "Checking".blue(), file.display());
        }
        let source = std::fs::read_to_string(file)?;
        match root.parse_executable(&source) {
            Ok(doc) => {
                tracing::debug!(file = %file.display(), ops = doc.ops.len(), "request valid");
                if verbose {
                    println!("{} {}", "OK".green(), file.display());
                }
            }
            Err(errors) => has_errors |= report(file, &errors, strict),
        }
    }

    if has_errors {
        Ok(1)
    } else {
        if !quiet {
            println!(
                "{} {} file(s) checked",
                "Success:".green().bold(),
                files.len() + queries.len()
            );
        }
        Ok(0)
    }
}

/// Parses `source` on its own and writes it back as SDL.
fn format_source(source: &str, options: &SdlOptions) -> Result<String, Errors> {
    let mut root = Root::default();
    root.parse_sdl(source)?;
    Ok(root.sdl(options))
}

fn format_files(
    files: &[PathBuf],
    check_only: bool,
    options: &SdlOptions,
    verbose: bool,
) -> Result<i32, Box<dyn std::error::Error>> {
    let mut needs_formatting = false;
    let mut has_errors = false;

    for file in files {
        let source = std::fs::read_to_string(file)?;
        let formatted = match format_source(&source, options) {
            Ok(formatted) => formatted,
            Err(errors) => {
                has_errors |= report(file, &errors, false);
                continue;
            }
        };

        if check_only {
            if source != formatted {
                needs_formatting = true;
                println!("{} {}", "Would format".yellow(), file.display());
            } else if verbose {
                println!("{} {}", "OK".green(), file.display());
            }
        } else if source != formatted {
            std::fs::write(file, &formatted)?;
            println!("{} {}", "Formatted".green(), file.display());
        } else if verbose {
            println!("{} {}", "Unchanged".dimmed(), file.display());
        }
    }

    if has_errors || (check_only && needs_formatting) {
        Ok(1)
    } else {
        Ok(0)
    }
}

/// Inputs of the `exec` command.
struct ExecRequest {
    schema: PathBuf,
    data: Option<PathBuf>,
    query: PathBuf,
    op: Option<String>,
    vars: Option<String>,
    relaxed: bool,
}

fn read_json(text: &str, what: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    serde_json::from_str(text).map_err(|e| format!("invalid JSON in {what}: {e}").into())
}

fn exec(
    request: &ExecRequest,
    options: &WriteOptions,
) -> Result<i32, Box<dyn std::error::Error>> {
    let config = graft_runtime::RootConfig::new().with_relaxed(request.relaxed);
    let mut root = Root::new(config);

    let schema = std::fs::read_to_string(&request.schema)?;
    if let Err(errors) = root.parse_sdl(&schema) {
        report(&request.schema, &errors, false);
        return Ok(1);
    }

    if let Some(path) = &request.data {
        let text = std::fs::read_to_string(path)?;
        root.set_data(read_json(&text, &path.display().to_string())?);
    }

    let vars = match &request.vars {
        Some(text) => match Value::from(read_json(text, "--vars")?) {
            Value::Object(map) => map,
            other => return Err(format!("--vars must be an object, got {}", other.kind_name()).into()),
        },
        None => Map::new(),
    };

    let query = std::fs::read_to_string(&request.query)?;
    let response = root.resolve_string(&query, request.op.as_deref(), &vars);
    tracing::debug!(errors = response.errors.len(), "request resolved");
    println!("{}", response.write_json(options));

    Ok(i32::from(!response.is_ok()))
}
