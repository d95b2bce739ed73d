//! Error reporting for graft.
//!
//! Every failure in the engine is an [`Error`] tagged with an [`ErrorKind`].
//! Parse errors abort immediately; validation and resolution errors are
//! accumulated into an [`Errors`] collection so all of them surface at once.

use crate::pos::Pos;
use crate::value::Map;
use serde::ser::Serializer;
use serde::Serialize;
use std::fmt;

/// Result alias used across graft crates.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The category of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A name was declared twice.
    Duplicate,
    /// A value did not match the type it was coerced to.
    Coerce,
    /// The schema or document has an invalid shape.
    Validation,
    /// Lexical or grammatical failure.
    Parse,
    /// A type or field lookup failed.
    NotFound,
    /// An `extend` crossed declaration kinds.
    TypeMismatch,
    /// A field failed to resolve at runtime.
    Resolve,
    /// A native binding is misconfigured.
    Meta,
}

impl ErrorKind {
    /// Returns the lower-case name used in messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Coerce => "coerce",
            Self::Validation => "validation",
            Self::Parse => "parse",
            Self::NotFound => "not found",
            Self::TypeMismatch => "type mismatch",
            Self::Resolve => "resolve",
            Self::Meta => "meta",
        }
    }

    /// Returns the diagnostic code for this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Duplicate => "graft::duplicate",
            Self::Coerce => "graft::coerce",
            Self::Validation => "graft::validation",
            Self::Parse => "graft::parse",
            Self::NotFound => "graft::not_found",
            Self::TypeMismatch => "graft::type_mismatch",
            Self::Resolve => "graft::resolve",
            Self::Meta => "graft::meta",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    /// A real failure.
    #[default]
    Error,
    /// Reported to the caller but does not indicate failed data.
    Warning,
}

/// One segment of a response path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// A response key.
    Key(String),
    /// A list index.
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

fn at(pos: &Option<Pos>) -> String {
    pos.map(|p| format!(" at {p}")).unwrap_or_default()
}

/// A single engine error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} error: {message}{}", at(.pos))]
pub struct Error {
    /// Category.
    pub kind: ErrorKind,
    /// Human readable message, without the kind prefix.
    pub message: String,
    /// Source position, if the error came from a document.
    pub pos: Option<Pos>,
    /// Response path, outermost key first.
    pub path: Vec<PathSegment>,
    /// Severity.
    pub severity: Severity,
    /// Extra data reported under `extensions`.
    pub extensions: Option<Map>,
}

impl Error {
    /// Creates a new error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            pos: None,
            path: Vec::new(),
            severity: Severity::Error,
            extensions: None,
        }
    }

    /// Creates a duplicate-name error.
    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Duplicate, message)
    }

    /// Creates a coercion error.
    pub fn coerce(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Coerce, message)
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Creates a positioned parse error.
    pub fn parse(pos: Pos, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message).at(pos)
    }

    /// Creates a lookup error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Creates a kind-mismatch error.
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    /// Creates a resolution error.
    pub fn resolve(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resolve, message)
    }

    /// Creates a binding error.
    pub fn meta(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Meta, message)
    }

    /// Attaches a source position.
    #[must_use]
    pub fn at(mut self, pos: Pos) -> Self {
        self.pos = Some(pos);
        self
    }

    /// Attaches a position only if none is set yet.
    #[must_use]
    pub fn or_at(mut self, pos: Pos) -> Self {
        if self.pos.is_none() {
            self.pos = Some(pos);
        }
        self
    }

    /// Marks the error as a warning.
    #[must_use]
    pub fn warning(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    /// Adds an extension entry.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<crate::Value>) -> Self {
        self.extensions
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Prepends a path segment, used as errors bubble up out of a field.
    #[must_use]
    pub fn prefixed(mut self, segment: impl Into<PathSegment>) -> Self {
        self.path.insert(0, segment.into());
        self
    }

    /// Returns true if this error is a warning.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    /// Returns the message as reported in a response, `"<kind> error: <message>"`.
    #[must_use]
    pub fn response_message(&self) -> String {
        format!("{} error: {}", self.kind, self.message)
    }

    /// Returns the error as a response error object: `message`, then
    /// `locations`, `path` and `extensions` when present.
    #[must_use]
    pub fn to_value(&self) -> crate::Value {
        use crate::Value;

        let mut map = Map::new();
        map.insert("message".to_string(), Value::String(self.response_message()));
        if let Some(pos) = self.pos {
            let mut location = Map::new();
            location.insert("line".to_string(), Value::Int(i64::from(pos.line)));
            location.insert("column".to_string(), Value::Int(i64::from(pos.column)));
            map.insert(
                "locations".to_string(),
                Value::List(vec![Value::Object(location)]),
            );
        }
        if !self.path.is_empty() {
            let path = self
                .path
                .iter()
                .map(|segment| match segment {
                    PathSegment::Key(key) => Value::String(key.clone()),
                    PathSegment::Index(index) => {
                        Value::Int(i64::try_from(*index).unwrap_or(i64::MAX))
                    }
                })
                .collect();
            map.insert("path".to_string(), Value::List(path));
        }
        let mut extensions = self.extensions.clone();
        if self.is_warning() {
            extensions
                .get_or_insert_with(Map::new)
                .insert("level".to_string(), Value::from("warning"));
        }
        if let Some(extensions) = extensions {
            map.insert("extensions".to_string(), Value::Object(extensions));
        }
        Value::Object(map)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::new(ErrorKind::Parse, format!("read failed: {error}"))
    }
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl miette::Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.kind.code()))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.severity {
            Severity::Error => miette::Severity::Error,
            Severity::Warning => miette::Severity::Warning,
        })
    }
}

/// A collection of errors reported together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Errors {
    errors: Vec<Error>,
}

impl Errors {
    /// Creates a new empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an error.
    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of collected errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if any collected error is not a warning.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(|e| !e.is_warning())
    }

    /// Iterates over the errors.
    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.errors.iter()
    }

    /// Returns the errors as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Error] {
        &self.errors
    }

    /// Consumes the collection.
    #[must_use]
    pub fn into_vec(self) -> Vec<Error> {
        self.errors
    }

    /// Returns `Ok(value)` when empty, otherwise the collection itself.
    pub fn into_result<T>(self, value: T) -> Result<T, Errors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}

impl miette::Diagnostic for Errors {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.errors.first().map(|e| Box::new(e.kind.code()) as Box<dyn fmt::Display>)
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn miette::Diagnostic> + 'a>> {
        Some(Box::new(
            self.errors.iter().map(|e| e as &dyn miette::Diagnostic),
        ))
    }
}

impl From<Error> for Errors {
    fn from(error: Error) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl From<Vec<Error>> for Errors {
    fn from(errors: Vec<Error>) -> Self {
        Self { errors }
    }
}

impl Extend<Error> for Errors {
    fn extend<I: IntoIterator<Item = Error>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl IntoIterator for Errors {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
