//! Dynamic values.
//!
//! [`Value`] is the single representation used for literals in documents,
//! coerced arguments and variables, and resolved response data.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;
use std::fmt::{self, Write as _};

/// An insertion-ordered object map.
pub type Map = IndexMap<String, Value>;

/// A dynamic value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// `null`.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A 64-bit integer.
    Int(i64),
    /// A double.
    Float(f64),
    /// A string.
    String(String),
    /// A bare enum symbol.
    Enum(String),
    /// A `$name` variable reference, only present before variables are bound.
    Var(String),
    /// A timestamp.
    Time(DateTime<FixedOffset>),
    /// A list.
    List(Vec<Value>),
    /// An object.
    Object(Map),
}

impl Value {
    /// Returns true for `Null`.
    #[must_use]
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns any numeric value as a double.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the text of a string or enum symbol.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list elements, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the object map, if this is an object.
    #[must_use]
    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up a key on an object value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|m| m.get(key))
    }

    /// Returns a short name of the value's kind, used in error messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Enum(_) => "enum symbol",
            Self::Var(_) => "variable",
            Self::Time(_) => "time",
            Self::List(_) => "list",
            Self::Object(_) => "object",
        }
    }

    /// Converts into a `serde_json::Value`.
    ///
    /// Object key order follows `serde_json`'s map, so callers that need the
    /// insertion order should serialize the `Value` directly.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Returns a copy with object keys sorted recursively.
    #[must_use]
    pub fn sorted(&self) -> Value {
        match self {
            Self::List(items) => Self::List(items.iter().map(Value::sorted).collect()),
            Self::Object(map) => {
                let mut sorted: Map = map.iter().map(|(k, v)| (k.clone(), v.sorted())).collect();
                sorted.sort_keys();
                Self::Object(sorted)
            }
            other => other.clone(),
        }
    }

    /// Writes the value as JSON text.
    #[must_use]
    pub fn write_json(&self, options: &WriteOptions) -> String {
        write_json(self, options)
    }
}

/// Writes any serializable value as JSON text.
///
/// Sorting is applied by round-tripping through [`Value`], so it works for
/// responses as well as bare values.
#[must_use]
pub fn write_json<T: Serialize + ?Sized>(value: &T, options: &WriteOptions) -> String {
    if options.sort_keys {
        let sorted = serde_json::to_value(value)
            .map(Value::from)
            .unwrap_or_default()
            .sorted();
        return write_ordered(&sorted, options.indent);
    }
    write_ordered(value, options.indent)
}

fn write_ordered<T: Serialize + ?Sized>(value: &T, indent: Option<usize>) -> String {
    let text = match indent {
        None | Some(0) => serde_json::to_string(value),
        Some(width) => {
            let indent = " ".repeat(width);
            let mut buf = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
            let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
            value
                .serialize(&mut ser)
                .map(|()| String::from_utf8_lossy(&buf).into_owned())
        }
    };
    text.unwrap_or_else(|_| "null".to_string())
}

/// Options for the JSON writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Sort object keys.
    pub sort_keys: bool,
    /// Pretty-print with this many spaces per level.
    pub indent: Option<usize>,
}

impl WriteOptions {
    /// Creates default options: insertion order, compact.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets key sorting.
    #[must_use]
    pub fn with_sort_keys(mut self, sort: bool) -> Self {
        self.sort_keys = sort;
        self
    }

    /// Sets the indent width.
    #[must_use]
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = Some(indent);
        self
    }
}

/// Formats a timestamp the way `Time` values are written.
#[must_use]
pub fn format_time(time: &DateTime<FixedOffset>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) | Self::Enum(s) => serializer.serialize_str(s),
            Self::Var(name) => serializer.serialize_str(&format!("${name}")),
            Self::Time(t) => serializer.serialize_str(&format_time(t)),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(t: DateTime<FixedOffset>) -> Self {
        Self::Time(t)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Time(t.fixed_offset())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Self::Object(map)
    }
}

/// Displays the value in document literal syntax.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            Self::String(s) => write_quoted(f, s),
            Self::Enum(s) => f.write_str(s),
            Self::Var(name) => write!(f, "${name}"),
            Self::Time(t) => write_quoted(f, &format_time(t)),
            Self::List(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_char(']')
            }
            Self::Object(map) => {
                f.write_char('{')?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if is_name(k) {
                        f.write_str(k)?;
                    } else {
                        write_quoted(f, k)?;
                    }
                    write!(f, ": {v}")?;
                }
                f.write_char('}')
            }
        }
    }
}

/// Returns true if `s` can be written as a bare name.
fn is_name(s: &str) -> bool {
    let mut bytes = s.bytes();
    bytes
        .next()
        .is_some_and(|b| b == b'_' || b.is_ascii_alphabetic())
        && bytes.all(|b| b == b'_' || b.is_ascii_alphanumeric())
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(pairs: &[(&str, Value)]) -> Value {
        Value::Object(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_display_literal() {
        let v = object(&[
            ("a", Value::Int(1)),
            ("b", Value::List(vec![Value::Enum("RED".into()), Value::Null])),
            ("c", Value::from("x\"y")),
            ("d", Value::Float(2.0)),
        ]);
        assert_eq!(v.to_string(), r#"{a: 1, b: [RED, null], c: "x\"y", d: 2.0}"#);

        let keys = object(&[("my key", Value::Int(1)), ("_ok2", Value::Int(2)), ("9", Value::Null)]);
        assert_eq!(keys.to_string(), r#"{"my key": 1, _ok2: 2, "9": null}"#);
    }

    #[test]
    fn test_serialize_preserves_order() {
        let v = object(&[("z", Value::Int(1)), ("a", Value::Int(2))]);
        assert_eq!(v.write_json(&WriteOptions::new()), r#"{"z":1,"a":2}"#);
        assert_eq!(
            v.write_json(&WriteOptions::new().with_sort_keys(true)),
            r#"{"a":2,"z":1}"#
        );
    }

    #[test]
    fn test_write_indent() {
        let v = object(&[("a", Value::List(vec![Value::Int(1)]))]);
        let text = v.write_json(&WriteOptions::new().with_indent(2));
        assert_eq!(text, "{\n  \"a\": [\n    1\n  ]\n}");
    }

    #[test]
    fn test_from_json() {
        let v = Value::from(json!({"n": 3, "f": 1.5, "s": "x", "l": [true, null]}));
        assert_eq!(v.get("n"), Some(&Value::Int(3)));
        assert_eq!(v.get("f"), Some(&Value::Float(1.5)));
        assert_eq!(v.get("s").and_then(Value::as_str), Some("x"));
        assert_eq!(
            v.get("l"),
            Some(&Value::List(vec![Value::Bool(true), Value::Null]))
        );
    }

    #[test]
    fn test_time_serializes_rfc3339() {
        let t = DateTime::parse_from_rfc3339("2024-05-01T10:20:30Z").unwrap();
        let v = Value::Time(t);
        assert_eq!(v.to_json(), json!("2024-05-01T10:20:30.000000000Z"));
    }
}
