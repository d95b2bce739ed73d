//! Resolver strategies.
//!
//! A field is resolved by, in order:
//! - a [`Resolver`] exposed by the current object,
//! - the registered [`AnyResolver`] when the current data is an untyped
//!   [`Value`],
//! - a [`Binding`](crate::Binding) registered for the object's type.

use crate::data::{Data, Object};
use graft_core::{Error, Map, Result, Value};
use graft_schema::Field;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Arguments passed to a resolver, coerced and in definition order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    args: Map,
}

impl Args {
    /// Creates empty arguments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets an argument by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Gets an argument converted to `T`.
    #[must_use]
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.args
            .get(name)
            .and_then(|v| serde_json::from_value(v.to_json()).ok())
    }

    /// Gets a required argument converted to `T`.
    pub fn require<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self
            .args
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| Error::resolve(format!("missing required argument {name}")))?;
        serde_json::from_value(value.to_json())
            .map_err(|e| Error::resolve(format!("failed to read argument {name}: {e}")))
    }

    /// Sets an argument.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.args.insert(name.into(), value.into());
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.args.iter()
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Returns true if there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Returns the arguments as a map.
    #[must_use]
    pub fn as_map(&self) -> &Map {
        &self.args
    }
}

impl From<Map> for Args {
    fn from(args: Map) -> Self {
        Self { args }
    }
}

/// A field resolution capability on an object.
pub trait Resolver: Send + Sync {
    /// Resolves `field` with its coerced arguments.
    fn resolve(&self, field: &Field, args: &Args) -> Result<Data>;
}

/// A resolver function.
pub type ResolverFn = Arc<dyn Fn(&Field, &Args) -> Result<Data> + Send + Sync>;

/// Wraps a closure as an object that resolves every field through it.
#[derive(Clone)]
pub struct FnResolver {
    func: ResolverFn,
}

impl FnResolver {
    /// Creates a new function resolver.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Field, &Args) -> Result<Data> + Send + Sync + 'static,
    {
        Self { func: Arc::new(f) }
    }
}

impl Resolver for FnResolver {
    fn resolve(&self, field: &Field, args: &Args) -> Result<Data> {
        (self.func)(field, args)
    }
}

impl Object for FnResolver {
    fn as_resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

impl fmt::Debug for FnResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnResolver").finish_non_exhaustive()
    }
}

/// An object resolving each field through its own function. Fields without
/// a function are read from the fallback value, if any.
#[derive(Clone)]
pub struct ResolverMap {
    type_name: String,
    resolvers: FxHashMap<String, ResolverFn>,
    fallback: Value,
}

impl ResolverMap {
    /// Creates an empty map for the GraphQL type `type_name`.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            resolvers: FxHashMap::default(),
            fallback: Value::Null,
        }
    }

    /// Registers a function for a field.
    #[must_use]
    pub fn with_fn<F>(mut self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Field, &Args) -> Result<Data> + Send + Sync + 'static,
    {
        self.resolvers.insert(field.into(), Arc::new(f));
        self
    }

    /// Sets the value unregistered fields are read from.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<Value>) -> Self {
        self.fallback = fallback.into();
        self
    }
}

impl Resolver for ResolverMap {
    fn resolve(&self, field: &Field, args: &Args) -> Result<Data> {
        match self.resolvers.get(&field.name) {
            Some(f) => f(field, args),
            None => ValueResolver.resolve(&self.fallback, field, args),
        }
    }
}

impl Object for ResolverMap {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn as_resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

impl fmt::Debug for ResolverMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverMap")
            .field("type_name", &self.type_name)
            .field("resolver_count", &self.resolvers.len())
            .finish_non_exhaustive()
    }
}

/// Resolution of untyped data: maps and lists of plain values.
pub trait AnyResolver: Send + Sync {
    /// Resolves `field` on `value`.
    fn resolve(&self, value: &Value, field: &Field, args: &Args) -> Result<Data>;

    /// Returns the length of `value` if it is a list.
    fn len(&self, value: &Value) -> Option<usize>;

    /// Returns the element at `index` of a list value.
    fn nth(&self, value: &Value, index: usize) -> Result<Data>;
}

/// The default [`AnyResolver`]: reads map keys, falling back to the
/// snake_case spelling of the field name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueResolver;

impl AnyResolver for ValueResolver {
    fn resolve(&self, value: &Value, field: &Field, _args: &Args) -> Result<Data> {
        match value {
            Value::Object(map) => {
                let found = map
                    .get(&field.name)
                    .or_else(|| map.get(&to_snake_case(&field.name)));
                Ok(found.cloned().map_or(Data::Null, Data::Value))
            }
            Value::Null => Ok(Data::Null),
            other => Err(Error::resolve(format!(
                "can not read {} from {}",
                field.name,
                other.kind_name()
            ))),
        }
    }

    fn len(&self, value: &Value) -> Option<usize> {
        value.as_list().map(<[Value]>::len)
    }

    fn nth(&self, value: &Value, index: usize) -> Result<Data> {
        value
            .as_list()
            .and_then(|items| items.get(index))
            .cloned()
            .map(Data::Value)
            .ok_or_else(|| Error::resolve(format!("index {index} is out of range")))
    }
}

/// A custom list with length and index access.
pub trait ListResolver: Send + Sync {
    /// Returns the number of elements.
    fn len(&self) -> usize;

    /// Returns the element at `index`.
    fn nth(&self, index: usize) -> Result<Data>;

    /// Returns true if there are no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Converts camelCase to snake_case.
pub(crate) fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
