//! Runtime data handed to and returned from resolvers.
//!
//! Untyped data is a plain [`Value`]. Application objects are
//! `Arc<dyn Object>` and are resolved through their own [`Resolver`] or
//! through a registered binding.

use crate::resolver::{ListResolver, Resolver};
use crate::subscription::Subscriber;
use graft_core::Value;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Access to the concrete type behind a trait object.
pub trait AsAny {
    /// Returns `self` as [`Any`].
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An application object exposed to the executor.
///
/// Plain data structs only need `impl Object for T {}` and a binding. Types
/// that compute fields themselves return `Some(self)` from
/// [`Object::as_resolver`].
pub trait Object: AsAny + Send + Sync {
    /// The runtime type name, matched against GraphQL type names when an
    /// abstract type must be narrowed.
    fn type_name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Returns the object's own field resolver, if it has one.
    fn as_resolver(&self) -> Option<&dyn Resolver> {
        None
    }

    /// Returns the object as an indexable list, if it is one.
    fn as_list(&self) -> Option<&dyn ListResolver> {
        None
    }
}

/// Returns the [`TypeId`] of the concrete type behind `obj`.
#[must_use]
pub fn runtime_type_id(obj: &dyn Object) -> TypeId {
    obj.as_any().type_id()
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Data flowing through resolution.
#[derive(Clone, Default)]
pub enum Data {
    /// Untyped data, resolved by the registered `AnyResolver`.
    Value(Value),
    /// A list of data.
    List(Vec<Data>),
    /// An application object.
    Object(Arc<dyn Object>),
    /// A subscription endpoint returned from a subscription field.
    Subscriber(Arc<dyn Subscriber>),
    /// No data.
    #[default]
    Null,
}

impl Data {
    /// Wraps an application object.
    pub fn object<T: Object + 'static>(obj: T) -> Self {
        Self::Object(Arc::new(obj))
    }

    /// Wraps a subscriber.
    pub fn subscriber<T: Subscriber + 'static>(subscriber: T) -> Self {
        Self::Subscriber(Arc::new(subscriber))
    }

    /// Returns true for `Null` and `Value::Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Value(Value::Null))
    }

    /// Converts to a plain value without resolving anything. Objects and
    /// subscribers become null.
    #[must_use]
    pub fn into_raw(self) -> Value {
        match self {
            Self::Value(v) => v,
            Self::List(items) => Value::List(items.into_iter().map(Data::into_raw).collect()),
            Self::Object(_) | Self::Subscriber(_) | Self::Null => Value::Null,
        }
    }

    /// Returns a short description of the data's kind for messages.
    #[must_use]
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Value(v) => v.kind_name(),
            Self::List(_) => "list",
            Self::Object(obj) => obj.type_name(),
            Self::Subscriber(_) => "subscriber",
            Self::Null => "null",
        }
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Object(obj) => f.debug_tuple("Object").field(&obj.type_name()).finish(),
            Self::Subscriber(_) => f.write_str("Subscriber"),
            Self::Null => f.write_str("Null"),
        }
    }
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<serde_json::Value> for Data {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<&str> for Data {
    fn from(s: &str) -> Self {
        Self::Value(Value::from(s))
    }
}

impl From<String> for Data {
    fn from(s: String) -> Self {
        Self::Value(Value::String(s))
    }
}

impl From<&String> for Data {
    fn from(s: &String) -> Self {
        Self::Value(Value::String(s.clone()))
    }
}

impl From<bool> for Data {
    fn from(b: bool) -> Self {
        Self::Value(Value::Bool(b))
    }
}

impl From<i32> for Data {
    fn from(i: i32) -> Self {
        Self::Value(Value::from(i))
    }
}

impl From<i64> for Data {
    fn from(i: i64) -> Self {
        Self::Value(Value::Int(i))
    }
}

impl From<u32> for Data {
    fn from(i: u32) -> Self {
        Self::Value(Value::from(i))
    }
}

impl From<f64> for Data {
    fn from(f: f64) -> Self {
        Self::Value(Value::Float(f))
    }
}

impl<T: Into<Data>> From<Vec<T>> for Data {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Data>> From<Option<T>> for Data {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

impl From<Arc<dyn Object>> for Data {
    fn from(obj: Arc<dyn Object>) -> Self {
        Self::Object(obj)
    }
}
