//! Structural binding of GraphQL fields to members of native types.
//!
//! A [`Binding`] is an explicit registration table for one Rust type: each
//! member is a getter (`Fn(&T) -> V`) or an argument-taking method
//! (`Fn(&T, &Args) -> V`), either infallible or returning `Result<V>`.
//! Field names are matched to members on first use and the match is
//! memoized.

use crate::data::{runtime_type_id, Data, Object};
use crate::resolver::{to_snake_case, Args};
use graft_core::{Error, Result};
use graft_schema::Field;
use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

type Getter = Arc<dyn Fn(&dyn Any, &Args) -> Result<Data> + Send + Sync>;

/// Member accessors for one native type.
pub struct Binding {
    type_name: String,
    rust_name: &'static str,
    members: FxHashMap<String, Getter>,
    lookups: RwLock<FxHashMap<String, Option<Getter>>>,
}

impl Binding {
    /// Returns the GraphQL type name the native type implements.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the number of registered members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if no members are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Finds the member for a field name: the exact name, then its
    /// snake_case spelling, then its capitalized spelling.
    fn lookup(&self, field: &str) -> Option<Getter> {
        let cached = self
            .lookups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(field)
            .cloned();
        if let Some(found) = cached {
            return found;
        }

        let found = [field.to_string(), to_snake_case(field), capitalize(field)]
            .iter()
            .find_map(|name| self.members.get(name).cloned());
        self.lookups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(field.to_string(), found.clone());
        found
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("type_name", &self.type_name)
            .field("rust_name", &self.rust_name)
            .field("members", &self.members.len())
            .finish_non_exhaustive()
    }
}

/// Builds a [`Binding`] for `T`.
pub struct BindingBuilder<T> {
    type_name: String,
    members: FxHashMap<String, Getter>,
    _marker: PhantomData<fn(&T)>,
}

impl<T: Any + Send + Sync> BindingBuilder<T> {
    /// Starts a binding of `T` to the GraphQL type `type_name`.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            members: FxHashMap::default(),
            _marker: PhantomData,
        }
    }

    /// Adds a getter.
    #[must_use]
    pub fn field<V, F>(self, name: impl Into<String>, f: F) -> Self
    where
        V: Into<Data>,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.try_method(name, move |obj, _| Ok(f(obj)))
    }

    /// Adds a fallible getter.
    #[must_use]
    pub fn try_field<V, F>(self, name: impl Into<String>, f: F) -> Self
    where
        V: Into<Data>,
        F: Fn(&T) -> Result<V> + Send + Sync + 'static,
    {
        self.try_method(name, move |obj, _| f(obj))
    }

    /// Adds a method taking the field's arguments.
    #[must_use]
    pub fn method<V, F>(self, name: impl Into<String>, f: F) -> Self
    where
        V: Into<Data>,
        F: Fn(&T, &Args) -> V + Send + Sync + 'static,
    {
        self.try_method(name, move |obj, args| Ok(f(obj, args)))
    }

    /// Adds a fallible method taking the field's arguments.
    #[must_use]
    pub fn try_method<V, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        V: Into<Data>,
        F: Fn(&T, &Args) -> Result<V> + Send + Sync + 'static,
    {
        let getter: Getter = Arc::new(move |obj: &dyn Any, args: &Args| {
            let obj = obj.downcast_ref::<T>().ok_or_else(|| {
                Error::meta(format!(
                    "binding for {} called on another type",
                    std::any::type_name::<T>()
                ))
            })?;
            f(obj, args).map(Into::into)
        });
        self.members.insert(name.into(), getter);
        self
    }

    /// Finishes the binding.
    #[must_use]
    pub fn build(self) -> Binding {
        Binding {
            type_name: self.type_name,
            rust_name: std::any::type_name::<T>(),
            members: self.members,
            lookups: RwLock::new(FxHashMap::default()),
        }
    }
}

/// Bindings keyed by the native type they describe.
#[derive(Debug, Default)]
pub struct Binder {
    bindings: RwLock<FxHashMap<TypeId, Arc<Binding>>>,
}

impl Binder {
    /// Creates an empty binder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the binding for `T`, replacing any earlier one.
    pub fn bind<T: Any + Send + Sync>(&self, builder: BindingBuilder<T>) -> Arc<Binding> {
        let binding = Arc::new(builder.build());
        tracing::debug!(
            rust = binding.rust_name,
            graphql = %binding.type_name,
            members = binding.len(),
            "binding registered"
        );
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<T>(), Arc::clone(&binding));
        binding
    }

    /// Returns the binding for a native type.
    #[must_use]
    pub fn get(&self, id: TypeId) -> Option<Arc<Binding>> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Resolves `field` on `obj` through its binding.
    pub fn resolve(&self, obj: &dyn Object, field: &Field, args: &Args) -> Result<Data> {
        let binding = self.get(runtime_type_id(obj)).ok_or_else(|| {
            Error::meta(format!("no binding registered for {}", obj.type_name()))
        })?;
        let getter = binding.lookup(&field.name).ok_or_else(|| {
            Error::meta(format!(
                "{} has no member for field {}",
                binding.type_name, field.name
            ))
        })?;
        getter(obj.as_any(), args)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
