//! The schema registry.
//!
//! A [`Registry`] owns every named type and directive. Mutations go through
//! [`Registry::add_types`], which stages the change on a copy and commits it
//! only if reference resolution and validation both succeed.

use crate::builtins;
use crate::executable::OpKind;
use crate::scalars::ScalarCoercer;
use crate::types::{Decl, Directive, Type, TypeDef, TypeRef};
use crate::validate;
use graft_core::{Error, Errors, Result};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::mem;
use std::sync::Arc;

/// Which optional built-in scalars to install.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuiltinOptions {
    /// Install `Int64`.
    pub int64: bool,
    /// Install `Float64`.
    pub float64: bool,
}

impl BuiltinOptions {
    /// Enables every optional scalar.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            int64: true,
            float64: true,
        }
    }
}

/// The catalog of named types and directives.
#[derive(Debug, Clone)]
pub struct Registry {
    types: IndexMap<String, Type>,
    directives: IndexMap<String, Directive>,
    schema: Option<Type>,
    options: BuiltinOptions,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates a registry with the built-in scalars, directives and
    /// introspection types.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(BuiltinOptions::default())
    }

    /// Creates a registry with the given optional scalars.
    #[must_use]
    pub fn with_options(options: BuiltinOptions) -> Self {
        let mut registry = Self::empty(options);
        builtins::install(&mut registry);
        registry
    }

    /// Creates a registry with nothing in it.
    #[must_use]
    pub fn empty(options: BuiltinOptions) -> Self {
        Self {
            types: IndexMap::new(),
            directives: IndexMap::new(),
            schema: None,
            options,
        }
    }

    /// Returns the builtin options this registry was created with.
    #[must_use]
    pub const fn options(&self) -> BuiltinOptions {
        self.options
    }

    /// Looks up a named type.
    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    /// Looks up a directive.
    #[must_use]
    pub fn get_directive(&self, name: &str) -> Option<&Directive> {
        self.directives.get(name)
    }

    /// Iterates over named types in registration order.
    pub fn types(&self) -> impl Iterator<Item = &Type> {
        self.types.values()
    }

    /// Iterates over directives in registration order.
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.directives.values()
    }

    /// Returns the `schema` declaration, if one was given.
    #[must_use]
    pub fn schema(&self) -> Option<&Type> {
        self.schema.as_ref()
    }

    pub(crate) fn types_mut(&mut self) -> impl Iterator<Item = &mut Type> {
        self.types.values_mut().chain(self.schema.iter_mut())
    }

    pub(crate) fn directives_mut(&mut self) -> impl Iterator<Item = &mut Directive> {
        self.directives.values_mut()
    }

    /// Returns the root type for an operation kind. Without a `schema`
    /// declaration the conventional names are used.
    #[must_use]
    pub fn root_type(&self, kind: OpKind) -> Option<&Type> {
        if let Some(TypeDef::Schema(schema)) = self.schema.as_ref().map(|s| &s.def) {
            let root = match kind {
                OpKind::Query => &schema.query,
                OpKind::Mutation => &schema.mutation,
                OpKind::Subscription => &schema.subscription,
            };
            if let Some(root) = root {
                return self.get_type(root.base_name());
            }
        }
        self.get_type(kind.default_root())
    }

    /// Adds declarations as one transaction.
    ///
    /// The change is applied to a copy, references are resolved and the whole
    /// registry is validated. On any error the registry is left untouched and
    /// every error found is returned.
    pub fn add_types(&mut self, decls: Vec<Decl>) -> Result<(), Errors> {
        let count = decls.len();
        let mut staged = self.clone();
        match staged.stage(decls) {
            Ok(()) => {
                *self = staged;
                tracing::debug!(count, "schema declarations committed");
                Ok(())
            }
            Err(errors) => {
                tracing::warn!(count, errors = errors.len(), "schema change rolled back");
                Err(errors)
            }
        }
    }

    fn stage(&mut self, decls: Vec<Decl>) -> Result<(), Errors> {
        self.apply(decls)?;
        self.replace_refs()?;
        validate::validate_schema(self)
    }

    /// Inserts or merges declarations without resolving or validating.
    ///
    /// New directives and types go in first so an `extend` may target a
    /// declaration made later in the same batch.
    pub(crate) fn apply(&mut self, decls: Vec<Decl>) -> Result<(), Errors> {
        let mut errors = Errors::new();
        let mut extends = Vec::new();
        for decl in decls {
            let result = match decl {
                Decl::Type(ty) => self.insert_type(ty),
                Decl::Directive(dir) => self.insert_directive(dir),
                Decl::Extend(ty) => {
                    extends.push(ty);
                    Ok(())
                }
            };
            if let Err(e) = result {
                errors.push(e);
            }
        }
        for ty in extends {
            if let Err(e) = self.extend(ty) {
                errors.push(e);
            }
        }
        errors.into_result(())
    }

    fn insert_type(&mut self, ty: Type) -> Result<()> {
        if matches!(ty.def, TypeDef::Schema(_)) {
            if self.schema.is_some() {
                return Err(Error::duplicate("schema already defined").at(ty.pos));
            }
            self.schema = Some(ty);
            return Ok(());
        }
        if self.types.contains_key(&ty.name) {
            return Err(Error::duplicate(format!("type {} already defined", ty.name)).at(ty.pos));
        }
        self.types.insert(ty.name.clone(), ty);
        Ok(())
    }

    fn insert_directive(&mut self, dir: Directive) -> Result<()> {
        if self.directives.contains_key(&dir.name) {
            return Err(
                Error::duplicate(format!("directive @{} already defined", dir.name)).at(dir.pos),
            );
        }
        self.directives.insert(dir.name.clone(), dir);
        Ok(())
    }

    /// Merges an `extend` declaration into the existing same-named one.
    fn extend(&mut self, ext: Type) -> Result<()> {
        let target = if matches!(ext.def, TypeDef::Schema(_)) {
            self.schema.as_mut()
        } else {
            self.types.get_mut(&ext.name)
        };
        let Some(target) = target else {
            return Err(Error::not_found(format!(
                "can not extend undefined {} {}",
                ext.def.keyword(),
                ext.name
            ))
            .at(ext.pos));
        };
        if mem::discriminant(&target.def) != mem::discriminant(&ext.def) {
            return Err(Error::type_mismatch(format!(
                "can not extend {} {} with {}",
                target.def.keyword(),
                target.name,
                ext.def.keyword()
            ))
            .at(ext.pos));
        }

        let name = target.name.clone();
        target.directives.extend(ext.directives);
        if target.description.is_none() {
            target.description = ext.description;
        }
        let duplicate = |what: &str, member: &str| {
            Error::duplicate(format!("{what} {name}.{member} already defined")).at(ext.pos)
        };
        match (&mut target.def, ext.def) {
            (TypeDef::Object(t), TypeDef::Object(e))
            | (TypeDef::Interface(t), TypeDef::Interface(e)) => {
                for iface in e.interfaces {
                    if !t.interfaces.iter().any(|i| i.base_name() == iface.base_name()) {
                        t.interfaces.push(iface);
                    }
                }
                for (key, field) in e.fields {
                    if t.fields.contains_key(&key) {
                        return Err(duplicate("field", &key));
                    }
                    t.fields.insert(key, field);
                }
            }
            (TypeDef::Union(t), TypeDef::Union(e)) => {
                for member in e.members {
                    if t.members.iter().any(|m| m.base_name() == member.base_name()) {
                        return Err(duplicate("member", member.base_name()));
                    }
                    t.members.push(member);
                }
            }
            (TypeDef::Enum(t), TypeDef::Enum(e)) => {
                for (key, value) in e.values {
                    if t.values.contains_key(&key) {
                        return Err(duplicate("value", &key));
                    }
                    t.values.insert(key, value);
                }
            }
            (TypeDef::Input(t), TypeDef::Input(e)) => {
                for (key, field) in e.fields {
                    if t.fields.contains_key(&key) {
                        return Err(duplicate("field", &key));
                    }
                    t.fields.insert(key, field);
                }
            }
            (TypeDef::Schema(t), TypeDef::Schema(e)) => {
                for (slot, root, op) in [
                    (&mut t.query, e.query, "query"),
                    (&mut t.mutation, e.mutation, "mutation"),
                    (&mut t.subscription, e.subscription, "subscription"),
                ] {
                    if let Some(root) = root {
                        if slot.is_some() {
                            return Err(duplicate("root", op));
                        }
                        *slot = Some(root);
                    }
                }
            }
            (TypeDef::Scalar(_), TypeDef::Scalar(_)) => {}
            _ => {
                return Err(Error::type_mismatch(format!("can not extend {name}")).at(ext.pos));
            }
        }
        tracing::debug!(name = %name, "declaration extended");
        Ok(())
    }

    /// Replaces every unresolved reference with a checked name.
    ///
    /// Walks field types, arguments, list/non-null wrappers, interface lists,
    /// union members, schema roots and directive arguments. A name that was
    /// never defined is reported at the position it was used.
    pub fn replace_refs(&mut self) -> Result<(), Errors> {
        let known: FxHashSet<String> = self.types.keys().cloned().collect();
        let mut errors = Errors::new();
        let mut fix = |ty: &mut TypeRef| resolve_in_place(ty, &known, &mut errors);

        for ty in self.types.values_mut().chain(self.schema.iter_mut()) {
            match &mut ty.def {
                TypeDef::Object(o) | TypeDef::Interface(o) => {
                    o.interfaces.iter_mut().for_each(&mut fix);
                    for field in o.fields.values_mut() {
                        fix(&mut field.ty);
                        for arg in field.args.values_mut() {
                            fix(&mut arg.ty);
                        }
                    }
                }
                TypeDef::Union(u) => u.members.iter_mut().for_each(&mut fix),
                TypeDef::Input(i) => {
                    for field in i.fields.values_mut() {
                        fix(&mut field.ty);
                    }
                }
                TypeDef::Schema(s) => {
                    for root in [&mut s.query, &mut s.mutation, &mut s.subscription]
                        .into_iter()
                        .flatten()
                    {
                        fix(root);
                    }
                }
                TypeDef::Scalar(_) | TypeDef::Enum(_) => {}
            }
        }
        for dir in self.directives.values_mut() {
            for arg in dir.args.values_mut() {
                fix(&mut arg.ty);
            }
        }
        tracing::debug!(unresolved = errors.len(), "references replaced");
        errors.into_result(())
    }

    /// Resolves a single reference against this registry.
    pub fn resolve_ref(&self, ty: &TypeRef) -> Result<TypeRef> {
        match ty {
            TypeRef::Ref { name, pos } => {
                if self.types.contains_key(name) {
                    Ok(TypeRef::Named(name.clone()))
                } else {
                    Err(Error::validation(format!("type {name} is not defined")).at(*pos))
                }
            }
            TypeRef::Named(name) => {
                if self.types.contains_key(name) {
                    Ok(ty.clone())
                } else {
                    Err(Error::validation(format!("type {name} is not defined")))
                }
            }
            TypeRef::List(inner) => Ok(self.resolve_ref(inner)?.list()),
            TypeRef::NonNull(inner) => Ok(TypeRef::NonNull(Box::new(self.resolve_ref(inner)?))),
        }
    }

    /// Returns the named type at the bottom of a reference.
    #[must_use]
    pub fn named(&self, ty: &TypeRef) -> Option<&Type> {
        self.get_type(ty.base_name())
    }

    /// Returns the scalar coercer for a type name.
    #[must_use]
    pub fn coercer(&self, name: &str) -> Option<Arc<dyn ScalarCoercer>> {
        match &self.get_type(name)?.def {
            TypeDef::Scalar(s) => Some(Arc::clone(&s.coercer)),
            _ => None,
        }
    }

    /// Returns true if the reference resolves to an input type.
    #[must_use]
    pub fn is_input(&self, ty: &TypeRef) -> bool {
        self.named(ty).is_some_and(Type::is_input)
    }

    /// Returns true if the reference resolves to an output type.
    #[must_use]
    pub fn is_output(&self, ty: &TypeRef) -> bool {
        self.named(ty).is_some_and(Type::is_output)
    }

    /// Returns true if object or interface `name` implements `iface`,
    /// directly or through another interface.
    #[must_use]
    pub fn implements(&self, name: &str, iface: &str) -> bool {
        let mut seen = FxHashSet::default();
        let mut stack = vec![name];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(ty) = self.get_type(current) else {
                continue;
            };
            for i in ty.interfaces() {
                if i.base_name() == iface {
                    return true;
                }
                stack.push(i.base_name());
            }
        }
        false
    }

    /// Returns true if `name` is a member of union `abstract_name` or
    /// implements interface `abstract_name`.
    #[must_use]
    pub fn is_possible_type(&self, abstract_name: &str, name: &str) -> bool {
        match self.get_type(abstract_name).map(|t| &t.def) {
            Some(TypeDef::Union(u)) => u.members.iter().any(|m| m.base_name() == name),
            Some(TypeDef::Interface(_)) => self.implements(name, abstract_name),
            _ => false,
        }
    }

    /// Returns the object types an abstract type may resolve to.
    #[must_use]
    pub fn possible_types(&self, abstract_name: &str) -> Vec<&Type> {
        match self.get_type(abstract_name).map(|t| &t.def) {
            Some(TypeDef::Union(u)) => u
                .members
                .iter()
                .filter_map(|m| self.get_type(m.base_name()))
                .collect(),
            Some(TypeDef::Interface(_)) => self
                .types
                .values()
                .filter(|t| {
                    matches!(t.def, TypeDef::Object(_)) && self.implements(&t.name, abstract_name)
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Returns true if a value of type `sub` can be used where `sup` is
    /// expected: the same type, a union member or interface implementor, or
    /// a structurally covariant list/non-null wrapping.
    #[must_use]
    pub fn is_subtype(&self, sub: &TypeRef, sup: &TypeRef) -> bool {
        match (sub, sup) {
            (TypeRef::NonNull(a), TypeRef::NonNull(b)) => self.is_subtype(a, b),
            (TypeRef::NonNull(a), b) => self.is_subtype(a, b),
            (_, TypeRef::NonNull(_)) => false,
            (TypeRef::List(a), TypeRef::List(b)) => self.is_subtype(a, b),
            (TypeRef::List(_), _) | (_, TypeRef::List(_)) => false,
            _ => {
                let (a, b) = (sub.base_name(), sup.base_name());
                a == b || self.is_possible_type(b, a)
            }
        }
    }
}

fn resolve_in_place(ty: &mut TypeRef, known: &FxHashSet<String>, errors: &mut Errors) {
    match ty {
        TypeRef::Ref { name, pos } => {
            if known.contains(name.as_str()) {
                let name = mem::take(name);
                *ty = TypeRef::Named(name);
            } else {
                errors.push(Error::validation(format!("type {name} is not defined")).at(*pos));
            }
        }
        TypeRef::Named(_) => {}
        TypeRef::List(inner) | TypeRef::NonNull(inner) => resolve_in_place(inner, known, errors),
    }
}
