//! Request execution.
//!
//! The executor walks an operation's selection set against the root data,
//! dispatching each field to a resolver strategy and shaping the result by
//! the field's declared type. Errors are collected per field and prefixed
//! with the response key, so sibling fields still produce partial data.

use crate::data::{runtime_type_id, Data, Object};
use crate::introspection::{SchemaIntro, TypeIntro};
use crate::resolver::Args;
use crate::root::Root;
use crate::subscription::{Subscriber, Subscription};
use graft_core::{Error, Errors, Map, Result, Value, WriteOptions};
use graft_schema::{
    find_directive, ArgPlan, CoerceOptions, Coercion, DirectiveUse, Executable, Field, FieldDef,
    FragmentId, Op, OpKind, Registry, Selection, Type, TypeDef, TypeRef, IMPL_DIRECTIVE,
};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;

/// The result of executing a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    /// The `data` member. Null when the request failed before execution.
    pub data: Value,
    /// Every error and warning collected.
    pub errors: Errors,
}

impl Response {
    /// Creates a response for a request that could not be executed.
    pub fn failed(errors: impl Into<Errors>) -> Self {
        Self {
            data: Value::Null,
            errors: errors.into(),
        }
    }

    /// Returns true if no error (warnings aside) was collected.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        !self.errors.has_errors()
    }

    /// Returns the response as an ordered value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("data".to_string(), self.data.clone());
        if !self.errors.is_empty() {
            map.insert(
                "errors".to_string(),
                Value::List(self.errors.iter().map(Error::to_value).collect()),
            );
        }
        Value::Object(map)
    }

    /// Writes the response as JSON text.
    #[must_use]
    pub fn write_json(&self, options: &WriteOptions) -> String {
        graft_core::value::write_json(self, options)
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = if self.errors.is_empty() { 1 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("data", &self.data)?;
        if !self.errors.is_empty() {
            map.serialize_entry("errors", self.errors.as_slice())?;
        }
        map.end()
    }
}

/// A subscriber returned by a top-level subscription field.
struct Captured {
    field: Field,
    ty: TypeRef,
    subscriber: Arc<dyn Subscriber>,
}

/// Executes one request against a [`Root`].
pub(crate) struct Executor<'a> {
    root: &'a Root,
    registry: &'a Registry,
    doc: &'a Executable,
    vars: Map,
    options: CoerceOptions,
    subscribing: bool,
    captured: Vec<Captured>,
    /// Fragments being expanded, outermost first.
    entered: Vec<FragmentId>,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(root: &'a Root, doc: &'a Executable) -> Self {
        Self {
            root,
            registry: root.registry(),
            doc,
            vars: Map::new(),
            options: CoerceOptions {
                relaxed: root.config().relaxed,
            },
            subscribing: false,
            captured: Vec::new(),
            entered: Vec::new(),
        }
    }

    /// Binds variables that were already coerced.
    pub(crate) fn with_vars(mut self, vars: Map) -> Self {
        self.vars = vars;
        self
    }

    /// Executes an operation. Subscribers found by a subscription operation
    /// are returned for registration.
    pub(crate) fn execute(
        mut self,
        op_name: Option<&str>,
        vars: &Map,
    ) -> (Response, Vec<Subscription>) {
        let doc = self.doc;
        let registry = self.registry;
        let op = match doc.op(op_name) {
            Ok(op) => op,
            Err(e) => return (Response::failed(e), Vec::new()),
        };
        tracing::debug!(kind = %op.kind, name = %op.name, "executing operation");

        if let Err(errors) = self.coerce_vars(op, vars) {
            return (Response::failed(errors), Vec::new());
        }
        let Some(root_ty) = registry.root_type(op.kind) else {
            let err = Error::validation(format!("schema has no {} root type", op.kind));
            return (Response::failed(err), Vec::new());
        };

        self.subscribing = op.kind == OpKind::Subscription;
        let data = self.root.op_root(op.kind);
        let mut out = Map::new();
        let mut errors = Errors::new();
        let depth = self.root.config().max_depth;
        self.complete_selections(root_ty, &op.selections, &data, depth, &mut out, &mut errors);

        let mut subscriptions = Vec::new();
        if self.subscribing {
            if self.captured.is_empty() {
                errors.push(Error::resolve("subscription registered no subscribers"));
            } else {
                let shared = Arc::new(doc.clone());
                subscriptions = self
                    .captured
                    .drain(..)
                    .map(|c| {
                        Subscription::new(
                            c.subscriber,
                            Arc::clone(&shared),
                            c.field,
                            c.ty,
                            self.vars.clone(),
                        )
                    })
                    .collect();
            }
        }
        (
            Response {
                data: Value::Object(out),
                errors,
            },
            subscriptions,
        )
    }

    /// Resolves an event payload against a captured subscription field.
    pub(crate) fn deliver(mut self, field: &'a Field, ty: &TypeRef, payload: Data) -> Response {
        let mut local = Errors::new();
        let depth = self.root.config().max_depth;
        let value = self.complete(ty, field, payload, depth, &mut local);
        let key = field.key();
        let mut data = Map::new();
        data.insert(key.to_string(), value);
        Response {
            data: Value::Object(data),
            errors: local.into_iter().map(|e| e.prefixed(key)).collect::<Vec<_>>().into(),
        }
    }

    fn coercion(&self) -> Coercion<'_> {
        Coercion::new(self.registry, self.options).with_vars(&self.vars)
    }

    fn coerce_vars(&mut self, op: &Op, supplied: &Map) -> std::result::Result<(), Errors> {
        let coercion = Coercion::new(self.registry, self.options).from_json();
        let mut errors = Errors::new();
        let mut vars = Map::new();
        for def in op.vars.values() {
            let name = def.name.clone();
            match supplied.get(&def.name) {
                Some(Value::Null) if def.ty.is_non_null() => errors.push(
                    Error::coerce(format!("variable ${name} is null but {} is required", def.ty))
                        .at(def.pos),
                ),
                Some(Value::Null) => {
                    vars.insert(name, Value::Null);
                }
                Some(value) => match coercion.coerce_in(&def.ty, value) {
                    Ok(coerced) => {
                        vars.insert(name, coerced);
                    }
                    Err(e) => errors.push(
                        Error::coerce(format!("variable ${name}: {}", e.message)).at(def.pos),
                    ),
                },
                None => {
                    if let Some(default) = &def.default {
                        vars.insert(name, default.clone());
                    } else if def.ty.is_non_null() {
                        errors.push(
                            Error::coerce(format!(
                                "variable ${name} of required type {} was not provided",
                                def.ty
                            ))
                            .at(def.pos),
                        );
                    }
                }
            }
        }
        self.vars = vars;
        errors.into_result(())
    }

    /// Evaluates `@skip` and `@include`. A condition that is not a boolean
    /// skips the selection and adds a warning.
    fn skipped(&self, directives: &[DirectiveUse], errors: &mut Errors) -> bool {
        for dir in directives {
            let skip_when = match dir.name.as_str() {
                "skip" => true,
                "include" => false,
                _ => continue,
            };
            let condition = match dir.arg("if") {
                Some(Value::Bool(b)) => Some(*b),
                Some(Value::Var(name)) => self.vars.get(name).and_then(Value::as_bool),
                _ => None,
            };
            match condition {
                Some(c) if c == skip_when => return true,
                Some(_) => {}
                None => {
                    errors.push(
                        Error::coerce(format!("@{}(if:) is not a boolean", dir.name))
                            .at(dir.pos)
                            .warning(),
                    );
                    return true;
                }
            }
        }
        false
    }

    fn applies(&self, condition: &str, ty: &Type) -> bool {
        condition == ty.name || self.registry.is_possible_type(condition, &ty.name)
    }

    fn complete_selections(
        &mut self,
        ty: &'a Type,
        selections: &'a [Selection],
        data: &Data,
        depth: usize,
        out: &mut Map,
        errors: &mut Errors,
    ) {
        let doc = self.doc;
        for selection in selections {
            if self.skipped(selection.directives(), errors) {
                continue;
            }
            match selection {
                Selection::Field(field) => {
                    let mut local = Errors::new();
                    let value = self.resolve_field(ty, field, data, depth, &mut local);
                    let key = field.key();
                    errors.extend(local.into_iter().map(|e| e.prefixed(key)));
                    if let Some(value) = value {
                        merge(out, key, value);
                    }
                }
                Selection::Inline(inline) => {
                    let applies = match &inline.condition {
                        Some(condition) => self.applies(condition, ty),
                        None => true,
                    };
                    if applies {
                        self.complete_selections(ty, &inline.selections, data, depth, out, errors);
                    }
                }
                Selection::FragRef(spread) => {
                    if self.entered.contains(&spread.fragment) {
                        errors.push(Error::resolve(format!(
                            "fragment cycle through {}",
                            spread.name
                        )));
                        continue;
                    }
                    let fragment = doc.fragment(spread.fragment);
                    if !self.applies(&fragment.condition, ty) {
                        continue;
                    }
                    let mut local = Errors::new();
                    self.entered.push(spread.fragment);
                    self.complete_selections(
                        ty,
                        &fragment.selections,
                        data,
                        depth,
                        out,
                        &mut local,
                    );
                    self.entered.pop();
                    let label = format!("fragment at {}", spread.pos);
                    errors.extend(local.into_iter().map(|e| e.prefixed(label.as_str())));
                }
            }
        }
    }

    /// Resolves one field. `None` means the key is left out of the result.
    fn resolve_field(
        &mut self,
        parent: &'a Type,
        field: &'a Field,
        data: &Data,
        depth: usize,
        errors: &mut Errors,
    ) -> Option<Value> {
        match field.name.as_str() {
            "__typename" => return Some(Value::String(parent.name.clone())),
            "__schema" | "__type" if self.is_query_root(parent) => {
                return Some(self.introspect(field, depth, errors));
            }
            _ => {}
        }

        let Some(def) = parent.field(&field.name) else {
            errors.push(Error::resolve(format!(
                "{} is not a field in {}",
                field.name, parent.name
            )));
            return None;
        };
        let Some(args) = self.field_args(parent, def, field, errors) else {
            return Some(Value::Null);
        };
        let resolved = match self.dispatch(data, field, &args) {
            Ok(resolved) => resolved,
            Err(e) => {
                errors.push(e);
                return Some(Value::Null);
            }
        };

        if let Data::Subscriber(subscriber) = &resolved {
            if self.subscribing && depth == self.root.config().max_depth {
                tracing::debug!(field = %field.name, "subscriber captured");
                self.captured.push(Captured {
                    field: field.clone(),
                    ty: def.ty.clone(),
                    subscriber: Arc::clone(subscriber),
                });
                return Some(Value::Null);
            }
        }
        Some(self.complete(&def.ty, field, resolved, depth, errors))
    }

    fn is_query_root(&self, ty: &Type) -> bool {
        self.registry
            .root_type(OpKind::Query)
            .is_some_and(|query| query.name == ty.name)
    }

    fn introspect(&mut self, field: &'a Field, depth: usize, errors: &mut Errors) -> Value {
        let shared = Arc::clone(self.root.shared_registry());
        let (data, ty) = if field.name == "__schema" {
            (
                Data::object(SchemaIntro::new(shared)),
                TypeRef::named("__Schema").non_null(),
            )
        } else {
            let name = field
                .args
                .get("name")
                .map(|v| self.coercion().coerce_in(&TypeRef::named("String").non_null(), v));
            match name {
                Some(Ok(Value::String(name))) => {
                    let data = if self.registry.get_type(&name).is_some() {
                        Data::object(TypeIntro::named(shared, &name))
                    } else {
                        Data::Null
                    };
                    (data, TypeRef::named("__Type"))
                }
                Some(Err(e)) => {
                    errors.push(Error::resolve(e.message));
                    return Value::Null;
                }
                _ => {
                    errors.push(Error::resolve("missing required argument name"));
                    return Value::Null;
                }
            }
        };
        self.complete(&ty, field, data, depth, errors)
    }

    /// Coerces the request arguments of `field` in definition order. The
    /// plan matching supplied names to the definition is built once per
    /// field and parent type, and unknown names are reported only then.
    fn field_args(
        &self,
        parent: &Type,
        def: &FieldDef,
        field: &'a Field,
        errors: &mut Errors,
    ) -> Option<Args> {
        let (plan, fresh) = field
            .plans
            .get_or_build(&parent.name, || plan_args(def, field));
        if fresh {
            for name in &plan.unknown {
                errors.push(Error::resolve(format!(
                    "{}.{} has no argument {name}",
                    parent.name, def.name
                )));
            }
        }

        let coercion = self.coercion();
        let mut args = Args::new();
        for (name, literal) in &plan.order {
            let Some(arg) = def.args.get(name) else {
                continue;
            };
            let literal = literal.as_ref().filter(|v| match v {
                Value::Var(var) => self.vars.contains_key(var),
                _ => true,
            });
            match literal {
                Some(literal) => match coercion.coerce_in(&arg.ty, literal) {
                    Ok(value) => args.set(name.clone(), value),
                    Err(e) => {
                        errors.push(Error::resolve(e.message));
                        return None;
                    }
                },
                None => {
                    if let Some(default) = &arg.default {
                        args.set(name.clone(), default.clone());
                    } else if arg.ty.is_non_null() {
                        errors.push(Error::resolve(format!("missing required argument {name}")));
                        return None;
                    }
                }
            }
        }
        Some(args)
    }

    fn dispatch(&self, data: &Data, field: &Field, args: &Args) -> Result<Data> {
        match data {
            Data::Object(obj) => {
                let obj: &dyn Object = obj.as_ref();
                if let Some(resolver) = obj.as_resolver() {
                    tracing::trace!(field = %field.name, ty = obj.type_name(), "resolver");
                    resolver.resolve(field, args)
                } else {
                    tracing::trace!(field = %field.name, ty = obj.type_name(), "binding");
                    self.root.binder().resolve(obj, field, args)
                }
            }
            Data::Value(value) => {
                tracing::trace!(field = %field.name, kind = value.kind_name(), "any resolver");
                self.root.any_resolver().resolve(value, field, args)
            }
            Data::Null => Ok(Data::Null),
            other => Err(Error::resolve(format!(
                "can not resolve {} on a {}",
                field.name,
                other.kind_name()
            ))),
        }
    }

    /// Shapes resolved data by its declared type. At depth zero the data is
    /// returned raw.
    fn complete(
        &mut self,
        ty: &TypeRef,
        field: &'a Field,
        data: Data,
        depth: usize,
        errors: &mut Errors,
    ) -> Value {
        if depth == 0 {
            return data.into_raw();
        }
        match ty {
            TypeRef::NonNull(inner) => {
                let before = errors.len();
                let value = self.complete(inner, field, data, depth, errors);
                if value.is_null() && errors.len() == before {
                    errors.push(Error::resolve(format!("null returned for non-null {ty}")));
                }
                value
            }
            TypeRef::List(inner) => self.complete_list(ty, inner, field, data, depth, errors),
            TypeRef::Named(_) | TypeRef::Ref { .. } => {
                if data.is_null() {
                    return Value::Null;
                }
                let registry = self.registry;
                let Some(named) = registry.named(ty) else {
                    errors.push(Error::not_found(format!("type {ty} is not defined")));
                    return Value::Null;
                };
                match &named.def {
                    TypeDef::Object(_) => {
                        self.complete_object(named, &field.selections, &data, depth, errors)
                    }
                    TypeDef::Interface(_) | TypeDef::Union(_) => {
                        match self.concrete_type(named, &data) {
                            Ok(concrete) => self.complete_object(
                                concrete,
                                &field.selections,
                                &data,
                                depth,
                                errors,
                            ),
                            Err(e) => {
                                errors.push(e);
                                Value::Null
                            }
                        }
                    }
                    TypeDef::Scalar(_) | TypeDef::Enum(_) => self.complete_leaf(ty, data, errors),
                    TypeDef::Input(_) | TypeDef::Schema(_) => {
                        errors.push(Error::resolve(format!("{ty} is not an output type")));
                        Value::Null
                    }
                }
            }
        }
    }

    fn complete_object(
        &mut self,
        ty: &'a Type,
        selections: &'a [Selection],
        data: &Data,
        depth: usize,
        errors: &mut Errors,
    ) -> Value {
        let mut out = Map::new();
        self.complete_selections(ty, selections, data, depth - 1, &mut out, errors);
        Value::Object(out)
    }

    fn complete_leaf(&self, ty: &TypeRef, data: Data, errors: &mut Errors) -> Value {
        let value = match data {
            Data::Value(value) => value,
            list @ Data::List(_) => list.into_raw(),
            other => {
                errors.push(Error::resolve(format!(
                    "can not use {} as {ty}",
                    other.kind_name()
                )));
                return Value::Null;
            }
        };
        match self.coercion().coerce_out(ty, &value) {
            Ok(value) => value,
            Err(e) => {
                errors.push(e);
                Value::Null
            }
        }
    }

    fn complete_list(
        &mut self,
        list_ty: &TypeRef,
        inner: &TypeRef,
        field: &'a Field,
        data: Data,
        depth: usize,
        errors: &mut Errors,
    ) -> Value {
        let root = self.root;
        let mut out = Vec::new();
        match data {
            Data::Null | Data::Value(Value::Null) => return Value::Null,
            Data::List(items) => {
                for (i, item) in items.into_iter().enumerate() {
                    out.push(self.complete_item(inner, field, i, Ok(item), depth, errors));
                }
            }
            Data::Value(Value::List(items)) => {
                for (i, item) in items.into_iter().enumerate() {
                    let item = Ok(Data::Value(item));
                    out.push(self.complete_item(inner, field, i, item, depth, errors));
                }
            }
            Data::Value(value) => {
                let any = root.any_resolver();
                let Some(len) = any.len(&value) else {
                    errors.push(Error::resolve(format!(
                        "can not use {} as {list_ty}",
                        value.kind_name()
                    )));
                    return Value::Null;
                };
                for i in 0..len {
                    let item = any.nth(&value, i);
                    out.push(self.complete_item(inner, field, i, item, depth, errors));
                }
            }
            Data::Object(obj) => {
                let Some(list) = obj.as_list() else {
                    errors.push(Error::resolve(format!(
                        "can not use {} as {list_ty}",
                        obj.type_name()
                    )));
                    return Value::Null;
                };
                for i in 0..list.len() {
                    let item = list.nth(i);
                    out.push(self.complete_item(inner, field, i, item, depth, errors));
                }
            }
            Data::Subscriber(_) => {
                errors.push(Error::resolve(format!("can not use a subscriber as {list_ty}")));
                return Value::Null;
            }
        }
        Value::List(out)
    }

    fn complete_item(
        &mut self,
        inner: &TypeRef,
        field: &'a Field,
        index: usize,
        item: Result<Data>,
        depth: usize,
        errors: &mut Errors,
    ) -> Value {
        let mut local = Errors::new();
        let value = match item {
            Ok(data) => self.complete(inner, field, data, depth, &mut local),
            Err(e) => {
                local.push(e);
                Value::Null
            }
        };
        errors.extend(local.into_iter().map(|e| e.prefixed(index)));
        value
    }

    /// Picks the object type behind an interface or union value: an
    /// explicitly registered runtime type, an `@impl` match, the runtime
    /// type's own name, or a `__typename` key on untyped data.
    fn concrete_type(&self, abstract_ty: &Type, data: &Data) -> Result<&'a Type> {
        let registry = self.registry;
        let candidate = match data {
            Data::Object(obj) => {
                let obj: &dyn Object = obj.as_ref();
                self.root
                    .impl_name(runtime_type_id(obj))
                    .or_else(|| {
                        registry
                            .possible_types(&abstract_ty.name)
                            .into_iter()
                            .find(|t| {
                                find_directive(&t.directives, IMPL_DIRECTIVE)
                                    .and_then(|d| d.arg("type"))
                                    .and_then(Value::as_str)
                                    == Some(obj.type_name())
                            })
                            .map(|t| t.name.clone())
                    })
                    .or_else(|| Some(obj.type_name().to_string()))
            }
            Data::Value(Value::Object(map)) => map
                .get("__typename")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        };
        candidate
            .as_deref()
            .and_then(|name| registry.get_type(name))
            .filter(|t| {
                matches!(t.def, TypeDef::Object(_))
                    && registry.is_possible_type(&abstract_ty.name, &t.name)
            })
            .ok_or_else(|| {
                Error::resolve(format!(
                    "can not determine the {} member type for {}",
                    abstract_ty.name,
                    data.kind_name()
                ))
            })
    }
}

fn plan_args(def: &FieldDef, field: &Field) -> ArgPlan {
    ArgPlan {
        order: def
            .args
            .keys()
            .map(|name| (name.clone(), field.args.get(name).cloned()))
            .collect(),
        unknown: field
            .args
            .keys()
            .filter(|name| !def.args.contains_key(*name))
            .cloned()
            .collect(),
    }
}

/// Inserts a field result, merging objects selected under the same key.
fn merge(out: &mut Map, key: &str, value: Value) {
    if let Value::Object(incoming) = value {
        if let Some(Value::Object(existing)) = out.get_mut(key) {
            for (k, v) in incoming {
                merge(existing, &k, v);
            }
            return;
        }
        out.insert(key.to_string(), Value::Object(incoming));
    } else {
        out.insert(key.to_string(), value);
    }
}
