//! Input and output coercion over type references.
//!
//! Scalars delegate to their [`ScalarCoercer`](crate::ScalarCoercer). Enums,
//! input objects, lists and non-null wrappers are handled here.

use crate::registry::Registry;
use crate::types::{EnumDef, InputDef, Type, TypeDef, TypeRef};
use graft_core::{Error, Map, Result, Value};

/// Coercion settings passed explicitly into every call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoerceOptions {
    /// Accept plain strings where an enum symbol is expected.
    pub relaxed: bool,
}

/// A coercion context bound to a registry and, optionally, variable values.
#[derive(Debug, Clone, Copy)]
pub struct Coercion<'a> {
    registry: &'a Registry,
    vars: Option<&'a Map>,
    options: CoerceOptions,
    json: bool,
}

impl<'a> Coercion<'a> {
    /// Creates a context with no variables bound. `$var` references are left
    /// in place.
    #[must_use]
    pub fn new(registry: &'a Registry, options: CoerceOptions) -> Self {
        Self {
            registry,
            vars: None,
            options,
            json: false,
        }
    }

    /// Binds already coerced variable values.
    #[must_use]
    pub fn with_vars(mut self, vars: &'a Map) -> Self {
        self.vars = Some(vars);
        self
    }

    /// Treats input as JSON, where enum values can only be spelled as strings.
    #[must_use]
    pub fn from_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Coerces an external value to `ty`.
    pub fn coerce_in(&self, ty: &TypeRef, value: &Value) -> Result<Value> {
        if let Value::Var(name) = value {
            let Some(vars) = self.vars else {
                return Ok(value.clone());
            };
            let bound = vars.get(name).cloned().unwrap_or(Value::Null);
            if bound.is_null() && ty.is_non_null() {
                return Err(Error::coerce(format!(
                    "variable ${name} is null but {ty} is required"
                )));
            }
            return Ok(bound);
        }

        match ty {
            TypeRef::NonNull(inner) => {
                if value.is_null() {
                    return Err(Error::coerce(format!("null is not a valid value for {ty}")));
                }
                self.coerce_in(inner, value)
            }
            TypeRef::List(inner) => match value {
                Value::Null => Ok(Value::Null),
                Value::List(items) => items
                    .iter()
                    .map(|item| self.coerce_in(inner, item))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List),
                single => Ok(Value::List(vec![self.coerce_in(inner, single)?])),
            },
            TypeRef::Ref { .. } | TypeRef::Named(_) => {
                if value.is_null() {
                    return Ok(Value::Null);
                }
                let named = self.lookup(ty)?;
                match &named.def {
                    TypeDef::Scalar(s) => s.coercer.coerce_in(value),
                    TypeDef::Enum(e) => self.enum_in(named, e, value),
                    TypeDef::Input(i) => self.input_in(named, i, value),
                    _ => Err(Error::coerce(format!("{} is not an input type", named.name))),
                }
            }
        }
    }

    /// Coerces a resolved leaf value (or list of leaves) for output.
    pub fn coerce_out(&self, ty: &TypeRef, value: &Value) -> Result<Value> {
        match ty {
            TypeRef::NonNull(inner) => {
                if value.is_null() {
                    return Err(Error::coerce(format!("null returned for non-null {ty}")));
                }
                self.coerce_out(inner, value)
            }
            TypeRef::List(inner) => match value {
                Value::Null => Ok(Value::Null),
                Value::List(items) => items
                    .iter()
                    .map(|item| self.coerce_out(inner, item))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List),
                other => Err(Error::coerce(format!(
                    "can not coerce {} {other} into {ty}",
                    other.kind_name()
                ))),
            },
            TypeRef::Ref { .. } | TypeRef::Named(_) => {
                if value.is_null() {
                    return Ok(Value::Null);
                }
                let named = self.lookup(ty)?;
                match &named.def {
                    TypeDef::Scalar(s) => s.coercer.coerce_out(value),
                    TypeDef::Enum(e) => match value.as_str() {
                        Some(sym) if e.values.contains_key(sym) => Ok(Value::Enum(sym.to_string())),
                        _ => Err(Error::coerce(format!(
                            "{value} is not a valid {} value",
                            named.name
                        ))),
                    },
                    _ => Ok(value.clone()),
                }
            }
        }
    }

    fn lookup(&self, ty: &TypeRef) -> Result<&'a Type> {
        self.registry
            .named(ty)
            .ok_or_else(|| Error::not_found(format!("type {} is not defined", ty.base_name())))
    }

    fn enum_in(&self, named: &Type, e: &EnumDef, value: &Value) -> Result<Value> {
        let sym = match value {
            Value::Enum(sym) => sym,
            Value::String(sym) if self.options.relaxed || self.json => sym,
            other => {
                return Err(Error::coerce(format!(
                    "can not coerce {} {other} into {}",
                    other.kind_name(),
                    named.name
                )))
            }
        };
        if e.values.contains_key(sym) {
            Ok(Value::Enum(sym.clone()))
        } else {
            Err(Error::coerce(format!("{sym} is not a valid {} value", named.name)))
        }
    }

    fn input_in(&self, named: &Type, input: &InputDef, value: &Value) -> Result<Value> {
        let Value::Object(map) = value else {
            return Err(Error::coerce(format!(
                "can not coerce {} {value} into {}",
                value.kind_name(),
                named.name
            )));
        };
        if let Some(key) = map.keys().find(|k| !input.fields.contains_key(*k)) {
            return Err(Error::coerce(format!("{key} is not a field in {}", named.name)));
        }

        let mut out = Map::with_capacity(input.fields.len());
        for (name, field) in &input.fields {
            match map.get(name) {
                Some(v) => {
                    let coerced = self.coerce_in(&field.ty, v).map_err(|mut e| {
                        e.message = format!("{}.{name}: {}", named.name, e.message);
                        e
                    })?;
                    out.insert(name.clone(), coerced);
                }
                None => {
                    if let Some(default) = &field.default {
                        out.insert(name.clone(), default.clone());
                    } else if field.ty.is_non_null() {
                        return Err(Error::coerce(format!(
                            "missing required field {name} in {}",
                            named.name
                        )));
                    }
                }
            }
        }
        Ok(Value::Object(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdl::parse_sdl;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        let decls = parse_sdl(
            r#"
            enum Color { RED GREEN }
            input Filter { color: Color = RED, limit: Int!, tags: [String] }
            type Query { a(f: Filter): Int }
            "#,
            &registry,
        )
        .unwrap();
        registry.add_types(decls).unwrap();
        registry
    }

    fn named(name: &str) -> TypeRef {
        TypeRef::named(name)
    }

    #[test]
    fn test_enum_in() {
        let registry = registry();
        let c = Coercion::new(&registry, CoerceOptions::default());
        assert_eq!(
            c.coerce_in(&named("Color"), &Value::Enum("RED".into())).unwrap(),
            Value::Enum("RED".into())
        );
        let err = c.coerce_in(&named("Color"), &Value::Enum("BLUE".into())).unwrap_err();
        assert_eq!(err.message, "BLUE is not a valid Color value");
        assert!(c.coerce_in(&named("Color"), &Value::from("RED")).is_err());

        let relaxed = Coercion::new(&registry, CoerceOptions { relaxed: true });
        assert!(relaxed.coerce_in(&named("Color"), &Value::from("RED")).is_ok());
        let json = Coercion::new(&registry, CoerceOptions::default()).from_json();
        assert!(json.coerce_in(&named("Color"), &Value::from("GREEN")).is_ok());
    }

    #[test]
    fn test_input_object_defaults_and_unknown_keys() {
        let registry = registry();
        let c = Coercion::new(&registry, CoerceOptions::default());
        let mut map = Map::new();
        map.insert("limit".into(), Value::Int(5));
        map.insert("tags".into(), Value::from("one"));
        let out = c.coerce_in(&named("Filter"), &Value::Object(map.clone())).unwrap();
        assert_eq!(out.get("color"), Some(&Value::Enum("RED".into())));
        assert_eq!(out.get("tags"), Some(&Value::List(vec![Value::from("one")])));

        map.insert("bogus".into(), Value::Int(1));
        let err = c.coerce_in(&named("Filter"), &Value::Object(map)).unwrap_err();
        assert_eq!(err.message, "bogus is not a field in Filter");

        let err = c
            .coerce_in(&named("Filter"), &Value::Object(Map::new()))
            .unwrap_err();
        assert_eq!(err.message, "missing required field limit in Filter");
    }

    #[test]
    fn test_list_is_atomic() {
        let registry = registry();
        let c = Coercion::new(&registry, CoerceOptions::default());
        let ty = named("Int").list();
        let ok = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(c.coerce_in(&ty, &ok).unwrap(), ok);
        let bad = Value::List(vec![Value::Int(1), Value::from("x")]);
        assert!(c.coerce_in(&ty, &bad).is_err());
    }

    #[test]
    fn test_non_null() {
        let registry = registry();
        let c = Coercion::new(&registry, CoerceOptions::default());
        let ty = named("Int").non_null();
        assert!(c.coerce_in(&ty, &Value::Null).is_err());
        assert!(c.coerce_out(&ty, &Value::Null).is_err());
        assert_eq!(c.coerce_in(&named("Int"), &Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_variables() {
        let registry = registry();
        let unbound = Coercion::new(&registry, CoerceOptions::default());
        let var = Value::Var("n".into());
        assert_eq!(unbound.coerce_in(&named("Int"), &var).unwrap(), var);

        let mut vars = Map::new();
        vars.insert("n".into(), Value::Int(9));
        let bound = unbound.with_vars(&vars);
        assert_eq!(bound.coerce_in(&named("Int"), &var).unwrap(), Value::Int(9));
        let missing = Value::Var("m".into());
        assert!(bound.coerce_in(&named("Int").non_null(), &missing).is_err());
    }

    #[test]
    fn test_enum_out() {
        let registry = registry();
        let c = Coercion::new(&registry, CoerceOptions::default());
        assert_eq!(
            c.coerce_out(&named("Color"), &Value::from("GREEN")).unwrap(),
            Value::Enum("GREEN".into())
        );
        assert!(c.coerce_out(&named("Color"), &Value::from("PINK")).is_err());
    }
}
