//! Introspection objects backing `__schema` and `__type`.
//!
//! Each object holds a shared handle on the registry it describes and
//! resolves the fields of the matching `__` type.

use crate::data::{Data, Object};
use crate::resolver::{Args, Resolver};
use graft_core::{Error, Result, Value};
use graft_schema::{
    find_directive, Directive, DirectiveUse, EnumValue, Field, FieldDef, InputValue, OpKind,
    Registry, TypeDef, TypeRef,
};
use std::sync::Arc;

fn unknown(owner: &str, field: &Field) -> Error {
    Error::resolve(format!("{} is not a field in {owner}", field.name))
}

fn deprecation(directives: &[DirectiveUse]) -> Option<&Value> {
    find_directive(directives, "deprecated").map(|d| d.arg("reason").unwrap_or(&Value::Null))
}

fn include_deprecated(args: &Args) -> bool {
    args.get_as::<bool>("includeDeprecated").unwrap_or(false)
}

fn description(text: Option<&String>) -> Data {
    text.map_or(Data::Null, Data::from)
}

fn objects<T: Object + 'static>(items: impl IntoIterator<Item = T>) -> Data {
    Data::List(items.into_iter().map(Data::object).collect())
}

/// `__Schema`
#[derive(Debug, Clone)]
pub struct SchemaIntro {
    registry: Arc<Registry>,
}

impl SchemaIntro {
    /// Describes `registry`.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    fn root(&self, kind: OpKind) -> Data {
        self.registry.root_type(kind).map_or(Data::Null, |ty| {
            Data::object(TypeIntro::named(Arc::clone(&self.registry), &ty.name))
        })
    }
}

impl Resolver for SchemaIntro {
    fn resolve(&self, field: &Field, _args: &Args) -> Result<Data> {
        Ok(match field.name.as_str() {
            "description" => description(self.registry.schema().and_then(|s| s.description.as_ref())),
            "types" => objects(
                self.registry
                    .types()
                    .map(|ty| TypeIntro::named(Arc::clone(&self.registry), &ty.name)),
            ),
            "queryType" => self.root(OpKind::Query),
            "mutationType" => self.root(OpKind::Mutation),
            "subscriptionType" => self.root(OpKind::Subscription),
            "directives" => objects(self.registry.directives().map(|d| DirectiveIntro {
                registry: Arc::clone(&self.registry),
                directive: d.clone(),
            })),
            _ => return Err(unknown("__Schema", field)),
        })
    }
}

impl Object for SchemaIntro {
    fn type_name(&self) -> &str {
        "__Schema"
    }

    fn as_resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

/// `__Type`, for a named type or a list/non-null wrapper.
#[derive(Debug, Clone)]
pub struct TypeIntro {
    registry: Arc<Registry>,
    ty: TypeRef,
}

impl TypeIntro {
    /// Describes the type reference `ty`.
    #[must_use]
    pub fn new(registry: Arc<Registry>, ty: TypeRef) -> Self {
        Self { registry, ty }
    }

    /// Describes a named type.
    #[must_use]
    pub fn named(registry: Arc<Registry>, name: &str) -> Self {
        Self::new(registry, TypeRef::named(name))
    }

    fn wrap(&self, ty: &TypeRef) -> Data {
        Data::object(Self::new(Arc::clone(&self.registry), ty.clone()))
    }

    fn named_list<'a>(&self, refs: impl IntoIterator<Item = &'a TypeRef>) -> Data {
        Data::List(refs.into_iter().map(|r| self.wrap(r)).collect())
    }
}

impl Resolver for TypeIntro {
    fn resolve(&self, field: &Field, args: &Args) -> Result<Data> {
        let named = match &self.ty {
            TypeRef::List(inner) | TypeRef::NonNull(inner) => {
                return Ok(match field.name.as_str() {
                    "kind" => Data::Value(Value::Enum(
                        if self.ty.is_non_null() { "NON_NULL" } else { "LIST" }.to_string(),
                    )),
                    "ofType" => self.wrap(inner),
                    "name" | "description" | "specifiedByURL" | "fields" | "interfaces"
                    | "possibleTypes" | "enumValues" | "inputFields" => Data::Null,
                    _ => return Err(unknown("__Type", field)),
                });
            }
            other => self
                .registry
                .named(other)
                .ok_or_else(|| Error::not_found(format!("type {other} is not defined")))?,
        };

        let include = include_deprecated(args);
        Ok(match field.name.as_str() {
            "kind" => Data::Value(Value::Enum(named.kind_name().to_string())),
            "name" => Data::from(&named.name),
            "description" => description(named.description.as_ref()),
            "specifiedByURL" => find_directive(&named.directives, "specifiedBy")
                .and_then(|d| d.arg("url"))
                .cloned()
                .map_or(Data::Null, Data::Value),
            "fields" => named.fields().map_or(Data::Null, |fields| {
                objects(
                    fields
                        .values()
                        .filter(|f| include || deprecation(&f.directives).is_none())
                        .map(|f| FieldIntro {
                            registry: Arc::clone(&self.registry),
                            def: f.clone(),
                        }),
                )
            }),
            "interfaces" => match &named.def {
                TypeDef::Object(o) | TypeDef::Interface(o) => self.named_list(&o.interfaces),
                _ => Data::Null,
            },
            "possibleTypes" => {
                if named.is_abstract() {
                    objects(
                        self.registry
                            .possible_types(&named.name)
                            .into_iter()
                            .map(|t| Self::named(Arc::clone(&self.registry), &t.name)),
                    )
                } else {
                    Data::Null
                }
            }
            "enumValues" => match &named.def {
                TypeDef::Enum(e) => objects(
                    e.values
                        .values()
                        .filter(|v| include || deprecation(&v.directives).is_none())
                        .map(|v| EnumValueIntro { value: v.clone() }),
                ),
                _ => Data::Null,
            },
            "inputFields" => match &named.def {
                TypeDef::Input(i) => input_values(&self.registry, i.fields.values(), include),
                _ => Data::Null,
            },
            "ofType" => Data::Null,
            _ => return Err(unknown("__Type", field)),
        })
    }
}

impl Object for TypeIntro {
    fn type_name(&self) -> &str {
        "__Type"
    }

    fn as_resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

fn input_values<'a>(
    registry: &Arc<Registry>,
    values: impl IntoIterator<Item = &'a InputValue>,
    include: bool,
) -> Data {
    objects(
        values
            .into_iter()
            .filter(|v| include || deprecation(&v.directives).is_none())
            .map(|v| InputValueIntro {
                registry: Arc::clone(registry),
                value: v.clone(),
            }),
    )
}

/// `__Field`
#[derive(Debug, Clone)]
pub struct FieldIntro {
    registry: Arc<Registry>,
    def: FieldDef,
}

impl Resolver for FieldIntro {
    fn resolve(&self, field: &Field, args: &Args) -> Result<Data> {
        let reason = deprecation(&self.def.directives);
        Ok(match field.name.as_str() {
            "name" => Data::from(&self.def.name),
            "description" => description(self.def.description.as_ref()),
            "args" => input_values(&self.registry, self.def.args.values(), include_deprecated(args)),
            "type" => Data::object(TypeIntro::new(Arc::clone(&self.registry), self.def.ty.clone())),
            "isDeprecated" => Data::from(reason.is_some()),
            "deprecationReason" => reason.cloned().map_or(Data::Null, Data::Value),
            _ => return Err(unknown("__Field", field)),
        })
    }
}

impl Object for FieldIntro {
    fn type_name(&self) -> &str {
        "__Field"
    }

    fn as_resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

/// `__InputValue`
#[derive(Debug, Clone)]
pub struct InputValueIntro {
    registry: Arc<Registry>,
    value: InputValue,
}

impl Resolver for InputValueIntro {
    fn resolve(&self, field: &Field, _args: &Args) -> Result<Data> {
        let reason = deprecation(&self.value.directives);
        Ok(match field.name.as_str() {
            "name" => Data::from(&self.value.name),
            "description" => description(self.value.description.as_ref()),
            "type" => Data::object(TypeIntro::new(Arc::clone(&self.registry), self.value.ty.clone())),
            "defaultValue" => self
                .value
                .default
                .as_ref()
                .map_or(Data::Null, |v| Data::from(v.to_string())),
            "isDeprecated" => Data::from(reason.is_some()),
            "deprecationReason" => reason.cloned().map_or(Data::Null, Data::Value),
            _ => return Err(unknown("__InputValue", field)),
        })
    }
}

impl Object for InputValueIntro {
    fn type_name(&self) -> &str {
        "__InputValue"
    }

    fn as_resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

/// `__EnumValue`
#[derive(Debug, Clone)]
pub struct EnumValueIntro {
    value: EnumValue,
}

impl Resolver for EnumValueIntro {
    fn resolve(&self, field: &Field, _args: &Args) -> Result<Data> {
        let reason = deprecation(&self.value.directives);
        Ok(match field.name.as_str() {
            "name" => Data::from(&self.value.name),
            "description" => description(self.value.description.as_ref()),
            "isDeprecated" => Data::from(reason.is_some()),
            "deprecationReason" => reason.cloned().map_or(Data::Null, Data::Value),
            _ => return Err(unknown("__EnumValue", field)),
        })
    }
}

impl Object for EnumValueIntro {
    fn type_name(&self) -> &str {
        "__EnumValue"
    }

    fn as_resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

/// `__Directive`
#[derive(Debug, Clone)]
pub struct DirectiveIntro {
    registry: Arc<Registry>,
    directive: Directive,
}

impl Resolver for DirectiveIntro {
    fn resolve(&self, field: &Field, args: &Args) -> Result<Data> {
        let dir = &self.directive;
        Ok(match field.name.as_str() {
            "name" => Data::from(&dir.name),
            "description" => description(dir.description.as_ref()),
            "locations" => Data::List(
                dir.locations
                    .iter()
                    .map(|loc| Data::Value(Value::Enum(loc.as_str().to_string())))
                    .collect(),
            ),
            "args" => input_values(&self.registry, dir.args.values(), include_deprecated(args)),
            "isRepeatable" => Data::from(dir.repeatable),
            _ => return Err(unknown("__Directive", field)),
        })
    }
}

impl Object for DirectiveIntro {
    fn type_name(&self) -> &str {
        "__Directive"
    }

    fn as_resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_core::Pos;
    use graft_schema::parse_sdl;

    fn registry() -> Arc<Registry> {
        let mut registry = Registry::new();
        let decls = parse_sdl(
            r#"
            "Something to listen to."
            type Song {
              name: String!
              length: Int @deprecated(reason: "use duration")
              duration(unit: String = "s"): Int
            }
            enum Genre { ROCK POP @deprecated }
            scalar Url @specifiedBy(url: "https://tools.ietf.org/html/rfc3986")
            type Query { songs: [Song!]! }
            "#,
            &registry,
        )
        .unwrap();
        registry.add_types(decls).unwrap();
        Arc::new(registry)
    }

    fn get(obj: &dyn Resolver, name: &str) -> Data {
        obj.resolve(&Field::new(name, Pos::start()), &Args::new()).unwrap()
    }

    fn names(data: Data) -> Vec<String> {
        let Data::List(items) = data else {
            panic!("not a list");
        };
        items
            .into_iter()
            .map(|item| {
                let Data::Object(obj) = item else {
                    panic!("not an object");
                };
                let resolver = obj.as_resolver().unwrap();
                get(resolver, "name").into_raw().as_str().unwrap().to_string()
            })
            .collect()
    }

    #[test]
    fn test_type_fields_hide_deprecated() {
        let song = TypeIntro::named(registry(), "Song");
        assert_eq!(get(&song, "kind").into_raw(), Value::Enum("OBJECT".into()));
        assert_eq!(
            get(&song, "description").into_raw(),
            Value::from("Something to listen to.")
        );
        assert_eq!(names(get(&song, "fields")), vec!["name", "duration"]);

        let mut args = Args::new();
        args.set("includeDeprecated", true);
        let all = song
            .resolve(&Field::new("fields", Pos::start()), &args)
            .unwrap();
        assert_eq!(names(all), vec!["name", "length", "duration"]);
    }

    #[test]
    fn test_wrapped_types() {
        let registry = registry();
        let ty = TypeIntro::new(
            Arc::clone(&registry),
            TypeRef::named("Song").non_null().list().non_null(),
        );
        assert_eq!(get(&ty, "kind").into_raw(), Value::Enum("NON_NULL".into()));
        assert!(get(&ty, "name").is_null());
        let Data::Object(list) = get(&ty, "ofType") else {
            panic!("ofType is not an object");
        };
        let list = list.as_resolver().unwrap();
        assert_eq!(get(list, "kind").into_raw(), Value::Enum("LIST".into()));
    }

    #[test]
    fn test_enum_values_and_specified_by() {
        let registry = registry();
        let genre = TypeIntro::named(Arc::clone(&registry), "Genre");
        assert_eq!(names(get(&genre, "enumValues")), vec!["ROCK"]);
        let url = TypeIntro::named(registry, "Url");
        assert_eq!(
            get(&url, "specifiedByURL").into_raw(),
            Value::from("https://tools.ietf.org/html/rfc3986")
        );
    }

    #[test]
    fn test_field_deprecation_and_defaults() {
        let registry = registry();
        let song = registry.get_type("Song").unwrap();
        let length = FieldIntro {
            registry: Arc::clone(&registry),
            def: song.field("length").unwrap().clone(),
        };
        assert_eq!(get(&length, "isDeprecated").into_raw(), Value::Bool(true));
        assert_eq!(
            get(&length, "deprecationReason").into_raw(),
            Value::from("use duration")
        );

        let duration = FieldIntro {
            registry: Arc::clone(&registry),
            def: song.field("duration").unwrap().clone(),
        };
        let Data::List(args) = get(&duration, "args") else {
            panic!("args is not a list");
        };
        let Data::Object(unit) = &args[0] else {
            panic!("arg is not an object");
        };
        let unit = unit.as_resolver().unwrap();
        assert_eq!(get(unit, "defaultValue").into_raw(), Value::from("\"s\""));
    }

    #[test]
    fn test_schema_roots() {
        let schema = SchemaIntro::new(registry());
        let Data::Object(query) = get(&schema, "queryType") else {
            panic!("queryType is not an object");
        };
        let query = query.as_resolver().unwrap();
        assert_eq!(get(query, "name").into_raw(), Value::from("Query"));
        assert!(get(&schema, "mutationType").is_null());
        assert!(names(get(&schema, "directives")).contains(&"skip".to_string()));
    }
}
