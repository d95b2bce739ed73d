//! Built-in scalars, directives and introspection types.

use crate::registry::Registry;
use crate::scalars::{
    BooleanCoercer, FloatCoercer, IdCoercer, IntCoercer, ScalarCoercer, StringCoercer, TimeCoercer,
};
use crate::sdl::SdlParser;
use crate::types::{Decl, Type};
use crate::validate;
use graft_core::Errors;
use std::sync::Arc;

/// Name of the directive that binds an object type to a runtime type.
pub const IMPL_DIRECTIVE: &str = "impl";

const BUILTIN_SDL: &str = r#"
"Directs the executor to skip this field or fragment when the `if` argument is true."
directive @skip(if: Boolean!) on FIELD | FRAGMENT_SPREAD | INLINE_FRAGMENT

"Directs the executor to include this field or fragment only when the `if` argument is true."
directive @include(if: Boolean!) on FIELD | FRAGMENT_SPREAD | INLINE_FRAGMENT

"Marks an element of a GraphQL schema as no longer supported."
directive @deprecated(
  reason: String = "No longer supported"
) on FIELD_DEFINITION | ARGUMENT_DEFINITION | INPUT_FIELD_DEFINITION | ENUM_VALUE

"Exposes a URL that specifies the behavior of this scalar."
directive @specifiedBy(url: String!) on SCALAR

"Names the runtime type that implements an object type."
directive @impl(type: String!) on OBJECT

type __Schema {
  description: String
  types: [__Type!]!
  queryType: __Type!
  mutationType: __Type
  subscriptionType: __Type
  directives: [__Directive!]!
}

type __Type {
  kind: __TypeKind!
  name: String
  description: String
  specifiedByURL: String
  fields(includeDeprecated: Boolean = false): [__Field!]
  interfaces: [__Type!]
  possibleTypes: [__Type!]
  enumValues(includeDeprecated: Boolean = false): [__EnumValue!]
  inputFields(includeDeprecated: Boolean = false): [__InputValue!]
  ofType: __Type
}

enum __TypeKind {
  SCALAR
  OBJECT
  INTERFACE
  UNION
  ENUM
  INPUT_OBJECT
  LIST
  NON_NULL
}

type __Field {
  name: String!
  description: String
  args(includeDeprecated: Boolean = false): [__InputValue!]!
  type: __Type!
  isDeprecated: Boolean!
  deprecationReason: String
}

type __InputValue {
  name: String!
  description: String
  type: __Type!
  defaultValue: String
  isDeprecated: Boolean!
  deprecationReason: String
}

type __EnumValue {
  name: String!
  description: String
  isDeprecated: Boolean!
  deprecationReason: String
}

type __Directive {
  name: String!
  description: String
  locations: [__DirectiveLocation!]!
  args(includeDeprecated: Boolean = false): [__InputValue!]!
  isRepeatable: Boolean!
}

enum __DirectiveLocation {
  QUERY
  MUTATION
  SUBSCRIPTION
  FIELD
  FRAGMENT_DEFINITION
  FRAGMENT_SPREAD
  INLINE_FRAGMENT
  VARIABLE_DEFINITION
  SCHEMA
  SCALAR
  OBJECT
  FIELD_DEFINITION
  ARGUMENT_DEFINITION
  INTERFACE
  UNION
  ENUM
  ENUM_VALUE
  INPUT_OBJECT
  INPUT_FIELD_DEFINITION
}
"#;

fn scalar(name: &str, description: &str, coercer: Arc<dyn ScalarCoercer>) -> Decl {
    Decl::Type(
        Type::scalar(name, coercer)
            .with_description(description)
            .into_core(),
    )
}

fn scalars(registry: &Registry) -> Vec<Decl> {
    let options = registry.options();
    let mut decls = vec![
        scalar("String", "UTF-8 character sequence.", Arc::new(StringCoercer)),
        scalar("Int", "Signed 32-bit integer.", Arc::new(IntCoercer { wide: false })),
        scalar("Float", "Double-precision floating point value.", Arc::new(FloatCoercer)),
        scalar("Boolean", "true or false.", Arc::new(BooleanCoercer)),
        scalar("ID", "Unique identifier, serialized as a string.", Arc::new(IdCoercer)),
        scalar("Time", "RFC 3339 timestamp with nanosecond precision.", Arc::new(TimeCoercer)),
    ];
    if options.int64 {
        decls.push(scalar("Int64", "Signed 64-bit integer.", Arc::new(IntCoercer { wide: true })));
    }
    if options.float64 {
        decls.push(scalar("Float64", "Alias of Float.", Arc::new(FloatCoercer)));
    }
    decls
}

fn load(registry: &mut Registry) -> Result<(), Errors> {
    registry.apply(scalars(registry))?;
    let decls = SdlParser::new(BUILTIN_SDL, registry)
        .core(true)
        .parse()
        .map_err(Errors::from)?;
    registry.apply(decls)?;
    registry.replace_refs()?;
    validate::validate_schema(registry)
}

/// Installs every built-in declaration.
pub(crate) fn install(registry: &mut Registry) {
    if let Err(errors) = load(registry) {
        tracing::error!(%errors, "built-in declarations failed to load");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeDef;
    use graft_core::Value;

    #[test]
    fn test_builtins_are_core() {
        let registry = Registry::new();
        assert!(registry.types().all(|t| t.core));
        assert!(registry.directives().all(|d| d.core));
    }

    #[test]
    fn test_deprecated_default_coerced() {
        let registry = Registry::new();
        let dir = registry.get_directive("deprecated").unwrap();
        assert_eq!(
            dir.args["reason"].default,
            Some(Value::from("No longer supported"))
        );
        assert!(!dir.repeatable);
    }

    #[test]
    fn test_type_kind_values() {
        let registry = Registry::new();
        let TypeDef::Enum(kinds) = &registry.get_type("__TypeKind").unwrap().def else {
            panic!("__TypeKind is not an enum");
        };
        assert_eq!(kinds.values.len(), 8);
        assert!(kinds.values.contains_key("NON_NULL"));
    }
}
