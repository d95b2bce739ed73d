//! Type system for graft.
//!
//! Named types live in a [`Registry`](crate::Registry) keyed by name. Every
//! reference from one type to another is a [`TypeRef`], which is either an
//! unresolved placeholder produced while parsing or a checked name.

use crate::scalars::ScalarCoercer;
use graft_core::{Map, Pos, Value};
use graft_syntax::DirectiveLocation;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// A reference to a type from a field, argument or member list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A name seen before its definition. Replaced by `Registry::replace_refs`.
    Ref { name: String, pos: Pos },
    /// A name known to be defined in the registry.
    Named(String),
    /// `[T]`
    List(Box<TypeRef>),
    /// `T!`
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    /// Creates a checked named reference.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Wraps in a list.
    #[must_use]
    pub fn list(self) -> Self {
        Self::List(Box::new(self))
    }

    /// Wraps in non-null. Already non-null references are returned as is.
    #[must_use]
    pub fn non_null(self) -> Self {
        match self {
            Self::NonNull(_) => self,
            other => Self::NonNull(Box::new(other)),
        }
    }

    /// Returns the innermost type name.
    #[must_use]
    pub fn base_name(&self) -> &str {
        match self {
            Self::Ref { name, .. } | Self::Named(name) => name,
            Self::List(inner) | Self::NonNull(inner) => inner.base_name(),
        }
    }

    /// Returns true for `T!`.
    #[must_use]
    pub const fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// Returns true if any wrapper is still an unresolved placeholder.
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        match self {
            Self::Ref { .. } => true,
            Self::Named(_) => false,
            Self::List(inner) | Self::NonNull(inner) => inner.is_unresolved(),
        }
    }

    /// Strips one non-null wrapper.
    #[must_use]
    pub fn nullable(&self) -> &TypeRef {
        match self {
            Self::NonNull(inner) => inner,
            other => other,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ref { name, .. } | Self::Named(name) => f.write_str(name),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

/// A use of a directive, `@name(arg: value)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveUse {
    pub name: String,
    pub args: Map,
    pub pos: Pos,
}

impl DirectiveUse {
    /// Creates a use without arguments.
    pub fn new(name: impl Into<String>, pos: Pos) -> Self {
        Self {
            name: name.into(),
            args: Map::new(),
            pos,
        }
    }

    /// Returns an argument value.
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }
}

/// Finds the first use of a directive by name.
#[must_use]
pub fn find_directive<'a>(uses: &'a [DirectiveUse], name: &str) -> Option<&'a DirectiveUse> {
    uses.iter().find(|u| u.name == name)
}

/// An argument or input object field.
#[derive(Debug, Clone, PartialEq)]
pub struct InputValue {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub default: Option<Value>,
    pub directives: Vec<DirectiveUse>,
    pub pos: Pos,
}

impl InputValue {
    /// Creates a new input value.
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            default: None,
            directives: Vec::new(),
            pos: Pos::start(),
        }
    }

    /// Sets the default.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Returns true if callers must supply a value.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.ty.is_non_null() && self.default.is_none()
    }
}

/// A field on an object or interface.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub args: IndexMap<String, InputValue>,
    pub directives: Vec<DirectiveUse>,
    pub pos: Pos,
}

impl FieldDef {
    /// Creates a new field.
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            args: IndexMap::new(),
            directives: Vec::new(),
            pos: Pos::start(),
        }
    }

    /// Adds an argument.
    #[must_use]
    pub fn with_arg(mut self, arg: InputValue) -> Self {
        self.args.insert(arg.name.clone(), arg);
        self
    }
}

/// A declared enum value.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub name: String,
    pub description: Option<String>,
    pub directives: Vec<DirectiveUse>,
    pub pos: Pos,
}

/// Scalar payload.
#[derive(Clone)]
pub struct ScalarDef {
    pub coercer: Arc<dyn ScalarCoercer>,
}

impl fmt::Debug for ScalarDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarDef").finish_non_exhaustive()
    }
}

impl PartialEq for ScalarDef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.coercer, &other.coercer)
    }
}

/// Object and interface payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectDef {
    pub interfaces: Vec<TypeRef>,
    pub fields: IndexMap<String, FieldDef>,
}

/// Union payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnionDef {
    pub members: Vec<TypeRef>,
}

/// Enum payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumDef {
    pub values: IndexMap<String, EnumValue>,
}

/// Input object payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputDef {
    pub fields: IndexMap<String, InputValue>,
}

/// Schema payload: the root operation types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDef {
    pub query: Option<TypeRef>,
    pub mutation: Option<TypeRef>,
    pub subscription: Option<TypeRef>,
}

/// The kind-specific part of a [`Type`].
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDef {
    Scalar(ScalarDef),
    Object(ObjectDef),
    Interface(ObjectDef),
    Union(UnionDef),
    Enum(EnumDef),
    Input(InputDef),
    Schema(SchemaDef),
}

impl TypeDef {
    /// Returns the kind keyword used in SDL and messages.
    #[must_use]
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Object(_) => "type",
            Self::Interface(_) => "interface",
            Self::Union(_) => "union",
            Self::Enum(_) => "enum",
            Self::Input(_) => "input",
            Self::Schema(_) => "schema",
        }
    }

    /// Canonical SDL ordering rank.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Schema(_) => 0,
            Self::Scalar(_) => 1,
            Self::Enum(_) => 2,
            Self::Interface(_) => 3,
            Self::Union(_) => 4,
            Self::Object(_) => 5,
            Self::Input(_) => 6,
        }
    }

    /// Returns the location directives on this declaration are checked against.
    #[must_use]
    pub const fn location(&self) -> DirectiveLocation {
        match self {
            Self::Scalar(_) => DirectiveLocation::Scalar,
            Self::Object(_) => DirectiveLocation::Object,
            Self::Interface(_) => DirectiveLocation::Interface,
            Self::Union(_) => DirectiveLocation::Union,
            Self::Enum(_) => DirectiveLocation::Enum,
            Self::Input(_) => DirectiveLocation::InputObject,
            Self::Schema(_) => DirectiveLocation::Schema,
        }
    }
}

/// A named type.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub name: String,
    pub description: Option<String>,
    pub directives: Vec<DirectiveUse>,
    pub pos: Pos,
    /// Built-in types are exempt from reserved-name rules.
    pub core: bool,
    pub def: TypeDef,
}

impl Type {
    /// Creates a new user type.
    pub fn new(name: impl Into<String>, def: TypeDef) -> Self {
        Self {
            name: name.into(),
            description: None,
            directives: Vec::new(),
            pos: Pos::start(),
            core: false,
            def,
        }
    }

    /// Creates a scalar backed by a coercer.
    pub fn scalar(name: impl Into<String>, coercer: Arc<dyn ScalarCoercer>) -> Self {
        Self::new(name, TypeDef::Scalar(ScalarDef { coercer }))
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the type as built in.
    #[must_use]
    pub fn into_core(mut self) -> Self {
        self.core = true;
        self
    }

    /// Returns the fields of an object or interface.
    #[must_use]
    pub fn fields(&self) -> Option<&IndexMap<String, FieldDef>> {
        match &self.def {
            TypeDef::Object(o) | TypeDef::Interface(o) => Some(&o.fields),
            _ => None,
        }
    }

    /// Looks up a field on an object or interface.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields().and_then(|f| f.get(name))
    }

    /// Returns the interfaces an object or interface declares.
    #[must_use]
    pub fn interfaces(&self) -> &[TypeRef] {
        match &self.def {
            TypeDef::Object(o) | TypeDef::Interface(o) => &o.interfaces,
            _ => &[],
        }
    }

    /// Returns true for scalars and enums.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(self.def, TypeDef::Scalar(_) | TypeDef::Enum(_))
    }

    /// Returns true for objects, interfaces and unions.
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(
            self.def,
            TypeDef::Object(_) | TypeDef::Interface(_) | TypeDef::Union(_)
        )
    }

    /// Returns true for abstract types.
    #[must_use]
    pub const fn is_abstract(&self) -> bool {
        matches!(self.def, TypeDef::Interface(_) | TypeDef::Union(_))
    }

    /// Returns true if the type can appear in input positions.
    #[must_use]
    pub const fn is_input(&self) -> bool {
        matches!(
            self.def,
            TypeDef::Scalar(_) | TypeDef::Enum(_) | TypeDef::Input(_)
        )
    }

    /// Returns true if the type can appear as a field result.
    #[must_use]
    pub const fn is_output(&self) -> bool {
        matches!(
            self.def,
            TypeDef::Scalar(_)
                | TypeDef::Enum(_)
                | TypeDef::Object(_)
                | TypeDef::Interface(_)
                | TypeDef::Union(_)
        )
    }

    /// Returns the introspection kind name.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self.def {
            TypeDef::Scalar(_) => "SCALAR",
            TypeDef::Object(_) | TypeDef::Schema(_) => "OBJECT",
            TypeDef::Interface(_) => "INTERFACE",
            TypeDef::Union(_) => "UNION",
            TypeDef::Enum(_) => "ENUM",
            TypeDef::Input(_) => "INPUT_OBJECT",
        }
    }
}

/// A directive definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub description: Option<String>,
    pub args: IndexMap<String, InputValue>,
    pub locations: Vec<DirectiveLocation>,
    pub repeatable: bool,
    pub pos: Pos,
    pub core: bool,
}

impl Directive {
    /// Returns true if the directive may be used at `loc`.
    #[must_use]
    pub fn allows(&self, loc: DirectiveLocation) -> bool {
        self.locations.contains(&loc)
    }
}

/// A top-level declaration produced by the SDL parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    /// A new named type, including `schema`.
    Type(Type),
    /// A new directive.
    Directive(Directive),
    /// An `extend` of an existing declaration of the same kind.
    Extend(Type),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ref_display() {
        let ty = TypeRef::named("Song").non_null().list().non_null();
        assert_eq!(ty.to_string(), "[Song!]!");
        assert_eq!(ty.base_name(), "Song");
    }

    #[test]
    fn test_non_null_is_idempotent() {
        let ty = TypeRef::named("Int").non_null().non_null();
        assert_eq!(ty, TypeRef::NonNull(Box::new(TypeRef::named("Int"))));
    }

    #[test]
    fn test_unresolved() {
        let ty = TypeRef::Ref {
            name: "Later".into(),
            pos: Pos::new(3, 9),
        }
        .list();
        assert!(ty.is_unresolved());
        assert!(!TypeRef::named("Int").list().is_unresolved());
    }

    #[test]
    fn test_required_input() {
        let arg = InputValue::new("id", TypeRef::named("ID").non_null());
        assert!(arg.is_required());
        let arg = arg.with_default(Value::from("x"));
        assert!(!arg.is_required());
    }
}
