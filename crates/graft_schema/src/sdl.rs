//! SDL parser.
//!
//! Single pass, recursive descent. Each top-level declaration is parsed on
//! its own; type names that are not yet in the registry become
//! [`TypeRef::Ref`] placeholders for `Registry::replace_refs` to resolve.

use crate::registry::Registry;
use crate::types::{
    Decl, Directive, DirectiveUse, EnumDef, EnumValue, FieldDef, InputDef, InputValue, ObjectDef,
    SchemaDef, Type, TypeDef, TypeRef, UnionDef,
};
use crate::scalars::PassThrough;
use graft_core::{Error, Map, Pos, Result};
use graft_syntax::{class, read_value, DirectiveLocation, Lexer};
use indexmap::IndexMap;
use std::sync::Arc;

/// Parses SDL text into declarations.
pub fn parse_sdl(source: &str, known: &Registry) -> Result<Vec<Decl>> {
    SdlParser::new(source, known).parse()
}

/// SDL parser state.
pub struct SdlParser<'a, 'r> {
    lx: Lexer<'a>,
    known: &'r Registry,
    core: bool,
}

impl<'a, 'r> SdlParser<'a, 'r> {
    /// Creates a parser over text.
    #[must_use]
    pub fn new(source: &'a str, known: &'r Registry) -> Self {
        Self::from_lexer(Lexer::new(source), known)
    }

    /// Creates a parser over an existing lexer.
    #[must_use]
    pub fn from_lexer(lx: Lexer<'a>, known: &'r Registry) -> Self {
        Self {
            lx,
            known,
            core: false,
        }
    }

    /// Marks every parsed declaration as built in.
    #[must_use]
    pub fn core(mut self, core: bool) -> Self {
        self.core = core;
        self
    }

    /// Parses the whole document.
    pub fn parse(mut self) -> Result<Vec<Decl>> {
        let mut decls = Vec::new();
        while self.lx.skip_space() != 0 {
            decls.push(self.parse_decl()?);
        }
        tracing::debug!(count = decls.len(), "parsed SDL declarations");
        Ok(decls)
    }

    fn parse_description(&mut self) -> Result<Option<String>> {
        if self.lx.skip_space() == b'"' {
            Ok(Some(self.lx.read_string()?))
        } else {
            Ok(None)
        }
    }

    fn parse_decl(&mut self) -> Result<Decl> {
        let description = self.parse_description()?;
        let b = self.lx.skip_space();
        let pos = self.lx.pos();
        let keyword = self.lx.read_token();
        if keyword.is_empty() {
            return Err(self.lx.unexpected(b, "declaration"));
        }
        if keyword == "extend" {
            let b = self.lx.skip_space();
            let kw_pos = self.lx.pos();
            let keyword = self.lx.read_token();
            return match self.parse_kind(&keyword, kw_pos, description)? {
                Some(Decl::Type(ty)) => Ok(Decl::Extend(ty)),
                Some(_) => Err(Error::parse(kw_pos, "directives can not be extended")),
                None => Err(self.unknown_keyword(&keyword, b, kw_pos)),
            };
        }
        match self.parse_kind(&keyword, pos, description)? {
            Some(decl) => Ok(decl),
            None => Err(self.unknown_keyword(&keyword, b, pos)),
        }
    }

    fn unknown_keyword(&self, keyword: &str, b: u8, pos: Pos) -> Error {
        if keyword.is_empty() {
            self.lx.unexpected(b, "declaration keyword")
        } else {
            Error::parse(pos, format!("unknown declaration keyword '{keyword}'"))
        }
    }

    fn parse_kind(
        &mut self,
        keyword: &str,
        pos: Pos,
        description: Option<String>,
    ) -> Result<Option<Decl>> {
        let decl = match keyword {
            "schema" => Decl::Type(self.parse_schema(pos)?),
            "type" => Decl::Type(self.parse_object(pos, false)?),
            "interface" => Decl::Type(self.parse_object(pos, true)?),
            "union" => Decl::Type(self.parse_union(pos)?),
            "enum" => Decl::Type(self.parse_enum(pos)?),
            "input" => Decl::Type(self.parse_input(pos)?),
            "scalar" => Decl::Type(self.parse_scalar(pos)?),
            "directive" => Decl::Directive(self.parse_directive_def(pos)?),
            _ => return Ok(None),
        };
        Ok(Some(match decl {
            Decl::Type(mut ty) => {
                ty.description = description;
                Decl::Type(ty)
            }
            Decl::Directive(mut dir) => {
                dir.description = description;
                Decl::Directive(dir)
            }
            other => other,
        }))
    }

    fn new_type(&self, name: String, pos: Pos, def: TypeDef) -> Type {
        Type {
            name,
            description: None,
            directives: Vec::new(),
            pos,
            core: self.core,
            def,
        }
    }

    fn parse_schema(&mut self, pos: Pos) -> Result<Type> {
        let directives = self.parse_directive_uses()?;
        let mut def = SchemaDef::default();
        if self.lx.consume(b'{') {
            loop {
                let b = self.lx.skip_space();
                if b == b'}' {
                    self.lx.read_byte();
                    break;
                }
                if b == 0 {
                    return Err(Error::parse(pos, "unterminated schema definition"));
                }
                let op_pos = self.lx.pos();
                let op = self.lx.read_name("operation type")?;
                self.lx.expect(b':')?;
                let root = self.parse_named_ref()?;
                let slot = match op.as_str() {
                    "query" => &mut def.query,
                    "mutation" => &mut def.mutation,
                    "subscription" => &mut def.subscription,
                    _ => {
                        return Err(Error::parse(
                            op_pos,
                            format!("{op} is not an operation type"),
                        ))
                    }
                };
                if slot.is_some() {
                    return Err(Error::parse(op_pos, format!("duplicate {op} root")));
                }
                *slot = Some(root);
            }
        }
        let mut ty = self.new_type("schema".to_string(), pos, TypeDef::Schema(def));
        ty.directives = directives;
        Ok(ty)
    }

    fn parse_object(&mut self, pos: Pos, interface: bool) -> Result<Type> {
        let name = self.lx.read_name("type name")?;
        let mut interfaces = Vec::new();
        if self.peek_keyword("implements") {
            self.lx.read_token();
            self.lx.consume(b'&');
            loop {
                interfaces.push(self.parse_named_ref()?);
                if !self.lx.consume(b'&') {
                    break;
                }
            }
        }
        let directives = self.parse_directive_uses()?;
        let mut fields = IndexMap::new();
        if self.lx.consume(b'{') {
            loop {
                if self.lx.consume(b'}') {
                    break;
                }
                if self.lx.skip_space() == 0 {
                    return Err(Error::parse(pos, format!("unterminated definition of {name}")));
                }
                let field = self.parse_field()?;
                if fields.contains_key(&field.name) {
                    return Err(Error::parse(
                        field.pos,
                        format!("duplicate field {name}.{}", field.name),
                    ));
                }
                fields.insert(field.name.clone(), field);
            }
        }
        let body = ObjectDef { interfaces, fields };
        let def = if interface {
            TypeDef::Interface(body)
        } else {
            TypeDef::Object(body)
        };
        let mut ty = self.new_type(name, pos, def);
        ty.directives = directives;
        Ok(ty)
    }

    fn parse_field(&mut self) -> Result<FieldDef> {
        let description = self.parse_description()?;
        self.lx.skip_space();
        let pos = self.lx.pos();
        let name = self.lx.read_name("field name")?;
        let args = if self.lx.skip_space() == b'(' {
            self.parse_arg_defs()?
        } else {
            IndexMap::new()
        };
        self.lx.expect(b':')?;
        let ty = self.parse_type_ref()?;
        let directives = self.parse_directive_uses()?;
        Ok(FieldDef {
            name,
            description,
            ty,
            args,
            directives,
            pos,
        })
    }

    fn parse_arg_defs(&mut self) -> Result<IndexMap<String, InputValue>> {
        let start = self.lx.pos();
        self.lx.expect(b'(')?;
        let mut args = IndexMap::new();
        loop {
            match self.lx.skip_space() {
                b')' => {
                    self.lx.read_byte();
                    return Ok(args);
                }
                0 => return Err(Error::parse(start, "unterminated argument list")),
                _ => {
                    let arg = self.parse_input_value()?;
                    if args.contains_key(&arg.name) {
                        return Err(Error::parse(arg.pos, format!("duplicate argument {}", arg.name)));
                    }
                    args.insert(arg.name.clone(), arg);
                }
            }
        }
    }

    fn parse_input_value(&mut self) -> Result<InputValue> {
        let description = self.parse_description()?;
        self.lx.skip_space();
        let pos = self.lx.pos();
        let name = self.lx.read_name("argument name")?;
        self.lx.expect(b':')?;
        let ty = self.parse_type_ref()?;
        let default = if self.lx.consume(b'=') {
            Some(read_value(&mut self.lx)?)
        } else {
            None
        };
        let directives = self.parse_directive_uses()?;
        Ok(InputValue {
            name,
            description,
            ty,
            default,
            directives,
            pos,
        })
    }

    fn parse_union(&mut self, pos: Pos) -> Result<Type> {
        let name = self.lx.read_name("union name")?;
        let directives = self.parse_directive_uses()?;
        let mut members = Vec::new();
        if self.lx.consume(b'=') {
            self.lx.consume(b'|');
            loop {
                members.push(self.parse_named_ref()?);
                if !self.lx.consume(b'|') {
                    break;
                }
            }
        }
        let mut ty = self.new_type(name, pos, TypeDef::Union(UnionDef { members }));
        ty.directives = directives;
        Ok(ty)
    }

    fn parse_enum(&mut self, pos: Pos) -> Result<Type> {
        let name = self.lx.read_name("enum name")?;
        let directives = self.parse_directive_uses()?;
        let mut values = IndexMap::new();
        if self.lx.consume(b'{') {
            loop {
                if self.lx.consume(b'}') {
                    break;
                }
                if self.lx.skip_space() == 0 {
                    return Err(Error::parse(pos, format!("unterminated definition of {name}")));
                }
                let description = self.parse_description()?;
                self.lx.skip_space();
                let value_pos = self.lx.pos();
                let value = self.lx.read_name("enum value")?;
                let value_directives = self.parse_directive_uses()?;
                if values.contains_key(&value) {
                    return Err(Error::parse(value_pos, format!("duplicate enum value {value}")));
                }
                values.insert(
                    value.clone(),
                    EnumValue {
                        name: value,
                        description,
                        directives: value_directives,
                        pos: value_pos,
                    },
                );
            }
        }
        let mut ty = self.new_type(name, pos, TypeDef::Enum(EnumDef { values }));
        ty.directives = directives;
        Ok(ty)
    }

    fn parse_input(&mut self, pos: Pos) -> Result<Type> {
        let name = self.lx.read_name("input name")?;
        let directives = self.parse_directive_uses()?;
        let mut fields = IndexMap::new();
        if self.lx.consume(b'{') {
            loop {
                if self.lx.consume(b'}') {
                    break;
                }
                if self.lx.skip_space() == 0 {
                    return Err(Error::parse(pos, format!("unterminated definition of {name}")));
                }
                let field = self.parse_input_value()?;
                if fields.contains_key(&field.name) {
                    return Err(Error::parse(
                        field.pos,
                        format!("duplicate field {name}.{}", field.name),
                    ));
                }
                fields.insert(field.name.clone(), field);
            }
        }
        let mut ty = self.new_type(name, pos, TypeDef::Input(InputDef { fields }));
        ty.directives = directives;
        Ok(ty)
    }

    fn parse_scalar(&mut self, pos: Pos) -> Result<Type> {
        let name = self.lx.read_name("scalar name")?;
        let directives = self.parse_directive_uses()?;
        // An existing scalar keeps its coercer; extensions only add directives.
        let coercer = self
            .known
            .coercer(&name)
            .unwrap_or_else(|| Arc::new(PassThrough));
        let mut ty = self.new_type(name, pos, TypeDef::Scalar(crate::types::ScalarDef { coercer }));
        ty.directives = directives;
        Ok(ty)
    }

    fn parse_directive_def(&mut self, pos: Pos) -> Result<Directive> {
        self.lx.expect(b'@')?;
        let name = self.lx.read_name("directive name")?;
        let args = if self.lx.skip_space() == b'(' {
            self.parse_arg_defs()?
        } else {
            IndexMap::new()
        };
        let repeatable = if self.peek_keyword("repeatable") {
            self.lx.read_token();
            true
        } else {
            false
        };
        if !self.peek_keyword("on") {
            let b = self.lx.skip_space();
            return Err(self.lx.unexpected(b, "'on'"));
        }
        self.lx.read_token();
        self.lx.consume(b'|');
        let mut locations = Vec::new();
        loop {
            self.lx.skip_space();
            let loc_pos = self.lx.pos();
            let loc = self.lx.read_name("directive location")?;
            let loc = DirectiveLocation::parse(&loc).ok_or_else(|| {
                Error::parse(loc_pos, format!("{loc} is not a directive location"))
            })?;
            if !locations.contains(&loc) {
                locations.push(loc);
            }
            if !self.lx.consume(b'|') {
                break;
            }
        }
        Ok(Directive {
            name,
            description: None,
            args,
            locations,
            repeatable,
            pos,
            core: self.core,
        })
    }

    /// Reads `@name(args)` uses until the next byte is not `@`.
    fn parse_directive_uses(&mut self) -> Result<Vec<DirectiveUse>> {
        parse_directive_uses(&mut self.lx)
    }

    fn peek_keyword(&mut self, keyword: &str) -> bool {
        peek_keyword(&mut self.lx, keyword)
    }

    fn parse_named_ref(&mut self) -> Result<TypeRef> {
        self.lx.skip_space();
        let pos = self.lx.pos();
        let name = self.lx.read_name("type name")?;
        Ok(named_ref(self.known, name, pos))
    }

    /// Reads `Name`, `[T]`, and trailing `!` markers.
    fn parse_type_ref(&mut self) -> Result<TypeRef> {
        let known = self.known;
        parse_type_ref(&mut self.lx, &|name, pos| named_ref(known, name, pos))
    }
}

/// Returns true if the next token is exactly `keyword`. Nothing is consumed
/// but leading space.
pub(crate) fn peek_keyword(lx: &mut Lexer<'_>, keyword: &str) -> bool {
    lx.skip_space();
    let bytes = keyword.as_bytes();
    bytes.iter().enumerate().all(|(i, b)| lx.peek_at(i) == *b)
        && !class::is_token(lx.peek_at(bytes.len()))
}

/// Returns a checked reference if `name` is already registered, otherwise a
/// placeholder.
pub(crate) fn named_ref(known: &Registry, name: String, pos: Pos) -> TypeRef {
    if known.get_type(&name).is_some() {
        TypeRef::Named(name)
    } else {
        TypeRef::Ref { name, pos }
    }
}

/// Reads a type reference. `resolve` turns a name into a reference.
pub(crate) fn parse_type_ref(
    lx: &mut Lexer<'_>,
    resolve: &dyn Fn(String, Pos) -> TypeRef,
) -> Result<TypeRef> {
    let b = lx.skip_space();
    let pos = lx.pos();
    let base = if b == b'[' {
        lx.read_byte();
        let inner = parse_type_ref(lx, resolve)?;
        lx.expect(b']')?;
        inner.list()
    } else {
        let name = lx.read_token();
        if name.is_empty() {
            return Err(lx.unexpected(b, "type"));
        }
        resolve(name, pos)
    };
    if lx.skip_space() == b'!' {
        lx.read_byte();
        if lx.peek() == b'!' {
            return Err(Error::parse(lx.pos(), "a non-null type can not be non-null"));
        }
        return Ok(TypeRef::NonNull(Box::new(base)));
    }
    Ok(base)
}

/// Reads directive uses. Shared with the executable parser.
pub(crate) fn parse_directive_uses(lx: &mut Lexer<'_>) -> Result<Vec<DirectiveUse>> {
    let mut uses = Vec::new();
    while lx.skip_space() == b'@' {
        let pos = lx.pos();
        lx.read_byte();
        let name = lx.read_name("directive name")?;
        let args = if lx.skip_space() == b'(' {
            parse_arg_values(lx)?
        } else {
            Map::new()
        };
        uses.push(DirectiveUse { name, args, pos });
    }
    Ok(uses)
}

/// Reads `(name: value ...)`. Shared with the executable parser.
pub(crate) fn parse_arg_values(lx: &mut Lexer<'_>) -> Result<Map> {
    let start = lx.pos();
    lx.expect(b'(')?;
    let mut args = Map::new();
    loop {
        match lx.skip_space() {
            b')' => {
                lx.read_byte();
                return Ok(args);
            }
            0 => return Err(Error::parse(start, "unterminated argument list")),
            _ => {
                let pos = lx.pos();
                let name = lx.read_name("argument name")?;
                lx.expect(b':')?;
                let value = read_value(lx)?;
                if args.insert(name.clone(), value).is_some() {
                    return Err(Error::parse(pos, format!("duplicate argument {name}")));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_core::Value;

    fn parse(src: &str) -> Result<Vec<Decl>> {
        parse_sdl(src, &Registry::new())
    }

    fn only_type(src: &str) -> Type {
        match parse(src).unwrap().pop() {
            Some(Decl::Type(ty)) => ty,
            other => panic!("expected a type, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_object() {
        let ty = only_type(
            r#"
            "A song."
            type Song implements Node & Named @impl(type: "Song") {
              "The title."
              title: String!
              plays(since: Time, limit: Int = 10): [Int!]
            }
            "#,
        );
        assert_eq!(ty.name, "Song");
        assert_eq!(ty.description.as_deref(), Some("A song."));
        assert_eq!(ty.interfaces().len(), 2);
        assert!(ty.interfaces()[0].is_unresolved());
        assert_eq!(ty.directives[0].name, "impl");
        assert_eq!(ty.directives[0].arg("type"), Some(&Value::from("Song")));

        let title = ty.field("title").unwrap();
        assert_eq!(title.description.as_deref(), Some("The title."));
        assert_eq!(title.ty, TypeRef::named("String").non_null());

        let plays = ty.field("plays").unwrap();
        assert_eq!(plays.ty.to_string(), "[Int!]");
        assert_eq!(plays.args["limit"].default, Some(Value::Int(10)));
    }

    #[test]
    fn test_parse_all_kinds() {
        let decls = parse(
            r#"
            schema { query: Query mutation: Mutation }
            scalar Url @specifiedBy(url: "https://example.com")
            enum Color { RED GREEN @deprecated }
            union Thing = | A | B
            input Filter { color: Color = RED }
            interface Node { id: ID! }
            directive @tag(name: String!) repeatable on FIELD_DEFINITION | OBJECT
            extend type Query { extra: Int }
            "#,
        )
        .unwrap();
        assert_eq!(decls.len(), 8);
        assert!(matches!(&decls[0], Decl::Type(t) if matches!(t.def, TypeDef::Schema(_))));
        assert!(matches!(&decls[6], Decl::Directive(d) if d.repeatable && d.locations.len() == 2));
        assert!(matches!(&decls[7], Decl::Extend(t) if t.name == "Query"));
        let Decl::Type(union) = &decls[3] else {
            panic!("not a type");
        };
        let TypeDef::Union(u) = &union.def else {
            panic!("not a union");
        };
        assert_eq!(u.members.len(), 2);
    }

    #[test]
    fn test_known_names_are_resolved() {
        let ty = only_type("type Query { a: Int, b: Later }");
        assert_eq!(ty.field("a").unwrap().ty, TypeRef::named("Int"));
        assert!(ty.field("b").unwrap().ty.is_unresolved());
    }

    #[test]
    fn test_double_bang_rejected() {
        let err = parse("type Query { a: Int!! }").unwrap_err();
        assert_eq!(
            err.to_string(),
            "parse error: a non-null type can not be non-null at 1:21"
        );
    }

    #[test]
    fn test_unknown_keyword() {
        let err = parse("\n  thing Foo {}").unwrap_err();
        assert_eq!(err.to_string(), "parse error: unknown declaration keyword 'thing' at 2:3");
    }

    #[test]
    fn test_duplicate_field() {
        let err = parse("type Query { a: Int a: String }").unwrap_err();
        assert!(err.message.contains("duplicate field Query.a"));
    }

    #[test]
    fn test_unterminated_body() {
        let err = parse("type Query { a: Int").unwrap_err();
        assert_eq!(err.to_string(), "parse error: unterminated definition of Query at 1:1");
    }

    #[test]
    fn test_bad_location() {
        let err = parse("directive @x on NOWHERE").unwrap_err();
        assert!(err.message.contains("NOWHERE is not a directive location"));
    }
}
