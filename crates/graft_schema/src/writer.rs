//! Canonical SDL output.
//!
//! The schema declaration comes first, then directives by name, then types
//! ordered by kind rank and name. Members keep declaration order, so the
//! output re-parses to the same registry.

use crate::registry::Registry;
use crate::types::{Directive, DirectiveUse, InputValue, Type, TypeDef};
use indexmap::IndexMap;
use std::fmt::{self, Write};

/// Options for SDL output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdlOptions {
    /// Include built-in types and directives.
    pub include_builtins: bool,
    /// Include description strings.
    pub include_descriptions: bool,
}

impl Default for SdlOptions {
    fn default() -> Self {
        Self {
            include_builtins: false,
            include_descriptions: true,
        }
    }
}

impl SdlOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether built-ins are written.
    #[must_use]
    pub fn with_builtins(mut self, include: bool) -> Self {
        self.include_builtins = include;
        self
    }

    /// Sets whether descriptions are written.
    #[must_use]
    pub fn with_descriptions(mut self, include: bool) -> Self {
        self.include_descriptions = include;
        self
    }
}

impl Registry {
    /// Returns the registry as SDL text.
    #[must_use]
    pub fn sdl(&self, options: &SdlOptions) -> String {
        let mut out = String::new();
        // Writing into a String can not fail.
        let _ = self.write_sdl(&mut out, options);
        out
    }

    /// Writes the registry as SDL.
    pub fn write_sdl<W: Write>(&self, w: &mut W, options: &SdlOptions) -> fmt::Result {
        let mut first = true;
        let mut sep = |w: &mut W| -> fmt::Result {
            if !first {
                w.write_char('\n')?;
            }
            first = false;
            Ok(())
        };

        if let Some(schema) = self.schema() {
            sep(w)?;
            write_type(w, schema, options)?;
        }

        let mut directives: Vec<&Directive> = self
            .directives()
            .filter(|d| options.include_builtins || !d.core)
            .collect();
        directives.sort_by(|a, b| a.name.cmp(&b.name));
        for dir in directives {
            sep(w)?;
            write_directive(w, dir, options)?;
        }

        let mut types: Vec<&Type> = self
            .types()
            .filter(|t| options.include_builtins || !t.core)
            .collect();
        types.sort_by(|a, b| (a.def.rank(), &a.name).cmp(&(b.def.rank(), &b.name)));
        for ty in types {
            sep(w)?;
            write_type(w, ty, options)?;
        }
        Ok(())
    }
}

/// Writes one type declaration.
pub fn write_type<W: Write>(w: &mut W, ty: &Type, options: &SdlOptions) -> fmt::Result {
    write_description(w, ty.description.as_deref(), "", options)?;
    match &ty.def {
        TypeDef::Schema(s) => {
            w.write_str("schema")?;
            write_uses(w, &ty.directives)?;
            w.write_str(" {\n")?;
            for (op, root) in [
                ("query", &s.query),
                ("mutation", &s.mutation),
                ("subscription", &s.subscription),
            ] {
                if let Some(root) = root {
                    writeln!(w, "  {op}: {root}")?;
                }
            }
            w.write_str("}\n")
        }
        TypeDef::Scalar(_) => {
            write!(w, "scalar {}", ty.name)?;
            write_uses(w, &ty.directives)?;
            w.write_char('\n')
        }
        TypeDef::Object(o) | TypeDef::Interface(o) => {
            write!(w, "{} {}", ty.def.keyword(), ty.name)?;
            for (i, iface) in o.interfaces.iter().enumerate() {
                w.write_str(if i == 0 { " implements " } else { " & " })?;
                write!(w, "{iface}")?;
            }
            write_uses(w, &ty.directives)?;
            w.write_str(" {\n")?;
            for field in o.fields.values() {
                write_description(w, field.description.as_deref(), "  ", options)?;
                write!(w, "  {}", field.name)?;
                write_args(w, &field.args)?;
                write!(w, ": {}", field.ty)?;
                write_uses(w, &field.directives)?;
                w.write_char('\n')?;
            }
            w.write_str("}\n")
        }
        TypeDef::Union(u) => {
            write!(w, "union {}", ty.name)?;
            write_uses(w, &ty.directives)?;
            for (i, member) in u.members.iter().enumerate() {
                w.write_str(if i == 0 { " = " } else { " | " })?;
                write!(w, "{member}")?;
            }
            w.write_char('\n')
        }
        TypeDef::Enum(e) => {
            write!(w, "enum {}", ty.name)?;
            write_uses(w, &ty.directives)?;
            w.write_str(" {\n")?;
            for value in e.values.values() {
                write_description(w, value.description.as_deref(), "  ", options)?;
                write!(w, "  {}", value.name)?;
                write_uses(w, &value.directives)?;
                w.write_char('\n')?;
            }
            w.write_str("}\n")
        }
        TypeDef::Input(i) => {
            write!(w, "input {}", ty.name)?;
            write_uses(w, &ty.directives)?;
            w.write_str(" {\n")?;
            for field in i.fields.values() {
                write_description(w, field.description.as_deref(), "  ", options)?;
                w.write_str("  ")?;
                write_input_value(w, field)?;
                w.write_char('\n')?;
            }
            w.write_str("}\n")
        }
    }
}

fn write_directive<W: Write>(w: &mut W, dir: &Directive, options: &SdlOptions) -> fmt::Result {
    write_description(w, dir.description.as_deref(), "", options)?;
    write!(w, "directive @{}", dir.name)?;
    write_args(w, &dir.args)?;
    if dir.repeatable {
        w.write_str(" repeatable")?;
    }
    for (i, loc) in dir.locations.iter().enumerate() {
        w.write_str(if i == 0 { " on " } else { " | " })?;
        w.write_str(loc.as_str())?;
    }
    w.write_char('\n')
}

fn write_args<W: Write>(w: &mut W, args: &IndexMap<String, InputValue>) -> fmt::Result {
    if args.is_empty() {
        return Ok(());
    }
    w.write_char('(')?;
    for (i, arg) in args.values().enumerate() {
        if i > 0 {
            w.write_str(", ")?;
        }
        if let Some(desc) = &arg.description {
            write!(w, "{} ", graft_core::Value::from(desc.as_str()))?;
        }
        write_input_value(w, arg)?;
    }
    w.write_char(')')
}

fn write_input_value<W: Write>(w: &mut W, value: &InputValue) -> fmt::Result {
    write!(w, "{}: {}", value.name, value.ty)?;
    if let Some(default) = &value.default {
        write!(w, " = {default}")?;
    }
    write_uses(w, &value.directives)
}

fn write_uses<W: Write>(w: &mut W, uses: &[DirectiveUse]) -> fmt::Result {
    for u in uses {
        write!(w, " @{}", u.name)?;
        if !u.args.is_empty() {
            w.write_char('(')?;
            for (i, (k, v)) in u.args.iter().enumerate() {
                if i > 0 {
                    w.write_str(", ")?;
                }
                write!(w, "{k}: {v}")?;
            }
            w.write_char(')')?;
        }
    }
    Ok(())
}

fn write_description<W: Write>(
    w: &mut W,
    description: Option<&str>,
    indent: &str,
    options: &SdlOptions,
) -> fmt::Result {
    let Some(desc) = description.filter(|_| options.include_descriptions) else {
        return Ok(());
    };
    if desc.contains('\n') && !desc.contains("\"\"\"") {
        writeln!(w, "{indent}\"\"\"")?;
        for line in desc.lines() {
            if line.is_empty() {
                w.write_char('\n')?;
            } else {
                writeln!(w, "{indent}{line}")?;
            }
        }
        writeln!(w, "{indent}\"\"\"")
    } else {
        writeln!(w, "{indent}{}", graft_core::Value::from(desc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdl::parse_sdl;

    fn load(sdl: &str) -> Registry {
        let mut registry = Registry::new();
        let decls = parse_sdl(sdl, &registry).unwrap();
        registry.add_types(decls).unwrap();
        registry
    }

    const SONGS: &str = r#"
type Query {
  title: String
  artist(name: String!): Artist
  artists: [Artist]
}

"A performer."
type Artist {
  name: String!
  songs: [Song]
  origin: [String]
}

type Song {
  name: String
  artist: Artist
  duration: Int
  release: Time
}

enum Genre { ROCK POP }

directive @cost(weight: Int = 1) on FIELD_DEFINITION
"#;

    #[test]
    fn test_sdl_canonical_order() {
        let registry = load(SONGS);
        insta::assert_snapshot!(registry.sdl(&SdlOptions::new()), @r###"
        directive @cost(weight: Int = 1) on FIELD_DEFINITION

        enum Genre {
          ROCK
          POP
        }

        "A performer."
        type Artist {
          name: String!
          songs: [Song]
          origin: [String]
        }

        type Query {
          title: String
          artist(name: String!): Artist
          artists: [Artist]
        }

        type Song {
          name: String
          artist: Artist
          duration: Int
          release: Time
        }
        "###);
    }

    #[test]
    fn test_sdl_is_idempotent() {
        let first = load(SONGS).sdl(&SdlOptions::new());
        let second = load(&first).sdl(&SdlOptions::new());
        assert_eq!(first, second);
    }

    #[test]
    fn test_builtins_round_trip() {
        let registry = Registry::new();
        let all = registry.sdl(&SdlOptions::new().with_builtins(true));
        assert!(all.contains("directive @skip(if: Boolean!) on FIELD | FRAGMENT_SPREAD | INLINE_FRAGMENT"));
        assert!(all.contains("type __Schema {"));
        assert!(registry.sdl(&SdlOptions::new()).is_empty());
    }

    #[test]
    fn test_quoted_object_keys_round_trip() {
        let registry = load(
            "scalar Json\ndirective @meta(data: Json) on OBJECT\ntype Query @meta(data: {\"release date\": 2021, plain: true}) { title: String }",
        );
        let first = registry.sdl(&SdlOptions::new());
        assert!(first.contains(r#"@meta(data: {"release date": 2021, plain: true})"#));
        assert_eq!(load(&first).sdl(&SdlOptions::new()), first);
    }

    #[test]
    fn test_write_schema_and_union() {
        let registry = load(
            "schema { query: Root }\ntype Root { a: U }\ntype A { x: Int }\ntype B { y: Int }\nunion U = A | B",
        );
        let sdl = registry.sdl(&SdlOptions::new());
        assert!(sdl.starts_with("schema {\n  query: Root\n}\n"));
        assert!(sdl.contains("union U = A | B\n"));
    }
}
