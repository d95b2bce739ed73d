//! Executable document parser.
//!
//! Operations and fragment definitions may appear in any order. A spread of
//! a fragment that has not been defined yet gets a placeholder slot in the
//! document's fragment arena; the definition fills it in later.

use crate::executable::{
    Executable, Field, FragRef, InlineFragment, Op, OpKind, Selection, VarDef,
};
use crate::registry::Registry;
use crate::sdl::{named_ref, parse_arg_values, parse_directive_uses, parse_type_ref, peek_keyword};
use crate::types::DirectiveUse;
use graft_core::{Error, Pos, Result};
use graft_syntax::{read_value, Lexer};
use indexmap::IndexMap;
use std::io::Read;

/// Parses a request document.
pub fn parse_executable(source: &str, registry: &Registry) -> Result<Executable> {
    DocumentParser::new(Lexer::new(source), registry).parse()
}

/// Parses a request document from a reader.
pub fn parse_executable_reader<R: Read>(reader: R, registry: &Registry) -> Result<Executable> {
    DocumentParser::new(Lexer::from_reader(reader)?, registry).parse()
}

/// Executable document parser state.
pub struct DocumentParser<'a, 'r> {
    lx: Lexer<'a>,
    registry: &'r Registry,
    doc: Executable,
    anonymous: Option<Pos>,
}

impl<'a, 'r> DocumentParser<'a, 'r> {
    /// Creates a parser over a lexer.
    #[must_use]
    pub fn new(lx: Lexer<'a>, registry: &'r Registry) -> Self {
        Self {
            lx,
            registry,
            doc: Executable::new(),
            anonymous: None,
        }
    }

    /// Parses the whole document.
    pub fn parse(mut self) -> Result<Executable> {
        loop {
            let b = self.lx.skip_space();
            if b == 0 {
                break;
            }
            let pos = self.lx.pos();
            if b == b'{' {
                self.parse_op(OpKind::Query, pos, false)?;
                continue;
            }
            let keyword = self.lx.read_token();
            if keyword == "fragment" {
                self.parse_fragment(pos)?;
            } else if let Some(kind) = OpKind::parse(&keyword) {
                self.parse_op(kind, pos, true)?;
            } else if keyword.is_empty() {
                return Err(self.lx.unexpected(b, "operation or fragment"));
            } else {
                return Err(Error::parse(
                    pos,
                    format!("unknown definition keyword '{keyword}'"),
                ));
            }
        }

        if let Some(pos) = self.anonymous {
            if self.doc.ops.len() > 1 {
                return Err(Error::parse(
                    pos,
                    "an anonymous operation must be the only operation",
                ));
            }
        }
        if let Some((_, fragment)) = self.doc.fragments().find(|(_, f)| !f.defined) {
            return Err(Error::parse(
                fragment.pos,
                format!("fragment {} is not defined", fragment.name),
            ));
        }
        tracing::debug!(
            ops = self.doc.ops.len(),
            fragments = self.doc.fragments().count(),
            "parsed executable document"
        );
        Ok(self.doc)
    }

    fn parse_op(&mut self, kind: OpKind, pos: Pos, keyword: bool) -> Result<()> {
        let mut name = String::new();
        let mut vars = IndexMap::new();
        let mut directives = Vec::new();
        if keyword {
            self.lx.skip_space();
            name = self.lx.read_token();
            if self.lx.skip_space() == b'(' {
                vars = self.parse_var_defs()?;
            }
            directives = self.parse_uses()?;
        }

        if name.is_empty() {
            if self.anonymous.is_some() {
                return Err(Error::parse(pos, "duplicate anonymous operation"));
            }
            self.anonymous = Some(pos);
        } else if self.doc.ops.contains_key(&name) {
            return Err(Error::parse(pos, format!("duplicate operation {name}")));
        }

        let selections = self.parse_selections()?;
        self.doc.ops.insert(
            name.clone(),
            Op {
                kind,
                name,
                vars,
                directives,
                selections,
                pos,
            },
        );
        Ok(())
    }

    fn parse_var_defs(&mut self) -> Result<IndexMap<String, VarDef>> {
        let start = self.lx.pos();
        self.lx.expect(b'(')?;
        let mut vars = IndexMap::new();
        loop {
            match self.lx.skip_space() {
                b')' => {
                    self.lx.read_byte();
                    return Ok(vars);
                }
                0 => return Err(Error::parse(start, "unterminated variable list")),
                _ => {}
            }
            let pos = self.lx.pos();
            self.lx.expect(b'$')?;
            let name = self.lx.read_name("variable name")?;
            self.lx.expect(b':')?;
            let registry = self.registry;
            let ty = parse_type_ref(&mut self.lx, &|n, p| named_ref(registry, n, p))?;
            let default = if self.lx.consume(b'=') {
                Some(read_value(&mut self.lx)?)
            } else {
                None
            };
            let directives = self.parse_uses()?;
            if vars.contains_key(&name) {
                return Err(Error::parse(pos, format!("duplicate variable ${name}")));
            }
            vars.insert(
                name.clone(),
                VarDef {
                    name,
                    ty,
                    default,
                    directives,
                    pos,
                },
            );
        }
    }

    fn parse_fragment(&mut self, pos: Pos) -> Result<()> {
        let name = self.lx.read_name("fragment name")?;
        if name == "on" {
            return Err(Error::parse(pos, "a fragment can not be named 'on'"));
        }
        if !peek_keyword(&mut self.lx, "on") {
            let b = self.lx.skip_space();
            return Err(self.lx.unexpected(b, "'on'"));
        }
        self.lx.read_token();
        let condition = self.lx.read_name("type condition")?;
        let directives = self.parse_uses()?;
        let selections = self.parse_selections()?;

        let id = self.doc.fragment_slot(&name, pos);
        let fragment = self.doc.fragment_mut(id);
        if fragment.defined {
            return Err(Error::parse(pos, format!("duplicate fragment {name}")));
        }
        fragment.condition = condition;
        fragment.directives = directives;
        fragment.selections = selections;
        fragment.pos = pos;
        fragment.defined = true;
        Ok(())
    }

    fn parse_selections(&mut self) -> Result<Vec<Selection>> {
        let start = self.lx.pos();
        self.lx.expect(b'{')?;
        let mut selections = Vec::new();
        loop {
            match self.lx.skip_space() {
                b'}' => {
                    self.lx.read_byte();
                    if selections.is_empty() {
                        return Err(Error::parse(start, "empty selection set"));
                    }
                    return Ok(selections);
                }
                0 => return Err(Error::parse(start, "unterminated selection set")),
                _ => selections.push(self.parse_selection()?),
            }
        }
    }

    fn parse_selection(&mut self) -> Result<Selection> {
        let pos = self.lx.pos();
        if self.lx.consume_spread() {
            return self.parse_spread(pos);
        }
        let b = self.lx.peek();
        let first = self.lx.read_token();
        if first.is_empty() {
            return Err(self.lx.unexpected(b, "field name"));
        }
        let mut field = if self.lx.consume(b':') {
            let mut field = Field::new(self.lx.read_name("field name")?, pos);
            field.alias = Some(first);
            field
        } else {
            Field::new(first, pos)
        };
        if self.lx.skip_space() == b'(' {
            field.args = parse_arg_values(&mut self.lx)?;
        }
        field.directives = self.parse_uses()?;
        if self.lx.skip_space() == b'{' {
            field.selections = self.parse_selections()?;
        }
        Ok(Selection::Field(field))
    }

    fn parse_spread(&mut self, pos: Pos) -> Result<Selection> {
        let b = self.lx.skip_space();
        if peek_keyword(&mut self.lx, "on") {
            self.lx.read_token();
            let condition = self.lx.read_name("type condition")?;
            return self.parse_inline(Some(condition), pos);
        }
        if b == b'{' || b == b'@' {
            return self.parse_inline(None, pos);
        }
        let name = self.lx.read_name("fragment name")?;
        let fragment = self.doc.fragment_slot(&name, pos);
        let directives = self.parse_uses()?;
        Ok(Selection::FragRef(FragRef {
            fragment,
            name,
            directives,
            pos,
        }))
    }

    fn parse_inline(&mut self, condition: Option<String>, pos: Pos) -> Result<Selection> {
        let directives = self.parse_uses()?;
        let selections = self.parse_selections()?;
        Ok(Selection::Inline(InlineFragment {
            condition,
            directives,
            selections,
            pos,
        }))
    }

    /// Reads directive uses, filling in declared defaults for arguments
    /// the use leaves out.
    fn parse_uses(&mut self) -> Result<Vec<DirectiveUse>> {
        let mut uses = parse_directive_uses(&mut self.lx)?;
        for u in &mut uses {
            let Some(def) = self.registry.get_directive(&u.name) else {
                continue;
            };
            for (name, arg) in &def.args {
                if let Some(default) = &arg.default {
                    if !u.args.contains_key(name) {
                        u.args.insert(name.clone(), default.clone());
                    }
                }
            }
        }
        Ok(uses)
    }
}
