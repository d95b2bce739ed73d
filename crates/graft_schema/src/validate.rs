//! Schema validation.
//!
//! Runs after every schema mutation over the whole registry. Every check
//! collects its errors; nothing stops at the first problem.

use crate::coerce::{CoerceOptions, Coercion};
use crate::registry::Registry;
use crate::types::{
    Directive, DirectiveUse, FieldDef, InputValue, ObjectDef, Type, TypeDef, TypeRef,
};
use graft_core::{Error, Errors, Pos, Value};
use graft_syntax::DirectiveLocation;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;

/// Validates every type and directive in `registry`.
///
/// Literal defaults and directive arguments are coerced in place, and
/// directive uses gain the declared defaults for arguments they omit.
pub fn validate_schema(registry: &mut Registry) -> Result<(), Errors> {
    let snapshot = registry.clone();
    let mut validator = SchemaValidator::new(&snapshot);
    for ty in registry.types_mut() {
        validator.check_type(ty);
    }
    for dir in registry.directives_mut() {
        validator.check_directive(dir);
    }
    validator.check_directive_cycles();
    tracing::debug!(errors = validator.errors.len(), "schema validated");
    validator.errors.into_result(())
}

/// Returns an error if `name` is not a legal GraphQL name.
pub fn check_name(name: &str, core: bool) -> Result<(), String> {
    let mut bytes = name.bytes();
    match bytes.next() {
        None => return Err("name can not be empty".to_string()),
        Some(b) if b.is_ascii_digit() => {
            return Err(format!("{name} is not a valid name"));
        }
        Some(_) => {}
    }
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(format!("{name} is not a valid name"));
    }
    if !core && name.starts_with("__") {
        return Err(format!("name {name} is reserved"));
    }
    Ok(())
}

/// Checks and normalizes directive uses at one location.
///
/// Uses naming an unknown directive, a location the directive does not
/// allow, or an argument it does not declare are rejected. Supplied
/// arguments are coerced, omitted ones take the declared default, and
/// missing required ones are reported. With `allow_vars` unset, a
/// `$variable` anywhere in an argument is an error.
pub(crate) fn check_directive_uses(
    registry: &Registry,
    uses: &mut [DirectiveUse],
    loc: DirectiveLocation,
    allow_vars: bool,
    errors: &mut Errors,
) {
    let coercion = Coercion::new(registry, CoerceOptions::default());
    let mut seen: FxHashSet<String> = FxHashSet::default();
    for u in uses.iter_mut() {
        let Some(def) = registry.get_directive(&u.name) else {
            errors.push(
                Error::validation(format!("directive @{} is not defined", u.name)).at(u.pos),
            );
            continue;
        };
        if !def.allows(loc) {
            errors.push(
                Error::validation(format!("directive @{} is not allowed on {loc}", u.name))
                    .at(u.pos),
            );
        }
        if !seen.insert(u.name.clone()) && !def.repeatable {
            errors.push(
                Error::validation(format!("directive @{} can not be repeated", u.name)).at(u.pos),
            );
        }
        check_args(&coercion, def, u, allow_vars, errors);
    }
}

fn check_args(
    coercion: &Coercion<'_>,
    def: &Directive,
    u: &mut DirectiveUse,
    allow_vars: bool,
    errors: &mut Errors,
) {
    for key in u.args.keys() {
        if !def.args.contains_key(key) {
            errors.push(
                Error::validation(format!("directive @{} has no argument {key}", u.name)).at(u.pos),
            );
        }
    }
    for (name, arg) in &def.args {
        match u.args.get_mut(name) {
            Some(value) => {
                if !allow_vars && contains_var(value) {
                    errors.push(
                        Error::validation(format!(
                            "@{}({name}:) can not use a variable here",
                            u.name
                        ))
                        .at(u.pos),
                    );
                    continue;
                }
                match coercion.coerce_in(&arg.ty, value) {
                    Ok(coerced) => *value = coerced,
                    Err(e) => errors.push(
                        Error::coerce(format!("@{}({name}:) {}", u.name, e.message)).at(u.pos),
                    ),
                }
            }
            None => {
                if let Some(default) = &arg.default {
                    u.args.insert(name.clone(), default.clone());
                } else if arg.ty.is_non_null() {
                    errors.push(
                        Error::validation(format!(
                            "missing required argument {name} of @{}",
                            u.name
                        ))
                        .at(u.pos),
                    );
                }
            }
        }
    }
}

/// Returns true if a `$variable` appears anywhere in `value`.
#[must_use]
pub fn contains_var(value: &Value) -> bool {
    match value {
        Value::Var(_) => true,
        Value::List(items) => items.iter().any(contains_var),
        Value::Object(map) => map.values().any(contains_var),
        _ => false,
    }
}

struct SchemaValidator<'a> {
    registry: &'a Registry,
    coercion: Coercion<'a>,
    errors: Errors,
}

impl<'a> SchemaValidator<'a> {
    fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            coercion: Coercion::new(registry, CoerceOptions::default()),
            errors: Errors::new(),
        }
    }

    fn name(&mut self, name: &str, core: bool, pos: Pos) {
        if let Err(message) = check_name(name, core) {
            self.errors.push(Error::validation(message).at(pos));
        }
    }

    fn uses(&mut self, uses: &mut [DirectiveUse], loc: DirectiveLocation) {
        check_directive_uses(self.registry, uses, loc, false, &mut self.errors);
    }

    fn check_type(&mut self, ty: &mut Type) {
        if !matches!(ty.def, TypeDef::Schema(_)) {
            self.name(&ty.name, ty.core, ty.pos);
        }
        let loc = ty.def.location();
        self.uses(&mut ty.directives, loc);

        let (name, core, pos) = (ty.name.clone(), ty.core, ty.pos);
        match &mut ty.def {
            TypeDef::Scalar(_) => {}
            TypeDef::Object(o) | TypeDef::Interface(o) => {
                if o.fields.is_empty() {
                    self.errors.push(
                        Error::validation(format!("type {name} must define at least one field"))
                            .at(pos),
                    );
                }
                for field in o.fields.values_mut() {
                    self.check_field(&name, core, field);
                }
                self.check_interfaces(&name, o, pos);
            }
            TypeDef::Union(u) => {
                if u.members.is_empty() {
                    self.errors.push(
                        Error::validation(format!("union {name} must have at least one member"))
                            .at(pos),
                    );
                }
                for member in &u.members {
                    let is_object = self
                        .registry
                        .named(member)
                        .is_some_and(|t| matches!(t.def, TypeDef::Object(_)));
                    if !is_object {
                        self.errors.push(
                            Error::validation(format!(
                                "union member {member} of {name} is not an object type"
                            ))
                            .at(pos),
                        );
                    }
                }
            }
            TypeDef::Enum(e) => {
                if e.values.is_empty() {
                    self.errors.push(
                        Error::validation(format!("enum {name} must define at least one value"))
                            .at(pos),
                    );
                }
                for value in e.values.values_mut() {
                    if matches!(value.name.as_str(), "true" | "false" | "null") {
                        self.errors.push(
                            Error::validation(format!("enum value {} is reserved", value.name))
                                .at(value.pos),
                        );
                    } else {
                        self.name(&value.name, core, value.pos);
                    }
                    self.uses(&mut value.directives, DirectiveLocation::EnumValue);
                }
            }
            TypeDef::Input(i) => {
                if i.fields.is_empty() {
                    self.errors.push(
                        Error::validation(format!("input {name} must define at least one field"))
                            .at(pos),
                    );
                }
                for field in i.fields.values_mut() {
                    self.check_input_value(
                        &format!("{name}.{}", field.name),
                        core,
                        field,
                        DirectiveLocation::InputFieldDefinition,
                    );
                }
            }
            TypeDef::Schema(s) => {
                for (op, root) in [
                    ("query", &s.query),
                    ("mutation", &s.mutation),
                    ("subscription", &s.subscription),
                ] {
                    let Some(root) = root else { continue };
                    let is_object = self
                        .registry
                        .named(root)
                        .is_some_and(|t| matches!(t.def, TypeDef::Object(_)));
                    if !is_object {
                        self.errors.push(
                            Error::validation(format!("{op} root {root} is not an object type"))
                                .at(pos),
                        );
                    }
                }
            }
        }
    }

    fn check_field(&mut self, owner: &str, core: bool, field: &mut FieldDef) {
        self.name(&field.name, core, field.pos);
        if !self.registry.is_output(&field.ty) {
            self.errors.push(
                Error::validation(format!(
                    "{owner}.{} can not return input type {}",
                    field.name, field.ty
                ))
                .at(field.pos),
            );
        }
        self.uses(&mut field.directives, DirectiveLocation::FieldDefinition);
        for arg in field.args.values_mut() {
            self.check_input_value(
                &format!("{owner}.{}({}:)", field.name, arg.name),
                core,
                arg,
                DirectiveLocation::ArgumentDefinition,
            );
        }
    }

    /// Checks an argument or input field: name, input classification,
    /// directives and default value.
    fn check_input_value(
        &mut self,
        what: &str,
        core: bool,
        value: &mut InputValue,
        loc: DirectiveLocation,
    ) {
        self.name(&value.name, core, value.pos);
        if !self.registry.is_input(&value.ty) {
            self.errors.push(
                Error::validation(format!("{what} has output type {}", value.ty)).at(value.pos),
            );
            return;
        }
        self.uses(&mut value.directives, loc);
        let Some(default) = value.default.as_mut() else {
            return;
        };
        if contains_var(default) {
            self.errors.push(
                Error::validation(format!("default of {what} can not use a variable"))
                    .at(value.pos),
            );
            return;
        }
        match self.coercion.coerce_in(&value.ty, default) {
            Ok(coerced) => *default = coerced,
            Err(e) => self.errors.push(
                Error::coerce(format!("default of {what}: {}", e.message)).at(value.pos),
            ),
        }
    }

    fn check_interfaces(&mut self, name: &str, def: &ObjectDef, pos: Pos) {
        let declared: FxHashSet<&str> = def.interfaces.iter().map(TypeRef::base_name).collect();
        for iface_ref in &def.interfaces {
            let iface_name = iface_ref.base_name();
            if iface_name == name {
                self.errors
                    .push(Error::validation(format!("{name} can not implement itself")).at(pos));
                continue;
            }
            let Some(iface) = self.registry.get_type(iface_name) else {
                continue;
            };
            let TypeDef::Interface(idef) = &iface.def else {
                self.errors.push(
                    Error::validation(format!("{name} implements {iface_name}, which is not an interface"))
                        .at(pos),
                );
                continue;
            };
            for inherited in &idef.interfaces {
                let inherited = inherited.base_name();
                if inherited != name && !declared.contains(inherited) {
                    self.errors.push(
                        Error::validation(format!(
                            "{name} must also implement {inherited} because {iface_name} does"
                        ))
                        .at(pos),
                    );
                }
            }
            for ifield in idef.fields.values() {
                self.check_conformance(name, &def.fields, iface_name, ifield, pos);
            }
        }
    }

    fn check_conformance(
        &mut self,
        name: &str,
        fields: &IndexMap<String, FieldDef>,
        iface: &str,
        ifield: &FieldDef,
        pos: Pos,
    ) {
        let fname = &ifield.name;
        let Some(field) = fields.get(fname) else {
            self.errors.push(
                Error::validation(format!("{name} does not implement {iface}.{fname}")).at(pos),
            );
            return;
        };
        if !self.registry.is_subtype(&field.ty, &ifield.ty) {
            self.errors.push(
                Error::validation(format!(
                    "{name}.{fname} returns {} which is not a subtype of {iface}.{fname} {}",
                    field.ty, ifield.ty
                ))
                .at(field.pos),
            );
        }
        for iarg in ifield.args.values() {
            match field.args.get(&iarg.name) {
                None => self.errors.push(
                    Error::validation(format!(
                        "{name}.{fname} is missing argument {} of {iface}.{fname}",
                        iarg.name
                    ))
                    .at(field.pos),
                ),
                Some(arg) if arg.ty != iarg.ty => self.errors.push(
                    Error::validation(format!(
                        "{name}.{fname}({}:) must be {} to match {iface}.{fname}",
                        iarg.name, iarg.ty
                    ))
                    .at(arg.pos),
                ),
                Some(_) => {}
            }
        }
        for arg in field.args.values() {
            if !ifield.args.contains_key(&arg.name) && arg.is_required() {
                self.errors.push(
                    Error::validation(format!(
                        "{name}.{fname}({}:) must be optional because {iface}.{fname} does not define it",
                        arg.name
                    ))
                    .at(arg.pos),
                );
            }
        }
    }

    fn check_directive(&mut self, dir: &mut Directive) {
        self.name(&dir.name, dir.core, dir.pos);
        if dir.locations.is_empty() {
            self.errors.push(
                Error::validation(format!("directive @{} has no locations", dir.name)).at(dir.pos),
            );
        }
        let name = dir.name.clone();
        for arg in dir.args.values_mut() {
            self.check_input_value(
                &format!("@{name}({}:)", arg.name),
                dir.core,
                arg,
                DirectiveLocation::ArgumentDefinition,
            );
        }
    }

    /// Rejects directives whose argument directives lead back to themselves.
    /// Each cycle is reported once, starting from its smallest name.
    fn check_directive_cycles(&mut self) {
        for dir in self.registry.directives() {
            let mut path = Vec::new();
            let mut visited = FxHashSet::default();
            if let Some(cycle) = self.find_cycle(&dir.name, &dir.name, &mut path, &mut visited) {
                self.errors.push(
                    Error::validation(format!("directive cycle {cycle}")).at(dir.pos),
                );
            }
        }
    }

    fn find_cycle(
        &self,
        start: &str,
        current: &str,
        path: &mut Vec<String>,
        visited: &mut FxHashSet<String>,
    ) -> Option<String> {
        if !visited.insert(current.to_string()) {
            return None;
        }
        let dir = self.registry.get_directive(current)?;
        for arg in dir.args.values() {
            for u in &arg.directives {
                path.push(format!("{current}.{}", arg.name));
                if u.name == start {
                    return Some(format!("{}->{start}", path.join("->")));
                }
                // Cycles through a smaller name are reported from there.
                if u.name.as_str() > start {
                    if let Some(cycle) = self.find_cycle(start, &u.name, path, visited) {
                        return Some(cycle);
                    }
                }
                path.pop();
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdl::parse_sdl;
    use graft_core::ErrorKind;

    fn add(sdl: &str) -> Result<Registry, Errors> {
        let mut registry = Registry::new();
        let decls = parse_sdl(sdl, &registry).map_err(Errors::from)?;
        registry.add_types(decls)?;
        Ok(registry)
    }

    fn messages(sdl: &str) -> Vec<String> {
        add(sdl)
            .unwrap_err()
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    #[test]
    fn test_check_name() {
        assert!(check_name("Song", false).is_ok());
        assert!(check_name("_private9", false).is_ok());
        assert!(check_name("", false).is_err());
        assert!(check_name("9lives", false).is_err());
        assert!(check_name("bad-name", false).is_err());
        assert_eq!(
            check_name("__Mine", false).unwrap_err(),
            "name __Mine is reserved"
        );
        assert!(check_name("__Type", true).is_ok());
    }

    #[test]
    fn test_reserved_type_name() {
        let errs = messages("type __Mine { a: Int }");
        assert_eq!(errs, vec!["name __Mine is reserved"]);
    }

    #[test]
    fn test_directive_location() {
        let errs = messages("type Query { a: Int @skip(if: true) }");
        assert_eq!(errs, vec!["directive @skip is not allowed on FIELD_DEFINITION"]);
    }

    #[test]
    fn test_unknown_directive_and_argument() {
        let errs = messages("type Query @nope { a: Int @deprecated(why: \"x\") }");
        assert!(errs.contains(&"directive @nope is not defined".to_string()));
        assert!(errs.contains(&"directive @deprecated has no argument why".to_string()));
    }

    #[test]
    fn test_directive_default_filled() {
        let registry = add("type Query { a: Int @deprecated }").unwrap();
        let field = registry.get_type("Query").and_then(|t| t.field("a")).unwrap();
        assert_eq!(
            field.directives[0].arg("reason"),
            Some(&Value::from("No longer supported"))
        );
    }

    #[test]
    fn test_directive_argument_coerced_with_position() {
        let errors = add("type Query {\n  a: Int @deprecated(reason: 5)\n}").unwrap_err();
        let err = errors.iter().next().unwrap();
        assert_eq!(err.kind, ErrorKind::Coerce);
        assert_eq!(err.pos, Some(Pos::new(2, 10)));
    }

    #[test]
    fn test_repeatable() {
        let errs = messages(
            "directive @tag(name: String) on OBJECT\ntype Query @tag(name: \"a\") @tag(name: \"b\") { a: Int }",
        );
        assert_eq!(errs, vec!["directive @tag can not be repeated"]);
        assert!(add(
            "directive @tag(name: String) repeatable on OBJECT\ntype Query @tag(name: \"a\") @tag(name: \"b\") { a: Int }",
        )
        .is_ok());
    }

    #[test]
    fn test_directive_cycle() {
        let errs = messages(
            "directive @a(x: Int @b) on ARGUMENT_DEFINITION\ndirective @b(y: Int @a) on ARGUMENT_DEFINITION\ntype Query { q: Int }",
        );
        assert_eq!(errs, vec!["directive cycle a.x->b.y->a"]);
    }

    #[test]
    fn test_self_cycle() {
        let errs = messages("directive @a(x: Int @a) on ARGUMENT_DEFINITION\ntype Query { q: Int }");
        assert_eq!(errs, vec!["directive cycle a.x->a"]);
    }

    #[test]
    fn test_interface_conformance() {
        let errs = messages(
            r"
            interface Node { id: ID!, kids(first: Int): [Node] }
            type A implements Node { id: ID }
            type B implements Node { id: ID!, kids(first: String, extra: Int!): [B] }
            type Query { n: Node }
            ",
        );
        assert!(errs.contains(&"A.id returns ID which is not a subtype of Node.id ID!".to_string()));
        assert!(errs.contains(&"A does not implement Node.kids".to_string()));
        assert!(errs.contains(&"B.kids(first:) must be Int to match Node.kids".to_string()));
        assert!(errs.contains(
            &"B.kids(extra:) must be optional because Node.kids does not define it".to_string()
        ));
        assert_eq!(errs.len(), 4);
    }

    #[test]
    fn test_covariant_return_accepted() {
        assert!(add(
            r"
            interface Node { id: ID!, friends: [Node] }
            type User implements Node { id: ID!, friends: [User!] }
            type Query { n: Node }
            ",
        )
        .is_ok());
    }

    #[test]
    fn test_transitive_interfaces() {
        let errs = messages(
            r"
            interface Node { id: ID! }
            interface Named implements Node { id: ID!, name: String }
            type User implements Named { id: ID!, name: String }
            type Query { u: User }
            ",
        );
        assert_eq!(errs, vec!["User must also implement Node because Named does"]);
    }

    #[test]
    fn test_input_output_classification() {
        let errs = messages(
            r"
            input Filter { limit: Int }
            type Song { title: String }
            type Query { a(f: Song): Int, b: Filter }
            ",
        );
        assert!(errs.contains(&"Query.a(f:) has output type Song".to_string()));
        assert!(errs.contains(&"Query.b can not return input type Filter".to_string()));
    }

    #[test]
    fn test_union_and_enum_sanity() {
        let errs = messages(
            r"
            interface Node { id: ID }
            union U = Node
            enum E { true }
            type Query { u: U, e: E }
            ",
        );
        assert!(errs.contains(&"union member Node of U is not an object type".to_string()));
        assert!(errs.contains(&"enum value true is reserved".to_string()));
    }

    #[test]
    fn test_default_values_coerced() {
        let registry = add("enum Color { RED }\ntype Query { a(c: Color = RED, n: [Int] = 3): Int }")
            .unwrap();
        let field = registry.get_type("Query").and_then(|t| t.field("a")).unwrap();
        assert_eq!(field.args["n"].default, Some(Value::List(vec![Value::Int(3)])));

        let errs = messages("type Query { a(n: Int = \"x\"): Int }");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].starts_with("default of Query.a(n:)"));
        let errs = messages("type Query { a(n: Int = $v): Int }");
        assert_eq!(errs, vec!["default of Query.a(n:) can not use a variable"]);
    }

    #[test]
    fn test_schema_roots_must_be_objects() {
        let errs = messages("schema { query: Q }\ninterface Q { a: Int }");
        assert_eq!(errs, vec!["query root Q is not an object type"]);
    }

    #[test]
    fn test_errors_accumulate() {
        let errs = messages("type A { }\nenum E { }\ntype Query { a: A, e: E }");
        assert_eq!(errs.len(), 2);
    }
}
