//! Executable document validation.
//!
//! Checks what can be known before execution: root types, directive uses,
//! variable types and defaults, fragment type conditions and fragment
//! cycles. Field existence and argument values are checked while resolving.

use crate::coerce::{CoerceOptions, Coercion};
use crate::executable::{Executable, FragmentId, Selection};
use crate::registry::Registry;
use crate::types::Type;
use crate::validate::{check_directive_uses, contains_var};
use graft_core::{Error, Errors, Pos};
use graft_syntax::DirectiveLocation;
use rustc_hash::FxHashSet;

/// Validates a parsed request against `registry`.
///
/// Variable types are resolved in place and their defaults coerced. Every
/// problem is collected.
pub fn validate_executable(registry: &Registry, doc: &mut Executable) -> Result<(), Errors> {
    let mut errors = Errors::new();
    let coercion = Coercion::new(registry, CoerceOptions::default());

    for op in doc.ops.values_mut() {
        if registry.root_type(op.kind).is_none() {
            errors.push(
                Error::validation(format!("schema has no {} root type", op.kind)).at(op.pos),
            );
        }
        check_directive_uses(registry, &mut op.directives, op.kind.location(), true, &mut errors);

        for var in op.vars.values_mut() {
            check_directive_uses(
                registry,
                &mut var.directives,
                DirectiveLocation::VariableDefinition,
                false,
                &mut errors,
            );
            match registry.resolve_ref(&var.ty) {
                Ok(ty) => var.ty = ty,
                Err(e) => {
                    errors.push(e.or_at(var.pos));
                    continue;
                }
            }
            if !registry.is_input(&var.ty) {
                errors.push(
                    Error::validation(format!("variable ${} has output type {}", var.name, var.ty))
                        .at(var.pos),
                );
                continue;
            }
            if let Some(default) = var.default.as_mut() {
                if contains_var(default) {
                    errors.push(
                        Error::validation(format!(
                            "default of ${} can not use a variable",
                            var.name
                        ))
                        .at(var.pos),
                    );
                    continue;
                }
                match coercion.coerce_in(&var.ty, default) {
                    Ok(coerced) => *default = coerced,
                    Err(e) => errors.push(
                        Error::coerce(format!("default of ${}: {}", var.name, e.message))
                            .at(var.pos),
                    ),
                }
            }
        }
        check_selections(registry, &mut op.selections, &mut errors);
    }

    for fragment in doc.fragments_mut() {
        match registry.get_type(&fragment.condition) {
            None => errors.push(
                Error::validation(format!(
                    "type {} in fragment {} is not defined",
                    fragment.condition, fragment.name
                ))
                .at(fragment.pos),
            ),
            Some(ty) if !ty.is_composite() => errors.push(
                Error::validation(format!(
                    "fragment {} can not be on non-composite type {}",
                    fragment.name, fragment.condition
                ))
                .at(fragment.pos),
            ),
            Some(_) => {}
        }
        check_directive_uses(
            registry,
            &mut fragment.directives,
            DirectiveLocation::FragmentDefinition,
            true,
            &mut errors,
        );
        check_selections(registry, &mut fragment.selections, &mut errors);
    }

    check_fragment_cycles(doc, &mut errors);
    tracing::debug!(errors = errors.len(), "executable validated");
    errors.into_result(())
}

fn check_selections(registry: &Registry, selections: &mut [Selection], errors: &mut Errors) {
    for selection in selections {
        match selection {
            Selection::Field(field) => {
                check_directive_uses(
                    registry,
                    &mut field.directives,
                    DirectiveLocation::Field,
                    true,
                    errors,
                );
                check_selections(registry, &mut field.selections, errors);
            }
            Selection::Inline(inline) => {
                if let Some(condition) = &inline.condition {
                    check_condition(registry.get_type(condition), condition, inline.pos, errors);
                }
                check_directive_uses(
                    registry,
                    &mut inline.directives,
                    DirectiveLocation::InlineFragment,
                    true,
                    errors,
                );
                check_selections(registry, &mut inline.selections, errors);
            }
            Selection::FragRef(spread) => check_directive_uses(
                registry,
                &mut spread.directives,
                DirectiveLocation::FragmentSpread,
                true,
                errors,
            ),
        }
    }
}

fn check_condition(ty: Option<&Type>, name: &str, pos: Pos, errors: &mut Errors) {
    match ty {
        None => errors.push(Error::validation(format!("type {name} is not defined")).at(pos)),
        Some(ty) if !ty.is_composite() => errors.push(
            Error::validation(format!(
                "inline fragment can not be on non-composite type {name}"
            ))
            .at(pos),
        ),
        Some(_) => {}
    }
}

/// Collects the fragments spread directly or through nested selections.
fn spreads(selections: &[Selection], out: &mut Vec<FragmentId>) {
    for selection in selections {
        match selection {
            Selection::Field(f) => spreads(&f.selections, out),
            Selection::Inline(i) => spreads(&i.selections, out),
            Selection::FragRef(r) => out.push(r.fragment),
        }
    }
}

/// Rejects fragments that spread themselves. Each cycle is reported once,
/// from the fragment with the smallest name on it.
fn check_fragment_cycles(doc: &Executable, errors: &mut Errors) {
    for (id, fragment) in doc.fragments() {
        let mut path = vec![fragment.name.clone()];
        let mut visited = FxHashSet::default();
        if let Some(cycle) = find_cycle(doc, id, id, &mut path, &mut visited) {
            errors.push(Error::validation(format!("fragment cycle {cycle}")).at(fragment.pos));
        }
    }
}

fn find_cycle(
    doc: &Executable,
    start: FragmentId,
    current: FragmentId,
    path: &mut Vec<String>,
    visited: &mut FxHashSet<FragmentId>,
) -> Option<String> {
    if !visited.insert(current) {
        return None;
    }
    let start_name = &doc.fragment(start).name;
    let mut next = Vec::new();
    spreads(&doc.fragment(current).selections, &mut next);
    for id in next {
        let name = &doc.fragment(id).name;
        if id == start {
            return Some(format!("{}->{start_name}", path.join("->")));
        }
        if name > start_name {
            path.push(name.clone());
            if let Some(cycle) = find_cycle(doc, start, id, path, visited) {
                return Some(cycle);
            }
            path.pop();
        }
    }
    None
}
