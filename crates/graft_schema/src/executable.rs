//! Executable documents: operations, selections and fragments.
//!
//! Fragments live in an arena owned by the [`Executable`]. A spread holds a
//! [`FragmentId`] rather than a copy, so an edit made through
//! [`Executable::fragment_mut`] is seen at every spread.

use crate::types::{DirectiveUse, TypeRef};
use graft_core::{Error, Map, Pos, Result, Value};
use graft_syntax::DirectiveLocation;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// The kind of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Query,
    Mutation,
    Subscription,
}

impl OpKind {
    /// Returns the keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }

    /// Parses a keyword.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "query" => Some(Self::Query),
            "mutation" => Some(Self::Mutation),
            "subscription" => Some(Self::Subscription),
            _ => None,
        }
    }

    /// Returns the root type name used when there is no `schema` declaration.
    #[must_use]
    pub const fn default_root(self) -> &'static str {
        match self {
            Self::Query => "Query",
            Self::Mutation => "Mutation",
            Self::Subscription => "Subscription",
        }
    }

    /// Returns the directive location of the operation.
    #[must_use]
    pub const fn location(self) -> DirectiveLocation {
        match self {
            Self::Query => DirectiveLocation::Query,
            Self::Mutation => DirectiveLocation::Mutation,
            Self::Subscription => DirectiveLocation::Subscription,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A variable definition, `$name: Type = default`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDef {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<Value>,
    pub directives: Vec<DirectiveUse>,
    pub pos: Pos,
}

/// An operation.
#[derive(Debug, Clone)]
pub struct Op {
    pub kind: OpKind,
    /// Empty for an anonymous operation.
    pub name: String,
    pub vars: IndexMap<String, VarDef>,
    pub directives: Vec<DirectiveUse>,
    pub selections: Vec<Selection>,
    pub pos: Pos,
}

/// Arguments of a field matched against its definition. Built once per
/// field and parent type on first resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgPlan {
    /// `(name, literal)` in definition order. The literal is `None` when the
    /// request did not supply the argument.
    pub order: Vec<(String, Option<Value>)>,
    /// Supplied names the definition does not declare.
    pub unknown: Vec<String>,
}

/// Argument plans of one field, keyed by the parent type they were built
/// against. Implementors of an interface may declare different arguments
/// for the same field.
#[derive(Debug, Default)]
pub struct PlanCache {
    plans: RwLock<FxHashMap<String, Arc<ArgPlan>>>,
}

impl PlanCache {
    /// Returns the plan for `parent`, building it on first use. The flag is
    /// true when the plan was built by this call.
    pub fn get_or_build(
        &self,
        parent: &str,
        build: impl FnOnce() -> ArgPlan,
    ) -> (Arc<ArgPlan>, bool) {
        let cached = self
            .plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(parent)
            .cloned();
        if let Some(plan) = cached {
            return (plan, false);
        }
        let mut plans = self.plans.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(plan) = plans.get(parent) {
            return (Arc::clone(plan), false);
        }
        let plan = Arc::new(build());
        plans.insert(parent.to_string(), Arc::clone(&plan));
        (plan, true)
    }

    /// Returns the number of parent types with a plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if no plan was built yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for PlanCache {
    fn clone(&self) -> Self {
        let plans = self.plans.read().unwrap_or_else(PoisonError::into_inner).clone();
        Self {
            plans: RwLock::new(plans),
        }
    }
}

/// A field selection.
#[derive(Debug, Clone)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub args: Map,
    pub directives: Vec<DirectiveUse>,
    pub selections: Vec<Selection>,
    pub pos: Pos,
    /// Argument plans, filled by the executor on first use.
    pub plans: PlanCache,
}

impl Field {
    /// Creates a field with no arguments or sub-selections.
    pub fn new(name: impl Into<String>, pos: Pos) -> Self {
        Self {
            alias: None,
            name: name.into(),
            args: Map::new(),
            directives: Vec::new(),
            selections: Vec::new(),
            pos,
            plans: PlanCache::default(),
        }
    }

    /// Returns the key the field's value is stored under in a response.
    #[must_use]
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// An inline fragment, `... on Type { ... }`.
#[derive(Debug, Clone)]
pub struct InlineFragment {
    pub condition: Option<String>,
    pub directives: Vec<DirectiveUse>,
    pub selections: Vec<Selection>,
    pub pos: Pos,
}

/// Handle to a fragment in an [`Executable`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentId(u32);

impl FragmentId {
    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A fragment spread, `...Name`.
#[derive(Debug, Clone)]
pub struct FragRef {
    pub fragment: FragmentId,
    pub name: String,
    pub directives: Vec<DirectiveUse>,
    pub pos: Pos,
}

/// A selection.
#[derive(Debug, Clone)]
pub enum Selection {
    Field(Field),
    Inline(InlineFragment),
    FragRef(FragRef),
}

impl Selection {
    /// Returns the directives on the selection.
    #[must_use]
    pub fn directives(&self) -> &[DirectiveUse] {
        match self {
            Self::Field(f) => &f.directives,
            Self::Inline(i) => &i.directives,
            Self::FragRef(r) => &r.directives,
        }
    }

    /// Returns the position of the selection.
    #[must_use]
    pub fn pos(&self) -> Pos {
        match self {
            Self::Field(f) => f.pos,
            Self::Inline(i) => i.pos,
            Self::FragRef(r) => r.pos,
        }
    }
}

/// A named fragment definition.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub name: String,
    pub condition: String,
    pub directives: Vec<DirectiveUse>,
    pub selections: Vec<Selection>,
    /// Position of the definition, or of the first spread while undefined.
    pub pos: Pos,
    /// False while the fragment is only a forward-referenced placeholder.
    pub defined: bool,
}

/// A parsed request document.
#[derive(Debug, Clone, Default)]
pub struct Executable {
    pub ops: IndexMap<String, Op>,
    fragments: Vec<Fragment>,
    fragment_ids: IndexMap<String, FragmentId>,
}

impl Executable {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fragment by handle.
    #[must_use]
    pub fn fragment(&self, id: FragmentId) -> &Fragment {
        &self.fragments[id.index()]
    }

    /// Returns a fragment by handle for editing.
    pub fn fragment_mut(&mut self, id: FragmentId) -> &mut Fragment {
        &mut self.fragments[id.index()]
    }

    /// Looks up a fragment handle by name.
    #[must_use]
    pub fn fragment_id(&self, name: &str) -> Option<FragmentId> {
        self.fragment_ids.get(name).copied()
    }

    /// Iterates over fragments in first-mention order.
    pub fn fragments(&self) -> impl Iterator<Item = (FragmentId, &Fragment)> {
        self.fragments
            .iter()
            .enumerate()
            .map(|(i, f)| (FragmentId(u32::try_from(i).unwrap_or(u32::MAX)), f))
    }

    /// Returns the handle for `name`, creating an undefined placeholder
    /// if the name has not been seen yet.
    pub fn fragment_slot(&mut self, name: &str, pos: Pos) -> FragmentId {
        if let Some(id) = self.fragment_ids.get(name) {
            return *id;
        }
        let id = FragmentId(u32::try_from(self.fragments.len()).unwrap_or(u32::MAX));
        self.fragments.push(Fragment {
            name: name.to_string(),
            condition: String::new(),
            directives: Vec::new(),
            selections: Vec::new(),
            pos,
            defined: false,
        });
        self.fragment_ids.insert(name.to_string(), id);
        id
    }

    pub(crate) fn fragments_mut(&mut self) -> &mut [Fragment] {
        &mut self.fragments
    }

    /// Picks the operation to run: the named one, or the only one.
    pub fn op(&self, name: Option<&str>) -> Result<&Op> {
        match name {
            Some(name) => self
                .ops
                .get(name)
                .ok_or_else(|| Error::not_found(format!("operation {name} not found"))),
            None if self.ops.len() == 1 => self
                .ops
                .values()
                .next()
                .ok_or_else(|| Error::not_found("no operation")),
            None if self.ops.is_empty() => Err(Error::not_found("document has no operations")),
            None => Err(Error::resolve(
                "an operation name is required when a document has more than one operation",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_key() {
        let mut field = Field::new("artist", Pos::start());
        assert_eq!(field.key(), "artist");
        field.alias = Some("a".into());
        assert_eq!(field.key(), "a");
    }

    #[test]
    fn test_fragment_slot_reuses_handle() {
        let mut doc = Executable::new();
        let a = doc.fragment_slot("Frag", Pos::new(1, 5));
        let b = doc.fragment_slot("Frag", Pos::new(9, 9));
        assert_eq!(a, b);
        assert!(!doc.fragment(a).defined);
        assert_eq!(doc.fragment(a).pos, Pos::new(1, 5));
    }

    #[test]
    fn test_op_selection() {
        let mut doc = Executable::new();
        assert!(doc.op(None).is_err());
        for name in ["A", "B"] {
            doc.ops.insert(
                name.to_string(),
                Op {
                    kind: OpKind::Query,
                    name: name.to_string(),
                    vars: IndexMap::new(),
                    directives: Vec::new(),
                    selections: Vec::new(),
                    pos: Pos::start(),
                },
            );
        }
        assert!(doc.op(None).is_err());
        assert_eq!(doc.op(Some("B")).unwrap().name, "B");
        assert!(doc.op(Some("C")).is_err());
    }

    #[test]
    fn test_plan_cache_per_parent() {
        let field = Field::new("name", Pos::start());
        let track = ArgPlan {
            order: vec![("short".to_string(), None)],
            unknown: Vec::new(),
        };

        let (plan, fresh) = field.plans.get_or_build("Track", || track.clone());
        assert!(fresh);
        assert_eq!(*plan, track);

        let (plan, fresh) = field.plans.get_or_build("Track", ArgPlan::default);
        assert!(!fresh);
        assert_eq!(*plan, track);

        let (plan, fresh) = field.plans.get_or_build("Clip", ArgPlan::default);
        assert!(fresh);
        assert!(plan.order.is_empty());
        assert_eq!(field.clone().plans.len(), 2);
    }
}
