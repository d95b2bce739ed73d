//! Schema layer for graft.
//!
//! This crate provides:
//! - `types`: The type system (named types, references, directives)
//! - `registry`: The transactional type registry
//! - `sdl` / `writer`: SDL parsing and canonical SDL output
//! - `executable` / `document`: Request documents and their parser
//! - `validate` / `exec_validate`: Schema and request validation
//! - `coerce` / `scalars`: Input and output coercion

pub mod builtins;
pub mod coerce;
pub mod document;
pub mod exec_validate;
pub mod executable;
pub mod registry;
pub mod scalars;
pub mod sdl;
pub mod types;
pub mod validate;
pub mod writer;

pub use builtins::IMPL_DIRECTIVE;
pub use coerce::{CoerceOptions, Coercion};
pub use document::{parse_executable, parse_executable_reader};
pub use exec_validate::validate_executable;
pub use executable::{
    ArgPlan, Executable, Field, FragRef, Fragment, FragmentId, InlineFragment, Op, OpKind,
    PlanCache, Selection, VarDef,
};
pub use registry::{BuiltinOptions, Registry};
pub use scalars::ScalarCoercer;
pub use sdl::{parse_sdl, SdlParser};
pub use types::{
    find_directive, Decl, Directive, DirectiveUse, EnumDef, EnumValue, FieldDef, InputDef,
    InputValue, ObjectDef, ScalarDef, SchemaDef, Type, TypeDef, TypeRef, UnionDef,
};
pub use validate::validate_schema;
pub use writer::SdlOptions;
