//! Syntax layer for graft.
//!
//! This crate provides:
//! - `class`: Byte character classes shared by both grammars
//! - `lexer`: Byte-at-a-time reader with line/column tracking
//! - `value`: The literal value reader used for defaults and arguments
//! - `location`: Directive locations

pub mod class;
pub mod lexer;
pub mod location;
pub mod value;

pub use lexer::Lexer;
pub use location::DirectiveLocation;
pub use value::read_value;
