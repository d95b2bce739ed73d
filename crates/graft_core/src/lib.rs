//! Core types for graft.
//!
//! This crate provides foundational types used throughout graft:
//! - `pos`: Source location tracking
//! - `error`: The error taxonomy and error collections
//! - `value`: The dynamic value model shared by parsing, coercion and execution

pub mod error;
pub mod pos;
pub mod value;

pub use error::{Error, ErrorKind, Errors, PathSegment, Result, Severity};
pub use pos::Pos;
pub use value::{Map, Value, WriteOptions};
