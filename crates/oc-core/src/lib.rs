//! Core data structures for the languageO compiler: the AST produced by the
//! parser and the semantic type system built on top of it.
//!
//! This crate has no knowledge of lexing, parsing, analysis, or code
//! generation; it only defines the tree shape and type vocabulary that the
//! rest of the pipeline operates over.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod ast;
pub mod span;
pub mod types;

pub use ast::{NodeId, NodeIdGen};
pub use span::{Position, Span};
pub use types::{SemanticType, TypeKind};
