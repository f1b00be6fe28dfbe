//! Cb core: the AST, type descriptors, and error taxonomy shared between
//! the interpreter runtime and its CLI host.
//!
//! # Modules
//!
//! - `ast`: the tagged node set consumed by the evaluator/executor.
//! - `types`: `TypeInfo`, `ArrayTypeInfo`, qualifiers, numeric promotion.
//! - `error`: the `CbError` taxonomy every fallible core operation returns.
//! - `diagnostics`: `tracing`-based logging setup for the CLI.

pub mod ast;
pub mod diagnostics;
pub mod error;
pub mod types;

pub use ast::{AstNode, BinOp, SizeofOperand, SourceLocation, UnOp};
pub use error::{CbError, CbErrorKind, CbResult};
pub use types::{ArrayTypeInfo, Dimension, InferredType, TypeInfo, TypeQualifiers};
