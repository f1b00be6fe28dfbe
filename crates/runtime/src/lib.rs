//! Cb runtime: the value model, scope store, managers, expression evaluator,
//! statement executor, and preprocessor that together form the semantic
//! evaluation core of the Cb interpreter.
//!
//! # Modules
//!
//! - `value`: the `Variable` value cell and its `ArrayPayload`.
//! - `typed_value`: `TypedValue`, the evaluator's currency.
//! - `numeric`: promotion, unsigned clamping, range checks, pointer sizing.
//! - `scope`: the stacked scope store plus static/impl-static tiers.
//! - `type_manager`: typedef resolution and union allow-sets.
//! - `struct_manager`: struct registry, recursion validation, nested/flat sync.
//! - `interface_manager`: impl registry and interface-view construction.
//! - `enum_manager`: enum registry and variant lookup.
//! - `array_memory`: the optional fixed-capacity external-array handle table.
//! - `variable_manager`: declaration/assignment/parameter-binding operations.
//! - `evaluator`: the typed-expression evaluator.
//! - `executor`: the statement executor and `ControlFlow`.
//! - `preprocessor`: directive scanning and macro expansion.
//! - `interpreter`: `Engine`, the glue struct owning every manager.

pub mod array_memory;
pub mod enum_manager;
pub mod evaluator;
pub mod executor;
pub mod interface_manager;
pub mod interpreter;
pub mod numeric;
pub mod preprocessor;
pub mod scope;
pub mod struct_manager;
pub mod type_manager;
pub mod typed_value;
pub mod value;
pub mod variable_manager;

pub use executor::ControlFlow;
pub use interpreter::{Engine, HeapSlot};
pub use preprocessor::Preprocessor;
pub use scope::{Scope, ScopeStack};
pub use typed_value::TypedValue;
pub use value::{ArrayPayload, FunctionPointerValue, Variable};
