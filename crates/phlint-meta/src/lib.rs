//! Type sets, lazy type terms and symbol tables for the phlint solver.
//!
//! This crate provides the solver's data model:
//! - [`TypeSet`]: the universal value: an unordered set of type atoms plus
//!   a precision flag;
//! - [`LazyType`]: unresolved type terms with a compact textual encoding,
//!   cheap enough to store inside symbol tables;
//! - [`SymbolIndex`]: classes, functions and constants accumulated during
//!   indexing and read-shared during resolution;
//! - [`Scope`]: per-function variable records used by the inference engine.

pub mod lazy;
pub mod scope;
pub mod symbols;
pub mod types;

pub use lazy::LazyType;
pub use scope::{Scope, VarInfo};
pub use symbols::{
    ClassFlags, ClassInfo, ConstInfo, ConstantInfo, FuncFlags, FunctionInfo, ParamInfo, PropFlags,
    PropertyInfo, SymbolIndex,
};
pub use types::TypeSet;
