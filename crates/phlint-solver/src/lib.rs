//! Expression type solver for the phlint analyzer.
//!
//! Given parsed files and a symbol index, this crate deduces the set of
//! possible runtime types for every expression:
//!
//! - [`typestr`]: the textual type grammar shared by doc comments and
//!   native hints;
//! - [`normalize`]: alias folding, array rewriting, nullable lowering;
//! - [`phpdoc`]: structured doc-comment extraction;
//! - [`exprtype`]: the inference engine that walks bodies and records
//!   lazy type terms;
//! - [`resolve`]: evaluation of lazy terms against the finished index;
//! - [`solver`]: the two-phase coordinator owning the index.

pub mod exprtype;
pub mod normalize;
pub mod phpdoc;
pub mod resolve;
pub mod solver;
pub mod typestr;

pub use resolve::{Resolution, resolve_query, resolve_types};
pub use solver::Solver;
