//! PHP abstract syntax tree consumed by the phlint solver.
//!
//! The tree is produced by the parser (outside this workspace) and read by
//! the indexer and the inference engine. Node kinds are plain tagged sums so
//! that a `match` over them is exhaustive: adding a node kind breaks every
//! consumer at compile time instead of silently falling through a virtual
//! dispatch.
//!
//! Every statement and declaration carries a [`Span`] and, where the grammar
//! allows one, the raw text of the doc comment that floated above it. Doc
//! comments are kept verbatim; interpreting them is the solver's job.

pub mod ast;

pub use ast::*;
