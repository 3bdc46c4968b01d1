//! Shared base types for the phlint analyzer.
//!
//! This crate sits at the bottom of the dependency chain:
//!
//! ```text
//! common (base layer)
//!   ↓
//! ast → meta → solver
//! ```
//!
//! No crate in the workspace may depend on one that appears later in this
//! chain.

pub mod diagnostics;
pub mod span;

pub use diagnostics::{Diagnostic, Severity};
pub use span::Span;
