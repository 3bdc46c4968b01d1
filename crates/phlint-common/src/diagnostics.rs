//! Diagnostics emitted by the analyzer core.
//!
//! The solver never fails on user input; problems it notices while indexing
//! or resolving (malformed doc comments, references to unknown symbols) are
//! recorded as diagnostics and routed to the caller. Rendering and filtering
//! belong to the reporter layer, outside this workspace.

use crate::span::Span;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Notice,
}

/// A single problem found in one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable check name, e.g. `phpdocLint` or `undefinedFunction`.
    pub check: &'static str,
    pub file: String,
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(
        check: &'static str,
        file: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            check,
            file: file.into(),
            span,
            message: message.into(),
        }
    }

    pub fn notice(
        check: &'static str,
        file: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            severity: Severity::Notice,
            check,
            file: file.into(),
            span,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_severity() {
        let w = Diagnostic::warning("undefinedFunction", "a.php", Span::new(0, 3), "boom");
        assert_eq!(w.severity, Severity::Warning);
        assert_eq!(w.check, "undefinedFunction");

        let n = Diagnostic::notice("phpdocLint", "a.php", Span::dummy(), "odd tag");
        assert_eq!(n.severity, Severity::Notice);
    }
}
