//! The two-phase coordinator.
//!
//! A [`Solver`] owns the symbol index and drives the protocol:
//!
//! 1. **Discovery**: every file is indexed; lazy terms reference symbols
//!    that may not exist yet. Files are independent, so discovery may run
//!    file-parallel: each worker writes to its own fragment, and fragments
//!    merge into the index under a single mutex at the phase boundary.
//! 2. **Resolution**: [`Solver::finalize`] raises the indexing-complete
//!    flag; the same files are indexed once more (idempotent: identical
//!    lazy terms overwrite themselves), and from then on the index is
//!    immutable. Queries borrow the solver shared and take no locks.
//!
//! All indexing state lives in the solver value. There are no process-wide
//! singletons; two solvers never interfere.

use crate::exprtype;
use crate::resolve::{self, Resolution};
use phlint_ast::File;
use phlint_common::Diagnostic;
use phlint_meta::{SymbolIndex, TypeSet};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
pub struct Solver {
    index: SymbolIndex,
    indexing_complete: bool,
    diagnostics: Vec<Diagnostic>,
}

impl Solver {
    pub fn new() -> Self {
        Solver::default()
    }

    /// Index one file into the solver. Safe to call again for the same
    /// file: symbols are overwritten by fully qualified name.
    pub fn index_file(&mut self, file: &File) {
        let indexed = exprtype::index_file(file);
        self.diagnostics.extend(indexed.diagnostics);
        self.index.merge(indexed.symbols);
    }

    /// Index a batch of files, file-parallel. Workers build private
    /// fragments; the merge happens under one mutex at the end.
    pub fn index_files(&mut self, files: &[File]) {
        let merged = Mutex::new((SymbolIndex::new(), Vec::new()));
        files.par_iter().for_each(|file| {
            let indexed = exprtype::index_file(file);
            let mut guard = merged.lock().expect("index merge mutex poisoned");
            guard.0.merge(indexed.symbols);
            guard.1.extend(indexed.diagnostics);
        });
        let (symbols, diagnostics) = merged.into_inner().expect("index merge mutex poisoned");
        self.index.merge(symbols);
        self.diagnostics.extend(diagnostics);
        debug!(symbols = self.index.len(), "indexed file batch");
    }

    /// Raise the indexing-complete flag: discovery is over, the index is
    /// final after the resolution pass re-runs.
    pub fn finalize(&mut self) {
        self.indexing_complete = true;
    }

    pub fn is_indexing_complete(&self) -> bool {
        self.indexing_complete
    }

    pub fn index(&self) -> &SymbolIndex {
        &self.index
    }

    /// Resolve a (possibly lazy) type set to concrete atoms.
    ///
    /// `context_class` anchors late static binding; pass `""` outside class
    /// context. `visited` is the set of in-progress terms; empty for a
    /// fresh query.
    pub fn resolve_types(
        &self,
        context_class: &str,
        types: &TypeSet,
        visited: &mut FxHashSet<String>,
    ) -> TypeSet {
        resolve::resolve_types(&self.index, context_class, types, visited)
    }

    /// Like [`Solver::resolve_types`], with reference diagnostics attached.
    pub fn resolve_query(
        &self,
        context_class: &str,
        types: &TypeSet,
        visited: &mut FxHashSet<String>,
    ) -> Resolution {
        resolve::resolve_query(&self.index, context_class, types, visited)
    }

    /// Whether every atom of the recorded set came from direct observation.
    pub fn is_precise(&self, types: &TypeSet) -> bool {
        types.is_precise()
    }

    /// Drain diagnostics accumulated while indexing.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phlint_ast::{Decl, Expr, ExprKind, FuncDecl, Stmt, StmtKind};
    use phlint_common::Span;
    use phlint_meta::LazyType;

    fn return_int_file(path: &str, func: &str) -> File {
        let mut file = File::new(path);
        file.decls.push(Decl::Function(FuncDecl {
            name: func.to_string(),
            params: Vec::new(),
            return_hint: None,
            doc: None,
            body: Some(vec![Stmt::new(StmtKind::Return(Some(Expr::new(
                ExprKind::IntLit(10),
            ))))]),
            span: Span::dummy(),
        }));
        file
    }

    #[test]
    fn test_two_phase_indexing_is_idempotent() {
        let files = vec![
            return_int_file("a.php", "a"),
            return_int_file("b.php", "b"),
        ];
        let mut solver = Solver::new();
        solver.index_files(&files);
        let discovery = solver.index.get_function("\\a").unwrap().typ.clone();

        solver.finalize();
        assert!(solver.is_indexing_complete());
        solver.index_files(&files);
        let resolution = solver.index.get_function("\\a").unwrap().typ.clone();

        assert_eq!(discovery, resolution);
    }

    #[test]
    fn test_forward_reference_resolves_after_discovery() {
        // caller.php is indexed before callee.php exists in the index.
        let mut caller = File::new("caller.php");
        caller.decls.push(Decl::Function(FuncDecl {
            name: "caller".to_string(),
            params: Vec::new(),
            return_hint: None,
            doc: None,
            body: Some(vec![Stmt::new(StmtKind::Return(Some(Expr::new(
                ExprKind::Call {
                    name: "callee".to_string(),
                    args: Vec::new(),
                },
            ))))]),
            span: Span::dummy(),
        }));
        let callee = return_int_file("callee.php", "callee");

        let mut solver = Solver::new();
        solver.index_file(&caller);
        solver.index_file(&callee);
        solver.finalize();
        solver.index_file(&caller);
        solver.index_file(&callee);

        let typ = solver.index.get_function("\\caller").unwrap().typ.clone();
        let mut visited = FxHashSet::default();
        let resolved = solver.resolve_types("", &typ, &mut visited);
        assert_eq!(resolved.to_string(), "int");
        assert!(!resolved.is_precise());
    }

    #[test]
    fn test_parallel_and_serial_discovery_agree() {
        let files: Vec<File> = (0..32)
            .map(|i| return_int_file(&format!("f{i}.php"), &format!("f{i}")))
            .collect();

        let mut parallel = Solver::new();
        parallel.index_files(&files);

        let mut serial = Solver::new();
        for file in &files {
            serial.index_file(file);
        }

        for i in 0..32 {
            let name = format!("\\f{i}");
            let a = &parallel.index.get_function(&name).unwrap().typ;
            let b = &serial.index.get_function(&name).unwrap().typ;
            assert_eq!(a, b, "{name}");
        }
    }

    #[test]
    fn test_is_precise_queries_the_recorded_flag() {
        let solver = Solver::new();
        assert!(solver.is_precise(&TypeSet::precise("int")));
        assert!(!solver.is_precise(&TypeSet::imprecise(
            LazyType::CallResult("\\f".into()).encode()
        )));
    }
}
