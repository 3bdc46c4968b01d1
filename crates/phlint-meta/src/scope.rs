//! Per-function variable scope used by the inference engine.
//!
//! The solver is not flow-sensitive: a scope is a flat map from variable
//! name to its current type set. Sequential reassignment replaces the
//! recorded type; assignments inside conditional branches are walked in a
//! cloned scope that is unioned back into the parent afterwards.
//!
//! The `no_replace` flag marks variables whose type came from a `@var`
//! annotation on a local: later assignments union into the annotated type
//! instead of overwriting it.

use crate::types::TypeSet;
use rustc_hash::FxHashMap;

#[derive(Clone, Debug, Default)]
pub struct VarInfo {
    pub typ: TypeSet,
    pub no_replace: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Scope {
    vars: FxHashMap<String, VarInfo>,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    pub fn get(&self, name: &str) -> Option<&VarInfo> {
        self.vars.get(name)
    }

    pub fn get_type(&self, name: &str) -> Option<&TypeSet> {
        self.vars.get(name).map(|v| &v.typ)
    }

    /// Bind `name`, replacing any previous type, unless the variable is
    /// flagged `no_replace`, in which case the new type unions in.
    pub fn replace_var(&mut self, name: &str, typ: TypeSet) {
        match self.vars.get_mut(name) {
            Some(var) if var.no_replace => var.typ.union(&typ),
            Some(var) => var.typ = typ,
            None => {
                self.vars.insert(name.to_string(), VarInfo {
                    typ,
                    no_replace: false,
                });
            }
        }
    }

    /// Union `typ` into `name`'s recorded type, binding it if unknown.
    pub fn union_var(&mut self, name: &str, typ: &TypeSet) {
        match self.vars.get_mut(name) {
            Some(var) => var.typ.union(typ),
            None => {
                self.vars.insert(name.to_string(), VarInfo {
                    typ: typ.clone(),
                    no_replace: false,
                });
            }
        }
    }

    /// Bind `name` from a `@var` annotation: unions into any existing type
    /// and pins the variable so later assignments union too.
    pub fn annotate_var(&mut self, name: &str, typ: &TypeSet) {
        let var = self.vars.entry(name.to_string()).or_default();
        var.typ.union(typ);
        var.no_replace = true;
    }

    /// Union every binding of `branch` back into `self`. Used after walking
    /// a conditional branch in a cloned scope.
    pub fn absorb_branch(&mut self, branch: Scope) {
        for (name, info) in branch.vars {
            match self.vars.get_mut(&name) {
                Some(var) => {
                    var.typ.union(&info.typ);
                    var.no_replace |= info.no_replace;
                }
                None => {
                    self.vars.insert(name, info);
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VarInfo)> {
        self.vars.iter().map(|(name, var)| (name.as_str(), var))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_reassignment_replaces() {
        let mut scope = Scope::new();
        scope.replace_var("x", TypeSet::imprecise("string"));
        scope.replace_var("x", TypeSet::imprecise("int"));
        assert!(scope.get_type("x").unwrap().is("int"));
    }

    #[test]
    fn test_annotated_local_unions_instead() {
        let mut scope = Scope::new();
        scope.annotate_var("x", &TypeSet::imprecise("string"));
        scope.replace_var("x", TypeSet::imprecise("int"));
        assert_eq!(scope.get_type("x").unwrap().to_string(), "int|string");
    }

    #[test]
    fn test_branch_assignment_unions_into_parent() {
        let mut scope = Scope::new();
        scope.replace_var("x", TypeSet::imprecise("int"));

        let mut branch = scope.clone();
        branch.replace_var("x", TypeSet::imprecise("float"));
        branch.replace_var("only_in_branch", TypeSet::imprecise("bool"));
        scope.absorb_branch(branch);

        assert_eq!(scope.get_type("x").unwrap().to_string(), "float|int");
        assert!(scope.get_type("only_in_branch").unwrap().is("bool"));
    }

    #[test]
    fn test_union_var_creates_missing_binding() {
        let mut scope = Scope::new();
        scope.union_var("a", &TypeSet::imprecise("int[]"));
        scope.union_var("a", &TypeSet::imprecise("string[]"));
        assert_eq!(scope.get_type("a").unwrap().to_string(), "int[]|string[]");
    }
}
