//! The solver's universal value: a set of type atoms plus a precision flag.
//!
//! Atoms are short strings: scalar keywords (`int`, `null`, `mixed`, ...),
//! suffix arrays (`int[][]`), fully qualified class names (`\Foo\Bar`),
//! the internal `empty_array` sentinel, and encoded lazy terms (see
//! [`crate::lazy`]). The set is unordered; printing sorts atoms so output
//! is deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The internal atom produced by an empty array literal. Lowered to
/// `mixed[]` during final resolution.
pub const EMPTY_ARRAY: &str = "empty_array";

/// Atom count cap per set. Inserting past the cap collapses the excess
/// into `mixed`.
pub const MAX_ATOMS: usize = 64;

/// An unordered set of type atoms with a precision flag.
///
/// Precision is monotone: a set is precise only while every atom added to
/// it came from direct observation (a literal, a cast, an explicit `new`).
/// Adding a single declared or lazy atom makes the whole set imprecise and
/// nothing can make it precise again.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSet {
    atoms: BTreeSet<String>,
    imprecise: bool,
}

impl TypeSet {
    /// The empty set. Empty sets are vacuously precise so that union works
    /// as a fold.
    pub fn new() -> Self {
        TypeSet::default()
    }

    /// A one-atom set produced by direct observation.
    pub fn precise(atom: impl Into<String>) -> Self {
        let mut set = TypeSet::new();
        set.insert(atom);
        set
    }

    /// A one-atom set produced by declaration or inference.
    pub fn imprecise(atom: impl Into<String>) -> Self {
        let mut set = TypeSet::precise(atom);
        set.imprecise = true;
        set
    }

    /// The `mixed` singleton (always imprecise).
    pub fn mixed() -> Self {
        TypeSet::imprecise("mixed")
    }

    /// An imprecise set over several atoms.
    pub fn from_atoms<I, S>(atoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = TypeSet::new();
        for atom in atoms {
            set.insert(atom);
        }
        set.imprecise = true;
        set
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn contains(&self, atom: &str) -> bool {
        self.atoms.contains(atom)
    }

    /// True when the set is exactly `{atom}`.
    pub fn is(&self, atom: &str) -> bool {
        self.atoms.len() == 1 && self.atoms.contains(atom)
    }

    pub fn is_precise(&self) -> bool {
        !self.imprecise
    }

    pub fn mark_imprecise(&mut self) {
        self.imprecise = true;
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.atoms.iter().map(String::as_str)
    }

    /// Insert one atom, preserving the current precision.
    ///
    /// Past [`MAX_ATOMS`] the insert degrades to `mixed`: pathological
    /// unions stop growing instead of taking the analysis down with them.
    pub fn insert(&mut self, atom: impl Into<String>) {
        let atom = atom.into();
        if atom.is_empty() {
            return;
        }
        if self.atoms.len() >= MAX_ATOMS && !self.atoms.contains(&atom) {
            self.atoms.insert("mixed".to_string());
            self.imprecise = true;
            return;
        }
        self.atoms.insert(atom);
    }

    /// Insert one atom and make the set imprecise.
    pub fn insert_imprecise(&mut self, atom: impl Into<String>) {
        self.insert(atom);
        self.imprecise = true;
    }

    /// Union `other` into `self`. The result is precise only when both
    /// sides were.
    pub fn union(&mut self, other: &TypeSet) {
        for atom in other.iter() {
            self.insert(atom);
        }
        self.imprecise |= other.imprecise;
    }

    /// Consuming union, convenient in fold positions.
    pub fn united(mut self, other: &TypeSet) -> TypeSet {
        self.union(other);
        self
    }

    /// Serialization used by tests and debug output: sorted atoms joined
    /// with `|`, prefixed with `precise ` when the set is precise.
    pub fn test_string(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let joined = self.to_string();
        if self.is_precise() {
            format!("precise {joined}")
        } else {
            joined
        }
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for atom in &self.atoms {
            if !first {
                f.write_str("|")?;
            }
            first = false;
            f.write_str(atom)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a TypeSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.atoms.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_is_commutative() {
        let a = TypeSet::from_atoms(["int", "string"]);
        let b = TypeSet::from_atoms(["string", "bool"]);
        let ab = a.clone().united(&b);
        let ba = b.united(&a);
        assert_eq!(ab, ba);
        assert_eq!(ab.to_string(), "bool|int|string");
    }

    #[test]
    fn test_precision_is_monotone() {
        let mut set = TypeSet::precise("int");
        assert!(set.is_precise());
        set.union(&TypeSet::precise("string"));
        assert!(set.is_precise());
        set.union(&TypeSet::imprecise("bool"));
        assert!(!set.is_precise());
        // Nothing makes it precise again.
        set.union(&TypeSet::precise("float"));
        assert!(!set.is_precise());
    }

    #[test]
    fn test_empty_set_is_union_identity() {
        let precise = TypeSet::precise("int");
        let merged = TypeSet::new().united(&precise);
        assert_eq!(merged, precise);
        assert!(merged.is_precise());
    }

    #[test]
    fn test_atom_cap_collapses_to_mixed() {
        let mut set = TypeSet::new();
        for i in 0..MAX_ATOMS {
            set.insert(format!("\\C{i}"));
        }
        assert_eq!(set.len(), MAX_ATOMS);
        set.insert("\\Overflow");
        assert!(set.contains("mixed"));
        assert!(!set.contains("\\Overflow"));
        assert!(!set.is_precise());
    }

    #[test]
    fn test_test_string_prefixes_precise() {
        assert_eq!(TypeSet::precise("int").test_string(), "precise int");
        assert_eq!(TypeSet::imprecise("int").test_string(), "int");
        assert_eq!(TypeSet::new().test_string(), "");
    }

    #[test]
    fn test_mixed_is_not_dropped_in_unions() {
        let mut set = TypeSet::imprecise("int");
        set.union(&TypeSet::mixed());
        assert_eq!(set.to_string(), "int|mixed");
    }
}
