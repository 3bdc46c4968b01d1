//! Symbol records and the index that stores them.
//!
//! The index is built by the indexer during the discovery pass and becomes
//! read-only once indexing completes; the resolver only ever looks symbols
//! up. Records are addressed by fully qualified name: names are the stable
//! identity that survives the two-phase protocol, so lazy terms store
//! names, never pointers into the index.
//!
//! All records derive the serde traits: external tooling caches the index
//! between runs.

use crate::types::TypeSet;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    #[derive(Default, Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
    pub struct ClassFlags: u8 {
        /// Synthetic class backing an anonymous shape or tuple. Member
        /// access on these yields `mixed`; fields are reached by index.
        const SHAPE = 1 << 0;
        const INTERFACE = 1 << 1;
        const ABSTRACT = 1 << 2;
    }
}

bitflags::bitflags! {
    #[derive(Default, Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
    pub struct FuncFlags: u8 {
        const STATIC = 1 << 0;
        const ABSTRACT = 1 << 1;
        /// Declared by an `@method` annotation rather than real code.
        const FROM_ANNOTATION = 1 << 2;
    }
}

bitflags::bitflags! {
    #[derive(Default, Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
    pub struct PropFlags: u8 {
        /// Declared by an `@property` annotation rather than real code.
        const FROM_ANNOTATION = 1 << 0;
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParamInfo {
    pub name: String,
    /// Declared type: `@param` over native hint over default value.
    pub typ: TypeSet,
    pub by_ref: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FunctionInfo {
    /// FQN for free functions, bare name for methods.
    pub name: String,
    pub params: Vec<ParamInfo>,
    /// Merged return sources: `@return`, native hint, unified body
    /// returns. May contain lazy terms until resolved.
    pub typ: TypeSet,
    pub flags: FuncFlags,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PropertyInfo {
    pub typ: TypeSet,
    pub flags: PropFlags,
}

/// A class constant.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConstInfo {
    pub typ: TypeSet,
}

/// A file-scope constant.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConstantInfo {
    pub typ: TypeSet,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClassInfo {
    /// Fully qualified name, leading `\`.
    pub name: String,
    pub flags: ClassFlags,
    /// Parent class FQN. Stored by name; the chain is walked lazily so a
    /// parent indexed after its child still resolves.
    pub parent: Option<String>,
    /// Implemented (or extended, for interfaces) interface FQNs.
    pub interfaces: Vec<String>,
    /// Instance properties by bare name, static properties by `$name`.
    pub properties: FxHashMap<String, PropertyInfo>,
    pub methods: FxHashMap<String, FunctionInfo>,
    pub constants: FxHashMap<String, ConstInfo>,
}

impl ClassInfo {
    pub fn new(name: impl Into<String>) -> Self {
        ClassInfo {
            name: name.into(),
            ..ClassInfo::default()
        }
    }

    pub fn is_shape(&self) -> bool {
        self.flags.contains(ClassFlags::SHAPE)
    }

    pub fn is_interface(&self) -> bool {
        self.flags.contains(ClassFlags::INTERFACE)
    }
}

/// Classes, functions and constants of the indexed program.
///
/// One index fragment is built per file worker during discovery; fragments
/// merge into the solver's index at the phase boundary. Merging overwrites
/// by FQN, which is what makes re-indexing a file idempotent.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SymbolIndex {
    pub classes: FxHashMap<String, ClassInfo>,
    pub functions: FxHashMap<String, FunctionInfo>,
    pub constants: FxHashMap<String, ConstantInfo>,
    /// Top-level variable assignments, by name without `$`. Consulted by
    /// `global $v;` imports.
    pub globals: FxHashMap<String, TypeSet>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        SymbolIndex::default()
    }

    pub fn get_class(&self, fqn: &str) -> Option<&ClassInfo> {
        self.classes.get(fqn)
    }

    pub fn get_function(&self, fqn: &str) -> Option<&FunctionInfo> {
        self.functions.get(fqn)
    }

    pub fn get_constant(&self, fqn: &str) -> Option<&ConstantInfo> {
        self.constants.get(fqn)
    }

    pub fn get_global(&self, name: &str) -> Option<&TypeSet> {
        self.globals.get(name)
    }

    /// Merge a fragment into this index, overwriting on name collisions.
    pub fn merge(&mut self, fragment: SymbolIndex) {
        self.classes.extend(fragment.classes);
        self.functions.extend(fragment.functions);
        self.constants.extend(fragment.constants);
        self.globals.extend(fragment.globals);
    }

    pub fn len(&self) -> usize {
        self.classes.len() + self.functions.len() + self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overwrites_by_name() {
        let mut index = SymbolIndex::new();
        index.functions.insert(
            "\\f".into(),
            FunctionInfo {
                name: "\\f".into(),
                typ: TypeSet::imprecise("int"),
                ..FunctionInfo::default()
            },
        );

        let mut fragment = SymbolIndex::new();
        fragment.functions.insert(
            "\\f".into(),
            FunctionInfo {
                name: "\\f".into(),
                typ: TypeSet::imprecise("string"),
                ..FunctionInfo::default()
            },
        );
        index.merge(fragment);

        assert!(index.get_function("\\f").unwrap().typ.is("string"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_index_roundtrips_through_serde() {
        let mut index = SymbolIndex::new();
        let mut class = ClassInfo::new("\\Foo");
        class.flags = ClassFlags::ABSTRACT;
        class.parent = Some("\\Base".into());
        class.properties.insert(
            "x".into(),
            PropertyInfo {
                typ: TypeSet::imprecise("float"),
                flags: PropFlags::empty(),
            },
        );
        index.classes.insert("\\Foo".into(), class);
        index
            .globals
            .insert("ints".into(), TypeSet::imprecise("int[]"));

        let json = serde_json::to_string(&index).unwrap();
        let back: SymbolIndex = serde_json::from_str(&json).unwrap();
        let foo = back.get_class("\\Foo").unwrap();
        assert_eq!(foo.flags, ClassFlags::ABSTRACT);
        assert_eq!(foo.parent.as_deref(), Some("\\Base"));
        assert!(foo.properties["x"].typ.is("float"));
        assert!(back.get_global("ints").unwrap().is("int[]"));
    }
}
