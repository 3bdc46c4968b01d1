//! Evaluation of lazy type terms against the finished symbol index.
//!
//! A resolution query takes a context class (the late-static-binding
//! anchor), a type set that may contain lazy terms, and the visited set of
//! terms currently on the resolution stack. Cycles contribute nothing:
//! mutual recursion terminates because every term enters the visited set
//! before its dependencies are chased, and the other branches of the union
//! fill in what the cyclic branch cannot.
//!
//! Resolution takes no locks and never mutates the index; after indexing
//! completes any number of queries may run concurrently.

use phlint_common::{Diagnostic, Span};
use phlint_meta::types::EMPTY_ARRAY;
use phlint_meta::{ClassInfo, FunctionInfo, LazyType, SymbolIndex, TypeSet};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use tracing::{debug, trace};

/// Resolution output: the concrete type set plus any reference diagnostics
/// produced along the way (unknown functions, methods, properties).
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub types: TypeSet,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve `types` to concrete atoms. `context_class` anchors `static`;
/// pass an empty string outside class context. `visited` carries the terms
/// already being resolved higher up the stack; pass an empty set for a
/// fresh query.
pub fn resolve_types(
    index: &SymbolIndex,
    context_class: &str,
    types: &TypeSet,
    visited: &mut FxHashSet<String>,
) -> TypeSet {
    resolve_query(index, context_class, types, visited).types
}

/// Like [`resolve_types`], but hands back reference diagnostics too.
pub fn resolve_query(
    index: &SymbolIndex,
    context_class: &str,
    types: &TypeSet,
    visited: &mut FxHashSet<String>,
) -> Resolution {
    let mut resolver = Resolver {
        index,
        visited,
        cache: FxHashMap::default(),
        diagnostics: Vec::new(),
    };
    let atoms = resolver.resolve_set(context_class, types);
    let types = finalize(atoms, types.is_precise());
    Resolution {
        types,
        diagnostics: resolver.diagnostics,
    }
}

/// Lower the `empty_array` sentinel: dropped when another array atom is
/// present, `mixed[]` when it is the only array-flavored member.
fn fix_empty_array(atoms: &mut BTreeSet<String>) {
    if !atoms.contains(EMPTY_ARRAY) {
        return;
    }
    atoms.remove(EMPTY_ARRAY);
    if !atoms.iter().any(|atom| atom.ends_with("[]")) {
        atoms.insert("mixed[]".to_string());
    }
}

/// Final fixes applied once per query: an empty result becomes `mixed`,
/// and the output is imprecise unless the input set was precise.
fn finalize(atoms: BTreeSet<String>, precise: bool) -> TypeSet {
    let mut out = TypeSet::new();
    for atom in atoms {
        out.insert(atom);
    }
    if out.is_empty() {
        out.insert("mixed");
        out.mark_imprecise();
    }
    if !precise {
        out.mark_imprecise();
    }
    out
}

struct Resolver<'a> {
    index: &'a SymbolIndex,
    visited: &'a mut FxHashSet<String>,
    /// Per-query memoization, keyed by (context, term, visited frame).
    cache: FxHashMap<u64, BTreeSet<String>>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Resolver<'a> {
    fn resolve_set(&mut self, ctx: &str, types: &TypeSet) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for atom in types.iter() {
            out.extend(self.resolve_atom(ctx, atom));
        }
        // The empty-array fix runs per resolved set, not only at the top:
        // a set resolved inside one source lowers its own sentinel, which
        // is why `mixed[]` can leak into a multi-source union.
        fix_empty_array(&mut out);
        out
    }

    fn resolve_atom(&mut self, ctx: &str, atom: &str) -> BTreeSet<String> {
        if !LazyType::is_lazy(atom) {
            return self.resolve_static(ctx, atom);
        }

        let key = self.cache_key(ctx, atom);
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }
        if !self.visited.insert(atom.to_string()) {
            trace!(term = %LazyType::from_atom(atom), "cycle, contributing nothing");
            return BTreeSet::new();
        }

        let result = match LazyType::from_atom(atom) {
            LazyType::Static(name) => self.resolve_static(ctx, &name),
            LazyType::CallResult(name) => self.resolve_call(&name),
            LazyType::MethodResult {
                method,
                recv,
                static_call,
            } => self.resolve_method(ctx, &method, &recv, static_call),
            LazyType::PropertyOf { prop, recv } => self.resolve_property(ctx, &prop, &recv),
            LazyType::ClassConst { class, name } => self.resolve_class_const(ctx, &class, &name),
            LazyType::ElementOf(recv) => self.resolve_element(ctx, &recv, None),
            LazyType::ElementOfKey { key, recv } => self.resolve_element(ctx, &recv, Some(&key)),
            LazyType::ArrayOf(inner) => {
                let inner = self.resolve_term(ctx, &inner);
                inner
                    .into_iter()
                    .map(|atom| {
                        if atom == EMPTY_ARRAY {
                            "mixed[]".to_string()
                        } else {
                            format!("{atom}[]")
                        }
                    })
                    .collect()
            }
            LazyType::LateStatic(anchor) => self
                .resolve_term(ctx, &anchor)
                .into_iter()
                .filter(|atom| atom.starts_with('\\'))
                .collect(),
            LazyType::Instance(inner) => self
                .resolve_term(ctx, &inner)
                .into_iter()
                .filter(|atom| atom.starts_with('\\'))
                .collect(),
            LazyType::AssignRef(_) => one("mixed"),
            LazyType::ConstResult(name) => self.resolve_constant(&name),
            LazyType::GlobalVar(name) => self.resolve_global(&name),
        };

        self.visited.remove(atom);
        self.cache.insert(key, result.clone());
        result
    }

    fn resolve_term(&mut self, ctx: &str, term: &LazyType) -> BTreeSet<String> {
        self.resolve_atom(ctx, &term.encode())
    }

    /// Plain atoms: late-static keywords bind to the context class, array
    /// suffixes recurse on the base, everything else stands for itself.
    fn resolve_static(&mut self, ctx: &str, atom: &str) -> BTreeSet<String> {
        if let Some(base) = atom.strip_suffix("[]") {
            return self
                .resolve_static(ctx, base)
                .into_iter()
                .map(|resolved| format!("{resolved}[]"))
                .collect();
        }
        match atom {
            "static" | "$this" | "self" => {
                if ctx.is_empty() {
                    BTreeSet::new()
                } else {
                    one(ctx)
                }
            }
            _ => one(atom),
        }
    }

    fn resolve_call(&mut self, name: &str) -> BTreeSet<String> {
        let index = self.index;
        let func = index.get_function(name).or_else(|| {
            // Unqualified calls inside a namespace fall back to the global
            // function of the same name.
            let bare = name.rsplit('\\').next().unwrap_or(name);
            index.get_function(&format!("\\{bare}"))
        });
        match func {
            Some(func) => self.resolve_set("", &func.typ),
            None => {
                debug!(function = name, "call to unknown function");
                self.report("undefinedFunction", format!("unknown function {name}"));
                one("mixed")
            }
        }
    }

    fn resolve_method(
        &mut self,
        ctx: &str,
        method: &str,
        recv: &LazyType,
        static_call: bool,
    ) -> BTreeSet<String> {
        let receivers = self.resolve_term(ctx, recv);
        let mut out = BTreeSet::new();
        for receiver in receivers {
            if !receiver.starts_with('\\') {
                // Calling a method on a non-object contributes nothing;
                // other union members fill the result in.
                continue;
            }
            out.extend(self.resolve_method_on(&receiver, method, static_call));
        }
        out
    }

    /// Look `method` up through the hierarchy of `class` and resolve its
    /// return type with the receiver as the late-static anchor. Candidates
    /// are tried child-to-root, class chain before interfaces; the first
    /// candidate with a non-empty resolution wins, which is what lets an
    /// interface's `@return` reach an implementation whose own method
    /// carries no type information.
    fn resolve_method_on(
        &mut self,
        class: &str,
        method: &str,
        static_call: bool,
    ) -> BTreeSet<String> {
        if self.index.get_class(class).is_none() {
            self.report("undefinedClass", format!("unknown class {class}"));
            return one("mixed");
        }

        for func in self.find_methods(class, method) {
            let resolved = self.resolve_set(class, &func.typ);
            if !resolved.is_empty() {
                return resolved;
            }
        }

        // Magic fallback. `@method` annotations live in the method maps and
        // were already tried above, so they take precedence over this.
        let magic = if static_call { "__callStatic" } else { "__call" };
        if let Some(func) = self.find_methods(class, magic).into_iter().next() {
            return self.resolve_set(class, &func.typ);
        }

        // A missing method on a known class contributes nothing; under a
        // polymorphic receiver the other classes fill the union in, and a
        // lone receiver degrades to `mixed` in post-processing.
        debug!(class, method, "method not found");
        self.report(
            "undefinedMethod",
            format!("unknown method {class}::{method}"),
        );
        BTreeSet::new()
    }

    fn resolve_property(&mut self, ctx: &str, prop: &str, recv: &LazyType) -> BTreeSet<String> {
        let receivers = self.resolve_term(ctx, recv);
        let mut out = BTreeSet::new();
        for receiver in receivers {
            if !receiver.starts_with('\\') {
                continue;
            }
            out.extend(self.resolve_property_on(&receiver, prop));
        }
        out
    }

    fn resolve_property_on(&mut self, class: &str, prop: &str) -> BTreeSet<String> {
        if self.index.get_class(class).is_none() {
            self.report("undefinedClass", format!("unknown class {class}"));
            return one("mixed");
        }

        let is_static_prop = prop.starts_with('$');
        for info in self.hierarchy(class) {
            // Shape fields are reached by index, not member syntax.
            if info.is_shape() && !is_static_prop {
                return one("mixed");
            }
            if let Some(property) = info.properties.get(prop) {
                let resolved = self.resolve_set(class, &property.typ);
                if !resolved.is_empty() {
                    return resolved;
                }
            }
        }

        if !is_static_prop
            && let Some(getter) = self.find_methods(class, "__get").into_iter().next()
        {
            return self.resolve_set(class, &getter.typ);
        }

        debug!(class, prop, "property not found");
        self.report(
            "undefinedProperty",
            format!("unknown property {class}::{prop}"),
        );
        BTreeSet::new()
    }

    fn resolve_class_const(&mut self, ctx: &str, class: &str, name: &str) -> BTreeSet<String> {
        let class = if class == "static" || class == "self" {
            if ctx.is_empty() {
                return one("mixed");
            }
            ctx.to_string()
        } else {
            class.to_string()
        };
        for info in self.hierarchy(&class) {
            if let Some(constant) = info.constants.get(name) {
                return self.resolve_set(&class, &constant.typ);
            }
        }
        self.report(
            "undefinedConstant",
            format!("unknown class constant {class}::{name}"),
        );
        one("mixed")
    }

    fn resolve_constant(&mut self, name: &str) -> BTreeSet<String> {
        let index = self.index;
        let constant = index.get_constant(name).or_else(|| {
            let bare = name.rsplit('\\').next().unwrap_or(name);
            index.get_constant(&format!("\\{bare}"))
        });
        match constant {
            Some(constant) => self.resolve_set("", &constant.typ),
            None => {
                self.report("undefinedConstant", format!("unknown constant {name}"));
                one("mixed")
            }
        }
    }

    fn resolve_global(&mut self, name: &str) -> BTreeSet<String> {
        let index = self.index;
        match index.get_global(name) {
            Some(typ) => self.resolve_set("", typ),
            None => one("mixed"),
        }
    }

    /// Element type of a collection atom, optionally narrowed by a literal
    /// key (shape field access).
    fn resolve_element(
        &mut self,
        ctx: &str,
        recv: &LazyType,
        key: Option<&str>,
    ) -> BTreeSet<String> {
        let collections = self.resolve_term(ctx, recv);
        let mut out = BTreeSet::new();
        for atom in collections {
            out.extend(self.element_of(&atom, key));
        }
        out
    }

    fn element_of(&mut self, atom: &str, key: Option<&str>) -> BTreeSet<String> {
        if let Some(base) = atom.strip_suffix("[]") {
            return one(base);
        }
        if atom == EMPTY_ARRAY || atom == "mixed" || atom == "iterable" {
            return one("mixed");
        }
        if !atom.starts_with('\\') {
            return one("mixed");
        }

        let index = self.index;
        let Some(info) = index.get_class(atom) else {
            return one("mixed");
        };
        if info.is_shape() {
            return match key {
                Some(key) => match info.properties.get(key) {
                    Some(field) => self.resolve_set("", &field.typ),
                    None => one("mixed"),
                },
                None => {
                    let mut out = BTreeSet::new();
                    for field in info.properties.values() {
                        out.extend(self.resolve_set("", &field.typ));
                    }
                    out
                }
            };
        }

        // Objects indexable through the ArrayAccess protocol yield their
        // offsetGet return type.
        if self.implements(atom, "\\ArrayAccess") {
            return self.resolve_method_on(atom, "offsetGet", false);
        }
        one("mixed")
    }

    // -- hierarchy helpers --------------------------------------------------

    /// Class chain child-to-root, then the interface closure in discovery
    /// order. Cycle-protected: a malformed `A extends B extends A` chain
    /// terminates.
    fn hierarchy(&self, class: &str) -> Vec<&'a ClassInfo> {
        let index = self.index;
        let mut out: Vec<&'a ClassInfo> = Vec::new();
        let mut seen: FxHashSet<&'a str> = FxHashSet::default();
        let mut cursor = Some(class.to_string());
        while let Some(name) = cursor {
            let Some(info) = index.get_class(&name) else {
                break;
            };
            if !seen.insert(&info.name) {
                break;
            }
            cursor = info.parent.clone();
            out.push(info);
        }

        let mut queue: Vec<&'a str> = out
            .iter()
            .flat_map(|info| info.interfaces.iter().map(String::as_str))
            .collect();
        let mut i = 0;
        while i < queue.len() {
            let name = queue[i];
            i += 1;
            if !seen.insert(name) {
                continue;
            }
            if let Some(info) = index.get_class(name) {
                out.push(info);
                queue.extend(info.interfaces.iter().map(String::as_str));
                if let Some(parent) = &info.parent {
                    queue.push(parent);
                }
            }
        }
        out
    }

    /// All definitions of `method` through the hierarchy, nearest first.
    fn find_methods(&self, class: &str, method: &str) -> Vec<&'a FunctionInfo> {
        self.hierarchy(class)
            .into_iter()
            .filter_map(|info| info.methods.get(method))
            .collect()
    }

    /// Whether `class` reaches `interface` through its hierarchy. Declared
    /// interface names count even when the interface itself is not indexed
    /// (builtins like `\ArrayAccess`).
    fn implements(&self, class: &str, interface: &str) -> bool {
        self.hierarchy(class).iter().any(|info| {
            info.name == interface || info.interfaces.iter().any(|name| name == interface)
        })
    }

    fn cache_key(&self, ctx: &str, atom: &str) -> u64 {
        let mut hasher = rustc_hash::FxHasher::default();
        ctx.hash(&mut hasher);
        atom.hash(&mut hasher);
        // Order-independent fingerprint of the visited frame: queries from
        // different stack shapes never alias.
        let mut frame: u64 = 0;
        for term in self.visited.iter() {
            let mut h = rustc_hash::FxHasher::default();
            term.hash(&mut h);
            frame ^= h.finish();
        }
        frame.hash(&mut hasher);
        hasher.finish()
    }

    fn report(&mut self, check: &'static str, message: String) {
        self.diagnostics
            .push(Diagnostic::warning(check, "", Span::dummy(), message));
    }
}

fn one(atom: &str) -> BTreeSet<String> {
    let mut set = BTreeSet::new();
    set.insert(atom.to_string());
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use phlint_meta::{ClassFlags, ConstInfo, FuncFlags, PropertyInfo};

    fn lazy_set(term: LazyType) -> TypeSet {
        TypeSet::imprecise(term.encode())
    }

    fn call(name: &str) -> LazyType {
        LazyType::CallResult(name.to_string())
    }

    fn func(name: &str, typ: TypeSet) -> FunctionInfo {
        FunctionInfo {
            name: name.to_string(),
            typ,
            ..FunctionInfo::default()
        }
    }

    fn resolve(index: &SymbolIndex, ctx: &str, types: &TypeSet) -> String {
        let mut visited = FxHashSet::default();
        resolve_types(index, ctx, types, &mut visited).to_string()
    }

    #[test]
    fn test_unknown_function_is_mixed() {
        let index = SymbolIndex::new();
        let mut visited = FxHashSet::default();
        let result = resolve_query(&index, "", &lazy_set(call("\\nope")), &mut visited);
        assert_eq!(result.types.to_string(), "mixed");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].check, "undefinedFunction");
    }

    #[test]
    fn test_call_result_resolves_through_index() {
        let mut index = SymbolIndex::new();
        index
            .functions
            .insert("\\f".into(), func("\\f", TypeSet::precise("int")));
        assert_eq!(resolve(&index, "", &lazy_set(call("\\f"))), "int");
    }

    #[test]
    fn test_mutual_recursion_accumulates_non_cyclic_branches() {
        let mut index = SymbolIndex::new();
        let mut r1 = TypeSet::imprecise("int");
        r1.insert(call("\\r2").encode());
        let mut r2 = TypeSet::imprecise("string");
        r2.insert(call("\\r1").encode());
        index.functions.insert("\\r1".into(), func("\\r1", r1));
        index.functions.insert("\\r2".into(), func("\\r2", r2));

        assert_eq!(resolve(&index, "", &lazy_set(call("\\r1"))), "int|string");
        assert_eq!(resolve(&index, "", &lazy_set(call("\\r2"))), "int|string");
    }

    #[test]
    fn test_pure_cycle_resolves_to_mixed() {
        let mut index = SymbolIndex::new();
        index
            .functions
            .insert("\\r3".into(), func("\\r3", lazy_set(call("\\r4"))));
        index
            .functions
            .insert("\\r4".into(), func("\\r4", lazy_set(call("\\r3"))));
        assert_eq!(resolve(&index, "", &lazy_set(call("\\r3"))), "mixed");
    }

    #[test]
    fn test_empty_array_lowering() {
        let mut index = SymbolIndex::new();
        let mut both = TypeSet::imprecise(EMPTY_ARRAY);
        both.insert("float[]");
        index.functions.insert("\\g".into(), func("\\g", both));
        index
            .functions
            .insert("\\e".into(), func("\\e", TypeSet::imprecise(EMPTY_ARRAY)));

        assert_eq!(resolve(&index, "", &lazy_set(call("\\g"))), "float[]");
        assert_eq!(resolve(&index, "", &lazy_set(call("\\e"))), "mixed[]");
    }

    #[test]
    fn test_late_static_binds_to_receiver() {
        let mut index = SymbolIndex::new();
        let mut base = ClassInfo::new("\\Base");
        base.methods.insert(
            "getStatic".into(),
            func("getStatic", TypeSet::imprecise("static")),
        );
        index.classes.insert("\\Base".into(), base);
        let mut derived = ClassInfo::new("\\Derived");
        derived.parent = Some("\\Base".into());
        index.classes.insert("\\Derived".into(), derived);

        let on_derived = lazy_set(LazyType::MethodResult {
            method: "getStatic".into(),
            recv: Box::new(LazyType::Static("\\Derived".into())),
            static_call: false,
        });
        assert_eq!(resolve(&index, "", &on_derived), "\\Derived");
    }

    #[test]
    fn test_shape_member_access_is_mixed_but_key_access_is_typed() {
        let mut index = SymbolIndex::new();
        let mut shape = ClassInfo::new("\\shape$t.php$0$");
        shape.flags = ClassFlags::SHAPE;
        shape.properties.insert(
            "x".into(),
            PropertyInfo {
                typ: TypeSet::imprecise("int"),
                ..PropertyInfo::default()
            },
        );
        index.classes.insert("\\shape$t.php$0$".into(), shape);

        let recv = LazyType::Static("\\shape$t.php$0$".into());
        let member = lazy_set(LazyType::PropertyOf {
            prop: "x".into(),
            recv: Box::new(recv.clone()),
        });
        assert_eq!(resolve(&index, "", &member), "mixed");

        let keyed = lazy_set(LazyType::ElementOfKey {
            key: "x".into(),
            recv: Box::new(recv.clone()),
        });
        assert_eq!(resolve(&index, "", &keyed), "int");

        let missing = lazy_set(LazyType::ElementOfKey {
            key: "nope".into(),
            recv: Box::new(recv),
        });
        assert_eq!(resolve(&index, "", &missing), "mixed");
    }

    #[test]
    fn test_class_const_through_parent_chain() {
        let mut index = SymbolIndex::new();
        let mut base = ClassInfo::new("\\Base");
        base.constants.insert(
            "POWER".into(),
            ConstInfo {
                typ: TypeSet::imprecise("int"),
            },
        );
        index.classes.insert("\\Base".into(), base);
        let mut derived = ClassInfo::new("\\Derived");
        derived.parent = Some("\\Base".into());
        index.classes.insert("\\Derived".into(), derived);

        let fetch = lazy_set(LazyType::ClassConst {
            class: "\\Derived".into(),
            name: "POWER".into(),
        });
        assert_eq!(resolve(&index, "", &fetch), "int");
    }

    #[test]
    fn test_method_annotation_wins_over_magic_call() {
        let mut index = SymbolIndex::new();
        let mut magic = ClassInfo::new("\\Magic3");
        magic
            .methods
            .insert("__call".into(), func("__call", TypeSet::imprecise("\\Magic3")));
        let mut annotated = func("magicInt", TypeSet::imprecise("int"));
        annotated.flags = FuncFlags::FROM_ANNOTATION;
        magic.methods.insert("magicInt".into(), annotated);
        index.classes.insert("\\Magic3".into(), magic);

        let recv = Box::new(LazyType::Static("\\Magic3".into()));
        let known = lazy_set(LazyType::MethodResult {
            method: "magicInt".into(),
            recv: recv.clone(),
            static_call: false,
        });
        assert_eq!(resolve(&index, "", &known), "int");

        let unknown = lazy_set(LazyType::MethodResult {
            method: "unknown".into(),
            recv,
            static_call: false,
        });
        assert_eq!(resolve(&index, "", &unknown), "\\Magic3");
    }

    #[test]
    fn test_hierarchy_cycle_terminates() {
        let mut index = SymbolIndex::new();
        let mut a = ClassInfo::new("\\A");
        a.parent = Some("\\B".into());
        let mut b = ClassInfo::new("\\B");
        b.parent = Some("\\A".into());
        index.classes.insert("\\A".into(), a);
        index.classes.insert("\\B".into(), b);

        let fetch = lazy_set(LazyType::MethodResult {
            method: "m".into(),
            recv: Box::new(LazyType::Static("\\A".into())),
            static_call: false,
        });
        // Unknown method on a cyclic chain: degrades, does not hang.
        assert_eq!(resolve(&index, "", &fetch), "mixed");
    }

    #[test]
    fn test_array_access_element_uses_offset_get() {
        let mut index = SymbolIndex::new();
        let mut ints = ClassInfo::new("\\Ints");
        ints.interfaces.push("\\ArrayAccess".into());
        ints.methods
            .insert("offsetGet".into(), func("offsetGet", TypeSet::imprecise("int")));
        index.classes.insert("\\Ints".into(), ints);

        let fetch = lazy_set(LazyType::ElementOfKey {
            key: "0".into(),
            recv: Box::new(LazyType::Static("\\Ints".into())),
        });
        assert_eq!(resolve(&index, "", &fetch), "int");
    }

    #[test]
    fn test_precision_survives_for_plain_sets() {
        let index = SymbolIndex::new();
        let mut visited = FxHashSet::default();
        let precise = TypeSet::precise("int");
        assert!(resolve_types(&index, "", &precise, &mut visited).is_precise());

        let imprecise = TypeSet::imprecise("int");
        assert!(!resolve_types(&index, "", &imprecise, &mut visited).is_precise());
    }
}
