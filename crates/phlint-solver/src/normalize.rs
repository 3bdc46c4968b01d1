//! Type normalization: alias folding, array rewriting, nullable lowering,
//! namespace qualification and shape registration.
//!
//! Normalization converts a parsed [`TypeExpr`] into the flat atom strings
//! stored in a [`TypeSet`]. Doc-comment types and native hints share the
//! grammar but not the rules: alias folding (`integer` → `int`) applies to
//! doc types only; a native `integer` hint denotes the class `\integer`.

use crate::typestr::{ShapeField, TypeExpr};
use phlint_ast::TypeHint;
use phlint_meta::TypeSet;

/// Scalar keywords that are their own atoms.
const KEYWORDS: &[&str] = &[
    "int", "float", "string", "bool", "void", "null", "true", "false", "resource", "iterable",
    "mixed", "callable",
];

/// Canonical names for the spelling aliases the doc corpus uses.
const ALIASES: &[(&str, &str)] = &[
    ("integer", "int"),
    ("long", "int"),
    ("boolean", "bool"),
    ("double", "float"),
    ("real", "float"),
];

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Fold a doc-comment alias to its canonical scalar. Qualified names are
/// never folded: `\integer` is a class.
pub fn fold_alias(name: &str) -> &str {
    if name.contains('\\') {
        return name;
    }
    for (alias, canonical) in ALIASES {
        if name == *alias {
            return canonical;
        }
    }
    name
}

/// Naming context for qualification and `self`/`parent` substitution.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeContext<'a> {
    /// Enclosing namespace without the leading `\`; empty for global.
    pub namespace: &'a str,
    /// FQN of the enclosing class, if any.
    pub class: Option<&'a str>,
    /// FQN of the enclosing class's parent, if any.
    pub parent: Option<&'a str>,
}

impl<'a> TypeContext<'a> {
    /// Qualify a class name against the namespace. Leading `\` wins.
    pub fn qualify(&self, name: &str) -> String {
        if let Some(rest) = name.strip_prefix('\\') {
            return format!("\\{rest}");
        }
        if self.namespace.is_empty() {
            format!("\\{name}")
        } else {
            format!("\\{}\\{name}", self.namespace)
        }
    }
}

/// Sink for anonymous shape/tuple types discovered during normalization.
///
/// The indexer implements this by creating a synthetic class
/// `\shape$<file>$<counter>$` flagged as a shape; its return value is the
/// atom recorded in place of the structural type.
pub trait ShapeRegistrar {
    fn register_shape(&mut self, fields: Vec<(String, TypeSet)>, open: bool) -> String;
}

/// Convert a doc-comment type expression into atom strings.
///
/// Applies alias folding, nullable lowering (`?T` → `T|null`), prefix and
/// generic array rewriting, one-level union-of-array distribution, generics
/// erasure and namespace qualification. Shapes and tuples are registered
/// through `shapes` and replaced by their synthetic class atom.
pub fn doc_type_atoms(
    expr: &TypeExpr,
    ctx: &TypeContext<'_>,
    shapes: &mut dyn ShapeRegistrar,
) -> Vec<String> {
    atoms(expr, ctx, shapes, true, 0)
}

/// Convert a native type hint into atom strings. No alias folding.
pub fn hint_atoms(hint: &TypeHint, ctx: &TypeContext<'_>) -> Vec<String> {
    let mut out = match hint.name.as_str() {
        name if is_keyword(name) => vec![name.to_string()],
        "array" => vec!["mixed[]".to_string()],
        "static" | "$this" => vec!["static".to_string()],
        "self" => match ctx.class {
            Some(class) => vec![class.to_string()],
            None => vec!["mixed".to_string()],
        },
        "parent" => match ctx.parent {
            Some(parent) => vec![parent.to_string()],
            None => vec!["mixed".to_string()],
        },
        name => vec![ctx.qualify(name)],
    };
    if hint.nullable {
        out.push("null".to_string());
    }
    out
}

fn atoms(
    expr: &TypeExpr,
    ctx: &TypeContext<'_>,
    shapes: &mut dyn ShapeRegistrar,
    fold: bool,
    array_depth: u32,
) -> Vec<String> {
    match expr {
        TypeExpr::Name(raw) => {
            let name = if fold { fold_alias(raw) } else { raw.as_str() };
            match name {
                name if is_keyword(name) => vec![name.to_string()],
                "array" => vec!["mixed[]".to_string()],
                "static" | "$this" => vec!["static".to_string()],
                "self" => match ctx.class {
                    Some(class) => vec![class.to_string()],
                    None => vec!["static".to_string()],
                },
                "parent" => match ctx.parent {
                    Some(parent) => vec![parent.to_string()],
                    None => vec!["mixed".to_string()],
                },
                name => vec![ctx.qualify(name)],
            }
        }
        TypeExpr::Nullable(inner) => {
            let mut out = atoms(inner, ctx, shapes, fold, array_depth);
            out.push("null".to_string());
            out
        }
        TypeExpr::Union(members) => members
            .iter()
            .flat_map(|m| atoms(m, ctx, shapes, fold, array_depth))
            .collect(),
        TypeExpr::Array(inner) => match inner.as_ref() {
            // `(A|B)[]` distributes to `A[]|B[]`, but only at the top
            // level. Deeper union elements have no flat representation and
            // degrade to `mixed[]`.
            TypeExpr::Union(members) => {
                if array_depth == 0 {
                    members
                        .iter()
                        .flat_map(|m| atoms(m, ctx, shapes, fold, array_depth + 1))
                        .map(|atom| format!("{atom}[]"))
                        .collect()
                } else {
                    vec!["mixed[]".to_string()]
                }
            }
            // `(?T)[]` hoists the null out of the array: nullable arrays
            // and arrays of nullables are deliberately conflated.
            TypeExpr::Nullable(inner) => {
                let mut out: Vec<String> = atoms(inner, ctx, shapes, fold, array_depth + 1)
                    .into_iter()
                    .map(|atom| format!("{atom}[]"))
                    .collect();
                out.push("null".to_string());
                out
            }
            _ => atoms(inner, ctx, shapes, fold, array_depth + 1)
                .into_iter()
                .map(|atom| format!("{atom}[]"))
                .collect(),
        },
        TypeExpr::Generic { base, args } => match base.as_str() {
            // `array<V>` / `array<K, V>`: the key type is ignored, the
            // value type becomes the element.
            "array" => match args.last() {
                Some(value) => atoms(value, ctx, shapes, fold, array_depth + 1)
                    .into_iter()
                    .map(|atom| format!("{atom}[]"))
                    .collect(),
                None => vec!["mixed[]".to_string()],
            },
            // Other generics are erased to their base.
            _ => atoms(&TypeExpr::Name(base.clone()), ctx, shapes, fold, array_depth),
        },
        TypeExpr::Shape { fields, open } => {
            if *open {
                // shape(*): fields unknown, array-like.
                return vec!["mixed[]".to_string()];
            }
            vec![register_shape(fields, ctx, shapes, fold)]
        }
        TypeExpr::Tuple(members) => {
            let fields: Vec<ShapeField> = members
                .iter()
                .enumerate()
                .map(|(i, typ)| ShapeField {
                    key: i.to_string(),
                    optional: false,
                    typ: typ.clone(),
                })
                .collect();
            vec![register_shape(&fields, ctx, shapes, fold)]
        }
    }
}

fn register_shape(
    fields: &[ShapeField],
    ctx: &TypeContext<'_>,
    shapes: &mut dyn ShapeRegistrar,
    fold: bool,
) -> String {
    let fields = fields
        .iter()
        .map(|field| {
            let mut typ = TypeSet::new();
            for atom in atoms(&field.typ, ctx, shapes, fold, 0) {
                typ.insert(atom);
            }
            typ.mark_imprecise();
            (field.key.clone(), typ)
        })
        .collect();
    shapes.register_shape(fields, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typestr::parse;

    #[derive(Default)]
    struct TestShapes {
        registered: Vec<Vec<(String, TypeSet)>>,
    }

    impl ShapeRegistrar for TestShapes {
        fn register_shape(&mut self, fields: Vec<(String, TypeSet)>, _open: bool) -> String {
            let name = format!("\\shape$test.php${}$", self.registered.len());
            self.registered.push(fields);
            name
        }
    }

    fn doc_atoms(src: &str) -> Vec<String> {
        let mut shapes = TestShapes::default();
        let mut atoms = doc_type_atoms(&parse(src).unwrap(), &TypeContext::default(), &mut shapes);
        atoms.sort();
        atoms
    }

    #[test]
    fn test_alias_folding() {
        assert_eq!(doc_atoms("integer"), ["int"]);
        assert_eq!(doc_atoms("long"), ["int"]);
        assert_eq!(doc_atoms("boolean"), ["bool"]);
        assert_eq!(doc_atoms("double"), ["float"]);
        assert_eq!(doc_atoms("real"), ["float"]);
        // Qualified names are classes, never folded.
        assert_eq!(doc_atoms("\\integer"), ["\\integer"]);
    }

    #[test]
    fn test_prefix_array_rewrite() {
        assert_eq!(doc_atoms("[]int"), ["int[]"]);
        assert_eq!(doc_atoms("[][]real"), ["float[][]"]);
        assert_eq!(doc_atoms("[]"), ["mixed[]"]);
    }

    #[test]
    fn test_nullable_lowering() {
        assert_eq!(doc_atoms("?int"), ["int", "null"]);
        assert_eq!(doc_atoms("?int[]"), ["int[]", "null"]);
        assert_eq!(doc_atoms("(?int)[]"), ["int[]", "null"]);
        assert_eq!(doc_atoms("?int|?string"), ["int", "null", "string"]);
    }

    #[test]
    fn test_union_of_arrays_distributes_one_level() {
        assert_eq!(doc_atoms("(int|float)[]"), ["float[]", "int[]"]);
        assert_eq!(
            doc_atoms("(int|float|null)[]"),
            ["float[]", "int[]", "null[]"]
        );
        // Deeper nesting is out of contract and degrades.
        assert_eq!(doc_atoms("((int|float)[])[]"), ["mixed[]"]);
    }

    #[test]
    fn test_bare_array_and_generic_array() {
        assert_eq!(doc_atoms("array"), ["mixed[]"]);
        assert_eq!(doc_atoms("array[]"), ["mixed[][]"]);
        assert_eq!(doc_atoms("array<int>"), ["int[]"]);
        assert_eq!(doc_atoms("array<int, string>"), ["string[]"]);
        assert_eq!(doc_atoms("array<int, stdclass>"), ["\\stdclass[]"]);
    }

    #[test]
    fn test_generics_are_erased() {
        assert_eq!(doc_atoms("A<>"), ["\\A"]);
        assert_eq!(doc_atoms("A<X>"), ["\\A"]);
        assert_eq!(doc_atoms("A<X, Y>[]"), ["\\A[]"]);
        assert_eq!(doc_atoms("Either(int,float)|bool"), ["\\Either", "bool"]);
    }

    #[test]
    fn test_class_qualification() {
        assert_eq!(doc_atoms("Foo"), ["\\Foo"]);
        assert_eq!(doc_atoms("\\NS\\Test"), ["\\NS\\Test"]);

        let ctx = TypeContext {
            namespace: "NS",
            ..TypeContext::default()
        };
        let mut shapes = TestShapes::default();
        assert_eq!(
            doc_type_atoms(&parse("Test[]").unwrap(), &ctx, &mut shapes),
            ["\\NS\\Test[]"]
        );
    }

    #[test]
    fn test_self_and_this_substitution() {
        let ctx = TypeContext {
            class: Some("\\Foo"),
            parent: Some("\\Base"),
            ..TypeContext::default()
        };
        let mut shapes = TestShapes::default();
        let one = |src: &str, shapes: &mut TestShapes| {
            doc_type_atoms(&parse(src).unwrap(), &ctx, shapes)
        };
        assert_eq!(one("self", &mut shapes), ["\\Foo"]);
        assert_eq!(one("parent", &mut shapes), ["\\Base"]);
        assert_eq!(one("static", &mut shapes), ["static"]);
        assert_eq!(one("$this", &mut shapes), ["static"]);
        assert_eq!(one("static[]", &mut shapes), ["static[]"]);
    }

    #[test]
    fn test_shape_registration_folds_field_types() {
        let mut shapes = TestShapes::default();
        let atoms = doc_type_atoms(
            &parse("shape(f:double,nested:shape(i:long[]))").unwrap(),
            &TypeContext::default(),
            &mut shapes,
        );
        // Two shapes: the nested one registers first.
        assert_eq!(atoms, ["\\shape$test.php$1$"]);
        assert_eq!(shapes.registered.len(), 2);
        let nested = &shapes.registered[0];
        assert_eq!(nested[0].0, "i");
        assert!(nested[0].1.is("int[]"));
        let outer = &shapes.registered[1];
        assert!(outer[0].1.is("float"));
        assert!(outer[1].1.is("\\shape$test.php$0$"));
    }

    #[test]
    fn test_tuple_registers_positional_fields() {
        let mut shapes = TestShapes::default();
        doc_type_atoms(
            &parse("tuple(int, float)").unwrap(),
            &TypeContext::default(),
            &mut shapes,
        );
        let fields = &shapes.registered[0];
        assert_eq!(fields[0].0, "0");
        assert!(fields[0].1.is("int"));
        assert_eq!(fields[1].0, "1");
        assert!(fields[1].1.is("float"));
    }

    #[test]
    fn test_open_shape_is_mixed_array() {
        assert_eq!(doc_atoms("shape(*)"), ["mixed[]"]);
    }

    #[test]
    fn test_atoms_are_idempotent() {
        // Normalizing already-normalized output changes nothing.
        for src in ["integer", "[]real", "?boolean", "(long|double)[]", "array<int>"] {
            let first = doc_atoms(src);
            let again = doc_atoms(&first.join("|"));
            assert_eq!(first, again, "{src}");
        }
    }

    #[test]
    fn test_hint_atoms() {
        let ctx = TypeContext::default();
        let sorted = |hint: &TypeHint| {
            let mut a = hint_atoms(hint, &ctx);
            a.sort();
            a
        };
        assert_eq!(sorted(&TypeHint::new("int")), ["int"]);
        assert_eq!(sorted(&TypeHint::new("array")), ["mixed[]"]);
        assert_eq!(sorted(&TypeHint::new("callable")), ["callable"]);
        assert_eq!(sorted(&TypeHint::nullable("string")), ["null", "string"]);
        // No alias folding for native hints: `integer` is a class.
        assert_eq!(sorted(&TypeHint::new("integer")), ["\\integer"]);
        assert_eq!(sorted(&TypeHint::new("boolean")), ["\\boolean"]);
        assert_eq!(sorted(&TypeHint::new("Foo")), ["\\Foo"]);
    }
}
