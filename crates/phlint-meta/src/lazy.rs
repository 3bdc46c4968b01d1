//! Lazy type terms and their textual encoding.
//!
//! Every non-trivial type source (a call, a member access, an index
//! expression) is recorded as a lazy term instead of a concrete atom,
//! because the referenced symbol may not be indexed yet and because
//! `static` / `$this` bind at the call site. Terms are encoded as short
//! strings (one discriminator byte from the C0 control range, operands
//! separated by an ASCII unit separator, nested term last) so they can be
//! stored next to plain atoms inside a [`crate::TypeSet`] and serialized
//! with the rest of the symbol index.

use std::fmt;

const SEP: char = '\u{1f}';

const W_CALL: char = '\u{01}';
const W_STATIC_METHOD: char = '\u{02}';
const W_INSTANCE_METHOD: char = '\u{03}';
const W_PROPERTY: char = '\u{04}';
const W_CLASS_CONST: char = '\u{05}';
const W_ELEM: char = '\u{06}';
const W_ELEM_KEY: char = '\u{07}';
const W_ARRAY_OF: char = '\u{08}';
const W_LATE_STATIC: char = '\u{09}';
const W_INSTANCE: char = '\u{0a}';
const W_ASSIGN_REF: char = '\u{0b}';
const W_CONST: char = '\u{0c}';
const W_GLOBAL: char = '\u{0d}';

/// An unevaluated type expression.
///
/// `Static` is the trivial term: a plain atom stored verbatim. All other
/// terms reference symbols and are resolved against the finished index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LazyType {
    /// A plain atom (keyword, class name, `static`, suffix array).
    Static(String),
    /// Return type of a named function.
    CallResult(String),
    /// Return type of a method. The receiver term carries the class to
    /// start lookup from; `static_call` picks the `__callStatic` fallback
    /// over `__call`.
    MethodResult {
        method: String,
        recv: Box<LazyType>,
        static_call: bool,
    },
    /// Type of a property. Static properties are keyed with a leading `$`.
    PropertyOf { prop: String, recv: Box<LazyType> },
    /// Type of a class constant.
    ClassConst { class: String, name: String },
    /// Type stored in a collection.
    ElementOf(Box<LazyType>),
    /// Type stored under one literal key of a collection.
    ElementOfKey { key: String, recv: Box<LazyType> },
    /// Array whose elements have the wrapped type.
    ArrayOf(Box<LazyType>),
    /// Late static binding: the runtime class of the anchor.
    LateStatic(Box<LazyType>),
    /// The class atoms of an expression's value.
    Instance(Box<LazyType>),
    /// Reference aliasing; always lowers to `mixed`.
    AssignRef(Box<LazyType>),
    /// Value type of a global constant.
    ConstResult(String),
    /// Type of a variable imported with `global $v;`.
    GlobalVar(String),
}

impl LazyType {
    /// True when `atom` is an encoded lazy term rather than a plain atom.
    pub fn is_lazy(atom: &str) -> bool {
        matches!(atom.chars().next(), Some(c) if c >= W_CALL && c <= W_GLOBAL)
    }

    /// Interpret a stored atom: decode lazy encodings, wrap everything
    /// else as `Static`.
    pub fn from_atom(atom: &str) -> LazyType {
        if Self::is_lazy(atom) {
            Self::decode(atom).unwrap_or_else(|| LazyType::Static("mixed".into()))
        } else {
            LazyType::Static(atom.to_string())
        }
    }

    /// Encode this term into its storage form.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut String) {
        match self {
            LazyType::Static(name) => out.push_str(name),
            LazyType::CallResult(name) => {
                out.push(W_CALL);
                out.push_str(name);
            }
            LazyType::MethodResult {
                method,
                recv,
                static_call,
            } => {
                out.push(if *static_call {
                    W_STATIC_METHOD
                } else {
                    W_INSTANCE_METHOD
                });
                out.push_str(method);
                out.push(SEP);
                recv.encode_into(out);
            }
            LazyType::PropertyOf { prop, recv } => {
                out.push(W_PROPERTY);
                out.push_str(prop);
                out.push(SEP);
                recv.encode_into(out);
            }
            LazyType::ClassConst { class, name } => {
                out.push(W_CLASS_CONST);
                out.push_str(class);
                out.push(SEP);
                out.push_str(name);
            }
            LazyType::ElementOf(recv) => {
                out.push(W_ELEM);
                recv.encode_into(out);
            }
            LazyType::ElementOfKey { key, recv } => {
                out.push(W_ELEM_KEY);
                out.push_str(key);
                out.push(SEP);
                recv.encode_into(out);
            }
            LazyType::ArrayOf(recv) => {
                out.push(W_ARRAY_OF);
                recv.encode_into(out);
            }
            LazyType::LateStatic(recv) => {
                out.push(W_LATE_STATIC);
                recv.encode_into(out);
            }
            LazyType::Instance(recv) => {
                out.push(W_INSTANCE);
                recv.encode_into(out);
            }
            LazyType::AssignRef(recv) => {
                out.push(W_ASSIGN_REF);
                recv.encode_into(out);
            }
            LazyType::ConstResult(name) => {
                out.push(W_CONST);
                out.push_str(name);
            }
            LazyType::GlobalVar(name) => {
                out.push(W_GLOBAL);
                out.push_str(name);
            }
        }
    }

    /// Decode a storage form back into a term. Returns `None` for text that
    /// is not a well-formed encoding; never panics.
    pub fn decode(s: &str) -> Option<LazyType> {
        let mut chars = s.chars();
        let disc = chars.next()?;
        let rest = chars.as_str();
        let term = match disc {
            W_CALL => LazyType::CallResult(rest.to_string()),
            W_STATIC_METHOD | W_INSTANCE_METHOD => {
                let (method, recv) = rest.split_once(SEP)?;
                LazyType::MethodResult {
                    method: method.to_string(),
                    recv: Box::new(Self::decode_operand(recv)?),
                    static_call: disc == W_STATIC_METHOD,
                }
            }
            W_PROPERTY => {
                let (prop, recv) = rest.split_once(SEP)?;
                LazyType::PropertyOf {
                    prop: prop.to_string(),
                    recv: Box::new(Self::decode_operand(recv)?),
                }
            }
            W_CLASS_CONST => {
                let (class, name) = rest.split_once(SEP)?;
                LazyType::ClassConst {
                    class: class.to_string(),
                    name: name.to_string(),
                }
            }
            W_ELEM => LazyType::ElementOf(Box::new(Self::decode_operand(rest)?)),
            W_ELEM_KEY => {
                let (key, recv) = rest.split_once(SEP)?;
                LazyType::ElementOfKey {
                    key: key.to_string(),
                    recv: Box::new(Self::decode_operand(recv)?),
                }
            }
            W_ARRAY_OF => LazyType::ArrayOf(Box::new(Self::decode_operand(rest)?)),
            W_LATE_STATIC => LazyType::LateStatic(Box::new(Self::decode_operand(rest)?)),
            W_INSTANCE => LazyType::Instance(Box::new(Self::decode_operand(rest)?)),
            W_ASSIGN_REF => LazyType::AssignRef(Box::new(Self::decode_operand(rest)?)),
            W_CONST => LazyType::ConstResult(rest.to_string()),
            W_GLOBAL => LazyType::GlobalVar(rest.to_string()),
            _ => return None,
        };
        Some(term)
    }

    fn decode_operand(s: &str) -> Option<LazyType> {
        if Self::is_lazy(s) {
            Self::decode(s)
        } else {
            Some(LazyType::Static(s.to_string()))
        }
    }
}

impl fmt::Display for LazyType {
    /// Human-readable rendering for logs; the storage form is [`encode`].
    ///
    /// [`encode`]: LazyType::encode
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LazyType::Static(name) => write!(f, "{name}"),
            LazyType::CallResult(name) => write!(f, "call({name})"),
            LazyType::MethodResult {
                method,
                recv,
                static_call,
            } => {
                if *static_call {
                    write!(f, "{recv}::{method}()")
                } else {
                    write!(f, "{recv}->{method}()")
                }
            }
            LazyType::PropertyOf { prop, recv } => write!(f, "{recv}->{prop}"),
            LazyType::ClassConst { class, name } => write!(f, "{class}::{name}"),
            LazyType::ElementOf(recv) => write!(f, "elem({recv})"),
            LazyType::ElementOfKey { key, recv } => write!(f, "elem({recv}[{key}])"),
            LazyType::ArrayOf(recv) => write!(f, "array_of({recv})"),
            LazyType::LateStatic(recv) => write!(f, "late_static({recv})"),
            LazyType::Instance(recv) => write!(f, "instance({recv})"),
            LazyType::AssignRef(recv) => write!(f, "ref({recv})"),
            LazyType::ConstResult(name) => write!(f, "const({name})"),
            LazyType::GlobalVar(name) => write!(f, "global(${name})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(term: LazyType) {
        let encoded = term.encode();
        assert_eq!(LazyType::decode(&encoded), Some(term));
    }

    #[test]
    fn test_encode_roundtrip() {
        roundtrip(LazyType::CallResult("\\foo".into()));
        roundtrip(LazyType::ConstResult("\\FOO".into()));
        roundtrip(LazyType::GlobalVar("ints".into()));
        roundtrip(LazyType::ClassConst {
            class: "\\Foo".into(),
            name: "POWER".into(),
        });
        roundtrip(LazyType::MethodResult {
            method: "getThis".into(),
            recv: Box::new(LazyType::Static("\\Foo".into())),
            static_call: false,
        });
        roundtrip(LazyType::MethodResult {
            method: "instance".into(),
            recv: Box::new(LazyType::Static("\\NS\\Test".into())),
            static_call: true,
        });
        roundtrip(LazyType::PropertyOf {
            prop: "$name".into(),
            recv: Box::new(LazyType::Static("\\Gopher".into())),
        });
    }

    #[test]
    fn test_nested_terms_roundtrip() {
        // f()->m()[0], nested three levels deep.
        let term = LazyType::ElementOfKey {
            key: "0".into(),
            recv: Box::new(LazyType::MethodResult {
                method: "m".into(),
                recv: Box::new(LazyType::CallResult("\\f".into())),
                static_call: false,
            }),
        };
        roundtrip(term);
    }

    #[test]
    fn test_plain_atoms_are_not_lazy() {
        assert!(!LazyType::is_lazy("int"));
        assert!(!LazyType::is_lazy("\\Foo"));
        assert!(!LazyType::is_lazy(""));
        assert!(LazyType::is_lazy(&LazyType::CallResult("\\f".into()).encode()));
    }

    #[test]
    fn test_from_atom_wraps_plain_text() {
        assert_eq!(
            LazyType::from_atom("int[]"),
            LazyType::Static("int[]".into())
        );
    }

    #[test]
    fn test_decode_garbage_is_none_not_panic() {
        assert_eq!(LazyType::decode("\u{02}missing_separator"), None);
        assert_eq!(LazyType::decode(""), None);
        assert_eq!(LazyType::decode("\u{1f}"), None);
    }
}
