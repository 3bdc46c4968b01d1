//! The textual type grammar shared by doc comments and native hints.
//!
//! ```text
//! Type     := Union
//! Union    := Atom ('|' Atom)*
//! Atom     := '?' Atom
//!           | '(' Union ')' Suffix
//!           | Prefix Suffix
//! Prefix   := Ident
//!           | 'shape' ('('|'{'|'<') ShapeFields (')'|'}'|'>')
//!           | 'array' '{' ShapeFields '}'
//!           | 'tuple' '(' TypeList ')'
//!           | Ident ('<'|'(') TypeList ('>'|')')   -- generic, erased later
//!           | '[' ']' Atom                          -- legacy prefix array
//! Suffix   := ('[' ']')*
//! ```
//!
//! Whitespace inside shape/tuple/generic brackets is insignificant (the doc
//! corpus uses liberal spacing); at the top level whitespace terminates the
//! type, which is how tags like `@return int some description` split.
//!
//! This is a hand-written predictive parser. The grammar is small and
//! context-sensitive around shape brackets, so a regex engine would be the
//! wrong tool.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeStrError {
    #[error("empty type expression")]
    Empty,
    #[error("unexpected character {ch:?} at offset {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    #[error("unexpected end of type expression")]
    UnexpectedEnd,
}

/// Parsed form of a type expression, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// Identifier: keyword, class name (possibly qualified), `$this`.
    Name(String),
    Nullable(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    /// `T[]` or `[]T`.
    Array(Box<TypeExpr>),
    /// `Base<args>` / `Base(args)`; `array<V>` and `array<K, V>` included.
    Generic { base: String, args: Vec<TypeExpr> },
    Shape { fields: Vec<ShapeField>, open: bool },
    Tuple(Vec<TypeExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeField {
    pub key: String,
    pub optional: bool,
    pub typ: TypeExpr,
}

/// Parse a complete type expression; trailing text is an error.
pub fn parse(input: &str) -> Result<TypeExpr, TypeStrError> {
    let (expr, consumed) = parse_prefix(input)?;
    if input[consumed..].trim().is_empty() {
        Ok(expr)
    } else {
        let pos = consumed + input[consumed..].len() - input[consumed..].trim_start().len();
        Err(TypeStrError::UnexpectedChar {
            pos,
            ch: input[pos..].chars().next().unwrap_or(' '),
        })
    }
}

/// Parse a type expression from the start of `input`, returning the parsed
/// expression and the number of bytes consumed. Used by the doc-comment
/// extractor, where free text may follow the type.
pub fn parse_prefix(input: &str) -> Result<(TypeExpr, usize), TypeStrError> {
    let mut parser = Parser {
        input: input.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let expr = parser.union()?;
    Ok((expr, parser.pos))
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    /// Bracket nesting depth; whitespace is skipped only when > 0.
    depth: u32,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        if self.depth == 0 {
            return;
        }
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, want: u8) -> Result<(), TypeStrError> {
        self.skip_ws();
        match self.peek() {
            Some(b) if b == want => {
                self.pos += 1;
                Ok(())
            }
            Some(b) => Err(TypeStrError::UnexpectedChar {
                pos: self.pos,
                ch: b as char,
            }),
            None => Err(TypeStrError::UnexpectedEnd),
        }
    }

    fn union(&mut self) -> Result<TypeExpr, TypeStrError> {
        let mut members = vec![self.atom()?];
        loop {
            self.skip_ws();
            if self.peek() == Some(b'|') {
                self.pos += 1;
                members.push(self.atom()?);
            } else {
                break;
            }
        }
        if members.len() == 1 {
            Ok(members.pop().expect("one member"))
        } else {
            Ok(TypeExpr::Union(members))
        }
    }

    fn atom(&mut self) -> Result<TypeExpr, TypeStrError> {
        self.skip_ws();
        let expr = match self.peek() {
            None => return Err(TypeStrError::Empty),
            Some(b'?') => {
                self.pos += 1;
                // Nullable binds to the whole following atom: `?int[]` is a
                // nullable array, deliberately the same as `(?int)[]`.
                return Ok(TypeExpr::Nullable(Box::new(self.atom()?)));
            }
            Some(b'(') => {
                self.pos += 1;
                self.depth += 1;
                let inner = self.union()?;
                self.depth -= 1;
                self.expect(b')')?;
                inner
            }
            Some(b'[') => {
                // Legacy prefix array: `[]T`, `[][]T`, or a bare `[]`.
                self.pos += 1;
                self.expect(b']')?;
                if self.starts_atom() {
                    TypeExpr::Array(Box::new(self.atom()?))
                } else {
                    TypeExpr::Name("array".to_string())
                }
            }
            Some(b) if is_ident_start(b) => {
                let ident = self.ident();
                self.prefix(ident)?
            }
            Some(b) => {
                return Err(TypeStrError::UnexpectedChar {
                    pos: self.pos,
                    ch: b as char,
                });
            }
        };
        self.suffix(expr)
    }

    fn starts_atom(&self) -> bool {
        matches!(self.peek(), Some(b) if is_ident_start(b) || b == b'?' || b == b'(' || b == b'[')
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        if self.peek() == Some(b'$') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(b) if is_ident_part(b)) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn prefix(&mut self, ident: String) -> Result<TypeExpr, TypeStrError> {
        match (ident.as_str(), self.peek()) {
            ("shape", Some(open @ (b'(' | b'{' | b'<'))) => self.shape(open),
            ("array", Some(b'{')) => self.shape(b'{'),
            ("tuple", Some(b'(')) => self.tuple(),
            (_, Some(open @ (b'<' | b'('))) => self.generic(ident, open),
            _ => Ok(TypeExpr::Name(ident)),
        }
    }

    fn suffix(&mut self, mut expr: TypeExpr) -> Result<TypeExpr, TypeStrError> {
        loop {
            self.skip_ws();
            if self.peek() == Some(b'[') && self.input.get(self.pos + 1) == Some(&b']') {
                self.pos += 2;
                expr = TypeExpr::Array(Box::new(expr));
            } else {
                return Ok(expr);
            }
        }
    }

    fn shape(&mut self, open: u8) -> Result<TypeExpr, TypeStrError> {
        let close = closing(open);
        self.pos += 1;
        self.depth += 1;
        let mut fields = Vec::new();
        let mut is_open = false;

        self.skip_ws();
        if self.peek() == Some(b'*') {
            self.pos += 1;
            is_open = true;
        } else if self.peek() != Some(close) {
            loop {
                fields.push(self.shape_field()?);
                self.skip_ws();
                if self.peek() == Some(b',') {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        self.depth -= 1;
        self.expect(close)?;
        Ok(TypeExpr::Shape {
            fields,
            open: is_open,
        })
    }

    fn shape_field(&mut self) -> Result<ShapeField, TypeStrError> {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.peek(), Some(b) if is_ident_part(b)) {
            self.pos += 1;
        }
        if self.pos == start {
            return match self.peek() {
                Some(b) => Err(TypeStrError::UnexpectedChar {
                    pos: self.pos,
                    ch: b as char,
                }),
                None => Err(TypeStrError::UnexpectedEnd),
            };
        }
        let key = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();

        self.skip_ws();
        let optional = if self.peek() == Some(b'?') {
            self.pos += 1;
            true
        } else {
            false
        };
        self.expect(b':')?;
        let typ = self.union()?;
        Ok(ShapeField { key, optional, typ })
    }

    fn tuple(&mut self) -> Result<TypeExpr, TypeStrError> {
        self.pos += 1;
        self.depth += 1;
        let mut members = Vec::new();
        self.skip_ws();
        if self.peek() != Some(b')') {
            loop {
                members.push(self.union()?);
                self.skip_ws();
                if self.peek() == Some(b',') {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        self.depth -= 1;
        self.expect(b')')?;
        Ok(TypeExpr::Tuple(members))
    }

    fn generic(&mut self, base: String, open: u8) -> Result<TypeExpr, TypeStrError> {
        let close = closing(open);
        self.pos += 1;
        self.depth += 1;
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() != Some(close) {
            loop {
                args.push(self.union()?);
                self.skip_ws();
                if self.peek() == Some(b',') {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        self.depth -= 1;
        self.expect(close)?;
        Ok(TypeExpr::Generic { base, args })
    }
}

fn closing(open: u8) -> u8 {
    match open {
        b'(' => b')',
        b'{' => b'}',
        b'<' => b'>',
        _ => unreachable!("not an opening bracket"),
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'\\' || b == b'$' || b >= 0x80
}

fn is_ident_part(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'\\' || b >= 0x80
}

/// Print a type expression in canonical form. Printing a parsed canonical
/// string yields the same bytes.
pub fn print(expr: &TypeExpr) -> String {
    match expr {
        TypeExpr::Name(name) => name.clone(),
        TypeExpr::Nullable(inner) => format!("?{}", print(inner)),
        TypeExpr::Union(members) => members
            .iter()
            .map(print)
            .collect::<Vec<_>>()
            .join("|"),
        TypeExpr::Array(inner) => match inner.as_ref() {
            TypeExpr::Union(_) => format!("({})[]", print(inner)),
            _ => format!("{}[]", print(inner)),
        },
        TypeExpr::Generic { base, args } => {
            let args = args.iter().map(print).collect::<Vec<_>>().join(",");
            format!("{base}<{args}>")
        }
        TypeExpr::Shape { fields, open } => {
            if *open {
                return "shape(*)".to_string();
            }
            let fields = fields
                .iter()
                .map(|f| {
                    let opt = if f.optional { "?" } else { "" };
                    format!("{}{}:{}", f.key, opt, print(&f.typ))
                })
                .collect::<Vec<_>>()
                .join(",");
            format!("shape({fields})")
        }
        TypeExpr::Tuple(members) => {
            let members = members.iter().map(print).collect::<Vec<_>>().join(",");
            format!("tuple({members})")
        }
    }
}
