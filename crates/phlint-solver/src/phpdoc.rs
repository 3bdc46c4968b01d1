//! Structured doc-comment extraction.
//!
//! Parses `/** ... */` blocks into typed facts: `@var`, `@param`,
//! `@return`, `@property`, `@method`. Type expressions are kept as the raw
//! source slice; converting them to atoms needs a naming context and a
//! shape registrar, which the indexer supplies later.
//!
//! Malformed tags never abort extraction: the broken tag is skipped and a
//! notice describing it is handed back to the caller.

use crate::typestr;

/// Facts extracted from one doc comment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocBlock {
    pub vars: Vec<VarTag>,
    pub params: Vec<ParamTag>,
    /// Raw `@return` type strings.
    pub returns: Vec<String>,
    pub properties: Vec<PropertyTag>,
    pub methods: Vec<MethodTag>,
    pub notices: Vec<DocNotice>,
}

/// `@var [type] [$name]`, both orders accepted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarTag {
    pub typ: Option<String>,
    /// Variable name without `$`; absent tags apply to the annotated
    /// statement's own target.
    pub name: Option<String>,
}

/// `@param [type] [&]$name` / `@param $name [type]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamTag {
    pub typ: Option<String>,
    pub name: Option<String>,
    pub by_ref: bool,
}

/// `@property [type] $name [description]`, both orders accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyTag {
    pub typ: Option<String>,
    /// Property name without `$`.
    pub name: String,
}

/// `@method [static] [type] name([params])`.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodTag {
    pub is_static: bool,
    pub ret: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocNotice {
    /// Zero-based line inside the doc block.
    pub line: usize,
    pub message: String,
}

/// Doc tags with no type payload that are common enough to skip silently.
const KNOWN_UNTYPED_TAGS: &[&str] = &[
    "author",
    "copyright",
    "deprecated",
    "example",
    "internal",
    "license",
    "link",
    "package",
    "see",
    "since",
    "throws",
    "todo",
];

impl DocBlock {
    /// Parse one raw doc comment, comment markers included.
    pub fn parse(doc: &str) -> DocBlock {
        let mut block = DocBlock::default();
        for (line_no, raw_line) in doc.lines().enumerate() {
            let line = strip_comment_markers(raw_line);
            let Some(at) = line.find('@') else { continue };
            let tag_and_rest = &line[at + 1..];
            let (tag, rest) = split_token(tag_and_rest);
            let rest = rest.trim();
            match tag {
                "var" => block.parse_var(line_no, rest),
                "param" => block.parse_param(line_no, rest),
                "return" => block.parse_return(line_no, rest),
                "property" => block.parse_property(line_no, rest),
                "method" => block.parse_method(line_no, rest),
                "" => {}
                other => {
                    if !KNOWN_UNTYPED_TAGS.contains(&other) {
                        block.notice(line_no, format!("unknown annotation @{other}"));
                    }
                }
            }
        }
        block
    }

    fn notice(&mut self, line: usize, message: String) {
        self.notices.push(DocNotice { line, message });
    }

    fn parse_var(&mut self, line: usize, rest: &str) {
        let (typ, name, _) = scan_type_and_name(rest);
        if typ.is_none() && name.is_none() {
            self.notice(line, "malformed @var tag".to_string());
            return;
        }
        self.vars.push(VarTag { typ, name });
    }

    fn parse_param(&mut self, line: usize, rest: &str) {
        let (typ, name, by_ref) = scan_type_and_name(rest);
        if name.is_none() {
            // A type with no matching parameter name is useless: drop it.
            self.notice(line, "malformed @param tag: missing parameter name".to_string());
            return;
        }
        if typ.is_none() {
            self.notice(line, "malformed @param tag: missing type".to_string());
        }
        self.params.push(ParamTag { typ, name, by_ref });
    }

    fn parse_return(&mut self, line: usize, rest: &str) {
        match scan_type(rest) {
            Some((typ, _)) => self.returns.push(typ),
            None => {
                // `@return - some result` and friends: no recognizable
                // type; the function degrades to `mixed` at the use site.
                self.notice(line, "malformed @return tag".to_string());
                self.returns.push("mixed".to_string());
            }
        }
    }

    fn parse_property(&mut self, line: usize, rest: &str) {
        let (typ, name, _) = scan_type_and_name(rest);
        let Some(name) = name else {
            self.notice(line, "malformed @property tag: missing name".to_string());
            return;
        };
        self.properties.push(PropertyTag { typ, name });
    }

    fn parse_method(&mut self, line: usize, rest: &str) {
        let (first, after) = split_token(rest);
        let (is_static, rest) = if first == "static" {
            (true, after.trim_start())
        } else {
            (false, rest)
        };

        let Some((typ, consumed)) = scan_type(rest) else {
            self.notice(line, "malformed @method tag".to_string());
            return;
        };
        let after_type = rest[consumed..].trim_start();
        let name: String = after_type
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();

        if !name.is_empty() {
            self.methods.push(MethodTag {
                is_static,
                ret: Some(typ),
                name,
            });
            return;
        }
        // Only one token: it was the method name, not a type.
        // `@method foo()` parses as a generic with empty args.
        let bare: String = typ
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if bare.is_empty() {
            self.notice(line, "malformed @method tag: missing name".to_string());
            return;
        }
        self.methods.push(MethodTag {
            is_static,
            ret: None,
            name: bare,
        });
    }
}

/// Strip `/**`, `*/` and the decorative leading `*` from one line.
fn strip_comment_markers(line: &str) -> &str {
    let mut line = line.trim();
    if let Some(rest) = line.strip_prefix("/**") {
        line = rest.trim_start();
    }
    if let Some(rest) = line.strip_suffix("*/") {
        line = rest.trim_end();
    }
    if let Some(rest) = line.strip_prefix('*') {
        line = rest.trim_start();
    }
    line
}

fn split_token(s: &str) -> (&str, &str) {
    match s.find(|c: char| c.is_ascii_whitespace()) {
        Some(i) => (&s[..i], &s[i..]),
        None => (s, ""),
    }
}

/// Scan one type expression from the start of `s` using the type grammar
/// (bracket-aware, so `shape( a : int )` consumes as one unit). Returns the
/// raw slice and its length.
fn scan_type(s: &str) -> Option<(String, usize)> {
    let s_trimmed = s.trim_start();
    let offset = s.len() - s_trimmed.len();
    let (_, consumed) = typestr::parse_prefix(s_trimmed).ok()?;
    if consumed == 0 {
        return None;
    }
    Some((s_trimmed[..consumed].to_string(), offset + consumed))
}

/// Scan a `[type] [&]$name` pair in either order. Returns
/// `(type, name, by_ref)`.
fn scan_type_and_name(rest: &str) -> (Option<String>, Option<String>, bool) {
    let mut typ: Option<String> = None;
    let mut name: Option<String> = None;
    let mut by_ref = false;
    let mut s = rest.trim_start();

    while !s.is_empty() && (typ.is_none() || name.is_none()) {
        if let Some(var) = s.strip_prefix("&$").or_else(|| s.strip_prefix('$')) {
            if name.is_some() {
                break;
            }
            by_ref |= s.starts_with('&');
            let (ident, after) = split_token(var);
            name = Some(ident.to_string());
            s = after.trim_start();
            continue;
        }
        if typ.is_some() {
            break; // Free-text description follows.
        }
        match scan_type(s) {
            Some((t, consumed)) => {
                typ = Some(t);
                s = s[consumed..].trim_start();
            }
            None => break,
        }
    }
    (typ, name, by_ref)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_both_orders() {
        let block = DocBlock::parse("/** @var array<string, int> */");
        assert_eq!(block.vars[0].typ.as_deref(), Some("array<string, int>"));
        assert_eq!(block.vars[0].name, None);

        let block = DocBlock::parse("/** @var $prop2 array< string, string> */");
        assert_eq!(block.vars[0].name.as_deref(), Some("prop2"));
        assert_eq!(block.vars[0].typ.as_deref(), Some("array< string, string>"));

        let block = DocBlock::parse("/** @var array< string , float > $prop3 */");
        assert_eq!(block.vars[0].name.as_deref(), Some("prop3"));
        assert_eq!(block.vars[0].typ.as_deref(), Some("array< string , float >"));
    }

    #[test]
    fn test_param_with_reference_name() {
        let block = DocBlock::parse("/**\n * @param int &$x\n */");
        let param = &block.params[0];
        assert_eq!(param.typ.as_deref(), Some("int"));
        assert_eq!(param.name.as_deref(), Some("x"));
        assert!(param.by_ref);
        assert!(block.notices.is_empty());
    }

    #[test]
    fn test_param_name_only_is_kept_with_notice() {
        let block = DocBlock::parse("/**\n * @param $x\n */");
        assert_eq!(block.params.len(), 1);
        assert_eq!(block.params[0].typ, None);
        assert_eq!(block.notices.len(), 1);
    }

    #[test]
    fn test_param_type_only_is_dropped() {
        let block = DocBlock::parse("/**\n * @param int\n */");
        assert!(block.params.is_empty());
        assert_eq!(block.notices.len(), 1);
    }

    #[test]
    fn test_return_with_description() {
        let block = DocBlock::parse("/** @return array the slice. */");
        assert_eq!(block.returns, ["array"]);
    }

    #[test]
    fn test_return_dash_degrades_to_mixed() {
        let block = DocBlock::parse("/** @return - some result */");
        assert_eq!(block.returns, ["mixed"]);
        assert_eq!(block.notices.len(), 1);
    }

    #[test]
    fn test_property_both_orders() {
        let block =
            DocBlock::parse("/**\n * @property $magicprop1 shape( k1: \\Foo , k2 : string )\n */");
        assert_eq!(block.properties[0].name, "magicprop1");
        assert_eq!(
            block.properties[0].typ.as_deref(),
            Some("shape( k1: \\Foo , k2 : string )")
        );

        let block = DocBlock::parse("/** @property int $int optional description */");
        assert_eq!(block.properties[0].name, "int");
        assert_eq!(block.properties[0].typ.as_deref(), Some("int"));
    }

    #[test]
    fn test_method_variants() {
        let block = DocBlock::parse(
            "/**\n * @method int magicInt()\n * @method string magicString()\n * @method int add(int $x, int $y)\n * @method static Magic2 getInstance()\n */",
        );
        assert_eq!(block.methods.len(), 4);
        assert_eq!(block.methods[0].name, "magicInt");
        assert_eq!(block.methods[0].ret.as_deref(), Some("int"));
        assert!(!block.methods[0].is_static);
        assert_eq!(block.methods[2].name, "add");
        let get_instance = &block.methods[3];
        assert!(get_instance.is_static);
        assert_eq!(get_instance.ret.as_deref(), Some("Magic2"));
        assert_eq!(get_instance.name, "getInstance");
    }

    #[test]
    fn test_method_without_parens_or_type() {
        let block = DocBlock::parse("/** @method int magicInt */");
        assert_eq!(block.methods[0].name, "magicInt");
        assert_eq!(block.methods[0].ret.as_deref(), Some("int"));

        let block = DocBlock::parse("/** @method magic() */");
        assert_eq!(block.methods[0].name, "magic");
        assert_eq!(block.methods[0].ret, None);
    }

    #[test]
    fn test_unknown_tag_notice_and_allowlist() {
        let block = DocBlock::parse("/** @see something */");
        assert!(block.notices.is_empty());

        let block = DocBlock::parse("/** @returm int */");
        assert_eq!(block.notices.len(), 1);
    }

    #[test]
    fn test_empty_doc_block() {
        let block = DocBlock::parse("/***/");
        assert_eq!(block, DocBlock::default());
    }
}
