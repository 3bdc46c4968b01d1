//! The inference engine: walks declarations and function bodies, records
//! lazy type terms against symbols.
//!
//! One call to [`index_file`] produces an index fragment for one file. The
//! walk is purely syntactic: nothing here consults the global index, which
//! is what allows files to be indexed in parallel and forward references to
//! resolve later. Every non-trivial type source becomes a lazy term; only
//! literals, casts, `new` and operators produce concrete atoms (and those
//! are the precise ones).

use crate::normalize::{self, ShapeRegistrar, TypeContext};
use crate::phpdoc::DocBlock;
use crate::typestr;
use phlint_ast::{
    ArrayItem, BinaryOp, CastKind, ClassDecl, ClassKind, ClassRef, Decl, Expr, ExprKind, File,
    FuncDecl, Param, Stmt, StmtKind, UnaryOp,
};
use phlint_common::{Diagnostic, Span};
use phlint_meta::types::EMPTY_ARRAY;
use phlint_meta::{
    ClassFlags, ClassInfo, ConstInfo, ConstantInfo, FuncFlags, FunctionInfo, LazyType, ParamInfo,
    PropFlags, PropertyInfo, Scope, SymbolIndex, TypeSet,
};

/// Output of indexing one file.
#[derive(Debug, Default)]
pub struct FileIndex {
    pub symbols: SymbolIndex,
    pub diagnostics: Vec<Diagnostic>,
}

/// Index one file: record every class, function, constant and top-level
/// assignment into a fresh fragment.
///
/// Indexing is deterministic: identical ASTs produce byte-identical lazy
/// terms, and the shape counter restarts at zero for every pass over the
/// file, so re-indexing overwrites symbols with equal content.
pub fn index_file(file: &File) -> FileIndex {
    let mut indexer = Indexer {
        file,
        symbols: SymbolIndex::new(),
        diagnostics: Vec::new(),
        shapes: ShapeTable::new(&file.path),
    };
    indexer.run();

    let Indexer {
        mut symbols,
        diagnostics,
        shapes,
        ..
    } = indexer;
    for class in shapes.classes {
        symbols.classes.insert(class.name.clone(), class);
    }
    FileIndex {
        symbols,
        diagnostics,
    }
}

/// Collects the synthetic classes backing shape and tuple types.
///
/// Shape names are `\shape$<file>$<counter>$`; the counter is per-file and
/// monotonic from zero, which keeps shape identity stable across the
/// discovery and resolution passes.
struct ShapeTable {
    file: String,
    counter: u32,
    classes: Vec<ClassInfo>,
}

impl ShapeTable {
    fn new(file: &str) -> Self {
        ShapeTable {
            file: file.to_string(),
            counter: 0,
            classes: Vec::new(),
        }
    }
}

impl ShapeRegistrar for ShapeTable {
    fn register_shape(&mut self, fields: Vec<(String, TypeSet)>, _open: bool) -> String {
        let name = format!("\\shape${}${}$", self.file, self.counter);
        self.counter += 1;
        let mut class = ClassInfo::new(name.clone());
        class.flags = ClassFlags::SHAPE;
        for (key, typ) in fields {
            class.properties.insert(key, PropertyInfo {
                typ,
                flags: PropFlags::empty(),
            });
        }
        self.classes.push(class);
        name
    }
}

/// Enclosing class context for a method body.
struct ClassCtx {
    fqn: String,
    parent: Option<String>,
}

struct Indexer<'a> {
    file: &'a File,
    symbols: SymbolIndex,
    diagnostics: Vec<Diagnostic>,
    shapes: ShapeTable,
}

impl Indexer<'_> {
    fn run(&mut self) {
        for decl in &self.file.decls {
            match decl {
                Decl::Function(func) => self.index_function(func),
                Decl::Class(class) => self.index_class(class),
                Decl::Const(konst) => {
                    let mut walker = FuncWalker::new(
                        &self.file.namespace,
                        &self.file.path,
                        None,
                        &mut self.shapes,
                        &mut self.diagnostics,
                    );
                    let mut typ = walker.infer_expr(&konst.value);
                    typ.mark_imprecise();
                    let fqn = walker.type_ctx().qualify(&konst.name);
                    self.symbols.constants.insert(fqn, ConstantInfo { typ });
                }
                Decl::Stmt(_) => {}
            }
        }

        // Top-level code runs in one shared scope so that sequences like
        // `$a = []; $a[0] = 1;` accumulate; the resulting bindings become
        // the global variables that `global $v;` imports.
        let mut walker = FuncWalker::new(
            &self.file.namespace,
            &self.file.path,
            None,
            &mut self.shapes,
            &mut self.diagnostics,
        );
        for decl in &self.file.decls {
            if let Decl::Stmt(stmt) = decl {
                walker.walk_stmt(stmt);
            }
        }
        let scope = std::mem::take(&mut walker.scope);
        drop(walker);
        for (name, var) in scope.iter() {
            self.symbols.globals.insert(name.to_string(), var.typ.clone());
        }
    }

    fn index_function(&mut self, func: &FuncDecl) {
        let ctx = TypeContext {
            namespace: &self.file.namespace,
            class: None,
            parent: None,
        };
        let fqn = ctx.qualify(&func.name);
        let (mut info, _) = self.build_func(func, None, false);
        info.name = fqn.clone();
        self.symbols.functions.insert(fqn, info);
    }

    fn index_class(&mut self, class: &ClassDecl) {
        let ctx0 = TypeContext {
            namespace: &self.file.namespace,
            class: None,
            parent: None,
        };
        let fqn = ctx0.qualify(&class.name);
        let parent = class.parent.as_ref().map(|p| ctx0.qualify(p));
        let class_ctx = ClassCtx {
            fqn: fqn.clone(),
            parent: parent.clone(),
        };

        let mut info = ClassInfo::new(fqn.clone());
        if class.kind == ClassKind::Interface {
            info.flags |= ClassFlags::INTERFACE;
        }
        if class.is_abstract {
            info.flags |= ClassFlags::ABSTRACT;
        }
        info.parent = parent;
        info.interfaces = class.interfaces.iter().map(|i| ctx0.qualify(i)).collect();

        // Magic annotations first; real members with the same name
        // overwrite them below.
        if let Some(doc) = &class.doc {
            let block = DocBlock::parse(doc);
            self.note_doc(&block, class.span);
            let ctx = TypeContext {
                namespace: &self.file.namespace,
                class: Some(&class_ctx.fqn),
                parent: class_ctx.parent.as_deref(),
            };
            for tag in &block.properties {
                let typ = tag
                    .typ
                    .as_deref()
                    .and_then(|raw| doc_set(raw, &ctx, &mut self.shapes))
                    .unwrap_or_else(TypeSet::mixed);
                info.properties.insert(tag.name.clone(), PropertyInfo {
                    typ,
                    flags: PropFlags::FROM_ANNOTATION,
                });
            }
            for tag in &block.methods {
                let typ = tag
                    .ret
                    .as_deref()
                    .and_then(|raw| doc_set(raw, &ctx, &mut self.shapes))
                    .unwrap_or_else(TypeSet::mixed);
                let mut flags = FuncFlags::FROM_ANNOTATION;
                if tag.is_static {
                    flags |= FuncFlags::STATIC;
                }
                info.methods.insert(tag.name.clone(), FunctionInfo {
                    name: tag.name.clone(),
                    params: Vec::new(),
                    typ,
                    flags,
                });
            }
        }

        {
            let mut helper = FuncWalker::new(
                &self.file.namespace,
                &self.file.path,
                Some(&class_ctx),
                &mut self.shapes,
                &mut self.diagnostics,
            );
            for konst in &class.consts {
                let typ = helper.infer_expr(&konst.value);
                info.constants
                    .insert(konst.name.clone(), ConstInfo { typ });
            }
            for prop in &class.props {
                let doc_typ = prop
                    .doc
                    .as_deref()
                    .map(DocBlock::parse)
                    .and_then(|block| {
                        block
                            .vars
                            .first()
                            .and_then(|tag| tag.typ.clone())
                            .and_then(|raw| helper.doc_set(&raw))
                    });
                let typ = match doc_typ {
                    Some(typ) => typ,
                    // A default value types the property, but never
                    // precisely: anything can be assigned later.
                    None => match &prop.default {
                        Some(default) => {
                            let mut typ = helper.infer_expr(default);
                            typ.mark_imprecise();
                            typ
                        }
                        None => TypeSet::mixed(),
                    },
                };
                let key = if prop.is_static {
                    format!("${}", prop.name)
                } else {
                    prop.name.clone()
                };
                info.properties.insert(key, PropertyInfo {
                    typ,
                    flags: PropFlags::empty(),
                });
            }
        }

        for method in &class.methods {
            let (mut func_info, this_props) =
                self.build_func(&method.func, Some(&class_ctx), method.is_static);
            if method.is_static {
                func_info.flags |= FuncFlags::STATIC;
            }
            if method.is_abstract {
                func_info.flags |= FuncFlags::ABSTRACT;
            }
            info.methods.insert(method.func.name.clone(), func_info);

            // `$this->prop = ...` assignments contribute to the property
            // map, creating dynamic properties when needed.
            for (name, typ) in this_props {
                match info.properties.get_mut(&name) {
                    Some(prop) => prop.typ.union(&typ),
                    None => {
                        let mut typ = typ;
                        typ.mark_imprecise();
                        info.properties.insert(name, PropertyInfo {
                            typ,
                            flags: PropFlags::empty(),
                        });
                    }
                }
            }
        }

        self.symbols.classes.insert(fqn, info);
    }

    /// Build one function or method record: parameters from doc over hint
    /// over default, return type as the union of doc, hint and unified body
    /// returns.
    fn build_func(
        &mut self,
        func: &FuncDecl,
        class: Option<&ClassCtx>,
        is_static: bool,
    ) -> (FunctionInfo, Vec<(String, TypeSet)>) {
        let doc = func.doc.as_deref().map(DocBlock::parse).unwrap_or_default();
        self.note_doc(&doc, func.span);

        let mut walker = FuncWalker::new(
            &self.file.namespace,
            &self.file.path,
            class,
            &mut self.shapes,
            &mut self.diagnostics,
        );
        let params = walker.build_params(&func.params, &doc);
        if let Some(class) = class
            && !is_static
        {
            walker
                .scope
                .replace_var("this", TypeSet::imprecise(class.fqn.clone()));
        }

        let mut typ = TypeSet::new();
        for raw in &doc.returns {
            match walker.doc_set(raw) {
                Some(set) => typ.union(&set),
                None => typ.insert_imprecise("mixed"),
            }
        }
        if let Some(hint) = &func.return_hint {
            for atom in normalize::hint_atoms(hint, &walker.type_ctx()) {
                typ.insert_imprecise(atom);
            }
        }

        if let Some(body) = &func.body {
            walker.walk_block(body);
            if typ.is_empty() && walker.returns.is_empty() {
                // No return sources at all: the function yields void.
                typ.insert_imprecise("void");
            } else {
                typ.union(&walker.returns);
                if walker.saw_bare_return {
                    typ.insert_imprecise("null");
                }
            }
        }

        let this_props = std::mem::take(&mut walker.this_props);
        drop(walker);
        (
            FunctionInfo {
                name: func.name.clone(),
                params,
                typ,
                flags: FuncFlags::empty(),
            },
            this_props,
        )
    }

    fn note_doc(&mut self, block: &DocBlock, span: Span) {
        for notice in &block.notices {
            self.diagnostics.push(Diagnostic::notice(
                "phpdocLint",
                &self.file.path,
                span,
                notice.message.clone(),
            ));
        }
    }
}

/// Parse a raw doc type string and normalize it into an (imprecise) set.
fn doc_set(raw: &str, ctx: &TypeContext<'_>, shapes: &mut ShapeTable) -> Option<TypeSet> {
    let (expr, _) = typestr::parse_prefix(raw).ok()?;
    let mut set = TypeSet::new();
    for atom in normalize::doc_type_atoms(&expr, ctx, shapes) {
        set.insert(atom);
    }
    set.mark_imprecise();
    Some(set)
}

/// Walks one body: tracks the variable scope, collects return types and
/// `$this->prop` assignments, emits lazy terms for everything it cannot
/// type on the spot.
struct FuncWalker<'a> {
    namespace: &'a str,
    file: &'a str,
    class: Option<&'a ClassCtx>,
    shapes: &'a mut ShapeTable,
    diagnostics: &'a mut Vec<Diagnostic>,
    scope: Scope,
    returns: TypeSet,
    saw_bare_return: bool,
    this_props: Vec<(String, TypeSet)>,
}

impl<'a> FuncWalker<'a> {
    fn new(
        namespace: &'a str,
        file: &'a str,
        class: Option<&'a ClassCtx>,
        shapes: &'a mut ShapeTable,
        diagnostics: &'a mut Vec<Diagnostic>,
    ) -> Self {
        FuncWalker {
            namespace,
            file,
            class,
            shapes,
            diagnostics,
            scope: Scope::new(),
            returns: TypeSet::new(),
            saw_bare_return: false,
            this_props: Vec::new(),
        }
    }

    fn type_ctx(&self) -> TypeContext<'a> {
        TypeContext {
            namespace: self.namespace,
            class: self.class.map(|c| c.fqn.as_str()),
            parent: self.class.and_then(|c| c.parent.as_deref()),
        }
    }

    fn doc_set(&mut self, raw: &str) -> Option<TypeSet> {
        let ctx = self.type_ctx();
        doc_set(raw, &ctx, self.shapes)
    }

    fn build_params(&mut self, params: &[Param], doc: &DocBlock) -> Vec<ParamInfo> {
        let mut out = Vec::new();
        for param in params {
            let doc_typ = doc
                .params
                .iter()
                .find(|tag| tag.name.as_deref() == Some(param.name.as_str()))
                .and_then(|tag| tag.typ.clone());
            let typ = match doc_typ {
                Some(raw) => self.doc_set(&raw).unwrap_or_else(TypeSet::mixed),
                None => match &param.hint {
                    Some(hint) => {
                        let ctx = self.type_ctx();
                        let mut set = TypeSet::new();
                        for atom in normalize::hint_atoms(hint, &ctx) {
                            set.insert(atom);
                        }
                        set.mark_imprecise();
                        set
                    }
                    None => match &param.default {
                        Some(default) => {
                            let mut set = self.infer_expr(default);
                            set.mark_imprecise();
                            set
                        }
                        None => TypeSet::mixed(),
                    },
                },
            };
            self.scope.replace_var(&param.name, typ.clone());
            out.push(ParamInfo {
                name: param.name.clone(),
                typ,
                by_ref: param.by_ref,
            });
        }
        out
    }

    // -- statements ---------------------------------------------------------

    fn walk_block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.walk_stmt(stmt);
        }
    }

    fn walk_stmt(&mut self, stmt: &Stmt) {
        if let Some(doc) = &stmt.doc {
            self.apply_stmt_doc(doc, stmt);
        }
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.infer_expr(expr);
            }
            StmtKind::Echo(exprs) => {
                for expr in exprs {
                    self.infer_expr(expr);
                }
            }
            StmtKind::Return(Some(expr)) => {
                let typ = self.infer_expr(expr);
                self.returns.union(&typ);
            }
            StmtKind::Return(None) => {
                self.saw_bare_return = true;
            }
            StmtKind::Throw(expr) => {
                // Throwing contributes nothing to the return union.
                self.infer_expr(expr);
            }
            StmtKind::If {
                cond,
                then,
                elseifs,
                r#else,
            } => {
                self.infer_expr(cond);
                self.walk_branch(then);
                for (cond, body) in elseifs {
                    self.infer_expr(cond);
                    self.walk_branch(body);
                }
                if let Some(body) = r#else {
                    self.walk_branch(body);
                }
            }
            StmtKind::Switch { subject, cases } => {
                self.infer_expr(subject);
                for case in cases {
                    if let Some(cond) = &case.cond {
                        self.infer_expr(cond);
                    }
                    self.walk_branch(&case.body);
                }
            }
            StmtKind::Foreach {
                array,
                key_var,
                value_var,
                by_ref: _,
                body,
            } => {
                let array_typ = self.infer_expr(array);
                let saved = self.scope.clone();
                let element = wrap_each(&array_typ, |term| LazyType::ElementOf(Box::new(term)));
                self.scope.replace_var(value_var, element);
                if let Some(key) = key_var {
                    self.scope.replace_var(key, TypeSet::mixed());
                }
                self.walk_block(body);
                let branch = std::mem::replace(&mut self.scope, saved);
                self.scope.absorb_branch(branch);
            }
            StmtKind::Try {
                body,
                catches,
                finally,
            } => {
                self.walk_branch(body);
                for catch in catches {
                    let saved = self.scope.clone();
                    let ctx = self.type_ctx();
                    let mut caught = TypeSet::new();
                    for name in &catch.types {
                        caught.insert(ctx.qualify(name));
                    }
                    caught.mark_imprecise();
                    self.scope.replace_var(&catch.var, caught);
                    self.walk_block(&catch.body);
                    let branch = std::mem::replace(&mut self.scope, saved);
                    self.scope.absorb_branch(branch);
                }
                if let Some(body) = finally {
                    self.walk_branch(body);
                }
            }
            StmtKind::Global(names) => {
                for name in names {
                    self.scope.replace_var(
                        name,
                        TypeSet::imprecise(LazyType::GlobalVar(name.clone()).encode()),
                    );
                }
            }
            StmtKind::Block(stmts) => self.walk_block(stmts),
        }
    }

    /// Walk a conditional branch in a cloned scope, then union every
    /// binding back: branch assignments widen instead of replacing.
    fn walk_branch(&mut self, stmts: &[Stmt]) {
        let saved = self.scope.clone();
        self.walk_block(stmts);
        let branch = std::mem::replace(&mut self.scope, saved);
        self.scope.absorb_branch(branch);
    }

    /// `/** @var T $x */` above a statement pins `$x` to `T`: the type
    /// unions with whatever is known and later assignments union too.
    fn apply_stmt_doc(&mut self, doc: &str, stmt: &Stmt) {
        let block = DocBlock::parse(doc);
        for notice in &block.notices {
            self.diagnostics.push(Diagnostic::notice(
                "phpdocLint",
                self.file,
                stmt.span,
                notice.message.clone(),
            ));
        }
        for tag in &block.vars {
            let Some(typ) = tag.typ.as_deref().and_then(|raw| self.doc_set(raw)) else {
                continue;
            };
            let name = tag.name.clone().or_else(|| assign_target_var(stmt));
            if let Some(name) = name {
                self.scope.annotate_var(&name, &typ);
            }
        }
    }

    // -- expressions --------------------------------------------------------

    fn infer_expr(&mut self, expr: &Expr) -> TypeSet {
        match &expr.kind {
            ExprKind::IntLit(_) => TypeSet::precise("int"),
            ExprKind::FloatLit(_) => TypeSet::precise("float"),
            ExprKind::StringLit(_) => TypeSet::precise("string"),
            ExprKind::BoolLit(_) => TypeSet::precise("bool"),
            ExprKind::NullLit => TypeSet::precise("null"),

            ExprKind::Var(name) => match self.scope.get_type(name) {
                Some(typ) => typ.clone(),
                None => TypeSet::mixed(),
            },

            ExprKind::ConstFetch(name) => {
                let fqn = if name.starts_with('\\') {
                    name.clone()
                } else {
                    self.type_ctx().qualify(name)
                };
                TypeSet::imprecise(LazyType::ConstResult(fqn).encode())
            }

            ExprKind::ClassConstFetch { class, name } => {
                if name == "class" {
                    return TypeSet::precise("string");
                }
                match self.class_ref_name(class) {
                    Some(class) => TypeSet::imprecise(
                        LazyType::ClassConst {
                            class,
                            name: name.clone(),
                        }
                        .encode(),
                    ),
                    None => TypeSet::mixed(),
                }
            }

            ExprKind::PropFetch { obj, name } => {
                let recv = self.infer_expr(obj);
                wrap_each(&recv, |term| LazyType::PropertyOf {
                    prop: name.clone(),
                    recv: Box::new(term),
                })
            }

            ExprKind::StaticPropFetch { class, name } => match self.class_ref_name(class) {
                Some(class) => TypeSet::imprecise(
                    LazyType::PropertyOf {
                        prop: format!("${name}"),
                        recv: Box::new(LazyType::Static(class)),
                    }
                    .encode(),
                ),
                None => TypeSet::mixed(),
            },

            ExprKind::DimFetch { array, dim } => {
                let recv = self.infer_expr(array);
                let key = dim.as_deref().and_then(literal_key);
                if let Some(dim) = dim
                    && literal_key(dim).is_none()
                {
                    self.infer_expr(dim);
                }
                match key {
                    Some(key) => wrap_each(&recv, |term| LazyType::ElementOfKey {
                        key: key.clone(),
                        recv: Box::new(term),
                    }),
                    None => wrap_each(&recv, |term| LazyType::ElementOf(Box::new(term))),
                }
            }

            ExprKind::Call { name, args } => {
                for arg in args {
                    self.infer_expr(arg);
                }
                let fqn = if name.starts_with('\\') {
                    name.clone()
                } else {
                    self.type_ctx().qualify(name)
                };
                TypeSet::imprecise(LazyType::CallResult(fqn).encode())
            }

            ExprKind::MethodCall { obj, name, args } => {
                let recv = self.infer_expr(obj);
                for arg in args {
                    self.infer_expr(arg);
                }
                wrap_each(&recv, |term| LazyType::MethodResult {
                    method: name.clone(),
                    recv: Box::new(term),
                    static_call: false,
                })
            }

            ExprKind::StaticCall { class, name, args } => {
                for arg in args {
                    self.infer_expr(arg);
                }
                match class {
                    ClassRef::Expr(obj) => {
                        // `$obj::m()` binds to the runtime class of `$obj`.
                        let recv = self.infer_expr(obj);
                        wrap_each(&recv, |term| LazyType::MethodResult {
                            method: name.clone(),
                            recv: Box::new(LazyType::Instance(Box::new(term))),
                            static_call: true,
                        })
                    }
                    _ => match self.class_ref_name(class) {
                        Some(class) => TypeSet::imprecise(
                            LazyType::MethodResult {
                                method: name.clone(),
                                recv: Box::new(LazyType::Static(class)),
                                static_call: true,
                            }
                            .encode(),
                        ),
                        None => TypeSet::mixed(),
                    },
                }
            }

            ExprKind::New { class, args } => {
                for arg in args {
                    self.infer_expr(arg);
                }
                match class {
                    ClassRef::Expr(inner) => {
                        let of = self.infer_expr(inner);
                        wrap_each(&of, |term| LazyType::Instance(Box::new(term)))
                    }
                    _ => match self.class_ref_name(class) {
                        Some(name) => TypeSet::precise(name),
                        None => TypeSet::mixed(),
                    },
                }
            }

            ExprKind::Clone(inner) => self.infer_expr(inner),

            ExprKind::Cast { kind, expr } => {
                self.infer_expr(expr);
                match kind {
                    CastKind::Int => TypeSet::precise("int"),
                    CastKind::Float => TypeSet::precise("float"),
                    CastKind::String => TypeSet::precise("string"),
                    CastKind::Bool => TypeSet::precise("bool"),
                    CastKind::Array => TypeSet::precise("mixed[]"),
                    CastKind::Object => TypeSet::precise("\\stdClass"),
                }
            }

            ExprKind::Unary { op, expr: inner } => {
                let operand = self.infer_expr(inner);
                match op {
                    UnaryOp::Not => TypeSet::precise("bool"),
                    UnaryOp::BitNot => {
                        if operand.is("string") {
                            TypeSet::imprecise("string")
                        } else {
                            TypeSet::imprecise("int")
                        }
                    }
                    UnaryOp::Neg | UnaryOp::Plus => {
                        if operand.contains("float") {
                            TypeSet::imprecise("float")
                        } else {
                            TypeSet::imprecise("int")
                        }
                    }
                }
            }

            ExprKind::Binary { op, lhs, rhs } => self.infer_binary(*op, lhs, rhs),

            ExprKind::Ternary { cond, then, r#else } => {
                let cond_typ = self.infer_expr(cond);
                let then_typ = match then {
                    Some(then) => self.infer_expr(then),
                    // `a ?: b` reuses the condition's value.
                    None => cond_typ,
                };
                let else_typ = self.infer_expr(r#else);
                then_typ.united(&else_typ)
            }

            ExprKind::Closure { params, uses, body } => {
                self.walk_closure(params, uses, body);
                TypeSet::precise("\\Closure")
            }

            ExprKind::ArrayLit(items) => self.infer_array_lit(items),

            ExprKind::Assign { target, value } => {
                let typ = self.infer_expr(value);
                self.assign_to(target, typ.clone(), false);
                typ
            }

            ExprKind::AssignRef { target, value } => {
                // Reference aliasing defeats tracking: the place holds
                // `mixed` of whatever shape it was declared with.
                let value_typ = self.infer_expr(value);
                let typ = wrap_each(&value_typ, |term| LazyType::AssignRef(Box::new(term)));
                self.assign_to(target, typ.clone(), true);
                typ
            }
        }
    }

    fn infer_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> TypeSet {
        let left = self.infer_expr(lhs);
        let right = self.infer_expr(rhs);
        match op {
            BinaryOp::Concat => TypeSet::precise("string"),
            BinaryOp::BoolAnd | BinaryOp::BoolOr => TypeSet::precise("bool"),
            op if op.is_comparison() => TypeSet::precise("bool"),
            BinaryOp::Spaceship => TypeSet::imprecise("int"),
            BinaryOp::Coalesce => left.united(&right),
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                // String-with-string bit ops are byte ops in PHP.
                if left.is("string") && right.is("string") {
                    TypeSet::imprecise("string")
                } else {
                    TypeSet::imprecise("int")
                }
            }
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Mod => {
                self.numeric_result(lhs, rhs, "int")
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow => {
                // Known-int operands stay int; everything else (floats,
                // lazy imports, mixed) widens to float.
                let atom = if left.is("int") && right.is("int") {
                    "int"
                } else {
                    "float"
                };
                self.numeric_result(lhs, rhs, atom)
            }
            _ => TypeSet::mixed(),
        }
    }

    /// Numeric operators are precise only when both operand expressions
    /// fold to constants; a variable read on either side loses precision.
    fn numeric_result(&self, lhs: &Expr, rhs: &Expr, atom: &str) -> TypeSet {
        if is_foldable(lhs) && is_foldable(rhs) {
            TypeSet::precise(atom)
        } else {
            TypeSet::imprecise(atom)
        }
    }

    fn infer_array_lit(&mut self, items: &[ArrayItem]) -> TypeSet {
        if items.is_empty() {
            return TypeSet::imprecise(EMPTY_ARRAY);
        }
        let mut element: Option<&'static str> = None;
        let mut uniform = true;
        for item in items {
            if let Some(key) = &item.key {
                self.infer_expr(key);
            }
            self.infer_expr(&item.value);
            let kind = match item.value.kind {
                ExprKind::IntLit(_) => Some("int"),
                ExprKind::FloatLit(_) => Some("float"),
                ExprKind::StringLit(_) => Some("string"),
                ExprKind::BoolLit(_) => Some("bool"),
                _ => None,
            };
            match (kind, element) {
                (Some(kind), None) => element = Some(kind),
                (Some(kind), Some(seen)) if kind == seen => {}
                _ => uniform = false,
            }
        }
        match element {
            // Element promotion is inference, not observation: `[1, 2]`
            // is an imprecise `int[]`.
            Some(kind) if uniform => TypeSet::imprecise(format!("{kind}[]")),
            _ => TypeSet::imprecise("mixed[]"),
        }
    }

    fn walk_closure(&mut self, params: &[Param], uses: &[String], body: &[Stmt]) {
        let saved_scope = std::mem::take(&mut self.scope);
        let saved_returns = std::mem::take(&mut self.returns);
        let saved_bare = std::mem::replace(&mut self.saw_bare_return, false);

        for name in uses {
            if let Some(var) = saved_scope.get(name) {
                self.scope.replace_var(name, var.typ.clone());
            }
        }
        self.build_params(params, &DocBlock::default());
        self.walk_block(body);

        self.scope = saved_scope;
        self.returns = saved_returns;
        self.saw_bare_return = saved_bare;
    }

    /// Record an assignment's effect on its target.
    fn assign_to(&mut self, target: &Expr, typ: TypeSet, is_ref: bool) {
        match &target.kind {
            ExprKind::Var(name) => {
                self.scope.replace_var(name, typ);
            }
            ExprKind::DimFetch { .. } => {
                let mut depth = 0usize;
                let mut cursor = target;
                while let ExprKind::DimFetch { array, dim } = &cursor.kind {
                    if let Some(dim) = dim {
                        self.infer_expr(dim);
                    }
                    depth += 1;
                    cursor = array;
                }
                let ExprKind::Var(name) = &cursor.kind else {
                    return;
                };
                let name = name.clone();
                if is_ref {
                    // Whatever the nesting, a reference written through a
                    // dim fetch leaves a `mixed[]` behind.
                    self.scope.union_var(&name, &TypeSet::imprecise("mixed[]"));
                    return;
                }
                let mut wrapped = typ;
                for _ in 0..depth {
                    wrapped = wrap_each(&wrapped, |term| LazyType::ArrayOf(Box::new(term)));
                }
                self.scope.union_var(&name, &wrapped);
            }
            ExprKind::PropFetch { obj, name } => {
                if matches!(&obj.kind, ExprKind::Var(var) if var == "this") && self.class.is_some()
                {
                    self.this_props.push((name.clone(), typ));
                }
            }
            _ => {}
        }
    }

    /// The class a `new` / `::` reference names, fully qualified; `None`
    /// when it cannot be named statically.
    fn class_ref_name(&self, class: &ClassRef) -> Option<String> {
        match class {
            ClassRef::Name(name) => Some(if name.starts_with('\\') {
                name.clone()
            } else {
                self.type_ctx().qualify(name)
            }),
            ClassRef::SelfRef => self.class.map(|c| c.fqn.clone()),
            ClassRef::ParentRef => self.class.and_then(|c| c.parent.clone()),
            ClassRef::StaticRef => Some("static".to_string()),
            ClassRef::Expr(_) => None,
        }
    }
}

/// Wrap every atom of `recv` with `make`, producing an imprecise set.
/// An empty receiver wraps `mixed` so the term still resolves.
fn wrap_each(recv: &TypeSet, make: impl Fn(LazyType) -> LazyType) -> TypeSet {
    let mut out = TypeSet::new();
    if recv.is_empty() {
        out.insert(make(LazyType::Static("mixed".to_string())).encode());
    }
    for atom in recv.iter() {
        out.insert(make(LazyType::from_atom(atom)).encode());
    }
    out.mark_imprecise();
    out
}

/// The string form of a literal index key, when the dim is one.
fn literal_key(dim: &Expr) -> Option<String> {
    match &dim.kind {
        ExprKind::IntLit(value) => Some(value.to_string()),
        ExprKind::StringLit(value) if !value.chars().any(char::is_control) => Some(value.clone()),
        _ => None,
    }
}

/// Constant-foldable expressions: literals and arithmetic over them. These
/// are the only operator operands that keep a result precise.
fn is_foldable(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::IntLit(_)
        | ExprKind::FloatLit(_)
        | ExprKind::StringLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::NullLit => true,
        ExprKind::Binary { op, lhs, rhs } => {
            matches!(
                op,
                BinaryOp::Add
                    | BinaryOp::Sub
                    | BinaryOp::Mul
                    | BinaryOp::Div
                    | BinaryOp::Mod
                    | BinaryOp::Pow
                    | BinaryOp::Shl
                    | BinaryOp::Shr
            ) && is_foldable(lhs)
                && is_foldable(rhs)
        }
        _ => false,
    }
}

/// The variable a statement assigns to, for anonymous `@var` tags.
fn assign_target_var(stmt: &Stmt) -> Option<String> {
    if let StmtKind::Expr(expr) = &stmt.kind
        && let ExprKind::Assign { target, .. } = &expr.kind
        && let ExprKind::Var(name) = &target.kind
    {
        return Some(name.clone());
    }
    None
}
