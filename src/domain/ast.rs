// Syntax tree data structures for Discover.
// A tree is one source file. Statements and function declarations live in
// per-file arenas and are addressed by handles assigned when the file was parsed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::error::TreeError;

/// A line/column position in a source file. Lines and columns start at 1;
/// `Pos::NONE` marks nodes synthesized by a rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub const NONE: Pos = Pos { line: 0, col: 0 };

    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }

    pub fn is_none(self) -> bool {
        self.line == 0
    }

    /// The position just past this one, e.g. one past a closing brace.
    pub fn next(self) -> Pos {
        Pos::new(self.line, self.col + 1)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.line, self.col)
    }
}

/// Half-open source extent `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub const NONE: Span = Span { start: Pos::NONE, end: Pos::NONE };

    pub const fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    pub fn is_none(&self) -> bool {
        self.start.is_none()
    }

    /// Check if `other` is fully contained within `self`.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// True if the two extents share at least one position.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.start, self.end)
    }
}

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

arena_id!(
    /// Handle of a statement in its tree's statement arena.
    StmtId
);
arena_id!(
    /// Handle of a function declaration in its tree's function arena.
    FuncId
);

// ─────────────────────────────────────────────────────────────────────
// Expressions
// ─────────────────────────────────────────────────────────────────────

/// Expressions. Only calls and function literals carry positions: nothing
/// else in an expression influences block boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Ident { name: String },
    Lit { value: String },
    Call(CallExpr),
    FuncLit(FuncLit),
    Selector { x: Box<Expr>, sel: String },
    Index { x: Box<Expr>, index: Box<Expr> },
    Unary { op: String, x: Box<Expr> },
    Binary { x: Box<Expr>, op: String, y: Box<Expr> },
    Paren { x: Box<Expr> },
    /// `x.(T)`, or `x.(type)` in a type switch when `ty` is absent.
    TypeAssert { x: Box<Expr>, ty: Option<Box<Expr>> },
    Composite { ty: Option<Box<Expr>>, elts: Vec<Expr> },
    KeyValue { key: Box<Expr>, value: Box<Expr> },
    /// Anything the front end did not break down further (types, mostly).
    Raw { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    #[serde(default)]
    pub span: Span,
    pub fun: Box<Expr>,
    #[serde(default)]
    pub args: Vec<Expr>,
    /// The last argument is spread (`f(xs...)`).
    #[serde(default)]
    pub ellipsis: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncLit {
    #[serde(default)]
    pub span: Span,
    /// Parameter and result list as written, e.g. `(x int) error`.
    pub sig: String,
    pub body: StmtId,
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Expr {
        Expr::Ident { name: name.into() }
    }

    pub fn lit(value: impl Into<String>) -> Expr {
        Expr::Lit { value: value.into() }
    }

    pub fn call(fun: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call(CallExpr { span: Span::NONE, fun: Box::new(fun), args, ellipsis: false })
    }

    pub fn selector(x: Expr, sel: impl Into<String>) -> Expr {
        Expr::Selector { x: Box::new(x), sel: sel.into() }
    }

    pub fn index(x: Expr, index: Expr) -> Expr {
        Expr::Index { x: Box::new(x), index: Box::new(index) }
    }

    pub fn unary(op: impl Into<String>, x: Expr) -> Expr {
        Expr::Unary { op: op.into(), x: Box::new(x) }
    }

    pub fn binary(x: Expr, op: impl Into<String>, y: Expr) -> Expr {
        Expr::Binary { x: Box::new(x), op: op.into(), y: Box::new(y) }
    }

    /// Bodies of the function literals directly or transitively inside this
    /// expression, outermost first. Does not look into the bodies themselves.
    pub fn func_bodies(&self, out: &mut Vec<StmtId>) {
        match self {
            Expr::Ident { .. } | Expr::Lit { .. } | Expr::Raw { .. } => {}
            Expr::Call(call) => {
                call.fun.func_bodies(out);
                for arg in &call.args {
                    arg.func_bodies(out);
                }
            }
            Expr::FuncLit(lit) => out.push(lit.body),
            Expr::Selector { x, .. } | Expr::Unary { x, .. } | Expr::Paren { x } => x.func_bodies(out),
            Expr::Index { x, index } => {
                x.func_bodies(out);
                index.func_bodies(out);
            }
            Expr::Binary { x, y, .. } => {
                x.func_bodies(out);
                y.func_bodies(out);
            }
            Expr::TypeAssert { x, ty } => {
                x.func_bodies(out);
                if let Some(ty) = ty {
                    ty.func_bodies(out);
                }
            }
            Expr::Composite { ty, elts } => {
                if let Some(ty) = ty {
                    ty.func_bodies(out);
                }
                for elt in elts {
                    elt.func_bodies(out);
                }
            }
            Expr::KeyValue { key, value } => {
                key.func_bodies(out);
                value.func_bodies(out);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Statements
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StmtNode {
    pub span: Span,
    #[serde(flatten)]
    pub kind: StmtKind,
}

/// Every statement shape the tools understand. The set is closed: the
/// indexer, instrumenter and trimmer each match on it exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StmtKind {
    Expr { x: Expr },
    Assign { lhs: Vec<Expr>, op: String, rhs: Vec<Expr> },
    IncDec { x: Expr, inc: bool },
    Send { chan: Expr, value: Expr },
    Return { results: Vec<Expr> },
    Decl { decl: GenDecl },
    Empty,
    Block(Block),
    If { init: Option<StmtId>, cond: Expr, body: StmtId, els: Option<StmtId> },
    For { init: Option<StmtId>, cond: Option<Expr>, post: Option<StmtId>, body: StmtId },
    Range { key: Option<Expr>, value: Option<Expr>, define: bool, x: Expr, body: StmtId },
    Switch { init: Option<StmtId>, tag: Option<Expr>, clauses: ClauseList },
    TypeSwitch { init: Option<StmtId>, assign: StmtId, clauses: ClauseList },
    Select { clauses: ClauseList },
    Clause(Clause),
    Labeled { label: String, stmt: StmtId },
    Branch { tok: BranchTok, label: Option<String> },
    /// `go call`: the callee and its arguments are evaluated here, the call
    /// itself runs concurrently.
    Spawn { call: CallExpr },
    Defer { call: CallExpr },
}

/// `{ ... }`. `rbrace` is the position of the closing brace itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub lbrace: Pos,
    pub rbrace: Pos,
    pub stmts: Vec<StmtId>,
}

/// Body of a switch, type switch or select: every entry is a `Clause` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseList {
    pub lbrace: Pos,
    pub rbrace: Pos,
    pub clauses: Vec<StmtId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub head: ClauseHead,
    pub body: Vec<StmtId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClauseHead {
    Case { exprs: Vec<Expr> },
    Comm { comm: StmtId },
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchTok {
    Break,
    Continue,
    Goto,
    Fallthrough,
}

impl BranchTok {
    pub fn keyword(self) -> &'static str {
        match self {
            BranchTok::Break => "break",
            BranchTok::Continue => "continue",
            BranchTok::Goto => "goto",
            BranchTok::Fallthrough => "fallthrough",
        }
    }
}

impl StmtKind {
    pub fn expr(x: Expr) -> StmtKind {
        StmtKind::Expr { x }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Declarations
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDecl {
    pub span: Span,
    #[serde(default)]
    pub recv: Option<String>,
    pub name: String,
    /// Parameter and result list as written, e.g. `(a, b int) error`.
    pub sig: String,
    #[serde(default)]
    pub body: Option<StmtId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenDecl {
    #[serde(default)]
    pub span: Span,
    pub keyword: DeclKeyword,
    pub specs: Vec<Spec>,
}

impl GenDecl {
    /// Initializer expressions of value specs.
    pub fn values(&self) -> impl Iterator<Item = &Expr> + '_ {
        self.specs.iter().flat_map(|spec| match spec {
            Spec::Value { values, .. } => values.as_slice(),
            _ => &[],
        })
    }

    pub fn func_bodies(&self, out: &mut Vec<StmtId>) {
        for value in self.values() {
            value.func_bodies(out);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKeyword {
    Import,
    Const,
    Type,
    Var,
}

impl DeclKeyword {
    pub fn keyword(self) -> &'static str {
        match self {
            DeclKeyword::Import => "import",
            DeclKeyword::Const => "const",
            DeclKeyword::Type => "type",
            DeclKeyword::Var => "var",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Spec {
    Import { name: Option<String>, path: String },
    Value { names: Vec<String>, ty: Option<Expr>, values: Vec<Expr> },
    Type { name: String, ty: Expr },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decl {
    Func { func: FuncId },
    Gen(GenDecl),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentGroup {
    pub span: Span,
    /// Raw comment text including the `//` or `/* */` markers.
    pub lines: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────
// Tree
// ─────────────────────────────────────────────────────────────────────

/// One parsed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxTree {
    /// Logical path as it appears in coverage profiles: `<module dir>/<file>`.
    pub path: String,
    pub package: String,
    /// Position of the package clause; comments before it lead the file.
    #[serde(default)]
    pub package_pos: Pos,
    #[serde(default)]
    pub decls: Vec<Decl>,
    #[serde(default)]
    pub comments: Vec<CommentGroup>,
    #[serde(default)]
    pub funcs: Vec<FuncDecl>,
    #[serde(default)]
    pub stmts: Vec<StmtNode>,
}

impl SyntaxTree {
    pub fn new(path: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            package: package.into(),
            package_pos: Pos::NONE,
            decls: Vec::new(),
            comments: Vec::new(),
            funcs: Vec::new(),
            stmts: Vec::new(),
        }
    }

    /// File name without the module directory.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Module directory part of the logical path, empty for a bare file name.
    pub fn module_dir(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[..idx],
            None => "",
        }
    }

    pub fn stmt(&self, id: StmtId) -> &StmtNode {
        &self.stmts[id.index()]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut StmtNode {
        &mut self.stmts[id.index()]
    }

    pub fn func(&self, id: FuncId) -> &FuncDecl {
        &self.funcs[id.index()]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut FuncDecl {
        &mut self.funcs[id.index()]
    }

    pub fn push_stmt(&mut self, span: Span, kind: StmtKind) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(StmtNode { span, kind });
        id
    }

    pub fn push_func(&mut self, decl: FuncDecl) -> FuncId {
        let id = FuncId(self.funcs.len() as u32);
        self.funcs.push(decl);
        id
    }

    /// The block behind a body handle. Bodies are checked to be blocks by
    /// `validate`, so anything else here is a broken tree.
    pub fn block(&self, id: StmtId) -> &Block {
        match &self.stmt(id).kind {
            StmtKind::Block(block) => block,
            other => panic!("statement {} is not a block: {:?}", id, other),
        }
    }

    pub fn block_mut(&mut self, id: StmtId) -> &mut Block {
        match &mut self.stmt_mut(id).kind {
            StmtKind::Block(block) => block,
            other => panic!("statement {} is not a block: {:?}", id, other),
        }
    }

    /// Function declarations in declaration order.
    pub fn func_decls(&self) -> impl Iterator<Item = FuncId> + '_ {
        self.decls.iter().filter_map(|decl| match decl {
            Decl::Func { func } => Some(*func),
            Decl::Gen(_) => None,
        })
    }

    /// Statements directly nested in `id`: structural children first, then
    /// the bodies of function literals in its expressions.
    pub fn child_stmts(&self, id: StmtId) -> Vec<StmtId> {
        let (nested, lits) = self.split_children(&self.stmt(id).kind);
        nested.into_iter().map(|(child, _)| child).chain(lits).collect()
    }

    /// Structural children of `id` (bodies, clauses, wrapped statements).
    pub fn nested_stmts(&self, id: StmtId) -> Vec<StmtId> {
        self.split_children(&self.stmt(id).kind).0.into_iter().map(|(child, _)| child).collect()
    }

    /// Bodies of the function literals appearing in the expressions of `id`
    /// itself, outermost first.
    pub fn func_lit_bodies(&self, id: StmtId) -> Vec<StmtId> {
        self.split_children(&self.stmt(id).kind).1
    }

    /// Check that every handle resolves and that bodies, clause lists and
    /// literal bodies have the shape the passes rely on.
    pub fn validate(&self) -> Result<(), TreeError> {
        for decl in &self.decls {
            match decl {
                Decl::Func { func } => {
                    if func.index() >= self.funcs.len() {
                        return Err(TreeError::DanglingFunc { path: self.path.clone(), id: func.0 });
                    }
                }
                Decl::Gen(gen) => self.check_gen_decl(gen)?,
            }
        }
        for func in &self.funcs {
            if let Some(body) = func.body {
                self.check(body, Shape::Block)?;
            }
        }
        for node in &self.stmts {
            let (nested, lits) = self.split_children(&node.kind);
            for (child, shape) in nested {
                self.check(child, shape)?;
            }
            for body in lits {
                self.check(body, Shape::Block)?;
            }
        }
        self.check_single_parent()
    }

    /// Every statement is referenced from at most one place: a function,
    /// a top-level declaration or one other statement. A tree where some
    /// statement is shared or reaches itself would never finish a walk.
    fn check_single_parent(&self) -> Result<(), TreeError> {
        let mut roots: Vec<StmtId> = self.funcs.iter().filter_map(|f| f.body).collect();
        for decl in &self.decls {
            if let Decl::Gen(gen) = decl {
                gen.func_bodies(&mut roots);
            }
        }
        let children = self.stmts.iter().flat_map(|node| {
            let (nested, lits) = self.split_children(&node.kind);
            nested.into_iter().map(|(child, _)| child).chain(lits)
        });

        let mut parented = vec![false; self.stmts.len()];
        for id in roots.into_iter().chain(children) {
            let seen = &mut parented[id.index()];
            if *seen {
                return Err(TreeError::SharedStmt { path: self.path.clone(), id: id.0 });
            }
            *seen = true;
        }
        Ok(())
    }

    fn check_gen_decl(&self, gen: &GenDecl) -> Result<(), TreeError> {
        let mut bodies = Vec::new();
        gen.func_bodies(&mut bodies);
        for body in bodies {
            self.check(body, Shape::Block)?;
        }
        Ok(())
    }

    fn check(&self, id: StmtId, shape: Shape) -> Result<(), TreeError> {
        let Some(node) = self.stmts.get(id.index()) else {
            return Err(TreeError::DanglingStmt { path: self.path.clone(), id: id.0 });
        };
        let ok = match shape {
            Shape::Any => true,
            Shape::Block => matches!(node.kind, StmtKind::Block(_)),
            Shape::Clause => matches!(node.kind, StmtKind::Clause(_)),
            Shape::Else => matches!(node.kind, StmtKind::Block(_) | StmtKind::If { .. }),
        };
        if ok {
            Ok(())
        } else {
            Err(TreeError::UnexpectedShape {
                path: self.path.clone(),
                id: id.0,
                expected: shape.name(),
            })
        }
    }

    fn split_children(&self, kind: &StmtKind) -> (Vec<(StmtId, Shape)>, Vec<StmtId>) {
        let mut out = Vec::new();
        let mut exprs: Vec<&Expr> = Vec::new();
        match kind {
            StmtKind::Expr { x } => exprs.push(x),
            StmtKind::Assign { lhs, rhs, .. } => exprs.extend(lhs.iter().chain(rhs.iter())),
            StmtKind::IncDec { x, .. } => exprs.push(x),
            StmtKind::Send { chan, value } => exprs.extend([chan, value]),
            StmtKind::Return { results } => exprs.extend(results.iter()),
            StmtKind::Decl { decl } => exprs.extend(decl.values()),
            StmtKind::Empty | StmtKind::Branch { .. } => {}
            StmtKind::Block(block) => out.extend(block.stmts.iter().map(|s| (*s, Shape::Any))),
            StmtKind::If { init, cond, body, els } => {
                out.extend(init.map(|s| (s, Shape::Any)));
                exprs.push(cond);
                out.push((*body, Shape::Block));
                out.extend(els.map(|s| (s, Shape::Else)));
            }
            StmtKind::For { init, cond, post, body } => {
                out.extend(init.map(|s| (s, Shape::Any)));
                exprs.extend(cond.iter());
                out.extend(post.map(|s| (s, Shape::Any)));
                out.push((*body, Shape::Block));
            }
            StmtKind::Range { key, value, x, body, .. } => {
                exprs.extend(key.iter().chain(value.iter()));
                exprs.push(x);
                out.push((*body, Shape::Block));
            }
            StmtKind::Switch { init, tag, clauses } => {
                out.extend(init.map(|s| (s, Shape::Any)));
                exprs.extend(tag.iter());
                out.extend(clauses.clauses.iter().map(|s| (*s, Shape::Clause)));
            }
            StmtKind::TypeSwitch { init, assign, clauses } => {
                out.extend(init.map(|s| (s, Shape::Any)));
                out.push((*assign, Shape::Any));
                out.extend(clauses.clauses.iter().map(|s| (*s, Shape::Clause)));
            }
            StmtKind::Select { clauses } => {
                out.extend(clauses.clauses.iter().map(|s| (*s, Shape::Clause)));
            }
            StmtKind::Clause(clause) => {
                match &clause.head {
                    ClauseHead::Case { exprs: case } => exprs.extend(case.iter()),
                    ClauseHead::Comm { comm } => out.push((*comm, Shape::Any)),
                    ClauseHead::Default => {}
                }
                out.extend(clause.body.iter().map(|s| (*s, Shape::Any)));
            }
            StmtKind::Labeled { stmt, .. } => out.push((*stmt, Shape::Any)),
            StmtKind::Spawn { call } | StmtKind::Defer { call } => {
                exprs.push(&call.fun);
                exprs.extend(call.args.iter());
            }
        }
        let mut bodies = Vec::new();
        for expr in exprs {
            expr.func_bodies(&mut bodies);
        }
        (out, bodies)
    }
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Any,
    Block,
    Clause,
    Else,
}

impl Shape {
    fn name(self) -> &'static str {
        match self {
            Shape::Any => "statement",
            Shape::Block => "block",
            Shape::Clause => "clause",
            Shape::Else => "block or if",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_contains() {
        let outer = Span::new(Pos::new(10, 1), Pos::new(20, 2));
        let inner = Span::new(Pos::new(15, 5), Pos::new(15, 10));
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn test_span_overlaps_is_half_open() {
        let a = Span::new(Pos::new(1, 1), Pos::new(2, 5));
        let b = Span::new(Pos::new(2, 5), Pos::new(3, 1));
        let c = Span::new(Pos::new(2, 4), Pos::new(3, 1));
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
    }

    #[test]
    fn test_logical_path_parts() {
        let tree = SyntaxTree::new("example.com/app/server/main.go", "main");
        assert_eq!(tree.file_name(), "main.go");
        assert_eq!(tree.module_dir(), "example.com/app/server");

        let bare = SyntaxTree::new("main.go", "main");
        assert_eq!(bare.file_name(), "main.go");
        assert_eq!(bare.module_dir(), "");
    }

    #[test]
    fn test_validate_rejects_non_block_body() {
        let mut tree = SyntaxTree::new("p/a.go", "p");
        let leaf = tree.push_stmt(Span::NONE, StmtKind::Empty);
        let func = tree.push_func(FuncDecl {
            span: Span::NONE,
            recv: None,
            name: "f".into(),
            sig: "()".into(),
            body: Some(leaf),
        });
        tree.decls.push(Decl::Func { func });
        let err = tree.validate().unwrap_err();
        assert!(matches!(err, TreeError::UnexpectedShape { expected: "block", .. }));
    }

    #[test]
    fn test_validate_rejects_dangling_handle() {
        let mut tree = SyntaxTree::new("p/a.go", "p");
        tree.push_stmt(
            Span::NONE,
            StmtKind::Labeled { label: "L".into(), stmt: StmtId(7) },
        );
        assert!(matches!(tree.validate(), Err(TreeError::DanglingStmt { id: 7, .. })));
    }

    fn empty_func(tree: &mut SyntaxTree, body: StmtId) {
        let func = tree.push_func(FuncDecl {
            span: Span::NONE,
            recv: None,
            name: "f".into(),
            sig: "()".into(),
            body: Some(body),
        });
        tree.decls.push(Decl::Func { func });
    }

    #[test]
    fn test_validate_rejects_self_wrapping_label() {
        let mut tree = SyntaxTree::new("p/a.go", "p");
        let body = tree.push_stmt(
            Span::NONE,
            StmtKind::Block(Block { lbrace: Pos::NONE, rbrace: Pos::NONE, stmts: vec![StmtId(1)] }),
        );
        tree.push_stmt(Span::NONE, StmtKind::Labeled { label: "L".into(), stmt: StmtId(1) });
        empty_func(&mut tree, body);
        assert!(matches!(tree.validate(), Err(TreeError::SharedStmt { id: 1, .. })));
    }

    #[test]
    fn test_validate_rejects_statement_in_two_lists() {
        let mut tree = SyntaxTree::new("p/a.go", "p");
        let leaf = tree.push_stmt(Span::NONE, StmtKind::Empty);
        let inner = tree.push_stmt(
            Span::NONE,
            StmtKind::Block(Block { lbrace: Pos::NONE, rbrace: Pos::NONE, stmts: vec![leaf] }),
        );
        let body = tree.push_stmt(
            Span::NONE,
            StmtKind::Block(Block { lbrace: Pos::NONE, rbrace: Pos::NONE, stmts: vec![leaf, inner] }),
        );
        empty_func(&mut tree, body);
        assert!(matches!(tree.validate(), Err(TreeError::SharedStmt { id: 0, .. })));
    }

    #[test]
    fn test_validate_rejects_body_shared_by_two_functions() {
        let mut tree = SyntaxTree::new("p/a.go", "p");
        let body = tree.push_stmt(
            Span::NONE,
            StmtKind::Block(Block { lbrace: Pos::NONE, rbrace: Pos::NONE, stmts: Vec::new() }),
        );
        empty_func(&mut tree, body);
        empty_func(&mut tree, body);
        assert!(matches!(tree.validate(), Err(TreeError::SharedStmt { id: 0, .. })));
    }

    #[test]
    fn test_built_trees_validate() {
        use crate::domain::builder::{call, ident, TreeBuilder};

        let mut b = TreeBuilder::new("p/a.go", "p");
        b.func("main", |body| {
            let chain = body.if_(call("f"), |then| {
                then.call("a");
            });
            let chain = body.else_if(chain, ident("ok"), |then| {
                then.ret(Vec::new());
            });
            body.else_(chain, |els| {
                els.call("b");
            });
            body.labeled("outer", |l| {
                l.range(Some("k"), ident("items"), |inner| {
                    inner.call("use");
                });
            });
            body.go_func(|inner| {
                inner.call("work");
            });
        });
        assert!(b.finish().validate().is_ok());
    }

    #[test]
    fn test_stmt_node_json_shape() {
        let json = r#"{"span":{"start":{"line":3,"col":2},"end":{"line":3,"col":9}},
                       "kind":"expr","x":{"kind":"call","fun":{"kind":"ident","name":"run"}}}"#;
        let node: StmtNode = serde_json::from_str(json).unwrap();
        match node.kind {
            StmtKind::Expr { x: Expr::Call(call) } => {
                assert_eq!(*call.fun, Expr::ident("run"));
                assert!(call.args.is_empty());
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }
}
