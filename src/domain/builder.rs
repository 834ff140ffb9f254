//! Programmatic construction of positioned syntax trees.
//!
//! The builder lays statements out the way a formatter would: one simple
//! statement per line, opening braces at the end of a header line, closing
//! braces on their own line at the header's column. Columns of header parts
//! are fixed offsets, so positions are consistent rather than exact.

use crate::domain::ast::{
    Block, BranchTok, CallExpr, Clause, ClauseHead, ClauseList, CommentGroup, Decl, DeclKeyword,
    Expr, FuncDecl, FuncId, FuncLit, GenDecl, Pos, Span, Spec, StmtId, StmtKind, SyntaxTree,
};

/// Width given to every simple statement and header part.
const WIDTH: u32 = 10;

pub fn ident(name: &str) -> Expr {
    Expr::ident(name)
}

/// `name()`
pub fn call(name: &str) -> Expr {
    Expr::call(Expr::ident(name), Vec::new())
}

/// `name(args...)`
pub fn call_with(name: &str, args: Vec<Expr>) -> Expr {
    Expr::call(Expr::ident(name), args)
}

pub fn call_expr(name: &str, args: Vec<Expr>) -> CallExpr {
    CallExpr { span: Span::NONE, fun: Box::new(Expr::ident(name)), args, ellipsis: false }
}

/// `name := value`
pub fn define(name: &str, value: Expr) -> StmtKind {
    StmtKind::Assign { lhs: vec![Expr::ident(name)], op: ":=".to_string(), rhs: vec![value] }
}

/// `name++`
pub fn inc(name: &str) -> StmtKind {
    StmtKind::IncDec { x: Expr::ident(name), inc: true }
}

/// Builds a file; top-level declarations are separated by a blank line.
pub struct TreeBuilder {
    tree: SyntaxTree,
    line: u32,
}

impl TreeBuilder {
    pub fn new(path: &str, package: &str) -> Self {
        let mut tree = SyntaxTree::new(path, package);
        tree.package_pos = Pos::new(1, 1);
        Self { tree, line: 3 }
    }

    pub fn import(&mut self, path: &str) -> &mut Self {
        let span = self.decl_span(10 + path.len() as u32);
        self.tree.decls.push(Decl::Gen(GenDecl {
            span,
            keyword: DeclKeyword::Import,
            specs: vec![Spec::Import { name: None, path: path.to_string() }],
        }));
        self.line += 2;
        self
    }

    pub fn var(&mut self, name: &str, value: Expr) -> &mut Self {
        let span = self.decl_span(WIDTH * 2);
        self.tree.decls.push(Decl::Gen(GenDecl {
            span,
            keyword: DeclKeyword::Var,
            specs: vec![Spec::Value { names: vec![name.to_string()], ty: None, values: vec![value] }],
        }));
        self.line += 2;
        self
    }

    /// A comment on its own line right before the next declaration.
    pub fn comment(&mut self, text: &str) -> &mut Self {
        let span = self.decl_span(text.len() as u32);
        self.tree.comments.push(CommentGroup { span, lines: vec![text.to_string()] });
        self.line += 1;
        self
    }

    pub fn func(&mut self, name: &str, build: impl FnOnce(&mut BodyBuilder<'_>)) -> FuncId {
        let start = Pos::new(self.line, 1);
        // func name() {
        let lbrace = Pos::new(self.line, 9 + name.len() as u32);
        let body = BodyBuilder::body(&mut self.tree, &mut self.line, lbrace, 1, build);
        let end = self.tree.stmt(body).span.end;
        let func = self.tree.push_func(FuncDecl {
            span: Span::new(start, end),
            recv: None,
            name: name.to_string(),
            sig: "()".to_string(),
            body: Some(body),
        });
        self.tree.decls.push(Decl::Func { func });
        self.line += 2;
        func
    }

    pub fn finish(self) -> SyntaxTree {
        self.tree
    }

    fn decl_span(&self, width: u32) -> Span {
        Span::new(Pos::new(self.line, 1), Pos::new(self.line, 1 + width))
    }
}

/// The `if` statements of an `if / else if` chain still open for an `else`.
pub struct IfChain {
    ids: Vec<StmtId>,
    rbrace_line: u32,
    col: u32,
}

/// Appends statements to one statement list.
pub struct BodyBuilder<'a> {
    tree: &'a mut SyntaxTree,
    line: &'a mut u32,
    col: u32,
    stmts: Vec<StmtId>,
}

impl<'a> BodyBuilder<'a> {
    /// Lays out a block opening at `lbrace` whose closing brace sits in `col`.
    /// Leaves `line` on the closing brace's line.
    fn body(
        tree: &mut SyntaxTree,
        line: &mut u32,
        lbrace: Pos,
        col: u32,
        build: impl FnOnce(&mut BodyBuilder<'_>),
    ) -> StmtId {
        *line = lbrace.line + 1;
        let stmts = {
            let mut inner = BodyBuilder { tree: &mut *tree, line: &mut *line, col: col + 1, stmts: Vec::new() };
            build(&mut inner);
            inner.stmts
        };
        let rbrace = Pos::new(*line, col);
        tree.push_stmt(Span::new(lbrace, rbrace.next()), StmtKind::Block(Block { lbrace, rbrace, stmts }))
    }

    fn here(&self) -> Pos {
        Pos::new(*self.line, self.col)
    }

    fn header_stmt(&mut self, start: Pos, offset: u32, kind: StmtKind) -> StmtId {
        let at = Pos::new(start.line, start.col + offset);
        self.tree.push_stmt(Span::new(at, Pos::new(at.line, at.col + WIDTH)), kind)
    }

    /// Pushes a compound statement that ends where `last` ends.
    fn close(&mut self, start: Pos, end: Pos, kind: StmtKind) -> StmtId {
        let id = self.tree.push_stmt(Span::new(start, end), kind);
        self.stmts.push(id);
        *self.line += 1;
        id
    }

    pub fn stmt(&mut self, kind: StmtKind) -> StmtId {
        let at = self.here();
        let id = self.tree.push_stmt(Span::new(at, Pos::new(at.line, at.col + WIDTH)), kind);
        self.stmts.push(id);
        *self.line += 1;
        id
    }

    pub fn expr(&mut self, x: Expr) -> StmtId {
        self.stmt(StmtKind::Expr { x })
    }

    /// `name()` as a statement.
    pub fn call(&mut self, name: &str) -> StmtId {
        self.expr(call(name))
    }

    pub fn ret(&mut self, results: Vec<Expr>) -> StmtId {
        self.stmt(StmtKind::Return { results })
    }

    pub fn branch(&mut self, tok: BranchTok, label: Option<&str>) -> StmtId {
        self.stmt(StmtKind::Branch { tok, label: label.map(str::to_string) })
    }

    pub fn comment(&mut self, text: &str) {
        let at = self.here();
        self.tree.comments.push(CommentGroup {
            span: Span::new(at, Pos::new(at.line, at.col + text.len() as u32)),
            lines: vec![text.to_string()],
        });
        *self.line += 1;
    }

    pub fn block(&mut self, build: impl FnOnce(&mut BodyBuilder<'_>)) -> StmtId {
        let lbrace = self.here();
        let id = Self::body(self.tree, self.line, lbrace, self.col, build);
        self.stmts.push(id);
        *self.line += 1;
        id
    }

    pub fn if_(&mut self, cond: Expr, then: impl FnOnce(&mut BodyBuilder<'_>)) -> IfChain {
        self.if_init(None, cond, then)
    }

    pub fn if_init(
        &mut self,
        init: Option<StmtKind>,
        cond: Expr,
        then: impl FnOnce(&mut BodyBuilder<'_>),
    ) -> IfChain {
        let start = self.here();
        let id = self.if_at(start, init, cond, then);
        self.stmts.push(id);
        let chain = IfChain { ids: vec![id], rbrace_line: *self.line, col: self.col };
        *self.line += 1;
        chain
    }

    fn if_at(
        &mut self,
        start: Pos,
        init: Option<StmtKind>,
        cond: Expr,
        then: impl FnOnce(&mut BodyBuilder<'_>),
    ) -> StmtId {
        let init = init.map(|kind| self.header_stmt(start, 3, kind));
        let lbrace = Pos::new(start.line, start.col + 30);
        let body = Self::body(self.tree, self.line, lbrace, self.col, then);
        let end = self.tree.stmt(body).span.end;
        self.tree.push_stmt(Span::new(start, end), StmtKind::If { init, cond, body, els: None })
    }

    /// `} else { ... }` closing the chain.
    pub fn else_(&mut self, chain: IfChain, els: impl FnOnce(&mut BodyBuilder<'_>)) {
        *self.line = chain.rbrace_line;
        let lbrace = Pos::new(chain.rbrace_line, chain.col + 7);
        let block = Self::body(self.tree, self.line, lbrace, chain.col, els);
        self.attach_else(&chain, block);
        *self.line += 1;
    }

    /// `} else if cond { ... }`, which may be continued in turn.
    pub fn else_if(
        &mut self,
        chain: IfChain,
        cond: Expr,
        then: impl FnOnce(&mut BodyBuilder<'_>),
    ) -> IfChain {
        *self.line = chain.rbrace_line;
        let start = Pos::new(chain.rbrace_line, chain.col + 7);
        let inner = self.if_at(start, None, cond, then);
        self.attach_else(&chain, inner);
        let mut ids = chain.ids;
        ids.push(inner);
        let next = IfChain { ids, rbrace_line: *self.line, col: chain.col };
        *self.line += 1;
        next
    }

    fn attach_else(&mut self, chain: &IfChain, els: StmtId) {
        let end = self.tree.stmt(els).span.end;
        if let Some(last) = chain.ids.last() {
            if let StmtKind::If { els: slot, .. } = &mut self.tree.stmt_mut(*last).kind {
                *slot = Some(els);
            }
        }
        for id in &chain.ids {
            self.tree.stmt_mut(*id).span.end = end;
        }
    }

    pub fn for_(
        &mut self,
        init: Option<StmtKind>,
        cond: Option<Expr>,
        post: Option<StmtKind>,
        body: impl FnOnce(&mut BodyBuilder<'_>),
    ) -> StmtId {
        let start = self.here();
        let init = init.map(|kind| self.header_stmt(start, 4, kind));
        let post = post.map(|kind| self.header_stmt(start, 28, kind));
        let lbrace = Pos::new(start.line, start.col + 40);
        let body = Self::body(self.tree, self.line, lbrace, self.col, body);
        let end = self.tree.stmt(body).span.end;
        self.close(start, end, StmtKind::For { init, cond, post, body })
    }

    /// `for key := range x { ... }`, or `for range x` without a key.
    pub fn range(
        &mut self,
        key: Option<&str>,
        x: Expr,
        body: impl FnOnce(&mut BodyBuilder<'_>),
    ) -> StmtId {
        let start = self.here();
        let lbrace = Pos::new(start.line, start.col + 30);
        let body = Self::body(self.tree, self.line, lbrace, self.col, body);
        let end = self.tree.stmt(body).span.end;
        self.close(
            start,
            end,
            StmtKind::Range { key: key.map(Expr::ident), value: None, define: key.is_some(), x, body },
        )
    }

    pub fn switch(
        &mut self,
        tag: Option<Expr>,
        clauses: impl FnOnce(&mut ClauseBuilder<'_>),
    ) -> StmtId {
        let start = self.here();
        let list = self.clause_list(Pos::new(start.line, start.col + 20), clauses);
        let end = list.rbrace.next();
        self.close(start, end, StmtKind::Switch { init: None, tag, clauses: list })
    }

    pub fn select(&mut self, clauses: impl FnOnce(&mut ClauseBuilder<'_>)) -> StmtId {
        let start = self.here();
        let list = self.clause_list(Pos::new(start.line, start.col + 7), clauses);
        let end = list.rbrace.next();
        self.close(start, end, StmtKind::Select { clauses: list })
    }

    fn clause_list(&mut self, lbrace: Pos, build: impl FnOnce(&mut ClauseBuilder<'_>)) -> ClauseList {
        *self.line = lbrace.line + 1;
        let clauses = {
            let mut cb = ClauseBuilder { tree: &mut *self.tree, line: &mut *self.line, col: self.col, clauses: Vec::new() };
            build(&mut cb);
            cb.clauses
        };
        ClauseList { lbrace, rbrace: Pos::new(*self.line, self.col), clauses }
    }

    /// `label:` on its own line followed by the single statement `build` adds.
    pub fn labeled(&mut self, label: &str, build: impl FnOnce(&mut BodyBuilder<'_>)) -> StmtId {
        let start = self.here();
        *self.line += 1;
        let inner = {
            let mut inner = BodyBuilder { tree: &mut *self.tree, line: &mut *self.line, col: self.col, stmts: Vec::new() };
            build(&mut inner);
            inner.stmts
        };
        assert_eq!(inner.len(), 1, "a label wraps exactly one statement");
        let stmt = inner[0];
        let end = self.tree.stmt(stmt).span.end;
        let id = self.tree.push_stmt(Span::new(start, end), StmtKind::Labeled { label: label.to_string(), stmt });
        self.stmts.push(id);
        id
    }

    pub fn go(&mut self, call: CallExpr) -> StmtId {
        self.stmt(StmtKind::Spawn { call })
    }

    pub fn defer(&mut self, call: CallExpr) -> StmtId {
        self.stmt(StmtKind::Defer { call })
    }

    /// `go func() { ... }()`
    pub fn go_func(&mut self, body: impl FnOnce(&mut BodyBuilder<'_>)) -> StmtId {
        let start = self.here();
        let (lit, rbrace) = self.func_lit(Pos::new(start.line, start.col + 3), body);
        let call = CallExpr {
            span: Span::new(lit_start(&lit), rbrace.next().next().next()),
            fun: Box::new(lit),
            args: Vec::new(),
            ellipsis: false,
        };
        self.close(start, rbrace.next().next().next(), StmtKind::Spawn { call })
    }

    /// An expression statement holding a function literal, e.g.
    /// `run(func() { ... })` when `wrap` is `|lit| call_with("run", vec![lit])`.
    pub fn expr_with_func(
        &mut self,
        wrap: impl FnOnce(Expr) -> Expr,
        body: impl FnOnce(&mut BodyBuilder<'_>),
    ) -> StmtId {
        let start = self.here();
        let (lit, rbrace) = self.func_lit(Pos::new(start.line, start.col + 5), body);
        self.close(start, rbrace.next().next(), StmtKind::Expr { x: wrap(lit) })
    }

    fn func_lit(&mut self, at: Pos, body: impl FnOnce(&mut BodyBuilder<'_>)) -> (Expr, Pos) {
        // func() {
        let lbrace = Pos::new(at.line, at.col + 8);
        let body = Self::body(self.tree, self.line, lbrace, self.col, body);
        let rbrace = self.tree.block(body).rbrace;
        let lit = Expr::FuncLit(FuncLit { span: Span::new(at, rbrace.next()), sig: "()".to_string(), body });
        (lit, rbrace)
    }
}

fn lit_start(lit: &Expr) -> Pos {
    match lit {
        Expr::FuncLit(lit) => lit.span.start,
        _ => Pos::NONE,
    }
}

/// Appends clauses to a switch or select body.
pub struct ClauseBuilder<'a> {
    tree: &'a mut SyntaxTree,
    line: &'a mut u32,
    col: u32,
    clauses: Vec<StmtId>,
}

impl<'a> ClauseBuilder<'a> {
    pub fn case(&mut self, exprs: Vec<Expr>, body: impl FnOnce(&mut BodyBuilder<'_>)) -> StmtId {
        self.clause(|_, _| ClauseHead::Case { exprs }, body)
    }

    pub fn default(&mut self, body: impl FnOnce(&mut BodyBuilder<'_>)) -> StmtId {
        self.clause(|_, _| ClauseHead::Default, body)
    }

    /// `case <comm>:` in a select.
    pub fn comm(&mut self, comm: StmtKind, body: impl FnOnce(&mut BodyBuilder<'_>)) -> StmtId {
        self.clause(
            |tree, start| {
                let at = Pos::new(start.line, start.col + 5);
                let id = tree.push_stmt(Span::new(at, Pos::new(at.line, at.col + WIDTH)), comm);
                ClauseHead::Comm { comm: id }
            },
            body,
        )
    }

    fn clause(
        &mut self,
        head: impl FnOnce(&mut SyntaxTree, Pos) -> ClauseHead,
        body: impl FnOnce(&mut BodyBuilder<'_>),
    ) -> StmtId {
        let start = Pos::new(*self.line, self.col);
        let head = head(self.tree, start);
        let colon_end = Pos::new(start.line, start.col + 5 + WIDTH + 1);
        *self.line += 1;
        let stmts = {
            let mut inner = BodyBuilder { tree: &mut *self.tree, line: &mut *self.line, col: self.col + 1, stmts: Vec::new() };
            body(&mut inner);
            inner.stmts
        };
        let end = stmts.last().map(|s| self.tree.stmt(*s).span.end).unwrap_or(colon_end);
        let id = self.tree.push_stmt(Span::new(start, end), StmtKind::Clause(Clause { head, body: stmts }));
        self.clauses.push(id);
        id
    }
}
