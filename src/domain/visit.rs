//! Depth-first, source-ordered traversal of a syntax tree.
//!
//! Each `visit_*` hook returns whether the walk should descend into the
//! node's children.

use crate::domain::ast::{
    CallExpr, ClauseHead, Decl, Expr, FuncId, GenDecl, Pos, Spec, StmtId, StmtKind, SyntaxTree,
};

pub trait Visitor {
    fn visit_func(&mut self, _tree: &SyntaxTree, _id: FuncId) -> bool {
        true
    }

    fn visit_gen_decl(&mut self, _tree: &SyntaxTree, _decl: &GenDecl) -> bool {
        true
    }

    fn visit_stmt(&mut self, _tree: &SyntaxTree, _id: StmtId) -> bool {
        true
    }

    fn visit_expr(&mut self, _tree: &SyntaxTree, _expr: &Expr) -> bool {
        true
    }
}

pub fn walk_tree<V: Visitor + ?Sized>(v: &mut V, tree: &SyntaxTree) {
    for decl in &tree.decls {
        match decl {
            Decl::Func { func } => walk_func(v, tree, *func),
            Decl::Gen(gen) => walk_gen_decl(v, tree, gen),
        }
    }
}

pub fn walk_func<V: Visitor + ?Sized>(v: &mut V, tree: &SyntaxTree, id: FuncId) {
    if !v.visit_func(tree, id) {
        return;
    }
    if let Some(body) = tree.func(id).body {
        walk_stmt(v, tree, body);
    }
}

pub fn walk_gen_decl<V: Visitor + ?Sized>(v: &mut V, tree: &SyntaxTree, decl: &GenDecl) {
    if !v.visit_gen_decl(tree, decl) {
        return;
    }
    for spec in &decl.specs {
        match spec {
            Spec::Import { .. } => {}
            Spec::Value { ty, values, .. } => {
                if let Some(ty) = ty {
                    walk_expr(v, tree, ty);
                }
                for value in values {
                    walk_expr(v, tree, value);
                }
            }
            Spec::Type { ty, .. } => walk_expr(v, tree, ty),
        }
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(v: &mut V, tree: &SyntaxTree, id: StmtId) {
    if !v.visit_stmt(tree, id) {
        return;
    }
    match &tree.stmt(id).kind {
        StmtKind::Expr { x } => walk_expr(v, tree, x),
        StmtKind::Assign { lhs, rhs, .. } => {
            for e in lhs.iter().chain(rhs.iter()) {
                walk_expr(v, tree, e);
            }
        }
        StmtKind::IncDec { x, .. } => walk_expr(v, tree, x),
        StmtKind::Send { chan, value } => {
            walk_expr(v, tree, chan);
            walk_expr(v, tree, value);
        }
        StmtKind::Return { results } => {
            for e in results {
                walk_expr(v, tree, e);
            }
        }
        StmtKind::Decl { decl } => walk_gen_decl(v, tree, decl),
        StmtKind::Empty | StmtKind::Branch { .. } => {}
        StmtKind::Block(block) => {
            for s in &block.stmts {
                walk_stmt(v, tree, *s);
            }
        }
        StmtKind::If { init, cond, body, els } => {
            if let Some(init) = init {
                walk_stmt(v, tree, *init);
            }
            walk_expr(v, tree, cond);
            walk_stmt(v, tree, *body);
            if let Some(els) = els {
                walk_stmt(v, tree, *els);
            }
        }
        StmtKind::For { init, cond, post, body } => {
            if let Some(init) = init {
                walk_stmt(v, tree, *init);
            }
            if let Some(cond) = cond {
                walk_expr(v, tree, cond);
            }
            if let Some(post) = post {
                walk_stmt(v, tree, *post);
            }
            walk_stmt(v, tree, *body);
        }
        StmtKind::Range { key, value, x, body, .. } => {
            for e in key.iter().chain(value.iter()) {
                walk_expr(v, tree, e);
            }
            walk_expr(v, tree, x);
            walk_stmt(v, tree, *body);
        }
        StmtKind::Switch { init, tag, clauses } => {
            if let Some(init) = init {
                walk_stmt(v, tree, *init);
            }
            if let Some(tag) = tag {
                walk_expr(v, tree, tag);
            }
            for c in &clauses.clauses {
                walk_stmt(v, tree, *c);
            }
        }
        StmtKind::TypeSwitch { init, assign, clauses } => {
            if let Some(init) = init {
                walk_stmt(v, tree, *init);
            }
            walk_stmt(v, tree, *assign);
            for c in &clauses.clauses {
                walk_stmt(v, tree, *c);
            }
        }
        StmtKind::Select { clauses } => {
            for c in &clauses.clauses {
                walk_stmt(v, tree, *c);
            }
        }
        StmtKind::Clause(clause) => {
            match &clause.head {
                ClauseHead::Case { exprs } => {
                    for e in exprs {
                        walk_expr(v, tree, e);
                    }
                }
                ClauseHead::Comm { comm } => walk_stmt(v, tree, *comm),
                ClauseHead::Default => {}
            }
            for s in &clause.body {
                walk_stmt(v, tree, *s);
            }
        }
        StmtKind::Labeled { stmt, .. } => walk_stmt(v, tree, *stmt),
        StmtKind::Spawn { call } | StmtKind::Defer { call } => walk_call(v, tree, call),
    }
}

fn walk_call<V: Visitor + ?Sized>(v: &mut V, tree: &SyntaxTree, call: &CallExpr) {
    walk_expr(v, tree, &call.fun);
    for arg in &call.args {
        walk_expr(v, tree, arg);
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(v: &mut V, tree: &SyntaxTree, expr: &Expr) {
    if !v.visit_expr(tree, expr) {
        return;
    }
    match expr {
        Expr::Ident { .. } | Expr::Lit { .. } | Expr::Raw { .. } => {}
        Expr::Call(call) => walk_call(v, tree, call),
        Expr::FuncLit(lit) => walk_stmt(v, tree, lit.body),
        Expr::Selector { x, .. } | Expr::Unary { x, .. } | Expr::Paren { x } => walk_expr(v, tree, x),
        Expr::Index { x, index } => {
            walk_expr(v, tree, x);
            walk_expr(v, tree, index);
        }
        Expr::Binary { x, y, .. } => {
            walk_expr(v, tree, x);
            walk_expr(v, tree, y);
        }
        Expr::TypeAssert { x, ty } => {
            walk_expr(v, tree, x);
            if let Some(ty) = ty {
                walk_expr(v, tree, ty);
            }
        }
        Expr::Composite { ty, elts } => {
            if let Some(ty) = ty {
                walk_expr(v, tree, ty);
            }
            for e in elts {
                walk_expr(v, tree, e);
            }
        }
        Expr::KeyValue { key, value } => {
            walk_expr(v, tree, key);
            walk_expr(v, tree, value);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Finders
// ─────────────────────────────────────────────────────────────────────

/// Finds the first call expression in pre-order.
#[derive(Default)]
struct CallFinder {
    found: Option<CallExpr>,
}

impl Visitor for CallFinder {
    fn visit_stmt(&mut self, _tree: &SyntaxTree, _id: StmtId) -> bool {
        self.found.is_none()
    }

    fn visit_expr(&mut self, _tree: &SyntaxTree, expr: &Expr) -> bool {
        if self.found.is_some() {
            return false;
        }
        if let Expr::Call(call) = expr {
            self.found = Some(call.clone());
            return false;
        }
        true
    }
}

/// First call expression inside statement `id`, outermost first.
pub fn first_call_in_stmt(tree: &SyntaxTree, id: StmtId) -> Option<CallExpr> {
    let mut finder = CallFinder::default();
    walk_stmt(&mut finder, tree, id);
    finder.found
}

pub fn first_call_in_expr(tree: &SyntaxTree, expr: &Expr) -> Option<CallExpr> {
    let mut finder = CallFinder::default();
    walk_expr(&mut finder, tree, expr);
    finder.found
}

/// Records the opening brace of the first function literal body.
#[derive(Default)]
struct FuncLitFinder {
    lbrace: Option<Pos>,
}

impl Visitor for FuncLitFinder {
    fn visit_stmt(&mut self, _tree: &SyntaxTree, _id: StmtId) -> bool {
        self.lbrace.is_none()
    }

    fn visit_expr(&mut self, tree: &SyntaxTree, expr: &Expr) -> bool {
        if self.lbrace.is_some() {
            return false;
        }
        if let Expr::FuncLit(lit) = expr {
            self.lbrace = Some(tree.block(lit.body).lbrace);
            return false;
        }
        true
    }
}

/// Opening brace of the first function literal body inside statement `id`.
pub fn first_func_lit_in_stmt(tree: &SyntaxTree, id: StmtId) -> Option<Pos> {
    let mut finder = FuncLitFinder::default();
    walk_stmt(&mut finder, tree, id);
    finder.lbrace
}

pub fn first_func_lit_in_expr(tree: &SyntaxTree, expr: &Expr) -> Option<Pos> {
    let mut finder = FuncLitFinder::default();
    walk_expr(&mut finder, tree, expr);
    finder.lbrace
}
