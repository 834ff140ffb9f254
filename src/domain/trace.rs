//! Trace-id plumbing for instrumented sources.
//!
//! Every function body learns the id of the trace it runs under, and every
//! `go` statement hands that id to the spawned task. The spawned call's
//! function value and arguments are captured through the runtime's
//! `MakeFunc` helpers so they are still evaluated at the spawn point.

use crate::domain::ast::{
    Block, CallExpr, Decl, Expr, FuncLit, Pos, Span, StmtId, StmtKind, SyntaxTree,
};

pub struct TraceRewriter<'a> {
    /// Local name of the imported runtime helper package.
    runtime: &'a str,
    trace_id: &'a str,
}

impl<'a> TraceRewriter<'a> {
    pub fn new(runtime: &'a str, trace_id: &'a str) -> Self {
        Self { runtime, trace_id }
    }

    pub fn rewrite_tree(&self, tree: &mut SyntaxTree) {
        let mut funcs = Vec::new();
        let mut lits = Vec::new();
        for decl in &tree.decls {
            match decl {
                Decl::Func { func } => funcs.extend(tree.func(*func).body),
                Decl::Gen(gen) => gen.func_bodies(&mut lits),
            }
        }
        for body in funcs.into_iter().chain(lits) {
            self.enter_body(tree, body);
        }
    }

    fn enter_body(&self, tree: &mut SyntaxTree, body: StmtId) {
        self.add_id_lookup(tree, body);
        self.visit(tree, body);
    }

    fn visit(&self, tree: &mut SyntaxTree, id: StmtId) {
        for lit in tree.func_lit_bodies(id) {
            self.enter_body(tree, lit);
        }
        if let StmtKind::Spawn { call } = &tree.stmt(id).kind {
            let call = call.clone();
            let wrapped = self.spawn_wrapper(tree, call);
            if let StmtKind::Spawn { call } = &mut tree.stmt_mut(id).kind {
                *call = wrapped;
            }
            // the wrapper literal must not look up a new id
            return;
        }
        for child in tree.nested_stmts(id) {
            self.visit(tree, child);
        }
    }

    /// Prepends `<id> := <rt>.TraceID()` and `_ = <id>` to a body that has
    /// at least one statement of its own.
    fn add_id_lookup(&self, tree: &mut SyntaxTree, body: StmtId) {
        let block = tree.block(body);
        if block.stmts.iter().all(|s| tree.stmt(*s).span.is_none()) {
            return;
        }
        let lookup = tree.push_stmt(
            Span::NONE,
            StmtKind::Assign {
                lhs: vec![Expr::ident(self.trace_id)],
                op: ":=".to_string(),
                rhs: vec![Expr::call(Expr::selector(Expr::ident(self.runtime), "TraceID"), Vec::new())],
            },
        );
        let use_id = tree.push_stmt(
            Span::NONE,
            StmtKind::Assign {
                lhs: vec![Expr::ident("_")],
                op: "=".to_string(),
                rhs: vec![Expr::ident(self.trace_id)],
            },
        );
        let stmts = &mut tree.block_mut(body).stmts;
        stmts.insert(0, use_id);
        stmts.insert(0, lookup);
    }

    /// Turns `go f(a, b)` into
    /// `go func(f func()) { rt.ChildEnable(id); f() }(rt.MakeFunc(f, a, b))`.
    /// A spread call uses `MakeVariadicFunc`, which expands its last argument.
    fn spawn_wrapper(&self, tree: &mut SyntaxTree, call: CallExpr) -> CallExpr {
        let helper = if call.ellipsis { "MakeVariadicFunc" } else { "MakeFunc" };
        let mut captured = Vec::with_capacity(call.args.len() + 1);
        captured.push(*call.fun);
        captured.extend(call.args);
        let capture = Expr::call(Expr::selector(Expr::ident(self.runtime), helper), captured);

        let enable = tree.push_stmt(
            Span::NONE,
            StmtKind::expr(Expr::call(
                Expr::selector(Expr::ident(self.runtime), "ChildEnable"),
                vec![Expr::ident(self.trace_id)],
            )),
        );
        let run = tree.push_stmt(Span::NONE, StmtKind::expr(Expr::call(Expr::ident("f"), Vec::new())));
        let body = tree.push_stmt(
            Span::NONE,
            StmtKind::Block(Block { lbrace: Pos::NONE, rbrace: Pos::NONE, stmts: vec![enable, run] }),
        );
        let lit = Expr::FuncLit(FuncLit { span: Span::NONE, sig: "(f func())".to_string(), body });
        CallExpr { span: call.span, fun: Box::new(lit), args: vec![capture], ellipsis: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builder::{call_expr, ident, TreeBuilder};

    fn rewrite(tree: &mut SyntaxTree) {
        TraceRewriter::new("rt", "tid").rewrite_tree(tree);
    }

    fn lookup_stmts() -> (StmtKind, StmtKind) {
        (
            StmtKind::Assign {
                lhs: vec![Expr::ident("tid")],
                op: ":=".into(),
                rhs: vec![Expr::call(Expr::selector(Expr::ident("rt"), "TraceID"), vec![])],
            },
            StmtKind::Assign { lhs: vec![Expr::ident("_")], op: "=".into(), rhs: vec![Expr::ident("tid")] },
        )
    }

    #[test]
    fn test_lookup_prepended_to_non_empty_bodies_only() {
        let mut b = TreeBuilder::new("p/a.go", "p");
        let full = b.func("full", |body| {
            body.call("a");
        });
        let empty = b.func("empty", |_| {});
        let mut tree = b.finish();
        rewrite(&mut tree);

        let body = tree.func(full).body.unwrap();
        let stmts = &tree.block(body).stmts;
        assert_eq!(stmts.len(), 3);
        let (lookup, use_id) = lookup_stmts();
        assert_eq!(tree.stmt(stmts[0]).kind, lookup);
        assert_eq!(tree.stmt(stmts[1]).kind, use_id);

        let body = tree.func(empty).body.unwrap();
        assert!(tree.block(body).stmts.is_empty());
    }

    #[test]
    fn test_spawn_captures_arguments_eagerly() {
        let mut b = TreeBuilder::new("p/a.go", "p");
        let f = b.func("f", |body| {
            body.go(call_expr("work", vec![ident("a"), ident("b")]));
        });
        let mut tree = b.finish();
        rewrite(&mut tree);

        let body = tree.func(f).body.unwrap();
        let spawn = tree.block(body).stmts[2];
        let StmtKind::Spawn { call } = &tree.stmt(spawn).kind else {
            panic!("expected spawn");
        };
        assert_eq!(
            call.args,
            vec![Expr::call(
                Expr::selector(Expr::ident("rt"), "MakeFunc"),
                vec![ident("work"), ident("a"), ident("b")],
            )]
        );
        let Expr::FuncLit(lit) = &*call.fun else {
            panic!("expected literal wrapper");
        };
        assert_eq!(lit.sig, "(f func())");
        let inner = &tree.block(lit.body).stmts;
        // no lookup inside the wrapper: enable then run
        assert_eq!(inner.len(), 2);
        assert_eq!(
            tree.stmt(inner[0]).kind,
            StmtKind::expr(Expr::call(Expr::selector(Expr::ident("rt"), "ChildEnable"), vec![ident("tid")]))
        );
    }

    #[test]
    fn test_spread_spawn_uses_variadic_helper() {
        let mut b = TreeBuilder::new("p/a.go", "p");
        let f = b.func("f", |body| {
            let mut call = call_expr("log", vec![ident("format"), ident("args")]);
            call.ellipsis = true;
            body.go(call);
        });
        let mut tree = b.finish();
        rewrite(&mut tree);

        let body = tree.func(f).body.unwrap();
        let spawn = tree.block(body).stmts[2];
        let StmtKind::Spawn { call } = &tree.stmt(spawn).kind else {
            panic!("expected spawn");
        };
        assert!(!call.ellipsis);
        let Expr::Call(capture) = &call.args[0] else {
            panic!("expected capture call");
        };
        assert_eq!(*capture.fun, Expr::selector(Expr::ident("rt"), "MakeVariadicFunc"));
        assert_eq!(capture.args.len(), 3);
        assert!(!capture.ellipsis);
    }

    #[test]
    fn test_spawned_literal_gets_its_own_lookup() {
        let mut b = TreeBuilder::new("p/a.go", "p");
        let f = b.func("f", |body| {
            body.go_func(|inner| {
                inner.call("work");
            });
        });
        let mut tree = b.finish();
        rewrite(&mut tree);

        let body = tree.func(f).body.unwrap();
        let spawn = tree.block(body).stmts[2];
        let StmtKind::Spawn { call } = &tree.stmt(spawn).kind else {
            panic!("expected spawn");
        };
        let Expr::Call(capture) = &call.args[0] else {
            panic!("expected capture call");
        };
        let Expr::FuncLit(original) = &capture.args[0] else {
            panic!("expected the original literal as captured function");
        };
        let stmts = &tree.block(original.body).stmts;
        assert_eq!(stmts.len(), 3);
        assert_eq!(tree.stmt(stmts[0]).kind, lookup_stmts().0);
    }
}
