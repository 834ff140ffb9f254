//! Source printer.
//!
//! Renders a tree back to Go-like source: tab indentation, one statement per
//! line, opening braces on the header line. Comments are emitted before the
//! first node that starts after them; synthesized nodes carry no position and
//! never trigger a flush.

use crate::domain::ast::{
    CallExpr, ClauseHead, CommentGroup, Decl, Expr, FuncId, GenDecl, Pos, Spec, StmtId, StmtKind,
    SyntaxTree,
};
use crate::ports::TreePrinter;

pub struct SourcePrinter;

impl TreePrinter for SourcePrinter {
    fn print(&self, tree: &SyntaxTree) -> String {
        Printer::new(tree).file()
    }
}

struct Printer<'t> {
    tree: &'t SyntaxTree,
    out: String,
    indent: usize,
    comments: Vec<&'t CommentGroup>,
    next_comment: usize,
}

impl<'t> Printer<'t> {
    fn new(tree: &'t SyntaxTree) -> Self {
        let mut comments: Vec<&CommentGroup> = tree.comments.iter().collect();
        comments.sort_by_key(|c| c.span.start);
        Self { tree, out: String::new(), indent: 0, comments, next_comment: 0 }
    }

    fn file(mut self) -> String {
        let tree = self.tree;
        self.flush_comments(tree.package_pos);
        self.out.push_str("package ");
        self.out.push_str(&tree.package);
        self.out.push('\n');
        for decl in &tree.decls {
            self.out.push('\n');
            match decl {
                Decl::Func { func } => self.func_decl(*func),
                Decl::Gen(gen) => {
                    self.flush_comments(gen.span.start);
                    self.gen_decl(gen);
                }
            }
            self.out.push('\n');
        }
        if self.next_comment < self.comments.len() {
            self.out.push('\n');
            self.flush_comments(Pos::new(u32::MAX, u32::MAX));
        }
        self.out
    }

    /// Writes every pending comment that starts before `pos`.
    fn flush_comments(&mut self, pos: Pos) {
        if pos.is_none() {
            return;
        }
        while let Some(&group) = self.comments.get(self.next_comment) {
            if group.span.start >= pos {
                break;
            }
            for line in &group.lines {
                self.tabs();
                self.out.push_str(line);
                self.out.push('\n');
            }
            self.next_comment += 1;
        }
    }

    fn tabs(&mut self) {
        for _ in 0..self.indent {
            self.out.push('\t');
        }
    }

    fn func_decl(&mut self, id: FuncId) {
        let tree = self.tree;
        let func = tree.func(id);
        self.flush_comments(func.span.start);
        self.out.push_str("func ");
        if let Some(recv) = &func.recv {
            self.out.push('(');
            self.out.push_str(recv);
            self.out.push_str(") ");
        }
        self.out.push_str(&func.name);
        self.out.push_str(&func.sig);
        if let Some(body) = func.body {
            self.out.push(' ');
            self.block(body);
        }
    }

    fn gen_decl(&mut self, decl: &GenDecl) {
        self.out.push_str(decl.keyword.keyword());
        if let [spec] = decl.specs.as_slice() {
            self.out.push(' ');
            self.spec(spec);
            return;
        }
        self.out.push_str(" (\n");
        self.indent += 1;
        for spec in &decl.specs {
            self.tabs();
            self.spec(spec);
            self.out.push('\n');
        }
        self.indent -= 1;
        self.tabs();
        self.out.push(')');
    }

    fn spec(&mut self, spec: &Spec) {
        match spec {
            Spec::Import { name, path } => {
                if let Some(name) = name {
                    self.out.push_str(name);
                    self.out.push(' ');
                }
                self.out.push('"');
                self.out.push_str(path);
                self.out.push('"');
            }
            Spec::Value { names, ty, values } => {
                self.out.push_str(&names.join(", "));
                if let Some(ty) = ty {
                    self.out.push(' ');
                    self.expr(ty);
                }
                if !values.is_empty() {
                    self.out.push_str(" = ");
                    self.expr_list(values);
                }
            }
            Spec::Type { name, ty } => {
                self.out.push_str(name);
                self.out.push(' ');
                self.expr(ty);
            }
        }
    }

    /// `{`, the statements one level deeper, then `}` at the current level.
    fn block(&mut self, id: StmtId) {
        let tree = self.tree;
        let block = tree.block(id);
        self.out.push_str("{\n");
        self.indent += 1;
        for stmt in &block.stmts {
            self.stmt_line(*stmt);
        }
        self.flush_comments(block.rbrace);
        self.indent -= 1;
        self.tabs();
        self.out.push('}');
    }

    fn stmt_line(&mut self, id: StmtId) {
        let tree = self.tree;
        let node = tree.stmt(id);
        self.flush_comments(node.span.start);
        match &node.kind {
            StmtKind::Empty => {}
            StmtKind::Labeled { label, stmt } => {
                for _ in 0..self.indent.saturating_sub(1) {
                    self.out.push('\t');
                }
                self.out.push_str(label);
                self.out.push_str(":\n");
                self.stmt_line(*stmt);
            }
            _ => {
                self.tabs();
                self.stmt(id);
                self.out.push('\n');
            }
        }
    }

    /// Prints `id` starting at the current column, without a line break.
    fn stmt(&mut self, id: StmtId) {
        let tree = self.tree;
        match &tree.stmt(id).kind {
            StmtKind::Expr { x } => self.expr(x),
            StmtKind::Assign { lhs, op, rhs } => {
                self.expr_list(lhs);
                self.out.push(' ');
                self.out.push_str(op);
                self.out.push(' ');
                self.expr_list(rhs);
            }
            StmtKind::IncDec { x, inc } => {
                self.expr(x);
                self.out.push_str(if *inc { "++" } else { "--" });
            }
            StmtKind::Send { chan, value } => {
                self.expr(chan);
                self.out.push_str(" <- ");
                self.expr(value);
            }
            StmtKind::Return { results } => {
                self.out.push_str("return");
                if !results.is_empty() {
                    self.out.push(' ');
                    self.expr_list(results);
                }
            }
            StmtKind::Decl { decl } => self.gen_decl(decl),
            StmtKind::Empty => {}
            StmtKind::Block(_) => self.block(id),
            StmtKind::If { init, cond, body, els } => {
                self.out.push_str("if ");
                if let Some(init) = init {
                    self.stmt(*init);
                    self.out.push_str("; ");
                }
                self.expr(cond);
                self.out.push(' ');
                self.block(*body);
                if let Some(els) = els {
                    self.out.push_str(" else ");
                    self.stmt(*els);
                }
            }
            StmtKind::For { init, cond, post, body } => {
                self.out.push_str("for ");
                if init.is_some() || post.is_some() {
                    if let Some(init) = init {
                        self.stmt(*init);
                    }
                    self.out.push_str("; ");
                    if let Some(cond) = cond {
                        self.expr(cond);
                    }
                    self.out.push_str("; ");
                    if let Some(post) = post {
                        self.stmt(*post);
                    }
                    self.out.push(' ');
                } else if let Some(cond) = cond {
                    self.expr(cond);
                    self.out.push(' ');
                }
                self.block(*body);
            }
            StmtKind::Range { key, value, define, x, body } => {
                self.out.push_str("for ");
                if let Some(key) = key {
                    self.expr(key);
                    if let Some(value) = value {
                        self.out.push_str(", ");
                        self.expr(value);
                    }
                    self.out.push_str(if *define { " := " } else { " = " });
                }
                self.out.push_str("range ");
                self.expr(x);
                self.out.push(' ');
                self.block(*body);
            }
            StmtKind::Switch { init, tag, clauses } => {
                self.out.push_str("switch ");
                if let Some(init) = init {
                    self.stmt(*init);
                    self.out.push_str("; ");
                }
                if let Some(tag) = tag {
                    self.expr(tag);
                    self.out.push(' ');
                }
                self.clauses(&clauses.clauses, clauses.rbrace);
            }
            StmtKind::TypeSwitch { init, assign, clauses } => {
                self.out.push_str("switch ");
                if let Some(init) = init {
                    self.stmt(*init);
                    self.out.push_str("; ");
                }
                self.stmt(*assign);
                self.out.push(' ');
                self.clauses(&clauses.clauses, clauses.rbrace);
            }
            StmtKind::Select { clauses } => {
                self.out.push_str("select ");
                self.clauses(&clauses.clauses, clauses.rbrace);
            }
            StmtKind::Clause(_) => self.clause(id),
            StmtKind::Labeled { label, stmt } => {
                self.out.push_str(label);
                self.out.push_str(": ");
                self.stmt(*stmt);
            }
            StmtKind::Branch { tok, label } => {
                self.out.push_str(tok.keyword());
                if let Some(label) = label {
                    self.out.push(' ');
                    self.out.push_str(label);
                }
            }
            StmtKind::Spawn { call } => {
                self.out.push_str("go ");
                self.call(call);
            }
            StmtKind::Defer { call } => {
                self.out.push_str("defer ");
                self.call(call);
            }
        }
    }

    /// Clause heads line up with the `switch` keyword, bodies go one deeper.
    fn clauses(&mut self, clauses: &[StmtId], rbrace: Pos) {
        let tree = self.tree;
        self.out.push_str("{\n");
        for clause in clauses {
            self.flush_comments(tree.stmt(*clause).span.start);
            self.tabs();
            self.clause(*clause);
        }
        self.flush_comments(rbrace);
        self.tabs();
        self.out.push('}');
    }

    fn clause(&mut self, id: StmtId) {
        let tree = self.tree;
        let StmtKind::Clause(clause) = &tree.stmt(id).kind else {
            return;
        };
        match &clause.head {
            ClauseHead::Case { exprs } => {
                self.out.push_str("case ");
                self.expr_list(exprs);
            }
            ClauseHead::Comm { comm } => {
                self.out.push_str("case ");
                self.stmt(*comm);
            }
            ClauseHead::Default => self.out.push_str("default"),
        }
        self.out.push_str(":\n");
        self.indent += 1;
        for stmt in &clause.body {
            self.stmt_line(*stmt);
        }
        self.indent -= 1;
    }

    fn expr_list(&mut self, exprs: &[Expr]) {
        for (i, e) in exprs.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.expr(e);
        }
    }

    fn call(&mut self, call: &CallExpr) {
        self.expr(&call.fun);
        self.out.push('(');
        self.expr_list(&call.args);
        if call.ellipsis {
            self.out.push_str("...");
        }
        self.out.push(')');
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident { name } => self.out.push_str(name),
            Expr::Lit { value } => self.out.push_str(value),
            Expr::Raw { text } => self.out.push_str(text),
            Expr::Call(call) => self.call(call),
            Expr::FuncLit(lit) => {
                self.out.push_str("func");
                self.out.push_str(&lit.sig);
                self.out.push(' ');
                self.block(lit.body);
            }
            Expr::Selector { x, sel } => {
                self.expr(x);
                self.out.push('.');
                self.out.push_str(sel);
            }
            Expr::Index { x, index } => {
                self.expr(x);
                self.out.push('[');
                self.expr(index);
                self.out.push(']');
            }
            Expr::Unary { op, x } => {
                self.out.push_str(op);
                self.expr(x);
            }
            Expr::Binary { x, op, y } => {
                self.expr(x);
                self.out.push(' ');
                self.out.push_str(op);
                self.out.push(' ');
                self.expr(y);
            }
            Expr::Paren { x } => {
                self.out.push('(');
                self.expr(x);
                self.out.push(')');
            }
            Expr::TypeAssert { x, ty } => {
                self.expr(x);
                self.out.push_str(".(");
                match ty {
                    Some(ty) => self.expr(ty),
                    None => self.out.push_str("type"),
                }
                self.out.push(')');
            }
            Expr::Composite { ty, elts } => {
                if let Some(ty) = ty {
                    self.expr(ty);
                }
                self.out.push('{');
                self.expr_list(elts);
                self.out.push('}');
            }
            Expr::KeyValue { key, value } => {
                self.expr(key);
                self.out.push_str(": ");
                self.expr(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ast::{BranchTok, DeclKeyword, Span};
    use crate::domain::builder::{call, call_expr, call_with, define, ident, inc, TreeBuilder};
    use pretty_assertions::assert_eq;

    fn print(tree: &SyntaxTree) -> String {
        SourcePrinter.print(tree)
    }

    #[test]
    fn test_if_else_and_loops() {
        let mut b = TreeBuilder::new("p/a.go", "p");
        b.func("main", |body| {
            let chain = body.if_(ident("ok"), |then| {
                then.call("a");
            });
            let chain = body.else_if(chain, call("more"), |then| {
                then.ret(vec![]);
            });
            body.else_(chain, |els| {
                els.call("b");
            });
            body.for_(
                Some(define("i", Expr::lit("0"))),
                Some(Expr::binary(ident("i"), "<", ident("n"))),
                Some(inc("i")),
                |l| {
                    l.branch(BranchTok::Continue, None);
                },
            );
            body.range(Some("k"), ident("items"), |l| {
                l.stmt(StmtKind::Send { chan: ident("out"), value: ident("k") });
            });
        });
        let expected = "package p

func main() {
\tif ok {
\t\ta()
\t} else if more() {
\t\treturn
\t} else {
\t\tb()
\t}
\tfor i := 0; i < n; i++ {
\t\tcontinue
\t}
\tfor k := range items {
\t\tout <- k
\t}
}
";
        assert_eq!(print(&b.finish()), expected);
    }

    #[test]
    fn test_switch_select_and_labels() {
        let mut b = TreeBuilder::new("p/a.go", "p");
        b.func("main", |body| {
            body.switch(Some(ident("k")), |cases| {
                cases.case(vec![Expr::lit("1"), Expr::lit("2")], |c| {
                    c.call("low");
                });
                cases.default(|_| {});
            });
            body.labeled("outer", |l| {
                l.select(|c| {
                    c.comm(define("v", Expr::unary("<-", ident("ch"))), |s| {
                        s.branch(BranchTok::Break, Some("outer"));
                    });
                });
            });
        });
        let expected = "package p

func main() {
\tswitch k {
\tcase 1, 2:
\t\tlow()
\tdefault:
\t}
outer:
\tselect {
\tcase v := <-ch:
\t\tbreak outer
\t}
}
";
        assert_eq!(print(&b.finish()), expected);
    }

    #[test]
    fn test_comments_and_declarations() {
        let mut b = TreeBuilder::new("p/a.go", "p");
        b.import("fmt");
        b.comment("// Run does it.");
        b.func("Run", |body| {
            body.comment("// spawn");
            let mut spread = call_expr("fmt.Println", vec![ident("args")]);
            spread.ellipsis = true;
            body.go(spread);
            body.expr_with_func(|lit| call_with("defer_run", vec![lit]), |inner| {
                inner.call("x");
            });
        });
        let mut tree = b.finish();
        tree.decls.push(Decl::Gen(GenDecl {
            span: Span::NONE,
            keyword: DeclKeyword::Var,
            specs: vec![Spec::Value {
                names: vec!["_".into()],
                ty: None,
                values: vec![Expr::selector(ident("fmt"), "Println")],
            }],
        }));
        let expected = "package p

import \"fmt\"

// Run does it.
func Run() {
\t// spawn
\tgo fmt.Println(args...)
\tdefer_run(func() {
\t\tx()
\t})
}

var _ = fmt.Println
";
        assert_eq!(print(&tree), expected);
    }
}
