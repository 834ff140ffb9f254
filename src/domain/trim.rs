//! Pruning of code a profiled run never reached.
//!
//! Top-level functions survive only if they were entered. Inside them, every
//! statement list is rewritten statement by statement: unreached statements
//! disappear, except that the side effects of a skipped loop or `if` header
//! are kept as a plain call statement so the remaining code still makes the
//! calls it made at run time.

use crate::domain::ast::{CallExpr, Decl, Expr, Span, StmtId, StmtKind, SyntaxTree};
use crate::domain::comments::CommentMap;
use crate::domain::profile::Reach;
use crate::domain::visit::{first_call_in_expr, first_call_in_stmt};

pub struct Trimmer<'r> {
    reach: &'r Reach,
}

impl<'r> Trimmer<'r> {
    pub fn new(reach: &'r Reach) -> Self {
        Self { reach }
    }

    /// Trims `tree` in place and drops the comments of removed code.
    /// Returns false when no declaration is left, i.e. the file should not
    /// be emitted at all.
    pub fn trim_tree(&self, tree: &mut SyntaxTree) -> bool {
        let comments = CommentMap::build(tree);
        let reach = self.reach;
        tree.decls.retain(|decl| match decl {
            Decl::Func { func } => reach.func(*func),
            Decl::Gen(_) => false,
        });

        let bodies: Vec<StmtId> = tree.func_decls().filter_map(|f| tree.func(f).body).collect();
        for body in bodies {
            self.descend(tree, body);
        }
        tree.comments = comments.filter(tree);
        !tree.decls.is_empty()
    }

    fn visited(&self, id: Option<StmtId>) -> bool {
        id.is_some_and(|id| self.reach.stmt(id) == Some(true))
    }

    /// Trims every statement list below `id`.
    fn descend(&self, tree: &mut SyntaxTree, id: StmtId) {
        match &mut tree.stmt_mut(id).kind {
            StmtKind::Block(block) => {
                let list = std::mem::take(&mut block.stmts);
                let trimmed = self.trim_list(tree, list);
                tree.block_mut(id).stmts = trimmed;
            }
            StmtKind::Clause(clause) => {
                let list = std::mem::take(&mut clause.body);
                let trimmed = self.trim_list(tree, list);
                if let StmtKind::Clause(clause) = &mut tree.stmt_mut(id).kind {
                    clause.body = trimmed;
                }
                for lit in tree.func_lit_bodies(id) {
                    self.descend(tree, lit);
                }
            }
            _ => {
                for child in tree.child_stmts(id) {
                    self.descend(tree, child);
                }
            }
        }
    }

    fn trim_list(&self, tree: &mut SyntaxTree, list: Vec<StmtId>) -> Vec<StmtId> {
        let mut out = Vec::with_capacity(list.len());
        for id in list {
            out.extend(self.replace_stmt(tree, id));
        }
        for id in &out {
            self.descend(tree, *id);
        }
        out
    }

    /// What `id` becomes in its statement list: itself, nothing, or the
    /// calls its header would have made.
    fn replace_stmt(&self, tree: &mut SyntaxTree, id: StmtId) -> Vec<StmtId> {
        match &tree.stmt(id).kind {
            StmtKind::Range { x, body, .. } => {
                if self.visited(Some(*body)) {
                    return vec![id];
                }
                let calls: Vec<CallExpr> = first_call_in_expr(tree, x).into_iter().collect();
                extract(tree, calls)
            }
            StmtKind::For { init, cond, post, body } => {
                if self.visited(Some(*body)) {
                    return vec![id];
                }
                let calls: Vec<CallExpr> = [
                    init.and_then(|s| first_call_in_stmt(tree, s)),
                    cond.as_ref().and_then(|c| first_call_in_expr(tree, c)),
                    post.and_then(|s| first_call_in_stmt(tree, s)),
                ]
                .into_iter()
                .flatten()
                .collect();
                extract(tree, calls)
            }
            StmtKind::If { init, cond, body, els } => {
                let (init, body, els) = (*init, *body, *els);
                match (self.visited(Some(body)), self.visited(els)) {
                    (false, false) => {
                        let calls: Vec<CallExpr> = [
                            init.and_then(|s| first_call_in_stmt(tree, s)),
                            first_call_in_expr(tree, cond),
                        ]
                        .into_iter()
                        .flatten()
                        .collect();
                        extract(tree, calls)
                    }
                    (false, true) => match els {
                        Some(els) => self.replace_stmt(tree, els),
                        None => Vec::new(),
                    },
                    (true, false) => {
                        if let StmtKind::If { els, .. } = &mut tree.stmt_mut(id).kind {
                            *els = None;
                        }
                        vec![id]
                    }
                    (true, true) => vec![id],
                }
            }
            StmtKind::Select { clauses } => {
                let kept: Vec<StmtId> =
                    clauses.clauses.iter().copied().filter(|c| self.visited(Some(*c))).collect();
                if let StmtKind::Select { clauses } = &mut tree.stmt_mut(id).kind {
                    clauses.clauses = kept;
                }
                vec![id]
            }
            StmtKind::Labeled { stmt, .. } => {
                let inner = *stmt;
                let replaced = self.replace_stmt(tree, inner);
                // the label only stays on the statement it was written on
                if replaced == [inner] {
                    vec![id]
                } else {
                    replaced
                }
            }
            _ => match self.reach.stmt(id) {
                Some(false) => Vec::new(),
                _ => vec![id],
            },
        }
    }
}

/// Turns each call into a statement of its own, in order.
fn extract(tree: &mut SyntaxTree, calls: Vec<CallExpr>) -> Vec<StmtId> {
    calls
        .into_iter()
        .map(|call| tree.push_stmt(Span::NONE, StmtKind::Expr { x: Expr::Call(call) }))
        .collect()
}
