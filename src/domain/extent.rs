//! Extent indexing: the source spans of every function declaration and
//! statement of a tree, ordered by start position.

use crate::domain::ast::{FuncId, Span, StmtId, SyntaxTree};
use crate::domain::visit::{walk_tree, Visitor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent<Id> {
    pub id: Id,
    pub span: Span,
}

/// Function and statement extents of one tree.
#[derive(Debug, Clone, Default)]
pub struct Extents {
    pub funcs: Vec<Extent<FuncId>>,
    pub stmts: Vec<Extent<StmtId>>,
}

impl Extents {
    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty() && self.stmts.is_empty()
    }
}

#[derive(Default)]
struct ExtentCollector {
    extents: Extents,
}

impl Visitor for ExtentCollector {
    fn visit_func(&mut self, tree: &SyntaxTree, id: FuncId) -> bool {
        self.extents.funcs.push(Extent { id, span: tree.func(id).span });
        true
    }

    fn visit_stmt(&mut self, tree: &SyntaxTree, id: StmtId) -> bool {
        let span = tree.stmt(id).span;
        // Nodes synthesized by a rewrite have no source extent.
        if !span.is_none() {
            self.extents.stmts.push(Extent { id, span });
        }
        true
    }
}

/// Walks `tree` once, depth first, including clause bodies and function
/// literal bodies. Both lists are stably sorted by start position, so
/// nodes sharing a start keep their pre-order.
pub fn index_tree(tree: &SyntaxTree) -> Extents {
    let mut collector = ExtentCollector::default();
    walk_tree(&mut collector, tree);
    let mut extents = collector.extents;
    extents.funcs.sort_by_key(|e| e.span.start);
    extents.stmts.sort_by_key(|e| e.span.start);
    extents
}
