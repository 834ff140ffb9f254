//! Basic-block counters.
//!
//! Every statement list is cut into maximal straight-line runs; each run is
//! prefixed with an atomic increment of its own slot in the package-level
//! counter table. Switch and select bodies are counted per clause.

use std::fmt;

use crate::common::error::CoverError;
use crate::domain::ast::{
    Block, Decl, Expr, Pos, Span, StmtId, StmtKind, SyntaxTree,
};
use crate::domain::visit::{first_func_lit_in_expr, first_func_lit_in_stmt};

/// One counted run of statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicBlock {
    pub span: Span,
    pub num_stmt: usize,
}

/// Inserts counters into a tree and records the block of each counter.
/// Counter `i` is `<cover_var>.Count[i]`.
pub struct BlockCounter<'a> {
    cover_var: &'a str,
    atomic: &'a str,
    blocks: Vec<BasicBlock>,
}

impl<'a> BlockCounter<'a> {
    /// `atomic` is the local name of the imported atomic package.
    pub fn new(cover_var: &'a str, atomic: &'a str) -> Self {
        Self { cover_var, atomic, blocks: Vec::new() }
    }

    /// Counts every function body and every function literal of `tree`.
    pub fn count_tree(mut self, tree: &mut SyntaxTree) -> Vec<BasicBlock> {
        let mut roots = Vec::new();
        for decl in &tree.decls {
            match decl {
                Decl::Func { func } => roots.extend(tree.func(*func).body),
                Decl::Gen(gen) => gen.func_bodies(&mut roots),
            }
        }
        for root in roots {
            self.visit(tree, root);
        }
        self.blocks
    }

    fn visit(&mut self, tree: &mut SyntaxTree, id: StmtId) {
        match &tree.stmt(id).kind {
            StmtKind::Block(block) => {
                let (lbrace, end) = (block.lbrace, block.rbrace.next());
                let list = block.stmts.clone();
                let counted = self.add_counters(tree, lbrace, end, &list, true);
                tree.block_mut(id).stmts = counted;
                for stmt in list {
                    self.visit(tree, stmt);
                }
            }
            StmtKind::If { init, body, els, .. } => {
                let (init, body, els) = (*init, *body, *els);
                // literals in the header are scopes of their own
                for lit in tree.func_lit_bodies(id) {
                    self.visit(tree, lit);
                }
                if let Some(init) = init {
                    self.visit(tree, init);
                }
                self.visit(tree, body);
                if let Some(els) = els {
                    let els = pin_else(tree, id, body, els);
                    self.visit(tree, els);
                }
            }
            StmtKind::Switch { clauses, .. }
            | StmtKind::TypeSwitch { clauses, .. }
            | StmtKind::Select { clauses } => {
                // an empty dispatch has nowhere to put a counter
                if clauses.clauses.is_empty() {
                    return;
                }
                let clauses = clauses.clauses.clone();
                for clause in clauses {
                    self.count_clause(tree, clause);
                }
                for child in tree.child_stmts(id) {
                    self.visit(tree, child);
                }
            }
            _ => {
                for child in tree.child_stmts(id) {
                    self.visit(tree, child);
                }
            }
        }
    }

    fn count_clause(&mut self, tree: &mut SyntaxTree, id: StmtId) {
        let span = tree.stmt(id).span;
        let list = match &tree.stmt(id).kind {
            StmtKind::Clause(clause) => clause.body.clone(),
            other => panic!("dispatch body entry {} is not a clause: {:?}", id, other),
        };
        let counted = self.add_counters(tree, span.start, span.end, &list, false);
        if let StmtKind::Clause(clause) = &mut tree.stmt_mut(id).kind {
            clause.body = counted;
        }
    }

    /// Returns `list` with a counter in front of each basic block. Nested
    /// lists are left for the caller to visit.
    fn add_counters(
        &mut self,
        tree: &mut SyntaxTree,
        mut pos: Pos,
        block_end: Pos,
        list: &[StmtId],
        mut extend_to_close: bool,
    ) -> Vec<StmtId> {
        if list.is_empty() {
            return vec![self.new_counter(tree, pos, block_end, 0)];
        }
        let mut out = Vec::with_capacity(list.len() + 1);
        let mut rest = list;
        loop {
            let mut last = 0;
            let mut end = block_end;
            while last < rest.len() {
                end = statement_boundary(tree, rest[last]);
                let ends = ends_basic_block(tree, rest[last]);
                last += 1;
                if ends {
                    extend_to_close = false;
                    break;
                }
            }
            if extend_to_close {
                end = block_end;
            }
            // blocks can abut with nothing between them
            if pos != end {
                out.push(self.new_counter(tree, pos, end, last));
            }
            out.extend_from_slice(&rest[..last]);
            rest = &rest[last..];
            match rest.first() {
                Some(next) => pos = tree.stmt(*next).span.start,
                None => break,
            }
        }
        out
    }

    /// `<atomic>.AddUint32(&<cover_var>.Count[i], 1)`
    fn new_counter(&mut self, tree: &mut SyntaxTree, start: Pos, end: Pos, num_stmt: usize) -> StmtId {
        let index = self.blocks.len();
        self.blocks.push(BasicBlock { span: Span::new(start, end), num_stmt });
        let slot = Expr::index(
            Expr::selector(Expr::ident(self.cover_var), "Count"),
            Expr::lit(index.to_string()),
        );
        let add = Expr::call(
            Expr::selector(Expr::ident(self.atomic), "AddUint32"),
            vec![Expr::unary("&", slot), Expr::lit("1")],
        );
        tree.push_stmt(Span::NONE, StmtKind::Expr { x: add })
    }
}

/// Makes the `else` branch's counted region start where the `if` body ends.
/// An `else if` is wrapped in a block of its own first. Returns the branch
/// to visit.
fn pin_else(tree: &mut SyntaxTree, if_id: StmtId, body: StmtId, els: StmtId) -> StmtId {
    let body_end = tree.stmt(body).span.end;
    match &tree.stmt(els).kind {
        StmtKind::If { .. } => {
            let end = tree.stmt(els).span.end;
            let wrapper = tree.push_stmt(
                Span::new(body_end, end),
                StmtKind::Block(Block { lbrace: body_end, rbrace: end, stmts: vec![els] }),
            );
            if let StmtKind::If { els: slot, .. } = &mut tree.stmt_mut(if_id).kind {
                *slot = Some(wrapper);
            }
            wrapper
        }
        StmtKind::Block(_) => {
            tree.block_mut(els).lbrace = body_end;
            els
        }
        other => panic!("else branch of {} is neither a block nor an if: {:?}", if_id, other),
    }
}

/// Where the basic block ending with `id` stops in the source.
pub fn statement_boundary(tree: &SyntaxTree, id: StmtId) -> Pos {
    let lit_in = |s: Option<StmtId>| s.and_then(|s| first_func_lit_in_stmt(tree, s));
    let lit_in_expr = |e: Option<&Expr>| e.and_then(|e| first_func_lit_in_expr(tree, e));
    let node = tree.stmt(id);
    match &node.kind {
        StmtKind::Block(block) => block.lbrace,
        StmtKind::If { init, cond, body, .. } => lit_in(*init)
            .or_else(|| lit_in_expr(Some(cond)))
            .unwrap_or_else(|| tree.block(*body).lbrace),
        StmtKind::For { init, cond, post, body } => lit_in(*init)
            .or_else(|| lit_in_expr(cond.as_ref()))
            .or_else(|| lit_in(*post))
            .unwrap_or_else(|| tree.block(*body).lbrace),
        StmtKind::Labeled { stmt, .. } => statement_boundary(tree, *stmt),
        StmtKind::Range { x, body, .. } => {
            lit_in_expr(Some(x)).unwrap_or_else(|| tree.block(*body).lbrace)
        }
        StmtKind::Switch { init, tag, clauses } => lit_in(*init)
            .or_else(|| lit_in_expr(tag.as_ref()))
            .unwrap_or(clauses.lbrace),
        StmtKind::TypeSwitch { init, clauses, .. } => lit_in(*init).unwrap_or(clauses.lbrace),
        StmtKind::Select { clauses } => clauses.lbrace,
        _ => first_func_lit_in_stmt(tree, id).unwrap_or(node.span.end),
    }
}

/// True when `id` may change the flow of control, or holds a function
/// literal whose body is counted separately.
pub fn ends_basic_block(tree: &SyntaxTree, id: StmtId) -> bool {
    match &tree.stmt(id).kind {
        StmtKind::Block(_)
        | StmtKind::Branch { .. }
        | StmtKind::For { .. }
        | StmtKind::If { .. }
        | StmtKind::Range { .. }
        | StmtKind::Switch { .. }
        | StmtKind::TypeSwitch { .. }
        | StmtKind::Select { .. } => true,
        StmtKind::Labeled { stmt, .. } => ends_basic_block(tree, *stmt),
        StmtKind::Expr { x: Expr::Call(call) }
            if call.args.len() == 1 && *call.fun == Expr::ident("panic") =>
        {
            true
        }
        _ => first_func_lit_in_stmt(tree, id).is_some(),
    }
}

/// Verifies that no two blocks overlap once sorted by start. Each conflict
/// names the two counter indices and their spans.
pub fn check_disjoint(path: &str, blocks: &[BasicBlock]) -> Vec<CoverError> {
    let mut sorted: Vec<(usize, &BasicBlock)> = blocks.iter().enumerate().collect();
    sorted.sort_by_key(|(_, b)| b.span.start);
    sorted
        .windows(2)
        .filter(|pair| pair[0].1.span.end > pair[1].1.span.start)
        .map(|pair| CoverError::Overlap {
            path: path.to_string(),
            first: pair[0].0,
            second: pair[1].0,
            first_span: pair[0].1.span,
            second_span: pair[1].1.span,
        })
        .collect()
}

/// Appends the counter table declaration read back by the coverage runtime.
/// Each position entry is start line, end line, and
/// `(end col & 0xFFFF) << 16 | (start col & 0xFFFF)`.
pub fn write_counter_table<W: fmt::Write>(
    w: &mut W,
    cover_var: &str,
    blocks: &[BasicBlock],
) -> fmt::Result {
    let n = blocks.len();
    writeln!(w)?;
    writeln!(w, "var {} = struct {{", cover_var)?;
    writeln!(w, "\tCount     [{}]uint32", n)?;
    writeln!(w, "\tPos       [3 * {}]uint32", n)?;
    writeln!(w, "\tNumStmt   [{}]uint16", n)?;
    writeln!(w, "}} {{")?;

    writeln!(w, "\tPos: [3 * {}]uint32{{", n)?;
    for (i, block) in blocks.iter().enumerate() {
        let (start, end) = (block.span.start, block.span.end);
        let cols = ((end.col & 0xFFFF) << 16) | (start.col & 0xFFFF);
        writeln!(w, "\t\t{}, {}, {:#x}, // [{}]", start.line, end.line, cols, i)?;
    }
    writeln!(w, "\t}},")?;

    writeln!(w, "\tNumStmt: [{}]uint16{{", n)?;
    for (i, block) in blocks.iter().enumerate() {
        let num = block.num_stmt.min(u16::MAX as usize);
        writeln!(w, "\t\t{}, // {}", num, i)?;
    }
    writeln!(w, "\t}},")?;
    writeln!(w, "}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ast::BranchTok;
    use crate::domain::builder::{call_with, ident, TreeBuilder};

    fn count(tree: &mut SyntaxTree) -> Vec<BasicBlock> {
        BlockCounter::new("Cov", "atomic").count_tree(tree)
    }

    fn spans(blocks: &[BasicBlock]) -> Vec<(u32, u32, u32, u32)> {
        blocks
            .iter()
            .map(|b| (b.span.start.line, b.span.start.col, b.span.end.line, b.span.end.col))
            .collect()
    }

    #[test]
    fn test_if_else_gets_one_counter_per_branch() {
        let mut b = TreeBuilder::new("p/a.go", "p");
        b.func("main", |body| {
            let chain = body.if_(ident("cond"), |then| {
                then.call("a");
            });
            body.else_(chain, |els| {
                els.call("b");
            });
        });
        let mut tree = b.finish();
        let blocks = count(&mut tree);

        // func main() {        lbrace at 3.13
        //  if cond {           body lbrace at 4.32
        //   a()
        //  } else {            body ends at 6.3
        //   b()
        //  }                   else ends at 8.3
        assert_eq!(spans(&blocks), vec![(3, 13, 4, 32), (4, 32, 6, 3), (6, 3, 8, 3)]);
        assert!(blocks.iter().all(|b| b.num_stmt == 1));
        assert!(check_disjoint(&tree.path, &blocks).is_empty());
    }

    #[test]
    fn test_counter_is_first_statement_of_each_block() {
        let mut b = TreeBuilder::new("p/a.go", "p");
        let f = b.func("main", |body| {
            body.call("a");
            body.call("b");
        });
        let mut tree = b.finish();
        let blocks = count(&mut tree);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].num_stmt, 2);

        let body = tree.func(f).body.unwrap();
        let stmts = &tree.block(body).stmts;
        assert_eq!(stmts.len(), 3);
        let expected = Expr::call(
            Expr::selector(Expr::ident("atomic"), "AddUint32"),
            vec![
                Expr::unary("&", Expr::index(Expr::selector(Expr::ident("Cov"), "Count"), Expr::lit("0"))),
                Expr::lit("1"),
            ],
        );
        assert_eq!(tree.stmt(stmts[0]).kind, StmtKind::Expr { x: expected });
        assert!(tree.stmt(stmts[0]).span.is_none());
    }

    #[test]
    fn test_else_if_is_wrapped_in_pinned_block() {
        let mut b = TreeBuilder::new("p/a.go", "p");
        let f = b.func("f", |body| {
            let chain = body.if_(ident("x"), |t| {
                t.call("a");
            });
            body.else_if(chain, ident("y"), |t| {
                t.call("b");
            });
        });
        let mut tree = b.finish();
        let blocks = count(&mut tree);

        let body = tree.func(f).body.unwrap();
        let outer = tree.block(body).stmts[1];
        let StmtKind::If { body: if_body, els: Some(els), .. } = &tree.stmt(outer).kind else {
            panic!("expected if with else");
        };
        let wrapper = tree.block(*els);
        assert_eq!(wrapper.lbrace, tree.stmt(*if_body).span.end);
        assert_eq!(wrapper.stmts.len(), 2);
        assert!(matches!(tree.stmt(wrapper.stmts[1]).kind, StmtKind::If { .. }));
        // enclosing, if body, wrapper, inner if body
        assert_eq!(blocks.len(), 4);
        assert!(check_disjoint(&tree.path, &blocks).is_empty());
    }

    #[test]
    fn test_clauses_are_counted_individually() {
        let mut b = TreeBuilder::new("p/a.go", "p");
        b.func("f", |body| {
            body.switch(Some(ident("k")), |cases| {
                cases.case(vec![Expr::lit("1")], |c| {
                    c.call("one");
                });
                cases.default(|_| {});
            });
            body.switch(None, |_| {});
        });
        let mut tree = b.finish();
        let blocks = count(&mut tree);
        // one block per switch header, then the two clauses; the empty
        // switch has no clause counters
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[2].num_stmt, 1);
        assert_eq!(blocks[3].num_stmt, 0);
        assert_eq!(blocks[3].span.start, Pos::new(7, 2));
        assert!(check_disjoint(&tree.path, &blocks).is_empty());
    }

    #[test]
    fn test_panic_and_branch_end_blocks() {
        let mut b = TreeBuilder::new("p/a.go", "p");
        b.func("f", |body| {
            body.call("a");
            body.expr(call_with("panic", vec![Expr::lit("\"boom\"")]));
            body.call("b");
            body.branch(BranchTok::Goto, Some("L"));
            body.call("c");
        });
        let mut tree = b.finish();
        let blocks = count(&mut tree);
        assert_eq!(blocks.iter().map(|b| b.num_stmt).collect::<Vec<_>>(), vec![2, 2, 1]);
        // once the list is broken up the tail stops at its last statement
        assert_eq!(blocks[2].span.end, Pos::new(8, 12));
        assert!(check_disjoint(&tree.path, &blocks).is_empty());
    }

    #[test]
    fn test_func_literal_splits_enclosing_block() {
        let mut b = TreeBuilder::new("p/a.go", "p");
        b.func("f", |body| {
            body.expr_with_func(
                |lit| call_with("run", vec![lit]),
                |inner| {
                    inner.call("c");
                },
            );
            body.call("d");
        });
        let mut tree = b.finish();
        let blocks = count(&mut tree);
        assert_eq!(spans(&blocks), vec![(3, 10, 4, 15), (7, 2, 7, 12), (4, 15, 6, 3)]);
        assert!(check_disjoint(&tree.path, &blocks).is_empty());
    }

    #[test]
    fn test_overlap_names_both_blocks() {
        let blocks = vec![
            BasicBlock { span: Span::new(Pos::new(5, 1), Pos::new(9, 1)), num_stmt: 1 },
            BasicBlock { span: Span::new(Pos::new(1, 1), Pos::new(4, 1)), num_stmt: 1 },
            BasicBlock { span: Span::new(Pos::new(8, 1), Pos::new(10, 1)), num_stmt: 1 },
        ];
        let errors = check_disjoint("p/a.go", &blocks);
        assert_eq!(errors.len(), 1);
        let CoverError::Overlap { first, second, .. } = &errors[0];
        assert_eq!((*first, *second), (0, 2));
        assert!(errors[0].to_string().contains("block 0 overlaps block 2"));
    }

    #[test]
    fn test_counter_table_layout() {
        let blocks = vec![
            BasicBlock { span: Span::new(Pos::new(3, 13), Pos::new(4, 32)), num_stmt: 1 },
            BasicBlock { span: Span::new(Pos::new(4, 32), Pos::new(6, 3)), num_stmt: 70_000 },
        ];
        let mut out = String::new();
        write_counter_table(&mut out, "Cov", &blocks).unwrap();
        let expected = "
var Cov = struct {
\tCount     [2]uint32
\tPos       [3 * 2]uint32
\tNumStmt   [2]uint16
} {
\tPos: [3 * 2]uint32{
\t\t3, 4, 0x20000d, // [0]
\t\t4, 6, 0x30020, // [1]
\t},
\tNumStmt: [2]uint16{
\t\t1, // 0
\t\t65535, // 1
\t},
}
";
        pretty_assertions::assert_eq!(out, expected);
    }
}
