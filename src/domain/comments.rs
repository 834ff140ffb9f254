//! Comment ownership.
//!
//! Comments are not part of the statement arena, so before a rewrite each
//! comment group is tied to the node it documents; afterwards only groups
//! whose node survived are kept.

use std::collections::HashSet;

use crate::domain::ast::{CommentGroup, FuncId, GenDecl, Pos, Span, StmtId, SyntaxTree};
use crate::domain::visit::{walk_tree, Visitor};

/// A node a comment can belong to. Declarations other than functions have
/// no handle and are identified by their start position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    File,
    Func(FuncId),
    Decl(Pos),
    Stmt(StmtId),
}

#[derive(Default)]
struct NodeCollector {
    nodes: Vec<(NodeRef, Span)>,
}

impl Visitor for NodeCollector {
    fn visit_func(&mut self, tree: &SyntaxTree, id: FuncId) -> bool {
        self.nodes.push((NodeRef::Func(id), tree.func(id).span));
        true
    }

    fn visit_gen_decl(&mut self, _tree: &SyntaxTree, decl: &GenDecl) -> bool {
        if !decl.span.is_none() {
            self.nodes.push((NodeRef::Decl(decl.span.start), decl.span));
        }
        true
    }

    fn visit_stmt(&mut self, tree: &SyntaxTree, id: StmtId) -> bool {
        let span = tree.stmt(id).span;
        if !span.is_none() {
            self.nodes.push((NodeRef::Stmt(id), span));
        }
        true
    }
}

fn collect_nodes(tree: &SyntaxTree) -> Vec<(NodeRef, Span)> {
    let mut collector = NodeCollector::default();
    walk_tree(&mut collector, tree);
    collector.nodes
}

/// Picks the owner of a comment occupying `c`, in order of preference:
/// the outermost node ending on the comment's first line before it, the
/// outermost node starting right after it (same or next line), the
/// innermost node enclosing it, and finally the file.
fn owner_of(nodes: &[(NodeRef, Span)], c: &Span) -> NodeRef {
    let trailing = nodes
        .iter()
        .filter(|(_, n)| n.end.line == c.start.line && n.end <= c.start)
        .max_by_key(|(_, n)| (n.end, std::cmp::Reverse(n.start)));
    if let Some((node, _)) = trailing {
        return *node;
    }

    let leading = nodes
        .iter()
        .filter(|(_, n)| {
            n.start >= c.end && (n.start.line == c.end.line || n.start.line == c.end.line + 1)
        })
        .min_by_key(|(_, n)| (n.start, std::cmp::Reverse(n.end)));
    if let Some((node, _)) = leading {
        return *node;
    }

    nodes
        .iter()
        .filter(|(_, n)| n.contains(c))
        .max_by_key(|(_, n)| (n.start, std::cmp::Reverse(n.end)))
        .map(|(node, _)| *node)
        .unwrap_or(NodeRef::File)
}

/// Comment groups of a tree, each tied to its owning node.
#[derive(Debug, Clone, Default)]
pub struct CommentMap {
    owned: Vec<(NodeRef, CommentGroup)>,
}

impl CommentMap {
    pub fn build(tree: &SyntaxTree) -> Self {
        let nodes = collect_nodes(tree);
        let mut groups = tree.comments.clone();
        groups.sort_by_key(|g| g.span.start);
        let owned = groups
            .into_iter()
            .map(|group| (owner_of(&nodes, &group.span), group))
            .collect();
        Self { owned }
    }

    pub fn owner(&self, comment_start: Pos) -> Option<NodeRef> {
        self.owned
            .iter()
            .find(|(_, group)| group.span.start == comment_start)
            .map(|(node, _)| *node)
    }

    /// Groups whose owner is still part of `tree`, in source order.
    pub fn filter(self, tree: &SyntaxTree) -> Vec<CommentGroup> {
        let alive: HashSet<NodeRef> = collect_nodes(tree).into_iter().map(|(node, _)| node).collect();
        self.owned
            .into_iter()
            .filter(|(node, _)| *node == NodeRef::File || alive.contains(node))
            .map(|(_, group)| group)
            .collect()
    }
}

/// Leading part of `src` made of blank lines and `//` comment lines, cut
/// after the last blank line. Build constraints live there and must stay
/// ahead of everything else.
pub fn leading_header(src: &str) -> &str {
    let mut end = 0;
    let mut offset = 0;
    for line in src.split_inclusive('\n') {
        offset += line.len();
        let trimmed = line.trim();
        if trimmed.is_empty() {
            end = offset;
            continue;
        }
        if !trimmed.starts_with("//") {
            break;
        }
    }
    &src[..end]
}

/// Drops every comment except `//go:` directives starting in column 1.
/// Directives on the first `header_lines` lines are dropped as well, since
/// the header is copied verbatim.
pub fn retain_directives(tree: &mut SyntaxTree, header_lines: u32) {
    let mut kept = Vec::new();
    for group in &tree.comments {
        if group.span.start.col != 1 {
            continue;
        }
        for (offset, text) in group.lines.iter().enumerate() {
            let line = group.span.start.line + offset as u32;
            if line > header_lines && text.starts_with("//go:") {
                kept.push(CommentGroup {
                    span: Span::new(Pos::new(line, 1), Pos::new(line, 1 + text.len() as u32)),
                    lines: vec![text.clone()],
                });
            }
        }
    }
    tree.comments = kept;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builder::TreeBuilder;

    #[test]
    fn test_comment_owners() {
        let mut b = TreeBuilder::new("p/a.go", "p");
        b.comment("// doc for f");
        let f = b.func("f", |body| {
            body.comment("// before a");
            body.call("a");
        });
        b.comment("// dangling at the end");
        let tree = b.finish();
        let map = CommentMap::build(&tree);

        // doc comment on line 3, f starts on line 4
        assert_eq!(map.owner(Pos::new(3, 1)), Some(NodeRef::Func(f)));
        let body = tree.func(f).body.unwrap();
        let a = tree.block(body).stmts[0];
        assert_eq!(map.owner(Pos::new(5, 2)), Some(NodeRef::Stmt(a)));
        assert_eq!(map.owner(Pos::new(9, 1)), Some(NodeRef::File));
    }

    #[test]
    fn test_filter_drops_orphans() {
        let mut b = TreeBuilder::new("p/a.go", "p");
        b.comment("// doc for kept");
        let kept = b.func("kept", |body| {
            body.call("a");
        });
        b.comment("// doc for gone");
        b.func("gone", |body| {
            body.call("b");
        });
        let mut tree = b.finish();
        let map = CommentMap::build(&tree);
        tree.decls.retain(|d| matches!(d, crate::domain::ast::Decl::Func { func } if *func == kept));
        let comments = map.filter(&tree);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].lines, vec!["// doc for kept".to_string()]);
    }

    #[test]
    fn test_leading_header_stops_at_last_blank_line() {
        let src = "// +build linux\n\n// Package p does things.\npackage p\n";
        assert_eq!(leading_header(src), "// +build linux\n\n");
        assert_eq!(leading_header("package p\n"), "");
    }

    #[test]
    fn test_only_column_one_directives_survive() {
        let mut tree = SyntaxTree::new("p/a.go", "p");
        tree.comments = vec![
            CommentGroup {
                span: Span::new(Pos::new(1, 1), Pos::new(1, 20)),
                lines: vec!["//go:build linux".into()],
            },
            CommentGroup {
                span: Span::new(Pos::new(5, 1), Pos::new(6, 30)),
                lines: vec!["// Handler serves.".into(), "//go:noinline".into()],
            },
            CommentGroup {
                span: Span::new(Pos::new(9, 2), Pos::new(9, 20)),
                lines: vec!["//go:nosplit".into()],
            },
        ];
        retain_directives(&mut tree, 2);
        assert_eq!(tree.comments.len(), 1);
        assert_eq!(tree.comments[0].span.start, Pos::new(6, 1));
        assert_eq!(tree.comments[0].lines, vec!["//go:noinline".to_string()]);
    }
}
