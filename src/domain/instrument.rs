//! The forward pass run before a program executes: imports, block counters,
//! trace-id plumbing, then the disjointness self-check.

use crate::common::config::InstrumentConfig;
use crate::common::error::CoverError;
use crate::domain::ast::{Decl, DeclKeyword, Expr, GenDecl, Span, Spec, SyntaxTree};
use crate::domain::cover::{check_disjoint, BasicBlock, BlockCounter};
use crate::domain::trace::TraceRewriter;

#[derive(Debug, Default)]
pub struct Instrumentation {
    /// Block `i` belongs to counter `i`.
    pub blocks: Vec<BasicBlock>,
    /// Self-check failures. Reported, never fatal.
    pub overlaps: Vec<CoverError>,
}

pub fn instrument_tree(tree: &mut SyntaxTree, config: &InstrumentConfig) -> Instrumentation {
    let atomic = add_import(tree, &config.atomic_path, &config.atomic_alias, "AddUint32");
    let runtime = add_import(tree, &config.runtime_path, &config.runtime_alias, "TraceID");

    let blocks = BlockCounter::new(&config.cover_var, &atomic).count_tree(tree);
    TraceRewriter::new(&runtime, &config.trace_id).rewrite_tree(tree);

    let overlaps = check_disjoint(&tree.path, &blocks);
    Instrumentation { blocks, overlaps }
}

/// Returns the local name under which `path` is imported, adding the import
/// as the first declaration when the file lacks it. A fresh import is kept
/// in use by a trailing `var _ = <alias>.<symbol>`.
pub fn add_import(tree: &mut SyntaxTree, path: &str, alias: &str, symbol: &str) -> String {
    for decl in &tree.decls {
        let Decl::Gen(GenDecl { keyword: DeclKeyword::Import, specs, .. }) = decl else {
            continue;
        };
        for spec in specs {
            if let Spec::Import { name, path: imported } = spec {
                if imported == path {
                    return match name {
                        Some(name) => name.clone(),
                        None => path.rsplit('/').next().unwrap_or(path).to_string(),
                    };
                }
            }
        }
    }

    tree.decls.insert(
        0,
        Decl::Gen(GenDecl {
            span: Span::NONE,
            keyword: DeclKeyword::Import,
            specs: vec![Spec::Import { name: Some(alias.to_string()), path: path.to_string() }],
        }),
    );
    tree.decls.push(Decl::Gen(GenDecl {
        span: Span::NONE,
        keyword: DeclKeyword::Var,
        specs: vec![Spec::Value {
            names: vec!["_".to_string()],
            ty: None,
            values: vec![Expr::selector(Expr::ident(alias), symbol)],
        }],
    }));
    alias.to_string()
}
