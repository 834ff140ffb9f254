//! Error types for the domain layer.
//!
//! Application code wraps these in `anyhow::Error` with file context.

use thiserror::Error;

use crate::domain::ast::Span;

/// A syntax tree handed over by the front end is not usable.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("{path}: statement handle #{id} does not exist")]
    DanglingStmt { path: String, id: u32 },

    #[error("{path}: function handle #{id} does not exist")]
    DanglingFunc { path: String, id: u32 },

    #[error("{path}: statement #{id} is referenced from more than one place")]
    SharedStmt { path: String, id: u32 },

    #[error("{path}: statement #{id} should be a {expected}")]
    UnexpectedShape {
        path: String,
        id: u32,
        expected: &'static str,
    },
}

/// A coverage profile could not be read.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("line {line_no}: malformed coverage record {line:?}")]
    MalformedRecord { line_no: usize, line: String },

    #[error("line {line_no}: bad mode line {line:?}")]
    BadMode { line_no: usize, line: String },
}

/// Internal-consistency failure found by the instrumentation self-check.
#[derive(Debug, Error)]
pub enum CoverError {
    #[error("{path}: internal error: block {first} overlaps block {second} ({first_span} vs {second_span})")]
    Overlap {
        path: String,
        first: usize,
        second: usize,
        first_span: Span,
        second_span: Span,
    },
}
