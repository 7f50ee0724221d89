//! Validating parsers for the query languages embedded in dashboards.
//!
//! Two grammar families are supported:
//! - [`promql`] — Prometheus-style metric queries: selectors with matchers,
//!   matrix and subquery ranges, aggregations, and function calls
//! - [`logql`] — Loki-style log queries: stream selectors, pipeline stages,
//!   log ranges, and range/vector aggregations
//!
//! Both expose `parse(expr) -> Result<Expr, ParseError>` over a fully
//! expanded expression (no `$variable` references left outside string
//! literals) and surface exactly the AST detail lint rules need: selector
//! and matcher extraction, range intervals, and tree walking.
//!
//! The parsers are conservative: they accept the constructs that appear in
//! real dashboards and reject what they do not know, because a linter that
//! silently accepts a malformed query is worse than one that reports it.

pub mod duration;
pub mod lex;
pub mod logql;
pub mod promql;

/// A parse failure with a 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("parse error: no expression found in input")]
    Empty,
    #[error("{line}:{col}: parse error: {msg}")]
    Unexpected { line: u32, col: u32, msg: String },
}

impl ParseError {
    pub(crate) fn at(line: u32, col: u32, msg: impl Into<String>) -> Self {
        ParseError::Unexpected {
            line,
            col,
            msg: msg.into(),
        }
    }
}
