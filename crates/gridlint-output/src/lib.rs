//! Report formatters for lint results.
//!
//! Two output modes:
//! - **Human** (default): colored per-severity symbols, grouped by rule
//! - **JSON** (`--json`): machine-readable, one entry per diagnostic

pub mod human;
pub mod json;

use gridlint_lint::result::ResultSet;

pub trait OutputFormatter {
    fn format(&self, results: &ResultSet) -> String;
}
