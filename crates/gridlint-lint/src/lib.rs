//! Rule engine for dashboard linting.
//!
//! This crate is the core of gridlint:
//! - [`rule`] — the [`Rule`](rule::Rule) trait, the three function-rule
//!   carriers (document, panel, target), and [`RuleSet`](rule::RuleSet)
//!   dispatch over the dashboard tree
//! - [`result`] — severity grading, result batches, and
//!   [`ResultSet`](result::ResultSet) with autofix
//! - [`variables`] — expansion of `$variable` references into representative
//!   literals before query parsing
//! - [`config`] — per-rule severity overrides loaded from a JSON file
//! - [`rules`] — the built-in rule catalog:
//!   - template-datasource-rule, template-job-rule, template-instance-rule,
//!     template-label-promql-rule, template-on-time-change-reload-rule
//!   - panel-datasource-rule, panel-title-description-rule,
//!     panel-units-rule, panel-no-targets-rule
//!   - target-promql-rule, target-rate-interval-rule, target-job-rule,
//!     target-instance-rule, target-counter-agg-rule, target-logql-rule,
//!     target-logql-auto-rule
//!   - uneditable-dashboard

pub mod config;
pub mod result;
pub mod rule;
pub mod rules;
pub mod variables;
