//! Core schema model for gridlint.
//!
//! This crate provides the typed dashboard model shared by every gridlint
//! crate:
//! - [`dashboard`] — Dashboards, panels, targets, template variables, and the
//!   [`DataQuery`](dashboard::DataQuery) classification of target payloads
//!
//! The model is deliberately lossless: every struct carries a flattened map of
//! the JSON properties it does not type, so a dashboard can be parsed, fixed
//! in place, and written back without dropping fields the linter never looks
//! at.

pub mod dashboard;
