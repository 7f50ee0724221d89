//! Shared helpers for the integration tests.
//!
//! Import from any integration test file with:
//!   `#[path = "common/mod.rs"] mod common;`

use gridlint_core::dashboard::Dashboard;

#[allow(dead_code)]
pub fn fixture_dashboard() -> Dashboard {
    let buf = include_bytes!("../fixtures/dashboard.json");
    Dashboard::from_json(buf).expect("fixture dashboard parses")
}
