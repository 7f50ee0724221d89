//! The built-in rule catalog, grouped by the tier each rule runs at.

pub mod dashboard;
pub mod panel;
pub mod target;
pub mod template;

use gridlint_core::dashboard::{Dashboard, Panel, QueryValue};

pub(crate) const PANEL_TYPE_STAT: &str = "stat";
pub(crate) const PANEL_TYPE_SINGLESTAT: &str = "singlestat";
pub(crate) const PANEL_TYPE_GRAPH: &str = "graph";
pub(crate) const PANEL_TYPE_TABLE: &str = "table";
pub(crate) const PANEL_TYPE_TIMESERIES: &str = "timeseries";
pub(crate) const PANEL_TYPE_GAUGE: &str = "gauge";
pub(crate) const PANEL_TYPE_STATE_TIMELINE: &str = "state-timeline";

/// Whether the dashboard's templated datasource queries the given plugin.
pub(crate) fn templated_datasource_is(dashboard: &Dashboard, plugin: &str) -> bool {
    dashboard
        .template_datasource()
        .and_then(|t| t.query.as_ref())
        .and_then(QueryValue::as_str)
        == Some(plugin)
}

/// Panels we try to validate queries for. An allow-list, so unknown panel
/// types never produce false positives.
pub(crate) fn panel_has_queries(panel: &Panel) -> bool {
    matches!(
        panel.kind.as_str(),
        PANEL_TYPE_SINGLESTAT
            | PANEL_TYPE_GAUGE
            | PANEL_TYPE_TABLE
            | PANEL_TYPE_STAT
            | PANEL_TYPE_STATE_TIMELINE
            | PANEL_TYPE_TIMESERIES
    )
}

/// Capitalize the first letter of each word: "prometheus" to "Prometheus".
pub(crate) fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.push(c);
        }
    }
    out
}
