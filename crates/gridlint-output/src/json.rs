use gridlint_lint::result::ResultSet;
use serde_json::{json, Value};

use crate::OutputFormatter;

/// Machine-readable report: a JSON array with one entry per diagnostic.
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format(&self, results: &ResultSet) -> String {
        let entries: Vec<Value> = results
            .results()
            .iter()
            .flat_map(|batch| {
                batch.results.iter().map(move |fixable| {
                    json!({
                        "rule": batch.rule.name,
                        "dashboard": batch.dashboard.title,
                        "panel": batch.panel.as_ref().and_then(|p| p.title.clone()),
                        "targetIdx": batch.target_index.map(|i| i.target),
                        "severity": fixable.result.severity,
                        "message": fixable.result.message,
                    })
                })
            })
            .collect();
        let mut out = serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string());
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridlint_core::dashboard::Dashboard;
    use gridlint_lint::result::DashboardRuleResults;
    use gridlint_lint::rule::{DashboardRuleFunc, RuleSet};

    #[test]
    fn one_entry_per_diagnostic() {
        let mut set = RuleSet::new();
        set.add(DashboardRuleFunc::new("some-rule", "Checks something.", |d| {
            let mut r = DashboardRuleResults::default();
            r.add_error(d, "is broken");
            r.add_warning(d, "is iffy");
            r
        }));
        let results = set.lint(&[Dashboard {
            title: Some("test".to_string()),
            ..Default::default()
        }]);

        let text = JsonFormatter.format(&results);
        let parsed: Vec<Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["rule"], "some-rule");
        assert_eq!(parsed[0]["dashboard"], "test");
        assert_eq!(parsed[0]["severity"], "error");
        assert_eq!(parsed[1]["severity"], "warning");
        assert_eq!(parsed[0]["message"], "Dashboard 'test' is broken");
    }
}
