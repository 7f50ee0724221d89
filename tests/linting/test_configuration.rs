use gridlint_lint::config::LintConfiguration;
use gridlint_lint::result::Severity;
use gridlint_lint::rule::{Rule, RuleSet};

use crate::common::fixture_dashboard;

fn config(json: &str) -> LintConfiguration {
    serde_json::from_str(json).unwrap()
}

#[test]
fn configure_rewrites_already_stored_batches() {
    let dashboard = fixture_dashboard();
    let mut results = RuleSet::standard().lint(std::slice::from_ref(&dashboard));
    assert_eq!(results.maximum_severity(), Severity::Error);

    results.configure(config(
        r#"{
            "exclusions": {
                "uneditable-dashboard": {"reason": "editing is fine in dev"},
                "template-on-time-change-reload-rule": {}
            }
        }"#,
    ));
    assert_eq!(results.maximum_severity(), Severity::Exclude);
}

#[test]
fn configuration_applies_to_batches_added_later() {
    let dashboard = fixture_dashboard();
    let rules = RuleSet::standard();

    let mut results = rules.lint(&[]);
    results.configure(config(
        r#"{"warnings": {"uneditable-dashboard": {}, "template-on-time-change-reload-rule": {}}}"#,
    ));

    for rule in rules.rules() {
        rule.lint(&dashboard, &mut results);
    }
    // The two errors were demoted on entry.
    assert_eq!(results.maximum_severity(), Severity::Warning);
}

#[test]
fn scoped_exclusions_only_match_their_dashboard() {
    let dashboard = fixture_dashboard();
    let mut results = RuleSet::standard().lint(std::slice::from_ref(&dashboard));

    results.configure(config(
        r#"{
            "exclusions": {
                "uneditable-dashboard": {"entries": [{"dashboard": "some other dashboard"}]},
                "template-on-time-change-reload-rule": {"entries": [{"dashboard": "test"}]}
            }
        }"#,
    ));
    // Only the reload finding matched its entry; the editable error remains.
    assert_eq!(results.maximum_severity(), Severity::Error);
    let open_errors = results
        .results()
        .iter()
        .flat_map(|batch| batch.results.iter())
        .filter(|f| f.result.severity == Severity::Error)
        .count();
    assert_eq!(open_errors, 1);
}
