use gridlint_lint::result::Severity;
use gridlint_lint::rule::RuleSet;

use crate::common::fixture_dashboard;

#[test]
fn autofix_remediates_the_fixture_in_place() {
    let mut dashboard = fixture_dashboard();
    let mut results = RuleSet::standard().lint(std::slice::from_ref(&dashboard));
    assert_eq!(results.maximum_severity(), Severity::Error);

    let changes = results.autofix(&mut dashboard);
    assert_eq!(changes, 2);

    // The dashboard itself was mutated through the stored closures.
    assert_eq!(dashboard.editable, Some(false));
    let job = dashboard.template("job").unwrap();
    assert_eq!(job.refresh, Some(2));
    // The instance template already had the right refresh and is untouched.
    assert_eq!(dashboard.template("instance").unwrap().refresh, Some(2));

    // Remediated diagnostics rank as Fixed, which tops the severity order,
    // while nothing open remains.
    assert_eq!(results.maximum_severity(), Severity::Fixed);
    assert_eq!(results.maximum_open_severity(), Severity::Success);

    let fixed: usize = results
        .results()
        .iter()
        .flat_map(|batch| batch.results.iter())
        .filter(|f| f.result.severity == Severity::Fixed)
        .count();
    assert_eq!(fixed, 2);

    // Applying again re-applies nothing.
    assert_eq!(results.autofix(&mut dashboard), 0);
}

#[test]
fn fixed_dashboard_serializes_with_unknown_fields_intact() {
    let mut dashboard = fixture_dashboard();
    let mut results = RuleSet::standard().lint(std::slice::from_ref(&dashboard));
    results.autofix(&mut dashboard);

    let value = serde_json::to_value(&dashboard).unwrap();
    assert_eq!(value["editable"], false);
    assert_eq!(value["schemaVersion"], 39);
    assert_eq!(value["templating"]["list"][1]["refresh"], 2);
    assert_eq!(value["panels"][1]["fieldConfig"]["defaults"]["unit"], "reqps");

    // And the written form still parses as the same dashboard.
    let reparsed =
        gridlint_core::dashboard::Dashboard::from_json(value.to_string().as_bytes()).unwrap();
    assert_eq!(reparsed.editable, Some(false));
    assert_eq!(reparsed.panels.len(), 2);
}

#[test]
fn autofix_without_fixable_findings_returns_zero() {
    let mut dashboard = fixture_dashboard();
    dashboard.editable = Some(false);
    for template in &mut dashboard.templating.list {
        if template.kind == "query" {
            template.refresh = Some(2);
        }
    }
    let mut results = RuleSet::standard().lint(std::slice::from_ref(&dashboard));
    assert_eq!(results.maximum_severity(), Severity::Success);
    assert_eq!(results.autofix(&mut dashboard), 0);
}
