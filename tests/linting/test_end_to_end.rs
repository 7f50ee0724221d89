use gridlint_core::dashboard::Dashboard;
use gridlint_lint::result::{ResultSet, Severity};
use gridlint_lint::rule::RuleSet;
use gridlint_lint::variables::VariableExpander;

use crate::common::fixture_dashboard;

#[test]
fn every_rule_reports_on_the_fixture() {
    let dashboard = fixture_dashboard();
    let results = RuleSet::standard().lint(std::slice::from_ref(&dashboard));

    let grouped = results.by_rule();
    assert_eq!(grouped.len(), 17, "one group per rule: {:?}", grouped.keys());

    // The fixture is clean apart from two fixable findings: it is editable
    // and the job template does not reload on time range change.
    let open_errors: Vec<&str> = results
        .results()
        .iter()
        .flat_map(|batch| batch.results.iter())
        .filter(|f| f.result.severity == Severity::Error)
        .map(|f| f.result.message.as_str())
        .collect();
    assert_eq!(open_errors.len(), 2, "unexpected errors: {:?}", open_errors);
    assert!(open_errors
        .iter()
        .any(|m| m.contains("is editable, it should be set to 'editable: false'")));
    assert!(open_errors
        .iter()
        .any(|m| m.contains("should be set to be refreshed 'On Time Range Change (value 2)'")));

    assert_eq!(results.maximum_severity(), Severity::Error);
}

#[test]
fn untemplated_datasource_produces_the_documented_error() {
    let dashboard = Dashboard::from_json(
        br#"{
            "title": "test",
            "templating": {"list": []},
            "panels": [{
                "type": "singlestat",
                "title": "bar",
                "datasource": {"uid": "foo"},
                "targets": []
            }]
        }"#,
    )
    .unwrap();

    let results = RuleSet::standard().lint(std::slice::from_ref(&dashboard));
    let grouped = results.by_rule();
    let batches = &grouped["panel-datasource-rule"];
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].results.len(), 1);
    assert_eq!(batches[0].results[0].result.severity, Severity::Error);
    assert_eq!(
        batches[0].results[0].result.message,
        "Dashboard 'test', panel 'bar' does not use a templated datasource, uses 'foo'"
    );
}

#[test]
fn maximum_severity_of_an_empty_set_is_success() {
    assert_eq!(ResultSet::default().maximum_severity(), Severity::Success);
}

#[test]
fn expanded_rate_interval_parses_under_the_metric_grammar() {
    let expanded = VariableExpander::new()
        .expand("sum(rate(foo[$__rate_interval]))", &[])
        .unwrap();
    assert_eq!(expanded, "sum(rate(foo[8869990787ms]))");
    gridlint_grammar::promql::parse(&expanded).unwrap();
}

#[test]
fn quoted_references_survive_while_unquoted_ones_expand() {
    let dashboard = fixture_dashboard();
    let expanded = VariableExpander::new()
        .expand(
            r#"sum(rate(http_requests_total{job=~"$job"}[$__rate_interval]))"#,
            &dashboard.templating.list,
        )
        .unwrap();
    assert_eq!(
        expanded,
        r#"sum(rate(http_requests_total{job=~"$job"}[8869990787ms]))"#
    );
    gridlint_grammar::promql::parse(&expanded).unwrap();
}
