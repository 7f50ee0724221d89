use gridlint_core::dashboard::{Dashboard, Panel, PanelOrRow, RowPanel, Target};

use super::*;
use crate::result::{DashboardRuleResults, LintResult, PanelRuleResults, Severity, TargetRuleResults};

fn sample_dashboard() -> Dashboard {
    Dashboard {
        title: Some("Sample dashboard".to_string()),
        panels: vec![
            PanelOrRow::Row(RowPanel {
                title: Some("Section".to_string()),
                ..Default::default()
            }),
            PanelOrRow::Panel(Panel {
                kind: "timeseries".to_string(),
                title: Some("QPS".to_string()),
                targets: Some(vec![
                    Target {
                        expr: Some("up".to_string()),
                        ..Default::default()
                    },
                    Target {
                        expr: Some("up2".to_string()),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
        ],
        ..Default::default()
    }
}

#[test]
fn custom_dashboard_rule_is_dispatched_once() {
    let rule = DashboardRuleFunc::new("test-dashboard-rule", "Test dashboard rule", |d| {
        let mut r = DashboardRuleResults::default();
        r.add_error(d, "boom");
        r
    });
    let set = rule_set_with(rule).lint(&[sample_dashboard()]);
    let grouped = set.by_rule();
    assert_eq!(grouped["test-dashboard-rule"].len(), 1);
    assert_eq!(
        grouped["test-dashboard-rule"][0].results[0].result,
        LintResult {
            severity: Severity::Error,
            message: "Dashboard 'Sample dashboard' boom".to_string(),
        }
    );
}

#[test]
fn custom_panel_rule_runs_per_panel_slot() {
    let rule = PanelRuleFunc::new("test-panel-rule", "Test panel rule", |d, p| {
        let mut r = PanelRuleResults::default();
        r.add_error(d, p, "boom");
        r
    });
    let set = rule_set_with(rule).lint(&[sample_dashboard()]);
    // One batch per panel slot, rows included.
    assert_eq!(set.results().len(), 2);
    assert_eq!(
        set.results()[0].results[0].result.message,
        "Dashboard 'Sample dashboard', panel 'Section' boom"
    );
}

#[test]
fn custom_target_rule_sees_indexed_targets() {
    let rule = TargetRuleFunc::new("test-target-rule", "Test target rule", |d, p, t| {
        let mut r = TargetRuleResults::default();
        r.add_error(d, p, t, "boom");
        r
    });
    let set = rule_set_with(rule).lint(&[sample_dashboard()]);
    // Only the two targets of the data panel; the row is skipped.
    assert_eq!(set.results().len(), 2);
    assert_eq!(
        set.results()[0].target_index,
        Some(TargetIndex { panel: 1, target: 0 })
    );
    assert_eq!(
        set.results()[1].results[0].result.message,
        "Dashboard 'Sample dashboard', panel 'QPS', target idx '1' boom"
    );
}

#[test]
fn empty_rule_results_become_a_single_success() {
    let rule = DashboardRuleFunc::new("quiet-rule", "Never complains", |_| {
        DashboardRuleResults::default()
    });
    let set = rule_set_with(rule).lint(&[sample_dashboard()]);
    assert_eq!(set.results().len(), 1);
    assert_eq!(set.results()[0].results.len(), 1);
    assert_eq!(set.results()[0].results[0].result, LintResult::success());
}

#[test]
fn fixable_rules_apply_in_recorded_order() {
    let rule = DashboardRuleFunc::new("test-fixable-rule", "Test fixable rule", |d| {
        let mut r = DashboardRuleResults::default();
        r.add_fixable_error(d, "fixing first issue", |d: &mut Dashboard| {
            let title = d.title.clone().unwrap_or_default();
            d.title = Some(format!("{} fixed-once", title));
        });
        r.add_fixable_error(d, "fixing second issue", |d: &mut Dashboard| {
            let title = d.title.clone().unwrap_or_default();
            d.title = Some(format!("{} fixed-twice", title));
        });
        r
    });

    let mut dashboard = sample_dashboard();
    let mut set = rule_set_with(rule).lint(std::slice::from_ref(&dashboard));
    assert_eq!(set.autofix(&mut dashboard), 2);
    assert_eq!(
        dashboard.title.as_deref(),
        Some("Sample dashboard fixed-once fixed-twice")
    );
    assert!(set
        .results()
        .iter()
        .flat_map(|c| c.results.iter())
        .all(|f| f.result.severity == Severity::Fixed));
}

#[test]
fn panel_fixes_address_by_position() {
    let rule = PanelRuleFunc::new("retitle-rule", "Retitles panels", |d, p| {
        let mut r = PanelRuleResults::default();
        if p.title() == Some("QPS") {
            r.add_error(d, p, "bad title");
            r.results[0].fix = Some(Box::new(|_d: &Dashboard, panel: &mut PanelOrRow| {
                if let PanelOrRow::Panel(panel) = panel {
                    panel.title = Some("renamed".to_string());
                }
            }));
        }
        r
    });

    let mut dashboard = sample_dashboard();
    let mut set = rule_set_with(rule).lint(std::slice::from_ref(&dashboard));
    assert_eq!(set.autofix(&mut dashboard), 1);
    assert_eq!(dashboard.panels[1].title(), Some("renamed"));
    // The row is untouched.
    assert_eq!(dashboard.panels[0].title(), Some("Section"));
}

#[test]
fn target_fixes_address_by_panel_and_target_position() {
    let rule = TargetRuleFunc::new("rewrite-rule", "Rewrites targets", |d, p, t| {
        let mut r = TargetRuleResults::default();
        if t.index.target == 1 {
            r.add_error(d, p, t, "bad expr");
            r.results[0].fix = Some(Box::new(
                |_d: &Dashboard, _p: &PanelOrRow, target: &mut Target| {
                    target.expr = Some("rewritten".to_string());
                },
            ));
        }
        r
    });

    let mut dashboard = sample_dashboard();
    let mut set = rule_set_with(rule).lint(std::slice::from_ref(&dashboard));
    assert_eq!(set.autofix(&mut dashboard), 1);
    let panel = dashboard.panels[1].as_panel().unwrap();
    assert_eq!(panel.targets()[0].expr.as_deref(), Some("up"));
    assert_eq!(panel.targets()[1].expr.as_deref(), Some("rewritten"));
}

#[test]
fn standard_rule_set_has_the_full_catalog() {
    let set = RuleSet::standard();
    assert_eq!(set.rules().len(), 17);
    let names: Vec<&str> = set.rules().iter().map(|r| r.name()).collect();
    assert!(names.contains(&"template-datasource-rule"));
    assert!(names.contains(&"panel-units-rule"));
    assert!(names.contains(&"target-logql-auto-rule"));
    assert!(names.contains(&"uneditable-dashboard"));
}

fn rule_set_with(rule: impl Rule + 'static) -> RuleSet {
    let mut set = RuleSet::new();
    set.add(rule);
    set
}
