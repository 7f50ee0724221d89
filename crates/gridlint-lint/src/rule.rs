//! Rule abstraction and dispatch over the dashboard tree.

use gridlint_core::dashboard::{Dashboard, DataQuery, PanelOrRow};

use crate::result::{
    DashboardFix, DashboardRef, DashboardRuleResults, FixableResult, LintResult, PanelFix,
    PanelRef, PanelRuleResults, ResultContext, ResultSet, RuleMeta, TargetFix, TargetRuleResults,
};
use crate::rules;

/// Stable identity of a target for one lint pass: its panel's position in the
/// dashboard and its own position within that panel. Never part of the
/// schema itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetIndex {
    pub panel: usize,
    pub target: usize,
}

/// The dispatcher's view of one target: positional identity plus the
/// classified query payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub index: TargetIndex,
    pub query: DataQuery,
}

/// A lint rule. Each implementation walks the dashboard at its own tier and
/// records batches into the [`ResultSet`].
pub trait Rule {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn lint(&self, dashboard: &Dashboard, set: &mut ResultSet);
}

fn meta(rule: &dyn Rule) -> RuleMeta {
    RuleMeta {
        name: rule.name().to_string(),
        description: rule.description().to_string(),
    }
}

/// A document-level rule backed by a plain function.
pub struct DashboardRuleFunc {
    name: String,
    description: String,
    func: Box<dyn Fn(&Dashboard) -> DashboardRuleResults>,
}

impl DashboardRuleFunc {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        func: impl Fn(&Dashboard) -> DashboardRuleResults + 'static,
    ) -> Self {
        DashboardRuleFunc {
            name: name.into(),
            description: description.into(),
            func: Box::new(func),
        }
    }
}

impl Rule for DashboardRuleFunc {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn lint(&self, dashboard: &Dashboard, set: &mut ResultSet) {
        let mut results = (self.func)(dashboard).results;
        if results.is_empty() {
            results.push(crate::result::DashboardResult {
                result: LintResult::success(),
                fix: None,
            });
        }
        let results = results
            .into_iter()
            .map(|r| FixableResult {
                result: r.result,
                fix: r.fix,
            })
            .collect();
        set.add_result(ResultContext {
            rule: meta(self),
            dashboard: DashboardRef::of(dashboard),
            panel: None,
            target_index: None,
            results,
        });
    }
}

/// A panel-level rule backed by a plain function, invoked once per panel
/// slot (rows included).
pub struct PanelRuleFunc {
    name: String,
    description: String,
    func: Box<dyn Fn(&Dashboard, &PanelOrRow) -> PanelRuleResults>,
}

impl PanelRuleFunc {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        func: impl Fn(&Dashboard, &PanelOrRow) -> PanelRuleResults + 'static,
    ) -> Self {
        PanelRuleFunc {
            name: name.into(),
            description: description.into(),
            func: Box::new(func),
        }
    }
}

impl Rule for PanelRuleFunc {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn lint(&self, dashboard: &Dashboard, set: &mut ResultSet) {
        for (pi, panel) in dashboard.panels.iter().enumerate() {
            let mut results = (self.func)(dashboard, panel).results;
            if results.is_empty() {
                results.push(crate::result::PanelResult {
                    result: LintResult::success(),
                    fix: None,
                });
            }
            let results = results
                .into_iter()
                .map(|r| FixableResult {
                    result: r.result,
                    fix: r.fix.map(|f| fix_panel(pi, f)),
                })
                .collect();
            set.add_result(ResultContext {
                rule: meta(self),
                dashboard: DashboardRef::of(dashboard),
                panel: Some(PanelRef::of(panel)),
                target_index: None,
                results,
            });
        }
    }
}

/// Wrap a panel fix so it addresses the panel by its recorded position.
fn fix_panel(pi: usize, fix: PanelFix) -> DashboardFix {
    Box::new(move |dashboard: &mut Dashboard| {
        let mut panel = dashboard.panels[pi].clone();
        fix(dashboard, &mut panel);
        dashboard.panels[pi] = panel;
    })
}

/// A target-level rule backed by a plain function, invoked once per target
/// of every non-row panel.
pub struct TargetRuleFunc {
    name: String,
    description: String,
    func: Box<dyn Fn(&Dashboard, &PanelOrRow, &Target) -> TargetRuleResults>,
}

impl TargetRuleFunc {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        func: impl Fn(&Dashboard, &PanelOrRow, &Target) -> TargetRuleResults + 'static,
    ) -> Self {
        TargetRuleFunc {
            name: name.into(),
            description: description.into(),
            func: Box::new(func),
        }
    }
}

impl Rule for TargetRuleFunc {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn lint(&self, dashboard: &Dashboard, set: &mut ResultSet) {
        for (pi, slot) in dashboard.panels.iter().enumerate() {
            let panel = match slot {
                PanelOrRow::Panel(panel) => panel,
                PanelOrRow::Row(_) => continue,
            };

            for (ti, schema_target) in panel.targets().iter().enumerate() {
                let target = Target {
                    index: TargetIndex {
                        panel: pi,
                        target: ti,
                    },
                    query: dashboard.classify_query(panel, schema_target),
                };

                let mut results = (self.func)(dashboard, slot, &target).results;
                if results.is_empty() {
                    results.push(crate::result::TargetResult {
                        result: LintResult::success(),
                        fix: None,
                    });
                }
                let results = results
                    .into_iter()
                    .map(|r| FixableResult {
                        result: r.result,
                        fix: r.fix.map(|f| fix_target(pi, ti, f)),
                    })
                    .collect();
                set.add_result(ResultContext {
                    rule: meta(self),
                    dashboard: DashboardRef::of(dashboard),
                    panel: Some(PanelRef::of(slot)),
                    target_index: Some(target.index),
                    results,
                });
            }
        }
    }
}

/// Wrap a target fix so it addresses the target by its recorded
/// `(panel, target)` position.
fn fix_target(pi: usize, ti: usize, fix: TargetFix) -> DashboardFix {
    Box::new(move |dashboard: &mut Dashboard| {
        let slot = dashboard.panels[pi].clone();
        if let PanelOrRow::Panel(mut panel) = slot {
            if let Some(targets) = panel.targets.as_mut() {
                let mut target = targets[ti].clone();
                fix(dashboard, &dashboard.panels[pi], &mut target);
                targets[ti] = target;
            }
            dashboard.panels[pi] = PanelOrRow::Panel(panel);
        }
    })
}

/// The set of rules applied in one lint pass.
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleSet {
    /// An empty rule set.
    pub fn new() -> Self {
        RuleSet::default()
    }

    /// The full built-in rule catalog.
    pub fn standard() -> Self {
        let mut set = RuleSet::default();
        set.add(rules::template::new_template_datasource_rule());
        set.add(rules::template::new_template_job_rule());
        set.add(rules::template::new_template_instance_rule());
        set.add(rules::template::new_template_label_promql_rule());
        set.add(rules::template::new_template_on_time_change_reload_rule());
        set.add(rules::panel::new_panel_datasource_rule());
        set.add(rules::panel::new_panel_title_description_rule());
        set.add(rules::panel::new_panel_units_rule());
        set.add(rules::panel::new_panel_no_targets_rule());
        set.add(rules::target::new_target_logql_rule());
        set.add(rules::target::new_target_logql_auto_rule());
        set.add(rules::target::new_target_promql_rule());
        set.add(rules::target::new_target_rate_interval_rule());
        set.add(rules::target::new_target_job_rule());
        set.add(rules::target::new_target_instance_rule());
        set.add(rules::target::new_target_counter_agg_rule());
        set.add(rules::dashboard::new_uneditable_rule());
        set
    }

    pub fn add(&mut self, rule: impl Rule + 'static) {
        self.rules.push(Box::new(rule));
    }

    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    /// Run every rule over every dashboard, in order.
    pub fn lint(&self, dashboards: &[Dashboard]) -> ResultSet {
        let mut set = ResultSet::default();
        for dashboard in dashboards {
            for rule in &self.rules {
                rule.lint(dashboard, &mut set);
            }
        }
        set
    }
}

#[cfg(test)]
#[path = "rule_tests.rs"]
mod tests;
