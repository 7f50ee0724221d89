//! Lint results, severity grading, and the result set.

use std::collections::BTreeMap;

use gridlint_core::dashboard::{Dashboard, PanelOrRow, Target as SchemaTarget};
use serde::Serialize;

use crate::config::LintConfiguration;
use crate::rule::{Target, TargetIndex};

/// Diagnostic severity, ordered from least to most severe.
///
/// `Fixed` is only ever assigned by [`ResultSet::autofix`]; rules never
/// produce it directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Success,
    Exclude,
    Quiet,
    Warning,
    Error,
    Fixed,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Severity::Success => "success",
            Severity::Exclude => "exclude",
            Severity::Quiet => "quiet",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fixed => "fixed",
        })
    }
}

/// One diagnostic: severity plus a fully formatted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintResult {
    pub severity: Severity,
    pub message: String,
}

impl LintResult {
    /// The diagnostic synthesized for rule invocations with no findings.
    pub fn success() -> Self {
        LintResult {
            severity: Severity::Success,
            message: "OK".to_string(),
        }
    }
}

/// Remediation closure for document-level findings.
pub type DashboardFix = Box<dyn Fn(&mut Dashboard)>;
/// Remediation closure for panel-level findings. Receives the dashboard and
/// a detached copy of the panel, which the dispatcher writes back.
pub type PanelFix = Box<dyn Fn(&Dashboard, &mut PanelOrRow)>;
/// Remediation closure for target-level findings.
pub type TargetFix = Box<dyn Fn(&Dashboard, &PanelOrRow, &mut SchemaTarget)>;

/// A stored diagnostic together with its positional remediation closure, if
/// the finding is fixable.
pub struct FixableResult {
    pub result: LintResult,
    pub fix: Option<DashboardFix>,
}

/// Results accumulated by one document-rule invocation.
#[derive(Default)]
pub struct DashboardRuleResults {
    pub results: Vec<DashboardResult>,
}

pub struct DashboardResult {
    pub result: LintResult,
    pub fix: Option<DashboardFix>,
}

fn dashboard_message(dashboard: &Dashboard, message: &str) -> String {
    format!(
        "Dashboard '{}' {}",
        dashboard.title.as_deref().unwrap_or(""),
        message
    )
}

impl DashboardRuleResults {
    pub fn add_error(&mut self, dashboard: &Dashboard, message: &str) {
        self.results.push(DashboardResult {
            result: LintResult {
                severity: Severity::Error,
                message: dashboard_message(dashboard, message),
            },
            fix: None,
        });
    }

    pub fn add_fixable_error(
        &mut self,
        dashboard: &Dashboard,
        message: &str,
        fix: impl Fn(&mut Dashboard) + 'static,
    ) {
        self.results.push(DashboardResult {
            result: LintResult {
                severity: Severity::Error,
                message: dashboard_message(dashboard, message),
            },
            fix: Some(Box::new(fix)),
        });
    }

    pub fn add_warning(&mut self, dashboard: &Dashboard, message: &str) {
        self.results.push(DashboardResult {
            result: LintResult {
                severity: Severity::Warning,
                message: dashboard_message(dashboard, message),
            },
            fix: None,
        });
    }
}

/// Results accumulated by one panel-rule invocation.
#[derive(Default)]
pub struct PanelRuleResults {
    pub results: Vec<PanelResult>,
}

pub struct PanelResult {
    pub result: LintResult,
    pub fix: Option<PanelFix>,
}

impl PanelRuleResults {
    pub fn add_error(&mut self, dashboard: &Dashboard, panel: &PanelOrRow, message: &str) {
        let title = panel.title().unwrap_or("");
        let msg = if title.is_empty() {
            format!(
                "Dashboard '{}', panel with id '{}' {}",
                dashboard.title.as_deref().unwrap_or(""),
                panel.id().unwrap_or(0),
                message
            )
        } else {
            format!(
                "Dashboard '{}', panel '{}' {}",
                dashboard.title.as_deref().unwrap_or(""),
                title,
                message
            )
        };
        self.results.push(PanelResult {
            result: LintResult {
                severity: Severity::Error,
                message: msg,
            },
            fix: None,
        });
    }
}

/// Results accumulated by one target-rule invocation.
#[derive(Default)]
pub struct TargetRuleResults {
    pub results: Vec<TargetResult>,
}

pub struct TargetResult {
    pub result: LintResult,
    pub fix: Option<TargetFix>,
}

impl TargetRuleResults {
    pub fn add_error(
        &mut self,
        dashboard: &Dashboard,
        panel: &PanelOrRow,
        target: &Target,
        message: &str,
    ) {
        self.results.push(TargetResult {
            result: LintResult {
                severity: Severity::Error,
                message: format!(
                    "Dashboard '{}', panel '{}', target idx '{}' {}",
                    dashboard.title.as_deref().unwrap_or(""),
                    panel.title().unwrap_or(""),
                    target.index.target,
                    message
                ),
            },
            fix: None,
        });
    }
}

/// The rule identity stamped on every batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMeta {
    pub name: String,
    pub description: String,
}

/// Document context snapshot stamped on every batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardRef {
    pub title: Option<String>,
    pub uid: Option<String>,
}

impl DashboardRef {
    pub fn of(dashboard: &Dashboard) -> Self {
        DashboardRef {
            title: dashboard.title.clone(),
            uid: dashboard.uid.clone(),
        }
    }
}

/// Panel context snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelRef {
    pub id: Option<u32>,
    pub title: Option<String>,
}

impl PanelRef {
    pub fn of(panel: &PanelOrRow) -> Self {
        PanelRef {
            id: panel.id(),
            title: panel.title().map(str::to_string),
        }
    }
}

/// One batch: every diagnostic produced by one rule invocation at one tree
/// location, plus the context needed for grouping and configuration.
pub struct ResultContext {
    pub rule: RuleMeta,
    pub dashboard: DashboardRef,
    pub panel: Option<PanelRef>,
    pub target_index: Option<TargetIndex>,
    pub results: Vec<FixableResult>,
}

/// Collects batches across a lint pass and answers aggregate queries.
#[derive(Default)]
pub struct ResultSet {
    results: Vec<ResultContext>,
    config: Option<LintConfiguration>,
}

impl ResultSet {
    /// Attach a configuration and retroactively re-apply it to every batch
    /// already stored.
    pub fn configure(&mut self, config: LintConfiguration) {
        self.results = std::mem::take(&mut self.results)
            .into_iter()
            .map(|ctx| config.apply(ctx))
            .collect();
        self.config = Some(config);
    }

    /// Store a batch, applying the attached configuration first.
    pub fn add_result(&mut self, context: ResultContext) {
        let context = match &self.config {
            Some(config) => config.apply(context),
            None => context,
        };
        self.results.push(context);
    }

    pub fn results(&self) -> &[ResultContext] {
        &self.results
    }

    pub fn config(&self) -> Option<&LintConfiguration> {
        self.config.as_ref()
    }

    /// The greatest severity across all stored diagnostics; `Success` when
    /// the set is empty. Note that `Fixed` outranks `Error` in the total
    /// order, so a remediated set reports `Fixed` here; use
    /// [`maximum_open_severity`](Self::maximum_open_severity) for pass/fail
    /// decisions.
    pub fn maximum_severity(&self) -> Severity {
        self.severity_scan(|_| true)
    }

    /// The greatest severity among diagnostics that are still open, ignoring
    /// ones already remediated to `Fixed`.
    pub fn maximum_open_severity(&self) -> Severity {
        self.severity_scan(|s| s != Severity::Fixed)
    }

    fn severity_scan(&self, keep: impl Fn(Severity) -> bool) -> Severity {
        let mut max = Severity::Success;
        for context in &self.results {
            for fixable in &context.results {
                let severity = fixable.result.severity;
                if keep(severity) && severity > max {
                    max = severity;
                }
            }
        }
        max
    }

    /// Group batches by rule name. Within one rule, batches are ordered by
    /// dashboard title; untitled dashboards sort last.
    pub fn by_rule(&self) -> BTreeMap<&str, Vec<&ResultContext>> {
        let mut grouped: BTreeMap<&str, Vec<&ResultContext>> = BTreeMap::new();
        for context in &self.results {
            grouped
                .entry(context.rule.name.as_str())
                .or_default()
                .push(context);
        }
        for batch in grouped.values_mut() {
            batch.sort_by(|a, b| match (&a.dashboard.title, &b.dashboard.title) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
        }
        grouped
    }

    /// Apply every stored remediation closure to `dashboard`, marking each
    /// remediated diagnostic `Fixed` and returning the number of changes.
    ///
    /// Closures address panels and targets by the positions captured during
    /// the lint pass, so this must be called with the same dashboard instance
    /// that was linted. Each closure runs at most once: a second call is a
    /// no-op and returns 0.
    pub fn autofix(&mut self, dashboard: &mut Dashboard) -> usize {
        let mut changes = 0;
        for context in &mut self.results {
            for fixable in &mut context.results {
                if let Some(fix) = fixable.fix.take() {
                    fix(dashboard);
                    fixable.result.severity = Severity::Fixed;
                    changes += 1;
                }
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(rule: &str, title: Option<&str>, results: Vec<LintResult>) -> ResultContext {
        ResultContext {
            rule: RuleMeta {
                name: rule.to_string(),
                description: String::new(),
            },
            dashboard: DashboardRef {
                title: title.map(str::to_string),
                uid: None,
            },
            panel: None,
            target_index: None,
            results: results
                .into_iter()
                .map(|result| FixableResult { result, fix: None })
                .collect(),
        }
    }

    #[test]
    fn severity_total_order() {
        assert!(Severity::Success < Severity::Exclude);
        assert!(Severity::Exclude < Severity::Quiet);
        assert!(Severity::Quiet < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Fixed);
    }

    #[test]
    fn maximum_severity_of_empty_set_is_success() {
        let set = ResultSet::default();
        assert_eq!(set.maximum_severity(), Severity::Success);
    }

    #[test]
    fn maximum_severity_scans_all_batches() {
        let mut set = ResultSet::default();
        set.add_result(context("a", Some("d"), vec![LintResult::success()]));
        set.add_result(context(
            "b",
            Some("d"),
            vec![
                LintResult {
                    severity: Severity::Warning,
                    message: "w".into(),
                },
                LintResult {
                    severity: Severity::Error,
                    message: "e".into(),
                },
            ],
        ));
        assert_eq!(set.maximum_severity(), Severity::Error);
    }

    #[test]
    fn open_severity_ignores_fixed() {
        let mut set = ResultSet::default();
        set.add_result(context(
            "a",
            Some("d"),
            vec![LintResult {
                severity: Severity::Fixed,
                message: "f".into(),
            }],
        ));
        assert_eq!(set.maximum_severity(), Severity::Fixed);
        assert_eq!(set.maximum_open_severity(), Severity::Success);
    }

    #[test]
    fn by_rule_groups_and_sorts_titles() {
        let mut set = ResultSet::default();
        set.add_result(context("rule", Some("zeta"), vec![LintResult::success()]));
        set.add_result(context("rule", None, vec![LintResult::success()]));
        set.add_result(context("rule", Some("alpha"), vec![LintResult::success()]));
        let grouped = set.by_rule();
        let batches = &grouped["rule"];
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].dashboard.title.as_deref(), Some("alpha"));
        assert_eq!(batches[1].dashboard.title.as_deref(), Some("zeta"));
        assert_eq!(batches[2].dashboard.title, None);
    }

    #[test]
    fn autofix_marks_fixed_and_is_idempotent() {
        let mut set = ResultSet::default();
        let mut ctx = context(
            "rule",
            Some("d"),
            vec![LintResult {
                severity: Severity::Error,
                message: "editable".into(),
            }],
        );
        ctx.results[0].fix = Some(Box::new(|d: &mut Dashboard| {
            d.editable = Some(false);
        }));
        set.add_result(ctx);

        let mut dashboard = Dashboard {
            editable: Some(true),
            ..Default::default()
        };
        assert_eq!(set.autofix(&mut dashboard), 1);
        assert_eq!(dashboard.editable, Some(false));
        assert_eq!(
            set.results()[0].results[0].result.severity,
            Severity::Fixed
        );

        // A second pass has nothing left to apply.
        assert_eq!(set.autofix(&mut dashboard), 0);
    }
}
