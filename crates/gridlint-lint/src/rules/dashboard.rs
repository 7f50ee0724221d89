//! Document-level hygiene rules.

use gridlint_core::dashboard::Dashboard;

use crate::result::DashboardRuleResults;
use crate::rule::DashboardRuleFunc;

pub fn new_uneditable_rule() -> DashboardRuleFunc {
    DashboardRuleFunc::new(
        "uneditable-dashboard",
        "Checks that the dashboard is not editable.",
        |dashboard| {
            let mut r = DashboardRuleResults::default();
            if dashboard.editable.unwrap_or(true) {
                r.add_fixable_error(
                    dashboard,
                    "is editable, it should be set to 'editable: false'",
                    fix_uneditable,
                );
            }
            r
        },
    )
}

pub fn fix_uneditable(dashboard: &mut Dashboard) {
    dashboard.editable = Some(false);
}
