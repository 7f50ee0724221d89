//! Rules over the dashboard's template variables.

use gridlint_core::dashboard::{
    Dashboard, QueryValue, TemplateVariable, DATASOURCE_PROMETHEUS, REFRESH_ON_TIME_RANGE_CHANGE,
    VARIABLE_KIND_QUERY,
};
use gridlint_grammar::promql;
use regex::Regex;

use crate::result::DashboardRuleResults;
use crate::rule::DashboardRuleFunc;
use crate::rules::{templated_datasource_is, title_case};
use crate::variables::VariableExpander;

pub fn new_template_datasource_rule() -> DashboardRuleFunc {
    DashboardRuleFunc::new(
        "template-datasource-rule",
        "Checks that the dashboard has a templated datasource.",
        |dashboard| {
            let mut r = DashboardRuleResults::default();

            let templated = dashboard.templates_of_kind("datasource");
            if templated.is_empty() {
                r.add_error(dashboard, "does not have a templated data source");
            }

            for variable in &templated {
                let query = variable
                    .query
                    .as_ref()
                    .and_then(QueryValue::as_str)
                    .unwrap_or("");
                let label = variable.label.as_deref().unwrap_or("");

                let query_specific_uid = format!("{}_datasource", query.to_lowercase());
                let query_specific_name = format!("{} data source", title_case(query));

                let mut uid_error = format!(
                    "templated data source variable named '{}', should be named '{}'",
                    variable.name, query_specific_uid
                );
                let mut name_error = format!(
                    "templated data source variable labeled '{}', should be labeled '{}'",
                    label, query_specific_name
                );

                let mut allowed_uids = vec![query_specific_uid];
                let mut allowed_names = vec![query_specific_name];
                if templated.len() == 1 {
                    allowed_uids.push("datasource".to_string());
                    allowed_names.push("Data source".to_string());
                    uid_error.push_str(", or 'datasource'");
                    name_error.push_str(", or 'Data source'");
                }

                if !allowed_uids.iter().any(|u| *u == variable.name) {
                    r.add_error(dashboard, &uid_error);
                }
                if !allowed_names.iter().any(|n| n == label) {
                    r.add_warning(dashboard, &name_error);
                }
            }

            r
        },
    )
}

pub fn new_template_job_rule() -> DashboardRuleFunc {
    new_required_template_rule(
        "template-job-rule",
        "Checks that the dashboard has a templated job.",
        "job",
    )
}

pub fn new_template_instance_rule() -> DashboardRuleFunc {
    new_required_template_rule(
        "template-instance-rule",
        "Checks that the dashboard has a templated instance.",
        "instance",
    )
}

fn new_required_template_rule(
    name: &'static str,
    description: &'static str,
    template: &'static str,
) -> DashboardRuleFunc {
    DashboardRuleFunc::new(name, description, move |dashboard| {
        let mut r = DashboardRuleResults::default();
        if !templated_datasource_is(dashboard, DATASOURCE_PROMETHEUS) {
            return r;
        }
        check_template(dashboard, template, &mut r);
        r
    })
}

/// Shared conventions for required metric templates such as `job` and
/// `instance`.
fn check_template(dashboard: &Dashboard, name: &str, r: &mut DashboardRuleResults) {
    let Some(template) = dashboard.template(name) else {
        r.add_error(dashboard, &format!("is missing the {} template", name));
        return;
    };

    let datasource_uid = template
        .datasource
        .as_ref()
        .and_then(|ds| ds.uid.as_deref())
        .unwrap_or("");
    if !matches!(
        datasource_uid,
        "$datasource" | "${datasource}" | "$prometheus_datasource" | "${prometheus_datasource}"
    ) {
        r.add_error(
            dashboard,
            &format!(
                "{} template should use datasource '$datasource', is currently '{}'",
                name, datasource_uid
            ),
        );
    }

    if template.kind != VARIABLE_KIND_QUERY {
        r.add_error(
            dashboard,
            &format!(
                "{} template should be a Prometheus query, is currently '{}'",
                name, template.kind
            ),
        );
    }

    let label_title = title_case(name);
    let label = template.label.as_deref().unwrap_or("");
    if label != label_title {
        r.add_warning(
            dashboard,
            &format!(
                "{} template should be a labeled '{}', is currently '{}'",
                name, label_title, label
            ),
        );
    }

    if !template.multi.unwrap_or(false) {
        r.add_error(
            dashboard,
            &format!("{} template should be a multi select", name),
        );
    }

    if template.all_value.as_deref() != Some(".+") {
        r.add_error(
            dashboard,
            &format!(
                "{} template allValue should be '.+', is currently '{}'",
                name,
                template.all_value.as_deref().unwrap_or("")
            ),
        );
    }
}

pub fn new_template_label_promql_rule() -> DashboardRuleFunc {
    let expander = VariableExpander::new();
    let function = Regex::new(r"^([a-zA-Z0-9_]+)\((.*)\)\s*$").unwrap();
    DashboardRuleFunc::new(
        "template-label-promql-rule",
        "Checks that the dashboard templated labels have proper PromQL expressions.",
        move |dashboard| {
            let mut r = DashboardRuleResults::default();
            if !templated_datasource_is(dashboard, DATASOURCE_PROMETHEUS) {
                return r;
            }

            for template in &dashboard.templating.list {
                if template.kind != VARIABLE_KIND_QUERY {
                    continue;
                }
                let query = template
                    .query
                    .as_ref()
                    .and_then(QueryValue::as_str)
                    .unwrap_or("");
                if let Err(err) = check_templated_label_query(
                    &expander,
                    &function,
                    query,
                    &dashboard.templating.list,
                ) {
                    r.add_error(
                        dashboard,
                        &format!(
                            "template '{}' invalid templated label '{}': {}",
                            template.name, query, err
                        ),
                    );
                }
            }
            r
        },
    )
}

/// Validate one templated-label query. Supported forms are the label
/// discovery functions; embedded selectors are expanded and parsed.
fn check_templated_label_query(
    expander: &VariableExpander,
    function: &Regex,
    query: &str,
    variables: &[TemplateVariable],
) -> Result<(), String> {
    let Some(caps) = function.captures(query) else {
        return Err(format!("invalid 'query': {}", query));
    };
    let name = &caps[1];
    let args = &caps[2];

    match name {
        "label_names" | "metrics" => Ok(()),
        "label_values" => {
            // Either `label_values(label)` or `label_values(selector, label)`;
            // the label always follows the last comma.
            match args.rfind(',') {
                Some(split) => check_promql(expander, args[..split].trim(), variables),
                None => Ok(()),
            }
        }
        "query_result" => check_promql(expander, args, variables),
        _ => Err(format!("invalid 'function': {}", name)),
    }
}

fn check_promql(
    expander: &VariableExpander,
    expr: &str,
    variables: &[TemplateVariable],
) -> Result<(), String> {
    let expanded = expander
        .expand(expr, variables)
        .map_err(|e| format!("could not expand variables: {}", e))?;
    promql::parse(&expanded).map(|_| ()).map_err(|e| e.to_string())
}

pub fn new_template_on_time_change_reload_rule() -> DashboardRuleFunc {
    DashboardRuleFunc::new(
        "template-on-time-change-reload-rule",
        "Checks that the dashboard template variables are configured to reload on time change.",
        |dashboard| {
            let mut r = DashboardRuleResults::default();

            for (i, template) in dashboard.templating.list.iter().enumerate() {
                if template.kind != VARIABLE_KIND_QUERY {
                    continue;
                }
                if let Some(refresh) = template.refresh {
                    if refresh != REFRESH_ON_TIME_RANGE_CHANGE {
                        r.add_fixable_error(
                            dashboard,
                            &format!(
                                "templated datasource variable named '{}', should be set to be refreshed \
                                 'On Time Range Change (value 2)', is currently '{}'",
                                template.name, refresh
                            ),
                            fix_template_refresh(i),
                        );
                    }
                }
            }
            r
        },
    )
}

fn fix_template_refresh(i: usize) -> impl Fn(&mut Dashboard) {
    move |dashboard: &mut Dashboard| {
        dashboard.templating.list[i].refresh = Some(REFRESH_ON_TIME_RANGE_CHANGE);
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
