//! Target-level query rules.

use gridlint_core::dashboard::{DataQuery, TemplateVariable, DATASOURCE_PROMETHEUS};
use gridlint_grammar::{logql, promql};

use crate::result::TargetRuleResults;
use crate::rule::TargetRuleFunc;
use crate::rules::{panel_has_queries, templated_datasource_is};
use crate::variables::{VariableExpander, AUTO_INTERVAL_MS, RATE_INTERVAL_MS};

fn parse_promql(
    expander: &VariableExpander,
    expr: &str,
    variables: &[TemplateVariable],
) -> Result<promql::Expr, String> {
    let expanded = expander
        .expand(expr, variables)
        .map_err(|e| format!("could not expand variables: {}", e))?;
    promql::parse(&expanded).map_err(|e| e.to_string())
}

fn parse_logql(
    expander: &VariableExpander,
    expr: &str,
    variables: &[TemplateVariable],
) -> Result<logql::Expr, String> {
    let expanded = expander
        .expand_lines(expr, variables)
        .map_err(|e| format!("could not expand variables: {}", e))?;
    logql::parse(&expanded).map_err(|e| e.to_string())
}

pub fn new_target_promql_rule() -> TargetRuleFunc {
    let expander = VariableExpander::new();
    TargetRuleFunc::new(
        "target-promql-rule",
        "Checks that each target uses a valid PromQL query.",
        move |dashboard, slot, target| {
            let mut r = TargetRuleResults::default();
            let Some(panel) = slot.as_panel() else {
                return r;
            };
            // Missing template datasources is a separate rule.
            if !templated_datasource_is(dashboard, DATASOURCE_PROMETHEUS) {
                return r;
            }
            if !panel_has_queries(panel) {
                return r;
            }
            let DataQuery::Prometheus(query) = &target.query else {
                return r;
            };

            if let Err(err) = parse_promql(&expander, &query.expr, &dashboard.templating.list) {
                r.add_error(
                    dashboard,
                    slot,
                    target,
                    &format!("invalid PromQL query '{}': {}", query.expr, err),
                );
            }
            r
        },
    )
}

pub fn new_target_rate_interval_rule() -> TargetRuleFunc {
    let expander = VariableExpander::new();
    TargetRuleFunc::new(
        "target-rate-interval-rule",
        "Checks that rate and irate windows use $__rate_interval.",
        move |dashboard, slot, target| {
            let mut r = TargetRuleResults::default();
            let Some(panel) = slot.as_panel() else {
                return r;
            };
            if !templated_datasource_is(dashboard, DATASOURCE_PROMETHEUS) {
                return r;
            }
            if !panel_has_queries(panel) {
                return r;
            }
            let DataQuery::Prometheus(query) = &target.query else {
                return r;
            };
            // Invalid queries are another rule's finding.
            let Ok(ast) = parse_promql(&expander, &query.expr, &dashboard.templating.list) else {
                return r;
            };

            let mut uses_fixed = false;
            ast.walk(&mut |e| {
                if let promql::Expr::Call(call) = e {
                    if matches!(call.func.as_str(), "rate" | "irate") {
                        for arg in &call.args {
                            if let promql::Expr::Matrix(m) = arg {
                                if m.range_ms != RATE_INTERVAL_MS {
                                    uses_fixed = true;
                                }
                            }
                        }
                    }
                }
            });

            if uses_fixed {
                r.add_error(
                    dashboard,
                    slot,
                    target,
                    &format!(
                        "invalid PromQL query '{}': should use $__rate_interval",
                        query.expr
                    ),
                );
            }
            r
        },
    )
}

pub fn new_target_job_rule() -> TargetRuleFunc {
    new_target_required_matcher_rule("job")
}

pub fn new_target_instance_rule() -> TargetRuleFunc {
    new_target_required_matcher_rule("instance")
}

fn new_target_required_matcher_rule(matcher: &'static str) -> TargetRuleFunc {
    let expander = VariableExpander::new();
    TargetRuleFunc::new(
        format!("target-{}-rule", matcher),
        format!("Checks that every PromQL query has a {} matcher.", matcher),
        move |dashboard, slot, target| {
            let mut r = TargetRuleResults::default();
            if !templated_datasource_is(dashboard, DATASOURCE_PROMETHEUS) {
                return r;
            }
            let DataQuery::Prometheus(query) = &target.query else {
                return r;
            };
            // Invalid PromQL is another rule.
            let Ok(ast) = parse_promql(&expander, &query.expr, &dashboard.templating.list) else {
                return r;
            };

            for selector in ast.selectors() {
                if let Err(err) = check_for_matcher(selector, matcher) {
                    r.add_error(
                        dashboard,
                        slot,
                        target,
                        &format!("invalid PromQL query '{}': {}", query.expr, err),
                    );
                }
            }
            r
        },
    )
}

fn check_for_matcher(selector: &promql::VectorSelector, name: &str) -> Result<(), String> {
    let Some(matcher) = selector.matchers.iter().find(|m| m.label == name) else {
        return Err(format!("{} selector not found", name));
    };
    if matcher.op != promql::MatchOp::Regex {
        return Err(format!("{} selector is {}, not =~", name, matcher.op));
    }
    if matcher.value != format!("${}", name) {
        return Err(format!(
            "{} selector is {}, not ${}",
            name, matcher.value, name
        ));
    }
    Ok(())
}

pub fn new_target_counter_agg_rule() -> TargetRuleFunc {
    let expander = VariableExpander::new();
    TargetRuleFunc::new(
        "target-counter-agg-rule",
        "Checks that counter metrics are aggregated with rate, irate, or increase.",
        move |dashboard, slot, target| {
            let mut r = TargetRuleResults::default();
            let DataQuery::Prometheus(query) = &target.query else {
                return r;
            };
            let Ok(ast) = parse_promql(&expander, &query.expr, &dashboard.templating.list) else {
                return r;
            };

            let mut unaggregated = Vec::new();
            check_counters(&ast, false, &mut unaggregated);
            for metric in unaggregated {
                r.add_error(
                    dashboard,
                    slot,
                    target,
                    &format!(
                        "counter metric '{}' is not aggregated with rate, irate, or increase",
                        metric
                    ),
                );
            }
            r
        },
    )
}

const COUNTER_SUFFIXES: &[&str] = &["_total", "_sum", "_count", "_bucket"];

fn check_counters(expr: &promql::Expr, inside_rate: bool, out: &mut Vec<String>) {
    use promql::Expr as E;
    match expr {
        E::Call(call) => {
            let inside =
                inside_rate || matches!(call.func.as_str(), "rate" | "irate" | "increase");
            for arg in &call.args {
                check_counters(arg, inside, out);
            }
        }
        E::Selector(selector) => record_counter(selector, inside_rate, out),
        E::Matrix(matrix) => record_counter(&matrix.selector, inside_rate, out),
        E::Paren(expr) | E::Unary { expr, .. } | E::Subquery { expr, .. } => {
            check_counters(expr, inside_rate, out)
        }
        E::Aggregate(agg) => {
            if let Some(param) = &agg.param {
                check_counters(param, inside_rate, out);
            }
            check_counters(&agg.expr, inside_rate, out);
        }
        E::Binary(binary) => {
            check_counters(&binary.lhs, inside_rate, out);
            check_counters(&binary.rhs, inside_rate, out);
        }
        E::Number(_) | E::String(_) => {}
    }
}

fn record_counter(selector: &promql::VectorSelector, inside_rate: bool, out: &mut Vec<String>) {
    if inside_rate {
        return;
    }
    let Some(metric) = &selector.metric else {
        return;
    };
    if COUNTER_SUFFIXES.iter().any(|s| metric.ends_with(s)) {
        out.push(metric.clone());
    }
}

pub fn new_target_logql_rule() -> TargetRuleFunc {
    let expander = VariableExpander::new();
    TargetRuleFunc::new(
        "target-logql-rule",
        "Checks that each target uses a valid LogQL query.",
        move |dashboard, slot, target| {
            let mut r = TargetRuleResults::default();
            let Some(panel) = slot.as_panel() else {
                return r;
            };
            let DataQuery::Loki(query) = &target.query else {
                return r;
            };
            if query.hide {
                return r;
            }
            if !panel_has_queries(panel) {
                return r;
            }
            if query.expr.is_empty() {
                return r;
            }

            if let Err(err) = parse_logql(&expander, &query.expr, &dashboard.templating.list) {
                r.add_error(
                    dashboard,
                    slot,
                    target,
                    &format!("invalid LogQL query '{}': {}", query.expr, err),
                );
            }
            r
        },
    )
}

pub fn new_target_logql_auto_rule() -> TargetRuleFunc {
    let expander = VariableExpander::new();
    TargetRuleFunc::new(
        "target-logql-auto-rule",
        "Checks that each Loki target uses $__auto for range vectors when appropriate.",
        move |dashboard, slot, target| {
            let mut r = TargetRuleResults::default();
            let Some(panel) = slot.as_panel() else {
                return r;
            };
            let DataQuery::Loki(query) = &target.query else {
                return r;
            };
            if query.hide {
                return r;
            }
            if !panel_has_queries(panel) {
                return r;
            }

            let ast = match parse_logql(&expander, &query.expr, &dashboard.templating.list) {
                Ok(ast) => ast,
                Err(err) => {
                    r.add_error(
                        dashboard,
                        slot,
                        target,
                        &format!("Invalid LogQL query: {}", err),
                    );
                    return r;
                }
            };

            let has_fixed_duration = !query.expr.contains("$__auto")
                && ast
                    .log_ranges()
                    .iter()
                    .any(|range| range.interval_ms != AUTO_INTERVAL_MS);
            if has_fixed_duration {
                r.add_error(
                    dashboard,
                    slot,
                    target,
                    "LogQL query uses fixed duration: should use $__auto",
                );
            }
            r
        },
    )
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;
