use std::collections::BTreeMap;

use gridlint_core::dashboard::{OptionValue, TemplateVariable, VariableOption};

use super::*;

fn variable(name: &str, current: Option<&str>, options: &[&str]) -> TemplateVariable {
    TemplateVariable {
        name: name.to_string(),
        kind: "query".to_string(),
        current: current.map(|v| VariableOption {
            value: Some(OptionValue::Single(v.to_string())),
            ..Default::default()
        }),
        options: options
            .iter()
            .map(|v| VariableOption {
                value: Some(OptionValue::Single(v.to_string())),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn expand(expr: &str, variables: &[TemplateVariable]) -> String {
    VariableExpander::new().expand(expr, variables).unwrap()
}

#[test]
fn expands_builtin_interval_references() {
    assert_eq!(
        expand("sum(rate(foo[$__rate_interval]))", &[]),
        "sum(rate(foo[8869990787ms]))"
    );
    assert_eq!(
        expand("sum(rate(foo[$__rate_interval])) * ${__range_s}", &[]),
        "sum(rate(foo[8869990787ms])) * 9397795485"
    );
    assert_eq!(expand("foo[[__interval]]bar", &[]), "foo4867856611msbar");
}

#[test]
fn quoted_references_are_left_alone() {
    let vars = [variable("job", Some("api"), &[])];
    assert_eq!(expand(r#"{job=~"$job"}"#, &vars), r#"{job=~"$job"}"#);
    // The same name unquoted in the same expression still expands.
    assert_eq!(
        expand(r#"{job=~"$job"} + $job"#, &vars),
        r#"{job=~"$job"} + api"#
    );
}

#[test]
fn multi_value_formats() {
    let vars = [variable("variable", Some("a"), &[])];
    let cases = [
        ("${variable:csv}", "a,a,a"),
        ("${variable:doublequote}", "\"a\",\"a\",\"a\""),
        ("${variable:glob}", "{a,a,a}"),
        ("${variable:json}", "[\"a\",\"a\",\"a\"]"),
        ("${variable:lucene}", "(\"a\" OR \"a\" OR \"a\")"),
        ("${variable:pipe}", "a|a|a"),
        ("${variable:raw}", "a,a,a"),
        ("${variable:regex}", "a|a|a"),
        ("${variable:singlequote}", "'a','a','a'"),
        ("${variable:sqlstring}", "'a','a','a'"),
        ("${variable:text}", "a + a + a"),
        (
            "${variable:queryparam}",
            "var-variable=a&var-variable=a&var-variable=a",
        ),
    ];
    for (input, expected) in cases {
        assert_eq!(expand(input, &vars), expected, "format {}", input);
    }
    // The bare spelling accepts the same suffix.
    assert_eq!(expand("$variable:csv", &vars), "a,a,a");
    assert_eq!(expand("$__from:date:seconds", &[]), "1594671549");
}

#[test]
fn bare_suffix_does_not_swallow_subquery_steps() {
    let vars = [variable("interval", None, &["1h"])];
    assert_eq!(expand("foo[$interval:1h]", &vars), "foo[1h:1h]");
    assert_eq!(expand("foo[$interval:]", &vars), "foo[1h:]");
}

#[test]
fn percent_encoding() {
    let vars = [variable("v", Some("a b"), &[])];
    assert_eq!(expand("${v:percentencode}", &vars), "a+b%2Ca+b%2Ca+b");
}

#[test]
fn unknown_format_is_a_resolution_failure() {
    let vars = [variable("v", Some("a"), &[])];
    let err = VariableExpander::new()
        .expand("${v:frobnicate}", &vars)
        .unwrap_err();
    assert_eq!(
        err,
        ExpandError::UnknownVariableFormat("frobnicate".to_string())
    );
}

#[test]
fn time_samples() {
    assert_eq!(expand("$__from", &[]), "1594671549254");
    assert_eq!(expand("${__from:date}", &[]), "2020-07-13T20:19:09Z");
    assert_eq!(expand("${__from:date:seconds}", &[]), "1594671549");
    assert_eq!(expand("${__from:date:iso}", &[]), "2020-07-13T20:19:09Z");
    let err = VariableExpander::new()
        .expand("${__from:date:sillyformat}", &[])
        .unwrap_err();
    assert_eq!(
        err,
        ExpandError::UnsupportedTimeFormat("sillyformat".to_string())
    );
}

#[test]
fn integer_samples_ignore_formats() {
    assert_eq!(expand("$__org", &[]), "42");
    assert_eq!(expand("${__org:csv}", &[]), "42");
    assert_eq!(expand("${__user.id}", &[]), "42");
}

#[test]
fn too_many_suffix_parts_is_an_error() {
    let err = VariableExpander::new()
        .expand("${v:a:b:c}", &[])
        .unwrap_err();
    assert_eq!(
        err,
        ExpandError::UnknownVariableFormat("v:a:b:c".to_string())
    );
}

#[test]
fn resolves_current_value_recursively() {
    let vars = [
        variable("sampling", Some("$__auto_interval_sampling"), &[]),
        variable("outer", Some("$inner"), &[]),
        variable("inner", Some("leaf"), &[]),
    ];
    assert_eq!(expand("increase(foo{}[$sampling])", &vars), "increase(foo{}[10s])");
    assert_eq!(expand("$outer", &vars), "leaf");
}

#[test]
fn self_referential_variables_terminate() {
    // Resolution removes the variable being resolved, so the second lookup
    // falls through to the name itself.
    let vars = [variable("loop", Some("$loop"), &[])];
    assert_eq!(expand("$loop", &vars), "loop");

    let vars = [
        variable("ping", Some("$pong"), &[]),
        variable("pong", Some("$ping"), &[]),
    ];
    assert_eq!(expand("$ping", &vars), "ping");
}

#[test]
fn options_are_used_when_no_current_value() {
    let vars = [variable("interval", None, &["1h", "2h"])];
    assert_eq!(expand("rate(x[$interval])", &vars), "rate(x[1h])");
    // An empty current value also falls through to options.
    let vars = [TemplateVariable {
        current: Some(VariableOption {
            value: Some(OptionValue::Single(String::new())),
            ..Default::default()
        }),
        ..variable("interval", None, &["30m"])
    }];
    assert_eq!(expand("$interval", &vars), "30m");
}

#[test]
fn unknown_variables_expand_to_their_own_name() {
    assert_eq!(expand("$missing", &[]), "missing");
    assert_eq!(expand("${missing:csv}", &[]), "missing,missing,missing");
}

#[test]
fn subquery_style_double_reference() {
    let vars = [
        variable("interval", None, &["1h"]),
        variable("resolution", None, &["1h"]),
    ];
    assert_eq!(
        expand("sum (rate(foo[$interval:$resolution]))", &vars),
        "sum (rate(foo[1h:1h]))"
    );
}

#[test]
fn line_variant_strips_sigil_inside_brackets() {
    let mut builtins = BTreeMap::new();
    builtins.insert(
        "step".to_string(),
        SampleValue::Text("$unresolved".to_string()),
    );
    let expander = VariableExpander::with_builtins(builtins);
    assert_eq!(
        expander.expand_lines("rate(x[$step])", &[]).unwrap(),
        "rate(x[unresolved])"
    );
    // Outside brackets the sigil is kept.
    assert_eq!(
        expander.expand_lines("rate$step", &[]).unwrap(),
        "rate$unresolved"
    );
    // The plain variant never strips.
    assert_eq!(
        expander.expand("rate(x[$step])", &[]).unwrap(),
        "rate(x[$unresolved])"
    );
}

#[test]
fn line_variant_expands_each_line() {
    let got = VariableExpander::new()
        .expand_lines("rate({a=\"b\"}[$__auto])\nrate({c=\"d\"}[$__auto])", &[])
        .unwrap();
    assert_eq!(got, "rate({a=\"b\"}[12345ms])\nrate({c=\"d\"}[12345ms])");
}
