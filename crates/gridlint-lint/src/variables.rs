//! Expression-variable expansion.
//!
//! Dashboard queries reference template variables (`$job`, `${job:csv}`,
//! `[[job]]`) that only have values at render time. Before a query can be
//! handed to a grammar for syntax validation, every reference outside a
//! string literal is replaced with a representative literal of the right
//! shape: durations for interval variables, epoch numbers for time bounds,
//! the variable's current value (recursively expanded) for user-defined
//! variables.
//!
//! References inside double-quoted strings are left alone on purpose; rules
//! inspect literal matcher values such as `"$job"`. Escaped quotes are not
//! handled, a known limitation of the quote-splitting approach.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use gridlint_core::dashboard::TemplateVariable;
use regex::Regex;

/// Errors from reference resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpandError {
    #[error("unknown variable format: {0}")]
    UnknownVariableFormat(String),
    #[error("unsupported time format: {0}")]
    UnsupportedTimeFormat(String),
}

/// A representative literal for one builtin pseudo-variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleValue {
    Int(i64),
    /// Milliseconds since the Unix epoch.
    TimeMs(i64),
    Text(String),
}

/// Epoch millis used for the `__from`/`__to` samples: 2020-07-13T20:19:09.254Z.
const SAMPLE_EPOCH_MS: i64 = 1_594_671_549_254;

/// The builtin pseudo-variables exposed by the dashboard platform, mapped to
/// sample literals whose shape parses like the real runtime values.
pub fn default_builtins() -> BTreeMap<String, SampleValue> {
    let text = |s: &str| SampleValue::Text(s.to_string());
    let entries = [
        ("__rate_interval", text("8869990787ms")),
        ("__interval", text("4867856611ms")),
        ("__interval_ms", text("7781188786")),
        ("__range_ms", text("6737667980")),
        ("__range_s", text("9397795485")),
        ("__range", text("6069770749ms")),
        ("__dashboard", text("AwREbnft")),
        ("__from", SampleValue::TimeMs(SAMPLE_EPOCH_MS)),
        ("__to", SampleValue::TimeMs(SAMPLE_EPOCH_MS)),
        ("__name", text("name")),
        ("__org", SampleValue::Int(42)),
        ("__org.name", text("orgname")),
        ("__user.id", SampleValue::Int(42)),
        ("__user.login", text("user")),
        ("__user.email", text("user@test.com")),
        ("timeFilter", text("time > now() - 7d")),
        ("__timeFilter", text("time > now() - 7d")),
        ("__auto", text("12345ms")),
    ];
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// The sample duration substituted for `$__auto` references, in
/// milliseconds. Range windows that expand to anything else were written
/// with a fixed duration.
pub const AUTO_INTERVAL_MS: u64 = 12_345;

/// The sample duration substituted for `$__rate_interval`, in milliseconds.
pub const RATE_INTERVAL_MS: u64 = 8_869_990_787;

/// The three reference spellings, one alternation per syntax. The bare `$name`
/// form accepts `:format` suffixes only when the segment starts with a letter,
/// so a subquery step like `[$interval:1h]` is not read as a format.
const REFERENCE_PATTERN: &str =
    r"\$([[:word:]]+(?::[A-Za-z][[:word:]]*)*)|\$\{([^}]+)\}|\[\[([^\[\]]+)\]\]";

/// Resolves variable references to representative literals. Owns the builtin
/// catalog, which is injected at construction.
pub struct VariableExpander {
    builtins: BTreeMap<String, SampleValue>,
    pattern: Regex,
}

impl Default for VariableExpander {
    fn default() -> Self {
        VariableExpander::new()
    }
}

impl VariableExpander {
    pub fn new() -> Self {
        VariableExpander::with_builtins(default_builtins())
    }

    pub fn with_builtins(builtins: BTreeMap<String, SampleValue>) -> Self {
        VariableExpander {
            builtins,
            pattern: Regex::new(REFERENCE_PATTERN).unwrap(),
        }
    }

    /// Expand every reference outside double-quoted spans.
    pub fn expand(
        &self,
        expr: &str,
        variables: &[TemplateVariable],
    ) -> Result<String, ExpandError> {
        let parts: Vec<&str> = expr.split('"').collect();
        let mut expanded = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            if i % 2 == 1 {
                // Inside a double-quoted string literal.
                expanded.push((*part).to_string());
            } else {
                expanded.push(self.expand_span(part, variables, false)?);
            }
        }
        Ok(expanded.join("\""))
    }

    /// Line-oriented variant for log queries: additionally strips a leading
    /// `$` from values substituted immediately inside a bracketed range, as
    /// that grammar needs a bare duration there.
    pub fn expand_lines(
        &self,
        expr: &str,
        variables: &[TemplateVariable],
    ) -> Result<String, ExpandError> {
        let lines: Vec<&str> = expr.split('\n').collect();
        let mut out = Vec::with_capacity(lines.len());
        for line in lines {
            let parts: Vec<&str> = line.split('"').collect();
            let mut expanded = Vec::with_capacity(parts.len());
            for (i, part) in parts.iter().enumerate() {
                if i % 2 == 1 {
                    expanded.push((*part).to_string());
                } else {
                    expanded.push(self.expand_span(part, variables, true)?);
                }
            }
            out.push(expanded.join("\""));
        }
        Ok(out.join("\n"))
    }

    fn expand_span(
        &self,
        part: &str,
        variables: &[TemplateVariable],
        strip_in_brackets: bool,
    ) -> Result<String, ExpandError> {
        let mut result = String::with_capacity(part.len());
        let mut cursor = 0;
        for caps in self.pattern.captures_iter(part) {
            let whole = caps.get(0).unwrap();
            result.push_str(&part[cursor..whole.start()]);

            // Exactly one alternation group matched; it holds the bare name
            // plus any format suffix.
            let reference = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let mut value = self.sample_value(reference, variables)?;
            if strip_in_brackets
                && part[..whole.start()].ends_with('[')
                && part[whole.end()..].starts_with(']')
            {
                if let Some(stripped) = value.strip_prefix('$') {
                    value = stripped.to_string();
                }
            }
            result.push_str(&value);
            cursor = whole.end();
        }
        result.push_str(&part[cursor..]);
        Ok(result)
    }

    /// Resolve one reference, `name` optionally suffixed with `:format` or
    /// `:kind:format`.
    fn sample_value(
        &self,
        reference: &str,
        variables: &[TemplateVariable],
    ) -> Result<String, ExpandError> {
        let pieces: Vec<&str> = reference.split(':').collect();
        let (name, kind, format) = match pieces.len() {
            1 => (pieces[0], "", ""),
            2 => (pieces[0], "", pieces[1]),
            3 => (pieces[0], pieces[1], pieces[2]),
            _ => return Err(ExpandError::UnknownVariableFormat(reference.to_string())),
        };

        if let Some(value) = self.builtins.get(name) {
            return render_sample(name, value, kind, format);
        }

        // Auto interval variables all share one naming convention.
        if name.starts_with("__auto_interval") {
            return Ok("10s".to_string());
        }

        for variable in variables {
            if variable.name != name {
                continue;
            }
            // Prefer the current value; recurse with this variable removed so
            // self-referential definitions terminate. The format suffix is
            // applied to the fully resolved value.
            if let Some(current) = variable
                .current
                .as_ref()
                .and_then(|c| c.value.as_ref())
                .and_then(|v| v.as_single())
            {
                if !current.is_empty() {
                    let resolved = self.expand(current, &remove_variable(name, variables))?;
                    return render_sample(name, &SampleValue::Text(resolved), kind, format);
                }
            }
            if let Some(first) = variable
                .options
                .first()
                .and_then(|o| o.value.as_ref())
                .and_then(|v| v.as_single())
            {
                let resolved = self.expand(first, &remove_variable(name, variables))?;
                return render_sample(name, &SampleValue::Text(resolved), kind, format);
            }
        }

        // Unknown variable: its own name is the sample value.
        render_sample(name, &SampleValue::Text(name.to_string()), kind, format)
    }
}

fn remove_variable(name: &str, variables: &[TemplateVariable]) -> Vec<TemplateVariable> {
    variables
        .iter()
        .filter(|v| v.name != name)
        .cloned()
        .collect()
}

fn render_sample(
    name: &str,
    value: &SampleValue,
    kind: &str,
    format: &str,
) -> Result<String, ExpandError> {
    match value {
        SampleValue::Int(i) => Ok(i.to_string()),
        SampleValue::TimeMs(ms) => {
            if kind == "date" {
                match format {
                    "seconds" => Ok((ms / 1000).to_string()),
                    "iso" => Ok(rfc3339(*ms)),
                    _ => Err(ExpandError::UnsupportedTimeFormat(format.to_string())),
                }
            } else {
                match format {
                    "date" => Ok(rfc3339(*ms)),
                    _ => Ok(ms.to_string()),
                }
            }
        }
        SampleValue::Text(s) => render_text(name, s, format),
    }
}

/// Apply a multi-value format encoding. Three identical copies stand in for
/// a multi-select's values.
fn render_text(name: &str, value: &str, format: &str) -> Result<String, ExpandError> {
    let list = [value, value, value];
    Ok(match format {
        "" => value.to_string(),
        "csv" => list.join(","),
        "doublequote" => format!("\"{}\"", list.join("\",\"")),
        "glob" => format!("{{{}}}", list.join(",")),
        "json" => serde_json::Value::from(list.to_vec()).to_string(),
        "lucene" => format!("(\"{}\")", list.join("\" OR \"")),
        "percentencode" => query_escape(&list.join(",")),
        "pipe" => list.join("|"),
        "raw" => list.join(","),
        "regex" => list.join("|"),
        "singlequote" => format!("'{}'", list.join("','")),
        "sqlstring" => format!("'{}'", list.join("','")),
        "text" => list.join(" + "),
        "queryparam" => {
            let key = query_escape(&format!("var-{}", name));
            list.iter()
                .map(|v| format!("{}={}", key, query_escape(v)))
                .collect::<Vec<_>>()
                .join("&")
        }
        _ => return Err(ExpandError::UnknownVariableFormat(format.to_string())),
    })
}

/// URL query escaping: unreserved bytes pass through, space becomes `+`,
/// everything else is percent-encoded.
fn query_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

fn rfc3339(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "variables_tests.rs"]
mod tests;
