//! Lint configuration: per-rule severity overrides and report flags.
//!
//! Loaded from a JSON file; a missing or unreadable file yields the default
//! (empty) configuration so linting always proceeds.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::result::{ResultContext, Severity};

/// Top-level lint configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintConfiguration {
    /// Rule name to entries demoted to `Exclude`.
    #[serde(default)]
    pub exclusions: BTreeMap<String, RuleEntries>,
    /// Rule name to entries demoted to `Warning`.
    #[serde(default)]
    pub warnings: BTreeMap<String, RuleEntries>,
    /// Show excluded results in reports.
    #[serde(default)]
    pub verbose: bool,
    /// Apply remediations after linting.
    #[serde(default)]
    pub autofix: bool,
    /// Glob patterns for files to skip during discovery.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_patterns: Vec<String>,
}

/// Overrides for a single rule. An empty entry list matches the rule
/// everywhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleEntries {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<ConfigurationEntry>,
}

/// One override scope. Every populated field must match the batch for the
/// entry to apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigurationEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel: Option<String>,
    #[serde(
        default,
        rename = "targetIdx",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_idx: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConfigurationEntry {
    fn matches(&self, context: &ResultContext, message: &str) -> bool {
        if let Some(dashboard) = &self.dashboard {
            if context.dashboard.title.as_deref() != Some(dashboard.as_str()) {
                return false;
            }
        }
        if let Some(panel) = &self.panel {
            let title = context.panel.as_ref().and_then(|p| p.title.as_deref());
            if title != Some(panel.as_str()) {
                return false;
            }
        }
        if let Some(target_idx) = self.target_idx {
            if context.target_index.map(|i| i.target) != Some(target_idx) {
                return false;
            }
        }
        if let Some(expected) = &self.message {
            if expected != message {
                return false;
            }
        }
        true
    }
}

impl RuleEntries {
    fn matches(&self, context: &ResultContext, message: &str) -> bool {
        self.entries.is_empty() || self.entries.iter().any(|e| e.matches(context, message))
    }
}

impl LintConfiguration {
    /// Load from a JSON file. Missing files yield the default configuration;
    /// unparseable files do too, with a warning.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "gridlint: warning: failed to parse {}: {}, using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Rewrite the severities in one batch according to the overrides. Only
    /// open Warning/Error diagnostics are remapped; Success and Quiet pass
    /// through untouched, as does everything when no override matches.
    pub fn apply(&self, mut context: ResultContext) -> ResultContext {
        let exclusions = self.exclusions.get(&context.rule.name);
        let warnings = self.warnings.get(&context.rule.name);
        if exclusions.is_none() && warnings.is_none() {
            return context;
        }

        for i in 0..context.results.len() {
            let severity = context.results[i].result.severity;
            if !matches!(severity, Severity::Warning | Severity::Error) {
                continue;
            }
            let message = context.results[i].result.message.clone();
            if let Some(entries) = exclusions {
                if entries.matches(&context, &message) {
                    context.results[i].result.severity = Severity::Exclude;
                    continue;
                }
            }
            if let Some(entries) = warnings {
                if entries.matches(&context, &message) {
                    context.results[i].result.severity = Severity::Warning;
                }
            }
        }
        context
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
