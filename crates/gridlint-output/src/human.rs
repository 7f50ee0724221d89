use colored::Colorize;

use gridlint_lint::result::{LintResult, ResultSet, Severity};

use crate::OutputFormatter;

/// Terminal report: one block per rule, one line per diagnostic.
pub struct HumanFormatter {
    verbose: bool,
}

impl HumanFormatter {
    /// `verbose` keeps excluded results visible instead of hiding them.
    pub fn new(verbose: bool) -> Self {
        HumanFormatter { verbose }
    }
}

fn format_line(result: &LintResult, verbose: bool) -> Option<String> {
    let symbol = match result.severity {
        Severity::Success => "✔".green().to_string(),
        Severity::Fixed => "🛠 (fixed)".truecolor(255, 165, 0).to_string(),
        Severity::Exclude => {
            if !verbose {
                return None;
            }
            "➖".to_string()
        }
        Severity::Quiet => return None,
        Severity::Warning => "⚠".yellow().to_string(),
        Severity::Error => "❌".red().to_string(),
    };
    Some(format!("[{}] {}\n", symbol, result.message))
}

impl OutputFormatter for HumanFormatter {
    fn format(&self, results: &ResultSet) -> String {
        let verbose = self.verbose || results.config().is_some_and(|c| c.verbose);
        let mut out = String::new();

        // BTreeMap iteration is already sorted by rule name.
        for (_, batches) in results.by_rule() {
            if let Some(first) = batches.first() {
                out.push_str(&first.rule.description);
                out.push('\n');
            }
            for batch in &batches {
                for fixable in &batch.results {
                    if let Some(line) = format_line(&fixable.result, verbose) {
                        out.push_str(&line);
                    }
                }
            }
        }
        out
    }
}
