use std::fs;
use std::path::Path;

use gridlint_core::dashboard::Dashboard;
use gridlint_lint::config::LintConfiguration;
use gridlint_lint::result::Severity;
use gridlint_lint::rule::RuleSet;
use gridlint_output::OutputFormatter;

use crate::discover;

/// Run `gridlint lint` over the given files and directories.
pub fn run(
    formatter: &dyn OutputFormatter,
    paths: Vec<String>,
    strict: bool,
    fix: bool,
    config_path: &str,
) -> i32 {
    let config = LintConfiguration::load(Path::new(config_path));
    let fix = fix || config.autofix;

    let paths = if paths.is_empty() {
        vec![".".to_string()]
    } else {
        paths
    };
    let files = discover::dashboard_files(&paths, &config.ignore_patterns);
    if files.is_empty() {
        eprintln!("gridlint lint: no dashboard files found");
        return 0;
    }

    let rule_set = RuleSet::standard();
    let mut worst = Severity::Success;
    let mut broken_inputs = false;

    for file in &files {
        let buf = match fs::read(file) {
            Ok(buf) => buf,
            Err(e) => {
                log::warn!("gridlint lint: skipping {}: {}", file.display(), e);
                continue;
            }
        };
        let mut dashboard = match Dashboard::from_json(&buf) {
            Ok(dashboard) => dashboard,
            Err(e) => {
                eprintln!("gridlint lint: failed to parse {}: {}", file.display(), e);
                broken_inputs = true;
                continue;
            }
        };

        // Each file gets its own result set: remediation closures address
        // positions in the dashboard instance that produced them.
        let mut results = rule_set.lint(std::slice::from_ref(&dashboard));
        results.configure(config.clone());

        if fix {
            let changes = results.autofix(&mut dashboard);
            if changes > 0 {
                match serde_json::to_string_pretty(&dashboard) {
                    Ok(mut text) => {
                        text.push('\n');
                        if let Err(e) = fs::write(file, text) {
                            eprintln!(
                                "gridlint lint: failed to write {}: {}",
                                file.display(),
                                e
                            );
                            broken_inputs = true;
                        } else {
                            log::info!(
                                "gridlint lint: applied {} fix(es) to {}",
                                changes,
                                file.display()
                            );
                        }
                    }
                    Err(e) => {
                        eprintln!(
                            "gridlint lint: failed to serialize {}: {}",
                            file.display(),
                            e
                        );
                        broken_inputs = true;
                    }
                }
            }
        }

        print!("{}", formatter.format(&results));

        let severity = results.maximum_open_severity();
        if severity > worst {
            worst = severity;
        }
    }

    // Unreadable or unparseable inputs are an environment failure, not a
    // lint finding.
    if broken_inputs {
        return 2;
    }
    let threshold = if strict {
        Severity::Warning
    } else {
        Severity::Error
    };
    if worst >= threshold {
        1
    } else {
        0
    }
}
