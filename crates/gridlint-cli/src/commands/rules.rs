use gridlint_lint::rule::{Rule, RuleSet};

/// Run `gridlint rules` — print the catalog, one rule per line.
pub fn run() -> i32 {
    for rule in RuleSet::standard().rules() {
        println!("{}: {}", rule.name(), rule.description());
    }
    0
}
