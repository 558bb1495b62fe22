use crate::ast::Query;
use crate::config::ReportScope;
use crate::resolution::Outcome;

/**
 * Renders a finished search as text.
 *
 * A query that holds is explained by its derivation(s), one indented line
 * per goal. A query that fails is explained by the recorded failing
 * branches, each ending in the goal that could not be proved and why.
 */
pub fn render(query: &Query, outcome: &Outcome, scope: ReportScope) -> String {
    let mut out = String::new();

    if outcome.holds() {
        out.push_str(&format!(
            "`{}` holds with {} solution(s).\n",
            query,
            outcome.solutions.len()
        ));
        let shown = match scope {
            ReportScope::First => 1,
            ReportScope::All => outcome.solutions.len(),
        };
        for (i, solution) in outcome.solutions.iter().take(shown).enumerate() {
            out.push_str(&format!("Solution {}: {}\n", i + 1, solution));
            for root in solution.proof() {
                root.render(&mut out, 1, query.var_names());
            }
        }
    } else {
        out.push_str(&format!("`{}` could not be proven.\n", query));
        for (i, branch) in outcome.failures.iter().enumerate() {
            out.push_str(&format!("Failing branch {}:\n", i + 1));
            branch.render(&mut out, 1, query.var_names());
        }
    }

    if let Some(exceeded) = outcome.budget_exceeded() {
        out.push_str(&format!(
            "Search incomplete: {}; further answers may exist.\n",
            exceeded
        ));
    }

    out
}
