use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::ast::*;

/**
 * One step of a derivation: a goal and the clause instance that proved it.
 *
 * A failed leaf has no clause and no children and carries the reason it
 * failed. Nodes on the path leading to a failed leaf keep the clause that
 * introduced the failing goal.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct ProofNode {
    pub goal: Term,
    pub clause: Option<Arc<Clause>>,
    pub children: Vec<ProofNode>,
    pub failure: Option<FailureReason>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// No candidate clause head unified with the goal.
    Unmatched,
    /// `matched` clause heads unified but none of their bodies could be proved.
    SubgoalFailed { matched: usize },
    /// The branch was abandoned at the depth limit.
    DepthLimit { limit: usize },
}

/**
 * Structural facts about one solution, handed to whatever rates confidence
 * in the answer. The engine itself assigns no probabilities.
 */
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProofSummary {
    pub depth: usize,
    pub clause_applications: usize,
    pub alternatives: usize,
}

impl ProofNode {
    pub fn step(goal: Term, clause: Arc<Clause>, children: Vec<ProofNode>) -> Self {
        ProofNode { goal, clause: Some(clause), children, failure: None }
    }

    pub fn failed(goal: Term, reason: FailureReason) -> Self {
        ProofNode { goal, clause: None, children: Vec::new(), failure: Some(reason) }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    /**
     * Number of levels from this node down to its deepest leaf.
     */
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((node, level)) = pending.pop() {
            deepest = deepest.max(level);
            pending.extend(node.children.iter().map(|child| (child, level + 1)));
        }
        deepest
    }

    pub fn clause_applications(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            if node.clause.is_some() {
                count += 1;
            }
            pending.extend(node.children.iter());
        }
        count
    }

    /**
     * Every clause applied in this derivation, in pre-order.
     */
    pub fn clauses(&self) -> Vec<&Arc<Clause>> {
        let mut found = Vec::new();
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            if let Some(clause) = &node.clause {
                found.push(clause);
            }
            pending.extend(node.children.iter().rev());
        }
        found
    }

    /**
     * Writes the derivation with two spaces of indentation per level. Each
     * line names the goal; rule steps also name the rule, facts are marked
     * as such, and failed leaves give their reason. Variables are written
     * with `names` where they have one.
     */
    pub fn render(&self, out: &mut String, indent: usize, names: &[String]) {
        let mut pending = vec![(self, indent)];
        while let Some((node, indent)) = pending.pop() {
            out.push_str(&"  ".repeat(indent));
            out.push_str(&node.goal.display_with(names).to_string());
            match (&node.clause, &node.failure) {
                (_, Some(reason)) => {
                    out.push_str(": ");
                    out.push_str(&reason.to_string());
                },
                (Some(clause), None) if clause.is_fact() => out.push_str("  [fact]"),
                (Some(clause), None) => {
                    out.push_str("  [by rule ");
                    out.push_str(&clause.to_string());
                    out.push(']');
                },
                (None, None) => (),
            }
            out.push('\n');
            pending.extend(node.children.iter().rev().map(|child| (child, indent + 1)));
        }
    }
}

impl Drop for ProofNode {
    fn drop(&mut self) {
        // Flatten the tree first; a deep derivation would otherwise be
        // dropped recursively.
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

impl fmt::Display for ProofNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render(&mut out, 0, &[]);
        write!(f, "{}", out)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Unmatched => write!(f, "unmatched, no clause head unifies"),
            FailureReason::SubgoalFailed { matched } => write!(
                f,
                "subgoal failed, {} matching clause(s) could not be proved",
                matched
            ),
            FailureReason::DepthLimit { limit } => write!(f, "abandoned at depth limit {}", limit),
        }
    }
}

/**
 * Summary of a derivation made of one proof per query goal.
 */
pub fn summarize(roots: &[ProofNode], alternatives: usize) -> ProofSummary {
    ProofSummary {
        depth: roots.iter().map(ProofNode::depth).max().unwrap_or(0),
        clause_applications: roots.iter().map(ProofNode::clause_applications).sum(),
        alternatives,
    }
}
