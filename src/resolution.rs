use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::*;
use crate::config::{EngineConfig, ReportScope};
use crate::error::SearchBudgetExceeded;
use crate::knowledge_base::KnowledgeBase;
use crate::proof::{summarize, FailureReason, ProofNode, ProofSummary};
use crate::substitution::{Mark, Substitution};
use crate::unify::unify_in_place;

type NodeId = usize;

/**
 * A goal instance in the search. Query goals have no origin; every other
 * goal was introduced by the resolution step `origin`. `choice` is the choice
 * point of the goal's latest call.
 */
struct Node {
    goal: Term,
    depth: usize,
    origin: Option<usize>,
    choice: Option<usize>,
}

/**
 * A resolution step: goal `node` was resolved with the stored clause at
 * `clause`, whose renamed body goals are `children`.
 */
struct Event {
    node: NodeId,
    clause: usize,
    children: Range<NodeId>,
}

/**
 * Goals still to prove, shared between the current state and every choice
 * point that may return to it.
 */
struct GoalCell {
    node: NodeId,
    next: GoalList,
}

type GoalList = Option<Rc<GoalCell>>;

impl Drop for GoalCell {
    fn drop(&mut self) {
        // Unlink iteratively; a long goal list would otherwise be dropped
        // recursively.
        let mut next = self.next.take();
        while let Some(cell) = next {
            match Rc::try_unwrap(cell) {
                Ok(mut cell) => next = cell.next.take(),
                Err(_) => break,
            }
        }
    }
}

/**
 * An untried remainder of candidate clauses for one goal, with everything
 * needed to restore the search to the moment the goal was called.
 */
struct ChoicePoint<'a> {
    node: NodeId,
    rest: GoalList,
    candidates: &'a [usize],
    next: usize,
    matched: usize,
    proved: bool,
    mark: Mark,
    nodes: usize,
    events: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Call,
    Backtrack,
    Done,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchStatus {
    /// More solutions may follow.
    Running,
    /// Every derivation was explored.
    Complete,
    /// Part of the search space was skipped; a missing answer is not a "no".
    Truncated(SearchBudgetExceeded),
}

/**
 * Bindings of the named query variables for one solution, together with the
 * derivation of each query goal.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    bindings: Vec<(String, Term)>,
    var_names: Vec<String>,
    proof: Vec<ProofNode>,
}

/**
 * Lazy SLD resolution over a knowledge base.
 *
 * Goals are resolved leftmost first against candidate clauses in insertion
 * order, depth first. The search is an explicit machine: pulling the next
 * solution runs it until the goal list empties or the choice points run out.
 * Dropping the iterator discards all pending alternatives.
 */
pub struct Solutions<'a> {
    kb: &'a KnowledgeBase,
    config: &'a EngineConfig,
    query: Query,
    subst: Substitution,
    nodes: Vec<Node>,
    events: Vec<Event>,
    goals: GoalList,
    choices: Vec<ChoicePoint<'a>>,
    state: State,
    steps: u64,
    found: usize,
    depth_cutoffs: usize,
    steps_exhausted: bool,
    track_failures: bool,
    failures: Vec<ProofNode>,
}

/**
 * A fully consumed search.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    pub solutions: Vec<Solution>,
    pub status: SearchStatus,
    pub failures: Vec<ProofNode>,
    pub steps: u64,
}

impl<'a> Solutions<'a> {
    pub fn new(kb: &'a KnowledgeBase, config: &'a EngineConfig, query: Query) -> Self {
        let mut subst = Substitution::new();
        subst.alloc(query.var_count());

        let nodes: Vec<Node> = query
            .goals()
            .iter()
            .map(|goal| Node { goal: goal.clone(), depth: 0, origin: None, choice: None })
            .collect();

        let mut goals = None;
        for node in (0..nodes.len()).rev() {
            goals = Some(Rc::new(GoalCell { node, next: goals }));
        }

        debug!(query = %query, "starting search");
        Solutions {
            kb,
            config,
            query,
            subst,
            nodes,
            events: Vec::new(),
            goals,
            choices: Vec::new(),
            state: State::Call,
            steps: 0,
            found: 0,
            depth_cutoffs: 0,
            steps_exhausted: false,
            track_failures: false,
            failures: Vec::new(),
        }
    }

    /**
     * Records failing branches as the search backtracks, for explanations.
     */
    pub fn with_failure_tracking(mut self) -> Self {
        self.track_failures = true;
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /**
     * Clause attempts made so far.
     */
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn status(&self) -> SearchStatus {
        if self.state != State::Done {
            return SearchStatus::Running;
        }
        if self.steps_exhausted {
            let limit = self.config.limits.max_steps.unwrap_or(self.steps);
            return SearchStatus::Truncated(SearchBudgetExceeded::Steps { limit });
        }
        match self.config.limits.max_depth {
            Some(limit) if self.depth_cutoffs > 0 => SearchStatus::Truncated(SearchBudgetExceeded::Depth {
                limit,
                branches: self.depth_cutoffs,
            }),
            _ => SearchStatus::Complete,
        }
    }

    pub fn failures(&self) -> &[ProofNode] {
        &self.failures
    }

    /**
     * Runs the search to the end.
     */
    pub fn into_outcome(mut self) -> Outcome {
        let solutions: Vec<Solution> = self.by_ref().collect();
        Outcome {
            solutions,
            status: self.status(),
            failures: std::mem::take(&mut self.failures),
            steps: self.steps,
        }
    }

    fn call(&mut self, node: NodeId) {
        if let Some(limit) = self.config.limits.max_depth {
            if self.nodes[node].depth >= limit {
                trace!(goal = %self.nodes[node].goal, limit, "depth limit reached");
                self.depth_cutoffs += 1;
                self.record_failure(node, FailureReason::DepthLimit { limit });
                self.state = State::Backtrack;
                return;
            }
        }

        let kb = self.kb;
        let goal = self.subst.walk(&self.nodes[node].goal);
        let candidates: &'a [usize] = match goal.key() {
            Some(key) => kb.candidate_positions(&key),
            None => &[],
        };

        if candidates.is_empty() {
            self.record_failure(node, FailureReason::Unmatched);
            self.state = State::Backtrack;
            return;
        }

        self.nodes[node].choice = Some(self.choices.len());
        self.choices.push(ChoicePoint {
            node,
            rest: self.goals.take(),
            candidates,
            next: 0,
            matched: 0,
            proved: false,
            mark: self.subst.mark(),
            nodes: self.nodes.len(),
            events: self.events.len(),
        });
        self.state = State::Backtrack;
    }

    /**
     * Resumes the most recent choice point with its next candidate clause,
     * popping exhausted choice points until one applies.
     */
    fn backtrack(&mut self) {
        let kb = self.kb;
        let occurs_check = self.config.occurs_check;
        let max_steps = self.config.limits.max_steps;

        while let Some(choice) = self.choices.last_mut() {
            self.subst.undo(choice.mark);
            self.nodes.truncate(choice.nodes);
            self.events.truncate(choice.events);

            while choice.next < choice.candidates.len() {
                if let Some(limit) = max_steps {
                    if self.steps >= limit {
                        debug!(query = %self.query, limit, "step budget exhausted");
                        self.steps_exhausted = true;
                        self.finish();
                        return;
                    }
                }
                self.steps += 1;

                let position = choice.candidates[choice.next];
                choice.next += 1;
                let clause = kb.clause(position);
                let base = self.subst.alloc(clause.var_count());
                let head = clause.head().offset(base);
                trace!(goal = %self.nodes[choice.node].goal, clause = %clause, "trying clause");

                if unify_in_place(&mut self.subst, &self.nodes[choice.node].goal, &head, occurs_check) {
                    choice.matched += 1;

                    let event = self.events.len();
                    let first = self.nodes.len();
                    let depth = self.nodes[choice.node].depth + 1;
                    for goal in clause.body() {
                        self.nodes.push(Node { goal: goal.offset(base), depth, origin: Some(event), choice: None });
                    }
                    let children = first..self.nodes.len();
                    self.events.push(Event { node: choice.node, clause: position, children: children.clone() });

                    let mut goals = choice.rest.clone();
                    for child in children.rev() {
                        goals = Some(Rc::new(GoalCell { node: child, next: goals }));
                    }
                    self.goals = goals;

                    let node = choice.node;
                    // The last alternative needs no choice point unless its
                    // failure has to be reported.
                    if choice.next == choice.candidates.len() && !self.track_failures {
                        self.choices.pop();
                    }
                    if self.track_failures && clause.is_fact() {
                        self.mark_proved(node);
                    }
                    self.state = State::Call;
                    return;
                }

                self.subst.undo(choice.mark);
            }

            let node = choice.node;
            let reason = match (choice.proved, choice.matched) {
                (true, _) => None,
                (false, 0) => Some(FailureReason::Unmatched),
                (false, matched) => Some(FailureReason::SubgoalFailed { matched }),
            };
            self.choices.pop();
            if let Some(reason) = reason {
                self.record_failure(node, reason);
            }
        }

        self.finish();
    }

    /**
     * Marks `node` as proved, along with every ancestor it completes. Body
     * goals are proved left to right, so a goal is proved once the last goal
     * of its clause body is.
     */
    fn mark_proved(&mut self, mut node: NodeId) {
        loop {
            if let Some(choice) = self.nodes[node].choice.and_then(|i| self.choices.get_mut(i)) {
                if choice.node == node {
                    if choice.proved {
                        return;
                    }
                    choice.proved = true;
                }
            }
            match self.nodes[node].origin {
                Some(event) if self.events[event].children.end == node + 1 => node = self.events[event].node,
                _ => return,
            }
        }
    }

    fn finish(&mut self) {
        if self.state == State::Done {
            return;
        }
        self.state = State::Done;
        self.choices.clear();
        self.goals = None;
        debug!(
            query = %self.query,
            solutions = self.found,
            steps = self.steps,
            status = ?self.status(),
            "search finished"
        );
    }

    /**
     * Stores the failed goal together with the chain of clause applications
     * that led to it, instantiated as they stood when the goal was called.
     */
    fn record_failure(&mut self, node: NodeId, reason: FailureReason) {
        let cap = match self.config.report {
            ReportScope::First => 1,
            ReportScope::All => self.config.max_failure_branches,
        };
        if !self.track_failures || self.failures.len() >= cap {
            return;
        }

        let mut branch = ProofNode::failed(self.subst.resolve(&self.nodes[node].goal), reason);
        let mut origin = self.nodes[node].origin;
        while let Some(event) = origin {
            let event = &self.events[event];
            let parent = &self.nodes[event.node];
            branch = ProofNode::step(
                self.subst.resolve(&parent.goal),
                self.kb.clause(event.clause).clone(),
                vec![branch],
            );
            origin = parent.origin;
        }
        self.failures.push(branch);
    }

    fn solution(&self) -> Solution {
        let bindings = self
            .query
            .named_variables()
            .map(|(name, var)| (name.to_string(), self.subst.resolve(&Term::Variable(var))))
            .collect();

        let mut resolved_by = vec![None; self.nodes.len()];
        for (i, event) in self.events.iter().enumerate() {
            resolved_by[event.node] = Some(i);
        }
        let proof = self.build_proofs(&resolved_by);

        Solution {
            bindings,
            var_names: self.query.var_names().to_vec(),
            proof,
        }
    }

    /**
     * Derivations of the query goals, assembled bottom up from the
     * resolution steps of the current branch.
     */
    fn build_proofs(&self, resolved_by: &[Option<usize>]) -> Vec<ProofNode> {
        let mut pending: Vec<(NodeId, bool)> = (0..self.query.goals().len()).rev().map(|root| (root, false)).collect();
        let mut built: Vec<ProofNode> = Vec::new();

        while let Some((node, expanded)) = pending.pop() {
            let goal = &self.nodes[node].goal;
            match resolved_by[node].map(|event| &self.events[event]) {
                Some(event) if !expanded => {
                    pending.push((node, true));
                    pending.extend(event.children.clone().rev().map(|child| (child, false)));
                },
                Some(event) => {
                    let children = built.split_off(built.len() - event.children.len());
                    built.push(ProofNode::step(
                        self.subst.resolve(goal),
                        self.kb.clause(event.clause).clone(),
                        children,
                    ));
                },
                None => built.push(ProofNode {
                    goal: self.subst.resolve(goal),
                    clause: None,
                    children: Vec::new(),
                    failure: None,
                }),
            }
        }

        built
    }
}

impl Iterator for Solutions<'_> {
    type Item = Solution;

    fn next(&mut self) -> Option<Solution> {
        loop {
            match self.state {
                State::Done => return None,
                State::Backtrack => self.backtrack(),
                State::Call => match self.goals.take() {
                    None => {
                        self.found += 1;
                        self.state = State::Backtrack;
                        return Some(self.solution());
                    },
                    Some(cell) => {
                        self.goals = cell.next.clone();
                        self.call(cell.node);
                    },
                },
            }
        }
    }
}

impl Solution {
    pub fn bindings(&self) -> &[(String, Term)] {
        &self.bindings
    }

    pub fn get(&self, name: &str) -> Option<&Term> {
        self.bindings.iter().find(|(n, _)| n == name).map(|(_, term)| term)
    }

    /**
     * True for a solution of a query without named variables.
     */
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /**
     * One derivation per query goal.
     */
    pub fn proof(&self) -> &[ProofNode] {
        &self.proof
    }

    pub fn summary(&self, alternatives: usize) -> ProofSummary {
        summarize(&self.proof, alternatives)
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bindings.is_empty() {
            return write!(f, "true");
        }
        for (i, (name, term)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", name, term.display_with(&self.var_names))?;
        }
        Ok(())
    }
}

impl Outcome {
    /**
     * Whether at least one solution was found.
     */
    pub fn holds(&self) -> bool {
        !self.solutions.is_empty()
    }

    pub fn budget_exceeded(&self) -> Option<&SearchBudgetExceeded> {
        match &self.status {
            SearchStatus::Truncated(exceeded) => Some(exceeded),
            _ => None,
        }
    }

    /**
     * Per-solution summaries; `alternatives` is the number of solutions
     * found in total.
     */
    pub fn summaries(&self) -> Vec<ProofSummary> {
        let alternatives = self.solutions.len();
        self.solutions.iter().map(|s| s.summary(alternatives)).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SearchLimits;
    use crate::parser::parse_query;
    use crate::resolution::*;

    fn family() -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        kb.load(
            "parent(tom, bob).
             parent(tom, liz).
             parent(bob, ann).
             parent(bob, pat).
             grandparent(X, Z) :- parent(X, Y), parent(Y, Z).",
        )
        .unwrap();
        kb
    }

    fn run(kb: &KnowledgeBase, config: &EngineConfig, text: &str) -> Outcome {
        Solutions::new(kb, config, parse_query(text).unwrap()).into_outcome()
    }

    fn answers(outcome: &Outcome) -> Vec<String> {
        outcome.solutions.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_solution_order() {
        let kb = family();
        let config = EngineConfig::default();
        let outcome = run(&kb, &config, "grandparent(tom, Who)");
        assert_eq!(answers(&outcome), vec!["Who = ann", "Who = pat"]);
        assert_eq!(SearchStatus::Complete, outcome.status);
    }

    #[test]
    fn test_conjunction_shares_bindings() {
        let kb = family();
        let config = EngineConfig::default();
        let outcome = run(&kb, &config, "parent(tom, X), parent(X, Y)");
        assert_eq!(answers(&outcome), vec!["X = bob, Y = ann", "X = bob, Y = pat"]);
        assert_eq!(2, outcome.solutions[0].proof().len());
    }

    #[test]
    fn test_unknown_predicate_is_false() {
        let kb = family();
        let config = EngineConfig::default();
        let outcome = run(&kb, &config, "sibling(ann, pat)");
        assert!(!outcome.holds());
        assert_eq!(SearchStatus::Complete, outcome.status);
    }

    #[test]
    fn test_lazy_pull() {
        let kb = family();
        let config = EngineConfig::default();
        let mut solutions = Solutions::new(&kb, &config, parse_query("parent(P, C)").unwrap());

        let first = solutions.next().unwrap();
        assert_eq!("P = tom, C = bob", first.to_string());
        assert_eq!(SearchStatus::Running, solutions.status());
        assert_eq!(1, solutions.steps());
    }

    #[test]
    fn test_clause_renaming_apart() {
        let mut kb = KnowledgeBase::new();
        kb.load(
            "edge(a, b).
             edge(b, c).
             edge(c, d).
             path(X, Y) :- edge(X, Y).
             path(X, Y) :- edge(X, Z), path(Z, Y).",
        )
        .unwrap();
        let config = EngineConfig::default();
        let outcome = run(&kb, &config, "path(a, Y)");
        assert_eq!(answers(&outcome), vec!["Y = b", "Y = c", "Y = d"]);
    }

    #[test]
    fn test_unbound_answer_variable() {
        let mut kb = KnowledgeBase::new();
        kb.add_fact("same(Z, Z).").unwrap();
        let config = EngineConfig::default();
        let outcome = run(&kb, &config, "same(X, Y)");
        assert_eq!(1, outcome.solutions.len());
        let solution = &outcome.solutions[0];
        assert_eq!(solution.get("X"), solution.get("Y"));
    }

    #[test]
    fn test_depth_limit_truncates_left_recursion() {
        let mut kb = KnowledgeBase::new();
        kb.load(
            "edge(a, b).
             path(X, Y) :- path(X, Z), edge(Z, Y).
             path(X, Y) :- edge(X, Y).",
        )
        .unwrap();
        let mut config = EngineConfig::default();
        config.limits = SearchLimits { max_steps: None, max_depth: Some(16) };

        let outcome = run(&kb, &config, "path(a, W)");
        assert_eq!(answers(&outcome), vec!["W = b"]);
        match outcome.status {
            SearchStatus::Truncated(SearchBudgetExceeded::Depth { limit: 16, branches }) => assert!(branches >= 1),
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[test]
    fn test_step_budget_stops_search() {
        let mut kb = KnowledgeBase::new();
        kb.add_rule("loop(X) :- loop(X).").unwrap();
        let mut config = EngineConfig::default();
        config.limits = SearchLimits { max_steps: Some(50), max_depth: None };

        let outcome = run(&kb, &config, "loop(a)");
        assert!(!outcome.holds());
        assert_eq!(50, outcome.steps);
        assert_eq!(
            Some(&SearchBudgetExceeded::Steps { limit: 50 }),
            outcome.budget_exceeded()
        );
    }

    #[test]
    fn test_deep_deterministic_recursion() {
        let mut kb = KnowledgeBase::new();
        kb.add_fact("count(0).").unwrap();
        kb.add_rule("count(s(X)) :- count(X).").unwrap();
        let mut config = EngineConfig::default();
        config.limits = SearchLimits { max_steps: None, max_depth: Some(5_000) };

        let mut term = Term::atom("0");
        for _ in 0..500 {
            term = Term::compound("s", vec![term]);
        }
        let query = Query::new(vec![Term::compound("count", vec![term])], Vec::new());

        let mut solutions = Solutions::new(&kb, &config, query);
        let solution = solutions.next().unwrap();
        assert_eq!(501, solution.proof()[0].depth());
        assert_eq!(1_001, solutions.steps());
    }

    #[test]
    fn test_long_chain_without_depth_limit() {
        let length = 5_000;
        let mut program = String::new();
        for i in 0..length {
            program.push_str(&format!("s{} :- s{}.\n", i, i + 1));
        }
        program.push_str(&format!("s{}.\n", length));

        let mut kb = KnowledgeBase::new();
        kb.load(&program).unwrap();
        let mut config = EngineConfig::default();
        config.limits = SearchLimits::unbounded();

        let outcome = run(&kb, &config, "s0");
        assert_eq!(1, outcome.solutions.len());
        assert_eq!(SearchStatus::Complete, outcome.status);

        let proof = &outcome.solutions[0].proof()[0];
        assert_eq!(length + 1, proof.depth());
        assert_eq!(length + 1, proof.clause_applications());
        assert_eq!(length + 1, proof.clauses().len());

        let mut text = String::new();
        proof.render(&mut text, 0, &[]);
        assert_eq!(length + 1, text.lines().count());
        assert!(text.lines().last().unwrap().ends_with("[fact]"));
    }

    #[test]
    fn test_failure_tracking() {
        let kb = family();
        let config = EngineConfig::default();
        let outcome = Solutions::new(&kb, &config, parse_query("grandparent(ann, X)").unwrap())
            .with_failure_tracking()
            .into_outcome();

        assert!(!outcome.holds());
        assert_eq!(1, outcome.failures.len());
        let branch = &outcome.failures[0];
        assert!(branch.clause.is_some());
        assert_eq!(FailureReason::Unmatched, branch.children[0].failure.clone().unwrap());
    }

    #[test]
    fn test_summaries() {
        let kb = family();
        let config = EngineConfig::default();
        let outcome = run(&kb, &config, "grandparent(tom, Who)");
        let summaries = outcome.summaries();
        assert_eq!(2, summaries.len());
        assert_eq!(ProofSummary { depth: 2, clause_applications: 3, alternatives: 2 }, summaries[0]);
    }

    #[test]
    fn test_proved_goals_are_not_reported_as_failures() {
        let kb = family();
        let config = EngineConfig::default();
        let outcome = Solutions::new(&kb, &config, parse_query("parent(tom, X)").unwrap())
            .with_failure_tracking()
            .into_outcome();
        assert_eq!(2, outcome.solutions.len());
        assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);

        let mut config = EngineConfig::default();
        config.report = ReportScope::All;
        let outcome = Solutions::new(&kb, &config, parse_query("parent(X, Y), parent(Y, tom)").unwrap())
            .with_failure_tracking()
            .into_outcome();
        assert!(!outcome.holds());
        assert_eq!(4, outcome.failures.len());
        for branch in &outcome.failures {
            assert_eq!(Some(FailureReason::Unmatched), branch.failure);
        }
    }

    #[test]
    fn test_rule_with_failing_body_is_reported() {
        let kb = family();
        let mut config = EngineConfig::default();
        config.report = ReportScope::All;
        let outcome = Solutions::new(&kb, &config, parse_query("grandparent(liz, X)").unwrap())
            .with_failure_tracking()
            .into_outcome();

        assert!(!outcome.holds());
        let reasons: Vec<FailureReason> = outcome.failures.iter().filter_map(|b| b.failure.clone()).collect();
        assert_eq!(vec![FailureReason::SubgoalFailed { matched: 1 }], reasons);
        assert_eq!(1, outcome.failures.len() - reasons.len());
    }
}
