use logical_core::{
    unify, Engine, EngineConfig, ReportScope, SearchBudgetExceeded, SearchLimits, SearchStatus, Solution,
    Substitution, Term, Var,
};

fn philosophers() -> Engine {
    let mut engine = Engine::new();
    engine.add_fact("human(socrates).").unwrap();
    engine.add_fact("human(plato).").unwrap();
    engine.add_rule("mortal(X) :- human(X).").unwrap();
    engine
}

fn teaching() -> Engine {
    let mut engine = Engine::new();
    engine.add_fact("teacher(socrates, plato).").unwrap();
    engine.add_fact("teacher(plato, aristotle).").unwrap();
    engine.add_rule("teaching_chain(X, Z) :- teacher(X, Z).").unwrap();
    engine.add_rule("teaching_chain(X, Z) :- teacher(X, Y), teaching_chain(Y, Z).").unwrap();
    engine
}

fn rendered(solutions: &[Solution]) -> Vec<String> {
    solutions.iter().map(|s| s.to_string()).collect()
}

#[test]
fn ground_term_unifies_with_itself() {
    let term = Term::compound("f", vec![Term::atom("a"), Term::compound("g", vec![Term::atom("b")])]);
    let subst = unify(&term, &term, &Substitution::new()).unwrap();
    assert!(subst.is_empty());
}

#[test]
fn unify_binds_arguments_pairwise() {
    let a = Term::compound("f", vec![Term::atom("a"), Term::atom("b")]);
    let b = Term::compound("f", vec![Term::var(0), Term::var(1)]);
    let subst = unify(&a, &b, &Substitution::new()).unwrap();
    assert_eq!(Some(&Term::atom("a")), subst.get(Var(0)));
    assert_eq!(Some(&Term::atom("b")), subst.get(Var(1)));
    assert_eq!(2, subst.len());
}

#[test]
fn ground_fact_query() {
    let mut engine = Engine::new();
    engine.add_fact("human(socrates).").unwrap();

    let yes: Vec<Solution> = engine.query("human(socrates)").unwrap().collect();
    assert_eq!(1, yes.len());
    assert!(yes[0].is_empty());

    let no: Vec<Solution> = engine.query("human(plato)").unwrap().collect();
    assert!(no.is_empty());
}

#[test]
fn rule_solutions_in_declaration_order() {
    let engine = philosophers();
    let solutions: Vec<Solution> = engine.query("mortal(X)").unwrap().collect();
    assert_eq!(rendered(&solutions), vec!["X = socrates", "X = plato"]);
    assert_eq!(Some(&Term::atom("socrates")), solutions[0].get("X"));
}

#[test]
fn recursive_chain_succeeds_and_terminates() {
    let engine = teaching();
    assert_eq!(1, engine.query("teaching_chain(socrates, aristotle)").unwrap().count());

    let outcome = engine.evaluate("teaching_chain(aristotle, socrates)").unwrap();
    assert!(!outcome.holds());
    assert_eq!(SearchStatus::Complete, outcome.status);
}

#[test]
fn recursive_chain_enumerates_descendants() {
    let engine = teaching();
    let solutions: Vec<Solution> = engine.query("teaching_chain(socrates, Who)").unwrap().collect();
    assert_eq!(rendered(&solutions), vec!["Who = plato", "Who = aristotle"]);
}

#[test]
fn repeated_queries_are_deterministic() {
    let engine = teaching();
    let first: Vec<Solution> = engine.query("teaching_chain(A, B)").unwrap().collect();
    let second: Vec<Solution> = engine.query("teaching_chain(A, B)").unwrap().collect();
    assert_eq!(first, second);
    assert_eq!(3, first.len());
}

#[test]
fn materialized_results_survive_later_mutation() {
    let mut engine = philosophers();
    let before: Vec<Solution> = engine.query("mortal(X)").unwrap().collect();

    engine.add_fact("human(aristotle).").unwrap();

    assert_eq!(rendered(&before), vec!["X = socrates", "X = plato"]);
    assert_eq!(3, engine.query("mortal(X)").unwrap().count());
}

#[test]
fn explain_failure_names_failed_goal() {
    let engine = teaching();
    let text = engine.explain("teaching_chain(aristotle, socrates)").unwrap();
    assert!(text.contains("could not be proven"), "{}", text);
    assert!(text.contains("unmatched"), "{}", text);
    assert!(text.contains("teacher(aristotle, socrates)"), "{}", text);
}

#[test]
fn explain_failure_all_branches_shows_subgoal_failure() {
    let mut config = EngineConfig::default();
    config.report = ReportScope::All;
    let mut engine = Engine::with_config(config);
    engine.load(
        "teacher(socrates, plato).
         teacher(plato, aristotle).
         teaching_chain(X, Z) :- teacher(X, Z).
         teaching_chain(X, Z) :- teacher(X, Y), teaching_chain(Y, Z).",
    )
    .unwrap();

    let text = engine.explain("teaching_chain(aristotle, socrates)").unwrap();
    assert!(text.contains("Failing branch 2"), "{}", text);
    assert!(text.contains("subgoal failed"), "{}", text);
}

#[test]
fn explain_unknown_predicate() {
    let engine = philosophers();
    let text = engine.explain("philosopher(socrates)").unwrap();
    assert!(text.contains("philosopher(socrates): unmatched"), "{}", text);
}

#[test]
fn explain_success_names_every_applied_clause() {
    let engine = teaching();
    let outcome = engine.evaluate("teaching_chain(socrates, aristotle)").unwrap();
    let text = engine.explain("teaching_chain(socrates, aristotle)").unwrap();

    let proof = &outcome.solutions[0].proof()[0];
    let clauses = proof.clauses();
    assert_eq!(4, clauses.len());
    for clause in clauses {
        if clause.is_fact() {
            assert!(text.contains(&clause.head().to_string()), "{}", text);
        } else {
            assert!(text.contains(&clause.to_string()), "{}", text);
        }
    }
}

#[test]
fn anonymous_variables_are_not_reported() {
    let mut engine = teaching();
    engine.add_fact("human(socrates).").unwrap();
    engine.add_fact("human(plato).").unwrap();
    engine.add_fact("human(aristotle).").unwrap();
    engine.add_rule("philosopher(X) :- human(X), teacher(X, _).").unwrap();

    let solutions: Vec<Solution> = engine.query("philosopher(X)").unwrap().collect();
    assert_eq!(rendered(&solutions), vec!["X = socrates", "X = plato"]);

    let solutions: Vec<Solution> = engine.query("teacher(_, _)").unwrap().collect();
    assert_eq!(2, solutions.len());
    assert!(solutions.iter().all(Solution::is_empty));
}

#[test]
fn budget_exhaustion_is_distinct_from_failure() {
    let mut config = EngineConfig::default();
    config.limits = SearchLimits { max_steps: Some(1_000), max_depth: None };
    let mut engine = Engine::with_config(config);
    engine.add_fact("edge(a, b).").unwrap();
    engine.add_rule("reach(X, Y) :- reach(X, Z), edge(Z, Y).").unwrap();

    let outcome = engine.evaluate("reach(a, b)").unwrap();
    assert!(!outcome.holds());
    assert_eq!(Some(&SearchBudgetExceeded::Steps { limit: 1_000 }), outcome.budget_exceeded());

    let text = engine.explain("reach(a, b)").unwrap();
    assert!(text.contains("Search incomplete"), "{}", text);

    // The store is unaffected and other queries still answer.
    assert_eq!(1, engine.query("edge(a, b)").unwrap().count());
}

#[test]
fn malformed_text_leaves_store_unchanged() {
    let mut engine = philosophers();
    let before = engine.knowledge_base().len();

    let err = engine.add_fact("human(aristotle)").unwrap_err();
    assert!(err.reason.contains("unterminated"));
    assert!(engine.add_rule("mortal(X :- human(X).").is_err());
    assert!(engine.add_rule("X :- human(X).").is_err());
    assert!(engine.add_rule(":- human(X).").is_err());

    assert_eq!(before, engine.knowledge_base().len());
}

#[test]
fn evaluate_reports_summaries() {
    let engine = philosophers();
    let outcome = engine.evaluate("mortal(X)").unwrap();
    let summaries = outcome.summaries();
    assert_eq!(2, summaries.len());
    assert_eq!(2, summaries[0].depth);
    assert_eq!(2, summaries[0].clause_applications);
    assert_eq!(2, summaries[0].alternatives);
}

#[test]
fn occurs_check_configuration() {
    let mut config = EngineConfig::default();
    config.occurs_check = true;
    let mut checked = Engine::with_config(config);
    checked.add_fact("same(Z, Z).").unwrap();
    assert_eq!(0, checked.query("same(X, f(X))").unwrap().count());

    let mut unchecked = Engine::new();
    unchecked.add_fact("same(Z, Z).").unwrap();
    assert_eq!(1, unchecked.query("same(X, f(X))").unwrap().count());
}

#[test]
fn cyclic_bindings_unify_without_occurs_check() {
    let mut engine = Engine::new();
    engine.add_fact("same(Z, Z).").unwrap();

    let solutions: Vec<Solution> = engine.query("same(X, f(X)), same(X, X)").unwrap().collect();
    assert_eq!(rendered(&solutions), vec!["X = f(X)"]);

    let outcome = engine.evaluate("same(X, f(X)), same(Y, f(Y)), same(X, Y)").unwrap();
    assert_eq!(1, outcome.solutions.len());
    assert_eq!(SearchStatus::Complete, outcome.status);

    assert_eq!(0, engine.query("same(X, f(X)), same(Y, g(Y)), same(X, Y)").unwrap().count());
}

#[test]
fn deep_derivations_without_depth_limit() {
    let mut program = String::new();
    for i in 0..3_000 {
        program.push_str(&format!("s{} :- s{}.\n", i, i + 1));
    }
    program.push_str("s3000.\n");

    let mut config = EngineConfig::default();
    config.limits = SearchLimits { max_steps: Some(1_000_000), max_depth: None };
    let mut engine = Engine::with_config(config);
    engine.load(&program).unwrap();

    let outcome = engine.evaluate("s0").unwrap();
    assert_eq!(1, outcome.solutions.len());
    assert_eq!(3_001, outcome.summaries()[0].depth);
    assert!(engine.explain("s0").unwrap().contains("s3000  [fact]"));
}

#[test]
fn successful_goals_are_not_failing_branches() {
    let engine = philosophers();
    let outcome = engine.evaluate("mortal(X)").unwrap();
    assert_eq!(2, outcome.solutions.len());
    assert!(outcome.failures.is_empty());

    let mut config = EngineConfig::default();
    config.report = ReportScope::All;
    let mut engine = Engine::with_config(config);
    engine.add_fact("teacher(socrates, plato).").unwrap();
    engine.add_fact("teacher(plato, aristotle).").unwrap();

    let text = engine.explain("teacher(X, Y), teacher(Y, socrates)").unwrap();
    assert!(text.contains("teacher(plato, socrates): unmatched"), "{}", text);
    assert!(text.contains("teacher(aristotle, socrates): unmatched"), "{}", text);
    assert!(!text.contains("subgoal failed"), "{}", text);
}

#[test]
fn explanations_use_query_variable_names() {
    let engine = teaching();
    let text = engine.explain("teacher(X, socrates)").unwrap();
    assert!(text.contains("teacher(X, socrates): unmatched"), "{}", text);
    assert!(!text.contains("_G0"), "{}", text);
}
