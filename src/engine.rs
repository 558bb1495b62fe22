use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::ParseError;
use crate::explain;
use crate::knowledge_base::KnowledgeBase;
use crate::parser;
use crate::resolution::{Outcome, Solutions};

/**
 * Facts, rules and the settings used to query them.
 *
 * Mutation takes `&mut self` and queries borrow `&self`, so a knowledge base
 * cannot change while any solution sequence over it is still alive. Use
 * [`SharedEngine`] to share one engine between threads.
 */
#[derive(Clone, Debug, Default)]
pub struct Engine {
    kb: KnowledgeBase,
    config: EngineConfig,
}

impl Engine {
    pub fn new() -> Self {
        Engine::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Engine { kb: KnowledgeBase::new(), config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn add_fact(&mut self, text: &str) -> Result<(), ParseError> {
        self.kb.add_fact(text)
    }

    pub fn add_rule(&mut self, text: &str) -> Result<(), ParseError> {
        self.kb.add_rule(text)
    }

    pub fn load(&mut self, text: &str) -> Result<usize, ParseError> {
        self.kb.load(text)
    }

    /**
     * Parses `text` as a query and returns its solutions lazily. An empty
     * sequence means the query is false; a single solution without bindings
     * means a query without variables is true.
     */
    pub fn query(&self, text: &str) -> Result<Solutions<'_>, ParseError> {
        let query = parser::parse_query(text)?;
        Ok(Solutions::new(&self.kb, &self.config, query))
    }

    /**
     * Runs a query to completion and returns every solution with its status
     * and failing branches.
     */
    pub fn evaluate(&self, text: &str) -> Result<Outcome, ParseError> {
        Ok(self.query(text)?.with_failure_tracking().into_outcome())
    }

    pub fn explain(&self, text: &str) -> Result<String, ParseError> {
        let solutions = self.query(text)?.with_failure_tracking();
        let query = solutions.query().clone();
        let outcome = solutions.into_outcome();
        debug!(query = %query, solutions = outcome.solutions.len(), "explaining");
        Ok(explain::render(&query, &outcome, self.config.report))
    }
}

/**
 * An engine behind a reader/writer lock: any number of concurrent queries or
 * one mutation at a time.
 */
#[derive(Clone, Debug, Default)]
pub struct SharedEngine {
    inner: Arc<RwLock<Engine>>,
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        SharedEngine { inner: Arc::new(RwLock::new(engine)) }
    }

    /**
     * Read access for lazy queries. Writers wait until the guard, and every
     * solution sequence borrowed from it, is dropped.
     */
    pub fn read(&self) -> RwLockReadGuard<'_, Engine> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Engine> {
        self.inner.write()
    }

    pub fn add_fact(&self, text: &str) -> Result<(), ParseError> {
        self.inner.write().add_fact(text)
    }

    pub fn add_rule(&self, text: &str) -> Result<(), ParseError> {
        self.inner.write().add_rule(text)
    }

    pub fn load(&self, text: &str) -> Result<usize, ParseError> {
        self.inner.write().load(text)
    }

    pub fn evaluate(&self, text: &str) -> Result<Outcome, ParseError> {
        self.inner.read().evaluate(text)
    }

    pub fn explain(&self, text: &str) -> Result<String, ParseError> {
        self.inner.read().explain(text)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use crate::engine::*;

    #[test]
    fn test_query_syllogism() {
        let mut engine = Engine::new();
        engine.add_fact("human(socrates).").unwrap();
        engine.add_rule("mortal(X) :- human(X).").unwrap();

        let solutions: Vec<_> = engine.query("mortal(socrates)").unwrap().collect();
        assert_eq!(1, solutions.len());
        assert!(solutions[0].is_empty());
    }

    #[test]
    fn test_query_parse_error() {
        let engine = Engine::new();
        assert!(engine.query("mortal(").is_err());
        assert!(engine.explain("").is_err());
    }

    #[test]
    fn test_explain_mentions_rule() {
        let mut engine = Engine::new();
        engine.add_fact("human(socrates).").unwrap();
        engine.add_rule("mortal(X) :- human(X).").unwrap();

        let text = engine.explain("mortal(socrates)").unwrap();
        assert!(text.contains("mortal(X) :- human(X)."), "{}", text);
        assert!(text.contains("human(socrates)  [fact]"), "{}", text);
    }

    #[test]
    fn test_shared_engine_concurrent_queries() {
        let shared = SharedEngine::default();
        shared.load("human(socrates).\nhuman(plato).\nmortal(X) :- human(X).").unwrap();

        thread::scope(|scope| {
            for _ in 0..4 {
                let shared = &shared;
                scope.spawn(move || {
                    let outcome = shared.evaluate("mortal(X)").unwrap();
                    assert_eq!(2, outcome.solutions.len());
                });
            }
        });

        shared.add_fact("human(aristotle).").unwrap();
        let engine = shared.read();
        assert_eq!(3, engine.query("mortal(X)").unwrap().count());
    }
}
