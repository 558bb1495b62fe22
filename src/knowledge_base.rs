use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::ast::*;
use crate::error::ParseError;
use crate::parser;

/**
 * Insertion-ordered clause store, indexed by the functor and arity of each
 * clause head. Candidates for a predicate come back in the order they were
 * added, which fixes the order of solutions.
 */
#[derive(Clone, Debug, Default)]
pub struct KnowledgeBase {
    clauses: Vec<Arc<Clause>>,
    index: IndexMap<PredicateKey, Vec<usize>>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        KnowledgeBase::default()
    }

    pub fn add_fact(&mut self, text: &str) -> Result<(), ParseError> {
        let clause = parser::parse_fact(text)?;
        self.insert(clause);
        Ok(())
    }

    pub fn add_rule(&mut self, text: &str) -> Result<(), ParseError> {
        let clause = parser::parse_rule(text)?;
        self.insert(clause);
        Ok(())
    }

    /**
     * Adds every clause of a program. Nothing is added if any clause fails
     * to parse. Returns the number of clauses added.
     */
    pub fn load(&mut self, text: &str) -> Result<usize, ParseError> {
        let program = parser::parse_program(text)?;
        let count = program.len();
        for clause in program {
            self.insert(clause);
        }
        Ok(count)
    }

    pub fn insert(&mut self, clause: Clause) {
        let key = clause.key();
        debug!(predicate = %key, clause = %clause, "adding clause");
        let position = self.clauses.len();
        self.clauses.push(Arc::new(clause));
        self.index.entry(key).or_default().push(position);
    }

    /**
     * Clauses whose head has the given functor and arity, in insertion order.
     */
    pub fn candidates(&self, functor: &str, arity: usize) -> impl Iterator<Item = &Arc<Clause>> + '_ {
        let key = PredicateKey { name: Arc::from(functor), arity };
        self.candidate_positions(&key).iter().map(move |i| &self.clauses[*i])
    }

    pub(crate) fn candidate_positions(&self, key: &PredicateKey) -> &[usize] {
        match self.index.get(key) {
            Some(positions) => positions,
            None => &[],
        }
    }

    pub(crate) fn clause(&self, position: usize) -> &Arc<Clause> {
        &self.clauses[position]
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Clause>> + '_ {
        self.clauses.iter()
    }

    /**
     * Predicates in order of their first clause.
     */
    pub fn predicates(&self) -> impl Iterator<Item = &PredicateKey> + '_ {
        self.index.keys()
    }
}

impl fmt::Display for KnowledgeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for clause in &self.clauses {
            writeln!(f, "{}", clause)?;
        }
        Ok(())
    }
}
