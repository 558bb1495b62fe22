pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod explain;
pub mod knowledge_base;
pub mod parser;
pub mod proof;
pub mod resolution;
pub mod substitution;
pub mod unify;

pub use ast::{Clause, CompoundTerm, PredicateKey, Query, Term, Var};
pub use config::{EngineConfig, ReportScope, SearchLimits};
pub use engine::{Engine, SharedEngine};
pub use error::{ConfigError, ParseError, SearchBudgetExceeded};
pub use knowledge_base::KnowledgeBase;
pub use proof::{FailureReason, ProofNode, ProofSummary};
pub use resolution::{Outcome, SearchStatus, Solution, Solutions};
pub use substitution::Substitution;
pub use unify::{unify, unify_with};
