use thiserror::Error;

/**
 * Malformed clause or query text. Positions are 1-based.
 */
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parse error at {line}:{column}: {reason}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub reason: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, reason: impl Into<String>) -> Self {
        ParseError { line, column, reason: reason.into() }
    }

    /**
     * Builds an error pointing at a byte offset into `text`.
     */
    pub(crate) fn at_offset(text: &str, offset: usize, reason: impl Into<String>) -> Self {
        let offset = offset.min(text.len());
        let before = &text[..offset];
        let line = before.matches('\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(newline) => before[newline + 1..].chars().count() + 1,
            None => before.chars().count() + 1,
        };
        ParseError::new(line, column, reason)
    }
}

/**
 * The search gave up before the space of derivations was exhausted. This is
 * distinct from a query that is simply false.
 */
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchBudgetExceeded {
    #[error("step budget of {limit} clause attempts exhausted")]
    Steps { limit: u64 },

    #[error("depth limit of {limit} reached on {branches} branch(es)")]
    Depth { limit: usize, branches: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid engine configuration: {0}")]
    Toml(#[from] toml::de::Error),
}
