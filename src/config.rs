use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/**
 * Engine settings. Every field has a default, so a TOML file only needs to
 * name what it changes:
 *
 * ```toml
 * occurs_check = true
 * report = "all"
 *
 * [limits]
 * max_steps = 5000
 * ```
 */
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub occurs_check: bool,
    pub limits: SearchLimits,
    pub report: ReportScope,
    pub max_failure_branches: usize,
}

/**
 * Bounds on a single query. `max_steps` counts clause attempts across the
 * whole search; `max_depth` bounds the nesting of resolution steps on one
 * branch. `None` removes the bound.
 */
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    pub max_steps: Option<u64>,
    pub max_depth: Option<usize>,
}

/**
 * How much `explain` renders: the first derivation and failing branch, or
 * all of them.
 */
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportScope {
    First,
    All,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            occurs_check: false,
            limits: SearchLimits::default(),
            report: ReportScope::First,
            max_failure_branches: 32,
        }
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            max_steps: Some(100_000),
            max_depth: Some(256),
        }
    }
}

impl SearchLimits {
    pub fn unbounded() -> Self {
        SearchLimits { max_steps: None, max_depth: None }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}
