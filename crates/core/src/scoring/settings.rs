use std::fmt;

use serde::{Deserialize, Serialize};

use super::{DEFAULT_BATCH_SIZE, DEFAULT_WEIGHTS, MAX_BATCH_SIZE};
use crate::errors::DomainError;
use crate::scoring::ScoringWeights;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSize(usize);

impl BatchSize {
    pub fn new(value: usize) -> Result<Self, DomainError> {
        if value == 0 || value > MAX_BATCH_SIZE {
            return Err(DomainError::InvalidBatchSize { value, max: MAX_BATCH_SIZE });
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        Self(DEFAULT_BATCH_SIZE)
    }
}

/// Schema that holds the catalog and stats tables.
///
/// Identifiers cannot be bound as statement parameters, so the name is
/// restricted to `[A-Za-z_][A-Za-z0-9_]*` before it is ever spliced into SQL.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let mut chars = value.chars();
        let valid_head = chars.next().is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_');
        let valid_tail = chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        if !valid_head || !valid_tail {
            return Err(DomainError::InvalidNamespace(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn qualify(&self, table: &str) -> String {
        format!("{}.{table}", self.0)
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self("main".to_string())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoringSettings {
    pub batch_size: BatchSize,
    pub namespace: Namespace,
    pub weights: ScoringWeights,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            batch_size: BatchSize::default(),
            namespace: Namespace::default(),
            weights: DEFAULT_WEIGHTS,
        }
    }
}
