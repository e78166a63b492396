use std::fmt;

use crate::cache::CacheError;
use crate::crud::CrudError;

/// What happened to the optimistic cache write after a failed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rollback {
    /// The cache still held this mutation's write and was restored to the
    /// pre-mutation list.
    Restored,
    /// Another write superseded this mutation's; rollback was skipped so the
    /// newer state survives.
    SkippedStale,
    /// The mutation never wrote to the cache (target missing, or the
    /// optimistic phase failed).
    NoContext,
    /// Restoring failed inside the cache store.
    Failed(CacheError),
}

impl fmt::Display for Rollback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rollback::Restored => write!(f, "restored"),
            Rollback::SkippedStale => write!(f, "skipped (stale snapshot)"),
            Rollback::NoContext => write!(f, "nothing to roll back"),
            Rollback::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimisticError {
    /// A mutation's remote call failed.
    Remote { source: CrudError, rollback: Rollback },
    /// Fetching the list failed.
    Fetch(CrudError),
    /// The cache store failed.
    Cache(CacheError),
}

impl OptimisticError {
    /// The remote error behind this failure, if any.
    pub fn remote(&self) -> Option<&CrudError> {
        match self {
            OptimisticError::Remote { source, .. } | OptimisticError::Fetch(source) => Some(source),
            OptimisticError::Cache(_) => None,
        }
    }

    pub fn rollback(&self) -> Option<&Rollback> {
        match self {
            OptimisticError::Remote { rollback, .. } => Some(rollback),
            _ => None,
        }
    }
}

impl fmt::Display for OptimisticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimisticError::Remote { source, rollback } => {
                write!(f, "mutation failed: {} (rollback {})", source, rollback)
            }
            OptimisticError::Fetch(err) => write!(f, "fetch failed: {}", err),
            OptimisticError::Cache(err) => write!(f, "cache error: {}", err),
        }
    }
}

impl std::error::Error for OptimisticError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OptimisticError::Remote { source, .. } => Some(source),
            OptimisticError::Fetch(err) => Some(err),
            OptimisticError::Cache(err) => Some(err),
        }
    }
}

impl From<CacheError> for OptimisticError {
    fn from(err: CacheError) -> Self {
        OptimisticError::Cache(err)
    }
}
