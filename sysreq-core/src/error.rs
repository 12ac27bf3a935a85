//! Error types shared by the entity store and the hierarchy engine

use thiserror::Error;

use crate::models::{RequirementId, VocabularyId, VocabularyKind};

/// Errors raised by entity store backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Requirement row {0} does not exist")]
    MissingRow(RequirementId),

    #[error("Unknown {kind} id {id}")]
    UnknownVocabulary { kind: VocabularyKind, id: VocabularyId },

    #[error("A {kind} named '{name}' already exists")]
    DuplicateName { kind: VocabularyKind, name: String },

    #[error("Database schema version {found} is not supported (expected {expected})")]
    SchemaVersion { found: i32, expected: i32 },

    #[error("Constraint violated: {0}")]
    Constraint(String),
}

/// Errors raised by structural operations on the requirement hierarchy
#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("Parent requirement {0} not found")]
    ParentNotFound(RequirementId),

    #[error("Cannot move requirement {node} under {new_parent}: it is one of its own descendants")]
    CyclicReparent {
        node: RequirementId,
        new_parent: RequirementId,
    },

    #[error("Broken hierarchy at requirement {id}: ancestor {missing_parent} cannot be resolved")]
    BrokenHierarchy {
        id: RequirementId,
        missing_parent: RequirementId,
    },

    #[error("Requirement {0} not found")]
    NotFound(RequirementId),

    #[error("No requirement has the textual id '{0}'")]
    UnknownTextualId(String),

    #[error("Component {component_id} is not allowed in mode {mode_id}")]
    ComponentNotAllowed {
        component_id: VocabularyId,
        mode_id: VocabularyId,
    },

    #[error("Persistence failure, reload state from the store: {0}")]
    Persistence(#[from] StoreError),
}

impl HierarchyError {
    /// Returns true if the in-memory view of the store can still be trusted
    ///
    /// A persistence failure may have left a mutation half-applied, so the
    /// caller has to re-read the store before continuing.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, HierarchyError::Persistence(_))
    }
}

pub type HierarchyResult<T> = std::result::Result<T, HierarchyError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(HierarchyError::NotFound(1).is_recoverable());
        assert!(HierarchyError::ParentNotFound(1).is_recoverable());
        assert!(HierarchyError::CyclicReparent {
            node: 1,
            new_parent: 2
        }
        .is_recoverable());
        assert!(!HierarchyError::Persistence(StoreError::MissingRow(3)).is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let err = HierarchyError::BrokenHierarchy {
            id: 5,
            missing_parent: 9,
        };
        assert_eq!(
            err.to_string(),
            "Broken hierarchy at requirement 5: ancestor 9 cannot be resolved"
        );

        let err = StoreError::UnknownVocabulary {
            kind: VocabularyKind::Mode,
            id: 2,
        };
        assert_eq!(err.to_string(), "Unknown mode id 2");
    }
}
