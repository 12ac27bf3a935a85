//! Entity store abstraction
//!
//! This module defines the trait every storage backend implements. The
//! hierarchy engine only ever talks to this trait, never to a concrete backend.

use std::fmt;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    ModeComponent, NewRequirement, Requirement, RequirementDraft, RequirementId, StoreSnapshot,
    VocabularyEntry, VocabularyId, VocabularyKind,
};

/// Types of entity store backends available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Volatile in-memory tables
    Memory,
    /// SQLite database file
    Sqlite,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendType::Memory => write!(f, "Memory"),
            BackendType::Sqlite => write!(f, "SQLite"),
        }
    }
}

/// Row-level CRUD over the requirement and vocabulary tables
///
/// The store knows nothing about sibling ordering or textual ids: it persists
/// whatever `parent_id`, `level` and `order_index` it is handed. Keeping those
/// consistent is the job of [`crate::hierarchy::HierarchyEngine`].
///
/// Backends must behave like a relational store with foreign keys:
/// - inserting a row whose `parent_id` does not exist fails
/// - deleting a row that still has children fails
pub trait EntityStore: Send + Sync {
    /// Returns the backend type
    fn backend_type(&self) -> BackendType;

    // =========================================================================
    // Requirement Operations
    // =========================================================================

    /// Lists every requirement row (unordered)
    fn all_requirements(&self) -> StoreResult<Vec<Requirement>>;

    /// Gets a requirement by its row id
    fn get_requirement(&self, id: RequirementId) -> StoreResult<Option<Requirement>>;

    /// Lists the children of `parent` (or the roots when `None`) by `order_index`
    fn children_of(&self, parent: Option<RequirementId>) -> StoreResult<Vec<Requirement>>;

    /// Counts the children of `parent` (or the roots when `None`)
    fn count_children(&self, parent: Option<RequirementId>) -> StoreResult<u32> {
        Ok(self.children_of(parent)?.len() as u32)
    }

    /// Inserts a new requirement row and returns the assigned id
    fn insert_requirement(&self, requirement: &NewRequirement) -> StoreResult<RequirementId>;

    /// Replaces the descriptive fields of a requirement
    fn update_content(&self, id: RequirementId, draft: &RequirementDraft) -> StoreResult<()>;

    /// Sets the sibling position of a requirement
    fn update_order_index(&self, id: RequirementId, order_index: u32) -> StoreResult<()>;

    /// Moves a requirement under a new parent at the given level
    fn update_parent_and_level(
        &self,
        id: RequirementId,
        parent_id: Option<RequirementId>,
        level: u32,
    ) -> StoreResult<()>;

    /// Sets the level of a requirement
    fn update_level(&self, id: RequirementId, level: u32) -> StoreResult<()>;

    /// Deletes a single requirement row
    fn delete_requirement(&self, id: RequirementId) -> StoreResult<()>;

    // =========================================================================
    // Vocabulary Operations
    // =========================================================================

    /// Adds a vocabulary entry and returns its id
    fn add_vocabulary(&self, kind: VocabularyKind, name: &str) -> StoreResult<VocabularyId>;

    /// Lists the vocabulary entries of a kind, ordered by id
    fn list_vocabulary(&self, kind: VocabularyKind) -> StoreResult<Vec<VocabularyEntry>>;

    /// Renames a vocabulary entry
    fn rename_vocabulary(&self, kind: VocabularyKind, id: VocabularyId, name: &str)
        -> StoreResult<()>;

    /// Removes a vocabulary entry; requirements referencing it lose the reference
    fn remove_vocabulary(&self, kind: VocabularyKind, id: VocabularyId) -> StoreResult<()>;

    /// Finds a vocabulary entry by exact name
    fn find_vocabulary(&self, kind: VocabularyKind, name: &str) -> StoreResult<Option<VocabularyEntry>> {
        Ok(self
            .list_vocabulary(kind)?
            .into_iter()
            .find(|e| e.name == name))
    }

    /// Allows a component to be used by requirements of a mode
    fn allow_component(&self, mode_id: VocabularyId, component_id: VocabularyId) -> StoreResult<()>;

    /// Revokes a mode/component association
    fn disallow_component(&self, mode_id: VocabularyId, component_id: VocabularyId)
        -> StoreResult<()>;

    /// Lists every mode/component association
    fn mode_components(&self) -> StoreResult<Vec<ModeComponent>>;

    // =========================================================================
    // Whole Store Operations
    // =========================================================================

    /// Reads the full contents of the store
    fn snapshot(&self) -> StoreResult<StoreSnapshot> {
        let mut requirements = self.all_requirements()?;
        requirements.sort_by_key(|r| r.id);
        Ok(StoreSnapshot {
            functions: self.list_vocabulary(VocabularyKind::Function)?,
            variables: self.list_vocabulary(VocabularyKind::Variable)?,
            components: self.list_vocabulary(VocabularyKind::Component)?,
            modes: self.list_vocabulary(VocabularyKind::Mode)?,
            mode_components: self.mode_components()?,
            requirements,
        })
    }

    /// Replaces the full contents of the store, keeping the ids of the snapshot
    ///
    /// Callers should run this inside a batch so a failure leaves the old
    /// contents in place.
    fn replace_all(&self, snapshot: &StoreSnapshot) -> StoreResult<()>;

    // =========================================================================
    // Batch Control
    // =========================================================================

    /// Starts an atomic batch of mutations
    fn begin_batch(&self) -> StoreResult<()>;

    /// Makes the mutations of the current batch permanent
    fn commit_batch(&self) -> StoreResult<()>;

    /// Discards the mutations of the current batch
    fn rollback_batch(&self) -> StoreResult<()>;
}

/// Runs `f` inside a batch, committing on success and rolling back on error
pub fn with_batch<S, T, E, F>(store: &S, f: F) -> Result<T, E>
where
    S: EntityStore + ?Sized,
    E: From<StoreError>,
    F: FnOnce() -> Result<T, E>,
{
    store.begin_batch()?;
    match f() {
        Ok(value) => match store.commit_batch() {
            Ok(()) => Ok(value),
            Err(commit_err) => {
                if let Err(rollback_err) = store.rollback_batch() {
                    log::error!("Rollback failed after failed commit: {}", rollback_err);
                }
                Err(commit_err.into())
            }
        },
        Err(err) => {
            if let Err(rollback_err) = store.rollback_batch() {
                log::error!("Rollback failed after aborted batch: {}", rollback_err);
            }
            Err(err)
        }
    }
}

/// Statistics about a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub requirement_count: usize,
    pub root_count: usize,
    pub function_count: usize,
    pub variable_count: usize,
    pub component_count: usize,
    pub mode_count: usize,
    pub backend_type: BackendType,
}

/// Collects statistics about any store
pub fn stats<S: EntityStore + ?Sized>(store: &S) -> StoreResult<StoreStats> {
    let snapshot = store.snapshot()?;
    Ok(StoreStats {
        requirement_count: snapshot.requirements.len(),
        root_count: snapshot.requirements.iter().filter(|r| r.is_root()).count(),
        function_count: snapshot.functions.len(),
        variable_count: snapshot.variables.len(),
        component_count: snapshot.components.len(),
        mode_count: snapshot.modes.len(),
        backend_type: store.backend_type(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryBackend;
    use crate::hierarchy::HierarchyEngine;
    use crate::models::RequirementDraft;

    #[test]
    fn test_stats_counts_rows_and_vocabulary() {
        let store = MemoryBackend::new();
        store.add_vocabulary(VocabularyKind::Component, "Pump").unwrap();
        store.add_vocabulary(VocabularyKind::Component, "Valve").unwrap();
        store.add_vocabulary(VocabularyKind::Mode, "Startup").unwrap();

        let engine = HierarchyEngine::new(&store);
        let root = engine.insert(None, RequirementDraft::new("root")).unwrap();
        engine.insert(Some(root.id), RequirementDraft::new("child")).unwrap();
        engine.insert(None, RequirementDraft::new("second root")).unwrap();

        let stats = stats(&store).unwrap();
        assert_eq!(
            stats,
            StoreStats {
                requirement_count: 3,
                root_count: 2,
                function_count: 0,
                variable_count: 0,
                component_count: 2,
                mode_count: 1,
                backend_type: BackendType::Memory,
            }
        );
    }
}
