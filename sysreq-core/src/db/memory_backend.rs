//! In-memory storage backend
//!
//! Keeps every table in ordered maps behind a mutex. Used for scratch
//! sessions (`:memory:`) and as the reference store in tests. It enforces the
//! same parent/child constraints as the SQLite schema.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{StoreError, StoreResult};
use crate::models::{
    ModeComponent, NewRequirement, Requirement, RequirementDraft, RequirementId, StoreSnapshot,
    VocabularyEntry, VocabularyId, VocabularyKind,
};

use super::traits::{BackendType, EntityStore};

#[derive(Debug, Clone, Default)]
struct Tables {
    requirements: BTreeMap<RequirementId, Requirement>,
    vocabulary: HashMap<VocabularyKind, BTreeMap<VocabularyId, String>>,
    mode_components: BTreeSet<ModeComponent>,
    last_requirement_id: RequirementId,
    last_vocabulary_id: HashMap<VocabularyKind, VocabularyId>,
}

impl Tables {
    fn requirement_mut(&mut self, id: RequirementId) -> StoreResult<&mut Requirement> {
        self.requirements
            .get_mut(&id)
            .ok_or(StoreError::MissingRow(id))
    }

    fn vocabulary(&self, kind: VocabularyKind) -> Option<&BTreeMap<VocabularyId, String>> {
        self.vocabulary.get(&kind)
    }

    fn check_reference(&self, kind: VocabularyKind, id: Option<VocabularyId>) -> StoreResult<()> {
        match id {
            Some(id) if !self.vocabulary(kind).is_some_and(|t| t.contains_key(&id)) => {
                Err(StoreError::UnknownVocabulary { kind, id })
            }
            _ => Ok(()),
        }
    }

    fn check_draft(&self, draft: &RequirementDraft) -> StoreResult<()> {
        self.check_reference(VocabularyKind::Function, draft.function_id)?;
        self.check_reference(VocabularyKind::Variable, draft.variable_id)?;
        self.check_reference(VocabularyKind::Component, draft.component_id)?;
        self.check_reference(VocabularyKind::Mode, draft.mode_id)
    }

    fn check_parent(&self, parent_id: Option<RequirementId>) -> StoreResult<()> {
        match parent_id {
            Some(parent) if !self.requirements.contains_key(&parent) => Err(
                StoreError::Constraint(format!("parent requirement {} does not exist", parent)),
            ),
            _ => Ok(()),
        }
    }
}

struct MemoryState {
    tables: Tables,
    checkpoint: Option<Tables>,
}

/// In-memory backend implementation
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an empty in-memory store
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                tables: Tables::default(),
                checkpoint: None,
            }),
        }
    }

    /// Creates an in-memory store pre-populated from a snapshot
    pub fn from_snapshot(snapshot: &StoreSnapshot) -> StoreResult<Self> {
        let backend = Self::new();
        backend.replace_all(snapshot)?;
        Ok(backend)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EntityStore for MemoryBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }

    fn all_requirements(&self) -> StoreResult<Vec<Requirement>> {
        Ok(self.lock().tables.requirements.values().cloned().collect())
    }

    fn get_requirement(&self, id: RequirementId) -> StoreResult<Option<Requirement>> {
        Ok(self.lock().tables.requirements.get(&id).cloned())
    }

    fn children_of(&self, parent: Option<RequirementId>) -> StoreResult<Vec<Requirement>> {
        let state = self.lock();
        let mut children: Vec<Requirement> = state
            .tables
            .requirements
            .values()
            .filter(|r| r.parent_id == parent)
            .cloned()
            .collect();
        children.sort_by_key(|r| (r.order_index, r.id));
        Ok(children)
    }

    fn count_children(&self, parent: Option<RequirementId>) -> StoreResult<u32> {
        let state = self.lock();
        Ok(state
            .tables
            .requirements
            .values()
            .filter(|r| r.parent_id == parent)
            .count() as u32)
    }

    fn insert_requirement(&self, requirement: &NewRequirement) -> StoreResult<RequirementId> {
        let mut state = self.lock();
        let tables = &mut state.tables;
        tables.check_parent(requirement.parent_id)?;
        tables.check_draft(&requirement.draft)?;

        tables.last_requirement_id += 1;
        let id = tables.last_requirement_id;
        let mut row = Requirement {
            id,
            parent_id: requirement.parent_id,
            level: requirement.level,
            order_index: requirement.order_index,
            behavior: String::new(),
            condition: String::new(),
            justification: String::new(),
            latency: None,
            tolerance: None,
            function_id: None,
            variable_id: None,
            component_id: None,
            mode_id: None,
        };
        row.apply_draft(requirement.draft.clone());
        tables.requirements.insert(id, row);
        Ok(id)
    }

    fn update_content(&self, id: RequirementId, draft: &RequirementDraft) -> StoreResult<()> {
        let mut state = self.lock();
        state.tables.check_draft(draft)?;
        state.tables.requirement_mut(id)?.apply_draft(draft.clone());
        Ok(())
    }

    fn update_order_index(&self, id: RequirementId, order_index: u32) -> StoreResult<()> {
        self.lock().tables.requirement_mut(id)?.order_index = order_index;
        Ok(())
    }

    fn update_parent_and_level(
        &self,
        id: RequirementId,
        parent_id: Option<RequirementId>,
        level: u32,
    ) -> StoreResult<()> {
        let mut state = self.lock();
        state.tables.check_parent(parent_id)?;
        let row = state.tables.requirement_mut(id)?;
        row.parent_id = parent_id;
        row.level = level;
        Ok(())
    }

    fn update_level(&self, id: RequirementId, level: u32) -> StoreResult<()> {
        self.lock().tables.requirement_mut(id)?.level = level;
        Ok(())
    }

    fn delete_requirement(&self, id: RequirementId) -> StoreResult<()> {
        let mut state = self.lock();
        let tables = &mut state.tables;
        if tables.requirements.values().any(|r| r.parent_id == Some(id)) {
            return Err(StoreError::Constraint(format!(
                "requirement {} still has children",
                id
            )));
        }
        tables
            .requirements
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::MissingRow(id))
    }

    fn add_vocabulary(&self, kind: VocabularyKind, name: &str) -> StoreResult<VocabularyId> {
        let mut state = self.lock();
        let tables = &mut state.tables;
        if tables
            .vocabulary(kind)
            .is_some_and(|t| t.values().any(|n| n == name))
        {
            return Err(StoreError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
        let last = tables.last_vocabulary_id.entry(kind).or_insert(0);
        *last += 1;
        let id = *last;
        tables
            .vocabulary
            .entry(kind)
            .or_default()
            .insert(id, name.to_string());
        Ok(id)
    }

    fn list_vocabulary(&self, kind: VocabularyKind) -> StoreResult<Vec<VocabularyEntry>> {
        let state = self.lock();
        Ok(state
            .tables
            .vocabulary(kind)
            .map(|t| {
                t.iter()
                    .map(|(id, name)| VocabularyEntry {
                        id: *id,
                        name: name.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn rename_vocabulary(
        &self,
        kind: VocabularyKind,
        id: VocabularyId,
        name: &str,
    ) -> StoreResult<()> {
        let mut state = self.lock();
        let table = state.tables.vocabulary.entry(kind).or_default();
        if table.iter().any(|(other, n)| *other != id && n == name) {
            return Err(StoreError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
        match table.get_mut(&id) {
            Some(existing) => {
                *existing = name.to_string();
                Ok(())
            }
            None => Err(StoreError::UnknownVocabulary { kind, id }),
        }
    }

    fn remove_vocabulary(&self, kind: VocabularyKind, id: VocabularyId) -> StoreResult<()> {
        let mut state = self.lock();
        let tables = &mut state.tables;
        let removed = tables
            .vocabulary
            .get_mut(&kind)
            .and_then(|t| t.remove(&id));
        if removed.is_none() {
            return Err(StoreError::UnknownVocabulary { kind, id });
        }

        for row in tables.requirements.values_mut() {
            let field = match kind {
                VocabularyKind::Function => &mut row.function_id,
                VocabularyKind::Variable => &mut row.variable_id,
                VocabularyKind::Component => &mut row.component_id,
                VocabularyKind::Mode => &mut row.mode_id,
            };
            if *field == Some(id) {
                *field = None;
            }
        }
        match kind {
            VocabularyKind::Mode => tables.mode_components.retain(|mc| mc.mode_id != id),
            VocabularyKind::Component => {
                tables.mode_components.retain(|mc| mc.component_id != id)
            }
            _ => {}
        }
        Ok(())
    }

    fn allow_component(&self, mode_id: VocabularyId, component_id: VocabularyId) -> StoreResult<()> {
        let mut state = self.lock();
        let tables = &mut state.tables;
        tables.check_reference(VocabularyKind::Mode, Some(mode_id))?;
        tables.check_reference(VocabularyKind::Component, Some(component_id))?;
        tables.mode_components.insert(ModeComponent {
            mode_id,
            component_id,
        });
        Ok(())
    }

    fn disallow_component(
        &self,
        mode_id: VocabularyId,
        component_id: VocabularyId,
    ) -> StoreResult<()> {
        self.lock().tables.mode_components.remove(&ModeComponent {
            mode_id,
            component_id,
        });
        Ok(())
    }

    fn mode_components(&self) -> StoreResult<Vec<ModeComponent>> {
        Ok(self.lock().tables.mode_components.iter().copied().collect())
    }

    fn replace_all(&self, snapshot: &StoreSnapshot) -> StoreResult<()> {
        let mut tables = Tables::default();

        for kind in VocabularyKind::ALL {
            let table = tables.vocabulary.entry(kind).or_default();
            for entry in snapshot.vocabulary(kind) {
                table.insert(entry.id, entry.name.clone());
            }
            let last = table.keys().next_back().copied().unwrap_or(0);
            tables.last_vocabulary_id.insert(kind, last);
        }

        for mc in &snapshot.mode_components {
            tables.check_reference(VocabularyKind::Mode, Some(mc.mode_id))?;
            tables.check_reference(VocabularyKind::Component, Some(mc.component_id))?;
            tables.mode_components.insert(*mc);
        }

        for row in &snapshot.requirements {
            tables.check_draft(&row.draft())?;
            tables.requirements.insert(row.id, row.clone());
        }
        for row in &snapshot.requirements {
            tables.check_parent(row.parent_id)?;
        }
        tables.last_requirement_id = tables.requirements.keys().next_back().copied().unwrap_or(0);

        self.lock().tables = tables;
        Ok(())
    }

    fn begin_batch(&self) -> StoreResult<()> {
        let mut state = self.lock();
        if state.checkpoint.is_some() {
            return Err(StoreError::Constraint("a batch is already open".to_string()));
        }
        state.checkpoint = Some(state.tables.clone());
        Ok(())
    }

    fn commit_batch(&self) -> StoreResult<()> {
        self.lock().checkpoint = None;
        Ok(())
    }

    fn rollback_batch(&self) -> StoreResult<()> {
        let mut state = self.lock();
        if let Some(tables) = state.checkpoint.take() {
            state.tables = tables;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_row(parent_id: Option<RequirementId>, order_index: u32) -> NewRequirement {
        NewRequirement {
            parent_id,
            level: if parent_id.is_some() { 1 } else { 0 },
            order_index,
            draft: RequirementDraft::new("behavior"),
        }
    }

    #[test]
    fn test_memory_backend_requirement_crud() {
        let backend = MemoryBackend::new();

        let root = backend.insert_requirement(&new_row(None, 0)).unwrap();
        let child = backend.insert_requirement(&new_row(Some(root), 0)).unwrap();
        assert_eq!(root, 1);
        assert_eq!(child, 2);

        assert_eq!(backend.count_children(None).unwrap(), 1);
        assert_eq!(backend.count_children(Some(root)).unwrap(), 1);

        backend.update_order_index(child, 3).unwrap();
        let loaded = backend.get_requirement(child).unwrap().unwrap();
        assert_eq!(loaded.order_index, 3);

        backend.delete_requirement(child).unwrap();
        assert!(backend.get_requirement(child).unwrap().is_none());
        assert!(matches!(
            backend.delete_requirement(child),
            Err(StoreError::MissingRow(2))
        ));
    }

    #[test]
    fn test_memory_backend_enforces_parent_constraints() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.insert_requirement(&new_row(Some(42), 0)),
            Err(StoreError::Constraint(_))
        ));

        let root = backend.insert_requirement(&new_row(None, 0)).unwrap();
        backend.insert_requirement(&new_row(Some(root), 0)).unwrap();
        assert!(matches!(
            backend.delete_requirement(root),
            Err(StoreError::Constraint(_))
        ));
    }

    #[test]
    fn test_memory_backend_ids_are_not_reused() {
        let backend = MemoryBackend::new();
        let first = backend.insert_requirement(&new_row(None, 0)).unwrap();
        backend.delete_requirement(first).unwrap();
        let second = backend.insert_requirement(&new_row(None, 0)).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_memory_backend_rollback_restores_tables() {
        let backend = MemoryBackend::new();
        let root = backend.insert_requirement(&new_row(None, 0)).unwrap();

        backend.begin_batch().unwrap();
        backend.update_order_index(root, 5).unwrap();
        backend.insert_requirement(&new_row(None, 1)).unwrap();
        backend.rollback_batch().unwrap();

        let rows = backend.all_requirements().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].order_index, 0);
    }

    #[test]
    fn test_memory_backend_vocabulary() {
        let backend = MemoryBackend::new();
        let pump = backend.add_vocabulary(VocabularyKind::Component, "Pump").unwrap();
        let idle = backend.add_vocabulary(VocabularyKind::Mode, "Idle").unwrap();
        assert!(matches!(
            backend.add_vocabulary(VocabularyKind::Component, "Pump"),
            Err(StoreError::DuplicateName { .. })
        ));

        backend.allow_component(idle, pump).unwrap();
        assert_eq!(backend.mode_components().unwrap().len(), 1);

        let draft = RequirementDraft::new("Run").with_component(pump).with_mode(idle);
        let id = backend
            .insert_requirement(&NewRequirement {
                parent_id: None,
                level: 0,
                order_index: 0,
                draft,
            })
            .unwrap();

        backend.remove_vocabulary(VocabularyKind::Component, pump).unwrap();
        let row = backend.get_requirement(id).unwrap().unwrap();
        assert_eq!(row.component_id, None);
        assert_eq!(row.mode_id, Some(idle));
        assert!(backend.mode_components().unwrap().is_empty());
    }

    #[test]
    fn test_memory_backend_replace_all_keeps_ids() {
        let source = MemoryBackend::new();
        let root = source.insert_requirement(&new_row(None, 0)).unwrap();
        source.insert_requirement(&new_row(Some(root), 0)).unwrap();
        let snapshot = source.snapshot().unwrap();

        let target = MemoryBackend::from_snapshot(&snapshot).unwrap();
        assert_eq!(target.snapshot().unwrap(), snapshot);

        let next = target.insert_requirement(&new_row(None, 1)).unwrap();
        assert_eq!(next, 3);
    }
}
