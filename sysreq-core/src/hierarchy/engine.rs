//! Structural operations on the requirement hierarchy
//!
//! Every mutation runs as one store batch: it either leaves all sibling groups
//! contiguous and all levels consistent, or it leaves the store untouched.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::db::{with_batch, EntityStore};
use crate::error::{HierarchyError, HierarchyResult};
use crate::models::{NewRequirement, Requirement, RequirementDraft, RequirementId, ROOT_LEVEL};
use crate::vocabulary::check_component_allowed;

use super::forest::{build_forest, Forest};
use super::textual_id::{parse_textual_id, textual_id, textual_id_or_fallback};
use super::validate::{validate, ValidationReport};

/// Ways to reposition a requirement among its siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    /// Swap with the previous sibling
    Up,
    /// Swap with the next sibling
    Down,
    /// Become the first sibling
    Top,
    /// Become the last sibling
    Bottom,
}

impl MoveKind {
    /// Parse a move kind from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "up" => Some(MoveKind::Up),
            "down" => Some(MoveKind::Down),
            "top" | "first" => Some(MoveKind::Top),
            "bottom" | "last" => Some(MoveKind::Bottom),
            _ => None,
        }
    }

    /// New position for an item at `current` in a group of `len` items
    fn target(self, current: usize, len: usize) -> usize {
        let last = len.saturating_sub(1);
        match self {
            MoveKind::Up => current.saturating_sub(1),
            MoveKind::Down => (current + 1).min(last),
            MoveKind::Top => 0,
            MoveKind::Bottom => last,
        }
    }
}

impl fmt::Display for MoveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveKind::Up => write!(f, "up"),
            MoveKind::Down => write!(f, "down"),
            MoveKind::Top => write!(f, "top"),
            MoveKind::Bottom => write!(f, "bottom"),
        }
    }
}

/// Result of a cascading delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    /// The requirement the delete was requested for
    pub target: Requirement,
    /// Every removed row id, descendants first and the target last
    pub removed: Vec<RequirementId>,
}

impl DeleteReport {
    /// Number of rows removed in addition to the target
    pub fn descendant_count(&self) -> usize {
        self.removed.len().saturating_sub(1)
    }
}

/// Maintains `parent_id`, `level` and `order_index` of requirements in a store
pub struct HierarchyEngine<'s, S: EntityStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: EntityStore + ?Sized> HierarchyEngine<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// The store this engine operates on
    pub fn store(&self) -> &'s S {
        self.store
    }

    /// Gets a requirement by row id
    pub fn get(&self, id: RequirementId) -> HierarchyResult<Requirement> {
        self.store
            .get_requirement(id)?
            .ok_or(HierarchyError::NotFound(id))
    }

    fn get_parent(&self, parent_id: RequirementId) -> HierarchyResult<Requirement> {
        self.store
            .get_requirement(parent_id)?
            .ok_or(HierarchyError::ParentNotFound(parent_id))
    }

    fn level_under(&self, parent: Option<RequirementId>) -> HierarchyResult<u32> {
        match parent {
            None => Ok(ROOT_LEVEL),
            Some(parent_id) => Ok(self.get_parent(parent_id)?.level + 1),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The `order_index` a child appended under `parent` would receive
    pub fn next_sibling_index(&self, parent: Option<RequirementId>) -> HierarchyResult<u32> {
        Ok(self.store.count_children(parent)?)
    }

    /// All requirements below `id`, in preorder
    pub fn descendants(&self, id: RequirementId) -> HierarchyResult<Vec<Requirement>> {
        let mut found = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut stack: Vec<Requirement> = self.store.children_of(Some(id))?;
        stack.reverse();

        while let Some(node) = stack.pop() {
            if !seen.insert(node.id) {
                return Err(HierarchyError::BrokenHierarchy {
                    id: node.id,
                    missing_parent: node.parent_id.unwrap_or(node.id),
                });
            }
            let mut children = self.store.children_of(Some(node.id))?;
            children.reverse();
            stack.extend(children);
            found.push(node);
        }
        Ok(found)
    }

    /// Number of requirements a delete of `id` would remove besides `id` itself
    pub fn count_descendants(&self, id: RequirementId) -> HierarchyResult<usize> {
        self.get(id)?;
        Ok(self.descendants(id)?.len())
    }

    /// Textual id of the requirement with the given row id
    pub fn textual_id(&self, id: RequirementId) -> HierarchyResult<String> {
        let requirement = self.get(id)?;
        textual_id(&requirement, |parent_id| Ok(self.store.get_requirement(parent_id)?))
    }

    /// Textual id for display; a broken ancestor chain renders the requirement as a root
    pub fn display_id(&self, requirement: &Requirement) -> String {
        textual_id_or_fallback(requirement, |parent_id| Ok(self.store.get_requirement(parent_id)?))
    }

    /// Finds the requirement currently rendered as `text` (e.g. `R0-1`)
    pub fn find_by_textual_id(&self, text: &str) -> HierarchyResult<Requirement> {
        let unknown = || HierarchyError::UnknownTextualId(text.to_string());
        let path = parse_textual_id(text).ok_or_else(unknown)?;

        let mut parent = None;
        let mut found = None;
        for segment in path {
            let node = self
                .store
                .children_of(parent)?
                .into_iter()
                .find(|c| c.order_index == segment)
                .ok_or_else(unknown)?;
            parent = Some(node.id);
            found = Some(node);
        }
        found.ok_or_else(unknown)
    }

    /// Resolves a user reference: a textual id (`R0-1`) or a numeric row id
    pub fn resolve(&self, reference: &str) -> HierarchyResult<Requirement> {
        match reference.trim().parse::<RequirementId>() {
            Ok(id) => self.get(id),
            Err(_) => self.find_by_textual_id(reference),
        }
    }

    /// Builds the full requirement forest
    pub fn forest(&self) -> HierarchyResult<Forest> {
        build_forest(self.store.all_requirements()?)
    }

    /// Checks every row against the hierarchy invariants
    pub fn validate(&self) -> HierarchyResult<ValidationReport> {
        let report = validate(&self.store.all_requirements()?);
        if !report.is_valid() {
            log::warn!(
                "Hierarchy check found {} integrity issue(s) in {} requirements",
                report.issues.len(),
                report.checked
            );
        }
        for issue in &report.issues {
            log::debug!("Integrity issue: {}", issue);
        }
        Ok(report)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Appends a new requirement under `parent` (or as the last root)
    pub fn insert(
        &self,
        parent: Option<RequirementId>,
        draft: RequirementDraft,
    ) -> HierarchyResult<Requirement> {
        let level = self.level_under(parent)?;
        check_component_allowed(self.store, &draft)?;

        let id = with_batch(self.store, || {
            let order_index = self.next_sibling_index(parent)?;
            let id = self.store.insert_requirement(&NewRequirement {
                parent_id: parent,
                level,
                order_index,
                draft,
            })?;
            log::debug!(
                "Inserted requirement {} under {:?} at index {}",
                id,
                parent,
                order_index
            );
            Ok::<_, HierarchyError>(id)
        })?;

        self.get(id)
    }

    /// Replaces the descriptive fields of a requirement
    pub fn update_content(
        &self,
        id: RequirementId,
        draft: RequirementDraft,
    ) -> HierarchyResult<Requirement> {
        self.get(id)?;
        check_component_allowed(self.store, &draft)?;
        self.store.update_content(id, &draft)?;
        self.get(id)
    }

    /// Repositions a requirement among its siblings
    ///
    /// Returns `false` when the requirement is already where the move would
    /// put it (e.g. moving the first sibling up); nothing is written then.
    pub fn move_within_siblings(&self, id: RequirementId, kind: MoveKind) -> HierarchyResult<bool> {
        let node = self.get(id)?;
        let mut siblings = self.store.children_of(node.parent_id)?;
        let current = siblings
            .iter()
            .position(|s| s.id == id)
            .ok_or(HierarchyError::NotFound(id))?;

        let target = kind.target(current, siblings.len());
        if target == current {
            log::debug!("Move {} of requirement {} is a no-op", kind, id);
            return Ok(false);
        }

        let moved = siblings.remove(current);
        siblings.insert(target, moved);
        with_batch(self.store, || self.write_order(&siblings))?;
        log::debug!("Moved requirement {} {} to position {}", id, kind, target);
        Ok(true)
    }

    /// Moves a requirement and its subtree under `new_parent` (or to the roots)
    ///
    /// The requirement is appended to its new sibling group, its subtree's
    /// levels follow the new depth, and the group it left is renumbered.
    /// Returns `false` if `new_parent` already is its parent.
    pub fn reparent(
        &self,
        id: RequirementId,
        new_parent: Option<RequirementId>,
    ) -> HierarchyResult<bool> {
        let node = self.get(id)?;
        if node.parent_id == new_parent {
            return Ok(false);
        }

        if new_parent == Some(id) {
            return Err(HierarchyError::CyclicReparent {
                node: id,
                new_parent: id,
            });
        }
        let new_level = self.level_under(new_parent)?;
        let subtree = self.descendants(id)?;
        if let Some(parent_id) = new_parent {
            if subtree.iter().any(|d| d.id == parent_id) {
                return Err(HierarchyError::CyclicReparent {
                    node: id,
                    new_parent: parent_id,
                });
            }
        }

        with_batch(self.store, || {
            let order_index = self.next_sibling_index(new_parent)?;
            self.store.update_parent_and_level(id, new_parent, new_level)?;
            self.store.update_order_index(id, order_index)?;

            // Preorder guarantees a parent's level is known before its children
            let mut levels = HashMap::from([(id, new_level)]);
            for descendant in &subtree {
                let Some(parent_level) = descendant.parent_id.and_then(|p| levels.get(&p)) else {
                    return Err(HierarchyError::BrokenHierarchy {
                        id: descendant.id,
                        missing_parent: descendant.parent_id.unwrap_or(descendant.id),
                    });
                };
                let level = parent_level + 1;
                if descendant.level != level {
                    self.store.update_level(descendant.id, level)?;
                }
                levels.insert(descendant.id, level);
            }

            self.renumber(node.parent_id)?;
            Ok::<_, HierarchyError>(())
        })?;

        log::debug!(
            "Reparented requirement {} from {:?} to {:?} ({} descendants)",
            id,
            node.parent_id,
            new_parent,
            subtree.len()
        );
        Ok(true)
    }

    /// Deletes a requirement together with its whole subtree
    pub fn delete(&self, id: RequirementId) -> HierarchyResult<DeleteReport> {
        let target = self.get(id)?;
        let subtree = self.descendants(id)?;

        let removed = with_batch(self.store, || {
            let mut removed = Vec::with_capacity(subtree.len() + 1);
            // Reverse preorder removes every child before its parent
            for descendant in subtree.iter().rev() {
                self.store.delete_requirement(descendant.id)?;
                removed.push(descendant.id);
            }
            self.store.delete_requirement(id)?;
            removed.push(id);

            self.renumber(target.parent_id)?;
            Ok::<_, HierarchyError>(removed)
        })?;

        log::debug!(
            "Deleted requirement {} and {} descendants",
            id,
            removed.len() - 1
        );
        Ok(DeleteReport { target, removed })
    }

    /// Repairs ordering gaps, duplicate positions and stale levels everywhere
    ///
    /// Sibling groups keep their current relative order (ties broken by row
    /// id). Fails with [`HierarchyError::BrokenHierarchy`] if a parent link
    /// is dangling or cyclic, since those cannot be repaired automatically.
    /// Returns the number of rows rewritten.
    pub fn normalize(&self) -> HierarchyResult<usize> {
        let forest = self.forest()?;
        let stale: Vec<Requirement> = forest
            .iter()
            .zip(forest.renumbered())
            .filter(|(node, fixed)| node.requirement != *fixed)
            .map(|(_, fixed)| fixed)
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }

        with_batch(self.store, || {
            for row in &stale {
                self.store.update_order_index(row.id, row.order_index)?;
                self.store.update_level(row.id, row.level)?;
            }
            Ok::<_, HierarchyError>(())
        })?;
        log::info!("Normalized {} requirement rows", stale.len());
        Ok(stale.len())
    }

    /// Rewrites the sibling group of `parent` as `0..k` in its current order
    fn renumber(&self, parent: Option<RequirementId>) -> HierarchyResult<usize> {
        let siblings = self.store.children_of(parent)?;
        self.write_order(&siblings)
    }

    /// Stores each sibling's position in `siblings` as its `order_index`
    fn write_order(&self, siblings: &[Requirement]) -> HierarchyResult<usize> {
        let mut changed = 0;
        for (position, sibling) in siblings.iter().enumerate() {
            if sibling.order_index as usize != position {
                self.store.update_order_index(sibling.id, position as u32)?;
                changed += 1;
            }
        }
        Ok(changed)
    }
}
