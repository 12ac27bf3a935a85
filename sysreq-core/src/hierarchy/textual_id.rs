//! Textual id derivation
//!
//! A textual id is the path of `order_index` values from the root down to a
//! requirement, e.g. `R0-1-2`. It is never stored: every caller derives it
//! through this module.

use std::collections::{HashMap, HashSet};

use crate::error::{HierarchyError, HierarchyResult};
use crate::models::{Requirement, RequirementId, TEXTUAL_ID_PREFIX, TEXTUAL_ID_SEPARATOR};

/// Formats a path of sibling positions (root first) as a textual id
pub fn format_textual_id(path: &[u32]) -> String {
    let segments: Vec<String> = path.iter().map(|i| i.to_string()).collect();
    format!("{}{}", TEXTUAL_ID_PREFIX, segments.join(TEXTUAL_ID_SEPARATOR))
}

/// Parses a textual id into its path of sibling positions (root first)
///
/// Returns `None` for anything that is not `R<n>(-<n>)*`.
pub fn parse_textual_id(text: &str) -> Option<Vec<u32>> {
    let rest = text
        .trim()
        .strip_prefix(TEXTUAL_ID_PREFIX)
        .or_else(|| text.trim().strip_prefix(&TEXTUAL_ID_PREFIX.to_lowercase()))?;
    if rest.is_empty() {
        return None;
    }
    rest.split(TEXTUAL_ID_SEPARATOR)
        .map(|segment| {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                segment.parse().ok()
            }
        })
        .collect()
}

/// Computes the textual id of a requirement by walking up its ancestor chain
///
/// `parent_of` resolves a row id to its requirement. A dangling `parent_id`
/// or a loop in the chain yields [`HierarchyError::BrokenHierarchy`].
pub fn textual_id<F>(requirement: &Requirement, mut parent_of: F) -> HierarchyResult<String>
where
    F: FnMut(RequirementId) -> HierarchyResult<Option<Requirement>>,
{
    let mut path = vec![requirement.order_index];
    let mut seen = HashSet::from([requirement.id]);
    let mut next = requirement.parent_id;

    while let Some(parent_id) = next {
        let parent = parent_of(parent_id)?.ok_or(HierarchyError::BrokenHierarchy {
            id: requirement.id,
            missing_parent: parent_id,
        })?;
        if !seen.insert(parent.id) {
            return Err(HierarchyError::BrokenHierarchy {
                id: requirement.id,
                missing_parent: parent.id,
            });
        }
        path.push(parent.order_index);
        next = parent.parent_id;
    }

    path.reverse();
    Ok(format_textual_id(&path))
}

/// Like [`textual_id`], but degrades to a root-style id when the chain is broken
///
/// The inconsistency is logged so it does not go unnoticed.
pub fn textual_id_or_fallback<F>(requirement: &Requirement, parent_of: F) -> String
where
    F: FnMut(RequirementId) -> HierarchyResult<Option<Requirement>>,
{
    match textual_id(requirement, parent_of) {
        Ok(text) => text,
        Err(err) => {
            log::warn!("Displaying requirement {} as a root: {}", requirement.id, err);
            format_textual_id(&[requirement.order_index])
        }
    }
}

/// Memoizing textual id computation over a flat set of requirements
///
/// Intended for one rendering or export pass; ancestors resolved for one
/// requirement are reused for every other requirement below them.
pub struct TextualIdResolver<'a> {
    index: HashMap<RequirementId, &'a Requirement>,
    cache: HashMap<RequirementId, String>,
}

impl<'a> TextualIdResolver<'a> {
    pub fn new(requirements: &'a [Requirement]) -> Self {
        Self {
            index: requirements.iter().map(|r| (r.id, r)).collect(),
            cache: HashMap::with_capacity(requirements.len()),
        }
    }

    /// Resolves the textual id of the requirement with the given row id
    pub fn resolve(&mut self, id: RequirementId) -> HierarchyResult<String> {
        if let Some(cached) = self.cache.get(&id) {
            return Ok(cached.clone());
        }

        let mut current = *self.index.get(&id).ok_or(HierarchyError::NotFound(id))?;

        // Nodes still lacking an id, from `id` upwards
        let mut pending: Vec<&Requirement> = Vec::new();
        let mut seen = HashSet::new();
        let mut base: Option<String> = None;

        loop {
            if !seen.insert(current.id) {
                return Err(HierarchyError::BrokenHierarchy {
                    id,
                    missing_parent: current.id,
                });
            }
            pending.push(current);

            let Some(parent_id) = current.parent_id else {
                break;
            };
            if let Some(cached) = self.cache.get(&parent_id) {
                base = Some(cached.clone());
                break;
            }
            current = *self
                .index
                .get(&parent_id)
                .ok_or(HierarchyError::BrokenHierarchy {
                    id,
                    missing_parent: parent_id,
                })?;
        }

        let mut text = String::new();
        for node in pending.iter().rev() {
            text = match base.take() {
                Some(prefix) => format!("{}{}{}", prefix, TEXTUAL_ID_SEPARATOR, node.order_index),
                None => format_textual_id(&[node.order_index]),
            };
            self.cache.insert(node.id, text.clone());
            base = Some(text.clone());
        }

        Ok(text)
    }

    /// Resolves every requirement, keyed by row id
    pub fn resolve_all(&mut self) -> HierarchyResult<HashMap<RequirementId, String>> {
        let ids: Vec<RequirementId> = self.index.keys().copied().collect();
        for id in ids {
            self.resolve(id)?;
        }
        Ok(self.cache.clone())
    }
}
