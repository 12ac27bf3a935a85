//! In-memory requirement forest
//!
//! Rebuilt from the flat rows on every read and handed to whoever asked for
//! it (renderers, exporters). Nothing here is persisted.

use serde::Serialize;
use std::collections::HashMap;

use crate::error::{HierarchyError, HierarchyResult};
use crate::models::{Requirement, RequirementId, ROOT_LEVEL, TEXTUAL_ID_SEPARATOR};

use super::textual_id::format_textual_id;

/// A requirement with its derived textual id and ordered children
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForestNode {
    #[serde(flatten)]
    pub requirement: Requirement,
    pub textual_id: String,
    pub children: Vec<ForestNode>,
}

impl ForestNode {
    /// Number of nodes below this one
    pub fn descendant_count(&self) -> usize {
        self.iter().count() - 1
    }

    /// Distance from the root, read off the textual id
    pub fn depth(&self) -> usize {
        self.textual_id.matches(TEXTUAL_ID_SEPARATOR).count()
    }

    /// Iterates this node and everything below it in preorder
    pub fn iter(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }
}

// Subtrees are torn down from an explicit stack; deep chains would otherwise
// recurse once per level.
impl Drop for ForestNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

/// Ordered set of root requirements, each owning its subtree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Forest {
    pub roots: Vec<ForestNode>,
}

impl Forest {
    /// Total number of requirements in the forest
    pub fn len(&self) -> usize {
        self.roots.iter().map(|r| 1 + r.descendant_count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Iterates all nodes in display order (preorder, siblings by `order_index`)
    pub fn iter(&self) -> Preorder<'_> {
        Preorder {
            stack: self.roots.iter().rev().collect(),
        }
    }

    /// Returns the rows of the forest in display order
    pub fn flatten(&self) -> Vec<Requirement> {
        self.iter().map(|n| n.requirement.clone()).collect()
    }

    /// Rows in display order with `order_index` and `level` rewritten to match
    /// their position in the forest
    pub fn renumbered(&self) -> Vec<Requirement> {
        let mut rows = Vec::new();
        let mut stack: Vec<(&ForestNode, u32, u32)> = self
            .roots
            .iter()
            .enumerate()
            .rev()
            .map(|(position, node)| (node, position as u32, ROOT_LEVEL))
            .collect();

        while let Some((node, position, level)) = stack.pop() {
            let mut row = node.requirement.clone();
            row.order_index = position;
            row.level = level;
            rows.push(row);
            stack.extend(
                node.children
                    .iter()
                    .enumerate()
                    .rev()
                    .map(|(position, child)| (child, position as u32, level + 1)),
            );
        }
        rows
    }

    /// Finds a node by textual id
    pub fn find(&self, textual_id: &str) -> Option<&ForestNode> {
        self.iter().find(|n| n.textual_id == textual_id)
    }

    /// Finds a node by row id
    pub fn find_by_id(&self, id: RequirementId) -> Option<&ForestNode> {
        self.iter().find(|n| n.requirement.id == id)
    }
}

/// Depth-first preorder traversal over forest nodes
pub struct Preorder<'a> {
    stack: Vec<&'a ForestNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a ForestNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Builds the forest from a flat set of requirements
///
/// Every sibling group (the roots included) is sorted by `order_index`, ties
/// broken by row id, and textual ids are assigned top-down. A `parent_id`
/// that points at no row, or rows that never reach a root, make the whole
/// build fail with [`HierarchyError::BrokenHierarchy`].
pub fn build_forest(requirements: Vec<Requirement>) -> HierarchyResult<Forest> {
    let total = requirements.len();
    let mut nodes: HashMap<RequirementId, Requirement> = HashMap::with_capacity(total);
    for req in requirements {
        nodes.insert(req.id, req);
    }

    let mut groups: HashMap<Option<RequirementId>, Vec<(u32, RequirementId)>> = HashMap::new();
    for req in nodes.values() {
        if let Some(parent_id) = req.parent_id {
            if !nodes.contains_key(&parent_id) {
                return Err(HierarchyError::BrokenHierarchy {
                    id: req.id,
                    missing_parent: parent_id,
                });
            }
        }
        groups
            .entry(req.parent_id)
            .or_default()
            .push((req.order_index, req.id));
    }
    for group in groups.values_mut() {
        group.sort_unstable();
    }

    let roots = attach(&mut groups, &mut nodes);
    let forest = Forest { roots };

    // Anything left over sits on a parent loop with no way up to a root
    if let Some(stranded) = nodes.values().min_by_key(|r| r.id) {
        return Err(HierarchyError::BrokenHierarchy {
            id: stranded.id,
            missing_parent: stranded.parent_id.unwrap_or(stranded.id),
        });
    }

    debug_assert_eq!(forest.len(), total);
    Ok(forest)
}

/// Assembles the subtrees reachable from the roots, consuming their rows
///
/// Ids are assigned top-down in one preorder pass; nodes are then built
/// bottom-up by replaying that order backwards.
fn attach(
    groups: &mut HashMap<Option<RequirementId>, Vec<(u32, RequirementId)>>,
    nodes: &mut HashMap<RequirementId, Requirement>,
) -> Vec<ForestNode> {
    let mut stack: Vec<(RequirementId, String)> = groups
        .remove(&None)
        .unwrap_or_default()
        .into_iter()
        .rev()
        .map(|(order_index, id)| (id, format_textual_id(&[order_index])))
        .collect();

    let mut preorder = Vec::with_capacity(nodes.len());
    while let Some((id, textual_id)) = stack.pop() {
        if let Some(group) = groups.remove(&Some(id)) {
            stack.extend(group.into_iter().rev().map(|(order_index, child)| {
                let child_id = format!("{}{}{}", textual_id, TEXTUAL_ID_SEPARATOR, order_index);
                (child, child_id)
            }));
        }
        preorder.push((id, textual_id));
    }

    // Children come after their parent in preorder, so each node's list is
    // complete (in reverse sibling order) by the time the parent is built
    let mut built: HashMap<Option<RequirementId>, Vec<ForestNode>> = HashMap::new();
    for (id, textual_id) in preorder.into_iter().rev() {
        let Some(requirement) = nodes.remove(&id) else {
            continue;
        };
        let mut children = built.remove(&Some(id)).unwrap_or_default();
        children.reverse();
        built.entry(requirement.parent_id).or_default().push(ForestNode {
            requirement,
            textual_id,
            children,
        });
    }

    let mut roots = built.remove(&None).unwrap_or_default();
    roots.reverse();
    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: RequirementId, parent_id: Option<RequirementId>, order_index: u32) -> Requirement {
        Requirement {
            id,
            parent_id,
            level: if parent_id.is_some() { 1 } else { 0 },
            order_index,
            behavior: format!("req {}", id),
            condition: String::new(),
            justification: String::new(),
            latency: None,
            tolerance: None,
            function_id: None,
            variable_id: None,
            component_id: None,
            mode_id: None,
        }
    }

    #[test]
    fn test_build_forest_single_root_two_children() {
        let forest = build_forest(vec![row(3, Some(1), 1), row(1, None, 0), row(2, Some(1), 0)]).unwrap();

        assert_eq!(forest.roots.len(), 1);
        let root = &forest.roots[0];
        assert_eq!(root.requirement.id, 1);
        assert_eq!(root.textual_id, "R0");

        let ids: Vec<_> = root.children.iter().map(|c| c.requirement.id).collect();
        let texts: Vec<_> = root.children.iter().map(|c| c.textual_id.as_str()).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(texts, vec!["R0-0", "R0-1"]);
        assert_eq!(forest.len(), 3);
        assert_eq!(root.descendant_count(), 2);
    }

    #[test]
    fn test_build_forest_orders_roots() {
        let forest = build_forest(vec![row(10, None, 2), row(11, None, 0), row(12, None, 1)]).unwrap();
        let texts: Vec<_> = forest.iter().map(|n| n.textual_id.clone()).collect();
        let ids: Vec<_> = forest.iter().map(|n| n.requirement.id).collect();
        assert_eq!(texts, vec!["R0", "R1", "R2"]);
        assert_eq!(ids, vec![11, 12, 10]);
    }

    #[test]
    fn test_preorder_and_lookup() {
        let forest = build_forest(vec![
            row(1, None, 0),
            row(2, Some(1), 0),
            row(3, Some(2), 0),
            row(4, None, 1),
        ])
        .unwrap();

        let texts: Vec<_> = forest.iter().map(|n| n.textual_id.as_str()).collect();
        assert_eq!(texts, vec!["R0", "R0-0", "R0-0-0", "R1"]);
        assert_eq!(forest.find("R0-0-0").map(|n| n.requirement.id), Some(3));
        assert_eq!(forest.find_by_id(4).map(|n| n.textual_id.as_str()), Some("R1"));
        assert!(forest.find("R7").is_none());
    }

    #[test]
    fn test_flatten_then_rebuild_is_identity() {
        let forest = build_forest(vec![
            row(1, None, 0),
            row(2, Some(1), 1),
            row(3, Some(1), 0),
            row(4, None, 1),
            row(5, Some(4), 0),
        ])
        .unwrap();

        let rebuilt = build_forest(forest.flatten()).unwrap();
        assert_eq!(rebuilt, forest);
    }

    #[test]
    fn test_build_forest_rejects_dangling_parent() {
        let err = build_forest(vec![row(1, None, 0), row(2, Some(8), 0)]).unwrap_err();
        assert!(matches!(
            err,
            HierarchyError::BrokenHierarchy {
                id: 2,
                missing_parent: 8
            }
        ));
    }

    #[test]
    fn test_build_forest_rejects_cycle() {
        let err = build_forest(vec![row(1, None, 0), row(2, Some(3), 0), row(3, Some(2), 0)]).unwrap_err();
        assert!(matches!(err, HierarchyError::BrokenHierarchy { id: 2, .. }));
    }

    #[test]
    fn test_renumbered_closes_gaps() {
        let mut rows = vec![row(1, None, 5), row(2, Some(1), 3), row(3, Some(1), 9)];
        rows[1].level = 4;
        let forest = build_forest(rows).unwrap();

        let fixed: Vec<_> = forest
            .renumbered()
            .into_iter()
            .map(|r| (r.id, r.level, r.order_index))
            .collect();
        assert_eq!(fixed, vec![(1, 0, 0), (2, 1, 0), (3, 1, 1)]);
    }

    #[test]
    fn test_deep_chain_builds_without_recursion() {
        const DEPTH: i64 = 10_000;
        let rows: Vec<_> = (1..=DEPTH)
            .map(|id| row(id, (id > 1).then(|| id - 1), 0))
            .collect();

        let forest = build_forest(rows).unwrap();
        assert_eq!(forest.len(), DEPTH as usize);
        assert_eq!(forest.roots[0].descendant_count(), DEPTH as usize - 1);

        let deepest = forest.find_by_id(DEPTH).unwrap();
        assert_eq!(deepest.depth(), DEPTH as usize - 1);
        assert!(deepest.children.is_empty());

        let renumbered = forest.renumbered();
        assert_eq!(renumbered.len(), DEPTH as usize);
        assert_eq!(renumbered.last().map(|r| r.level), Some(DEPTH as u32 - 1));
        drop(forest);
    }

    #[test]
    fn test_empty_forest() {
        let forest = build_forest(Vec::new()).unwrap();
        assert!(forest.is_empty());
        assert_eq!(forest.len(), 0);
        assert!(forest.flatten().is_empty());
    }
}
