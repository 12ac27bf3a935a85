//! Invariant checks over a flat set of requirement rows

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::models::{Requirement, RequirementId, ROOT_LEVEL};

use super::textual_id::format_textual_id;

/// A single violation of the hierarchy invariants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// `parent_id` points at a row that does not exist
    DanglingParent {
        id: RequirementId,
        parent_id: RequirementId,
    },
    /// The parent chain of the row loops without reaching a root
    Cycle { id: RequirementId },
    /// The stored level differs from the depth implied by the parent chain
    LevelMismatch {
        id: RequirementId,
        expected: u32,
        found: u32,
    },
    /// The `order_index` values of a sibling group are not `0..k`
    OrderNotContiguous {
        parent_id: Option<RequirementId>,
        found: Vec<u32>,
    },
    /// Two rows would render with the same textual id
    DuplicateTextualId {
        textual_id: String,
        ids: Vec<RequirementId>,
    },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityIssue::DanglingParent { id, parent_id } => {
                write!(f, "requirement {} references missing parent {}", id, parent_id)
            }
            IntegrityIssue::Cycle { id } => {
                write!(f, "requirement {} is part of a parent cycle", id)
            }
            IntegrityIssue::LevelMismatch {
                id,
                expected,
                found,
            } => write!(
                f,
                "requirement {} has level {} but sits at depth {}",
                id, found, expected
            ),
            IntegrityIssue::OrderNotContiguous { parent_id, found } => {
                let group = match parent_id {
                    Some(p) => format!("children of {}", p),
                    None => "roots".to_string(),
                };
                write!(f, "{} have order indexes {:?}", group, found)
            }
            IntegrityIssue::DuplicateTextualId { textual_id, ids } => {
                write!(f, "{} is shared by requirements {:?}", textual_id, ids)
            }
        }
    }
}

/// Outcome of checking a set of rows against the hierarchy invariants
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub checked: usize,
    pub issues: Vec<IntegrityIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Checks parent links, levels, sibling ordering and textual id uniqueness
pub fn validate(requirements: &[Requirement]) -> ValidationReport {
    let index: HashMap<RequirementId, &Requirement> =
        requirements.iter().map(|r| (r.id, r)).collect();
    let mut issues = Vec::new();

    // Parent links and depth
    let mut depths: HashMap<RequirementId, Option<u32>> =
        HashMap::with_capacity(requirements.len());
    for req in requirements {
        if let Some(parent_id) = req.parent_id {
            if !index.contains_key(&parent_id) {
                issues.push(IntegrityIssue::DanglingParent {
                    id: req.id,
                    parent_id,
                });
            }
        }
    }
    for req in requirements {
        match depth_of(req.id, &index, &mut depths) {
            Some(depth) => {
                let expected = ROOT_LEVEL + depth;
                if req.level != expected {
                    issues.push(IntegrityIssue::LevelMismatch {
                        id: req.id,
                        expected,
                        found: req.level,
                    });
                }
            }
            None => {
                if is_on_cycle(req.id, &index) {
                    issues.push(IntegrityIssue::Cycle { id: req.id });
                }
            }
        }
    }

    // Sibling ordering
    let mut groups: BTreeMap<Option<RequirementId>, Vec<u32>> = BTreeMap::new();
    for req in requirements {
        groups.entry(req.parent_id).or_default().push(req.order_index);
    }
    for (parent_id, mut found) in groups {
        found.sort_unstable();
        let contiguous = found.iter().enumerate().all(|(i, o)| *o as usize == i);
        if !contiguous {
            issues.push(IntegrityIssue::OrderNotContiguous { parent_id, found });
        }
    }

    // Textual id uniqueness, only meaningful for rows that reach a root
    let mut by_text: BTreeMap<String, Vec<RequirementId>> = BTreeMap::new();
    for req in requirements {
        if let Some(path) = path_of(req, &index) {
            by_text
                .entry(format_textual_id(&path))
                .or_default()
                .push(req.id);
        }
    }
    for (textual_id, mut ids) in by_text {
        if ids.len() > 1 {
            ids.sort_unstable();
            issues.push(IntegrityIssue::DuplicateTextualId { textual_id, ids });
        }
    }

    ValidationReport {
        checked: requirements.len(),
        issues,
    }
}

/// Depth of a row below its root, `None` when its parent chain is broken
fn depth_of(
    id: RequirementId,
    index: &HashMap<RequirementId, &Requirement>,
    depths: &mut HashMap<RequirementId, Option<u32>>,
) -> Option<u32> {
    if let Some(known) = depths.get(&id) {
        return *known;
    }

    // Walk up until a root, an already classified row, or a broken link
    let mut chain: Vec<RequirementId> = Vec::new();
    let mut current = id;
    let top = loop {
        let Some(row) = index.get(&current) else {
            break None;
        };
        if chain.contains(&current) {
            break None;
        }
        chain.push(current);
        match row.parent_id {
            None => break Some(0),
            Some(parent_id) => {
                if let Some(known) = depths.get(&parent_id) {
                    break known.map(|d| d + 1);
                }
                current = parent_id;
            }
        }
    };

    let mut depth = top;
    for cur in chain.iter().rev() {
        depths.insert(*cur, depth);
        depth = depth.map(|d| d + 1);
    }
    depths.get(&id).copied().flatten()
}

fn is_on_cycle(id: RequirementId, index: &HashMap<RequirementId, &Requirement>) -> bool {
    let mut current = index.get(&id).and_then(|r| r.parent_id);
    for _ in 0..index.len() {
        match current {
            Some(cur) if cur == id => return true,
            Some(cur) => current = index.get(&cur).and_then(|r| r.parent_id),
            None => return false,
        }
    }
    false
}

fn path_of(req: &Requirement, index: &HashMap<RequirementId, &Requirement>) -> Option<Vec<u32>> {
    let mut path = vec![req.order_index];
    let mut current = req.parent_id;
    while let Some(parent_id) = current {
        if path.len() > index.len() {
            return None;
        }
        let parent = index.get(&parent_id)?;
        path.push(parent.order_index);
        current = parent.parent_id;
    }
    path.reverse();
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: RequirementId, parent_id: Option<RequirementId>, level: u32, order_index: u32) -> Requirement {
        Requirement {
            id,
            parent_id,
            level,
            order_index,
            behavior: String::new(),
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
    fn test_valid_hierarchy() {
        let report = validate(&[
            row(1, None, 0, 0),
            row(2, Some(1), 1, 0),
            row(3, Some(1), 1, 1),
            row(4, Some(3), 2, 0),
            row(5, None, 0, 1),
        ]);
        assert!(report.is_valid(), "{:?}", report.issues);
        assert_eq!(report.checked, 5);
    }

    #[test]
    fn test_detects_gap_and_duplicate() {
        let report = validate(&[row(1, None, 0, 0), row(2, None, 0, 2), row(3, None, 0, 2)]);
        assert!(report.issues.contains(&IntegrityIssue::OrderNotContiguous {
            parent_id: None,
            found: vec![0, 2, 2],
        }));
        assert!(report.issues.contains(&IntegrityIssue::DuplicateTextualId {
            textual_id: "R2".to_string(),
            ids: vec![2, 3],
        }));
    }

    #[test]
    fn test_detects_level_mismatch() {
        let report = validate(&[row(1, None, 0, 0), row(2, Some(1), 3, 0)]);
        assert_eq!(
            report.issues,
            vec![IntegrityIssue::LevelMismatch {
                id: 2,
                expected: 1,
                found: 3
            }]
        );
    }

    #[test]
    fn test_detects_dangling_parent_and_cycle() {
        let report = validate(&[
            row(1, Some(9), 1, 0),
            row(2, Some(3), 1, 0),
            row(3, Some(2), 1, 0),
        ]);
        assert!(report.issues.contains(&IntegrityIssue::DanglingParent {
            id: 1,
            parent_id: 9
        }));
        assert!(report.issues.contains(&IntegrityIssue::Cycle { id: 2 }));
        assert!(report.issues.contains(&IntegrityIssue::Cycle { id: 3 }));
        assert!(!report.issues.contains(&IntegrityIssue::Cycle { id: 1 }));
    }
}
