//! Hierarchy engine for requirement trees
//!
//! Rows in the entity store only carry `parent_id`, `level` and `order_index`.
//! This module derives everything else from them (textual ids, the forest)
//! and is the only place that mutates them.

mod engine;
mod forest;
mod textual_id;
mod validate;

pub use engine::{DeleteReport, HierarchyEngine, MoveKind};
pub use forest::{build_forest, Forest, ForestNode, Preorder};
pub use textual_id::{
    format_textual_id, parse_textual_id, textual_id, textual_id_or_fallback, TextualIdResolver,
};
pub use validate::{validate, IntegrityIssue, ValidationReport};
