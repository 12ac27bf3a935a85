use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned surrogate key of a requirement row
pub type RequirementId = i64;

/// Store-assigned surrogate key of a vocabulary row (function, variable, component, mode)
pub type VocabularyId = i64;

/// Level given to requirements without a parent
pub const ROOT_LEVEL: u32 = 0;

/// Prefix of the root segment of every textual id
pub const TEXTUAL_ID_PREFIX: &str = "R";

/// Separator between the segments of a textual id
pub const TEXTUAL_ID_SEPARATOR: &str = "-";

/// A single hierarchical system requirement as stored in the entity store
///
/// The structural fields (`parent_id`, `level`, `order_index`) are owned by the
/// hierarchy engine; everything else is descriptive payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Requirement {
    /// Surrogate key, immutable once created
    pub id: RequirementId,

    /// Parent requirement, `None` for roots
    pub parent_id: Option<RequirementId>,

    /// Depth from the root (roots have `ROOT_LEVEL`)
    pub level: u32,

    /// Zero-based position among the siblings sharing `parent_id`
    pub order_index: u32,

    /// What the system shall do
    pub behavior: String,

    /// Triggering condition for the behavior
    #[serde(default)]
    pub condition: String,

    /// Rationale for the requirement
    #[serde(default)]
    pub justification: String,

    /// Latency reference, e.g. "L-100ms"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<String>,

    /// Tolerance reference, e.g. "T-5%"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_id: Option<VocabularyId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_id: Option<VocabularyId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<VocabularyId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode_id: Option<VocabularyId>,
}

impl Requirement {
    /// Returns true if the requirement has no parent
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Returns the descriptive payload of this requirement
    pub fn draft(&self) -> RequirementDraft {
        RequirementDraft {
            behavior: self.behavior.clone(),
            condition: self.condition.clone(),
            justification: self.justification.clone(),
            latency: self.latency.clone(),
            tolerance: self.tolerance.clone(),
            function_id: self.function_id,
            variable_id: self.variable_id,
            component_id: self.component_id,
            mode_id: self.mode_id,
        }
    }

    /// Replaces the descriptive payload, leaving the structural fields untouched
    pub fn apply_draft(&mut self, draft: RequirementDraft) {
        self.behavior = draft.behavior;
        self.condition = draft.condition;
        self.justification = draft.justification;
        self.latency = draft.latency;
        self.tolerance = draft.tolerance;
        self.function_id = draft.function_id;
        self.variable_id = draft.variable_id;
        self.component_id = draft.component_id;
        self.mode_id = draft.mode_id;
    }
}

/// Descriptive payload of a requirement, opaque to the hierarchy engine
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequirementDraft {
    pub behavior: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub latency: Option<String>,
    #[serde(default)]
    pub tolerance: Option<String>,
    #[serde(default)]
    pub function_id: Option<VocabularyId>,
    #[serde(default)]
    pub variable_id: Option<VocabularyId>,
    #[serde(default)]
    pub component_id: Option<VocabularyId>,
    #[serde(default)]
    pub mode_id: Option<VocabularyId>,
}

impl RequirementDraft {
    /// Creates a draft with only the behavior text set
    pub fn new(behavior: impl Into<String>) -> Self {
        Self {
            behavior: behavior.into(),
            ..Default::default()
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = condition.into();
        self
    }

    pub fn with_component(mut self, component_id: VocabularyId) -> Self {
        self.component_id = Some(component_id);
        self
    }

    pub fn with_mode(mut self, mode_id: VocabularyId) -> Self {
        self.mode_id = Some(mode_id);
        self
    }

    pub fn with_function(mut self, function_id: VocabularyId) -> Self {
        self.function_id = Some(function_id);
        self
    }
}

/// A requirement row about to be inserted; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequirement {
    pub parent_id: Option<RequirementId>,
    pub level: u32,
    pub order_index: u32,
    pub draft: RequirementDraft,
}

/// Kinds of vocabulary tables kept next to the requirements
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VocabularyKind {
    Function,
    Variable,
    Component,
    Mode,
}

impl VocabularyKind {
    pub const ALL: [VocabularyKind; 4] = [
        VocabularyKind::Function,
        VocabularyKind::Variable,
        VocabularyKind::Component,
        VocabularyKind::Mode,
    ];

    /// Name of the backing table
    pub fn table(&self) -> &'static str {
        match self {
            VocabularyKind::Function => "functions",
            VocabularyKind::Variable => "variables",
            VocabularyKind::Component => "components",
            VocabularyKind::Mode => "modes",
        }
    }

    /// Parse a vocabulary kind from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "function" | "functions" => Some(VocabularyKind::Function),
            "variable" | "variables" => Some(VocabularyKind::Variable),
            "component" | "components" => Some(VocabularyKind::Component),
            "mode" | "modes" => Some(VocabularyKind::Mode),
            _ => None,
        }
    }
}

impl fmt::Display for VocabularyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VocabularyKind::Function => write!(f, "function"),
            VocabularyKind::Variable => write!(f, "variable"),
            VocabularyKind::Component => write!(f, "component"),
            VocabularyKind::Mode => write!(f, "mode"),
        }
    }
}

/// A named vocabulary entry (function, variable, component or mode)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VocabularyEntry {
    pub id: VocabularyId,
    pub name: String,
}

/// Association allowing a component to appear in requirements of a mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModeComponent {
    pub mode_id: VocabularyId,
    pub component_id: VocabularyId,
}

/// Full contents of an entity store, used for import/export and batch rollback
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub functions: Vec<VocabularyEntry>,
    pub variables: Vec<VocabularyEntry>,
    pub components: Vec<VocabularyEntry>,
    pub modes: Vec<VocabularyEntry>,
    pub mode_components: Vec<ModeComponent>,
    pub requirements: Vec<Requirement>,
}

impl StoreSnapshot {
    /// Vocabulary entries of the given kind
    pub fn vocabulary(&self, kind: VocabularyKind) -> &[VocabularyEntry] {
        match kind {
            VocabularyKind::Function => &self.functions,
            VocabularyKind::Variable => &self.variables,
            VocabularyKind::Component => &self.components,
            VocabularyKind::Mode => &self.modes,
        }
    }

    /// Looks up the name of a vocabulary entry by id
    pub fn vocabulary_name(&self, kind: VocabularyKind, id: Option<VocabularyId>) -> Option<&str> {
        let id = id?;
        self.vocabulary(kind)
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_roundtrip_through_requirement() {
        let draft = RequirementDraft::new("Open valve")
            .with_condition("pressure > 5 bar")
            .with_component(3)
            .with_mode(1);

        let mut req = Requirement {
            id: 7,
            parent_id: Some(2),
            level: 1,
            order_index: 4,
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
        req.apply_draft(draft.clone());

        assert_eq!(req.draft(), draft);
        assert_eq!(req.parent_id, Some(2));
        assert_eq!(req.order_index, 4);
        assert!(!req.is_root());
    }

    #[test]
    fn test_vocabulary_kind_parse() {
        assert_eq!(VocabularyKind::parse("Functions"), Some(VocabularyKind::Function));
        assert_eq!(VocabularyKind::parse("mode"), Some(VocabularyKind::Mode));
        assert_eq!(VocabularyKind::parse("widget"), None);
    }

    #[test]
    fn test_snapshot_vocabulary_name() {
        let mut snapshot = StoreSnapshot::default();
        snapshot.components.push(VocabularyEntry {
            id: 4,
            name: "Pump".to_string(),
        });

        assert_eq!(
            snapshot.vocabulary_name(VocabularyKind::Component, Some(4)),
            Some("Pump")
        );
        assert_eq!(snapshot.vocabulary_name(VocabularyKind::Component, Some(5)), None);
        assert_eq!(snapshot.vocabulary_name(VocabularyKind::Component, None), None);
    }
}
