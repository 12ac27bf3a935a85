//! Functions, variables, components and modes referenced by requirements
//!
//! The store keeps the vocabulary as id/name rows. [`Configuration`] is the
//! name-level view used by project files and the CLI.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::db::EntityStore;
use crate::error::{HierarchyError, HierarchyResult};
use crate::models::{ModeComponent, RequirementDraft, StoreSnapshot, VocabularyEntry, VocabularyKind};

/// A mode together with the components its requirements may reference
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeConfig {
    pub name: String,
    #[serde(default)]
    pub allowed_components: Vec<String>,
}

/// Name-level vocabulary of a project
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Configuration {
    #[serde(default)]
    pub functions: Vec<String>,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub modes: Vec<ModeConfig>,
}

/// Vocabulary tables produced from a [`Configuration`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabularyTables {
    pub functions: Vec<VocabularyEntry>,
    pub variables: Vec<VocabularyEntry>,
    pub components: Vec<VocabularyEntry>,
    pub modes: Vec<VocabularyEntry>,
    pub mode_components: Vec<ModeComponent>,
}

impl VocabularyTables {
    /// Finds the id assigned to a name
    pub fn id_of(&self, kind: VocabularyKind, name: &str) -> Option<i64> {
        let entries = match kind {
            VocabularyKind::Function => &self.functions,
            VocabularyKind::Variable => &self.variables,
            VocabularyKind::Component => &self.components,
            VocabularyKind::Mode => &self.modes,
        };
        entries.iter().find(|e| e.name == name).map(|e| e.id)
    }
}

impl Configuration {
    /// Builds the name-level view of a store snapshot
    pub fn from_snapshot(snapshot: &StoreSnapshot) -> Self {
        let names = |entries: &[VocabularyEntry]| -> Vec<String> {
            entries.iter().map(|e| e.name.clone()).collect()
        };

        let modes = snapshot
            .modes
            .iter()
            .map(|mode| ModeConfig {
                name: mode.name.clone(),
                allowed_components: snapshot
                    .mode_components
                    .iter()
                    .filter(|mc| mc.mode_id == mode.id)
                    .filter_map(|mc| {
                        snapshot.vocabulary_name(VocabularyKind::Component, Some(mc.component_id))
                    })
                    .map(str::to_string)
                    .collect(),
            })
            .collect();

        Self {
            functions: names(&snapshot.functions),
            variables: names(&snapshot.variables),
            components: names(&snapshot.components),
            modes,
        }
    }

    /// Assigns ids `1..=n` per table, in declaration order
    ///
    /// Duplicate names are collapsed; a mode listing a component that is not
    /// declared is reported by name.
    pub fn to_tables(&self) -> Result<VocabularyTables, String> {
        fn entries<'a>(names: impl Iterator<Item = &'a String>) -> Vec<VocabularyEntry> {
            let mut seen = HashSet::new();
            names
                .filter(|n| seen.insert(n.as_str()))
                .enumerate()
                .map(|(i, name)| VocabularyEntry {
                    id: i as i64 + 1,
                    name: name.clone(),
                })
                .collect()
        }

        let mut tables = VocabularyTables {
            functions: entries(self.functions.iter()),
            variables: entries(self.variables.iter()),
            components: entries(self.components.iter()),
            modes: entries(self.modes.iter().map(|m| &m.name)),
            mode_components: Vec::new(),
        };

        let mut associations = BTreeSet::new();
        for mode in &self.modes {
            let mode_id = tables
                .id_of(VocabularyKind::Mode, &mode.name)
                .ok_or_else(|| mode.name.clone())?;
            for component in &mode.allowed_components {
                let component_id = tables
                    .id_of(VocabularyKind::Component, component)
                    .ok_or_else(|| component.clone())?;
                associations.insert(ModeComponent {
                    mode_id,
                    component_id,
                });
            }
        }
        tables.mode_components = associations.into_iter().collect();
        Ok(tables)
    }

    /// Total number of vocabulary names
    pub fn len(&self) -> usize {
        self.functions.len() + self.variables.len() + self.components.len() + self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rejects a draft whose component is not allowed in its mode
///
/// A mode without any association allows every component.
pub fn check_component_allowed<S: EntityStore + ?Sized>(
    store: &S,
    draft: &RequirementDraft,
) -> HierarchyResult<()> {
    let (Some(mode_id), Some(component_id)) = (draft.mode_id, draft.component_id) else {
        return Ok(());
    };

    let allowed: Vec<i64> = store
        .mode_components()?
        .into_iter()
        .filter(|mc| mc.mode_id == mode_id)
        .map(|mc| mc.component_id)
        .collect();

    if allowed.is_empty() || allowed.contains(&component_id) {
        Ok(())
    } else {
        Err(HierarchyError::ComponentNotAllowed {
            component_id,
            mode_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryBackend;

    fn sample() -> Configuration {
        Configuration {
            functions: vec!["Heat".to_string(), "Cool".to_string()],
            variables: vec!["Temperature".to_string()],
            components: vec!["Pump".to_string(), "Valve".to_string(), "Pump".to_string()],
            modes: vec![
                ModeConfig {
                    name: "Startup".to_string(),
                    allowed_components: vec!["Valve".to_string()],
                },
                ModeConfig {
                    name: "Nominal".to_string(),
                    allowed_components: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn test_to_tables_assigns_ids_in_order() {
        let tables = sample().to_tables().unwrap();
        assert_eq!(tables.components.len(), 2);
        assert_eq!(tables.id_of(VocabularyKind::Component, "Valve"), Some(2));
        assert_eq!(tables.id_of(VocabularyKind::Mode, "Nominal"), Some(2));
        assert_eq!(
            tables.mode_components,
            vec![ModeComponent {
                mode_id: 1,
                component_id: 2
            }]
        );
    }

    #[test]
    fn test_to_tables_rejects_unknown_component() {
        let mut config = sample();
        config.modes[0].allowed_components.push("Heater".to_string());
        assert_eq!(config.to_tables().unwrap_err(), "Heater");
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let tables = sample().to_tables().unwrap();
        let snapshot = StoreSnapshot {
            functions: tables.functions,
            variables: tables.variables,
            components: tables.components,
            modes: tables.modes,
            mode_components: tables.mode_components,
            requirements: Vec::new(),
        };

        let config = Configuration::from_snapshot(&snapshot);
        assert_eq!(config.components, vec!["Pump", "Valve"]);
        assert_eq!(config.modes[0].allowed_components, vec!["Valve"]);
        assert!(config.modes[1].allowed_components.is_empty());
    }

    #[test]
    fn test_check_component_allowed() {
        let store = MemoryBackend::new();
        let pump = store.add_vocabulary(VocabularyKind::Component, "Pump").unwrap();
        let valve = store.add_vocabulary(VocabularyKind::Component, "Valve").unwrap();
        let startup = store.add_vocabulary(VocabularyKind::Mode, "Startup").unwrap();
        let nominal = store.add_vocabulary(VocabularyKind::Mode, "Nominal").unwrap();
        store.allow_component(startup, valve).unwrap();

        let ok = RequirementDraft::new("Open").with_mode(startup).with_component(valve);
        assert!(check_component_allowed(&store, &ok).is_ok());

        let rejected = RequirementDraft::new("Run").with_mode(startup).with_component(pump);
        assert!(matches!(
            check_component_allowed(&store, &rejected),
            Err(HierarchyError::ComponentNotAllowed { .. })
        ));

        let unrestricted = RequirementDraft::new("Run").with_mode(nominal).with_component(pump);
        assert!(check_component_allowed(&store, &unrestricted).is_ok());
    }
}
