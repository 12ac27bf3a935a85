//! JSON project files
//!
//! A project file carries the whole store: the vocabulary by name and every
//! requirement row with its structural fields. Importing one replaces all
//! current state in a single batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::db::{with_batch, EntityStore};
use crate::error::{HierarchyError, StoreError};
use crate::hierarchy::build_forest;
use crate::models::{Requirement, RequirementId, StoreSnapshot, VocabularyKind};
use crate::vocabulary::Configuration;

/// Version written to new project files
pub const PROJECT_FORMAT_VERSION: u32 = 1;

/// Errors raised while reading, writing or importing project files
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid project file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Project file format {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Requirement {requirement} references unknown {kind} '{name}'")]
    UnknownVocabulary {
        requirement: RequirementId,
        kind: VocabularyKind,
        name: String,
    },

    #[error("Mode configuration references undeclared name '{0}'")]
    UnknownModeComponent(String),

    #[error("Requirement id {0} appears more than once")]
    DuplicateRequirementId(RequirementId),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A requirement row as written to a project file
///
/// Vocabulary references are stored by name so files stay readable and
/// survive renumbering of the vocabulary tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequirementRecord {
    pub id: RequirementId,
    #[serde(default)]
    pub parent_id: Option<RequirementId>,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub order_index: u32,
    pub behavior: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub justification: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Id counters at export time
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectCounters {
    /// Highest requirement id in use
    pub last_requirement_id: RequirementId,
}

/// Summary counts written alongside the data
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectSummary {
    pub requirement_count: usize,
    pub root_count: usize,
    pub max_depth: u32,
    pub function_count: usize,
    pub variable_count: usize,
    pub component_count: usize,
    pub mode_count: usize,
}

/// Top-level document of a project file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectFile {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub configuration: Configuration,
    #[serde(default)]
    pub requirements: Vec<RequirementRecord>,
    #[serde(default)]
    pub counters: ProjectCounters,
    #[serde(default)]
    pub summary: ProjectSummary,
}

/// What an import changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub requirements: usize,
    pub vocabulary: usize,
    /// Rows whose `order_index` or `level` had to be repaired
    pub repaired: usize,
}

/// Serializes the current contents of a store
pub fn export_project<S: EntityStore + ?Sized>(store: &S) -> Result<ProjectFile, ProjectError> {
    let snapshot = store.snapshot()?;
    let name_of = |kind: VocabularyKind, id: Option<i64>| {
        snapshot.vocabulary_name(kind, id).map(str::to_string)
    };

    let requirements: Vec<RequirementRecord> = snapshot
        .requirements
        .iter()
        .map(|r| RequirementRecord {
            id: r.id,
            parent_id: r.parent_id,
            level: r.level,
            order_index: r.order_index,
            behavior: r.behavior.clone(),
            condition: r.condition.clone(),
            justification: r.justification.clone(),
            latency: r.latency.clone(),
            tolerance: r.tolerance.clone(),
            function: name_of(VocabularyKind::Function, r.function_id),
            variable: name_of(VocabularyKind::Variable, r.variable_id),
            component: name_of(VocabularyKind::Component, r.component_id),
            mode: name_of(VocabularyKind::Mode, r.mode_id),
        })
        .collect();

    let summary = ProjectSummary {
        requirement_count: snapshot.requirements.len(),
        root_count: snapshot.requirements.iter().filter(|r| r.is_root()).count(),
        max_depth: snapshot.requirements.iter().map(|r| r.level).max().unwrap_or(0),
        function_count: snapshot.functions.len(),
        variable_count: snapshot.variables.len(),
        component_count: snapshot.components.len(),
        mode_count: snapshot.modes.len(),
    };

    Ok(ProjectFile {
        format_version: PROJECT_FORMAT_VERSION,
        exported_at: Utc::now(),
        configuration: Configuration::from_snapshot(&snapshot),
        counters: ProjectCounters {
            last_requirement_id: snapshot.requirements.iter().map(|r| r.id).max().unwrap_or(0),
        },
        requirements,
        summary,
    })
}

/// Converts a project file into store rows, rejecting anything that cannot
/// be imported as-is
///
/// Ordering gaps and stale levels are repaired; dangling parents, cycles and
/// unknown vocabulary names are errors.
pub fn project_to_snapshot(project: &ProjectFile) -> Result<(StoreSnapshot, usize), ProjectError> {
    if project.format_version > PROJECT_FORMAT_VERSION {
        return Err(ProjectError::UnsupportedVersion {
            found: project.format_version,
            supported: PROJECT_FORMAT_VERSION,
        });
    }

    let tables = project
        .configuration
        .to_tables()
        .map_err(ProjectError::UnknownModeComponent)?;

    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(project.requirements.len());
    for record in &project.requirements {
        if !seen.insert(record.id) {
            return Err(ProjectError::DuplicateRequirementId(record.id));
        }

        let lookup = |kind: VocabularyKind, name: &Option<String>| match name {
            None => Ok(None),
            Some(name) => tables
                .id_of(kind, name)
                .map(Some)
                .ok_or_else(|| ProjectError::UnknownVocabulary {
                    requirement: record.id,
                    kind,
                    name: name.clone(),
                }),
        };

        rows.push(Requirement {
            id: record.id,
            parent_id: record.parent_id,
            level: record.level,
            order_index: record.order_index,
            behavior: record.behavior.clone(),
            condition: record.condition.clone(),
            justification: record.justification.clone(),
            latency: record.latency.clone(),
            tolerance: record.tolerance.clone(),
            function_id: lookup(VocabularyKind::Function, &record.function)?,
            variable_id: lookup(VocabularyKind::Variable, &record.variable)?,
            component_id: lookup(VocabularyKind::Component, &record.component)?,
            mode_id: lookup(VocabularyKind::Mode, &record.mode)?,
        });
    }

    let forest = build_forest(rows.clone())?;
    let mut requirements = forest.renumbered();
    let original: HashMap<RequirementId, (u32, u32)> = rows
        .iter()
        .map(|r| (r.id, (r.level, r.order_index)))
        .collect();
    let repaired = requirements
        .iter()
        .filter(|fixed| original.get(&fixed.id) != Some(&(fixed.level, fixed.order_index)))
        .count();
    requirements.sort_by_key(|r| r.id);

    let snapshot = StoreSnapshot {
        functions: tables.functions,
        variables: tables.variables,
        components: tables.components,
        modes: tables.modes,
        mode_components: tables.mode_components,
        requirements,
    };
    Ok((snapshot, repaired))
}

/// Replaces the whole store with the contents of a project file
///
/// Nothing is written unless the file converts cleanly; the replacement
/// itself runs in one batch.
pub fn import_project<S: EntityStore + ?Sized>(
    store: &S,
    project: &ProjectFile,
) -> Result<ImportReport, ProjectError> {
    let (snapshot, repaired) = project_to_snapshot(project)?;

    with_batch(store, || Ok::<_, ProjectError>(store.replace_all(&snapshot)?))?;

    if repaired > 0 {
        log::warn!("Repaired ordering of {} imported requirements", repaired);
    }
    log::info!(
        "Imported {} requirements exported at {}",
        snapshot.requirements.len(),
        project.exported_at
    );

    Ok(ImportReport {
        requirements: snapshot.requirements.len(),
        vocabulary: VocabularyKind::ALL
            .iter()
            .map(|kind| snapshot.vocabulary(*kind).len())
            .sum(),
        repaired,
    })
}

/// Reads a project file from disk
pub fn read_project_file<P: AsRef<Path>>(path: P) -> Result<ProjectFile, ProjectError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Writes a project file to disk as pretty-printed JSON
pub fn write_project_file<P: AsRef<Path>>(path: P, project: &ProjectFile) -> Result<(), ProjectError> {
    let json = serde_json::to_string_pretty(project)?;

    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, json)?;
    Ok(())
}
