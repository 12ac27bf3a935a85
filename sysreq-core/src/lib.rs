pub mod db;
pub mod error;
pub mod export;
pub mod hierarchy;
pub mod models;
pub mod project;
pub mod settings;
pub mod vocabulary;

// Re-export commonly used types
pub use db::{
    create_backend, stats, with_batch, BackendType, EntityStore, MemoryBackend, SqliteBackend,
    StoreStats,
};
pub use error::{HierarchyError, HierarchyResult, StoreError, StoreResult};
pub use export::{export_to_file, render_export, ExportFormat, ExportRow, EXPORT_COLUMNS};
pub use hierarchy::{
    build_forest, textual_id, validate, DeleteReport, Forest, ForestNode, HierarchyEngine,
    IntegrityIssue, MoveKind, TextualIdResolver, ValidationReport,
};
pub use models::{
    ModeComponent, NewRequirement, Requirement, RequirementDraft, RequirementId, StoreSnapshot,
    VocabularyEntry, VocabularyId, VocabularyKind, ROOT_LEVEL, TEXTUAL_ID_PREFIX,
    TEXTUAL_ID_SEPARATOR,
};
pub use project::{
    export_project, import_project, read_project_file, write_project_file, ImportReport,
    ProjectError, ProjectFile, RequirementRecord,
};
pub use settings::{determine_database_path, get_settings_path, Settings};
pub use vocabulary::{check_component_allowed, Configuration, ModeConfig};
