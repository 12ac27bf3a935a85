//! SQLite database storage backend
//!
//! This backend stores requirements and their vocabulary in a SQLite
//! database file. Foreign keys are enabled, so the database itself rejects
//! dangling parents and deletes that would orphan children.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{StoreError, StoreResult};
use crate::models::{
    ModeComponent, NewRequirement, Requirement, RequirementDraft, RequirementId, StoreSnapshot,
    VocabularyEntry, VocabularyId, VocabularyKind,
};

use super::traits::{BackendType, EntityStore};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

const REQUIREMENT_COLUMNS: &str = "id, parent_id, level, order_index, behavior, condition,
     justification, latency, tolerance, function_id, variable_id, component_id, mode_id";

/// SQLite backend implementation
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens (or creates) a SQLite database file
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        let backend = Self {
            conn: Mutex::new(conn),
        };

        backend.init_schema()?;
        Ok(backend)
    }

    /// Opens a private in-memory SQLite database
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let backend = Self {
            conn: Mutex::new(conn),
        };

        backend.init_schema()?;
        Ok(backend)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn();

        // Check current schema version
        let current_version: i32 = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        if current_version == 0 {
            log::debug!("Creating requirements schema v{}", SCHEMA_VERSION);
            conn.execute_batch(include_str!("schema.sql"))?;
        } else if current_version != SCHEMA_VERSION {
            return Err(StoreError::SchemaVersion {
                found: current_version,
                expected: SCHEMA_VERSION,
            });
        }

        Ok(())
    }

    /// Maps a row selected with `REQUIREMENT_COLUMNS`
    fn row_to_requirement(row: &Row<'_>) -> rusqlite::Result<Requirement> {
        Ok(Requirement {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            level: row.get(2)?,
            order_index: row.get(3)?,
            behavior: row.get(4)?,
            condition: row.get(5)?,
            justification: row.get(6)?,
            latency: row.get(7)?,
            tolerance: row.get(8)?,
            function_id: row.get(9)?,
            variable_id: row.get(10)?,
            component_id: row.get(11)?,
            mode_id: row.get(12)?,
        })
    }

    fn query_requirements(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<Requirement>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_requirement)?;
        let mut requirements = Vec::new();
        for row in rows {
            requirements.push(row?);
        }
        Ok(requirements)
    }

    fn check_affected(rows_affected: usize, id: RequirementId) -> StoreResult<()> {
        if rows_affected == 0 {
            Err(StoreError::MissingRow(id))
        } else {
            Ok(())
        }
    }

    fn vocabulary_exists(
        conn: &Connection,
        kind: VocabularyKind,
        name: &str,
        except: Option<VocabularyId>,
    ) -> StoreResult<bool> {
        let sql = format!(
            "SELECT id FROM {} WHERE name = ?1 AND id != ?2",
            kind.table()
        );
        let found: Option<VocabularyId> = conn
            .query_row(&sql, params![name, except.unwrap_or(0)], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// Save a requirement row, keeping its id; the parent link is written separately
    fn save_requirement_unlinked(conn: &Connection, req: &Requirement) -> StoreResult<()> {
        conn.execute(
            "INSERT INTO requirements
             (id, parent_id, level, order_index, behavior, condition, justification,
              latency, tolerance, function_id, variable_id, component_id, mode_id)
             VALUES (?1, NULL, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                req.id,
                req.level,
                req.order_index,
                req.behavior,
                req.condition,
                req.justification,
                req.latency,
                req.tolerance,
                req.function_id,
                req.variable_id,
                req.component_id,
                req.mode_id,
            ],
        )?;
        Ok(())
    }
}

impl EntityStore for SqliteBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Sqlite
    }

    fn all_requirements(&self) -> StoreResult<Vec<Requirement>> {
        let conn = self.conn();
        Self::query_requirements(
            &conn,
            &format!("SELECT {} FROM requirements ORDER BY id", REQUIREMENT_COLUMNS),
            [],
        )
    }

    fn get_requirement(&self, id: RequirementId) -> StoreResult<Option<Requirement>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {} FROM requirements WHERE id = ?1", REQUIREMENT_COLUMNS),
            [id],
            Self::row_to_requirement,
        )
        .optional()
        .map_err(StoreError::from)
    }

    fn children_of(&self, parent: Option<RequirementId>) -> StoreResult<Vec<Requirement>> {
        let conn = self.conn();
        Self::query_requirements(
            &conn,
            &format!(
                "SELECT {} FROM requirements WHERE parent_id IS ?1 ORDER BY order_index, id",
                REQUIREMENT_COLUMNS
            ),
            [parent],
        )
    }

    fn count_children(&self, parent: Option<RequirementId>) -> StoreResult<u32> {
        let conn = self.conn();
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM requirements WHERE parent_id IS ?1",
            [parent],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn insert_requirement(&self, requirement: &NewRequirement) -> StoreResult<RequirementId> {
        let conn = self.conn();
        let draft = &requirement.draft;
        conn.execute(
            "INSERT INTO requirements
             (parent_id, level, order_index, behavior, condition, justification,
              latency, tolerance, function_id, variable_id, component_id, mode_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                requirement.parent_id,
                requirement.level,
                requirement.order_index,
                draft.behavior,
                draft.condition,
                draft.justification,
                draft.latency,
                draft.tolerance,
                draft.function_id,
                draft.variable_id,
                draft.component_id,
                draft.mode_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_content(&self, id: RequirementId, draft: &RequirementDraft) -> StoreResult<()> {
        let conn = self.conn();
        let rows_affected = conn.execute(
            "UPDATE requirements SET behavior = ?2, condition = ?3, justification = ?4,
                    latency = ?5, tolerance = ?6, function_id = ?7, variable_id = ?8,
                    component_id = ?9, mode_id = ?10
             WHERE id = ?1",
            params![
                id,
                draft.behavior,
                draft.condition,
                draft.justification,
                draft.latency,
                draft.tolerance,
                draft.function_id,
                draft.variable_id,
                draft.component_id,
                draft.mode_id,
            ],
        )?;
        Self::check_affected(rows_affected, id)
    }

    fn update_order_index(&self, id: RequirementId, order_index: u32) -> StoreResult<()> {
        let conn = self.conn();
        let rows_affected = conn.execute(
            "UPDATE requirements SET order_index = ?2 WHERE id = ?1",
            params![id, order_index],
        )?;
        Self::check_affected(rows_affected, id)
    }

    fn update_parent_and_level(
        &self,
        id: RequirementId,
        parent_id: Option<RequirementId>,
        level: u32,
    ) -> StoreResult<()> {
        let conn = self.conn();
        let rows_affected = conn.execute(
            "UPDATE requirements SET parent_id = ?2, level = ?3 WHERE id = ?1",
            params![id, parent_id, level],
        )?;
        Self::check_affected(rows_affected, id)
    }

    fn update_level(&self, id: RequirementId, level: u32) -> StoreResult<()> {
        let conn = self.conn();
        let rows_affected = conn.execute(
            "UPDATE requirements SET level = ?2 WHERE id = ?1",
            params![id, level],
        )?;
        Self::check_affected(rows_affected, id)
    }

    fn delete_requirement(&self, id: RequirementId) -> StoreResult<()> {
        let conn = self.conn();
        let rows_affected = conn.execute("DELETE FROM requirements WHERE id = ?1", [id])?;
        Self::check_affected(rows_affected, id)
    }

    fn add_vocabulary(&self, kind: VocabularyKind, name: &str) -> StoreResult<VocabularyId> {
        let conn = self.conn();
        if Self::vocabulary_exists(&conn, kind, name, None)? {
            return Err(StoreError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
        conn.execute(
            &format!("INSERT INTO {} (name) VALUES (?1)", kind.table()),
            [name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn list_vocabulary(&self, kind: VocabularyKind) -> StoreResult<Vec<VocabularyEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT id, name FROM {} ORDER BY id", kind.table()))?;
        let rows = stmt.query_map([], |row| {
            Ok(VocabularyEntry {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn rename_vocabulary(
        &self,
        kind: VocabularyKind,
        id: VocabularyId,
        name: &str,
    ) -> StoreResult<()> {
        let conn = self.conn();
        if Self::vocabulary_exists(&conn, kind, name, Some(id))? {
            return Err(StoreError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
        let rows_affected = conn.execute(
            &format!("UPDATE {} SET name = ?2 WHERE id = ?1", kind.table()),
            params![id, name],
        )?;
        if rows_affected == 0 {
            return Err(StoreError::UnknownVocabulary { kind, id });
        }
        Ok(())
    }

    fn remove_vocabulary(&self, kind: VocabularyKind, id: VocabularyId) -> StoreResult<()> {
        let conn = self.conn();
        let rows_affected =
            conn.execute(&format!("DELETE FROM {} WHERE id = ?1", kind.table()), [id])?;
        if rows_affected == 0 {
            return Err(StoreError::UnknownVocabulary { kind, id });
        }
        Ok(())
    }

    fn allow_component(&self, mode_id: VocabularyId, component_id: VocabularyId) -> StoreResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO mode_components (mode_id, component_id) VALUES (?1, ?2)",
            params![mode_id, component_id],
        )?;
        Ok(())
    }

    fn disallow_component(
        &self,
        mode_id: VocabularyId,
        component_id: VocabularyId,
    ) -> StoreResult<()> {
        let conn = self.conn();
        conn.execute(
            "DELETE FROM mode_components WHERE mode_id = ?1 AND component_id = ?2",
            params![mode_id, component_id],
        )?;
        Ok(())
    }

    fn mode_components(&self) -> StoreResult<Vec<ModeComponent>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT mode_id, component_id FROM mode_components ORDER BY mode_id, component_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ModeComponent {
                mode_id: row.get(0)?,
                component_id: row.get(1)?,
            })
        })?;

        let mut associations = Vec::new();
        for row in rows {
            associations.push(row?);
        }
        Ok(associations)
    }

    fn replace_all(&self, snapshot: &StoreSnapshot) -> StoreResult<()> {
        let conn = self.conn();

        // Clear existing data, children of the vocabulary first
        conn.execute("DELETE FROM requirements", [])?;
        conn.execute("DELETE FROM mode_components", [])?;
        for kind in VocabularyKind::ALL {
            conn.execute(&format!("DELETE FROM {}", kind.table()), [])?;
        }
        conn.execute("DELETE FROM sqlite_sequence", [])?;

        for kind in VocabularyKind::ALL {
            let sql = format!("INSERT INTO {} (id, name) VALUES (?1, ?2)", kind.table());
            for entry in snapshot.vocabulary(kind) {
                conn.execute(&sql, params![entry.id, entry.name])?;
            }
        }

        for mc in &snapshot.mode_components {
            conn.execute(
                "INSERT INTO mode_components (mode_id, component_id) VALUES (?1, ?2)",
                params![mc.mode_id, mc.component_id],
            )?;
        }

        // Rows go in unlinked so insertion order does not matter for the parent FK
        for req in &snapshot.requirements {
            Self::save_requirement_unlinked(&conn, req)?;
        }
        for req in snapshot.requirements.iter().filter(|r| r.parent_id.is_some()) {
            conn.execute(
                "UPDATE requirements SET parent_id = ?2 WHERE id = ?1",
                params![req.id, req.parent_id],
            )?;
        }

        Ok(())
    }

    fn begin_batch(&self) -> StoreResult<()> {
        self.conn().execute_batch("BEGIN IMMEDIATE TRANSACTION")?;
        Ok(())
    }

    fn commit_batch(&self) -> StoreResult<()> {
        self.conn().execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback_batch(&self) -> StoreResult<()> {
        let conn = self.conn();
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}
