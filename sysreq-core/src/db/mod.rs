//! Entity store layer for system requirements
//!
//! This module provides a trait-based abstraction over the relational store
//! that persists requirements and their vocabulary, so the hierarchy engine
//! works the same against SQLite files and volatile in-memory tables.

mod memory_backend;
mod sqlite_backend;
mod traits;

pub use memory_backend::MemoryBackend;
pub use sqlite_backend::SqliteBackend;
pub use traits::{stats, with_batch, BackendType, EntityStore, StoreStats};

use std::path::Path;

use crate::error::StoreResult;

/// Path understood as "no file, keep everything in memory"
pub const MEMORY_PATH: &str = ":memory:";

/// Creates a store backend based on the path or explicit type
pub fn create_backend(
    path: &Path,
    backend_type: Option<BackendType>,
) -> StoreResult<Box<dyn EntityStore>> {
    let bt = backend_type.unwrap_or_else(|| {
        if path.as_os_str() == MEMORY_PATH {
            BackendType::Memory
        } else {
            BackendType::Sqlite
        }
    });

    log::debug!("Opening {} store at {}", bt, path.display());
    match bt {
        BackendType::Memory => Ok(Box::new(MemoryBackend::new())),
        BackendType::Sqlite => Ok(Box::new(SqliteBackend::new(path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_backend_infers_type() {
        let memory = create_backend(Path::new(MEMORY_PATH), None).unwrap();
        assert_eq!(memory.backend_type(), BackendType::Memory);

        let dir = TempDir::new().unwrap();
        let sqlite = create_backend(&dir.path().join("reqs.db"), None).unwrap();
        assert_eq!(sqlite.backend_type(), BackendType::Sqlite);
    }
}
