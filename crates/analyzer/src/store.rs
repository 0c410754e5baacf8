//! Object store
//!
//! SQLite-backed persistence for extracted [`CodeObject`]s, keyed by their
//! stable ID, plus a per-file content hash used for change detection. The
//! foreign key from objects to files cascades deletes, and every write path
//! keeps the invariant "file hash present ⇔ all its objects present":
//! updating a file's hash clears its previous objects in the same
//! transaction, and a failed object write is answered by removing the
//! file's record entirely.

use oradep_core::CodeObject;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("payload serialization error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Handle to one store database.
pub struct ObjectStore {
    conn: Connection,
}

impl ObjectStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            // Creation failure surfaces as an open error right after.
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        let store = ObjectStore { conn };
        store.setup()?;
        Ok(store)
    }

    /// In-memory store, used by tests and one-shot runs.
    pub fn in_memory() -> Result<Self, StoreError> {
        let store = ObjectStore { conn: Connection::open_in_memory()? };
        store.setup()?;
        Ok(store)
    }

    fn setup(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE IF NOT EXISTS processed_files (
                 file_path         TEXT PRIMARY KEY,
                 file_hash         TEXT NOT NULL,
                 last_processed_ts INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS code_objects (
                 id            TEXT PRIMARY KEY,
                 file_path     TEXT NOT NULL,
                 package_name  TEXT,
                 object_name   TEXT NOT NULL,
                 object_type   TEXT NOT NULL,
                 payload       TEXT NOT NULL,
                 processing_ts INTEGER NOT NULL,
                 FOREIGN KEY (file_path) REFERENCES processed_files (file_path)
                     ON DELETE CASCADE
             );
             CREATE INDEX IF NOT EXISTS idx_co_file_path ON code_objects (file_path);
             CREATE INDEX IF NOT EXISTS idx_co_package_name ON code_objects (package_name);
             CREATE INDEX IF NOT EXISTS idx_co_object_name ON code_objects (object_name);
             CREATE INDEX IF NOT EXISTS idx_co_object_type ON code_objects (object_type);",
        )?;
        debug!("object store schema verified");
        Ok(())
    }

    /// Stored content hash for a processed path, if any.
    pub fn file_hash(&self, file_path: &str) -> Result<Option<String>, StoreError> {
        let hash = self
            .conn
            .query_row(
                "SELECT file_hash FROM processed_files WHERE file_path = ?1",
                params![file_path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash)
    }

    /// Record a file's hash, clearing its previously stored objects so the
    /// caller can re-insert the fresh set.
    pub fn update_file_hash(&mut self, file_path: &str, hash: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM code_objects WHERE file_path = ?1",
            params![file_path],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO processed_files (file_path, file_hash, last_processed_ts)
             VALUES (?1, ?2, ?3)",
            params![file_path, hash, now_ts()],
        )?;
        tx.commit()?;
        debug!(file = file_path, "file hash updated, stale objects cleared");
        Ok(())
    }

    /// Delete a file's record; its objects go with it via the cascade.
    /// Returns true when a record existed.
    pub fn remove_file_record(&self, file_path: &str) -> Result<bool, StoreError> {
        let removed = self.conn.execute(
            "DELETE FROM processed_files WHERE file_path = ?1",
            params![file_path],
        )?;
        if removed > 0 {
            info!(file = file_path, "removed file record and its objects");
        } else {
            warn!(file = file_path, "no file record to remove");
        }
        Ok(removed > 0)
    }

    /// Insert or replace one object.
    pub fn add_object(&self, object: &CodeObject, file_path: &str) -> Result<(), StoreError> {
        debug_assert!(!object.id.is_empty(), "object must have a generated ID");
        let payload = serde_json::to_string(object)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO code_objects
             (id, file_path, package_name, object_name, object_type, payload, processing_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                object.id,
                file_path,
                object.package_name,
                object.name,
                object.kind.to_string(),
                payload,
                now_ts()
            ],
        )?;
        Ok(())
    }

    /// Every stored object, ordered by ID for deterministic downstream
    /// iteration.
    pub fn all_objects(&self) -> Result<Vec<CodeObject>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM code_objects ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut objects = Vec::new();
        for payload in rows {
            objects.push(serde_json::from_str(&payload?)?);
        }
        info!(count = objects.len(), "loaded code objects from store");
        Ok(objects)
    }
}

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oradep_core::ObjectKind;
    use pretty_assertions::assert_eq;

    fn object(name: &str, pkg: &str) -> CodeObject {
        let mut obj = CodeObject::new(name, pkg, ObjectKind::Procedure);
        obj.clean_code = Some("BEGIN NULL; END;".into());
        obj.start_line = 1;
        obj.end_line = 1;
        obj.generate_id();
        obj
    }

    #[test]
    fn test_hash_roundtrip() {
        let mut store = ObjectStore::in_memory().unwrap();
        assert_eq!(store.file_hash("a.sql").unwrap(), None);
        store.update_file_hash("a.sql", "abc123").unwrap();
        assert_eq!(store.file_hash("a.sql").unwrap().as_deref(), Some("abc123"));
        store.update_file_hash("a.sql", "def456").unwrap();
        assert_eq!(store.file_hash("a.sql").unwrap().as_deref(), Some("def456"));
    }

    #[test]
    fn test_object_roundtrip_preserves_fields() {
        let mut store = ObjectStore::in_memory().unwrap();
        store.update_file_hash("f.sql", "h").unwrap();
        let obj = object("proc_a", "pkg");
        store.add_object(&obj, "f.sql").unwrap();

        let loaded = store.all_objects().unwrap();
        assert_eq!(loaded, vec![obj]);
    }

    #[test]
    fn test_update_hash_clears_previous_objects() {
        let mut store = ObjectStore::in_memory().unwrap();
        store.update_file_hash("f.sql", "v1").unwrap();
        store.add_object(&object("stale", "pkg"), "f.sql").unwrap();

        store.update_file_hash("f.sql", "v2").unwrap();
        assert!(store.all_objects().unwrap().is_empty());
    }

    #[test]
    fn test_remove_file_record_cascades() {
        let mut store = ObjectStore::in_memory().unwrap();
        store.update_file_hash("f.sql", "h").unwrap();
        store.add_object(&object("p", "pkg"), "f.sql").unwrap();

        assert!(store.remove_file_record("f.sql").unwrap());
        assert_eq!(store.file_hash("f.sql").unwrap(), None);
        assert!(store.all_objects().unwrap().is_empty());
        assert!(!store.remove_file_record("f.sql").unwrap());
    }

    #[test]
    fn test_objects_ordered_by_id() {
        let mut store = ObjectStore::in_memory().unwrap();
        store.update_file_hash("f.sql", "h").unwrap();
        store.add_object(&object("zeta", "pkg"), "f.sql").unwrap();
        store.add_object(&object("alpha", "pkg"), "f.sql").unwrap();

        let ids: Vec<String> =
            store.all_objects().unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["pkg.alpha", "pkg.zeta"]);
    }

    #[test]
    fn test_on_disk_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("out/objects.db");
        {
            let mut store = ObjectStore::open(&db).unwrap();
            store.update_file_hash("f.sql", "h").unwrap();
            store.add_object(&object("p", "pkg"), "f.sql").unwrap();
        }
        let store = ObjectStore::open(&db).unwrap();
        assert_eq!(store.all_objects().unwrap().len(), 1);
    }
}
