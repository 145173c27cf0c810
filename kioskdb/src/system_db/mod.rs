use crate::document::{into_object, StoredDocument};
use crate::error::{KioskDbError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// The document database: every collection of every logical database lives
/// in one `documents` table keyed by (database, collection, id).
pub struct SystemDb {
    conn: Mutex<Connection>,
}

impl SystemDb {
    /// Open or create the database file at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = SystemDb {
            conn: Mutex::new(conn),
        };
        db.initialize_tables()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = SystemDb {
            conn: Mutex::new(conn),
        };
        db.initialize_tables()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| KioskDbError::Other("Database connection lock poisoned".into()))
    }

    fn initialize_tables(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                db_name TEXT NOT NULL,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                data_json TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_key
                ON documents(db_name, collection, id);
            CREATE INDEX IF NOT EXISTS idx_documents_collection
                ON documents(db_name, collection, seq);
            ",
        )?;
        Ok(())
    }

    /// Cheap round trip used by the health check.
    pub fn ping(&self) -> Result<()> {
        let one: i64 = self.conn()?.query_row("SELECT 1", [], |row| row.get(0))?;
        if one != 1 {
            return Err(KioskDbError::Other("Unexpected ping result".into()));
        }
        Ok(())
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Insert a new document at version 1.
    pub fn insert_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
        data: &Map<String, Value>,
    ) -> Result<()> {
        let data_json = serde_json::to_string(data)?;
        self.conn()?.execute(
            "INSERT INTO documents (db_name, collection, id, version, data_json) VALUES (?1, ?2, ?3, 1, ?4)",
            params![database, collection, id, data_json],
        )?;
        Ok(())
    }

    /// Insert several documents in one transaction; either all land or none do.
    pub fn insert_documents(
        &self,
        database: &str,
        collection: &str,
        docs: &[(String, Map<String, Value>)],
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO documents (db_name, collection, id, version, data_json) VALUES (?1, ?2, ?3, 1, ?4)",
            )?;
            for (id, data) in docs {
                let data_json = serde_json::to_string(data)?;
                stmt.execute(params![database, collection, id, data_json])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Replace a document's data if it is still at `base_version`.
    /// Returns the new version.
    pub fn replace_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
        data: &Map<String, Value>,
        base_version: i64,
    ) -> Result<i64> {
        let data_json = serde_json::to_string(data)?;
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE documents SET data_json = ?4, version = version + 1
             WHERE db_name = ?1 AND collection = ?2 AND id = ?3 AND version = ?5",
            params![database, collection, id, data_json, base_version],
        )?;
        if changed == 0 {
            return Err(stale_or_missing(&conn, database, collection, id, base_version));
        }
        Ok(base_version + 1)
    }

    /// Delete a document, optionally only if it is still at `expected_version`.
    pub fn delete_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
        expected_version: Option<i64>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM documents
             WHERE db_name = ?1 AND collection = ?2 AND id = ?3 AND (?4 IS NULL OR version = ?4)",
            params![database, collection, id, expected_version],
        )?;
        if changed == 0 {
            return Err(stale_or_missing(
                &conn,
                database,
                collection,
                id,
                expected_version.unwrap_or_default(),
            ));
        }
        Ok(())
    }

    /// Delete every document in a collection. Returns how many were removed.
    pub fn delete_collection_documents(&self, database: &str, collection: &str) -> Result<usize> {
        let deleted = self.conn()?.execute(
            "DELETE FROM documents WHERE db_name = ?1 AND collection = ?2",
            params![database, collection],
        )?;
        Ok(deleted)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Get a document by database, collection and id.
    pub fn get_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
    ) -> Result<Option<DocumentRecord>> {
        let result = self
            .conn()?
            .query_row(
                "SELECT id, version, data_json FROM documents
                 WHERE db_name = ?1 AND collection = ?2 AND id = ?3",
                params![database, collection, id],
                DocumentRecord::from_row,
            )
            .optional()?;
        Ok(result)
    }

    /// List all documents in a collection, most recently inserted first.
    pub fn list_documents(&self, database: &str, collection: &str) -> Result<Vec<DocumentRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, version, data_json FROM documents
             WHERE db_name = ?1 AND collection = ?2 ORDER BY seq DESC",
        )?;
        let rows = stmt.query_map(params![database, collection], DocumentRecord::from_row)?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row?);
        }
        Ok(docs)
    }

    pub fn count_documents(&self, database: &str, collection: &str) -> Result<usize> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM documents WHERE db_name = ?1 AND collection = ?2",
            params![database, collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Every (database, collection) pair that holds documents, with its size.
    pub fn collection_counts(&self) -> Result<Vec<(String, String, usize)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT db_name, collection, COUNT(*) FROM documents
             GROUP BY db_name, collection ORDER BY db_name, collection",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)? as usize,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

/// Explain why a conditional write touched no rows.
fn stale_or_missing(
    conn: &Connection,
    database: &str,
    collection: &str,
    id: &str,
    expected: i64,
) -> KioskDbError {
    let current: std::result::Result<Option<i64>, rusqlite::Error> = conn
        .query_row(
            "SELECT version FROM documents WHERE db_name = ?1 AND collection = ?2 AND id = ?3",
            params![database, collection, id],
            |row| row.get(0),
        )
        .optional();
    match current {
        Ok(Some(actual)) => KioskDbError::Conflict {
            collection: collection.to_string(),
            id: id.to_string(),
            expected,
            actual,
        },
        Ok(None) => KioskDbError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        },
        Err(e) => e.into(),
    }
}

/// A row from the documents table
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: String,
    pub version: i64,
    pub data_json: String,
}

impl DocumentRecord {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(DocumentRecord {
            id: row.get(0)?,
            version: row.get(1)?,
            data_json: row.get(2)?,
        })
    }

    /// Parse the stored JSON back into a document
    pub fn into_document(self) -> Result<StoredDocument> {
        let data: Value = serde_json::from_str(&self.data_json)?;
        Ok(StoredDocument {
            id: self.id,
            version: self.version,
            fields: into_object(data)?,
        })
    }
}
