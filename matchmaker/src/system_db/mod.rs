use crate::error::{MatchmakerError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Name of the collection holding stored view schemas.
pub const META_COLLECTION: &str = "_meta";

/// The system database: collection registry and document rows.
pub struct SystemDb {
    conn: Connection,
}

impl SystemDb {
    /// Open or create the system database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = SystemDb { conn };
        db.initialize_tables()?;
        Ok(db)
    }

    /// Open an in-memory system database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = SystemDb { conn };
        db.initialize_tables()?;
        Ok(db)
    }

    fn initialize_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data_json TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
            ",
        )?;
        self.conn.execute(
            "INSERT OR IGNORE INTO collections (name) VALUES (?1)",
            params![META_COLLECTION],
        )?;
        Ok(())
    }

    // ── Collections ──────────────────────────────────────────────────

    /// Register a new collection. Fails with `Conflict` if it already exists.
    pub fn create_collection(&self, name: &str) -> Result<()> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO collections (name) VALUES (?1)",
            params![name],
        )?;
        if inserted == 0 {
            return Err(MatchmakerError::Conflict(format!(
                "collection '{name}' already exists"
            )));
        }
        Ok(())
    }

    pub fn collection_exists(&self, name: &str) -> Result<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM collections WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// All collection names, sorted.
    pub fn list_collections(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM collections ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    // ── Documents ────────────────────────────────────────────────────

    /// Insert a document row. Fails with `Conflict` on a duplicate id.
    pub fn insert_document(&self, collection: &str, id: &str, data_json: &str) -> Result<()> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO documents (collection, id, data_json) VALUES (?1, ?2, ?3)",
            params![collection, id, data_json],
        )?;
        if inserted == 0 {
            return Err(MatchmakerError::Conflict(format!(
                "document {collection}/{id} already exists"
            )));
        }
        Ok(())
    }

    /// Get a document row by collection and id.
    pub fn get_document(&self, collection: &str, id: &str) -> Result<Option<DocumentRecord>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, collection, data_json FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| {
                    Ok(DocumentRecord {
                        id: row.get(0)?,
                        collection: row.get(1)?,
                        data_json: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    /// List all document rows in a collection, in insertion order.
    pub fn list_documents(&self, collection: &str) -> Result<Vec<DocumentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, collection, data_json FROM documents WHERE collection = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![collection], |row| {
            Ok(DocumentRecord {
                id: row.get(0)?,
                collection: row.get(1)?,
                data_json: row.get(2)?,
            })
        })?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row?);
        }
        Ok(docs)
    }

    pub fn count_documents(&self, collection: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ── Transaction Support ──────────────────────────────────────────

    pub fn begin_transaction(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    pub fn commit_transaction(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    pub fn rollback_transaction(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    /// Run `f` inside a transaction, rolling back if it fails.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.begin_transaction()?;
        match f(self) {
            Ok(value) => {
                self.commit_transaction()?;
                Ok(value)
            }
            Err(e) => {
                self.rollback_transaction()?;
                Err(e)
            }
        }
    }
}

/// A row from the documents table
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: String,
    pub collection: String,
    pub data_json: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_collection_always_exists() {
        let db = SystemDb::open_in_memory().unwrap();
        assert!(db.collection_exists(META_COLLECTION).unwrap());
        assert_eq!(db.list_collections().unwrap(), vec![META_COLLECTION]);
    }

    #[test]
    fn test_create_collection() {
        let db = SystemDb::open_in_memory().unwrap();
        db.create_collection("movies").unwrap();
        db.create_collection("actors").unwrap();

        assert!(db.collection_exists("movies").unwrap());
        assert!(!db.collection_exists("shows").unwrap());
        assert_eq!(
            db.list_collections().unwrap(),
            vec![META_COLLECTION, "actors", "movies"]
        );

        let err = db.create_collection("movies").unwrap_err();
        assert!(matches!(err, MatchmakerError::Conflict(_)));
    }

    #[test]
    fn test_insert_and_get_document() {
        let db = SystemDb::open_in_memory().unwrap();
        db.insert_document("movies", "abc", r#"{"title":"Up"}"#).unwrap();

        let doc = db.get_document("movies", "abc").unwrap().unwrap();
        assert_eq!(doc.id, "abc");
        assert_eq!(doc.collection, "movies");
        assert!(doc.data_json.contains("Up"));

        assert!(db.get_document("movies", "nope").unwrap().is_none());
        assert!(db.get_document("shows", "abc").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_document_id() {
        let db = SystemDb::open_in_memory().unwrap();
        db.insert_document("movies", "abc", "{}").unwrap();
        let err = db.insert_document("movies", "abc", "{}").unwrap_err();
        assert!(matches!(err, MatchmakerError::Conflict(_)));

        // Same id in another collection is fine
        db.insert_document("shows", "abc", "{}").unwrap();
    }

    #[test]
    fn test_list_documents_in_insertion_order() {
        let db = SystemDb::open_in_memory().unwrap();
        db.insert_document("movies", "b", "{}").unwrap();
        db.insert_document("movies", "a", "{}").unwrap();
        db.insert_document("shows", "c", "{}").unwrap();

        let ids: Vec<_> = db
            .list_documents("movies")
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(db.count_documents("movies").unwrap(), 2);
        assert_eq!(db.count_documents("nothing").unwrap(), 0);
    }

    #[test]
    fn test_transaction_rollback() {
        let db = SystemDb::open_in_memory().unwrap();

        let result: Result<()> = db.in_transaction(|db| {
            db.create_collection("movies")?;
            db.insert_document("movies", "a", "{}")?;
            db.insert_document("movies", "a", "{}")
        });
        assert!(result.is_err());

        assert!(!db.collection_exists("movies").unwrap());
        assert!(db.get_document("movies", "a").unwrap().is_none());
    }

    #[test]
    fn test_transaction_commit() {
        let db = SystemDb::open_in_memory().unwrap();
        db.in_transaction(|db| db.create_collection("movies")).unwrap();
        assert!(db.collection_exists("movies").unwrap());
    }
}
