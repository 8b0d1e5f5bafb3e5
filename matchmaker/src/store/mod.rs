use crate::document::SourceDocument;
use crate::error::{MatchmakerError, Result};
use crate::reference;
use crate::schema::{manual_collection_name, ViewSchema};
use crate::system_db::{SystemDb, META_COLLECTION};
use crate::value::{DocumentId, Value, OID_KEY};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Field holding a document's own id.
pub const ID_FIELD: &str = "_id";

/// A stored document that has not been decoded yet.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub id: String,
    pub data_json: String,
}

impl RawDocument {
    /// Decode into a typed document. Fails on a bad id or malformed JSON.
    pub fn decode(&self) -> Result<SourceDocument> {
        let id = DocumentId::parse_hex(&self.id)?;
        SourceDocument::from_json_str(id, &self.data_json)
    }
}

/// Read access the view engine needs from a backing store.
/// Shared by every document task of a pass, so implementations must be cheap to call concurrently.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Every document of a collection, undecoded. Fails with `CollectionNotFound` if it is absent.
    async fn scan(&self, collection: &str) -> Result<Vec<RawDocument>>;

    /// A single decoded document, `None` if it (or its collection) does not exist.
    async fn find_one(&self, collection: &str, id: &DocumentId) -> Result<Option<SourceDocument>>;
}

/// SQLite-backed document store.
/// Collections, documents, stored view schemas and their manual collections all live here.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<SystemDb>>,
}

impl Store {
    /// Open or create a store at the given database path.
    pub fn open(path: &Path) -> Result<Self> {
        let db = SystemDb::open(path)?;
        log::info!("Opened store at {}", path.display());
        Ok(Store {
            db: Arc::new(Mutex::new(db)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Store {
            db: Arc::new(Mutex::new(SystemDb::open_in_memory()?)),
        })
    }

    /// Run a blocking database call on the blocking thread pool.
    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SystemDb) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|_| MatchmakerError::Other("system database lock poisoned".into()))?;
            f(&guard)
        })
        .await?
    }

    // ── Collections ─────────────────────────────────────────────────

    pub async fn list_collections(&self) -> Result<Vec<String>> {
        self.with_db(|db| db.list_collections()).await
    }

    /// Create an empty collection. The name must be usable in a `<collection>.<field>` reference.
    pub async fn create_collection(&self, name: &str) -> Result<()> {
        if !reference::is_identifier(name) {
            return Err(MatchmakerError::InvalidName(name.to_string()));
        }
        let name = name.to_string();
        self.with_db(move |db| db.create_collection(&name)).await
    }

    /// Insert documents into an existing collection, all or nothing.
    /// An `_id` field is honoured when present, otherwise one is generated.
    pub async fn insert_many(
        &self,
        collection: &str,
        docs: Vec<serde_json::Value>,
    ) -> Result<Vec<DocumentId>> {
        let collection = collection.to_string();
        self.with_db(move |db| {
            if !db.collection_exists(&collection)? {
                return Err(MatchmakerError::CollectionNotFound(collection));
            }
            db.in_transaction(|db| insert_into(db, &collection, docs))
        })
        .await
    }

    // ── Views ───────────────────────────────────────────────────────

    /// Store a view schema in the metadata collection and provision its `<name>_manual` collection.
    pub async fn create_view(&self, schema: &ViewSchema) -> Result<DocumentId> {
        schema.compile()?;
        if !reference::is_identifier(&schema.name) {
            return Err(MatchmakerError::InvalidName(schema.name.clone()));
        }

        let schema = schema.clone();
        let id = self
            .with_db(move |db| {
                db.in_transaction(|db| {
                    if find_view(db, &schema.name)?.is_some() {
                        return Err(MatchmakerError::Conflict(format!(
                            "view '{}' already exists",
                            schema.name
                        )));
                    }
                    db.create_collection(&schema.manual_collection())?;
                    let data = serde_json::to_value(&schema)?;
                    let ids = insert_into(db, META_COLLECTION, vec![data])?;
                    ids.into_iter().next().ok_or_else(|| {
                        MatchmakerError::Other("view schema was not stored".into())
                    })
                })
            })
            .await?;

        log::info!("Created view with schema id {id}");
        Ok(id)
    }

    pub async fn get_view(&self, name: &str) -> Result<ViewSchema> {
        let name = name.to_string();
        self.with_db(move |db| {
            find_view(db, &name)?.ok_or(MatchmakerError::ViewNotFound(name))
        })
        .await
    }

    pub async fn list_views(&self) -> Result<Vec<ViewSchema>> {
        self.with_db(|db| {
            let mut views = Vec::new();
            for record in db.list_documents(META_COLLECTION)? {
                match serde_json::from_str::<ViewSchema>(&record.data_json) {
                    Ok(view) => views.push(view),
                    Err(e) => log::warn!("Skipping unreadable view schema {}: {e}", record.id),
                }
            }
            Ok(views)
        })
        .await
    }

    /// Insert hand-entered records into a view's manual collection.
    pub async fn insert_manual(
        &self,
        view: &str,
        docs: Vec<serde_json::Value>,
    ) -> Result<Vec<DocumentId>> {
        let view = self.get_view(view).await?;
        self.insert_many(&view.manual_collection(), docs).await
    }

    /// Collection document counts and stored view names.
    pub async fn status(&self) -> Result<serde_json::Value> {
        self.with_db(|db| {
            let mut collections = serde_json::Map::new();
            for name in db.list_collections()? {
                let count = db.count_documents(&name)?;
                collections.insert(name, serde_json::json!({ "count": count }));
            }

            let mut views = Vec::new();
            for record in db.list_documents(META_COLLECTION)? {
                if let Ok(view) = serde_json::from_str::<ViewSchema>(&record.data_json) {
                    views.push(view.name);
                }
            }

            Ok(serde_json::json!({
                "collections": collections,
                "views": views,
            }))
        })
        .await
    }
}

#[async_trait]
impl DocumentStore for Store {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let name = name.to_string();
        self.with_db(move |db| db.collection_exists(&name)).await
    }

    async fn scan(&self, collection: &str) -> Result<Vec<RawDocument>> {
        let collection = collection.to_string();
        self.with_db(move |db| {
            if !db.collection_exists(&collection)? {
                return Err(MatchmakerError::CollectionNotFound(collection));
            }
            let records = db.list_documents(&collection)?;
            Ok(records
                .into_iter()
                .map(|r| RawDocument {
                    id: r.id,
                    data_json: r.data_json,
                })
                .collect())
        })
        .await
    }

    async fn find_one(&self, collection: &str, id: &DocumentId) -> Result<Option<SourceDocument>> {
        let collection = collection.to_string();
        let id = *id;
        self.with_db(move |db| {
            db.get_document(&collection, &id.to_hex())?
                .map(|record| SourceDocument::from_json_str(id, &record.data_json))
                .transpose()
        })
        .await
    }
}

/// Insert JSON objects into `collection`, assigning ids. Runs inside the caller's transaction.
fn insert_into(
    db: &SystemDb,
    collection: &str,
    docs: Vec<serde_json::Value>,
) -> Result<Vec<DocumentId>> {
    let mut ids = Vec::with_capacity(docs.len());
    for (i, doc) in docs.into_iter().enumerate() {
        let serde_json::Value::Object(mut fields) = doc else {
            return Err(MatchmakerError::InvalidDocument(format!(
                "item #{} for '{collection}' is not a JSON object",
                i + 1
            )));
        };

        let id = match fields.remove(ID_FIELD) {
            Some(raw) => match Value::from(raw).to_document_id() {
                Some(parsed) => parsed?,
                None => {
                    return Err(MatchmakerError::InvalidDocument(format!(
                        "item #{} for '{collection}' has a non-id {ID_FIELD}",
                        i + 1
                    )))
                }
            },
            None => DocumentId::generate(),
        };
        fields.insert(ID_FIELD.to_string(), serde_json::json!({ OID_KEY: id.to_hex() }));

        let data_json = serde_json::to_string(&fields)?;
        db.insert_document(collection, &id.to_hex(), &data_json)?;
        ids.push(id);
    }
    Ok(ids)
}

fn find_view(db: &SystemDb, name: &str) -> Result<Option<ViewSchema>> {
    for record in db.list_documents(META_COLLECTION)? {
        let view: ViewSchema = match serde_json::from_str(&record.data_json) {
            Ok(view) => view,
            Err(e) => {
                log::warn!("Skipping unreadable view schema {}: {e}", record.id);
                continue;
            }
        };
        if view.name == name {
            return Ok(Some(view));
        }
    }
    Ok(None)
}
