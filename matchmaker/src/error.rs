use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchmakerError {
    #[error("Invalid schema: {0}")]
    SchemaInvalid(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("View not found: {0}")]
    ViewNotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid name '{0}': use letters and underscores only")]
    InvalidName(String),

    #[error("Invalid document id '{0}'")]
    InvalidId(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("{0}")]
    Other(String),
}

impl From<tokio::task::JoinError> for MatchmakerError {
    fn from(e: tokio::task::JoinError) -> Self {
        MatchmakerError::Task(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MatchmakerError>;

/// A non-fatal problem met while materializing one document.
/// Warnings never abort a pass; they are returned next to the records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionWarning {
    /// Hex id of the source document, when the warning concerns one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(flatten)]
    pub kind: WarningKind,
}

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    /// A foreign-key value is a string but not a valid hex id
    #[error("{key}: malformed id '{value}'")]
    MalformedId { key: String, value: String },

    /// A foreign-key value is neither a string nor an id
    #[error("{key}: cannot use a {type_name} as a document id")]
    UnsupportedIdType { key: String, type_name: String },

    /// The referenced document does not exist
    #[error("referenced document {collection}/{id} not found")]
    ReferenceMissing { collection: String, id: String },

    /// The store failed while fetching a referenced document
    #[error("fetch from '{collection}' failed: {message}")]
    FetchFailed { collection: String, message: String },

    /// The stored source document could not be decoded
    #[error("document could not be decoded: {message}")]
    UndecodableDocument { message: String },

    /// A formatted value was rejected by its field type
    #[error("field '{field}' rejected by {field_type}: {message}")]
    CoercionFailed {
        field: String,
        field_type: String,
        message: String,
    },

    /// A collection referenced by the schema does not exist
    #[error("related collection '{collection}' does not exist")]
    RelatedCollectionMissing { collection: String },
}

impl ResolutionWarning {
    pub fn new(document: Option<String>, kind: WarningKind) -> Self {
        ResolutionWarning { document, kind }
    }
}

impl std::fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(doc) = &self.document {
            write!(f, "[{doc}] ")?;
        }
        write!(f, "{}", self.kind)
    }
}
