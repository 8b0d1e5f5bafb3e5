pub mod config;
pub mod document;
pub mod error;
pub mod field_type;
pub mod materializer;
pub mod reference;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod system_db;
pub mod template;
pub mod validation;
pub mod value;
pub mod view;

pub use config::EngineConfig;
pub use document::{MaterializedRecord, SourceDocument};
pub use error::{MatchmakerError, ResolutionWarning, Result, WarningKind};
pub use schema::{FieldDefinition, ReferencePattern, ViewSchema};
pub use store::{DocumentStore, Store};
pub use value::{DocumentId, Value};
pub use view::{Materialization, ViewEngine};
