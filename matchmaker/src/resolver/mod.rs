// Foreign reference resolution: follow a document's FK_<collection> fields

use crate::document::SourceDocument;
use crate::error::{ResolutionWarning, WarningKind};
use crate::reference::ParamRef;
use crate::store::DocumentStore;
use crate::value::Value;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Referenced documents for one source document, keyed by collection name.
/// Holds at most one document per collection; a later insert replaces an earlier one.
#[derive(Debug, Clone, Default)]
pub struct ResolvedContext {
    docs: HashMap<String, SourceDocument>,
}

impl ResolvedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a referenced document, returning the one it replaced.
    pub fn insert(&mut self, collection: &str, doc: SourceDocument) -> Option<SourceDocument> {
        self.docs.insert(collection.to_string(), doc)
    }

    pub fn get(&self, collection: &str) -> Option<&SourceDocument> {
        self.docs.get(collection)
    }

    /// Value of `param.field` in the document referenced through `param.collection`.
    pub fn lookup(&self, param: &ParamRef) -> Option<&Value> {
        self.docs.get(&param.collection)?.get(&param.field)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Outcome of resolving one document's foreign keys.
#[derive(Debug, Default)]
pub struct Resolution {
    pub context: ResolvedContext,
    pub warnings: Vec<ResolutionWarning>,
    /// Resolution stopped early because the pass was cancelled
    pub cancelled: bool,
}

impl Resolution {
    fn warn(&mut self, doc: &SourceDocument, kind: WarningKind) {
        let warning = ResolutionWarning::new(Some(doc.id.to_hex()), kind);
        log::warn!("{warning}");
        self.warnings.push(warning);
    }
}

/// Fetch every document referenced by `doc`'s foreign keys.
///
/// Keys are visited in ascending order, one store read each. Failures to coerce
/// an id or fetch a document become warnings and the key is skipped; the
/// document always continues with whatever context was built.
pub async fn resolve_references<S>(
    doc: &SourceDocument,
    store: &S,
    cancel: &CancellationToken,
) -> Resolution
where
    S: DocumentStore + ?Sized,
{
    let mut resolution = Resolution::default();

    for (key, collection, value) in doc.foreign_keys() {
        if cancel.is_cancelled() {
            resolution.cancelled = true;
            break;
        }

        let id = match value.to_document_id() {
            Some(Ok(id)) => id,
            Some(Err(_)) => {
                resolution.warn(
                    doc,
                    WarningKind::MalformedId {
                        key: key.to_string(),
                        value: value.to_string(),
                    },
                );
                continue;
            }
            None => {
                resolution.warn(
                    doc,
                    WarningKind::UnsupportedIdType {
                        key: key.to_string(),
                        type_name: value.type_name().to_string(),
                    },
                );
                continue;
            }
        };

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                resolution.cancelled = true;
                break;
            }
            fetched = store.find_one(collection, &id) => fetched,
        };

        match fetched {
            Ok(Some(referenced)) => {
                log::debug!("{}: {key} -> {collection}/{id}", doc.id);
                resolution.context.insert(collection, referenced);
            }
            Ok(None) => resolution.warn(
                doc,
                WarningKind::ReferenceMissing {
                    collection: collection.to_string(),
                    id: id.to_hex(),
                },
            ),
            Err(e) => resolution.warn(
                doc,
                WarningKind::FetchFailed {
                    collection: collection.to_string(),
                    message: e.to_string(),
                },
            ),
        }
    }

    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MatchmakerError, Result};
    use crate::store::{RawDocument, Store};
    use crate::value::DocumentId;
    use async_trait::async_trait;
    use serde_json::json;

    async fn movie_store() -> (Store, DocumentId) {
        let store = Store::open_in_memory().unwrap();
        store.create_collection("movieDetails").await.unwrap();
        let ids = store
            .insert_many(
                "movieDetails",
                vec![json!({ "actors": "Tom Hanks", "title": "Big" })],
            )
            .await
            .unwrap();
        (store, ids[0])
    }

    fn source(fields: serde_json::Value) -> SourceDocument {
        match Value::from(fields) {
            Value::Map(fields) => SourceDocument::new(DocumentId::generate(), fields),
            other => panic!("expected a map, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolves_hex_string_foreign_key() {
        let (store, movie) = movie_store().await;
        let doc = source(json!({ "FK_movieDetails": movie.to_hex(), "note": "x" }));

        let res = resolve_references(&doc, &store, &CancellationToken::new()).await;
        assert!(res.warnings.is_empty());
        assert!(!res.cancelled);
        assert_eq!(res.context.len(), 1);

        let title = ParamRef::parse("movieDetails.title").unwrap();
        assert_eq!(res.context.lookup(&title), Some(&Value::from("Big")));
    }

    #[tokio::test]
    async fn test_resolves_typed_id_foreign_key() {
        let (store, movie) = movie_store().await;
        let doc = source(json!({ "FK_movieDetails": { "$oid": movie.to_hex() } }));

        let res = resolve_references(&doc, &store, &CancellationToken::new()).await;
        assert!(res.context.get("movieDetails").is_some());
    }

    #[tokio::test]
    async fn test_malformed_and_unsupported_ids_are_warnings() {
        let (store, movie) = movie_store().await;
        let doc = source(json!({
            "FK_a": "not-hex",
            "FK_b": 17,
            "FK_movieDetails": movie.to_hex(),
        }));

        let res = resolve_references(&doc, &store, &CancellationToken::new()).await;
        assert_eq!(res.context.len(), 1);
        assert_eq!(res.warnings.len(), 2);
        assert!(matches!(
            &res.warnings[0].kind,
            WarningKind::MalformedId { key, .. } if key == "FK_a"
        ));
        assert!(matches!(
            &res.warnings[1].kind,
            WarningKind::UnsupportedIdType { type_name, .. } if type_name == "integer"
        ));
        assert_eq!(res.warnings[0].document, Some(doc.id.to_hex()));
    }

    #[tokio::test]
    async fn test_missing_reference_is_a_warning() {
        let (store, _) = movie_store().await;
        let ghost = DocumentId::generate();
        let doc = source(json!({
            "FK_movieDetails": ghost.to_hex(),
            "FK_noSuchCollection": ghost.to_hex(),
        }));

        let res = resolve_references(&doc, &store, &CancellationToken::new()).await;
        assert!(res.context.is_empty());
        assert_eq!(res.warnings.len(), 2);
        assert!(res
            .warnings
            .iter()
            .all(|w| matches!(w.kind, WarningKind::ReferenceMissing { .. })));
    }

    #[tokio::test]
    async fn test_no_foreign_keys_means_empty_context() {
        let (store, _) = movie_store().await;
        let doc = source(json!({ "title": "standalone" }));
        let res = resolve_references(&doc, &store, &CancellationToken::new()).await;
        assert!(res.context.is_empty());
        assert!(res.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_fetch() {
        let (store, movie) = movie_store().await;
        let doc = source(json!({ "FK_movieDetails": movie.to_hex() }));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let res = resolve_references(&doc, &store, &cancel).await;
        assert!(res.cancelled);
        assert!(res.context.is_empty());
    }

    /// Delegates to a real store but fails every read from one collection.
    struct FailingStore {
        inner: Store,
        failing: &'static str,
    }

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn collection_exists(&self, name: &str) -> Result<bool> {
            self.inner.collection_exists(name).await
        }

        async fn scan(&self, collection: &str) -> Result<Vec<RawDocument>> {
            self.inner.scan(collection).await
        }

        async fn find_one(
            &self,
            collection: &str,
            id: &DocumentId,
        ) -> Result<Option<SourceDocument>> {
            if collection == self.failing {
                return Err(MatchmakerError::Other("disk unavailable".into()));
            }
            self.inner.find_one(collection, id).await
        }
    }

    #[tokio::test]
    async fn test_fetch_error_is_a_warning_and_key_is_skipped() {
        let (inner, movie) = movie_store().await;
        let store = FailingStore {
            inner,
            failing: "ledger",
        };
        let doc = source(json!({
            "FK_ledger": DocumentId::generate().to_hex(),
            "FK_movieDetails": movie.to_hex(),
        }));

        let res = resolve_references(&doc, &store, &CancellationToken::new()).await;
        assert!(!res.cancelled);
        assert_eq!(res.context.len(), 1);
        assert!(res.context.get("movieDetails").is_some());
        assert_eq!(res.warnings.len(), 1);
        assert!(matches!(
            &res.warnings[0].kind,
            WarningKind::FetchFailed { collection, message }
                if collection == "ledger" && message.contains("disk unavailable")
        ));
    }

    #[test]
    fn test_context_last_write_wins() {
        let first = source(json!({ "title": "first" }));
        let second = source(json!({ "title": "second" }));
        let title = ParamRef::parse("a.title").unwrap();

        let mut ctx = ResolvedContext::new();
        assert!(ctx.insert("a", first.clone()).is_none());
        let replaced = ctx.insert("a", second).unwrap();

        assert_eq!(replaced, first);
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.lookup(&title), Some(&Value::from("second")));
    }
}
