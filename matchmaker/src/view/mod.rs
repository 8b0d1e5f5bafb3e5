use crate::config::EngineConfig;
use crate::document::MaterializedRecord;
use crate::error::{MatchmakerError, ResolutionWarning, Result, WarningKind};
use crate::materializer::materialize_record;
use crate::resolver::resolve_references;
use crate::schema::{CompiledView, ViewSchema};
use crate::store::{DocumentStore, RawDocument, Store};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Result of one materialization pass.
///
/// `timed_out` marks a partial result: the deadline fired before every document
/// finished, outstanding work was cancelled, and `records` holds only what had
/// arrived. It is a lower bound on the full record count, not an error.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Materialization {
    /// Records in arrival order
    pub records: Vec<MaterializedRecord>,
    pub warnings: Vec<ResolutionWarning>,
    /// Documents a task was started for
    pub launched: usize,
    /// Documents whose task reported back before the deadline
    pub completed: usize,
    pub timed_out: bool,
}

/// Drives materialization of a source collection against a view schema.
pub struct ViewEngine<S: DocumentStore> {
    store: Arc<S>,
    config: EngineConfig,
}

/// Everything a document task needs, cloned per task.
struct DocumentTask<S: DocumentStore> {
    view: Arc<CompiledView>,
    store: Arc<S>,
    cancel: CancellationToken,
    tx: mpsc::Sender<DocumentOutcome>,
    limiter: Option<Arc<Semaphore>>,
    coerce: bool,
}

struct DocumentOutcome {
    record: Option<MaterializedRecord>,
    warnings: Vec<ResolutionWarning>,
}

impl<S: DocumentStore> ViewEngine<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        ViewEngine { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Materialize `source` against `schema` within the configured deadline.
    pub async fn materialize(&self, schema: &ViewSchema, source: &str) -> Result<Materialization> {
        self.materialize_with_deadline(schema, source, self.config.deadline())
            .await
    }

    /// Materialize `source` against `schema`, waiting at most `deadline` for records.
    ///
    /// Fails only when the schema is invalid, the source collection does not
    /// exist, or the store cannot be read at all. Problems with individual
    /// documents are reported as warnings.
    pub async fn materialize_with_deadline(
        &self,
        schema: &ViewSchema,
        source: &str,
        deadline: Duration,
    ) -> Result<Materialization> {
        let view = Arc::new(schema.compile()?);
        self.run(view, source, deadline).await
    }

    async fn run(
        &self,
        view: Arc<CompiledView>,
        source: &str,
        deadline: Duration,
    ) -> Result<Materialization> {
        let started = Instant::now();
        let deadline_at = started + deadline;

        let checked = tokio::time::timeout_at(deadline_at, async {
            match self.store.collection_exists(source).await {
                Ok(true) => self.preflight(&view).await,
                Ok(false) => Err(MatchmakerError::CollectionNotFound(source.to_string())),
                Err(e) => Err(e),
            }
        })
        .await;
        let mut warnings = match checked {
            Ok(warnings) => warnings?,
            Err(_) => {
                log::warn!("View '{}': deadline passed while checking collections", view.name);
                return Ok(Materialization {
                    timed_out: true,
                    ..Materialization::default()
                });
            }
        };

        let raw_docs = match tokio::time::timeout_at(deadline_at, self.store.scan(source)).await {
            Ok(docs) => docs?,
            Err(_) => {
                log::warn!("View '{}': deadline passed while scanning '{source}'", view.name);
                return Ok(Materialization {
                    warnings,
                    timed_out: true,
                    ..Materialization::default()
                });
            }
        };

        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let limiter = self
            .config
            .max_concurrency
            .map(|n| Arc::new(Semaphore::new(n)));

        let mut tasks = JoinSet::new();
        for raw in raw_docs {
            let task = DocumentTask {
                view: Arc::clone(&view),
                store: Arc::clone(&self.store),
                cancel: cancel.clone(),
                tx: tx.clone(),
                limiter: limiter.clone(),
                coerce: self.config.coerce_field_types,
            };
            tasks.spawn(task.run(raw));
        }
        let launched = tasks.len();
        // The channel closes once every task has dropped its sender
        drop(tx);

        let mut records = Vec::with_capacity(launched);
        let mut completed = 0;
        let sleep = tokio::time::sleep_until(deadline_at);
        tokio::pin!(sleep);

        let timed_out = loop {
            tokio::select! {
                biased;
                outcome = rx.recv() => match outcome {
                    Some(outcome) => {
                        completed += 1;
                        warnings.extend(outcome.warnings);
                        records.extend(outcome.record);
                    }
                    None => break false,
                },
                _ = &mut sleep => break true,
            }
        };

        if timed_out {
            cancel.cancel();
            rx.close();
            tasks.abort_all();
            log::warn!(
                "View '{}' over '{source}' timed out after {deadline:?}: {completed} of {launched} documents",
                view.name
            );
        } else {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    log::error!("Document task for view '{}' failed: {e}", view.name);
                }
            }
            log::info!(
                "View '{}' over '{source}': {} records from {launched} documents in {:?}",
                view.name,
                records.len(),
                started.elapsed()
            );
        }

        Ok(Materialization {
            records,
            warnings,
            launched,
            completed,
            timed_out,
        })
    }

    /// Check that the collections the schema reads from exist. Missing ones only warn.
    async fn preflight(&self, view: &CompiledView) -> Result<Vec<ResolutionWarning>> {
        let mut warnings = Vec::new();
        for collection in &view.related_collections {
            if !self.store.collection_exists(collection).await? {
                let warning = ResolutionWarning::new(
                    None,
                    WarningKind::RelatedCollectionMissing {
                        collection: collection.clone(),
                    },
                );
                log::warn!("View '{}': {warning}", view.name);
                warnings.push(warning);
            }
        }
        Ok(warnings)
    }
}

impl ViewEngine<Store> {
    /// Materialize `source` against a view schema stored under `name`.
    pub async fn materialize_view(
        &self,
        name: &str,
        source: &str,
        deadline: Option<Duration>,
    ) -> Result<Materialization> {
        let schema = self.store.get_view(name).await?;
        let deadline = deadline.unwrap_or_else(|| self.config.deadline());
        self.materialize_with_deadline(&schema, source, deadline)
            .await
    }
}

impl<S: DocumentStore> DocumentTask<S> {
    async fn run(self, raw: RawDocument) {
        let _permit = match &self.limiter {
            Some(limiter) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                permit = Arc::clone(limiter).acquire_owned() => match permit {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
            },
            None => None,
        };

        let Some(outcome) = self.process(raw).await else {
            return;
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            // Fails only once the collector has stopped listening
            _ = self.tx.send(outcome) => {}
        }
    }

    /// Decode, resolve and materialize one document. `None` when cancelled midway.
    async fn process(&self, raw: RawDocument) -> Option<DocumentOutcome> {
        let doc = match raw.decode() {
            Ok(doc) => doc,
            Err(e) => {
                let warning = ResolutionWarning::new(
                    Some(raw.id.clone()),
                    WarningKind::UndecodableDocument {
                        message: e.to_string(),
                    },
                );
                log::warn!("{warning}");
                return Some(DocumentOutcome {
                    record: None,
                    warnings: vec![warning],
                });
            }
        };

        let resolution = resolve_references(&doc, self.store.as_ref(), &self.cancel).await;
        if resolution.cancelled || self.cancel.is_cancelled() {
            log::debug!("{}: cancelled before formatting", doc.id);
            return None;
        }

        let (record, field_warnings) =
            materialize_record(&self.view, doc.id, &resolution.context, self.coerce);
        let mut warnings = resolution.warnings;
        warnings.extend(field_warnings);

        Some(DocumentOutcome {
            record: Some(record),
            warnings,
        })
    }
}
