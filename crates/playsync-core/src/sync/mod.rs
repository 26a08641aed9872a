//! Reconciles local records with the remote store, one record at a time.
//!
//! For each record the engine looks up the remote entity by title, then
//! creates it, updates it when the diff reports a change, or skips it. Remote
//! calls are retried on transport failures only; every other failure marks the
//! record as failed and the run moves on.

mod pacing;
mod retry;

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;

use crate::codec::{self, EmptyDatePolicy};
use crate::config::DEFAULT_COVER_FIELD;
use crate::diff::{self, DiffResult};
use crate::mapping::FieldMapping;
use crate::models::{LocalRecord, RecordReport, RemoteEntity, SyncOutcome, SyncSummary};
use crate::remote::RemoteStore;
use crate::{Error, Result};

pub use pacing::Pacer;
pub use retry::RetryPolicy;

const DEFAULT_PACING: Duration = Duration::from_millis(300);

/// Shared flag checked before each record; in-flight calls are not interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How to treat several remote entities sharing one title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Use the first entity the store returns and log a warning
    #[default]
    PickFirst,
    /// Fail the record
    Error,
}

impl FromStr for DuplicatePolicy {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first" | "pick-first" | "pick_first" => Ok(Self::PickFirst),
            "error" => Ok(Self::Error),
            other => Err(Error::Config(format!(
                "unknown duplicate policy '{other}' (expected 'first' or 'error')"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Delay between consecutive records
    pub pacing: Duration,
    pub retry: RetryPolicy,
    pub duplicate_policy: DuplicatePolicy,
    pub empty_date_policy: EmptyDatePolicy,
    /// Local field holding the cover-image URL
    pub cover_field: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            pacing: DEFAULT_PACING,
            retry: RetryPolicy::default(),
            duplicate_policy: DuplicatePolicy::default(),
            empty_date_policy: EmptyDatePolicy::default(),
            cover_field: DEFAULT_COVER_FIELD.to_string(),
        }
    }
}

pub struct SyncEngine<S> {
    store: S,
    mapping: FieldMapping,
    database_id: String,
    options: SyncOptions,
    collection_id: OnceCell<String>,
}

impl<S: RemoteStore> SyncEngine<S> {
    pub fn new(
        store: S,
        mapping: FieldMapping,
        database_id: impl Into<String>,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            mapping,
            database_id: database_id.into(),
            options,
            collection_id: OnceCell::new(),
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    pub const fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Collection identifier, resolved on first use and cached for the
    /// lifetime of the engine.
    pub async fn collection_id(&self) -> Result<&str> {
        let store = &self.store;
        let database_id = self.database_id.as_str();
        let retry = self.options.retry;
        let collection_id = self
            .collection_id
            .get_or_try_init(|| async move {
                retry
                    .run("resolve_collection", move || {
                        store.resolve_collection_id(database_id)
                    })
                    .await
            })
            .await?;
        Ok(collection_id.as_str())
    }

    pub async fn run(&self, records: &[LocalRecord]) -> Result<SyncSummary> {
        self.run_with_progress(records, &CancellationFlag::new(), |_| {})
            .await
    }

    /// Sync `records` in order, reporting each outcome as it happens.
    ///
    /// Only a failure to resolve the collection aborts the run; per-record
    /// failures are reported and counted.
    pub async fn run_with_progress<F>(
        &self,
        records: &[LocalRecord],
        cancel: &CancellationFlag,
        mut on_report: F,
    ) -> Result<SyncSummary>
    where
        F: FnMut(&RecordReport),
    {
        let mut summary = SyncSummary::default();
        let mut pacer = Pacer::new(self.options.pacing);
        let mut seen = HashSet::new();

        tracing::info!(records = records.len(), "Starting sync run");

        for (index, record) in records.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(
                    processed = summary.processed(),
                    remaining = records.len() - index,
                    "Sync run cancelled"
                );
                summary.cancelled = true;
                break;
            }

            let name = match self.mapping.record_name(record) {
                Ok(name) if name.is_empty() => {
                    tracing::debug!(index, "Skipping record without a name");
                    continue;
                }
                Ok(name) => name,
                Err(error) => {
                    let report = RecordReport {
                        name: format!("record #{}", index + 1),
                        outcome: SyncOutcome::Failed(error.to_string()),
                    };
                    on_report(&report);
                    summary.record(report);
                    continue;
                }
            };

            let outcome = if seen.insert(name.clone()) {
                pacer.wait().await;
                let collection_id = self.collection_id().await?;
                self.sync_record(collection_id, &name, record).await
            } else {
                tracing::warn!(name = name.as_str(), "Duplicate local record");
                SyncOutcome::Failed("duplicate local record name in this run".to_string())
            };

            let report = RecordReport { name, outcome };
            on_report(&report);
            summary.record(report);
        }

        tracing::info!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Sync run finished"
        );
        Ok(summary)
    }

    async fn sync_record(
        &self,
        collection_id: &str,
        name: &str,
        record: &LocalRecord,
    ) -> SyncOutcome {
        match self.try_sync_record(collection_id, name, record).await {
            Ok(outcome) => {
                tracing::info!(name, outcome = outcome.label(), "Record synced");
                outcome
            }
            Err(error) => {
                tracing::error!(
                    name,
                    status = error.status_code(),
                    error = %error,
                    "Record failed"
                );
                SyncOutcome::Failed(error.to_string())
            }
        }
    }

    async fn try_sync_record(
        &self,
        collection_id: &str,
        name: &str,
        record: &LocalRecord,
    ) -> Result<SyncOutcome> {
        let date_policy = self.options.empty_date_policy;
        let cover_field = self.options.cover_field.as_str();
        let properties = codec::encode(record, &self.mapping, date_policy)?;
        let candidate = codec::candidate(record, &self.mapping, cover_field, date_policy)?;
        let cover = codec::cover_reference(record, cover_field);

        let store = &self.store;
        let properties = &properties;
        let cover = cover.as_deref();

        let Some(existing) = self.lookup(collection_id, name).await? else {
            self.options
                .retry
                .run("create", move || store.create(collection_id, properties, cover))
                .await?;
            return Ok(SyncOutcome::Created);
        };

        let decoded = codec::decode(&existing, &self.mapping);
        match diff::compare(&decoded, &candidate, &self.mapping) {
            DiffResult::Equal => Ok(SyncOutcome::Skipped),
            DiffResult::Changed(mismatch) => {
                tracing::debug!(
                    name,
                    field = mismatch.key.as_str(),
                    remote = mismatch.existing.as_str(),
                    local = mismatch.candidate.as_str(),
                    "Remote entity is out of date"
                );
                let entity_id = existing.id.as_str();
                self.options
                    .retry
                    .run("update", move || store.update(entity_id, properties, cover))
                    .await?;
                Ok(SyncOutcome::Updated)
            }
        }
    }

    async fn lookup(&self, collection_id: &str, name: &str) -> Result<Option<RemoteEntity>> {
        let store = &self.store;
        let title_field = self.mapping.title().remote_field.as_str();
        let matches = self
            .options
            .retry
            .run("lookup", move || store.lookup(collection_id, title_field, name))
            .await?;

        match (matches.len(), self.options.duplicate_policy) {
            (0 | 1, _) => Ok(matches.into_iter().next()),
            (count, DuplicatePolicy::PickFirst) => {
                tracing::warn!(
                    name,
                    count,
                    "Several remote entities share this name, using the first"
                );
                Ok(matches.into_iter().next())
            }
            (count, DuplicatePolicy::Error) => Err(Error::DuplicateRemote {
                name: name.to_string(),
                count,
            }),
        }
    }
}
