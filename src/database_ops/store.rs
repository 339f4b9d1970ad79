use anyhow::Result;

use crate::ingest::model::{IngestionRun, NewRun, RunId, RunUpdate, Ticket};

/// Keyed ticket store. One call writes one chunk.
#[async_trait::async_trait]
pub trait TicketStore: Send + Sync {
    /// Insert each ticket, or overwrite every mapped field when its `id` exists.
    async fn upsert(&self, tickets: &[Ticket]) -> Result<()>;
}

/// Append/update-only record of ingestion attempts.
#[async_trait::async_trait]
pub trait RunStore: Send + Sync {
    /// Persist a new run; the store assigns `id` and `created_at`.
    async fn create(&self, run: &NewRun) -> Result<IngestionRun>;
    async fn update(&self, id: RunId, update: &RunUpdate) -> Result<()>;
    /// Most recent runs first.
    async fn recent(&self, limit: i64) -> Result<Vec<IngestionRun>>;
}
