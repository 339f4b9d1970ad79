use anyhow::Result;
use tracing::{error, info};

use super::model::{IngestionRun, NewRun, RunId, RunStatus, RunUpdate};
use crate::database_ops::store::RunStore;

/// A run record in `Processing` state. Finalizing consumes it, so a run can
/// only ever be finalized once.
#[must_use = "a started run must be finalized with succeed() or fail()"]
pub struct ActiveRun<'a, R: RunStore + ?Sized> {
    store: &'a R,
    run: IngestionRun,
}

/// Create the `Processing` record that brackets one ingestion.
pub async fn start_run<'a, R>(
    store: &'a R,
    filename: &str,
    records_count: i64,
) -> Result<ActiveRun<'a, R>>
where
    R: RunStore + ?Sized,
{
    let run = store
        .create(&NewRun {
            filename: filename.to_string(),
            status: RunStatus::Processing,
            records_count,
        })
        .await?;
    info!(target: "run_tracker", run_id = %run.id, filename, records_count, "run started");
    Ok(ActiveRun { store, run })
}

impl<'a, R: RunStore + ?Sized> ActiveRun<'a, R> {
    pub fn id(&self) -> RunId {
        self.run.id
    }

    pub fn record(&self) -> &IngestionRun {
        &self.run
    }

    pub async fn succeed(self) -> Result<()> {
        self.finalize(RunStatus::Success, None).await
    }

    pub async fn fail(self, message: impl Into<String>) -> Result<()> {
        self.finalize(RunStatus::Failure, Some(message.into())).await
    }

    /// Errors are logged here under `run_tracker` and also returned. By now the
    /// ticket data is already written, so callers must not report them as an
    /// ingestion failure.
    async fn finalize(self, status: RunStatus, error_message: Option<String>) -> Result<()> {
        let update = RunUpdate {
            status,
            error_message,
        };
        match self.store.update(self.run.id, &update).await {
            Ok(()) => {
                info!(target: "run_tracker", run_id = %self.run.id, %status, "run finalized");
                Ok(())
            }
            Err(e) => {
                let cause = format!("{e:#}");
                error!(
                    target: "run_tracker",
                    run_id = %self.run.id,
                    %status,
                    error = %cause,
                    "could not record final run status"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::memory::MemoryRunStore;

    #[tokio::test]
    async fn success_moves_processing_to_success() {
        let store = MemoryRunStore::new();
        let run = start_run(&store, "export.csv", 12).await.unwrap();
        let id = run.id();
        assert_eq!(store.runs()[0].status, RunStatus::Processing);
        run.succeed().await.unwrap();

        let stored = &store.runs()[0];
        assert_eq!(stored.id, id);
        assert_eq!(stored.status, RunStatus::Success);
        assert_eq!(stored.records_count, 12);
        assert_eq!(store.updates().len(), 1);
    }

    #[tokio::test]
    async fn failure_records_message() {
        let store = MemoryRunStore::new();
        let run = start_run(&store, "export.csv", 3).await.unwrap();
        run.fail("store offline").await.unwrap();
        let stored = &store.runs()[0];
        assert_eq!(stored.status, RunStatus::Failure);
        assert_eq!(stored.error_message.as_deref(), Some("store offline"));
    }

    #[tokio::test]
    async fn create_failure_is_returned() {
        let store = MemoryRunStore::failing_create();
        assert!(start_run(&store, "export.csv", 3).await.is_err());
        assert!(store.runs().is_empty());
    }

    #[tokio::test]
    async fn finalize_failure_is_returned_once() {
        let store = MemoryRunStore::failing_update();
        let run = start_run(&store, "export.csv", 3).await.unwrap();
        assert!(run.succeed().await.is_err());
        assert_eq!(store.updates().len(), 1);
        assert_eq!(store.runs()[0].status, RunStatus::Processing);
    }
}
