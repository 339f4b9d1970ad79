use std::path::Path;
use tracing::{error, info, instrument, warn};

use super::dedup::deduplicate;
use super::error::{IngestError, InputError};
use super::model::{RunId, RunStatus};
use super::parser::parse_records;
use super::runs::start_run;
use super::upsert::{upsert_in_chunks, BatchSettings};
use crate::database_ops::store::{RunStore, TicketStore};
use crate::normalization::DateNormalizer;

/// An uploaded export: the original file name plus its raw bytes.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, InputError> {
        let content = std::fs::read(path).map_err(|source| InputError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { filename, content })
    }
}

pub fn ensure_csv_filename(filename: &str) -> Result<(), InputError> {
    let is_csv = Path::new(filename)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        Ok(())
    } else {
        Err(InputError::UnsupportedFileType {
            filename: filename.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestSettings {
    pub batch: BatchSettings,
    pub dates: DateNormalizer,
}

/// Terminal outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub run_id: RunId,
    pub status: RunStatus,
    /// Parsed data rows before deduplication.
    pub records_count: usize,
    pub tickets_written: usize,
    pub duplicates: usize,
    pub missing_id: usize,
    pub chunks: usize,
    pub message: String,
    /// Set when the tickets were written but the final run status could not be saved.
    pub finalize_error: Option<String>,
}

/// Parse, deduplicate and upsert one export, bracketed by a run record.
pub struct IngestPipeline<'a, T: ?Sized, R: ?Sized> {
    tickets: &'a T,
    runs: &'a R,
    settings: IngestSettings,
}

impl<'a, T, R> IngestPipeline<'a, T, R>
where
    T: TicketStore + ?Sized,
    R: RunStore + ?Sized,
{
    pub fn new(tickets: &'a T, runs: &'a R, settings: IngestSettings) -> Self {
        Self {
            tickets,
            runs,
            settings,
        }
    }

    /// Run the whole pipeline for `upload`.
    ///
    /// Input problems are reported before any store is touched. Once the run
    /// record exists every outcome is written back to it exactly once.
    /// `on_progress` sees one percentage per written chunk, ending at 100.
    #[instrument(skip_all, fields(filename = %upload.filename))]
    pub async fn ingest<P>(&self, upload: &Upload, on_progress: P) -> Result<IngestReport, IngestError>
    where
        P: FnMut(u8),
    {
        ensure_csv_filename(&upload.filename)?;
        let parsed = parse_records(&upload.content)?;
        if parsed.rows.is_empty() {
            warn!(target: "pipeline", "no data rows; nothing recorded");
            return Err(InputError::Empty.into());
        }
        let records_count = parsed.rows.len();

        let run = start_run(self.runs, &upload.filename, records_count as i64)
            .await
            .map_err(IngestError::RunCreate)?;
        let run_id = run.id();

        let deduped = deduplicate(&parsed.rows, &self.settings.dates);
        if deduped.tickets.is_empty() {
            warn!(target: "pipeline", %run_id, records_count, "no rows carry an id; nothing to write");
        }

        let summary =
            match upsert_in_chunks(self.tickets, &deduped.tickets, &self.settings.batch, on_progress)
                .await
            {
                Ok(summary) => summary,
                Err(failure) => {
                    let err = IngestError::ChunkWrite {
                        run_id,
                        failed_chunk: failure.failed_chunk,
                        total_chunks: failure.total_chunks,
                        committed_chunks: failure.committed_chunks,
                        committed_tickets: failure.committed_tickets,
                        source: failure.source,
                    };
                    error!(target: "pipeline", %run_id, error = %err, "ingestion failed");
                    // The tracker logs its own finalize error; the chunk error is returned.
                    if run.fail(format!("import failed: {err}")).await.is_err() {
                        warn!(target: "pipeline", %run_id, "failure could not be recorded on the run");
                    }
                    return Err(err);
                }
            };

        let finalize_error = run.succeed().await.err().map(|e| format!("{e:#}"));
        let message = format!("{} records processed successfully", summary.tickets);
        info!(
            target: "pipeline",
            %run_id,
            records_count,
            tickets = summary.tickets,
            chunks = summary.chunks,
            status_recorded = finalize_error.is_none(),
            "{message}"
        );
        Ok(IngestReport {
            run_id,
            status: RunStatus::Success,
            records_count,
            tickets_written: summary.tickets,
            duplicates: deduped.duplicates,
            missing_id: deduped.missing_id,
            chunks: summary.chunks,
            message,
            finalize_error,
        })
    }
}
