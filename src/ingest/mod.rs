//! Ticket export ingestion: parse, deduplicate, upsert in chunks, track the run.
pub mod dedup;
pub mod error;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod runs;
pub mod upsert;

pub use error::{IngestError, InputError};
pub use model::{IngestionRun, RunId, RunStatus, Ticket};
pub use pipeline::{IngestPipeline, IngestReport, IngestSettings, Upload};
pub use upsert::BatchSettings;
