use std::path::PathBuf;
use thiserror::Error;

use super::model::RunId;

/// Problems with the uploaded file itself. Always raised before any store call.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("unsupported file type '{filename}': only .csv files are accepted")]
    UnsupportedFileType { filename: String },
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed csv near line {line}: {message}")]
    Malformed { line: u64, message: String },
    #[error("the file is empty: no data rows after the header")]
    Empty,
}

/// Fatal pipeline failures. A failed run finalization is not one of these; it
/// is reported on [`super::pipeline::IngestReport::finalize_error`].
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("could not create run record: {0:#}")]
    RunCreate(#[source] anyhow::Error),
    #[error(
        "chunk {failed_chunk} of {total_chunks} failed ({committed_chunks} chunks, {committed_tickets} tickets already committed): {source:#}"
    )]
    ChunkWrite {
        run_id: RunId,
        /// 1-based index of the chunk that failed.
        failed_chunk: usize,
        total_chunks: usize,
        committed_chunks: usize,
        committed_tickets: usize,
        #[source]
        source: anyhow::Error,
    },
}

impl IngestError {
    /// Run record left behind by this failure, if one was created.
    pub fn run_id(&self) -> Option<RunId> {
        match self {
            IngestError::ChunkWrite { run_id, .. } => Some(*run_id),
            IngestError::Input(_) | IngestError::RunCreate(_) => None,
        }
    }
}
