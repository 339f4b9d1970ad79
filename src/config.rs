use anyhow::{anyhow, bail, Result};
use std::time::Duration;

use crate::database_ops::postgres::{validate_table_name, MAX_TICKETS_PER_STATEMENT};
use crate::ingest::upsert::{BatchSettings, DEFAULT_CHUNK_SIZE, DEFAULT_PACE};
use crate::ingest::IngestSettings;
use crate::normalization::date::{DateNormalizer, DEFAULT_SOURCE_OFFSET_MINUTES};
use crate::util::env::env_parse;

/// Runtime knobs for an import, read from the environment and overridable from the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub chunk_size: usize,
    pub pace_ms: u64,
    /// Offset (minutes east of UTC) of the wall-clock times in the export.
    pub source_offset_minutes: i32,
    pub tickets_table: String,
    pub runs_table: String,
    pub max_connections: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            pace_ms: DEFAULT_PACE.as_millis() as u64,
            source_offset_minutes: DEFAULT_SOURCE_OFFSET_MINUTES,
            tickets_table: "tickets".to_string(),
            runs_table: "upload_history".to_string(),
            max_connections: 5,
        }
    }
}

/// Env keys worth echoing in the startup snapshot.
pub const LOGGED_ENV_KEYS: &[&str] = &[
    "DATABASE_URL",
    "SUPABASE_DB_SESSION_URL",
    "SUPABASE_DB_URL",
    "INGEST_CHUNK_SIZE",
    "INGEST_PACE_MS",
    "SOURCE_UTC_OFFSET_MINUTES",
    "TICKETS_TABLE",
    "RUNS_TABLE",
    "DB_MAX_CONNECTIONS",
];

impl IngestConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            chunk_size: env_parse("INGEST_CHUNK_SIZE", d.chunk_size),
            pace_ms: env_parse("INGEST_PACE_MS", d.pace_ms),
            source_offset_minutes: env_parse("SOURCE_UTC_OFFSET_MINUTES", d.source_offset_minutes),
            tickets_table: env_parse("TICKETS_TABLE", d.tickets_table),
            runs_table: env_parse("RUNS_TABLE", d.runs_table),
            max_connections: env_parse("DB_MAX_CONNECTIONS", d.max_connections),
        }
    }

    pub fn with_overrides(mut self, chunk_size: Option<usize>, pace_ms: Option<u64>) -> Self {
        if let Some(c) = chunk_size {
            self.chunk_size = c;
        }
        if let Some(p) = pace_ms {
            self.pace_ms = p;
        }
        self
    }

    /// Reject settings that would misbehave only once the import is underway.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk size must be at least 1");
        }
        if self.chunk_size > MAX_TICKETS_PER_STATEMENT {
            bail!(
                "chunk size {} exceeds {MAX_TICKETS_PER_STATEMENT} tickets per upsert statement",
                self.chunk_size
            );
        }
        validate_table_name(&self.tickets_table)?;
        validate_table_name(&self.runs_table)?;
        self.date_normalizer()?;
        Ok(())
    }

    fn date_normalizer(&self) -> Result<DateNormalizer> {
        DateNormalizer::from_offset_minutes(self.source_offset_minutes).ok_or_else(|| {
            anyhow!(
                "source utc offset {} minutes is out of range",
                self.source_offset_minutes
            )
        })
    }

    pub fn ingest_settings(&self) -> Result<IngestSettings> {
        self.validate()?;
        Ok(IngestSettings {
            batch: BatchSettings {
                chunk_size: self.chunk_size,
                pace: Duration::from_millis(self.pace_ms),
            },
            dates: self.date_normalizer()?,
        })
    }
}
