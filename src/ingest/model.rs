use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::normalization::CreatedAt;

/// One ticket as written to the ticket store. `id` is the upsert conflict key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ticket {
    pub id: String,
    #[serde(serialize_with = "serialize_created_at")]
    pub created_at: Option<CreatedAt>,
    pub status: Option<String>,
    pub status_grouped: Option<String>,
    pub requested_by: Option<String>,
    pub responsible_group: Option<String>,
    /// May contain HTML markup from the helpdesk export.
    pub description: Option<String>,
    pub solution: Option<String>,
}

fn serialize_created_at<S>(value: &Option<CreatedAt>, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(v) => s.collect_str(v),
        None => s.serialize_none(),
    }
}

pub type RunId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    #[serde(rename = "Processando")]
    Processing,
    #[serde(rename = "Sucesso")]
    Success,
    #[serde(rename = "Erro")]
    Failure,
}

impl RunStatus {
    /// Label persisted in the run-history table.
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Processing => "Processando",
            RunStatus::Success => "Sucesso",
            RunStatus::Failure => "Erro",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Processing)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "processando" | "processing" => Ok(RunStatus::Processing),
            "sucesso" | "success" => Ok(RunStatus::Success),
            "erro" | "failure" | "error" => Ok(RunStatus::Failure),
            other => Err(anyhow!("unknown run status '{other}'")),
        }
    }
}

/// One ingestion attempt as recorded in the run-history store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionRun {
    pub id: RunId,
    pub filename: String,
    pub status: RunStatus,
    /// Parsed rows before deduplication.
    pub records_count: i64,
    pub created_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRun {
    pub filename: String,
    pub status: RunStatus,
    pub records_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunUpdate {
    pub status: RunStatus,
    pub error_message: Option<String>,
}
