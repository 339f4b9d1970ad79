//! Postgres (Supabase) adapters for the ticket and run-history stores.
//!
//! No migrations are run. The tables are expected to look like:
//!
//! ```sql
//! CREATE TABLE tickets (
//!     id                text PRIMARY KEY,
//!     created_at        text,
//!     status            text,
//!     status_grouped    text,
//!     requested_by      text,
//!     responsible_group text,
//!     description       text,
//!     solution          text
//! );
//! CREATE TABLE upload_history (
//!     id            uuid PRIMARY KEY DEFAULT gen_random_uuid(),
//!     filename      text NOT NULL,
//!     status        text NOT NULL,
//!     records_count bigint NOT NULL,
//!     created_at    timestamptz NOT NULL DEFAULT now(),
//!     error_message text
//! );
//! ```
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, QueryBuilder, Row};
use tracing::{debug, instrument};

use super::store::{RunStore, TicketStore};
use crate::ingest::model::{IngestionRun, NewRun, RunId, RunStatus, RunUpdate, Ticket};
use crate::normalization::header::TICKET_FIELDS;
use crate::util::db::Db;

/// Postgres caps a statement at 65535 bind parameters; each ticket binds one per field.
pub const MAX_TICKETS_PER_STATEMENT: usize = u16::MAX as usize / TICKET_FIELDS.len();

/// Table names are spliced into SQL, so only plain (optionally schema-qualified)
/// identifiers are accepted.
pub fn validate_table_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.split('.').count() <= 2
        && name.split('.').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if !valid {
        bail!("invalid table name '{name}'");
    }
    Ok(())
}

#[derive(Clone)]
pub struct PgTicketStore {
    db: Db,
    table: String,
}

impl PgTicketStore {
    pub fn new(db: Db, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        Ok(Self {
            db,
            table: table.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl TicketStore for PgTicketStore {
    #[instrument(skip(self, tickets), fields(table = %self.table, count = tickets.len()))]
    async fn upsert(&self, tickets: &[Ticket]) -> Result<()> {
        if tickets.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} (id, created_at, status, status_grouped, requested_by, responsible_group, description, solution) ",
            self.table
        ));
        qb.push_values(tickets, |mut b, t| {
            b.push_bind(&t.id)
                .push_bind(t.created_at.as_ref().map(|c| c.to_string()))
                .push_bind(&t.status)
                .push_bind(&t.status_grouped)
                .push_bind(&t.requested_by)
                .push_bind(&t.responsible_group)
                .push_bind(&t.description)
                .push_bind(&t.solution);
        });
        qb.push(
            " ON CONFLICT (id)
              DO UPDATE SET created_at = EXCLUDED.created_at,
                            status = EXCLUDED.status,
                            status_grouped = EXCLUDED.status_grouped,
                            requested_by = EXCLUDED.requested_by,
                            responsible_group = EXCLUDED.responsible_group,
                            description = EXCLUDED.description,
                            solution = EXCLUDED.solution",
        );
        let res = qb
            .build()
            .persistent(false)
            .execute(&self.db.pool)
            .await
            .with_context(|| format!("upsert of {} tickets into {}", tickets.len(), self.table))?;
        debug!(rows_affected = res.rows_affected(), "ticket chunk upserted");
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgRunStore {
    db: Db,
    table: String,
}

impl PgRunStore {
    pub fn new(db: Db, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        Ok(Self {
            db,
            table: table.to_string(),
        })
    }
}

fn run_from_row(row: &PgRow) -> Result<IngestionRun> {
    let status: String = row.try_get("status")?;
    Ok(IngestionRun {
        id: row.try_get::<RunId, _>("id")?,
        filename: row.try_get("filename")?,
        status: status.parse::<RunStatus>()?,
        records_count: row.try_get("records_count")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        error_message: row.try_get("error_message")?,
    })
}

#[async_trait::async_trait]
impl RunStore for PgRunStore {
    #[instrument(skip(self, run), fields(table = %self.table, filename = %run.filename))]
    async fn create(&self, run: &NewRun) -> Result<IngestionRun> {
        let sql = format!(
            "INSERT INTO {} (filename, status, records_count) VALUES ($1, $2, $3)
             RETURNING id, filename, status, records_count, created_at, error_message",
            self.table
        );
        let row = sqlx::query(&sql)
            .persistent(false)
            .bind(&run.filename)
            .bind(run.status.as_str())
            .bind(run.records_count)
            .fetch_one(&self.db.pool)
            .await
            .with_context(|| format!("insert into {}", self.table))?;
        run_from_row(&row)
    }

    #[instrument(skip(self, update), fields(table = %self.table, status = %update.status))]
    async fn update(&self, id: RunId, update: &RunUpdate) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET status = $1, error_message = $2 WHERE id = $3",
            self.table
        );
        let res = sqlx::query(&sql)
            .persistent(false)
            .bind(update.status.as_str())
            .bind(update.error_message.as_deref())
            .bind(id)
            .execute(&self.db.pool)
            .await
            .with_context(|| format!("update {} run {id}", self.table))?;
        if res.rows_affected() == 0 {
            bail!("run {id} not found in {}", self.table);
        }
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<IngestionRun>> {
        let sql = format!(
            "SELECT id, filename, status, records_count, created_at, error_message
             FROM {} ORDER BY created_at DESC LIMIT $1",
            self.table
        );
        let rows = sqlx::query(&sql)
            .persistent(false)
            .bind(limit.max(0))
            .fetch_all(&self.db.pool)
            .await
            .with_context(|| format!("select recent runs from {}", self.table))?;
        rows.iter().map(run_from_row).collect()
    }
}
