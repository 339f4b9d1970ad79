//! In-process stores used by `--dry-run` and by the pipeline tests.
use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use indexmap::IndexMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::store::{RunStore, TicketStore};
use crate::ingest::model::{IngestionRun, NewRun, RunId, RunUpdate, Ticket};

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[derive(Default)]
pub struct MemoryTicketStore {
    rows: Mutex<IndexMap<String, Ticket>>,
    calls: Mutex<Vec<usize>>,
    /// 1-based upsert call that should fail.
    fail_on_call: Option<usize>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on_call(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    /// Stored tickets in first-insert order.
    pub fn tickets(&self) -> Vec<Ticket> {
        self.rows
            .lock()
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, id: &str) -> Option<Ticket> {
        self.rows.lock().ok()?.get(id).cloned()
    }

    /// Chunk sizes of every upsert call, failed ones included.
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl TicketStore for MemoryTicketStore {
    async fn upsert(&self, tickets: &[Ticket]) -> Result<()> {
        let call = {
            let mut calls = self.calls.lock().map_err(poisoned)?;
            calls.push(tickets.len());
            calls.len()
        };
        if self.fail_on_call == Some(call) {
            bail!("upsert call {call} rejected by store");
        }
        let mut rows = self.rows.lock().map_err(poisoned)?;
        for ticket in tickets {
            rows.insert(ticket.id.clone(), ticket.clone());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRunStore {
    runs: Mutex<Vec<IngestionRun>>,
    updates: Mutex<Vec<(RunId, RunUpdate)>>,
    fail_create: bool,
    fail_update: bool,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    pub fn failing_update() -> Self {
        Self {
            fail_update: true,
            ..Self::default()
        }
    }

    /// All runs in creation order.
    pub fn runs(&self) -> Vec<IngestionRun> {
        self.runs.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Every update call received, including rejected ones.
    pub fn updates(&self) -> Vec<(RunId, RunUpdate)> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl RunStore for MemoryRunStore {
    async fn create(&self, run: &NewRun) -> Result<IngestionRun> {
        if self.fail_create {
            bail!("run history store unavailable");
        }
        let created = IngestionRun {
            id: Uuid::new_v4(),
            filename: run.filename.clone(),
            status: run.status,
            records_count: run.records_count,
            created_at: Utc::now(),
            error_message: None,
        };
        self.runs.lock().map_err(poisoned)?.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: RunId, update: &RunUpdate) -> Result<()> {
        self.updates
            .lock()
            .map_err(poisoned)?
            .push((id, update.clone()));
        if self.fail_update {
            bail!("run history store rejected update");
        }
        let mut runs = self.runs.lock().map_err(poisoned)?;
        let run = runs
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow!("run {id} not found"))?;
        run.status = update.status;
        run.error_message = update.error_message.clone();
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<IngestionRun>> {
        let runs = self.runs.lock().map_err(poisoned)?;
        let take = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(runs.iter().rev().take(take).cloned().collect())
    }
}
