use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

use super::model::Ticket;
use crate::database_ops::store::TicketStore;

pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_PACE: Duration = Duration::from_millis(100);

/// Chunk size plus the fixed delay slept between two chunk writes.
///
/// The delay is an open-loop rate limit on the store, not flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub chunk_size: usize,
    pub pace: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            pace: DEFAULT_PACE,
        }
    }
}

impl BatchSettings {
    pub fn total_chunks(&self, tickets: usize) -> usize {
        tickets.div_ceil(self.chunk_size.max(1))
    }
}

/// `round(100 * done / total)`, halves rounding up. Zero chunks counts as done.
pub fn progress_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (200 * done + total) / (2 * total);
    pct.min(100) as u8
}

/// Where a batch write stopped.
#[derive(Debug)]
pub struct BatchFailure {
    /// 1-based index of the chunk whose write failed.
    pub failed_chunk: usize,
    pub total_chunks: usize,
    pub committed_chunks: usize,
    pub committed_tickets: usize,
    pub source: anyhow::Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub chunks: usize,
    pub tickets: usize,
}

/// Write `tickets` in order, one upsert per chunk, strictly sequentially.
///
/// `on_progress` receives the percentage after every acknowledged chunk. The
/// first failing chunk stops the batch; chunks already written stay written.
#[instrument(skip_all, fields(tickets = tickets.len(), chunk_size = settings.chunk_size))]
pub async fn upsert_in_chunks<S, P>(
    store: &S,
    tickets: &[Ticket],
    settings: &BatchSettings,
    mut on_progress: P,
) -> Result<BatchSummary, BatchFailure>
where
    S: TicketStore + ?Sized,
    P: FnMut(u8),
{
    let chunk_size = settings.chunk_size.max(1);
    let total_chunks = settings.total_chunks(tickets.len());
    let mut committed_tickets = 0usize;

    for (idx, chunk) in tickets.chunks(chunk_size).enumerate() {
        if idx > 0 && !settings.pace.is_zero() {
            sleep(settings.pace).await;
        }
        if let Err(source) = store.upsert(chunk).await {
            return Err(BatchFailure {
                failed_chunk: idx + 1,
                total_chunks,
                committed_chunks: idx,
                committed_tickets,
                source,
            });
        }
        committed_tickets += chunk.len();
        let pct = progress_percent(idx + 1, total_chunks);
        debug!(target: "upsert", chunk = idx + 1, total_chunks, pct, "chunk written");
        on_progress(pct);
    }

    if total_chunks == 0 {
        on_progress(100);
    }
    info!(target: "upsert", chunks = total_chunks, tickets = committed_tickets, "all chunks written");
    Ok(BatchSummary {
        chunks: total_chunks,
        tickets: committed_tickets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::memory::MemoryTicketStore;

    fn tickets(n: usize) -> Vec<Ticket> {
        (0..n)
            .map(|i| Ticket {
                id: i.to_string(),
                created_at: None,
                status: Some("Aberto".into()),
                status_grouped: None,
                requested_by: None,
                responsible_group: None,
                description: None,
                solution: None,
            })
            .collect()
    }

    fn fast(chunk_size: usize) -> BatchSettings {
        BatchSettings {
            chunk_size,
            pace: Duration::ZERO,
        }
    }

    #[test]
    fn progress_rounds_half_up() {
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(1, 8), 13);
        assert_eq!(progress_percent(3, 3), 100);
        assert_eq!(progress_percent(0, 0), 100);
    }

    #[tokio::test]
    async fn issues_ceil_n_over_c_calls_with_increasing_progress() {
        let store = MemoryTicketStore::new();
        let mut seen = Vec::new();
        let summary = upsert_in_chunks(&store, &tickets(7), &fast(3), |p| seen.push(p))
            .await
            .unwrap();
        assert_eq!(summary, BatchSummary { chunks: 3, tickets: 7 });
        assert_eq!(store.calls(), vec![3, 3, 1]);
        assert_eq!(seen, vec![33, 67, 100]);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn stops_at_first_failed_chunk_without_rollback() {
        let store = MemoryTicketStore::failing_on_call(2);
        let mut seen = Vec::new();
        let err = upsert_in_chunks(&store, &tickets(5), &fast(2), |p| seen.push(p))
            .await
            .unwrap_err();
        assert_eq!(err.failed_chunk, 2);
        assert_eq!(err.total_chunks, 3);
        assert_eq!(err.committed_chunks, 1);
        assert_eq!(err.committed_tickets, 2);
        assert_eq!(store.calls(), vec![2, 2]);
        assert_eq!(store.tickets().len(), 2);
        assert_eq!(seen, vec![33]);
    }

    #[tokio::test]
    async fn empty_input_reports_completion_without_writes() {
        let store = MemoryTicketStore::new();
        let mut seen = Vec::new();
        let summary = upsert_in_chunks(&store, &[], &fast(10), |p| seen.push(p))
            .await
            .unwrap();
        assert_eq!(summary.chunks, 0);
        assert!(store.calls().is_empty());
        assert_eq!(seen, vec![100]);
    }

    #[tokio::test]
    async fn paces_between_chunks_only() {
        let store = MemoryTicketStore::new();
        let settings = BatchSettings {
            chunk_size: 1,
            pace: Duration::from_millis(20),
        };
        let start = std::time::Instant::now();
        upsert_in_chunks(&store, &tickets(3), &settings, |_| {})
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
