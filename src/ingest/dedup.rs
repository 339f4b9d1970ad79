use indexmap::IndexMap;
use tracing::{info, instrument};

use super::model::Ticket;
use super::parser::RawRow;
use crate::normalization::header as field;
use crate::normalization::DateNormalizer;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deduplicated {
    pub tickets: Vec<Ticket>,
    /// Rows dropped because `id` was missing or blank.
    pub missing_id: usize,
    /// Rows overwritten by a later row with the same `id`.
    pub duplicates: usize,
}

/// Project a raw row onto the typed ticket. `None` when the row has no usable id.
pub fn project_ticket(row: &RawRow, dates: &DateNormalizer) -> Option<Ticket> {
    let id = row.get(field::ID).map(str::trim).filter(|id| !id.is_empty())?;
    let text = |name: &str| row.get(name).map(str::to_string);
    Some(Ticket {
        id: id.to_string(),
        created_at: row.get(field::CREATED_AT).and_then(|raw| dates.normalize(raw)),
        status: text(field::STATUS),
        status_grouped: text(field::STATUS_GROUPED),
        requested_by: text(field::REQUESTED_BY),
        responsible_group: text(field::RESPONSIBLE_GROUP),
        description: text(field::DESCRIPTION),
        solution: text(field::SOLUTION),
    })
}

/// Collapse rows sharing an `id`, the last row in file order winning.
///
/// Output follows the order in which each id was first seen; only the values
/// come from the last occurrence. Upserts are keyed on `id`, so this order only
/// decides chunk membership and never the final stored state.
#[instrument(skip_all, fields(rows = rows.len()))]
pub fn deduplicate(rows: &[RawRow], dates: &DateNormalizer) -> Deduplicated {
    let mut latest: IndexMap<&str, &RawRow> = IndexMap::with_capacity(rows.len());
    let mut missing_id = 0usize;
    let mut duplicates = 0usize;

    for row in rows {
        match row.get(field::ID).map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => {
                if latest.insert(id, row).is_some() {
                    duplicates += 1;
                }
            }
            None => missing_id += 1,
        }
    }

    let tickets: Vec<Ticket> = latest
        .values()
        .filter_map(|row| project_ticket(row, dates))
        .collect();
    info!(
        target: "dedup",
        unique = tickets.len(),
        duplicates,
        missing_id,
        "deduplicated rows"
    );
    Deduplicated {
        tickets,
        missing_id,
        duplicates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalization::CreatedAt;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs.iter().copied().collect()
    }

    #[test]
    fn later_row_wins_for_same_id() {
        let rows = vec![
            row(&[("id", "1"), ("status", "Aberto")]),
            row(&[("id", "1"), ("status", "Resolvido")]),
        ];
        let out = deduplicate(&rows, &DateNormalizer::default());
        assert_eq!(out.tickets.len(), 1);
        assert_eq!(out.tickets[0].status.as_deref(), Some("Resolvido"));
        assert_eq!(out.duplicates, 1);
    }

    #[test]
    fn keeps_first_seen_order() {
        let rows = vec![
            row(&[("id", "1"), ("status", "Aberto")]),
            row(&[("id", "2"), ("status", "Fechado")]),
            row(&[("id", "1"), ("status", "Resolvido")]),
        ];
        let out = deduplicate(&rows, &DateNormalizer::default());
        let ids: Vec<&str> = out.tickets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(out.tickets[0].status.as_deref(), Some("Resolvido"));
        assert_eq!(out.tickets[1].status.as_deref(), Some("Fechado"));
    }

    #[test]
    fn rows_without_id_are_dropped_not_counted_as_duplicates() {
        let rows = vec![
            row(&[("id", ""), ("status", "Aberto")]),
            row(&[("id", "  "), ("status", "Aberto")]),
            row(&[("status", "Sem id")]),
            row(&[("id", "9"), ("status", "Aberto")]),
        ];
        let out = deduplicate(&rows, &DateNormalizer::default());
        assert_eq!(out.tickets.len(), 1);
        assert_eq!(out.missing_id, 3);
        assert_eq!(out.duplicates, 0);
    }

    #[test]
    fn projection_normalizes_created_at_and_keeps_missing_columns_empty() {
        let dates = DateNormalizer::from_offset_minutes(0).unwrap();
        let ticket = project_ticket(
            &row(&[("id", " 42 "), ("created_at", "01/02/2024 08:15"), ("solution", "")]),
            &dates,
        )
        .unwrap();
        assert_eq!(ticket.id, "42");
        assert_eq!(
            ticket.created_at.map(|c| c.to_string()).as_deref(),
            Some("2024-02-01T08:15:00Z")
        );
        assert_eq!(ticket.solution.as_deref(), Some(""));
        assert_eq!(ticket.status, None);

        let raw = project_ticket(&row(&[("id", "43"), ("created_at", "ontem")]), &dates).unwrap();
        assert_eq!(raw.created_at, Some(CreatedAt::Raw("ontem".into())));
    }
}
