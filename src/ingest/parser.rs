use csv::{ReaderBuilder, StringRecord, Trim};
use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};

use super::error::InputError;
use crate::normalization::header::{self, normalize_header};

pub const DELIMITER: u8 = b';';

/// One data line keyed by canonical field name, in column order.
///
/// Loosely typed on purpose; it never leaves the ingest module before being
/// projected into a [`super::model::Ticket`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    fields: IndexMap<String, String>,
}

impl RawRow {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    /// Canonical names, one per header column (duplicates included).
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|f| f.trim().is_empty()) && record.len() <= 1
}

/// Parse a semicolon-delimited UTF-8 export into rows keyed by canonical field.
///
/// Row shape rules:
/// - lines that are empty or whitespace-only are skipped everywhere, so the
///   first non-blank line is the header
/// - short rows get `""` for the missing trailing columns
/// - cells beyond the header width are ignored
/// - when two header cells normalize to the same name the first column wins
///
/// A file with no data rows is not an error here; it comes back with zero rows.
#[instrument(skip(content), fields(bytes = content.len()))]
pub fn parse_records(content: &[u8]) -> Result<ParsedFile, InputError> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .trim(Trim::None)
        .from_reader(content);

    let mut parsed = ParsedFile::default();
    let mut header_seen = false;
    let mut ragged = 0usize;

    for result in rdr.records() {
        let record = result.map_err(|e| InputError::Malformed {
            line: e.position().map(|p| p.line()).unwrap_or(0),
            message: e.to_string(),
        })?;
        if is_blank(&record) {
            continue;
        }

        if !header_seen {
            parsed.columns = record.iter().map(normalize_header).collect();
            header_seen = true;
            debug!(target: "parser", columns = ?parsed.columns, "header mapped");
            continue;
        }

        if record.len() != parsed.columns.len() {
            ragged += 1;
        }
        let mut fields: IndexMap<String, String> = IndexMap::with_capacity(parsed.columns.len());
        for (idx, column) in parsed.columns.iter().enumerate() {
            let value = record.get(idx).unwrap_or("");
            fields
                .entry(column.clone())
                .or_insert_with(|| value.to_string());
        }
        parsed.rows.push(RawRow { fields });
    }

    if ragged > 0 {
        warn!(target: "parser", ragged, "rows with a column count different from the header");
    }
    let unmapped: Vec<&str> = parsed
        .columns
        .iter()
        .map(String::as_str)
        .filter(|c| !header::TICKET_FIELDS.contains(c))
        .collect();
    if !unmapped.is_empty() {
        debug!(target: "parser", ?unmapped, "columns kept on raw rows but not stored on tickets");
    }
    info!(target: "parser", rows = parsed.rows.len(), "parsed csv");
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_rows_against_normalized_headers() {
        let input = "\u{FEFF}ID;Status;Solicitado para\n1;Aberto;Ana\n2;Fechado;Bruno\n";
        let parsed = parse_records(input.as_bytes()).unwrap();
        assert_eq!(parsed.columns, vec!["id", "status", "requested_by"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].get("id"), Some("1"));
        assert_eq!(parsed.rows[1].get("requested_by"), Some("Bruno"));
    }

    #[test]
    fn skips_blank_and_whitespace_lines() {
        let input = "\n   \nid;status\n\n1;Aberto\n  \n2;Fechado\n\n";
        let parsed = parse_records(input.as_bytes()).unwrap();
        assert_eq!(parsed.columns, vec!["id", "status"]);
        assert_eq!(parsed.rows.len(), 2);
    }

    #[test]
    fn pads_short_rows_and_drops_extra_cells() {
        let input = "id;status;solution\n1;Aberto\n2;Fechado;Feito;sobra\n";
        let parsed = parse_records(input.as_bytes()).unwrap();
        assert_eq!(parsed.rows[0].get("solution"), Some(""));
        assert_eq!(parsed.rows[1].get("solution"), Some("Feito"));
        assert_eq!(parsed.rows[1].len(), 3);
    }

    #[test]
    fn quoted_cells_keep_delimiters_and_newlines() {
        let input = "id;description\n1;\"<p>linha 1;\nlinha 2</p>\"\n";
        let parsed = parse_records(input.as_bytes()).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].get("description"), Some("<p>linha 1;\nlinha 2</p>"));
    }

    #[test]
    fn unknown_columns_are_preserved_as_slugs() {
        let input = "id;Data de Fechamento\n1;02/01/2024 10:00\n";
        let parsed = parse_records(input.as_bytes()).unwrap();
        assert_eq!(parsed.rows[0].get("data_de_fechamento"), Some("02/01/2024 10:00"));
    }

    #[test]
    fn duplicate_header_keeps_first_column() {
        let input = "id;Status;status\n1;Aberto;ignorado\n";
        let parsed = parse_records(input.as_bytes()).unwrap();
        assert_eq!(parsed.rows[0].get("status"), Some("Aberto"));
    }

    #[test]
    fn header_only_or_empty_yields_no_rows() {
        assert!(parse_records(b"").unwrap().rows.is_empty());
        assert!(parse_records(b"id;status\n\n").unwrap().rows.is_empty());
    }

    #[test]
    fn invalid_utf8_is_malformed_input() {
        let mut input = b"id;status\n1;".to_vec();
        input.extend_from_slice(&[0xff, 0xfe, b'\n']);
        let err = parse_records(&input).unwrap_err();
        assert!(matches!(err, InputError::Malformed { .. }), "{err}");
    }
}
