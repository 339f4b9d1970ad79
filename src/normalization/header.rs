/// Canonical ticket field names produced by [`normalize_header`].
pub const ID: &str = "id";
pub const CREATED_AT: &str = "created_at";
pub const STATUS: &str = "status";
pub const STATUS_GROUPED: &str = "status_grouped";
pub const REQUESTED_BY: &str = "requested_by";
pub const RESPONSIBLE_GROUP: &str = "responsible_group";
pub const DESCRIPTION: &str = "description";
pub const SOLUTION: &str = "solution";

/// Every field a [`crate::ingest::model::Ticket`] stores.
pub const TICKET_FIELDS: [&str; 8] = [
    ID,
    CREATED_AT,
    STATUS,
    STATUS_GROUPED,
    REQUESTED_BY,
    RESPONSIBLE_GROUP,
    DESCRIPTION,
    SOLUTION,
];

/// Known export headers (compared case-insensitively) and their canonical field.
///
/// The second block holds the column names used by the legacy ticket table so
/// files exported from it re-import onto the same fields.
const HEADER_MAP: &[(&str, &str)] = &[
    ("ID", ID),
    ("Criação", CREATED_AT),
    ("Criação (UTC-3)", CREATED_AT),
    ("Status", STATUS),
    ("Status (Agrupado)", STATUS_GROUPED),
    ("Solicitado para", REQUESTED_BY),
    ("Grupo responsável", RESPONSIBLE_GROUP),
    ("Descrição", DESCRIPTION),
    ("Solução", SOLUTION),
    ("hora_criacao", CREATED_AT),
    ("status_agrupado", STATUS_GROUPED),
    ("solicitado_para", REQUESTED_BY),
    ("grupo_responsavel", RESPONSIBLE_GROUP),
    ("descricao", DESCRIPTION),
    ("solucao", SOLUTION),
];

/// Byte-order mark, zero-width and bidi control characters that spreadsheet
/// exports like to leave around header cells.
fn is_invisible_marker(c: char) -> bool {
    matches!(
        c,
        '\u{FEFF}' | '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2069}'
    )
}

fn strip_header_noise(raw: &str) -> &str {
    let mut current = raw;
    loop {
        let next = current
            .trim()
            .trim_matches(is_invisible_marker)
            .trim_matches('"');
        if next.len() == current.len() {
            return next;
        }
        current = next;
    }
}

/// Map a raw header cell to its canonical field name.
///
/// Normalization steps:
/// - strip quotes, whitespace and invisible markers from both ends, repeated
///   until nothing changes so their nesting order does not matter
/// - look the cleaned value up in the header table, ignoring case
/// - otherwise lowercase it and collapse whitespace runs into `_`
///
/// Never fails: unknown headers come back as a best-effort slug.
pub fn normalize_header(raw: &str) -> String {
    let clean = strip_header_noise(raw);
    let lowered = clean.to_lowercase();

    if let Some((_, canonical)) = HEADER_MAP
        .iter()
        .find(|(label, _)| label.to_lowercase() == lowered)
    {
        return (*canonical).to_string();
    }

    lowered.split_whitespace().collect::<Vec<_>>().join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_export_headers() {
        assert_eq!(normalize_header("ID"), ID);
        assert_eq!(normalize_header("Criação (UTC-3)"), CREATED_AT);
        assert_eq!(normalize_header("Criação"), CREATED_AT);
        assert_eq!(normalize_header("Status (Agrupado)"), STATUS_GROUPED);
        assert_eq!(normalize_header("Solicitado para"), REQUESTED_BY);
        assert_eq!(normalize_header("Grupo responsável"), RESPONSIBLE_GROUP);
        assert_eq!(normalize_header("Descrição"), DESCRIPTION);
        assert_eq!(normalize_header("Solução"), SOLUTION);
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(normalize_header("status (agrupado)"), STATUS_GROUPED);
        assert_eq!(normalize_header("SOLUÇÃO"), SOLUTION);
    }

    #[test]
    fn strips_bom_quotes_and_bidi_marks() {
        assert_eq!(normalize_header("\u{FEFF}\"ID\""), ID);
        assert_eq!(normalize_header("\"\u{FEFF}ID\""), ID);
        assert_eq!(normalize_header("  \u{200E}Status\u{200F} "), STATUS);
    }

    #[test]
    fn canonical_names_are_fixed_points() {
        for name in TICKET_FIELDS {
            assert_eq!(normalize_header(name), name);
        }
    }

    #[test]
    fn legacy_column_names_map_to_canonical_fields() {
        assert_eq!(normalize_header("hora_criacao"), CREATED_AT);
        assert_eq!(normalize_header("grupo_responsavel"), RESPONSIBLE_GROUP);
    }

    #[test]
    fn unknown_headers_become_slugs() {
        assert_eq!(normalize_header("Data de  Fechamento"), "data_de_fechamento");
        assert_eq!(normalize_header("Prioridade"), "prioridade");
        assert_eq!(normalize_header(""), "");
    }
}
