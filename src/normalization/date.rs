use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, SecondsFormat, TimeZone, Utc};
use std::fmt;

/// Offset of the wall-clock times written by the ticket export ("Criação (UTC-3)").
pub const DEFAULT_SOURCE_OFFSET_MINUTES: i32 = -180;

/// Creation time of a ticket as it will be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatedAt {
    Parsed(DateTime<Utc>),
    /// Value that did not look like `DD/MM/YYYY HH:MM`, kept verbatim.
    Raw(String),
}

impl CreatedAt {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            CreatedAt::Parsed(ts) => Some(*ts),
            CreatedAt::Raw(_) => None,
        }
    }
}

impl fmt::Display for CreatedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreatedAt::Parsed(ts) => f.write_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
            CreatedAt::Raw(raw) => f.write_str(raw),
        }
    }
}

/// Best-effort converter for the export's `DD/MM/YYYY HH:MM` timestamps.
///
/// This is not a validator. Anything that is not exactly that shape (or names
/// an impossible calendar date) is handed back untouched as [`CreatedAt::Raw`].
#[derive(Debug, Clone, Copy)]
pub struct DateNormalizer {
    source_offset: FixedOffset,
}

impl Default for DateNormalizer {
    fn default() -> Self {
        Self::from_offset_minutes(DEFAULT_SOURCE_OFFSET_MINUTES)
            .unwrap_or_else(|| Self::new(Utc.fix()))
    }
}

impl DateNormalizer {
    pub fn new(source_offset: FixedOffset) -> Self {
        Self { source_offset }
    }

    /// `None` when the offset is outside ±24h.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::new)
    }

    pub fn source_offset(&self) -> FixedOffset {
        self.source_offset
    }

    /// Empty (or whitespace-only) input yields `None`.
    pub fn normalize(&self, raw: &str) -> Option<CreatedAt> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match self.parse_wall_clock(trimmed) {
            Some(ts) => CreatedAt::Parsed(ts),
            None => CreatedAt::Raw(raw.to_string()),
        })
    }

    fn parse_wall_clock(&self, s: &str) -> Option<DateTime<Utc>> {
        if !has_wall_clock_shape(s) {
            return None;
        }
        let naive = NaiveDateTime::parse_from_str(s, WALL_CLOCK_FORMAT).ok()?;
        self.source_offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

const WALL_CLOCK_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Exactly `DD/MM/YYYY HH:MM`. chrono alone would also take single-digit fields.
fn has_wall_clock_shape(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 16
        && b.iter().enumerate().all(|(i, c)| match i {
            2 | 5 => *c == b'/',
            10 => *c == b' ',
            13 => *c == b':',
            _ => c.is_ascii_digit(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc_minus_3() -> DateNormalizer {
        DateNormalizer::from_offset_minutes(-180).unwrap()
    }

    #[test]
    fn converts_export_format_in_source_offset() {
        let norm = utc_minus_3();
        let out = norm.normalize("05/03/2024 14:30").unwrap();
        let expected = norm
            .source_offset()
            .with_ymd_and_hms(2024, 3, 5, 14, 30, 0)
            .unwrap();
        assert_eq!(out.timestamp(), Some(expected.with_timezone(&Utc)));
        assert_eq!(out.to_string(), "2024-03-05T17:30:00Z");
    }

    #[test]
    fn utc_source_keeps_wall_clock() {
        let norm = DateNormalizer::from_offset_minutes(0).unwrap();
        let out = norm.normalize(" 31/12/2023 23:59 ").unwrap();
        assert_eq!(out.to_string(), "2023-12-31T23:59:00Z");
    }

    #[test]
    fn passes_through_unrecognized_values() {
        let norm = utc_minus_3();
        for raw in [
            "not-a-date",
            "2024-03-05T14:30:00Z",
            "5/3/2024 14:30",
            "05/03/2024 14:30:15",
            "05/03/2024",
            "31/02/2024 10:00",
            "05/13/2024 10:00",
            "05/03/2024 24:00",
            "05/03/+024 14:30",
            "05/03/2024 1:300",
        ] {
            assert_eq!(norm.normalize(raw), Some(CreatedAt::Raw(raw.to_string())), "{raw}");
        }
    }

    #[test]
    fn empty_input_is_none() {
        let norm = utc_minus_3();
        assert_eq!(norm.normalize(""), None);
        assert_eq!(norm.normalize("   "), None);
    }

    #[test]
    fn rejects_out_of_range_offsets() {
        assert!(DateNormalizer::from_offset_minutes(24 * 60).is_none());
        assert!(DateNormalizer::from_offset_minutes(i32::MAX).is_none());
    }
}
