//! Turning the values of one sheet into a deduplicated raw table.
//!
//! Reading the sheet itself is up to the caller. What happens here is the part
//! of the loading that does not depend on where the values come from.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use std::collections::HashMap;

use crate::config::*;
use crate::normalize::{normalize_header, normalize_id_like};

// Day-first forms are tried before the month-first ones.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %I:%M:%S %p",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%m/%d/%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Parses a date or date-time written in any of the usual spreadsheet forms.
///
/// Ambiguous dates such as `03/04/2024` are read day first (3 April).
/// Returns `None` when nothing matches.
///
/// ```
/// use applicant_merge::parse_timestamp;
///
/// let ts = parse_timestamp("03/04/2024 10:15:00").unwrap();
/// assert_eq!(ts.format("%Y-%m-%d").to_string(), "2024-04-03");
/// assert!(parse_timestamp("not a date").is_none());
/// ```
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS.iter() {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS.iter() {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Builds a raw table from all the values of a sheet.
///
/// `header_row` and `data_row` are 0-based row indices. If the sheet has no
/// header row or no rows after `data_row`, an empty table is returned.
/// Blank cells become no-values.
pub fn table_from_values(
    source_name: &str,
    values: &[Vec<String>],
    header_row: usize,
    data_row: usize,
) -> RawTable {
    let header: Vec<String> = match values.get(header_row) {
        Some(h) => h.clone(),
        None => {
            warn!(
                "table_from_values: source {}: no header row at index {} ({} rows in sheet)",
                source_name,
                header_row,
                values.len()
            );
            return RawTable::default();
        }
    };
    if values.len() <= data_row {
        warn!(
            "table_from_values: source {}: no data past row index {}",
            source_name, data_row
        );
        return RawTable::new(header, vec![]);
    }
    let rows: Vec<Vec<Cell>> = values[data_row..]
        .iter()
        .map(|r| {
            r.iter()
                .map(|s| {
                    if s.trim().is_empty() {
                        None
                    } else {
                        Some(Value::Text(s.clone()))
                    }
                })
                .collect()
        })
        .collect();
    debug!(
        "table_from_values: source {}: header: {:?} rows: {}",
        source_name,
        header,
        rows.len()
    );
    RawTable::new(header, rows)
}

// The canonical name of a header token, through the aliases.
fn resolve(aliases: &AliasMap, token: &str) -> String {
    aliases.get(token).unwrap_or(token).to_string()
}

// The first column labelled `name`, compared as normalized tokens. Failing
// that, the first column that the aliases map to the same field as `name`.
fn find_column(header: &[String], name: &str, aliases: &AliasMap) -> Option<usize> {
    let token = normalize_header(name);
    header
        .iter()
        .position(|h| normalize_header(h) == token)
        .or_else(|| {
            let target = resolve(aliases, &token);
            header
                .iter()
                .position(|h| resolve(aliases, &normalize_header(h)) == target)
        })
}

// The key of a row for deduplication: the identifier without whitespace,
// empty when the cell has no value.
fn dedup_key(row: &[Cell], key_idx: usize) -> String {
    let text = row.get(key_idx).and_then(|c| c.as_ref()).map(|v| v.as_text());
    normalize_id_like(text.as_deref()).unwrap_or_default()
}

/// Parses the values of the timestamp column in place.
///
/// The timestamp column is the first one whose label maps to `timestamp`
/// through the aliases, the same one the mapper keeps. Returns its index, or
/// `None` if there is no such column. Values that cannot be parsed become
/// no-values.
pub fn parse_timestamp_column(
    source_name: &str,
    table: &mut RawTable,
    aliases: &AliasMap,
) -> Option<usize> {
    let ts_idx = table
        .header
        .iter()
        .position(|h| resolve(aliases, &normalize_header(h)) == TIMESTAMP)?;
    let mut num_failed = 0;
    for row in table.rows.iter_mut() {
        let cell = match row.get_mut(ts_idx) {
            Some(c) => c,
            None => continue,
        };
        let parsed = match cell.take() {
            Some(Value::Text(s)) => {
                let p = parse_timestamp(&s);
                if p.is_none() {
                    debug!(
                        "parse_timestamp_column: source {}: cannot parse {:?}",
                        source_name, s
                    );
                    num_failed += 1;
                }
                p.map(Value::Timestamp)
            }
            other => other,
        };
        *cell = parsed;
    }
    if num_failed > 0 {
        warn!(
            "parse_timestamp_column: source {}: {} timestamps could not be parsed",
            source_name, num_failed
        );
    }
    Some(ts_idx)
}

/// Keeps one row per value of the unique column: the most recent one.
///
/// The unique column is found by its normalized label, or through the
/// aliases. Keys are compared without their whitespace, the way identity
/// numbers are normalized. The rows are first sorted by timestamp (rows
/// without a timestamp come first, equal timestamps keep their original
/// order), and the last row seen for each key wins. Without a timestamp
/// column, the last row in the sheet order wins. The surviving rows keep the
/// sorted order.
pub fn dedup_latest(
    source_name: &str,
    table: RawTable,
    unique_field: &str,
    aliases: &AliasMap,
) -> Result<RawTable, LoadError> {
    let mut table = table;
    let key_idx = find_column(&table.header, unique_field, aliases).ok_or(
        LoadError::MissingUniqueColumn {
            unique_field: unique_field.to_string(),
            header: table.header.clone(),
        },
    )?;

    if let Some(ts_idx) = parse_timestamp_column(source_name, &mut table, aliases) {
        // Stable sort: None < Some(_), ties keep the sheet order.
        table.rows.sort_by(|a, b| a.get(ts_idx).cmp(&b.get(ts_idx)));
    } else {
        warn!(
            "dedup_latest: source {}: no timestamp column, keeping the last row per {} in sheet order",
            source_name, unique_field
        );
    }

    let num_before = table.rows.len();
    let mut last_idx: HashMap<String, usize> = HashMap::new();
    for (idx, row) in table.rows.iter().enumerate() {
        last_idx.insert(dedup_key(row, key_idx), idx);
    }
    let rows: Vec<Vec<Cell>> = table
        .rows
        .into_iter()
        .enumerate()
        .filter(|(idx, row)| last_idx.get(&dedup_key(row, key_idx)) == Some(idx))
        .map(|(_, row)| row)
        .collect();
    info!(
        "dedup_latest: source {}: {} rows, {} after removing duplicates on {}",
        source_name,
        num_before,
        rows.len(),
        unique_field
    );
    Ok(RawTable {
        header: table.header,
        rows,
    })
}
