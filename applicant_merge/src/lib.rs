/*!
Reconciliation of applicant records coming from several intake forms.

Each form labels its columns differently and may contain several
submissions from the same applicant. This crate maps every form onto one
fixed [`Schema`], keeps the most recent submission per applicant, and merges
the forms into one record per identity number, field by field, following a
fixed priority order.

See the [`manual`] for the full description of the rules.
*/

mod config;
mod loader;
pub mod manual;
mod mapper;
mod merge;
mod normalize;
mod validate;

use log::{info, warn};

pub use crate::config::*;
pub use crate::loader::{dedup_latest, parse_timestamp, parse_timestamp_column, table_from_values};
pub use crate::mapper::{normalize_and_map, CanonicalTable};
pub use crate::merge::{merge_tables, MergeSource};
pub use crate::normalize::{normalize_header, normalize_id_like, normalize_phone, normalize_text};
pub use crate::validate::validate;

/// Where the rows of a source are in its sheet, and what identifies an applicant in it.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SheetLayout {
    /// 0-based index of the row holding the column labels.
    pub header_row: usize,
    /// 0-based index of the first row of data.
    pub data_row: usize,
    /// The column used to remove duplicate submissions, as a label or as a
    /// normalized token.
    pub unique_field: String,
}

impl SheetLayout {
    pub fn new(unique_field: &str) -> SheetLayout {
        SheetLayout {
            header_row: 1,
            data_row: 2,
            unique_field: unique_field.to_string(),
        }
    }
}

/// Runs all the per-source steps on the values of one sheet: extraction of the
/// header and rows, removal of duplicate submissions (latest wins), and mapping
/// onto the schema.
///
/// A sheet without data gives an empty table.
///
/// ```
/// use applicant_merge::*;
///
/// let values: Vec<Vec<String>> = vec![
///     vec!["Stocktaker application".to_string()],
///     vec!["Timestamp".to_string(), "ID Number".to_string(), "First Names".to_string()],
///     vec!["2024-01-01".to_string(), "1001".to_string(), " john ".to_string()],
///     vec!["2024-02-01".to_string(), "1001".to_string(), "JOHN".to_string()],
/// ];
/// let schema = Schema::applicant();
/// let table = prepare_source("stocktaker", &values, &SheetLayout::new("id_number"), &schema)?;
/// assert_eq!(table.len(), 1);
/// assert_eq!(table.get_text(0, "first_names"), Some("John".to_string()));
/// # Ok::<(), LoadError>(())
/// ```
pub fn prepare_source(
    source_name: &str,
    values: &[Vec<String>],
    layout: &SheetLayout,
    schema: &Schema,
) -> Result<CanonicalTable, LoadError> {
    let raw = table_from_values(source_name, values, layout.header_row, layout.data_row);
    if raw.is_empty() {
        warn!("prepare_source: source {}: no rows", source_name);
        return Ok(CanonicalTable::empty(schema));
    }
    let deduped = dedup_latest(source_name, raw, &layout.unique_field, &schema.aliases)?;
    let table = normalize_and_map(&deduped, schema);
    info!(
        "prepare_source: source {}: {} normalized rows",
        source_name,
        table.len()
    );
    Ok(table)
}

/// Merges the prepared sources (in priority order) and the registered records,
/// and checks that the result can be persisted.
pub fn reconcile(
    schema: &Schema,
    sources: &[MergeSource],
    registered: Option<&CanonicalTable>,
) -> Result<CanonicalTable, ValidationError> {
    let merged = merge_tables(schema, sources, registered);
    validate(&merged, schema)?;
    Ok(merged)
}
