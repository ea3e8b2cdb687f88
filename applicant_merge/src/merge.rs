use log::{debug, info, warn};
use std::collections::HashMap;

use crate::config::*;
use crate::mapper::CanonicalTable;

/// One input of the merge: a canonical table and the name it is reported under.
#[derive(Debug, Clone, Copy)]
pub struct MergeSource<'a> {
    pub name: &'a str,
    pub table: &'a CanonicalTable,
}

impl<'a> MergeSource<'a> {
    pub fn new(name: &'a str, table: &'a CanonicalTable) -> MergeSource<'a> {
        MergeSource { name, table }
    }
}

// The records accumulated so far, in the order their key was first seen.
struct MergeState {
    width: usize,
    key_idx: usize,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
}

impl MergeState {
    fn new(schema: &Schema, key_idx: usize) -> MergeState {
        MergeState {
            width: schema.width(),
            key_idx,
            index: HashMap::new(),
            rows: Vec::new(),
        }
    }

    /// Folds one table in: fields that are still empty take the values of
    /// this table, fields that already have a value keep it.
    fn fold(&mut self, source: &MergeSource) -> (usize, usize) {
        let mut num_new = 0;
        let mut num_unkeyed = 0;
        for row in source.table.rows.iter() {
            let key = match &row[self.key_idx] {
                Some(v) => v.as_text(),
                None => {
                    num_unkeyed += 1;
                    continue;
                }
            };
            match self.index.get(&key) {
                Some(&pos) => {
                    let current = &mut self.rows[pos];
                    for (cur, incoming) in current.iter_mut().zip(row.iter()) {
                        if cur.is_none() {
                            *cur = incoming.clone();
                        }
                    }
                }
                None => {
                    debug!("merge: source {}: new key {}", source.name, key);
                    self.index.insert(key, self.rows.len());
                    let mut r = row.clone();
                    r.resize(self.width, None);
                    self.rows.push(r);
                    num_new += 1;
                }
            }
        }
        (num_new, num_unkeyed)
    }
}

/// Merges canonical tables into one record per key.
///
/// `sources` are in priority order, the first one having the highest
/// priority. `registered`, the table of previously stored records, is merged
/// last and so only fills the fields that no source provides.
///
/// For each key and each field, the merged value is the first value found
/// when scanning the sources in priority order. A record may therefore be
/// assembled from the fields of several sources. Keys appear in the order in
/// which they are first seen. Rows without a key cannot be merged and are
/// dropped.
///
/// ```
/// use applicant_merge::*;
///
/// let schema = Schema::applicant();
/// let form = normalize_and_map(
///     &RawTable::from_strings(&["ID Number", "First Names", "City"], &[vec!["1001", "alice", ""]]),
///     &schema,
/// );
/// let registered = normalize_and_map(
///     &RawTable::from_strings(&["id_number", "first_names", "city"], &[vec!["1001", "Bob", "Town"]]),
///     &schema,
/// );
/// let merged = merge_tables(&schema, &[MergeSource::new("form", &form)], Some(&registered));
/// assert_eq!(merged.len(), 1);
/// assert_eq!(merged.get_text(0, "first_names"), Some("Alice".to_string()));
/// assert_eq!(merged.get_text(0, "city"), Some("Town".to_string()));
/// ```
pub fn merge_tables(
    schema: &Schema,
    sources: &[MergeSource],
    registered: Option<&CanonicalTable>,
) -> CanonicalTable {
    let key_idx = match schema.key_position() {
        Some(idx) => idx,
        None => {
            warn!(
                "merge: the key {} is not a field of the schema, nothing to merge",
                schema.key
            );
            return CanonicalTable::empty(schema);
        }
    };
    let registered_source = registered.map(|t| MergeSource::new("registered", t));
    let mut state = MergeState::new(schema, key_idx);
    for source in sources.iter().chain(registered_source.iter()) {
        if source.table.fields.as_slice() != schema.field_names().as_slice() {
            warn!(
                "merge: source {}: columns {:?} do not follow the schema, skipping",
                source.name, source.table.fields
            );
            continue;
        }
        let (num_new, num_unkeyed) = state.fold(source);
        if num_unkeyed > 0 {
            warn!(
                "merge: source {}: dropped {} rows without {}",
                source.name, num_unkeyed, schema.key
            );
        }
        info!(
            "merge: source {}: {} rows, {} new records, {} records in total",
            source.name,
            source.table.len(),
            num_new,
            state.rows.len()
        );
    }
    CanonicalTable {
        fields: schema.field_names(),
        key: schema.key.clone(),
        rows: state.rows,
    }
}
