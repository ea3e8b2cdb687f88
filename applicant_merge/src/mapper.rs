use log::{debug, info};
use std::collections::HashSet;

use crate::config::*;
use crate::normalize::*;

/// A table whose columns are exactly the fields of a schema, in schema order.
///
/// It can only be built by mapping a raw table onto the schema, or by the
/// merger, so every row always has one cell per schema field.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CanonicalTable {
    pub(crate) fields: Vec<String>,
    pub(crate) key: String,
    pub(crate) rows: Vec<Vec<Cell>>,
}

impl CanonicalTable {
    /// An empty table for the given schema.
    pub fn empty(schema: &Schema) -> CanonicalTable {
        CanonicalTable {
            fields: schema.field_names(),
            key: schema.key.clone(),
            rows: Vec::new(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// The cell of a row for the given field, `None` if the field is unknown,
    /// the row is out of bounds or the cell has no value.
    pub fn get(&self, row: usize, field: &str) -> Option<&Value> {
        let idx = self.position(field)?;
        self.rows.get(row)?.get(idx)?.as_ref()
    }

    /// One row as (field, value) pairs, in schema order.
    pub fn record(&self, row: usize) -> Option<Vec<(&str, Option<&Value>)>> {
        let cells = self.rows.get(row)?;
        Some(
            self.fields
                .iter()
                .zip(cells.iter())
                .map(|(f, c)| (f.as_str(), c.as_ref()))
                .collect(),
        )
    }

    /// Same as `get`, as text.
    pub fn get_text(&self, row: usize, field: &str) -> Option<String> {
        self.get(row, field).map(|v| v.as_text())
    }

    /// The values of the key column, in row order.
    pub fn keys(&self) -> Vec<Option<String>> {
        match self.position(&self.key) {
            Some(idx) => self
                .rows
                .iter()
                .map(|r| r[idx].as_ref().map(|v| v.as_text()))
                .collect(),
            None => vec![None; self.rows.len()],
        }
    }

    /// Finds the row holding the given key.
    pub fn find(&self, key: &str) -> Option<usize> {
        self.keys().iter().position(|k| k.as_deref() == Some(key))
    }

    /// Back to a raw table, with the canonical names as header.
    pub fn to_raw(&self) -> RawTable {
        RawTable {
            header: self.fields.clone(),
            rows: self.rows.clone(),
        }
    }
}

fn normalize_cell(kind: FieldKind, cell: Cell) -> Cell {
    let text = match (kind, cell) {
        (_, None) => return None,
        (FieldKind::Timestamp, c) => return c,
        (_, Some(v)) => v.as_text(),
    };
    let res = match kind {
        FieldKind::Phone => normalize_phone(Some(&text)),
        FieldKind::IdLike => normalize_id_like(Some(&text)),
        FieldKind::Text | FieldKind::Timestamp => normalize_text(Some(&text)),
    };
    res.map(Value::Text)
}

/// Maps a raw table onto the schema.
///
/// The headers are normalized and renamed through the schema aliases. When
/// several columns end up with the same canonical name, the first one is kept.
/// Canonical fields missing from the source are filled with no-values, and
/// columns that are not part of the schema are dropped. Each cell is then
/// normalized according to the kind of its field.
///
/// Mapping a table that is already canonical returns it unchanged.
///
/// ```
/// use applicant_merge::*;
///
/// let schema = Schema::applicant();
/// let raw = RawTable::from_strings(
///     &["Identity Number :", "First Name", "Cellphone", "Favourite colour"],
///     &[vec![" 8001 015009087", "  jane ", "082 123 4567", "blue"]],
/// );
/// let table = normalize_and_map(&raw, &schema);
/// assert_eq!(table.fields(), schema.field_names().as_slice());
/// assert_eq!(table.get_text(0, "id_number"), Some("8001015009087".to_string()));
/// assert_eq!(table.get_text(0, "first_names"), Some("Jane".to_string()));
/// assert_eq!(table.get_text(0, "contact_number"), Some("0821234567".to_string()));
/// assert_eq!(table.get(0, "surname"), None);
/// ```
pub fn normalize_and_map(raw: &RawTable, schema: &Schema) -> CanonicalTable {
    // Source column index for each canonical field, first occurrence wins.
    let mut seen: HashSet<String> = HashSet::new();
    let mut source_cols: Vec<Option<usize>> = vec![None; schema.width()];
    for (col_idx, label) in raw.header.iter().enumerate() {
        let token = normalize_header(label);
        let name = schema
            .aliases
            .get(&token)
            .map(|s| s.to_string())
            .unwrap_or(token);
        if !seen.insert(name.clone()) {
            debug!(
                "normalize_and_map: dropping duplicate column {:?} (maps to {})",
                label, name
            );
            continue;
        }
        match schema.position(&name) {
            Some(field_idx) => source_cols[field_idx] = Some(col_idx),
            None => debug!(
                "normalize_and_map: dropping column {:?}: {} is not a schema field",
                label, name
            ),
        }
    }

    let missing: Vec<&str> = schema
        .fields
        .iter()
        .zip(source_cols.iter())
        .filter(|(_, c)| c.is_none())
        .map(|(f, _)| f.name.as_str())
        .collect();
    if !missing.is_empty() {
        info!(
            "normalize_and_map: fields absent from the source, left empty: {:?}",
            missing
        );
    }

    let rows: Vec<Vec<Cell>> = raw
        .rows
        .iter()
        .map(|row| {
            schema
                .fields
                .iter()
                .zip(source_cols.iter())
                .map(|(field, col)| {
                    let cell = col.and_then(|c| row.get(c).cloned().flatten());
                    normalize_cell(field.kind, cell)
                })
                .collect()
        })
        .collect();

    CanonicalTable {
        fields: schema.field_names(),
        key: schema.key.clone(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_schema() -> Schema {
        Schema::new(
            vec![
                FieldSpec::new("timestamp", FieldKind::Timestamp),
                FieldSpec::new("name", FieldKind::Text),
                FieldSpec::new("id", FieldKind::IdLike),
                FieldSpec::new("phone", FieldKind::Phone),
            ],
            AliasMap::new()
                .with("full_name", "name")
                .with("identity", "id")
                .with("id_number", "id")
                .with("cell", "phone"),
            "id",
            &["id", "name"],
        )
    }

    #[test]
    fn columns_are_canonical_whatever_the_input() {
        let schema = small_schema();
        let inputs = vec![
            RawTable::from_strings(&[], &[]),
            RawTable::from_strings(&["Unrelated"], &[vec!["x"]]),
            RawTable::from_strings(&["Cell", "Full Name", "Extra", "Identity"], &[vec!["1", "a", "b", "2"]]),
            RawTable::from_strings(&["phone", "phone", "id"], &[vec!["1", "2", "3"]]),
        ];
        for raw in inputs.iter() {
            let t = normalize_and_map(raw, &schema);
            assert_eq!(t.fields(), &["timestamp", "name", "id", "phone"]);
            assert_eq!(t.len(), raw.len());
            for r in t.rows() {
                assert_eq!(r.len(), 4);
            }
        }
    }

    #[test]
    fn reorders_and_renames() {
        let schema = small_schema();
        let raw = RawTable::from_strings(
            &["Cell", "Full Name", "Identity"],
            &[vec!["+27 82 000 1111", "  ANNA smith", "99 01"]],
        );
        let t = normalize_and_map(&raw, &schema);
        assert_eq!(t.get(0, "timestamp"), None);
        assert_eq!(t.get_text(0, "name"), Some("Anna Smith".to_string()));
        assert_eq!(t.get_text(0, "id"), Some("9901".to_string()));
        assert_eq!(t.get_text(0, "phone"), Some("+27820001111".to_string()));
    }

    #[test]
    fn first_duplicate_column_wins() {
        let schema = small_schema();
        let raw = RawTable::from_strings(
            &["Identity", "ID Number", "id"],
            &[vec!["first", "second", "third"]],
        );
        let t = normalize_and_map(&raw, &schema);
        assert_eq!(t.get_text(0, "id"), Some("first".to_string()));
    }

    #[test]
    fn blank_values_become_none() {
        let schema = small_schema();
        let raw = RawTable::new(
            vec!["name".to_string(), "id".to_string()],
            vec![vec![Some(Value::text("   ")), Some(Value::text(" \t"))]],
        );
        let t = normalize_and_map(&raw, &schema);
        assert_eq!(t.rows()[0], vec![None, None, None, None]);
    }

    #[test]
    fn timestamps_are_untouched() {
        let schema = small_schema();
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .unwrap();
        let raw = RawTable::new(
            vec!["Timestamp".to_string(), "id".to_string()],
            vec![
                vec![Some(Value::Timestamp(ts)), Some(Value::text("1"))],
                vec![Some(Value::text(" raw text ")), Some(Value::text("2"))],
            ],
        );
        let t = normalize_and_map(&raw, &schema);
        assert_eq!(t.get(0, "timestamp"), Some(&Value::Timestamp(ts)));
        assert_eq!(t.get(1, "timestamp"), Some(&Value::text(" raw text ")));
    }

    #[test]
    fn mapping_is_idempotent() {
        let schema = Schema::applicant();
        let raw = RawTable::from_strings(
            &[
                "Timestamp",
                "South African ID Number",
                "First Names",
                "Surname",
                "WhatsApp Number",
                "SARS Tax Number",
                "City/Town",
                "Email Address",
                "Something else",
            ],
            &[
                vec!["2024-01-01", " 800101 5009087", "jane ", "DOE", "082-111-2222", "12 34", "cape town", "Jane@Example.com", "?"],
                vec!["", "", "", "", "", "", "", "", ""],
            ],
        );
        let once = normalize_and_map(&raw, &schema);
        let twice = normalize_and_map(&once.to_raw(), &schema);
        assert_eq!(once, twice);
        assert_eq!(once.get_text(0, "sars_number"), Some("1234".to_string()));
        assert_eq!(once.get_text(0, "city"), Some("Cape Town".to_string()));
        assert_eq!(once.get_text(0, "alternate_contact_number"), Some("0821112222".to_string()));
    }

    #[test]
    fn canonical_table_accessors() {
        let schema = small_schema();
        let raw = RawTable::from_strings(&["id", "name"], &[vec!["1", "a"], vec!["", "b"]]);
        let t = normalize_and_map(&raw, &schema);
        assert_eq!(t.keys(), vec![Some("1".to_string()), None]);
        assert_eq!(t.find("1"), Some(0));
        assert_eq!(t.find("2"), None);
        assert_eq!(t.get(5, "name"), None);
        assert_eq!(t.get(0, "nope"), None);
        let rec = t.record(1).unwrap();
        assert_eq!(rec[1], ("name", Some(&Value::text("B"))));
        assert_eq!(rec[2], ("id", None));
        assert!(t.record(2).is_none());
        assert!(CanonicalTable::empty(&schema).is_empty());
    }
}
