use log::info;

use crate::config::*;
use crate::mapper::CanonicalTable;

/// Checks that a merged table can be persisted.
///
/// The table must have rows, must have all the required columns of the schema,
/// and at least one row must hold a non-blank key.
pub fn validate(table: &CanonicalTable, schema: &Schema) -> Result<(), ValidationError> {
    if table.is_empty() {
        return Err(ValidationError::EmptyTable);
    }

    let missing: Vec<String> = schema
        .required
        .iter()
        .filter(|f| table.position(f).is_none())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingColumns(missing));
    }

    let keys = table.keys();
    if keys.iter().all(|k| k.is_none()) {
        return Err(ValidationError::AllKeysMissing(schema.key.clone()));
    }
    if keys
        .iter()
        .all(|k| k.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true))
    {
        return Err(ValidationError::AllKeysBlank(schema.key.clone()));
    }

    info!(
        "validate: {} records, {} with a key",
        table.len(),
        keys.iter().filter(|k| k.is_some()).count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_rows(schema: &Schema, rows: Vec<Vec<Cell>>) -> CanonicalTable {
        CanonicalTable {
            fields: schema.field_names(),
            key: schema.key.clone(),
            rows,
        }
    }

    fn schema() -> Schema {
        Schema::new(
            vec![
                FieldSpec::new("id_number", FieldKind::IdLike),
                FieldSpec::new("first_names", FieldKind::Text),
                FieldSpec::new("surname", FieldKind::Text),
            ],
            AliasMap::new(),
            "id_number",
            &["id_number", "first_names", "surname"],
        )
    }

    #[test]
    fn rejects_empty_table() {
        let s = schema();
        assert_eq!(
            validate(&CanonicalTable::empty(&s), &s),
            Err(ValidationError::EmptyTable)
        );
    }

    #[test]
    fn rejects_missing_required_columns() {
        let s = schema();
        let narrow = Schema::new(
            vec![
                FieldSpec::new("id_number", FieldKind::IdLike),
                FieldSpec::new("surname", FieldKind::Text),
            ],
            AliasMap::new(),
            "id_number",
            &[],
        );
        let t = with_rows(&narrow, vec![vec![Some(Value::text("1")), None]]);
        assert_eq!(
            validate(&t, &s),
            Err(ValidationError::MissingColumns(vec!["first_names".to_string()]))
        );
    }

    #[test]
    fn rejects_all_missing_keys() {
        let s = schema();
        let t = with_rows(
            &s,
            vec![
                vec![None, Some(Value::text("A")), None],
                vec![None, None, Some(Value::text("B"))],
            ],
        );
        assert_eq!(
            validate(&t, &s),
            Err(ValidationError::AllKeysMissing("id_number".to_string()))
        );
    }

    #[test]
    fn rejects_all_blank_keys() {
        let s = schema();
        let t = with_rows(
            &s,
            vec![
                vec![Some(Value::text("  ")), None, None],
                vec![None, None, None],
            ],
        );
        assert_eq!(
            validate(&t, &s),
            Err(ValidationError::AllKeysBlank("id_number".to_string()))
        );
    }

    #[test]
    fn accepts_one_valid_key() {
        let s = schema();
        let t = with_rows(
            &s,
            vec![
                vec![None, Some(Value::text("A")), None],
                vec![Some(Value::text("1001")), None, None],
            ],
        );
        assert_eq!(validate(&t, &s), Ok(()));
    }
}
