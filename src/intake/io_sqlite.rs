// The registry table: reading back the registered applicants, and storing the
// merged records.

use rusqlite::{params_from_iter, Connection};

use crate::intake::*;

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list(schema: &Schema) -> String {
    schema
        .fields
        .iter()
        .map(|f| quote_ident(&f.name))
        .collect::<Vec<String>>()
        .join(", ")
}

/// The DDL of the registry table: one column per schema field, all text
/// except the timestamp, and a unique index on the key.
pub fn create_table_sql(table: &str, schema: &Schema) -> String {
    let columns: Vec<String> = schema
        .fields
        .iter()
        .map(|f| {
            let sql_type = match f.kind {
                FieldKind::Timestamp => "TIMESTAMP",
                _ => "TEXT",
            };
            format!("    {} {}", quote_ident(&f.name), sql_type)
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n{columns}\n);\nCREATE UNIQUE INDEX IF NOT EXISTS {index} ON {table} ({key});",
        table = quote_ident(table),
        columns = columns.join(",\n"),
        index = quote_ident(&format!("{}_{}_key", table, schema.key)),
        key = quote_ident(&schema.key),
    )
}

fn upsert_sql(table: &str, staging: &str, schema: &Schema) -> String {
    let updates: Vec<String> = schema
        .fields
        .iter()
        .filter(|f| f.name != schema.key)
        .map(|f| format!("{c} = excluded.{c}", c = quote_ident(&f.name)))
        .collect();
    let conflict_action = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    // "WHERE true" lifts the parsing ambiguity between the SELECT and ON CONFLICT.
    format!(
        "INSERT INTO {table} ({cols}) SELECT {cols} FROM temp.{staging} WHERE true ON CONFLICT ({key}) {conflict_action}",
        table = quote_ident(table),
        cols = column_list(schema),
        staging = quote_ident(staging),
        key = quote_ident(&schema.key),
        conflict_action = conflict_action,
    )
}

pub fn open_database(path: &str) -> IntakeResult<Connection> {
    info!("open_database: {:?}", path);
    Connection::open(path).context(SqlSnafu {
        operation: format!("opening {}", path),
    })
}

pub fn ensure_table(conn: &Connection, table: &str, schema: &Schema) -> IntakeResult<()> {
    conn.execute_batch(&create_table_sql(table, schema))
        .context(SqlSnafu {
            operation: format!("creating table {}", table),
        })
}

pub fn table_exists(conn: &Connection, table: &str) -> IntakeResult<bool> {
    let n: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |r| r.get(0),
        )
        .context(SqlSnafu {
            operation: format!("looking up table {}", table),
        })?;
    Ok(n > 0)
}

/// Reads all the records already stored, mapped onto the schema.
pub fn read_registered(
    conn: &Connection,
    table: &str,
    schema: &Schema,
) -> IntakeResult<CanonicalTable> {
    let operation = format!("reading table {}", table);
    let sql = format!("SELECT {} FROM {}", column_list(schema), quote_ident(table));
    let mut stmt = conn.prepare(&sql).context(SqlSnafu {
        operation: operation.clone(),
    })?;
    let width = schema.width();
    let rows_r = stmt
        .query_map([], |row| {
            let mut cells: Vec<Cell> = Vec::with_capacity(width);
            for idx in 0..width {
                let v: Option<String> = row.get(idx)?;
                cells.push(v.map(Value::Text));
            }
            Ok(cells)
        })
        .context(SqlSnafu {
            operation: operation.clone(),
        })?;
    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for r in rows_r {
        rows.push(r.context(SqlSnafu {
            operation: operation.clone(),
        })?);
    }
    let mut raw = RawTable::new(schema.field_names(), rows);
    parse_timestamp_column("registered", &mut raw, &schema.aliases);
    let res = normalize_and_map(&raw, schema);
    info!("read_registered: {}: {} records", table, res.len());
    Ok(res)
}

/// Stores the merged records, replacing every non-key column of the records
/// that already exist.
///
/// Everything happens in one transaction: the rows are staged in a temporary
/// table, then moved to the registry with one upsert. On error nothing is
/// changed.
pub fn upsert(
    conn: &mut Connection,
    table: &str,
    schema: &Schema,
    merged: &CanonicalTable,
) -> IntakeResult<usize> {
    let operation = format!("upserting into {}", table);
    let staging = format!("{}_staging", table);
    let tx = conn.transaction().context(SqlSnafu {
        operation: operation.clone(),
    })?;
    tx.execute_batch(&create_table_sql(table, schema))
        .context(SqlSnafu {
            operation: operation.clone(),
        })?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS temp.{staging}; CREATE TEMP TABLE {staging} AS SELECT {cols} FROM {table} WHERE 0;",
        staging = quote_ident(&staging),
        cols = column_list(schema),
        table = quote_ident(table),
    ))
    .context(SqlSnafu {
        operation: operation.clone(),
    })?;

    {
        let placeholders: Vec<String> = (1..=schema.width()).map(|i| format!("?{}", i)).collect();
        let insert = format!(
            "INSERT INTO temp.{} ({}) VALUES ({})",
            quote_ident(&staging),
            column_list(schema),
            placeholders.join(", ")
        );
        let mut stmt = tx.prepare(&insert).context(SqlSnafu {
            operation: operation.clone(),
        })?;
        for row in merged.rows() {
            let values = row.iter().map(|c| c.as_ref().map(|v| v.as_text()));
            stmt.execute(params_from_iter(values)).context(SqlSnafu {
                operation: operation.clone(),
            })?;
        }
    }

    let num_rows = tx
        .execute(&upsert_sql(table, &staging, schema), [])
        .context(SqlSnafu {
            operation: operation.clone(),
        })?;
    tx.execute_batch(&format!("DROP TABLE temp.{};", quote_ident(&staging)))
        .context(SqlSnafu {
            operation: operation.clone(),
        })?;
    tx.commit().context(SqlSnafu { operation })?;
    info!("upsert: {}: {} records written", table, num_rows);
    Ok(num_rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "combined_students_table";

    fn merged(schema: &Schema, header: &[&str], rows: &[Vec<&str>]) -> CanonicalTable {
        normalize_and_map(&RawTable::from_strings(header, rows), schema)
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", TABLE), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn ddl_mirrors_schema() {
        let sql = create_table_sql(TABLE, &Schema::applicant());
        assert!(sql.contains("\"timestamp\" TIMESTAMP"));
        assert!(sql.contains("\"id_number\" TEXT"));
        assert!(sql.contains("\"account_type\" TEXT"));
        assert!(sql.contains("UNIQUE INDEX"));
    }

    #[test]
    fn upsert_inserts_then_overwrites() {
        let schema = Schema::applicant();
        let mut conn = Connection::open_in_memory().unwrap();
        let first = merged(
            &schema,
            &["Timestamp", "id_number", "first_names", "city"],
            &[vec!["2024-01-01 10:00:00", "1", "alice", "durban"], vec!["", "2", "bob", ""]],
        );
        assert_eq!(upsert(&mut conn, TABLE, &schema, &first).unwrap(), 2);
        assert_eq!(count(&conn), 2);

        let second = merged(&schema, &["id_number", "first_names"], &[vec!["1", "alicia"], vec!["3", "carol"]]);
        upsert(&mut conn, TABLE, &schema, &second).unwrap();
        assert_eq!(count(&conn), 3);

        let back = read_registered(&conn, TABLE, &schema).unwrap();
        let r = back.find("1").unwrap();
        assert_eq!(back.get_text(r, "first_names"), Some("Alicia".to_string()));
        // Every non-key column takes the incoming value, missing ones included.
        assert_eq!(back.get(r, "city"), None);
        assert_eq!(back.get(r, "timestamp"), None);
        let r2 = back.find("2").unwrap();
        assert_eq!(back.get_text(r2, "first_names"), Some("Bob".to_string()));
    }

    #[test]
    fn timestamps_round_trip() {
        let schema = Schema::applicant();
        let mut conn = Connection::open_in_memory().unwrap();
        let mut raw = RawTable::from_strings(&["timestamp", "id_number"], &[vec!["03/04/2024 10:00:00", "1"]]);
        parse_timestamp_column("t", &mut raw, &schema.aliases);
        let t = normalize_and_map(&raw, &schema);
        upsert(&mut conn, TABLE, &schema, &t).unwrap();
        let back = read_registered(&conn, TABLE, &schema).unwrap();
        assert_eq!(back.get(0, "timestamp"), t.get(0, "timestamp"));
        assert_eq!(back.get_text(0, "timestamp"), Some("2024-04-03 10:00:00".to_string()));
    }

    #[test]
    fn failed_upsert_changes_nothing() {
        let schema = Schema::applicant();
        let mut conn = Connection::open_in_memory().unwrap();
        let first = merged(&schema, &["id_number", "first_names"], &[vec!["1", "alice"]]);
        upsert(&mut conn, TABLE, &schema, &first).unwrap();

        // The new record is refused after the existing one was updated.
        conn.execute_batch(&format!(
            "CREATE TRIGGER refuse_two BEFORE INSERT ON {} WHEN NEW.id_number = '2' BEGIN SELECT RAISE(ABORT, 'refused'); END;",
            TABLE
        ))
        .unwrap();
        let second = merged(&schema, &["id_number", "first_names"], &[vec!["1", "zed"], vec!["2", "bob"]]);
        assert!(upsert(&mut conn, TABLE, &schema, &second).is_err());
        assert_eq!(count(&conn), 1);
        let back = read_registered(&conn, TABLE, &schema).unwrap();
        assert_eq!(back.get_text(0, "first_names"), Some("Alice".to_string()));
    }

    #[test]
    fn read_registered_of_empty_table() {
        let schema = Schema::applicant();
        let conn = Connection::open_in_memory().unwrap();
        assert!(!table_exists(&conn, TABLE).unwrap());
        ensure_table(&conn, TABLE, &schema).unwrap();
        assert!(table_exists(&conn, TABLE).unwrap());
        let back = read_registered(&conn, TABLE, &schema).unwrap();
        assert!(back.is_empty());
        assert_eq!(back.fields(), schema.field_names().as_slice());
    }
}
