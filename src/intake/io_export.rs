// Delimited text export of the merged table, for offline runs.

use std::io::Write;

use text_diff::print_diff;

use crate::intake::*;

/// The merged table as CSV: the schema fields as header, in schema order,
/// empty cells for missing values.
pub fn to_csv_string(table: &CanonicalTable) -> IntakeResult<String> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(vec![]);
    wtr.write_record(table.fields())
        .context(CsvWriteSnafu {})?;
    for row in table.rows() {
        let record: Vec<String> = row
            .iter()
            .map(|c| c.as_ref().map(|v| v.as_text()).unwrap_or_default())
            .collect();
        wtr.write_record(&record).context(CsvWriteSnafu {})?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| e.into_error())
        .context(ExportIoSnafu { path: "<memory>" })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Writes the export to a file, or to the standard output if the path is `stdout`.
pub fn export_csv(table: &CanonicalTable, path: &str) -> IntakeResult<()> {
    let content = to_csv_string(table)?;
    if path == "stdout" {
        let mut out = std::io::stdout();
        out.write_all(content.as_bytes())
            .context(ExportIoSnafu { path })?;
    } else {
        fs::write(path, content).context(ExportIoSnafu { path })?;
    }
    info!("export_csv: {} records written to {:?}", table.len(), path);
    Ok(())
}

/// Compares the export with a reference file. Differences are printed as a
/// line diff.
pub fn check_reference(table: &CanonicalTable, reference_path: &str) -> IntakeResult<()> {
    let computed = to_csv_string(table)?;
    let reference = fs::read_to_string(reference_path)
        .context(ExportIoSnafu {
            path: reference_path,
        })?
        .replace("\r\n", "\n");
    if reference.trim_end() != computed.trim_end() {
        warn!("Found differences with the reference file {:?}", reference_path);
        print_diff(reference.as_str(), computed.as_str(), "\n");
        return ReferenceMismatchSnafu {
            path: reference_path,
        }
        .fail();
    }
    info!("check_reference: the export matches {:?}", reference_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CanonicalTable {
        let schema = Schema::new(
            vec![
                FieldSpec::new("timestamp", FieldKind::Timestamp),
                FieldSpec::new("id_number", FieldKind::IdLike),
                FieldSpec::new("street_address", FieldKind::Text),
            ],
            AliasMap::new(),
            "id_number",
            &["id_number"],
        );
        let mut raw = RawTable::from_strings(
            &["Timestamp", "ID Number", "Street Address"],
            &[vec!["01/02/2024 08:30:00", "1001", "12 main rd, soweto"], vec!["", "1002", ""]],
        );
        parse_timestamp_column("t", &mut raw, &schema.aliases);
        normalize_and_map(&raw, &schema)
    }

    #[test]
    fn csv_layout() {
        let s = to_csv_string(&table()).unwrap();
        assert_eq!(
            s,
            "timestamp,id_number,street_address\n2024-02-01 08:30:00,1001,\"12 Main Rd, Soweto\"\n,1002,\n"
        );
    }

    #[test]
    fn reference_check() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.csv");
        let bad = dir.path().join("bad.csv");
        fs::write(&good, to_csv_string(&table()).unwrap().replace('\n', "\r\n")).unwrap();
        fs::write(&bad, "timestamp,id_number,street_address\n").unwrap();
        assert!(check_reference(&table(), good.to_str().unwrap()).is_ok());
        let err = check_reference(&table(), bad.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, IntakeError::ReferenceMismatch { .. }));
    }

    #[test]
    fn export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("out.csv");
        export_csv(&table(), p.to_str().unwrap()).unwrap();
        assert_eq!(fs::read_to_string(&p).unwrap(), to_csv_string(&table()).unwrap());
    }
}
