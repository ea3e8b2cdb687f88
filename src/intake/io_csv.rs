// Primitives for reading CSV exports of the forms.

use crate::intake::{io_common::resolve_path, *};

/// Reads sheets exported as CSV files.
///
/// The spreadsheet is a directory, and each worksheet is the file
/// `<worksheet>.csv` in that directory.
pub struct CsvReader {
    root: PathBuf,
}

impl CsvReader {
    pub fn new(root: &Path) -> CsvReader {
        CsvReader {
            root: root.to_path_buf(),
        }
    }
}

impl SheetReader for CsvReader {
    fn read_values(&self, spreadsheet: &str, worksheet: &str) -> BIntakeResult<Vec<Vec<String>>> {
        let dir = resolve_path(&self.root, spreadsheet);
        ensure!(
            dir.is_dir(),
            MissingSpreadsheetSnafu {
                path: dir.display().to_string()
            }
        );
        let p = dir.join(format!("{}.csv", worksheet));
        let path = p.display().to_string();
        ensure!(
            p.is_file(),
            MissingWorksheetSnafu {
                path: dir.display().to_string(),
                worksheet,
            }
        );
        debug!("read_values: path: {:?}", &path);

        let rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&p)
            .context(CsvOpenSnafu { path: path.clone() })?;
        let mut res: Vec<Vec<String>> = Vec::new();
        for (idx, line_r) in rdr.into_records().enumerate() {
            let line = line_r.context(CsvLineParseSnafu {
                path: path.clone(),
                lineno: idx + 1,
            })?;
            res.push(line.iter().map(|s| s.to_string()).collect());
        }
        info!("read_values: {:?}: {} rows", &path, res.len());
        Ok(res)
    }
}
