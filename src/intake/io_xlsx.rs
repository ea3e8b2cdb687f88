// Reading the sheets of an Excel workbook.

use calamine::{open_workbook, Reader, Xlsx};

use crate::intake::{io_common::*, *};

/// Reads tabs of `.xlsx` workbooks. The spreadsheet is the path of the workbook.
pub struct XlsxReader {
    root: PathBuf,
}

impl XlsxReader {
    pub fn new(root: &Path) -> XlsxReader {
        XlsxReader {
            root: root.to_path_buf(),
        }
    }
}

impl SheetReader for XlsxReader {
    fn read_values(&self, spreadsheet: &str, worksheet: &str) -> BIntakeResult<Vec<Vec<String>>> {
        let p = resolve_path(&self.root, spreadsheet);
        let path = p.display().to_string();
        debug!("read_values: path: {:?} worksheet: {:?}", &path, worksheet);
        ensure!(p.is_file(), MissingSpreadsheetSnafu { path: path.clone() });

        let mut workbook: Xlsx<_> =
            open_workbook(&p).context(OpeningExcelSnafu { path: path.clone() })?;
        let wrange = workbook
            .worksheet_range(worksheet)
            .context(MissingWorksheetSnafu {
                path: path.clone(),
                worksheet,
            })?
            .context(OpeningExcelSnafu { path: path.clone() })?;

        // The range starts at the first used cell, not at A1.
        let (first_row, first_col) = wrange.start().unwrap_or((0, 0));
        let mut res: Vec<Vec<String>> = vec![vec![]; first_row as usize];
        for row in wrange.rows() {
            let mut values: Vec<String> = vec![String::new(); first_col as usize];
            values.extend(row.iter().map(cell_to_string));
            res.push(values);
        }
        info!(
            "read_values: {:?} / {:?}: {} rows",
            &path,
            worksheet,
            res.len()
        );
        Ok(res)
    }
}
