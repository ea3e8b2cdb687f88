use std::path::{Path, PathBuf};

use calamine::DataType;
use chrono::{Duration, NaiveDate};

use applicant_merge::TIMESTAMP_DISPLAY_FORMAT;

/// Paths in the configuration are relative to the directory of the configuration file.
pub fn resolve_path(root: &Path, p: &str) -> PathBuf {
    let pb = PathBuf::from(p);
    if pb.is_absolute() {
        pb
    } else {
        root.join(pb)
    }
}

/// Renders an Excel date serial (days since 1899-12-30) the way the readers
/// expect timestamps.
pub fn excel_serial_to_string(serial: f64) -> Option<String> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    let dt = epoch.checked_add_signed(Duration::milliseconds(millis))?;
    Some(dt.format(TIMESTAMP_DISPLAY_FORMAT).to_string())
}

/// The text a spreadsheet would display for a cell.
///
/// Whole numbers are written without a decimal part, so that identity numbers
/// typed as numbers keep all their digits.
pub fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::Empty => String::new(),
        DataType::String(s) => s.clone(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{:.0}", f),
        DataType::Float(f) => f.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::DateTime(serial) => {
            excel_serial_to_string(*serial).unwrap_or_else(|| serial.to_string())
        }
        #[allow(unreachable_patterns)]
        other => format!("{:?}", other),
    }
}
