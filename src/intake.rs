use log::{debug, error, info, warn};

use applicant_merge::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use crate::intake::config_reader::*;
use crate::intake::io_common::resolve_path;
use crate::intake::io_csv::CsvReader;
use crate::intake::io_export::{check_reference, export_csv};
use crate::intake::io_sqlite::*;
use crate::intake::io_xlsx::XlsxReader;

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_export;
mod io_sqlite;
mod io_xlsx;

#[derive(Debug, Snafu)]
pub enum IntakeError {
    #[snafu(display("Error opening the configuration file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the configuration file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Expected a non-negative row index in the configuration"))]
    ParsingJsonNumber {},
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},

    #[snafu(display("Source {source_name}: missing required key {key}"))]
    MissingSourceKey { source_name: String, key: String },
    #[snafu(display("Source {source_name}: unknown provider {provider}"))]
    UnknownProvider {
        source_name: String,
        provider: String,
    },
    #[snafu(display("Spreadsheet {path} not found"))]
    MissingSpreadsheet { path: String },
    #[snafu(display("Worksheet {worksheet} not found in {path}"))]
    MissingWorksheet { path: String, worksheet: String },
    #[snafu(display("Error opening workbook {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Source {source_name} could not be prepared"))]
    Preparing {
        source: LoadError,
        source_name: String,
    },

    #[snafu(display("The merged records cannot be stored"))]
    Validation { source: ValidationError },
    #[snafu(display("Database error while {operation}"))]
    Sql {
        source: rusqlite::Error,
        operation: String,
    },

    #[snafu(display("Error writing CSV"))]
    CsvWrite { source: csv::Error },
    #[snafu(display("Error accessing {path}"))]
    ExportIo {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The export differs from the reference file {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type IntakeResult<T> = Result<T, IntakeError>;
pub type BIntakeResult<T> = Result<T, Box<IntakeError>>;

/// The message of an error followed by the messages of all its causes.
pub fn error_chain(e: &dyn std::error::Error) -> String {
    let mut msg = e.to_string();
    let mut cur = e.source();
    while let Some(s) = cur {
        msg.push_str(": ");
        msg.push_str(&s.to_string());
        cur = s.source();
    }
    msg
}

/// Access to the values of the tabs of a spreadsheet.
pub trait SheetReader {
    /// All the values of one tab, row by row, as displayed.
    fn read_values(&self, spreadsheet: &str, worksheet: &str) -> BIntakeResult<Vec<Vec<String>>>;
}

fn reader_for(provider: &str, root: &Path) -> Option<Box<dyn SheetReader>> {
    match provider {
        "xlsx" => Some(Box::new(XlsxReader::new(root))),
        "csv" => Some(Box::new(CsvReader::new(root))),
        _ => None,
    }
}

/// The options of one run, from the command line.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SyncSettings {
    pub config_path: String,
    /// Overrides the database of the configuration.
    pub database: Option<String>,
    /// Overrides the CSV export path of the configuration.
    pub out: Option<String>,
    pub reference: Option<String>,
    pub dry_run: bool,
}

/// Reads one source and prepares it for merging.
pub fn load_source(
    reader: &dyn SheetReader,
    desc: &SourceDescriptor,
    idx: usize,
    schema: &Schema,
) -> BIntakeResult<(String, CanonicalTable)> {
    let name = desc.name(idx)?;
    let spreadsheet = desc.spreadsheet(idx)?;
    let worksheet = desc.worksheet(idx)?;
    let layout = SheetLayout {
        header_row: desc.header_row()?,
        data_row: desc.data_row()?,
        unique_field: desc.unique_field(idx)?,
    };
    info!(
        "load_source: {}: reading {:?} / {:?}",
        name, spreadsheet, worksheet
    );
    let values = reader.read_values(&spreadsheet, &worksheet)?;
    let table = prepare_source(&name, &values, &layout, schema).context(PreparingSnafu {
        source_name: name.clone(),
    })?;
    Ok((name, table))
}

/// Loads all the sources, in configuration order. A source that cannot be
/// loaded is reported and left out.
fn load_all_sources(
    config: &IntakeConfig,
    root: &Path,
    schema: &Schema,
) -> Vec<(String, CanonicalTable)> {
    let mut res: Vec<(String, CanonicalTable)> = Vec::new();
    for (idx, desc) in config.sources.iter().enumerate() {
        let provider = desc.provider();
        let loaded = match reader_for(&provider, root) {
            Some(reader) => load_source(reader.as_ref(), desc, idx, schema),
            None => UnknownProviderSnafu {
                source_name: desc.label(idx),
                provider,
            }
            .fail()
            .map_err(Box::new),
        };
        match loaded {
            Ok(x) => res.push(x),
            Err(e) => {
                error!(
                    "Skipping source {}: {}",
                    desc.label(idx),
                    error_chain(e.as_ref())
                );
            }
        }
    }
    info!(
        "load_all_sources: {} of {} sources loaded",
        res.len(),
        config.sources.len()
    );
    res
}

// The output paths of the configuration are relative to its directory.
fn resolve_output(root: &Path, p: &str) -> String {
    if p == "stdout" {
        p.to_string()
    } else {
        resolve_path(root, p).display().to_string()
    }
}

/// Runs the whole intake: loads the sources, merges them with the registered
/// records, checks the result, exports it and stores it.
///
/// Nothing is stored if any check fails. Returns the merged records.
pub fn run_sync(settings: &SyncSettings) -> IntakeResult<CanonicalTable> {
    let config = read_config(&settings.config_path)?;
    debug!("run_sync: config: {:?}", config);
    let config_p = Path::new(settings.config_path.as_str());
    let root_p: PathBuf = config_p
        .parent()
        .context(MissingParentDirSnafu {})?
        .to_path_buf();

    if config.sources.is_empty() {
        whatever!("No sources in the configuration {}", settings.config_path)
    }

    let schema = config.schema();
    let loaded = load_all_sources(&config, &root_p, &schema);

    let table_name = config.table_name();
    let db_path: Option<String> = settings
        .database
        .clone()
        .or_else(|| config.database_path().map(|p| resolve_output(&root_p, &p)));

    let mut conn = match &db_path {
        Some(p) if settings.dry_run && !Path::new(p).exists() => {
            info!("Dry run: database {:?} does not exist, no registered records", p);
            None
        }
        Some(p) => Some(open_database(p)?),
        None => {
            warn!("No database configured: no registered records, nothing will be stored");
            None
        }
    };

    let registered: Option<CanonicalTable> = match &conn {
        Some(c) if table_exists(c, &table_name)? => Some(read_registered(c, &table_name, &schema)?),
        Some(c) if !settings.dry_run => {
            ensure_table(c, &table_name, &schema)?;
            None
        }
        _ => None,
    };

    let sources: Vec<MergeSource> = loaded
        .iter()
        .map(|(name, table)| MergeSource::new(name, table))
        .collect();
    let merged = reconcile(&schema, &sources, registered.as_ref()).context(ValidationSnafu {})?;
    info!("run_sync: {} merged records", merged.len());

    // An empty --out disables the export, including the one of the configuration.
    let out = match settings.out.as_deref() {
        Some(p) if p.trim().is_empty() => None,
        Some(p) => Some(p.to_string()),
        None => config.csv_path().map(|p| resolve_output(&root_p, &p)),
    };
    if let Some(out_p) = out {
        export_csv(&merged, &out_p)?;
    }

    if let Some(reference_p) = &settings.reference {
        check_reference(&merged, reference_p)?;
    }

    match conn.as_mut() {
        Some(_) if settings.dry_run => info!("Dry run: nothing stored"),
        Some(c) => {
            upsert(c, &table_name, &schema, &merged)?;
        }
        None => {}
    }
    Ok(merged)
}
