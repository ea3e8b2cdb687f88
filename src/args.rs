use clap::Parser;

/// Merges the applicant records of several intake forms into one registry table.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing the intake forms, the database and the outputs.
    /// Relative paths in this file are resolved from its directory.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (file path, optional) The SQLite database holding the registry table. Setting this option
    /// overrides the database given in the configuration.
    #[clap(short, long, value_parser, env = "INTAKE_DATABASE")]
    pub database: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the merged records will be written in CSV format
    /// to the given location. Setting this option overrides the path of the configuration, and an
    /// empty path turns the export off.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference CSV file of the merged records. If provided, intake checks that the
    /// merged records match the reference before storing anything.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// If passed as an argument, the records are merged and exported but nothing is written to the
    /// database.
    #[clap(long, takes_value = false)]
    pub dry_run: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
