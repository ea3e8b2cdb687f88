mod args;
mod intake;

use clap::Parser;
use env_logger::Env;
use log::{debug, error, info};
use snafu::ErrorCompat;

use crate::args::Args;
use crate::intake::{error_chain, run_sync, SyncSettings};

fn main() {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
    debug!("main: args: {:?}", args);

    let settings = SyncSettings {
        config_path: args.config.clone(),
        database: args.database.clone(),
        out: args.out.clone(),
        reference: args.reference.clone(),
        dry_run: args.dry_run,
    };

    match run_sync(&settings) {
        Ok(merged) => {
            info!("main: done, {} applicant records", merged.len());
        }
        Err(e) => {
            error!("{}", error_chain(&e));
            eprintln!("An error occurred: {}", error_chain(&e));
            if let Some(bt) = ErrorCompat::backtrace(&e) {
                eprintln!("{}", bt);
            }
            std::process::exit(1);
        }
    }
}
