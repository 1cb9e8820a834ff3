pub mod analysis;
pub mod cli;
pub mod config;
pub mod facts;
pub mod fingerprint;
pub mod ingest;
pub mod io_utils;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod schema;
pub mod store;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{Cli, Commands, FactsArgs, IngestArgs, ReportArgs};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("billing_recon", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest(args) => ingest::execute(&args),
        Commands::Facts(args) => facts::execute(&args),
        Commands::Report(args) => report::execute(&args),
        Commands::Run(args) => {
            info!("Starting full pipeline execution");
            ingest::execute(&IngestArgs {
                data_dir: args.data_dir.clone(),
                store: args.store.clone(),
                delimiter: args.delimiter,
                input_encoding: args.input_encoding.clone(),
            })?;
            facts::execute(&FactsArgs {
                store: args.store.clone(),
                rates: args.rates.clone(),
                export: None,
            })?;
            report::execute(&ReportArgs {
                store: args.store.clone(),
                rates: args.rates.clone(),
                top: args.top,
            })?;
            info!("Pipeline execution completed");
            Ok(())
        }
    }
}
