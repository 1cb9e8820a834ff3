use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::io_utils::parse_delimiter;

#[derive(Debug, Parser)]
#[command(author, version, about = "Reconcile multi-schema billing data into canonical tables and facts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Discover client and invoice sources, reconcile them, and upsert the
    /// canonical tables
    Ingest(IngestArgs),
    /// Rebuild the invoice fact table from the canonical tables
    Facts(FactsArgs),
    /// Run the analysis queries over the fact table and print the report
    Report(ReportArgs),
    /// Run the full pipeline: ingest, facts, report
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Directory containing clients*.csv and invoices*.csv source files
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: PathBuf,
    /// Store directory for the canonical tables
    #[arg(short = 's', long = "store")]
    pub store: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct FactsArgs {
    /// Store directory holding the canonical tables
    #[arg(short = 's', long = "store")]
    pub store: PathBuf,
    /// YAML rate sheet overriding the built-in rates and discounts
    #[arg(long = "rates")]
    pub rates: Option<PathBuf>,
    /// Also export the rebuilt fact table as CSV
    #[arg(long = "export")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Store directory holding the fact table
    #[arg(short = 's', long = "store")]
    pub store: PathBuf,
    /// YAML rate sheet overriding the built-in rates and discounts
    #[arg(long = "rates")]
    pub rates: Option<PathBuf>,
    /// Number of clients shown in the top-spender rankings
    #[arg(long, default_value_t = 5)]
    pub top: usize,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Directory containing clients*.csv and invoices*.csv source files
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: PathBuf,
    /// Store directory for canonical tables and facts
    #[arg(short = 's', long = "store")]
    pub store: PathBuf,
    /// YAML rate sheet overriding the built-in rates and discounts
    #[arg(long = "rates")]
    pub rates: Option<PathBuf>,
    /// Number of clients shown in the top-spender rankings
    #[arg(long, default_value_t = 5)]
    pub top: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}
