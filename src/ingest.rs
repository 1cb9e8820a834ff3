//! Source discovery, CSV reading, and the ingest pipeline stage.
//!
//! Sources are discovered by naming convention inside the data directory:
//! `clients*.csv` and `invoices*.csv`, matched case-insensitively and
//! processed in filename order so reruns see the same batch sequence. Files
//! matching a prefix with an unsupported extension are skipped with a
//! warning. An unreadable or structurally corrupt file contributes an empty
//! batch and is logged as an error; it never aborts the run. Store failures
//! do abort the run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{error, info, warn};

use crate::{
    cli::IngestArgs,
    config::{CLIENT_FILE_PREFIX, INVOICE_FILE_PREFIX},
    io_utils, reconcile,
    schema::RawBatch,
    store::{self, Store},
};

/// Client and invoice source files found in the data directory, each list in
/// filename order.
#[derive(Debug, Default)]
pub struct SourceFiles {
    pub clients: Vec<PathBuf>,
    pub invoices: Vec<PathBuf>,
}

pub fn discover(data_dir: &Path) -> Result<SourceFiles> {
    let entries = std::fs::read_dir(data_dir)
        .with_context(|| format!("Reading data directory {data_dir:?}"))?;

    let mut sources = SourceFiles::default();
    for entry in entries {
        let entry = entry.with_context(|| format!("Listing data directory {data_dir:?}"))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let lowered = name.to_ascii_lowercase();
        let bucket = if lowered.starts_with(CLIENT_FILE_PREFIX) {
            &mut sources.clients
        } else if lowered.starts_with(INVOICE_FILE_PREFIX) {
            &mut sources.invoices
        } else {
            continue;
        };
        if lowered.ends_with(".csv") || lowered.ends_with(".tsv") {
            bucket.push(path);
        } else {
            warn!("Unsupported source file format, skipping: {path:?}");
        }
    }
    sources.clients.sort();
    sources.invoices.sort();
    info!(
        "Found {} client and {} invoice source file(s) in {:?}",
        sources.clients.len(),
        sources.invoices.len(),
        data_dir
    );
    Ok(sources)
}

/// Reads one source file into a raw batch of decoded string rows.
pub fn read_batch(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<RawBatch> {
    let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
    let mut reader = io_utils::open_csv_reader(path, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)
        .with_context(|| format!("Reading headers from {path:?}"))?;

    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {} of {path:?}", row_idx + 2))?;
        let decoded = io_utils::decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {} of {path:?}", row_idx + 2))?;
        rows.push(decoded);
    }
    info!("Read {} row(s) from {:?}", rows.len(), path);
    Ok(RawBatch {
        source: path.display().to_string(),
        headers,
        rows,
    })
}

/// Reads every source file, dropping unreadable files (logged as errors) so
/// one corrupt source cannot sink the rest of the corpus.
pub fn read_batches(
    paths: &[PathBuf],
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Vec<RawBatch> {
    let mut batches = Vec::new();
    for path in paths {
        match read_batch(path, delimiter, encoding) {
            Ok(batch) => batches.push(batch),
            Err(err) => error!("Skipping unreadable source {path:?}: {err:#}"),
        }
    }
    batches
}

pub fn execute(args: &IngestArgs) -> Result<()> {
    let store = Store::open(&args.store).context("Opening store")?;
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let sources = discover(&args.data_dir)?;

    let client_batches = read_batches(&sources.clients, args.delimiter, encoding);
    let clients = reconcile::reconcile_clients(&client_batches);
    if clients.is_empty() {
        warn!("No client data found");
    } else {
        store
            .upsert(store::CLIENTS_TABLE, &clients, |client| {
                client.client_id.clone()
            })
            .context("Storing canonical clients")?;
    }

    let invoice_batches = read_batches(&sources.invoices, args.delimiter, encoding);
    let invoices = reconcile::reconcile_invoices(&invoice_batches);
    if invoices.is_empty() {
        warn!("No invoice data found");
    } else {
        store
            .upsert(store::INVOICES_TABLE, &invoices, |invoice| {
                store::compound_key(&[invoice.invoice_id.as_deref()])
            })
            .context("Storing canonical invoices")?;
    }

    info!(
        "Ingest complete: {} client(s), {} invoice(s)",
        clients.len(),
        invoices.len()
    );
    Ok(())
}
