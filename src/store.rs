//! File-backed table store with upsert semantics.
//!
//! A store is a directory holding one JSON file per table. The pipeline's
//! contract with it is narrow: `load` everything, `upsert` keyed rows with
//! all non-key fields overwritten, and `clear` for the rebuild-from-scratch
//! fact table. Every mutation is written to a temp file and renamed into
//! place, so an interrupted run leaves the table in its pre-run or post-run
//! state, never half-written.
//!
//! Store failures are fatal for the run, unlike data-quality problems which
//! degrade to sentinels upstream. [`StoreError`] carries the table name and
//! operation so a failed run can be diagnosed without debug logging.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use log::info;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

pub const CLIENTS_TABLE: &str = "clients";
pub const INVOICES_TABLE: &str = "invoices";
pub const FACTS_TABLE: &str = "invoice_facts";

/// Unit separator; cannot appear in CSV-sourced field values, so compound
/// keys never collide with single-column keys.
const KEY_SEPARATOR: &str = "\u{1f}";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store {operation} failed for table '{table}'")]
    Io {
        table: String,
        operation: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("table '{table}' holds data that is not valid JSON for its record type")]
    Corrupt {
        table: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root).map_err(|source| StoreError::Io {
            table: root.display().to_string(),
            operation: "open",
            source,
        })?;
        Ok(Store {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.json"))
    }

    /// Reads every row of a table; a table that has never been written is
    /// empty, not an error.
    pub fn load<T>(&self, table: &str) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        let path = self.table_path(table);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    table: table.to_string(),
                    operation: "read",
                    source,
                });
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            table: table.to_string(),
            source,
        })
    }

    /// Update-or-insert by key: rows whose key matches an existing row
    /// replace it in place (all non-key fields overwritten), new keys append
    /// in input order. Returns the resulting table size.
    pub fn upsert<T, K>(&self, table: &str, rows: &[T], key: K) -> Result<usize, StoreError>
    where
        T: Serialize + DeserializeOwned + Clone,
        K: Fn(&T) -> String,
    {
        let mut existing: Vec<T> = self.load(table)?;
        let mut positions: HashMap<String, usize> = existing
            .iter()
            .enumerate()
            .map(|(idx, row)| (key(row), idx))
            .collect();

        let mut updated = 0usize;
        for row in rows {
            let row_key = key(row);
            if let Some(&idx) = positions.get(&row_key) {
                existing[idx] = row.clone();
                updated += 1;
            } else {
                positions.insert(row_key, existing.len());
                existing.push(row.clone());
            }
        }

        self.write_table(table, &existing)?;
        info!(
            "Upserted {} row(s) into '{}' ({} updated, {} total)",
            rows.len(),
            table,
            updated,
            existing.len()
        );
        Ok(existing.len())
    }

    /// Empties a table. Used by fact derivation, which rebuilds its table on
    /// every run instead of reconciling against previous contents.
    pub fn clear(&self, table: &str) -> Result<(), StoreError> {
        self.write_table::<serde_json::Value>(table, &[])
    }

    fn write_table<T>(&self, table: &str, rows: &[T]) -> Result<(), StoreError>
    where
        T: Serialize,
    {
        let bytes =
            serde_json::to_vec_pretty(rows).map_err(|source| StoreError::Corrupt {
                table: table.to_string(),
                source,
            })?;
        let path = self.table_path(table);
        let tmp = self.root.join(format!("{table}.json.tmp"));
        fs::write(&tmp, bytes).map_err(|source| StoreError::Io {
            table: table.to_string(),
            operation: "write",
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            table: table.to_string(),
            operation: "commit",
            source,
        })
    }
}

/// Joins key columns with a separator that cannot occur in the data.
pub fn compound_key(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .map(|part| part.unwrap_or(""))
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}
