#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    /// Byte-level variant for non-UTF-8 fixtures.
    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    /// The store directory used by the tests (created on first ingest).
    pub fn store_dir(&self) -> PathBuf {
        self.temp_dir.path().join("store")
    }

    /// Reads a store table as untyped JSON for structural assertions.
    pub fn read_table(&self, table: &str) -> serde_json::Value {
        let path = self.store_dir().join(format!("{table}.json"));
        let contents = std::fs::read_to_string(&path)
            .unwrap_or_else(|err| panic!("reading table {path:?}: {err}"));
        serde_json::from_str(&contents).expect("table JSON parses")
    }
}

/// Finds the row whose `field` equals `value` in a JSON table array.
pub fn find_row<'a>(
    table: &'a serde_json::Value,
    field: &str,
    value: &str,
) -> &'a serde_json::Value {
    table
        .as_array()
        .expect("table is an array")
        .iter()
        .find(|row| row[field].as_str() == Some(value))
        .unwrap_or_else(|| panic!("no row with {field}={value}"))
}
