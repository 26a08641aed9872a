//! Inventory snapshot stored as a JSON array of flat objects.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;

use crate::inventory::InventorySource;
use crate::models::LocalRecord;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonFileInventory {
    path: PathBuf,
}

impl JsonFileInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<LocalRecord>> {
        let raw = fs::read_to_string(&self.path).map_err(|error| {
            Error::InvalidInput(format!(
                "failed to read inventory file {}: {error}",
                self.path.display()
            ))
        })?;
        serde_json::from_str(&raw).map_err(|error| {
            Error::InvalidInput(format!(
                "inventory file {} must be a JSON array of flat objects: {error}",
                self.path.display()
            ))
        })
    }

    /// Write `records` as 4-space indented UTF-8 JSON, replacing the file.
    ///
    /// The document is written to a temporary file next to the target and
    /// renamed over it, so readers never see a partial file.
    pub fn save(&self, records: &[LocalRecord]) -> Result<()> {
        let mut buffer = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
        records.serialize(&mut serializer)?;

        let parent = match self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(parent)?;
        staged.write_all(&buffer)?;
        staged.as_file().sync_all()?;
        staged
            .persist(&self.path)
            .map_err(|error| Error::Io(error.error))?;
        tracing::info!(
            path = %self.path.display(),
            records = records.len(),
            "Saved inventory"
        );
        Ok(())
    }
}

#[async_trait]
impl InventorySource for JsonFileInventory {
    async fn fetch(&self) -> Result<Vec<LocalRecord>> {
        self.load()
    }
}
