use crate::error::{ProcessingError, Result};
use crate::models::{FetchManifest, RecordSet};
use crate::writers::json_writer::manifest_path;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

/// Loads a RecordSet written by the fetch stage.
pub struct RecordReader;

impl RecordReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read_records(&self, path: &Path) -> Result<RecordSet> {
        if !path.exists() {
            return Err(ProcessingError::MissingData(format!(
                "Record file not found: {}",
                path.display()
            )));
        }

        let reader = BufReader::new(File::open(path)?);
        let records: RecordSet = serde_json::from_reader(reader).map_err(|e| {
            ProcessingError::InvalidFormat(format!(
                "{} is not a JSON array of records: {}",
                path.display(),
                e
            ))
        })?;

        info!("Loaded {} records from {}", records.len(), path.display());
        Ok(records)
    }

    /// The sidecar manifest for `records_path`, if one was written.
    pub fn read_manifest(&self, records_path: &Path) -> Result<Option<FetchManifest>> {
        let path = manifest_path(records_path);
        if !path.exists() {
            return Ok(None);
        }

        let manifest: FetchManifest = serde_json::from_reader(BufReader::new(File::open(&path)?))?;
        if !manifest.complete {
            warn!(
                "{} is a partial download ({} records): {}",
                records_path.display(),
                manifest.record_count,
                manifest.error.as_deref().unwrap_or("fetch did not finish")
            );
        }
        Ok(Some(manifest))
    }
}

impl Default for RecordReader {
    fn default() -> Self {
        Self::new()
    }
}
