use crate::error::{ProcessingError, Result};
use crate::models::{FetchManifest, RecordSet};
use crate::utils::constants::MANIFEST_SUFFIX;
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

/// `crash_data.json` -> `crash_data.manifest.json`
pub fn manifest_path(records_path: &Path) -> PathBuf {
    let stem = records_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    records_path.with_file_name(format!("{}.{}", stem, MANIFEST_SUFFIX))
}

/// Writes the fetched RecordSet and its manifest.
///
/// Files are written to a temporary sibling and renamed into place, so an
/// interrupted run never leaves a truncated record file behind.
pub struct JsonWriter;

impl JsonWriter {
    pub fn new() -> Self {
        Self
    }

    /// Records as a pretty-printed JSON array. Field order is kept as
    /// received, so identical input yields byte-identical files.
    pub fn write_records(&self, records: &RecordSet, path: &Path) -> Result<()> {
        write_atomically(path, records)?;
        info!("Wrote {} records to {}", records.len(), path.display());
        Ok(())
    }

    pub fn write_manifest(&self, manifest: &FetchManifest, records_path: &Path) -> Result<PathBuf> {
        let path = manifest_path(records_path);
        write_atomically(&path, manifest)?;
        Ok(path)
    }
}

impl Default for JsonWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn write_atomically<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    temp.persist(path)
        .map_err(|e| ProcessingError::Io(e.error))?;
    Ok(())
}
