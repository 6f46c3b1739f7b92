//! Run metadata file (`meta.json`) and the run context handed to operators.
//!
//! The file is seeded at the start of a run and then appended to by
//! operators, possibly from several recipe runs sharing an output directory.
//! Every read-modify-write holds an exclusive lock on the open file; reads
//! hold a shared one. Locks are released when the file handle is dropped.

use super::error::{CsetError, Result};
use serde_json::Value as JsonValue;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Metadata file name inside the output directory.
pub const META_FILE: &str = "meta.json";

/// Metadata key holding the index of produced plot files.
pub const PLOT_INDEX_KEY: &str = "plots";

/// Contents of `meta.json`.
pub type RunMetadata = serde_json::Map<String, JsonValue>;

/// Handle to a run's `meta.json`.
#[derive(Debug, Clone)]
pub struct MetadataFile {
    path: PathBuf,
}

impl MetadataFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the initial metadata, replacing any existing contents.
    pub fn seed(&self, meta: &RunMetadata) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.path)
            .map_err(|e| CsetError::io(&self.path, e))?;
        file.lock().map_err(|e| CsetError::io(&self.path, e))?;
        file.set_len(0).map_err(|e| CsetError::io(&self.path, e))?;
        self.write_locked(&mut file, meta)
    }

    /// Read the current metadata under a shared lock.
    pub fn read(&self) -> Result<RunMetadata> {
        let mut file = File::open(&self.path).map_err(|e| CsetError::io(&self.path, e))?;
        file.lock_shared().map_err(|e| CsetError::io(&self.path, e))?;
        self.read_locked(&mut file)
    }

    /// Exclusive read-modify-write of the metadata.
    pub fn update<F>(&self, modify: F) -> Result<()>
    where
        F: FnOnce(&mut RunMetadata) -> Result<()>,
    {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| CsetError::io(&self.path, e))?;
        file.lock().map_err(|e| CsetError::io(&self.path, e))?;

        let mut meta = self.read_locked(&mut file)?;
        modify(&mut meta)?;

        file.seek(SeekFrom::Start(0))
            .map_err(|e| CsetError::io(&self.path, e))?;
        file.set_len(0).map_err(|e| CsetError::io(&self.path, e))?;
        self.write_locked(&mut file, &meta)
    }

    /// Append entries to an array-valued key, creating it if absent.
    pub fn append_to_index(&self, key: &str, entries: &[String]) -> Result<()> {
        self.update(|meta| {
            let index = meta
                .entry(key)
                .or_insert_with(|| JsonValue::Array(Vec::new()));
            match index {
                JsonValue::Array(items) => {
                    items.extend(entries.iter().cloned().map(JsonValue::String));
                    Ok(())
                }
                other => Err(CsetError::Metadata {
                    path: self.path.clone(),
                    message: format!("'{}' is not a list: {}", key, other),
                }),
            }
        })
    }

    /// Append produced plot files to the plot index.
    pub fn append_plot_index(&self, plots: &[String]) -> Result<()> {
        self.append_to_index(PLOT_INDEX_KEY, plots)
    }

    fn read_locked(&self, file: &mut File) -> Result<RunMetadata> {
        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| CsetError::io(&self.path, e))?;
        serde_json::from_str(&content).map_err(|e| CsetError::Metadata {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn write_locked(&self, file: &mut File, meta: &RunMetadata) -> Result<()> {
        let json = serde_json::to_string_pretty(meta).map_err(|e| CsetError::Metadata {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| CsetError::io(&self.path, e))
    }
}

/// Capabilities available to operators during a run.
#[derive(Debug, Clone)]
pub struct RunContext {
    metadata: MetadataFile,
}

impl RunContext {
    pub fn new(metadata: MetadataFile) -> Self {
        Self { metadata }
    }

    /// Context whose metadata file lives in `dir`.
    pub fn in_directory(dir: &Path) -> Self {
        Self::new(MetadataFile::new(dir.join(META_FILE)))
    }

    pub fn metadata(&self) -> &MetadataFile {
        &self.metadata
    }

    /// Current recipe metadata as written to `meta.json`.
    pub fn recipe_metadata(&self) -> Result<RunMetadata> {
        self.metadata.read()
    }
}
