//! Record-file I/O for the backup folder.
//!
//! A record file is a single JSON file named by a 13-digit millisecond
//! timestamp, holding one note's persisted state. This module is pure I/O;
//! the business logic lives in [`crate::NoteStore`].

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use log::{error, trace};
use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::{Note, Result, StoreError};

static RECORD_FILE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{13}\.json$").expect("valid record file regex"));

/// Whether `name` follows the record-file naming convention.
pub fn is_record_file(name: &str) -> bool {
    RECORD_FILE_NAME.is_match(name)
}

/// The on-disk path of the record identified by `creation` under `dir`.
pub fn record_path(dir: &Path, creation: i64) -> PathBuf {
    dir.join(format!("{creation}.json"))
}

/// Lists the record files in the top level of `dir`.
///
/// Non-record files are filtered out deterministically by name; an
/// unreadable directory is an error.
pub fn list_record_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(StoreError::DirectoryError {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file()
            && path
                .file_name()
                .is_some_and(|name| is_record_file(&name.to_string_lossy()))
        {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// Reads and deserializes a single record file.
pub async fn read_record(path: &Path) -> Result<Note> {
    trace!("Reading record file: {}", path.display());
    let content = tokio::fs::read_to_string(path).await?;
    let note: Note = serde_json::from_str(&content)?;
    Ok(note)
}

/// Writes a note's record file atomically: temp file in the target
/// directory first, then a rename over the final name.
pub fn write_record(dir: &Path, creation: i64, note: &Note) -> Result<()> {
    let file_path = record_path(dir, creation);
    trace!("Writing record file: {}", file_path.display());

    let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
        error!("Failed to create temporary file in {}: {}", dir.display(), e);
        StoreError::Io(e)
    })?;

    let json = serde_json::to_string_pretty(note)?;
    temp_file.write_all(json.as_bytes())?;
    temp_file.flush()?;

    temp_file.persist(&file_path).map_err(|e| {
        error!("Failed to persist record {}: {}", file_path.display(), e.error);
        StoreError::Io(e.error)
    })?;

    Ok(())
}
