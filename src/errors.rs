//! Error types for the notevault store.
//!
//! This module defines custom error types that categorize different failures
//! that can occur during note store operations.

use std::{io, path::PathBuf};

use thiserror::Error;

/// A specialized Result type for notevault operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// The main error type for the notevault store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A background record-read task panicked or was cancelled.
    #[error("Record read task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// A save was attempted before a backup folder was configured.
    #[error("No backup folder configured; load a backup directory first")]
    BackupFolderNotSet,

    /// The backup directory could not be listed.
    #[error("Failed to read directory: {path}")]
    DirectoryError { path: PathBuf },

    /// Errors related to the settings store.
    #[error("Settings error: {message}")]
    SettingsError { message: String },
}
