//! Errors returned by gutka
//!
use std::path::PathBuf;

use gurbani::error::GurbaniError;
use snafu::prelude::*;

use crate::library::{FolderId, ItemId};

/// Errors returned by backup, restore, import, and library operations
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BackupError {
    /// Fetching canonical content failed (network, status, or decode error from the api).
    #[snafu(display("content api: {source}"))]
    Content { source: GurbaniError },

    /// A backup or library document could not be decoded.
    #[snafu(display("decode {what} at {path}: {source}"))]
    Decode {
        what: String,
        path: String,
        source: serde_json::Error,
    },

    /// A document could not be encoded. Unlikely to occur.
    #[snafu(display("encode {what}: {source}"))]
    Encode {
        what: String,
        source: serde_json::Error,
    },

    /// A property-list bookmark file could not be parsed.
    #[snafu(display("property list: {source}"))]
    PropertyList { source: plist::Error },

    /// The import file's extension or top-level structure is not recognized.
    #[snafu(display("unsupported import format: {message}"))]
    UnsupportedFormat { message: String },

    /// No writable backup location is available.
    #[snafu(display("backup storage unavailable: {message}"))]
    StorageUnavailable { message: String },

    /// A backup name that is not a plain backup file name in the backup directory.
    #[snafu(display("invalid backup name '{name}'"))]
    InvalidBackupName { name: String },

    #[snafu(display("{} {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Fuzzy line matching was asked to choose among zero lines.
    #[snafu(display("no candidate lines to match"))]
    NoCandidates,

    /// The operation was cancelled. State persisted before cancellation is kept.
    #[snafu(display("operation cancelled"))]
    Cancelled,

    #[snafu(display("folder {id} not found"))]
    FolderNotFound { id: FolderId },

    #[snafu(display("saved item {id} not found"))]
    ItemNotFound { id: ItemId },

    /// System folders cannot be deleted.
    #[snafu(display("folder '{name}' is a system folder"))]
    SystemFolder { name: String },

    /// The move would make a folder its own ancestor.
    #[snafu(display("cannot move folder {id} under its own subtree"))]
    FolderCycle { id: FolderId },

    /// A selected-line index does not address a line of the shabad.
    #[snafu(display("line index {index} out of range for shabad {shabad_id} with {len} lines"))]
    InvalidLineIndex {
        shabad_id: u32,
        index: usize,
        len: usize,
    },

    /// Invalid settings key or value.
    #[snafu(display("settings: {message}"))]
    Settings { message: String },
}

impl From<GurbaniError> for BackupError {
    fn from(source: GurbaniError) -> Self {
        Self::Content { source }
    }
}
