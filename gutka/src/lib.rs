/*
 * gutka - gurbani bookmark library, backup, restore, and import
 *
 * SPDX-FileCopyrightText: 2025-2026 Steve Schoettler
 * SPDX-License-Identifier: Apache-2.0
 */
//! # Gutka
//!
//! Bookmark library for Gurbani shabads, with JSON backup/restore and import of
//! bookmarks exported by other apps.
//!
//! - [`library`]: folder tree (arena indexed by id), saved items, history
//! - [`matcher`]: edit-distance matching of a saved snippet to a line index
//! - [`document`]: the backup file format
//! - [`snapshot`]: folder tree ⇄ backup document
//! - [`import`]: format detection, legacy bookmark parsers, shared import context
//! - [`service`]: backup orchestrator (export, rotation, auto backup, restore)
//! - [`settings`]: display and backup settings, stored to two destinations
//!
//! Restore and import re-fetch canonical content through a
//! [`ShabadSource`](gurbani::source::ShabadSource); backups only carry shabad ids.
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::format_push_string)]
#![warn(clippy::default_trait_access)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::future_not_send)]
#![warn(clippy::implicit_clone)]
#![warn(clippy::literal_string_with_formatting_args)]
#![warn(clippy::match_same_arms)]
#![warn(clippy::option_if_let_else)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::ref_option)]
#![warn(clippy::redundant_closure)]
#![warn(clippy::uninlined_format_args)]
#![warn(clippy::unnecessary_wraps)]
#![warn(clippy::unused_async)]

pub mod cancel;
pub mod document;
pub mod error;
pub mod import;
pub mod library;
pub mod lookup;
pub mod matcher;
pub mod paths;
pub mod progress;
pub mod service;
pub mod settings;
pub mod snapshot;

/// Result type alias using `BackupError` as the default error.
pub type Result<T, E = crate::error::BackupError> = std::result::Result<T, E>;

pub mod prelude {
    pub use crate::{
        cancel::{CancelState, CancelToken, new_cancel_channel},
        document::{BackupDocument, BackupFolder, BackupShabadRef},
        error::*,
        import::{
            ImportContext, ImportFormat, ImportReport, LineHint, PendingItem, SkipReason,
            SkippedEntry,
        },
        library::{Folder, FolderId, HistoryItem, ItemId, Library, LibraryStore, SavedItem},
        lookup::LookupTables,
        matcher::best_match_index,
        paths::AppPaths,
        progress::{ChannelProgress, NoProgress, ProgressEvent, ProgressSink},
        service::{
            BackupConfig, BackupFileInfo, BackupService, ExportState, RestoreState,
            RotationSummary,
        },
        settings::{Settings, SettingsStore},
    };
}

pub mod config {
    /// File extension of native backup files
    pub const BACKUP_EXTENSION: &str = "gutkabackup";

    /// File name prefix of native backup files
    pub const BACKUP_FILE_PREFIX: &str = "gutka-";

    /// Timestamp pattern embedded in backup file names
    pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S-%3f";

    /// Number of backup files kept by rotation
    pub const KEEP_BACKUPS: usize = 10;

    /// Minimum interval between two automatic backups (seconds)
    pub const AUTO_BACKUP_MIN_INTERVAL_SECS: u64 = 60 * 60;

    /// Maximum number of history entries
    pub const MAX_HISTORY: usize = 100;

    /// Name of the system folder created in every new library
    pub const FAVORITES_FOLDER: &str = "Favorites";

    /// Name prefix of the synthetic root folder that receives restored or imported folders
    pub const IMPORT_ROOT_PREFIX: &str = "Import";

    /// Environment variable holding log filter directives (`EnvFilter` syntax)
    pub const LOG_ENV: &str = "GUTKA_LOG";

    /// Environment variable overriding the data directory
    pub const DATA_DIR_ENV: &str = "GUTKA_DATA_DIR";

    /// Environment variable naming the shared (widget) settings directory
    pub const SHARED_DIR_ENV: &str = "GUTKA_SHARED_DIR";

    /// Environment variable naming the lookup-table resources directory
    pub const RESOURCES_ENV: &str = "GUTKA_RESOURCES";

    /// Environment variable naming a cloud-synced backup directory
    pub const CLOUD_DIR_ENV: &str = "GUTKA_CLOUD_DIR";
}
