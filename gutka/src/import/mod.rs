//! # Import
//!
//! Format detection by file extension and the shared context every importer
//! (native restore and the legacy parsers) writes through.
//!
//! [`ImportContext`] owns the per-record pipeline:
//! 1. check for cancellation
//! 2. fetch the canonical shabad
//! 3. resolve the selected line ([`LineHint`])
//! 4. create the saved item and persist the library
//! 5. report progress
//!
//! Per-record failures are recorded as [`SkippedEntry`] values and never abort the
//! import. Persistence failures and cancellation do.

pub mod favorites;
pub mod tree;

use std::{fmt, path::Path};

use chrono::{DateTime, Local, Utc};
use gurbani::{shabad::Shabad, source::ShabadSource};
use serde::Serialize;
use strum::{Display, EnumString};
use tracing::{debug, warn};

use crate::{
    Result,
    cancel::CancelState,
    config::{BACKUP_EXTENSION, IMPORT_ROOT_PREFIX},
    error::BackupError,
    library::{FolderId, ItemId, Library, LibraryStore, SavedItem},
    matcher::best_match_index,
    progress::{ProgressEvent, ProgressSink},
    settings::{Settings, SettingsStore},
};

/// Supported import file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum ImportFormat {
    /// Native backup document
    Native,
    /// Property-list tree of arrays (legacy format A)
    Bookmarks,
    /// JSON favorites document (legacy format B)
    Favorites,
}

impl ImportFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Native => BACKUP_EXTENSION,
            Self::Bookmarks => "bookmarks",
            Self::Favorites => "favorites",
        }
    }

    pub fn from_extension(extension: &str) -> Result<Self> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        [Self::Native, Self::Bookmarks, Self::Favorites]
            .into_iter()
            .find(|format| format.extension() == extension)
            .ok_or_else(|| BackupError::UnsupportedFormat {
                message: format!("unknown file extension '.{extension}'"),
            })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| BackupError::UnsupportedFormat {
                message: format!("{} has no file extension", path.display()),
            })?;
        Self::from_extension(extension)
    }
}

/// Why a record was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SkipReason {
    /// The node does not have a recognized shape
    MalformedNode { detail: String },
    /// The foreign id has no entry in the lookup table
    UnknownId { id: String },
    /// Fetching canonical content failed
    Fetch { message: String },
    /// The fetched shabad has no lines
    NoLines,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedNode { detail } => write!(f, "malformed node: {detail}"),
            Self::UnknownId { id } => write!(f, "unknown id '{id}'"),
            Self::Fetch { message } => write!(f, "fetch failed: {message}"),
            Self::NoLines => f.write_str("shabad has no lines"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    /// Where the record was found, e.g. `Title/2`
    pub location: String,
    pub reason: SkipReason,
}

/// Outcome of a restore or import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// The synthetic root the records were grafted under
    pub root: Option<FolderId>,
    pub folders: usize,
    pub imported: usize,
    pub skipped: Vec<SkippedEntry>,
    /// Settings from a native backup were saved
    pub settings_restored: bool,
}

/// How to choose the selected line of an imported item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineHint {
    /// No remembered line
    Default,
    /// Stored index; negative means default. An index past the end of the fetched
    /// shabad falls back to matching `title`.
    Index { index: i64, title: String },
    /// Saved text snippet, matched by edit distance
    Text(String),
    /// Canonical verse id when known, otherwise the snippet
    VerseOrText {
        verse_id: Option<String>,
        text: String,
    },
}

impl LineHint {
    /// Resolves the hint against the fetched shabad, which has at least one line
    pub fn resolve(&self, shabad: &Shabad) -> Result<Option<usize>> {
        match self {
            Self::Default => Ok(None),
            Self::Index { index, title } => {
                let Ok(index) = usize::try_from(*index) else {
                    return Ok(None);
                };
                if index < shabad.lines.len() {
                    return Ok(Some(index));
                }
                warn!(
                    shabad_id = shabad.id(),
                    index,
                    lines = shabad.lines.len(),
                    "stored line index out of range"
                );
                if title.trim().is_empty() {
                    Ok(None)
                } else {
                    best_match_index(&shabad.lines, title).map(Some)
                }
            }
            Self::Text(text) => best_match_index(&shabad.lines, text).map(Some),
            Self::VerseOrText { verse_id, text } => {
                if let Some(position) = verse_id
                    .as_deref()
                    .and_then(|verse_id| shabad.position_of_verse(verse_id))
                {
                    return Ok(Some(position));
                }
                best_match_index(&shabad.lines, text).map(Some)
            }
        }
    }
}

/// A record ready to be fetched and saved
#[derive(Debug, Clone)]
pub struct PendingItem {
    /// Where the record was found, for skip reports
    pub location: String,
    pub shabad_id: u32,
    pub line: LineHint,
    pub sort_index: i64,
    /// Creation time from the file; now when absent
    pub added_at: Option<DateTime<Utc>>,
}

/// Shared state of one restore or import run
pub struct ImportContext<'a, S> {
    library: &'a mut Library,
    store: &'a LibraryStore,
    source: &'a S,
    progress: &'a dyn ProgressSink,
    cancel: &'a mut CancelState,
    settings: Option<&'a SettingsStore>,
    report: ImportReport,
}

impl<S> fmt::Debug for ImportContext<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportContext")
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl<'a, S: ShabadSource> ImportContext<'a, S> {
    pub fn new(
        library: &'a mut Library,
        store: &'a LibraryStore,
        source: &'a S,
        progress: &'a dyn ProgressSink,
        cancel: &'a mut CancelState,
    ) -> Self {
        Self {
            library,
            store,
            source,
            progress,
            cancel,
            settings: None,
            report: ImportReport::default(),
        }
    }

    /// Settings found in a native backup are saved to `store`.
    /// Without a store they are ignored.
    pub fn with_settings_store(mut self, store: &'a SettingsStore) -> Self {
        self.settings = Some(store);
        self
    }

    pub fn library(&self) -> &Library {
        self.library
    }

    pub fn report(&self) -> &ImportReport {
        &self.report
    }

    pub fn finish(self) -> ImportReport {
        self.report
    }

    pub fn check_cancel(&mut self) -> Result<()> {
        self.cancel.check()
    }

    /// Creates the root folder that receives the imported tree, named
    /// `Import <timestamp in local time>`, after the existing roots.
    pub fn create_import_root(&mut self, created_at: DateTime<Utc>) -> Result<FolderId> {
        let name = format!(
            "{IMPORT_ROOT_PREFIX} {}",
            created_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
        );
        self.check_cancel()?;
        let id = self.library.create_folder(None, &name)?;
        self.after_folder(id, &name)?;
        self.report.root = Some(id);
        Ok(id)
    }

    /// Creates and persists a folder
    pub fn create_folder(
        &mut self,
        parent: FolderId,
        name: &str,
        is_system_folder: bool,
        sort_index: i64,
    ) -> Result<FolderId> {
        self.check_cancel()?;
        let id = self
            .library
            .create_folder_with(Some(parent), name, is_system_folder, sort_index)?;
        self.after_folder(id, name)?;
        Ok(id)
    }

    fn after_folder(&mut self, id: FolderId, name: &str) -> Result<()> {
        self.store.save(self.library)?;
        self.report.folders += 1;
        self.progress.report(ProgressEvent::FolderCreated {
            id,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Saves restored settings to the settings store, if there is one
    pub fn restore_settings(&mut self, settings: &Settings) -> Result<()> {
        let Some(store) = self.settings else {
            debug!("no settings store, restored settings ignored");
            return Ok(());
        };
        store.save(settings)?;
        self.report.settings_restored = true;
        Ok(())
    }

    /// Records a skipped record
    pub fn skip(&mut self, location: impl Into<String>, reason: SkipReason) {
        let location = location.into();
        warn!(%location, %reason, "skipping record");
        self.progress.report(ProgressEvent::ItemSkipped {
            location: location.clone(),
        });
        self.report.skipped.push(SkippedEntry { location, reason });
    }

    /// Fetches, resolves, saves, and persists one record.
    /// Returns `Ok(None)` when the record was skipped.
    pub async fn import_item(
        &mut self,
        folder: FolderId,
        pending: PendingItem,
    ) -> Result<Option<ItemId>> {
        self.check_cancel()?;
        let PendingItem {
            location,
            shabad_id,
            line,
            sort_index,
            added_at,
        } = pending;

        let shabad = match self.source.fetch_shabad(shabad_id).await {
            Ok(shabad) => shabad,
            Err(err) => {
                self.skip(
                    location,
                    SkipReason::Fetch {
                        message: err.to_string(),
                    },
                );
                return Ok(None);
            }
        };
        if shabad.lines.is_empty() {
            self.skip(location, SkipReason::NoLines);
            return Ok(None);
        }
        let selected_line = line.resolve(&shabad)?;
        let item = SavedItem::new(
            shabad,
            selected_line,
            sort_index,
            added_at.unwrap_or_else(Utc::now),
        )?;
        let title = item
            .display_line()
            .map(|line| line.gurmukhi.clone())
            .unwrap_or_default();
        let id = self.library.insert_item(folder, item)?;
        self.store.save(self.library)?;
        self.report.imported += 1;
        debug!(%location, shabad_id, "imported item");
        self.progress.report(ProgressEvent::ItemImported {
            count: self.report.imported,
            title,
        });
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use gurbani::test_util::{StaticShabads, sample_shabad};

    use super::*;
    use crate::{cancel::new_cancel_channel, progress::NoProgress};

    #[test]
    fn format_from_extension() {
        assert_eq!(
            ImportFormat::from_path(Path::new("a/b/gutka-1.gutkabackup")).unwrap(),
            ImportFormat::Native
        );
        assert_eq!(
            ImportFormat::from_path(Path::new("x.BOOKMARKS")).unwrap(),
            ImportFormat::Bookmarks
        );
        assert_eq!(ImportFormat::from_extension(".favorites").unwrap(), ImportFormat::Favorites);
        assert!(matches!(
            ImportFormat::from_path(Path::new("x.txt")),
            Err(BackupError::UnsupportedFormat { .. })
        ));
        assert!(ImportFormat::from_path(Path::new("noext")).is_err());
        assert_eq!("bookmarks".parse::<ImportFormat>().unwrap(), ImportFormat::Bookmarks);
    }

    #[test]
    fn resolve_hints() {
        let shabad = sample_shabad(5, &["first line", "second line", "third line"]);
        assert_eq!(LineHint::Default.resolve(&shabad).unwrap(), None);
        let index = |index, title: &str| LineHint::Index {
            index,
            title: title.to_string(),
        };
        assert_eq!(index(-1, "x").resolve(&shabad).unwrap(), None);
        assert_eq!(index(1, "").resolve(&shabad).unwrap(), Some(1));
        assert_eq!(index(9, "third lin").resolve(&shabad).unwrap(), Some(2));
        assert_eq!(index(9, "").resolve(&shabad).unwrap(), None);
        assert_eq!(
            LineHint::Text("secnd line".to_string()).resolve(&shabad).unwrap(),
            Some(1)
        );
        let by_verse = LineHint::VerseOrText {
            verse_id: Some("5-2".to_string()),
            text: "first line".to_string(),
        };
        assert_eq!(by_verse.resolve(&shabad).unwrap(), Some(2));
        let unknown_verse = LineHint::VerseOrText {
            verse_id: Some("nope".to_string()),
            text: "first line".to_string(),
        };
        assert_eq!(unknown_verse.resolve(&shabad).unwrap(), Some(0));
    }

    #[test_log::test(tokio::test)]
    async fn import_item_skips_fetch_failures_and_empty_shabads() {
        let source = StaticShabads::new()
            .with(sample_shabad(1, &["a"]))
            .with(sample_shabad(2, &[]));
        let mut library = Library::new();
        let store = LibraryStore::in_memory();
        let (_sender, mut cancel) = new_cancel_channel();
        let mut ctx = ImportContext::new(&mut library, &store, &source, &NoProgress, &mut cancel);
        let root = ctx.create_import_root(Utc::now()).unwrap();

        let pending = |location: &str, shabad_id| PendingItem {
            location: location.to_string(),
            shabad_id,
            line: LineHint::Default,
            sort_index: 0,
            added_at: None,
        };
        assert!(ctx.import_item(root, pending("ok", 1)).await.unwrap().is_some());
        assert!(ctx.import_item(root, pending("missing", 3)).await.unwrap().is_none());
        assert!(ctx.import_item(root, pending("empty", 2)).await.unwrap().is_none());

        let report = ctx.finish();
        assert_eq!(report.imported, 1);
        assert_eq!(report.folders, 1);
        assert_eq!(report.skipped.len(), 2);
        assert!(matches!(report.skipped[0].reason, SkipReason::Fetch { .. }));
        assert_eq!(report.skipped[1].reason, SkipReason::NoLines);
        // root creation plus one item
        assert_eq!(store.save_count(), 2);
        let root_name = &library.folder(root).unwrap().name;
        assert!(root_name.starts_with("Import "));
    }
}
