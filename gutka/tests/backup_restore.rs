//! End-to-end backup, restore, and import tests against an in-memory shabad source.

use std::{fs, thread, time::Duration};

use chrono::{DateTime, Utc};
use gurbani::source::ShabadSource;
use gurbani::test_util::{StaticShabads, sample_shabad};
use gutka::{
    document::{BackupDocument, BackupFolder},
    prelude::*,
    snapshot::{export_document, restore_document},
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Folder tree with ids removed
#[derive(Debug, PartialEq, Eq)]
struct Shape {
    name: String,
    is_system_folder: bool,
    sort_index: i64,
    items: Vec<(u32, String, i64, i64, DateTime<Utc>)>,
    subfolders: Vec<Shape>,
}

fn shape(folder: &BackupFolder) -> Shape {
    Shape {
        name: folder.name.clone(),
        is_system_folder: folder.is_system_folder,
        sort_index: folder.sort_index,
        items: folder
            .shabads
            .iter()
            .map(|item| {
                (
                    item.shabad_id,
                    item.title.clone(),
                    item.index_of_selected_line,
                    item.sort_index,
                    item.added_at,
                )
            })
            .collect(),
        subfolders: folder.subfolders.iter().map(shape).collect(),
    }
}

fn source() -> StaticShabads {
    StaticShabads::new()
        .with(sample_shabad(1, &["ik oankar", "sat naam", "karta purakh"]))
        .with(sample_shabad(2, &["so dar", "keha so ghar"]))
        .with(sample_shabad(3, &["one"]))
        .with(sample_shabad(99, &["first line", "line text", "last line"]))
}

fn sample_library() -> Library {
    let mut library = Library::new();
    let favorites = library.favorites().unwrap();
    let japji = || sample_shabad(1, &["ik oankar", "sat naam", "karta purakh"]);
    library.add_item(favorites, japji(), Some(2)).unwrap();
    let kirtan = library.create_folder(None, "Kirtan").unwrap();
    let asa = library.create_folder(Some(kirtan), "Asa").unwrap();
    library.create_folder(Some(kirtan), "Empty").unwrap();
    library
        .add_item(kirtan, sample_shabad(2, &["so dar", "keha so ghar"]), None)
        .unwrap();
    library.add_item(asa, sample_shabad(3, &["one"]), Some(0)).unwrap();
    library.add_item(asa, japji(), Some(1)).unwrap();
    library
}

/// Sends a cancel request once `after` items have been imported,
/// and records the import counts it was told about
struct CancelAfter {
    after: usize,
    sender: mpsc::UnboundedSender<CancelToken>,
    imported: Mutex<Vec<usize>>,
}

impl CancelAfter {
    fn new(after: usize, sender: mpsc::UnboundedSender<CancelToken>) -> Self {
        Self {
            after,
            sender,
            imported: Mutex::new(Vec::new()),
        }
    }

    fn imported(&self) -> Vec<usize> {
        self.imported.lock().clone()
    }
}

impl ProgressSink for CancelAfter {
    fn report(&self, event: ProgressEvent) {
        if let ProgressEvent::ItemImported { count, .. } = event {
            self.imported.lock().push(count);
            if count == self.after {
                let _ = self.sender.send(CancelToken::Requested);
            }
        }
    }
}

#[test_log::test(tokio::test)]
async fn export_restore_round_trip() {
    let library = sample_library();
    let settings = Settings {
        larivaar: true,
        text_scale: 2.0,
        ..Settings::default()
    };
    let doc = export_document(&library, &settings, "1.2.3", Utc::now()).unwrap();
    let bytes = doc.to_json().unwrap();
    let decoded = BackupDocument::from_json(&bytes).unwrap();
    assert_eq!(decoded, doc);

    let source = source();
    let mut restored = Library::default();
    let store = LibraryStore::in_memory();
    let dir = tempfile::tempdir().unwrap();
    let settings_store = SettingsStore::new(Some(dir.path().join("settings.json")), None);
    settings_store.save(&Settings::default()).unwrap();
    let mut cancel = CancelState::never();
    let mut ctx = ImportContext::new(&mut restored, &store, &source, &NoProgress, &mut cancel)
        .with_settings_store(&settings_store);
    let root = restore_document(&decoded, &mut ctx).await.unwrap();
    let report = ctx.finish();
    assert_eq!(report.imported, 4);
    assert!(report.settings_restored);
    assert_eq!(settings_store.load(), settings);
    assert!(report.skipped.is_empty());
    assert_eq!(report.folders, 1 + doc.folder_count());

    let again = export_document(&restored, &Settings::default(), "1.2.3", Utc::now()).unwrap();
    assert_eq!(again.root_folders.len(), 1);
    let import_root = &again.root_folders[0];
    assert_eq!(restored.folder(root).unwrap().name, import_root.name);
    assert!(import_root.name.starts_with("Import "));

    let original: Vec<Shape> = doc.root_folders.iter().map(shape).collect();
    let round_tripped: Vec<Shape> = import_root.subfolders.iter().map(shape).collect();
    assert_eq!(round_tripped, original);
}

#[test_log::test(tokio::test)]
async fn legacy_bookmarks_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("old.bookmarks");
    let tree = plist::Value::Array(vec![
        plist::Value::String("Title".to_string()),
        plist::Value::Array(vec![plist::Value::Array(vec![
            plist::Value::String("line text".to_string()),
            plist::Value::Integer(42_i64.into()),
        ])]),
    ]);
    tree.to_file_xml(&file).unwrap();

    let tables = LookupTables::default().with_bookmark_shabad("42", "99");
    let source = source();
    let service =
        BackupService::with_dirs(BackupConfig::default(), None, dir.path().join("backups"));
    let (progress, mut events) = ChannelProgress::new();
    let mut library = Library::new();
    let store = LibraryStore::in_memory();
    let mut cancel = CancelState::never();
    let mut ctx = ImportContext::new(&mut library, &store, &source, &progress, &mut cancel);
    let root = service.import_file(&file, None, &tables, &mut ctx).await.unwrap();
    let report = ctx.finish();
    drop(progress);

    assert_eq!(report.imported, 1);
    let folders = library.subfolders(root).unwrap();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].name, "Title");
    let items = library.items(folders[0].id).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].shabad.id(), 99);
    assert_eq!(items[0].selected_line(), Some(1));

    let mut imported = Vec::new();
    while let Some(event) = events.recv().await {
        if let ProgressEvent::ItemImported { count, .. } = event {
            imported.push(count);
        }
    }
    assert_eq!(imported, vec![1]);
}

#[test_log::test(tokio::test)]
async fn legacy_bookmarks_skip_bad_nodes() {
    let bytes = br#"[
        ["Good", [["ik", 1], ["unknown", 77], ["bad"], ["sat naam", "1", "sat nam", 500]]],
        ["loose", 3]
    ]"#;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("mixed.bookmarks");
    fs::write(&file, bytes).unwrap();

    let tables = LookupTables::default()
        .with_bookmark_shabad("1", "1")
        .with_bookmark_shabad("3", "3")
        .with_bookmark_line("500", "1-1");
    let source = source();
    let service = BackupService::with_dirs(BackupConfig::default(), None, dir.path().into());
    let mut library = Library::new();
    let store = LibraryStore::in_memory();
    let mut cancel = CancelState::never();
    let mut ctx = ImportContext::new(&mut library, &store, &source, &NoProgress, &mut cancel);
    let root = service.import_file(&file, None, &tables, &mut ctx).await.unwrap();
    let report = ctx.finish();

    assert_eq!(report.imported, 3);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(library.items(root).unwrap().len(), 1);
    let good = library.subfolders(root).unwrap()[0].id;
    let items = library.items(good).unwrap();
    // first in the file is on top
    assert_eq!(items[0].selected_line(), Some(0));
    assert_eq!(items[1].selected_line(), Some(1));
}

#[test_log::test(tokio::test)]
async fn interrupted_restore_rerun_duplicates() {
    let mut original = Library::default();
    let folder = original.create_folder(None, "Five").unwrap();
    for id in [1, 2, 3, 1, 2] {
        original.add_item(folder, source().fetch_shabad(id).await.unwrap(), None).unwrap();
    }
    let bytes = export_document(&original, &Settings::default(), "1.0", Utc::now())
        .unwrap()
        .to_json()
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = LibraryStore::at(dir.path().join("library.json"));
    let service = BackupService::with_dirs(BackupConfig::default(), None, dir.path().into());
    let source = source();
    let mut library = Library::new();

    let (sender, mut cancel) = new_cancel_channel();
    let canceller = CancelAfter::new(2, sender);
    let mut ctx = ImportContext::new(&mut library, &store, &source, &canceller, &mut cancel);
    let err = service.restore(&bytes, &mut ctx).await.unwrap_err();
    let report = ctx.finish();
    assert!(matches!(err, BackupError::Cancelled));
    assert_eq!(report.imported, 2);
    assert_eq!(service.restore_state(), RestoreState::Failed);

    // everything done before the cancel was persisted
    let persisted = store.load().unwrap();
    assert_eq!(persisted.item_count(), 2);

    let mut cancel = CancelState::never();
    let mut ctx = ImportContext::new(&mut library, &store, &source, &NoProgress, &mut cancel);
    let second_root = service.restore(&bytes, &mut ctx).await.unwrap();
    assert_eq!(ctx.finish().imported, 5);
    assert_eq!(service.restore_state(), RestoreState::Done);

    let roots = library.root_folders();
    assert_eq!(roots.len(), 3);
    assert!(roots[1].name.starts_with("Import "));
    assert_eq!(roots[2].id, second_root);
    let first_copy = library.subfolders(roots[1].id).unwrap()[0].id;
    let second_copy = library.subfolders(second_root).unwrap()[0].id;
    assert_eq!(library.items(first_copy).unwrap().len(), 2);
    assert_eq!(library.items(second_copy).unwrap().len(), 5);
    assert_eq!(library.item_count(), 7);
    assert_eq!(store.load().unwrap(), library);
}

#[test]
fn auto_backup_is_debounced() {
    let dir = tempfile::tempdir().unwrap();
    let service = BackupService::with_dirs(BackupConfig::default(), None, dir.path().join("b"));
    let library = sample_library();
    let settings = Settings::default();

    let first = service.auto_backup(&library, &settings).unwrap();
    assert!(first.is_some());
    assert_eq!(service.export_state(), ExportState::Done);
    let second = service.auto_backup(&library, &settings).unwrap();
    assert!(second.is_none());
    assert_eq!(service.list_backups().unwrap().len(), 1);

    let disabled = Settings {
        auto_backup: false,
        ..Settings::default()
    };
    let eager = BackupService::with_dirs(
        BackupConfig::default().auto_backup_interval(Duration::ZERO),
        None,
        dir.path().join("c"),
    );
    assert!(eager.auto_backup(&library, &disabled).unwrap().is_none());
    assert!(eager.auto_backup(&library, &settings).unwrap().is_some());
    thread::sleep(Duration::from_millis(5));
    assert!(eager.auto_backup(&library, &settings).unwrap().is_some());
    assert_eq!(eager.list_backups().unwrap().len(), 2);
}

#[test]
fn export_rotates_old_backups() {
    let dir = tempfile::tempdir().unwrap();
    let service = BackupService::with_dirs(
        BackupConfig::default().keep_backups(2),
        None,
        dir.path().to_path_buf(),
    );
    let library = sample_library();
    let mut written = Vec::new();
    for _ in 0..4 {
        written.push(service.export(&library, &Settings::default()).unwrap());
        thread::sleep(Duration::from_millis(5));
    }
    let remaining: Vec<_> =
        service.list_backups().unwrap().into_iter().map(|b| b.path).collect();
    assert_eq!(remaining, vec![written[3].clone(), written[2].clone()]);
}

#[test_log::test(tokio::test)]
async fn exported_file_restores_through_import_file() {
    let dir = tempfile::tempdir().unwrap();
    let service = BackupService::with_dirs(BackupConfig::default(), None, dir.path().into());
    let saved = Settings {
        larivaar: true,
        text_scale: 2.0,
        ..Settings::default()
    };
    let path = service.export(&sample_library(), &saved).unwrap();
    assert_eq!(ImportFormat::from_path(&path).unwrap(), ImportFormat::Native);

    let settings_store = SettingsStore::new(
        Some(dir.path().join("settings.json")),
        Some(dir.path().join("shared-settings.json")),
    );
    settings_store.save(&Settings::default()).unwrap();

    let source = source();
    let mut library = Library::new();
    let store = LibraryStore::in_memory();
    let mut cancel = CancelState::never();
    let mut ctx = ImportContext::new(&mut library, &store, &source, &NoProgress, &mut cancel)
        .with_settings_store(&settings_store);
    service
        .import_file(&path, None, &LookupTables::default(), &mut ctx)
        .await
        .unwrap();
    let report = ctx.finish();
    assert_eq!(report.imported, 4);
    assert!(report.settings_restored);
    assert_eq!(settings_store.load(), saved);
    let shared_only = SettingsStore::new(None, Some(dir.path().join("shared-settings.json")));
    assert_eq!(shared_only.load(), saved);
    // the restored Favorites copy keeps its flag, the original is still protected
    let favorites = library.favorites().unwrap();
    assert!(library.delete_folder(favorites).is_err());
}

#[test_log::test(tokio::test)]
async fn unsupported_import_fails_without_changes() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("notes.txt");
    fs::write(&file, b"hello").unwrap();
    let service = BackupService::with_dirs(BackupConfig::default(), None, dir.path().into());
    let source = source();
    let mut library = Library::new();
    let store = LibraryStore::in_memory();
    let mut cancel = CancelState::never();
    let mut ctx = ImportContext::new(&mut library, &store, &source, &NoProgress, &mut cancel);
    let err = service
        .import_file(&file, None, &LookupTables::default(), &mut ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::UnsupportedFormat { .. }));
    drop(ctx);
    assert_eq!(library.folder_count(), 1);
    assert_eq!(store.save_count(), 0);
}

#[test_log::test(tokio::test)]
async fn legacy_imports_without_settings() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("one.favorites");
    fs::write(&file, br#"{"favorites": [{"text": "one", "uid": "u3"}]}"#).unwrap();
    let settings_store = SettingsStore::new(Some(dir.path().join("settings.json")), None);

    let tables = LookupTables::default().with_favorite_uid("u3", "3");
    let service = BackupService::with_dirs(BackupConfig::default(), None, dir.path().into());
    let source = source();
    let mut library = Library::new();
    let store = LibraryStore::in_memory();
    let mut cancel = CancelState::never();
    let mut ctx = ImportContext::new(&mut library, &store, &source, &NoProgress, &mut cancel)
        .with_settings_store(&settings_store);
    service.import_file(&file, None, &tables, &mut ctx).await.unwrap();
    let report = ctx.finish();
    assert_eq!(report.imported, 1);
    assert!(!report.settings_restored);
    assert!(!dir.path().join("settings.json").exists());
}

#[test_log::test(tokio::test)]
async fn cancelled_bookmarks_import_keeps_saved_items() {
    let bytes = br#"["Title", [["ik", 1], ["so dar", 2], ["one", 3], ["sat naam", 1]]]"#;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("four.bookmarks");
    fs::write(&file, bytes).unwrap();

    let tables = LookupTables::default()
        .with_bookmark_shabad("1", "1")
        .with_bookmark_shabad("2", "2")
        .with_bookmark_shabad("3", "3");
    let service = BackupService::with_dirs(BackupConfig::default(), None, dir.path().into());
    let store = LibraryStore::at(dir.path().join("library.json"));
    let source = source();
    let mut library = Library::new();

    let (sender, mut cancel) = new_cancel_channel();
    let canceller = CancelAfter::new(2, sender);
    let mut ctx = ImportContext::new(&mut library, &store, &source, &canceller, &mut cancel);
    let err = service.import_file(&file, None, &tables, &mut ctx).await.unwrap_err();
    let report = ctx.finish();

    assert!(matches!(err, BackupError::Cancelled));
    assert_eq!(report.imported, 2);
    assert_eq!(canceller.imported(), vec![1, 2]);
    assert_eq!(source.fetch_count(), 2);

    let persisted = store.load().unwrap();
    assert_eq!(persisted.item_count(), 2);
    let root = report.root.unwrap();
    let title = persisted.subfolders(root).unwrap()[0].id;
    let ids: Vec<u32> = persisted
        .items(title)
        .unwrap()
        .iter()
        .map(|item| item.shabad.id())
        .collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test_log::test(tokio::test)]
async fn cancelled_favorites_import_keeps_saved_items() {
    let bytes = br#"{"favorites": [
        {"text": "ik", "uid": "a"},
        {"text": "so dar", "uid": "b"},
        {"text": "one", "uid": "c"}
    ]}"#;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("three.favorites");
    fs::write(&file, bytes).unwrap();

    let tables = LookupTables::default()
        .with_favorite_uid("a", "1")
        .with_favorite_uid("b", "2")
        .with_favorite_uid("c", "3");
    let service = BackupService::with_dirs(BackupConfig::default(), None, dir.path().into());
    let store = LibraryStore::at(dir.path().join("library.json"));
    let source = source();
    let mut library = Library::new();

    let (sender, mut cancel) = new_cancel_channel();
    let canceller = CancelAfter::new(1, sender);
    let mut ctx = ImportContext::new(&mut library, &store, &source, &canceller, &mut cancel);
    let err = service.import_file(&file, None, &tables, &mut ctx).await.unwrap_err();
    let report = ctx.finish();

    assert!(matches!(err, BackupError::Cancelled));
    assert_eq!(report.imported, 1);
    assert_eq!(canceller.imported(), vec![1]);
    assert_eq!(source.fetch_count(), 1);

    let persisted = store.load().unwrap();
    let items = persisted.items(report.root.unwrap()).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].shabad.id(), 1);
}
