//! # Backup orchestrator
//!
//! [`BackupService`] exports the library to timestamped backup files, keeps the
//! newest `keep_backups` of them, debounces automatic backups, lists and deletes
//! backup files, and drives restore and import.
//!
//! Export: `Idle → Serializing → Writing → RotatingOldBackups → Done | Failed`.
//! Only a write failure fails an export. Rotation failures are logged.
//!
//! Restore: `Idle → Decoding → BuildingRoot → RestoringFolders → Done | Failed`.
//!
//! Backups are written to the cloud directory when it is writable, otherwise to the
//! local directory. Listing and lookup search both.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant, SystemTime},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use gurbani::source::ShabadSource;
use parking_lot::Mutex;
use serde::Serialize;
use snafu::prelude::*;
use strum::Display;
use tracing::{debug, error, info, warn};

use crate::{
    Result,
    config::{
        AUTO_BACKUP_MIN_INTERVAL_SECS, BACKUP_EXTENSION, BACKUP_FILE_PREFIX,
        BACKUP_TIMESTAMP_FORMAT, KEEP_BACKUPS,
    },
    document::BackupDocument,
    error::{BackupError, InvalidBackupNameSnafu, IoSnafu},
    import::{self, ImportContext, ImportFormat},
    library::{FolderId, Library, write_atomic},
    lookup::LookupTables,
    paths::AppPaths,
    settings::Settings,
    snapshot,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    /// Number of backup files kept by rotation
    pub keep_backups: usize,
    /// Minimum time between two automatic backups
    pub auto_backup_interval: Duration,
    /// Recorded in each backup document
    pub app_version: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            keep_backups: KEEP_BACKUPS,
            auto_backup_interval: Duration::from_secs(AUTO_BACKUP_MIN_INTERVAL_SECS),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl BackupConfig {
    pub fn keep_backups(mut self, keep_backups: usize) -> Self {
        self.keep_backups = keep_backups;
        self
    }

    pub fn auto_backup_interval(mut self, interval: Duration) -> Self {
        self.auto_backup_interval = interval;
        self
    }

    pub fn app_version(mut self, app_version: impl Into<String>) -> Self {
        self.app_version = app_version.into();
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
pub enum ExportState {
    #[default]
    Idle,
    Serializing,
    Writing,
    RotatingOldBackups,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
pub enum RestoreState {
    #[default]
    Idle,
    Decoding,
    BuildingRoot,
    RestoringFolders,
    Done,
    Failed,
}

/// A backup file on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupFileInfo {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a rotation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationSummary {
    pub kept: usize,
    pub removed: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct BackupService {
    config: BackupConfig,
    cloud_dir: Option<PathBuf>,
    local_dir: PathBuf,
    export_state: Mutex<ExportState>,
    restore_state: Mutex<RestoreState>,
    last_auto_backup: Mutex<Option<Instant>>,
}

impl BackupService {
    pub fn new(config: BackupConfig, paths: &AppPaths) -> Self {
        Self::with_dirs(
            config,
            paths.cloud_backup_dir.clone(),
            paths.local_backup_dir.clone(),
        )
    }

    pub fn with_dirs(
        config: BackupConfig,
        cloud_dir: Option<PathBuf>,
        local_dir: PathBuf,
    ) -> Self {
        Self {
            config,
            cloud_dir,
            local_dir,
            export_state: Mutex::new(ExportState::Idle),
            restore_state: Mutex::new(RestoreState::Idle),
            last_auto_backup: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn export_state(&self) -> ExportState {
        *self.export_state.lock()
    }

    pub fn restore_state(&self) -> RestoreState {
        *self.restore_state.lock()
    }

    fn set_export_state(&self, state: ExportState) {
        debug!(%state, "export state");
        *self.export_state.lock() = state;
    }

    fn set_restore_state(&self, state: RestoreState) {
        debug!(%state, "restore state");
        *self.restore_state.lock() = state;
    }

    /// Directory new backups are written to: the cloud directory when writable,
    /// else the local directory.
    pub fn writable_backup_dir(&self) -> Result<PathBuf> {
        if let Some(cloud) = &self.cloud_dir {
            if is_writable_dir(cloud) {
                return Ok(cloud.clone());
            }
            warn!(dir = %cloud.display(), "cloud backup directory not writable, using local");
        }
        if is_writable_dir(&self.local_dir) {
            return Ok(self.local_dir.clone());
        }
        Err(BackupError::StorageUnavailable {
            message: format!("cannot write to {}", self.local_dir.display()),
        })
    }

    /// Directories backups may be in: the cloud directory, then the local one.
    /// Exports fall back to the local directory, so both are searched.
    pub fn backup_dirs(&self) -> Vec<&Path> {
        let mut dirs: Vec<&Path> = self.cloud_dir.iter().map(PathBuf::as_path).collect();
        if !dirs.contains(&self.local_dir.as_path()) {
            dirs.push(&self.local_dir);
        }
        dirs
    }

    /// Writes a backup of the library and rotates old backups. Returns the new file.
    pub fn export(&self, library: &Library, settings: &Settings) -> Result<PathBuf> {
        let result = self.export_inner(library, settings);
        match &result {
            Ok(path) => {
                self.set_export_state(ExportState::Done);
                info!(path = %path.display(), "backup written");
            }
            Err(err) => {
                self.set_export_state(ExportState::Failed);
                error!("backup failed: {err}");
            }
        }
        result
    }

    fn export_inner(&self, library: &Library, settings: &Settings) -> Result<PathBuf> {
        self.set_export_state(ExportState::Serializing);
        let created_at = Utc::now();
        let doc =
            snapshot::export_document(library, settings, &self.config.app_version, created_at)?;
        let bytes = doc.to_json()?;

        self.set_export_state(ExportState::Writing);
        let dir = self.writable_backup_dir()?;
        let path = dir.join(backup_file_name(created_at));
        write_atomic(&path, &bytes).map_err(|err| BackupError::StorageUnavailable {
            message: err.to_string(),
        })?;

        self.set_export_state(ExportState::RotatingOldBackups);
        match self.rotate(&dir) {
            Ok(summary) if summary.failed > 0 => {
                warn!(failed = summary.failed, "some old backups could not be removed");
            }
            Ok(summary) => debug!(?summary, "rotated backups"),
            Err(err) => warn!("backup rotation failed: {err}"),
        }
        Ok(path)
    }

    /// Exports unless automatic backups are disabled or the previous automatic
    /// backup is more recent than `auto_backup_interval`. Returns `Ok(None)` without
    /// touching the filesystem when skipped.
    pub fn auto_backup(&self, library: &Library, settings: &Settings) -> Result<Option<PathBuf>> {
        if !settings.auto_backup {
            debug!("automatic backups disabled");
            return Ok(None);
        }
        let mut last = self.last_auto_backup.lock();
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.config.auto_backup_interval {
                debug!(?elapsed, "skipping automatic backup");
                return Ok(None);
            }
        }
        let path = self.export(library, settings)?;
        *last = Some(Instant::now());
        Ok(Some(path))
    }

    /// Starts the auto-backup clock at the newest backup file on disk, so the
    /// interval also holds across separate processes.
    pub fn resume_auto_backup_clock(&self) -> Result<()> {
        let Some(newest) = self.list_backups()?.into_iter().next() else {
            return Ok(());
        };
        let age = (Utc::now() - newest.created_at).to_std().unwrap_or_default();
        let started = Instant::now().checked_sub(age);
        debug!(name = %newest.name, ?age, "resuming auto-backup clock");
        *self.last_auto_backup.lock() = started;
        Ok(())
    }

    /// Deletes all but the newest `keep_backups` files in `dir`.
    /// A file that cannot be removed is logged and skipped.
    pub fn rotate(&self, dir: &Path) -> Result<RotationSummary> {
        let backups = list_backups_in(dir)?;
        let mut summary = RotationSummary {
            kept: backups.len().min(self.config.keep_backups),
            ..RotationSummary::default()
        };
        for stale in backups.iter().skip(self.config.keep_backups) {
            match fs::remove_file(&stale.path) {
                Ok(()) => {
                    debug!(name = %stale.name, "removed old backup");
                    summary.removed += 1;
                }
                Err(err) => {
                    warn!(
                        path = %stale.path.display(),
                        error = %err,
                        "failed to remove old backup"
                    );
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Backup files in all backup directories, newest first
    pub fn list_backups(&self) -> Result<Vec<BackupFileInfo>> {
        let mut backups = Vec::new();
        for dir in self.backup_dirs() {
            if dir.is_dir() {
                backups.extend(list_backups_in(dir)?);
            }
        }
        sort_newest_first(&mut backups);
        Ok(backups)
    }

    /// Full path of an existing backup, e.g. for sharing
    pub fn backup_path(&self, name: &str) -> Result<PathBuf> {
        check_backup_name(name)?;
        self.backup_dirs()
            .into_iter()
            .map(|dir| dir.join(name))
            .find(|path| path.is_file())
            .context(InvalidBackupNameSnafu { name })
    }

    pub fn delete_backup(&self, name: &str) -> Result<()> {
        let path = self.backup_path(name)?;
        fs::remove_file(&path).context(IoSnafu { path: &path })?;
        info!(name, "deleted backup");
        Ok(())
    }

    /// Restores a native backup under a new import root
    pub async fn restore<S: ShabadSource>(
        &self,
        bytes: &[u8],
        ctx: &mut ImportContext<'_, S>,
    ) -> Result<FolderId> {
        let result = self.restore_inner(bytes, ctx).await;
        match &result {
            Ok(root) => {
                self.set_restore_state(RestoreState::Done);
                info!(%root, "restore complete");
            }
            Err(err) => {
                self.set_restore_state(RestoreState::Failed);
                error!("restore failed: {err}");
            }
        }
        result
    }

    async fn restore_inner<S: ShabadSource>(
        &self,
        bytes: &[u8],
        ctx: &mut ImportContext<'_, S>,
    ) -> Result<FolderId> {
        self.set_restore_state(RestoreState::Decoding);
        let doc = BackupDocument::from_json(bytes)?;
        self.set_restore_state(RestoreState::BuildingRoot);
        let root = ctx.create_import_root(doc.created_at)?;
        self.set_restore_state(RestoreState::RestoringFolders);
        snapshot::restore_folders(&doc, root, ctx).await?;
        ctx.restore_settings(&doc.settings)?;
        Ok(root)
    }

    /// Imports a file of any supported format. The format is taken from the file
    /// extension unless given.
    pub async fn import_file<S: ShabadSource>(
        &self,
        path: &Path,
        format: Option<ImportFormat>,
        tables: &LookupTables,
        ctx: &mut ImportContext<'_, S>,
    ) -> Result<FolderId> {
        let format = match format {
            Some(format) => format,
            None => ImportFormat::from_path(path)?,
        };
        let bytes = fs::read(path).context(IoSnafu { path })?;
        info!(path = %path.display(), %format, "importing");
        match format {
            ImportFormat::Native => self.restore(&bytes, ctx).await,
            ImportFormat::Bookmarks => import::tree::import(&bytes, tables, ctx).await,
            ImportFormat::Favorites => import::favorites::import(&bytes, tables, ctx).await,
        }
    }
}

/// `gutka-YYYYMMDD-HHMMSS-mmm.gutkabackup`, in UTC
pub fn backup_file_name(created_at: DateTime<Utc>) -> String {
    format!(
        "{BACKUP_FILE_PREFIX}{}.{BACKUP_EXTENSION}",
        created_at.format(BACKUP_TIMESTAMP_FORMAT)
    )
}

/// Creation time embedded in a backup file name
pub fn parse_backup_file_name(name: &str) -> Option<DateTime<Utc>> {
    let stamp = name
        .strip_prefix(BACKUP_FILE_PREFIX)?
        .strip_suffix(BACKUP_EXTENSION)?
        .strip_suffix('.')?;
    NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn check_backup_name(name: &str) -> Result<()> {
    let plain = !name.is_empty()
        && !name.contains(['/', '\\'])
        && name != ".."
        && Path::new(name).extension().and_then(|ext| ext.to_str()) == Some(BACKUP_EXTENSION);
    ensure!(plain, InvalidBackupNameSnafu { name });
    Ok(())
}

fn is_writable_dir(dir: &Path) -> bool {
    fs::create_dir_all(dir).is_ok() && tempfile::NamedTempFile::new_in(dir).is_ok()
}

/// Backup files in `dir`, newest first. A missing directory has no backups.
fn list_backups_in(dir: &Path) -> Result<Vec<BackupFileInfo>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(BackupError::Io { path: dir.to_path_buf(), source }),
    };
    let mut backups = Vec::new();
    for entry in entries {
        let entry = entry.context(IoSnafu { path: dir })?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(BACKUP_EXTENSION) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let metadata = entry.metadata().ok();
        let created_at = parse_backup_file_name(&name)
            .or_else(|| {
                metadata
                    .as_ref()
                    .and_then(|meta| meta.created().or_else(|_| meta.modified()).ok())
                    .map(DateTime::<Utc>::from)
            })
            .unwrap_or_else(|| DateTime::<Utc>::from(SystemTime::UNIX_EPOCH));
        backups.push(BackupFileInfo {
            name,
            path,
            size: metadata.map_or(0, |meta| meta.len()),
            created_at,
        });
    }
    sort_newest_first(&mut backups);
    Ok(backups)
}

fn sort_newest_first(backups: &mut [BackupFileInfo]) {
    backups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.name.cmp(&a.name)));
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"{}").unwrap();
    }

    fn stamp(seconds: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, seconds).single().unwrap()
    }

    #[test]
    fn file_name_round_trip() {
        let created = stamp(5) + chrono::Duration::milliseconds(678);
        let name = backup_file_name(created);
        assert_eq!(name, "gutka-20250102-030405-678.gutkabackup");
        assert_eq!(parse_backup_file_name(&name), Some(created));
        assert_eq!(parse_backup_file_name("other.gutkabackup"), None);
    }

    #[test]
    fn rotation_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        for seconds in 0..5 {
            touch(dir.path(), &backup_file_name(stamp(seconds)));
        }
        touch(dir.path(), "notes.txt");
        let service = BackupService::with_dirs(
            BackupConfig::default().keep_backups(3),
            None,
            dir.path().to_path_buf(),
        );
        let summary = service.rotate(dir.path()).unwrap();
        assert_eq!(summary, RotationSummary { kept: 3, removed: 2, failed: 0 });

        let names: Vec<String> =
            service.list_backups().unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(
            names,
            vec![
                backup_file_name(stamp(4)),
                backup_file_name(stamp(3)),
                backup_file_name(stamp(2)),
            ]
        );
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn rotation_with_fewer_files_than_limit() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &backup_file_name(stamp(1)));
        let service = BackupService::with_dirs(BackupConfig::default(), None, dir.path().into());
        let summary = service.rotate(dir.path()).unwrap();
        assert_eq!(summary, RotationSummary { kept: 1, removed: 0, failed: 0 });
    }

    #[test]
    fn rotation_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        for seconds in 0..4 {
            touch(dir.path(), &backup_file_name(stamp(seconds + 10)));
        }
        // the oldest "backup" is a directory, so removing it fails
        fs::create_dir(dir.path().join(backup_file_name(stamp(0)))).unwrap();
        touch(dir.path(), &backup_file_name(stamp(1)));

        let service = BackupService::with_dirs(
            BackupConfig::default().keep_backups(2),
            None,
            dir.path().into(),
        );
        let summary = service.rotate(dir.path()).unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.removed, 3);
        assert!(!dir.path().join(backup_file_name(stamp(1))).exists());
    }

    #[test]
    fn delete_and_path_validate_names() {
        let dir = tempfile::tempdir().unwrap();
        let name = backup_file_name(stamp(9));
        touch(dir.path(), &name);
        let service = BackupService::with_dirs(BackupConfig::default(), None, dir.path().into());
        assert_eq!(service.backup_path(&name).unwrap(), dir.path().join(&name));
        for bad in ["../x.gutkabackup", "x.json", "", "missing.gutkabackup"] {
            assert!(matches!(
                service.backup_path(bad),
                Err(BackupError::InvalidBackupName { .. })
            ));
        }
        service.delete_backup(&name).unwrap();
        assert!(service.list_backups().unwrap().is_empty());
    }

    #[test]
    fn falls_back_to_local_when_cloud_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        // a file where the cloud directory should be
        let cloud = dir.path().join("cloud");
        fs::write(&cloud, b"").unwrap();
        let local = dir.path().join("local");
        let service =
            BackupService::with_dirs(BackupConfig::default(), Some(cloud), local.clone());
        assert_eq!(service.writable_backup_dir().unwrap(), local);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn backups_written_locally_are_found_when_cloud_dir_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("local");
        // exists as a directory, but nothing can be created in it
        let cloud = PathBuf::from("/proc");
        let service =
            BackupService::with_dirs(BackupConfig::default(), Some(cloud), local.clone());

        let written = service.export(&Library::new(), &Settings::default()).unwrap();
        assert_eq!(written.parent(), Some(local.as_path()));
        let name = written.file_name().unwrap().to_string_lossy().into_owned();

        let listed: Vec<String> =
            service.list_backups().unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(listed, vec![name.clone()]);
        assert_eq!(service.backup_path(&name).unwrap(), written);

        let restarted =
            BackupService::with_dirs(BackupConfig::default(), Some("/proc".into()), local);
        restarted.resume_auto_backup_clock().unwrap();
        assert!(
            restarted
                .auto_backup(&Library::new(), &Settings::default())
                .unwrap()
                .is_none()
        );

        service.delete_backup(&name).unwrap();
        assert!(!written.exists());
    }

    #[test]
    fn lists_backups_from_cloud_and_local_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = dir.path().join("cloud");
        let local = dir.path().join("local");
        fs::create_dir_all(&cloud).unwrap();
        fs::create_dir_all(&local).unwrap();
        touch(&cloud, &backup_file_name(stamp(1)));
        touch(&local, &backup_file_name(stamp(2)));
        let service =
            BackupService::with_dirs(BackupConfig::default(), Some(cloud.clone()), local.clone());

        let listed = service.list_backups().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].path, local.join(backup_file_name(stamp(2))));
        assert_eq!(listed[1].path, cloud.join(backup_file_name(stamp(1))));
        assert_eq!(
            service.backup_path(&backup_file_name(stamp(1))).unwrap(),
            cloud.join(backup_file_name(stamp(1)))
        );
    }

    #[test]
    fn auto_backup_clock_resumes_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let service = BackupService::with_dirs(BackupConfig::default(), None, dir.path().into());
        service.resume_auto_backup_clock().unwrap();
        let first = service.auto_backup(&Library::new(), &Settings::default()).unwrap();
        assert!(first.is_some());

        // a new process sees the file written a moment ago
        let restarted = BackupService::with_dirs(BackupConfig::default(), None, dir.path().into());
        restarted.resume_auto_backup_clock().unwrap();
        assert!(restarted.auto_backup(&Library::new(), &Settings::default()).unwrap().is_none());

        // an old file does not block
        let stale_dir = tempfile::tempdir().unwrap();
        touch(stale_dir.path(), &backup_file_name(stamp(0)));
        let stale =
            BackupService::with_dirs(BackupConfig::default(), None, stale_dir.path().into());
        stale.resume_auto_backup_clock().unwrap();
        assert!(stale.auto_backup(&Library::new(), &Settings::default()).unwrap().is_some());
    }

    #[test]
    fn export_without_storage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        fs::write(&blocked, b"").unwrap();
        let service = BackupService::with_dirs(BackupConfig::default(), None, blocked.join("sub"));
        let err = service.export(&Library::new(), &Settings::default()).unwrap_err();
        assert!(matches!(err, BackupError::StorageUnavailable { .. }));
        assert_eq!(service.export_state(), ExportState::Failed);
    }
}
