//! Filesystem locations used by gutka.

use std::{env, path::PathBuf};

use crate::{
    config::{CLOUD_DIR_ENV, DATA_DIR_ENV, RESOURCES_ENV, SHARED_DIR_ENV},
    settings::SettingsStore,
};

const APP_DIR: &str = "gutka";
const DOCUMENTS_APP_DIR: &str = "Gutka";
const BACKUPS_DIR: &str = "Backups";
const LIBRARY_FILE: &str = "library.json";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Library and app-local settings
    pub data_dir: PathBuf,
    /// Settings shared with companion widgets
    pub shared_dir: Option<PathBuf>,
    /// Bundled lookup tables
    pub resources_dir: PathBuf,
    /// Preferred backup location, used when writable
    pub cloud_backup_dir: Option<PathBuf>,
    /// Fallback backup location
    pub local_backup_dir: PathBuf,
}

impl AppPaths {
    /// Resolves paths from the environment.
    ///
    /// An explicit `data_dir` (or `GUTKA_DATA_DIR`) also holds the local backups, so a
    /// custom data dir is self-contained. Otherwise local backups go to
    /// `<documents>/Gutka/Backups`.
    pub fn from_env(data_dir: Option<PathBuf>) -> Self {
        let explicit = data_dir.or_else(|| env::var_os(DATA_DIR_ENV).map(PathBuf::from));
        let (data_dir, local_backup_dir) = match explicit {
            Some(dir) => {
                let backups = dir.join(BACKUPS_DIR);
                (dir, backups)
            }
            None => {
                let dir = dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(APP_DIR);
                let backups = dirs::document_dir().map_or_else(
                    || dir.join(BACKUPS_DIR),
                    |docs| docs.join(DOCUMENTS_APP_DIR).join(BACKUPS_DIR),
                );
                (dir, backups)
            }
        };
        let resources_dir = env::var_os(RESOURCES_ENV)
            .map_or_else(|| data_dir.join("resources"), PathBuf::from);
        Self {
            shared_dir: env::var_os(SHARED_DIR_ENV).map(PathBuf::from),
            cloud_backup_dir: env::var_os(CLOUD_DIR_ENV).map(PathBuf::from),
            resources_dir,
            local_backup_dir,
            data_dir,
        }
    }

    /// All paths under one directory, without a cloud or shared location
    pub fn under(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            shared_dir: None,
            cloud_backup_dir: None,
            resources_dir: dir.join("resources"),
            local_backup_dir: dir.join(BACKUPS_DIR),
            data_dir: dir,
        }
    }

    pub fn library_file(&self) -> PathBuf {
        self.data_dir.join(LIBRARY_FILE)
    }

    pub fn settings_store(&self) -> SettingsStore {
        SettingsStore::new(
            Some(self.data_dir.join(SETTINGS_FILE)),
            self.shared_dir.as_ref().map(|dir| dir.join(SETTINGS_FILE)),
        )
    }
}
