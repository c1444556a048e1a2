//! Native backup file format.
//!
//! A backup is a pretty-printed JSON document with camelCase keys in sorted order.
//! Content is never embedded: each saved item is stored as a shabad id plus the
//! title line, and restore re-fetches the canonical shabad.
//!
//! `indexOfSelectedLine` is `-1` for "default to the first line".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use uuid::Uuid;

use crate::{
    Result,
    error::{BackupError, EncodeSnafu},
    settings::Settings,
};

/// Selected-line value meaning "no explicit selection"
pub const DEFAULT_LINE_SENTINEL: i64 = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub created_at: DateTime<Utc>,
    pub app_version: String,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub root_folders: Vec<BackupFolder>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupFolder {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub is_system_folder: bool,
    #[serde(default)]
    pub sort_index: i64,
    #[serde(default)]
    pub shabads: Vec<BackupShabadRef>,
    #[serde(default)]
    pub subfolders: Vec<BackupFolder>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupShabadRef {
    pub id: Uuid,
    pub shabad_id: u32,
    /// Text of the displayed line at export time
    pub title: String,
    pub index_of_selected_line: i64,
    #[serde(default)]
    pub sort_index: i64,
    pub added_at: DateTime<Utc>,
}

impl BackupShabadRef {
    /// The stored selection; `None` for the default sentinel (any negative value)
    pub fn selected_line(&self) -> Option<usize> {
        usize::try_from(self.index_of_selected_line).ok()
    }
}

/// Encodes a selection for the backup file
pub fn selected_line_value(selected_line: Option<usize>) -> i64 {
    selected_line.map_or(DEFAULT_LINE_SENTINEL, |index| {
        i64::try_from(index).unwrap_or(i64::MAX)
    })
}

impl BackupFolder {
    /// Number of folders in this subtree, including self
    pub fn folder_count(&self) -> usize {
        1 + self.subfolders.iter().map(Self::folder_count).sum::<usize>()
    }

    /// Number of saved items in this subtree
    pub fn item_count(&self) -> usize {
        self.shabads.len() + self.subfolders.iter().map(Self::item_count).sum::<usize>()
    }
}

impl BackupDocument {
    pub fn folder_count(&self) -> usize {
        self.root_folders.iter().map(BackupFolder::folder_count).sum()
    }

    pub fn item_count(&self) -> usize {
        self.root_folders.iter().map(BackupFolder::item_count).sum()
    }

    /// Pretty-printed JSON with keys sorted
    pub fn to_json(&self) -> Result<Vec<u8>> {
        // serde_json::Map is ordered by key
        let value = serde_json::to_value(self).context(EncodeSnafu {
            what: "backup document",
        })?;
        let mut bytes = serde_json::to_vec_pretty(&value).context(EncodeSnafu {
            what: "backup document",
        })?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Decodes a backup file. Errors report the JSON path of the offending value.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_slice(bytes);
        serde_path_to_error::deserialize(&mut deserializer).map_err(|err| BackupError::Decode {
            what: "backup document".to_string(),
            path: err.path().to_string(),
            source: err.into_inner(),
        })
    }
}
