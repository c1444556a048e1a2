//! Bundled tables that translate legacy bookmark ids to canonical content ids.
//!
//! Each table is a JSON object `{"legacyId": "canonicalId"}` (numeric values are
//! accepted too). Tables are loaded once and then shared read-only.

use std::{collections::HashMap, fs, path::Path};

use serde_json::Value;
use snafu::prelude::*;
use tracing::debug;

use crate::{
    Result,
    error::{BackupError, IoSnafu},
};

/// Legacy format A: bookmark shabad id → canonical shabad id
pub const BOOKMARK_SHABADS_FILE: &str = "bookmarks-shabads.json";
/// Legacy format A: bookmark line id → canonical verse id
pub const BOOKMARK_LINES_FILE: &str = "bookmarks-lines.json";
/// Legacy format B: favorite uid → canonical shabad id
pub const FAVORITE_UIDS_FILE: &str = "favorites-uids.json";

type Table = HashMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    bookmark_shabads: Table,
    bookmark_lines: Table,
    favorite_uids: Table,
}

impl LookupTables {
    /// Loads the three tables from `dir`. A missing file loads as an empty table.
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            bookmark_shabads: load_table(&dir.join(BOOKMARK_SHABADS_FILE))?,
            bookmark_lines: load_table(&dir.join(BOOKMARK_LINES_FILE))?,
            favorite_uids: load_table(&dir.join(FAVORITE_UIDS_FILE))?,
        })
    }

    pub fn with_bookmark_shabad(mut self, legacy: &str, canonical: &str) -> Self {
        self.bookmark_shabads
            .insert(legacy.to_string(), canonical.to_string());
        self
    }

    pub fn with_bookmark_line(mut self, legacy: &str, verse_id: &str) -> Self {
        self.bookmark_lines
            .insert(legacy.to_string(), verse_id.to_string());
        self
    }

    pub fn with_favorite_uid(mut self, uid: &str, canonical: &str) -> Self {
        self.favorite_uids
            .insert(uid.to_string(), canonical.to_string());
        self
    }

    /// Canonical shabad id for a format A bookmark id
    pub fn bookmark_shabad(&self, legacy: &str) -> Option<u32> {
        parse_id(self.bookmark_shabads.get(legacy.trim())?)
    }

    /// Canonical verse id for a format A line id
    pub fn bookmark_line(&self, legacy: &str) -> Option<&str> {
        self.bookmark_lines.get(legacy.trim()).map(String::as_str)
    }

    /// Canonical shabad id for a format B favorite uid
    pub fn favorite_uid(&self, uid: &str) -> Option<u32> {
        parse_id(self.favorite_uids.get(uid.trim())?)
    }

    pub fn is_empty(&self) -> bool {
        self.bookmark_shabads.is_empty()
            && self.bookmark_lines.is_empty()
            && self.favorite_uids.is_empty()
    }
}

fn parse_id(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

fn load_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        debug!(path = %path.display(), "lookup table not found");
        return Ok(Table::new());
    }
    let bytes = fs::read(path).context(IoSnafu { path })?;
    let raw: HashMap<String, Value> =
        serde_json::from_slice(&bytes).map_err(|source| BackupError::Decode {
            what: "lookup table".to_string(),
            path: path.display().to_string(),
            source,
        })?;
    let table: Table = raw
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(text) => Some((key, text)),
            Value::Number(number) => Some((key, number.to_string())),
            _ => None,
        })
        .collect();
    debug!(path = %path.display(), entries = table.len(), "loaded lookup table");
    Ok(table)
}
