//! Display and backup settings.
//!
//! [`Settings`] is saved as a unit to two destinations: the app-local file and the
//! shared file read by companion widgets. Loading prefers the local copy, then the
//! shared copy, then defaults.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::prelude::*;
use tracing::{debug, warn};

use crate::{
    Result,
    error::{BackupError, EncodeSnafu, IoSnafu, SettingsSnafu},
    library::write_atomic,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Render lines without spaces between words
    pub larivaar: bool,
    /// Color alternate words when larivaar is on
    pub larivaar_assist: bool,
    pub show_visraam: bool,
    /// `sttm` or `igurbani`
    pub visraam_source: String,
    pub translation_language: String,
    pub translation_source: String,
    pub show_transliteration: bool,
    pub transliteration_script: String,
    pub text_scale: f64,
    pub widget_refresh_minutes: u32,
    pub auto_backup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            larivaar: false,
            larivaar_assist: false,
            show_visraam: true,
            visraam_source: "sttm".to_string(),
            translation_language: "en".to_string(),
            translation_source: "bdb".to_string(),
            show_transliteration: true,
            transliteration_script: "english".to_string(),
            text_scale: 1.0,
            widget_refresh_minutes: 60,
            auto_backup: true,
        }
    }
}

impl Settings {
    /// Updates one field by name. `key` may be snake_case or camelCase.
    /// `value` is parsed as the field's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let key = camel_case(key);
        let mut fields = match serde_json::to_value(&*self).context(EncodeSnafu {
            what: "settings",
        })? {
            Value::Object(fields) => fields,
            _ => return SettingsSnafu { message: "settings are not a record" }.fail(),
        };
        let current = fields.get(&key).context(SettingsSnafu {
            message: format!("unknown setting '{key}'"),
        })?;
        let parsed = match current {
            Value::Bool(_) => value
                .parse::<bool>()
                .ok()
                .map(Value::Bool),
            Value::Number(_) => serde_json::from_str::<serde_json::Number>(value)
                .ok()
                .map(Value::Number),
            _ => Some(Value::String(value.to_string())),
        }
        .context(SettingsSnafu {
            message: format!("invalid value '{value}' for '{key}'"),
        })?;
        fields.insert(key.clone(), parsed);
        *self = serde_json::from_value(Value::Object(fields)).map_err(|err| {
            BackupError::Settings {
                message: format!("invalid value '{value}' for '{key}': {err}"),
            }
        })?;
        debug!(key, value, "updated setting");
        Ok(())
    }
}

fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for ch in key.chars() {
        if ch == '_' || ch == '-' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Loads and saves settings to the local and shared destinations
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    local: Option<PathBuf>,
    shared: Option<PathBuf>,
}

impl SettingsStore {
    pub fn new(local: Option<PathBuf>, shared: Option<PathBuf>) -> Self {
        Self { local, shared }
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.local.as_deref()
    }

    pub fn shared_path(&self) -> Option<&Path> {
        self.shared.as_deref()
    }

    /// Local copy, else shared copy, else defaults.
    /// An unreadable copy is logged and skipped.
    pub fn load(&self) -> Settings {
        for path in [&self.local, &self.shared].into_iter().flatten() {
            match read_settings(path) {
                Ok(Some(settings)) => return settings,
                Ok(None) => {}
                Err(err) => warn!(path = %path.display(), "ignoring settings file: {err}"),
            }
        }
        Settings::default()
    }

    /// Writes the settings to both destinations
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let bytes =
            serde_json::to_vec_pretty(settings).context(EncodeSnafu { what: "settings" })?;
        for path in [&self.local, &self.shared].into_iter().flatten() {
            write_atomic(path, &bytes)?;
        }
        Ok(())
    }
}

fn read_settings(path: &Path) -> Result<Option<Settings>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path).context(IoSnafu { path })?;
    let settings = serde_json::from_slice(&bytes).map_err(|source| BackupError::Decode {
        what: "settings".to_string(),
        path: path.display().to_string(),
        source,
    })?;
    Ok(Some(settings))
}
