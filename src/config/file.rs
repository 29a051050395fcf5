use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// On-disk settings (`config.toml`). Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    pub base_url: Option<String>,
    pub game_id: Option<String>,
    pub scope: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub open_browser: Option<bool>,
    pub slow_down_increment_secs: Option<u64>,
}

impl SettingsFile {
    pub fn read(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Like [`Self::read`], but a missing file is `Ok(None)`.
    pub fn read_optional(path: &Path) -> Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(raw) => Ok(Some(toml::from_str(&raw)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
