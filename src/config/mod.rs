//! Configuration system (layered: code > env > settings file > defaults).

pub mod file;

pub use file::SettingsFile;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PlayKitError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.playkit.ai";

/// Scope requested by games on behalf of a player.
pub const SCOPE_PLAYER_PLAY: &str = "player:play";
/// Scope requested by developer tooling.
pub const SCOPE_DEVELOPER_FULL: &str = "developer:full";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

/// Settings for talking to the PlayKit auth endpoints.
///
/// # Example
/// ```
/// use playkit_auth::config::PlayKitConfig;
///
/// let config = PlayKitConfig::new()
///     .with_base_url("https://staging.playkit.ai/")
///     .with_game_id("game-123");
/// assert_eq!(config.endpoint("/api/auth/device/code"),
///            "https://staging.playkit.ai/api/auth/device/code");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayKitConfig {
    base_url: String,
    game_id: Option<String>,
    scope: String,
    request_timeout: Duration,
    open_browser: bool,
    slow_down_increment: Duration,
}

impl Default for PlayKitConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayKitConfig {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            game_id: None,
            scope: SCOPE_PLAYER_PLAY.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            open_browser: true,
            slow_down_increment: DEFAULT_SLOW_DOWN_INCREMENT,
        }
    }

    /// Defaults overlaid with `PLAYKIT_*` environment variables (`.env` honoured).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::new();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Read a TOML settings file over the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut config = Self::new();
        config.apply_file(SettingsFile::read(path)?);
        Ok(config)
    }

    /// Full resolution: settings file (if present), then environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_settings_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::new();
        if let Some(file) = SettingsFile::read_optional(path)? {
            config.apply_file(file);
        }
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// `~/.playkit/config.toml`.
    pub fn default_settings_path() -> PathBuf {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(".playkit"))
            .unwrap_or_else(|| PathBuf::from(".playkit"))
            .join("config.toml")
    }

    pub fn apply_file(&mut self, file: SettingsFile) {
        if let Some(url) = file.base_url {
            self.set_base_url(url);
        }
        if let Some(game_id) = file.game_id {
            self.game_id = non_empty(game_id);
        }
        if let Some(scope) = file.scope {
            self.scope = scope;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(open) = file.open_browser {
            self.open_browser = open;
        }
        if let Some(secs) = file.slow_down_increment_secs {
            self.slow_down_increment = Duration::from_secs(secs);
        }
    }

    /// Overlay values from a variable lookup (normally `std::env::var`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("PLAYKIT_BASE_URL") {
            self.set_base_url(url);
        }
        if let Some(game_id) = lookup("PLAYKIT_GAME_ID") {
            self.game_id = non_empty(game_id);
        }
        if let Some(scope) = lookup("PLAYKIT_SCOPE") {
            self.scope = scope;
        }
        if let Some(raw) = lookup("PLAYKIT_REQUEST_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.request_timeout = Duration::from_secs(secs),
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid PLAYKIT_REQUEST_TIMEOUT_SECS"),
            }
        }
        if let Some(raw) = lookup("PLAYKIT_OPEN_BROWSER") {
            match parse_bool(&raw) {
                Some(open) => self.open_browser = open,
                None => tracing::warn!(value = %raw, "Ignoring invalid PLAYKIT_OPEN_BROWSER"),
            }
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.set_base_url(url.into());
        self
    }

    pub fn with_game_id(mut self, game_id: impl Into<String>) -> Self {
        self.game_id = non_empty(game_id.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    pub fn with_slow_down_increment(mut self, increment: Duration) -> Self {
        self.slow_down_increment = increment;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn game_id(&self) -> Option<&str> {
        self.game_id.as_deref()
    }

    /// The game id, or a configuration error naming how to set it.
    pub fn require_game_id(&self) -> Result<&str> {
        self.game_id().ok_or_else(|| {
            PlayKitError::Configuration(
                "game id is not set (use PLAYKIT_GAME_ID or `game_id` in the settings file)"
                    .to_string(),
            )
        })
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn open_browser(&self) -> bool {
        self.open_browser
    }

    pub fn slow_down_increment(&self) -> Duration {
        self.slow_down_increment
    }

    /// Join an absolute API path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn set_base_url(&mut self, url: String) {
        let trimmed = url.trim().trim_end_matches('/');
        self.base_url = if trimmed.is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            trimmed.to_string()
        };
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
