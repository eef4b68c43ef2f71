use directories::BaseDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::api::models::{Coordinates, Earthquake, FamilyMember, MeetingPoint};
use crate::api::{ApiClient, ApiError};
use crate::dispatch::phone::DEFAULT_COUNTRY_CODE;
use crate::dispatch::{Environment, Platform};
use crate::message::{DEFAULT_TEMPLATE, MessageContext};
use crate::quakes::DEFAULT_RADIUS_KM;
use crate::storage::{DEFAULT_CACHE_BUDGET_BYTES, DEFAULT_NOTIFICATION_CAPACITY, Store, StorageError};

pub const FAMILY_CACHE_KEY: &str = "family";
pub const MEETING_POINT_CACHE_KEY: &str = "meeting_point";
pub const EARTHQUAKE_CACHE_KEY: &str = "earthquakes";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("no config directory available")]
    NoConfigDir,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("could not write settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

fn default_country_code() -> String {
    DEFAULT_COUNTRY_CODE.to_string()
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

fn default_return_timeout_secs() -> u64 {
    60
}

fn default_cache_budget() -> u64 {
    DEFAULT_CACHE_BUDGET_BYTES
}

fn default_notification_capacity() -> usize {
    DEFAULT_NOTIFICATION_CAPACITY
}

fn default_radius() -> f64 {
    DEFAULT_RADIUS_KM
}

/// User settings, kept in `quakeready.toml` under the config directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user_name: String,
    #[serde(default = "default_country_code")]
    pub country_code: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "default_template")]
    pub message_template: String,
    #[serde(default = "default_return_timeout_secs")]
    pub return_timeout_secs: u64,
    #[serde(default = "default_radius")]
    pub nearby_radius_km: f64,
    #[serde(default = "default_cache_budget")]
    pub cache_budget_bytes: u64,
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
    /// Last known position, shared in the status message.
    #[serde(default)]
    pub location: Option<Coordinates>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            user_name: String::new(),
            country_code: default_country_code(),
            platform: Platform::default(),
            environment: Environment::default(),
            message_template: default_template(),
            return_timeout_secs: default_return_timeout_secs(),
            nearby_radius_km: default_radius(),
            cache_budget_bytes: default_cache_budget(),
            notification_capacity: default_notification_capacity(),
            location: None,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    // TOML is the current format; an older JSON state file is converted on first load.
    pub fn toml_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("quakeready.toml"))
    }

    fn legacy_json_path() -> Option<PathBuf> {
        let proj = directories::ProjectDirs::from("com", "example", "QuakeReady")?;
        Some(proj.config_dir().join("state.json"))
    }

    pub fn load() -> Self {
        let Some(path) = Self::toml_path() else {
            return Self::new();
        };
        Self::load_from(&path, Self::legacy_json_path().as_deref())
    }

    /// Read `path`, falling back to `legacy` JSON (saved back as TOML), then defaults.
    pub fn load_from(path: &Path, legacy: Option<&Path>) -> Self {
        if let Ok(text) = fs::read_to_string(path) {
            match toml::from_str::<Settings>(&text) {
                Ok(settings) => return settings,
                Err(e) => warn!("ignoring unreadable settings at {}: {e}", path.display()),
            }
        }

        if let Some(legacy) = legacy {
            if let Ok(bytes) = fs::read(legacy) {
                if let Ok(settings) = serde_json::from_slice::<Settings>(&bytes) {
                    info!("migrating {} to {}", legacy.display(), path.display());
                    if let Err(e) = settings.save_to(path) {
                        warn!("could not write migrated settings: {e}");
                    }
                    return settings;
                }
            }
        }

        Self::new()
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::toml_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn is_signed_in(&self) -> bool {
        !self.base_url.is_empty() && self.token.is_some()
    }

    pub fn return_timeout(&self) -> Duration {
        Duration::from_secs(self.return_timeout_secs)
    }
}

/// Everything a screen needs, built once at startup and passed down.
pub struct Services {
    pub settings: Settings,
    pub api: ApiClient,
    pub store: Store,
}

impl Services {
    pub fn new(settings: Settings, store: Store) -> Result<Self, AppError> {
        let api = ApiClient::new(&settings.base_url)?.with_token(settings.token.clone());
        let store = store.with_limits(settings.cache_budget_bytes, settings.notification_capacity);
        Ok(Self { settings, api, store })
    }

    /// Services backed by the on-disk settings and cache.
    pub fn from_disk() -> Result<Self, AppError> {
        Self::new(Settings::load(), Store::open_default()?)
    }

    pub fn message_context<'a>(
        &'a self,
        location: Option<Coordinates>,
        meeting_point: Option<&'a MeetingPoint>,
    ) -> MessageContext<'a> {
        MessageContext { sender: &self.settings.user_name, location, meeting_point }
    }

    /// Family list from the backend, or the cached copy when offline.
    pub async fn family(&mut self) -> Result<Vec<FamilyMember>, AppError> {
        let fetched = self.api.family().await;
        self.settle(FAMILY_CACHE_KEY, fetched)
    }

    pub async fn meeting_point(&mut self) -> Result<Option<MeetingPoint>, AppError> {
        let fetched = self.api.meeting_point().await;
        self.settle(MEETING_POINT_CACHE_KEY, fetched)
    }

    pub async fn earthquakes(&mut self, limit: usize) -> Result<Vec<Earthquake>, AppError> {
        let fetched = self.api.earthquakes(limit).await;
        self.settle(EARTHQUAKE_CACHE_KEY, fetched)
    }

    /// Cache a fresh result under `key`, or fall back to the cached copy when
    /// the fetch failed. A value that cannot be cached is still returned.
    ///
    /// The GTK shell fetches on the network runtime and settles on the main loop.
    pub fn settle<T>(&mut self, key: &str, fetched: Result<T, ApiError>) -> Result<T, AppError>
    where
        T: Serialize + serde::de::DeserializeOwned,
    {
        match fetched {
            Ok(value) => {
                if let Err(e) = self.store.put(key, &value) {
                    warn!("{key} not cached: {e}");
                }
                Ok(value)
            }
            Err(e) => self.cached_or(key, e),
        }
    }

    fn cached_or<T: serde::de::DeserializeOwned>(&self, key: &str, err: ApiError) -> Result<T, AppError> {
        match self.store.get::<T>(key)? {
            Some(cached) => {
                warn!("using cached {key}: {err}");
                Ok(cached)
            }
            None => Err(err.into()),
        }
    }
}

#[cfg(feature = "gui")]
pub fn build_ui(app: &adw::Application) {
    let settings = Settings::load();
    if settings.is_signed_in() {
        crate::ui::main_window::show_main_window(app);
    } else {
        crate::ui::login::show_login_window(app);
    }
}
