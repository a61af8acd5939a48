//! # Store Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BIZBOOK_OWNER_ID=shop-42                                           │
//! │     BIZBOOK_DATABASE_PATH=/var/lib/bizbook/bizbook.db                  │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/bizbook/bizbook.toml (Linux)                             │
//! │     ~/Library/Application Support/com.bizbook.app/bizbook.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     generated device id, owner "local", INV- numbering                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Front Desk"
//!
//! [business]
//! owner_id = "shop-42"
//!
//! [profile]
//! company_name = "Corner Hardware"
//!
//! [profile.settings]
//! currency = "INR"
//! invoice_prefix = "INV-"
//! numbering_mode = "yearly"
//!
//! [persistence]
//! database_path = "/var/lib/bizbook/bizbook.db"
//! poll_interval_ms = 500
//! change_log_retention_hours = 72
//!
//! [store]
//! seed_on_empty = true
//! max_retries = 5
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use bizbook_core::{BusinessProfile, BusinessSettings, Scope};

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Identity of this process among the devices sharing one backend.
///
/// The id is the write origin: change-feed rows carrying it are this
/// device's own writes and are not reconciled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "generate_device_id")]
    pub id: String,

    #[serde(default = "default_device_name")]
    pub name: String,
}

fn generate_device_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_device_name() -> String {
    "BizBook Device".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: generate_device_id(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Business Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessConfig {
    /// Scope every entity is owned by and every port call is made under.
    #[serde(default = "default_owner_id")]
    pub owner_id: String,
}

fn default_owner_id() -> String {
    "local".to_string()
}

impl Default for BusinessConfig {
    fn default() -> Self {
        BusinessConfig {
            owner_id: default_owner_id(),
        }
    }
}

// =============================================================================
// Persistence Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// How often the change feed is polled.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum change-feed rows fetched per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Whether to start the realtime reconciler when the port supports it.
    #[serde(default = "default_true")]
    pub subscribe: bool,

    /// Change-log rows older than this are pruned on load. 0 keeps them.
    #[serde(default = "default_change_log_retention_hours")]
    pub change_log_retention_hours: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_batch_size() -> u32 {
    100
}

fn default_change_log_retention_hours() -> u64 {
    72
}

fn default_true() -> bool {
    true
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        PersistenceConfig {
            database_path: None,
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
            subscribe: true,
            change_log_retention_hours: default_change_log_retention_hours(),
        }
    }
}

// =============================================================================
// Store Settings
// =============================================================================

/// Write queue and event channel tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Seed sample data when the first load returns nothing.
    #[serde(default)]
    pub seed_on_empty: bool,

    /// Retries after the first failed write attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Buffered events per subscriber before slow receivers lag.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_event_capacity() -> usize {
    256
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            seed_on_empty: false,
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

// =============================================================================
// Store Config
// =============================================================================

/// Complete configuration for a [`crate::BusinessStore`] process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub business: BusinessConfig,

    /// Read-only business settings (invoice numbering, currency).
    #[serde(default)]
    pub profile: BusinessProfile,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub store: StoreSettings,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (bizbook.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> StoreResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading store config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load store config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> StoreResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| StoreError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| StoreError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Store config saved");
        Ok(())
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(StoreError::InvalidConfig("device.id must not be empty".into()));
        }

        if self.business.owner_id.trim().is_empty() {
            return Err(StoreError::InvalidConfig(
                "business.owner_id must not be empty".into(),
            ));
        }

        let settings = &self.profile.settings;
        if settings.invoice_prefix.chars().any(|c| c.is_ascii_digit()) {
            // Digits in the prefix would be read back as part of the suffix.
            return Err(StoreError::InvalidConfig(format!(
                "invoice_prefix must not contain digits, got: {}",
                settings.invoice_prefix
            )));
        }
        if settings.invoice_number_width == 0 || settings.invoice_number_width > 12 {
            return Err(StoreError::InvalidConfig(
                "invoice_number_width must be between 1 and 12".into(),
            ));
        }
        if settings.default_tax_rate_bps > 10_000 {
            return Err(StoreError::InvalidConfig(
                "default_tax_rate_bps must be at most 10000".into(),
            ));
        }

        if self.persistence.poll_interval_ms == 0 {
            return Err(StoreError::InvalidConfig(
                "poll_interval_ms must be greater than 0".into(),
            ));
        }
        if self.persistence.batch_size == 0 {
            return Err(StoreError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.store.event_capacity == 0 {
            return Err(StoreError::InvalidConfig(
                "event_capacity must be greater than 0".into(),
            ));
        }
        if self.store.initial_backoff_ms > self.store.max_backoff_ms {
            return Err(StoreError::InvalidConfig(
                "initial_backoff_ms must not exceed max_backoff_ms".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("BIZBOOK_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Ok(name) = std::env::var("BIZBOOK_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Ok(owner) = std::env::var("BIZBOOK_OWNER_ID") {
            debug!(owner_id = %owner, "Overriding owner from environment");
            self.business.owner_id = owner;
        }

        if let Ok(path) = std::env::var("BIZBOOK_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.persistence.database_path = Some(PathBuf::from(path));
        }

        if let Ok(interval) = std::env::var("BIZBOOK_POLL_INTERVAL_MS") {
            match interval.parse::<u64>() {
                Ok(ms) => self.persistence.poll_interval_ms = ms,
                Err(_) => warn!(value = %interval, "Ignoring invalid BIZBOOK_POLL_INTERVAL_MS"),
            }
        }

        if let Ok(hours) = std::env::var("BIZBOOK_CHANGE_LOG_RETENTION_HOURS") {
            match hours.parse::<u64>() {
                Ok(h) => self.persistence.change_log_retention_hours = h,
                Err(_) => warn!(value = %hours, "Ignoring invalid BIZBOOK_CHANGE_LOG_RETENTION_HOURS"),
            }
        }

        if let Ok(seed) = std::env::var("BIZBOOK_SEED_ON_EMPTY") {
            match seed.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.store.seed_on_empty = true,
                "0" | "false" | "no" => self.store.seed_on_empty = false,
                _ => warn!(value = %seed, "Unknown BIZBOOK_SEED_ON_EMPTY value"),
            }
        }

        if let Ok(retries) = std::env::var("BIZBOOK_MAX_RETRIES") {
            if let Ok(n) = retries.parse::<u32>() {
                self.store.max_retries = n;
            }
        }

        if let Ok(currency) = std::env::var("BIZBOOK_CURRENCY") {
            self.profile.settings.currency = currency;
        }

        if let Ok(prefix) = std::env::var("BIZBOOK_INVOICE_PREFIX") {
            self.profile.settings.invoice_prefix = prefix;
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "bizbook", "app")
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("bizbook.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    pub fn scope(&self) -> Scope {
        Scope::new(self.business.owner_id.clone())
    }

    pub fn settings(&self) -> &BusinessSettings {
        &self.profile.settings
    }

    /// Configured database path, or `bizbook.db` in the platform data dir,
    /// or the working directory as a last resort.
    pub fn database_path(&self) -> PathBuf {
        self.persistence.database_path.clone().unwrap_or_else(|| {
            Self::project_dirs()
                .map(|dirs| dirs.data_dir().join("bizbook.db"))
                .unwrap_or_else(|| PathBuf::from("bizbook.db"))
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.persistence.poll_interval_ms)
    }

    /// `None` when change-log pruning is disabled.
    pub fn change_log_retention(&self) -> Option<Duration> {
        match self.persistence.change_log_retention_hours {
            0 => None,
            hours => Some(Duration::from_secs(hours.saturating_mul(3600))),
        }
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.store.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.store.max_backoff_ms)
    }
}
