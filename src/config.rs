// ⚙️ Settings - BookingRevenue.toml, then BOOKING_REVENUE_* environment
//
// Every field has a default, so the tool runs without any config file.
// Nested keys use `__` in env vars, e.g. BOOKING_REVENUE_STORE__BACKEND=sqlite.

use crate::db::SqliteStore;
use crate::forecast::ForecastConfig;
use crate::rules::RuleEngine;
use crate::store::{CsvStore, StoreBackend};
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_STEM: &str = "BookingRevenue";
pub const ENV_PREFIX: &str = "BOOKING_REVENUE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Csv,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreKind,
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            backend: StoreKind::Csv,
            path: PathBuf::from("revenue_raw_data.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub output_dir: PathBuf,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            output_dir: PathBuf::from("report"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub report: ReportSettings,
    /// JSON list of classification rules; built-in order when absent
    pub rules_file: Option<PathBuf>,
    pub currency: String,
    pub forecast: ForecastConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            store: StoreSettings::default(),
            report: ReportSettings::default(),
            rules_file: None,
            currency: "RON".to_string(),
            forecast: ForecastConfig::default(),
        }
    }
}

impl Settings {
    /// `path` replaces the default `BookingRevenue.toml` lookup and must exist
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let file = match path {
            Some(p) => ConfigFile::from(p).required(true),
            None => ConfigFile::with_name(CONFIG_FILE_STEM).required(false),
        };

        let builder = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        builder.try_deserialize::<Settings>()
    }

    pub fn backend(&self) -> Box<dyn StoreBackend> {
        match self.store.backend {
            StoreKind::Csv => Box::new(CsvStore::new(&self.store.path)),
            StoreKind::Sqlite => Box::new(SqliteStore::new(&self.store.path)),
        }
    }

    pub fn rule_engine(&self) -> anyhow::Result<RuleEngine> {
        match &self.rules_file {
            Some(path) => RuleEngine::from_file(path),
            None => Ok(RuleEngine::with_default_rules()?),
        }
    }
}
