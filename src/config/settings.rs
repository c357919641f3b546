use crate::error::{LedgerError, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

// A load failure stays an error for every caller; nothing falls back to defaults
static GLOBAL_CONFIG: Lazy<Result<Config>> = Lazy::new(Config::load);

/// Process-wide configuration, loaded on first use
pub fn global_config() -> Result<&'static Config> {
    (*GLOBAL_CONFIG).as_ref().map_err(Clone::clone)
}

const DEFAULT_DATA_DIR: &str = "./tmp/blocks";
const DEFAULT_WALLET_FILE: &str = "./tmp/wallets.data";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_CONFIG_FILE: &str = "hashlink.toml";

const CONFIG_FILE_ENV: &str = "HASHLINK_CONFIG";
const DATA_DIR_ENV: &str = "HASHLINK_DATA_DIR";
const WALLET_FILE_ENV: &str = "HASHLINK_WALLET_FILE";
const LOG_LEVEL_ENV: &str = "HASHLINK_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub wallet_file: PathBuf,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            wallet_file: PathBuf::from(DEFAULT_WALLET_FILE),
            log_level: String::from(DEFAULT_LOG_LEVEL),
        }
    }
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Settings> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Settings> {
        let text = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    // Environment variables win over whatever the file said
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(DATA_DIR_ENV) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup(WALLET_FILE_ENV) {
            self.wallet_file = PathBuf::from(file);
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            self.log_level = level;
        }
    }
}

pub struct Config {
    inner: RwLock<Settings>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_settings(Settings::default())
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then environment overrides
    pub fn load() -> Result<Config> {
        Self::load_with(env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from), |key| {
            env::var(key).ok()
        })
    }

    // An explicitly named file must exist; the default one is optional
    fn load_with<F>(explicit: Option<PathBuf>, lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match explicit {
            Some(path) => Settings::from_file(&path)?,
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Settings::from_file(&path)?
                } else {
                    Settings::default()
                }
            }
        };
        settings.apply_overrides(lookup);
        Ok(Self::from_settings(settings))
    }

    pub fn from_settings(settings: Settings) -> Config {
        Config {
            inner: RwLock::new(settings),
        }
    }

    pub fn settings(&self) -> Settings {
        self.inner
            .read()
            .expect("Failed to acquire read lock on config - this should never happen")
            .clone()
    }

    pub fn get_data_dir(&self) -> PathBuf {
        self.settings().data_dir
    }

    pub fn set_data_dir(&self, dir: PathBuf) {
        let mut inner = self
            .inner
            .write()
            .expect("Failed to acquire write lock on config - this should never happen");
        inner.data_dir = dir;
    }

    pub fn get_wallet_file(&self) -> PathBuf {
        self.settings().wallet_file
    }

    pub fn set_wallet_file(&self, file: PathBuf) {
        let mut inner = self
            .inner
            .write()
            .expect("Failed to acquire write lock on config - this should never happen");
        inner.wallet_file = file;
    }

    pub fn get_log_level(&self) -> String {
        self.settings().log_level
    }
}
