use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

const LOADING_INTERVAL_ENV: &str = "QALBU_LOADING_INTERVAL_MS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Period between rotating status messages while content is generating.
    pub loading_interval_ms: u64,
    /// Shown when a generation failure carries no message of its own.
    pub fallback_error_message: String,
    pub history_page_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            loading_interval_ms: 2_500,
            fallback_error_message: "Terjadi kesalahan.".into(),
            history_page_size: 50,
        }
    }
}

impl Settings {
    pub fn loading_interval(&self) -> Duration {
        Duration::from_millis(self.loading_interval_ms.max(1))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(LOADING_INTERVAL_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.loading_interval_ms = ms,
                _ => warn!("Ignoring invalid {LOADING_INTERVAL_ENV}={raw}"),
            }
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Settings at {} are invalid, using defaults: {err}", path.display());
                Settings::default()
            })
        } else {
            Settings::default()
        };
        data.apply_env_overrides();

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> Settings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
