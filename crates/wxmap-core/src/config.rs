use crate::validator::ConfigProvider;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_REFERENCE_FILE: &str = "data/airports.csv";
pub const DEFAULT_METAR_CACHE_TTL_SECS: u64 = 900;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Station {0} appears more than once")]
    DuplicateStation(String),
    #[error("Station {station} has a non-integer LED position: {value}")]
    BadPosition { station: String, value: String },
    #[error("Station identifier is blank")]
    BlankStation,
}

/// Ordered mapping of station identifier to LED position.
///
/// Identifiers are trimmed and upper-cased on insert. Positions are kept
/// signed so that a negative entry survives loading and can be reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationConfig {
    entries: Vec<(String, i64)>,
}

impl StationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, station_id: &str, position: i64) -> Result<(), ConfigError> {
        let id = station_id.trim().to_uppercase();
        if id.is_empty() {
            return Err(ConfigError::BlankStation);
        }
        if self.entries.iter().any(|(existing, _)| *existing == id) {
            return Err(ConfigError::DuplicateStation(id));
        }
        self.entries.push((id, position));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, station_id: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(id, _)| id == station_id)
            .map(|(_, pos)| *pos)
    }

    /// Entries in the order they appear in the source file.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().map(|(id, pos)| (id.as_str(), *pos))
    }

    /// Parses an airports file of the form `{"airports": {"KSEA": 0, ...}}`.
    pub fn from_json(content: &str) -> Result<Self> {
        let file: AirportsFile =
            serde_json::from_str(content).context("Airports file is not valid JSON")?;

        let mut config = Self::new();
        for (station, value) in file.airports {
            let position = value.as_i64().ok_or_else(|| ConfigError::BadPosition {
                station: station.clone(),
                value: value.to_string(),
            })?;
            config.insert(&station, position)?;
        }
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
struct AirportsFile {
    airports: serde_json::Map<String, serde_json::Value>,
}

/// Top level settings file. Relative paths resolve against the file's own directory.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub airports_file: PathBuf,
    #[serde(default = "default_reference_file")]
    pub reference_file: PathBuf,
    #[serde(default = "default_metar_ttl")]
    pub metar_cache_ttl_secs: u64,
}

fn default_reference_file() -> PathBuf {
    PathBuf::from(DEFAULT_REFERENCE_FILE)
}

fn default_metar_ttl() -> u64 {
    DEFAULT_METAR_CACHE_TTL_SECS
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let mut settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        settings.airports_file = resolve(base, &settings.airports_file);
        settings.reference_file = resolve(base, &settings.reference_file);
        Ok(settings)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Reads the station map from the airports file named in [`Settings`].
pub struct JsonConfigProvider {
    airports_file: PathBuf,
}

impl JsonConfigProvider {
    pub fn new<P: Into<PathBuf>>(airports_file: P) -> Self {
        Self {
            airports_file: airports_file.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.airports_file.clone())
    }
}

impl ConfigProvider for JsonConfigProvider {
    fn airport_configs(&self) -> Result<StationConfig> {
        let content = fs::read_to_string(&self.airports_file).with_context(|| {
            format!(
                "Failed to read airports file {}",
                self.airports_file.display()
            )
        })?;
        StationConfig::from_json(&content)
            .with_context(|| format!("Failed to load {}", self.airports_file.display()))
    }
}
