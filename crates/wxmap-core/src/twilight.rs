use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SUNRISE_SUNSET_URL: &str = "https://api.sunrise-sunset.org/json";

/// Day/night boundaries for one station on one UTC date.
///
/// The LED map fades between night and day colours over the two
/// transition windows, `dawn..full_day_start` and `full_day_end..dusk`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayNightInfo {
    pub dawn: DateTime<Utc>,
    pub sunrise: DateTime<Utc>,
    pub full_day_start: DateTime<Utc>,
    pub full_day_end: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    pub dusk: DateTime<Utc>,
}

impl DayNightInfo {
    /// Builds the boundaries from raw sun times. The transition length is the
    /// mean of the morning and evening civil twilight durations.
    pub fn from_sun_times(
        civil_twilight_begin: DateTime<Utc>,
        sunrise: DateTime<Utc>,
        sunset: DateTime<Utc>,
        civil_twilight_end: DateTime<Utc>,
    ) -> Self {
        let transition = ((sunrise - civil_twilight_begin) + (civil_twilight_end - sunset)) / 2;
        Self {
            dawn: civil_twilight_begin,
            sunrise,
            full_day_start: sunrise + transition,
            full_day_end: sunset - transition,
            sunset,
            dusk: civil_twilight_end,
        }
    }

    pub fn boundaries(&self) -> Vec<DateTime<Utc>> {
        vec![
            self.dawn,
            self.sunrise,
            self.full_day_start,
            self.full_day_end,
            self.sunset,
            self.dusk,
        ]
    }
}

#[derive(Debug, Deserialize)]
struct SunTimesResponse {
    status: String,
    /// An empty string rather than an object when the request is rejected.
    #[serde(default)]
    results: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SunTimes {
    sunrise: DateTime<Utc>,
    sunset: DateTime<Utc>,
    civil_twilight_begin: DateTime<Utc>,
    civil_twilight_end: DateTime<Utc>,
}

/// Parses a `formatted=0` response body from the sunrise-sunset.org API.
pub fn parse_response(body: &str) -> Result<DayNightInfo> {
    let response: SunTimesResponse =
        serde_json::from_str(body).context("Unexpected sunrise/sunset response")?;
    if response.status != "OK" {
        bail!("sunrise/sunset service returned status {}", response.status);
    }
    let times: SunTimes = serde_json::from_value(response.results)
        .context("sunrise/sunset response has no usable results")?;
    Ok(DayNightInfo::from_sun_times(
        times.civil_twilight_begin,
        times.sunrise,
        times.sunset,
        times.civil_twilight_end,
    ))
}

pub struct TwilightClient {
    client: reqwest::blocking::Client,
}

impl TwilightClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    pub fn fetch(&self, lat: f64, lon: f64, date: NaiveDate) -> Result<DayNightInfo> {
        let url = format!(
            "{}?lat={}&lng={}&date={}&formatted=0",
            SUNRISE_SUNSET_URL,
            lat,
            lon,
            date.format("%Y-%m-%d")
        );
        let body = self
            .client
            .get(url)
            .send()
            .context("sunrise/sunset request failed")?
            .error_for_status()?
            .text()?;
        debug!("Fetched sun times — lat={} lon={} date={}", lat, lon, date);
        parse_response(&body)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub date: NaiveDate,
    pub info: DayNightInfo,
}

const CURRENT_CACHE_VERSION: u32 = 1;

/// Per-station twilight answers, one date per station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilightCache {
    #[serde(default)]
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
}

impl Default for TwilightCache {
    fn default() -> Self {
        Self {
            version: CURRENT_CACHE_VERSION,
            entries: HashMap::new(),
        }
    }
}

impl TwilightCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_path() -> PathBuf {
        crate::get_config_root().join("twilight_cache.json")
    }

    /// Unreadable files and older cache versions load as an empty cache.
    pub fn load(path: &Path) -> Self {
        if let Ok(content) = std::fs::read_to_string(path) {
            if let Ok(cache) = serde_json::from_str::<TwilightCache>(&content) {
                if cache.version == CURRENT_CACHE_VERSION {
                    return cache;
                }
                debug!(
                    "Discarding twilight cache with version {} — path={}",
                    cache.version,
                    path.display()
                );
            }
        }
        Self::new()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, station_id: &str, date: NaiveDate) -> Option<&DayNightInfo> {
        self.entries
            .get(station_id)
            .filter(|entry| entry.date == date)
            .map(|entry| &entry.info)
    }

    pub fn insert(&mut self, station_id: &str, date: NaiveDate, info: DayNightInfo) {
        self.entries
            .insert(station_id.to_string(), CacheEntry { date, info });
    }
}
