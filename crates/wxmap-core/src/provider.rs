use crate::airports::AirportDatabase;
use crate::config::Settings;
use crate::twilight::{TwilightCache, TwilightClient};
use crate::validator::{Lookup, StationDataProvider};
use crate::weather::WeatherEngine;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::cell::{OnceCell, RefCell};
use std::path::PathBuf;

/// Station data backed by the reference CSV, the NOAA METAR feed and the sunrise-sunset service.
///
/// The reference CSV is read on the first lookup, so a broken station map is
/// reported before any problem with the reference data.
pub struct LiveStationData {
    reference_file: PathBuf,
    airports: OnceCell<AirportDatabase>,
    weather: WeatherEngine,
    twilight: TwilightClient,
    cache: RefCell<TwilightCache>,
    cache_path: PathBuf,
}

impl LiveStationData {
    pub fn new<P: Into<PathBuf>>(reference_file: P, weather: WeatherEngine) -> Result<Self> {
        let cache_path = TwilightCache::default_path();
        Ok(Self {
            reference_file: reference_file.into(),
            airports: OnceCell::new(),
            weather,
            twilight: TwilightClient::new()?,
            cache: RefCell::new(TwilightCache::load(&cache_path)),
            cache_path,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let weather = WeatherEngine::with_cache_path(
            crate::get_config_root().join("metars.cache.csv"),
            settings.metar_cache_ttl_secs,
        );
        Self::new(settings.reference_file.clone(), weather)
    }

    fn airports(&self) -> Result<&AirportDatabase> {
        if let Some(db) = self.airports.get() {
            return Ok(db);
        }
        let db = AirportDatabase::load(&self.reference_file).with_context(|| {
            format!(
                "Failed to load airport reference {}",
                self.reference_file.display()
            )
        })?;
        Ok(self.airports.get_or_init(|| db))
    }
}

impl StationDataProvider for LiveStationData {
    fn faa_csv_identifier(&self, station_id: &str) -> Result<Lookup<String>> {
        Ok(self.airports()?.lookup_identifier(station_id))
    }

    fn metar(&self, station_id: &str) -> Lookup<String> {
        self.weather.metar(station_id)
    }

    fn civil_twilight(&self, station_id: &str) -> Option<Vec<DateTime<Utc>>> {
        let today = Utc::now().date_naive();

        if let Some(info) = self.cache.borrow().get(station_id, today) {
            debug!("Twilight cache hit — station={} date={}", station_id, today);
            return Some(info.boundaries());
        }

        let position = match self.airports() {
            Ok(db) => db.position(station_id),
            Err(e) => {
                warn!("{:#}", e);
                None
            }
        };
        let Some((lat, lon)) = position else {
            warn!("No coordinates for {}; cannot compute day/night", station_id);
            return None;
        };

        let info = match self.twilight.fetch(lat, lon, today) {
            Ok(info) => info,
            Err(e) => {
                warn!("Day/night lookup failed for {}: {:#}", station_id, e);
                return None;
            }
        };

        let mut cache = self.cache.borrow_mut();
        cache.insert(station_id, today, info);
        if let Err(e) = cache.save(&self.cache_path) {
            warn!(
                "Unable to write twilight cache {}: {:#}",
                self.cache_path.display(),
                e
            );
        }
        Some(info.boundaries())
    }
}
