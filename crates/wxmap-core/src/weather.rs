use crate::config::DEFAULT_METAR_CACHE_TTL_SECS;
use crate::validator::Lookup;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

const METAR_URL: &str = "https://aviationweather.gov/data/cache/metars.cache.csv.gz";

pub struct WeatherEngine {
    cache_path: PathBuf,
    ttl_secs: u64,
    /// Every station in the cache, keyed by uppercase id. `None` when no data could be obtained.
    metars: OnceCell<Option<HashMap<String, String>>>,
}

impl Default for WeatherEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherEngine {
    pub fn new() -> Self {
        let cache_path = crate::get_config_root().join("metars.cache.csv");
        Self::with_cache_path(cache_path, DEFAULT_METAR_CACHE_TTL_SECS)
    }

    pub fn with_cache_path<P: Into<PathBuf>>(cache_path: P, ttl_secs: u64) -> Self {
        Self {
            cache_path: cache_path.into(),
            ttl_secs,
            metars: OnceCell::new(),
        }
    }

    fn cache_is_fresh(&self) -> bool {
        fs::metadata(&self.cache_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .map(|elapsed| elapsed.as_secs() < self.ttl_secs)
            .unwrap_or(false)
    }

    /// Fetches the live METAR cache from NOAA if the local cache is expired or missing.
    pub fn fetch_live_metars(&self) -> Result<()> {
        if self.cache_is_fresh() {
            debug!(
                "Using valid cached METAR data — cache_path={}",
                self.cache_path.display()
            );
            return Ok(());
        }

        info!(
            "METAR cache expired or missing; fetching live data — cache_path={} url={}",
            self.cache_path.display(),
            METAR_URL
        );
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let response = client
            .get(METAR_URL)
            .send()
            .context("METAR download failed")?
            .error_for_status()?;
        let bytes = response.bytes()?;

        debug!("Downloaded gzipped METAR data — compressed_bytes={}", bytes.len());

        let mut decoder = GzDecoder::new(&bytes[..]);
        let mut csv_data = String::new();
        decoder
            .read_to_string(&mut csv_data)
            .context("METAR feed is not valid gzip")?;

        if let Some(parent) = self.cache_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.cache_path, &csv_data)?;
        info!(
            "METAR cache updated — cache_path={} uncompressed_bytes={}",
            self.cache_path.display(),
            csv_data.len()
        );

        Ok(())
    }

    /// Refreshes and reads the cache at most once per engine.
    fn all_metars(&self) -> Option<&HashMap<String, String>> {
        self.metars
            .get_or_init(|| {
                if let Err(e) = self.fetch_live_metars() {
                    warn!("Unable to refresh METAR cache: {:#}", e);
                    // Fall back to a stale copy if one exists.
                    if !self.cache_path.exists() {
                        return None;
                    }
                }
                Some(self.scan_cache(None))
            })
            .as_ref()
    }

    /// Returns the raw METAR string for each requested station ID from the local cache.
    /// Key is uppercase station_id; value is the raw METAR text (e.g. "EGLL 220520Z ...").
    /// Returns an empty map if the cache file is missing or unreadable.
    pub fn get_raw_metars(&self, ids: &[&str]) -> HashMap<String, String> {
        let targets: HashSet<String> = ids.iter().map(|s| s.trim().to_uppercase()).collect();
        self.scan_cache(Some(&targets))
    }

    /// Reads the cached CSV, keeping only `targets` when given.
    fn scan_cache(&self, targets: Option<&HashSet<String>>) -> HashMap<String, String> {
        if !self.cache_path.exists() {
            return HashMap::new();
        }

        let mut result = HashMap::new();

        let mut rdr = match csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(false)
            .from_path(&self.cache_path)
        {
            Ok(r) => r,
            Err(_) => return result,
        };

        let mut headers_found = false;
        let mut idx_raw_text = 0usize;
        let mut idx_station = 1usize;

        // NOAA prefixes the header row with a few lines of metadata.
        for record in rdr.records().flatten() {
            if !headers_found {
                if !record.is_empty() && record[0].starts_with("raw_text") {
                    for (i, field) in record.iter().enumerate() {
                        match field {
                            "raw_text" => idx_raw_text = i,
                            "station_id" => idx_station = i,
                            _ => {}
                        }
                    }
                    headers_found = true;
                }
                continue;
            }

            if let Some(station) = record.get(idx_station) {
                let station_up = station.trim().to_uppercase();
                if targets.map_or(true, |t| t.contains(&station_up)) {
                    if let Some(raw) = record.get(idx_raw_text) {
                        let clean = raw.trim().to_string();
                        if !clean.is_empty() {
                            result.insert(station_up, clean);
                        }
                    }
                }
            }
        }

        debug!(
            "Scanned METAR cache — requested={} found={}",
            targets.map_or("all".to_string(), |t| t.len().to_string()),
            result.len()
        );
        result
    }

    /// Current METAR for one station. `Invalid` when no METAR data could be obtained at all.
    pub fn metar(&self, station_id: &str) -> Lookup<String> {
        let Some(metars) = self.all_metars() else {
            return Lookup::Invalid;
        };

        match metars.get(&station_id.trim().to_uppercase()) {
            Some(raw) => Lookup::Found(raw.clone()),
            None => Lookup::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CACHE: &str = "\
No errors
No warnings
4 ms
data source=metars
3 results
raw_text,station_id,observation_time,latitude,longitude,flight_category
KSEA 181753Z 19008KT 10SM FEW045 14/07 A3012,KSEA,2026-10-18T17:53:00Z,47.44,-122.31,VFR
KBFI 181753Z 18006KT 8SM BKN030 13/08 A3011,KBFI,2026-10-18T17:53:00Z,47.53,-122.30,VFR
,KAWO,2026-10-18T17:56:00Z,48.16,-122.16,
";

    fn engine_with_cache() -> (tempfile::TempDir, WeatherEngine) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metars.cache.csv");
        fs::write(&path, CACHE).unwrap();
        (dir, WeatherEngine::with_cache_path(path, 3600))
    }

    #[test]
    fn test_get_raw_metars_skips_preamble() {
        let (_dir, engine) = engine_with_cache();
        let found = engine.get_raw_metars(&["ksea", "KBFI", "KPAE"]);
        assert_eq!(found.len(), 2);
        assert!(found["KSEA"].starts_with("KSEA 181753Z"));
    }

    #[test]
    fn test_metar_lookup_from_fresh_cache() {
        let (_dir, engine) = engine_with_cache();
        assert!(engine.metar("KBFI").is_found());
        // Station present but with an empty report.
        assert_eq!(engine.metar("KAWO"), Lookup::NotFound);
        assert_eq!(engine.metar("KPAE"), Lookup::NotFound);
    }

    #[test]
    fn test_metar_cache_read_once_per_engine() {
        let (_dir, engine) = engine_with_cache();
        assert!(engine.metar("KSEA").is_found());

        fs::remove_file(&engine.cache_path).unwrap();
        assert!(engine.metar("KBFI").is_found());
        assert!(engine.get_raw_metars(&["KBFI"]).is_empty());
    }

    #[test]
    fn test_missing_cache_returns_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let engine = WeatherEngine::with_cache_path(dir.path().join("nope.csv"), 3600);
        assert!(engine.get_raw_metars(&["KSEA"]).is_empty());
    }
}
