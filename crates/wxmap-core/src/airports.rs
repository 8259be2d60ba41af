use crate::validator::Lookup;
use crate::WxMapError;
use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Airport {
    pub ident: String,
    #[serde(rename = "latitude_deg")]
    pub lat: f64,
    #[serde(rename = "longitude_deg")]
    pub lon: f64,
}

/// Reference list of known stations, loaded from an OurAirports style `airports.csv`.
#[derive(Debug, Default)]
pub struct AirportDatabase {
    airports: HashMap<String, Airport>,
}

fn station_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9]{2,7}$").expect("static regex"))
}

impl AirportDatabase {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, WxMapError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WxMapError::ReferenceNotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let db = Self::from_reader(file);
        debug!(
            "Loaded airport reference — path={} airports={}",
            path.display(),
            db.len()
        );
        Ok(db)
    }

    /// Rows that fail to deserialize (blank coordinates, stray quoting) are skipped.
    pub fn from_reader<R: Read>(reader: R) -> Self {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut airports = HashMap::new();
        for (row, result) in rdr.deserialize::<Airport>().enumerate() {
            match result {
                Ok(mut airport) => {
                    airport.ident = airport.ident.to_uppercase();
                    if !airport.ident.is_empty() {
                        airports.insert(airport.ident.clone(), airport);
                    }
                }
                Err(e) => warn!("Skipping airport row {}: {}", row + 1, e),
            }
        }
        Self { airports }
    }

    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }

    /// Maps a configured station to the identifier the reference file knows it by.
    ///
    /// US stations are frequently listed by their three letter FAA code, so
    /// `KAWO` falls back to `AWO` when there is no exact match.
    pub fn lookup_identifier(&self, station_id: &str) -> Lookup<String> {
        self.resolve(station_id).map(|a| a.ident.clone())
    }

    pub fn position(&self, station_id: &str) -> Option<(f64, f64)> {
        self.resolve(station_id).found().map(|a| (a.lat, a.lon))
    }

    fn resolve(&self, station_id: &str) -> Lookup<&Airport> {
        let id = station_id.trim().to_uppercase();
        if !station_pattern().is_match(&id) {
            return Lookup::Invalid;
        }

        if let Some(airport) = self.airports.get(&id) {
            return Lookup::Found(airport);
        }

        if id.len() == 4 && id.starts_with('K') {
            if let Some(airport) = self.airports.get(&id[1..]) {
                return Lookup::Found(airport);
            }
        }

        Lookup::NotFound
    }
}
