use crate::config::StationConfig;
use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{info, warn};
use thiserror::Error;

/// Number of boundaries a day/night lookup must produce.
pub const DAY_NIGHT_FIELD_COUNT: usize = 6;

/// Outcome of a collaborator lookup that can reach its source but still come back empty-handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    /// The source answered but the answer is unusable.
    Invalid,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound | Lookup::Invalid => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
            Lookup::Invalid => Lookup::Invalid,
        }
    }
}

pub trait ConfigProvider {
    fn airport_configs(&self) -> Result<StationConfig>;
}

pub trait StationDataProvider {
    /// Resolves a station against the reference dataset. `Err` means the dataset itself is unreachable.
    fn faa_csv_identifier(&self, station_id: &str) -> Result<Lookup<String>>;

    /// Current raw METAR for the station.
    fn metar(&self, station_id: &str) -> Lookup<String>;

    /// Day/night boundaries for today. A well-formed answer has [`DAY_NIGHT_FIELD_COUNT`] entries.
    fn civil_twilight(&self, station_id: &str) -> Option<Vec<DateTime<Utc>>>;
}

/// Sink for the human readable run log.
pub trait Reporter {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
}

/// Forwards to the `log` facade under the `wxmap::check` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn info(&self, message: &str) {
        info!(target: "wxmap::check", "{}", message);
    }

    fn warn(&self, message: &str) {
        warn!(target: "wxmap::check", "{}", message);
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalDiagnostic {
    #[error("Unable to fetch the airport configuration. Please check the JSON files. Error={0}")]
    ConfigUnavailable(String),
    #[error("No airports found in the configuration file.")]
    NoStations,
    #[error("Unable to set up the station data sources. Error={0}")]
    StationDataUnavailable(String),
    #[error("Found {station} has an LED at a negative position {position}")]
    NegativePosition { station: String, position: i64 },
    #[error("Unable to fetch the station {station} from the CSV data file. Please check that the station is in the CSV file. Error={cause}")]
    ReferenceLookupFailed { station: String, cause: String },
    #[error("Unable to fetch the station {station} from the CSV data file. Please check that the station is in the CSV file.")]
    NotInReference { station: String },
    #[error("Unable to fetch day/night info for {station}/{position}")]
    DayNightUnavailable { station: String, position: i64 },
    #[error("Unknown issue fetching day/night info for {station}/{position}: expected 6 values, got {count}")]
    DayNightMalformed {
        station: String,
        position: i64,
        count: usize,
    },
}

impl FatalDiagnostic {
    /// Station the run stopped at, if the abort happened inside the per-station loop.
    pub fn station(&self) -> Option<&str> {
        match self {
            FatalDiagnostic::ConfigUnavailable(_)
            | FatalDiagnostic::NoStations
            | FatalDiagnostic::StationDataUnavailable(_) => None,
            FatalDiagnostic::NegativePosition { station, .. }
            | FatalDiagnostic::ReferenceLookupFailed { station, .. }
            | FatalDiagnostic::NotInReference { station }
            | FatalDiagnostic::DayNightUnavailable { station, .. }
            | FatalDiagnostic::DayNightMalformed { station, .. } => Some(station),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Stations whose weather could not be fetched, in check order.
    pub weather_failures: Vec<String>,
    pub stations_checked: usize,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.weather_failures.is_empty()
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            String::new(),
            String::new(),
            "-------------------------".to_string(),
            "Finished testing configuration files. No fatal issues were found.".to_string(),
            String::new(),
            "Unable to fetch the weather for the following stations:".to_string(),
        ];
        lines.extend(self.weather_failures.iter().map(|s| format!("\t {}", s)));
        lines.push(
            "Please check the station identifier. The station may be out of service, temporarily down, or may not exist."
                .to_string(),
        );
        lines
    }
}

pub struct Validator<'a> {
    config: &'a dyn ConfigProvider,
    stations: &'a dyn StationDataProvider,
    reporter: &'a dyn Reporter,
}

impl<'a> Validator<'a> {
    pub fn new(
        config: &'a dyn ConfigProvider,
        stations: &'a dyn StationDataProvider,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            config,
            stations,
            reporter,
        }
    }

    pub fn run(&self) -> Result<ValidationReport, FatalDiagnostic> {
        let config = self
            .config
            .airport_configs()
            .map_err(|e| FatalDiagnostic::ConfigUnavailable(format!("{:#}", e)))?;
        self.run_with(&config)
    }

    /// Checks an already loaded configuration and emits the summary on success.
    pub fn run_with(&self, config: &StationConfig) -> Result<ValidationReport, FatalDiagnostic> {
        if config.is_empty() {
            return Err(FatalDiagnostic::NoStations);
        }

        let mut report = ValidationReport::default();
        for (station_id, position) in config.iter() {
            self.check_station(station_id, position, &mut report)?;
            report.stations_checked += 1;
        }

        for line in report.summary_lines() {
            self.reporter.info(&line);
        }
        Ok(report)
    }

    fn check_station(
        &self,
        station_id: &str,
        position: i64,
        report: &mut ValidationReport,
    ) -> Result<(), FatalDiagnostic> {
        self.reporter
            .info(&format!("Checking configuration for {}", station_id));

        if position < 0 {
            return Err(FatalDiagnostic::NegativePosition {
                station: station_id.to_string(),
                position,
            });
        }

        let lookup = self
            .stations
            .faa_csv_identifier(station_id)
            .map_err(|e| FatalDiagnostic::ReferenceLookupFailed {
                station: station_id.to_string(),
                cause: format!("{:#}", e),
            })?;
        match lookup {
            Lookup::Found(code) if !code.trim().is_empty() => {}
            Lookup::Found(_) | Lookup::NotFound | Lookup::Invalid => {
                return Err(FatalDiagnostic::NotInReference {
                    station: station_id.to_string(),
                });
            }
        }

        // Not fatal: collected and reported at the end.
        if !self.stations.metar(station_id).is_found() {
            report.weather_failures.push(station_id.to_string());
            self.reporter.warn(&format!(
                "Unable to fetch weather for {}/{}",
                station_id, position
            ));
        }

        let day_night = self.stations.civil_twilight(station_id).ok_or_else(|| {
            FatalDiagnostic::DayNightUnavailable {
                station: station_id.to_string(),
                position,
            }
        })?;
        if day_night.len() != DAY_NIGHT_FIELD_COUNT {
            return Err(FatalDiagnostic::DayNightMalformed {
                station: station_id.to_string(),
                position,
                count: day_night.len(),
            });
        }

        Ok(())
    }
}
