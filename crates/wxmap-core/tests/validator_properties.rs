// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz
//
// Behavioural tests for the station check pipeline. Fatal conditions stop
// the run at the offending station; missing weather is only collected.

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::cell::RefCell;
use std::collections::HashMap;
use wxmap_core::config::StationConfig;
use wxmap_core::{
    ConfigProvider, FatalDiagnostic, Lookup, Reporter, StationDataProvider, Validator,
};

struct FixedConfig(Option<StationConfig>);

impl ConfigProvider for FixedConfig {
    fn airport_configs(&self) -> Result<StationConfig> {
        self.0
            .clone()
            .ok_or_else(|| anyhow!("expected value at line 1 column 1"))
    }
}

/// Every station passes unless overridden. Records each call in order.
#[derive(Default)]
struct FakeStations {
    lookup: HashMap<String, Result<Lookup<String>, String>>,
    metar: HashMap<String, Lookup<String>>,
    twilight: HashMap<String, Option<usize>>,
    calls: RefCell<Vec<String>>,
}

impl FakeStations {
    fn lookup(mut self, id: &str, outcome: Result<Lookup<String>, String>) -> Self {
        self.lookup.insert(id.to_string(), outcome);
        self
    }

    fn metar(mut self, id: &str, outcome: Lookup<String>) -> Self {
        self.metar.insert(id.to_string(), outcome);
        self
    }

    fn twilight(mut self, id: &str, count: Option<usize>) -> Self {
        self.twilight.insert(id.to_string(), count);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

fn boundaries(count: usize) -> Vec<DateTime<Utc>> {
    let start = Utc.with_ymd_and_hms(2026, 10, 18, 14, 0, 0).unwrap();
    (0..count)
        .map(|i| start + chrono::Duration::hours(i as i64))
        .collect()
}

impl StationDataProvider for FakeStations {
    fn faa_csv_identifier(&self, station_id: &str) -> Result<Lookup<String>> {
        self.calls.borrow_mut().push(format!("lookup:{}", station_id));
        match self.lookup.get(station_id) {
            Some(Ok(outcome)) => Ok(outcome.clone()),
            Some(Err(msg)) => Err(anyhow!(msg.clone())),
            None => Ok(Lookup::Found(station_id.to_string())),
        }
    }

    fn metar(&self, station_id: &str) -> Lookup<String> {
        self.calls.borrow_mut().push(format!("metar:{}", station_id));
        self.metar
            .get(station_id)
            .cloned()
            .unwrap_or_else(|| Lookup::Found(format!("{} 181753Z 19008KT 10SM", station_id)))
    }

    fn civil_twilight(&self, station_id: &str) -> Option<Vec<DateTime<Utc>>> {
        self.calls
            .borrow_mut()
            .push(format!("twilight:{}", station_id));
        match self.twilight.get(station_id) {
            Some(count) => count.map(boundaries),
            None => Some(boundaries(6)),
        }
    }
}

#[derive(Default)]
struct RecordingReporter {
    info: RefCell<Vec<String>>,
    warn: RefCell<Vec<String>>,
}

impl Reporter for RecordingReporter {
    fn info(&self, message: &str) {
        self.info.borrow_mut().push(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.warn.borrow_mut().push(message.to_string());
    }
}

fn stations(entries: &[(&str, i64)]) -> FixedConfig {
    let mut config = StationConfig::new();
    for (id, position) in entries {
        config.insert(id, *position).unwrap();
    }
    FixedConfig(Some(config))
}

#[test]
fn test_all_checks_pass() {
    let config = stations(&[("KSEA", 0), ("KBFI", 1), ("KPAE", 2)]);
    let data = FakeStations::default();
    let reporter = RecordingReporter::default();

    let report = Validator::new(&config, &data, &reporter).run().unwrap();

    assert!(report.is_clean());
    assert_eq!(report.stations_checked, 3);
    assert!(reporter.warn.borrow().is_empty());
    assert!(reporter
        .info
        .borrow()
        .iter()
        .any(|l| l == "Finished testing configuration files. No fatal issues were found."));
    assert_eq!(data.calls().len(), 9, "Each station gets all three lookups");
}

#[test]
fn test_negative_position_stops_the_run() {
    let config = stations(&[("KSEA", 0), ("KBFI", -1), ("KPAE", 2)]);
    let data = FakeStations::default();
    let reporter = RecordingReporter::default();

    let err = Validator::new(&config, &data, &reporter).run().unwrap_err();

    assert_eq!(
        err,
        FatalDiagnostic::NegativePosition {
            station: "KBFI".into(),
            position: -1
        }
    );
    let calls = data.calls();
    assert!(!calls.iter().any(|c| c.ends_with(":KBFI")));
    assert!(!calls.iter().any(|c| c.ends_with(":KPAE")));
    assert_eq!(
        reporter.info.borrow().last().map(String::as_str),
        Some("Checking configuration for KBFI")
    );
}

#[test]
fn test_empty_configuration_is_fatal() {
    let config = FixedConfig(Some(StationConfig::new()));
    let data = FakeStations::default();
    let reporter = RecordingReporter::default();

    let err = Validator::new(&config, &data, &reporter).run().unwrap_err();

    assert_eq!(err, FatalDiagnostic::NoStations);
    assert!(data.calls().is_empty());
    assert!(reporter.info.borrow().is_empty());
}

#[test]
fn test_config_failure_carries_cause() {
    let config = FixedConfig(None);
    let data = FakeStations::default();
    let reporter = RecordingReporter::default();

    let err = Validator::new(&config, &data, &reporter).run().unwrap_err();

    assert!(matches!(err, FatalDiagnostic::ConfigUnavailable(_)));
    assert!(err.to_string().contains("expected value at line 1 column 1"));
}

#[test]
fn test_invalid_reference_lookup_stops_before_weather() {
    let config = stations(&[("KSEA", 0), ("XXXX", 1), ("KPAE", 2)]);
    let data = FakeStations::default().lookup("XXXX", Ok(Lookup::Invalid));
    let reporter = RecordingReporter::default();

    let err = Validator::new(&config, &data, &reporter).run().unwrap_err();

    assert_eq!(
        err,
        FatalDiagnostic::NotInReference {
            station: "XXXX".into()
        }
    );
    let calls = data.calls();
    assert_eq!(calls.last().map(String::as_str), Some("lookup:XXXX"));
    assert!(!calls.contains(&"metar:XXXX".to_string()));
}

#[test]
fn test_blank_and_missing_reference_entries_are_fatal() {
    for outcome in [Lookup::Found(String::new()), Lookup::NotFound] {
        let config = stations(&[("KSEA", 0)]);
        let data = FakeStations::default().lookup("KSEA", Ok(outcome.clone()));
        let reporter = RecordingReporter::default();

        let err = Validator::new(&config, &data, &reporter).run().unwrap_err();
        assert_eq!(err.station(), Some("KSEA"), "outcome {:?}", outcome);
    }
}

#[test]
fn test_reference_error_is_fatal_with_cause() {
    let config = stations(&[("KSEA", 0)]);
    let data = FakeStations::default().lookup("KSEA", Err("dataset unreachable".into()));
    let reporter = RecordingReporter::default();

    let err = Validator::new(&config, &data, &reporter).run().unwrap_err();

    assert!(matches!(err, FatalDiagnostic::ReferenceLookupFailed { .. }));
    assert!(err.to_string().ends_with("Error=dataset unreachable"));
}

#[test]
fn test_missing_weather_is_collected_not_fatal() {
    let config = stations(&[("KSEA", 0), ("KAWO", 4), ("KBVS", 5), ("KPAE", 6)]);
    let data = FakeStations::default()
        .metar("KAWO", Lookup::NotFound)
        .metar("KBVS", Lookup::Invalid);
    let reporter = RecordingReporter::default();

    let report = Validator::new(&config, &data, &reporter).run().unwrap();

    assert_eq!(report.weather_failures, vec!["KAWO", "KBVS"]);
    assert_eq!(report.stations_checked, 4);
    assert!(data.calls().contains(&"twilight:KAWO".to_string()));
    assert!(data.calls().contains(&"lookup:KPAE".to_string()));
    assert_eq!(
        *reporter.warn.borrow(),
        vec![
            "Unable to fetch weather for KAWO/4".to_string(),
            "Unable to fetch weather for KBVS/5".to_string()
        ]
    );

    let info = reporter.info.borrow();
    let header = info
        .iter()
        .position(|l| l == "Unable to fetch the weather for the following stations:")
        .expect("summary header");
    assert_eq!(info[header + 1], "\t KAWO");
    assert_eq!(info[header + 2], "\t KBVS");
}

#[test]
fn test_short_day_night_data_is_fatal() {
    let config = stations(&[("KSEA", 0), ("KBFI", 1), ("KPAE", 2)]);
    let data = FakeStations::default().twilight("KBFI", Some(5));
    let reporter = RecordingReporter::default();

    let err = Validator::new(&config, &data, &reporter).run().unwrap_err();

    assert_eq!(
        err,
        FatalDiagnostic::DayNightMalformed {
            station: "KBFI".into(),
            position: 1,
            count: 5
        }
    );
    assert!(!data.calls().iter().any(|c| c.ends_with(":KPAE")));
}

#[test]
fn test_absent_day_night_data_is_fatal_even_after_weather_failure() {
    let config = stations(&[("KSEA", 0)]);
    let data = FakeStations::default()
        .metar("KSEA", Lookup::NotFound)
        .twilight("KSEA", None);
    let reporter = RecordingReporter::default();

    let err = Validator::new(&config, &data, &reporter).run().unwrap_err();

    assert_eq!(
        err,
        FatalDiagnostic::DayNightUnavailable {
            station: "KSEA".into(),
            position: 0
        }
    );
    assert_eq!(reporter.warn.borrow().len(), 1);
}

#[test]
fn test_repeat_runs_give_identical_reports() {
    let config = stations(&[("KSEA", 0), ("KAWO", 1), ("KBVS", 2), ("KPAE", 3)]);
    let data = FakeStations::default()
        .metar("KPAE", Lookup::Invalid)
        .metar("KAWO", Lookup::NotFound);
    let reporter = RecordingReporter::default();
    let validator = Validator::new(&config, &data, &reporter);

    let first = validator.run().unwrap();
    let second = validator.run().unwrap();

    assert_eq!(first, second);
    assert_eq!(first.weather_failures, vec!["KAWO", "KPAE"]);
}
