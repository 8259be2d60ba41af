// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use clap::Parser;
use log::{warn, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::path::PathBuf;
use wxmap_core::config::{JsonConfigProvider, Settings};
use wxmap_core::provider::LiveStationData;
use wxmap_core::{FatalDiagnostic, LogReporter, ValidationReport, Validator};

/// Checks every station in a weather map configuration before it goes to the LEDs.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the settings file
    #[arg(short, long, env = "WXMAP_CONFIG", default_value = "data/config.json")]
    config: PathBuf,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print warnings
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Warn;
        }
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn init_logging(level: LevelFilter) {
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();
    // Only fails if a logger is already installed.
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
}

/// Maps a start-up failure onto the diagnostic the run is reported with.
fn startup<T>(
    result: anyhow::Result<T>,
    fatal: fn(String) -> FatalDiagnostic,
) -> Result<T, FatalDiagnostic> {
    result.map_err(|e| fatal(format!("{:#}", e)))
}

fn check(cli: &Cli) -> Result<ValidationReport, FatalDiagnostic> {
    let settings = startup(
        Settings::load(&cli.config),
        FatalDiagnostic::ConfigUnavailable,
    )?;
    let provider = JsonConfigProvider::from_settings(&settings);
    // Reads the reference CSV on first lookup, after the station map has loaded.
    let stations = startup(
        LiveStationData::from_settings(&settings),
        FatalDiagnostic::StationDataUnavailable,
    )?;

    Validator::new(&provider, &stations, &LogReporter).run()
}

// Exit status is 0 for every outcome, fatal diagnostics included.
fn main() {
    let cli = Cli::parse();
    init_logging(cli.level());

    if let Err(diagnostic) = check(&cli) {
        warn!("{}", diagnostic);
    }
}
