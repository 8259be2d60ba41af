pub mod airports;
pub mod config;
pub mod provider;
pub mod twilight;
pub mod validator;
pub mod weather;

use std::path::PathBuf;
use thiserror::Error;

pub use validator::{
    ConfigProvider, FatalDiagnostic, LogReporter, Lookup, Reporter, StationDataProvider,
    ValidationReport, Validator,
};

#[derive(Error, Debug)]
pub enum WxMapError {
    #[error("Airport reference file not found: {0}")]
    ReferenceNotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-user directory holding the METAR and twilight caches.
/// Falls back to the working directory when no home directory is available.
pub fn get_config_root() -> PathBuf {
    directories::ProjectDirs::from("org", "wxmap", "WxMap")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".wxmap"))
}
