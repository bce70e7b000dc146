//! Configuration layer: typed settings with layered precedence (file → env).
//!
//! The conversion service's network location is resolved here and injected
//! into the client's constructor; nothing reads it as global state.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const ENV_PREFIX: &str = "FUCINA";
const DEFAULT_CONVERSION_ENDPOINT: &str = "http://127.0.0.1:50051/convert";
const DEFAULT_CONVERSION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ASSET_ROOT: &str = "assets";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub conversion: ConversionSettings,
    pub asset_store: AssetStoreSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Network location and deadline for the document rendering service.
#[derive(Debug, Clone)]
pub struct ConversionSettings {
    pub endpoint: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AssetStoreSettings {
    pub root: PathBuf,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings from an optional file plus `FUCINA__`-prefixed environment
/// variables, the file taking lower precedence.
pub fn load(config_file: Option<&Path>) -> Result<Settings, LoadError> {
    let mut builder = Config::builder();
    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }
    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let raw: RawSettings = builder.build()?.try_deserialize()?;
    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    conversion: RawConversionSettings,
    asset_store: RawAssetStoreSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawConversionSettings {
    endpoint: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAssetStoreSettings {
    root: Option<PathBuf>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            conversion,
            asset_store,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            conversion: build_conversion_settings(conversion)?,
            asset_store: build_asset_store_settings(asset_store),
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_conversion_settings(
    conversion: RawConversionSettings,
) -> Result<ConversionSettings, LoadError> {
    let endpoint_value = conversion
        .endpoint
        .unwrap_or_else(|| DEFAULT_CONVERSION_ENDPOINT.to_string());
    let endpoint = Url::parse(&endpoint_value).map_err(|err| {
        LoadError::invalid("conversion.endpoint", format!("failed to parse: {err}"))
    })?;

    let timeout_secs = conversion
        .timeout_seconds
        .unwrap_or(DEFAULT_CONVERSION_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "conversion.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ConversionSettings {
        endpoint,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_asset_store_settings(asset_store: RawAssetStoreSettings) -> AssetStoreSettings {
    AssetStoreSettings {
        root: asset_store
            .root
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSET_ROOT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_configured() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
        assert_eq!(settings.logging.level, LevelFilter::INFO);
        assert!(matches!(settings.logging.format, LogFormat::Compact));
        assert_eq!(
            settings.conversion.endpoint.as_str(),
            DEFAULT_CONVERSION_ENDPOINT
        );
        assert_eq!(settings.conversion.timeout, Duration::from_secs(30));
        assert_eq!(settings.asset_store.root, PathBuf::from("assets"));
    }

    #[test]
    fn json_logging_switches_the_format() {
        let mut raw = RawSettings::default();
        raw.logging.json = Some(true);
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let mut raw = RawSettings::default();
        raw.conversion.endpoint = Some("not a url".to_string());
        let err = Settings::from_raw(raw).expect_err("invalid endpoint");
        assert!(matches!(err, LoadError::Invalid { key: "conversion.endpoint", .. }));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut raw = RawSettings::default();
        raw.conversion.timeout_seconds = Some(0);
        let err = Settings::from_raw(raw).expect_err("zero timeout");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "conversion.timeout_seconds",
                ..
            }
        ));
    }

    #[test]
    fn settings_file_feeds_the_builder() {
        let dir = tempfile::tempdir().expect("config dir");
        let path = dir.path().join("fucina.toml");
        std::fs::write(
            &path,
            "[conversion]\nendpoint = \"http://render.internal:9000/convert\"\ntimeout_seconds = 5\n",
        )
        .expect("write config");

        let settings = load(Some(path.as_path())).expect("load settings");
        assert_eq!(
            settings.conversion.endpoint.as_str(),
            "http://render.internal:9000/convert"
        );
        assert_eq!(settings.conversion.timeout, Duration::from_secs(5));
    }
}
