//! Configuration file loading for the CLI
//!
//! This module handles finding and loading TOML configuration files
//! from various locations (explicit path, local directory, system directory).

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use thiserror::Error;

use floorplan::{FloorplanError, config::AppConfig};

/// Configuration-related errors for CLI
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(String),

    #[error("Missing configuration file: {0}")]
    MissingFile(PathBuf),
}

impl From<ConfigError> for FloorplanError {
    fn from(err: ConfigError) -> Self {
        FloorplanError::Io(io::Error::other(err.to_string()))
    }
}

/// Find and load configuration from various locations
///
/// Search order:
/// 1. Explicit path if provided
/// 2. Local project directory (floorplan/config.toml)
/// 3. Platform-specific config directory
/// 4. Default config if none found
///
/// # Errors
///
/// Returns error if:
/// - Explicit path is provided but file doesn't exist
/// - Config file exists but cannot be parsed
pub fn load_config(explicit_path: Option<impl AsRef<Path>>) -> Result<AppConfig, FloorplanError> {
    if let Some(path) = explicit_path {
        let path = path.as_ref();
        info!(path = path.display().to_string(); "Loading configuration from explicit path");
        return load_config_file(path);
    }

    let local_config = Path::new("floorplan/config.toml");
    if local_config.exists() {
        info!(path = local_config.display().to_string(); "Loading configuration from local path");
        return load_config_file(local_config);
    }

    if let Some(proj_dirs) = ProjectDirs::from("com", "floorplan", "floorplan") {
        let system_config = proj_dirs.config_dir().join("config.toml");

        if system_config.exists() {
            info!(
                path = system_config.display().to_string();
                "Loading configuration from system path"
            );
            return load_config_file(system_config);
        }

        debug!(path = system_config.display().to_string(); "System configuration file not found");
    } else {
        debug!("Could not determine platform-specific config directory");
    }

    debug!("No configuration file found, using default configuration");
    Ok(AppConfig::default())
}

/// Load configuration from a TOML file
///
/// # Errors
///
/// Returns error if:
/// - File doesn't exist
/// - File cannot be read
/// - TOML parsing fails
fn load_config_file(path: impl AsRef<Path>) -> Result<AppConfig, FloorplanError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()).into());
    }

    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

fn parse_config(content: &str) -> Result<AppConfig, FloorplanError> {
    Ok(toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use floorplan::{
        config::{Calibration, NameCase, Topology, ValueRange},
        semantic::{ComponentKind, PropertyName},
    };

    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = parse_config(
            r#"
            [graph]
            topology = "looped"

            [orientation]
            max_iterations = 4
            attempt_timeout_ms = 2500
            unjudged_kinds = ["Source", "sink"]

            [document]
            scale = 0.05
            calibration = "reference"

            [properties.ranges]
            speed = { min = 0.1, max = 2.0 }
            capacity = { max = 10 }
            "#,
        )
        .unwrap();

        assert_eq!(config.graph().topology(), Topology::Looped);
        assert_eq!(config.orientation().max_iterations(), 4);
        assert_eq!(config.orientation().attempt_timeout(), Duration::from_millis(2500));
        assert_eq!(config.orientation().max_attempts(), 3);
        assert_eq!(
            config.orientation().unjudged_kinds(),
            &[ComponentKind::Source, ComponentKind::Sink]
        );
        assert_eq!(config.document().scale(), 0.05);
        assert_eq!(config.document().margin(), 0.0);
        assert_eq!(config.document().calibration(), Calibration::Reference);
        assert_eq!(
            config.properties().range(PropertyName::Speed),
            Some(ValueRange::new(Some(0.1), Some(2.0)))
        );
        assert_eq!(
            config.properties().range(PropertyName::Capacity),
            Some(ValueRange::new(None, Some(10.0)))
        );
        assert_eq!(config.mapping().model_frame(), ".Models.Frame");
    }

    #[test]
    fn test_templates_table_replaces_defaults() {
        let config = parse_config(
            r#"
            [mapping]
            model_frame = ".Models.Plant"

            [mapping.naming]
            max_length = 12
            case = "upper"

            [mapping.templates.Machine]
            template = ".UserObjects.Press"
            path = "{frame}.M_{id}"
            attributes = { processing_time = "CycleTime" }

            [automation]
            command = "plantsim-driver"
            timeout_ms = 1000
            "#,
        )
        .unwrap();

        let mapping = config.mapping();
        assert_eq!(mapping.model_frame(), ".Models.Plant");
        assert_eq!(mapping.naming().max_length(), 12);
        assert_eq!(mapping.naming().case(), NameCase::Upper);

        let machine = mapping.template(ComponentKind::Machine).unwrap();
        assert_eq!(machine.template(), ".UserObjects.Press");
        assert_eq!(machine.path(), "{frame}.M_{id}");
        assert_eq!(machine.attribute(PropertyName::ProcessingTime), "CycleTime");
        assert!(mapping.template(ComponentKind::Conveyor).is_none());

        assert_eq!(config.automation().command(), Some("plantsim-driver"));
        assert_eq!(config.automation().timeout(), Duration::from_millis(1000));
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let err = parse_config("[graph]\ntopology = \"spiral\"\n").unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML configuration"));
    }

    #[test]
    fn test_explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[document]\nmargin = 2.0\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.document().margin(), 2.0);
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("Missing configuration file"));
    }
}
