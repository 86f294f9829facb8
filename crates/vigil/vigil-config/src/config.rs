use serde::Deserialize;
use std::path::Path;

/// Settings shared by the `beacon` owner and the `lookout` watcher.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VigilConfig {
    #[serde(default = "defaults::cnc_dir")]
    pub cnc_dir: String,
    #[serde(default = "defaults::filename")]
    pub filename: String,
    #[serde(default = "defaults::total_file_length")]
    pub total_file_length: usize,
    #[serde(default)]
    pub version_field_offset: usize,
    #[serde(default = "defaults::timestamp_field_offset")]
    pub timestamp_field_offset: usize,
    #[serde(default = "defaults::timeout_ms")]
    pub timeout_ms: i64,
    #[serde(default = "defaults::heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default)]
    pub dir_delete_on_start: bool,
    #[serde(default = "defaults::warn_if_directory_exists")]
    pub warn_if_directory_exists: bool,
    #[serde(default = "defaults::protocol_version")]
    pub protocol_version: String,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

mod defaults {
    pub fn cnc_dir() -> String {
        "/dev/shm/vigil".into()
    }

    pub fn filename() -> String {
        "cnc.dat".into()
    }

    pub fn total_file_length() -> usize {
        4096
    }

    pub fn timestamp_field_offset() -> usize {
        8
    }

    pub fn timeout_ms() -> i64 {
        1_000
    }

    pub fn heartbeat_interval_ms() -> u64 {
        100
    }

    pub fn warn_if_directory_exists() -> bool {
        true
    }

    pub fn protocol_version() -> String {
        "1.0.0".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            cnc_dir: defaults::cnc_dir(),
            filename: defaults::filename(),
            total_file_length: defaults::total_file_length(),
            version_field_offset: 0,
            timestamp_field_offset: defaults::timestamp_field_offset(),
            timeout_ms: defaults::timeout_ms(),
            heartbeat_interval_ms: defaults::heartbeat_interval_ms(),
            dir_delete_on_start: false,
            warn_if_directory_exists: defaults::warn_if_directory_exists(),
            protocol_version: defaults::protocol_version(),
            log_level: defaults::log_level(),
        }
    }
}

impl VigilConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&toml_to_str)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let vigil_config: VigilConfig = toml::from_str(toml_str)?;
        Ok(vigil_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(VigilConfig::from_toml_str("").unwrap(), VigilConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = VigilConfig::from_toml_str(
            r#"
            cnc_dir = "/tmp/vigil-test"
            timeout_ms = 250
            version_field_offset = 16
            timestamp_field_offset = 24
            dir_delete_on_start = true
            protocol_version = "2.1.0"
            "#,
        )
        .unwrap();

        assert_eq!(config.cnc_dir, "/tmp/vigil-test");
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.version_field_offset, 16);
        assert_eq!(config.timestamp_field_offset, 24);
        assert!(config.dir_delete_on_start);
        assert_eq!(config.protocol_version, "2.1.0");
        assert_eq!(config.filename, "cnc.dat");
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.toml");
        std::fs::write(&path, "heartbeat_interval_ms = 5\n").unwrap();

        let config = VigilConfig::load(path.display().to_string()).unwrap();
        assert_eq!(config.heartbeat_interval_ms, 5);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = VigilConfig::load("/nonexistent/vigil.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn wrong_type_is_a_parse_error() {
        let err = VigilConfig::from_toml_str("timeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
