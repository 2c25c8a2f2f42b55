use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::constants::{DEFAULT_IP_ECHO_URL, DEFAULT_REVERSE_GEOCODE_URL, SUBMIT_TIMEOUT};
use crate::record::Department;

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    /// Submission gateway configuration
    Gateway,
    /// Check-in client configuration
    Checkin,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0}")]
    Invalid(String),
}

fn default_port() -> u16 {
    3000
}

fn default_timeout_secs() -> u64 {
    SUBMIT_TIMEOUT.as_secs()
}

fn default_ip_echo_url() -> String {
    DEFAULT_IP_ECHO_URL.to_string()
}

fn default_reverse_geocode_url() -> String {
    DEFAULT_REVERSE_GEOCODE_URL.to_string()
}

fn default_accuracy() -> f64 {
    20.0
}

/// Gateway configuration file structure
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Configuration type (must be "gateway")
    pub config_type: ConfigType,
    /// Remote storage API URL records are relayed to (required)
    pub remote_api_url: String,
    /// Port to listen on (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Timeout in seconds for relayed requests (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<Url, ConfigError> {
        if self.config_type != ConfigType::Gateway {
            return Err(ConfigError::Invalid(format!(
                "config_type must be 'gateway', found {:?}",
                self.config_type
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }
        parse_http_url("remote_api_url", &self.remote_api_url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Fixed position used by the command-line client in place of a sensor
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PositionConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// Accuracy radius in meters (default: 20)
    #[serde(default = "default_accuracy")]
    pub accuracy: f64,
}

/// Check-in client configuration file structure
#[derive(Debug, Clone, Deserialize)]
pub struct CheckinConfig {
    /// Configuration type (must be "checkin")
    pub config_type: ConfigType,
    /// Base URL of the submission gateway, e.g. http://localhost:3000 (required)
    pub gateway_url: String,
    /// IP echo service (default: ipify)
    #[serde(default = "default_ip_echo_url")]
    pub ip_echo_url: String,
    /// Reverse geocoding service (default: bigdatacloud)
    #[serde(default = "default_reverse_geocode_url")]
    pub reverse_geocode_url: String,
    /// Key-value storage file for the login session
    /// (default: ~/.config/attendance_checkin/storage.json)
    pub storage_file: Option<PathBuf>,
    /// Department preselected when none is given on the command line
    pub department: Option<Department>,
    /// User agent reported as device description
    pub user_agent: Option<String>,
    /// Position reported to the gateway; without it location is unavailable
    pub position: Option<PositionConfig>,
}

impl CheckinConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.config_type != ConfigType::Checkin {
            return Err(ConfigError::Invalid(format!(
                "config_type must be 'checkin', found {:?}",
                self.config_type
            )));
        }
        parse_http_url("gateway_url", &self.gateway_url)?;
        parse_http_url("ip_echo_url", &self.ip_echo_url)?;
        parse_http_url("reverse_geocode_url", &self.reverse_geocode_url)?;
        if let Some(position) = &self.position {
            if !(-90.0..=90.0).contains(&position.latitude)
                || !(-180.0..=180.0).contains(&position.longitude)
            {
                return Err(ConfigError::Invalid(format!(
                    "position out of range: {}, {}",
                    position.latitude, position.longitude
                )));
            }
        }
        Ok(())
    }
}

fn parse_http_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::Invalid(format!("{} is not a valid URL: {}", field, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid(format!(
            "{} must be http or https, found {}",
            field, other
        ))),
    }
}

/// Read and parse a TOML config file
pub fn load<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_config_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
config_type = "gateway"
remote_api_url = "https://storage.example.com/dev/"
"#,
        )
        .unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(
            config.validate().unwrap().as_str(),
            "https://storage.example.com/dev/"
        );
    }

    #[test]
    fn test_gateway_config_rejects_wrong_type_and_scheme() {
        let wrong_type: GatewayConfig = toml::from_str(
            r#"
config_type = "checkin"
remote_api_url = "https://storage.example.com/"
"#,
        )
        .unwrap();
        assert!(wrong_type.validate().is_err());

        let wrong_scheme: GatewayConfig = toml::from_str(
            r#"
config_type = "gateway"
remote_api_url = "ftp://storage.example.com/"
"#,
        )
        .unwrap();
        assert!(wrong_scheme.validate().is_err());
    }

    #[test]
    fn test_checkin_config_parses_position_and_department() {
        let config: CheckinConfig = toml::from_str(
            r#"
config_type = "checkin"
gateway_url = "http://localhost:3000"
department = "hr"

[position]
latitude = 37.7749
longitude = -122.4194
"#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.department, Some(Department::HR));
        assert_eq!(config.ip_echo_url, DEFAULT_IP_ECHO_URL);
        let position = config.position.unwrap();
        assert_eq!(position.accuracy, 20.0);
        assert_eq!(position.longitude, -122.4194);
    }

    #[test]
    fn test_checkin_config_rejects_bad_position() {
        let config: CheckinConfig = toml::from_str(
            r#"
config_type = "checkin"
gateway_url = "http://localhost:3000"

[position]
latitude = 137.0
longitude = 0.0
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
