//! Configuration file support for brocade-telemetryd
//!
//! Loads and validates the daemon configuration from TOML files.
//! Default location: /etc/brocade-telemetryd/brocade-telemetryd.toml

use crate::diff::VfId;
use crate::error::{Result, TelemetryError};
use crate::parser::MapsThresholds;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/brocade-telemetryd/brocade-telemetryd.toml";

/// Switch connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchConfig {
    /// Management address (IP or hostname) of the switch
    #[serde(default)]
    pub address: String,

    /// REST user
    #[serde(default = "default_username")]
    pub username: String,

    /// REST password; ignored when `password_env` is set
    #[serde(default)]
    pub password: String,

    /// Name of an environment variable holding the password
    #[serde(default)]
    pub password_env: Option<String>,

    /// Talk HTTPS to the switch
    #[serde(default = "default_use_https")]
    pub use_https: bool,

    /// Verify the switch certificate
    #[serde(default)]
    pub verify_tls: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Explicit virtual fabric list; discovered from the switch when absent
    #[serde(default)]
    pub vf_ids: Option<Vec<VfId>>,
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds between the start of two poll cycles
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Maximum entries kept in the change log
    #[serde(default = "default_change_log_capacity")]
    pub change_log_capacity: usize,
}

/// Metrics exposition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Listen address of the /metrics endpoint
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

/// MAPS system resource thresholds (percent, OK while below)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapsConfig {
    #[serde(default = "default_cpu_ok_below")]
    pub cpu_ok_below: f64,

    #[serde(default = "default_memory_ok_below")]
    pub memory_ok_below: f64,

    #[serde(default = "default_flash_ok_below")]
    pub flash_ok_below: f64,
}

/// Complete brocade-telemetryd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub switch: SwitchConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub maps: MapsConfig,
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_use_https() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

fn default_interval() -> u64 {
    60
}

fn default_change_log_capacity() -> usize {
    500
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0u16; 8], 9095))
}

fn default_cpu_ok_below() -> f64 {
    MapsThresholds::default().cpu_ok_below
}

fn default_memory_ok_below() -> f64 {
    MapsThresholds::default().memory_ok_below
}

fn default_flash_ok_below() -> f64 {
    MapsThresholds::default().flash_ok_below
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            username: default_username(),
            password: String::new(),
            password_env: None,
            use_https: default_use_https(),
            verify_tls: false,
            request_timeout_secs: default_request_timeout(),
            vf_ids: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            change_log_capacity: default_change_log_capacity(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            cpu_ok_below: default_cpu_ok_below(),
            memory_ok_below: default_memory_ok_below(),
            flash_ok_below: default_flash_ok_below(),
        }
    }
}

impl SwitchConfig {
    /// Base URL of the FOS REST interface
    pub fn base_url(&self) -> String {
        let scheme = if self.use_https { "https" } else { "http" };
        format!("{}://{}", scheme, self.address)
    }

    /// Password from the environment when `password_env` is set
    pub fn resolve_password(&self) -> Result<String> {
        match &self.password_env {
            Some(var) => std::env::var(var).map_err(|e| {
                TelemetryError::Configuration(format!(
                    "password_env {} could not be read: {}",
                    var, e
                ))
            }),
            None => Ok(self.password.clone()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl TelemetryConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config = toml::from_str(&content).map_err(|e| {
                    TelemetryError::Configuration(format!(
                        "Failed to parse config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(TelemetryError::Io(e)),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> Result<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            TelemetryError::Configuration(format!("Failed to serialize config: {}", e))
        })?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Poll interval as Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_secs)
    }

    pub fn maps_thresholds(&self) -> MapsThresholds {
        MapsThresholds {
            cpu_ok_below: self.maps.cpu_ok_below,
            memory_ok_below: self.maps.memory_ok_below,
            flash_ok_below: self.maps.flash_ok_below,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.switch.address.trim().is_empty() {
            return Err(TelemetryError::Configuration(
                "switch.address must not be empty".to_string(),
            ));
        }

        if self.polling.interval_secs == 0 {
            return Err(TelemetryError::Configuration(
                "polling.interval_secs must be > 0".to_string(),
            ));
        }

        if self.polling.change_log_capacity == 0 {
            return Err(TelemetryError::Configuration(
                "polling.change_log_capacity must be > 0".to_string(),
            ));
        }

        for (name, value) in [
            ("cpu_ok_below", self.maps.cpu_ok_below),
            ("memory_ok_below", self.maps.memory_ok_below),
            ("flash_ok_below", self.maps.flash_ok_below),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(TelemetryError::Configuration(format!(
                    "maps.{} must be 0-100",
                    name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> TelemetryConfig {
        let mut config = TelemetryConfig::default();
        config.switch.address = "10.0.0.5".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.switch.username, "admin");
        assert!(config.switch.use_https);
        assert!(!config.switch.verify_tls);
        assert_eq!(config.switch.request_timeout_secs, 30);
        assert_eq!(config.polling.interval_secs, 60);
        assert_eq!(config.polling.change_log_capacity, 500);
        assert_eq!(config.metrics.listen_addr.to_string(), "[::]:9095");
    }

    #[test]
    fn test_maps_thresholds_defaults() {
        let thresholds = TelemetryConfig::default().maps_thresholds();
        assert_eq!(thresholds.cpu_ok_below, 80.0);
        assert_eq!(thresholds.memory_ok_below, 75.0);
        assert_eq!(thresholds.flash_ok_below, 90.0);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_address() {
        assert!(TelemetryConfig::default().validate().is_err());
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = valid();
        config.polling.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_change_log_capacity() {
        let mut config = valid();
        config.polling.change_log_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_threshold_out_of_range() {
        let mut config = valid();
        config.maps.flash_ok_below = 101.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("flash_ok_below"));
    }

    #[test]
    fn test_base_url() {
        let mut config = valid();
        assert_eq!(config.switch.base_url(), "https://10.0.0.5");
        config.switch.use_https = false;
        assert_eq!(config.switch.base_url(), "http://10.0.0.5");
    }

    #[test]
    fn test_resolve_password_plain() {
        let mut config = valid();
        config.switch.password = "secret".to_string();
        assert_eq!(config.switch.resolve_password().unwrap(), "secret");
    }

    #[test]
    fn test_resolve_password_missing_env() {
        let mut config = valid();
        config.switch.password_env = Some("BROCADE_TELEMETRYD_TEST_UNSET_VAR".to_string());
        assert!(config.switch.resolve_password().is_err());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[switch]
address = "san-a.example.net"
vf_ids = [128, 10]

[polling]
interval_secs = 300

[maps]
cpu_ok_below = 70
"#;
        let config: TelemetryConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.switch.address, "san-a.example.net");
        assert_eq!(config.switch.vf_ids, Some(vec![128, 10]));
        assert_eq!(config.interval(), Duration::from_secs(300));
        assert_eq!(config.maps.cpu_ok_below, 70.0);
        // Unspecified values should use defaults
        assert_eq!(config.maps.memory_ok_below, 75.0);
        assert_eq!(config.polling.change_log_capacity, 500);
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = TelemetryConfig::load_or_default("/nonexistent/path.toml").unwrap();
        assert_eq!(config.polling.interval_secs, 60);
    }
}
