use dot1x_proto::{nas_port_type, MacAddress};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Switch port configuration
///
/// `port_id` is the destination MAC the switch writes into frames it
/// forwards from this port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfig {
    pub port_id: MacAddress,
    /// Optional port name/description
    #[serde(default)]
    pub name: Option<String>,
    /// Enable/disable 802.1X on this port
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Authenticator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Interface the EAPOL socket binds to
    pub interface: String,

    /// RADIUS server address
    pub radius_server: String,

    /// RADIUS server port
    #[serde(default = "default_radius_port")]
    pub radius_port: u16,

    /// Shared secret with the RADIUS server
    pub radius_secret: String,

    /// Local address for the RADIUS socket
    #[serde(default = "default_radius_listen_address")]
    pub radius_listen_address: String,

    /// Called-Station-Id sent on every Access-Request
    #[serde(default = "default_called_station_id")]
    pub called_station_id: String,

    /// NAS-Port-Type sent on every Access-Request (15 = Ethernet)
    #[serde(default = "default_nas_port_type")]
    pub nas_port_type: u32,

    /// Retransmissions before a wait times out
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Seconds to wait for each reply
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Quarantine after a failed authentication, in seconds (0 disables it)
    #[serde(default = "default_held_period_secs")]
    pub held_period_secs: u64,

    /// Require Message-Authenticator on replies carrying EAP (RFC 3579)
    #[serde(default = "default_strict_message_authenticator")]
    pub strict_message_authenticator: bool,

    /// Ports with an explicit enable flag; unlisted ports are enabled
    #[serde(default)]
    pub ports: Vec<PortConfig>,

    /// Log level: "trace", "debug", "info", "warn", "error" (default: "info")
    #[serde(default)]
    pub log_level: Option<String>,

    /// Audit log file path (JSON format, optional)
    #[serde(default)]
    pub audit_log_path: Option<String>,
}

fn default_radius_port() -> u16 {
    1812 // Standard RADIUS authentication port
}

fn default_radius_listen_address() -> String {
    "0.0.0.0:0".to_string()
}

fn default_called_station_id() -> String {
    "44-44-44-44-44-44:".to_string()
}

fn default_nas_port_type() -> u32 {
    nas_port_type::ETHERNET
}

fn default_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_held_period_secs() -> u64 {
    60
}

fn default_strict_message_authenticator() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            interface: "eth0".to_string(),
            radius_server: "127.0.0.1".to_string(),
            radius_port: default_radius_port(),
            radius_secret: "SECRET".to_string(),
            radius_listen_address: default_radius_listen_address(),
            called_station_id: default_called_station_id(),
            nas_port_type: default_nas_port_type(),
            retries: default_retries(),
            timeout_secs: default_timeout_secs(),
            held_period_secs: default_held_period_secs(),
            strict_message_authenticator: default_strict_message_authenticator(),
            ports: vec![],
            log_level: None,
            audit_log_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Address Access-Requests are sent to
    pub fn radius_server_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr: IpAddr = self.radius_server.parse().map_err(|_| {
            ConfigError::Invalid(format!("Invalid RADIUS server address: {}", self.radius_server))
        })?;
        Ok(SocketAddr::new(addr, self.radius_port))
    }

    /// Local address the RADIUS socket binds to
    pub fn radius_listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.radius_listen_address.parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "Invalid RADIUS listen address: {}",
                self.radius_listen_address
            ))
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn held_period(&self) -> Duration {
        Duration::from_secs(self.held_period_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interface.is_empty() {
            return Err(ConfigError::Invalid("Interface cannot be empty".to_string()));
        }

        self.radius_server_addr()?;
        self.radius_listen_addr()?;

        if self.radius_port == 0 {
            return Err(ConfigError::Invalid("RADIUS port cannot be 0".to_string()));
        }

        if self.radius_secret.is_empty() {
            return Err(ConfigError::Invalid("Secret cannot be empty".to_string()));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("Timeout cannot be 0".to_string()));
        }

        for (i, port) in self.ports.iter().enumerate() {
            if self.ports[..i].iter().any(|p| p.port_id == port.port_id) {
                return Err(ConfigError::Invalid(format!(
                    "Port {} is listed twice",
                    port.port_id
                )));
            }
        }

        Ok(())
    }

    /// Create an example configuration file
    pub fn example() -> Self {
        Config {
            interface: "eth0".to_string(),
            radius_server: "127.0.0.1".to_string(),
            radius_port: 1812,
            radius_secret: "SECRET".to_string(),
            radius_listen_address: "0.0.0.0:0".to_string(),
            called_station_id: default_called_station_id(),
            nas_port_type: nas_port_type::ETHERNET,
            retries: 3,
            timeout_secs: 5,
            held_period_secs: 60,
            strict_message_authenticator: true,
            ports: vec![
                PortConfig {
                    port_id: MacAddress::new([0, 0, 0, 0, 0, 1]),
                    name: Some("Access port 1".to_string()),
                    enabled: true,
                },
                PortConfig {
                    port_id: MacAddress::new([0, 0, 0, 0, 0, 2]),
                    name: Some("Uplink".to_string()),
                    enabled: false,
                },
            ],
            log_level: Some("info".to_string()),
            audit_log_path: Some("/var/log/dot1x/audit.log".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.radius_port, 1812);
        assert_eq!(config.nas_port_type, 15);
        assert_eq!(config.retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.radius_secret = "".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.radius_server = "radius.example".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_port_rejected() {
        let mut config = Config::example();
        config.ports[1].port_id = config.ports[0].port_id;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{
            "interface": "eth1",
            "radius_server": "10.0.0.5",
            "radius_secret": "s3cret",
            "ports": [{"port_id": "00:00:00:00:00:07"}]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.radius_port, 1812);
        assert_eq!(config.called_station_id, "44-44-44-44-44-44:");
        assert_eq!(config.held_period(), Duration::from_secs(60));
        assert!(config.strict_message_authenticator);
        assert!(config.ports[0].enabled);
        assert_eq!(
            config.radius_server_addr().unwrap(),
            "10.0.0.5:1812".parse().unwrap()
        );
    }

    #[test]
    fn test_example_round_trips_through_file() {
        let file = NamedTempFile::new().unwrap();
        Config::example().to_file(file.path()).unwrap();

        let loaded = Config::from_file(file.path()).unwrap();
        assert_eq!(loaded.ports.len(), 2);
        assert!(!loaded.ports[1].enabled);
        assert_eq!(loaded.audit_log_path.as_deref(), Some("/var/log/dot1x/audit.log"));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{ not json").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
