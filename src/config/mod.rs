/// Configuration management for quorum-router

use crate::core::{Dsn, HostRole};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration file layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cluster definition
    pub cluster: ClusterConfig,
    /// Topology probing configuration
    pub topology: TopologyConfig,
    /// Per-endpoint pool configuration
    pub pool: PoolConfig,
    /// Default execution policy applied to every pool
    pub command_control: CommandControlConfig,
    /// Host selection tuning
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Cluster definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Endpoints in index order; the order defines the endpoint index space
    pub endpoints: Vec<EndpointConfig>,
}

/// A single endpoint entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Connection descriptor (`key=value` or `postgresql://` URL form)
    pub dsn: String,
    /// Replication role reported by the TCP prober for this endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<HostRole>,
}

/// Topology probing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Interval between probe cycles in milliseconds
    pub probe_interval_ms: u64,
    /// Timeout of a single endpoint probe in milliseconds
    pub probe_timeout_ms: u64,
}

/// Pool configuration, applied uniformly to every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of concurrently open execution contexts per endpoint
    pub max_size: usize,
}

/// Default command control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandControlConfig {
    /// Network timeout for a whole transaction or statement
    pub execute_timeout_ms: u64,
    /// Server-side statement timeout
    pub statement_timeout_ms: u64,
}

/// Host selection tuning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Static "nearest" ranking, best endpoint index first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nearest_order: Option<Vec<usize>>,
    /// Rank "nearest" by the round trip of the last probe
    #[serde(default)]
    pub rank_by_probe_rtt: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, text)
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster: ClusterConfig {
                endpoints: vec![EndpointConfig {
                    dsn: "host=127.0.0.1 port=5432 dbname=postgres".to_string(),
                    role: Some(HostRole::Master),
                }],
            },
            topology: TopologyConfig {
                probe_interval_ms: 1000,
                probe_timeout_ms: 500,
            },
            pool: PoolConfig { max_size: 16 },
            command_control: CommandControlConfig {
                execute_timeout_ms: 2000,
                statement_timeout_ms: 1000,
            },
            routing: RoutingConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoints = &self.cluster.endpoints;
        if endpoints.is_empty() {
            return Err(ConfigError::ValidationError(
                "cluster.endpoints cannot be empty".to_string(),
            ));
        }

        for endpoint in endpoints {
            Dsn::parse(&endpoint.dsn).map_err(|e| {
                ConfigError::ValidationError(format!("Invalid dsn '{}': {}", endpoint.dsn, e))
            })?;
        }

        if self.topology.probe_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "topology probe_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.topology.probe_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "topology probe_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.topology.probe_timeout_ms >= self.topology.probe_interval_ms {
            return Err(ConfigError::ValidationError(
                "topology probe_timeout_ms must be less than probe_interval_ms".to_string(),
            ));
        }

        if self.pool.max_size == 0 {
            return Err(ConfigError::ValidationError(
                "pool max_size must be greater than 0".to_string(),
            ));
        }

        if self.command_control.execute_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "command_control execute_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if let Some(order) = &self.routing.nearest_order {
            if let Some(bad) = order.iter().find(|&&idx| idx >= endpoints.len()) {
                return Err(ConfigError::ValidationError(format!(
                    "routing nearest_order references unknown endpoint index {}",
                    bad
                )));
            }
        }

        if self.routing.nearest_order.is_some() && self.routing.rank_by_probe_rtt {
            return Err(ConfigError::ValidationError(
                "routing nearest_order and rank_by_probe_rtt are mutually exclusive".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => return Err(ConfigError::ValidationError(
                format!("Invalid log level: {}", self.logging.level)
            )),
        }

        match self.logging.format.as_str() {
            "json" | "text" => {}
            _ => return Err(ConfigError::ValidationError(
                format!("Invalid log format: {}", self.logging.format)
            )),
        }

        Ok(())
    }

    /// DSN strings in endpoint index order
    pub fn dsn_list(&self) -> Vec<String> {
        self.cluster.endpoints.iter().map(|e| e.dsn.clone()).collect()
    }

    /// Create example configuration file describing a three-node cluster
    pub fn create_example_config<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        let config = Config {
            cluster: ClusterConfig {
                endpoints: vec![
                    EndpointConfig {
                        dsn: "host=10.0.1.10 port=5432 dbname=app application_name=pg-a"
                            .to_string(),
                        role: Some(HostRole::Master),
                    },
                    EndpointConfig {
                        dsn: "host=10.0.1.11 port=5432 dbname=app application_name=pg-b"
                            .to_string(),
                        role: Some(HostRole::SyncSlave),
                    },
                    EndpointConfig {
                        dsn: "postgresql://app@10.0.1.12:5432/app?application_name=pg-c"
                            .to_string(),
                        role: Some(HostRole::Slave),
                    },
                ],
            },
            routing: RoutingConfig {
                nearest_order: Some(vec![2, 1, 0]),
                rank_by_probe_rtt: false,
            },
            ..Default::default()
        };

        config.save_to_file(path)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
