/// Core abstractions shared by the monitor, the router and the pools
pub mod dsn;
pub mod flags;
pub mod registry;

pub use dsn::Dsn;
pub use flags::{RequestFlags, RoleTarget, RouteRequest, Strategy};
pub use registry::EndpointRegistry;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Replication role of a database node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostRole {
    /// Accepts writes
    Master,
    /// Replica currently providing synchronous (quorum) acknowledgment
    SyncSlave,
    /// Asynchronous replica
    Slave,
    /// Never classified, or not claimed by any other role
    Unknown,
}

impl HostRole {
    /// Roles in statistics precedence order
    pub const PRECEDENCE: [HostRole; 4] = [
        HostRole::Master,
        HostRole::SyncSlave,
        HostRole::Slave,
        HostRole::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HostRole::Master => "master",
            HostRole::SyncSlave => "sync_slave",
            HostRole::Slave => "slave",
            HostRole::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HostRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One physical database node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Position in the endpoint registry; stable for the cluster lifetime
    pub index: usize,
    pub dsn: Dsn,
}

impl Endpoint {
    pub fn new(index: usize, dsn: Dsn) -> Self {
        Self { index, dsn }
    }

    /// `host:port` used in logs and statistics
    pub fn host_port(&self) -> String {
        self.dsn.host_port()
    }

    /// Name under which the master reports this node as a standby
    pub fn replication_name(&self) -> &str {
        self.dsn.replication_name()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.index, self.host_port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_role_display() {
        assert_eq!(HostRole::Master.to_string(), "master");
        assert_eq!(HostRole::SyncSlave.to_string(), "sync_slave");
        assert_eq!(HostRole::Slave.to_string(), "slave");
        assert_eq!(HostRole::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_host_role_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            role: HostRole,
        }
        let parsed: Wrapper = toml::from_str("role = \"sync_slave\"").unwrap();
        assert_eq!(parsed.role, HostRole::SyncSlave);
    }

    #[test]
    fn test_endpoint_display() {
        let endpoint = Endpoint::new(2, Dsn::parse("host=db3 port=6432").unwrap());
        assert_eq!(endpoint.to_string(), "#2 db3:6432");
        assert_eq!(endpoint.replication_name(), "db3");
    }
}
