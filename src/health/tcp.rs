/// TCP reachability probe
///
/// Confirms an endpoint accepts connections and reports the replication role
/// declared for it in configuration. Deployments that can query replication
/// state directly plug in their own [`HostProbe`].
use super::{HostProbe, ProbeStatus, ReplicationStatus};
use crate::config::Config;
use crate::core::{Endpoint, EndpointRegistry, HostRole};
use tokio::net::TcpStream;

pub struct TcpProbe {
    /// Declared role per endpoint index
    roles: Vec<Option<HostRole>>,
    /// Replication names of endpoints declared as sync slaves
    sync_standbys: Vec<String>,
}

impl TcpProbe {
    pub fn new(registry: &EndpointRegistry, roles: Vec<Option<HostRole>>) -> Self {
        let sync_standbys = registry
            .iter()
            .filter(|e| roles.get(e.index).copied().flatten() == Some(HostRole::SyncSlave))
            .map(|e| e.replication_name().to_string())
            .collect();

        Self {
            roles,
            sync_standbys,
        }
    }

    pub fn from_config(config: &Config, registry: &EndpointRegistry) -> Self {
        let roles = config.cluster.endpoints.iter().map(|e| e.role).collect();
        Self::new(registry, roles)
    }

    fn declared_status(&self, endpoint: &Endpoint) -> ReplicationStatus {
        match self.roles.get(endpoint.index).copied().flatten() {
            Some(HostRole::Master) => ReplicationStatus::master(self.sync_standbys.clone()),
            Some(HostRole::SyncSlave) | Some(HostRole::Slave) => ReplicationStatus::replica(),
            Some(HostRole::Unknown) | None => ReplicationStatus::unreported(),
        }
    }
}

#[async_trait::async_trait]
impl HostProbe for TcpProbe {
    async fn probe(&self, endpoint: &Endpoint) -> ProbeStatus {
        tracing::debug!("Probing endpoint {}", endpoint);

        match TcpStream::connect((endpoint.dsn.host(), endpoint.dsn.port())).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::trace!("Failed to set TCP_NODELAY for {}: {}", endpoint, e);
                }
                ProbeStatus::Alive(self.declared_status(endpoint))
            }
            Err(e) => ProbeStatus::Unreachable {
                reason: format!("Connection failed: {}", e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_reachable_endpoint_reports_declared_role() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        let registry = EndpointRegistry::new([
            format!("host=127.0.0.1 port={} application_name=pg-a", port),
            format!("host=127.0.0.1 port={} application_name=pg-b", port),
        ])
        .unwrap();
        let probe = TcpProbe::new(
            &registry,
            vec![Some(HostRole::Master), Some(HostRole::SyncSlave)],
        );

        let master = probe.probe(&registry[0]).await;
        assert_eq!(
            master,
            ProbeStatus::Alive(ReplicationStatus::master(["pg-b"]))
        );

        let replica = probe.probe(&registry[1]).await;
        assert_eq!(replica, ProbeStatus::Alive(ReplicationStatus::replica()));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        // Bind then drop to get a port nothing listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let registry = EndpointRegistry::new([format!("host=127.0.0.1 port={}", port)]).unwrap();
        let probe = TcpProbe::new(&registry, vec![None]);

        match probe.probe(&registry[0]).await {
            ProbeStatus::Unreachable { reason } => assert!(reason.starts_with("Connection failed")),
            other => panic!("Expected unreachable status, got {:?}", other),
        }
    }

    #[test]
    fn test_undeclared_role_is_unreported() {
        let registry = EndpointRegistry::new(["host=a"]).unwrap();
        let probe = TcpProbe::new(&registry, vec![]);
        assert_eq!(
            probe.declared_status(&registry[0]),
            ReplicationStatus::unreported()
        );
    }
}
