/// Routing request flags and their validation
///
/// A request carries a set of acceptable roles and at most one selection
/// strategy. `RequestFlags::validate` turns the raw sets into a
/// [`RouteRequest`] or rejects combinations that have no meaning.
use crate::core::HostRole;
use crate::error::{RouterError, RouterResult};
use std::fmt;

/// How an endpoint is picked within the resolved role bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    #[default]
    RoundRobin,
    Nearest,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::RoundRobin => write!(f, "round_robin"),
            Strategy::Nearest => write!(f, "nearest"),
        }
    }
}

/// What a validated request may be served by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleTarget {
    /// Master and slave were both requested: any live node will do
    AnyAlive,
    /// Exactly one role was requested
    Role(HostRole),
}

/// A validated routing request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteRequest {
    pub target: RoleTarget,
    pub strategy: Strategy,
}

/// Caller-supplied role and strategy sets, unvalidated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestFlags {
    master: bool,
    sync_slave: bool,
    slave: bool,
    unknown: bool,
    round_robin: bool,
    nearest: bool,
}

impl RequestFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags requesting a single role
    pub fn role(role: HostRole) -> Self {
        Self::new().with_role(role)
    }

    /// Flags accepting any live node
    pub fn any_node() -> Self {
        Self::new()
            .with_role(HostRole::Master)
            .with_role(HostRole::Slave)
    }

    pub fn with_role(mut self, role: HostRole) -> Self {
        match role {
            HostRole::Master => self.master = true,
            HostRole::SyncSlave => self.sync_slave = true,
            HostRole::Slave => self.slave = true,
            HostRole::Unknown => self.unknown = true,
        }
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        match strategy {
            Strategy::RoundRobin => self.round_robin = true,
            Strategy::Nearest => self.nearest = true,
        }
        self
    }

    pub fn has_roles(&self) -> bool {
        self.master || self.sync_slave || self.slave || self.unknown
    }

    pub fn contains_role(&self, role: HostRole) -> bool {
        match role {
            HostRole::Master => self.master,
            HostRole::SyncSlave => self.sync_slave,
            HostRole::Slave => self.slave,
            HostRole::Unknown => self.unknown,
        }
    }

    /// Same strategy bits, no role bits
    pub fn without_roles(self) -> Self {
        Self {
            master: false,
            sync_slave: false,
            slave: false,
            unknown: false,
            ..self
        }
    }

    /// Resolve the strategy set; an empty set means round-robin
    pub fn strategy(&self) -> RouterResult<Strategy> {
        match (self.round_robin, self.nearest) {
            (false, false) => Ok(Strategy::RoundRobin),
            (true, false) => Ok(Strategy::RoundRobin),
            (false, true) => Ok(Strategy::Nearest),
            (true, true) => Err(RouterError::configuration(format!(
                "Invalid strategy requested: {}, ensure only one is used",
                self
            ))),
        }
    }

    /// Resolve the role set
    ///
    /// | master | sync_slave | slave | result                 |
    /// |--------|------------|-------|------------------------|
    /// | -      | -          | -     | logic error (no roles) |
    /// | x      | -          | -     | master                 |
    /// | -      | x          | -     | sync slave             |
    /// | -      | -          | x     | slave                  |
    /// | x      | -          | x     | any alive node         |
    /// | any other combination with sync_slave | configuration error |
    pub fn role_target(&self) -> RouterResult<RoleTarget> {
        if self.unknown {
            return Err(RouterError::configuration(
                "unknown is not a routable host role",
            ));
        }

        match (self.master, self.sync_slave, self.slave) {
            (false, false, false) => Err(RouterError::logic("No roles specified")),
            (true, false, false) => Ok(RoleTarget::Role(HostRole::Master)),
            (false, true, false) => Ok(RoleTarget::Role(HostRole::SyncSlave)),
            (false, false, true) => Ok(RoleTarget::Role(HostRole::Slave)),
            (true, false, true) => Ok(RoleTarget::AnyAlive),
            (_, true, _) => Err(RouterError::configuration(format!(
                "sync_slave cannot be combined with other roles: {}",
                self
            ))),
        }
    }

    pub fn validate(&self) -> RouterResult<RouteRequest> {
        let strategy = self.strategy()?;
        let target = self.role_target()?;
        Ok(RouteRequest { target, strategy })
    }
}

impl fmt::Display for RequestFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.master, "master"),
            (self.sync_slave, "sync_slave"),
            (self.slave, "slave"),
            (self.unknown, "unknown"),
            (self.round_robin, "round_robin"),
            (self.nearest, "nearest"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "(none)")
        } else {
            write!(f, "{}", set.join("|"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_roles() {
        for role in [HostRole::Master, HostRole::SyncSlave, HostRole::Slave] {
            let request = RequestFlags::role(role).validate().unwrap();
            assert_eq!(request.target, RoleTarget::Role(role));
            assert_eq!(request.strategy, Strategy::RoundRobin);
        }
    }

    #[test]
    fn test_master_and_slave_means_any_node() {
        let request = RequestFlags::any_node().validate().unwrap();
        assert_eq!(request.target, RoleTarget::AnyAlive);
    }

    #[test]
    fn test_sync_slave_is_exclusive() {
        let combos = [
            RequestFlags::role(HostRole::SyncSlave).with_role(HostRole::Master),
            RequestFlags::role(HostRole::SyncSlave).with_role(HostRole::Slave),
            RequestFlags::any_node().with_role(HostRole::SyncSlave),
        ];
        for flags in combos {
            let err = flags.validate().unwrap_err();
            assert!(
                matches!(err, RouterError::Configuration { .. }),
                "{} should be rejected, got {:?}",
                flags,
                err
            );
        }
    }

    #[test]
    fn test_both_strategies_rejected() {
        let flags = RequestFlags::role(HostRole::Slave)
            .with_strategy(Strategy::RoundRobin)
            .with_strategy(Strategy::Nearest);
        let err = flags.validate().unwrap_err();
        assert!(matches!(err, RouterError::Configuration { .. }));
    }

    #[test]
    fn test_strategy_resolution() {
        let nearest = RequestFlags::role(HostRole::Slave).with_strategy(Strategy::Nearest);
        assert_eq!(nearest.strategy().unwrap(), Strategy::Nearest);

        let explicit = RequestFlags::role(HostRole::Slave).with_strategy(Strategy::RoundRobin);
        assert_eq!(explicit.strategy().unwrap(), Strategy::RoundRobin);
    }

    #[test]
    fn test_no_roles_is_logic_error() {
        let err = RequestFlags::new().validate().unwrap_err();
        assert!(matches!(err, RouterError::Logic { .. }));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let err = RequestFlags::role(HostRole::Unknown).validate().unwrap_err();
        assert!(matches!(err, RouterError::Configuration { .. }));
    }

    #[test]
    fn test_without_roles_keeps_strategy() {
        let flags = RequestFlags::any_node()
            .with_strategy(Strategy::Nearest)
            .without_roles();
        assert!(!flags.has_roles());
        assert_eq!(flags.strategy().unwrap(), Strategy::Nearest);
        assert_eq!(flags.to_string(), "nearest");
    }

    #[test]
    fn test_display() {
        assert_eq!(RequestFlags::new().to_string(), "(none)");
        assert_eq!(RequestFlags::any_node().to_string(), "master|slave");
    }
}
