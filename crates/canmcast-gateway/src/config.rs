use std::time::Duration;

use canmcast_transport::net::validate_routes;
use canmcast_transport::{ConfigError, McastRoute};

use crate::queue::DEFAULT_QUEUE_DEPTH;

/// Default CAN interface name.
pub const DEFAULT_CAN_INTERFACE: &str = "can0";

/// Default multiplexer wait; a wait that expires with no events is logged
/// as a liveness heartbeat.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay between teardown and reconnect after a fatal error.
pub const DEFAULT_RECONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Validated gateway configuration.
///
/// Construction is the configuration boundary: a [`GatewayConfig`] that
/// exists is runnable, and every violation is reported before any socket
/// is opened.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub can_interface: String,
    routes: Vec<McastRoute>,
    pub queue_depth: usize,
    pub poll_timeout: Duration,
    pub reconnect_timeout: Duration,
}

impl GatewayConfig {
    /// Build a configuration from an interface name and route set.
    ///
    /// At least one multicast route is required and each address family
    /// may appear at most once.
    pub fn new(
        can_interface: impl Into<String>,
        routes: Vec<McastRoute>,
    ) -> Result<Self, ConfigError> {
        validate_routes(&routes)?;
        Ok(Self {
            can_interface: can_interface.into(),
            routes,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            reconnect_timeout: DEFAULT_RECONNECT_TIMEOUT,
        })
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.reconnect_timeout = timeout;
        self
    }

    /// The configured multicast routes (one per address family).
    pub fn routes(&self) -> &[McastRoute] {
        &self.routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    fn v4_route() -> McastRoute {
        McastRoute::new(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            1339,
            IpAddr::V4(Ipv4Addr::new(224, 0, 0, 1)),
            1338,
        )
        .unwrap()
    }

    fn v6_route() -> McastRoute {
        McastRoute::new(
            IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            1339,
            IpAddr::V6("ff02::1".parse().unwrap()),
            1338,
        )
        .unwrap()
    }

    #[test]
    fn requires_at_least_one_route() {
        let err = GatewayConfig::new("can0", Vec::new()).unwrap_err();
        assert!(matches!(err, ConfigError::NoRoutes));
    }

    #[test]
    fn rejects_two_routes_in_one_family() {
        let err = GatewayConfig::new("can0", vec![v6_route(), v6_route()]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicateFamily { family: "IPv6" }
        ));
    }

    #[test]
    fn dual_family_config_is_accepted() {
        let config = GatewayConfig::new("can0", vec![v4_route(), v6_route()]).unwrap();
        assert_eq!(config.routes().len(), 2);
        assert_eq!(config.can_interface, "can0");
    }

    #[test]
    fn defaults_match_reference_timings() {
        let config = GatewayConfig::new("can0", vec![v4_route()]).unwrap();
        assert_eq!(config.poll_timeout, Duration::from_secs(10));
        assert_eq!(config.reconnect_timeout, Duration::from_secs(10));
        assert_eq!(config.queue_depth, DEFAULT_QUEUE_DEPTH);
    }

    #[test]
    fn builder_setters_override_defaults() {
        let config = GatewayConfig::new("vcan0", vec![v4_route()])
            .unwrap()
            .with_queue_depth(16)
            .with_poll_timeout(Duration::from_millis(50))
            .with_reconnect_timeout(Duration::from_millis(100));
        assert_eq!(config.queue_depth, 16);
        assert_eq!(config.poll_timeout, Duration::from_millis(50));
        assert_eq!(config.reconnect_timeout, Duration::from_millis(100));
    }
}
