use std::thread;

use tracing::{error, info};

use canmcast_transport::{BusEndpoint, NetEndpoint, TransportError};

use crate::bridge::Bridge;
use crate::config::GatewayConfig;

/// Endpoint lifecycle owner.
///
/// Two states: *disconnected* (no sockets open) and *running* (both
/// endpoints open, bridge loop active). Any failure — opening an
/// endpoint or a fatal error inside the loop — drops every socket and
/// re-enters disconnected; after a fixed `reconnect_timeout` both
/// transports are reopened. There is no backoff and no give-up: the
/// gateway runs until the process is terminated. Configuration validity
/// is established before a [`Supervisor`] can exist, so nothing here is
/// a configuration retry.
pub struct Supervisor {
    config: GatewayConfig,
}

impl Supervisor {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Open both endpoints and assemble a bridge over them.
    pub fn connect(&self) -> Result<Bridge, TransportError> {
        let bus = BusEndpoint::open(&self.config.can_interface)?;
        let net = NetEndpoint::open(self.config.routes())?;
        Bridge::new(bus, net, &self.config)
    }

    /// Run the connect/bridge/reconnect cycle forever.
    pub fn run(&self) -> ! {
        loop {
            match self.connect() {
                Ok(mut bridge) => {
                    info!(interface = %self.config.can_interface, "gateway running");
                    if let Err(err) = bridge.run() {
                        error!(%err, "bridge stopped on transport failure");
                    }
                    // Dropping the bridge closes both endpoints.
                }
                Err(err) => error!(%err, "failed to open endpoints"),
            }
            info!(
                delay = ?self.config.reconnect_timeout,
                "disconnected, reopening endpoints after delay"
            );
            thread::sleep(self.config.reconnect_timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    use canmcast_transport::McastRoute;

    #[test]
    fn connect_fails_cleanly_on_unknown_interface() {
        let route = McastRoute::new(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            0,
            IpAddr::V4(Ipv4Addr::new(224, 0, 0, 1)),
            1338,
        )
        .unwrap();
        let config = GatewayConfig::new("canmcast-no-such-if0", vec![route]).unwrap();

        let err = Supervisor::new(config).connect().unwrap_err();
        assert!(matches!(err, TransportError::Interface { .. }));
    }
}
