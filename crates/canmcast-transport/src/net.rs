use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::info;

use crate::error::{ConfigError, Result, TransportError};

/// One validated multicast route: where to bind for unicast receive and
/// which group:port to send to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McastRoute {
    bind: IpAddr,
    bind_port: u16,
    group: IpAddr,
    group_port: u16,
}

impl McastRoute {
    /// Validate and build a route.
    ///
    /// The group must be a multicast address and both addresses must
    /// belong to the same family; violations are configuration errors,
    /// raised here so no socket is ever opened for a bad route.
    pub fn new(
        bind: IpAddr,
        bind_port: u16,
        group: IpAddr,
        group_port: u16,
    ) -> std::result::Result<Self, ConfigError> {
        if !group.is_multicast() {
            return Err(ConfigError::NotMulticast { addr: group });
        }
        if bind.is_ipv4() != group.is_ipv4() {
            return Err(ConfigError::FamilyMismatch { bind, group });
        }
        Ok(Self {
            bind,
            bind_port,
            group,
            group_port,
        })
    }

    /// The local address this route's socket binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.bind_port)
    }

    /// The multicast destination this route sends to.
    pub fn dest(&self) -> SocketAddr {
        SocketAddr::new(self.group, self.group_port)
    }

    /// The multicast group joined on receive.
    pub fn group(&self) -> IpAddr {
        self.group
    }

    pub fn is_ipv6(&self) -> bool {
        self.group.is_ipv6()
    }
}

/// Check a route set before any socket exists: at least one route, at
/// most one per address family.
pub fn validate_routes(routes: &[McastRoute]) -> std::result::Result<(), ConfigError> {
    if routes.is_empty() {
        return Err(ConfigError::NoRoutes);
    }
    let v4 = routes.iter().filter(|r| !r.is_ipv6()).count();
    let v6 = routes.iter().filter(|r| r.is_ipv6()).count();
    if v4 > 1 {
        return Err(ConfigError::DuplicateFamily { family: "IPv4" });
    }
    if v6 > 1 {
        return Err(ConfigError::DuplicateFamily { family: "IPv6" });
    }
    Ok(())
}

/// One open multicast socket: bound, joined, non-blocking.
pub struct McastSocket {
    sock: UdpSocket,
    route: McastRoute,
}

impl McastSocket {
    fn open(route: McastRoute) -> Result<Self> {
        let raw = open_socket(&route)?;
        raw.set_nonblocking(true).map_err(TransportError::Io)?;
        let sock: UdpSocket = raw.into();
        info!(bind = %route.bind_addr(), group = %route.dest(), "joined multicast route");
        Ok(Self { sock, route })
    }

    /// Receive one datagram into `buf`, or `Ok(None)` when none is queued.
    ///
    /// Returns the datagram length and sender so callers can reject
    /// traffic that is not exactly one frame.
    pub fn try_recv(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        match self.sock.recv_from(buf) {
            Ok((len, peer)) => Ok(Some((len, peer))),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    /// Send one datagram to the route's group:port. `Ok(false)` means the
    /// socket buffer is full and the datagram was not sent.
    pub fn try_send(&self, wire: &[u8]) -> Result<bool> {
        match self.sock.send_to(wire, self.route.dest()) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    /// The route this socket serves.
    pub fn route(&self) -> &McastRoute {
        &self.route
    }
}

impl AsRawFd for McastSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.sock.as_raw_fd()
    }
}

impl std::fmt::Debug for McastSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McastSocket")
            .field("bind", &self.route.bind_addr())
            .field("dest", &self.route.dest())
            .finish()
    }
}

/// The gateway's network side: one multicast socket per configured
/// address family.
#[derive(Debug)]
pub struct NetEndpoint {
    v4: Option<McastSocket>,
    v6: Option<McastSocket>,
}

impl NetEndpoint {
    /// Open a socket for every configured route.
    pub fn open(routes: &[McastRoute]) -> Result<Self> {
        validate_routes(routes).map_err(TransportError::Config)?;

        let mut v4 = None;
        let mut v6 = None;
        for route in routes {
            let sock = McastSocket::open(route.clone())?;
            if route.is_ipv6() {
                v6 = Some(sock);
            } else {
                v4 = Some(sock);
            }
        }
        Ok(Self { v4, v6 })
    }

    pub fn v4(&self) -> Option<&McastSocket> {
        self.v4.as_ref()
    }

    pub fn v6(&self) -> Option<&McastSocket> {
        self.v6.as_ref()
    }
}

/// Open, bind, and join a route's socket in blocking mode with a read
/// timeout. Used by the demo receiver, which has no multiplexer.
pub fn join_blocking(route: &McastRoute, read_timeout: Duration) -> Result<UdpSocket> {
    let raw = open_socket(route)?;
    raw.set_read_timeout(Some(read_timeout))
        .map_err(TransportError::Io)?;
    let sock: UdpSocket = raw.into();
    info!(bind = %route.bind_addr(), group = %route.group(), "joined multicast group");
    Ok(sock)
}

/// Shared socket setup: reuse-address (so several bridges and receivers
/// can share a port), bind, group join.
fn open_socket(route: &McastRoute) -> Result<Socket> {
    let bind_addr = route.bind_addr();
    let domain = if route.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let sock = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(TransportError::Io)?;
    sock.set_reuse_address(true).map_err(|source| TransportError::Bind {
        addr: bind_addr,
        source,
    })?;
    if route.is_ipv6() {
        sock.set_only_v6(true).map_err(|source| TransportError::Bind {
            addr: bind_addr,
            source,
        })?;
    }
    sock.bind(&SockAddr::from(bind_addr))
        .map_err(|source| TransportError::Bind {
            addr: bind_addr,
            source,
        })?;

    match route.group() {
        IpAddr::V4(group) => sock
            .join_multicast_v4(&group, &std::net::Ipv4Addr::UNSPECIFIED)
            .map_err(|source| TransportError::Join {
                group: route.group(),
                source,
            })?,
        IpAddr::V6(group) => {
            sock.join_multicast_v6(&group, 0)
                .map_err(|source| TransportError::Join {
                    group: route.group(),
                    source,
                })?
        }
    }

    Ok(sock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn v4_route() -> McastRoute {
        McastRoute::new(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            0,
            IpAddr::V4(Ipv4Addr::new(224, 0, 0, 1)),
            1338,
        )
        .unwrap()
    }

    fn v6_route() -> McastRoute {
        McastRoute::new(
            IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            0,
            IpAddr::V6("ff02::1".parse().unwrap()),
            1338,
        )
        .unwrap()
    }

    #[test]
    fn route_rejects_non_multicast_group() {
        let err = McastRoute::new(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            1339,
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)),
            1338,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NotMulticast { .. }));
    }

    #[test]
    fn route_rejects_mixed_families() {
        let err = McastRoute::new(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            1339,
            IpAddr::V6("ff02::1".parse().unwrap()),
            1338,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::FamilyMismatch { .. }));

        let err = McastRoute::new(
            IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            1339,
            IpAddr::V4(Ipv4Addr::new(224, 0, 0, 1)),
            1338,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::FamilyMismatch { .. }));
    }

    #[test]
    fn empty_route_set_is_rejected() {
        assert!(matches!(validate_routes(&[]), Err(ConfigError::NoRoutes)));
    }

    #[test]
    fn duplicate_family_is_rejected() {
        let err = validate_routes(&[v4_route(), v4_route()]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicateFamily { family: "IPv4" }
        ));
    }

    #[test]
    fn one_route_per_family_is_accepted() {
        assert!(validate_routes(&[v4_route()]).is_ok());
        assert!(validate_routes(&[v4_route(), v6_route()]).is_ok());
    }

    #[test]
    fn open_assigns_family_slots() {
        // Multicast joins need a usable network stack; tolerate sandboxes
        // without one, as long as the failure is an I/O error rather than
        // a validation bug.
        match NetEndpoint::open(&[v4_route()]) {
            Ok(net) => {
                assert!(net.v4().is_some());
                assert!(net.v6().is_none());
            }
            Err(err) => assert!(!matches!(err, TransportError::Config(_))),
        }
    }

    #[test]
    fn open_with_no_routes_is_a_config_error() {
        let err = NetEndpoint::open(&[]).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Config(ConfigError::NoRoutes)
        ));
    }

    #[test]
    fn reuse_address_allows_shared_receive_port() {
        let route = |port| {
            McastRoute::new(
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                port,
                IpAddr::V4(Ipv4Addr::new(224, 0, 0, 1)),
                1338,
            )
            .unwrap()
        };

        // Bind an ephemeral port first to learn a free number.
        let first = match NetEndpoint::open(&[route(0)]) {
            Ok(net) => net,
            // No multicast-capable stack in this environment; nothing to assert.
            Err(_) => return,
        };
        let port = first
            .v4()
            .unwrap()
            .sock
            .local_addr()
            .expect("local addr")
            .port();

        let second = NetEndpoint::open(&[route(port)]);
        assert!(second.is_ok(), "second bind on {port} must succeed: {second:?}");
    }
}
