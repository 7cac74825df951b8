use std::io;
use std::net::{IpAddr, SocketAddr};

/// Errors that can occur in gateway transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The named CAN interface does not exist.
    #[error("no such CAN interface {interface}: {source}")]
    Interface {
        interface: String,
        source: io::Error,
    },

    /// Failed to create or bind the CAN socket.
    #[error("failed to open CAN socket on {interface}: {source}")]
    BusOpen {
        interface: String,
        source: io::Error,
    },

    /// Failed to bind a UDP socket.
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    /// Failed to join a multicast group.
    #[error("failed to join multicast group {group}: {source}")]
    Join { group: IpAddr, source: io::Error },

    /// The endpoint configuration is invalid. Never retried.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A hard I/O failure on an open socket. Invalidates the endpoint.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Whether this error invalidates an open endpoint.
    ///
    /// Fatal errors propagate to the supervisor, which tears down and
    /// reopens both transports. Open-time and configuration errors are
    /// handled where the endpoint is constructed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Io(_))
    }
}

/// Configuration errors, all raised before any socket is opened.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The group address is not in the multicast range.
    #[error("{addr} is not a multicast address")]
    NotMulticast { addr: IpAddr },

    /// Bind and group addresses belong to different address families.
    #[error("bind address {bind} and group {group} must share an address family")]
    FamilyMismatch { bind: IpAddr, group: IpAddr },

    /// Neither an IPv4 nor an IPv6 route was configured.
    #[error("at least one multicast route (IPv4 or IPv6) must be configured")]
    NoRoutes,

    /// Two routes were configured for the same address family.
    #[error("more than one {family} route configured")]
    DuplicateFamily { family: &'static str },
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_runtime_io_errors_are_fatal() {
        let io = TransportError::Io(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(io.is_fatal());

        let config = TransportError::Config(ConfigError::NoRoutes);
        assert!(!config.is_fatal());

        let open = TransportError::BusOpen {
            interface: "can0".into(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(!open.is_fatal());
    }
}
