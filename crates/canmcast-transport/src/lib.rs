//! Socket endpoints for the canmcast gateway.
//!
//! Two transports, one contract: non-blocking sockets whose receive/send
//! operations report "would block" as a normal result rather than an error,
//! leaving retry timing to a readiness multiplexer. [`BusEndpoint`] owns a
//! raw SocketCAN socket; [`NetEndpoint`] owns one UDP multicast socket per
//! configured address family.
//!
//! SocketCAN is a Linux facility; this crate does not build elsewhere.

pub mod bus;
pub mod error;
pub mod net;

pub use bus::BusEndpoint;
pub use error::{ConfigError, Result, TransportError};
pub use net::{join_blocking, McastRoute, McastSocket, NetEndpoint};
