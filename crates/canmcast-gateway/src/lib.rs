//! The canmcast bridging engine.
//!
//! A single-threaded, readiness-driven loop moves raw 16-byte frames
//! between a SocketCAN interface and UDP multicast: bus traffic is
//! mirrored onto every configured group, datagrams received by unicast
//! are written back to the bus. Each socket has a bounded FIFO of
//! pending outbound frames; write-interest is registered with the poller
//! only while that queue is non-empty, so backpressure surfaces as queue
//! occupancy instead of blocked threads.
//!
//! [`Supervisor`] owns endpoint lifecycle: it opens both transports,
//! runs the [`Bridge`] until a hard I/O error, then tears everything
//! down and retries after a fixed delay, indefinitely.

pub mod bridge;
pub mod config;
pub mod queue;
pub mod supervisor;

pub use bridge::Bridge;
pub use config::GatewayConfig;
pub use queue::TxQueue;
pub use supervisor::Supervisor;
