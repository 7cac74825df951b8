use std::io;
use std::os::fd::AsRawFd;
use std::time::Duration;

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, warn};

use canmcast_frame::{decode_frame, FRAME_SIZE};
use canmcast_transport::{BusEndpoint, McastSocket, NetEndpoint, TransportError};

use crate::config::GatewayConfig;
use crate::queue::TxQueue;

const BUS: Token = Token(0);
const NET4: Token = Token(1);
const NET6: Token = Token(2);

const EVENTS_CAPACITY: usize = 64;

/// Receive buffer larger than a frame so oversized datagrams are seen at
/// their real length instead of being silently truncated to one frame.
const DATAGRAM_BUF: usize = 2048;

/// The bridging event loop.
///
/// Owns both endpoints, one outbound [`TxQueue`] per socket, and the
/// readiness poller. Every socket keeps read-interest permanently;
/// write-interest is held exactly while that socket's queue is non-empty,
/// so an always-ready idle socket never spins the loop.
///
/// Frames move as raw wire bytes; decoding happens only to validate and
/// to log. A hard I/O error on any socket ends [`Bridge::run`], handing
/// lifecycle back to the supervisor.
#[derive(Debug)]
pub struct Bridge {
    poll: Poll,
    bus: BusEndpoint,
    net: NetEndpoint,
    bus_tx: TxQueue,
    net4_tx: TxQueue,
    net6_tx: TxQueue,
    bus_write: bool,
    net4_write: bool,
    net6_write: bool,
    poll_timeout: Duration,
}

impl Bridge {
    /// Register both endpoints for read-interest and assemble the loop.
    pub fn new(
        bus: BusEndpoint,
        net: NetEndpoint,
        config: &GatewayConfig,
    ) -> Result<Self, TransportError> {
        let poll = Poll::new().map_err(TransportError::Io)?;

        let bus_fd = bus.as_raw_fd();
        poll.registry()
            .register(&mut SourceFd(&bus_fd), BUS, Interest::READABLE)?;
        if let Some(sock) = net.v4() {
            let fd = sock.as_raw_fd();
            poll.registry()
                .register(&mut SourceFd(&fd), NET4, Interest::READABLE)?;
        }
        if let Some(sock) = net.v6() {
            let fd = sock.as_raw_fd();
            poll.registry()
                .register(&mut SourceFd(&fd), NET6, Interest::READABLE)?;
        }

        let depth = config.queue_depth;
        Ok(Self {
            poll,
            bus,
            net,
            bus_tx: TxQueue::new(depth),
            net4_tx: TxQueue::new(depth),
            net6_tx: TxQueue::new(depth),
            bus_write: false,
            net4_write: false,
            net6_write: false,
            poll_timeout: config.poll_timeout,
        })
    }

    /// Run until a hard I/O error invalidates one of the endpoints.
    pub fn run(&mut self) -> Result<(), TransportError> {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);

        loop {
            if let Err(err) = self.poll.poll(&mut events, Some(self.poll_timeout)) {
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(TransportError::Io(err));
            }

            if events.is_empty() {
                // Liveness heartbeat; also the retry tick for sockets that
                // reported busy without ever becoming unwritable (a full
                // CAN device TX queue keeps signalling writable).
                debug!(timeout = ?self.poll_timeout, "poll timeout passed without events");
                self.flush_pending()?;
                continue;
            }

            for event in events.iter() {
                let token = event.token();
                let readable = event.is_readable();
                let writable = event.is_writable();
                if let Err(err) = self.dispatch(token, readable, writable) {
                    if err.is_fatal() {
                        return Err(err);
                    }
                    warn!(%err, "error while handling socket readiness");
                }
            }
        }
    }

    /// Explicit dispatch on endpoint identity.
    fn dispatch(
        &mut self,
        token: Token,
        readable: bool,
        writable: bool,
    ) -> Result<(), TransportError> {
        match token {
            BUS => {
                if readable {
                    self.bus_readable()?;
                }
                if writable {
                    self.bus_writable()?;
                }
            }
            NET4 | NET6 => {
                if readable {
                    self.net_readable(token)?;
                }
                if writable {
                    self.net_writable(token)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Drain the bus socket, queueing each frame for every multicast route.
    fn bus_readable(&mut self) -> Result<(), TransportError> {
        while let Some(wire) = self.bus.try_recv()? {
            match decode_frame(&wire) {
                Ok(frame) => debug!(%frame, "bus -> net"),
                Err(err) => {
                    warn!(%err, "dropping undecodable bus frame");
                    continue;
                }
            }
            self.queue_to_net(wire)?;
        }
        Ok(())
    }

    fn queue_to_net(&mut self, wire: [u8; FRAME_SIZE]) -> Result<(), TransportError> {
        if self.net.v4().is_some() {
            if !self.net4_tx.push(wire) {
                warn!(
                    dropped = self.net4_tx.dropped(),
                    "IPv4 multicast queue full, dropped oldest frame"
                );
            }
            self.update_write_interest(NET4)?;
        }
        if self.net.v6().is_some() {
            if !self.net6_tx.push(wire) {
                warn!(
                    dropped = self.net6_tx.dropped(),
                    "IPv6 multicast queue full, dropped oldest frame"
                );
            }
            self.update_write_interest(NET6)?;
        }
        Ok(())
    }

    /// Drain one multicast socket, queueing valid frames for the bus.
    fn net_readable(&mut self, token: Token) -> Result<(), TransportError> {
        let mut buf = [0u8; DATAGRAM_BUF];
        loop {
            let sock = self.net_socket(token);
            let Some(sock) = sock else { return Ok(()) };
            let Some((len, peer)) = sock.try_recv(&mut buf)? else {
                break;
            };

            if len != FRAME_SIZE {
                warn!(len, %peer, "ignoring datagram that is not one frame");
                continue;
            }
            let mut wire = [0u8; FRAME_SIZE];
            wire.copy_from_slice(&buf[..FRAME_SIZE]);

            match decode_frame(&wire) {
                Ok(frame) => debug!(%frame, %peer, "net -> bus"),
                Err(err) => {
                    warn!(%err, %peer, "dropping undecodable datagram");
                    continue;
                }
            }

            if !self.bus_tx.push(wire) {
                warn!(
                    dropped = self.bus_tx.dropped(),
                    "bus queue full, dropped oldest frame"
                );
            }
            self.update_write_interest(BUS)?;
        }
        Ok(())
    }

    /// Flush the bus queue front-first until the bus is busy or the queue
    /// drains.
    fn bus_writable(&mut self) -> Result<(), TransportError> {
        loop {
            let Some(wire) = self.bus_tx.front() else { break };
            if self.bus.try_send(wire)? {
                self.bus_tx.pop();
            } else {
                // Bus busy; the frame stays queued for a later pass.
                break;
            }
        }
        self.update_write_interest(BUS)
    }

    /// Flush one multicast socket's queue front-first.
    fn net_writable(&mut self, token: Token) -> Result<(), TransportError> {
        {
            let (sock, queue) = match token {
                NET4 => (self.net.v4(), &mut self.net4_tx),
                _ => (self.net.v6(), &mut self.net6_tx),
            };
            let Some(sock) = sock else { return Ok(()) };
            while let Some(wire) = queue.front() {
                if sock.try_send(wire)? {
                    queue.pop();
                } else {
                    break;
                }
            }
        }
        self.update_write_interest(token)
    }

    /// Retry queued writes outside a readiness event.
    fn flush_pending(&mut self) -> Result<(), TransportError> {
        if !self.bus_tx.is_empty() {
            self.bus_writable()?;
        }
        if !self.net4_tx.is_empty() {
            self.net_writable(NET4)?;
        }
        if !self.net6_tx.is_empty() {
            self.net_writable(NET6)?;
        }
        Ok(())
    }

    fn net_socket(&self, token: Token) -> Option<&McastSocket> {
        match token {
            NET4 => self.net.v4(),
            NET6 => self.net.v6(),
            _ => None,
        }
    }

    /// Re-establish the invariant: write-interest iff the socket's queue
    /// is non-empty. No-op when the registration already matches.
    fn update_write_interest(&mut self, token: Token) -> Result<(), TransportError> {
        let (fd, want, flag) = match token {
            BUS => (
                self.bus.as_raw_fd(),
                !self.bus_tx.is_empty(),
                &mut self.bus_write,
            ),
            NET4 => {
                let Some(sock) = self.net.v4() else { return Ok(()) };
                (
                    sock.as_raw_fd(),
                    !self.net4_tx.is_empty(),
                    &mut self.net4_write,
                )
            }
            NET6 => {
                let Some(sock) = self.net.v6() else { return Ok(()) };
                (
                    sock.as_raw_fd(),
                    !self.net6_tx.is_empty(),
                    &mut self.net6_write,
                )
            }
            _ => return Ok(()),
        };

        if *flag == want {
            return Ok(());
        }
        let interest = if want {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        self.poll
            .registry()
            .reregister(&mut SourceFd(&fd), token, interest)?;
        *flag = want;
        Ok(())
    }
}
