use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use tracing::{info, trace};

use canmcast_frame::FRAME_SIZE;

use crate::error::{Result, TransportError};

/// A non-blocking raw SocketCAN endpoint bound to one interface.
///
/// Reads and writes move whole kernel `can_frame` buffers, which share
/// their 16-byte layout with the gateway's wire format — the bus side is
/// byte-transparent. The descriptor is closed on drop; after any hard I/O
/// error the endpoint must be dropped and reopened.
pub struct BusEndpoint {
    fd: OwnedFd,
    interface: String,
}

impl BusEndpoint {
    /// Open a non-blocking CAN_RAW socket on the named interface.
    pub fn open(interface: &str) -> Result<Self> {
        let ifindex = interface_index(interface)?;

        // SAFETY: plain socket(2) call; the returned descriptor is checked
        // before being wrapped.
        let raw = unsafe {
            libc::socket(
                libc::PF_CAN,
                libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                libc::CAN_RAW,
            )
        };
        if raw < 0 {
            return Err(TransportError::BusOpen {
                interface: interface.to_string(),
                source: io::Error::last_os_error(),
            });
        }
        // SAFETY: `raw` is a freshly created socket owned by this process.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let mut addr: libc::sockaddr_can = unsafe { std::mem::zeroed() };
        addr.can_family = libc::AF_CAN as libc::sa_family_t;
        addr.can_ifindex = ifindex;

        // SAFETY: `addr` is a fully initialised sockaddr_can and `fd` is an
        // open CAN socket; bind(2) reads exactly size_of::<sockaddr_can>()
        // bytes from it.
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                std::ptr::addr_of!(addr).cast::<libc::sockaddr>(),
                std::mem::size_of::<libc::sockaddr_can>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(TransportError::BusOpen {
                interface: interface.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        info!(interface, "opened CAN socket");
        Ok(Self {
            fd,
            interface: interface.to_string(),
        })
    }

    /// Receive one raw frame, or `Ok(None)` when no frame is queued.
    pub fn try_recv(&self) -> Result<Option<[u8; FRAME_SIZE]>> {
        let mut wire = [0u8; FRAME_SIZE];
        // SAFETY: `wire` is a valid writable buffer of FRAME_SIZE bytes.
        let n = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                wire.as_mut_ptr().cast::<libc::c_void>(),
                FRAME_SIZE,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(None);
            }
            return Err(TransportError::Io(err));
        }
        if n as usize != FRAME_SIZE {
            // A CAN_RAW read is all-or-nothing; anything else means the
            // socket is no longer delivering classic frames.
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("short CAN read: {n} bytes"),
            )));
        }
        trace!(interface = %self.interface, "received bus frame");
        Ok(Some(wire))
    }

    /// Send one raw frame. `Ok(false)` means the bus is busy (socket
    /// buffer full or device TX queue full) and the frame was not written.
    pub fn try_send(&self, wire: &[u8; FRAME_SIZE]) -> Result<bool> {
        // SAFETY: `wire` is a valid readable buffer of FRAME_SIZE bytes.
        let n = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                wire.as_ptr().cast::<libc::c_void>(),
                FRAME_SIZE,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if is_bus_busy(&err) {
                return Ok(false);
            }
            return Err(TransportError::Io(err));
        }
        trace!(interface = %self.interface, "sent bus frame");
        Ok(true)
    }

    /// The interface this endpoint is bound to.
    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl AsRawFd for BusEndpoint {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl std::fmt::Debug for BusEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusEndpoint")
            .field("interface", &self.interface)
            .finish()
    }
}

/// Resolve an interface name to its kernel index.
fn interface_index(interface: &str) -> Result<libc::c_int> {
    let name = CString::new(interface).map_err(|_| TransportError::Interface {
        interface: interface.to_string(),
        source: io::Error::from(io::ErrorKind::InvalidInput),
    })?;
    // SAFETY: `name` is a valid NUL-terminated string.
    let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
    if index == 0 {
        return Err(TransportError::Interface {
            interface: interface.to_string(),
            source: io::Error::last_os_error(),
        });
    }
    Ok(index as libc::c_int)
}

/// SocketCAN reports a full device TX queue as ENOBUFS rather than
/// EAGAIN; both mean "retry on later readiness".
fn is_bus_busy(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::ENOBUFS)
}
