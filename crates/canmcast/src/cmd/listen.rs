use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use canmcast_frame::{decode_frame, FRAME_SIZE};
use canmcast_transport::{join_blocking, McastRoute};

use crate::cmd::ListenArgs;
use crate::exit::{config_error, io_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_frame, OutputFormat};

/// How long a receive blocks before re-checking the shutdown flag.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let Some(group) = args.group_addr() else {
        return Err(CliError::new(
            USAGE,
            "one of --group or --group6 is required",
        ));
    };

    let bind = match group {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    let route = McastRoute::new(bind, args.port, group, args.port)
        .map_err(|err| config_error("invalid group", err))?;
    let sock = join_blocking(&route, READ_TIMEOUT)
        .map_err(|err| transport_error("join failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    let mut buf = [0u8; 2048];

    while running.load(Ordering::SeqCst) {
        let (len, peer) = match sock.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(err) if is_timeout_error(&err) => continue,
            Err(err) => return Err(io_error("receive failed", err)),
        };

        if len != FRAME_SIZE {
            warn!(len, %peer, "ignoring datagram that is not one frame");
            continue;
        }
        let frame = match decode_frame(&buf[..FRAME_SIZE]) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, %peer, "ignoring undecodable datagram");
                continue;
            }
        };

        print_frame(&frame, peer, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                return Ok(SUCCESS);
            }
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

/// OS timeout / would-block results that just mean "poll the flag again".
fn is_timeout_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_errors_are_recognised() {
        assert!(is_timeout_error(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(is_timeout_error(&io::Error::from(
            io::ErrorKind::WouldBlock
        )));
        assert!(!is_timeout_error(&io::Error::from(
            io::ErrorKind::ConnectionRefused
        )));
    }
}
