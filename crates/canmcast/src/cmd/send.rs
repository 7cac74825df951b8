use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use tracing::debug;

use canmcast_frame::{encode_frame, CanFrame};

use crate::cmd::SendArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};

pub fn run(args: SendArgs) -> CliResult<i32> {
    let data = parse_hex_data(&args.data)?;
    let frame =
        CanFrame::new(args.id, &data).map_err(|err| frame_error("invalid frame", err))?;
    let wire = encode_frame(&frame);

    let local = if args.to.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let sock = UdpSocket::bind(local).map_err(|err| io_error("bind failed", err))?;
    sock.send_to(&wire, (args.to, args.port))
        .map_err(|err| io_error("send failed", err))?;

    debug!(%frame, to = %args.to, port = args.port, "sent frame");
    Ok(SUCCESS)
}

/// Parse a CAN identifier: decimal, or hex with a `0x` prefix.
pub fn parse_can_id(input: &str) -> Result<u32, String> {
    let input = input.trim();
    let parsed = if let Some(hex) = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16)
    } else {
        input.parse()
    };
    parsed.map_err(|_| format!("invalid CAN identifier: {input}"))
}

/// Parse frame data given as hex digits ("deadbeef" -> 4 bytes).
fn parse_hex_data(input: &str) -> CliResult<Vec<u8>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }
    if !input.is_ascii() || input.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("--data must be an even number of hex digits: {input}"),
        ));
    }
    (0..input.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&input[i..i + 2], 16).map_err(|_| {
                CliError::new(
                    USAGE,
                    format!("--data must be an even number of hex digits: {input}"),
                )
            })
        })
        .collect()
}
