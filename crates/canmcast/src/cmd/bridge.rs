use std::net::IpAddr;
use std::time::Duration;

use canmcast_gateway::{GatewayConfig, Supervisor};
use canmcast_transport::McastRoute;

use crate::cmd::BridgeArgs;
use crate::exit::{config_error, CliError, CliResult, USAGE};

pub fn run(args: BridgeArgs) -> CliResult<i32> {
    let poll_timeout = parse_duration(&args.poll_timeout)?;
    let reconnect_timeout = parse_duration(&args.reconnect_timeout)?;

    let mut routes = Vec::new();
    if let Some(group) = args.group {
        let route = McastRoute::new(
            IpAddr::V4(args.bind),
            args.bind_port,
            IpAddr::V4(group),
            args.group_port,
        )
        .map_err(|err| config_error("invalid IPv4 route", err))?;
        routes.push(route);
    }
    if let Some(group6) = args.group6 {
        let route = McastRoute::new(
            IpAddr::V6(args.bind6),
            args.bind6_port,
            IpAddr::V6(group6),
            args.group6_port,
        )
        .map_err(|err| config_error("invalid IPv6 route", err))?;
        routes.push(route);
    }

    let config = GatewayConfig::new(&args.can_interface, routes)
        .map_err(|err| config_error("invalid gateway configuration", err))?
        .with_queue_depth(args.queue_depth)
        .with_poll_timeout(poll_timeout)
        .with_reconnect_timeout(reconnect_timeout);

    // Runs until the process is terminated.
    Supervisor::new(config).run()
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seconds_and_milliseconds() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn rejects_empty_zero_and_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("soon").is_err());
    }
}
