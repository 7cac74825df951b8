use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod bridge;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the CAN ↔ UDP multicast gateway.
    Bridge(BridgeArgs),
    /// Join a multicast group and print received frames.
    Listen(ListenArgs),
    /// Send a single frame to a gateway's receive port.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Bridge(args) => bridge::run(args),
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct BridgeArgs {
    /// CAN interface to bridge.
    #[arg(long, default_value = canmcast_gateway::config::DEFAULT_CAN_INTERFACE)]
    pub can_interface: String,

    /// IPv4 multicast group to mirror bus traffic to.
    #[arg(long)]
    pub group: Option<Ipv4Addr>,
    /// UDP port of the IPv4 group.
    #[arg(long, default_value_t = 1338)]
    pub group_port: u16,
    /// IPv4 address to bind for receiving injected frames.
    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    pub bind: Ipv4Addr,
    /// UDP port to bind for receiving injected frames.
    #[arg(long, default_value_t = 1339)]
    pub bind_port: u16,

    /// IPv6 multicast group to mirror bus traffic to.
    #[arg(long)]
    pub group6: Option<Ipv6Addr>,
    /// UDP port of the IPv6 group.
    #[arg(long, default_value_t = 1338)]
    pub group6_port: u16,
    /// IPv6 address to bind for receiving injected frames.
    #[arg(long, default_value_t = Ipv6Addr::UNSPECIFIED)]
    pub bind6: Ipv6Addr,
    /// UDP port to bind for receiving injected frames (IPv6).
    #[arg(long, default_value_t = 1339)]
    pub bind6_port: u16,

    /// Pending frames kept per socket before the oldest is dropped.
    #[arg(long, default_value_t = canmcast_gateway::queue::DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,
    /// Multiplexer wait per loop pass (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub poll_timeout: String,
    /// Delay before reopening endpoints after a failure (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub reconnect_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// IPv4 multicast group to join.
    #[arg(long, conflicts_with = "group6")]
    pub group: Option<Ipv4Addr>,
    /// IPv6 multicast group to join.
    #[arg(long)]
    pub group6: Option<Ipv6Addr>,
    /// UDP port of the group.
    #[arg(long, default_value_t = 1338)]
    pub port: u16,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

impl ListenArgs {
    /// The group to join, as a family-agnostic address.
    pub fn group_addr(&self) -> Option<IpAddr> {
        self.group
            .map(IpAddr::V4)
            .or(self.group6.map(IpAddr::V6))
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Gateway receive address.
    #[arg(long)]
    pub to: IpAddr,
    /// Gateway receive port.
    #[arg(long, default_value_t = 1339)]
    pub port: u16,
    /// Frame identifier (decimal, or hex with 0x prefix).
    #[arg(long, value_parser = send::parse_can_id)]
    pub id: u32,
    /// Frame data as hex digits (up to 8 bytes, e.g. deadbeef).
    #[arg(long, default_value = "")]
    pub data: String,
}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}
