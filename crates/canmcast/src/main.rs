mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "canmcast", version, about = "CAN ↔ UDP multicast gateway")]
struct Cli {
    /// Output format for printed frames.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bridge_subcommand() {
        let cli = Cli::try_parse_from([
            "canmcast",
            "bridge",
            "--can-interface",
            "vcan0",
            "--group",
            "224.0.0.1",
        ])
        .expect("bridge args should parse");

        let Command::Bridge(args) = cli.command else {
            panic!("expected bridge subcommand");
        };
        assert_eq!(args.can_interface, "vcan0");
        assert_eq!(args.group, Some("224.0.0.1".parse().unwrap()));
        assert_eq!(args.group_port, 1338);
        assert_eq!(args.bind_port, 1339);
    }

    #[test]
    fn parses_dual_family_bridge() {
        let cli = Cli::try_parse_from([
            "canmcast",
            "bridge",
            "--group",
            "239.0.0.1",
            "--group6",
            "ff02::1",
        ])
        .expect("dual-family args should parse");
        assert!(matches!(cli.command, Command::Bridge(_)));
    }

    #[test]
    fn rejects_invalid_group_address() {
        let err = Cli::try_parse_from(["canmcast", "bridge", "--group", "not-an-address"])
            .expect_err("bad address should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_send_subcommand_with_hex_id() {
        let cli = Cli::try_parse_from([
            "canmcast",
            "send",
            "--to",
            "192.168.1.10",
            "--id",
            "0x123",
            "--data",
            "010203",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send subcommand");
        };
        assert_eq!(args.id, 0x123);
        assert_eq!(args.port, 1339);
    }

    #[test]
    fn listen_rejects_both_families() {
        let err = Cli::try_parse_from([
            "canmcast",
            "listen",
            "--group",
            "224.0.0.1",
            "--group6",
            "ff02::1",
        ])
        .expect_err("conflicting groups should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
