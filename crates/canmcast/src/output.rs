use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use serde::Serialize;

use canmcast_frame::{encode_frame, CanFrame};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput {
    id: String,
    dlc: u8,
    data: String,
    source: String,
    timestamp: u64,
}

pub fn print_frame(frame: &CanFrame, source: SocketAddr, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                id: format!("{:#x}", frame.id()),
                dlc: frame.dlc(),
                data: hex_string(frame.data()),
                source: source.to_string(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Pretty => {
            println!("{source}  {frame}");
        }
        OutputFormat::Raw => {
            print_raw(&encode_frame(frame));
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn hex_string(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_string_concatenates_bytes() {
        assert_eq!(hex_string(&[0xde, 0xad, 0x01]), "dead01");
        assert_eq!(hex_string(&[]), "");
    }
}
