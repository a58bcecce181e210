//! Command line interface for the `station-link` binary.
//!
//! This file is also compiled by the build script to render the man page, so
//! it depends on nothing but `clap` and the standard library.

use std::{num::ParseIntError, path::PathBuf};

use clap::{Args, Parser, Subcommand};

/// Command line arguments for the `station-link` binary.
#[derive(Debug, Parser)]
#[command(
    name = "station-link",
    version,
    about = "Talk to a badge infrared transceiver over its serial link"
)]
pub struct Cli {
    #[command(flatten)]
    pub link: LinkArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options describing the serial link.
#[derive(Debug, Args)]
pub struct LinkArgs {
    /// Serial port the transceiver is attached to.
    #[arg(short, long, env = "STATION_LINK_PORT")]
    pub port: PathBuf,

    /// Baud rate of the serial port.
    #[arg(short, long, default_value_t = 115_200)]
    pub baud: u32,

    /// Milliseconds one attempt waits for its response.
    #[arg(long, default_value_t = 3000)]
    pub wait_ms: u64,

    /// Attempts made per request.
    #[arg(long, default_value_t = 3)]
    pub attempts: u32,

    /// Serialise reads and writes for transceivers without full duplex.
    #[arg(long)]
    pub half_duplex: bool,
}

/// Operation to perform.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Queue a hex-encoded payload for infrared transmission.
    Send {
        /// Payload bytes such as `01ab03`.
        #[arg(value_parser = parse_hex)]
        payload: HexPayload,

        /// Address the badge's cross board.
        #[arg(long)]
        cross_board: bool,
    },
    /// Fetch one payload received by the badge.
    Retrieve,
    /// Query whether the badge can receive.
    Status,
    /// Print text on the badge display.
    Display {
        text: String,
    },
    /// Print payloads popped by the badge until interrupted.
    Listen,
}

/// Bytes parsed from a hexadecimal argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HexPayload(pub Vec<u8>);

/// Parse a string of hex digit pairs, ignoring `:` and `-` separators.
///
/// # Errors
///
/// Returns a message for an odd digit count or a non-hex digit.
pub fn parse_hex(value: &str) -> Result<HexPayload, String> {
    let digits: String = value
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | ' '))
        .collect();
    if !digits.is_ascii() {
        return Err(format!("non-hex characters in {value:?}"));
    }
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in {value:?}"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
        .collect::<Result<Vec<_>, ParseIntError>>()
        .map(HexPayload)
        .map_err(|err| format!("invalid hex payload {value:?}: {err}"))
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rstest::rstest;

    use super::*;

    #[test]
    fn parses_send_with_link_options() {
        let cli = Cli::parse_from([
            "station-link",
            "--port",
            "/dev/ttyUSB0",
            "--half-duplex",
            "send",
            "010203",
            "--cross-board",
        ]);
        assert_eq!(cli.link.port, PathBuf::from("/dev/ttyUSB0"));
        assert!(cli.link.half_duplex);
        assert_eq!(cli.link.attempts, 3);
        match cli.command {
            Command::Send {
                payload,
                cross_board,
            } => {
                assert_eq!(payload, HexPayload(vec![1, 2, 3]));
                assert!(cross_board);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[rstest]
    #[case("", vec![])]
    #[case("ff", vec![0xFF])]
    #[case("de:ad-be ef", vec![0xDE, 0xAD, 0xBE, 0xEF])]
    fn parses_hex(#[case] input: &str, #[case] expected: Vec<u8>) {
        assert_eq!(parse_hex(input), Ok(HexPayload(expected)));
    }

    #[rstest]
    #[case("abc")]
    #[case("zz")]
    #[case("é1")]
    fn rejects_bad_hex(#[case] input: &str) {
        assert!(parse_hex(input).is_err());
    }
}
