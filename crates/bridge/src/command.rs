//! Host command parsing and status replies
//!
//! Every host line produces exactly one [`Reply`]. Parsing is pure; the engine
//! performs the radio side effects for [`Command::Transmit`].

use std::fmt;
use thiserror::Error;

use espnow_bridge_core::{MacAddress, StatsSnapshot};
use espnow_bridge_radio::RadioError;

use crate::framing::{decode_payload, FIELD_SEPARATOR};

pub const TX_PREFIX: &str = "TX:";
pub const STATS_COMMAND: &str = "STATS";
pub const PING_COMMAND: &str = "ping";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Transmit { peer: MacAddress, payload: Vec<u8> },
    Stats,
    Ping,
}

impl Command {
    /// Parses one trimmed host line. First match wins: `TX:` prefix, then the
    /// exact `STATS` and `ping` keywords.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        if let Some(rest) = line.strip_prefix(TX_PREFIX) {
            return Self::parse_transmit(rest);
        }

        match line {
            STATS_COMMAND => Ok(Command::Stats),
            PING_COMMAND => Ok(Command::Ping),
            _ => Err(CommandError::UnknownCommand),
        }
    }

    fn parse_transmit(rest: &str) -> Result<Self, CommandError> {
        let (address, encoded) = rest
            .split_once(FIELD_SEPARATOR)
            .ok_or(CommandError::InvalidFormat)?;

        let peer: MacAddress = address.parse().map_err(|_| CommandError::InvalidMac)?;

        let payload = decode_payload(encoded).map_err(|_| CommandError::DecodeFail)?;
        if payload.is_empty() {
            return Err(CommandError::DecodeFail);
        }

        Ok(Command::Transmit { peer, payload })
    }
}

/// Error codes of the host-link protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    EspNowInitFail,
    InvalidFormat,
    InvalidMac,
    DecodeFail,
    SendFail,
    UnknownCommand,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::EspNowInitFail => "ESPNOW_INIT_FAIL",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::InvalidMac => "INVALID_MAC",
            ErrorCode::DecodeFail => "DECODE_FAIL",
            ErrorCode::SendFail => "SEND_FAIL",
            ErrorCode::UnknownCommand => "UNKNOWN_CMD",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERR:{}", self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("TX command has no '|' separator")]
    InvalidFormat,

    #[error("Peer address is not six hex byte pairs")]
    InvalidMac,

    #[error("Payload is not valid base64 or decodes to nothing")]
    DecodeFail,

    #[error("Radio rejected send: {0}")]
    SendFail(#[source] RadioError),

    #[error("Unknown command")]
    UnknownCommand,
}

impl CommandError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CommandError::InvalidFormat => ErrorCode::InvalidFormat,
            CommandError::InvalidMac => ErrorCode::InvalidMac,
            CommandError::DecodeFail => ErrorCode::DecodeFail,
            CommandError::SendFail(_) => ErrorCode::SendFail,
            CommandError::UnknownCommand => ErrorCode::UnknownCommand,
        }
    }
}

/// Single status line sent back for a host command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Pong,
    Stats(StatsSnapshot),
    Error(ErrorCode),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => f.write_str("OK"),
            Reply::Pong => f.write_str("pong"),
            Reply::Stats(snapshot) => write!(f, "{}", snapshot),
            Reply::Error(code) => write!(f, "{}", code),
        }
    }
}

impl From<CommandError> for Reply {
    fn from(err: CommandError) -> Self {
        Reply::Error(err.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_for(line: &str) -> String {
        match Command::parse(line) {
            Ok(cmd) => format!("{:?}", cmd),
            Err(e) => Reply::from(e).to_string(),
        }
    }

    #[test]
    fn test_parse_transmit() {
        let cmd = Command::parse("TX:AA:BB:CC:DD:EE:FF|AQID").unwrap();
        assert_eq!(
            cmd,
            Command::Transmit {
                peer: MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
                payload: vec![1, 2, 3],
            }
        );
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(Command::parse("STATS"), Ok(Command::Stats));
        assert_eq!(Command::parse("ping"), Ok(Command::Ping));
    }

    #[test]
    fn test_malformed_transmit() {
        assert_eq!(reply_for("TX:AA:BB:CC:DD:EE:FFnoSeparator"), "ERR:INVALID_FORMAT");
        assert_eq!(reply_for("TX:ZZ:ZZ:ZZ:ZZ:ZZ:ZZ|AAAA"), "ERR:INVALID_MAC");
        assert_eq!(reply_for("TX:AA:BB:CC:DD:EE:FF|not-base64!!"), "ERR:DECODE_FAIL");
        assert_eq!(reply_for("TX:AA:BB:CC:DD:EE:FF|"), "ERR:DECODE_FAIL");
        assert_eq!(reply_for("TX:|AAAA"), "ERR:INVALID_MAC");
        assert_eq!(reply_for("TX:"), "ERR:INVALID_FORMAT");
    }

    #[test]
    fn test_address_checked_before_payload() {
        assert_eq!(reply_for("TX:AA:BB:CC:DD:EE|not-base64!!"), "ERR:INVALID_MAC");
        assert_eq!(reply_for("TX:AA-BB-CC-DD-EE-FF|AAAA"), "ERR:INVALID_MAC");
    }

    #[test]
    fn test_payload_is_everything_after_first_separator() {
        // A second separator lands in the payload field and fails decoding
        assert_eq!(reply_for("TX:AA:BB:CC:DD:EE:FF|AAAA|AAAA"), "ERR:DECODE_FAIL");
    }

    #[test]
    fn test_unknown_commands() {
        for line in ["", "PING", "stats", "STATS ", "pingx", "tx:AA:BB:CC:DD:EE:FF|AAAA", "RX:1"] {
            assert_eq!(reply_for(line), "ERR:UNKNOWN_CMD", "line {line:?}");
        }
    }

    #[test]
    fn test_reply_lines() {
        assert_eq!(Reply::Ok.to_string(), "OK");
        assert_eq!(Reply::Pong.to_string(), "pong");
        assert_eq!(
            Reply::Stats(StatsSnapshot { received: 5, sent: 3, dropped: 2 }).to_string(),
            "RX:5 TX:3 DROP:2"
        );
        assert_eq!(Reply::Error(ErrorCode::EspNowInitFail).to_string(), "ERR:ESPNOW_INIT_FAIL");
        assert_eq!(
            Reply::from(CommandError::SendFail(RadioError::TransmissionFailed)).to_string(),
            "ERR:SEND_FAIL"
        );
    }
}
