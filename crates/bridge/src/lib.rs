//! host-link protocol engine for the ESP-NOW serial bridge
//!
//! Inbound radio packets are relayed to the host as `RX:` frames; host lines
//! are parsed into commands and answered with one status line each.

use std::path::Path;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

use espnow_bridge_radio::{RadioConfig, RadioError};

pub mod codec;
pub mod command;
pub mod engine;
pub mod framing;

pub use codec::{HostLine, HostLineCodec};
pub use command::{Command, CommandError, ErrorCode, Reply};
pub use engine::{Bridge, BridgeEngine};
pub use framing::encode_rx_frame;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Radio initialization failed: {0}")]
    RadioInit(#[source] RadioError),

    #[error("Bridge already started")]
    AlreadyStarted,

    #[error("Host link error: {0}")]
    Link(#[from] LinesCodecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Longer host lines are discarded without a reply.
    pub max_line_length: usize,
    /// TCP address serving the host link. `None` uses stdin/stdout.
    pub listen: Option<String>,
    pub radio: RadioConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_line_length: 512,
            listen: None,
            radio: RadioConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Reads a JSON config file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(text)?)
    }
}
