//! ESP-NOW radio layer for the serial bridge

use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use espnow_bridge_core::{MacAddress, MAX_PAYLOAD_LEN};

pub mod peers;
pub mod receive;
pub mod simulated;

pub use peers::{PeerInfo, PeerRegistry, MAX_PEERS};
pub use receive::{ReceiveOutcome, RelayReceiver};
pub use simulated::SimulatedRadio;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RadioError {
    #[error("Radio stack initialization failed")]
    InitFailed,

    #[error("Radio not initialized")]
    NotInitialized,

    #[error("Packet too large for radio MTU")]
    PacketTooLarge,

    #[error("Peer table is full")]
    PeerTableFull,

    #[error("Peer {0} is not registered")]
    PeerNotFound(MacAddress),

    #[error("Radio transmission failed")]
    TransmissionFailed,
}

/// Called by the radio stack for every inbound packet.
///
/// Runs in the receive context: implementations must return quickly, must not
/// block and must not allocate.
pub trait ReceiveCallback: Send + 'static {
    fn on_receive(&mut self, source: MacAddress, data: &[u8]);
}

/// Operations the bridge needs from the radio stack.
#[async_trait]
pub trait RadioDriver: Send + Sync {
    /// Bring the stack up and install the receive callback.
    async fn init(&self, callback: Box<dyn ReceiveCallback>) -> Result<(), RadioError>;

    /// Add a peer to the stack's own peer table.
    async fn add_peer(&self, peer: &PeerInfo) -> Result<(), RadioError>;

    /// Queue `data` for transmission to `peer`.
    async fn send(&self, peer: MacAddress, data: &[u8]) -> Result<(), RadioError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub mtu: usize,
    pub packet_loss: f32,
    pub latency: Duration,
    pub latency_jitter: Duration,
    pub max_peers: usize,
    /// Echo every transmitted frame back as if the destination had answered.
    pub loopback: bool,
    /// Make `init` fail, for exercising the startup fault path.
    pub fail_init: bool,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            mtu: MAX_PAYLOAD_LEN,
            packet_loss: 0.0,
            latency: Duration::from_millis(2),
            latency_jitter: Duration::from_millis(1),
            max_peers: MAX_PEERS,
            loopback: false,
            fail_init: false,
        }
    }
}

impl RadioConfig {
    /// Every send comes straight back from the destination. Handy for bench
    /// testing a host without a second board.
    pub fn loopback() -> Self {
        Self {
            loopback: true,
            ..Default::default()
        }
    }

    /// Crowded 2.4 GHz band
    pub fn congested() -> Self {
        Self {
            packet_loss: 0.2,
            latency: Duration::from_millis(15),
            latency_jitter: Duration::from_millis(10),
            ..Default::default()
        }
    }
}
