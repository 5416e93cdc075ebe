//! core data types for the ESP-NOW serial bridge

use thiserror::Error;

pub mod queue;
pub mod stats;
pub mod types;

pub use queue::{Consumer, PacketQueue, Producer};
pub use stats::{Statistics, StatsSnapshot};
pub use types::{MacAddress, Packet, DEFAULT_QUEUE_SLOTS, MAX_PAYLOAD_LEN};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("Payload of {0} bytes exceeds the radio frame size")]
    PayloadTooLarge(usize),

    #[error("Invalid hardware address: {0:?}")]
    InvalidAddress(String),
}
