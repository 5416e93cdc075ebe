//! Text framing of radio packets for the host link

use base64::engine::general_purpose::STANDARD;
use base64::{DecodeError, Engine as _};

use espnow_bridge_core::Packet;

pub const RX_PREFIX: &str = "RX:";
pub const FIELD_SEPARATOR: char = '|';

/// `RX:<AA:BB:CC:DD:EE:FF>|<length>|<base64>`, without the line terminator.
pub fn encode_rx_frame(packet: &Packet) -> String {
    format!(
        "{}{}{}{}{}{}",
        RX_PREFIX,
        packet.source(),
        FIELD_SEPARATOR,
        packet.len(),
        FIELD_SEPARATOR,
        encode_payload(packet.payload())
    )
}

/// Standard alphabet, padded, no line wrapping.
pub fn encode_payload(payload: &[u8]) -> String {
    STANDARD.encode(payload)
}

pub fn decode_payload(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD.decode(encoded)
}
