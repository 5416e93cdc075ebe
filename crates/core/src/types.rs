use std::fmt;
use std::str::FromStr;

use crate::PacketError;

/// Largest payload a single ESP-NOW frame can carry.
pub const MAX_PAYLOAD_LEN: usize = 250;

/// Ring slots in the default packet queue. One slot stays unused.
pub const DEFAULT_QUEUE_SLOTS: usize = 4;

/// 6-byte radio hardware address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({})", self)
    }
}

impl FromStr for MacAddress {
    type Err = PacketError;

    /// Accepts exactly six `:`-separated fields of two hex digits each.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PacketError::InvalidAddress(s.to_string());

        let mut bytes = [0u8; 6];
        let mut fields = s.split(':');
        for byte in bytes.iter_mut() {
            let field = fields.next().ok_or_else(invalid)?;
            if field.len() != 2 || !field.bytes().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(field, 16).map_err(|_| invalid())?;
        }
        if fields.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(bytes))
    }
}

/// A radio message captured for relay to the host.
///
/// Fixed-size so it can be copied through the queue without allocating.
#[derive(Clone, Copy)]
pub struct Packet {
    source: MacAddress,
    len: u8,
    data: [u8; MAX_PAYLOAD_LEN],
}

impl Packet {
    pub const EMPTY: Packet = Packet {
        source: MacAddress([0; 6]),
        len: 0,
        data: [0; MAX_PAYLOAD_LEN],
    };

    pub fn new(source: MacAddress, payload: &[u8]) -> Result<Self, PacketError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(PacketError::PayloadTooLarge(payload.len()));
        }

        let mut packet = Self::EMPTY;
        packet.source = source;
        packet.len = payload.len() as u8;
        packet.data[..payload.len()].copy_from_slice(payload);
        Ok(packet)
    }

    pub fn source(&self) -> MacAddress {
        self.source
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len()]
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.payload() == other.payload()
    }
}

impl Eq for Packet {}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("source", &self.source)
            .field("len", &self.len)
            .field("payload", &self.payload())
            .finish()
    }
}
