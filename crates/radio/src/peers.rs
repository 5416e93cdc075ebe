//! Registry of peers the bridge has configured for transmission

use heapless::Vec as BoundedVec;
use log::debug;

use espnow_bridge_core::MacAddress;

use crate::{RadioDriver, RadioError};

/// ESP-NOW limit for unencrypted peers.
pub const MAX_PEERS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerInfo {
    pub address: MacAddress,
    /// 0 means "whatever channel the station is on".
    pub channel: u8,
    pub encrypt: bool,
}

impl PeerInfo {
    /// Current channel, no link-layer encryption.
    pub fn unencrypted(address: MacAddress) -> Self {
        Self {
            address,
            channel: 0,
            encrypt: false,
        }
    }
}

/// Flat set of known peers. Entries are never removed.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: BoundedVec<PeerInfo, MAX_PEERS>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, address: &MacAddress) -> bool {
        self.peers.iter().any(|p| p.address == *address)
    }

    /// Registers `address` with the radio unless it is already known.
    ///
    /// Returns `Ok(true)` when a new peer was added and `Ok(false)` when it was
    /// already present.
    pub async fn register(
        &mut self,
        address: MacAddress,
        radio: &dyn RadioDriver,
    ) -> Result<bool, RadioError> {
        if self.is_registered(&address) {
            return Ok(false);
        }
        if self.peers.is_full() {
            return Err(RadioError::PeerTableFull);
        }

        let info = PeerInfo::unencrypted(address);
        radio.add_peer(&info).await?;
        self.peers
            .push(info)
            .map_err(|_| RadioError::PeerTableFull)?;

        debug!("Registered peer {} ({} known)", address, self.peers.len());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerInfo> {
        self.peers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReceiveCallback;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRadio {
        added: Mutex<Vec<PeerInfo>>,
        reject: bool,
    }

    #[async_trait]
    impl RadioDriver for RecordingRadio {
        async fn init(&self, _callback: Box<dyn ReceiveCallback>) -> Result<(), RadioError> {
            Ok(())
        }

        async fn add_peer(&self, peer: &PeerInfo) -> Result<(), RadioError> {
            if self.reject {
                return Err(RadioError::PeerTableFull);
            }
            self.added.lock().unwrap().push(*peer);
            Ok(())
        }

        async fn send(&self, _peer: MacAddress, _data: &[u8]) -> Result<(), RadioError> {
            Ok(())
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let radio = RecordingRadio::default();
        let mut registry = PeerRegistry::new();
        let addr = MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

        assert!(!registry.is_registered(&addr));
        assert_eq!(tokio_test::block_on(registry.register(addr, &radio)), Ok(true));
        assert_eq!(tokio_test::block_on(registry.register(addr, &radio)), Ok(false));

        assert!(registry.is_registered(&addr));
        assert_eq!(registry.len(), 1);

        let added = radio.added.lock().unwrap();
        assert_eq!(added.as_slice(), &[PeerInfo::unencrypted(addr)]);
        assert_eq!(added[0].channel, 0);
        assert!(!added[0].encrypt);
    }

    #[test]
    fn test_table_exhaustion_is_an_error() {
        let radio = RecordingRadio::default();
        let mut registry = PeerRegistry::new();

        for i in 0..MAX_PEERS as u8 {
            let addr = MacAddress::new([0x10, 0, 0, 0, 0, i]);
            assert_eq!(tokio_test::block_on(registry.register(addr, &radio)), Ok(true));
        }

        let overflow = MacAddress::new([0x20, 0, 0, 0, 0, 0]);
        assert_eq!(
            tokio_test::block_on(registry.register(overflow, &radio)),
            Err(RadioError::PeerTableFull)
        );
        assert_eq!(registry.len(), MAX_PEERS);
    }

    #[test]
    fn test_driver_rejection_leaves_registry_unchanged() {
        let radio = RecordingRadio {
            reject: true,
            ..Default::default()
        };
        let mut registry = PeerRegistry::new();
        let addr = MacAddress::new([1, 2, 3, 4, 5, 6]);

        assert!(tokio_test::block_on(registry.register(addr, &radio)).is_err());
        assert!(registry.is_empty());
    }
}
