//! Simulated ESP-NOW radio for running the bridge without hardware

use std::sync::{Arc, Mutex as SyncMutex};
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::sleep;
use rand::Rng;
use log::{debug, trace, warn};

use espnow_bridge_core::MacAddress;

use crate::{PeerInfo, RadioConfig, RadioDriver, RadioError, ReceiveCallback};

type SharedCallback = Arc<SyncMutex<Option<Box<dyn ReceiveCallback>>>>;

pub struct SimulatedRadio {
    config: RadioConfig,
    // Plain mutex: `inject` is called from synchronous receive contexts.
    callback: SharedCallback,
    peers: Mutex<Vec<PeerInfo>>,
    stats: Arc<Mutex<RadioStats>>,
}

#[derive(Debug, Default)]
struct RadioStats {
    packets_sent: u64,
    packets_lost: u64,
    bytes_sent: u64,
}

impl SimulatedRadio {
    pub fn new(config: RadioConfig) -> Self {
        Self {
            config,
            callback: Arc::new(SyncMutex::new(None)),
            peers: Mutex::new(Vec::new()),
            stats: Arc::new(Mutex::new(RadioStats::default())),
        }
    }

    /// Deliver an inbound packet to the installed receive callback, as the
    /// radio stack would on arrival. Returns `false` before `init`.
    pub fn inject(&self, source: MacAddress, data: &[u8]) -> bool {
        deliver(&self.callback, source, data)
    }

    fn airtime(&self) -> Duration {
        let jitter_ms = self.config.latency_jitter.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };
        self.config.latency + jitter
    }

    async fn simulate_channel(&self, to: MacAddress, data: &[u8]) -> Result<(), RadioError> {
        if data.len() > self.config.mtu {
            return Err(RadioError::PacketTooLarge);
        }

        let airtime = self.airtime();
        sleep(airtime).await;

        let drop_packet = {
            let mut rng = rand::rng();
            rng.random::<f32>() < self.config.packet_loss
        };

        if drop_packet {
            let mut stats = self.stats.lock().await;
            stats.packets_lost += 1;
            debug!("Simulated packet loss to {}", to);
            return Err(RadioError::TransmissionFailed);
        }

        let mut stats = self.stats.lock().await;
        stats.packets_sent += 1;
        stats.bytes_sent += data.len() as u64;

        if self.config.loopback {
            let callback = Arc::clone(&self.callback);
            let echo = data.to_vec();
            tokio::spawn(async move {
                sleep(airtime).await;
                deliver(&callback, to, &echo);
            });
        }

        Ok(())
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.lock().await.len()
    }

    /// `(packets_sent, packets_lost, bytes_sent)`
    pub async fn get_stats(&self) -> (u64, u64, u64) {
        let stats = self.stats.lock().await;
        (stats.packets_sent, stats.packets_lost, stats.bytes_sent)
    }
}

fn deliver(callback: &SharedCallback, source: MacAddress, data: &[u8]) -> bool {
    let mut guard = match callback.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match guard.as_mut() {
        Some(cb) => {
            cb.on_receive(source, data);
            true
        }
        None => {
            warn!("Radio not initialized, discarding packet from {}", source);
            false
        }
    }
}

#[async_trait]
impl RadioDriver for SimulatedRadio {
    async fn init(&self, callback: Box<dyn ReceiveCallback>) -> Result<(), RadioError> {
        if self.config.fail_init {
            return Err(RadioError::InitFailed);
        }

        let mut guard = self.callback.lock().map_err(|_| RadioError::InitFailed)?;
        *guard = Some(callback);
        debug!(
            "Simulated radio up (mtu {}, loss {:.2})",
            self.config.mtu, self.config.packet_loss
        );
        Ok(())
    }

    async fn add_peer(&self, peer: &PeerInfo) -> Result<(), RadioError> {
        let mut peers = self.peers.lock().await;
        if peers.iter().any(|p| p.address == peer.address) {
            return Ok(());
        }
        if peers.len() >= self.config.max_peers {
            return Err(RadioError::PeerTableFull);
        }
        peers.push(*peer);
        Ok(())
    }

    async fn send(&self, peer: MacAddress, data: &[u8]) -> Result<(), RadioError> {
        let initialized = self
            .callback
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false);
        if !initialized {
            return Err(RadioError::NotInitialized);
        }

        if !peer.is_broadcast() {
            let peers = self.peers.lock().await;
            if !peers.iter().any(|p| p.address == peer) {
                return Err(RadioError::PeerNotFound(peer));
            }
        }

        trace!("Simulating radio transmission of {} bytes to {}", data.len(), peer);
        self.simulate_channel(peer, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collect(Arc<SyncMutex<Vec<(MacAddress, Vec<u8>)>>>);

    impl ReceiveCallback for Collect {
        fn on_receive(&mut self, source: MacAddress, data: &[u8]) {
            self.0.lock().unwrap().push((source, data.to_vec()));
        }
    }

    fn quiet_config() -> RadioConfig {
        RadioConfig {
            latency: Duration::ZERO,
            latency_jitter: Duration::ZERO,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_mtu_enforcement() {
        let radio = SimulatedRadio::new(quiet_config());
        let seen = Arc::new(SyncMutex::new(Vec::new()));
        radio.init(Box::new(Collect(seen))).await.unwrap();

        let peer = MacAddress::new([2, 0, 0, 0, 0, 1]);
        radio.add_peer(&PeerInfo::unencrypted(peer)).await.unwrap();

        let result = radio.send(peer, &[0u8; 251]).await;
        assert!(matches!(result, Err(RadioError::PacketTooLarge)));

        let result = radio.send(peer, &[0u8; 250]).await;
        assert!(result.is_ok());
        assert_eq!(radio.get_stats().await, (1, 0, 250));
    }

    #[tokio::test]
    async fn test_send_requires_init_and_peer() {
        let radio = SimulatedRadio::new(quiet_config());
        let peer = MacAddress::new([2, 0, 0, 0, 0, 1]);

        assert_eq!(radio.send(peer, b"x").await, Err(RadioError::NotInitialized));

        let seen = Arc::new(SyncMutex::new(Vec::new()));
        radio.init(Box::new(Collect(seen))).await.unwrap();
        assert_eq!(radio.send(peer, b"x").await, Err(RadioError::PeerNotFound(peer)));
        assert!(radio.send(MacAddress::BROADCAST, b"x").await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_init() {
        let radio = SimulatedRadio::new(RadioConfig {
            fail_init: true,
            ..quiet_config()
        });
        let seen = Arc::new(SyncMutex::new(Vec::new()));
        assert_eq!(radio.init(Box::new(Collect(seen))).await, Err(RadioError::InitFailed));
        assert!(!radio.inject(MacAddress::default(), b"x"));
    }

    #[tokio::test]
    async fn test_peer_limit() {
        let radio = SimulatedRadio::new(RadioConfig {
            max_peers: 1,
            ..quiet_config()
        });
        let a = PeerInfo::unencrypted(MacAddress::new([1; 6]));
        let b = PeerInfo::unencrypted(MacAddress::new([2; 6]));

        radio.add_peer(&a).await.unwrap();
        radio.add_peer(&a).await.unwrap();
        assert_eq!(radio.add_peer(&b).await, Err(RadioError::PeerTableFull));
        assert_eq!(radio.peer_count().await, 1);
    }

    #[tokio::test]
    async fn test_total_loss() {
        let radio = SimulatedRadio::new(RadioConfig {
            packet_loss: 1.0,
            ..quiet_config()
        });
        let seen = Arc::new(SyncMutex::new(Vec::new()));
        radio.init(Box::new(Collect(seen))).await.unwrap();

        let result = radio.send(MacAddress::BROADCAST, b"gone").await;
        assert_eq!(result, Err(RadioError::TransmissionFailed));
        assert_eq!(radio.get_stats().await, (0, 1, 0));
    }

    #[tokio::test]
    async fn test_loopback_and_inject() {
        let radio = SimulatedRadio::new(RadioConfig {
            loopback: true,
            ..quiet_config()
        });
        let seen = Arc::new(SyncMutex::new(Vec::new()));
        radio.init(Box::new(Collect(seen.clone()))).await.unwrap();

        let peer = MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        radio.add_peer(&PeerInfo::unencrypted(peer)).await.unwrap();
        radio.send(peer, b"echo").await.unwrap();

        for _ in 0..100 {
            if !seen.lock().unwrap().is_empty() {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert!(radio.inject(MacAddress::default(), b"direct"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], (peer, b"echo".to_vec()));
        assert_eq!(seen[1], (MacAddress::default(), b"direct".to_vec()));
    }
}
