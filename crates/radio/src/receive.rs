//! Receive handler: the producer side of the packet queue

use std::sync::Arc;
use log::trace;
use tokio::sync::Notify;

use espnow_bridge_core::{MacAddress, Packet, Producer, Statistics};

use crate::ReceiveCallback;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Queued,
    Oversized,
    QueueFull,
}

/// Copies inbound radio packets into the queue and wakes the relay loop.
pub struct RelayReceiver<const N: usize> {
    producer: Producer<N>,
    stats: Arc<Statistics>,
    wake: Arc<Notify>,
}

impl<const N: usize> RelayReceiver<N> {
    pub fn new(producer: Producer<N>, stats: Arc<Statistics>, wake: Arc<Notify>) -> Self {
        Self { producer, stats, wake }
    }

    pub fn handle(&mut self, source: MacAddress, data: &[u8]) -> ReceiveOutcome {
        self.stats.record_received();

        let packet = match Packet::new(source, data) {
            Ok(packet) => packet,
            Err(_) => {
                self.stats.record_dropped();
                trace!("Dropping {} byte packet from {}: oversized", data.len(), source);
                return ReceiveOutcome::Oversized;
            }
        };

        if !self.producer.enqueue(&packet) {
            self.stats.record_dropped();
            trace!("Dropping packet from {}: queue full", source);
            return ReceiveOutcome::QueueFull;
        }

        self.wake.notify_one();
        ReceiveOutcome::Queued
    }
}

impl<const N: usize> ReceiveCallback for RelayReceiver<N> {
    fn on_receive(&mut self, source: MacAddress, data: &[u8]) {
        self.handle(source, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use espnow_bridge_core::{PacketQueue, MAX_PAYLOAD_LEN};

    #[test]
    fn test_drops_are_counted() {
        let stats = Arc::new(Statistics::new());
        let wake = Arc::new(Notify::new());
        let (producer, mut consumer) = PacketQueue::<4>::new().split();
        let mut receiver = RelayReceiver::new(producer, stats.clone(), wake);
        let src = MacAddress::new([0x24, 0x6F, 0x28, 0x01, 0x02, 0x03]);

        assert_eq!(receiver.handle(src, &[0u8; MAX_PAYLOAD_LEN + 1]), ReceiveOutcome::Oversized);
        for i in 0..3u8 {
            assert_eq!(receiver.handle(src, &[i]), ReceiveOutcome::Queued);
        }
        assert_eq!(receiver.handle(src, b"late"), ReceiveOutcome::QueueFull);
        assert_eq!(receiver.handle(src, b"later"), ReceiveOutcome::QueueFull);

        let snap = stats.snapshot();
        assert_eq!(snap.received, 6);
        assert_eq!(snap.dropped, 3);
        assert_eq!(snap.sent, 0);

        for i in 0..3u8 {
            let p = consumer.dequeue().unwrap();
            assert_eq!(p.payload(), &[i]);
            assert_eq!(p.source(), src);
        }
        assert!(consumer.dequeue().is_none());
    }

    #[test]
    fn test_max_size_packet_is_kept() {
        let stats = Arc::new(Statistics::new());
        let (producer, mut consumer) = PacketQueue::<4>::new().split();
        let mut receiver = RelayReceiver::new(producer, stats.clone(), Arc::new(Notify::new()));

        receiver.on_receive(MacAddress::default(), &[0x5A; MAX_PAYLOAD_LEN]);

        assert_eq!(consumer.dequeue().unwrap().len(), MAX_PAYLOAD_LEN);
        assert_eq!(stats.snapshot().dropped, 0);
    }

    #[tokio::test]
    async fn test_enqueue_wakes_consumer() {
        let wake = Arc::new(Notify::new());
        let (producer, _consumer) = PacketQueue::<4>::new().split();
        let stats = Arc::new(Statistics::new());
        let mut receiver = RelayReceiver::new(producer, stats, wake.clone());

        receiver.handle(MacAddress::default(), b"hi");

        // notify_one stored a permit, so this completes immediately
        tokio::time::timeout(std::time::Duration::from_secs(1), wake.notified())
            .await
            .expect("wake permit was not stored");
    }
}
