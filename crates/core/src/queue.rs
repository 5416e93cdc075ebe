//! Bounded single-producer/single-consumer packet ring
//!
//! The radio receive context owns the [`Producer`] and the relay loop owns the
//! [`Consumer`]. Each side is the only writer of its own index, so no lock is
//! needed: slot contents are written before the index that exposes them is
//! published with a release store.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::types::Packet;

pub struct PacketQueue<const N: usize> {
    slots: [UnsafeCell<Packet>; N],
    /// Next slot to write. Only the producer stores to it.
    head: AtomicUsize,
    /// Next slot to read. Only the consumer stores to it.
    tail: AtomicUsize,
}

// SAFETY: slots are only reached through `Producer` and `Consumer`, which are
// not `Clone`, so each index has exactly one writer. A slot is written by the
// producer only while it is outside `tail..head`, and read by the consumer
// only while it is inside it.
unsafe impl<const N: usize> Sync for PacketQueue<N> {}

impl<const N: usize> PacketQueue<N> {
    const MIN_SLOTS: () = assert!(N >= 2, "packet queue needs at least two slots");

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::MIN_SLOTS;
        Self {
            slots: [const { UnsafeCell::new(Packet::EMPTY) }; N],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Split into the two halves. Buffers are allocated here, never afterwards.
    pub fn split(self) -> (Producer<N>, Consumer<N>) {
        let queue = Arc::new(self);
        (
            Producer { queue: Arc::clone(&queue) },
            Consumer { queue },
        )
    }

    /// Usable capacity; one slot is reserved to tell full from empty.
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (head + N - tail) % N
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const N: usize> Default for PacketQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Write half, owned by the receive context.
pub struct Producer<const N: usize> {
    queue: Arc<PacketQueue<N>>,
}

impl<const N: usize> Producer<N> {
    /// Copies `packet` into the ring. Returns `false` without touching any
    /// state when the ring is full.
    pub fn enqueue(&mut self, packet: &Packet) -> bool {
        let head = self.queue.head.load(Ordering::Relaxed);
        let next = (head + 1) % N;
        if next == self.queue.tail.load(Ordering::Acquire) {
            return false;
        }

        // SAFETY: `head` is outside `tail..head`, the consumer will not read it
        // until the store below.
        unsafe {
            *self.queue.slots[head].get() = *packet;
        }
        self.queue.head.store(next, Ordering::Release);
        true
    }

    pub fn is_full(&self) -> bool {
        let head = self.queue.head.load(Ordering::Relaxed);
        (head + 1) % N == self.queue.tail.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

/// Read half, owned by the relay loop.
pub struct Consumer<const N: usize> {
    queue: Arc<PacketQueue<N>>,
}

impl<const N: usize> Consumer<N> {
    pub fn dequeue(&mut self) -> Option<Packet> {
        let tail = self.queue.tail.load(Ordering::Relaxed);
        if tail == self.queue.head.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: the acquire load above makes the producer's write to this
        // slot visible, and it will not write here again until `tail` moves.
        let packet = unsafe { *self.queue.slots[tail].get() };
        self.queue.tail.store((tail + 1) % N, Ordering::Release);
        Some(packet)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}
