//! Lock-free single-producer single-consumer byte ring
//!
//! The edge decoder thread writes packet records into the ring and the
//! monitor loop drains them, with no lock on either side. Capacity must be a
//! power of two; one slot is kept empty to distinguish full from empty, so a
//! ring of capacity N holds at most N-1 bytes.
//!
//! Index discipline: the producer owns `write`, the consumer owns `read`.
//! Each side publishes its index with a Release store after touching slot
//! data and observes the other side's index with an Acquire load. Slot bytes
//! themselves use relaxed atomics; the index handoff orders them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

struct Shared {
    slots: Box<[AtomicU8]>,
    mask: usize,
    write: AtomicUsize,
    read: AtomicUsize,
    overflow: AtomicUsize,
}

impl Shared {
    #[inline]
    fn len_from(&self, write: usize, read: usize) -> usize {
        write.wrapping_sub(read) & self.mask
    }
}

/// Write half of the ring. Not `Clone`; exactly one thread may hold it.
pub struct Producer {
    shared: Arc<Shared>,
}

/// Read half of the ring. Not `Clone`; exactly one thread may hold it.
pub struct Consumer {
    shared: Arc<Shared>,
}

/// Create a ring buffer with the given power-of-two capacity.
///
/// # Panics
///
/// Panics if `capacity` is not a power of two or is smaller than 2.
pub fn ring_buffer(capacity: usize) -> (Producer, Consumer) {
    assert!(
        capacity.is_power_of_two() && capacity >= 2,
        "ring capacity must be a power of two, got {capacity}"
    );
    let slots: Box<[AtomicU8]> = (0..capacity).map(|_| AtomicU8::new(0)).collect();
    let shared = Arc::new(Shared {
        slots,
        mask: capacity - 1,
        write: AtomicUsize::new(0),
        read: AtomicUsize::new(0),
        overflow: AtomicUsize::new(0),
    });
    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

impl Producer {
    /// Bytes that can be pushed right now.
    pub fn free(&self) -> usize {
        let write = self.shared.write.load(Ordering::Relaxed);
        let read = self.shared.read.load(Ordering::Acquire);
        self.shared.mask - self.shared.len_from(write, read)
    }

    /// Usable capacity of the ring (one less than the slot count).
    pub fn capacity(&self) -> usize {
        self.shared.mask
    }

    /// Push one byte. Returns false and counts an overflow if the ring is
    /// full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.free() == 0 {
            self.shared.overflow.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let write = self.shared.write.load(Ordering::Relaxed);
        self.shared.slots[write & self.shared.mask].store(byte, Ordering::Relaxed);
        self.shared
            .write
            .store(write.wrapping_add(1), Ordering::Release);
        true
    }

    /// Push as much of a slice as fits; returns how many bytes were
    /// written. Dropped bytes are counted as overflows. Callers that must
    /// not tear a record check `free()` first.
    pub fn push_slice(&mut self, data: &[u8]) -> usize {
        let count = self.free().min(data.len());
        let mut write = self.shared.write.load(Ordering::Relaxed);
        for &byte in &data[..count] {
            self.shared.slots[write & self.shared.mask].store(byte, Ordering::Relaxed);
            write = write.wrapping_add(1);
        }
        self.shared.write.store(write, Ordering::Release);
        if count < data.len() {
            self.shared
                .overflow
                .fetch_add(data.len() - count, Ordering::Relaxed);
        }
        count
    }

    pub fn is_full(&self) -> bool {
        self.free() == 0
    }

    /// Number of failed pushes since the ring was created.
    pub fn overflow_count(&self) -> usize {
        self.shared.overflow.load(Ordering::Relaxed)
    }
}

impl Consumer {
    /// Bytes available to pop.
    pub fn len(&self) -> usize {
        let write = self.shared.write.load(Ordering::Acquire);
        let read = self.shared.read.load(Ordering::Relaxed);
        self.shared.len_from(write, read)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pop one byte.
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let read = self.shared.read.load(Ordering::Relaxed);
        let byte = self.shared.slots[read & self.shared.mask].load(Ordering::Relaxed);
        self.shared
            .read
            .store(read.wrapping_add(1), Ordering::Release);
        Some(byte)
    }

    /// Pop up to `out.len()` bytes; returns how many were written.
    pub fn pop_slice(&mut self, out: &mut [u8]) -> usize {
        let count = self.len().min(out.len());
        let mut read = self.shared.read.load(Ordering::Relaxed);
        for slot in out.iter_mut().take(count) {
            *slot = self.shared.slots[read & self.shared.mask].load(Ordering::Relaxed);
            read = read.wrapping_add(1);
        }
        self.shared.read.store(read, Ordering::Release);
        count
    }

    /// Read the byte `offset` positions past the read index without
    /// consuming it.
    pub fn peek(&self, offset: usize) -> Option<u8> {
        if offset >= self.len() {
            return None;
        }
        let read = self.shared.read.load(Ordering::Relaxed);
        Some(
            self.shared.slots[read.wrapping_add(offset) & self.shared.mask]
                .load(Ordering::Relaxed),
        )
    }

    /// Discard everything currently buffered by catching the read index up
    /// to the write index.
    pub fn reset(&mut self) {
        let write = self.shared.write.load(Ordering::Acquire);
        self.shared.read.store(write, Ordering::Release);
    }

    /// Usable capacity of the ring (one less than the slot count).
    pub fn capacity(&self) -> usize {
        self.shared.mask
    }

    /// Number of failed pushes since the ring was created.
    pub fn overflow_count(&self) -> usize {
        self.shared.overflow.load(Ordering::Relaxed)
    }
}
