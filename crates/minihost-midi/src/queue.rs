//! Lock-free SPSC ring buffer for MIDI events.
//!
//! MIDI input thread → [`MidiQueueProducer`] → slots → [`MidiQueueConsumer`] → audio thread.
//!
//! The two cursors are the only synchronization: the producer publishes the
//! write cursor with `Release` after the slot write, the consumer observes it
//! with `Acquire` before the slot read, and the read cursor mirrors that in the
//! other direction. One slot is always left empty so `read == write` means
//! empty and `write + 1 == read` means full.

use crate::event::MidiEvent;
use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Slot count used when a capacity of 0 is requested.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

const MIN_QUEUE_CAPACITY: usize = 2;

struct Shared {
    slots: Box<[UnsafeCell<MidiEvent>]>,
    mask: usize,
    write: CachePadded<AtomicUsize>,
    read: CachePadded<AtomicUsize>,
}

// SAFETY: a slot is written only by the single producer while it lies outside
// the published [read, write) range, and read only by the single consumer while
// inside it. The cursor Release/Acquire pairs order those accesses.
unsafe impl Sync for Shared {}

impl Shared {
    #[inline]
    fn occupied(&self) -> usize {
        let read = self.read.load(Ordering::Acquire);
        let write = self.write.load(Ordering::Acquire);
        write.wrapping_sub(read) & self.mask
    }
}

/// Fixed-capacity MIDI event queue, not yet split into its two endpoints.
///
/// ```
/// use minihost_midi::{MidiEvent, MidiEventQueue};
///
/// let (mut tx, mut rx) = MidiEventQueue::new(64).split();
/// assert!(tx.push(MidiEvent::note_on(0, 0, 60, 100)));
/// assert_eq!(rx.pop().map(|e| e.data1), Some(60));
/// ```
pub struct MidiEventQueue {
    shared: Arc<Shared>,
}

impl MidiEventQueue {
    /// Create a queue with `capacity` rounded up to the next power of two.
    ///
    /// `0` selects [`DEFAULT_QUEUE_CAPACITY`]. At most `capacity() - 1` events
    /// can be queued at once.
    pub fn new(capacity: usize) -> Self {
        let requested = if capacity == 0 {
            DEFAULT_QUEUE_CAPACITY
        } else {
            capacity
        };
        let capacity = requested.max(MIN_QUEUE_CAPACITY).next_power_of_two();
        if capacity != requested {
            tracing::debug!("MIDI queue capacity {} rounded to {}", requested, capacity);
        }

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MidiEvent::default()))
            .collect();

        Self {
            shared: Arc::new(Shared {
                slots,
                mask: capacity - 1,
                write: CachePadded::new(AtomicUsize::new(0)),
                read: CachePadded::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Number of slots (a power of two).
    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }

    /// Split into the producer and consumer endpoints.
    pub fn split(self) -> (MidiQueueProducer, MidiQueueConsumer) {
        (
            MidiQueueProducer {
                shared: Arc::clone(&self.shared),
            },
            MidiQueueConsumer {
                shared: self.shared,
            },
        )
    }
}

impl Default for MidiEventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

/// Write endpoint. Exactly one may exist per queue.
pub struct MidiQueueProducer {
    shared: Arc<Shared>,
}

impl MidiQueueProducer {
    /// Queue an event. Returns `false` and drops the event when full.
    #[inline]
    pub fn push(&mut self, event: MidiEvent) -> bool {
        let shared = &*self.shared;
        let write = shared.write.load(Ordering::Relaxed);
        let next = (write + 1) & shared.mask;

        if next == shared.read.load(Ordering::Acquire) {
            return false;
        }

        // SAFETY: `write` is outside the consumer's visible range until the
        // store below publishes it.
        unsafe {
            *shared.slots[write].get() = event;
        }
        shared.write.store(next, Ordering::Release);
        true
    }

    /// Push events in order until one is rejected. Returns how many were queued.
    pub fn push_slice(&mut self, events: &[MidiEvent]) -> usize {
        events.iter().take_while(|event| self.push(**event)).count()
    }

    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }

    /// Advisory: may be stale by the time it returns.
    pub fn len(&self) -> usize {
        self.shared.occupied()
    }

    /// Advisory: may be stale by the time it returns.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read endpoint. Exactly one may exist per queue.
pub struct MidiQueueConsumer {
    shared: Arc<Shared>,
}

impl MidiQueueConsumer {
    #[inline]
    pub fn pop(&mut self) -> Option<MidiEvent> {
        let shared = &*self.shared;
        let read = shared.read.load(Ordering::Relaxed);
        if read == shared.write.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: `read` is inside the published range, the producer will not
        // touch it until the read cursor moves past it.
        let event = unsafe { *shared.slots[read].get() };
        shared.read.store((read + 1) & shared.mask, Ordering::Release);
        Some(event)
    }

    /// Drain up to `out.len()` visible events into `out`.
    ///
    /// The read cursor is published once for the whole batch. Events that do
    /// not fit stay queued for the next call.
    #[inline]
    pub fn pop_all(&mut self, out: &mut [MidiEvent]) -> usize {
        let shared = &*self.shared;
        let mut read = shared.read.load(Ordering::Relaxed);
        let write = shared.write.load(Ordering::Acquire);

        let mut count = 0;
        while read != write && count < out.len() {
            // SAFETY: see `pop`.
            out[count] = unsafe { *shared.slots[read].get() };
            read = (read + 1) & shared.mask;
            count += 1;
        }

        if count > 0 {
            shared.read.store(read, Ordering::Release);
        }
        count
    }

    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }

    /// Advisory: may be stale by the time it returns.
    pub fn len(&self) -> usize {
        self.shared.occupied()
    }

    /// Advisory: may be stale by the time it returns.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
