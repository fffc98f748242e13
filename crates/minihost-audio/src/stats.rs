//! Realtime loop counters.
//!
//! The audio callback never logs. It bumps these counters instead and the
//! control side reads them with [`LoopStats::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct LoopStats {
    callbacks: AtomicU64,
    failed_blocks: AtomicU64,
    clamped_callbacks: AtomicU64,
    midi_in: AtomicU64,
    midi_out: AtomicU64,
    midi_out_dropped: AtomicU64,
}

/// Point-in-time copy of [`LoopStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStatsSnapshot {
    pub callbacks: u64,
    /// Blocks the processor rejected. Each one produced silence.
    pub failed_blocks: u64,
    /// Callbacks that asked for more frames than the loop pre-allocated.
    pub clamped_callbacks: u64,
    /// MIDI events drained from the input queue.
    pub midi_in: u64,
    /// Generated MIDI events accepted by the output sink.
    pub midi_out: u64,
    /// Generated MIDI events lost to a full collector or a refusing sink.
    pub midi_out_dropped: u64,
}

impl LoopStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_callback(&self, clamped: bool) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
        if clamped {
            self.record_clamped();
        }
    }

    #[inline]
    pub(crate) fn record_clamped(&self) {
        self.clamped_callbacks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_failure(&self) {
        self.failed_blocks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_midi_in(&self, count: usize) {
        if count > 0 {
            self.midi_in.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_midi_out(&self, sent: usize, dropped: usize) {
        if sent > 0 {
            self.midi_out.fetch_add(sent as u64, Ordering::Relaxed);
        }
        if dropped > 0 {
            self.midi_out_dropped
                .fetch_add(dropped as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> LoopStatsSnapshot {
        LoopStatsSnapshot {
            callbacks: self.callbacks.load(Ordering::Relaxed),
            failed_blocks: self.failed_blocks.load(Ordering::Relaxed),
            clamped_callbacks: self.clamped_callbacks.load(Ordering::Relaxed),
            midi_in: self.midi_in.load(Ordering::Relaxed),
            midi_out: self.midi_out.load(Ordering::Relaxed),
            midi_out_dropped: self.midi_out_dropped.load(Ordering::Relaxed),
        }
    }
}
