// EMon - Energy monitoring metric broker
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Clock source abstraction
//!
//! The core never owns a clock. It asks a [`ClockSource`] for the current
//! tick and, when a node is sampled, for a printable stamp of that moment.

use std::cell::Cell;
use std::time::Instant;

use crate::time::{format_uptime, tick_mask, Tick};

/// Trait for free-running tick counters
pub trait ClockSource {
    /// Current tick in milliseconds
    fn now(&self) -> Tick;

    /// Counter width in bits; ticks wrap at `2^width_bits`
    fn width_bits(&self) -> u32 {
        32
    }

    /// Printable stamp for a sample taken at `tick`
    fn stamp(&self, tick: Tick) -> String {
        format_uptime(tick)
    }
}

/// A clock that only moves when told to, for tests and simulation
#[derive(Debug)]
pub struct ManualClock {
    tick: Cell<Tick>,
    width_bits: u32,
}

impl ManualClock {
    /// Create a 32-bit clock starting at `start`
    pub fn new(start: Tick) -> Self {
        Self::with_width(start, 32)
    }

    /// Create a clock whose counter is `width_bits` wide
    pub fn with_width(start: Tick, width_bits: u32) -> Self {
        let width_bits = width_bits.clamp(1, 32);
        Self {
            tick: Cell::new(start & tick_mask(width_bits)),
            width_bits,
        }
    }

    /// Jump to an absolute tick (masked to the counter width)
    pub fn set(&self, tick: Tick) {
        self.tick.set(tick & tick_mask(self.width_bits));
    }

    /// Move forward by `ms`, wrapping like the hardware counter would
    pub fn advance(&self, ms: u32) {
        self.set(self.tick.get().wrapping_add(ms));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> Tick {
        self.tick.get()
    }

    fn width_bits(&self) -> u32 {
        self.width_bits
    }
}

/// Process-monotonic clock truncated to a wrapping 32-bit millisecond count.
///
/// With the `timestamps` feature, stamps are UTC wall-clock times taken when
/// the stamp is requested.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Create a clock reading zero now
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> Tick {
        // Truncation is the wrap.
        self.start.elapsed().as_millis() as u32
    }

    #[cfg(feature = "timestamps")]
    fn stamp(&self, _tick: Tick) -> String {
        chrono::Utc::now().format("%H%M%S%.3f").to_string()
    }
}
