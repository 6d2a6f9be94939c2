// EMon - Energy monitoring metric broker
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Tick arithmetic and value formatting
//!
//! Ticks come from a free-running millisecond counter that wraps at a power
//! of two. Every elapsed-time computation in the crate goes through
//! [`elapsed`] or [`elapsed_within`], so intervals stay correct across the
//! counter overflowing.
//!
//! The formatting helpers are pure: they take a value and return a `String`.

/// Millisecond tick reading from a [`ClockSource`](crate::ClockSource)
pub type Tick = u32;

/// Milliseconds per second
pub const MS_PER_SECOND: u32 = 1_000;

/// Milliseconds per hour, the divisor turning watt-milliseconds into watt-hours
pub const MS_PER_HOUR: u32 = 3_600_000;

/// Milliseconds elapsed from `previous` to `current` on a 32-bit counter.
///
/// The result is `(current - previous) mod 2^32`, never negative.
#[inline]
pub fn elapsed(previous: Tick, current: Tick) -> u32 {
    current.wrapping_sub(previous)
}

/// Milliseconds elapsed on a counter that is `width_bits` wide.
///
/// The result is `(current - previous) mod 2^width_bits`. Widths are clamped
/// to `1..=32`.
#[inline]
pub fn elapsed_within(previous: Tick, current: Tick, width_bits: u32) -> u32 {
    elapsed(previous, current) & tick_mask(width_bits)
}

/// Mask of the valid bits for a counter `width_bits` wide
#[inline]
pub fn tick_mask(width_bits: u32) -> u32 {
    match width_bits.clamp(1, 32) {
        32 => u32::MAX,
        w => (1u32 << w) - 1,
    }
}

/// Format a tick as `HHMMSS.mmm` time since the counter started.
///
/// Hours wrap at 24.
pub fn format_uptime(tick: Tick) -> String {
    let ms = tick % MS_PER_SECOND;
    let total_secs = tick / MS_PER_SECOND;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = (total_secs / 3600) % 24;
    format!("{:02}{:02}{:02}.{:03}", hours, mins, secs, ms)
}

/// Render a value right-aligned in `width` columns with `precision` decimals.
///
/// Undefined values render as `NaN`.
pub fn format_value(value: f64, width: u8, precision: u8) -> String {
    format!(
        "{:>width$.prec$}",
        value,
        width = width as usize,
        prec = precision as usize
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_forward() {
        assert_eq!(elapsed(1000, 1500), 500);
        assert_eq!(elapsed(0, 0), 0);
    }

    #[test]
    fn test_elapsed_across_wrap() {
        assert_eq!(elapsed(u32::MAX - 9, 10), 20);
        assert_eq!(elapsed(u32::MAX, 0), 1);
    }

    #[test]
    fn test_elapsed_within_narrow_counter() {
        // 16-bit counter: 0xFFF0 -> 0x0010 is 32 ticks
        assert_eq!(elapsed_within(0xFFF0, 0x0010, 16), 0x20);
        assert_eq!(elapsed_within(100, 50, 8), (50u32.wrapping_sub(100)) & 0xFF);
    }

    #[test]
    fn test_tick_mask_clamps() {
        assert_eq!(tick_mask(32), u32::MAX);
        assert_eq!(tick_mask(64), u32::MAX);
        assert_eq!(tick_mask(0), 1);
        assert_eq!(tick_mask(12), 0x0FFF);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(0), "000000.000");
        assert_eq!(format_uptime(3_723_045), "010203.045");
        // 25 hours wraps to 01
        assert_eq!(format_uptime(25 * MS_PER_HOUR), "010000.000");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(24.0, 7, 3), " 24.000");
        assert_eq!(format_value(1.23456, 1, 2), "1.23");
        assert_eq!(format_value(f64::NAN, 5, 3), "  NaN");
    }
}
