// EMon - Energy monitoring metric broker
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Raw sample source abstraction
//!
//! This module provides the [`SampleSource`] trait the core reads hardware
//! through, and [`FixedSource`], an in-memory source for tests and
//! simulation.

use crate::error::SampleError;

/// Trait for ADC-like devices
///
/// Reads are synchronous and bounded. A failed transaction is reported as an
/// error so it can never be mistaken for a genuine zero reading.
pub trait SampleSource {
    /// Read the raw count of `channel`
    fn read(&mut self, channel: u8) -> Result<u16, SampleError>;

    /// Count corresponding to the reference voltage
    fn max_count(&self) -> u16;

    /// Full-scale voltage in millivolts
    fn reference_millivolts(&self) -> f64;

    /// Read `channel` and normalise it into `0..reference_millivolts`
    fn read_millivolts(&mut self, channel: u8) -> Result<f64, SampleError> {
        let max = self.max_count();
        if max == 0 {
            return Err(SampleError::ReadFailed { channel });
        }
        let raw = self.read(channel)?;
        Ok(raw as f64 * self.reference_millivolts() / max as f64)
    }
}

/// An in-memory source holding one raw count per channel
#[derive(Debug, Clone)]
pub struct FixedSource {
    /// Current raw count per channel, `None` when the channel is failing
    counts: Vec<Option<u16>>,
    max_count: u16,
    reference_mv: f64,
    reads: u64,
}

impl FixedSource {
    /// Create a source where one count is exactly one millivolt
    pub fn new(channels: usize) -> Self {
        Self::with_scale(channels, u16::MAX, u16::MAX as f64)
    }

    /// Create a source with a custom full-scale count and reference
    pub fn with_scale(channels: usize, max_count: u16, reference_mv: f64) -> Self {
        Self {
            counts: vec![Some(0); channels],
            max_count,
            reference_mv,
            reads: 0,
        }
    }

    /// Four single-ended channels of a 16-bit converter at +/-4.096V full scale
    pub fn ads1115() -> Self {
        Self::with_scale(4, 32_767, 4_096.0)
    }

    /// Set the raw count returned by `channel`
    pub fn set_raw(&mut self, channel: u8, raw: u16) {
        if let Some(slot) = self.counts.get_mut(channel as usize) {
            *slot = Some(raw);
        }
    }

    /// Set `channel` to the count nearest to `millivolts`
    pub fn set_millivolts(&mut self, channel: u8, millivolts: f64) {
        let raw = (millivolts * self.max_count as f64 / self.reference_mv)
            .round()
            .clamp(0.0, self.max_count as f64);
        self.set_raw(channel, raw as u16);
    }

    /// Make every read of `channel` fail until it is set again
    pub fn fail(&mut self, channel: u8) {
        if let Some(slot) = self.counts.get_mut(channel as usize) {
            *slot = None;
        }
    }

    /// Number of reads served so far, failed ones included
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Number of channels
    pub fn channels(&self) -> usize {
        self.counts.len()
    }
}

impl SampleSource for FixedSource {
    fn read(&mut self, channel: u8) -> Result<u16, SampleError> {
        self.reads += 1;
        match self.counts.get(channel as usize) {
            Some(Some(raw)) => Ok(*raw),
            Some(None) => Err(SampleError::ReadFailed { channel }),
            None => Err(SampleError::ChannelOutOfRange {
                channel,
                available: self.counts.len(),
            }),
        }
    }

    fn max_count(&self) -> u16 {
        self.max_count
    }

    fn reference_millivolts(&self) -> f64 {
        self.reference_mv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_source_one_count_per_millivolt() {
        let mut source = FixedSource::new(2);
        source.set_raw(1, 1500);
        assert_eq!(source.read_millivolts(1).unwrap(), 1500.0);
        assert_eq!(source.read(0).unwrap(), 0);
        assert_eq!(source.reads(), 2);
    }

    #[test]
    fn test_fixed_source_failure_is_distinguishable() {
        let mut source = FixedSource::new(1);
        source.fail(0);
        assert_eq!(source.read(0), Err(SampleError::ReadFailed { channel: 0 }));
        source.set_raw(0, 0);
        assert_eq!(source.read(0), Ok(0));
    }

    #[test]
    fn test_fixed_source_out_of_range() {
        let mut source = FixedSource::new(1);
        assert!(matches!(
            source.read(3),
            Err(SampleError::ChannelOutOfRange { channel: 3, .. })
        ));
    }

    #[test]
    fn test_ads1115_scaling() {
        let mut source = FixedSource::ads1115();
        source.set_millivolts(0, 2048.0);
        let mv = source.read_millivolts(0).unwrap();
        assert!((mv - 2048.0).abs() < 0.2);
    }

    #[test]
    fn test_zero_max_count_is_a_failure() {
        let mut source = FixedSource::with_scale(1, 0, 3300.0);
        assert!(source.read_millivolts(0).is_err());
    }
}
