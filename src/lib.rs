//! # EMon - Energy monitoring metric nodes
//!
//! The data model of a small sensor broker running on a constrained device:
//! named scalar values, some sampled from an ADC, others derived from the
//! cached values of other nodes, each tracking its extrema and deciding when
//! it is due to be published.
//!
//! ## Key Features
//!
//! - **Rollover-safe timing**: all intervals use wrapping tick arithmetic
//! - **Derived nodes**: products and time integrals over cached upstream values
//! - **Explicit failure**: undefined values are `NaN`, refused writes are `false`
//! - **Publish policies**: on-change with heartbeat, or fixed interval
//!
//! ## Quick Start
//!
//! ```rust
//! use emon::{FixedSource, Integral, ManualClock, NodeConfig, NodeKind, Product, Registry, Sampled};
//!
//! let mut registry = Registry::default();
//! let voltage = registry.add(
//!     NodeConfig::new("Voltage", "V"),
//!     NodeKind::Sampled(Sampled::voltage_divider(0, 30_000.0, 10_000.0).unwrap()),
//! ).unwrap();
//! let current = registry.add(
//!     NodeConfig::new("Current", "A"),
//!     NodeKind::Sampled(Sampled::voltage_divider(1, 0.0, 1.0).unwrap()),
//! ).unwrap();
//! let power = registry.add(
//!     NodeConfig::new("Power", "W"),
//!     NodeKind::Product(Product::new(voltage, current)),
//! ).unwrap();
//! let energy = registry.add(
//!     NodeConfig::new("Energy", "Wh"),
//!     NodeKind::Integral(Integral::hourly(power)),
//! ).unwrap();
//!
//! let mut adc = FixedSource::new(2);
//! adc.set_raw(0, 3000); // 3.000V at the pin, 12V before the divider
//! adc.set_raw(1, 2000);
//! let clock = ManualClock::new(0);
//!
//! registry.refresh(&mut adc, &clock);
//! assert_eq!(registry.value(power), 24.0);
//!
//! clock.advance(3_600_000);
//! registry.refresh(&mut adc, &clock);
//! assert_eq!(registry.value(energy), 24.0);
//! ```
//!
//! ## Modules
//!
//! - [`node`]: node identity, kinds, state and publish policy
//! - [`registry`]: the arena owning all nodes
//! - [`source`]: raw sample source contract
//! - [`clock`]: tick source contract
//! - [`time`]: wrapping tick arithmetic and formatting

// Modules
pub mod clock;
pub mod error;
pub mod node;
pub mod registry;
pub mod source;
pub mod time;

// Re-exports for convenient access
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use error::{
    ConfigError, EmonError, RegistryError, Result, SampleError, SubscriptionError,
};
pub use node::{
    Bias, Constant, Integral, Metric, Node, NodeConfig, NodeKind, NodeState, Product,
    PublishPolicy, Sampled,
};
pub use registry::{NodeId, Registry};
pub use source::{FixedSource, SampleSource};
pub use time::{elapsed, elapsed_within, Tick, MS_PER_HOUR};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_end_to_end_power_and_energy() {
        let mut registry = Registry::default();
        let voltage = registry
            .add(
                NodeConfig::new("Voltage", "V"),
                NodeKind::Sampled(Sampled::voltage_divider(0, 30_000.0, 10_000.0).unwrap()),
            )
            .unwrap();
        let current = registry
            .add(
                NodeConfig::new("Current", "A"),
                NodeKind::Sampled(Sampled::voltage_divider(1, 0.0, 1.0).unwrap()),
            )
            .unwrap();
        let power = registry
            .add(
                NodeConfig::new("Power", "W"),
                NodeKind::Product(Product::new(voltage, current)),
            )
            .unwrap();

        let mut adc = FixedSource::new(2);
        adc.set_raw(0, 3000);
        adc.set_raw(1, 2000);
        let clock = ManualClock::new(0);
        registry.refresh(&mut adc, &clock);

        assert_eq!(registry.value(power), 24.0);
    }
}
