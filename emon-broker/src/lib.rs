// EMon Broker - Subscription scheduling and publishing
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # EMon Broker - Subscription scheduling and publishing
//!
//! This crate turns an [`emon::Registry`] into a broker: nodes subscribe to
//! a publish policy, a [`Scheduler`] decides each control-loop iteration
//! which nodes are due, and due nodes are sampled fresh and handed to a
//! [`Publisher`] as one [`Batch`].
//!
//! ## Features
//!
//! - **On-change and periodic policies**: minimum interval, heartbeat, fixed rate
//! - **Ordered evaluation**: derived nodes see values sampled in the same pass
//! - **Explicit failure**: undefined values are published, never dropped
//! - **Pluggable publishers**: in-memory, JSON lines (`json` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use emon::{FixedSource, Integral, ManualClock, NodeConfig, Sampled};
//! use emon_broker::{Broker, MemoryPublisher};
//!
//! let mut adc = FixedSource::new(2);
//! adc.set_raw(0, 3000);
//! adc.set_raw(1, 2000);
//! let mut broker = Broker::new(adc, ManualClock::new(0));
//!
//! let v = broker.add_sampled(NodeConfig::new("Voltage", "V"),
//!     Sampled::voltage_divider(0, 30_000.0, 10_000.0).unwrap()).unwrap();
//! let i = broker.add_sampled(NodeConfig::new("Current", "A"),
//!     Sampled::voltage_divider(1, 0.0, 1.0).unwrap()).unwrap();
//! let p = broker.add_product(NodeConfig::new("Power", "W"), v, i).unwrap();
//! broker.add_integral(NodeConfig::new("Energy", "Wh"), Integral::hourly(p)).unwrap();
//!
//! broker.subscribe_interval("Power", 500).unwrap();
//! broker.clock().set(500);
//!
//! let mut publisher = MemoryPublisher::new();
//! let batch = broker.poll(&mut publisher).unwrap().unwrap();
//! assert_eq!(batch.names(), vec!["Power"]);
//! assert_eq!(batch.get("Power").unwrap().value, 24.0);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Broker                                                  │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐  │
//! │  │ Voltage  │  │ Current  │─▶│  Power   │─▶│  Energy  │  │
//! │  │ (ADC 0)  │─▶│ (ADC 1)  │  │ (V × A)  │  │ (∫P dt)  │  │
//! │  └──────────┘  └──────────┘  └──────────┘  └──────────┘  │
//! │        Registry (upstream before dependent)              │
//! │                       │                                  │
//! │                       ▼                                  │
//! │                ┌────────────┐                            │
//! │                │ Scheduler  │  due? → sample → batch     │
//! │                └─────┬──────┘                            │
//! │                      ▼                                   │
//! │                ┌────────────┐                            │
//! │                │ Publisher  │  → serial / JSON / ...     │
//! │                └────────────┘                            │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod batch;
mod broker;
mod config;
mod error;
mod publisher;
mod scheduler;

// Public API
pub use batch::{Batch, BatchEntry};
pub use broker::Broker;
pub use config::BrokerConfig;
pub use error::{BrokerError, Result};
pub use publisher::{MemoryPublisher, Publisher};
pub use scheduler::Scheduler;

#[cfg(feature = "json")]
pub use publisher::JsonPublisher;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
