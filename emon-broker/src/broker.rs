// EMon Broker - Subscription scheduling and publishing
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! High-level Broker API
//!
//! The [`Broker`] owns the node registry together with the sample source and
//! clock it reads from, and exposes the configuration entry points a remote
//! command layer needs, addressed by node name.
//!
//! # Example
//!
//! ```rust
//! use emon::{FixedSource, ManualClock, NodeConfig, Sampled};
//! use emon_broker::{Broker, MemoryPublisher};
//!
//! let mut adc = FixedSource::new(1);
//! adc.set_raw(0, 3000);
//! let mut broker = Broker::new(adc, ManualClock::new(0));
//!
//! broker
//!     .add_sampled(NodeConfig::new("Voltage", "V"), Sampled::voltage_divider(0, 30_000.0, 10_000.0).unwrap())
//!     .unwrap();
//! broker.subscribe_interval("Voltage", 1000).unwrap();
//!
//! broker.clock().advance(1000);
//! let mut publisher = MemoryPublisher::new();
//! let batch = broker.poll(&mut publisher).unwrap().unwrap();
//! assert_eq!(batch.get("Voltage").unwrap().value, 12.0);
//! ```

use emon::{
    ClockSource, Constant, EmonError, Integral, Node, NodeConfig, NodeId, NodeKind, Product,
    Registry, SampleSource, Sampled,
};

use crate::batch::Batch;
use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};
use crate::publisher::Publisher;
use crate::scheduler::Scheduler;

/// Metric registry wired to its sample source and clock
pub struct Broker<S: SampleSource, C: ClockSource> {
    /// All nodes, in evaluation order
    registry: Registry,
    /// Raw sample source
    source: S,
    /// Tick source
    clock: C,
    /// Publish scheduler
    scheduler: Scheduler,
    /// Broker configuration
    config: BrokerConfig,
}

impl<S: SampleSource, C: ClockSource> Broker<S, C> {
    /// Create a broker with default configuration
    pub fn new(source: S, clock: C) -> Self {
        let config = BrokerConfig::default();
        Self {
            registry: Registry::new(config.max_nodes),
            scheduler: Scheduler::new(config.time_zone.as_str()),
            source,
            clock,
            config,
        }
    }

    /// Create a broker with custom configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_config(config: BrokerConfig, source: S, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: Registry::new(config.max_nodes),
            scheduler: Scheduler::new(config.time_zone.as_str()),
            source,
            clock,
            config,
        })
    }

    // =====================================================================
    // Construction
    // =====================================================================

    /// Add a node of any kind
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - A node with the same name already exists
    /// - An upstream reference is not registered yet
    /// - The maximum number of nodes has been reached
    pub fn add(&mut self, config: NodeConfig, kind: NodeKind) -> Result<NodeId> {
        Ok(self.registry.add(config, kind)?)
    }

    /// Add a value set by external command
    pub fn add_constant(&mut self, config: NodeConfig, constant: Constant) -> Result<NodeId> {
        self.add(config, NodeKind::Constant(constant))
    }

    /// Add a node read from a converter channel
    pub fn add_sampled(&mut self, config: NodeConfig, sampled: Sampled) -> Result<NodeId> {
        self.add(config, NodeKind::Sampled(sampled))
    }

    /// Add the product of two registered nodes
    pub fn add_product(&mut self, config: NodeConfig, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        self.add(config, NodeKind::Product(Product::new(lhs, rhs)))
    }

    /// Add the running integral of a registered node
    pub fn add_integral(&mut self, config: NodeConfig, integral: Integral) -> Result<NodeId> {
        self.add(config, NodeKind::Integral(integral))
    }

    // =====================================================================
    // External entry points
    // =====================================================================

    /// Resolve a node name
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::NodeNotFound`] if no node has this name.
    pub fn id(&self, name: &str) -> Result<NodeId> {
        self.registry
            .find(name)
            .map_err(|_| BrokerError::NodeNotFound(name.to_string()))
    }

    /// Get a node by name
    pub fn node(&self, name: &str) -> Result<&Node> {
        Ok(self.registry.get(self.id(name)?))
    }

    /// Cached value of a node
    pub fn value(&self, name: &str) -> Result<f64> {
        Ok(self.node(name)?.value())
    }

    /// Sample or compute a node now and return the fresh value
    pub fn sample(&mut self, name: &str) -> Result<f64> {
        let id = self.id(name)?;
        Ok(self.registry.sample(id, &mut self.source, &self.clock))
    }

    /// Publish on change, at most every `min_interval_ms`, with a heartbeat
    /// every `max_interval_ms` (0 disables the heartbeat)
    pub fn subscribe(&mut self, name: &str, min_interval_ms: u32, max_interval_ms: u32) -> Result<()> {
        let id = self.id(name)?;
        self.registry
            .get_mut(id)
            .subscribe(min_interval_ms, max_interval_ms)
            .map_err(EmonError::from)?;
        Ok(())
    }

    /// Publish every `interval_ms`
    pub fn subscribe_interval(&mut self, name: &str, interval_ms: u32) -> Result<()> {
        let id = self.id(name)?;
        self.registry
            .get_mut(id)
            .subscribe_interval(interval_ms)
            .map_err(EmonError::from)?;
        Ok(())
    }

    /// Stop publishing a node
    pub fn unsubscribe(&mut self, name: &str) -> Result<()> {
        let id = self.id(name)?;
        self.registry.get_mut(id).unsubscribe();
        Ok(())
    }

    /// Write a node's value; `Ok(false)` when the node refuses writes
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<bool> {
        let id = self.id(name)?;
        Ok(self.registry.get_mut(id).set_value(value, &self.clock))
    }

    /// Tare a product or restart an integral; `Ok(false)` for other kinds
    pub fn reset(&mut self, name: &str) -> Result<bool> {
        let id = self.id(name)?;
        Ok(self.registry.get_mut(id).reset(&self.clock))
    }

    /// Forget a node's extrema
    pub fn reset_extrema(&mut self, name: &str) -> Result<()> {
        let id = self.id(name)?;
        self.registry.get_mut(id).reset_extrema();
        Ok(())
    }

    /// Choose whether a node's extrema are published
    pub fn set_verbose(&mut self, name: &str, verbose: bool) -> Result<()> {
        let id = self.id(name)?;
        self.registry.get_mut(id).set_verbose(verbose);
        Ok(())
    }

    // =====================================================================
    // Control loop
    // =====================================================================

    /// Sample every non-constant node once
    pub fn refresh(&mut self) {
        self.registry.refresh(&mut self.source, &self.clock);
    }

    /// Run one control-loop iteration: refresh (if configured), then
    /// publish whatever is due as one batch.
    ///
    /// After a refresh the due nodes are published from the values just
    /// computed, so each channel is read once per poll.
    pub fn poll<P: Publisher + ?Sized>(&mut self, publisher: &mut P) -> Result<Option<Batch>> {
        if self.config.refresh_before_publish {
            self.refresh();
            self.scheduler
                .run_refreshed(&mut self.registry, &self.clock, publisher)
        } else {
            self.scheduler
                .run(&mut self.registry, &mut self.source, &self.clock, publisher)
        }
    }

    // =====================================================================
    // Accessors
    // =====================================================================

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Node names in registry order
    pub fn nodes(&self) -> Vec<String> {
        self.registry.names().map(str::to_string).collect()
    }

    pub fn node_count(&self) -> usize {
        self.registry.len()
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.registry.find(name).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::MemoryPublisher;
    use emon::{FixedSource, ManualClock};

    fn broker() -> Broker<FixedSource, ManualClock> {
        let mut source = FixedSource::new(2);
        source.set_raw(0, 3000);
        source.set_raw(1, 2000);
        let mut broker = Broker::new(source, ManualClock::new(0));
        let v = broker
            .add_sampled(
                NodeConfig::new("Voltage", "V"),
                Sampled::voltage_divider(0, 30_000.0, 10_000.0).unwrap(),
            )
            .unwrap();
        let i = broker
            .add_sampled(
                NodeConfig::new("Current", "A"),
                Sampled::voltage_divider(1, 0.0, 1.0).unwrap(),
            )
            .unwrap();
        let p = broker
            .add_product(NodeConfig::new("Power", "W"), v, i)
            .unwrap();
        broker
            .add_integral(NodeConfig::new("Energy", "Wh"), Integral::hourly(p))
            .unwrap();
        broker
    }

    #[test]
    fn test_broker_new() {
        let broker = broker();
        assert_eq!(broker.node_count(), 4);
        assert!(broker.has_node("Energy"));
        assert_eq!(broker.nodes(), vec!["Voltage", "Current", "Power", "Energy"]);
    }

    #[test]
    fn test_broker_with_invalid_config() {
        let result = Broker::with_config(
            BrokerConfig::with_max_nodes(0),
            FixedSource::new(1),
            ManualClock::new(0),
        );
        assert!(matches!(result, Err(BrokerError::InvalidConfig(_))));
    }

    #[test]
    fn test_broker_node_not_found() {
        let mut broker = broker();
        assert!(matches!(
            broker.subscribe("Frequency", 100, 0),
            Err(BrokerError::NodeNotFound(_))
        ));
        assert!(matches!(
            broker.value("Frequency"),
            Err(BrokerError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_broker_invalid_subscription() {
        let mut broker = broker();
        assert!(matches!(
            broker.subscribe("Power", 0, 0),
            Err(BrokerError::Node(EmonError::Subscription(_)))
        ));
    }

    #[test]
    fn test_broker_set_value() {
        let mut broker = broker();
        assert!(!broker.set_value("Voltage", 1.0).unwrap());
        assert!(!broker.set_value("Power", 0.0).unwrap());
        assert!(broker.set_value("Energy", 42.0).unwrap());
        assert_eq!(broker.value("Energy").unwrap(), 42.0);
    }

    #[test]
    fn test_broker_reset_and_extrema() {
        let mut broker = broker();
        broker.refresh();
        assert_eq!(broker.value("Power").unwrap(), 24.0);
        assert!(broker.reset("Power").unwrap());
        assert_eq!(broker.value("Power").unwrap(), 0.0);
        assert!(!broker.reset("Voltage").unwrap());

        broker.reset_extrema("Voltage").unwrap();
        assert!(broker.node("Voltage").unwrap().max().is_nan());
    }

    #[test]
    fn test_broker_poll_terse_node() {
        let mut broker = broker();
        broker.subscribe_interval("Voltage", 100).unwrap();
        broker.set_verbose("Voltage", false).unwrap();
        broker.clock().set(100);

        let mut publisher = MemoryPublisher::new();
        let batch = broker.poll(&mut publisher).unwrap().unwrap();
        let entry = batch.get("Voltage").unwrap();
        assert_eq!(entry.value, 12.0);
        assert!(entry.min.is_none());
        assert_eq!(publisher.len(), 1);
    }

    #[test]
    fn test_broker_unsubscribe() {
        let mut broker = broker();
        broker.subscribe_interval("Voltage", 100).unwrap();
        broker.unsubscribe("Voltage").unwrap();
        broker.clock().set(1_000);
        let mut publisher = MemoryPublisher::new();
        assert!(broker.poll(&mut publisher).unwrap().is_none());
    }

    #[test]
    fn test_broker_poll_reads_each_channel_once() {
        let mut broker = broker();
        broker.subscribe_interval("Voltage", 100).unwrap();
        broker.subscribe_interval("Power", 100).unwrap();
        broker.clock().set(100);

        let mut publisher = MemoryPublisher::new();
        let batch = broker.poll(&mut publisher).unwrap().unwrap();
        assert_eq!(batch.get("Power").unwrap().value, 24.0);
        assert_eq!(broker.source().reads(), 2);
    }

    #[test]
    fn test_broker_publish_only_samples_due_nodes() {
        let mut source = FixedSource::new(1);
        source.set_raw(0, 3000);
        let mut broker =
            Broker::with_config(BrokerConfig::publish_only(), source, ManualClock::new(0)).unwrap();
        broker
            .add_sampled(
                NodeConfig::new("Voltage", "V"),
                Sampled::voltage_divider(0, 30_000.0, 10_000.0).unwrap(),
            )
            .unwrap();

        let mut publisher = MemoryPublisher::new();
        broker.clock().set(100);
        assert!(broker.poll(&mut publisher).unwrap().is_none());
        assert_eq!(broker.source().reads(), 0);

        broker.subscribe_interval("Voltage", 100).unwrap();
        let batch = broker.poll(&mut publisher).unwrap().unwrap();
        assert_eq!(batch.get("Voltage").unwrap().value, 12.0);
        assert_eq!(broker.source().reads(), 1);
    }

    #[test]
    fn test_broker_sample_by_name() {
        let mut broker = broker();
        assert_eq!(broker.sample("Voltage").unwrap(), 12.0);
        broker.source_mut().set_raw(0, 2500);
        assert_eq!(broker.sample("Voltage").unwrap(), 10.0);
        assert_eq!(broker.node("Voltage").unwrap().min(), 10.0);
    }
}
