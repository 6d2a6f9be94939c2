// EMon - Energy monitoring metric broker
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Metric nodes
//!
//! A [`Node`] is one named scalar: its identity ([`NodeConfig`]), what it
//! is computed from ([`NodeKind`]), and what it has seen so far
//! ([`NodeState`]).
//!
//! Values are `NaN` until the first successful sample or write. Extrema are
//! tracked independently and ignore `NaN`. The last-sample tick only moves
//! on a successful sample or an accepted write.
//!
//! Nodes are sampled through [`Registry::sample`](crate::Registry::sample),
//! which supplies the cached values of upstream nodes.

mod config;
mod kind;
mod policy;

pub use config::{
    NodeConfig, DEFAULT_PRECISION, DEFAULT_WIDTH, MAX_PRECISION, NAME_CAPACITY, UNIT_CAPACITY,
};
pub use kind::{
    Bias, Constant, Evaluation, Inputs, Integral, Metric, NodeKind, Product, Sampled, Upstream,
    MAX_UPSTREAM,
};
pub use policy::PublishPolicy;

use log::{debug, warn};

use crate::clock::ClockSource;
use crate::error::SubscriptionError;
use crate::source::SampleSource;
use crate::time::{elapsed_within, format_value, Tick};

/// Mutable state of a node
#[derive(Debug, Clone)]
pub struct NodeState {
    /// Cached value
    pub value: f64,
    /// Smallest valid value since the last extrema reset
    pub min: f64,
    /// Largest valid value since the last extrema reset
    pub max: f64,
    /// Tick of the last successful sample or accepted write
    pub last_sample: Option<Tick>,
    /// Tick the integration window opened at; `None` while it is closed
    pub window_start: Option<Tick>,
    /// Printable stamp of `last_sample`
    pub sample_time: String,
    /// Value changed since the last publish
    pub changed: bool,
    /// Publish policy
    pub policy: PublishPolicy,
    /// Tick of the last publish
    pub last_publish: Tick,
    /// Publish extrema alongside the value
    pub verbose: bool,
}

impl NodeState {
    fn new(value: f64, verbose: bool) -> Self {
        Self {
            value,
            min: f64::NAN,
            max: f64::NAN,
            last_sample: None,
            window_start: None,
            sample_time: String::new(),
            changed: false,
            policy: PublishPolicy::Off,
            last_publish: 0,
            verbose,
        }
    }
}

/// A named scalar with extrema and a publish policy
#[derive(Debug, Clone)]
pub struct Node {
    config: NodeConfig,
    kind: NodeKind,
    state: NodeState,
}

impl Node {
    /// Create a node. Constants start at their initial value, everything
    /// else starts undefined.
    pub fn new(config: NodeConfig, kind: NodeKind) -> Self {
        let initial = match &kind {
            NodeKind::Constant(c) => c.initial,
            _ => f64::NAN,
        };
        let state = NodeState::new(initial, config.verbose);
        Self {
            config,
            kind,
            state,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn unit(&self) -> &str {
        &self.config.unit
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    /// Whether external writes are refused
    pub fn is_read_only(&self) -> bool {
        self.kind.read_only()
    }

    /// Cached value; never samples
    pub fn value(&self) -> f64 {
        self.state.value
    }

    pub fn min(&self) -> f64 {
        self.state.min
    }

    pub fn max(&self) -> f64 {
        self.state.max
    }

    /// Tick of the last successful sample
    pub fn sample_time(&self) -> Option<Tick> {
        self.state.last_sample
    }

    /// Stamp of the last successful sample (empty before the first one)
    pub fn sample_time_str(&self) -> &str {
        &self.state.sample_time
    }

    /// Cached value rendered with the node's width and precision
    pub fn formatted_value(&self) -> String {
        format_value(
            self.state.value,
            self.config.display_width(),
            self.config.precision,
        )
    }

    pub fn is_verbose(&self) -> bool {
        self.state.verbose
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.state.verbose = verbose;
    }

    pub fn has_changed(&self) -> bool {
        self.state.changed
    }

    pub fn policy(&self) -> PublishPolicy {
        self.state.policy
    }

    /// Evaluate the node with the given upstream values and update its state.
    pub(crate) fn sample_or_compute<S, C>(
        &mut self,
        upstream: [f64; MAX_UPSTREAM],
        source: &mut S,
        clock: &C,
    ) -> f64
    where
        S: SampleSource,
        C: ClockSource + ?Sized,
    {
        let now = clock.now();
        let inputs = Inputs {
            upstream,
            current: self.state.value,
            elapsed_ms: self
                .state
                .window_start
                .map(|start| elapsed_within(start, now, clock.width_bits())),
        };

        match self.kind.evaluate(&inputs, source) {
            Evaluation::Hold => self.state.value,
            Evaluation::Skip => {
                self.state.window_start = None;
                self.state.value
            }
            Evaluation::Value(v) if !v.is_nan() => {
                self.record(v, now, clock);
                v
            }
            Evaluation::Value(_) | Evaluation::Undefined => {
                if !self.state.value.is_nan() {
                    self.state.changed = true;
                }
                self.state.value = f64::NAN;
                f64::NAN
            }
        }
    }

    fn record<C: ClockSource + ?Sized>(&mut self, value: f64, now: Tick, clock: &C) {
        self.store(value, now, clock);
        if self.state.min.is_nan() || value < self.state.min {
            self.state.min = value;
        }
        if self.state.max.is_nan() || value > self.state.max {
            self.state.max = value;
        }
    }

    fn store<C: ClockSource + ?Sized>(&mut self, value: f64, now: Tick, clock: &C) {
        if value != self.state.value {
            self.state.changed = true;
        }
        self.state.value = value;
        self.state.last_sample = Some(now);
        self.state.window_start = Some(now);
        self.state.sample_time = clock.stamp(now);
    }

    /// Replace the value by external command.
    ///
    /// Refused (returns `false`) for read-only nodes and non-finite values.
    /// An accepted write re-bases elapsed time, so an integral restored after
    /// a restart only integrates from this call on.
    pub fn set_value<C: ClockSource + ?Sized>(&mut self, value: f64, clock: &C) -> bool {
        if self.is_read_only() {
            warn!("{}: write refused, node is read-only", self.config.name);
            return false;
        }
        if !value.is_finite() {
            warn!("{}: write of {} refused", self.config.name, value);
            return false;
        }
        self.store(value, clock.now(), clock);
        true
    }

    /// Return the node to zero.
    ///
    /// Products are tared (value 0, extrema cleared); integrals restart from
    /// zero. Other kinds refuse.
    pub fn reset<C: ClockSource + ?Sized>(&mut self, clock: &C) -> bool {
        match self.kind {
            NodeKind::Product(_) => {
                if self.state.value != 0.0 {
                    self.state.changed = true;
                }
                self.state.value = 0.0;
                self.reset_extrema();
                true
            }
            NodeKind::Integral(_) => self.set_value(0.0, clock),
            _ => false,
        }
    }

    /// Forget the extrema
    pub fn reset_extrema(&mut self) {
        self.state.min = f64::NAN;
        self.state.max = f64::NAN;
    }

    /// Publish on change, at most every `min_interval_ms`, with a heartbeat
    /// every `max_interval_ms` (0 disables the heartbeat).
    ///
    /// Every (re)subscription measures its intervals from tick 0, the same
    /// base `unsubscribe` leaves behind.
    pub fn subscribe(
        &mut self,
        min_interval_ms: u32,
        max_interval_ms: u32,
    ) -> Result<(), SubscriptionError> {
        self.state.policy = PublishPolicy::on_change(min_interval_ms, max_interval_ms)?;
        self.state.last_publish = 0;
        Ok(())
    }

    /// Publish every `interval_ms` regardless of change
    pub fn subscribe_interval(&mut self, interval_ms: u32) -> Result<(), SubscriptionError> {
        self.state.policy = PublishPolicy::on_interval(interval_ms)?;
        self.state.last_publish = 0;
        Ok(())
    }

    pub fn unsubscribe(&mut self) {
        self.state.policy = PublishPolicy::Off;
        self.state.last_publish = 0;
    }

    /// Whether the node should be published now.
    ///
    /// Consumes the change flag when it returns `true`.
    pub fn is_publish_due<C: ClockSource + ?Sized>(&mut self, clock: &C) -> bool {
        let since = elapsed_within(self.state.last_publish, clock.now(), clock.width_bits());
        let due = self.state.policy.is_due(since, self.state.changed);
        if due {
            debug!(
                "{}: publish due ({}ms since last, changed={})",
                self.config.name, since, self.state.changed
            );
            self.state.changed = false;
        }
        due
    }

    /// Flag the value as not yet delivered, e.g. after a failed publish
    pub fn mark_changed(&mut self) {
        self.state.changed = true;
    }

    /// Record that the node was published at `now`
    pub fn mark_published(&mut self, now: Tick) {
        self.state.last_publish = now;
        self.state.changed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::source::FixedSource;

    fn constant(value: f64) -> Node {
        Node::new(
            NodeConfig::new("Divider", ""),
            NodeKind::Constant(Constant::settable(value)),
        )
    }

    fn voltage() -> Node {
        Node::new(
            NodeConfig::new("Voltage", "V"),
            NodeKind::Sampled(Sampled::voltage_divider(0, 30_000.0, 10_000.0).unwrap()),
        )
    }

    #[test]
    fn test_new_sampled_node_is_undefined() {
        let node = voltage();
        assert!(node.value().is_nan());
        assert!(node.min().is_nan());
        assert!(node.max().is_nan());
        assert_eq!(node.sample_time(), None);
        assert_eq!(node.sample_time_str(), "");
    }

    #[test]
    fn test_sample_updates_state() {
        let mut node = voltage();
        let mut source = FixedSource::new(1);
        let clock = ManualClock::new(1_000);
        source.set_raw(0, 3000);

        let v = node.sample_or_compute([f64::NAN; 2], &mut source, &clock);
        assert_eq!(v, 12.0);
        assert_eq!(node.min(), 12.0);
        assert_eq!(node.max(), 12.0);
        assert_eq!(node.sample_time(), Some(1_000));
        assert_eq!(node.sample_time_str(), "000001.000");
        assert!(node.has_changed());
    }

    #[test]
    fn test_failed_sample_keeps_timestamp_and_extrema() {
        let mut node = voltage();
        let mut source = FixedSource::new(1);
        let clock = ManualClock::new(1_000);
        source.set_raw(0, 3000);
        node.sample_or_compute([f64::NAN; 2], &mut source, &clock);

        clock.advance(500);
        source.fail(0);
        let v = node.sample_or_compute([f64::NAN; 2], &mut source, &clock);
        assert!(v.is_nan());
        assert!(node.value().is_nan());
        assert_eq!(node.max(), 12.0);
        assert_eq!(node.sample_time(), Some(1_000));
    }

    #[test]
    fn test_read_only_rejects_write() {
        let mut node = voltage();
        let clock = ManualClock::new(0);
        assert!(node.is_read_only());
        assert!(!node.set_value(5.0, &clock));
        assert!(node.value().is_nan());
    }

    #[test]
    fn test_constant_write() {
        let mut node = constant(1.0);
        let clock = ManualClock::new(42);
        assert_eq!(node.value(), 1.0);
        assert!(node.set_value(2.5, &clock));
        assert_eq!(node.value(), 2.5);
        assert_eq!(node.sample_time(), Some(42));
        assert!(!node.set_value(f64::NAN, &clock));
        assert_eq!(node.value(), 2.5);
    }

    #[test]
    fn test_constant_sample_holds() {
        let mut node = constant(3.0);
        let mut source = FixedSource::new(0);
        let clock = ManualClock::new(10);
        assert_eq!(node.sample_or_compute([f64::NAN; 2], &mut source, &clock), 3.0);
        assert_eq!(node.sample_time(), None);
    }

    #[test]
    fn test_reset_extrema() {
        let mut node = voltage();
        let mut source = FixedSource::new(1);
        let clock = ManualClock::new(0);
        for raw in [1000, 3000, 2000] {
            source.set_raw(0, raw);
            node.sample_or_compute([f64::NAN; 2], &mut source, &clock);
        }
        assert_eq!(node.min(), 4.0);
        assert_eq!(node.max(), 12.0);
        node.reset_extrema();
        assert!(node.min().is_nan());
        assert!(node.max().is_nan());
    }

    #[test]
    fn test_formatted_value() {
        let mut node = constant(24.0);
        assert_eq!(node.formatted_value(), "24.000");
        let clock = ManualClock::new(0);
        node.set_value(1.5, &clock);
        assert_eq!(node.formatted_value(), "1.500");
    }

    #[test]
    fn test_publish_due_consumes_change_once() {
        let mut node = constant(1.0);
        let clock = ManualClock::new(0);
        node.subscribe(100, 0).unwrap();
        node.set_value(2.0, &clock);

        clock.set(100);
        assert!(node.is_publish_due(&clock));
        assert!(!node.has_changed());
        assert!(!node.is_publish_due(&clock));
    }

    #[test]
    fn test_publish_due_across_wrap() {
        let mut node = constant(1.0);
        let clock = ManualClock::new(u32::MAX - 99);
        node.subscribe_interval(500).unwrap();
        node.mark_published(clock.now());

        clock.advance(400);
        assert!(!node.is_publish_due(&clock));
        clock.advance(100);
        assert!(node.is_publish_due(&clock));
    }

    #[test]
    fn test_unsubscribe() {
        let mut node = constant(1.0);
        let clock = ManualClock::new(10_000);
        node.subscribe_interval(10).unwrap();
        node.unsubscribe();
        assert_eq!(node.policy(), PublishPolicy::Off);
        assert!(!node.is_publish_due(&clock));
    }

    #[test]
    fn test_resubscribe_restarts_publish_base() {
        let mut node = constant(1.0);
        let clock = ManualClock::new(10_000);
        node.subscribe_interval(500).unwrap();
        node.mark_published(clock.now());
        clock.advance(100);
        assert!(!node.is_publish_due(&clock));

        // Same base whether or not the node was unsubscribed first
        node.subscribe_interval(500).unwrap();
        assert_eq!(node.state().last_publish, 0);
        assert!(node.is_publish_due(&clock));

        node.mark_published(clock.now());
        node.unsubscribe();
        node.subscribe(100, 1_000).unwrap();
        assert_eq!(node.state().last_publish, 0);
        assert!(node.is_publish_due(&clock));
    }

    #[test]
    fn test_reset_refused_for_sampled() {
        let mut node = voltage();
        let clock = ManualClock::new(0);
        assert!(!node.reset(&clock));
    }
}
