// EMon Broker - Subscription scheduling and publishing
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Subscription scheduler
//!
//! The [`Scheduler`] runs one pass over the registry per control-loop
//! iteration:
//!
//! 1. ask every node whether it is due,
//! 2. sample or compute each due node, in registry order,
//! 3. hand the batch to the publisher and mark the nodes published.
//!
//! Derived nodes read cached upstream values. Because upstream nodes are
//! always registered first, a derived node due in the same pass as its
//! upstream sees the value sampled moments earlier.

use emon::{ClockSource, NodeId, Registry, SampleSource};
use log::{debug, warn};

use crate::batch::{Batch, BatchEntry};
use crate::error::Result;
use crate::publisher::Publisher;

/// Decides which nodes are due and publishes them as one batch
#[derive(Debug, Clone)]
pub struct Scheduler {
    time_zone: String,
    runs: u64,
    batches: u64,
}

impl Scheduler {
    /// Create a scheduler stamping batches with `time_zone`
    pub fn new(time_zone: impl Into<String>) -> Self {
        Self {
            time_zone: time_zone.into(),
            runs: 0,
            batches: 0,
        }
    }

    /// Nodes due now, in registry order.
    ///
    /// Consumes the change flag of every node returned.
    pub fn due<C>(&self, registry: &mut Registry, clock: &C) -> Vec<NodeId>
    where
        C: ClockSource + ?Sized,
    {
        let ids: Vec<NodeId> = registry.ids().collect();
        ids.into_iter()
            .filter(|id| registry.get_mut(*id).is_publish_due(clock))
            .collect()
    }

    /// Run one scheduling pass.
    ///
    /// Returns the published batch, or `None` when nothing was due. Nodes
    /// with an undefined value are published with `NaN`, never dropped. If
    /// the publisher fails, no node is marked published and consumed change
    /// flags are raised again.
    pub fn run<S, C, P>(
        &mut self,
        registry: &mut Registry,
        source: &mut S,
        clock: &C,
        publisher: &mut P,
    ) -> Result<Option<Batch>>
    where
        S: SampleSource,
        C: ClockSource + ?Sized,
        P: Publisher + ?Sized,
    {
        self.pass(registry, clock, publisher, |registry, id| {
            registry.sample(id, source, clock);
        })
    }

    /// Run one scheduling pass over values already refreshed at this tick.
    ///
    /// Same as [`Scheduler::run`] without the second read of every due node.
    /// Only correct right after [`Registry::refresh`] at the current tick.
    pub fn run_refreshed<C, P>(
        &mut self,
        registry: &mut Registry,
        clock: &C,
        publisher: &mut P,
    ) -> Result<Option<Batch>>
    where
        C: ClockSource + ?Sized,
        P: Publisher + ?Sized,
    {
        self.pass(registry, clock, publisher, |_, _| {})
    }

    fn pass<C, P, F>(
        &mut self,
        registry: &mut Registry,
        clock: &C,
        publisher: &mut P,
        mut evaluate: F,
    ) -> Result<Option<Batch>>
    where
        C: ClockSource + ?Sized,
        P: Publisher + ?Sized,
        F: FnMut(&mut Registry, NodeId),
    {
        self.runs += 1;
        let now = clock.now();
        let changed: Vec<NodeId> = registry
            .iter()
            .filter(|(_, node)| node.has_changed())
            .map(|(id, _)| id)
            .collect();
        let due = self.due(registry, clock);
        if due.is_empty() {
            return Ok(None);
        }

        let mut batch = Batch::new(clock.stamp(now), self.time_zone.as_str());
        for id in &due {
            evaluate(registry, *id);
            batch.push(BatchEntry::from_node(registry.get(*id)));
        }

        if let Err(e) = publisher.publish(&batch) {
            for id in due.iter().filter(|id| changed.contains(id)) {
                registry.get_mut(*id).mark_changed();
            }
            warn!("publish of {} node(s) at tick {} failed: {}", batch.len(), now, e);
            return Err(e);
        }

        for id in &due {
            registry.get_mut(*id).mark_published(now);
        }
        self.batches += 1;
        debug!("published {} node(s) at tick {}", batch.len(), now);
        Ok(Some(batch))
    }

    /// Number of passes run
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Number of batches published
    pub fn batches(&self) -> u64 {
        self.batches
    }

    pub fn time_zone(&self) -> &str {
        &self.time_zone
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new("UTC")
    }
}
