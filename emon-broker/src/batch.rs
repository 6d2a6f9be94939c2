// EMon Broker - Subscription scheduling and publishing
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Batches of published values
//!
//! A [`Batch`] is everything one scheduling pass hands to the
//! [`Publisher`](crate::Publisher): the due nodes in registry order, each with
//! its fresh value, plus the time of the message. Encoding is left to the
//! publisher.

use emon::Node;

/// One node's contribution to a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// Node name
    pub name: String,
    /// Unit label
    pub unit: String,
    /// Fresh value; `NaN` when it could not be determined
    pub value: f64,
    /// Minimum since the last reset (verbose nodes only)
    pub min: Option<f64>,
    /// Maximum since the last reset (verbose nodes only)
    pub max: Option<f64>,
    /// Stamp of the sample the value comes from
    pub sample_time: String,
    /// Decimals the node is rendered with
    pub precision: u8,
}

impl BatchEntry {
    /// Capture a node's current state
    pub fn from_node(node: &Node) -> Self {
        let verbose = node.is_verbose();
        Self {
            name: node.name().to_string(),
            unit: node.unit().to_string(),
            value: node.value(),
            min: verbose.then(|| node.min()),
            max: verbose.then(|| node.max()),
            sample_time: node.sample_time_str().to_string(),
            precision: node.config().precision,
        }
    }

    /// Whether the value could not be determined
    pub fn is_undefined(&self) -> bool {
        self.value.is_nan()
    }
}

/// Values published together in one message
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Stamp of the scheduling pass
    pub message_time: String,
    /// Time zone label of `message_time`
    pub time_zone: String,
    /// Entries in registry order
    pub entries: Vec<BatchEntry>,
}

impl Batch {
    /// Create an empty batch
    pub fn new(message_time: impl Into<String>, time_zone: impl Into<String>) -> Self {
        Self {
            message_time: message_time.into(),
            time_zone: time_zone.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: BatchEntry) {
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Get an entry by node name
    pub fn get(&self, name: &str) -> Option<&BatchEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Entry names in order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }
}
