// EMon - Energy monitoring metric broker
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Node registry
//!
//! The [`Registry`] owns every node. Derived nodes refer to their inputs by
//! [`NodeId`], a plain index into the registry, and an upstream must already
//! be registered when its dependent is added. Registry order is therefore a
//! valid evaluation order and the dependency graph cannot contain a cycle.

use std::collections::HashMap;

use log::debug;

use crate::clock::ClockSource;
use crate::error::{RegistryError, Result};
use crate::node::{Metric, Node, NodeConfig, NodeKind, MAX_UPSTREAM};
use crate::source::SampleSource;

/// Index of a node in its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[cfg(test)]
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Position in registry order
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Default registry capacity
pub const DEFAULT_MAX_NODES: usize = 32;

/// Arena of nodes in evaluation order
#[derive(Debug, Clone)]
pub struct Registry {
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeId>,
    max_nodes: usize,
}

impl Registry {
    /// Create a registry holding at most `max_nodes` nodes
    pub fn new(max_nodes: usize) -> Self {
        Self {
            nodes: Vec::new(),
            by_name: HashMap::new(),
            max_nodes,
        }
    }

    /// Add a node after every node it reads from
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration or kind parameters are invalid
    /// - A node with the same name already exists
    /// - An upstream reference is not registered yet
    /// - The registry is full
    pub fn add(&mut self, config: NodeConfig, kind: NodeKind) -> Result<NodeId> {
        config.validate()?;
        kind.validate()?;

        if self.by_name.contains_key(&config.name) {
            return Err(RegistryError::DuplicateName(config.name).into());
        }
        if self.nodes.len() >= self.max_nodes {
            return Err(RegistryError::Full {
                max: self.max_nodes,
            }
            .into());
        }
        for upstream in kind.upstream().iter().flatten() {
            if upstream.0 >= self.nodes.len() {
                return Err(RegistryError::UnknownUpstream {
                    node: config.name,
                    upstream: upstream.0,
                }
                .into());
            }
        }

        let id = NodeId(self.nodes.len());
        debug!("registered {} node '{}' as #{}", kind.label(), config.name, id.0);
        self.by_name.insert(config.name.clone(), id);
        self.nodes.push(Node::new(config, kind));
        Ok(id)
    }

    /// Look up a node by name
    pub fn find(&self, name: &str) -> Result<NodeId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::NodeNotFound(name.to_string()).into())
    }

    /// Get a node. Ids come from this registry, so this cannot miss.
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Cached value of a node
    pub fn value(&self, id: NodeId) -> f64 {
        self.nodes[id.0].value()
    }

    /// Sample or compute a node from its upstreams' cached values.
    ///
    /// Upstream nodes are read, never re-sampled.
    pub fn sample<S, C>(&mut self, id: NodeId, source: &mut S, clock: &C) -> f64
    where
        S: SampleSource,
        C: ClockSource + ?Sized,
    {
        let mut upstream = [f64::NAN; MAX_UPSTREAM];
        for (slot, input) in upstream.iter_mut().zip(self.nodes[id.0].kind().upstream()) {
            if let Some(input) = input {
                *slot = self.nodes[input.0].value();
            }
        }
        self.nodes[id.0].sample_or_compute(upstream, source, clock)
    }

    /// Sample every non-constant node once, in registry order
    pub fn refresh<S, C>(&mut self, source: &mut S, clock: &C)
    where
        S: SampleSource,
        C: ClockSource + ?Sized,
    {
        for index in 0..self.nodes.len() {
            if !self.nodes[index].kind().is_constant() {
                self.sample(NodeId(index), source, clock);
            }
        }
    }

    /// Node ids in registry order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Nodes in registry order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Node names in registry order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.name())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NODES)
    }
}
