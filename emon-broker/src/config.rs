// EMon Broker - Subscription scheduling and publishing
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Configuration types for EMon Broker

#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};

use crate::error::{BrokerError, Result};

/// Broker-level configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "json", serde(default))]
pub struct BrokerConfig {
    /// Maximum number of nodes
    pub max_nodes: usize,

    /// Sample every node once per poll, before deciding what is due, so
    /// on-change policies see fresh values.
    ///
    /// This reads every sampled channel on every poll, subscribed or not.
    /// Turn it off to read only the nodes that are due; on-change nodes then
    /// only see changes made by explicit samples and writes.
    pub refresh_before_publish: bool,

    /// Label attached to the message time of every batch
    pub time_zone: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_nodes: emon::registry::DEFAULT_MAX_NODES,
            refresh_before_publish: true,
            time_zone: "UTC".to_string(),
        }
    }
}

impl BrokerConfig {
    /// Create a configuration with a custom node capacity
    pub fn with_max_nodes(max_nodes: usize) -> Self {
        Self {
            max_nodes,
            ..Default::default()
        }
    }

    /// Create a configuration where only publishing triggers sampling
    pub fn publish_only() -> Self {
        Self {
            refresh_before_publish: false,
            ..Default::default()
        }
    }

    /// Check the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_nodes == 0 {
            return Err(BrokerError::InvalidConfig(
                "max_nodes must be at least 1".to_string(),
            ));
        }
        if self.time_zone.is_empty() {
            return Err(BrokerError::InvalidConfig(
                "time_zone must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    #[cfg(feature = "json")]
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| BrokerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
