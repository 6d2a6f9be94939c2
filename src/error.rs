// EMon - Energy monitoring metric broker
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for EMon
//!
//! Errors only cover construction, configuration and lookup. Value-level
//! failures never surface here: an undefined reading is a `NaN` value and a
//! refused write is a `false` return.

use thiserror::Error;

/// Result type alias for EMon operations
pub type Result<T> = std::result::Result<T, EmonError>;

/// Main error type for EMon operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmonError {
    /// Node configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Raw sample source error
    #[error("Sample error: {0}")]
    Sample(#[from] SampleError),

    /// Registry error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Subscription error
    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),
}

/// Errors in node construction parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Node name is empty
    #[error("Node name is empty")]
    EmptyName,

    /// Node name does not fit the fixed capacity
    #[error("Name too long: '{name}' exceeds {max} bytes")]
    NameTooLong { name: String, max: usize },

    /// Unit label does not fit the fixed capacity
    #[error("Unit too long: '{unit}' exceeds {max} bytes")]
    UnitTooLong { unit: String, max: usize },

    /// Precision outside the supported range
    #[error("Invalid precision {precision}: maximum is {max}")]
    InvalidPrecision { precision: u8, max: u8 },

    /// Divider resistor values that cannot form a ratio
    #[error("Invalid divider: high={high}, low={low}")]
    InvalidDivider { high: f64, low: f64 },

    /// A conversion factor that is zero, negative or not finite
    #[error("Invalid {field}: {value}")]
    InvalidFactor { field: &'static str, value: f64 },
}

/// Errors reported by a raw sample source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    /// The device transaction failed
    #[error("Read failed on channel {channel}")]
    ReadFailed { channel: u8 },

    /// The channel does not exist on this source
    #[error("Channel {channel} out of range (source has {available})")]
    ChannelOutOfRange { channel: u8, available: usize },
}

/// Errors while building or addressing the node registry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// No node with this name
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// A node with this name already exists
    #[error("Node already exists: {0}")]
    DuplicateName(String),

    /// An upstream reference that is not (yet) registered
    #[error("Node '{node}' references unknown upstream #{upstream}")]
    UnknownUpstream { node: String, upstream: usize },

    /// Registry capacity reached
    #[error("Maximum nodes ({max}) reached")]
    Full { max: usize },
}

/// Errors in publish policy parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubscriptionError {
    /// A zero publish interval
    #[error("Publish interval must be non-zero")]
    ZeroInterval,

    /// Heartbeat shorter than the minimum interval
    #[error("Maximum interval {max_ms}ms is shorter than minimum {min_ms}ms")]
    MaxBelowMin { min_ms: u32, max_ms: u32 },
}
