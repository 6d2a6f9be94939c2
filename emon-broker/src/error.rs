// EMon Broker - Subscription scheduling and publishing
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for EMon Broker

use thiserror::Error;

/// Main error type for Broker operations
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Error from the node model
    #[error("Node error: {0}")]
    Node(#[from] emon::EmonError),

    /// The publisher could not deliver a batch
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error while writing a message
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Broker operations
pub type Result<T> = std::result::Result<T, BrokerError>;
