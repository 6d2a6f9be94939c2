// EMon - Energy monitoring metric broker
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Node identity and formatting configuration

use crate::error::ConfigError;

/// Maximum name length in bytes
pub const NAME_CAPACITY: usize = 14;

/// Maximum unit label length in bytes
pub const UNIT_CAPACITY: usize = 4;

/// Default rendering width
pub const DEFAULT_WIDTH: u8 = 5;

/// Default number of decimals
pub const DEFAULT_PRECISION: u8 = 3;

/// Largest supported number of decimals
pub const MAX_PRECISION: u8 = 9;

/// Identity and presentation of a node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    /// Node name, unique within a registry
    pub name: String,
    /// Unit label
    pub unit: String,
    /// Minimum rendering width
    pub width: u8,
    /// Decimals when rendering
    pub precision: u8,
    /// Publish extrema alongside the value
    pub verbose: bool,
}

impl NodeConfig {
    /// Create a configuration with default formatting
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            width: DEFAULT_WIDTH,
            precision: DEFAULT_PRECISION,
            verbose: true,
        }
    }

    /// Set rendering width and precision
    pub fn with_format(mut self, width: u8, precision: u8) -> Self {
        self.width = width;
        self.precision = precision;
        self
    }

    /// Set whether extrema are published
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Effective width; never narrower than the precision
    pub fn display_width(&self) -> u8 {
        self.width.max(self.precision)
    }

    /// Check the fixed-capacity and formatting limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.name.len() > NAME_CAPACITY {
            return Err(ConfigError::NameTooLong {
                name: self.name.clone(),
                max: NAME_CAPACITY,
            });
        }
        if self.unit.len() > UNIT_CAPACITY {
            return Err(ConfigError::UnitTooLong {
                unit: self.unit.clone(),
                max: UNIT_CAPACITY,
            });
        }
        if self.precision > MAX_PRECISION {
            return Err(ConfigError::InvalidPrecision {
                precision: self.precision,
                max: MAX_PRECISION,
            });
        }
        Ok(())
    }
}
