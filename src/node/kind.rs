// EMon - Energy monitoring metric broker
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Node variants
//!
//! Every node is one of a closed set of kinds. Each kind is a plain config
//! struct implementing [`Metric`]; [`NodeKind`] dispatches with a `match`.
//! Kinds hold no mutable state: cached value, extrema and timestamps live in
//! the owning [`Node`](super::Node), and upstream values arrive through
//! [`Inputs`].

use log::warn;

use crate::error::ConfigError;
use crate::registry::NodeId;
use crate::source::SampleSource;
use crate::time::MS_PER_HOUR;

/// Maximum number of upstream nodes a kind can read
pub const MAX_UPSTREAM: usize = 2;

/// Upstream references of a node, in input order
pub type Upstream = [Option<NodeId>; MAX_UPSTREAM];

/// What a kind sees when it is evaluated
#[derive(Debug, Clone, Copy)]
pub struct Inputs {
    /// Cached values of the upstream nodes (`NaN` where absent)
    pub upstream: [f64; MAX_UPSTREAM],
    /// The node's own cached value
    pub current: f64,
    /// Milliseconds since the node's time window opened, if it is open
    pub elapsed_ms: Option<u32>,
}

/// Outcome of evaluating a kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    /// A new value; `NaN` is treated as [`Evaluation::Undefined`]
    Value(f64),
    /// The value cannot be determined this time
    Undefined,
    /// Keep the cached value and do not count this as a sample
    Hold,
    /// Like [`Evaluation::Hold`], and also close the time window so the
    /// next defined step only reopens it
    Skip,
}

/// Capability shared by all node kinds
pub trait Metric {
    /// Nodes whose cached values this kind reads
    fn upstream(&self) -> Upstream {
        [None; MAX_UPSTREAM]
    }

    /// Whether external writes are refused
    fn read_only(&self) -> bool;

    /// Produce a new value
    fn evaluate(&self, inputs: &Inputs, source: &mut dyn SampleSource) -> Evaluation;
}

/// A value that only changes on external command
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    /// Value before any write
    pub initial: f64,
    /// Refuse external writes
    pub read_only: bool,
}

impl Constant {
    /// A settable constant
    pub fn settable(initial: f64) -> Self {
        Self {
            initial,
            read_only: false,
        }
    }

    /// A fixed constant
    pub fn fixed(initial: f64) -> Self {
        Self {
            initial,
            read_only: true,
        }
    }
}

impl Metric for Constant {
    fn read_only(&self) -> bool {
        self.read_only
    }

    fn evaluate(&self, _inputs: &Inputs, _source: &mut dyn SampleSource) -> Evaluation {
        Evaluation::Hold
    }
}

/// Zero-offset correction applied to a raw reading before scaling
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bias {
    /// No correction
    None,
    /// Subtract a fixed number of millivolts
    Millivolts(f64),
    /// Subtract `fraction` of a supply node's cached voltage (in volts)
    SupplyFraction { supply: NodeId, fraction: f64 },
}

/// A leaf read from one converter channel
///
/// `value = max(mV - bias_mV, 0) * gain / millivolts_per_unit`
#[derive(Debug, Clone, PartialEq)]
pub struct Sampled {
    /// Converter channel
    pub channel: u8,
    /// Ratio applied to the corrected reading (e.g. a resistor divider)
    pub gain: f64,
    /// Millivolts at the pin per engineering unit, after gain
    pub millivolts_per_unit: f64,
    /// Zero-offset correction
    pub bias: Bias,
}

impl Sampled {
    /// A voltage behind a `high`/`low` resistor divider, in volts
    pub fn voltage_divider(channel: u8, high: f64, low: f64) -> Result<Self, ConfigError> {
        if !(low > 0.0 && high >= 0.0 && high.is_finite() && low.is_finite()) {
            return Err(ConfigError::InvalidDivider { high, low });
        }
        Ok(Self {
            channel,
            gain: (high + low) / low,
            millivolts_per_unit: 1000.0,
            bias: Bias::None,
        })
    }

    /// A hall-effect current sensor, in amps
    ///
    /// The sensor idles at `fraction` of the supply voltage read from
    /// `supply`; that offset is removed before dividing by `mv_per_amp`.
    pub fn hall_current(channel: u8, mv_per_amp: f64, supply: NodeId, fraction: f64) -> Self {
        Self {
            channel,
            gain: 1.0,
            millivolts_per_unit: mv_per_amp,
            bias: Bias::SupplyFraction { supply, fraction },
        }
    }

    /// Replace the bias
    pub fn with_bias(mut self, bias: Bias) -> Self {
        self.bias = bias;
        self
    }

    /// Check the conversion factors
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.gain.is_finite() && self.gain > 0.0) {
            return Err(ConfigError::InvalidFactor {
                field: "gain",
                value: self.gain,
            });
        }
        if !(self.millivolts_per_unit.is_finite() && self.millivolts_per_unit > 0.0) {
            return Err(ConfigError::InvalidFactor {
                field: "millivolts_per_unit",
                value: self.millivolts_per_unit,
            });
        }
        match self.bias {
            Bias::Millivolts(mv) if !(mv.is_finite() && mv >= 0.0) => {
                Err(ConfigError::InvalidFactor {
                    field: "bias",
                    value: mv,
                })
            }
            Bias::SupplyFraction { fraction, .. } if !(fraction.is_finite() && fraction >= 0.0) => {
                Err(ConfigError::InvalidFactor {
                    field: "fraction",
                    value: fraction,
                })
            }
            _ => Ok(()),
        }
    }

    /// Engineering value for a reading of `millivolts`
    ///
    /// Readings below the bias clamp to zero. An undefined supply makes the
    /// result undefined.
    pub fn convert(&self, millivolts: f64, supply_volts: f64) -> f64 {
        let bias_mv = match self.bias {
            Bias::None => 0.0,
            Bias::Millivolts(mv) => mv,
            Bias::SupplyFraction { fraction, .. } => supply_volts * 1000.0 * fraction,
        };
        if bias_mv.is_nan() {
            return f64::NAN;
        }
        let corrected = if millivolts > bias_mv {
            millivolts - bias_mv
        } else {
            0.0
        };
        corrected * self.gain / self.millivolts_per_unit
    }
}

impl Metric for Sampled {
    fn upstream(&self) -> Upstream {
        match self.bias {
            Bias::SupplyFraction { supply, .. } => [Some(supply), None],
            _ => [None; MAX_UPSTREAM],
        }
    }

    fn read_only(&self) -> bool {
        true
    }

    fn evaluate(&self, inputs: &Inputs, source: &mut dyn SampleSource) -> Evaluation {
        match source.read_millivolts(self.channel) {
            Ok(mv) => Evaluation::Value(self.convert(mv, inputs.upstream[0])),
            Err(e) => {
                warn!("sample of channel {} failed: {}", self.channel, e);
                Evaluation::Undefined
            }
        }
    }
}

/// Product of two upstream values, e.g. power from voltage and current
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub lhs: NodeId,
    pub rhs: NodeId,
}

impl Product {
    pub fn new(lhs: NodeId, rhs: NodeId) -> Self {
        Self { lhs, rhs }
    }
}

impl Metric for Product {
    fn upstream(&self) -> Upstream {
        [Some(self.lhs), Some(self.rhs)]
    }

    fn read_only(&self) -> bool {
        true
    }

    fn evaluate(&self, inputs: &Inputs, _source: &mut dyn SampleSource) -> Evaluation {
        Evaluation::Value(inputs.upstream[0] * inputs.upstream[1])
    }
}

/// Running total of an upstream flow, e.g. energy from power
///
/// Each step adds `flow * elapsed_ms / ms_per_unit`, treating the flow as
/// constant since the previous step (rectangular integration). The error
/// grows with the sampling interval relative to how fast the flow moves.
#[derive(Debug, Clone, PartialEq)]
pub struct Integral {
    /// Flow node
    pub source: NodeId,
    /// Milliseconds per unit of time in the total (3 600 000 for Wh from W)
    pub ms_per_unit: u32,
}

impl Integral {
    /// Hourly integration (W -> Wh)
    pub fn hourly(source: NodeId) -> Self {
        Self {
            source,
            ms_per_unit: MS_PER_HOUR,
        }
    }

    /// Check the time base
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ms_per_unit == 0 {
            return Err(ConfigError::InvalidFactor {
                field: "ms_per_unit",
                value: 0.0,
            });
        }
        Ok(())
    }
}

impl Metric for Integral {
    fn upstream(&self) -> Upstream {
        [Some(self.source), None]
    }

    fn read_only(&self) -> bool {
        false
    }

    fn evaluate(&self, inputs: &Inputs, _source: &mut dyn SampleSource) -> Evaluation {
        let flow = inputs.upstream[0];
        // An undefined flow contributes nothing, including the time it
        // stayed undefined.
        if flow.is_nan() {
            return Evaluation::Skip;
        }
        let total = if inputs.current.is_nan() {
            0.0
        } else {
            inputs.current
        };
        match inputs.elapsed_ms {
            // First step only opens the window.
            None => Evaluation::Value(total),
            Some(dt) => Evaluation::Value(total + flow * dt as f64 / self.ms_per_unit as f64),
        }
    }
}

/// The closed set of node kinds
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Constant(Constant),
    Sampled(Sampled),
    Product(Product),
    Integral(Integral),
}

impl NodeKind {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Constant(_) => "constant",
            Self::Sampled(_) => "sampled",
            Self::Product(_) => "product",
            Self::Integral(_) => "integral",
        }
    }

    /// Whether the node changes only by external command
    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }

    /// Check kind-specific parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Constant(_) | Self::Product(_) => Ok(()),
            Self::Sampled(k) => k.validate(),
            Self::Integral(k) => k.validate(),
        }
    }

    fn as_metric(&self) -> &dyn Metric {
        match self {
            Self::Constant(k) => k,
            Self::Sampled(k) => k,
            Self::Product(k) => k,
            Self::Integral(k) => k,
        }
    }
}

impl Metric for NodeKind {
    fn upstream(&self) -> Upstream {
        self.as_metric().upstream()
    }

    fn read_only(&self) -> bool {
        self.as_metric().read_only()
    }

    fn evaluate(&self, inputs: &Inputs, source: &mut dyn SampleSource) -> Evaluation {
        self.as_metric().evaluate(inputs, source)
    }
}
