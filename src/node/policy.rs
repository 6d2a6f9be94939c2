// EMon - Energy monitoring metric broker
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Publish policies
//!
//! A policy only looks at two facts: milliseconds since the node was last
//! published, and whether its value changed since then.

use crate::error::SubscriptionError;

/// When a node should be pushed to the subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishPolicy {
    /// Not subscribed
    #[default]
    Off,
    /// Publish changed values no more often than `min_interval_ms`, and
    /// force a heartbeat every `max_interval_ms` (0 = no heartbeat)
    OnChange {
        min_interval_ms: u32,
        max_interval_ms: u32,
    },
    /// Publish every `interval_ms` whether or not the value changed
    OnInterval { interval_ms: u32 },
}

impl PublishPolicy {
    /// Build an on-change policy
    pub fn on_change(min_interval_ms: u32, max_interval_ms: u32) -> Result<Self, SubscriptionError> {
        if min_interval_ms == 0 {
            return Err(SubscriptionError::ZeroInterval);
        }
        if max_interval_ms != 0 && max_interval_ms < min_interval_ms {
            return Err(SubscriptionError::MaxBelowMin {
                min_ms: min_interval_ms,
                max_ms: max_interval_ms,
            });
        }
        Ok(Self::OnChange {
            min_interval_ms,
            max_interval_ms,
        })
    }

    /// Build a periodic policy
    pub fn on_interval(interval_ms: u32) -> Result<Self, SubscriptionError> {
        if interval_ms == 0 {
            return Err(SubscriptionError::ZeroInterval);
        }
        Ok(Self::OnInterval { interval_ms })
    }

    /// Whether any publishing is configured
    pub fn is_subscribed(&self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Decide from the time since the last publish and the change state
    pub fn is_due(&self, since_publish_ms: u32, changed: bool) -> bool {
        match *self {
            Self::Off => false,
            Self::OnChange {
                min_interval_ms,
                max_interval_ms,
            } => {
                let heartbeat = max_interval_ms != 0 && since_publish_ms >= max_interval_ms;
                (changed && since_publish_ms >= min_interval_ms) || heartbeat
            }
            Self::OnInterval { interval_ms } => since_publish_ms >= interval_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_is_never_due() {
        assert!(!PublishPolicy::Off.is_due(u32::MAX, true));
        assert!(!PublishPolicy::Off.is_subscribed());
    }

    #[test]
    fn test_on_change_respects_minimum() {
        let policy = PublishPolicy::on_change(100, 1000).unwrap();
        assert!(!policy.is_due(50, true));
        assert!(policy.is_due(100, true));
        assert!(!policy.is_due(999, false));
    }

    #[test]
    fn test_on_change_heartbeat() {
        let policy = PublishPolicy::on_change(100, 1000).unwrap();
        assert!(policy.is_due(1000, false));
        let no_heartbeat = PublishPolicy::on_change(100, 0).unwrap();
        assert!(!no_heartbeat.is_due(u32::MAX, false));
    }

    #[test]
    fn test_on_interval_ignores_change() {
        let policy = PublishPolicy::on_interval(500).unwrap();
        assert!(!policy.is_due(499, true));
        assert!(policy.is_due(500, false));
    }

    #[test]
    fn test_invalid_policies() {
        assert_eq!(
            PublishPolicy::on_change(0, 100),
            Err(SubscriptionError::ZeroInterval)
        );
        assert_eq!(
            PublishPolicy::on_interval(0),
            Err(SubscriptionError::ZeroInterval)
        );
        assert!(matches!(
            PublishPolicy::on_change(500, 100),
            Err(SubscriptionError::MaxBelowMin { .. })
        ));
    }
}
