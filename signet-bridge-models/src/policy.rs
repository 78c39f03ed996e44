use crate::constants::{DEFAULT_LIVENESS_INTERVAL_MS, DEFAULT_REDELIVERY_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cadence and bound for a delivery-until-acknowledged loop.
///
/// The reference behavior is a fixed 1000 ms cadence with no attempt bound;
/// deployments that want a hard stop configure `max_attempts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeliveryPolicy {
    /// Fixed re-send interval in milliseconds.
    #[serde(default = "RedeliveryPolicy::default_interval_ms")]
    pub interval_ms: u64,
    /// Maximum number of sends, `None` for unbounded.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl RedeliveryPolicy {
    fn default_interval_ms() -> u64 {
        DEFAULT_REDELIVERY_INTERVAL_MS
    }

    /// Re-send forever until acknowledged or the channel closes.
    pub fn unbounded() -> Self {
        Self {
            interval_ms: Self::default_interval_ms(),
            max_attempts: None,
        }
    }

    /// Stop after at most `attempts` sends.
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            interval_ms: Self::default_interval_ms(),
            max_attempts: Some(attempts),
        }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Poll cadence for the popup liveness monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessPolicy {
    /// Poll interval in milliseconds.
    #[serde(default = "LivenessPolicy::default_interval_ms")]
    pub interval_ms: u64,
}

impl LivenessPolicy {
    fn default_interval_ms() -> u64 {
        DEFAULT_LIVENESS_INTERVAL_MS
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self {
            interval_ms: Self::default_interval_ms(),
        }
    }
}

/// Optional deadlines for a connection attempt.
///
/// Both bounds default to unbounded, matching the reference behavior of
/// relying on the visible popup and manual cancel instead of timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionPolicy {
    /// Bound, in milliseconds, on reaching `ready` from `connecting`.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    /// Bound, in milliseconds, on reaching a terminal phase.
    #[serde(default)]
    pub overall_timeout_ms: Option<u64>,
}

impl SessionPolicy {
    #[inline]
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    #[inline]
    pub fn overall_timeout(&self) -> Option<Duration> {
        self.overall_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redelivery_defaults_to_reference_cadence() {
        let policy = RedeliveryPolicy::default();
        assert_eq!(policy.interval(), Duration::from_millis(1000));
        assert_eq!(policy.max_attempts, None);
    }

    #[test]
    fn redelivery_deserializes_with_partial_fields() {
        let policy: RedeliveryPolicy = serde_json::from_str(r#"{"max_attempts": 5}"#).unwrap();
        assert_eq!(policy.interval_ms, 1000);
        assert_eq!(policy.max_attempts, Some(5));
    }

    #[test]
    fn session_policy_defaults_unbounded() {
        let policy = SessionPolicy::default();
        assert!(policy.connect_timeout().is_none());
        assert!(policy.overall_timeout().is_none());
    }
}
