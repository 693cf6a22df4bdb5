use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Legacy advertising event type ([Vol 4] Part E, Section 7.8.5).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub enum AdvType {
    /// Connectable and scannable undirected advertising.
    #[default]
    ConnectableScannableUndirected,
    /// Connectable high duty cycle directed advertising.
    ConnectableDirected,
    /// Scannable undirected advertising.
    ScannableUndirected,
    /// Non-connectable undirected advertising.
    NonConnectableUndirected,
}

/// Advertising filter policy ([Vol 4] Part E, Section 7.8.5).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub enum AdvFilterPolicy {
    /// Process scan and connection requests from all devices.
    #[default]
    Any,
    /// Process scan requests only from devices in the filter accept list.
    FilterScanRequests,
    /// Process connection requests only from devices in the filter accept
    /// list.
    FilterConnectRequests,
    /// Process all requests only from devices in the filter accept list.
    FilterBoth,
}

/// Advertising parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdvParams {
    pub typ: AdvType,
    pub filter_policy: AdvFilterPolicy,
    /// Advertising interval.
    pub interval: Duration,
    /// Advertising duration. [`Duration::ZERO`] advertises until stopped.
    pub timeout: Duration,
    /// Whether the radio includes the TX power level in advertising PDUs.
    pub include_tx_power: bool,
}

impl AdvParams {
    /// Minimum advertising interval ([Vol 4] Part E, Section 7.8.5).
    pub const MIN_INTERVAL: Duration = Duration::from_micros(20_000);
    /// Maximum advertising interval ([Vol 4] Part E, Section 7.8.5).
    pub const MAX_INTERVAL: Duration = Duration::from_micros(10_240_000);

    /// Returns whether the interval is within the allowed range.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (Self::MIN_INTERVAL..=Self::MAX_INTERVAL).contains(&self.interval)
    }
}

impl Default for AdvParams {
    fn default() -> Self {
        Self {
            typ: AdvType::default(),
            filter_policy: AdvFilterPolicy::default(),
            interval: Duration::from_millis(100),
            timeout: Duration::ZERO,
            include_tx_power: false,
        }
    }
}

/// Scan filter policy ([Vol 4] Part E, Section 7.8.10).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub enum ScanFilterPolicy {
    /// Accept all advertising packets.
    #[default]
    AcceptAll,
    /// Accept advertising packets only from devices in the filter accept list.
    FilterAcceptList,
}

/// Scanning parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanParams {
    /// Whether to send scan requests to obtain scan response data.
    pub active: bool,
    pub filter_policy: ScanFilterPolicy,
    /// Time between the starts of consecutive scan windows.
    pub interval: Duration,
    /// Duration of each scan window. Must not exceed `interval`.
    pub window: Duration,
    /// Scan duration. [`Duration::ZERO`] scans until stopped.
    pub timeout: Duration,
}

impl ScanParams {
    /// Returns whether the window fits in the interval.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.window.is_zero() && self.window <= self.interval
    }
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            active: true,
            filter_policy: ScanFilterPolicy::default(),
            interval: Duration::from_millis(100),
            window: Duration::from_millis(50),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Connection parameters ([Vol 6] Part B, Section 4.5.1). The same type
/// describes the peripheral preferred connection parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnParams {
    pub min_interval: Duration,
    pub max_interval: Duration,
    /// Number of connection events the peripheral may skip.
    pub latency: u16,
    /// Supervision timeout.
    pub timeout: Duration,
}

impl ConnParams {
    /// Minimum connection interval.
    pub const MIN_INTERVAL: Duration = Duration::from_micros(7_500);
    /// Maximum connection interval.
    pub const MAX_INTERVAL: Duration = Duration::from_secs(4);

    /// Returns parameters with a fixed connection interval.
    #[inline]
    #[must_use]
    pub const fn with_interval(mut self, v: Duration) -> Self {
        self.min_interval = v;
        self.max_interval = v;
        self
    }

    /// Returns whether the intervals are ordered and within the allowed
    /// range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let r = Self::MIN_INTERVAL..=Self::MAX_INTERVAL;
        r.contains(&self.min_interval)
            && r.contains(&self.max_interval)
            && self.min_interval <= self.max_interval
            && self.latency <= 499
    }
}

impl Default for ConnParams {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(30),
            max_interval: Duration::from_millis(50),
            latency: 0,
            timeout: Duration::from_secs(5),
        }
    }
}
