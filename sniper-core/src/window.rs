//! Time-of-day gating and cumulative volume state.
//!
//! The required volume ratio grows through the morning; before the first
//! bucket nothing qualifies, and the time gate closes independently at the
//! configured cutoff.

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::config::{VolumeBucket, WindowConfig};
use crate::domain::{session_bars, Bar};

/// Running session volume against the previous session's total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeState {
    pub cumulative_volume: f64,
    /// cumulative / previous session volume × 100; 0 when the reference is <= 0.
    pub volume_ratio_pct: f64,
}

impl VolumeState {
    pub fn new(cumulative_volume: f64, previous_session_volume: f64) -> Self {
        let volume_ratio_pct = if previous_session_volume > 0.0 {
            cumulative_volume / previous_session_volume * 100.0
        } else {
            0.0
        };
        Self {
            cumulative_volume,
            volume_ratio_pct,
        }
    }

    /// Sum the volumes of bars dated `now`'s day, up to and including `now`.
    ///
    /// Earlier sessions never count, so a day without bars has zero volume.
    pub fn from_bars(bars: &[Bar], now: NaiveDateTime, previous_session_volume: f64) -> Self {
        let cumulative: u64 = session_bars(bars, now.date())
            .iter()
            .filter(|b| b.timestamp <= now)
            .map(|b| b.volume)
            .sum();
        Self::new(cumulative as f64, previous_session_volume)
    }
}

/// Maps wall-clock time to volume and time gates.
#[derive(Debug, Clone)]
pub struct TimeWindowPolicy<'a> {
    config: &'a WindowConfig,
}

impl<'a> TimeWindowPolicy<'a> {
    pub fn new(config: &'a WindowConfig) -> Self {
        Self { config }
    }

    /// The first bucket containing `t`, if any.
    pub fn bucket_at(&self, t: NaiveTime) -> Option<&'a VolumeBucket> {
        self.config.buckets.iter().find(|b| b.contains(t))
    }

    /// Required volume ratio at `t`; `None` when no bucket applies.
    pub fn required_ratio(&self, t: NaiveTime) -> Option<f64> {
        self.bucket_at(t).map(|b| b.min_volume_ratio_pct)
    }

    /// Volume gate: false whenever no bucket applies.
    pub fn volume_ok(&self, t: NaiveTime, volume_ratio_pct: f64) -> bool {
        self.required_ratio(t)
            .is_some_and(|required| volume_ratio_pct >= required)
    }

    /// Time gate: open until the cutoff, inclusive.
    pub fn time_ok(&self, t: NaiveTime) -> bool {
        t <= self.config.cutoff
    }
}
