//! Signal aggregation: combines shape, volume, time and validity gates.
//!
//! Every predicate is computed and reported even when an earlier one fails,
//! so the caller can explain a missed signal. The final signal is a plain
//! conjunction; the failure order below is for display only.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::config::SniperConfig;
use crate::domain::{session_bars, Bar, RealtimeOverride, SessionReference};
use crate::shape::{self, ShapeMetrics};
use crate::validity::{self, PriceSource, Validity};
use crate::window::{TimeWindowPolicy, VolumeState};

/// Whether the report was computed from usable data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Evaluated,
    /// Last bar predates the session and no real-time price was supplied.
    Stale,
    /// No bars or no reference data.
    NoData,
}

/// A check that kept the signal from firing, in diagnostic order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedCheck {
    NoData,
    StaleData,
    Qualify,
    Shadow,
    Volume,
    Time,
}

impl fmt::Display for FailedCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoData => "no market data",
            Self::StaleData => "data is not from the current session",
            Self::Qualify => "candle does not qualify (direction, trend band or body size)",
            Self::Shadow => "upper shadow too long",
            Self::Volume => "cumulative volume below the time-window threshold",
            Self::Time => "entry window has closed",
        };
        f.write_str(text)
    }
}

/// Output of one signal evaluation. No lifecycle beyond the call that made it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReport {
    pub status: ReportStatus,
    pub qualifies: bool,
    pub shadow_ok: bool,
    pub volume_ok: bool,
    pub time_ok: bool,
    pub data_valid: bool,
    pub final_signal: bool,
    pub metrics: Option<ShapeMetrics>,
    pub volume: Option<VolumeState>,
    /// Volume ratio the active time bucket demands; `None` outside all buckets.
    pub required_volume_ratio_pct: Option<f64>,
    pub price_source: Option<PriceSource>,
    /// Date of the last bar when the report is stale.
    pub stale_since: Option<NaiveDate>,
}

impl SignalReport {
    fn unevaluated(status: ReportStatus, stale_since: Option<NaiveDate>) -> Self {
        Self {
            status,
            qualifies: false,
            shadow_ok: false,
            volume_ok: false,
            time_ok: false,
            data_valid: false,
            final_signal: false,
            metrics: None,
            volume: None,
            required_volume_ratio_pct: None,
            price_source: None,
            stale_since,
        }
    }

    pub fn no_data() -> Self {
        Self::unevaluated(ReportStatus::NoData, None)
    }

    pub fn stale(last_date: NaiveDate) -> Self {
        Self::unevaluated(ReportStatus::Stale, Some(last_date))
    }

    /// First failing check: data problems, then qualify → shadow → volume → time.
    pub fn first_failure(&self) -> Option<FailedCheck> {
        match self.status {
            ReportStatus::NoData => return Some(FailedCheck::NoData),
            ReportStatus::Stale => return Some(FailedCheck::StaleData),
            ReportStatus::Evaluated => {}
        }
        [
            (self.qualifies, FailedCheck::Qualify),
            (self.shadow_ok, FailedCheck::Shadow),
            (self.volume_ok, FailedCheck::Volume),
            (self.time_ok, FailedCheck::Time),
        ]
        .into_iter()
        .find_map(|(ok, check)| (!ok).then_some(check))
    }

    /// Every failing check in diagnostic order.
    pub fn failures(&self) -> Vec<FailedCheck> {
        match self.status {
            ReportStatus::NoData => vec![FailedCheck::NoData],
            ReportStatus::Stale => vec![FailedCheck::StaleData],
            ReportStatus::Evaluated => [
                (self.qualifies, FailedCheck::Qualify),
                (self.shadow_ok, FailedCheck::Shadow),
                (self.volume_ok, FailedCheck::Volume),
                (self.time_ok, FailedCheck::Time),
            ]
            .into_iter()
            .filter_map(|(ok, check)| (!ok).then_some(check))
            .collect(),
        }
    }
}

/// Combines the candle, window and validity checks into one report.
#[derive(Debug, Clone, Copy)]
pub struct SignalAggregator<'a> {
    config: &'a SniperConfig,
}

impl<'a> SignalAggregator<'a> {
    pub fn new(config: &'a SniperConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        bars: &[Bar],
        reference: Option<&SessionReference>,
        realtime: Option<RealtimeOverride>,
        now: NaiveDateTime,
    ) -> SignalReport {
        let Some(reference) = reference else {
            debug!("no session reference; reporting no data");
            return SignalReport::no_data();
        };

        let (latest, source) = match validity::check(bars, now.date(), realtime) {
            Validity::NoData => {
                debug!("no bars; reporting no data");
                return SignalReport::no_data();
            }
            Validity::Stale { last_date } => {
                debug!(%last_date, today = %now.date(), "last bar is stale");
                return SignalReport::stale(last_date);
            }
            Validity::Valid { latest, source } => (latest, source),
        };

        // Today's first bar opens the session; with none, the overridden bar stands in.
        let session_open = session_bars(bars, now.date())
            .first()
            .map_or(latest.open, |b| b.open);
        let override_price = match source {
            PriceSource::Realtime => Some(latest.close),
            PriceSource::LastBar => None,
        };

        let metrics = shape::analyze(
            &latest,
            session_open,
            reference.previous_close,
            override_price,
            &self.config.shape,
        );
        let volume = VolumeState::from_bars(bars, now, reference.previous_session_volume);

        let policy = TimeWindowPolicy::new(&self.config.window);
        let clock = now.time();
        let qualifies = metrics.qualifies(&self.config.shape);
        let shadow_ok = metrics.shadow_ok(&self.config.shape);
        let volume_ok = policy.volume_ok(clock, volume.volume_ratio_pct);
        let time_ok = policy.time_ok(clock);
        let final_signal = qualifies && shadow_ok && volume_ok && time_ok;

        debug!(
            trend_pct = metrics.trend_pct,
            body_pct = metrics.body_pct,
            shadow_ratio = metrics.shadow_ratio,
            volume_ratio_pct = volume.volume_ratio_pct,
            qualifies,
            shadow_ok,
            volume_ok,
            time_ok,
            "signal breakdown"
        );
        if final_signal {
            info!(close = metrics.close, %now, "breakout signal");
        }

        SignalReport {
            status: ReportStatus::Evaluated,
            qualifies,
            shadow_ok,
            volume_ok,
            time_ok,
            data_valid: true,
            final_signal,
            metrics: Some(metrics),
            volume: Some(volume),
            required_volume_ratio_pct: policy.required_ratio(clock),
            price_source: Some(source),
            stale_since: None,
        }
    }
}
