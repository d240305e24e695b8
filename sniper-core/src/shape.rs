//! Candle shape analysis: trend, body and upper-shadow ratios of the latest bar.
//!
//! All percentages are relative to the previous session's close. A flat
//! (doji) body yields the configured shadow sentinel instead of a ratio, so
//! the shadow gate fails rather than dividing by a near-zero body.

use serde::{Deserialize, Serialize};

use crate::config::ShapeConfig;
use crate::domain::Bar;

/// Derived candle metrics. Recomputed on every evaluation, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeMetrics {
    pub session_open: f64,
    pub close: f64,
    pub previous_close: f64,
    /// Close vs. previous close, percent.
    pub trend_pct: f64,
    /// Signed close − session open, percent of previous close.
    pub body_pct: f64,
    /// |close − session open| in currency units.
    pub body_length: f64,
    pub current_high: f64,
    pub upper_shadow: f64,
    /// Upper shadow / body length, or the doji sentinel.
    pub shadow_ratio: f64,
}

/// Compute shape metrics for `bar` against the session open and previous close.
///
/// `override_price` is folded into the current high so an intrabar spike seen
/// only by the quote source still counts toward the upper shadow.
pub fn analyze(
    bar: &Bar,
    session_open: f64,
    previous_close: f64,
    override_price: Option<f64>,
    config: &ShapeConfig,
) -> ShapeMetrics {
    let close = bar.close;
    let pct_of_prev = |delta: f64| {
        if previous_close > 0.0 {
            delta / previous_close * 100.0
        } else {
            0.0
        }
    };

    let body_delta = close - session_open;
    let body_length = body_delta.abs();
    let current_high = override_price.map_or(bar.high, |p| bar.high.max(p));
    let upper_shadow = current_high - session_open.max(close);
    let shadow_ratio = if body_length > config.doji_epsilon {
        upper_shadow / body_length
    } else {
        config.doji_shadow_ratio
    };

    ShapeMetrics {
        session_open,
        close,
        previous_close,
        trend_pct: pct_of_prev(close - previous_close),
        body_pct: pct_of_prev(body_delta),
        body_length,
        current_high,
        upper_shadow,
        shadow_ratio,
    }
}

impl ShapeMetrics {
    /// Green candle inside the trend band with a large enough body.
    pub fn qualifies(&self, config: &ShapeConfig) -> bool {
        self.close > self.session_open
            && self.trend_pct >= config.min_trend_pct
            && self.trend_pct <= config.max_trend_pct
            && self.body_pct >= config.min_body_pct
    }

    /// Upper shadow small relative to the body.
    pub fn shadow_ok(&self, config: &ShapeConfig) -> bool {
        self.shadow_ratio <= config.max_shadow_ratio
    }
}
