//! Bar: the fundamental market data unit.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single symbol over a fixed interval.
///
/// Intraday bars are one minute wide and carry a session-local timestamp.
/// Daily bars use a midnight timestamp on the trading date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Calendar date of the bar (session-local).
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// OHLC sanity: finite positive prices with open and close inside `[low, high]`.
    ///
    /// Feeds drop bars that fail this before they reach the ratio math.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
            && self.high.is_finite()
    }

    /// Copy of this bar with the close replaced by `price` and the range widened to include it.
    pub fn with_price(&self, price: f64) -> Self {
        Self {
            close: price,
            high: self.high.max(price),
            low: self.low.min(price),
            ..self.clone()
        }
    }
}

/// Bars dated `day`, in order.
///
/// Bars are expected in ascending timestamp order. A day with no bars yields an
/// empty slice, even when earlier sessions are present.
pub fn session_bars(bars: &[Bar], day: NaiveDate) -> &[Bar] {
    let start = bars.partition_point(|b| b.date() < day);
    let end = start + bars[start..].partition_point(|b| b.date() <= day);
    &bars[start..end]
}
