//! Indicators used by the daily-technical view.
//!
//! Indicators are pure functions: bar history in, a series of the same length
//! out. Warmup positions hold `f64::NAN`.

pub mod rsi;
pub mod sma;

pub use rsi::Rsi;
pub use sma::{BarField, Sma};

use crate::domain::Bar;

/// Trait for indicators.
///
/// No value at bar t may depend on bars after t.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "rsi_14").
    fn name(&self) -> &str;

    /// Number of leading NaN values before the first valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;

    /// Value at the last bar, if past warmup and finite.
    fn latest(&self, bars: &[Bar]) -> Option<f64> {
        self.compute(bars).last().copied().filter(|v| v.is_finite())
    }
}

/// Daily bars from close prices, for tests.
///
/// open = previous close, high/low = ±1 around the body, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, epsilon={epsilon}"
    );
}
