//! Relative Strength Index (RSI) with Wilder smoothing.
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss).
//! Flat series → 50; no losses → 100; no gains → 0.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    /// A zero period is clamped to 1.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n <= self.period {
            return result;
        }

        let changes: Vec<f64> = bars.windows(2).map(|w| w[1].close - w[0].close).collect();
        if changes[..self.period].iter().any(|c| c.is_nan()) {
            return result;
        }

        let p = self.period as f64;
        let mut avg_gain = changes[..self.period].iter().map(|c| c.max(0.0)).sum::<f64>() / p;
        let mut avg_loss = changes[..self.period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / p;
        result[self.period] = rsi_value(avg_gain, avg_loss);

        for (offset, &change) in changes[self.period..].iter().enumerate() {
            if change.is_nan() {
                break;
            }
            avg_gain = (avg_gain * (p - 1.0) + change.max(0.0)) / p;
            avg_loss = (avg_loss * (p - 1.0) + (-change).max(0.0)) / p;
            result[self.period + 1 + offset] = rsi_value(avg_gain, avg_loss);
        }

        result
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
