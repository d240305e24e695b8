//! Simple moving average over a chosen bar field.

use super::Indicator;
use crate::domain::Bar;

/// Which bar value an indicator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarField {
    Close,
    Volume,
}

impl BarField {
    fn read(self, bar: &Bar) -> f64 {
        match self {
            Self::Close => bar.close,
            Self::Volume => bar.volume as f64,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Close => "sma",
            Self::Volume => "vol_sma",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    field: BarField,
    name: String,
}

impl Sma {
    /// SMA of closes. A zero period is clamped to 1.
    pub fn new(period: usize) -> Self {
        Self::of(period, BarField::Close)
    }

    pub fn of(period: usize, field: BarField) -> Self {
        let period = period.max(1);
        Self {
            period,
            field,
            name: format!("{}_{period}", field.tag()),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let values: Vec<f64> = bars.iter().map(|b| self.field.read(b)).collect();
        let mut result = vec![f64::NAN; values.len()];
        for (i, window) in values.windows(self.period).enumerate() {
            // NaN anywhere in the window propagates through the sum.
            result[i + self.period - 1] = window.iter().sum::<f64>() / self.period as f64;
        }
        result
    }
}
