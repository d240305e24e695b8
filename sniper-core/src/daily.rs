//! Daily-technical view: trend and action from RSI, the 20-day line and volume.
//!
//! Rules, first match wins:
//! - RSI above overbought → take-profit watch
//! - RSI below oversold → oversold rebound
//! - close above the moving average and volume above its recent mean → hold/add
//! - otherwise → neutral
//!
//! Missing history leaves the affected indicator as `None`; a `None`
//! indicator never satisfies a rule.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::DailyConfig;
use crate::domain::Bar;
use crate::indicators::{BarField, Indicator, Rsi, Sma};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyTrend {
    /// Close above the moving average.
    Bullish,
    /// Close at or below the moving average.
    Pullback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyAction {
    TakeProfitWatch,
    OversoldRebound,
    HoldOrAdd,
    Neutral,
}

impl DailyAction {
    pub fn reason(self) -> &'static str {
        match self {
            Self::TakeProfitWatch => "RSI overheated",
            Self::OversoldRebound => "RSI oversold",
            Self::HoldOrAdd => "above moving average with rising volume",
            Self::Neutral => "indicators neutral",
        }
    }
}

impl fmt::Display for DailyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TakeProfitWatch => "watch for take-profit",
            Self::OversoldRebound => "oversold rebound",
            Self::HoldOrAdd => "hold / add",
            Self::Neutral => "wait",
        })
    }
}

/// Daily-view output for the last bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    /// Trading date of the last bar; compare with today to spot stale data.
    pub last_date: NaiveDate,
    pub last_close: f64,
    /// Change vs. the previous bar's close, percent.
    pub change_pct: Option<f64>,
    pub last_volume: u64,
    pub rsi: Option<f64>,
    pub moving_average: Option<f64>,
    pub volume_mean: Option<f64>,
    pub trend: Option<DailyTrend>,
    pub action: DailyAction,
}

impl DailyReport {
    /// Calendar days between the last bar and `today`; 0 when it is today's bar.
    pub fn age_days(&self, today: NaiveDate) -> i64 {
        (today - self.last_date).num_days()
    }
}

/// Analyze daily bars. Returns `None` for an empty series.
pub fn analyze(bars: &[Bar], config: &DailyConfig) -> Option<DailyReport> {
    let last = bars.last()?;
    let change_pct = bars
        .len()
        .checked_sub(2)
        .map(|i| bars[i].close)
        .filter(|prev| *prev > 0.0)
        .map(|prev| (last.close - prev) / prev * 100.0);

    let rsi = Rsi::new(config.rsi_period).latest(bars);
    let moving_average = Sma::new(config.ma_period).latest(bars);
    let volume_mean = Sma::of(config.volume_lookback, BarField::Volume).latest(bars);

    let above_ma = moving_average.map(|ma| last.close > ma);
    let trend = above_ma.map(|above| {
        if above {
            DailyTrend::Bullish
        } else {
            DailyTrend::Pullback
        }
    });
    let volume_rising = volume_mean.is_some_and(|mean| last.volume as f64 > mean);

    let action = match rsi {
        Some(r) if r > config.rsi_overbought => DailyAction::TakeProfitWatch,
        Some(r) if r < config.rsi_oversold => DailyAction::OversoldRebound,
        _ if above_ma == Some(true) && volume_rising => DailyAction::HoldOrAdd,
        _ => DailyAction::Neutral,
    };

    Some(DailyReport {
        last_date: last.date(),
        last_close: last.close,
        change_pct,
        last_volume: last.volume,
        rsi,
        moving_average,
        volume_mean,
        trend,
        action,
    })
}
