//! Evaluation modes: the intraday sniper and the daily-technical view.
//!
//! Both evaluators consume an explicit [`SessionContext`] and return an
//! [`Evaluation`]; neither reads ambient state. The mode is an explicit value
//! chosen by the caller, and [`evaluator_for`] builds the matching evaluator.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::config::SniperConfig;
use crate::daily::{self, DailyReport};
use crate::domain::{Bar, Position, RealtimeOverride, SessionReference};
use crate::signal::{SignalAggregator, SignalReport};
use crate::trailing::{TrailingState, TrailingStopManager};

#[derive(Debug, Error)]
#[error("unknown evaluation mode: {0} (expected \"intraday\" or \"daily\")")]
pub struct UnknownMode(pub String);

/// Which evaluator to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    #[default]
    IntradaySniper,
    DailyTechnical,
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IntradaySniper => "intraday",
            Self::DailyTechnical => "daily",
        })
    }
}

impl FromStr for EvaluationMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "intraday" | "sniper" | "intraday_sniper" => Ok(Self::IntradaySniper),
            "daily" | "technical" | "daily_technical" => Ok(Self::DailyTechnical),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

/// One atomic snapshot of everything an evaluation needs.
///
/// Bars, reference data and the real-time price must come from the same
/// fetch cycle. When the tracked symbol changes the caller builds a new
/// context; nothing carries over.
#[derive(Debug, Clone, Copy)]
pub struct SessionContext<'a> {
    pub symbol: &'a str,
    /// Minute bars, ascending, covering at least the current session.
    pub intraday_bars: &'a [Bar],
    /// Daily bars, ascending (daily mode only).
    pub daily_bars: &'a [Bar],
    pub reference: Option<&'a SessionReference>,
    pub realtime: Option<RealtimeOverride>,
    pub position: Option<Position>,
    /// Stop the caller displayed last cycle; only read in ratchet mode.
    pub previous_stop: Option<f64>,
    /// Session-local wall-clock time.
    pub now: NaiveDateTime,
}

impl<'a> SessionContext<'a> {
    pub fn new(symbol: &'a str, now: NaiveDateTime) -> Self {
        Self {
            symbol,
            intraday_bars: &[],
            daily_bars: &[],
            reference: None,
            realtime: None,
            position: None,
            previous_stop: None,
            now,
        }
    }

    /// Real-time price when usable, else the last close of `bars`.
    fn current_price(&self, bars: &[Bar]) -> Option<f64> {
        self.realtime
            .filter(RealtimeOverride::is_usable)
            .map(|o| o.price)
            .or_else(|| bars.last().map(|b| b.close))
    }

    /// Trailing stop off the current price of `bars`.
    fn trailing(&self, bars: &[Bar], config: &SniperConfig) -> Option<TrailingState> {
        self.current_price(bars).map(|price| {
            TrailingStopManager::new(&config.trailing).evaluate(
                price,
                self.position,
                self.previous_stop,
            )
        })
    }
}

/// Intraday signal and stop for `ctx`; shared by [`IntradaySniper`] and [`evaluate`].
fn run_intraday(
    ctx: &SessionContext<'_>,
    config: &SniperConfig,
) -> (SignalReport, Option<TrailingState>) {
    let signal = SignalAggregator::new(config).evaluate(
        ctx.intraday_bars,
        ctx.reference,
        ctx.realtime,
        ctx.now,
    );
    (signal, ctx.trailing(ctx.intraday_bars, config))
}

/// Mode-specific part of an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "report", rename_all = "snake_case")]
pub enum ModeReport {
    Intraday(SignalReport),
    Daily(Option<DailyReport>),
}

/// Result of one evaluation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub symbol: String,
    pub evaluated_at: NaiveDateTime,
    pub report: ModeReport,
    /// `None` when there is no price at all.
    pub trailing: Option<TrailingState>,
}

impl Evaluation {
    pub fn mode(&self) -> EvaluationMode {
        match self.report {
            ModeReport::Intraday(_) => EvaluationMode::IntradaySniper,
            ModeReport::Daily(_) => EvaluationMode::DailyTechnical,
        }
    }

    pub fn signal(&self) -> Option<&SignalReport> {
        match &self.report {
            ModeReport::Intraday(report) => Some(report),
            ModeReport::Daily(_) => None,
        }
    }

    pub fn daily(&self) -> Option<&DailyReport> {
        match &self.report {
            ModeReport::Daily(report) => report.as_ref(),
            ModeReport::Intraday(_) => None,
        }
    }

    /// True only for an intraday signal computed from valid data.
    pub fn fired(&self) -> bool {
        self.signal().is_some_and(|s| s.final_signal)
    }
}

/// Shared reporting interface of the evaluation modes.
pub trait Evaluator: Send + Sync {
    fn mode(&self) -> EvaluationMode;

    fn evaluate(&self, ctx: &SessionContext<'_>) -> Evaluation;
}

/// Intraday breakout signal plus trailing stop.
#[derive(Debug, Clone, Default)]
pub struct IntradaySniper {
    config: SniperConfig,
}

impl IntradaySniper {
    pub fn new(config: SniperConfig) -> Self {
        Self { config }
    }
}

impl Evaluator for IntradaySniper {
    fn mode(&self) -> EvaluationMode {
        EvaluationMode::IntradaySniper
    }

    fn evaluate(&self, ctx: &SessionContext<'_>) -> Evaluation {
        let (signal, trailing) = run_intraday(ctx, &self.config);
        Evaluation {
            symbol: ctx.symbol.to_string(),
            evaluated_at: ctx.now,
            report: ModeReport::Intraday(signal),
            trailing,
        }
    }
}

/// Daily RSI / moving-average view plus trailing stop.
#[derive(Debug, Clone, Default)]
pub struct DailyTechnical {
    config: SniperConfig,
}

impl DailyTechnical {
    pub fn new(config: SniperConfig) -> Self {
        Self { config }
    }
}

impl Evaluator for DailyTechnical {
    fn mode(&self) -> EvaluationMode {
        EvaluationMode::DailyTechnical
    }

    fn evaluate(&self, ctx: &SessionContext<'_>) -> Evaluation {
        let report = daily::analyze(ctx.daily_bars, &self.config.daily);
        if let Some(report) = &report {
            let age = report.age_days(ctx.now.date());
            if age > 0 {
                debug!(symbol = ctx.symbol, last_date = %report.last_date, age, "daily bars end before today");
            }
        }
        let trailing = ctx.trailing(ctx.daily_bars, &self.config);
        Evaluation {
            symbol: ctx.symbol.to_string(),
            evaluated_at: ctx.now,
            report: ModeReport::Daily(report),
            trailing,
        }
    }
}

/// Build the evaluator for `mode`.
pub fn evaluator_for(mode: EvaluationMode, config: SniperConfig) -> Box<dyn Evaluator> {
    match mode {
        EvaluationMode::IntradaySniper => Box::new(IntradaySniper::new(config)),
        EvaluationMode::DailyTechnical => Box::new(DailyTechnical::new(config)),
    }
}

/// Evaluate one intraday snapshot: breakout signal and trailing stop.
///
/// Pure and deterministic. `cost_basis` of `None` makes the current price its
/// own baseline. The trailing state is `None` only when there is neither a
/// bar nor a usable real-time price.
pub fn evaluate(
    bars: &[Bar],
    reference: Option<&SessionReference>,
    realtime: Option<RealtimeOverride>,
    cost_basis: Option<f64>,
    now: NaiveDateTime,
    config: &SniperConfig,
) -> (SignalReport, Option<TrailingState>) {
    let ctx = SessionContext {
        intraday_bars: bars,
        reference,
        realtime,
        position: cost_basis.map(Position::new),
        ..SessionContext::new("", now)
    };
    run_intraday(&ctx, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("intraday".parse::<EvaluationMode>().unwrap(), EvaluationMode::IntradaySniper);
        assert_eq!("Daily".parse::<EvaluationMode>().unwrap(), EvaluationMode::DailyTechnical);
        assert!("weekly".parse::<EvaluationMode>().is_err());
    }

    #[test]
    fn factory_matches_mode() {
        for mode in [EvaluationMode::IntradaySniper, EvaluationMode::DailyTechnical] {
            assert_eq!(evaluator_for(mode, SniperConfig::default()).mode(), mode);
        }
    }

    #[test]
    fn empty_context_has_no_trailing() {
        let ctx = SessionContext::new("2330", now());
        let eval = IntradaySniper::default().evaluate(&ctx);
        assert_eq!(eval.mode(), EvaluationMode::IntradaySniper);
        assert!(eval.trailing.is_none());
        assert!(!eval.fired());
    }

    #[test]
    fn plain_entry_point_matches_intraday_evaluator() {
        let bars = vec![Bar {
            timestamp: now(),
            open: 101.0,
            high: 107.0,
            low: 100.5,
            close: 106.0,
            volume: 2_500,
        }];
        let reference = SessionReference {
            previous_close: 100.0,
            previous_session_volume: 10_000.0,
        };
        let config = SniperConfig::default();
        let (signal, trailing) =
            evaluate(&bars, Some(&reference), None, Some(98.0), now(), &config);

        let ctx = SessionContext {
            intraday_bars: &bars,
            reference: Some(&reference),
            position: Some(Position::new(98.0)),
            ..SessionContext::new("2330", now())
        };
        let eval = IntradaySniper::new(config).evaluate(&ctx);
        assert_eq!(eval.signal(), Some(&signal));
        assert_eq!(eval.trailing, trailing);
        assert!(eval.fired());
    }

    #[test]
    fn realtime_alone_drives_trailing() {
        let ctx = SessionContext {
            realtime: Some(RealtimeOverride::new(88.0)),
            ..SessionContext::new("2330", now())
        };
        let eval = DailyTechnical::default().evaluate(&ctx);
        assert_eq!(eval.mode(), EvaluationMode::DailyTechnical);
        assert!(eval.daily().is_none());
        assert_eq!(eval.trailing.unwrap().current_price, 88.0);
    }
}
