//! Sniper core: intraday breakout signals and a phased trailing stop.
//!
//! Every evaluation is a pure function of one market snapshot:
//! - Candle shape analysis against the previous close ([`shape`])
//! - Time-of-day volume and entry-window gates ([`window`])
//! - Freshness and real-time override policy ([`validity`])
//! - Signal aggregation with a per-predicate breakdown ([`signal`])
//! - Three-phase trailing stop from live ROI ([`trailing`])
//! - Intraday and daily evaluation modes behind one interface ([`evaluator`])
//!
//! Fetching lives in [`data`]; the engine itself never blocks or keeps state.

pub mod config;
pub mod daily;
pub mod data;
pub mod domain;
pub mod evaluator;
pub mod indicators;
pub mod shape;
pub mod signal;
pub mod trailing;
pub mod validity;
pub mod window;

pub use config::{ConfigError, SniperConfig, StopMode};
pub use evaluator::{
    evaluate, evaluator_for, DailyTechnical, Evaluation, EvaluationMode, Evaluator,
    IntradaySniper, ModeReport, SessionContext,
};
pub use signal::{FailedCheck, ReportStatus, SignalAggregator, SignalReport};
pub use trailing::{TrailingPhase, TrailingState, TrailingStopManager};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: snapshot and report types can cross threads.
    ///
    /// The CLI watch loop and any UI host may evaluate off the main thread.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::SessionReference>();
        require_sync::<domain::SessionReference>();
        require_send::<SniperConfig>();
        require_sync::<SniperConfig>();
        require_send::<SignalReport>();
        require_sync::<SignalReport>();
        require_send::<TrailingState>();
        require_sync::<TrailingState>();
        require_send::<Evaluation>();
        require_sync::<Evaluation>();
        require_send::<SessionContext<'static>>();
        require_sync::<SessionContext<'static>>();
        require_send::<data::MarketSnapshot>();
        require_sync::<data::MarketSnapshot>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();
        require_send::<data::YahooFeed>();
        require_sync::<data::YahooFeed>();
        require_send::<Box<dyn Evaluator>>();
        require_sync::<Box<dyn Evaluator>>();
    }

    /// Architecture contract: evaluators see only the snapshot they are handed.
    #[test]
    fn evaluator_trait_takes_only_a_context() {
        fn _check_trait_object_builds(e: &dyn Evaluator, ctx: &SessionContext<'_>) -> Evaluation {
            e.evaluate(ctx)
        }
    }
}
