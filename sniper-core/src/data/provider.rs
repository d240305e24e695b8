//! Feed trait, structured feed errors, and the per-cycle snapshot.

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::warn;

use crate::domain::{Bar, Position, RealtimeOverride, SessionReference};
use crate::evaluator::{EvaluationMode, SessionContext};

/// Structured error types for feed operations.
///
/// Displayable in CLI output; none of them are retried by the engine.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("feed error: {0}")]
    Other(String),
}

/// Source of bars, reference figures and real-time quotes for one symbol.
///
/// "No data" is a normal outcome (empty vector / `None`), not an error.
pub trait MarketFeed: Send + Sync {
    /// Human-readable name of this feed.
    fn name(&self) -> &str;

    /// Minute bars ascending by timestamp, covering at least the current session.
    fn fetch_intraday_bars(&self, symbol: &str) -> Result<Vec<Bar>, FeedError>;

    /// Previous session's close and total volume.
    fn fetch_session_reference(&self, symbol: &str)
        -> Result<Option<SessionReference>, FeedError>;

    /// Latest traded price, if the source has one.
    fn fetch_realtime_quote(&self, symbol: &str) -> Result<Option<f64>, FeedError>;

    /// Daily bars ascending by date.
    fn fetch_daily_bars(&self, symbol: &str) -> Result<Vec<Bar>, FeedError>;

    /// Everything `mode` needs for one cycle.
    ///
    /// The default calls the individual fetches in turn. Feeds that can serve
    /// bars and quote from a single response override this so both come from
    /// the same fetch.
    fn fetch_snapshot(
        &self,
        symbol: &str,
        mode: EvaluationMode,
    ) -> Result<MarketSnapshot, FeedError> {
        MarketSnapshot::assemble(self, symbol, mode)
    }
}

/// Everything fetched for one symbol in one refresh cycle.
///
/// Evaluations always run against a single snapshot so bars, reference data
/// and the real-time price are never mixed across fetches.
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub intraday_bars: Vec<Bar>,
    pub daily_bars: Vec<Bar>,
    pub reference: Option<SessionReference>,
    pub realtime: Option<RealtimeOverride>,
}

impl MarketSnapshot {
    /// Fetch what `mode` needs from `feed` in one cycle.
    pub fn fetch(
        feed: &dyn MarketFeed,
        symbol: &str,
        mode: EvaluationMode,
    ) -> Result<Self, FeedError> {
        feed.fetch_snapshot(symbol, mode)
    }

    /// Build a snapshot from the individual feed calls. A failed quote degrades to no override.
    pub fn assemble<F: MarketFeed + ?Sized>(
        feed: &F,
        symbol: &str,
        mode: EvaluationMode,
    ) -> Result<Self, FeedError> {
        let mut snapshot = Self {
            symbol: symbol.to_string(),
            ..Self::default()
        };

        match mode {
            EvaluationMode::IntradaySniper => {
                snapshot.intraday_bars = feed.fetch_intraday_bars(symbol)?;
                snapshot.reference = feed.fetch_session_reference(symbol)?;
            }
            EvaluationMode::DailyTechnical => {
                snapshot.daily_bars = feed.fetch_daily_bars(symbol)?;
            }
        }

        snapshot.realtime = match feed.fetch_realtime_quote(symbol) {
            Ok(price) => price.map(RealtimeOverride::new),
            Err(e) => {
                warn!(feed = feed.name(), symbol, error = %e, "real-time quote unavailable");
                None
            }
        };

        Ok(snapshot)
    }

    /// Borrow this snapshot as an evaluation context.
    pub fn context(
        &self,
        position: Option<Position>,
        previous_stop: Option<f64>,
        now: NaiveDateTime,
    ) -> SessionContext<'_> {
        SessionContext {
            symbol: &self.symbol,
            intraday_bars: &self.intraday_bars,
            daily_bars: &self.daily_bars,
            reference: self.reference.as_ref(),
            realtime: self.realtime,
            position,
            previous_stop,
            now,
        }
    }
}
