//! Yahoo Finance feed.
//!
//! Uses the v8 chart API for minute bars, daily bars, the previous session's
//! figures and the latest traded price. Timestamps are shifted by the
//! exchange's `gmtoffset` so bars carry session-local time.
//!
//! Yahoo has no official API and changes format without notice; the CSV feed
//! is the fallback when it is unavailable.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{FeedError, MarketFeed, MarketSnapshot};
use crate::domain::{Bar, RealtimeOverride, SessionReference};
use crate::evaluator::EvaluationMode;

#[derive(Debug, Deserialize)]
pub(crate) struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    /// Unix time of `regular_market_price`.
    regular_market_time: Option<i64>,
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

/// Parsed chart: session-local bars plus the quote metadata.
#[derive(Debug, Clone)]
pub(crate) struct Chart {
    pub bars: Vec<Bar>,
    pub last_price: Option<f64>,
    /// Session-local time of `last_price`.
    pub last_price_time: Option<NaiveDateTime>,
    pub gmtoffset: i64,
}

impl Chart {
    /// `last_price` when it was traded on `today`.
    ///
    /// Yahoo keeps reporting the last close while the market is shut, so a
    /// quote from an earlier day (or with no time at all) is not real-time.
    pub fn current_price(&self, today: NaiveDate) -> Option<f64> {
        let traded_today = self.last_price_time.is_some_and(|t| t.date() == today);
        if !traded_today {
            if let Some(time) = self.last_price_time {
                debug!(%time, %today, "ignoring quote from an earlier session");
            }
            return None;
        }
        self.last_price.filter(|p| p.is_finite() && *p > 0.0)
    }
}

fn session_local(ts: i64, offset: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(ts + offset, 0).map(|dt| dt.naive_utc())
}

/// Bar granularity and lookback requested from the chart API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChartRange {
    /// 1-minute bars for the current session.
    Intraday,
    /// Daily bars for the last five sessions.
    RecentDaily,
    /// Daily bars for the last year.
    YearDaily,
}

impl ChartRange {
    fn query(self) -> &'static str {
        match self {
            Self::Intraday => "interval=1m&range=1d",
            Self::RecentDaily => "interval=1d&range=5d",
            Self::YearDaily => "interval=1d&range=1y",
        }
    }
}

fn value_at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten().filter(|v| v.is_finite())
}

pub(crate) fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<Chart, FeedError> {
    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => FeedError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(err) => FeedError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)),
        None => FeedError::ResponseFormatChanged("empty result with no error".into()),
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| FeedError::ResponseFormatChanged("result array is empty".into()))?;

    let offset = data.meta.gmtoffset;
    // A session with no trades yet has no timestamp array at all.
    let timestamps = data.timestamp.unwrap_or_default();
    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let (Some(open), Some(high), Some(low), Some(close)) = (
            value_at(&quote.open, i),
            value_at(&quote.high, i),
            value_at(&quote.low, i),
            value_at(&quote.close, i),
        ) else {
            continue;
        };
        let timestamp = session_local(ts, offset)
            .ok_or_else(|| FeedError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;
        let bar = Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
        };
        if !bar.is_sane() {
            warn!(symbol, %timestamp, "skipping bar with invalid prices");
            continue;
        }
        bars.push(bar);
    }

    Ok(Chart {
        bars,
        last_price: data.meta.regular_market_price,
        last_price_time: data
            .meta
            .regular_market_time
            .and_then(|t| session_local(t, offset)),
        gmtoffset: offset,
    })
}

/// Previous completed session from recent daily bars.
///
/// A bar dated `today` is the session in progress and is skipped.
pub(crate) fn previous_session(daily: &[Bar], today: NaiveDate) -> Option<SessionReference> {
    daily
        .iter()
        .rev()
        .find(|b| b.date() < today)
        .map(|b| SessionReference {
            previous_close: b.close,
            previous_session_volume: b.volume as f64,
        })
}

/// One snapshot from a primary chart (minute bars, or daily bars in daily
/// mode) and, for intraday, the recent daily chart holding the reference.
///
/// Bars and quote both come from `primary`.
pub(crate) fn snapshot_from_charts(
    symbol: &str,
    mode: EvaluationMode,
    primary: Chart,
    recent_daily: Option<&Chart>,
    today: NaiveDate,
) -> MarketSnapshot {
    let realtime = primary.current_price(today).map(RealtimeOverride::new);
    let mut snapshot = MarketSnapshot {
        symbol: symbol.to_string(),
        realtime,
        ..MarketSnapshot::default()
    };
    match mode {
        EvaluationMode::IntradaySniper => {
            snapshot.reference = recent_daily.and_then(|c| previous_session(&c.bars, today));
            snapshot.intraday_bars = primary.bars;
        }
        EvaluationMode::DailyTechnical => snapshot.daily_bars = primary.bars,
    }
    snapshot
}

/// Yahoo Finance feed.
pub struct YahooFeed {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    /// Appended to bare numeric symbols (e.g. "2330" → "2330.TW").
    market_suffix: String,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooFeed {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, FeedError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| FeedError::Other(format!("build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            market_suffix: ".TW".to_string(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    pub fn with_market_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.market_suffix = suffix.into();
        self
    }

    fn yahoo_symbol(&self, symbol: &str) -> String {
        if !symbol.is_empty() && symbol.chars().all(|c| c.is_ascii_digit()) {
            format!("{symbol}{}", self.market_suffix)
        } else {
            symbol.to_string()
        }
    }

    fn chart_url(symbol: &str, range: ChartRange) -> String {
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}?{}",
            range.query()
        )
    }

    /// One chart request with retry, backoff and circuit breaker.
    fn fetch_chart(&self, symbol: &str, range: ChartRange) -> Result<Chart, FeedError> {
        let symbol = self.yahoo_symbol(symbol);
        let url = Self::chart_url(&symbol, range);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                warn!(%symbol, attempt, ?delay, "retrying chart request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(FeedError::CircuitBreakerTripped);
            }

            debug!(%url, "chart request");
            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(FeedError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(FeedError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(FeedError::CircuitBreakerTripped);
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after_secs = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(FeedError::RateLimited { retry_after_secs });
                continue;
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(FeedError::SymbolNotFound { symbol });
            }
            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(FeedError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let body: ChartResponse = resp.json().map_err(|e| {
                FeedError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
            })?;
            let chart = parse_chart(&symbol, body)?;
            self.circuit_breaker.record_success();
            return Ok(chart);
        }

        Err(last_error.unwrap_or_else(|| FeedError::Other("max retries exceeded".into())))
    }
}

fn local_today(gmtoffset: i64) -> NaiveDate {
    let now: NaiveDateTime = Utc::now().naive_utc();
    (now + chrono::Duration::seconds(gmtoffset)).date()
}

impl MarketFeed for YahooFeed {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_intraday_bars(&self, symbol: &str) -> Result<Vec<Bar>, FeedError> {
        Ok(self.fetch_chart(symbol, ChartRange::Intraday)?.bars)
    }

    fn fetch_session_reference(
        &self,
        symbol: &str,
    ) -> Result<Option<SessionReference>, FeedError> {
        let chart = self.fetch_chart(symbol, ChartRange::RecentDaily)?;
        Ok(previous_session(&chart.bars, local_today(chart.gmtoffset)))
    }

    fn fetch_realtime_quote(&self, symbol: &str) -> Result<Option<f64>, FeedError> {
        let chart = self.fetch_chart(symbol, ChartRange::Intraday)?;
        let today = local_today(chart.gmtoffset);
        Ok(chart.current_price(today))
    }

    fn fetch_daily_bars(&self, symbol: &str) -> Result<Vec<Bar>, FeedError> {
        Ok(self.fetch_chart(symbol, ChartRange::YearDaily)?.bars)
    }

    fn fetch_snapshot(
        &self,
        symbol: &str,
        mode: EvaluationMode,
    ) -> Result<MarketSnapshot, FeedError> {
        let (primary, recent_daily) = match mode {
            EvaluationMode::IntradaySniper => (
                self.fetch_chart(symbol, ChartRange::Intraday)?,
                Some(self.fetch_chart(symbol, ChartRange::RecentDaily)?),
            ),
            EvaluationMode::DailyTechnical => (self.fetch_chart(symbol, ChartRange::YearDaily)?, None),
        };
        let today = local_today(primary.gmtoffset);
        Ok(snapshot_from_charts(symbol, mode, primary, recent_daily.as_ref(), today))
    }
}
