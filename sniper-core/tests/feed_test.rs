//! Integration tests for the file feed and the per-cycle snapshot.

use chrono::NaiveDate;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};

use sniper_core::data::{CsvFeed, FeedError, MarketFeed, MarketSnapshot};
use sniper_core::domain::{Bar, Position, SessionReference};
use sniper_core::{evaluator_for, EvaluationMode, ReportStatus, SniperConfig, TrailingPhase};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

const INTRADAY: &str = "\
timestamp,open,high,low,close,volume
2024-05-01 13:29,99.0,100.2,98.9,100.0,4000
2024-05-02 09:29,104.0,107.0,103.8,106.0,834
2024-05-02 09:01,101.0,102.0,100.5,101.8,833
2024-05-02 09:02,101.8,104.0,101.5,103.9,833
";

fn write_fixture(dir: &std::path::Path) {
    fs::write(dir.join("2330.intraday.csv"), INTRADAY).unwrap();
    fs::write(
        dir.join("2330.reference.toml"),
        "previous_close = 100.0\nprevious_session_volume = 10000.0\n",
    )
    .unwrap();
}

fn at(h: u32, m: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 2)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

/// In-memory feed whose quote source is broken.
struct FlakyQuoteFeed {
    bars: Vec<Bar>,
    quote_calls: AtomicUsize,
}

impl MarketFeed for FlakyQuoteFeed {
    fn name(&self) -> &str {
        "flaky"
    }

    fn fetch_intraday_bars(&self, _symbol: &str) -> Result<Vec<Bar>, FeedError> {
        Ok(self.bars.clone())
    }

    fn fetch_session_reference(
        &self,
        _symbol: &str,
    ) -> Result<Option<SessionReference>, FeedError> {
        Ok(Some(SessionReference {
            previous_close: 100.0,
            previous_session_volume: 10_000.0,
        }))
    }

    fn fetch_realtime_quote(&self, _symbol: &str) -> Result<Option<f64>, FeedError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        Err(FeedError::RateLimited {
            retry_after_secs: 60,
        })
    }

    fn fetch_daily_bars(&self, symbol: &str) -> Result<Vec<Bar>, FeedError> {
        Err(FeedError::SymbolNotFound {
            symbol: symbol.to_string(),
        })
    }
}

// ──────────────────────────────────────────────
// CsvFeed
// ──────────────────────────────────────────────

#[test]
fn csv_feed_sorts_rows_and_reads_reference() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let feed = CsvFeed::new(dir.path());

    let bars = feed.fetch_intraday_bars("2330").unwrap();
    assert_eq!(bars.len(), 4);
    assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert_eq!(bars.last().unwrap().close, 106.0);

    let reference = feed.fetch_session_reference("2330").unwrap().unwrap();
    assert_eq!(reference.previous_close, 100.0);
    assert!(feed.fetch_realtime_quote("2330").unwrap().is_none());
}

#[test]
fn csv_feed_duplicate_timestamp_keeps_last_row() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("X.intraday.csv"),
        "timestamp,open,high,low,close,volume\n\
         2024-05-02 09:01,1,1,1,1.0,10\n\
         2024-05-02 09:01,1,2,1,2.0,20\n",
    )
    .unwrap();
    let bars = CsvFeed::new(dir.path()).fetch_intraday_bars("X").unwrap();
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].close, 2.0);
    assert_eq!(bars[0].volume, 20);
}

#[test]
fn csv_feed_rejects_bad_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("X.intraday.csv"),
        "timestamp,open,high,low,close,volume\nnot-a-time,1,1,1,1,1\n",
    )
    .unwrap();
    let err = CsvFeed::new(dir.path()).fetch_intraday_bars("X").unwrap_err();
    assert!(matches!(err, FeedError::Parse { .. }), "got {err}");
}

#[test]
fn csv_feed_skips_impossible_rows() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("X.intraday.csv"),
        "timestamp,open,high,low,close,volume\n\
         2024-05-02 09:01,100,101,99,100.5,10\n\
         2024-05-02 09:02,100,98,99,100.5,10\n\
         2024-05-02 09:03,NaN,101,99,100.5,10\n\
         2024-05-02 09:04,0,101,0,100.5,10\n\
         2024-05-02 09:05,100.5,102,100,101.5,10\n",
    )
    .unwrap();
    let bars = CsvFeed::new(dir.path()).fetch_intraday_bars("X").unwrap();
    assert_eq!(bars.len(), 2);
    assert!(bars.iter().all(Bar::is_sane));
    assert_eq!(bars[1].close, 101.5);
}

#[test]
fn csv_feed_rejects_malformed_reference() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("X.reference.toml"), "previous_close = \"lots\"\n").unwrap();
    let err = CsvFeed::new(dir.path())
        .fetch_session_reference("X")
        .unwrap_err();
    assert!(matches!(err, FeedError::Parse { .. }));
}

// ──────────────────────────────────────────────
// Snapshot → evaluation
// ──────────────────────────────────────────────

#[test]
fn snapshot_from_files_fires_breakout() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let feed = CsvFeed::new(dir.path());

    let snapshot = MarketSnapshot::fetch(&feed, "2330", EvaluationMode::IntradaySniper).unwrap();
    assert!(snapshot.realtime.is_none());
    assert!(snapshot.daily_bars.is_empty());

    let evaluator = evaluator_for(EvaluationMode::IntradaySniper, SniperConfig::default());
    let eval = evaluator.evaluate(&snapshot.context(None, None, at(9, 30)));
    assert!(eval.fired());
    assert_eq!(eval.symbol, "2330");
}

#[test]
fn quote_file_overrides_last_close() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    fs::write(dir.path().join("2330.quote.toml"), "price = 106.5\n").unwrap();
    let feed = CsvFeed::new(dir.path());

    let snapshot = MarketSnapshot::fetch(&feed, "2330", EvaluationMode::IntradaySniper).unwrap();
    let eval = evaluator_for(EvaluationMode::IntradaySniper, SniperConfig::default())
        .evaluate(&snapshot.context(Some(Position::new(100.0)), None, at(9, 30)));

    let signal = eval.signal().unwrap();
    assert_eq!(signal.metrics.unwrap().close, 106.5);
    let trailing = eval.trailing.unwrap();
    assert_eq!(trailing.phase, TrailingPhase::LockProfit);
    assert!(!trailing.is_paper);
}

#[test]
fn next_day_without_quote_is_stale() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let snapshot =
        MarketSnapshot::fetch(&CsvFeed::new(dir.path()), "2330", EvaluationMode::IntradaySniper)
            .unwrap();
    let tomorrow = NaiveDate::from_ymd_opt(2024, 5, 3)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    let eval = evaluator_for(EvaluationMode::IntradaySniper, SniperConfig::default())
        .evaluate(&snapshot.context(None, None, tomorrow));
    assert_eq!(eval.signal().unwrap().status, ReportStatus::Stale);
    assert!(eval.trailing.is_some());
}

#[test]
fn failed_quote_degrades_to_bars() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let feed = FlakyQuoteFeed {
        bars: CsvFeed::read_bars(&dir.path().join("2330.intraday.csv")).unwrap(),
        quote_calls: AtomicUsize::new(0),
    };
    let snapshot = MarketSnapshot::fetch(&feed, "2330", EvaluationMode::IntradaySniper).unwrap();
    assert_eq!(feed.quote_calls.load(Ordering::SeqCst), 1);
    assert!(snapshot.realtime.is_none());
    assert_eq!(snapshot.intraday_bars.len(), 4);
}

#[test]
fn bar_errors_propagate() {
    let feed = FlakyQuoteFeed {
        bars: Vec::new(),
        quote_calls: AtomicUsize::new(0),
    };
    let err = MarketSnapshot::fetch(&feed, "9999", EvaluationMode::DailyTechnical).unwrap_err();
    assert!(matches!(err, FeedError::SymbolNotFound { .. }));
    assert_eq!(feed.quote_calls.load(Ordering::SeqCst), 0);
}
