//! File-backed feed.
//!
//! Layout under the data directory, per symbol:
//!
//! | File | Content |
//! |---|---|
//! | `<SYMBOL>.intraday.csv` | `timestamp,open,high,low,close,volume` minute bars |
//! | `<SYMBOL>.daily.csv` | same columns, one row per day |
//! | `<SYMBOL>.reference.toml` | `previous_close`, `previous_session_volume` |
//! | `<SYMBOL>.quote.toml` | `price` (optional real-time override) |
//!
//! Timestamps are session-local: `YYYY-MM-DD HH:MM[:SS]`, the same with a
//! `T` separator, or a bare `YYYY-MM-DD` for daily rows. A missing file means
//! "no data"; a malformed file is an error. Rows with impossible prices
//! (NaN, non-positive, high below low) are skipped with a warning.

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::provider::{FeedError, MarketFeed};
use crate::domain::{Bar, RealtimeOverride, SessionReference};

#[derive(Debug, Deserialize)]
struct CsvBarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}

/// Reads snapshots from a directory of CSV/TOML files.
#[derive(Debug, Clone)]
pub struct CsvFeed {
    dir: PathBuf,
}

impl CsvFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, symbol: &str, suffix: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.{suffix}"))
    }

    /// Parse a bar CSV. Rows are sorted ascending; duplicate timestamps keep the last row.
    pub fn read_bars(path: &Path) -> Result<Vec<Bar>, FeedError> {
        if !path.exists() {
            debug!(path = %path.display(), "no bar file");
            return Ok(Vec::new());
        }
        let parse_err = |reason: String| FeedError::Parse {
            path: path.display().to_string(),
            reason,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| parse_err(e.to_string()))?;

        let mut bars = Vec::new();
        for (line, row) in reader.deserialize::<CsvBarRow>().enumerate() {
            let row = row.map_err(|e| parse_err(e.to_string()))?;
            let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
                parse_err(format!(
                    "row {}: invalid timestamp '{}'",
                    line + 1,
                    row.timestamp
                ))
            })?;
            if !(row.volume >= 0.0) {
                return Err(parse_err(format!("row {}: negative volume", line + 1)));
            }
            let bar = Bar {
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume.round() as u64,
            };
            if !bar.is_sane() {
                warn!(path = %path.display(), row = line + 1, %timestamp, "skipping bar with invalid prices");
                continue;
            }
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by(|later, earlier| {
            if later.timestamp == earlier.timestamp {
                std::mem::swap(later, earlier);
                true
            } else {
                false
            }
        });
        Ok(bars)
    }

    fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, FeedError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(FeedError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        toml::from_str(&content)
            .map(Some)
            .map_err(|e| FeedError::Parse {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }
}

impl MarketFeed for CsvFeed {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_intraday_bars(&self, symbol: &str) -> Result<Vec<Bar>, FeedError> {
        Self::read_bars(&self.path(symbol, "intraday.csv"))
    }

    fn fetch_session_reference(
        &self,
        symbol: &str,
    ) -> Result<Option<SessionReference>, FeedError> {
        Self::read_toml(&self.path(symbol, "reference.toml"))
    }

    fn fetch_realtime_quote(&self, symbol: &str) -> Result<Option<f64>, FeedError> {
        let quote: Option<RealtimeOverride> = Self::read_toml(&self.path(symbol, "quote.toml"))?;
        Ok(quote.map(|q| q.price))
    }

    fn fetch_daily_bars(&self, symbol: &str) -> Result<Vec<Bar>, FeedError> {
        Self::read_bars(&self.path(symbol, "daily.csv"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(9, 31, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-05-02 09:31:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-02T09:31"), Some(expected));
        assert_eq!(parse_timestamp(" 2024-05-02 09:31 "), Some(expected));
        assert_eq!(
            parse_timestamp("2024-05-02"),
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn missing_files_are_no_data() {
        let feed = CsvFeed::new("/nonexistent/sniper-data");
        assert!(feed.fetch_intraday_bars("2330").unwrap().is_empty());
        assert!(feed.fetch_session_reference("2330").unwrap().is_none());
        assert!(feed.fetch_realtime_quote("2330").unwrap().is_none());
    }
}
