//! Engine configuration.
//!
//! Every threshold the engine uses lives here under a named field. The
//! defaults reproduce the tuned constants of the intraday sniper; a TOML file
//! may override any subset of them (every section is `#[serde(default)]`).
//!
//! ```toml
//! [shape]
//! min_trend_pct = 2.0
//! max_trend_pct = 8.0
//!
//! [window]
//! cutoff = "10:30"
//!
//! [[window.buckets]]
//! start = "09:05"
//! end = "09:15"
//! min_volume_ratio_pct = 10.0
//! ```

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SniperConfig {
    pub shape: ShapeConfig,
    pub window: WindowConfig,
    pub trailing: TrailingConfig,
    pub daily: DailyConfig,
}

impl SniperConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject configurations that would make a gate unsatisfiable by construction
    /// or produce a stop above the price it protects.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shape.validate()?;
        self.window.validate()?;
        self.trailing.validate()?;
        self.daily.validate()
    }
}

/// Candle-shape qualification thresholds. Percentages are in percent units (2.0 = 2%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeConfig {
    /// Lower bound of the trend band vs. previous close (inclusive).
    pub min_trend_pct: f64,
    /// Upper bound of the trend band vs. previous close (inclusive).
    pub max_trend_pct: f64,
    /// Minimum signed body size vs. previous close.
    pub min_body_pct: f64,
    /// Maximum upper shadow / body ratio.
    pub max_shadow_ratio: f64,
    /// Bodies at or below this size (currency units) are treated as a doji.
    pub doji_epsilon: f64,
    /// Shadow ratio reported for a doji body.
    pub doji_shadow_ratio: f64,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            min_trend_pct: 2.0,
            max_trend_pct: 8.0,
            min_body_pct: 0.2,
            max_shadow_ratio: 0.5,
            doji_epsilon: 0.01,
            doji_shadow_ratio: 99.9,
        }
    }
}

impl ShapeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_trend_pct <= self.max_trend_pct) {
            return Err(invalid(
                "shape.min_trend_pct",
                format!(
                    "must be <= max_trend_pct ({} > {})",
                    self.min_trend_pct, self.max_trend_pct
                ),
            ));
        }
        if !(self.doji_epsilon >= 0.0) {
            return Err(invalid("shape.doji_epsilon", "must be >= 0"));
        }
        if !(self.max_shadow_ratio >= 0.0) {
            return Err(invalid("shape.max_shadow_ratio", "must be >= 0"));
        }
        if self.doji_shadow_ratio <= self.max_shadow_ratio {
            return Err(invalid(
                "shape.doji_shadow_ratio",
                "must exceed max_shadow_ratio so a doji never passes the shadow gate",
            ));
        }
        Ok(())
    }
}

/// One time-of-day bucket with its required volume ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeBucket {
    /// Inclusive start (session-local).
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    /// Exclusive end (session-local).
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    /// Required cumulative volume as a percentage of the previous session's volume.
    pub min_volume_ratio_pct: f64,
}

impl VolumeBucket {
    pub fn new(start: NaiveTime, end: NaiveTime, min_volume_ratio_pct: f64) -> Self {
        Self {
            start,
            end,
            min_volume_ratio_pct,
        }
    }

    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t < self.end
    }
}

/// Time-of-day gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Latest time (inclusive) at which a signal may fire.
    #[serde(with = "hhmm")]
    pub cutoff: NaiveTime,
    /// Buckets in ascending, non-overlapping order. First match wins.
    pub buckets: Vec<VolumeBucket>,
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            cutoff: hm(10, 30),
            buckets: vec![
                VolumeBucket::new(hm(9, 5), hm(9, 15), 10.0),
                VolumeBucket::new(hm(9, 15), hm(10, 0), 20.0),
                VolumeBucket::new(hm(10, 0), hm(10, 30), 30.0),
            ],
        }
    }
}

impl WindowConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for bucket in &self.buckets {
            if bucket.start >= bucket.end {
                return Err(invalid(
                    "window.buckets",
                    format!("bucket {}..{} is empty", bucket.start, bucket.end),
                ));
            }
            if !(bucket.min_volume_ratio_pct >= 0.0) {
                return Err(invalid(
                    "window.buckets.min_volume_ratio_pct",
                    "must be >= 0",
                ));
            }
        }
        for pair in self.buckets.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(invalid(
                    "window.buckets",
                    format!(
                        "buckets must be ascending and non-overlapping ({} starts before {})",
                        pair[1].start, pair[0].end
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// How successive stop levels relate to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    /// Recompute the stop from the current price every cycle; it may move down.
    #[default]
    Recompute,
    /// Never return a stop below the previous stop the caller passes back in.
    Ratchet,
}

/// Three-phase trailing stop parameters. Percentages are in percent units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailingConfig {
    /// ROI above which the stop trails the current price.
    pub lock_profit_roi_pct: f64,
    /// ROI above which the stop moves to break-even.
    pub breakeven_roi_pct: f64,
    /// Trail distance below the current price in the lock-profit phase.
    pub lock_profit_trail_pct: f64,
    /// Buffer above cost basis in the break-even phase.
    pub breakeven_buffer_pct: f64,
    /// Initial stop distance below cost basis.
    pub initial_stop_pct: f64,
    pub stop_mode: StopMode,
}

impl Default for TrailingConfig {
    fn default() -> Self {
        Self {
            lock_profit_roi_pct: 5.0,
            breakeven_roi_pct: 2.0,
            lock_profit_trail_pct: 2.5,
            breakeven_buffer_pct: 0.5,
            initial_stop_pct: 2.5,
            stop_mode: StopMode::Recompute,
        }
    }
}

impl TrailingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.breakeven_roi_pct < self.lock_profit_roi_pct) {
            return Err(invalid(
                "trailing.breakeven_roi_pct",
                "must be below lock_profit_roi_pct",
            ));
        }
        for (field, value) in [
            ("trailing.lock_profit_trail_pct", self.lock_profit_trail_pct),
            ("trailing.initial_stop_pct", self.initial_stop_pct),
            ("trailing.breakeven_buffer_pct", self.breakeven_buffer_pct),
        ] {
            if !(0.0..100.0).contains(&value) {
                return Err(invalid(field, format!("must be in [0, 100), got {value}")));
            }
        }
        Ok(())
    }
}

/// Daily-technical evaluation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyConfig {
    pub rsi_period: usize,
    pub ma_period: usize,
    /// Number of recent bars whose mean volume the last bar is compared against.
    pub volume_lookback: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            ma_period: 20,
            volume_lookback: 5,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
        }
    }
}

impl DailyConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.rsi_period == 0 {
            return Err(invalid("daily.rsi_period", "must be >= 1"));
        }
        if self.ma_period == 0 {
            return Err(invalid("daily.ma_period", "must be >= 1"));
        }
        if self.volume_lookback == 0 {
            return Err(invalid("daily.volume_lookback", "must be >= 1"));
        }
        if !(self.rsi_oversold < self.rsi_overbought) {
            return Err(invalid("daily.rsi_oversold", "must be below rsi_overbought"));
        }
        Ok(())
    }
}

/// `"HH:MM"` (or `"HH:MM:SS"`) serde representation for session-local times.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|e| de::Error::custom(format!("invalid time '{raw}': {e}")))
    }
}
