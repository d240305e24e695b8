//! Data validity: freshness check and real-time override policy.
//!
//! A usable real-time price always makes the snapshot valid: it replaces the
//! last bar's close and widens its range. Without one, the last bar must be
//! dated today. Stale data is reported as such and never fed to ratio math.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{Bar, RealtimeOverride};

/// Where the latest price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Realtime,
    LastBar,
}

/// Outcome of the freshness check.
#[derive(Debug, Clone, PartialEq)]
pub enum Validity {
    /// No bars at all.
    NoData,
    /// Last bar is from an earlier session and no real-time price is available.
    Stale { last_date: NaiveDate },
    /// Latest bar, with any override already applied.
    Valid { latest: Bar, source: PriceSource },
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// Check freshness and apply the override to the last bar.
pub fn check(bars: &[Bar], today: NaiveDate, realtime: Option<RealtimeOverride>) -> Validity {
    let Some(last) = bars.last() else {
        return Validity::NoData;
    };

    let realtime = realtime.filter(|o| {
        let usable = o.is_usable();
        if !usable {
            warn!(price = o.price, "ignoring unusable real-time price");
        }
        usable
    });

    match realtime {
        Some(o) => Validity::Valid {
            latest: last.with_price(o.price),
            source: PriceSource::Realtime,
        },
        None if last.date() == today => Validity::Valid {
            latest: last.clone(),
            source: PriceSource::LastBar,
        },
        None => Validity::Stale {
            last_date: last.date(),
        },
    }
}
