//! Three-phase trailing stop.
//!
//! Phase is chosen from the live ROI on every call:
//!
//! - **LockProfit** (ROI above the lock threshold): stop trails the current price.
//! - **BreakEven** (ROI above the break-even threshold): stop sits just above cost.
//! - **Accumulate** (otherwise): initial stop below cost.
//!
//! In `StopMode::Recompute` the stop is derived from the current price only and
//! can move down when price retraces. `StopMode::Ratchet` takes the caller's
//! previous stop and never returns anything lower. The manager itself keeps
//! no state either way.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{StopMode, TrailingConfig};
use crate::domain::Position;

/// Named trailing-stop phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingPhase {
    Accumulate,
    BreakEven,
    LockProfit,
}

impl fmt::Display for TrailingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accumulate => "accumulate",
            Self::BreakEven => "break-even",
            Self::LockProfit => "lock-profit",
        })
    }
}

/// Current stop level and the phase that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingState {
    pub phase: TrailingPhase,
    pub stop_price: f64,
    pub roi_pct: f64,
    pub cost_basis: f64,
    pub current_price: f64,
    /// No real position: the stop is informational, never an order trigger.
    pub is_paper: bool,
    /// The caller's previous stop was kept because the new one was lower.
    pub held_by_ratchet: bool,
}

/// Computes the protective stop from price and optional cost basis.
#[derive(Debug, Clone, Copy)]
pub struct TrailingStopManager<'a> {
    config: &'a TrailingConfig,
}

impl<'a> TrailingStopManager<'a> {
    pub fn new(config: &'a TrailingConfig) -> Self {
        Self { config }
    }

    pub fn phase_for(&self, roi_pct: f64) -> TrailingPhase {
        if roi_pct > self.config.lock_profit_roi_pct {
            TrailingPhase::LockProfit
        } else if roi_pct > self.config.breakeven_roi_pct {
            TrailingPhase::BreakEven
        } else {
            TrailingPhase::Accumulate
        }
    }

    /// Stop state for `current_price`.
    ///
    /// A missing or non-positive cost basis makes the current price its own
    /// baseline (ROI 0, Accumulate). `previous_stop` is only consulted in
    /// ratchet mode and only for real positions.
    pub fn evaluate(
        &self,
        current_price: f64,
        position: Option<Position>,
        previous_stop: Option<f64>,
    ) -> TrailingState {
        let real_cost = position
            .map(|p| p.cost_basis)
            .filter(|c| c.is_finite() && *c > 0.0);
        let is_paper = real_cost.is_none();
        let cost_basis = real_cost.unwrap_or(current_price);

        let roi_pct = if cost_basis > 0.0 {
            (current_price - cost_basis) / cost_basis * 100.0
        } else {
            0.0
        };

        let phase = self.phase_for(roi_pct);
        let cfg = self.config;
        let computed = match phase {
            TrailingPhase::LockProfit => current_price * (1.0 - cfg.lock_profit_trail_pct / 100.0),
            TrailingPhase::BreakEven => cost_basis * (1.0 + cfg.breakeven_buffer_pct / 100.0),
            TrailingPhase::Accumulate => cost_basis * (1.0 - cfg.initial_stop_pct / 100.0),
        };

        let previous = match cfg.stop_mode {
            StopMode::Ratchet if !is_paper => previous_stop.filter(|s| s.is_finite()),
            _ => None,
        };
        let (stop_price, held_by_ratchet) = match previous {
            Some(prev) if prev > computed => (prev, true),
            _ => (computed, false),
        };

        TrailingState {
            phase,
            stop_price,
            roi_pct,
            cost_basis,
            current_price,
            is_paper,
            held_by_ratchet,
        }
    }
}
