//! Property tests for signal and stop invariants.
//!
//! Uses proptest to verify:
//! 1. A flat body always fails the shadow gate
//! 2. `qualifies` implies a green candle inside the trend band
//! 3. A non-positive reference volume never passes the volume gate
//! 4. Nothing fires after the cutoff
//! 5. The final signal is exactly the conjunction of the gates
//! 6. Ratchet stops never loosen; recompute stops are a pure function of price

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use proptest::prelude::*;
use sniper_core::config::{ShapeConfig, TrailingConfig, WindowConfig};
use sniper_core::domain::{Bar, Position, SessionReference};
use sniper_core::shape;
use sniper_core::window::TimeWindowPolicy;
use sniper_core::{evaluate, SniperConfig, StopMode, TrailingStopManager};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_minute() -> impl Strategy<Value = NaiveTime> {
    (9u32..14, 0u32..60).prop_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap())
}

fn session_time(t: NaiveTime) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 2).unwrap().and_time(t)
}

fn bar(ts: NaiveDateTime, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Bar {
    Bar {
        timestamp: ts,
        open,
        high,
        low,
        close,
        volume,
    }
}

// ── Shape ────────────────────────────────────────────────────────────

proptest! {
    /// A body within the doji epsilon reports the sentinel and fails the shadow gate.
    #[test]
    fn doji_never_passes_shadow(
        open in arb_price(),
        drift in -0.009..0.009_f64,
        wick in 0.0..5.0_f64,
    ) {
        let cfg = ShapeConfig::default();
        let close = open + drift;
        let b = bar(session_time(NaiveTime::from_hms_opt(9, 30, 0).unwrap()),
            open, open.max(close) + wick, open.min(close), close, 1);
        let m = shape::analyze(&b, open, open, None, &cfg);
        prop_assert_eq!(m.shadow_ratio, cfg.doji_shadow_ratio);
        prop_assert!(!m.shadow_ok(&cfg));
    }

    /// `qualifies` only ever holds for a green candle with trend inside the band.
    #[test]
    fn qualifies_implies_band(
        prev in arb_price(),
        open_move in -0.1..0.1_f64,
        close_move in -0.1..0.1_f64,
    ) {
        let cfg = ShapeConfig::default();
        let open = prev * (1.0 + open_move);
        let close = prev * (1.0 + close_move);
        let b = bar(session_time(NaiveTime::from_hms_opt(9, 30, 0).unwrap()),
            open, open.max(close), open.min(close), close, 1);
        let m = shape::analyze(&b, open, prev, None, &cfg);
        if m.qualifies(&cfg) {
            prop_assert!(close > open);
            prop_assert!(m.trend_pct >= cfg.min_trend_pct);
            prop_assert!(m.trend_pct <= cfg.max_trend_pct);
            prop_assert!(m.body_pct >= cfg.min_body_pct);
        }
        if close <= open {
            prop_assert!(!m.qualifies(&cfg));
        }
    }
}

// ── Window ───────────────────────────────────────────────────────────

proptest! {
    /// Ratio is zero without a positive reference, so the gate stays shut.
    #[test]
    fn zero_reference_volume_never_ok(
        t in arb_minute(),
        volume in 0u64..10_000_000,
        reference in -1_000.0..=0.0_f64,
    ) {
        let cfg = SniperConfig::default();
        let ts = session_time(t);
        let bars = vec![bar(ts, 100.0, 106.0, 100.0, 105.0, volume)];
        let reference = SessionReference { previous_close: 100.0, previous_session_volume: reference };
        let (report, _) = evaluate(&bars, Some(&reference), None, None, ts, &cfg);
        prop_assert!(!report.volume_ok);
        prop_assert!(!report.final_signal);
    }

    /// Past the cutoff both the time gate and the signal are off.
    #[test]
    fn nothing_fires_after_cutoff(t in arb_minute(), volume in 0u64..10_000_000) {
        let window = WindowConfig::default();
        prop_assume!(t > window.cutoff);
        let cfg = SniperConfig::default();
        let ts = session_time(t);
        let bars = vec![bar(ts, 100.0, 106.0, 100.0, 105.0, volume)];
        let reference = SessionReference { previous_close: 100.0, previous_session_volume: 1_000.0 };
        let (report, _) = evaluate(&bars, Some(&reference), None, None, ts, &cfg);
        prop_assert!(!report.time_ok);
        prop_assert!(!report.final_signal);
        prop_assert!(!TimeWindowPolicy::new(&window).volume_ok(t, f64::MAX));
    }

    /// The final signal is the plain conjunction of every gate.
    #[test]
    fn final_signal_is_conjunction(
        t in arb_minute(),
        close in 95.0..110.0_f64,
        wick in 0.0..3.0_f64,
        volume in 0u64..5_000,
    ) {
        let cfg = SniperConfig::default();
        let ts = session_time(t);
        let bars = vec![bar(ts, 100.5, close.max(100.5) + wick, close.min(100.5), close, volume)];
        let reference = SessionReference { previous_close: 100.0, previous_session_volume: 10_000.0 };
        let (r, _) = evaluate(&bars, Some(&reference), None, None, ts, &cfg);
        prop_assert_eq!(
            r.final_signal,
            r.qualifies && r.shadow_ok && r.volume_ok && r.time_ok && r.data_valid
        );
        prop_assert_eq!(r.final_signal, r.first_failure().is_none());
    }
}

// ── Trailing ─────────────────────────────────────────────────────────

proptest! {
    /// Feeding each stop back as the previous stop never lowers it.
    #[test]
    fn ratchet_never_loosens(
        cost in arb_price(),
        moves in prop::collection::vec(-0.08..0.12_f64, 1..30),
    ) {
        let cfg = TrailingConfig { stop_mode: StopMode::Ratchet, ..TrailingConfig::default() };
        let pm = TrailingStopManager::new(&cfg);
        let mut previous: Option<f64> = None;
        for m in moves {
            let state = pm.evaluate(cost * (1.0 + m), Some(Position::new(cost)), previous);
            if let Some(prev) = previous {
                prop_assert!(state.stop_price >= prev);
            }
            previous = Some(state.stop_price);
        }
    }

    /// Recompute mode ignores history entirely.
    #[test]
    fn recompute_ignores_previous_stop(
        cost in arb_price(),
        price in arb_price(),
        previous in arb_price(),
    ) {
        let cfg = TrailingConfig::default();
        let pm = TrailingStopManager::new(&cfg);
        let with = pm.evaluate(price, Some(Position::new(cost)), Some(previous));
        let without = pm.evaluate(price, Some(Position::new(cost)), None);
        prop_assert_eq!(with, without);
    }

    /// Stops are always positive and below the price outside break-even.
    #[test]
    fn stop_is_positive(cost in arb_price(), price in arb_price()) {
        let cfg = TrailingConfig::default();
        let s = TrailingStopManager::new(&cfg).evaluate(price, Some(Position::new(cost)), None);
        prop_assert!(s.stop_price > 0.0);
        if s.phase != sniper_core::TrailingPhase::BreakEven {
            prop_assert!(s.stop_price < price.max(cost));
        }
    }
}
