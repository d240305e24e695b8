//! Per-session reference data supplied alongside the bar stream.

use serde::{Deserialize, Serialize};

/// Previous-session figures, computed once per trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionReference {
    pub previous_close: f64,
    /// Total traded volume of the previous completed session. May be <= 0 when unknown.
    pub previous_session_volume: f64,
}

/// Latest traded price from a real-time quote source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealtimeOverride {
    pub price: f64,
}

impl RealtimeOverride {
    pub fn new(price: f64) -> Self {
        Self { price }
    }

    /// An override is only usable when its price is a positive finite number.
    pub fn is_usable(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

/// Caller-supplied holding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub cost_basis: f64,
}

impl Position {
    pub fn new(cost_basis: f64) -> Self {
        Self { cost_basis }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_usability() {
        assert!(RealtimeOverride::new(101.5).is_usable());
        assert!(!RealtimeOverride::new(0.0).is_usable());
        assert!(!RealtimeOverride::new(f64::NAN).is_usable());
        assert!(!RealtimeOverride::new(-3.0).is_usable());
    }
}
