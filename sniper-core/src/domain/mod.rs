//! Domain types for the Sniper engine.

pub mod bar;
pub mod session;

pub use bar::{session_bars, Bar};
pub use session::{Position, RealtimeOverride, SessionReference};
