//! Market data feeds.
//!
//! The engine only consumes materialized data; fetching lives here behind the
//! [`MarketFeed`] trait so sources can be swapped and mocked.

pub mod circuit_breaker;
pub mod csv_feed;
pub mod provider;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use csv_feed::CsvFeed;
pub use provider::{FeedError, MarketFeed, MarketSnapshot};
pub use yahoo::YahooFeed;
