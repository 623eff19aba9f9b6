//! Price Tracker - Dynamic supply/demand pricing
//!
//! This crate keeps a price multiplier per item that rises as items are
//! bought, falls as they are sold and relaxes back to neutral with an
//! exponential half-life. Multipliers live at three tiers (global, per shop,
//! per player) and a transaction is priced by multiplying all three.
//!
//! ## Architecture
//!
//! - [`ItemTracker`]: one item's multiplier, rates, caps and history
//! - [`PriceManipulator`]: an ordered set of trackers for one tier owner plus
//!   the default template and reset schedule
//! - [`PriceCalculator`]: the three tiers, previews and confirmation
//! - [`TransactionPreview`]: a per-unit quote with affordability limits
//!
//! The host drives time by calling [`PriceCalculator::think_tick`] once a
//! minute and supplies item base prices, balances and identities.

pub mod bounded;
pub mod calculator;
pub mod config;
pub mod decay;
pub mod error;
pub mod events;
pub mod history;
pub mod manipulator;
pub mod preview;
pub mod schedule;
pub mod shared;
pub mod tracker;
pub mod types;

pub use bounded::BoundedAccumulator;
pub use calculator::{PriceCalculator, PriceCalculatorBuilder};
pub use config::{GroupConfig, PricingConfig, ResetSetting, TierConfig, TrackerConfig};
pub use error::PricingError;
pub use events::PriceUpdateEvent;
pub use history::{HistorySummary, HistoryTrace};
pub use manipulator::PriceManipulator;
pub use preview::{QuoteRequest, TransactionPreview};
pub use schedule::ResetSchedule;
pub use shared::SharedCalculator;
pub use tracker::ItemTracker;
pub use types::{Currency, Direction, PlayerId, ShopId, Tier};

// Result type alias
pub type Result<T> = std::result::Result<T, PricingError>;

/// Number of samples kept by a history trace (one per minute)
pub const HISTORY_LENGTH: usize = 25;

/// Milliseconds per decay tick
pub const TICK_MILLIS: i64 = 60_000;
