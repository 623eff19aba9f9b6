//! Per-unit price quotes with affordability limits

use crate::decay;
use crate::tracker::ItemTracker;
use crate::{Currency, Direction, PlayerId, PricingError, Result, ShopId, Tier};
use item_registry::{ApplicabilityFilter, ItemInstance};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// What the host wants priced
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRequest {
    pub item: ItemInstance,
    pub amount: u32,

    /// Static price of one unit before any multiplier
    pub base_price: Decimal,

    pub currency: Currency,
    pub shop: Option<ShopId>,
    pub player: Option<PlayerId>,

    /// Purchases: the player's balance. Sales: how much the account may
    /// still receive. `None` means unlimited.
    pub account_limit: Option<Decimal>,
}

impl QuoteRequest {
    pub fn new(item: ItemInstance, amount: u32, base_price: Decimal, currency: Currency) -> Self {
        Self { item, amount, base_price, currency, shop: None, player: None, account_limit: None }
    }

    pub fn at_shop(mut self, shop: ShopId) -> Self {
        self.shop = Some(shop);
        self
    }

    pub fn for_player(mut self, player: PlayerId) -> Self {
        self.player = Some(player);
        self
    }

    pub fn with_account_limit(mut self, limit: Decimal) -> Self {
        self.account_limit = Some(limit);
        self
    }
}

/// State of one tier's tracker at the moment a preview was computed
#[derive(Debug, Clone, PartialEq)]
pub struct TierQuote {
    pub tier: Tier,
    pub filter: ApplicabilityFilter,
    pub revision: u64,
    pub multiplier: f64,
    pub rate: f64,
    pub item_capacity: Option<i64>,
    pub value_capacity: Option<Decimal>,
}

impl TierQuote {
    pub fn capture(tier: Tier, tracker: &ItemTracker, direction: Direction, currency: &Currency) -> Self {
        Self {
            tier,
            filter: tracker.filter().clone(),
            revision: tracker.revision(),
            multiplier: tracker.peek(),
            rate: tracker.rate(direction),
            item_capacity: tracker.item_capacity(direction),
            value_capacity: tracker.value_capacity(direction, currency),
        }
    }

    /// Multiplier of each unit in turn, `amount` entries
    fn unit_multipliers(&self, direction: Direction, amount: usize) -> Vec<f64> {
        let steps = amount.saturating_sub(1);
        let mut vector = match direction {
            Direction::Purchase => decay::growth_vector(self.multiplier, self.rate, steps),
            Direction::Sale => decay::decay_vector(self.multiplier, self.rate, steps),
        };
        vector.truncate(amount);
        vector
    }
}

/// Quote for buying or selling up to `amount` units
///
/// A preview describes the trackers as they were when it was computed. Any
/// trade or tick on one of those trackers makes it stale; confirming a
/// stale preview is refused, see [`crate::PriceCalculator::confirm`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionPreview {
    direction: Direction,
    request: QuoteRequest,
    tiers: Vec<TierQuote>,

    /// Combined multiplier per unit, first unit first
    unit_multipliers: Vec<f64>,

    /// Total price of the first `n` units at index `n`
    cumulative: Vec<Decimal>,

    limit_by_account: u32,
    limit_by_item_count: u32,
    limit_by_currency: u32,
    affordable: u32,
}

impl TransactionPreview {
    pub fn compute(direction: Direction, request: QuoteRequest, tiers: Vec<TierQuote>) -> Self {
        let mut preview = Self {
            direction,
            request,
            tiers,
            unit_multipliers: Vec::new(),
            cumulative: Vec::new(),
            limit_by_account: 0,
            limit_by_item_count: 0,
            limit_by_currency: 0,
            affordable: 0,
        };
        preview.update();
        preview
    }

    /// Recompute prices and limits from the captured tier state
    fn update(&mut self) {
        let amount = self.request.amount as usize;

        let mut combined = vec![1.0; amount];
        for tier in &self.tiers {
            for (unit, factor) in combined.iter_mut().zip(tier.unit_multipliers(self.direction, amount)) {
                *unit *= factor;
            }
        }

        self.limit_by_item_count = self
            .tiers
            .iter()
            .filter_map(|tier| tier.item_capacity)
            .min()
            .map_or(u32::MAX, |capacity| u32::try_from(capacity.max(0)).unwrap_or(u32::MAX));
        let value_ceiling = self.tiers.iter().filter_map(|tier| tier.value_capacity).min();

        self.cumulative = Vec::with_capacity(amount + 1);
        self.cumulative.push(Decimal::ZERO);
        self.limit_by_account = 0;
        self.limit_by_currency = 0;

        let mut total = Decimal::ZERO;
        for (index, multiplier) in combined.iter().enumerate() {
            let unit_price = self.request.base_price.checked_mul(to_decimal(*multiplier)).unwrap_or(Decimal::MAX);
            total = total.checked_add(unit_price).unwrap_or(Decimal::MAX);
            self.cumulative.push(total);

            let units = index as u32 + 1;
            if self.request.account_limit.map_or(true, |limit| total <= limit) {
                self.limit_by_account = units;
            }
            if value_ceiling.map_or(true, |ceiling| total <= ceiling) {
                self.limit_by_currency = units;
            }
        }
        self.unit_multipliers = combined;

        self.affordable = self
            .limit_by_account
            .min(self.limit_by_item_count)
            .min(self.limit_by_currency)
            .min(self.request.amount);
    }

    /// Total price of the first `units` units
    pub fn cumulative_value_for(&self, units: u32) -> Result<Decimal> {
        self.cumulative
            .get(units as usize)
            .copied()
            .ok_or_else(|| PricingError::out_of_range("item count", units, 0, self.request.amount))
    }

    /// Total price of everything that can actually be traded
    pub fn affordable_value(&self) -> Decimal {
        self.cumulative[self.affordable as usize]
    }

    /// Price of the `index`-th unit (0-based)
    pub fn unit_price(&self, index: u32) -> Result<Decimal> {
        let index = index as usize;
        match (self.cumulative.get(index), self.cumulative.get(index + 1)) {
            (Some(before), Some(after)) => Ok(*after - *before),
            _ => Err(PricingError::out_of_range(
                "unit index",
                index,
                0,
                self.request.amount.saturating_sub(1),
            )),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn request(&self) -> &QuoteRequest {
        &self.request
    }

    pub fn item(&self) -> &ItemInstance {
        &self.request.item
    }

    pub fn amount(&self) -> u32 {
        self.request.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.request.currency
    }

    pub fn tiers(&self) -> &[TierQuote] {
        &self.tiers
    }

    pub fn unit_multipliers(&self) -> &[f64] {
        &self.unit_multipliers
    }

    pub fn cumulative_values(&self) -> &[Decimal] {
        &self.cumulative
    }

    /// Units the account balance (or income headroom) covers
    pub fn limit_by_account(&self) -> u32 {
        self.limit_by_account
    }

    /// Units left under the tightest item cap, `u32::MAX` when uncapped
    pub fn limit_by_item_count(&self) -> u32 {
        self.limit_by_item_count
    }

    /// Units left under the tightest currency cap
    pub fn limit_by_currency(&self) -> u32 {
        self.limit_by_currency
    }

    /// Largest amount that can be confirmed
    pub fn affordable_amount(&self) -> u32 {
        self.affordable
    }
}

/// Saturating conversion for multipliers
fn to_decimal(value: f64) -> Decimal {
    if value.is_nan() || value <= 0.0 {
        return Decimal::ZERO;
    }
    Decimal::from_f64(value).unwrap_or(Decimal::MAX)
}
