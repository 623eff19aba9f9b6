use crate::bounded::BoundedAccumulator;
use crate::config::TrackerConfig;
use crate::decay;
use crate::history::HistoryTrace;
use crate::{Currency, Direction, Result, HISTORY_LENGTH};
use item_registry::{ApplicabilityFilter, ItemInstance};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Discrepancies this close to zero are snapped to exactly zero
const DISCREPANCY_EPSILON: f64 = f64::MIN_POSITIVE;

/// Ticks replayed one by one after a fast-forward, enough to refill the history
const REPLAYED_TICKS: u64 = HISTORY_LENGTH as u64 + 2;

/// Price state for the items matched by one filter
///
/// The multiplier is `1 + discrepancy`. Purchases grow it, sales shrink it
/// and every tick relaxes it towards 1.0 with the configured half-life.
#[derive(Debug, Clone)]
pub struct ItemTracker {
    filter: ApplicabilityFilter,

    /// Group name the tracker was configured under
    name: String,

    /// Created from the default template rather than configured
    derived: bool,

    discrepancy: f64,
    growth_rate: f64,
    decay_rate: f64,
    half_life_minutes: f64,
    decay_constant: f64,
    dispersion_devaluation: f64,

    /// Units bought, bounded by the buy cap
    buy_volume: Option<BoundedAccumulator<i64>>,

    /// Units sold, bounded by the sell cap
    sell_volume: Option<BoundedAccumulator<i64>>,

    /// Money paid for purchases, per currency
    spending: HashMap<Currency, BoundedAccumulator<Decimal>>,

    /// Money paid out for sales, per currency
    income: HashMap<Currency, BoundedAccumulator<Decimal>>,

    history: HistoryTrace,

    /// Bumped on every mutation
    revision: u64,
}

impl ItemTracker {
    /// Build a tracker from one configuration group
    pub fn from_config(
        name: impl Into<String>,
        filter: ApplicabilityFilter,
        config: &TrackerConfig,
    ) -> Result<Self> {
        let name = name.into();
        config.validate(&name)?;

        Ok(Self {
            filter,
            name,
            derived: false,
            discrepancy: 0.0,
            growth_rate: config.growth_rate,
            decay_rate: config.decay_rate,
            half_life_minutes: config.half_life_minutes,
            decay_constant: decay::decay_constant(config.half_life_minutes),
            dispersion_devaluation: config.dispersion_devaluation,
            buy_volume: volume_cap(config.item_buy_cap)?,
            sell_volume: volume_cap(config.item_sell_cap)?,
            spending: value_caps(&config.spending_cap)?,
            income: value_caps(&config.income_cap)?,
            history: HistoryTrace::new(),
            revision: 0,
        })
    }

    /// Dump the settings (not the state) of this tracker
    pub fn to_config(&self) -> TrackerConfig {
        let caps = |map: &HashMap<Currency, BoundedAccumulator<Decimal>>| -> BTreeMap<Currency, Decimal> {
            map.iter().map(|(currency, acc)| (currency.clone(), acc.max())).collect()
        };
        TrackerConfig {
            growth_rate: self.growth_rate,
            decay_rate: self.decay_rate,
            half_life_minutes: self.half_life_minutes,
            dispersion_devaluation: self.dispersion_devaluation,
            item_buy_cap: self.buy_volume.map(|acc| acc.max() as u32),
            item_sell_cap: self.sell_volume.map(|acc| acc.max() as u32),
            income_cap: caps(&self.income),
            spending_cap: caps(&self.spending),
        }
    }

    /// Fresh tracker with the same rates and caps but zeroed state
    pub fn new_tracker(&self, filter: ApplicabilityFilter) -> Self {
        let fresh = |acc: &BoundedAccumulator<i64>| {
            let mut acc = *acc;
            acc.reset();
            acc
        };
        let fresh_map = |map: &HashMap<Currency, BoundedAccumulator<Decimal>>| {
            map.iter()
                .map(|(currency, acc)| {
                    let mut acc = *acc;
                    acc.reset();
                    (currency.clone(), acc)
                })
                .collect()
        };

        Self {
            name: filter.to_string(),
            filter,
            derived: false,
            discrepancy: 0.0,
            growth_rate: self.growth_rate,
            decay_rate: self.decay_rate,
            half_life_minutes: self.half_life_minutes,
            decay_constant: self.decay_constant,
            dispersion_devaluation: self.dispersion_devaluation,
            buy_volume: self.buy_volume.as_ref().map(fresh),
            sell_volume: self.sell_volume.as_ref().map(fresh),
            spending: fresh_map(&self.spending),
            income: fresh_map(&self.income),
            history: HistoryTrace::new(),
            revision: 0,
        }
    }

    /// Fresh copy keeping filter, name and origin
    pub fn fresh_copy(&self) -> Self {
        let mut copy = self.new_tracker(self.filter.clone());
        copy.name = self.name.clone();
        copy.derived = self.derived;
        copy
    }

    /// Take over rates, devaluation and caps from `other`, keeping the
    /// accumulated state clamped into the new caps
    pub fn merge(&mut self, other: &ItemTracker) {
        self.growth_rate = other.growth_rate;
        self.decay_rate = other.decay_rate;
        self.half_life_minutes = other.half_life_minutes;
        self.decay_constant = other.decay_constant;
        self.dispersion_devaluation = other.dispersion_devaluation;

        self.buy_volume = merge_volume(&self.name, "buy volume", self.buy_volume, other.buy_volume);
        self.sell_volume = merge_volume(&self.name, "sell volume", self.sell_volume, other.sell_volume);
        self.spending = merge_values(&self.name, "spending", &self.spending, &other.spending);
        self.income = merge_values(&self.name, "income", &self.income, &other.income);
        self.revision += 1;
    }

    pub fn matches(&self, item: &ItemInstance) -> bool {
        self.filter.matches(item)
    }

    /// Current multiplier
    pub fn peek(&self) -> f64 {
        1.0 + self.discrepancy
    }

    /// Apply `amount` purchases; returns the multiplier before the change
    pub fn grow(&mut self, amount: u32) -> f64 {
        let before = self.peek();
        self.set_multiplier(decay::exponential_growth(before, self.growth_rate, amount as u64));
        if let Some(volume) = self.buy_volume.as_mut() {
            volume.increase(amount as i64);
        }
        before
    }

    /// Apply `amount` sales; returns the multiplier before the change
    pub fn decay(&mut self, amount: u32) -> f64 {
        let before = self.peek();
        self.set_multiplier(decay::exponential_decay(before, self.decay_rate, amount as u64));
        if let Some(volume) = self.sell_volume.as_mut() {
            volume.increase(amount as i64);
        }
        before
    }

    /// Grow or decay depending on the trade direction
    pub fn trade(&mut self, direction: Direction, amount: u32) -> f64 {
        match direction {
            Direction::Purchase => self.grow(amount),
            Direction::Sale => self.decay(amount),
        }
    }

    /// Book money moved by a trade against the currency caps
    pub fn book_value(&mut self, direction: Direction, currency: &Currency, value: Decimal) {
        let accounts = match direction {
            Direction::Purchase => &mut self.spending,
            Direction::Sale => &mut self.income,
        };
        if let Some(acc) = accounts.get_mut(currency) {
            acc.increase(value);
            self.revision += 1;
        }
    }

    fn set_multiplier(&mut self, multiplier: f64) {
        // the multiplier stays within [0, f64::MAX]
        self.discrepancy = multiplier.clamp(0.0, f64::MAX) - 1.0;
        self.history.record(self.peek());
        self.revision += 1;
    }

    /// Advance one minute
    pub fn decay_tick(&mut self) {
        self.history.record(self.peek());
        self.history.shift();
        if self.decay_constant != 0.0 {
            self.discrepancy = if self.discrepancy.abs() > DISCREPANCY_EPSILON {
                self.discrepancy * (-self.decay_constant).exp()
            } else {
                0.0
            };
        }
        self.history.record(self.peek());
        self.revision += 1;
    }

    /// Advance `minutes` minutes without replaying each one
    pub fn decay_ticks(&mut self, minutes: u64) {
        let mut remaining = minutes;
        if minutes > REPLAYED_TICKS {
            let skipped = minutes - REPLAYED_TICKS;
            if self.decay_constant != 0.0 {
                self.discrepancy = decay::relax(self.discrepancy, self.decay_constant, skipped);
                if self.discrepancy.abs() <= DISCREPANCY_EPSILON {
                    self.discrepancy = 0.0;
                }
            }
            remaining = REPLAYED_TICKS;
        }
        for _ in 0..remaining {
            self.decay_tick();
        }
    }

    /// Back to neutral: no discrepancy, empty accumulators, flat history
    pub fn reset(&mut self) {
        self.discrepancy = 0.0;
        for volume in [self.buy_volume.as_mut(), self.sell_volume.as_mut()].into_iter().flatten() {
            volume.reset();
        }
        for acc in self.spending.values_mut().chain(self.income.values_mut()) {
            acc.reset();
        }
        self.history = HistoryTrace::new();
        self.revision += 1;
    }

    /// Price history is flat at 1.0
    pub fn is_idle(&self) -> bool {
        self.history.is_idle()
    }

    /// Idle and nothing booked against any cap since the last reset, so
    /// dropping the tracker loses no state
    pub fn is_at_rest(&self) -> bool {
        self.is_idle()
            && self.buy_volume.iter().chain(self.sell_volume.iter()).all(BoundedAccumulator::is_reset)
            && self.spending.values().chain(self.income.values()).all(BoundedAccumulator::is_reset)
    }

    /// Units that can still be bought, `None` when unlimited
    pub fn purchase_item_capacity(&self) -> Option<i64> {
        self.buy_volume.map(|acc| acc.increase_room())
    }

    /// Units that can still be sold, `None` when unlimited
    pub fn sale_item_capacity(&self) -> Option<i64> {
        self.sell_volume.map(|acc| acc.increase_room())
    }

    /// Money that can still be spent on purchases, `None` when unlimited
    pub fn purchase_value_capacity(&self, currency: &Currency) -> Option<Decimal> {
        self.spending.get(currency).map(|acc| acc.increase_room())
    }

    /// Money that can still be paid out for sales, `None` when unlimited
    pub fn sale_value_capacity(&self, currency: &Currency) -> Option<Decimal> {
        self.income.get(currency).map(|acc| acc.increase_room())
    }

    pub fn item_capacity(&self, direction: Direction) -> Option<i64> {
        match direction {
            Direction::Purchase => self.purchase_item_capacity(),
            Direction::Sale => self.sale_item_capacity(),
        }
    }

    pub fn value_capacity(&self, direction: Direction, currency: &Currency) -> Option<Decimal> {
        match direction {
            Direction::Purchase => self.purchase_value_capacity(currency),
            Direction::Sale => self.sale_value_capacity(currency),
        }
    }

    /// Per-unit factor for the given direction
    pub fn rate(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Purchase => self.growth_rate,
            Direction::Sale => self.decay_rate,
        }
    }

    pub fn filter(&self) -> &ApplicabilityFilter {
        &self.filter
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn is_derived(&self) -> bool {
        self.derived
    }

    pub fn set_derived(&mut self, derived: bool) {
        self.derived = derived;
    }

    /// Same configuration group: equal filter and case-insensitively equal name
    pub fn same_group(&self, other: &ItemTracker) -> bool {
        self.filter == other.filter && self.name.eq_ignore_ascii_case(&other.name)
    }

    pub fn discrepancy(&self) -> f64 {
        self.discrepancy
    }

    pub fn growth_rate(&self) -> f64 {
        self.growth_rate
    }

    pub fn decay_rate(&self) -> f64 {
        self.decay_rate
    }

    pub fn half_life_minutes(&self) -> f64 {
        self.half_life_minutes
    }

    pub fn decay_constant(&self) -> f64 {
        self.decay_constant
    }

    /// Factor a host may apply to static sell prices of this item
    pub fn dispersion_devaluation(&self) -> f64 {
        self.dispersion_devaluation
    }

    pub fn history(&self) -> &HistoryTrace {
        &self.history
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

fn volume_cap(cap: Option<u32>) -> Result<Option<BoundedAccumulator<i64>>> {
    cap.map(|max| BoundedAccumulator::new(0, max as i64)).transpose()
}

fn value_caps(caps: &BTreeMap<Currency, Decimal>) -> Result<HashMap<Currency, BoundedAccumulator<Decimal>>> {
    caps.iter()
        .map(|(currency, max)| Ok((currency.clone(), BoundedAccumulator::new(Decimal::ZERO, *max)?)))
        .collect()
}

fn rebound<T: crate::bounded::Amount>(
    name: &str,
    what: &str,
    current: &BoundedAccumulator<T>,
    template: &BoundedAccumulator<T>,
) -> BoundedAccumulator<T> {
    let mut merged = *current;
    match merged.rebound(template.min(), template.max()) {
        Ok(true) => {
            warn!("Clamped {} of tracker {} to {}", what, name, merged.value());
            merged
        }
        Ok(false) => merged,
        // template bounds come from a validated accumulator
        Err(_) => *template,
    }
}

fn merge_volume(
    name: &str,
    what: &str,
    current: Option<BoundedAccumulator<i64>>,
    template: Option<BoundedAccumulator<i64>>,
) -> Option<BoundedAccumulator<i64>> {
    match (current, template) {
        (Some(current), Some(template)) => Some(rebound(name, what, &current, &template)),
        (None, Some(mut template)) => {
            template.reset();
            Some(template)
        }
        (_, None) => None,
    }
}

fn merge_values(
    name: &str,
    what: &str,
    current: &HashMap<Currency, BoundedAccumulator<Decimal>>,
    template: &HashMap<Currency, BoundedAccumulator<Decimal>>,
) -> HashMap<Currency, BoundedAccumulator<Decimal>> {
    template
        .iter()
        .map(|(currency, cap)| {
            let merged = match current.get(currency) {
                Some(acc) => rebound(name, what, acc, cap),
                None => {
                    let mut fresh = *cap;
                    fresh.reset();
                    fresh
                }
            };
            (currency.clone(), merged)
        })
        .collect()
}
