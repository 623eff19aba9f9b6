use crate::config::PricingConfig;
use crate::events::{PriceUpdateEvent, PriceUpdateNotifier};
use crate::manipulator::PriceManipulator;
use crate::preview::{QuoteRequest, TierQuote, TransactionPreview};
use crate::tracker::ItemTracker;
use crate::{Currency, Direction, PlayerId, PricingError, Result, ShopId, Tier};
use chrono::{DateTime, Utc};
use item_registry::{ApplicabilityFilter, FilterLookup, ItemInstance, ItemRegistry};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Price Calculator - Three tiers of price manipulators
///
/// The global tier is shared by everyone. Shop and player tiers are created
/// on first use from their base manipulator and garbage-collected once idle.
/// A transaction's unit price is `base_price · global · shop · player`.
#[derive(Debug)]
pub struct PriceCalculator {
    global: PriceManipulator,
    shop_base: PriceManipulator,
    player_base: PriceManipulator,
    shops: HashMap<ShopId, PriceManipulator>,
    players: HashMap<PlayerId, PriceManipulator>,
    notifier: PriceUpdateNotifier,
}

/// Builder that refuses to produce a calculator with a missing tier
#[derive(Debug, Default)]
pub struct PriceCalculatorBuilder {
    global: Option<PriceManipulator>,
    shops: Option<PriceManipulator>,
    players: Option<PriceManipulator>,
}

impl PriceCalculatorBuilder {
    pub fn global(mut self, manipulator: PriceManipulator) -> Self {
        self.global = Some(manipulator);
        self
    }

    pub fn shops(mut self, manipulator: PriceManipulator) -> Self {
        self.shops = Some(manipulator);
        self
    }

    pub fn players(mut self, manipulator: PriceManipulator) -> Self {
        self.players = Some(manipulator);
        self
    }

    pub fn build(self) -> Result<PriceCalculator> {
        let missing = |tier: &str| PricingError::invariant(format!("no {tier} price manipulator"));
        Ok(PriceCalculator {
            global: self.global.ok_or_else(|| missing("global"))?,
            shop_base: self.shops.ok_or_else(|| missing("shop base"))?,
            player_base: self.players.ok_or_else(|| missing("player base"))?,
            shops: HashMap::new(),
            players: HashMap::new(),
            notifier: PriceUpdateNotifier::new(),
        })
    }
}

/// Build the three base manipulators of a configuration
fn build_tiers(
    config: &PricingConfig,
    lookup: &dyn FilterLookup,
) -> Result<(PriceManipulator, PriceManipulator, PriceManipulator)> {
    Ok((
        PriceManipulator::from_config("global", &config.global, lookup)?,
        PriceManipulator::from_config("shops", &config.shops, lookup)?,
        PriceManipulator::from_config("players", &config.players, lookup)?,
    ))
}

/// Register the configuration's item definitions on a copy of `registry`
fn stage_registry(config: &PricingConfig, registry: &ItemRegistry) -> Result<ItemRegistry> {
    let mut staged = registry.clone();
    staged
        .load_definitions(&config.items)
        .map_err(|err| PricingError::configuration(format!("items: {err}")))?;
    Ok(staged)
}

impl PriceCalculator {
    pub fn builder() -> PriceCalculatorBuilder {
        PriceCalculatorBuilder::default()
    }

    /// Build a calculator from configuration
    ///
    /// Item definitions from the configuration are added to `registry` only
    /// when the whole configuration is valid.
    pub fn from_config(config: &PricingConfig, registry: &mut ItemRegistry) -> Result<Self> {
        let staged = stage_registry(config, registry)?;
        let (global, shops, players) = build_tiers(config, &staged)?;
        *registry = staged;

        info!("Price calculator ready with {} item definitions", config.items.len());
        Self::builder().global(global).shops(shops).players(players).build()
    }

    /// Apply a new configuration on top of the live state
    pub fn reload(&mut self, config: &PricingConfig, registry: &mut ItemRegistry) -> Result<()> {
        let staged = stage_registry(config, registry)?;
        let (global, shops, players) = build_tiers(config, &staged)?;
        *registry = staged;

        self.merge_manipulators(&global, &shops, &players);
        Ok(())
    }

    /// Merge new base settings into every tier, keeping accrued state
    pub fn merge_manipulators(
        &mut self,
        global: &PriceManipulator,
        shop_base: &PriceManipulator,
        player_base: &PriceManipulator,
    ) {
        self.global.merge(global);
        self.shop_base.merge(shop_base);
        self.player_base.merge(player_base);
        for manipulator in self.shops.values_mut() {
            manipulator.merge(shop_base);
        }
        for manipulator in self.players.values_mut() {
            manipulator.merge(player_base);
        }
        info!(
            "Merged new price settings into {} shops and {} players",
            self.shops.len(),
            self.players.len()
        );
    }

    /// Base settings of all tiers plus the registry's item definitions
    pub fn to_configuration(&self, registry: &ItemRegistry) -> PricingConfig {
        PricingConfig {
            items: registry.definitions(),
            global: self.global.to_config(),
            shops: self.shop_base.to_config(),
            players: self.player_base.to_config(),
        }
    }

    /// Advance every tier by one minute
    pub fn think_tick(&mut self) {
        self.think_tick_at(Utc::now());
    }

    pub fn think_tick_at(&mut self, now: DateTime<Utc>) {
        self.global.think(now);
        for manipulator in self.shops.values_mut().chain(self.players.values_mut()) {
            manipulator.think(now);
        }

        let before = self.shops.len() + self.players.len();
        self.shops.retain(|_, manipulator| !manipulator.is_at_rest());
        self.players.retain(|_, manipulator| !manipulator.is_at_rest());
        let pruned = before - self.shops.len() - self.players.len();
        if pruned > 0 {
            debug!("Pruned {} shop/player manipulators at rest", pruned);
        }
    }

    /// Remove derived trackers at rest everywhere
    pub fn clean_up(&mut self) {
        let mut removed = self.global.clean_up();
        for manipulator in self.shops.values_mut().chain(self.players.values_mut()) {
            removed += manipulator.clean_up();
        }
        debug!("Removed {} idle trackers", removed);
    }

    /// Listen for confirmed trades
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<PriceUpdateEvent> {
        self.notifier.subscribe()
    }

    /// Quote a purchase, deriving any missing tier state
    pub fn purchase_preview(&mut self, request: QuoteRequest) -> TransactionPreview {
        self.preview(Direction::Purchase, request)
    }

    /// Quote a sale, deriving any missing tier state
    pub fn sale_preview(&mut self, request: QuoteRequest) -> TransactionPreview {
        self.preview(Direction::Sale, request)
    }

    fn preview(&mut self, direction: Direction, request: QuoteRequest) -> TransactionPreview {
        let item = &request.item;
        let currency = &request.currency;
        let mut tiers = Vec::with_capacity(3);

        tiers.push(TierQuote::capture(Tier::Global, self.global.resolve(item), direction, currency));
        if let Some(shop) = request.shop {
            let base = &self.shop_base;
            let manipulator = self.shops.entry(shop).or_insert_with(|| base.derive_instance());
            tiers.push(TierQuote::capture(Tier::Shop(shop), manipulator.resolve(item), direction, currency));
        }
        if let Some(player) = request.player {
            let base = &self.player_base;
            let manipulator = self.players.entry(player).or_insert_with(|| base.derive_instance());
            tiers.push(TierQuote::capture(Tier::Player(player), manipulator.resolve(item), direction, currency));
        }

        TransactionPreview::compute(direction, request, tiers)
    }

    /// Recompute a preview against the current tracker state
    pub fn refresh(&mut self, preview: &mut TransactionPreview) {
        *preview = self.preview(preview.direction(), preview.request().clone());
    }

    /// Trade `amount` units of a preview
    ///
    /// Fails with `OutOfRange` above the affordable amount and with
    /// `StalePreview` if any involved tracker changed since the preview was
    /// computed; nothing is mutated on failure. Zero units is a no-op.
    pub fn confirm(&mut self, preview: &TransactionPreview, amount: u32) -> Result<()> {
        if amount > preview.affordable_amount() {
            return Err(PricingError::out_of_range(
                "transaction amount",
                amount,
                0,
                preview.affordable_amount(),
            ));
        }
        if amount == 0 {
            return Ok(());
        }

        for quote in preview.tiers() {
            let current = self.tracker_for(quote.tier, &quote.filter).map(ItemTracker::revision);
            if current != Some(quote.revision) {
                return Err(PricingError::StalePreview {
                    tier: quote.tier.to_string(),
                    item: preview.item().to_string(),
                });
            }
        }

        let value = preview.cumulative_value_for(amount)?;
        let direction = preview.direction();
        for quote in preview.tiers() {
            if let Some(tracker) = self.tracker_for_mut(quote.tier, &quote.filter) {
                tracker.trade(direction, amount);
                tracker.book_value(direction, preview.currency(), value);
            }
        }

        info!("Confirmed {:?} of {} x {} for {} {}", direction, amount, preview.item(), value, preview.currency());
        self.notifier.publish(PriceUpdateEvent {
            item: preview.item().clone(),
            direction,
            amount,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Total price of `amount` units bought now, without creating state
    pub fn current_purchase_price(
        &self,
        item: &ItemInstance,
        amount: u32,
        base_price: Decimal,
        shop: Option<ShopId>,
        player: Option<PlayerId>,
    ) -> Decimal {
        self.display_price(Direction::Purchase, item, amount, base_price, shop, player)
    }

    /// Total price of `amount` units sold now, without creating state
    pub fn current_selling_price(
        &self,
        item: &ItemInstance,
        amount: u32,
        base_price: Decimal,
        shop: Option<ShopId>,
        player: Option<PlayerId>,
    ) -> Decimal {
        self.display_price(Direction::Sale, item, amount, base_price, shop, player)
    }

    fn display_price(
        &self,
        direction: Direction,
        item: &ItemInstance,
        amount: u32,
        base_price: Decimal,
        shop: Option<ShopId>,
        player: Option<PlayerId>,
    ) -> Decimal {
        // currency caps do not apply to a price display
        let currency = Currency::default();
        let mut tiers = vec![TierQuote::capture(Tier::Global, self.global.quote_view(item), direction, &currency)];
        if let Some(shop) = shop {
            let manipulator = self.shops.get(&shop).unwrap_or(&self.shop_base);
            tiers.push(TierQuote::capture(Tier::Shop(shop), manipulator.quote_view(item), direction, &currency));
        }
        if let Some(player) = player {
            let manipulator = self.players.get(&player).unwrap_or(&self.player_base);
            tiers.push(TierQuote::capture(Tier::Player(player), manipulator.quote_view(item), direction, &currency));
        }

        let request = QuoteRequest::new(item.clone(), amount, base_price, currency);
        let preview = TransactionPreview::compute(direction, request, tiers);
        preview.cumulative_values().last().copied().unwrap_or(Decimal::ZERO)
    }

    /// Take a player's state out, e.g. to store it while they are away
    pub fn detach_player(&mut self, player: PlayerId) -> Option<PriceManipulator> {
        let mut manipulator = self.players.remove(&player)?;
        manipulator.clean_up();
        debug!("Detached {}", player);
        Some(manipulator)
    }

    /// Put a detached player's state back, catching up on the time since `since`
    pub fn restore_player(&mut self, player: PlayerId, manipulator: PriceManipulator, since: DateTime<Utc>) {
        self.restore_player_at(player, manipulator, since, Utc::now());
    }

    pub fn restore_player_at(
        &mut self,
        player: PlayerId,
        mut manipulator: PriceManipulator,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        manipulator.merge(&self.player_base);
        manipulator.fast_forward(since, now);
        manipulator.clean_up();
        debug!("Restored {} after {} minutes", player, (now - since).num_minutes());
        self.players.insert(player, manipulator);
    }

    pub fn global_tracker(&self, item: &ItemInstance) -> Option<&ItemTracker> {
        self.global.get_if_tracked(item)
    }

    pub fn shop_tracker(&self, shop: ShopId, item: &ItemInstance) -> Option<&ItemTracker> {
        self.shops.get(&shop)?.get_if_tracked(item)
    }

    pub fn player_tracker(&self, player: PlayerId, item: &ItemInstance) -> Option<&ItemTracker> {
        self.players.get(&player)?.get_if_tracked(item)
    }

    pub fn global(&self) -> &PriceManipulator {
        &self.global
    }

    pub fn shop_count(&self) -> usize {
        self.shops.len()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    fn manipulator(&self, tier: Tier) -> Option<&PriceManipulator> {
        match tier {
            Tier::Global => Some(&self.global),
            Tier::Shop(shop) => self.shops.get(&shop),
            Tier::Player(player) => self.players.get(&player),
        }
    }

    fn tracker_for(&self, tier: Tier, filter: &ApplicabilityFilter) -> Option<&ItemTracker> {
        self.manipulator(tier)?.tracker(filter)
    }

    fn tracker_for_mut(&mut self, tier: Tier, filter: &ApplicabilityFilter) -> Option<&mut ItemTracker> {
        let manipulator = match tier {
            Tier::Global => Some(&mut self.global),
            Tier::Shop(shop) => self.shops.get_mut(&shop),
            Tier::Player(player) => self.players.get_mut(&player),
        }?;
        manipulator.tracker_mut(filter)
    }
}
