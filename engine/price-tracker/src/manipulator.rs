use crate::config::{GroupConfig, TierConfig};
use crate::schedule::ResetSchedule;
use crate::tracker::ItemTracker;
use crate::{PricingError, Result, TICK_MILLIS};
use chrono::{DateTime, Utc};
use item_registry::{ApplicabilityFilter, FilterLookup, ItemInstance};
use tracing::{debug, info};

/// Price Manipulator - The trackers of one tier owner
///
/// Trackers are checked in order and the first match wins; configured
/// trackers always come before derived ones. Items nobody configured get a
/// derived tracker built from the default template on first sight.
#[derive(Debug, Clone)]
pub struct PriceManipulator {
    trackers: Vec<ItemTracker>,
    default_template: ItemTracker,
    schedule: ResetSchedule,

    /// Next scheduled reset, unset until the first tick
    next_reset: Option<DateTime<Utc>>,
}

impl PriceManipulator {
    pub fn new(default_template: ItemTracker, schedule: ResetSchedule) -> Self {
        Self { trackers: Vec::new(), default_template, schedule, next_reset: None }
    }

    /// Build a manipulator from the configuration of one tier
    ///
    /// Fails without side effects when the default group is missing, a
    /// group key does not resolve or any setting is invalid.
    pub fn from_config(tier: &str, config: &TierConfig, lookup: &dyn FilterLookup) -> Result<Self> {
        let default = config
            .default
            .as_ref()
            .ok_or_else(|| PricingError::configuration(format!("tier '{tier}' has no default group")))?;
        let default_template = ItemTracker::from_config("default", ApplicabilityFilter::Any, default)?;
        let schedule = ResetSchedule::from_setting(config.reset.as_ref())?;

        let mut trackers: Vec<ItemTracker> = Vec::with_capacity(config.groups.len());
        for group in &config.groups {
            let filter = lookup.filter_for(&group.item).map_err(|err| {
                PricingError::configuration(format!("tier '{tier}', group '{}': {err}", group.item))
            })?;
            if trackers.iter().any(|tracker| tracker.filter() == &filter) {
                return Err(PricingError::configuration(format!(
                    "tier '{tier}': group '{}' duplicates an earlier group",
                    group.item
                )));
            }
            trackers.push(ItemTracker::from_config(group.item.as_str(), filter, &group.tracker)?);
        }

        debug!("Loaded tier {} with {} configured groups", tier, trackers.len());
        Ok(Self { trackers, default_template, schedule, next_reset: None })
    }

    /// Dump the base settings: schedule, default template and configured groups
    pub fn to_config(&self) -> TierConfig {
        TierConfig {
            reset: self.schedule.to_setting(),
            default: Some(self.default_template.to_config()),
            groups: self
                .trackers
                .iter()
                .filter(|tracker| !tracker.is_derived())
                .map(|tracker| GroupConfig { item: tracker.name().to_string(), tracker: tracker.to_config() })
                .collect(),
        }
    }

    /// Tracker for `item`, deriving one from the default template if needed
    pub fn resolve(&mut self, item: &ItemInstance) -> &mut ItemTracker {
        let index = match self.trackers.iter().position(|tracker| tracker.matches(item)) {
            Some(index) => index,
            None => {
                let mut tracker = self.default_template.new_tracker(ApplicabilityFilter::derived_for(item));
                tracker.set_derived(true);
                debug!("Derived tracker for {}", tracker.filter());
                self.trackers.push(tracker);
                self.trackers.len() - 1
            }
        };
        &mut self.trackers[index]
    }

    /// Tracker for `item` if one exists; never creates state
    pub fn get_if_tracked(&self, item: &ItemInstance) -> Option<&ItemTracker> {
        self.trackers.iter().find(|tracker| tracker.matches(item))
    }

    /// Tracker `item` would resolve to, or the default template while untracked
    pub fn quote_view(&self, item: &ItemInstance) -> &ItemTracker {
        self.get_if_tracked(item).unwrap_or(&self.default_template)
    }

    pub fn tracker(&self, filter: &ApplicabilityFilter) -> Option<&ItemTracker> {
        self.trackers.iter().find(|tracker| tracker.filter() == filter)
    }

    pub fn tracker_mut(&mut self, filter: &ApplicabilityFilter) -> Option<&mut ItemTracker> {
        self.trackers.iter_mut().find(|tracker| tracker.filter() == filter)
    }

    /// No tracker holds any price movement
    pub fn is_idle(&self) -> bool {
        self.trackers.iter().all(ItemTracker::is_idle)
    }

    /// Every tracker is idle with untouched caps; safe to drop and re-derive
    pub fn is_at_rest(&self) -> bool {
        self.trackers.iter().all(ItemTracker::is_at_rest)
    }

    /// One minute passes: either the scheduled reset or a decay tick
    pub fn think(&mut self, now: DateTime<Utc>) {
        if self.schedule.is_active() {
            match self.next_reset {
                None => self.next_reset = self.schedule.next_after(now),
                Some(next) if now >= next => {
                    self.reset();
                    self.next_reset = self.schedule.next_after(now);
                    info!("Reset {} trackers, next reset at {:?}", self.trackers.len(), self.next_reset);
                    return;
                }
                Some(_) => {}
            }
        }
        for tracker in &mut self.trackers {
            tracker.decay_tick();
        }
    }

    /// Catch up on the minutes between `from` and `now` in one step
    pub fn fast_forward(&mut self, from: DateTime<Utc>, now: DateTime<Utc>) {
        let minutes = ((now - from).num_milliseconds() / TICK_MILLIS).max(0) as u64;
        let reset_due = match self.next_reset {
            Some(next) => next <= now,
            None => self.schedule.previous_at_or_before(now).is_some_and(|previous| from < previous),
        };

        if reset_due || self.next_reset.is_none() {
            self.next_reset = self.schedule.next_after(now);
        }
        if reset_due {
            debug!("Reset fell into {} absent minutes", minutes);
            self.reset();
        } else {
            for tracker in &mut self.trackers {
                tracker.decay_ticks(minutes);
            }
        }
    }

    /// Reset every tracker to baseline
    pub fn reset(&mut self) {
        for tracker in &mut self.trackers {
            tracker.reset();
        }
    }

    /// Drop derived trackers at rest; returns how many were removed
    pub fn clean_up(&mut self) -> usize {
        let before = self.trackers.len();
        self.trackers.retain(|tracker| !(tracker.is_derived() && tracker.is_at_rest()));
        before - self.trackers.len()
    }

    /// Fresh manipulator with this one's settings and no accrued state
    pub fn derive_instance(&self) -> Self {
        Self {
            trackers: self.trackers.iter().map(ItemTracker::fresh_copy).collect(),
            default_template: self.default_template.fresh_copy(),
            schedule: self.schedule,
            next_reset: self.next_reset,
        }
    }

    /// Apply new settings from `other` without losing accrued state
    ///
    /// Trackers are matched by filter. Configured groups take `other`'s
    /// order; trackers `other` no longer configures become derived and take
    /// the new default settings.
    pub fn merge(&mut self, other: &PriceManipulator) {
        self.default_template.merge(&other.default_template);
        if self.schedule != other.schedule {
            self.schedule = other.schedule;
            self.next_reset = None;
        }

        let mut remaining = std::mem::take(&mut self.trackers);
        let mut merged = Vec::with_capacity(remaining.len() + other.trackers.len());
        for incoming in &other.trackers {
            match remaining.iter().position(|tracker| tracker.filter() == incoming.filter()) {
                Some(index) => {
                    let mut tracker = remaining.remove(index);
                    tracker.merge(incoming);
                    tracker.rename(incoming.name());
                    tracker.set_derived(incoming.is_derived());
                    merged.push(tracker);
                }
                None => merged.push(incoming.fresh_copy()),
            }
        }
        for mut tracker in remaining {
            tracker.merge(&self.default_template);
            tracker.set_derived(true);
            merged.push(tracker);
        }
        merged.sort_by_key(ItemTracker::is_derived);
        self.trackers = merged;
    }

    pub fn trackers(&self) -> &[ItemTracker] {
        &self.trackers
    }

    pub fn default_template(&self) -> &ItemTracker {
        &self.default_template
    }

    pub fn schedule(&self) -> ResetSchedule {
        self.schedule
    }

    pub fn next_reset(&self) -> Option<DateTime<Utc>> {
        self.next_reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResetSetting, TrackerConfig};
    use chrono::{Duration, TimeZone};
    use item_registry::{ItemDefinition, ItemRegistry, ItemType};

    fn item(id: &str) -> ItemInstance {
        ItemInstance::new(ItemType::parse(id).unwrap())
    }

    fn rates(growth: f64) -> TrackerConfig {
        TrackerConfig { growth_rate: growth, decay_rate: growth, half_life_minutes: 5.0, ..Default::default() }
    }

    fn tier(reset: Option<ResetSetting>) -> TierConfig {
        TierConfig {
            reset,
            default: Some(rates(1.01)),
            groups: vec![GroupConfig { item: "minecraft:diamond".into(), tracker: rates(1.5) }],
        }
    }

    fn manipulator(reset: Option<ResetSetting>) -> PriceManipulator {
        PriceManipulator::from_config("global", &tier(reset), &ItemRegistry::new()).unwrap()
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_missing_default_is_configuration_error() {
        let config = TierConfig { default: None, ..tier(None) };
        assert!(matches!(
            PriceManipulator::from_config("shops", &config, &ItemRegistry::new()),
            Err(PricingError::Configuration { .. })
        ));
    }

    #[test]
    fn test_bad_group_key_is_configuration_error() {
        let mut config = tier(None);
        config.groups.push(GroupConfig { item: "minecraft:wool:red".into(), tracker: rates(1.1) });
        assert!(matches!(
            PriceManipulator::from_config("global", &config, &ItemRegistry::new()),
            Err(PricingError::Configuration { .. })
        ));

        let mut config = tier(None);
        config.groups.push(GroupConfig { item: "diamond".into(), tracker: rates(1.1) });
        assert!(PriceManipulator::from_config("global", &config, &ItemRegistry::new()).is_err());
    }

    #[test]
    fn test_resolve_prefers_configured_then_derives() {
        let mut manipulator = manipulator(None);

        assert_eq!(manipulator.resolve(&item("minecraft:diamond")).growth_rate(), 1.5);
        assert!(manipulator.get_if_tracked(&item("minecraft:dirt")).is_none());

        let dirt = manipulator.resolve(&item("minecraft:dirt"));
        assert!(dirt.is_derived());
        assert_eq!(dirt.growth_rate(), 1.01);
        assert_eq!(manipulator.trackers().len(), 2);

        manipulator.resolve(&item("minecraft:dirt"));
        assert_eq!(manipulator.trackers().len(), 2);
    }

    #[test]
    fn test_clean_up_keeps_configured_trackers() {
        let mut manipulator = manipulator(None);
        manipulator.resolve(&item("minecraft:dirt"));
        manipulator.resolve(&item("minecraft:stone")).grow(1);

        assert_eq!(manipulator.clean_up(), 1);
        assert!(manipulator.get_if_tracked(&item("minecraft:diamond")).is_some());
        assert!(manipulator.get_if_tracked(&item("minecraft:stone")).is_some());
        assert!(!manipulator.is_idle());
    }

    #[test]
    fn test_clean_up_keeps_trackers_holding_volume() {
        let mut config = tier(None);
        config.default = Some(TrackerConfig { item_buy_cap: Some(4), ..rates(1.0) });
        let mut manipulator = PriceManipulator::from_config("players", &config, &ItemRegistry::new()).unwrap();
        manipulator.resolve(&item("minecraft:dirt")).grow(3);

        assert!(manipulator.is_idle());
        assert!(!manipulator.is_at_rest());
        assert_eq!(manipulator.clean_up(), 0);
        assert_eq!(manipulator.get_if_tracked(&item("minecraft:dirt")).unwrap().purchase_item_capacity(), Some(1));

        manipulator.reset();
        assert!(manipulator.is_at_rest());
        assert_eq!(manipulator.clean_up(), 1);
    }

    #[test]
    fn test_think_decays_then_resets_on_schedule() {
        let mut manipulator = manipulator(Some(ResetSetting::Interval(10)));
        manipulator.resolve(&item("minecraft:diamond")).grow(2);

        manipulator.think(noon());
        assert_eq!(manipulator.next_reset(), Some(noon() + Duration::minutes(10)));
        let after_first = manipulator.get_if_tracked(&item("minecraft:diamond")).unwrap().peek();
        assert!(after_first < 2.25 && after_first > 1.0);

        manipulator.think(noon() + Duration::minutes(10));
        let diamond = manipulator.get_if_tracked(&item("minecraft:diamond")).unwrap();
        assert_eq!(diamond.peek(), 1.0);
        assert!(diamond.is_idle());
        assert_eq!(manipulator.next_reset(), Some(noon() + Duration::minutes(20)));
    }

    #[test]
    fn test_fast_forward_decays_when_no_reset() {
        let mut stepped = manipulator(None);
        stepped.resolve(&item("minecraft:diamond")).grow(3);
        let mut forwarded = stepped.clone();

        for minute in 1..=120 {
            stepped.think(noon() + Duration::minutes(minute));
        }
        forwarded.fast_forward(noon(), noon() + Duration::minutes(120));

        let a = stepped.get_if_tracked(&item("minecraft:diamond")).unwrap().discrepancy();
        let b = forwarded.get_if_tracked(&item("minecraft:diamond")).unwrap().discrepancy();
        assert!((a - b).abs() <= 1e-12 * a.abs().max(1e-300));
    }

    #[test]
    fn test_fast_forward_resets_across_daily_boundary() {
        let mut manipulator = manipulator(Some(ResetSetting::Daily("13:00".into())));
        manipulator.resolve(&item("minecraft:diamond")).grow(3);

        manipulator.fast_forward(noon(), noon() + Duration::hours(2));
        assert_eq!(manipulator.get_if_tracked(&item("minecraft:diamond")).unwrap().peek(), 1.0);
        assert_eq!(manipulator.next_reset(), Some(noon() + Duration::hours(25)));
    }

    #[test]
    fn test_derive_instance_has_no_state() {
        let mut base = manipulator(None);
        base.resolve(&item("minecraft:diamond")).grow(5);

        let instance = base.derive_instance();
        let diamond = instance.get_if_tracked(&item("minecraft:diamond")).unwrap();
        assert_eq!(diamond.peek(), 1.0);
        assert_eq!(diamond.growth_rate(), 1.5);
    }

    #[test]
    fn test_merge_matches_exact_groups_regardless_of_quantity() {
        let sword = item("minecraft:iron_sword").with_data(serde_json::json!({"name": "Biter"}));
        let lookup = |quantity: u32| {
            let mut registry = ItemRegistry::new();
            registry.define("$biter", ItemDefinition::exact(sword.clone().with_quantity(quantity))).unwrap();
            registry
        };
        let mut config = tier(None);
        config.groups = vec![GroupConfig { item: "$biter".into(), tracker: rates(1.5) }];

        let mut live = PriceManipulator::from_config("global", &config, &lookup(1)).unwrap();
        live.resolve(&sword).grow(2);
        let update = PriceManipulator::from_config("global", &config, &lookup(16)).unwrap();
        live.merge(&update);

        assert_eq!(live.trackers().len(), 1);
        let biter = live.get_if_tracked(&sword).unwrap();
        assert!(!biter.is_derived());
        assert_eq!(biter.peek(), 2.25);
    }

    #[test]
    fn test_merge_preserves_state_and_adopts_groups() {
        let mut live = manipulator(None);
        live.resolve(&item("minecraft:diamond")).grow(1);
        live.resolve(&item("minecraft:dirt")).grow(1);
        let dirt_multiplier = live.get_if_tracked(&item("minecraft:dirt")).unwrap().peek();

        let mut config = tier(Some(ResetSetting::Interval(60)));
        config.default = Some(rates(1.2));
        config.groups = vec![
            GroupConfig { item: "minecraft:emerald".into(), tracker: rates(1.3) },
            GroupConfig { item: "minecraft:dirt".into(), tracker: rates(1.4) },
        ];
        let update = PriceManipulator::from_config("global", &config, &ItemRegistry::new()).unwrap();
        live.merge(&update);

        let dirt = live.get_if_tracked(&item("minecraft:dirt")).unwrap();
        assert!(!dirt.is_derived());
        assert_eq!(dirt.growth_rate(), 1.4);
        assert_eq!(dirt.peek(), dirt_multiplier);

        let diamond = live.get_if_tracked(&item("minecraft:diamond")).unwrap();
        assert!(diamond.is_derived());
        assert_eq!(diamond.growth_rate(), 1.2);
        assert_eq!(diamond.peek(), 1.5);

        assert!(live.get_if_tracked(&item("minecraft:emerald")).is_some());
        assert_eq!(live.default_template().growth_rate(), 1.2);
        assert_eq!(live.schedule(), ResetSchedule::Interval { minutes: 60 });

        let names: Vec<&str> = live.trackers().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["minecraft:emerald", "minecraft:dirt", "minecraft:diamond"]);
    }

    #[test]
    fn test_to_config_skips_derived() {
        let mut manipulator = manipulator(Some(ResetSetting::Daily("4:00".into())));
        manipulator.resolve(&item("minecraft:dirt"));

        let dumped = manipulator.to_config();
        assert_eq!(dumped.reset, Some(ResetSetting::Daily("04:00".into())));
        assert_eq!(dumped.groups.len(), 1);
        assert_eq!(dumped.groups[0].item, "minecraft:diamond");
        assert_eq!(dumped.default, Some(rates(1.01)));
    }
}
