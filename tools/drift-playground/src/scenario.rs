//! Scripted trading scenarios

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use colored::*;
use item_registry::{ApplicabilityFilter, FilterLookup, ItemInstance, ItemRegistry};
use price_tracker::{
    Currency, Direction, PlayerId, PriceCalculator, PricingConfig, QuoteRequest, ShopId, TransactionPreview,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// A scenario file: a start time and a list of steps
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_start")]
    pub start: DateTime<Utc>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default()
}

fn default_currency() -> String {
    "coins".to_string()
}

/// Who is trading what
#[derive(Debug, Clone, Deserialize)]
pub struct TradeStep {
    pub item: String,
    pub amount: u32,
    pub price: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub shop: Option<String>,
    pub player: Option<String>,
    pub balance: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Quote and confirm as much of a purchase as allowed
    Buy(TradeStep),
    /// Quote and confirm as much of a sale as allowed
    Sell(TradeStep),
    /// Quote a purchase without confirming it
    Quote(TradeStep),
    /// Let minutes pass
    Tick { minutes: u32 },
    /// Draw the global history of an item
    Chart { item: String },
}

impl Scenario {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading scenario {}", path.as_ref().display()))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing scenario")
    }
}

/// Drives a calculator through a scenario, one simulated minute per tick
pub struct ScenarioRunner {
    calculator: PriceCalculator,
    registry: ItemRegistry,
    clock: DateTime<Utc>,
    shops: HashMap<String, ShopId>,
    players: HashMap<String, PlayerId>,
    chart_lines: usize,
    /// Lines printed so far, kept for inspection
    transcript: Vec<String>,
}

impl ScenarioRunner {
    pub fn new(config: &PricingConfig, start: DateTime<Utc>, chart_lines: usize) -> Result<Self> {
        let mut registry = ItemRegistry::new();
        let calculator =
            PriceCalculator::from_config(config, &mut registry).context("building price calculator")?;
        Ok(Self {
            calculator,
            registry,
            clock: start,
            shops: HashMap::new(),
            players: HashMap::new(),
            chart_lines,
            transcript: Vec::new(),
        })
    }

    pub fn run(&mut self, scenario: &Scenario) -> Result<()> {
        for (index, step) in scenario.steps.iter().enumerate() {
            self.step(step).with_context(|| format!("step {}", index + 1))?;
        }
        Ok(())
    }

    pub fn step(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Buy(trade) => self.trade(Direction::Purchase, trade, true),
            Step::Sell(trade) => self.trade(Direction::Sale, trade, true),
            Step::Quote(trade) => self.trade(Direction::Purchase, trade, false),
            Step::Tick { minutes } => {
                for _ in 0..*minutes {
                    self.clock += Duration::minutes(1);
                    self.calculator.think_tick_at(self.clock);
                }
                self.emit(format!("{} {} minutes, now {}", "⏱".dimmed(), minutes, self.clock.format("%H:%M")));
                Ok(())
            }
            Step::Chart { item } => {
                let item = self.item(item)?;
                let rows = match self.calculator.global_tracker(&item) {
                    Some(tracker) => tracker.history().render(self.chart_lines),
                    None => vec![format!("{item} is not tracked")],
                };
                self.emit(format!("{} {}", "📈".bold(), item));
                for row in rows {
                    self.emit(row);
                }
                Ok(())
            }
        }
    }

    fn trade(&mut self, direction: Direction, trade: &TradeStep, confirm: bool) -> Result<()> {
        let item = self.item(&trade.item)?;
        let mut request = QuoteRequest::new(item, trade.amount, trade.price, Currency::new(trade.currency.as_str()));
        if let Some(shop) = &trade.shop {
            request = request.at_shop(*self.shops.entry(shop.clone()).or_insert_with(ShopId::new));
        }
        if let Some(player) = &trade.player {
            request = request.for_player(*self.players.entry(player.clone()).or_insert_with(PlayerId::new));
        }
        if let Some(balance) = trade.balance {
            request = request.with_account_limit(balance);
        }

        let preview = match direction {
            Direction::Purchase => self.calculator.purchase_preview(request),
            Direction::Sale => self.calculator.sale_preview(request),
        };
        self.describe(&preview, confirm);
        if confirm {
            self.calculator.confirm(&preview, preview.affordable_amount())?;
        }
        Ok(())
    }

    fn describe(&mut self, preview: &TransactionPreview, confirm: bool) {
        let verb = match (preview.direction(), confirm) {
            (_, false) => "quote".cyan(),
            (Direction::Purchase, true) => "buy".green(),
            (Direction::Sale, true) => "sell".red(),
        };
        self.emit(format!(
            "{} {}/{} x {} for {} {} (limits: account {}, items {}, currency {})",
            verb,
            preview.affordable_amount(),
            preview.amount(),
            preview.item(),
            preview.affordable_value().round_dp(2),
            preview.currency(),
            preview.limit_by_account(),
            display_limit(preview.limit_by_item_count()),
            preview.limit_by_currency(),
        ));
    }

    fn item(&self, specifier: &str) -> Result<ItemInstance> {
        match self.registry.filter_for(specifier)? {
            ApplicabilityFilter::ByType(item_type) => Ok(ItemInstance::new(item_type)),
            ApplicabilityFilter::ByTypeAndVariant { item_type, variant } => {
                Ok(ItemInstance::new(item_type).with_variant(variant))
            }
            ApplicabilityFilter::ExactContent(template) => Ok(template),
            ApplicabilityFilter::Any => bail!("'{specifier}' does not name a single item"),
        }
    }

    fn emit(&mut self, line: String) {
        println!("{line}");
        self.transcript.push(line);
    }

    #[cfg(test)]
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    #[cfg(test)]
    pub fn calculator(&self) -> &PriceCalculator {
        &self.calculator
    }
}

fn display_limit(limit: u32) -> String {
    if limit == u32::MAX {
        "∞".to_string()
    } else {
        limit.to_string()
    }
}
