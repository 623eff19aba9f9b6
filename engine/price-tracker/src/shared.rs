//! Serialized access for multi-threaded hosts

use crate::calculator::PriceCalculator;
use crate::config::PricingConfig;
use crate::events::PriceUpdateEvent;
use crate::preview::{QuoteRequest, TransactionPreview};
use crate::{Direction, Result};
use item_registry::ItemRegistry;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A [`PriceCalculator`] behind one lock
///
/// Every operation holds the lock for its whole duration, so ticks, previews,
/// confirmations and reloads never interleave.
#[derive(Debug, Clone)]
pub struct SharedCalculator {
    inner: Arc<Mutex<PriceCalculator>>,
}

impl SharedCalculator {
    pub fn new(calculator: PriceCalculator) -> Self {
        Self { inner: Arc::new(Mutex::new(calculator)) }
    }

    /// Direct access for several operations in one critical section
    pub fn lock(&self) -> MutexGuard<'_, PriceCalculator> {
        self.inner.lock()
    }

    pub fn think_tick(&self) {
        self.inner.lock().think_tick();
    }

    pub fn purchase_preview(&self, request: QuoteRequest) -> TransactionPreview {
        self.inner.lock().purchase_preview(request)
    }

    pub fn sale_preview(&self, request: QuoteRequest) -> TransactionPreview {
        self.inner.lock().sale_preview(request)
    }

    pub fn confirm(&self, preview: &TransactionPreview, amount: u32) -> Result<()> {
        self.inner.lock().confirm(preview, amount)
    }

    /// Quote and confirm in one step; returns the confirmed preview
    ///
    /// `amount` is capped at what the quote allows.
    pub fn trade(&self, direction: Direction, request: QuoteRequest) -> Result<TransactionPreview> {
        let mut calculator = self.inner.lock();
        let preview = match direction {
            Direction::Purchase => calculator.purchase_preview(request),
            Direction::Sale => calculator.sale_preview(request),
        };
        calculator.confirm(&preview, preview.affordable_amount())?;
        Ok(preview)
    }

    pub fn reload(&self, config: &PricingConfig, registry: &mut ItemRegistry) -> Result<()> {
        self.inner.lock().reload(config, registry)
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PriceUpdateEvent> {
        self.inner.lock().subscribe()
    }
}
