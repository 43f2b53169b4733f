//! Synthetic price generator.
//!
//! Keeps a random-walk price per symbol. Prices are seeded in [100, 500) and
//! every tick moves each symbol by a delta in [-5, +5), never below 10.
//! Prices are kept in whole cents.
//!
//! Readers get a point-in-time snapshot; orders are not locked against ticks.

use crate::services::SqliteStore;
use crate::types::MarketQuote;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Seed range in cents: [100.00, 500.00).
const SEED_CENTS: std::ops::Range<i64> = 10_000..50_000;
/// Per-tick delta in cents: [-5.00, +5.00).
const DELTA_CENTS: std::ops::Range<i64> = -500..500;
/// Prices never drop below 10.00.
const FLOOR_CENTS: i64 = 1_000;
/// Synthetic volume traded per tick.
const TICK_VOLUME: std::ops::Range<i64> = 100..10_000;

/// Process-wide random-walk price table.
pub struct PriceGenerator {
    symbols: Vec<String>,
    quotes: DashMap<String, MarketQuote>,
    rng: Mutex<StdRng>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PriceGenerator {
    /// Create a generator seeded from OS entropy.
    pub fn new<S: AsRef<str>>(symbols: &[S]) -> Self {
        Self::with_rng(symbols, StdRng::from_entropy())
    }

    /// Create a generator with a deterministic random sequence.
    pub fn with_seed<S: AsRef<str>>(symbols: &[S], seed: u64) -> Self {
        Self::with_rng(symbols, StdRng::seed_from_u64(seed))
    }

    fn with_rng<S: AsRef<str>>(symbols: &[S], mut rng: StdRng) -> Self {
        let mut universe: Vec<String> = Vec::with_capacity(symbols.len());
        let quotes = DashMap::new();

        for symbol in symbols {
            let symbol = symbol.as_ref().trim().to_uppercase();
            if symbol.is_empty() || universe.contains(&symbol) {
                continue;
            }
            let price = Decimal::new(rng.gen_range(SEED_CENTS), 2);
            quotes.insert(symbol.clone(), MarketQuote::seeded(symbol.clone(), price));
            universe.push(symbol);
        }

        debug!("Seeded {} symbols", universe.len());
        Self {
            symbols: universe,
            quotes,
            rng: Mutex::new(rng),
            task: Mutex::new(None),
        }
    }

    /// Symbols in the universe, in configuration order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Latest price for a symbol.
    pub fn price(&self, symbol: &str) -> Option<Decimal> {
        self.quotes.get(&symbol.to_uppercase()).map(|q| q.price)
    }

    /// Latest quote for a symbol.
    pub fn quote(&self, symbol: &str) -> Option<MarketQuote> {
        self.quotes.get(&symbol.to_uppercase()).map(|q| q.clone())
    }

    /// All current quotes, sorted by symbol.
    pub fn snapshot(&self) -> Vec<MarketQuote> {
        let mut quotes: Vec<MarketQuote> = self.quotes.iter().map(|q| q.value().clone()).collect();
        quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        quotes
    }

    /// Pin a symbol to a price. The symbol must be in the universe.
    pub fn set_price(&self, symbol: &str, price: Decimal) -> bool {
        match self.quotes.get_mut(&symbol.to_uppercase()) {
            Some(mut quote) => {
                quote.apply_tick(price, 0);
                true
            }
            None => false,
        }
    }

    /// Advance every symbol by one random step and return the new quotes.
    pub fn tick(&self) -> Vec<MarketQuote> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let mut updated = Vec::with_capacity(self.symbols.len());

        for symbol in &self.symbols {
            if let Some(mut quote) = self.quotes.get_mut(symbol) {
                let delta = Decimal::new(rng.gen_range(DELTA_CENTS), 2);
                let floor = Decimal::new(FLOOR_CENTS, 2);
                let price = (quote.price + delta).max(floor);
                quote.apply_tick(price, rng.gen_range(TICK_VOLUME));
                updated.push(quote.clone());
            }
        }

        updated
    }

    /// Start ticking every `interval`, upserting quotes into `store` if given.
    ///
    /// Returns false if the generator is already running.
    pub fn start(self: &Arc<Self>, interval: Duration, store: Option<Arc<SqliteStore>>) -> bool {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        if let Some(ref store) = store {
            persist_quotes(store, &self.snapshot());
        }

        let generator = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of a tokio interval completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let quotes = generator.tick();
                if let Some(ref store) = store {
                    persist_quotes(store, &quotes);
                }
            }
        }));

        info!(
            "Price generator started for {} symbols every {:?}",
            self.symbols.len(),
            interval
        );
        true
    }

    /// Stop the background ticker. Returns false if it was not running.
    pub fn stop(&self) -> bool {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match handle {
            Some(handle) => {
                handle.abort();
                info!("Price generator stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

fn persist_quotes(store: &SqliteStore, quotes: &[MarketQuote]) {
    for quote in quotes {
        if let Err(e) = store.upsert_quote(quote) {
            warn!("Failed to persist quote for {}: {}", quote.symbol, e);
        }
    }
}
