/// Messages and shared records exchanged between extension contexts
use crate::error::{ExtensionError, Result};
use crate::stock_data::StockData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stock schema version this extension understands
pub const SCHEMA_VERSION: i64 = 2;

/// localStorage key the tracker app writes its stock under
pub const INVENTORY_STORAGE_KEY: &str = "filament-tracker-stock";

pub const POLL_INTERVAL_MS: i32 = 5_000;
pub const NAVIGATION_SETTLE_MS: u32 = 100;
pub const SYNC_TIMEOUT_MS: u32 = 8_000;
pub const TRIGGER_SETTLE_MS: u32 = 500;
pub const PORT_DEBOUNCE_MS: u32 = 400;

pub const DEFAULT_PORT: u16 = 3000;

/// Tabs that get a STOCK_UPDATED notification after each sync
pub const STORE_TAB_PATTERN: &str = "https://eu.store.bambulab.com/*";

/// Class of every injected badge element
pub const BADGE_CLASS: &str = "ft-badge";

/// Keys in chrome.storage.local
pub mod keys {
    pub const LOOKUP: &str = "lookup";
    pub const SYNC_STATE: &str = "syncState";
    pub const STOCK_DATA: &str = "stockData";
    pub const TRACKER_PORT: &str = "trackerPort";
}

/// Build a lookup key: `{productSlug}::{colorCode}` or `{productSlug}::{sku}`
pub fn lookup_key(product_slug: &str, variant_part: &str) -> String {
    format!("{}::{}", product_slug, variant_part)
}

/// Accept only ports a tracker can listen on
pub fn validate_port(port: i64) -> Result<u16> {
    u16::try_from(port)
        .ok()
        .filter(|port| *port > 0)
        .ok_or_else(|| ExtensionError::InvalidPort(port.to_string()))
}

/// Aggregated ownership for one lookup key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub quantity: u32,
    pub brand: String,
}

/// Derived index matched against storefront content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookupIndex(BTreeMap<String, LookupEntry>);

impl LookupIndex {
    pub fn new() -> Self {
        LookupIndex(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&LookupEntry> {
        self.0.get(key)
    }

    /// Sum `quantity` into the key; the latest brand wins
    pub fn upsert(&mut self, key: String, quantity: u32, brand: &str) {
        let entry = self.0.entry(key).or_insert_with(|| LookupEntry {
            quantity: 0,
            brand: String::new(),
        });
        entry.quantity = entry.quantity.saturating_add(quantity);
        entry.brand = brand.to_string();
    }

    /// Owned quantity under `product::part`, only when positive
    pub fn owned(&self, product_slug: &str, variant_part: &str) -> Option<u32> {
        self.get(&lookup_key(product_slug, variant_part))
            .map(|entry| entry.quantity)
            .filter(|quantity| *quantity > 0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Summary of the last successful sync, shown by the popup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub last_synced_at: Option<String>,
    pub entry_count: usize,
}

/// Messages sent between content scripts, the popup and the background worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtensionMessage {
    StockSync {
        #[serde(rename = "stockData")]
        stock_data: StockData,
    },
    GetLookup,
    LookupResult {
        lookup: LookupIndex,
    },
    StockUpdated,
    TriggerSync,
    SetPort {
        port: i64,
    },
}

/// Reply to TRIGGER_SYNC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}
