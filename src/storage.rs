/// Typed access to chrome.storage.local
use crate::error::{ExtensionError, Result};
use crate::protocol::{DEFAULT_PORT, LookupIndex, SyncState, keys};
use crate::stock_data::StockData;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key-value area shared by all extension contexts
#[allow(async_fn_in_trait)]
pub trait StorageArea {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>>;

    /// Write every item in one call; readers see all of them or none
    async fn set(&self, items: Map<String, Value>) -> Result<()>;
}

/// Everything a successful sync replaces, written as one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    pub lookup: LookupIndex,
    pub sync_state: SyncState,
    pub stock_data: StockData,
}

impl SyncRecord {
    fn into_items(self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(items) => Ok(items),
            other => Err(ExtensionError::Serialization(format!(
                "sync record serialized to {}",
                other
            ))),
        }
    }
}

/// Persisted extension state on top of a storage area
#[derive(Debug, Clone)]
pub struct ExtensionStore<S> {
    area: S,
}

impl<S: StorageArea> ExtensionStore<S> {
    pub fn new(area: S) -> Self {
        ExtensionStore { area }
    }

    async fn read_key<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut items = self.area.get(&[key]).await?;
        match items.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ExtensionError::Storage(format!("Failed to parse {}: {}", key, e))),
        }
    }

    /// Current lookup, or an empty one before the first sync
    pub async fn load_lookup(&self) -> Result<LookupIndex> {
        Ok(self.read_key(keys::LOOKUP).await?.unwrap_or_default())
    }

    pub async fn load_sync_state(&self) -> Result<Option<SyncState>> {
        self.read_key(keys::SYNC_STATE).await
    }

    pub async fn load_stock_data(&self) -> Result<Option<StockData>> {
        self.read_key(keys::STOCK_DATA).await
    }

    pub async fn load_tracker_port(&self) -> Result<u16> {
        Ok(self.read_key(keys::TRACKER_PORT).await?.unwrap_or(DEFAULT_PORT))
    }

    /// Replace lookup, sync state and raw snapshot together
    pub async fn replace_sync_record(&self, record: SyncRecord) -> Result<()> {
        self.area.set(record.into_items()?).await
    }

    pub async fn store_tracker_port(&self, port: u16) -> Result<()> {
        let mut items = Map::new();
        items.insert(keys::TRACKER_PORT.to_string(), Value::from(port));
        self.area.set(items).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::lookup_key;
    use crate::stock_data::StockEntry;
    use crate::testing::MemoryArea;
    use futures::executor::block_on;

    fn record(count: usize) -> SyncRecord {
        let mut lookup = LookupIndex::new();
        lookup.upsert(lookup_key("pla-basic", "10100"), 2, "Bambu Lab");
        SyncRecord {
            lookup,
            sync_state: SyncState {
                last_synced_at: Some("2026-10-18T10:00:00.000Z".to_string()),
                entry_count: count,
            },
            stock_data: StockData::new(vec![StockEntry::new("pla-basic", "sku-1", 2, "Bambu Lab")]),
        }
    }

    #[test]
    fn test_empty_store_defaults() {
        let store = ExtensionStore::new(MemoryArea::default());

        assert!(block_on(store.load_lookup()).unwrap().is_empty());
        assert_eq!(block_on(store.load_sync_state()).unwrap(), None);
        assert_eq!(block_on(store.load_stock_data()).unwrap(), None);
        assert_eq!(block_on(store.load_tracker_port()).unwrap(), DEFAULT_PORT);
    }

    #[test]
    fn test_sync_record_is_one_write() {
        let area = MemoryArea::default();
        let store = ExtensionStore::new(area.clone());

        block_on(store.replace_sync_record(record(1))).unwrap();

        assert_eq!(area.write_count(), 1);
        let lookup = block_on(store.load_lookup()).unwrap();
        assert_eq!(lookup.owned("pla-basic", "10100"), Some(2));
        assert_eq!(block_on(store.load_sync_state()).unwrap().unwrap().entry_count, 1);
        assert_eq!(block_on(store.load_stock_data()).unwrap().unwrap().entries.len(), 1);
    }

    #[test]
    fn test_port_is_independent_of_sync_record() {
        let store = ExtensionStore::new(MemoryArea::default());

        block_on(store.store_tracker_port(3001)).unwrap();
        block_on(store.replace_sync_record(record(1))).unwrap();

        assert_eq!(block_on(store.load_tracker_port()).unwrap(), 3001);
    }

    #[test]
    fn test_corrupt_value_is_a_storage_error() {
        let area = MemoryArea::default();
        area.insert(keys::SYNC_STATE, serde_json::json!("garbage"));
        let store = ExtensionStore::new(area);

        let err = block_on(store.load_sync_state()).unwrap_err();
        assert!(matches!(err, ExtensionError::Storage(_)));
    }
}
