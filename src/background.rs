/// Background coordinator: sole writer of the lookup and sole notifier of store tabs.
///
/// The worker can be unloaded between messages, so nothing here is cached:
/// every handler re-reads what it needs from storage and replaces what it
/// writes in a single call.
use crate::bridge::{self, ChromeBackground, ChromeStorage};
use crate::error::Result;
use crate::lookup::{CatalogIndex, build_lookup_index};
use crate::protocol::{ExtensionMessage, STORE_TAB_PATTERN, SyncState, validate_port};
use crate::stock_data::{CatalogProduct, StockData};
use crate::storage::{ExtensionStore, StorageArea, SyncRecord};
use futures::FutureExt;
use serde_json::Value;
use wasm_bindgen_futures::spawn_local;

const TARGET: &str = "ft-sw";

/// Browser services the coordinator needs besides storage
#[allow(async_fn_in_trait)]
pub trait BackgroundHost {
    async fn load_catalog(&self) -> Result<Vec<CatalogProduct>>;

    async fn query_tabs(&self, url_pattern: &str) -> Result<Vec<i32>>;

    async fn send_to_tab(&self, tab_id: i32, message: &ExtensionMessage) -> Result<()>;

    /// Current time as an ISO-8601 string
    fn now_iso(&self) -> String;
}

pub struct Coordinator<S, H> {
    store: ExtensionStore<S>,
    host: H,
}

impl<S: StorageArea, H: BackgroundHost> Coordinator<S, H> {
    pub fn new(area: S, host: H) -> Self {
        Coordinator {
            store: ExtensionStore::new(area),
            host,
        }
    }

    /// Dispatch one runtime message; `None` means no response is sent
    pub async fn handle_message(&self, message: ExtensionMessage) -> Option<Value> {
        match message {
            ExtensionMessage::StockSync { stock_data } => match self.handle_stock_sync(stock_data).await {
                Ok(sync_state) => {
                    log::info!(target: TARGET, "Sync complete: {} entries", sync_state.entry_count);
                    serde_json::to_value(sync_state).ok()
                }
                Err(e) => {
                    log::error!(target: TARGET, "Sync failed: {}", e);
                    Some(Value::Null)
                }
            },
            ExtensionMessage::GetLookup => match self.store.load_lookup().await {
                Ok(lookup) => {
                    log::debug!(target: TARGET, "Returning lookup with {} entries", lookup.len());
                    serde_json::to_value(ExtensionMessage::LookupResult { lookup }).ok()
                }
                Err(e) => {
                    // an empty LOOKUP_RESULT would wipe every badge on the page
                    log::error!(target: TARGET, "Failed to read lookup: {}", e);
                    Some(Value::Null)
                }
            },
            ExtensionMessage::SetPort { port } => {
                if let Err(e) = self.handle_set_port(port).await {
                    log::warn!(target: TARGET, "Ignoring SET_PORT: {}", e);
                }
                None
            }
            other => {
                log::debug!(target: TARGET, "Ignoring message {:?}", other);
                None
            }
        }
    }

    /// Rebuild and persist the lookup from a full snapshot, then notify store tabs
    pub async fn handle_stock_sync(&self, stock_data: StockData) -> Result<SyncState> {
        stock_data.check_version()?;

        let catalog = CatalogIndex::from_products(&self.host.load_catalog().await?);
        log::debug!(
            target: TARGET,
            "Building lookup from {} stock entries against {} catalog variants",
            stock_data.entries.len(),
            catalog.len()
        );
        let lookup = build_lookup_index(&stock_data, &catalog);

        let sync_state = SyncState {
            last_synced_at: Some(self.host.now_iso()),
            entry_count: stock_data.entries.len(),
        };

        self.store
            .replace_sync_record(SyncRecord {
                lookup,
                sync_state: sync_state.clone(),
                stock_data,
            })
            .await?;

        self.notify_store_tabs().await;
        Ok(sync_state)
    }

    pub async fn handle_set_port(&self, port: i64) -> Result<u16> {
        let port = validate_port(port)?;
        self.store.store_tracker_port(port).await?;
        Ok(port)
    }

    /// Fire-and-forget STOCK_UPDATED; a tab may not have the overlay listening yet
    async fn notify_store_tabs(&self) {
        let tab_ids = match self.host.query_tabs(STORE_TAB_PATTERN).await {
            Ok(ids) => ids,
            Err(e) => {
                log::warn!(target: TARGET, "Could not list store tabs: {}", e);
                return;
            }
        };

        log::debug!(target: TARGET, "Notifying {} store tabs", tab_ids.len());
        for tab_id in tab_ids {
            if let Err(e) = self.host.send_to_tab(tab_id, &ExtensionMessage::StockUpdated).await {
                log::debug!(target: TARGET, "Tab {} not listening: {}", tab_id, e);
            }
        }
    }
}

/// Service-worker entry: answer STOCK_SYNC and GET_LOOKUP, handle the rest silently
pub fn start() {
    bridge::listen_runtime_messages(|message| {
        let replies = matches!(message, ExtensionMessage::StockSync { .. } | ExtensionMessage::GetLookup);
        let handled = async move {
            Coordinator::new(ChromeStorage, ChromeBackground)
                .handle_message(message)
                .await
                .unwrap_or(Value::Null)
        }
        .boxed_local();

        if replies {
            Some(handled)
        } else {
            spawn_local(handled.map(|_| ()));
            None
        }
    });
    log::info!(target: TARGET, "Background worker started");
}
