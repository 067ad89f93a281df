/// chrome.* API bridge: browser implementations of the host traits
use crate::background::BackgroundHost;
use crate::error::{self, ExtensionError};
use crate::protocol::{ExtensionMessage, INVENTORY_STORAGE_KEY, SyncState, keys};
use crate::settings::PopupHost;
use crate::stock_data::{CatalogProduct, parse_catalog};
use crate::storage::{ExtensionStore, StorageArea};
use crate::tracker_sync::{InventorySource, RuntimeTransport};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise, spawn_local};

// Import JS bridge functions
#[wasm_bindgen(module = "/bridge.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getStorage(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setStorage(items: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn queryTabs(pattern: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn findTabOnPort(port: u16) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendTabMessage(tab_id: i32, message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendRuntimeMessage(message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn createTab(url: &str, active: bool) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn removeTab(tab_id: i32) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn loadCatalog() -> Result<JsValue, JsValue>;

    fn sleepPromise(ms: u32) -> js_sys::Promise;

    fn nextStorageChange(key: &str) -> js_sys::Promise;

    fn onStorageChanged(key: &str, handler: &js_sys::Function);

    fn onRuntimeMessage(handler: &js_sys::Function);

    #[wasm_bindgen(js_name = openTab)]
    pub fn open_tab(url: &str);
}

/// Plain JS objects rather than `Map`s, which chrome.storage and messaging can't carry
fn to_js<T: Serialize + ?Sized>(value: &T) -> error::Result<JsValue> {
    Ok(value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())?)
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> error::Result<T> {
    Ok(serde_wasm_bindgen::from_value(value)?)
}

/// Timer that starts immediately
pub fn sleep(ms: u32) -> LocalBoxFuture<'static, ()> {
    let timer = JsFuture::from(sleepPromise(ms));
    async move {
        let _ = timer.await;
    }
    .boxed_local()
}

/// Route runtime messages to `handler`; returning a future sends its value as the reply
pub fn listen_runtime_messages<F>(handler: F)
where
    F: Fn(ExtensionMessage) -> Option<LocalBoxFuture<'static, Value>> + 'static,
{
    let callback = Closure::<dyn Fn(JsValue) -> JsValue>::new(move |raw: JsValue| {
        // messages of other shapes are not ours to answer
        let Ok(message) = from_js::<ExtensionMessage>(raw) else {
            return JsValue::UNDEFINED;
        };

        match handler(message) {
            Some(reply) => future_to_promise(async move {
                let value = reply.await;
                to_js(&value).map_err(|e| JsValue::from_str(&e.to_string()))
            })
            .into(),
            None => JsValue::UNDEFINED,
        }
    });
    onRuntimeMessage(callback.as_ref().unchecked_ref());
    callback.forget();
}

/// Call `handler` with every new value written under `key`
pub fn on_storage_changed<F>(key: &str, handler: F)
where
    F: Fn(Value) + 'static,
{
    let callback = Closure::<dyn Fn(JsValue)>::new(move |raw: JsValue| {
        if let Ok(value) = from_js::<Value>(raw) {
            handler(value);
        }
    });
    onStorageChanged(key, callback.as_ref().unchecked_ref());
    callback.forget();
}

/// chrome.storage.local
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeStorage;

impl StorageArea for ChromeStorage {
    async fn get(&self, keys: &[&str]) -> error::Result<Map<String, Value>> {
        let items = getStorage(to_js(keys)?)
            .await
            .map_err(|e| ExtensionError::Storage(format!("Failed to get storage: {:?}", e)))?;
        if items.is_null() || items.is_undefined() {
            return Ok(Map::new());
        }
        from_js(items)
    }

    async fn set(&self, items: Map<String, Value>) -> error::Result<()> {
        setStorage(to_js(&items)?)
            .await
            .map_err(|e| ExtensionError::Storage(format!("Failed to save storage: {:?}", e)))
    }
}

pub fn extension_store() -> ExtensionStore<ChromeStorage> {
    ExtensionStore::new(ChromeStorage)
}

/// Services of the background service worker
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeBackground;

impl BackgroundHost for ChromeBackground {
    async fn load_catalog(&self) -> error::Result<Vec<CatalogProduct>> {
        let text = loadCatalog()
            .await
            .map_err(|e| ExtensionError::Catalog(format!("{:?}", e)))?
            .as_string()
            .ok_or_else(|| ExtensionError::Catalog("catalog is not text".to_string()))?;
        parse_catalog(&text)
    }

    async fn query_tabs(&self, url_pattern: &str) -> error::Result<Vec<i32>> {
        let ids = queryTabs(url_pattern)
            .await
            .map_err(|e| ExtensionError::Transport(format!("tabs.query failed: {:?}", e)))?;
        from_js(ids)
    }

    async fn send_to_tab(&self, tab_id: i32, message: &ExtensionMessage) -> error::Result<()> {
        sendTabMessage(tab_id, to_js(message)?)
            .await
            .map(|_| ())
            .map_err(|e| ExtensionError::Transport(format!("{:?}", e)))
    }

    fn now_iso(&self) -> String {
        js_sys::Date::new_0().to_iso_string().into()
    }
}

/// chrome.runtime.sendMessage to the background worker
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeChannel;

impl RuntimeTransport for RuntimeChannel {
    async fn send(&self, message: &ExtensionMessage) -> error::Result<Value> {
        let response = sendRuntimeMessage(to_js(message)?)
            .await
            .map_err(|e| ExtensionError::Transport(format!("{:?}", e)))?;
        if response.is_undefined() {
            return Ok(Value::Null);
        }
        from_js(response)
    }
}

/// The tracker app's localStorage
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalInventory;

impl InventorySource for LocalInventory {
    fn read_raw(&self) -> Option<String> {
        web_sys::window()?
            .local_storage()
            .ok()??
            .get_item(INVENTORY_STORAGE_KEY)
            .ok()?
    }
}

/// Services of the settings popup
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromePopupHost;

impl PopupHost for ChromePopupHost {
    async fn find_tracker_tab(&self, port: u16) -> error::Result<Option<i32>> {
        let found = findTabOnPort(port)
            .await
            .map_err(|e| ExtensionError::Transport(format!("tabs.query failed: {:?}", e)))?;
        if found.is_null() || found.is_undefined() {
            return Ok(None);
        }
        from_js(found).map(Some)
    }

    async fn send_trigger_sync(&self, tab_id: i32) -> error::Result<()> {
        ChromeBackground.send_to_tab(tab_id, &ExtensionMessage::TriggerSync).await
    }

    async fn read_sync_state(&self) -> error::Result<Option<SyncState>> {
        extension_store().load_sync_state().await
    }

    async fn open_tab(&self, url: &str, active: bool) -> error::Result<i32> {
        let id = createTab(url, active)
            .await
            .map_err(|e| ExtensionError::Transport(format!("tabs.create failed: {:?}", e)))?;
        from_js(id)
    }

    async fn close_tab(&self, tab_id: i32) -> error::Result<()> {
        removeTab(tab_id)
            .await
            .map_err(|e| ExtensionError::Transport(format!("tabs.remove failed: {:?}", e)))
    }

    fn next_sync_state(&self) -> LocalBoxFuture<'static, Option<SyncState>> {
        let change = JsFuture::from(nextStorageChange(keys::SYNC_STATE));
        async move { change.await.ok().and_then(|value| from_js(value).ok()) }.boxed_local()
    }

    fn sleep(&self, ms: u32) -> LocalBoxFuture<'static, ()> {
        sleep(ms)
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        spawn_local(task);
    }
}
