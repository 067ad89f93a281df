/// Sync emitter: runs on the tracker app's page and pushes stock to the background worker
use crate::bridge::{self, LocalInventory, RuntimeChannel};
use crate::error::{ExtensionError, Result};
use crate::protocol::{Ack, ExtensionMessage, INVENTORY_STORAGE_KEY, POLL_INTERVAL_MS, SyncState};
use crate::stock_data::{StockData, parse_stock_data};
use futures::FutureExt;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::StorageEvent;

const TARGET: &str = "ft-sync";

/// What caused a sync attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Load,
    /// Another tab wrote the inventory key
    StorageEvent,
    /// Interval check for same-tab writes that fire no storage event
    Poll,
    /// TRIGGER_SYNC from the popup
    Requested,
}

/// Read access to the tracker's persisted inventory
pub trait InventorySource {
    fn read_raw(&self) -> Option<String>;
}

/// Request/response channel to the background worker
#[allow(async_fn_in_trait)]
pub trait RuntimeTransport {
    async fn send(&self, message: &ExtensionMessage) -> Result<Value>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    NoData,
    Unchanged,
    Invalid(ExtensionError),
    Sent(SyncState),
    Failed(ExtensionError),
}

/// Fingerprints of what was last sent (and last rejected) by this page
#[derive(Debug, Default)]
pub struct SyncEmitter {
    last_sent: Option<String>,
    last_rejected: Option<String>,
}

impl SyncEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Polls only fire for raw values we have not already handled
    fn is_stale_poll(&self, trigger: SyncTrigger, raw: &str) -> bool {
        trigger == SyncTrigger::Poll
            && (self.last_sent.as_deref() == Some(raw) || self.last_rejected.as_deref() == Some(raw))
    }

    pub fn last_sent(&self) -> Option<&str> {
        self.last_sent.as_deref()
    }
}

/// Send STOCK_SYNC and decode the worker's reply
pub async fn send_stock_sync<T: RuntimeTransport>(transport: &T, stock_data: StockData) -> Result<SyncState> {
    let response = transport.send(&ExtensionMessage::StockSync { stock_data }).await?;
    if response.is_null() {
        return Err(ExtensionError::SyncRejected);
    }
    Ok(serde_json::from_value(response)?)
}

/// One sync attempt.
///
/// The emitter is only borrowed around the await, never across it, so
/// overlapping triggers (poll tick during a storage event) are safe.
pub async fn run_sync<I, T>(emitter: &RefCell<SyncEmitter>, trigger: SyncTrigger, source: &I, transport: &T) -> SyncOutcome
where
    I: InventorySource,
    T: RuntimeTransport,
{
    let Some(raw) = source.read_raw() else {
        log::debug!(target: TARGET, "No inventory in localStorage, nothing to sync");
        return SyncOutcome::NoData;
    };

    if emitter.borrow().is_stale_poll(trigger, &raw) {
        return SyncOutcome::Unchanged;
    }

    let stock_data = match parse_stock_data(&raw) {
        Ok(data) => data,
        Err(e) => {
            log::warn!(target: TARGET, "Not syncing: {}", e);
            emitter.borrow_mut().last_rejected = Some(raw);
            return SyncOutcome::Invalid(e);
        }
    };

    log::info!(
        target: TARGET,
        "Sending STOCK_SYNC ({:?}) with {} entries",
        trigger,
        stock_data.entries.len()
    );

    match send_stock_sync(transport, stock_data).await {
        Ok(sync_state) => {
            let mut emitter = emitter.borrow_mut();
            emitter.last_sent = Some(raw);
            emitter.last_rejected = None;
            SyncOutcome::Sent(sync_state)
        }
        Err(e) => {
            // next poll tick retries since last_sent is unchanged
            log::error!(target: TARGET, "sendMessage failed: {}", e);
            SyncOutcome::Failed(e)
        }
    }
}

async fn sync_with_browser(emitter: Rc<RefCell<SyncEmitter>>, trigger: SyncTrigger) -> SyncOutcome {
    run_sync(&emitter, trigger, &LocalInventory, &RuntimeChannel).await
}

fn spawn_sync(emitter: &Rc<RefCell<SyncEmitter>>, trigger: SyncTrigger) {
    spawn_local(sync_with_browser(emitter.clone(), trigger).map(|_| ()));
}

/// Content-script entry for the tracker app's pages
pub fn start() -> std::result::Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let emitter = Rc::new(RefCell::new(SyncEmitter::new()));

    spawn_sync(&emitter, SyncTrigger::Load);

    // only fires for writes made by other tabs
    let storage_emitter = emitter.clone();
    let on_storage = Closure::<dyn Fn(StorageEvent)>::new(move |event: StorageEvent| {
        if event.key().as_deref() == Some(INVENTORY_STORAGE_KEY) {
            spawn_sync(&storage_emitter, SyncTrigger::StorageEvent);
        }
    });
    window.add_event_listener_with_callback("storage", on_storage.as_ref().unchecked_ref())?;
    on_storage.forget();

    let poll_emitter = emitter.clone();
    let on_poll = Closure::<dyn Fn()>::new(move || spawn_sync(&poll_emitter, SyncTrigger::Poll));
    window.set_interval_with_callback_and_timeout_and_arguments_0(on_poll.as_ref().unchecked_ref(), POLL_INTERVAL_MS)?;
    on_poll.forget();

    bridge::listen_runtime_messages(move |message| match message {
        ExtensionMessage::TriggerSync => {
            let attempt = sync_with_browser(emitter.clone(), SyncTrigger::Requested);
            Some(
                async move {
                    attempt.await;
                    serde_json::to_value(Ack { ok: true }).unwrap_or(Value::Null)
                }
                .boxed_local(),
            )
        }
        _ => None,
    });

    log::info!(target: TARGET, "Tracker sync started");
    Ok(())
}
