/// In-memory stand-ins for the browser, shared by the unit tests
use crate::background::BackgroundHost;
use crate::error::{ExtensionError, Result};
use crate::overlay::page::{Badge, BadgeOrigin, ListingCard, Page, Swatch};
use crate::protocol::{ExtensionMessage, SyncState};
use crate::settings::PopupHost;
use crate::stock_data::{CatalogProduct, CatalogVariant};
use crate::storage::StorageArea;
use crate::tracker_sync::{InventorySource, RuntimeTransport};
use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::LocalSpawner;
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// chrome.storage.local; clones share the same contents
#[derive(Debug, Clone, Default)]
pub struct MemoryArea {
    items: Rc<RefCell<Map<String, Value>>>,
    writes: Rc<Cell<usize>>,
}

impl MemoryArea {
    /// Number of `set` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// Seed a raw value without counting a write
    pub fn insert(&self, key: &str, value: Value) {
        self.items.borrow_mut().insert(key.to_string(), value);
    }
}

impl StorageArea for MemoryArea {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        let items = self.items.borrow();
        Ok(keys
            .iter()
            .filter_map(|key| items.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, items: Map<String, Value>) -> Result<()> {
        self.items.borrow_mut().extend(items);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

pub fn sample_catalog() -> Vec<CatalogProduct> {
    vec![CatalogProduct {
        slug: "pla-basic".to_string(),
        name: "PLA Basic".to_string(),
        variants: vec![
            CatalogVariant {
                sku: "sku-1".to_string(),
                color_name: "Jade White".to_string(),
                color_code: Some("10100".to_string()),
            },
            CatalogVariant {
                sku: "sku-2".to_string(),
                color_name: "Mystery".to_string(),
                color_code: None,
            },
        ],
    }]
}

#[derive(Debug, Default)]
struct BackgroundState {
    catalog: Vec<CatalogProduct>,
    catalog_fails: bool,
    tab_ids: Vec<i32>,
    unreachable: HashSet<i32>,
    queried: Vec<String>,
    delivered: Vec<(i32, ExtensionMessage)>,
}

#[derive(Debug, Clone)]
pub struct FakeBackground {
    state: Rc<RefCell<BackgroundState>>,
}

impl FakeBackground {
    pub fn new(catalog: Vec<CatalogProduct>, tab_ids: Vec<i32>) -> Self {
        FakeBackground {
            state: Rc::new(RefCell::new(BackgroundState {
                catalog,
                tab_ids,
                ..Default::default()
            })),
        }
    }

    /// The tab exists but has no listener
    pub fn fail_delivery_to(&self, tab_id: i32) {
        self.state.borrow_mut().unreachable.insert(tab_id);
    }

    pub fn fail_catalog(&self) {
        self.state.borrow_mut().catalog_fails = true;
    }

    pub fn queried_patterns(&self) -> Vec<String> {
        self.state.borrow().queried.clone()
    }

    pub fn delivered(&self) -> Vec<(i32, ExtensionMessage)> {
        self.state.borrow().delivered.clone()
    }
}

impl BackgroundHost for FakeBackground {
    async fn load_catalog(&self) -> Result<Vec<CatalogProduct>> {
        let state = self.state.borrow();
        if state.catalog_fails {
            return Err(ExtensionError::Catalog("404".to_string()));
        }
        Ok(state.catalog.clone())
    }

    async fn query_tabs(&self, url_pattern: &str) -> Result<Vec<i32>> {
        let mut state = self.state.borrow_mut();
        state.queried.push(url_pattern.to_string());
        Ok(state.tab_ids.clone())
    }

    async fn send_to_tab(&self, tab_id: i32, message: &ExtensionMessage) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.unreachable.contains(&tab_id) {
            return Err(ExtensionError::Transport("Receiving end does not exist.".to_string()));
        }
        state.delivered.push((tab_id, message.clone()));
        Ok(())
    }

    fn now_iso(&self) -> String {
        "2026-10-18T12:00:00.000Z".to_string()
    }
}

/// The tracker's localStorage value
#[derive(Debug, Default)]
pub struct FakeInventory {
    raw: RefCell<Option<String>>,
}

impl FakeInventory {
    pub fn new(raw: Option<&str>) -> Self {
        FakeInventory {
            raw: RefCell::new(raw.map(str::to_string)),
        }
    }

    pub fn set(&self, raw: Option<&str>) {
        *self.raw.borrow_mut() = raw.map(str::to_string);
    }
}

impl InventorySource for FakeInventory {
    fn read_raw(&self) -> Option<String> {
        self.raw.borrow().clone()
    }
}

/// Records every message and answers with a canned reply, or fails when there is none
#[derive(Debug, Default)]
pub struct RecordingTransport {
    reply: RefCell<Option<Value>>,
    sent: RefCell<Vec<ExtensionMessage>>,
}

impl RecordingTransport {
    pub fn replying(reply: Value) -> Self {
        RecordingTransport {
            reply: RefCell::new(Some(reply)),
            sent: RefCell::default(),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn reply_with(&self, reply: Value) {
        *self.reply.borrow_mut() = Some(reply);
    }

    pub fn sent(&self) -> Vec<ExtensionMessage> {
        self.sent.borrow().clone()
    }
}

impl RuntimeTransport for RecordingTransport {
    async fn send(&self, message: &ExtensionMessage) -> Result<Value> {
        self.sent.borrow_mut().push(message.clone());
        self.reply
            .borrow()
            .clone()
            .ok_or_else(|| ExtensionError::Transport("Could not establish connection.".to_string()))
    }
}

#[derive(Debug, Default)]
struct PageState {
    structured_data: Vec<String>,
    swatches: Vec<Swatch<usize>>,
    cards: Vec<ListingCard<usize>>,
    anchors: HashMap<usize, usize>,
    badges: Vec<(usize, Badge)>,
    positioned: HashSet<usize>,
    writes: usize,
}

/// A page whose nodes are plain ids; each image maps to one anchor
#[derive(Debug, Default)]
pub struct FakePage {
    state: RefCell<PageState>,
}

impl FakePage {
    pub fn set_structured_data(&self, blocks: Vec<String>) {
        self.state.borrow_mut().structured_data = blocks;
    }

    pub fn add_swatch(&self, image: usize, anchor: usize, src: &str) {
        let mut state = self.state.borrow_mut();
        state.swatches.push(Swatch {
            image,
            src: src.to_string(),
        });
        state.anchors.insert(image, anchor);
    }

    pub fn add_card(&self, href: &str, description: &str, image: usize, anchor: usize) {
        let mut state = self.state.borrow_mut();
        state.cards.push(ListingCard {
            href: href.to_string(),
            description: Some(description.to_string()),
            image: Some(image),
        });
        state.anchors.insert(image, anchor);
    }

    pub fn badges_at(&self, anchor: usize) -> Vec<Badge> {
        self.state
            .borrow()
            .badges
            .iter()
            .filter(|(at, _)| *at == anchor)
            .map(|(_, badge)| *badge)
            .collect()
    }

    pub fn badge_count(&self) -> usize {
        self.state.borrow().badges.len()
    }

    /// Inserts and removals so far
    pub fn dom_writes(&self) -> usize {
        self.state.borrow().writes
    }

    pub fn is_positioned(&self, anchor: usize) -> bool {
        self.state.borrow().positioned.contains(&anchor)
    }
}

impl Page for FakePage {
    type Node = usize;

    fn structured_data(&self) -> Vec<String> {
        self.state.borrow().structured_data.clone()
    }

    fn swatches(&self) -> Vec<Swatch<usize>> {
        self.state.borrow().swatches.clone()
    }

    fn listing_cards(&self) -> Vec<ListingCard<usize>> {
        self.state.borrow().cards.clone()
    }

    fn badge_anchor(&self, image: &usize) -> Option<usize> {
        self.state.borrow().anchors.get(image).copied()
    }

    fn badge_in(&self, anchor: &usize) -> Option<Badge> {
        self.state
            .borrow()
            .badges
            .iter()
            .find(|(at, _)| at == anchor)
            .map(|(_, badge)| *badge)
    }

    fn badged_anchors(&self, origin: BadgeOrigin) -> Vec<usize> {
        self.state
            .borrow()
            .badges
            .iter()
            .filter(|(_, badge)| badge.origin == Some(origin))
            .map(|(at, _)| *at)
            .collect()
    }

    fn insert_badge(&self, anchor: &usize, quantity: u32, origin: BadgeOrigin) {
        let mut state = self.state.borrow_mut();
        state.positioned.insert(*anchor);
        state.badges.push((
            *anchor,
            Badge {
                quantity,
                origin: Some(origin),
            },
        ));
        state.writes += 1;
    }

    fn remove_badge(&self, anchor: &usize) {
        let mut state = self.state.borrow_mut();
        let before = state.badges.len();
        state.badges.retain(|(at, _)| at != anchor);
        if state.badges.len() != before {
            state.writes += 1;
        }
    }

    fn clear_badges(&self) {
        let mut state = self.state.borrow_mut();
        if !state.badges.is_empty() {
            state.badges.clear();
            state.writes += 1;
        }
    }
}

#[derive(Debug, Default)]
struct PopupState {
    tracker_tab: Option<i32>,
    sync_state: Option<SyncState>,
    trigger_fails: bool,
    now_ms: u32,
    timers: Vec<(u32, oneshot::Sender<()>)>,
    sync_waiters: Vec<oneshot::Sender<SyncState>>,
    triggered: Vec<i32>,
    opened: Vec<(String, bool)>,
    closed: Vec<i32>,
}

/// Popup host with a manual clock; timers fire only on `advance`
#[derive(Clone)]
pub struct FakePopupHost {
    state: Rc<RefCell<PopupState>>,
    spawner: LocalSpawner,
}

impl FakePopupHost {
    pub const OPENED_TAB_ID: i32 = 42;

    pub fn new(spawner: LocalSpawner) -> Self {
        FakePopupHost {
            state: Rc::default(),
            spawner,
        }
    }

    pub fn set_tracker_tab(&self, tab_id: Option<i32>) {
        self.state.borrow_mut().tracker_tab = tab_id;
    }

    pub fn set_sync_state(&self, sync_state: Option<SyncState>) {
        self.state.borrow_mut().sync_state = sync_state;
    }

    pub fn fail_trigger(&self) {
        self.state.borrow_mut().trigger_fails = true;
    }

    pub fn advance(&self, ms: u32) {
        let due: Vec<oneshot::Sender<()>> = {
            let mut state = self.state.borrow_mut();
            state.now_ms += ms;
            let now = state.now_ms;
            let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut state.timers)
                .into_iter()
                .partition(|(at, _)| *at <= now);
            state.timers = pending;
            due.into_iter().map(|(_, tx)| tx).collect()
        };
        for tx in due {
            let _ = tx.send(());
        }
    }

    /// The background worker persisted a new sync state
    pub fn publish_sync_state(&self, sync_state: SyncState) {
        let waiters = {
            let mut state = self.state.borrow_mut();
            state.sync_state = Some(sync_state.clone());
            std::mem::take(&mut state.sync_waiters)
        };
        for tx in waiters {
            let _ = tx.send(sync_state.clone());
        }
    }

    pub fn triggered(&self) -> Vec<i32> {
        self.state.borrow().triggered.clone()
    }

    pub fn opened(&self) -> Vec<(String, bool)> {
        self.state.borrow().opened.clone()
    }

    pub fn closed(&self) -> Vec<i32> {
        self.state.borrow().closed.clone()
    }
}

impl PopupHost for FakePopupHost {
    async fn find_tracker_tab(&self, _port: u16) -> Result<Option<i32>> {
        Ok(self.state.borrow().tracker_tab)
    }

    async fn send_trigger_sync(&self, tab_id: i32) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.trigger_fails {
            return Err(ExtensionError::Transport("Receiving end does not exist.".to_string()));
        }
        state.triggered.push(tab_id);
        Ok(())
    }

    async fn read_sync_state(&self) -> Result<Option<SyncState>> {
        Ok(self.state.borrow().sync_state.clone())
    }

    async fn open_tab(&self, url: &str, active: bool) -> Result<i32> {
        self.state.borrow_mut().opened.push((url.to_string(), active));
        Ok(Self::OPENED_TAB_ID)
    }

    async fn close_tab(&self, tab_id: i32) -> Result<()> {
        self.state.borrow_mut().closed.push(tab_id);
        Ok(())
    }

    fn next_sync_state(&self) -> LocalBoxFuture<'static, Option<SyncState>> {
        let (tx, rx) = oneshot::channel();
        self.state.borrow_mut().sync_waiters.push(tx);
        async move { rx.await.ok() }.boxed_local()
    }

    fn sleep(&self, ms: u32) -> LocalBoxFuture<'static, ()> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.borrow_mut();
        let at = state.now_ms + ms;
        state.timers.push((at, tx));
        async move {
            let _ = rx.await;
        }
        .boxed_local()
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        self.spawner.spawn_local(task).expect("spawn cleanup task");
    }
}
