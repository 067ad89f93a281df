/// `Page` over the live document, plus the content-script wiring
use super::navigation;
use super::page::{Badge, BadgeOrigin, ListingCard, Page, Swatch};
use super::{StoreOverlay, request_lookup};
use crate::bridge::{self, RuntimeChannel};
use crate::protocol::{BADGE_CLASS, ExtensionMessage, NAVIGATION_SETTLE_MS};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Document, Element, HtmlElement, HtmlImageElement, MutationObserver, MutationObserverInit,
    Window,
};

const STRUCTURED_DATA_SELECTOR: &str = r#"script[type="application/ld+json"]"#;
const SWATCH_SELECTOR: &str = ".ant-image-img, [class*='swatch'] img, [class*='color-option'] img";
const PRODUCT_LINK_SELECTOR: &str = r#"a[href*="/products/"]"#;
const CARD_SELECTOR: &str = "[class*='card']";
const DESCRIPTION_SELECTOR: &str = ".bbl-description";
const IMAGE_WRAPPER_SELECTOR: &str = ".ant-image";
const ORIGIN_ATTR: &str = "data-ft-origin";

const TARGET: &str = "ft-overlay";

pub struct DomPage {
    window: Window,
    document: Document,
}

impl DomPage {
    pub fn new(window: Window, document: Document) -> Self {
        DomPage { window, document }
    }

    fn select_all(&self, selector: &str) -> Vec<Element> {
        let Ok(list) = self.document.query_selector_all(selector) else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    fn badge_element(anchor: &Element) -> Option<Element> {
        anchor.query_selector(&format!(".{}", BADGE_CLASS)).ok().flatten()
    }

    fn ensure_positioned(&self, anchor: &Element) {
        let is_static = self
            .window
            .get_computed_style(anchor)
            .ok()
            .flatten()
            .and_then(|style| style.get_property_value("position").ok())
            .is_some_and(|position| position == "static");

        if is_static {
            if let Some(el) = anchor.dyn_ref::<HtmlElement>() {
                if let Err(e) = el.style().set_property("position", "relative") {
                    log::debug!(target: TARGET, "Could not position badge anchor: {:?}", e);
                }
            }
        }
    }
}

impl Page for DomPage {
    type Node = Element;

    fn structured_data(&self) -> Vec<String> {
        self.select_all(STRUCTURED_DATA_SELECTOR)
            .into_iter()
            .filter_map(|script| script.text_content())
            .collect()
    }

    fn swatches(&self) -> Vec<Swatch<Element>> {
        self.select_all(SWATCH_SELECTOR)
            .into_iter()
            .filter_map(|el| {
                let src = el.dyn_ref::<HtmlImageElement>()?.src();
                Some(Swatch { image: el, src })
            })
            .collect()
    }

    fn listing_cards(&self) -> Vec<ListingCard<Element>> {
        self.select_all(PRODUCT_LINK_SELECTOR)
            .into_iter()
            .filter_map(|link| {
                let href = link.get_attribute("href")?;
                let card = link
                    .closest(CARD_SELECTOR)
                    .ok()
                    .flatten()
                    .or_else(|| link.parent_element())?;
                let description = card
                    .query_selector(DESCRIPTION_SELECTOR)
                    .ok()
                    .flatten()
                    .and_then(|el| el.text_content());
                let image = card.query_selector("img").ok().flatten();
                Some(ListingCard {
                    href,
                    description,
                    image,
                })
            })
            .collect()
    }

    fn badge_anchor(&self, image: &Element) -> Option<Element> {
        image
            .closest(IMAGE_WRAPPER_SELECTOR)
            .ok()
            .flatten()
            .or_else(|| image.parent_element())
    }

    fn badge_in(&self, anchor: &Element) -> Option<Badge> {
        let badge = Self::badge_element(anchor)?;
        Some(Badge {
            quantity: badge
                .text_content()
                .and_then(|text| text.trim().parse().ok())
                .unwrap_or_default(),
            origin: badge
                .get_attribute(ORIGIN_ATTR)
                .as_deref()
                .and_then(BadgeOrigin::parse),
        })
    }

    fn badged_anchors(&self, origin: BadgeOrigin) -> Vec<Element> {
        let selector = format!(".{}[{}=\"{}\"]", BADGE_CLASS, ORIGIN_ATTR, origin.as_str());
        self.select_all(&selector)
            .into_iter()
            .filter_map(|badge| badge.parent_element())
            .collect()
    }

    fn insert_badge(&self, anchor: &Element, quantity: u32, origin: BadgeOrigin) {
        self.ensure_positioned(anchor);

        let result = self.document.create_element("span").and_then(|badge| {
            badge.set_class_name(BADGE_CLASS);
            badge.set_text_content(Some(&quantity.to_string()));
            badge.set_attribute("title", &format!("You have {} in stock", quantity))?;
            badge.set_attribute(ORIGIN_ATTR, origin.as_str())?;
            anchor.append_child(&badge).map(|_| ())
        });

        if let Err(e) = result {
            log::debug!(target: TARGET, "Badge insert failed: {:?}", e);
        }
    }

    fn remove_badge(&self, anchor: &Element) {
        if let Some(badge) = Self::badge_element(anchor) {
            badge.remove();
        }
    }

    fn clear_badges(&self) {
        for badge in self.select_all(&format!(".{}", BADGE_CLASS)) {
            badge.remove();
        }
    }
}

type SharedOverlay = Rc<RefCell<StoreOverlay<DomPage>>>;

fn current_path(window: &Window) -> Option<String> {
    window.location().pathname().ok()
}

/// Re-fetch the lookup from the background worker and re-match
async fn refresh_lookup(overlay: SharedOverlay) {
    overlay.borrow_mut().lookup_requested();
    let result = request_lookup(&RuntimeChannel).await;
    overlay.borrow_mut().lookup_loaded(result);
}

fn observe_mutations(document: &Document, overlay: SharedOverlay) -> Result<(), JsValue> {
    let body = document.body().ok_or_else(|| JsValue::from_str("document has no body"))?;

    let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(move |_records, _observer| {
        if let Ok(mut overlay) = overlay.try_borrow_mut() {
            overlay.on_mutation();
        }
    });
    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    callback.forget();

    let options = MutationObserverInit::new();
    options.set_child_list(true);
    options.set_subtree(true);
    observer.observe_with_options(&body, &options)
}

fn install(window: Window, document: Document) -> Result<(), JsValue> {
    let path = current_path(&window).unwrap_or_default();
    let overlay: SharedOverlay = Rc::new(RefCell::new(StoreOverlay::new(DomPage::new(
        window.clone(),
        document.clone(),
    ))));
    overlay.borrow_mut().begin(&path);
    log::info!(target: TARGET, "Overlay started on {}", path);

    spawn_local(refresh_lookup(overlay.clone()));
    observe_mutations(&document, overlay.clone())?;

    let nav_overlay = overlay.clone();
    let nav_window = window.clone();
    navigation::subscribe(
        &window,
        Rc::new(move || {
            let overlay = nav_overlay.clone();
            let window = nav_window.clone();
            spawn_local(async move {
                bridge::sleep(NAVIGATION_SETTLE_MS).await;
                if let Some(path) = current_path(&window) {
                    overlay.borrow_mut().on_navigation(&path);
                }
            });
        }),
    )?;

    bridge::listen_runtime_messages(move |message| {
        if message == ExtensionMessage::StockUpdated {
            spawn_local(refresh_lookup(overlay.clone()));
        }
        None
    });

    Ok(())
}

/// Content-script entry for store pages
pub fn start() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window.document().ok_or_else(|| JsValue::from_str("no document"))?;

    if document.ready_state() != "loading" {
        return install(window, document);
    }

    let target = document.clone();
    let on_ready = Closure::once(move || {
        if let Err(e) = install(window, document) {
            log::error!(target: TARGET, "Overlay failed to start: {:?}", e);
        }
    });
    target.add_event_listener_with_callback("DOMContentLoaded", on_ready.as_ref().unchecked_ref())?;
    on_ready.forget();
    Ok(())
}
