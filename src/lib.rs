/// Filament Overlay - Chrome extension showing owned filament stock on the Bambu Lab store
/// Built with Rust + WASM + Yew

mod background;
mod bridge;
mod error;
mod lookup;
mod overlay;
mod protocol;
mod settings;
mod stock_data;
mod storage;
mod tracker_sync;
mod variant_name;
pub mod ui;

#[cfg(test)]
mod testing;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Background service worker
#[wasm_bindgen]
pub fn start_background() {
    background::start();
}

// Content script on the tracker app
#[wasm_bindgen]
pub fn start_tracker_sync() -> Result<(), JsValue> {
    tracker_sync::start()
}

// Content script on store pages
#[wasm_bindgen]
pub fn start_store_overlay() -> Result<(), JsValue> {
    overlay::dom::start()
}

// Start the Yew app for the settings popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}
