/// Settings popup: sync status, tracker port and "Sync now"

use yew::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlInputElement;
use patternfly_yew::prelude::*;
use crate::bridge::{self, ChromePopupHost, RuntimeChannel, extension_store};
use crate::protocol::{DEFAULT_PORT, ExtensionMessage, PORT_DEBOUNCE_MS, SyncState, keys};
use crate::settings::{describe_sync_state, failure_message, parse_port_input, sync_now, tracker_url};
use crate::tracker_sync::RuntimeTransport;
use super::components::StatusBanner;

const TARGET: &str = "ft-popup";

#[derive(Clone, PartialEq)]
enum AppState {
    Idle,
    Syncing,
    Error(String),
}

#[function_component(App)]
pub fn app() -> Html {
    let state = use_state(|| AppState::Idle);
    let sync_state = use_state(|| None::<SyncState>);
    let port = use_state(|| DEFAULT_PORT);
    let port_input = use_state(|| DEFAULT_PORT.to_string());
    // bumped on every keystroke; only the last one within the debounce window saves
    let port_edit = use_mut_ref(|| 0u32);

    // Load saved settings and follow sync state changes while open
    {
        let sync_state = sync_state.clone();
        let port = port.clone();
        let port_input = port_input.clone();
        use_effect_with((), move |_| {
            let live = sync_state.clone();
            spawn_local(async move {
                let store = extension_store();
                match store.load_tracker_port().await {
                    Ok(saved) => {
                        port.set(saved);
                        port_input.set(saved.to_string());
                    }
                    Err(e) => log::warn!(target: TARGET, "Failed to load port: {}", e),
                }
                match store.load_sync_state().await {
                    Ok(saved) => sync_state.set(saved),
                    Err(e) => log::warn!(target: TARGET, "Failed to load sync state: {}", e),
                }
            });

            bridge::on_storage_changed(keys::SYNC_STATE, move |value| {
                if let Ok(updated) = serde_json::from_value::<SyncState>(value) {
                    live.set(Some(updated));
                }
            });
            || ()
        });
    }

    // Port field: remember valid ports after a pause in typing
    let on_port_input = {
        let port = port.clone();
        let port_input = port_input.clone();
        let port_edit = port_edit.clone();
        Callback::from(move |e: InputEvent| {
            let Some(input) = e.target_dyn_into::<HtmlInputElement>() else {
                return;
            };
            let text = input.value();
            port_input.set(text.clone());

            let edit = {
                let mut latest = port_edit.borrow_mut();
                *latest = latest.wrapping_add(1);
                *latest
            };

            let port = port.clone();
            let port_edit = port_edit.clone();
            spawn_local(async move {
                bridge::sleep(PORT_DEBOUNCE_MS).await;
                if *port_edit.borrow() != edit {
                    return;
                }
                let Some(parsed) = parse_port_input(&text) else {
                    return;
                };
                port.set(parsed);
                let message = ExtensionMessage::SetPort { port: i64::from(parsed) };
                if let Err(e) = RuntimeChannel.send(&message).await {
                    log::error!(target: TARGET, "Failed to save port: {}", e);
                }
            });
        })
    };

    let on_open_tracker = {
        let port = port.clone();
        Callback::from(move |_| {
            bridge::open_tab(&tracker_url(*port));
        })
    };

    let on_sync_now = {
        let state = state.clone();
        let sync_state = sync_state.clone();
        let port = port.clone();
        Callback::from(move |_| {
            let state = state.clone();
            let sync_state = sync_state.clone();
            let port = *port;

            state.set(AppState::Syncing);

            spawn_local(async move {
                match sync_now(&ChromePopupHost, port).await {
                    Ok(Some(updated)) => {
                        sync_state.set(Some(updated));
                        state.set(AppState::Idle);
                    }
                    Ok(None) => state.set(AppState::Idle),
                    Err(e) => {
                        log::warn!(target: TARGET, "Sync now failed: {}", e);
                        state.set(AppState::Error(failure_message(&e)));
                    }
                }
            });
        })
    };

    let status = describe_sync_state((*sync_state).as_ref(), sync_age);
    let is_syncing = *state == AppState::Syncing;

    html! {
        <div class="padding-20">
            <h1 class="popup-title">{"Filament Overlay"}</h1>

            <StatusBanner line={status} />

            <div class="flex-column-gap">
                <label class="port-label" for="tracker-port">{"Tracker port"}</label>
                <input
                    id="tracker-port"
                    type="number"
                    min="1"
                    max="65535"
                    value={(*port_input).clone()}
                    oninput={on_port_input}
                    class="port-input"
                />

                <Button onclick={on_sync_now} disabled={is_syncing} variant={ButtonVariant::Primary} block={true}>
                    {if is_syncing { "Syncing..." } else { "Sync now" }}
                </Button>
                <Button onclick={on_open_tracker} variant={ButtonVariant::Secondary} block={true}>
                    {"Open tracker"}
                </Button>
            </div>

            {match &*state {
                AppState::Syncing => html! {
                    <div class="loading-text-center">
                        <Spinner />
                    </div>
                },
                AppState::Error(err) => html! {
                    <div class="message-top-margin">
                        <Alert r#type={AlertType::Danger} title={err.clone()} inline={true}>
                        </Alert>
                    </div>
                },
                AppState::Idle => html! {}
            }}

            <p class="footer-popup">
                {format!("Filament Overlay v{}", env!("CARGO_PKG_VERSION"))}
            </p>
        </div>
    }
}

/// Age in ms and a local date label for an ISO timestamp
fn sync_age(at: &str) -> (f64, String) {
    let then = js_sys::Date::new(&JsValue::from_str(at));
    (js_sys::Date::now() - then.get_time(), then.to_date_string().into())
}
