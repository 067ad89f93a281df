/// Route change detection for the storefront's client-side router
use js_sys::{Function, Reflect};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Window;

/// History methods the store's router calls on navigation
const HISTORY_METHODS: [&str; 2] = ["pushState", "replaceState"];

/// Call `on_change` after every pushState/replaceState and on back/forward.
///
/// The native history methods still run first and their result (or
/// exception) is passed through unchanged.
pub fn subscribe(window: &Window, on_change: Rc<dyn Fn()>) -> Result<(), JsValue> {
    let history = window.history()?;

    for method in HISTORY_METHODS {
        let key = JsValue::from_str(method);
        let native: Function = Reflect::get(&history, &key)?.dyn_into()?;
        let target = history.clone();
        let notify = on_change.clone();

        let wrapper = Closure::<dyn Fn(JsValue, JsValue, JsValue) -> Result<JsValue, JsValue>>::new(
            move |state: JsValue, title: JsValue, url: JsValue| {
                let result = native.call3(&target, &state, &title, &url);
                notify();
                result
            },
        );
        Reflect::set(&history, &key, wrapper.as_ref())?;
        wrapper.forget();
    }

    let popstate = Closure::<dyn Fn()>::new(move || on_change());
    window.add_event_listener_with_callback("popstate", popstate.as_ref().unchecked_ref())?;
    popstate.forget();

    Ok(())
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn call_history(window: &Window, method: &str, url: &str) {
        let history = window.history().unwrap();
        let function: Function = Reflect::get(&history, &JsValue::from_str(method))
            .unwrap()
            .dyn_into()
            .unwrap();
        function
            .call3(&history, &JsValue::NULL, &JsValue::from_str(""), &JsValue::from_str(url))
            .unwrap();
    }

    #[wasm_bindgen_test]
    fn test_route_changes_notify_after_history_updates() {
        let window = web_sys::window().unwrap();
        let original = window.location().href().unwrap();
        let seen: Rc<RefCell<Vec<String>>> = Rc::default();

        let record = seen.clone();
        let observed = window.clone();
        subscribe(
            &window,
            Rc::new(move || {
                let path = observed.location().pathname().unwrap_or_default();
                record.borrow_mut().push(path);
            }),
        )
        .unwrap();

        call_history(&window, "pushState", "/products/pla-basic");
        assert_eq!(*seen.borrow(), vec!["/products/pla-basic"]);

        call_history(&window, "replaceState", "/products/pla-matte");
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(seen.borrow()[1], "/products/pla-matte");

        window
            .dispatch_event(&web_sys::Event::new("popstate").unwrap())
            .unwrap();
        assert_eq!(seen.borrow().len(), 3);

        call_history(&window, "replaceState", &original);
        assert_eq!(seen.borrow().len(), 4);
    }
}
