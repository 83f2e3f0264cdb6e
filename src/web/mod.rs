//! Content-script entry points
//!
//! The coordinator lives in a thread-local slot. Browser callbacks queue
//! events and ask for a pump; the pump drains the queue, fires due timers
//! and arms one `setTimeout` for the next deadline.

mod console;
mod page;

use std::cell::RefCell;

use log::{debug, error, LevelFilter};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

pub use page::WebPage;

use crate::config::EnhancerConfig;
use crate::enhancer::Enhancer;
use crate::host::PageEvent;
use crate::settings::{SettingsMessage, SettingsStore};

/// Upper bound on drain/tick rounds per pump
const MAX_PUMP_ROUNDS: usize = 64;

struct App {
    enhancer: Enhancer<WebPage>,
    timeout: Option<i32>,
}

thread_local! {
    static APP: RefCell<Option<App>> = const { RefCell::new(None) };
    static PUMP: Closure<dyn FnMut()> = Closure::new(pump);
}

fn to_js(err: crate::EnhancerError) -> JsValue {
    JsValue::from_str(&format!("{} ({})", err, err.error_code()))
}

/// Start the enhancer with a settings snapshot and optional timing overrides
#[wasm_bindgen]
pub fn start(settings_json: &str, config_json: Option<String>) -> Result<(), JsValue> {
    console::init(LevelFilter::Info);

    let settings = SettingsStore::from_json(settings_json).map_err(to_js)?;
    let config = match config_json {
        Some(json) => EnhancerConfig::from_json(&json).map_err(to_js)?,
        None => EnhancerConfig::default(),
    };
    let page = WebPage::new().map_err(to_js)?;
    let now = page.now_ms();
    let mut enhancer = Enhancer::new(page, settings, config).map_err(to_js)?;
    enhancer.start(now);

    APP.with(|slot| {
        let mut slot = slot.borrow_mut();
        if let Some(mut old) = slot.take() {
            old.enhancer.shutdown(now);
        }
        *slot = Some(App {
            enhancer,
            timeout: None,
        });
    });
    request_pump();
    Ok(())
}

/// Deliver a settings message (JSON) from the popup or storage listener
#[wasm_bindgen]
pub fn on_settings_message(json: &str) -> Result<(), JsValue> {
    let message = SettingsMessage::from_json(json).map_err(to_js)?;
    let queued = APP.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|app| app.enhancer.host().queue(PageEvent::Settings(message)))
            .is_some()
    });
    if queued {
        request_pump();
    }
    Ok(())
}

/// Tear everything down; the page is left as it was before `start`
#[wasm_bindgen]
pub fn shutdown() {
    APP.with(|slot| {
        if let Some(mut app) = slot.borrow_mut().take() {
            if let (Some(handle), Some(window)) = (app.timeout.take(), web_sys::window()) {
                window.clear_timeout_with_handle(handle);
            }
            let now = app.enhancer.host().now_ms();
            app.enhancer.shutdown(now);
        }
    });
}

/// Schedule a pump on a fresh task
pub(crate) fn request_pump() {
    let Some(window) = web_sys::window() else {
        return;
    };
    PUMP.with(|pump| {
        if let Err(err) =
            window.set_timeout_with_callback_and_timeout_and_arguments_0(pump.as_ref().unchecked_ref(), 0)
        {
            error!("[ENHANCER] could not schedule pump: {:?}", err);
        }
    });
}

fn pump() {
    APP.with(|slot| {
        // A pump already on the stack drains whatever we would have
        let Ok(mut slot) = slot.try_borrow_mut() else {
            return;
        };
        let Some(app) = slot.as_mut() else {
            return;
        };

        let mut now = app.enhancer.host().now_ms();
        for _ in 0..MAX_PUMP_ROUNDS {
            while let Some(event) = app.enhancer.host().next_event() {
                let navigated = event == PageEvent::NavigateFinish;
                app.enhancer.handle(event, now);
                if navigated {
                    let released = app.enhancer.host_mut().release_detached();
                    debug!("[ENHANCER] released {} detached nodes", released);
                }
            }
            app.enhancer.tick(now);
            let due_now = app.enhancer.next_deadline().map(|d| d <= now).unwrap_or(false);
            if !app.enhancer.host().has_events() && !due_now {
                break;
            }
            now = app.enhancer.host().now_ms();
        }
        arm_timer(app, now);
    });
}

fn arm_timer(app: &mut App, now: u64) {
    let Some(window) = web_sys::window() else {
        return;
    };
    if let Some(handle) = app.timeout.take() {
        window.clear_timeout_with_handle(handle);
    }
    let Some(deadline) = app.enhancer.next_deadline() else {
        return;
    };
    let delay = deadline.saturating_sub(now).min(i32::MAX as u64) as i32;
    PUMP.with(|pump| {
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(pump.as_ref().unchecked_ref(), delay) {
            Ok(handle) => app.timeout = Some(handle),
            Err(err) => error!("[ENHANCER] could not arm timer: {:?}", err),
        }
    });
}
