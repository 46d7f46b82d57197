#![forbid(unsafe_code)]

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Array, Reflect};
use keybridge_core::{DomEvent, ImeConfig, ScratchSurface};
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use web_sys::{Event, EventTarget, HtmlElement, HtmlTextAreaElement};

use crate::host::HostSession;
use crate::queue::MAX_ENCODED_EVENTS;
use crate::LISTENED_EVENT_TYPES;

/// Inline style for the scratch textarea: off-screen below the viewport but
/// still focusable, so the platform IME anchors its candidate window there.
const TEXTAREA_STYLE: &[(&str, &str)] = &[
    ("position", "fixed"),
    ("bottom", "-30%"),
    ("left", "50%"),
    ("width", "1px"),
    ("height", "1px"),
    ("opacity", "0"),
    ("resize", "none"),
    ("overflow", "hidden"),
];

const TEXTAREA_ATTRIBUTES: &[(&str, &str)] = &[
    ("autocomplete", "off"),
    ("autocapitalize", "none"),
    ("autocorrect", "off"),
    ("spellcheck", "false"),
    ("aria-hidden", "true"),
];

/// The invisible textarea hosting the platform IME.
struct ScratchTextarea {
    element: HtmlTextAreaElement,
}

impl ScratchSurface for ScratchTextarea {
    fn clear(&mut self) {
        self.element.set_value("");
    }

    /// `click()` after `focus()` reopens on-screen keyboards.
    fn reclaim_focus(&mut self) {
        if let Err(err) = self.element.focus() {
            warn!(error = ?err, "failed to refocus scratch textarea");
            return;
        }
        self.element.click();
    }
}

type Session = Rc<RefCell<HostSession<ScratchTextarea>>>;
type Listener = Closure<dyn FnMut(Event)>;

/// Browser IME input bridge.
///
/// Creates a hidden textarea on construction, keeps it focused, and turns
/// its keyboard, composition and input events into canonical key/char
/// events. The page drains them with [`drain_events`](Self::drain_events).
#[wasm_bindgen]
pub struct ImeInput {
    session: Session,
    textarea: HtmlTextAreaElement,
    listeners: Vec<(&'static str, Listener)>,
    attached: bool,
}

#[wasm_bindgen]
impl ImeInput {
    /// `options` is an optional object with the session configuration
    /// fields (`sentinel_key_code`, `processing_key`, `char_modifiers`,
    /// `synthesize_key_press`) and an optional `queueLimit`.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<ImeInput, JsValue> {
        let (config, queue_limit) = parse_options(&options)?;
        let textarea = create_textarea()?;
        let surface = ScratchTextarea {
            element: textarea.clone(),
        };
        let session = Rc::new(RefCell::new(HostSession::new(surface, config, queue_limit)));

        let mut input = Self {
            session,
            textarea,
            listeners: Vec::new(),
            attached: false,
        };
        input.attach()?;
        input.textarea.focus()?;
        debug!(queue_limit, "ime input attached");
        Ok(input)
    }

    /// Feed an event-shaped object directly, for hosts that capture events
    /// themselves or replay recordings.
    #[wasm_bindgen(js_name = handleEvent)]
    pub fn handle_event(&self, event: JsValue) -> Result<(), JsValue> {
        let dom = dom_event_from_js(&event)?;
        let mut session = self
            .session
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("session busy"))?;
        session.dispatch(&dom);
        Ok(())
    }

    /// Drain queued canonical events as JSON strings, oldest first.
    #[wasm_bindgen(js_name = drainEvents)]
    pub fn drain_events(&self) -> Array {
        let arr = Array::new();
        if let Ok(mut session) = self.session.try_borrow_mut() {
            for line in session.drain() {
                arr.push(&JsValue::from_str(&line));
            }
        }
        arr
    }

    /// Most recent protocol fault since the last call, if any.
    #[wasm_bindgen(js_name = takeFault)]
    pub fn take_fault(&self) -> Option<String> {
        self.session
            .try_borrow_mut()
            .ok()
            .and_then(|mut session| session.take_fault())
    }

    #[wasm_bindgen(js_name = droppedEvents)]
    pub fn dropped_events(&self) -> f64 {
        self.session
            .try_borrow()
            .map_or(0.0, |session| session.dropped_events() as f64)
    }

    #[wasm_bindgen(js_name = isComposing)]
    pub fn is_composing(&self) -> bool {
        self.session
            .try_borrow()
            .is_ok_and(|session| session.is_composing())
    }

    pub fn focus(&self) -> Result<(), JsValue> {
        self.textarea.focus()
    }

    pub fn reset(&self) -> Result<(), JsValue> {
        let mut session = self
            .session
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("session busy"))?;
        session.reset();
        Ok(())
    }

    /// Detach every listener, remove the textarea and stop the session.
    pub fn dispose(&mut self) {
        self.detach();
        if let Ok(mut session) = self.session.try_borrow_mut() {
            session.dispose();
        }
    }
}

impl ImeInput {
    fn attach(&mut self) -> Result<(), JsValue> {
        let target: &EventTarget = self.textarea.as_ref();

        for &event_type in LISTENED_EVENT_TYPES {
            let session = Rc::clone(&self.session);
            let listener = Listener::new(move |event: Event| {
                forward_event(&session, &event);
            });
            target.add_event_listener_with_callback(event_type, listener.as_ref().unchecked_ref())?;
            self.listeners.push((event_type, listener));
        }

        // The IME only targets the focused element; take focus straight back.
        let session = Rc::clone(&self.session);
        let on_blur = Listener::new(move |_event: Event| match session.try_borrow_mut() {
            Ok(mut session) => session.blur(),
            Err(_) => warn!("re-entrant blur dropped"),
        });
        target.add_event_listener_with_callback("blur", on_blur.as_ref().unchecked_ref())?;
        self.listeners.push(("blur", on_blur));

        let on_click = Listener::new(|event: Event| event.stop_propagation());
        target.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())?;
        self.listeners.push(("click", on_click));

        self.attached = true;
        Ok(())
    }

    fn detach(&mut self) {
        if !self.attached {
            return;
        }
        let target: &EventTarget = self.textarea.as_ref();
        for (event_type, listener) in self.listeners.drain(..) {
            if let Err(err) =
                target.remove_event_listener_with_callback(event_type, listener.as_ref().unchecked_ref())
            {
                warn!(event_type, error = ?err, "failed to remove listener");
            }
        }
        self.textarea.remove();
        self.attached = false;
        debug!("ime input detached");
    }
}

impl Drop for ImeInput {
    fn drop(&mut self) {
        self.detach();
    }
}

fn forward_event(session: &Session, event: &Event) {
    let dom = match dom_event_from_js(event.as_ref()) {
        Ok(dom) => dom,
        Err(err) => {
            warn!(error = ?err, "unreadable DOM event");
            return;
        }
    };
    match session.try_borrow_mut() {
        Ok(mut session) => session.dispatch(&dom),
        Err(_) => warn!(event_type = %dom.event_type, "re-entrant DOM event dropped"),
    }
}

fn create_textarea() -> Result<HtmlTextAreaElement, JsValue> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let body: HtmlElement = document
        .body()
        .ok_or_else(|| JsValue::from_str("document has no body"))?;

    let textarea: HtmlTextAreaElement = document
        .create_element("textarea")?
        .dyn_into()
        .map_err(|_| JsValue::from_str("created element is not a textarea"))?;
    for (name, value) in TEXTAREA_ATTRIBUTES {
        textarea.set_attribute(name, value)?;
    }
    let style = textarea.style();
    for (name, value) in TEXTAREA_STYLE {
        style.set_property(name, value)?;
    }
    body.append_child(&textarea)?;
    Ok(textarea)
}

fn parse_options(options: &JsValue) -> Result<(ImeConfig, usize), JsValue> {
    if options.is_null() || options.is_undefined() {
        return Ok((ImeConfig::default(), MAX_ENCODED_EVENTS));
    }
    let json: String = js_sys::JSON::stringify(options)?.into();
    let config =
        ImeConfig::from_json_str(&json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let queue_limit = match get_u32_opt(options, "queueLimit")? {
        Some(limit) => limit as usize,
        None => MAX_ENCODED_EVENTS,
    };
    Ok((config, queue_limit))
}

/// Read the DOM fields the core needs from a live event or a plain object.
fn dom_event_from_js(event: &JsValue) -> Result<DomEvent, JsValue> {
    Ok(DomEvent {
        event_type: get_string(event, "type")?,
        key: get_string_opt(event, "key")?,
        code: get_string_opt(event, "code")?,
        key_code: get_u32_opt(event, "keyCode")?.unwrap_or(0),
        location: get_u32_opt(event, "location")?.unwrap_or(0),
        shift_key: get_bool(event, "shiftKey")?.unwrap_or(false),
        alt_key: get_bool(event, "altKey")?.unwrap_or(false),
        ctrl_key: get_bool(event, "ctrlKey")?.unwrap_or(false),
        meta_key: get_bool(event, "metaKey")?.unwrap_or(false),
        data: get_string_opt(event, "data")?,
        time_stamp: get_f64_opt(event, "timeStamp")?.unwrap_or(0.0),
    })
}

fn get_string(obj: &JsValue, key: &str) -> Result<String, JsValue> {
    let v = Reflect::get(obj, &JsValue::from_str(key))?;
    if v.is_null() || v.is_undefined() {
        return Err(JsValue::from_str(&format!(
            "missing required string field: {key}"
        )));
    }
    v.as_string()
        .ok_or_else(|| JsValue::from_str(&format!("field {key} must be a string")))
}

fn get_string_opt(obj: &JsValue, key: &str) -> Result<Option<String>, JsValue> {
    let v = Reflect::get(obj, &JsValue::from_str(key))?;
    if v.is_null() || v.is_undefined() {
        return Ok(None);
    }
    v.as_string()
        .map(Some)
        .ok_or_else(|| JsValue::from_str(&format!("field {key} must be a string")))
}

fn get_bool(obj: &JsValue, key: &str) -> Result<Option<bool>, JsValue> {
    let v = Reflect::get(obj, &JsValue::from_str(key))?;
    if v.is_null() || v.is_undefined() {
        return Ok(None);
    }
    Ok(Some(v.as_bool().ok_or_else(|| {
        JsValue::from_str(&format!("field {key} must be a boolean"))
    })?))
}

fn get_f64_opt(obj: &JsValue, key: &str) -> Result<Option<f64>, JsValue> {
    let v = Reflect::get(obj, &JsValue::from_str(key))?;
    if v.is_null() || v.is_undefined() {
        return Ok(None);
    }
    v.as_f64()
        .map(Some)
        .ok_or_else(|| JsValue::from_str(&format!("field {key} must be a number")))
}

fn get_u32_opt(obj: &JsValue, key: &str) -> Result<Option<u32>, JsValue> {
    let Some(n) = get_f64_opt(obj, key)? else {
        return Ok(None);
    };
    if !n.is_finite() || n.fract() != 0.0 || n < 0.0 || n > f64::from(u32::MAX) {
        return Err(JsValue::from_str(&format!("field {key} out of range")));
    }
    Ok(Some(n as u32))
}
