//! Browser implementation of the host seams on `web-sys`
//!
//! DOM nodes handed to the core are interned in a table and referred to by
//! index. Slots of nodes that left the document are released after each
//! navigation; indices are never reused, so a stale [`NodeRef`] reads as
//! detached. Listener and observer callbacks only enqueue a [`PageEvent`]
//! and request a pump; they never call into the coordinator directly.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use js_sys::{Array, Reflect};
use log::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    AddEventListenerOptions, AudioContext, AudioContextState, AudioNode, Document, DynamicsCompressorNode, Element,
    GainNode, HtmlElement, HtmlInputElement, HtmlMediaElement, HtmlVideoElement, IntersectionObserver,
    IntersectionObserverEntry, IntersectionObserverInit, MutationObserver, MutationObserverInit, Node,
    StereoPannerNode, Window,
};

use crate::error::{EnhancerError, Result};
use crate::host::{
    AudioBackend, AudioParam, ContextState, Dom, EventKind, EventTarget, ListenerId, MediaSnapshot, NodeKind,
    NodeRef, ObserverId, PageEvent,
};

/// Id of the range input injected into the floating player
const PROGRESS_ID: &str = "efyt-progress";

/// Smoothing time constant for parameter writes (seconds)
const PARAM_SMOOTHING_S: f64 = 0.015;

pub type EventQueue = Rc<RefCell<VecDeque<PageEvent>>>;

struct Listener {
    target: web_sys::EventTarget,
    name: &'static str,
    callback: Closure<dyn FnMut(web_sys::Event)>,
}

enum Observer {
    Intersection(IntersectionObserver, Closure<dyn FnMut(Array, JsValue)>),
    Mutation(MutationObserver, Closure<dyn FnMut(Array, JsValue)>),
}

fn js_error(context: &str, err: JsValue) -> EnhancerError {
    EnhancerError::Host {
        reason: format!("{}: {:?}", context, err),
    }
}

fn exception_name(err: &JsValue) -> Option<String> {
    Reflect::get(err, &JsValue::from_str("name")).ok()?.as_string()
}

pub struct WebPage {
    window: Window,
    document: Document,
    nodes: RefCell<Vec<Option<Node>>>,
    events: EventQueue,
    next_id: u32,
    listeners: BTreeMap<ListenerId, Listener>,
    observers: BTreeMap<ObserverId, Observer>,
    /// Media elements already sourced, with the context that sourced them
    sourced: Vec<(HtmlMediaElement, AudioContext)>,
    /// Shared handler for rejected `play()` promises
    play_rejected: Closure<dyn FnMut(JsValue)>,
}

impl WebPage {
    pub fn new() -> Result<Self> {
        let window = web_sys::window().ok_or(EnhancerError::ApiUnavailable { api: "window" })?;
        let document = window
            .document()
            .ok_or(EnhancerError::ApiUnavailable { api: "document" })?;
        Ok(Self {
            window,
            document,
            nodes: RefCell::new(Vec::new()),
            events: Rc::new(RefCell::new(VecDeque::new())),
            next_id: 1,
            listeners: BTreeMap::new(),
            observers: BTreeMap::new(),
            sourced: Vec::new(),
            play_rejected: Closure::new(|err: JsValue| {
                debug!("[PAGE] play() rejected: {:?}", err);
            }),
        })
    }

    pub fn queue(&self, event: PageEvent) {
        self.events.borrow_mut().push_back(event);
    }

    /// Oldest queued event, if any
    pub fn next_event(&self) -> Option<PageEvent> {
        self.events.borrow_mut().pop_front()
    }

    pub fn has_events(&self) -> bool {
        !self.events.borrow().is_empty()
    }

    /// Monotonic page time in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.window.performance().map(|p| p.now() as u64).unwrap_or(0)
    }

    fn next_handle(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ========================================================================
    // Node table
    // ========================================================================

    fn intern(&self, node: Node) -> NodeRef {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(index) = nodes.iter().position(|n| n.as_ref() == Some(&node)) {
            return NodeRef(index as u32);
        }
        nodes.push(Some(node));
        NodeRef(nodes.len() as u32 - 1)
    }

    fn node(&self, node: NodeRef) -> Option<Node> {
        self.nodes.borrow().get(node.0 as usize).cloned().flatten()
    }

    fn element(&self, node: NodeRef) -> Option<Element> {
        self.node(node)?.dyn_into::<Element>().ok()
    }

    /// Drop every interned node and sourced element that is no longer in
    /// the document. Returns how many node slots were released.
    pub fn release_detached(&mut self) -> usize {
        let mut released = 0;
        for slot in self.nodes.get_mut().iter_mut() {
            if slot.as_ref().is_some_and(|n| !n.is_connected()) {
                *slot = None;
                released += 1;
            }
        }
        self.sourced.retain(|(media, _)| media.is_connected());
        released
    }

    fn media_element(&self, node: NodeRef) -> Option<HtmlMediaElement> {
        self.element(node)?.dyn_into::<HtmlMediaElement>().ok()
    }

    fn progress_bar(&self) -> Option<HtmlInputElement> {
        self.document
            .get_element_by_id(PROGRESS_ID)?
            .dyn_into::<HtmlInputElement>()
            .ok()
    }

    fn event_target(&self, target: EventTarget) -> Option<web_sys::EventTarget> {
        match target {
            EventTarget::Document => Some(self.document.clone().into()),
            EventTarget::Window => Some(self.window.clone().into()),
            EventTarget::Media(node) => self.element(node).map(Into::into),
            EventTarget::ProgressBar => self.progress_bar().map(Into::into),
        }
    }

    fn root_style(&self) -> Option<web_sys::CssStyleDeclaration> {
        let root = self.document.document_element()?;
        root.dyn_into::<HtmlElement>().ok().map(|r| r.style())
    }
}

/// Translate a DOM event into the signal the core understands
fn page_event(kind: EventKind, event: &web_sys::Event, document: &Document) -> PageEvent {
    match kind {
        EventKind::NavigateFinish => PageEvent::NavigateFinish,
        EventKind::TimeUpdate => PageEvent::TimeUpdate,
        EventKind::Play => PageEvent::MediaPlay,
        EventKind::Click => PageEvent::DocumentClick,
        EventKind::VisibilityChange => PageEvent::VisibilityChange {
            hidden: document.hidden(),
        },
        EventKind::EnterPictureInPicture => PageEvent::PictureInPicture { active: true },
        EventKind::LeavePictureInPicture => PageEvent::PictureInPicture { active: false },
        EventKind::Input => {
            let fraction = event
                .target()
                .and_then(|t| t.dyn_into::<HtmlInputElement>().ok())
                .and_then(|input| input.value().parse::<f64>().ok())
                .unwrap_or(0.0);
            PageEvent::ProgressInput { fraction }
        }
    }
}

impl Dom for WebPage {
    fn query(&self, selector: &str) -> Option<NodeRef> {
        let element = self.document.query_selector(selector).ok()??;
        Some(self.intern(element.into()))
    }

    fn body(&self) -> Option<NodeRef> {
        self.document.body().map(|b| self.intern(b.into()))
    }

    fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        let parent = self.node(node)?.parent_element()?;
        Some(self.intern(parent.into()))
    }

    /// Any next sibling, text and comment nodes included
    fn next_sibling(&self, node: NodeRef) -> Option<NodeRef> {
        let sibling = self.node(node)?.next_sibling()?;
        Some(self.intern(sibling))
    }

    fn is_connected(&self, node: NodeRef) -> bool {
        self.node(node).map(|n| n.is_connected()).unwrap_or(false)
    }

    fn insert_before(&mut self, parent: NodeRef, node: NodeRef, before: Option<NodeRef>) -> Result<()> {
        let parent = self.node(parent).ok_or(EnhancerError::ElementMissing { what: "parent" })?;
        let node = self.node(node).ok_or(EnhancerError::ElementMissing { what: "node" })?;
        let before = before.and_then(|b| self.node(b));
        parent
            .insert_before(&node, before.as_ref())
            .map(|_| ())
            .map_err(|e| js_error("insertBefore", e))
    }

    fn has_class(&self, node: NodeRef, class: &str) -> bool {
        self.element(node)
            .map(|e| e.class_list().contains(class))
            .unwrap_or(false)
    }

    fn set_class(&mut self, node: NodeRef, class: &str, on: bool) {
        if let Some(element) = self.element(node) {
            let _ = element.class_list().toggle_with_force(class, on);
        }
    }

    fn document_attribute(&self, name: &str) -> Option<String> {
        self.document.document_element()?.get_attribute(name)
    }

    fn pathname(&self) -> String {
        self.window.location().pathname().unwrap_or_default()
    }

    fn scroll_y(&self) -> f64 {
        self.window.scroll_y().unwrap_or(0.0)
    }

    fn offset_height(&self, node: NodeRef) -> f64 {
        self.element(node)
            .and_then(|e| e.dyn_into::<HtmlElement>().ok())
            .map(|e| e.offset_height() as f64)
            .unwrap_or(0.0)
    }

    fn video_size(&self, media: NodeRef) -> (u32, u32) {
        self.element(media)
            .and_then(|e| e.dyn_into::<HtmlVideoElement>().ok())
            .map(|v| (v.video_width(), v.video_height()))
            .unwrap_or((0, 0))
    }

    fn media_snapshot(&self, media: NodeRef) -> Option<MediaSnapshot> {
        let m = self.media_element(media)?;
        Some(MediaSnapshot {
            current_time: m.current_time(),
            duration: m.duration(),
            volume: m.volume(),
            muted: m.muted(),
            paused: m.paused(),
        })
    }

    fn seek(&mut self, media: NodeRef, time: f64) {
        if let Some(m) = self.media_element(media) {
            m.set_current_time(time);
        }
    }

    fn replace_with_clone(&mut self, media: NodeRef) -> Result<NodeRef> {
        let original = self.element(media).ok_or(EnhancerError::ElementMissing { what: "media" })?;
        let parent = original
            .parent_node()
            .ok_or(EnhancerError::ElementMissing { what: "media parent" })?;
        let clone = original
            .clone_node_with_deep(true)
            .map_err(|e| js_error("cloneNode", e))?;
        parent
            .replace_child(&clone, &original)
            .map_err(|e| js_error("replaceChild", e))?;
        // The replaced element can never be sourced again; stop holding it
        self.sourced.retain(|(m, _)| m.is_connected());
        if let Some(slot) = self.nodes.get_mut().get_mut(media.0 as usize) {
            *slot = None;
        }
        Ok(self.intern(clone))
    }

    fn restore_media(&mut self, media: NodeRef, snapshot: &MediaSnapshot) {
        let Some(m) = self.media_element(media) else {
            return;
        };
        m.set_current_time(snapshot.current_time);
        m.set_volume(snapshot.volume);
        m.set_muted(snapshot.muted);
        if !snapshot.paused {
            // Autoplay policy may reject this; the page's own controls recover
            if let Ok(promise) = m.play() {
                let _ = promise.catch(&self.play_rejected);
            }
        }
    }

    fn set_root_property(&mut self, name: &str, value: Option<&str>) {
        let Some(style) = self.root_style() else {
            return;
        };
        let _ = match value {
            Some(v) => style.set_property(name, v),
            None => style.remove_property(name).map(|_| ()),
        };
    }

    fn upsert_style(&mut self, id: &str, css: &str) {
        if let Some(existing) = self.document.get_element_by_id(id) {
            existing.remove();
        }
        let Ok(style) = self.document.create_element("style") else {
            return;
        };
        style.set_id(id);
        style.set_text_content(Some(css));
        if let Some(head) = self.document.head() {
            let _ = head.append_child(&style);
        }
    }

    fn remove_style(&mut self, id: &str) {
        if let Some(existing) = self.document.get_element_by_id(id) {
            existing.remove();
        }
    }

    fn attach_progress_bar(&mut self, player: NodeRef) {
        if self.progress_bar().is_some() {
            return;
        }
        let Some(player) = self.element(player) else {
            return;
        };
        let Ok(input) = self
            .document
            .create_element("input")
            .and_then(|e| e.dyn_into::<HtmlInputElement>().map_err(Into::into))
        else {
            return;
        };
        input.set_type("range");
        input.set_id(PROGRESS_ID);
        input.set_min("0");
        input.set_max("1");
        input.set_step("0.01");
        input.set_value("0");
        let _ = player.append_child(&input);
    }

    fn set_progress(&mut self, fraction: f64) {
        if let Some(bar) = self.progress_bar() {
            bar.set_value(&fraction.to_string());
        }
    }

    fn remove_progress_bar(&mut self) {
        if let Some(bar) = self.progress_bar() {
            bar.remove();
        }
    }

    fn dispatch_resize(&mut self) {
        if let Ok(event) = web_sys::Event::new("resize") {
            let _ = self.window.dispatch_event(&event);
        }
    }

    fn picture_in_picture_active(&self) -> bool {
        Reflect::get(&self.document, &JsValue::from_str("pictureInPictureElement"))
            .map(|v| !v.is_null() && !v.is_undefined())
            .unwrap_or(false)
    }

    fn add_listener(&mut self, target: EventTarget, kind: EventKind, once: bool) -> Result<ListenerId> {
        let dom_target = self
            .event_target(target)
            .ok_or(EnhancerError::ElementMissing { what: "event target" })?;
        let events = self.events.clone();
        let document = self.document.clone();
        let callback = Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
            events.borrow_mut().push_back(page_event(kind, &event, &document));
            super::request_pump();
        });

        let options = AddEventListenerOptions::new();
        options.set_once(once);
        // PiP events are dispatched on the video; capture them at the document
        options.set_capture(matches!(
            kind,
            EventKind::EnterPictureInPicture | EventKind::LeavePictureInPicture
        ));
        dom_target
            .add_event_listener_with_callback_and_add_event_listener_options(
                kind.dom_name(),
                callback.as_ref().unchecked_ref(),
                &options,
            )
            .map_err(|e| js_error("addEventListener", e))?;

        let id = ListenerId(self.next_handle());
        self.listeners.insert(
            id,
            Listener {
                target: dom_target,
                name: kind.dom_name(),
                callback,
            },
        );
        Ok(id)
    }

    fn remove_listener(&mut self, id: ListenerId) {
        if let Some(listener) = self.listeners.remove(&id) {
            let _ = listener.target.remove_event_listener_with_callback(
                listener.name,
                listener.callback.as_ref().unchecked_ref(),
            );
            let _ = listener.target.remove_event_listener_with_callback_and_bool(
                listener.name,
                listener.callback.as_ref().unchecked_ref(),
                true,
            );
        }
    }

    fn observe_intersection(&mut self, node: NodeRef, thresholds: &[f64]) -> Result<ObserverId> {
        let element = self.element(node).ok_or(EnhancerError::ElementMissing { what: "container" })?;
        let id = ObserverId(self.next_handle());
        let events = self.events.clone();
        let callback = Closure::<dyn FnMut(Array, JsValue)>::new(move |entries: Array, _observer: JsValue| {
            // Only the latest entry matters for a single observed element
            let last = entries.get(entries.length().saturating_sub(1));
            if let Ok(entry) = last.dyn_into::<IntersectionObserverEntry>() {
                events.borrow_mut().push_back(PageEvent::Intersection {
                    observer: id,
                    ratio: entry.intersection_ratio(),
                });
                super::request_pump();
            }
        });

        let init = IntersectionObserverInit::new();
        let list: Array = thresholds.iter().map(|t| JsValue::from_f64(*t)).collect();
        init.set_threshold(&list);
        let observer = IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init)
            .map_err(|_| EnhancerError::ApiUnavailable {
                api: "IntersectionObserver",
            })?;
        observer.observe(&element);
        self.observers.insert(id, Observer::Intersection(observer, callback));
        Ok(id)
    }

    fn observe_class_changes(&mut self, node: NodeRef) -> Result<ObserverId> {
        let element = self.element(node).ok_or(EnhancerError::ElementMissing { what: "player" })?;
        let id = ObserverId(self.next_handle());
        let events = self.events.clone();
        let callback = Closure::<dyn FnMut(Array, JsValue)>::new(move |_records: Array, _observer: JsValue| {
            events
                .borrow_mut()
                .push_back(PageEvent::PlayerClassChanged { observer: id });
            super::request_pump();
        });

        let init = MutationObserverInit::new();
        init.set_attributes(true);
        let filter: Array = std::iter::once(JsValue::from_str("class")).collect();
        init.set_attribute_filter(&filter);
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|_| EnhancerError::ApiUnavailable { api: "MutationObserver" })?;
        observer
            .observe_with_options(&element, &init)
            .map_err(|e| js_error("MutationObserver.observe", e))?;
        self.observers.insert(id, Observer::Mutation(observer, callback));
        Ok(id)
    }

    fn disconnect_observer(&mut self, id: ObserverId) {
        match self.observers.remove(&id) {
            Some(Observer::Intersection(observer, _callback)) => observer.disconnect(),
            Some(Observer::Mutation(observer, _callback)) => observer.disconnect(),
            None => {}
        }
    }
}

impl AudioBackend for WebPage {
    type Context = AudioContext;
    type Node = AudioNode;

    fn create_context(&mut self) -> Result<AudioContext> {
        AudioContext::new().map_err(|e| EnhancerError::AudioContext {
            reason: format!("{:?}", e),
        })
    }

    fn context_state(&self, cx: &AudioContext) -> ContextState {
        match cx.state() {
            AudioContextState::Suspended => ContextState::Suspended,
            AudioContextState::Running => ContextState::Running,
            _ => ContextState::Closed,
        }
    }

    fn resume(&mut self, cx: &AudioContext) -> Result<()> {
        cx.resume().map(|_| ()).map_err(|e| EnhancerError::AudioContext {
            reason: format!("resume: {:?}", e),
        })
    }

    fn close(&mut self, cx: &AudioContext) -> Result<()> {
        self.sourced.retain(|(_, owner)| owner != cx);
        cx.close().map(|_| ()).map_err(|e| EnhancerError::AudioContext {
            reason: format!("close: {:?}", e),
        })
    }

    fn create_node(&mut self, cx: &AudioContext, kind: NodeKind) -> Result<AudioNode> {
        let node: AudioNode = match kind {
            NodeKind::Gain => cx.create_gain().map(Into::into),
            NodeKind::Compressor(params) => cx.create_dynamics_compressor().map(|c| {
                c.threshold().set_value(params.threshold_db);
                c.knee().set_value(params.knee_db);
                c.ratio().set_value(params.ratio);
                c.attack().set_value(params.attack_s);
                c.release().set_value(params.release_s);
                c.into()
            }),
            NodeKind::StereoPanner => cx.create_stereo_panner().map(Into::into),
        }
        .map_err(|e| EnhancerError::AudioContext {
            reason: format!("{:?}: {:?}", kind, e),
        })?;
        Ok(node)
    }

    fn create_media_source(&mut self, cx: &AudioContext, media: NodeRef) -> Result<AudioNode> {
        let element = self
            .media_element(media)
            .ok_or(EnhancerError::ElementMissing { what: "media" })?;
        if self.sourced.iter().any(|(m, owner)| *m == element && owner == cx) {
            return Err(EnhancerError::SourceAlreadyBound);
        }
        match cx.create_media_element_source(&element) {
            Ok(source) => {
                self.sourced.push((element, cx.clone()));
                Ok(source.into())
            }
            Err(err) if exception_name(&err).as_deref() == Some("InvalidStateError") => {
                Err(EnhancerError::InvalidState {
                    reason: format!("{:?}", err),
                })
            }
            Err(err) => Err(js_error("createMediaElementSource", err)),
        }
    }

    fn connect(&mut self, from: &AudioNode, to: &AudioNode) -> Result<()> {
        from.connect_with_audio_node(to)
            .map(|_| ())
            .map_err(|e| js_error("connect", e))
    }

    fn connect_destination(&mut self, cx: &AudioContext, from: &AudioNode) -> Result<()> {
        from.connect_with_audio_node(&cx.destination())
            .map(|_| ())
            .map_err(|e| js_error("connect destination", e))
    }

    fn disconnect(&mut self, node: &AudioNode) {
        let _ = node.disconnect();
    }

    fn set_param(&mut self, cx: &AudioContext, node: &AudioNode, param: AudioParam, value: f32) -> Result<()> {
        let target = match param {
            AudioParam::Gain => node.dyn_ref::<GainNode>().map(|n| n.gain()),
            AudioParam::Ratio => node.dyn_ref::<DynamicsCompressorNode>().map(|n| n.ratio()),
            AudioParam::Pan => node.dyn_ref::<StereoPannerNode>().map(|n| n.pan()),
        }
        .ok_or_else(|| EnhancerError::InvalidState {
            reason: format!("node has no {:?} parameter", param),
        })?;
        target
            .set_target_at_time(value, cx.current_time(), PARAM_SMOOTHING_S)
            .map(|_| ())
            .map_err(|e| js_error("setTargetAtTime", e))
    }
}
