//! In-memory host for tests and offline experiments
//!
//! `MockPage` models just enough of a document (a node tree with ids,
//! classes and attributes, listeners, observers, stylesheets) and of Web
//! Audio (contexts, nodes, an edge list) to drive the coordinator
//! deterministically. Failure modes the browser produces in practice can be
//! switched on per element.

use std::collections::{BTreeMap, BTreeSet};

use super::{
    AudioBackend, AudioParam, ContextState, Dom, EventKind, EventTarget, ListenerId, MediaSnapshot,
    NodeKind, NodeRef, ObserverId,
};
use crate::error::{EnhancerError, Result};

const ROOT: NodeRef = NodeRef(0);
const BODY: NodeRef = NodeRef(1);

#[derive(Debug, Clone)]
struct MockNode {
    tag: String,
    id: Option<String>,
    classes: BTreeSet<String>,
    attributes: BTreeSet<String>,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
    height: f64,
    video_size: (u32, u32),
    media: Option<MediaSnapshot>,
}

impl MockNode {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            id: None,
            classes: BTreeSet::new(),
            attributes: BTreeSet::new(),
            parent: None,
            children: Vec::new(),
            height: 0.0,
            video_size: (0, 0),
            media: None,
        }
    }
}

/// What an observer is watching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverKind {
    Intersection,
    ClassChanges,
}

/// Kind of a mock audio node
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockAudioKind {
    Gain,
    Compressor,
    StereoPanner,
    Source(NodeRef),
}

impl MockAudioKind {
    pub fn name(self) -> &'static str {
        match self {
            MockAudioKind::Gain => "gain",
            MockAudioKind::Compressor => "compressor",
            MockAudioKind::StereoPanner => "panner",
            MockAudioKind::Source(_) => "source",
        }
    }
}

#[derive(Debug, Clone)]
struct MockAudioNode {
    context: u32,
    kind: MockAudioKind,
    params: BTreeMap<&'static str, f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    Node(u32),
    Destination(u32),
}

/// In-memory page and audio host
#[derive(Debug)]
pub struct MockPage {
    nodes: Vec<MockNode>,
    document_attributes: BTreeMap<String, String>,
    pathname: String,
    scroll_y: f64,
    pip_active: bool,
    styles: BTreeMap<String, String>,
    root_properties: BTreeMap<String, String>,
    progress: Option<(NodeRef, f64)>,
    resize_count: u32,
    next_id: u32,
    listeners: BTreeMap<ListenerId, (EventTarget, EventKind, bool)>,
    observers: BTreeMap<ObserverId, (NodeRef, ObserverKind)>,
    contexts: Vec<ContextState>,
    audio_nodes: Vec<MockAudioNode>,
    edges: Vec<(u32, Sink)>,
    sourced: BTreeMap<NodeRef, u32>,
    refused: BTreeSet<NodeRef>,
    fail_context_creation: bool,
}

/// Node handles of a typical watch page built by [`MockPage::watch_page`]
#[derive(Debug, Clone, Copy)]
pub struct WatchPage {
    pub container: NodeRef,
    pub ytd_player: NodeRef,
    pub anchor_parent: NodeRef,
    pub player: NodeRef,
    pub sibling: NodeRef,
    pub video: NodeRef,
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPage {
    /// An empty document: `<html><body></body></html>`
    pub fn new() -> Self {
        let mut root = MockNode::new("html");
        root.children.push(BODY);
        let mut body = MockNode::new("body");
        body.parent = Some(ROOT);
        Self {
            nodes: vec![root, body],
            document_attributes: BTreeMap::new(),
            pathname: "/".to_string(),
            scroll_y: 0.0,
            pip_active: false,
            styles: BTreeMap::new(),
            root_properties: BTreeMap::new(),
            progress: None,
            resize_count: 0,
            next_id: 1,
            listeners: BTreeMap::new(),
            observers: BTreeMap::new(),
            contexts: Vec::new(),
            audio_nodes: Vec::new(),
            edges: Vec::new(),
            sourced: BTreeMap::new(),
            refused: BTreeSet::new(),
            fail_context_creation: false,
        }
    }

    /// A watch page with a 16:9 video that has loaded its metadata
    pub fn watch_page() -> (Self, WatchPage) {
        let mut page = Self::new();
        page.pathname = "/watch".to_string();
        let body = page.body_node();
        let container = page.create(body, "div", Some("player-container"), &[]);
        page.set_height(container, 480.0);
        let ytd_player = page.create(container, "ytd-player", Some("ytd-player"), &[]);
        let anchor_parent = page.create(ytd_player, "div", Some("container"), &[]);
        let player = page.create(anchor_parent, "div", Some("movie_player"), &["html5-video-player"]);
        let sibling = page.create(anchor_parent, "div", None, &["ytp-overlay"]);
        let video = page.create(player, "video", None, &["html5-main-video"]);
        page.set_video_size(video, 1920, 1080);
        page.set_media(
            video,
            MediaSnapshot {
                current_time: 0.0,
                duration: 600.0,
                volume: 1.0,
                muted: false,
                paused: false,
            },
        );
        let handles = WatchPage {
            container,
            ytd_player,
            anchor_parent,
            player,
            sibling,
            video,
        };
        (page, handles)
    }

    fn next_handle(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn node(&self, node: NodeRef) -> Option<&MockNode> {
        self.nodes.get(node.0 as usize)
    }

    fn node_mut(&mut self, node: NodeRef) -> Option<&mut MockNode> {
        self.nodes.get_mut(node.0 as usize)
    }

    pub fn body_node(&self) -> NodeRef {
        BODY
    }

    /// Append a new element under `parent`
    pub fn create(&mut self, parent: NodeRef, tag: &str, id: Option<&str>, classes: &[&str]) -> NodeRef {
        let handle = NodeRef(self.nodes.len() as u32);
        let mut node = MockNode::new(tag);
        node.id = id.map(str::to_string);
        node.classes = classes.iter().map(|c| c.to_string()).collect();
        node.parent = Some(parent);
        self.nodes.push(node);
        if let Some(p) = self.node_mut(parent) {
            p.children.push(handle);
        }
        handle
    }

    /// Insert a text node under `parent`, before `before` or at the end
    pub fn insert_text(&mut self, parent: NodeRef, before: Option<NodeRef>) -> NodeRef {
        let handle = self.create(parent, "#text", None, &[]);
        if before.is_some() {
            // create() appended it; move it into place
            let _ = self.insert_before(parent, handle, before);
        }
        handle
    }

    /// Remove a node (and its subtree) from the document
    pub fn detach(&mut self, node: NodeRef) {
        let parent = self.node(node).and_then(|n| n.parent);
        if let Some(parent) = parent {
            if let Some(p) = self.node_mut(parent) {
                p.children.retain(|c| *c != node);
            }
        }
        if let Some(n) = self.node_mut(node) {
            n.parent = None;
        }
    }

    pub fn set_attribute(&mut self, node: NodeRef, name: &str) {
        if let Some(n) = self.node_mut(node) {
            n.attributes.insert(name.to_string());
        }
    }

    pub fn set_document_attribute(&mut self, name: &str, value: &str) {
        self.document_attributes.insert(name.to_string(), value.to_string());
    }

    pub fn set_pathname(&mut self, path: &str) {
        self.pathname = path.to_string();
    }

    pub fn set_scroll_y(&mut self, y: f64) {
        self.scroll_y = y;
    }

    pub fn set_height(&mut self, node: NodeRef, height: f64) {
        if let Some(n) = self.node_mut(node) {
            n.height = height;
        }
    }

    pub fn set_video_size(&mut self, node: NodeRef, width: u32, height: u32) {
        if let Some(n) = self.node_mut(node) {
            n.video_size = (width, height);
        }
    }

    pub fn set_media(&mut self, node: NodeRef, snapshot: MediaSnapshot) {
        if let Some(n) = self.node_mut(node) {
            n.media = Some(snapshot);
        }
    }

    pub fn set_pip(&mut self, active: bool) {
        self.pip_active = active;
    }

    pub fn children(&self, node: NodeRef) -> Vec<NodeRef> {
        self.node(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    pub fn style(&self, id: &str) -> Option<&str> {
        self.styles.get(id).map(String::as_str)
    }

    pub fn root_property(&self, name: &str) -> Option<&str> {
        self.root_properties.get(name).map(String::as_str)
    }

    pub fn resize_count(&self) -> u32 {
        self.resize_count
    }

    /// (parent, value) of the progress bar, if attached
    pub fn progress(&self) -> Option<(NodeRef, f64)> {
        self.progress
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Media elements the page still tracks as sourced
    pub fn sourced_count(&self) -> usize {
        self.sourced.len()
    }

    pub fn is_listening(&self, target: EventTarget, kind: EventKind) -> bool {
        self.listeners.values().any(|(t, k, _)| *t == target && *k == kind)
    }

    /// Deliver a DOM event to its listeners, dropping one-shot ones.
    /// Returns true if anything was listening.
    pub fn fire(&mut self, target: EventTarget, kind: EventKind) -> bool {
        let matching: Vec<(ListenerId, bool)> = self
            .listeners
            .iter()
            .filter(|(_, (t, k, _))| *t == target && *k == kind)
            .map(|(id, (_, _, once))| (*id, *once))
            .collect();
        for (id, once) in &matching {
            if *once {
                self.listeners.remove(id);
            }
        }
        !matching.is_empty()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Live observers of one kind on a node
    pub fn observers_on(&self, node: NodeRef, kind: ObserverKind) -> Vec<ObserverId> {
        self.observers
            .iter()
            .filter(|(_, (n, k))| *n == node && *k == kind)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn is_observer_live(&self, id: ObserverId) -> bool {
        self.observers.contains_key(&id)
    }

    pub fn media(&self, node: NodeRef) -> Option<MediaSnapshot> {
        self.node(node).and_then(|n| n.media)
    }

    // ========================================================================
    // Audio inspection and failure injection
    // ========================================================================

    /// Make source creation for `media` fail with an invalid-state error
    pub fn refuse_source(&mut self, media: NodeRef) {
        self.refused.insert(media);
    }

    pub fn fail_context_creation(&mut self, fail: bool) {
        self.fail_context_creation = fail;
    }

    /// Force a context into the closed state, as the browser may do
    pub fn close_context_externally(&mut self, cx: u32) {
        if let Some(state) = self.contexts.get_mut(cx as usize) {
            *state = ContextState::Closed;
        }
    }

    /// Autoplay policy: the context starts suspended until a gesture
    pub fn suspend_context(&mut self, cx: u32) {
        if let Some(state) = self.contexts.get_mut(cx as usize) {
            if *state == ContextState::Running {
                *state = ContextState::Suspended;
            }
        }
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    pub fn audio_kind(&self, node: u32) -> Option<MockAudioKind> {
        self.audio_nodes.get(node as usize).map(|n| n.kind)
    }

    pub fn param(&self, node: u32, param: AudioParam) -> Option<f32> {
        self.audio_nodes
            .get(node as usize)
            .and_then(|n| n.params.get(param_name(param)).copied())
    }

    /// Number of outgoing connections across all nodes
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn outgoing(&self, node: u32) -> usize {
        self.edges.iter().filter(|(from, _)| *from == node).count()
    }

    /// Follow connections from `start` and name each hop; ends with
    /// "destination" when the chain reaches the speakers.
    pub fn chain_from(&self, start: u32) -> Vec<&'static str> {
        let mut chain = Vec::new();
        let mut current = start;
        let mut guard = 0;
        loop {
            match self.audio_kind(current) {
                Some(kind) => chain.push(kind.name()),
                None => break,
            }
            let next: Vec<Sink> = self
                .edges
                .iter()
                .filter(|(from, _)| *from == current)
                .map(|(_, sink)| *sink)
                .collect();
            match next.as_slice() {
                [Sink::Node(n)] => current = *n,
                [Sink::Destination(_)] => {
                    chain.push("destination");
                    break;
                }
                _ => break,
            }
            guard += 1;
            if guard > 16 {
                break;
            }
        }
        chain
    }

    fn ensure_open(&self, cx: u32) -> Result<()> {
        match self.contexts.get(cx as usize) {
            Some(ContextState::Closed) | None => Err(EnhancerError::InvalidState {
                reason: "audio context is closed".to_string(),
            }),
            Some(_) => Ok(()),
        }
    }

    // ========================================================================
    // Selector matching
    // ========================================================================

    fn matches_compound(&self, node: NodeRef, compound: &str) -> bool {
        let Some(n) = self.node(node) else {
            return false;
        };
        let mut rest = compound;
        let tag_end = rest.find(&['#', '.', '['][..]).unwrap_or(rest.len());
        let tag = &rest[..tag_end];
        if !tag.is_empty() && tag != n.tag {
            return false;
        }
        rest = &rest[tag_end..];
        while !rest.is_empty() {
            let (sigil, body) = rest.split_at(1);
            let end = body.find(&['#', '.', '['][..]).unwrap_or(body.len());
            let (value, tail) = body.split_at(end);
            let ok = match sigil {
                "#" => n.id.as_deref() == Some(value),
                "." => n.classes.contains(value),
                "[" => n.attributes.contains(value.trim_end_matches(']')),
                _ => false,
            };
            if !ok {
                return false;
            }
            rest = tail;
        }
        true
    }

    fn matches_selector(&self, node: NodeRef, selector: &str) -> bool {
        let parts: Vec<&str> = selector.split_whitespace().collect();
        let Some((last, ancestors)) = parts.split_last() else {
            return false;
        };
        if !self.matches_compound(node, last) {
            return false;
        }
        let mut cursor = self.node(node).and_then(|n| n.parent);
        for compound in ancestors.iter().rev() {
            loop {
                match cursor {
                    Some(a) if self.matches_compound(a, compound) => {
                        cursor = self.node(a).and_then(|n| n.parent);
                        break;
                    }
                    Some(a) => cursor = self.node(a).and_then(|n| n.parent),
                    None => return false,
                }
            }
        }
        true
    }

    fn walk(&self, node: NodeRef, out: &mut Vec<NodeRef>) {
        out.push(node);
        if let Some(n) = self.node(node) {
            for child in &n.children {
                self.walk(*child, out);
            }
        }
    }

    /// True when `node` is `ancestor` or sits somewhere below it
    fn is_inclusive_ancestor(&self, ancestor: NodeRef, node: NodeRef) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.node(current).and_then(|n| n.parent);
        }
        false
    }
}

fn param_name(param: AudioParam) -> &'static str {
    match param {
        AudioParam::Gain => "gain",
        AudioParam::Ratio => "ratio",
        AudioParam::Pan => "pan",
    }
}

impl Dom for MockPage {
    fn query(&self, selector: &str) -> Option<NodeRef> {
        let mut order = Vec::new();
        self.walk(ROOT, &mut order);
        order.into_iter().find(|n| self.matches_selector(*n, selector))
    }

    fn body(&self) -> Option<NodeRef> {
        Some(BODY)
    }

    fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.node(node).and_then(|n| n.parent)
    }

    fn next_sibling(&self, node: NodeRef) -> Option<NodeRef> {
        let parent = self.parent(node)?;
        let siblings = &self.node(parent)?.children;
        let index = siblings.iter().position(|c| *c == node)?;
        siblings.get(index + 1).copied()
    }

    fn is_connected(&self, node: NodeRef) -> bool {
        self.is_inclusive_ancestor(ROOT, node)
    }

    fn insert_before(&mut self, parent: NodeRef, node: NodeRef, before: Option<NodeRef>) -> Result<()> {
        if self.is_inclusive_ancestor(node, parent) {
            return Err(EnhancerError::Host {
                reason: "cannot insert a node into its own subtree".to_string(),
            });
        }
        if let Some(b) = before {
            if self.parent(b) != Some(parent) {
                return Err(EnhancerError::Host {
                    reason: format!("{} is not a child of {}", b, parent),
                });
            }
        }
        self.detach(node);
        let index = match before {
            Some(b) => self
                .node(parent)
                .and_then(|p| p.children.iter().position(|c| *c == b))
                .unwrap_or(0),
            None => self.node(parent).map(|p| p.children.len()).unwrap_or(0),
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.insert(index, node);
        }
        if let Some(n) = self.node_mut(node) {
            n.parent = Some(parent);
        }
        Ok(())
    }

    fn has_class(&self, node: NodeRef, class: &str) -> bool {
        self.node(node).map(|n| n.classes.contains(class)).unwrap_or(false)
    }

    fn set_class(&mut self, node: NodeRef, class: &str, on: bool) {
        if let Some(n) = self.node_mut(node) {
            if on {
                n.classes.insert(class.to_string());
            } else {
                n.classes.remove(class);
            }
        }
    }

    fn document_attribute(&self, name: &str) -> Option<String> {
        self.document_attributes.get(name).cloned()
    }

    fn pathname(&self) -> String {
        self.pathname.clone()
    }

    fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    fn offset_height(&self, node: NodeRef) -> f64 {
        self.node(node).map(|n| n.height).unwrap_or(0.0)
    }

    fn video_size(&self, media: NodeRef) -> (u32, u32) {
        self.node(media).map(|n| n.video_size).unwrap_or((0, 0))
    }

    fn media_snapshot(&self, media: NodeRef) -> Option<MediaSnapshot> {
        self.media(media)
    }

    fn seek(&mut self, media: NodeRef, time: f64) {
        if let Some(m) = self.node_mut(media).and_then(|n| n.media.as_mut()) {
            m.current_time = time;
        }
    }

    fn replace_with_clone(&mut self, media: NodeRef) -> Result<NodeRef> {
        let original = self.node(media).cloned().ok_or(EnhancerError::ElementMissing { what: "media" })?;
        let parent = original.parent.ok_or(EnhancerError::ElementMissing { what: "media parent" })?;
        let before = self.next_sibling(media);
        let clone = NodeRef(self.nodes.len() as u32);
        let mut node = original.clone();
        node.parent = None;
        node.children = Vec::new();
        // A fresh element starts from the beginning, paused
        node.media = original.media.map(|m| MediaSnapshot {
            current_time: 0.0,
            paused: true,
            ..m
        });
        self.nodes.push(node);
        self.detach(media);
        self.sourced.remove(&media);
        self.insert_before(parent, clone, before)?;
        Ok(clone)
    }

    fn restore_media(&mut self, media: NodeRef, snapshot: &MediaSnapshot) {
        if let Some(m) = self.node_mut(media).and_then(|n| n.media.as_mut()) {
            m.current_time = snapshot.current_time;
            m.volume = snapshot.volume;
            m.muted = snapshot.muted;
            m.paused = snapshot.paused;
        }
    }

    fn set_root_property(&mut self, name: &str, value: Option<&str>) {
        match value {
            Some(v) => {
                self.root_properties.insert(name.to_string(), v.to_string());
            }
            None => {
                self.root_properties.remove(name);
            }
        }
    }

    fn upsert_style(&mut self, id: &str, css: &str) {
        self.styles.insert(id.to_string(), css.to_string());
    }

    fn remove_style(&mut self, id: &str) {
        self.styles.remove(id);
    }

    fn attach_progress_bar(&mut self, player: NodeRef) {
        if self.progress.is_none() {
            self.progress = Some((player, 0.0));
        }
    }

    fn set_progress(&mut self, fraction: f64) {
        if let Some((_, value)) = self.progress.as_mut() {
            *value = fraction;
        }
    }

    fn remove_progress_bar(&mut self) {
        self.progress = None;
    }

    fn dispatch_resize(&mut self) {
        self.resize_count += 1;
    }

    fn picture_in_picture_active(&self) -> bool {
        self.pip_active
    }

    fn add_listener(&mut self, target: EventTarget, kind: EventKind, once: bool) -> Result<ListenerId> {
        let id = ListenerId(self.next_handle());
        self.listeners.insert(id, (target, kind, once));
        Ok(id)
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
    }

    fn observe_intersection(&mut self, node: NodeRef, _thresholds: &[f64]) -> Result<ObserverId> {
        let id = ObserverId(self.next_handle());
        self.observers.insert(id, (node, ObserverKind::Intersection));
        Ok(id)
    }

    fn observe_class_changes(&mut self, node: NodeRef) -> Result<ObserverId> {
        let id = ObserverId(self.next_handle());
        self.observers.insert(id, (node, ObserverKind::ClassChanges));
        Ok(id)
    }

    fn disconnect_observer(&mut self, id: ObserverId) {
        self.observers.remove(&id);
    }
}

impl AudioBackend for MockPage {
    type Context = u32;
    type Node = u32;

    fn create_context(&mut self) -> Result<u32> {
        if self.fail_context_creation {
            return Err(EnhancerError::ApiUnavailable { api: "AudioContext" });
        }
        self.contexts.push(ContextState::Running);
        Ok(self.contexts.len() as u32 - 1)
    }

    fn context_state(&self, cx: &u32) -> ContextState {
        self.contexts.get(*cx as usize).copied().unwrap_or(ContextState::Closed)
    }

    fn resume(&mut self, cx: &u32) -> Result<()> {
        self.ensure_open(*cx)?;
        self.contexts[*cx as usize] = ContextState::Running;
        Ok(())
    }

    fn close(&mut self, cx: &u32) -> Result<()> {
        self.ensure_open(*cx)?;
        self.contexts[*cx as usize] = ContextState::Closed;
        Ok(())
    }

    fn create_node(&mut self, cx: &u32, kind: NodeKind) -> Result<u32> {
        self.ensure_open(*cx)?;
        let mut params = BTreeMap::new();
        let kind = match kind {
            NodeKind::Gain => {
                params.insert("gain", 1.0);
                MockAudioKind::Gain
            }
            NodeKind::Compressor(p) => {
                params.insert("ratio", p.ratio);
                params.insert("threshold", p.threshold_db);
                params.insert("knee", p.knee_db);
                params.insert("attack", p.attack_s);
                params.insert("release", p.release_s);
                MockAudioKind::Compressor
            }
            NodeKind::StereoPanner => {
                params.insert("pan", 0.0);
                MockAudioKind::StereoPanner
            }
        };
        self.audio_nodes.push(MockAudioNode {
            context: *cx,
            kind,
            params,
        });
        Ok(self.audio_nodes.len() as u32 - 1)
    }

    fn create_media_source(&mut self, cx: &u32, media: NodeRef) -> Result<u32> {
        self.ensure_open(*cx)?;
        if self.refused.contains(&media) {
            return Err(EnhancerError::InvalidState {
                reason: format!("{} cannot be used as a media source", media),
            });
        }
        match self.sourced.get(&media) {
            Some(owner) if owner == cx => return Err(EnhancerError::SourceAlreadyBound),
            Some(_) => {
                return Err(EnhancerError::InvalidState {
                    reason: format!("{} is captured by another audio context", media),
                })
            }
            None => {}
        }
        self.sourced.insert(media, *cx);
        self.audio_nodes.push(MockAudioNode {
            context: *cx,
            kind: MockAudioKind::Source(media),
            params: BTreeMap::new(),
        });
        Ok(self.audio_nodes.len() as u32 - 1)
    }

    fn connect(&mut self, from: &u32, to: &u32) -> Result<()> {
        let cx = self
            .audio_nodes
            .get(*from as usize)
            .map(|n| n.context)
            .ok_or_else(|| EnhancerError::InvalidState {
                reason: "unknown audio node".to_string(),
            })?;
        self.ensure_open(cx)?;
        let sink = Sink::Node(*to);
        if !self.edges.contains(&(*from, sink)) {
            self.edges.push((*from, sink));
        }
        Ok(())
    }

    fn connect_destination(&mut self, cx: &u32, from: &u32) -> Result<()> {
        self.ensure_open(*cx)?;
        let sink = Sink::Destination(*cx);
        if !self.edges.contains(&(*from, sink)) {
            self.edges.push((*from, sink));
        }
        Ok(())
    }

    fn disconnect(&mut self, node: &u32) {
        self.edges.retain(|(from, _)| from != node);
    }

    fn set_param(&mut self, cx: &u32, node: &u32, param: AudioParam, value: f32) -> Result<()> {
        self.ensure_open(*cx)?;
        let entry = self
            .audio_nodes
            .get_mut(*node as usize)
            .ok_or_else(|| EnhancerError::InvalidState {
                reason: "unknown audio node".to_string(),
            })?;
        entry.params.insert(param_name(param), value);
        Ok(())
    }
}
