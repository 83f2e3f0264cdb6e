//! Host seams
//!
//! The core never touches the browser directly. Everything it reads from or
//! writes to the page goes through [`Dom`], everything it does with Web Audio
//! goes through [`AudioBackend`], and every asynchronous signal arrives as a
//! [`PageEvent`]. The browser implementation lives in `crate::web`; the
//! in-memory one used by tests lives in [`mock`].

pub mod mock;

use std::fmt;

use crate::error::Result;
use crate::settings::SettingsMessage;

/// Non-owning handle to a DOM node known to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(pub u32);

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Handle to an installed event listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u32);

/// Handle to an installed intersection or mutation observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u32);

/// Where a listener is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Document,
    Window,
    Media(NodeRef),
    ProgressBar,
}

/// DOM events the core subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NavigateFinish,
    TimeUpdate,
    Play,
    Click,
    VisibilityChange,
    EnterPictureInPicture,
    LeavePictureInPicture,
    Input,
}

impl EventKind {
    /// Event type string as dispatched by the page
    pub fn dom_name(self) -> &'static str {
        match self {
            EventKind::NavigateFinish => "yt-navigate-finish",
            EventKind::TimeUpdate => "timeupdate",
            EventKind::Play => "play",
            EventKind::Click => "click",
            EventKind::VisibilityChange => "visibilitychange",
            EventKind::EnterPictureInPicture => "enterpictureinpicture",
            EventKind::LeavePictureInPicture => "leavepictureinpicture",
            EventKind::Input => "input",
        }
    }
}

/// Playback state carried across a media element substitution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaSnapshot {
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub muted: bool,
    pub paused: bool,
}

/// Signals delivered to the coordinator by the host
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    /// The single-page host finished a client-side navigation
    NavigateFinish,
    /// An intersection observer reported a new ratio
    Intersection { observer: ObserverId, ratio: f64 },
    /// The observed player's class attribute changed
    PlayerClassChanged { observer: ObserverId },
    /// System Picture-in-Picture was entered or left
    PictureInPicture { active: bool },
    /// The bound media element's playback position advanced
    TimeUpdate,
    /// The media element started playing
    MediaPlay,
    /// The user clicked somewhere in the document
    DocumentClick,
    /// Tab visibility changed
    VisibilityChange { hidden: bool },
    /// The floating progress bar was dragged to a fraction of the duration
    ProgressInput { fraction: f64 },
    /// Settings were edited elsewhere
    Settings(SettingsMessage),
}

/// DOM operations the core relies on.
///
/// Reads never fail: an absent node is reported as `None`, `false` or zero.
/// Writes that can be refused by the browser return `Result`.
pub trait Dom {
    fn query(&self, selector: &str) -> Option<NodeRef>;
    fn body(&self) -> Option<NodeRef>;
    fn parent(&self, node: NodeRef) -> Option<NodeRef>;
    fn next_sibling(&self, node: NodeRef) -> Option<NodeRef>;
    fn is_connected(&self, node: NodeRef) -> bool;

    /// Move `node` under `parent`, before `before` or at the end when `None`
    fn insert_before(&mut self, parent: NodeRef, node: NodeRef, before: Option<NodeRef>) -> Result<()>;

    fn has_class(&self, node: NodeRef, class: &str) -> bool;
    fn set_class(&mut self, node: NodeRef, class: &str, on: bool);
    fn document_attribute(&self, name: &str) -> Option<String>;

    fn pathname(&self) -> String;
    fn scroll_y(&self) -> f64;
    fn offset_height(&self, node: NodeRef) -> f64;

    /// Natural (width, height) of a video, zero until metadata is loaded
    fn video_size(&self, media: NodeRef) -> (u32, u32);
    fn media_snapshot(&self, media: NodeRef) -> Option<MediaSnapshot>;
    fn seek(&mut self, media: NodeRef, time: f64);
    /// Replace `media` in the document with a fresh clone and return the clone
    fn replace_with_clone(&mut self, media: NodeRef) -> Result<NodeRef>;
    /// Apply position, volume, mute and play state to a media element
    fn restore_media(&mut self, media: NodeRef, snapshot: &MediaSnapshot);

    fn set_root_property(&mut self, name: &str, value: Option<&str>);
    /// Insert or wholesale replace the stylesheet with the given id
    fn upsert_style(&mut self, id: &str, css: &str);
    fn remove_style(&mut self, id: &str);

    /// Ensure the floating progress bar exists inside `player`
    fn attach_progress_bar(&mut self, player: NodeRef);
    fn set_progress(&mut self, fraction: f64);
    fn remove_progress_bar(&mut self);

    fn dispatch_resize(&mut self);
    fn picture_in_picture_active(&self) -> bool;

    fn add_listener(&mut self, target: EventTarget, kind: EventKind, once: bool) -> Result<ListenerId>;
    fn remove_listener(&mut self, id: ListenerId);
    fn observe_intersection(&mut self, node: NodeRef, thresholds: &[f64]) -> Result<ObserverId>;
    fn observe_class_changes(&mut self, node: NodeRef) -> Result<ObserverId>;
    fn disconnect_observer(&mut self, id: ObserverId);
}

/// Lifecycle state reported by an audio context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// Fixed dynamics of the compressor node; only the ratio follows settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorParams {
    pub threshold_db: f32,
    pub knee_db: f32,
    pub ratio: f32,
    pub attack_s: f32,
    pub release_s: f32,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            threshold_db: -24.0,
            knee_db: 30.0,
            ratio: 12.0,
            attack_s: 0.003,
            release_s: 0.25,
        }
    }
}

/// Processing node kinds built by the graph manager
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    Gain,
    Compressor(CompressorParams),
    StereoPanner,
}

/// Automatable node parameters written by the graph manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioParam {
    Gain,
    Ratio,
    Pan,
}

/// Web Audio operations the graph manager relies on.
///
/// `create_media_source` must report a second source for an element it
/// already sourced as [`EnhancerError::SourceAlreadyBound`] and any other
/// refusal of the element as [`EnhancerError::InvalidState`].
///
/// [`EnhancerError::SourceAlreadyBound`]: crate::EnhancerError::SourceAlreadyBound
/// [`EnhancerError::InvalidState`]: crate::EnhancerError::InvalidState
pub trait AudioBackend {
    type Context;
    type Node: Clone + PartialEq + fmt::Debug;

    fn create_context(&mut self) -> Result<Self::Context>;
    fn context_state(&self, cx: &Self::Context) -> ContextState;
    fn resume(&mut self, cx: &Self::Context) -> Result<()>;
    fn close(&mut self, cx: &Self::Context) -> Result<()>;

    fn create_node(&mut self, cx: &Self::Context, kind: NodeKind) -> Result<Self::Node>;
    fn create_media_source(&mut self, cx: &Self::Context, media: NodeRef) -> Result<Self::Node>;

    fn connect(&mut self, from: &Self::Node, to: &Self::Node) -> Result<()>;
    fn connect_destination(&mut self, cx: &Self::Context, from: &Self::Node) -> Result<()>;
    /// Drop every outgoing connection of `node`
    fn disconnect(&mut self, node: &Self::Node);
    fn set_param(&mut self, cx: &Self::Context, node: &Self::Node, param: AudioParam, value: f32) -> Result<()>;
}

/// Everything the coordinator needs from a page
pub trait Host: Dom + AudioBackend {}

impl<T: Dom + AudioBackend> Host for T {}
