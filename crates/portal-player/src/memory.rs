//! In-process hosts. Handles are cheap clones sharing one state, so a caller
//! can box one into the player and keep another to drive or inspect it.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use egui::{Color32, Pos2, Stroke};

use crate::error::PlayerError;
use crate::host::{
    AnalyserGraph, AudioGraphFactory, BioView, ControlBar, FrameHandle, FrameScheduler, GradientStop,
    MediaElement, WaveformSurface,
};
use crate::nav::{BrowserHistory, HistoryState, PageBody, PageInitializers};
use crate::session::SessionStore;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Forget everything, as when the browsing session ends.
    pub fn clear(&self) {
        self.items.borrow_mut().clear();
    }
}

impl SessionStore for MemoryStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), PlayerError> {
        self.items.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) {
        self.items.borrow_mut().remove(key);
    }
}

#[derive(Debug)]
struct MediaState {
    src: String,
    paused: bool,
    time: f64,
    metadata: bool,
    reject_play: bool,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            src: String::new(),
            paused: true,
            time: 0.0,
            metadata: false,
            reject_play: false,
        }
    }
}

/// A media element driven by an explicit clock.
#[derive(Debug, Clone, Default)]
pub struct MemoryMedia {
    state: Rc<RefCell<MediaState>>,
}

impl MemoryMedia {
    pub fn src(&self) -> String {
        self.state.borrow().src.clone()
    }

    /// Move the playback clock forward; does nothing while paused.
    pub fn advance(&self, seconds: f64) {
        let mut state = self.state.borrow_mut();
        if !state.paused {
            state.time += seconds;
        }
    }

    pub fn load_metadata(&self) {
        self.state.borrow_mut().metadata = true;
    }

    pub fn reject_play(&self, reject: bool) {
        self.state.borrow_mut().reject_play = reject;
    }

    /// Pause from outside the player, like a hardware media key.
    pub fn host_pause(&self) {
        self.state.borrow_mut().paused = true;
    }

    pub fn host_play(&self) {
        self.state.borrow_mut().paused = false;
    }
}

impl MediaElement for MemoryMedia {
    // A new source resets the element: paused, at zero, metadata pending.
    fn set_src(&mut self, src: &str) {
        let mut state = self.state.borrow_mut();
        state.src = src.to_string();
        state.paused = true;
        state.time = 0.0;
        state.metadata = false;
    }

    fn play(&mut self) -> Result<(), PlayerError> {
        let mut state = self.state.borrow_mut();
        if state.reject_play {
            return Err(PlayerError::PlaybackRejected("autoplay blocked".into()));
        }
        state.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.state.borrow_mut().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn current_time(&self) -> f64 {
        self.state.borrow().time
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.state.borrow_mut().time = seconds;
    }

    fn has_metadata(&self) -> bool {
        self.state.borrow().metadata
    }
}

#[derive(Debug, Default)]
struct GraphState {
    signal: Vec<u8>,
    suspended: bool,
    built: usize,
    fail_next: bool,
}

/// Graph factory whose analysers replay a signal set by the caller.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraphs {
    state: Rc<RefCell<GraphState>>,
}

impl MemoryGraphs {
    pub fn set_signal(&self, signal: Vec<u8>) {
        self.state.borrow_mut().signal = signal;
    }

    pub fn set_suspended(&self, suspended: bool) {
        self.state.borrow_mut().suspended = suspended;
    }

    pub fn is_suspended(&self) -> bool {
        self.state.borrow().suspended
    }

    pub fn fail_next_build(&self) {
        self.state.borrow_mut().fail_next = true;
    }

    pub fn built(&self) -> usize {
        self.state.borrow().built
    }
}

impl AudioGraphFactory for MemoryGraphs {
    fn build(&mut self, fft_size: u32) -> Result<Box<dyn AnalyserGraph>, PlayerError> {
        let mut state = self.state.borrow_mut();
        if state.fail_next {
            state.fail_next = false;
            return Err(PlayerError::Graph("no audio device".into()));
        }
        state.built += 1;
        Ok(Box::new(MemoryAnalyser {
            state: Rc::clone(&self.state),
            bins: (fft_size / 2) as usize,
        }))
    }
}

struct MemoryAnalyser {
    state: Rc<RefCell<GraphState>>,
    bins: usize,
}

impl AnalyserGraph for MemoryAnalyser {
    fn is_suspended(&self) -> bool {
        self.state.borrow().suspended
    }

    fn resume(&mut self) {
        self.state.borrow_mut().suspended = false;
    }

    fn bin_count(&self) -> usize {
        self.bins
    }

    // Missing samples read as silence.
    fn read_time_domain(&mut self, buffer: &mut [u8]) {
        let state = self.state.borrow();
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = state.signal.get(i).copied().unwrap_or(128);
        }
    }
}

#[derive(Debug, Default)]
struct ControlState {
    title: String,
    artist: String,
    playing: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryControls {
    state: Rc<RefCell<ControlState>>,
}

impl MemoryControls {
    pub fn track_info(&self) -> (String, String) {
        let state = self.state.borrow();
        (state.title.clone(), state.artist.clone())
    }

    pub fn is_playing(&self) -> bool {
        self.state.borrow().playing
    }
}

impl ControlBar for MemoryControls {
    fn set_track_info(&mut self, title: &str, artist: &str) {
        let mut state = self.state.borrow_mut();
        state.title = title.to_string();
        state.artist = artist.to_string();
    }

    fn set_playing(&mut self, playing: bool) {
        self.state.borrow_mut().playing = playing;
    }
}

#[derive(Debug, Default)]
struct BioState {
    content: Option<String>,
    visible: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBio {
    state: Rc<RefCell<BioState>>,
}

impl MemoryBio {
    pub fn content(&self) -> Option<String> {
        self.state.borrow().content.clone()
    }

    pub fn is_visible(&self) -> bool {
        self.state.borrow().visible
    }
}

impl BioView for MemoryBio {
    fn set_content(&mut self, markup: Option<&str>) {
        self.state.borrow_mut().content = markup.map(str::to_string);
    }

    fn set_visible(&mut self, visible: bool) {
        self.state.borrow_mut().visible = visible;
    }
}

#[derive(Debug, Default)]
struct FrameState {
    next_id: i32,
    outstanding: HashSet<FrameHandle>,
    cancelled: Vec<FrameHandle>,
}

/// Frame scheduler that only fires when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualFrames {
    state: Rc<RefCell<FrameState>>,
}

impl ManualFrames {
    pub fn outstanding(&self) -> usize {
        self.state.borrow().outstanding.len()
    }

    pub fn cancelled(&self) -> Vec<FrameHandle> {
        self.state.borrow().cancelled.clone()
    }

    /// Deliver one outstanding frame, returning its handle.
    pub fn fire(&self) -> Option<FrameHandle> {
        let mut state = self.state.borrow_mut();
        let handle = state.outstanding.iter().min_by_key(|h| h.0).copied()?;
        state.outstanding.remove(&handle);
        Some(handle)
    }
}

impl FrameScheduler for ManualFrames {
    fn request(&mut self) -> FrameHandle {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let handle = FrameHandle(state.next_id);
        state.outstanding.insert(handle);
        handle
    }

    fn cancel(&mut self, handle: FrameHandle) {
        let mut state = self.state.borrow_mut();
        state.outstanding.remove(&handle);
        state.cancelled.push(handle);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Clear,
    GradientLine {
        from: Pos2,
        to: Pos2,
        stops: Vec<GradientStop>,
        width: f32,
    },
    Line {
        from: Pos2,
        to: Pos2,
        stroke: Stroke,
    },
    StrokeCircle {
        center: Pos2,
        radius: f32,
        stroke: Stroke,
    },
    FillCircle {
        center: Pos2,
        radius: f32,
        color: Color32,
    },
}

/// Surface that records draw calls instead of drawing.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    pub ops: Vec<DrawOp>,
}

impl WaveformSurface for RecordingSurface {
    fn clear(&mut self) {
        self.ops.clear();
        self.ops.push(DrawOp::Clear);
    }

    fn gradient_line(&mut self, from: Pos2, to: Pos2, stops: &[GradientStop], width: f32) {
        self.ops.push(DrawOp::GradientLine {
            from,
            to,
            stops: stops.to_vec(),
            width,
        });
    }

    fn line(&mut self, from: Pos2, to: Pos2, stroke: Stroke) {
        self.ops.push(DrawOp::Line { from, to, stroke });
    }

    fn stroke_circle(&mut self, center: Pos2, radius: f32, stroke: Stroke) {
        self.ops.push(DrawOp::StrokeCircle {
            center,
            radius,
            stroke,
        });
    }

    fn fill_circle(&mut self, center: Pos2, radius: f32, color: Color32) {
        self.ops.push(DrawOp::FillCircle {
            center,
            radius,
            color,
        });
    }
}

static NEXT_NODE_KEY: AtomicU64 = AtomicU64::new(1);

/// A top-level element of a [`VirtualBody`]. `key` is its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualNode {
    pub key: u64,
    pub id: Option<String>,
    pub html: String,
    pub visible: Option<bool>,
    pub risen: bool,
}

impl VirtualNode {
    pub fn new(html: &str) -> Self {
        Self {
            key: NEXT_NODE_KEY.fetch_add(1, Ordering::Relaxed),
            id: None,
            html: html.to_string(),
            visible: None,
            risen: false,
        }
    }

    pub fn with_id(id: &str, html: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::new(html)
        }
    }

    /// A fresh copy with a new identity, as a parsed document hands out.
    pub fn duplicate(&self) -> Self {
        Self {
            key: NEXT_NODE_KEY.fetch_add(1, Ordering::Relaxed),
            ..self.clone()
        }
    }
}

/// Document body kept as a flat list, for reconciling without a browser.
#[derive(Debug, Clone, Default)]
pub struct VirtualBody {
    nodes: Vec<VirtualNode>,
    subpage: bool,
    title: String,
    scrolled_to_top: bool,
}

impl VirtualBody {
    pub fn from_nodes(nodes: Vec<VirtualNode>) -> Self {
        Self {
            nodes,
            ..Self::default()
        }
    }

    pub fn is_subpage(&self) -> bool {
        self.subpage
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn scrolled_to_top(&self) -> bool {
        self.scrolled_to_top
    }

    fn position(&self, key: u64) -> Option<usize> {
        self.nodes.iter().position(|n| n.key == key)
    }
}

impl PageBody for VirtualBody {
    type Node = VirtualNode;

    fn children(&self) -> Vec<VirtualNode> {
        self.nodes.clone()
    }

    fn node_id(&self, node: &VirtualNode) -> Option<String> {
        node.id.clone()
    }

    fn find_by_id(&self, id: &str) -> Option<VirtualNode> {
        self.nodes.iter().find(|n| n.id.as_deref() == Some(id)).cloned()
    }

    fn first_child(&self) -> Option<VirtualNode> {
        self.nodes.first().cloned()
    }

    fn remove(&mut self, node: &VirtualNode) {
        if let Some(at) = self.position(node.key) {
            self.nodes.remove(at);
        }
    }

    fn insert_before(&mut self, node: VirtualNode, anchor: Option<&VirtualNode>) {
        match anchor.and_then(|a| self.position(a.key)) {
            Some(at) => self.nodes.insert(at, node),
            None => self.nodes.push(node),
        }
    }

    fn set_subpage(&mut self, subpage: bool) {
        self.subpage = subpage;
    }

    fn set_visible(&mut self, node: &VirtualNode, visible: bool) {
        if let Some(at) = self.position(node.key) {
            self.nodes[at].visible = Some(visible);
        }
    }

    fn mark_risen(&mut self, node: &VirtualNode) {
        if let Some(at) = self.position(node.key) {
            self.nodes[at].risen = true;
        }
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn scroll_to_top(&mut self) {
        self.scrolled_to_top = true;
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    entries: Vec<(String, String)>,
}

impl MemoryHistory {
    /// `(kind, url)` pairs, kind being `push` or `replace`.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.clone()
    }
}

impl BrowserHistory for MemoryHistory {
    fn push(&mut self, _state: &HistoryState, _title: &str, url: &str) {
        self.entries.push(("push".into(), url.to_string()));
    }

    fn replace(&mut self, _state: &HistoryState, _title: &str, url: &str) {
        self.entries.push(("replace".into(), url.to_string()));
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingInitializers {
    pub calls: Vec<String>,
}

impl PageInitializers for RecordingInitializers {
    fn init_main(&mut self, has_seen_animation: bool) {
        self.calls.push(format!("main:{has_seen_animation}"));
    }

    fn init_subpage(&mut self) {
        self.calls.push("subpage".into());
    }
}
