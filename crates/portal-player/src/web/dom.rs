//! Browser implementations of the host traits.

use std::cell::RefCell;
use std::rc::Rc;

use egui::{Color32, Pos2, Stroke};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    AnalyserNode, AudioContext, AudioContextState, CanvasRenderingContext2d, Document, Element,
    HtmlAudioElement, HtmlCanvasElement, HtmlElement, MediaElementAudioSourceNode, Node, Storage, Window,
};

use crate::config::ElementIds;
use crate::error::PlayerError;
use crate::host::{
    AnalyserGraph, AudioGraphFactory, BioView, ControlBar, FrameHandle, FrameScheduler, GradientStop,
    MediaElement, Portal, PortalLocator, WaveformSurface,
};
use crate::nav::{BrowserHistory, HistoryState, PageBody, PageInitializers};
use crate::session::SessionStore;

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

pub struct WebStore {
    storage: Storage,
}

impl WebStore {
    /// `sessionStorage`, if the browser lets us have it.
    pub fn session(window: &Window) -> Option<Self> {
        window.session_storage().ok().flatten().map(|storage| Self { storage })
    }
}

impl SessionStore for WebStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), PlayerError> {
        self.storage.set_item(key, value).map_err(|e| PlayerError::Storage {
            key: key.to_string(),
            reason: describe(&e),
        })
    }

    fn remove_item(&mut self, key: &str) {
        if let Err(e) = self.storage.remove_item(key) {
            log::warn!("could not remove {key}: {}", describe(&e));
        }
    }
}

pub struct WebMedia {
    audio: HtmlAudioElement,
}

impl WebMedia {
    pub fn new(audio: HtmlAudioElement) -> Self {
        Self { audio }
    }
}

impl MediaElement for WebMedia {
    fn set_src(&mut self, src: &str) {
        self.audio.set_src(src);
    }

    // `play()` settles later; a rejection only gets logged and the element
    // stays paused, which the pause/play events already reflect.
    fn play(&mut self) -> Result<(), PlayerError> {
        let promise = self
            .audio
            .play()
            .map_err(|e| PlayerError::PlaybackRejected(describe(&e)))?;
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = JsFuture::from(promise).await {
                log::warn!("playback was rejected: {}", describe(&e));
            }
        });
        Ok(())
    }

    fn pause(&mut self) {
        if let Err(e) = self.audio.pause() {
            log::warn!("pause failed: {}", describe(&e));
        }
    }

    fn is_paused(&self) -> bool {
        self.audio.paused()
    }

    fn current_time(&self) -> f64 {
        self.audio.current_time()
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.audio.set_current_time(seconds);
    }

    fn has_metadata(&self) -> bool {
        // HAVE_METADATA
        self.audio.ready_state() >= 1
    }
}

pub struct WebGraphs {
    audio: HtmlAudioElement,
}

impl WebGraphs {
    pub fn new(audio: HtmlAudioElement) -> Self {
        Self { audio }
    }
}

impl AudioGraphFactory for WebGraphs {
    fn build(&mut self, fft_size: u32) -> Result<Box<dyn AnalyserGraph>, PlayerError> {
        let graph_err = |e: JsValue| PlayerError::Graph(describe(&e));
        let context = AudioContext::new().map_err(graph_err)?;
        let analyser = context.create_analyser().map_err(graph_err)?;
        analyser.set_fft_size(fft_size);
        let source = context
            .create_media_element_source(&self.audio)
            .map_err(graph_err)?;
        source.connect_with_audio_node(&analyser).map_err(graph_err)?;
        analyser
            .connect_with_audio_node(&context.destination())
            .map_err(graph_err)?;
        Ok(Box::new(WebAnalyser {
            context,
            analyser,
            _source: source,
        }))
    }
}

struct WebAnalyser {
    context: AudioContext,
    analyser: AnalyserNode,
    _source: MediaElementAudioSourceNode,
}

impl AnalyserGraph for WebAnalyser {
    fn is_suspended(&self) -> bool {
        self.context.state() == AudioContextState::Suspended
    }

    fn resume(&mut self) {
        if let Err(e) = self.context.resume() {
            log::warn!("could not resume audio graph: {}", describe(&e));
        }
    }

    fn bin_count(&self) -> usize {
        self.analyser.frequency_bin_count() as usize
    }

    fn read_time_domain(&mut self, buffer: &mut [u8]) {
        self.analyser.get_byte_time_domain_data(buffer);
    }
}

// The control bar and bio are looked up by id on every call, so a swap that
// replaces them never leaves a stale handle behind.
pub struct DomControls {
    document: Document,
    ids: ElementIds,
}

impl DomControls {
    pub fn new(document: Document, ids: ElementIds) -> Self {
        Self { document, ids }
    }
}

impl ControlBar for DomControls {
    fn set_track_info(&mut self, title: &str, artist: &str) {
        if let Some(el) = self.document.get_element_by_id(&self.ids.track_title) {
            el.set_text_content(Some(title));
        }
        if let Some(el) = self.document.get_element_by_id(&self.ids.track_artist) {
            el.set_text_content(Some(artist));
        }
    }

    fn set_playing(&mut self, playing: bool) {
        if let Some(button) = self.document.get_element_by_id(&self.ids.play_button) {
            toggle_class(&button, "playing", playing);
        }
    }
}

pub struct DomBio {
    document: Document,
    id: String,
}

impl DomBio {
    pub fn new(document: Document, id: String) -> Self {
        Self { document, id }
    }
}

impl BioView for DomBio {
    fn set_content(&mut self, markup: Option<&str>) {
        if let Some(el) = self.document.get_element_by_id(&self.id) {
            el.set_inner_html(markup.unwrap_or(""));
        }
    }

    fn set_visible(&mut self, visible: bool) {
        if let Some(el) = self.document.get_element_by_id(&self.id) {
            toggle_class(&el, "visible", visible);
        }
    }
}

pub fn toggle_class(el: &Element, class: &str, on: bool) {
    let classes = el.class_list();
    let result = if on { classes.add_1(class) } else { classes.remove_1(class) };
    if let Err(e) = result {
        log::warn!("class {class}: {}", describe(&e));
    }
}

fn css(color: Color32) -> String {
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    format!("rgba({r}, {g}, {b}, {:.3})", f32::from(a) / 255.0)
}

pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl CanvasSurface {
    pub fn find(document: &Document, id: &str) -> Option<Self> {
        let canvas = document
            .get_element_by_id(id)?
            .dyn_into::<HtmlCanvasElement>()
            .ok()?;
        let ctx = canvas
            .get_context("2d")
            .ok()??
            .dyn_into::<CanvasRenderingContext2d>()
            .ok()?;
        Some(Self { canvas, ctx })
    }

    fn stroke_path(&self, stroke: Stroke) {
        self.ctx.set_stroke_style_str(&css(stroke.color));
        self.ctx.set_line_width(f64::from(stroke.width));
        self.ctx.stroke();
    }
}

impl WaveformSurface for CanvasSurface {
    fn clear(&mut self) {
        self.ctx.clear_rect(
            0.0,
            0.0,
            f64::from(self.canvas.width()),
            f64::from(self.canvas.height()),
        );
    }

    fn gradient_line(&mut self, from: Pos2, to: Pos2, stops: &[GradientStop], width: f32) {
        let gradient = self.ctx.create_linear_gradient(
            f64::from(from.x),
            f64::from(from.y),
            f64::from(to.x),
            f64::from(to.y),
        );
        for stop in stops {
            if let Err(e) = gradient.add_color_stop(stop.offset, &css(stop.color)) {
                log::debug!("bad colour stop: {}", describe(&e));
            }
        }
        self.ctx.begin_path();
        self.ctx.move_to(f64::from(from.x), f64::from(from.y));
        self.ctx.line_to(f64::from(to.x), f64::from(to.y));
        self.ctx.set_stroke_style_canvas_gradient(&gradient);
        self.ctx.set_line_width(f64::from(width));
        self.ctx.set_line_cap("round");
        self.ctx.stroke();
    }

    fn line(&mut self, from: Pos2, to: Pos2, stroke: Stroke) {
        self.ctx.begin_path();
        self.ctx.move_to(f64::from(from.x), f64::from(from.y));
        self.ctx.line_to(f64::from(to.x), f64::from(to.y));
        self.stroke_path(stroke);
    }

    fn stroke_circle(&mut self, center: Pos2, radius: f32, stroke: Stroke) {
        self.ctx.begin_path();
        if self
            .ctx
            .arc(
                f64::from(center.x),
                f64::from(center.y),
                f64::from(radius.max(0.0)),
                0.0,
                std::f64::consts::TAU,
            )
            .is_ok()
        {
            self.stroke_path(stroke);
        }
    }

    fn fill_circle(&mut self, center: Pos2, radius: f32, color: Color32) {
        self.ctx.begin_path();
        if self
            .ctx
            .arc(
                f64::from(center.x),
                f64::from(center.y),
                f64::from(radius.max(0.0)),
                0.0,
                std::f64::consts::TAU,
            )
            .is_ok()
        {
            self.ctx.set_fill_style_str(&css(color));
            self.ctx.fill();
        }
    }
}

/// Size the waveform canvas to the viewport.
pub fn resize_canvas(window: &Window, document: &Document, id: &str) {
    let Some(canvas) = document
        .get_element_by_id(id)
        .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok())
    else {
        return;
    };
    let width = window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    let height = window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    canvas.set_width(width as u32);
    canvas.set_height(height as u32);
}

pub struct DomPortal {
    document: Document,
    selector: String,
}

impl DomPortal {
    pub fn new(document: Document, selector: String) -> Self {
        Self { document, selector }
    }
}

impl PortalLocator for DomPortal {
    fn locate(&self) -> Option<Portal> {
        let portal = self.document.query_selector(&self.selector).ok()??;
        let rect = portal.get_bounding_client_rect();
        Some(Portal {
            center: Pos2::new(
                (rect.left() + rect.width() / 2.0) as f32,
                (rect.top() + rect.height() / 2.0) as f32,
            ),
            radius: (rect.width() / 2.0) as f32,
        })
    }
}

/// `requestAnimationFrame` with one shared callback, set once the player exists.
#[derive(Clone)]
pub struct AnimationFrames {
    window: Window,
    callback: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>,
}

impl AnimationFrames {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            callback: Rc::new(RefCell::new(None)),
        }
    }

    pub fn set_callback(&self, callback: Closure<dyn FnMut(f64)>) {
        *self.callback.borrow_mut() = Some(callback);
    }
}

impl FrameScheduler for AnimationFrames {
    fn request(&mut self) -> FrameHandle {
        let callback = self.callback.borrow();
        let id = callback
            .as_ref()
            .and_then(|cb| {
                self.window
                    .request_animation_frame(cb.as_ref().unchecked_ref())
                    .ok()
            })
            .unwrap_or(0);
        FrameHandle(id)
    }

    fn cancel(&mut self, handle: FrameHandle) {
        if handle.0 != 0 {
            self.window.cancel_animation_frame(handle.0).ok();
        }
    }
}

/// The live `<body>`, reconciled in place by the navigation layer.
pub struct DomBody {
    window: Window,
    document: Document,
    body: HtmlElement,
    subpage_class: String,
}

impl DomBody {
    pub fn new(window: Window, document: Document, subpage_class: String) -> Option<Self> {
        let body = document.body()?;
        Some(Self {
            window,
            document,
            body,
            subpage_class,
        })
    }
}

impl PageBody for DomBody {
    type Node = Element;

    fn children(&self) -> Vec<Element> {
        let children = self.body.children();
        (0..children.length()).filter_map(|i| children.item(i)).collect()
    }

    fn node_id(&self, node: &Element) -> Option<String> {
        let id = node.id();
        (!id.is_empty()).then_some(id)
    }

    fn find_by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn first_child(&self) -> Option<Element> {
        self.body.first_element_child()
    }

    fn remove(&mut self, node: &Element) {
        node.remove();
    }

    fn insert_before(&mut self, node: Element, anchor: Option<&Element>) {
        let anchor: Option<&Node> = anchor.map(|a| &**a);
        if let Err(e) = self.body.insert_before(&node, anchor) {
            log::warn!("insert failed: {}", describe(&e));
        }
    }

    fn set_subpage(&mut self, subpage: bool) {
        toggle_class(&self.body, &self.subpage_class, subpage);
    }

    fn set_visible(&mut self, node: &Element, visible: bool) {
        if let Some(el) = node.dyn_ref::<HtmlElement>() {
            let display = if visible { "block" } else { "none" };
            el.style().set_property("display", display).ok();
        }
    }

    fn mark_risen(&mut self, node: &Element) {
        toggle_class(node, "risen", true);
    }

    fn set_title(&mut self, title: &str) {
        self.document.set_title(title);
    }

    fn scroll_to_top(&mut self) {
        self.window.scroll_to_with_x_and_y(0.0, 0.0);
    }
}

pub struct WebHistory {
    window: Window,
}

impl WebHistory {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    fn write(&self, state: &HistoryState, title: &str, url: &str, push: bool) {
        let Ok(history) = self.window.history() else {
            return;
        };
        let value = serde_json::to_string(state)
            .ok()
            .and_then(|json| js_sys::JSON::parse(&json).ok())
            .unwrap_or(JsValue::NULL);
        let result = if push {
            history.push_state_with_url(&value, title, Some(url))
        } else {
            history.replace_state_with_url(&value, title, Some(url))
        };
        if let Err(e) = result {
            log::warn!("history update for {url} failed: {}", describe(&e));
        }
    }
}

impl BrowserHistory for WebHistory {
    fn push(&mut self, state: &HistoryState, title: &str, url: &str) {
        self.write(state, title, url, true);
    }

    fn replace(&mut self, state: &HistoryState, title: &str, url: &str) {
        self.write(state, title, url, false);
    }
}

/// Read a `{ page }` history state back out of a `popstate` event.
pub fn history_state(value: &JsValue) -> Option<HistoryState> {
    let json = js_sys::JSON::stringify(value).ok()?;
    serde_json::from_str(&String::from(json)).ok()
}

/// Calls the page scripts' global entry points, when the page defines them.
pub struct WindowInitializers {
    window: Window,
}

impl WindowInitializers {
    pub const MAIN: &'static str = "initMainBalloon";
    pub const SUBPAGE: &'static str = "initSubpageWindow";

    pub fn new(window: Window) -> Self {
        Self { window }
    }

    fn call(&self, name: &str, arg: Option<JsValue>) {
        let target = match js_sys::Reflect::get(&self.window, &JsValue::from_str(name)) {
            Ok(value) if value.is_function() => value.unchecked_into::<js_sys::Function>(),
            _ => {
                log::debug!("{name} is not defined on this page");
                return;
            }
        };
        let result = match arg {
            Some(arg) => target.call1(&self.window, &arg),
            None => target.call0(&self.window),
        };
        if let Err(e) = result {
            log::error!("{name} failed: {}", describe(&e));
        }
    }
}

impl PageInitializers for WindowInitializers {
    fn init_main(&mut self, has_seen_animation: bool) {
        self.call(Self::MAIN, Some(JsValue::from_bool(has_seen_animation)));
    }

    fn init_subpage(&mut self) {
        self.call(Self::SUBPAGE, None);
    }
}
