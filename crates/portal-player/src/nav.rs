//! In-place page swaps that keep the audio element, control bar and waveform
//! canvas alive.
//!
//! The flow is split so the slow part stays with the host: [`NavigationInterceptor::on_click`]
//! or [`NavigationInterceptor::on_pop_state`] hand back a [`NavRequest`] to fetch, and
//! [`NavigationInterceptor::finish`] reconciles the fetched page into the live body.

use serde::{Deserialize, Serialize};

use crate::config::ElementIds;
use crate::error::NavError;

/// History entry state, stored as `{ "page": "<url>" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryState {
    pub page: String,
}

/// The page name used for the initial history entry: the last path segment,
/// or `index.html` for the site root.
pub fn page_from_path(pathname: &str) -> String {
    match pathname.rsplit('/').next() {
        Some(last) if !last.is_empty() => last.to_string(),
        _ => "index.html".to_string(),
    }
}

/// Decide whether a link click is ours. Only relative links to `.html`
/// documents without a `download` attribute are handled in place.
pub fn intercept_target(href: &str, has_download: bool) -> Option<&str> {
    let href = href.trim();
    if href.is_empty()
        || has_download
        || href.starts_with("http")
        || href.starts_with("//")
        || href.starts_with('#')
    {
        return None;
    }
    href.ends_with(".html").then_some(href)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavRequest {
    pub url: String,
    pub push_state: bool,
}

/// One page load at a time; the most recent request made while busy waits
/// for the outstanding one to settle.
#[derive(Debug, Default)]
pub struct Navigator {
    in_flight: Option<NavRequest>,
    queued: Option<NavRequest>,
}

impl Navigator {
    /// Returns the request if the caller should start fetching now.
    pub fn request(&mut self, request: NavRequest) -> Option<NavRequest> {
        match &self.in_flight {
            None => {
                self.in_flight = Some(request.clone());
                Some(request)
            }
            Some(current) if current.url == request.url => {
                log::debug!("already loading {}", request.url);
                self.queued = None;
                None
            }
            Some(_) => {
                log::debug!("queued {} behind the outstanding load", request.url);
                self.queued = Some(request);
                None
            }
        }
    }

    /// The outstanding load finished; returns the queued request to start, if any.
    pub fn settle(&mut self) -> Option<NavRequest> {
        self.in_flight = self.queued.take();
        self.in_flight.clone()
    }

    /// Drop everything, the browser is about to navigate away for real.
    pub fn abandon(&mut self) {
        self.in_flight = None;
        self.queued = None;
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }
}

/// A fetched and parsed page, ready to splice.
#[derive(Debug, Clone)]
pub struct IncomingPage<N> {
    pub title: String,
    pub is_subpage: bool,
    /// Top-level element children of the fetched body, in document order.
    pub nodes: Vec<N>,
}

/// The live document body, seen as a flat list of top-level elements.
pub trait PageBody {
    type Node: Clone;

    fn children(&self) -> Vec<Self::Node>;
    fn node_id(&self, node: &Self::Node) -> Option<String>;
    fn find_by_id(&self, id: &str) -> Option<Self::Node>;
    fn first_child(&self) -> Option<Self::Node>;
    fn remove(&mut self, node: &Self::Node);
    /// Insert before `anchor`, or append when there is none.
    fn insert_before(&mut self, node: Self::Node, anchor: Option<&Self::Node>);
    fn set_subpage(&mut self, subpage: bool);
    fn set_visible(&mut self, node: &Self::Node, visible: bool);
    fn mark_risen(&mut self, node: &Self::Node);
    fn set_title(&mut self, title: &str);
    fn scroll_to_top(&mut self);
}

pub trait BrowserHistory {
    fn push(&mut self, state: &HistoryState, title: &str, url: &str);
    fn replace(&mut self, state: &HistoryState, title: &str, url: &str);
}

/// Entry points of the page-level features that get rebuilt after every swap.
pub trait PageInitializers {
    fn init_main(&mut self, has_seen_animation: bool);
    fn init_subpage(&mut self);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapReport {
    pub removed: usize,
    pub inserted: usize,
    pub canvas_cloned: bool,
    /// Whether the waveform canvas is showing after the swap, if there is one.
    pub canvas_visible: Option<bool>,
}

/// Replace every top-level element except the preserved ones with the
/// incoming page's elements.
pub fn splice<B: PageBody>(body: &mut B, incoming: IncomingPage<B::Node>, ids: &ElementIds) -> SwapReport {
    let mut report = SwapReport::default();
    body.set_subpage(incoming.is_subpage);

    let existing_audio = body.find_by_id(&ids.audio);
    let existing_canvas = body.find_by_id(&ids.canvas);

    let mut incoming_canvas = None;
    let mut fresh = Vec::with_capacity(incoming.nodes.len());
    for node in incoming.nodes {
        match body.node_id(&node) {
            Some(id) if id == ids.canvas => incoming_canvas = Some(node),
            Some(id) if ids.is_preserved(&id) => {}
            _ => fresh.push(node),
        }
    }

    for node in body.children() {
        let keep = body.node_id(&node).is_some_and(|id| ids.is_preserved(&id));
        if !keep {
            body.remove(&node);
            report.removed += 1;
        }
    }

    if !incoming.is_subpage && existing_canvas.is_none() {
        if let Some(canvas) = incoming_canvas {
            let first = body.first_child();
            body.insert_before(canvas, first.as_ref());
            report.canvas_cloned = true;
        }
    }

    let anchor = existing_audio.or(existing_canvas).or_else(|| body.first_child());
    for node in fresh {
        body.insert_before(node, anchor.as_ref());
        report.inserted += 1;
    }

    if let Some(bar) = body.find_by_id(&ids.audio_bar) {
        body.mark_risen(&bar);
    }
    if let Some(canvas) = body.find_by_id(&ids.canvas) {
        let visible = !incoming.is_subpage;
        body.set_visible(&canvas, visible);
        report.canvas_visible = Some(visible);
    }

    body.set_title(&incoming.title);
    report
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    Swapped {
        report: SwapReport,
        /// A request that was waiting behind this one; fetch it next.
        next: Option<NavRequest>,
    },
    /// Leave the page the ordinary way.
    Fallback { url: String },
}

pub struct NavigationInterceptor {
    ids: ElementIds,
    navigator: Navigator,
}

impl NavigationInterceptor {
    pub fn new(ids: ElementIds) -> Self {
        Self {
            ids,
            navigator: Navigator::default(),
        }
    }

    /// Record the page we started on so back navigation can return to it.
    pub fn install(&self, history: &mut dyn BrowserHistory, pathname: &str, title: &str) {
        let page = page_from_path(pathname);
        history.replace(&HistoryState { page: page.clone() }, title, &page);
    }

    pub fn is_busy(&self) -> bool {
        self.navigator.is_busy()
    }

    /// Give up on the outstanding load and anything queued behind it.
    pub fn abandon(&mut self) {
        self.navigator.abandon();
    }

    /// Returns a request to fetch when the click should be handled in place
    /// (the caller then suppresses the default action). Clicks that arrive
    /// while a load is outstanding are still claimed but only queued.
    pub fn on_click(&mut self, href: &str, has_download: bool) -> ClickDecision {
        let Some(url) = intercept_target(href, has_download) else {
            return ClickDecision::Ignore;
        };
        let request = NavRequest {
            url: url.to_string(),
            push_state: true,
        };
        match self.navigator.request(request) {
            Some(start) => ClickDecision::Fetch(start),
            None => ClickDecision::Deferred,
        }
    }

    pub fn on_pop_state(&mut self, state: Option<HistoryState>) -> Option<NavRequest> {
        let state = state?;
        self.navigator.request(NavRequest {
            url: state.page,
            push_state: false,
        })
    }

    /// Apply a finished fetch. Errors abandon in-place loading entirely.
    pub fn finish<B: PageBody>(
        &mut self,
        request: &NavRequest,
        fetched: Result<IncomingPage<B::Node>, NavError>,
        body: &mut B,
        history: &mut dyn BrowserHistory,
        initializers: &mut dyn PageInitializers,
        has_seen_animation: bool,
    ) -> NavOutcome {
        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                log::error!("error loading page: {e}");
                self.navigator.abandon();
                return NavOutcome::Fallback {
                    url: request.url.clone(),
                };
            }
        };

        let is_subpage = page.is_subpage;
        let title = page.title.clone();
        let report = splice(body, page, &self.ids);

        if request.push_state {
            history.push(
                &HistoryState {
                    page: request.url.clone(),
                },
                &title,
                &request.url,
            );
        }
        if is_subpage {
            initializers.init_subpage();
        } else {
            initializers.init_main(has_seen_animation);
        }
        body.scroll_to_top();
        log::info!(
            "swapped in {} ({} removed, {} inserted)",
            request.url,
            report.removed,
            report.inserted
        );

        NavOutcome::Swapped {
            report,
            next: self.navigator.settle(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickDecision {
    /// Not ours, let the browser follow the link.
    Ignore,
    /// Ours; start fetching this.
    Fetch(NavRequest),
    /// Ours, but another load is outstanding and this one waits.
    Deferred,
}

impl ClickDecision {
    pub fn is_claimed(&self) -> bool {
        !matches!(self, ClickDecision::Ignore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryHistory, RecordingInitializers, VirtualBody, VirtualNode};

    fn ids() -> ElementIds {
        ElementIds::default()
    }

    fn main_shell() -> VirtualBody {
        VirtualBody::from_nodes(vec![
            VirtualNode::with_id("waveformCanvas", "<canvas>"),
            VirtualNode::with_id("sideNav", "<nav>main</nav>"),
            VirtualNode::new("<div class=\"portal\"></div>"),
            VirtualNode::with_id("backgroundAudio", "<audio>"),
            VirtualNode::with_id("audioBar", "<div>bar</div>"),
        ])
    }

    fn about_page() -> IncomingPage<VirtualNode> {
        IncomingPage {
            title: "About".into(),
            is_subpage: true,
            nodes: vec![
                VirtualNode::with_id("window", "<div>about</div>"),
                VirtualNode::with_id("backgroundAudio", "<audio>"),
                VirtualNode::with_id("audioBar", "<div>bar</div>"),
            ],
        }
    }

    #[test]
    fn intercepts_only_relative_html_links() {
        assert_eq!(intercept_target("about.html", false), Some("about.html"));
        assert_eq!(intercept_target("pages/work.html", false), Some("pages/work.html"));
        assert_eq!(intercept_target("https://example.com/a.html", false), None);
        assert_eq!(intercept_target("//cdn.example.com/a.html", false), None);
        assert_eq!(intercept_target("#top", false), None);
        assert_eq!(intercept_target("resume.pdf", false), None);
        assert_eq!(intercept_target("about.html", true), None);
        assert_eq!(intercept_target("", false), None);
    }

    #[test]
    fn page_name_comes_from_last_segment() {
        assert_eq!(page_from_path("/site/about.html"), "about.html");
        assert_eq!(page_from_path("/"), "index.html");
        assert_eq!(page_from_path(""), "index.html");
    }

    #[test]
    fn navigator_queues_the_latest_overlapping_request() {
        let mut nav = Navigator::default();
        let a = NavRequest {
            url: "a.html".into(),
            push_state: true,
        };
        let b = NavRequest {
            url: "b.html".into(),
            push_state: true,
        };
        let c = NavRequest {
            url: "c.html".into(),
            push_state: true,
        };
        assert_eq!(nav.request(a.clone()), Some(a.clone()));
        assert_eq!(nav.request(a), None);
        assert_eq!(nav.request(b), None);
        assert_eq!(nav.request(c.clone()), None);
        assert_eq!(nav.settle(), Some(c));
        assert!(nav.is_busy());
        assert_eq!(nav.settle(), None);
        assert!(!nav.is_busy());
    }

    #[test]
    fn clicking_the_loading_page_again_drops_the_queued_one() {
        let mut nav = Navigator::default();
        let a = NavRequest {
            url: "a.html".into(),
            push_state: true,
        };
        let b = NavRequest {
            url: "b.html".into(),
            push_state: true,
        };
        assert_eq!(nav.request(a.clone()), Some(a.clone()));
        assert_eq!(nav.request(b), None);
        assert_eq!(nav.request(a), None);
        assert_eq!(nav.settle(), None);
        assert!(!nav.is_busy());
    }

    #[test]
    fn abandoned_load_frees_the_interceptor() {
        let mut interceptor = NavigationInterceptor::new(ids());
        assert!(matches!(interceptor.on_click("a.html", false), ClickDecision::Fetch(_)));
        assert_eq!(interceptor.on_click("b.html", false), ClickDecision::Deferred);

        interceptor.abandon();
        assert!(!interceptor.is_busy());
        let ClickDecision::Fetch(request) = interceptor.on_click("c.html", false) else {
            panic!("a fresh click should start loading");
        };
        assert_eq!(request.url, "c.html");
    }

    #[test]
    fn splice_preserves_audio_nodes_by_identity() {
        let mut body = main_shell();
        let audio_key = body.find_by_id("backgroundAudio").unwrap().key;
        let bar_key = body.find_by_id("audioBar").unwrap().key;
        let canvas_key = body.find_by_id("waveformCanvas").unwrap().key;

        let report = splice(&mut body, about_page(), &ids());

        assert_eq!(report.removed, 2);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.canvas_visible, Some(false));
        assert_eq!(body.find_by_id("backgroundAudio").unwrap().key, audio_key);
        assert_eq!(body.find_by_id("audioBar").unwrap().key, bar_key);
        let canvas = body.find_by_id("waveformCanvas").unwrap();
        assert_eq!(canvas.key, canvas_key);
        assert_eq!(canvas.visible, Some(false));
        assert!(body.find_by_id("audioBar").unwrap().risen);
        assert!(body.is_subpage());
        assert_eq!(body.title(), "About");
        assert!(body.find_by_id("sideNav").is_none());

        let order: Vec<Option<String>> = body.children().iter().map(|n| n.id.clone()).collect();
        assert_eq!(
            order,
            vec![
                Some("waveformCanvas".into()),
                Some("window".into()),
                Some("backgroundAudio".into()),
                Some("audioBar".into()),
            ]
        );
    }

    #[test]
    fn canvas_is_cloned_in_when_arriving_on_main_without_one() {
        let mut body = VirtualBody::from_nodes(vec![
            VirtualNode::with_id("window", "<div>about</div>"),
            VirtualNode::with_id("backgroundAudio", "<audio>"),
            VirtualNode::with_id("audioBar", "<div>bar</div>"),
        ]);
        body.set_subpage(true);
        let main = IncomingPage {
            title: "Home".into(),
            is_subpage: false,
            nodes: main_shell().children(),
        };

        let report = splice(&mut body, main, &ids());

        assert!(report.canvas_cloned);
        assert_eq!(report.canvas_visible, Some(true));
        assert!(!body.is_subpage());
        let first = body.first_child().unwrap();
        assert_eq!(first.id.as_deref(), Some("waveformCanvas"));
        assert_eq!(first.visible, Some(true));
        assert!(body.find_by_id("sideNav").is_some());
    }

    #[test]
    fn subpage_without_canvas_stays_without_one() {
        let mut body = VirtualBody::from_nodes(vec![VirtualNode::with_id("backgroundAudio", "<audio>")]);
        let report = splice(&mut body, about_page(), &ids());
        assert!(!report.canvas_cloned);
        assert_eq!(report.canvas_visible, None);
    }

    #[test]
    fn finish_pushes_history_and_reinitializes() {
        let mut interceptor = NavigationInterceptor::new(ids());
        let mut body = main_shell();
        let mut history = MemoryHistory::default();
        let mut inits = RecordingInitializers::default();

        let ClickDecision::Fetch(request) = interceptor.on_click("about.html", false) else {
            panic!("click should start a fetch");
        };
        assert_eq!(interceptor.on_click("work.html", false), ClickDecision::Deferred);

        let outcome = interceptor.finish(&request, Ok(about_page()), &mut body, &mut history, &mut inits, true);

        let NavOutcome::Swapped { next, .. } = outcome else {
            panic!("expected a swap");
        };
        assert_eq!(next.map(|r| r.url), Some("work.html".to_string()));
        assert_eq!(history.entries(), vec![("push".to_string(), "about.html".to_string())]);
        assert_eq!(inits.calls, vec!["subpage".to_string()]);
        assert!(body.scrolled_to_top());
    }

    #[test]
    fn pop_state_does_not_push_again() {
        let mut interceptor = NavigationInterceptor::new(ids());
        let mut body = VirtualBody::from_nodes(Vec::new());
        let mut history = MemoryHistory::default();
        let mut inits = RecordingInitializers::default();

        assert_eq!(interceptor.on_pop_state(None), None);
        let request = interceptor
            .on_pop_state(Some(HistoryState {
                page: "index.html".into(),
            }))
            .unwrap();
        assert!(!request.push_state);
        let home = IncomingPage {
            title: "Home".into(),
            is_subpage: false,
            nodes: main_shell().children(),
        };
        interceptor.finish(&request, Ok(home), &mut body, &mut history, &mut inits, false);
        assert!(history.entries().is_empty());
        assert_eq!(inits.calls, vec!["main:false".to_string()]);
    }

    #[test]
    fn failure_falls_back_and_clears_the_queue() {
        let mut interceptor = NavigationInterceptor::new(ids());
        let mut body = main_shell();
        let before = body.children();
        let mut history = MemoryHistory::default();
        let mut inits = RecordingInitializers::default();

        let ClickDecision::Fetch(request) = interceptor.on_click("about.html", false) else {
            panic!("click should start a fetch");
        };
        interceptor.on_click("work.html", false);
        let outcome = interceptor.finish::<VirtualBody>(
            &request,
            Err(NavError::Status {
                url: "about.html".into(),
                status: 404,
            }),
            &mut body,
            &mut history,
            &mut inits,
            true,
        );
        assert_eq!(
            outcome,
            NavOutcome::Fallback {
                url: "about.html".into()
            }
        );
        assert!(!interceptor.is_busy());
        assert_eq!(body.children(), before);
        assert!(inits.calls.is_empty());
    }

    #[test]
    fn install_replaces_the_initial_entry() {
        let interceptor = NavigationInterceptor::new(ids());
        let mut history = MemoryHistory::default();
        interceptor.install(&mut history, "/", "Home");
        assert_eq!(history.entries(), vec![("replace".to_string(), "index.html".to_string())]);
    }

    #[test]
    fn history_state_round_trips_as_page_object() {
        let json = serde_json::to_string(&HistoryState {
            page: "about.html".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"page":"about.html"}"#);
    }
}
