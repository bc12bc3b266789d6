//! A tiny stand-in for the portfolio site: three pages served from memory and
//! a back stack that plays the part of the browser history.

use portal_player::memory::VirtualNode;
use portal_player::nav::{BrowserHistory, HistoryState, IncomingPage, PageInitializers};
use portal_player::NavError;

pub const HOME: &str = "index.html";

pub const LINKS: [(&str, &str); 4] = [
    ("Home", HOME),
    ("About", "about.html"),
    ("Work", "work.html"),
    ("Broken", "missing.html"),
];

fn shared_chrome(nodes: &mut Vec<VirtualNode>) {
    nodes.push(VirtualNode::with_id("backgroundAudio", "<audio>"));
    nodes.push(VirtualNode::with_id("audioBar", "<div>audio controls</div>"));
}

/// Serve `url` the way the static host would.
pub fn fetch(url: &str) -> Result<IncomingPage<VirtualNode>, NavError> {
    let (title, is_subpage, body): (&str, bool, &[&str]) = match url {
        HOME => (
            "Portfolio",
            false,
            &["<nav>Projects · Music · Contact</nav>", "<div class=\"portal\"></div>"],
        ),
        "about.html" => (
            "About",
            true,
            &["<h1>About</h1>", "<p>Designer and developer, mostly after dark.</p>"],
        ),
        "work.html" => (
            "Work",
            true,
            &["<h1>Work</h1>", "<p>Selected projects, 2019 to now.</p>"],
        ),
        _ => {
            return Err(NavError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    };

    let mut nodes = Vec::new();
    if !is_subpage {
        nodes.push(VirtualNode::with_id("waveformCanvas", "<canvas>"));
    }
    nodes.extend(body.iter().copied().map(VirtualNode::new));
    shared_chrome(&mut nodes);
    Ok(IncomingPage {
        title: title.to_string(),
        is_subpage,
        nodes,
    })
}

/// Strip markup down to the text a visitor would read.
pub fn text_of(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

#[derive(Debug, Default)]
pub struct BackStack {
    pages: Vec<String>,
}

impl BackStack {
    pub fn current(&self) -> Option<&str> {
        self.pages.last().map(String::as_str)
    }

    pub fn can_go_back(&self) -> bool {
        self.pages.len() > 1
    }

    /// Drop the current entry and return the state to restore, as `popstate` would.
    pub fn back(&mut self) -> Option<HistoryState> {
        if !self.can_go_back() {
            return None;
        }
        self.pages.pop();
        self.current().map(|page| HistoryState { page: page.to_string() })
    }
}

impl BrowserHistory for BackStack {
    fn push(&mut self, state: &HistoryState, _title: &str, _url: &str) {
        self.pages.push(state.page.clone());
    }

    fn replace(&mut self, state: &HistoryState, _title: &str, _url: &str) {
        match self.pages.last_mut() {
            Some(top) => top.clone_from(&state.page),
            None => self.pages.push(state.page.clone()),
        }
    }
}

/// Stands in for the balloon intro and the subpage window scripts.
#[derive(Debug, Default)]
pub struct PageScripts {
    pub intro_pending: bool,
}

impl PageInitializers for PageScripts {
    fn init_main(&mut self, has_seen_animation: bool) {
        self.intro_pending = !has_seen_animation;
        log::info!("main page ready (intro {})", if self.intro_pending { "plays" } else { "skipped" });
    }

    fn init_subpage(&mut self) {
        self.intro_pending = false;
        log::info!("subpage window ready");
    }
}
