use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, DomParser, Element, Event, PopStateEvent, Response, SupportedType, Window};

use super::dom::{self, DomBody, WebHistory, WindowInitializers};
use super::{has_seen_animation, listen, with_player, Shared};
use crate::config::{ElementIds, PlayerConfig};
use crate::error::NavError;
use crate::nav::{ClickDecision, IncomingPage, NavOutcome, NavRequest, NavigationInterceptor};
use crate::player::Player;

struct Navigation {
    window: Window,
    document: Document,
    ids: ElementIds,
    interceptor: RefCell<NavigationInterceptor>,
    player: Option<Shared<Player>>,
}

pub(super) fn install(
    window: &Window,
    document: &Document,
    config: &PlayerConfig,
    player: Option<Shared<Player>>,
) -> Result<(), JsValue> {
    let nav = Rc::new(Navigation {
        window: window.clone(),
        document: document.clone(),
        ids: config.elements.clone(),
        interceptor: RefCell::new(NavigationInterceptor::new(config.elements.clone())),
        player,
    });

    let pathname = window.location().pathname()?;
    nav.interceptor
        .borrow()
        .install(&mut WebHistory::new(window.clone()), &pathname, &document.title());

    {
        let nav = Rc::clone(&nav);
        listen(document, "click", move |event| on_click(&nav, &event))?;
    }
    {
        let nav = Rc::clone(&nav);
        listen(window, "popstate", move |event| {
            let state = event
                .dyn_ref::<PopStateEvent>()
                .and_then(|e| dom::history_state(&e.state()));
            let request = nav.interceptor.borrow_mut().on_pop_state(state);
            if let Some(request) = request {
                wasm_bindgen_futures::spawn_local(load(Rc::clone(&nav), request));
            }
        })?;
    }
    Ok(())
}

fn on_click(nav: &Rc<Navigation>, event: &Event) {
    let Some(link) = event
        .target()
        .and_then(|t| t.dyn_into::<Element>().ok())
        .and_then(|el| el.closest("a").ok().flatten())
    else {
        return;
    };
    let Some(href) = link.get_attribute("href") else {
        return;
    };
    let decision = nav
        .interceptor
        .borrow_mut()
        .on_click(&href, link.has_attribute("download"));
    if decision.is_claimed() {
        event.prevent_default();
    }
    if let ClickDecision::Fetch(request) = decision {
        wasm_bindgen_futures::spawn_local(load(Rc::clone(nav), request));
    }
}

/// Fetch and swap in `request`, then whatever queued up behind it.
async fn load(nav: Rc<Navigation>, mut request: NavRequest) {
    loop {
        log::debug!("fetching {}", request.url);
        let fetched = fetch_page(&nav.window, &request.url, &nav.ids.subpage_class).await;

        let Some(mut body) = DomBody::new(
            nav.window.clone(),
            nav.document.clone(),
            nav.ids.subpage_class.clone(),
        ) else {
            log::error!("document has no body");
            nav.interceptor.borrow_mut().abandon();
            return;
        };
        let outcome = nav.interceptor.borrow_mut().finish(
            &request,
            fetched,
            &mut body,
            &mut WebHistory::new(nav.window.clone()),
            &mut WindowInitializers::new(nav.window.clone()),
            has_seen_animation(&nav.window),
        );

        match outcome {
            NavOutcome::Fallback { url } => {
                if let Err(e) = nav.window.location().set_href(&url) {
                    log::error!("could not navigate to {url}: {e:?}");
                }
                return;
            }
            NavOutcome::Swapped { report, next } => {
                if report.canvas_visible == Some(true) {
                    dom::resize_canvas(&nav.window, &nav.document, &nav.ids.canvas);
                    if let Some(player) = &nav.player {
                        with_player(player, Player::restart_waveform);
                    }
                }
                match next {
                    Some(queued) => request = queued,
                    None => return,
                }
            }
        }
    }
}

async fn fetch_page(window: &Window, url: &str, subpage_class: &str) -> Result<IncomingPage<Element>, NavError> {
    let fetch_err = |e: JsValue| NavError::Fetch {
        url: url.to_string(),
        reason: format!("{e:?}"),
    };
    let response: Response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(fetch_err)?
        .dyn_into()
        .map_err(fetch_err)?;
    if !response.ok() {
        return Err(NavError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }
    let text = JsFuture::from(response.text().map_err(fetch_err)?)
        .await
        .map_err(fetch_err)?;
    let html = text.as_string().ok_or_else(|| NavError::Parse {
        url: url.to_string(),
        reason: "response body is not text".into(),
    })?;
    parse_page(url, &html, subpage_class)
}

fn parse_page(url: &str, html: &str, subpage_class: &str) -> Result<IncomingPage<Element>, NavError> {
    let parse_err = |e: JsValue| NavError::Parse {
        url: url.to_string(),
        reason: format!("{e:?}"),
    };
    let parsed = DomParser::new()
        .map_err(parse_err)?
        .parse_from_string(html, SupportedType::TextHtml)
        .map_err(parse_err)?;
    let body = parsed.body().ok_or_else(|| NavError::Parse {
        url: url.to_string(),
        reason: "no <body>".into(),
    })?;

    let children = body.children();
    let mut nodes = Vec::with_capacity(children.length() as usize);
    for i in 0..children.length() {
        if let Some(child) = children.item(i) {
            let copy = child
                .clone_node_with_deep(true)
                .map_err(parse_err)?
                .dyn_into::<Element>()
                .map_err(|node| parse_err(node.into()))?;
            nodes.push(copy);
        }
    }

    Ok(IncomingPage {
        title: parsed.title(),
        is_subpage: body.class_list().contains(subpage_class),
        nodes,
    })
}
