//! Browser entry point: wires the player and the navigation interceptor to
//! the live document.

mod dom;
mod navigation;

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, DocumentReadyState, Element, Event, HtmlAudioElement, Window};

use crate::config::PlayerConfig;
use crate::host::{MediaEvent, WaveformSurface};
use crate::memory::MemoryStore;
use crate::nav::PageInitializers;
use crate::player::{Player, PlayerParts};
use crate::session::{SessionState, SessionStore};

type Shared<T> = Rc<RefCell<T>>;

const CONFIG_ATTRIBUTE: &str = "data-player-config";

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();

    let window = web_sys::window().ok_or("No window")?;
    let document = window.document().ok_or("No document")?;

    if document.ready_state() == DocumentReadyState::Loading {
        let target = document.clone();
        let ready = Closure::once(move || {
            if let Err(e) = boot(&window, &document) {
                log::error!("player failed to start: {e:?}");
            }
        });
        target.add_event_listener_with_callback("DOMContentLoaded", ready.as_ref().unchecked_ref())?;
        ready.forget();
        Ok(())
    } else {
        boot(&window, &document)
    }
}

fn boot(window: &Window, document: &Document) -> Result<(), JsValue> {
    let config = read_config(document);
    let player = init_player(window, document, &config)?;
    navigation::install(window, document, &config, player)?;
    init_page(window, document, &config);
    Ok(())
}

fn read_config(document: &Document) -> PlayerConfig {
    let Some(raw) = document
        .body()
        .and_then(|body| body.get_attribute(CONFIG_ATTRIBUTE))
    else {
        return PlayerConfig::default();
    };
    PlayerConfig::from_json(&raw).unwrap_or_else(|e| {
        log::warn!("ignoring {CONFIG_ATTRIBUTE}: {e}");
        PlayerConfig::default()
    })
}

fn session_store(window: &Window) -> Box<dyn SessionStore> {
    match dom::WebStore::session(window) {
        Some(store) => Box::new(store),
        None => {
            log::warn!("sessionStorage unavailable, state will not survive a reload");
            Box::new(MemoryStore::default())
        }
    }
}

fn has_seen_animation(window: &Window) -> bool {
    SessionState::new(session_store(window)).has_seen_animation()
}

/// First-load counterpart of the re-initialization done after each swap.
fn init_page(window: &Window, document: &Document, config: &PlayerConfig) {
    let subpage = document
        .body()
        .is_some_and(|body| body.class_list().contains(&config.elements.subpage_class));
    let mut inits = dom::WindowInitializers::new(window.clone());
    if subpage {
        inits.init_subpage();
    } else {
        inits.init_main(has_seen_animation(window));
    }
}

fn init_player(
    window: &Window,
    document: &Document,
    config: &PlayerConfig,
) -> Result<Option<Shared<Player>>, JsValue> {
    let ids = &config.elements;
    let Some(audio) = document
        .get_element_by_id(&ids.audio)
        .and_then(|el| el.dyn_into::<HtmlAudioElement>().ok())
    else {
        log::info!("no #{} on this page, audio disabled", ids.audio);
        return Ok(None);
    };

    let frames = dom::AnimationFrames::new(window.clone());
    let parts = PlayerParts {
        store: session_store(window),
        media: Box::new(dom::WebMedia::new(audio.clone())),
        graphs: Box::new(dom::WebGraphs::new(audio.clone())),
        frames: Box::new(frames.clone()),
        controls: Some(Box::new(dom::DomControls::new(document.clone(), ids.clone()))),
        bio: Some(Box::new(dom::DomBio::new(document.clone(), ids.bio.clone()))),
    };
    let player = Rc::new(RefCell::new(Player::start(parts, config.clone(), &mut rand::rng())));

    frames.set_callback(frame_callback(&player, document, config));
    dom::resize_canvas(window, document, &ids.canvas);

    for (name, event) in [
        ("play", MediaEvent::Play),
        ("pause", MediaEvent::Pause),
        ("ended", MediaEvent::Ended),
        ("loadedmetadata", MediaEvent::LoadedMetadata),
    ] {
        let player = Rc::clone(&player);
        listen(&audio, name, move |_| {
            with_player(&player, |p| p.handle_media_event(event));
        })?;
    }

    if let Some(button) = document.get_element_by_id(&ids.play_button) {
        let player = Rc::clone(&player);
        listen(&button, "click", move |event| {
            event.stop_propagation();
            with_player(&player, Player::toggle);
        })?;
    }
    if let Some(button) = document.get_element_by_id(&ids.skip_button) {
        let player = Rc::clone(&player);
        listen(&button, "click", move |event| {
            event.stop_propagation();
            with_player(&player, Player::skip);
        })?;
    }

    // The close button is recreated with every bio, so listen on the document.
    {
        let player = Rc::clone(&player);
        listen(document, "click", move |event| {
            let closed = event
                .target()
                .and_then(|t| t.dyn_into::<Element>().ok())
                .and_then(|el| el.closest(".band-bio-close").ok().flatten());
            if closed.is_some() {
                event.stop_propagation();
                with_player(&player, Player::close_bio);
            }
        })?;
    }

    {
        let player = Rc::clone(&player);
        let tick = Closure::<dyn FnMut()>::new(move || with_player(&player, Player::persist_tick));
        let ms = i32::try_from(config.persistence.tick_interval_ms).unwrap_or(i32::MAX);
        window.set_interval_with_callback_and_timeout_and_arguments_0(tick.as_ref().unchecked_ref(), ms)?;
        tick.forget();
    }
    {
        let player = Rc::clone(&player);
        listen(window, "beforeunload", move |_| {
            with_player(&player, Player::before_unload);
        })?;
    }
    {
        let (resize_window, resize_document) = (window.clone(), document.clone());
        let canvas_id = ids.canvas.clone();
        listen(window, "resize", move |_| {
            dom::resize_canvas(&resize_window, &resize_document, &canvas_id);
        })?;
    }

    Ok(Some(player))
}

fn frame_callback(player: &Shared<Player>, document: &Document, config: &PlayerConfig) -> Closure<dyn FnMut(f64)> {
    let player = Rc::clone(player);
    let document = document.clone();
    let canvas_id = config.elements.canvas.clone();
    let portal = dom::DomPortal::new(document.clone(), config.elements.portal_selector.clone());
    Closure::<dyn FnMut(f64)>::new(move |_timestamp: f64| {
        let mut surface = dom::CanvasSurface::find(&document, &canvas_id);
        with_player(&player, |p| {
            p.animation_frame(surface.as_mut().map(|s| s as &mut dyn WaveformSurface), &portal);
        });
    })
}

// A re-entrant callback is dropped instead of panicking on the borrow.
fn with_player(player: &Shared<Player>, f: impl FnOnce(&mut Player)) {
    match player.try_borrow_mut() {
        Ok(mut p) => f(&mut p),
        Err(_) => log::warn!("player busy, callback dropped"),
    }
}

fn listen(
    target: &web_sys::EventTarget,
    name: &str,
    handler: impl FnMut(Event) + 'static,
) -> Result<(), JsValue> {
    let closure = Closure::<dyn FnMut(Event)>::new(handler);
    target.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}
