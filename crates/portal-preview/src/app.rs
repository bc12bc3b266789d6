use eframe::egui::{self, Color32, Stroke};
use portal_player::host::{MediaElement, MediaEvent, Portal, WaveformSurface};
use portal_player::memory::{ManualFrames, MemoryBio, MemoryControls, MemoryMedia, MemoryStore, VirtualBody};
use portal_player::nav::{ClickDecision, NavOutcome, NavRequest, NavigationInterceptor, PageBody, PageInitializers};
use portal_player::{PlaybackState, Player, PlayerConfig, PlayerParts};

use crate::demo::DemoGraphs;
use crate::site::{self, BackStack, PageScripts};

/// Every demo track "ends" after this long.
const TRACK_SECONDS: f64 = 45.0;

const GOLD: Color32 = Color32::from_rgb(212, 175, 55);

/// One page instance: what the browser throws away on a full reload.
struct Live {
    player: Player,
    media: MemoryMedia,
    frames: ManualFrames,
    bio: MemoryBio,
    controls: MemoryControls,
    loaded_src: String,
    since_save: f32,
}

impl Live {
    fn open(store: &MemoryStore, config: &PlayerConfig) -> Self {
        let media = MemoryMedia::default();
        let frames = ManualFrames::default();
        let bio = MemoryBio::default();
        let controls = MemoryControls::default();
        let parts = PlayerParts {
            store: Box::new(store.clone()),
            media: Box::new(media.clone()),
            graphs: Box::new(DemoGraphs::new(media.clone())),
            frames: Box::new(frames.clone()),
            controls: Some(Box::new(controls.clone())),
            bio: Some(Box::new(bio.clone())),
        };
        let player = Player::start(parts, config.clone(), &mut rand::rng());
        Self {
            player,
            media,
            frames,
            bio,
            controls,
            loaded_src: String::new(),
            since_save: 0.0,
        }
    }

    /// Move the simulated element forward by `dt` and deliver the events a
    /// browser would.
    fn tick(&mut self, dt: f32) {
        if self.media.src() != self.loaded_src {
            self.loaded_src = self.media.src();
            self.media.load_metadata();
            self.player.handle_media_event(MediaEvent::LoadedMetadata);
        }

        self.media.advance(f64::from(dt));
        if !self.media.is_paused() && self.media.current_time() >= TRACK_SECONDS {
            self.media.host_pause();
            self.player.handle_media_event(MediaEvent::Pause);
            self.player.handle_media_event(MediaEvent::Ended);
        }

        self.since_save += dt;
        let interval = self.player.config().persistence.tick_interval_ms as f32 / 1000.0;
        if self.since_save >= interval {
            self.since_save = 0.0;
            self.player.persist_tick();
        }
    }
}

pub struct PortalPreviewApp {
    config: PlayerConfig,
    store: MemoryStore,
    live: Live,
    body: VirtualBody,
    interceptor: NavigationInterceptor,
    history: BackStack,
    scripts: PageScripts,
    status: String,
}

impl PortalPreviewApp {
    pub fn new(config: PlayerConfig) -> Self {
        let store = MemoryStore::default();
        let live = Live::open(&store, &config);
        let interceptor = NavigationInterceptor::new(config.elements.clone());
        let mut history = BackStack::default();
        interceptor.install(&mut history, "/", "Portfolio");

        // first load is a plain page load, not a swap
        let mut body = VirtualBody::default();
        match site::fetch(site::HOME) {
            Ok(home) => {
                body = VirtualBody::from_nodes(home.nodes);
                body.set_title(&home.title);
            }
            Err(e) => log::error!("{e}"),
        }
        let mut scripts = PageScripts::default();
        scripts.init_main(live.player.has_seen_animation());

        Self {
            config,
            store,
            live,
            body,
            interceptor,
            history,
            scripts,
            status: String::new(),
        }
    }

    fn on_main_page(&self) -> bool {
        !self.body.is_subpage()
    }

    fn click(&mut self, href: &str) {
        match self.interceptor.on_click(href, false) {
            ClickDecision::Fetch(request) => self.navigate(request),
            ClickDecision::Deferred => self.status = format!("{href} queued"),
            ClickDecision::Ignore => self.status = format!("{href} left to the browser"),
        }
    }

    fn back(&mut self) {
        let state = self.history.back();
        if let Some(request) = self.interceptor.on_pop_state(state) {
            self.navigate(request);
        }
    }

    // Fetching is synchronous here, so a queued follow-up can only come from
    // the interceptor itself.
    fn navigate(&mut self, first: NavRequest) {
        let mut next = Some(first);
        while let Some(request) = next.take() {
            let fetched = site::fetch(&request.url);
            let outcome = self.interceptor.finish(
                &request,
                fetched,
                &mut self.body,
                &mut self.history,
                &mut self.scripts,
                self.live.player.has_seen_animation(),
            );
            match outcome {
                NavOutcome::Swapped { report, next: queued } => {
                    if report.canvas_visible == Some(true) {
                        self.live.player.restart_waveform();
                    }
                    self.status = format!("{} in place", request.url);
                    next = queued;
                }
                NavOutcome::Fallback { url } => {
                    self.status = format!("full load of {url}, player restored from the session");
                    self.reload();
                }
            }
        }
    }

    fn reload(&mut self) {
        self.live.player.before_unload();
        self.live = Live::open(&self.store, &self.config);
    }

    fn new_session(&mut self) {
        self.store.clear();
        self.live = Live::open(&self.store, &self.config);
        self.status = "new browsing session".to_string();
    }

    fn draw_nav(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            for (label, href) in site::LINKS {
                let current = self.history.current() == Some(href);
                if ui.selectable_label(current, label).clicked() {
                    self.click(href);
                }
            }
            ui.separator();
            if ui.add_enabled(self.history.can_go_back(), egui::Button::new("⬅ Back")).clicked() {
                self.back();
            }
            if ui.button("⟳ Reload").clicked() {
                self.reload();
                self.status = "reloaded".to_string();
            }
            if ui.button("New session").clicked() {
                self.new_session();
            }
            ui.separator();
            ui.label(&self.status);
        });
    }

    fn draw_audio_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let play_icon = if self.live.controls.is_playing() { "⏸" } else { "▶" };
            if ui.button(play_icon).clicked() {
                self.live.player.toggle();
            }
            if ui.button("⏭").clicked() {
                self.live.player.skip();
            }
            ui.separator();
            let (title, artist) = self.live.controls.track_info();
            ui.strong(title);
            ui.label(artist);
            ui.separator();
            ui.monospace(format!("{:5.1}s", self.live.player.current_time()));
            let state = match self.live.player.state() {
                PlaybackState::Idle => "idle".to_string(),
                PlaybackState::Loaded(i) => format!("loaded #{i}"),
                PlaybackState::Playing(i) => format!("playing #{i}"),
                PlaybackState::Paused(i) => format!("paused #{i}"),
            };
            ui.weak(state);
        });
    }

    fn draw_page(&mut self, ui: &mut egui::Ui) {
        ui.heading(self.body.title());
        let ids = &self.config.elements;
        for node in self.body.children() {
            if node.id.as_deref().is_some_and(|id| ids.is_preserved(id)) {
                continue;
            }
            let text = site::text_of(&node.html);
            if !text.is_empty() {
                ui.label(text);
            }
        }
        if self.scripts.intro_pending {
            ui.colored_label(GOLD, "(intro animation)");
        }

        if !self.on_main_page() {
            return;
        }
        let rect = ui.available_rect_before_wrap();
        let portal = Portal {
            center: rect.center(),
            radius: rect.width().min(rect.height()) * 0.18,
        };
        let mut painter = ui.painter_at(rect);
        painter.circle_filled(portal.center, portal.radius, Color32::from_gray(12));
        painter.circle_stroke(portal.center, portal.radius, Stroke::new(2.0, GOLD));

        // one display frame per repaint, if the player asked for one
        if self.live.frames.fire().is_some() {
            self.live
                .player
                .animation_frame(Some(&mut painter as &mut dyn WaveformSurface), &Some(portal));
        }
    }

    fn draw_bio(&mut self, ctx: &egui::Context) {
        if !self.live.bio.is_visible() {
            return;
        }
        let Some(markup) = self.live.bio.content() else {
            return;
        };
        let artist = self.live.controls.track_info().1;
        egui::Window::new(artist)
            .id(egui::Id::new("band_bio"))
            .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-12.0, -48.0))
            .collapsible(false)
            .resizable(false)
            .title_bar(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(site::text_of(&markup).replace('×', ""));
                    if ui.small_button("×").clicked() {
                        self.live.player.close_bio();
                    }
                });
            });
    }
}

impl eframe::App for PortalPreviewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let dt = ctx.input(|i| i.stable_dt);
        self.live.tick(dt);

        egui::TopBottomPanel::top("site_nav").show(ctx, |ui| self.draw_nav(ui));
        egui::TopBottomPanel::bottom("audio_bar").show(ctx, |ui| self.draw_audio_bar(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.draw_page(ui));
        self.draw_bio(ctx);

        ctx.request_repaint();
    }
}
