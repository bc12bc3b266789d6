use rand::Rng;

use crate::analyzer::SignalAnalyzer;
use crate::bio::{BioPanel, BioVisibility};
use crate::config::PlayerConfig;
use crate::engine::{AudioEngine, PlaybackState};
use crate::host::{
    AudioGraphFactory, BioView, ControlBar, FrameScheduler, MediaElement, MediaEvent, PortalLocator,
    WaveformSurface,
};
use crate::playlist::{catalog, Track};
use crate::session::{PlaybackSnapshot, SessionState, SessionStore};
use crate::waveform::{FrameLoop, WaveformHistory, WaveformRenderer};

/// Host capabilities handed to [`Player::start`]. Optional pieces are the
/// page elements a given page may not have.
pub struct PlayerParts {
    pub store: Box<dyn SessionStore>,
    pub media: Box<dyn MediaElement>,
    pub graphs: Box<dyn AudioGraphFactory>,
    pub frames: Box<dyn FrameScheduler>,
    pub controls: Option<Box<dyn ControlBar>>,
    pub bio: Option<Box<dyn BioView>>,
}

/// The whole audio subsystem for one page instance. Built on page entry, kept
/// across in-place navigation, dropped on a full unload.
pub struct Player {
    config: PlayerConfig,
    session: SessionState<Box<dyn SessionStore>>,
    engine: AudioEngine,
    graphs: Box<dyn AudioGraphFactory>,
    analyzer: Option<SignalAnalyzer>,
    waveform: WaveformRenderer,
    frames: FrameLoop,
    bio: BioPanel,
    pending_seek: Option<f64>,
}

impl Player {
    /// Restore or create the session and load the track it points at.
    /// Playback never resumes on its own; that needs a user gesture.
    pub fn start<R: Rng + ?Sized>(parts: PlayerParts, config: PlayerConfig, rng: &mut R) -> Self {
        let PlayerParts {
            store,
            media,
            graphs,
            frames,
            controls,
            bio,
        } = parts;

        let mut session = SessionState::new(store);
        let playlist = session.shuffled_playlist(&catalog(), rng);
        let saved = session.load_for(playlist.len());

        let mut player = Self {
            waveform: WaveformRenderer::new(config.waveform.clone()),
            config,
            session,
            engine: AudioEngine::new(media, controls, playlist),
            graphs,
            analyzer: None,
            frames: FrameLoop::new(frames),
            bio: BioPanel::new(bio),
            pending_seek: None,
        };

        player.load_track(saved.track_index, false);

        if saved.position > 0.0 {
            player.pending_seek = Some(saved.position);
            if player.engine.has_metadata() {
                player.apply_pending_seek();
            }
        }
        if saved.is_playing {
            player.bio.mark_shown();
            player.bio.update(true);
        }
        log::info!(
            "player ready on track {} at {:.1}s",
            saved.track_index,
            saved.position
        );
        player
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn state(&self) -> PlaybackState {
        self.engine.state()
    }

    pub fn playlist(&self) -> &[Track] {
        self.engine.playlist()
    }

    pub fn current_index(&self) -> usize {
        self.engine.current_index()
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.engine.current_track()
    }

    pub fn current_time(&self) -> f64 {
        self.engine.current_time()
    }

    pub fn history(&self) -> &WaveformHistory {
        self.waveform.history()
    }

    pub fn bio_visible(&self) -> bool {
        self.bio.is_visible()
    }

    pub fn bio_flags(&self) -> BioVisibility {
        self.bio.flags()
    }

    pub fn has_graph(&self) -> bool {
        self.analyzer.is_some()
    }

    pub fn is_animating(&self) -> bool {
        self.frames.is_running()
    }

    pub fn has_seen_animation(&self) -> bool {
        self.session.has_seen_animation()
    }

    /// Switch to `index`, clearing per-track visual state and saving the
    /// fresh position.
    pub fn load_track(&mut self, index: usize, announce_bio: bool) {
        self.waveform.reset();
        self.bio.reset();
        let Some(track) = self.engine.load_track(index) else {
            log::warn!("no track at index {index}");
            return;
        };
        let announce = announce_bio && !self.engine.is_paused();
        self.bio.set_artist(&track.artist, announce);
        self.pending_seek = None;
        self.persist(PlaybackSnapshot {
            track_index: index,
            position: 0.0,
            is_playing: false,
        });
    }

    /// Play/pause button.
    pub fn toggle(&mut self) {
        self.ensure_graph();
        if self.engine.is_paused() {
            match self.engine.play() {
                Ok(()) => self.on_playing(),
                Err(e) => log::warn!("{e}"),
            }
        } else {
            self.engine.pause();
            self.persist_now();
        }
    }

    /// Skip button: next track, always playing afterwards.
    pub fn skip(&mut self) {
        self.ensure_graph();
        self.advance();
    }

    pub fn close_bio(&mut self) {
        self.bio.close();
    }

    pub fn handle_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::Play => self.on_playing(),
            MediaEvent::Pause => {
                self.engine.reflect(false);
                self.persist_now();
            }
            MediaEvent::Ended => {
                log::debug!("track ended, advancing");
                self.advance();
            }
            MediaEvent::LoadedMetadata => self.apply_pending_seek(),
        }
    }

    /// Periodic save while playing.
    pub fn persist_tick(&mut self) {
        if !self.engine.is_paused() {
            self.persist_now();
        }
    }

    pub fn before_unload(&mut self) {
        self.persist_now();
    }

    /// (Re)start the frame loop if there is a graph to draw from.
    pub fn restart_waveform(&mut self) {
        if self.analyzer.is_some() {
            self.frames.restart();
        }
    }

    /// One display frame. Returns false once there is nothing left to animate,
    /// in which case no further frame has been requested.
    pub fn animation_frame(
        &mut self,
        surface: Option<&mut dyn WaveformSurface>,
        portal: &dyn PortalLocator,
    ) -> bool {
        let Some(analyzer) = self.analyzer.as_mut() else {
            self.frames.stop();
            return false;
        };
        self.frames.next_frame();
        let buffer = analyzer.read_amplitudes();
        self.waveform.push_samples(buffer);
        if let Some(surface) = surface {
            self.waveform.draw(surface, portal.locate());
        }
        true
    }

    fn advance(&mut self) {
        if let Some(analyzer) = self.analyzer.as_mut() {
            analyzer.resume_if_suspended();
        }
        let next = self.engine.next_index();
        self.load_track(next, true);
        match self.engine.play() {
            Ok(()) => self.on_playing(),
            Err(e) => log::warn!("{e}"),
        }
        self.bio.update(true);
        self.restart_waveform();
    }

    fn on_playing(&mut self) {
        self.engine.reflect(true);
        self.bio.update(true);
        self.persist_now();
    }

    // Graphs can only be built after a user gesture, so this runs lazily.
    fn ensure_graph(&mut self) {
        if self.analyzer.is_none() {
            match SignalAnalyzer::attach(self.graphs.as_mut(), self.config.waveform.fft_size) {
                Ok(analyzer) => self.analyzer = Some(analyzer),
                Err(e) => log::error!("waveform disabled: {e}"),
            }
        }
        if let Some(analyzer) = self.analyzer.as_mut() {
            analyzer.resume_if_suspended();
        }
        self.restart_waveform();
    }

    fn apply_pending_seek(&mut self) {
        if let Some(position) = self.pending_seek.take() {
            log::debug!("restoring position {position:.1}s");
            self.engine.seek(position);
        }
    }

    fn persist_now(&mut self) {
        let snapshot = self.engine.snapshot();
        self.persist(snapshot);
    }

    fn persist(&mut self, snapshot: PlaybackSnapshot) {
        if let Err(e) = self.session.save(snapshot) {
            log::warn!("{e}");
        }
    }
}
