use crate::error::PlayerError;
use crate::host::{ControlBar, MediaElement};
use crate::playlist::Track;
use crate::session::PlaybackSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loaded(usize),
    Playing(usize),
    Paused(usize),
}

/// Owns the media element and walks the shuffled playlist.
pub struct AudioEngine {
    media: Box<dyn MediaElement>,
    controls: Option<Box<dyn ControlBar>>,
    playlist: Vec<Track>,
    current: usize,
    state: PlaybackState,
}

impl AudioEngine {
    pub fn new(
        media: Box<dyn MediaElement>,
        controls: Option<Box<dyn ControlBar>>,
        playlist: Vec<Track>,
    ) -> Self {
        Self {
            media,
            controls,
            playlist,
            current: 0,
            state: PlaybackState::Idle,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn playlist(&self) -> &[Track] {
        &self.playlist
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.playlist.get(self.current)
    }

    pub fn is_paused(&self) -> bool {
        self.media.is_paused()
    }

    pub fn current_time(&self) -> f64 {
        self.media.current_time()
    }

    pub fn has_metadata(&self) -> bool {
        self.media.has_metadata()
    }

    /// Index after the current one, wrapping to the start.
    pub fn next_index(&self) -> usize {
        match self.playlist.len() {
            0 => 0,
            len => (self.current + 1) % len,
        }
    }

    /// Point the media element at `index` and caption it. Returns the track,
    /// or `None` when the index is outside the playlist.
    pub fn load_track(&mut self, index: usize) -> Option<Track> {
        let track = self.playlist.get(index)?.clone();
        self.current = index;
        self.media.set_src(&track.file);
        if let Some(controls) = self.controls.as_mut() {
            controls.set_track_info(&track.title, &track.artist);
        }
        self.state = PlaybackState::Loaded(index);
        log::info!("loaded \"{}\" by {}", track.title, track.artist);
        Some(track)
    }

    pub fn play(&mut self) -> Result<(), PlayerError> {
        if matches!(self.state, PlaybackState::Idle) {
            return Err(PlayerError::PlaybackRejected("no track loaded".into()));
        }
        self.media.play()?;
        self.reflect(true);
        Ok(())
    }

    pub fn pause(&mut self) {
        self.media.pause();
        self.reflect(false);
    }

    /// Mirror a play or pause reported by the host into state and controls.
    pub fn reflect(&mut self, playing: bool) {
        if matches!(self.state, PlaybackState::Idle) {
            return;
        }
        self.state = if playing {
            PlaybackState::Playing(self.current)
        } else {
            PlaybackState::Paused(self.current)
        };
        if let Some(controls) = self.controls.as_mut() {
            controls.set_playing(playing);
        }
    }

    pub fn seek(&mut self, seconds: f64) {
        self.media.set_current_time(seconds);
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            track_index: self.current,
            position: self.media.current_time(),
            is_playing: !self.media.is_paused(),
        }
    }
}
