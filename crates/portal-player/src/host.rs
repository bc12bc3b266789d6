//! Capabilities the player needs from whatever is hosting it.
//!
//! The browser bindings live in `web`; `memory` has in-process versions used
//! by the tests and the desktop preview.

use egui::{Color32, Pos2, Stroke};

use crate::error::PlayerError;

/// The single long-lived media element.
pub trait MediaElement {
    fn set_src(&mut self, src: &str);
    fn play(&mut self) -> Result<(), PlayerError>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, seconds: f64);
    /// True once the duration and seekable range of the current source are known.
    fn has_metadata(&self) -> bool;
}

/// An analysis node inserted between the media element and the speakers.
pub trait AnalyserGraph {
    fn is_suspended(&self) -> bool;
    fn resume(&mut self);
    /// Number of usable bins, half the transform size.
    fn bin_count(&self) -> usize;
    fn read_time_domain(&mut self, buffer: &mut [u8]);
}

/// Builds the analysis graph. Hosts only allow this after a user gesture.
pub trait AudioGraphFactory {
    fn build(&mut self, fft_size: u32) -> Result<Box<dyn AnalyserGraph>, PlayerError>;
}

/// Play/skip bar with the track caption.
pub trait ControlBar {
    fn set_track_info(&mut self, title: &str, artist: &str);
    fn set_playing(&mut self, playing: bool);
}

/// The attribution panel next to the control bar.
pub trait BioView {
    /// Replace the panel markup; `None` empties it.
    fn set_content(&mut self, markup: Option<&str>);
    fn set_visible(&mut self, visible: bool);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Color32,
}

/// 2D drawing target for the waveform.
pub trait WaveformSurface {
    fn clear(&mut self);
    fn gradient_line(&mut self, from: Pos2, to: Pos2, stops: &[GradientStop], width: f32);
    fn line(&mut self, from: Pos2, to: Pos2, stroke: Stroke);
    fn stroke_circle(&mut self, center: Pos2, radius: f32, stroke: Stroke);
    fn fill_circle(&mut self, center: Pos2, radius: f32, color: Color32);
}

/// The circular landmark the waveform wraps around.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Portal {
    pub center: Pos2,
    pub radius: f32,
}

pub trait PortalLocator {
    fn locate(&self) -> Option<Portal>;
}

impl PortalLocator for Option<Portal> {
    fn locate(&self) -> Option<Portal> {
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub i32);

/// Display-refresh paced callbacks.
pub trait FrameScheduler {
    fn request(&mut self) -> FrameHandle;
    fn cancel(&mut self, handle: FrameHandle);
}

/// Media lifecycle notifications delivered by the host, in host order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    Play,
    Pause,
    Ended,
    LoadedMetadata,
}
