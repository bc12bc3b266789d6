//! Synthetic analyser for the preview: a beating sine keyed to the playback
//! clock of the simulated media element.

use std::f64::consts::TAU;

use portal_player::host::{AnalyserGraph, AudioGraphFactory, MediaElement};
use portal_player::memory::MemoryMedia;
use portal_player::PlayerError;

/// Fill `buffer` with one window of byte time-domain data at `time` seconds.
pub fn demo_signal(time: f64, buffer: &mut [u8]) {
    let beat_phase = (time * 2.0 * TAU).sin();
    let envelope = ((beat_phase + 1.0) / 2.0).powf(4.0);
    let volume = 0.4 + envelope * 0.3;
    let len = buffer.len().max(1) as f64;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let t = i as f64 / len;
        let wave = (t * TAU * 4.0 + time * 10.0).sin();
        *sample = (128.0 + wave * 64.0 * volume).clamp(0.0, 255.0) as u8;
    }
}

pub struct DemoGraphs {
    media: MemoryMedia,
}

impl DemoGraphs {
    pub fn new(media: MemoryMedia) -> Self {
        Self { media }
    }
}

impl AudioGraphFactory for DemoGraphs {
    fn build(&mut self, fft_size: u32) -> Result<Box<dyn AnalyserGraph>, PlayerError> {
        log::info!("demo analyser with fft size {fft_size}");
        Ok(Box::new(DemoAnalyser {
            media: self.media.clone(),
            bins: (fft_size / 2) as usize,
            suspended: true,
        }))
    }
}

struct DemoAnalyser {
    media: MemoryMedia,
    bins: usize,
    suspended: bool,
}

impl AnalyserGraph for DemoAnalyser {
    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn resume(&mut self) {
        self.suspended = false;
    }

    fn bin_count(&self) -> usize {
        self.bins
    }

    // Paused or suspended reads as silence, the 128 midline.
    fn read_time_domain(&mut self, buffer: &mut [u8]) {
        if self.suspended || self.media.is_paused() {
            buffer.fill(128);
        } else {
            demo_signal(self.media.current_time(), buffer);
        }
    }
}
