use egui::Color32;
use serde::Deserialize;

/// Everything the player can be tuned with. Every field has a default, so a
/// partial JSON document only overrides what it names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub waveform: WaveformConfig,
    pub persistence: PersistenceConfig,
    pub elements: ElementIds,
}

impl PlayerConfig {
    /// Parse overrides and pull unusable waveform geometry back into range.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let mut config: Self = serde_json::from_str(text)?;
        config.waveform.sanitize();
        Ok(config)
    }
}

// Circular waveform geometry and colours
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    pub bar_count: usize,
    pub fft_size: u32,
    pub min_bar_height: f32,
    pub max_bar_height: f32,
    /// Gap between the portal edge and the inner end of every bar.
    pub portal_offset: f32,
    /// How much the oldest slot is attenuated (0 = no fade, 1 = invisible).
    pub age_fade: f32,
    /// Samples pushed onto the history per frame.
    pub history_push: usize,
    pub bar_width: f32,
    pub bar_color: [u8; 3],
    pub highlight_color: [u8; 3],
    pub playhead_color: [u8; 3],
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            bar_count: 128,
            fft_size: 256,
            min_bar_height: 5.0,
            max_bar_height: 100.0,
            portal_offset: 20.0,
            age_fade: 0.6,
            history_push: 2,
            bar_width: 3.0,
            bar_color: [212, 175, 55],
            highlight_color: [255, 235, 180],
            playhead_color: [255, 255, 255],
        }
    }
}

/// Transform sizes an `AnalyserNode` accepts.
const FFT_SIZES: std::ops::RangeInclusive<u32> = 32..=32768;

impl WaveformConfig {
    /// At least one bar, and an FFT size that is a power of two the analyser
    /// accepts (rounded up, then clamped).
    pub fn sanitize(&mut self) {
        if self.bar_count == 0 {
            log::warn!("bar_count 0 is unusable, drawing 1 bar");
            self.bar_count = 1;
        }
        let fft_size = self
            .fft_size
            .clamp(*FFT_SIZES.start(), *FFT_SIZES.end())
            .next_power_of_two();
        if fft_size != self.fft_size {
            log::warn!("fft_size {} is unusable, using {fft_size}", self.fft_size);
            self.fft_size = fft_size;
        }
    }

    pub fn bar_rgba(&self, alpha: f32) -> Color32 {
        with_alpha(self.bar_color, alpha)
    }

    pub fn highlight_rgba(&self, alpha: f32) -> Color32 {
        with_alpha(self.highlight_color, alpha)
    }

    pub fn playhead_rgba(&self, alpha: f32) -> Color32 {
        with_alpha(self.playhead_color, alpha)
    }
}

fn with_alpha([r, g, b]: [u8; 3], alpha: f32) -> Color32 {
    let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgba_unmultiplied(r, g, b, a)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub tick_interval_ms: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
        }
    }
}

/// Stable identifiers shared by every page of the site.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ElementIds {
    pub audio: String,
    pub audio_bar: String,
    pub canvas: String,
    pub play_button: String,
    pub skip_button: String,
    pub track_title: String,
    pub track_artist: String,
    pub bio: String,
    pub portal_selector: String,
    pub subpage_class: String,
}

impl Default for ElementIds {
    fn default() -> Self {
        Self {
            audio: "backgroundAudio".into(),
            audio_bar: "audioBar".into(),
            canvas: "waveformCanvas".into(),
            play_button: "audioControl".into(),
            skip_button: "skipControl".into(),
            track_title: "trackTitle".into(),
            track_artist: "trackArtist".into(),
            bio: "bandBio".into(),
            portal_selector: ".portal".into(),
            subpage_class: "subpage".into(),
        }
    }
}

impl ElementIds {
    /// Ids of the top-level elements that survive a page swap by identity.
    pub fn preserved(&self) -> [&str; 3] {
        [&self.audio, &self.audio_bar, &self.canvas]
    }

    pub fn is_preserved(&self, id: &str) -> bool {
        self.preserved().contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_other_defaults() {
        let cfg = PlayerConfig::from_json(r#"{ "waveform": { "bar_count": 64 } }"#).unwrap();
        assert_eq!(cfg.waveform.bar_count, 64);
        assert_eq!(cfg.waveform.fft_size, 256);
        assert_eq!(cfg.persistence.tick_interval_ms, 1000);
        assert_eq!(cfg.elements.audio, "backgroundAudio");
    }

    #[test]
    fn unusable_waveform_geometry_is_corrected() {
        let cfg = PlayerConfig::from_json(r#"{ "waveform": { "bar_count": 0, "fft_size": 300 } }"#).unwrap();
        assert_eq!(cfg.waveform.bar_count, 1);
        assert_eq!(cfg.waveform.fft_size, 512);

        let tiny = PlayerConfig::from_json(r#"{ "waveform": { "fft_size": 1 } }"#).unwrap();
        assert_eq!(tiny.waveform.fft_size, 32);
        let huge = PlayerConfig::from_json(r#"{ "waveform": { "fft_size": 100000 } }"#).unwrap();
        assert_eq!(huge.waveform.fft_size, 32768);
    }

    #[test]
    fn one_bar_has_finite_geometry() {
        use egui::Pos2;

        use crate::host::Portal;
        use crate::waveform::WaveformRenderer;

        let cfg = PlayerConfig::from_json(r#"{ "waveform": { "bar_count": 0 } }"#).unwrap();
        let renderer = WaveformRenderer::new(cfg.waveform);
        assert!(renderer.age_fade(0).is_finite());
        let layout = renderer.layout(Portal {
            center: Pos2::new(100.0, 100.0),
            radius: 40.0,
        });
        assert_eq!(layout.bars.len(), 1);
        assert!(layout.bars[0].outer.x.is_finite());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(PlayerConfig::from_json("{ waveform: ").is_err());
    }

    #[test]
    fn preserved_ids_cover_audio_bar_and_canvas() {
        let ids = ElementIds::default();
        assert!(ids.is_preserved("backgroundAudio"));
        assert!(ids.is_preserved("audioBar"));
        assert!(ids.is_preserved("waveformCanvas"));
        assert!(!ids.is_preserved("sideNav"));
    }

    #[test]
    fn colours_carry_alpha() {
        let cfg = WaveformConfig::default();
        let c = cfg.bar_rgba(1.0);
        assert_eq!(c.to_srgba_unmultiplied(), [212, 175, 55, 255]);
        assert_eq!(cfg.playhead_rgba(0.0).a(), 0);
    }
}
