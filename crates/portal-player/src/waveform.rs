use std::collections::VecDeque;
use std::f32::consts::{FRAC_PI_2, TAU};

use egui::{Pos2, Stroke};

use crate::analyzer::sample_bars;
use crate::config::WaveformConfig;
use crate::host::{FrameHandle, FrameScheduler, GradientStop, Portal, WaveformSurface};

/// Zero angle of the circle, 12 o'clock in screen coordinates.
pub const PLAYHEAD_ANGLE: f32 = -FRAC_PI_2;

/// Rolling amplitude history, newest at the front.
#[derive(Debug, Clone)]
pub struct WaveformHistory {
    bars: VecDeque<f32>,
    capacity: usize,
}

impl WaveformHistory {
    pub fn new(capacity: usize) -> Self {
        let mut history = Self {
            bars: VecDeque::with_capacity(capacity + 2),
            capacity,
        };
        history.reset();
        history
    }

    /// Back to a full ring of silence.
    pub fn reset(&mut self) {
        self.bars.clear();
        self.bars.resize(self.capacity, 0.0);
    }

    /// Push `newest` onto the front, keeping its order, then trim or pad the
    /// back so the length stays at capacity.
    pub fn push_front(&mut self, newest: &[f32]) {
        for &value in newest.iter().rev() {
            self.bars.push_front(value);
        }
        self.bars.truncate(self.capacity);
        self.bars.resize(self.capacity, 0.0);
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, slot: usize) -> f32 {
        self.bars.get(slot).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.bars.iter().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarGeometry {
    pub inner: Pos2,
    pub outer: Pos2,
    pub amplitude: f32,
    pub age_fade: f32,
    pub height: f32,
}

/// Everything one frame draws, in canvas coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLayout {
    pub center: Pos2,
    pub base_radius: f32,
    pub bars: Vec<BarGeometry>,
    pub playhead_from: Pos2,
    pub playhead_to: Pos2,
    pub playhead_dot: Pos2,
}

fn polar(center: Pos2, angle: f32, radius: f32) -> Pos2 {
    Pos2::new(center.x + angle.cos() * radius, center.y + angle.sin() * radius)
}

pub struct WaveformRenderer {
    config: WaveformConfig,
    history: WaveformHistory,
}

impl WaveformRenderer {
    pub fn new(config: WaveformConfig) -> Self {
        let history = WaveformHistory::new(config.bar_count);
        Self { config, history }
    }

    pub fn history(&self) -> &WaveformHistory {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.reset();
    }

    /// Fold one analyser read into the history.
    pub fn push_samples(&mut self, buffer: &[u8]) {
        let bars = sample_bars(buffer, self.config.bar_count);
        let take = self.config.history_push.min(bars.len());
        self.history.push_front(&bars[..take]);
    }

    /// Fade applied to a slot; 1 at the playhead, shrinking with age.
    pub fn age_fade(&self, slot: usize) -> f32 {
        1.0 - (slot as f32 / self.config.bar_count as f32) * self.config.age_fade
    }

    pub fn layout(&self, portal: Portal) -> FrameLayout {
        let cfg = &self.config;
        let center = portal.center;
        let base_radius = portal.radius + cfg.portal_offset;
        let count = cfg.bar_count;

        let bars = (0..count)
            .map(|slot| {
                let angle = PLAYHEAD_ANGLE + (slot as f32 / count as f32) * TAU;
                let amplitude = self.history.get(slot);
                let age_fade = self.age_fade(slot);
                let height = cfg.min_bar_height + amplitude * cfg.max_bar_height * age_fade;
                BarGeometry {
                    inner: polar(center, angle, base_radius),
                    outer: polar(center, angle, base_radius + height),
                    amplitude,
                    age_fade,
                    height,
                }
            })
            .collect();

        let reach = base_radius + cfg.min_bar_height + self.history.get(0) * cfg.max_bar_height + 10.0;
        FrameLayout {
            center,
            base_radius,
            bars,
            playhead_from: polar(center, PLAYHEAD_ANGLE, base_radius - 8.0),
            playhead_to: polar(center, PLAYHEAD_ANGLE, reach),
            playhead_dot: polar(center, PLAYHEAD_ANGLE, base_radius),
        }
    }

    /// Clear and redraw. Without a portal the canvas is just left clear.
    pub fn draw(&self, surface: &mut dyn WaveformSurface, portal: Option<Portal>) {
        surface.clear();
        let Some(portal) = portal else {
            return;
        };
        let cfg = &self.config;
        let layout = self.layout(portal);

        for bar in &layout.bars {
            let alpha = (0.7 + bar.amplitude * 0.3) * bar.age_fade;
            let stops = [
                GradientStop {
                    offset: 0.0,
                    color: cfg.bar_rgba(alpha),
                },
                GradientStop {
                    offset: 0.5,
                    color: cfg.highlight_rgba(alpha),
                },
                GradientStop {
                    offset: 1.0,
                    color: cfg.bar_rgba(alpha * 0.5),
                },
            ];
            surface.gradient_line(bar.inner, bar.outer, &stops, cfg.bar_width);
        }

        surface.stroke_circle(
            layout.center,
            layout.base_radius - 2.0,
            Stroke::new(1.5, cfg.bar_rgba(0.25)),
        );
        surface.line(
            layout.playhead_from,
            layout.playhead_to,
            Stroke::new(2.0, cfg.playhead_rgba(0.8)),
        );
        surface.fill_circle(layout.playhead_dot, 4.0, cfg.playhead_rgba(0.9));
    }
}

/// Self-rescheduling frame task with exactly one outstanding request.
pub struct FrameLoop {
    scheduler: Box<dyn FrameScheduler>,
    pending: Option<FrameHandle>,
}

impl FrameLoop {
    pub fn new(scheduler: Box<dyn FrameScheduler>) -> Self {
        Self {
            scheduler,
            pending: None,
        }
    }

    /// Cancel whatever is queued and queue a fresh frame.
    pub fn restart(&mut self) {
        self.stop();
        self.pending = Some(self.scheduler.request());
    }

    /// Called from inside a frame callback: the fired request is gone, queue the next.
    pub fn next_frame(&mut self) {
        self.pending = Some(self.scheduler.request());
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel(handle);
        }
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }
}
