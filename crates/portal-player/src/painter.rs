use egui::{Color32, Painter, Pos2, Stroke};

use crate::host::{GradientStop, WaveformSurface};

/// Average two premultiplied colours.
fn blend(a: Color32, b: Color32) -> Color32 {
    let mix = |x: u8, y: u8| ((u16::from(x) + u16::from(y)) / 2) as u8;
    Color32::from_rgba_premultiplied(mix(a.r(), b.r()), mix(a.g(), b.g()), mix(a.b(), b.b()), mix(a.a(), b.a()))
}

// egui repaints every frame from scratch, so `clear` has nothing to do. Gradients
// are approximated with one flat segment per pair of adjacent stops.
impl WaveformSurface for Painter {
    fn clear(&mut self) {}

    fn gradient_line(&mut self, from: Pos2, to: Pos2, stops: &[GradientStop], width: f32) {
        match stops {
            [] => {}
            [only] => {
                self.line_segment([from, to], Stroke::new(width, only.color));
            }
            _ => {
                for pair in stops.windows(2) {
                    let a = from.lerp(to, pair[0].offset);
                    let b = from.lerp(to, pair[1].offset);
                    self.line_segment([a, b], Stroke::new(width, blend(pair[0].color, pair[1].color)));
                }
            }
        }
    }

    fn line(&mut self, from: Pos2, to: Pos2, stroke: Stroke) {
        self.line_segment([from, to], stroke);
    }

    fn stroke_circle(&mut self, center: Pos2, radius: f32, stroke: Stroke) {
        self.circle_stroke(center, radius, stroke);
    }

    fn fill_circle(&mut self, center: Pos2, radius: f32, color: Color32) {
        self.circle_filled(center, radius, color);
    }
}

#[cfg(test)]
mod tests {
    use egui::{Context, LayerId, RawInput};

    use super::*;
    use crate::config::WaveformConfig;
    use crate::host::Portal;
    use crate::waveform::WaveformRenderer;

    #[test]
    fn blend_is_the_midpoint() {
        let c = blend(
            Color32::from_rgba_premultiplied(0, 100, 200, 255),
            Color32::from_rgba_premultiplied(100, 200, 0, 55),
        );
        assert_eq!((c.r(), c.g(), c.b(), c.a()), (50, 150, 100, 155));
    }

    #[test]
    fn renderer_paints_into_an_egui_layer() {
        let ctx = Context::default();
        let renderer = WaveformRenderer::new(WaveformConfig::default());
        let output = ctx.run(RawInput::default(), |ctx| {
            let mut painter = ctx.layer_painter(LayerId::background());
            renderer.draw(
                &mut painter,
                Some(Portal {
                    center: Pos2::new(200.0, 200.0),
                    radius: 60.0,
                }),
            );
        });
        // two segments per bar, then circle, tick and dot
        assert!(output.shapes.len() >= 128 * 2 + 3);
    }
}
