use crate::aggregate::compute_segment_scale;
use crate::format::{money, percent};
use crate::model::{Palette, Percentages, Totals};

use super::flow::{Align, FlowContext, TextStyle};

const BAR_H: f32 = 14.0;
const BAR_RADIUS: f32 = 7.0;
const TITLE_GAP: f32 = 4.0;
const LEGEND_GAP: f32 = 6.0;
const SWATCH: f32 = 8.0;
const OUTLINE: [u8; 3] = [0x9C, 0xA3, 0xAF];

/// Pixel widths of the remisiones, facturas and restante segments inside a
/// bar of `width`. Their sum never exceeds `width`.
pub fn segment_widths(p: &Percentages, width: f32) -> [f32; 3] {
    let scale = compute_segment_scale(p);
    [p.rem, p.fac, p.rest].map(|v| (width as f64 * v.max(0.0) / scale) as f32)
}

pub struct ConsumptionBar<'a> {
    pub title: Option<&'a str>,
    pub totals: &'a Totals,
    pub percentages: &'a Percentages,
    pub palette: &'a Palette,
}

impl ConsumptionBar<'_> {
    fn legend(&self) -> Vec<(String, [u8; 3])> {
        let p = self.percentages;
        let t = self.totals;
        let mut lines = vec![
            (
                format!("Remisiones: {} ({})", percent(p.rem), money(t.total_rem)),
                self.palette.remisiones,
            ),
            (
                format!("Facturas: {} ({})", percent(p.fac), money(t.total_fac)),
                self.palette.facturas,
            ),
            (
                format!("Restante: {} ({})", percent(p.rest), money(t.restante)),
                self.palette.restante,
            ),
        ];
        if let Some(overage) = p.overage.filter(|o| *o > 0.0) {
            lines.push((
                format!("Sin monto autorizado; consumo registrado: {}", money(overage)),
                OUTLINE,
            ));
        }
        lines
    }

    pub fn height(&self, flow: &FlowContext, width: f32) -> f32 {
        let title_h = self
            .title
            .map(|t| flow.measure_text(t, width, TextStyle::bold(10.0)) + TITLE_GAP)
            .unwrap_or(0.0);
        let legend_h: f32 = self
            .legend()
            .iter()
            .map(|(line, _)| flow.measure_text(line, width - SWATCH - 4.0, TextStyle::regular(8.5)))
            .sum();
        title_h + BAR_H + LEGEND_GAP + legend_h
    }
}

/// Rounded bar split into three proportional segments, then one legend line
/// per segment. Zero-width segments are not painted.
pub fn render_consumption_bar(flow: &mut FlowContext, bar: &ConsumptionBar<'_>, x: f32, width: f32) {
    let h = bar.height(flow, width);
    flow.ensure_space(h);

    let legend = bar.legend();
    let canvas = flow.canvas();
    let mut top = canvas.cursor();

    if let Some(title) = bar.title {
        top -= canvas.text_block(x, top, width, title, TextStyle::bold(10.0), Align::Left);
        top -= TITLE_GAP;
    }

    let bar_bottom = top - BAR_H;
    let colors = [bar.palette.remisiones, bar.palette.facturas, bar.palette.restante];
    let widths = segment_widths(bar.percentages, width);

    canvas.content().save_state();
    canvas.rounded_rect_path(x, bar_bottom, width, BAR_H, BAR_RADIUS);
    canvas.content().clip_nonzero();
    canvas.content().end_path();
    canvas.fill_rect(x, bar_bottom, width, BAR_H, [0xF3, 0xF4, 0xF6]);
    let mut seg_x = x;
    for (w, color) in widths.into_iter().zip(colors) {
        if w <= 0.0 {
            continue;
        }
        canvas.fill_rect(seg_x, bar_bottom, w, BAR_H, color);
        seg_x += w;
    }
    canvas.content().restore_state();
    canvas.stroke_rounded_rect(x, bar_bottom, width, BAR_H, BAR_RADIUS, OUTLINE, 0.5);

    top = bar_bottom - LEGEND_GAP;
    let style = TextStyle::regular(8.5);
    for (line, color) in &legend {
        let line_h = canvas.line_height(style);
        canvas.fill_rect(x, top - (line_h + SWATCH) / 2.0, SWATCH, SWATCH, *color);
        top -= canvas.text_block(
            x + SWATCH + 4.0,
            top,
            width - SWATCH - 4.0,
            line,
            style,
            Align::Left,
        );
    }

    canvas.advance(h);
}
