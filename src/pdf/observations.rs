use super::flow::{Align, FlowContext, TextStyle};

const PAD: f32 = 8.0;
const BULLET_INDENT: f32 = 10.0;
const NOTE_GAP: f32 = 2.0;
const BORDER: [u8; 3] = [0xCB, 0xD5, 0xE1];
const PLACEHOLDER: &str = "Sin observaciones.";

/// Bulleted free-text notes inside a bordered box.
pub struct ObservationBox<'a> {
    pub title: &'a str,
    pub notes: &'a [String],
    /// Draw a placeholder line instead of omitting the box when there are no notes.
    pub always_show: bool,
    pub min_height: f32,
}

fn title_style() -> TextStyle {
    TextStyle::bold(10.0)
}

fn note_style() -> TextStyle {
    TextStyle::regular(9.0)
}

impl ObservationBox<'_> {
    fn lines(&self) -> Option<Vec<&str>> {
        if self.notes.iter().all(|n| n.trim().is_empty()) {
            return self.always_show.then(|| vec![PLACEHOLDER]);
        }
        Some(
            self.notes
                .iter()
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .collect(),
        )
    }

    fn content_height(&self, flow: &FlowContext, notes: &[&str], width: f32) -> f32 {
        let inner = width - 2.0 * PAD;
        let title_h = flow.measure_text(self.title, inner, title_style()) + NOTE_GAP;
        let notes_h: f32 = notes
            .iter()
            .map(|n| flow.measure_text(n, inner - BULLET_INDENT, note_style()) + NOTE_GAP)
            .sum();
        title_h + notes_h
    }

    /// Height the box will take, or `None` when it is omitted.
    pub fn height(&self, flow: &FlowContext, width: f32) -> Option<f32> {
        let notes = self.lines()?;
        Some(
            self.min_height
                .max(self.content_height(flow, &notes, width) + 2.0 * PAD),
        )
    }
}

/// Returns whether the box was drawn.
pub fn render_observations(flow: &mut FlowContext, obs: &ObservationBox<'_>, x: f32, width: f32) -> bool {
    let Some(notes) = obs.lines() else {
        return false;
    };
    let h = obs
        .min_height
        .max(obs.content_height(flow, &notes, width) + 2.0 * PAD);
    flow.ensure_space(h);

    let canvas = flow.canvas();
    let top = canvas.cursor();
    canvas.stroke_rounded_rect(x, top - h, width, h, 4.0, BORDER, 0.75);

    let inner = width - 2.0 * PAD;
    let mut y = top - PAD;
    y -= canvas.text_block(x + PAD, y, inner, obs.title, title_style(), Align::Left) + NOTE_GAP;
    for note in notes {
        let style = note_style();
        canvas.text_block(x + PAD, y, BULLET_INDENT, "\u{2022}", style, Align::Left);
        y -= canvas.text_block(
            x + PAD + BULLET_INDENT,
            y,
            inner - BULLET_INDENT,
            note,
            style,
            Align::Left,
        ) + NOTE_GAP;
    }

    canvas.advance(h);
    true
}
