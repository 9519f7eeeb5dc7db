//! Remisiones and facturas listed side by side, chunked so each page holds
//! aligned slices of both lists.

use crate::aggregate::{MovementEntry, MovementList};
use crate::format::{money, percent};

use super::flow::{Align, Canvas, FlowContext, TextStyle};

const COLUMN_GAP: f32 = 10.0;
const PAD: f32 = 6.0;
const ROW_PAD: f32 = 3.0;
const FIT_EPSILON: f32 = 0.01;
const BORDER: [u8; 3] = [0xCB, 0xD5, 0xE1];
const MUTED: [u8; 3] = [0x6B, 0x72, 0x80];

pub const EMPTY_CHUNK: &str = "Sin registros en este bloque";
pub const CONTINUES: &str = "Continúa en la siguiente página";

/// One page worth of the two lists. Either side may be empty.
#[derive(Debug)]
pub struct MovementChunk<'l, 'a> {
    /// Index of the first row of both slices in their full lists.
    pub start: usize,
    pub left: &'l [MovementEntry<'a>],
    pub right: &'l [MovementEntry<'a>],
    /// Height of the two boxes, chrome included.
    pub height: f32,
    pub is_last: bool,
}

/// Measured rows of both lists and the space chunks may take.
#[derive(Debug, Clone, Copy)]
pub struct ChunkLayout<'h> {
    pub left_rows: &'h [f32],
    pub right_rows: &'h [f32],
    /// Title band, closing line and padding of one box.
    pub chrome: f32,
    /// Height of the placeholder drawn for an empty side.
    pub empty_row: f32,
    /// Space available to the first chunk.
    pub first_budget: f32,
    /// Space available to every later chunk.
    pub page_budget: f32,
}

impl ChunkLayout<'_> {
    fn side_height(rows: &[f32], start: usize, end: usize, empty_row: f32) -> f32 {
        let end = end.min(rows.len());
        if start >= end {
            empty_row
        } else {
            rows[start..end].iter().sum()
        }
    }

    /// Box height for rows `start..end` of both lists.
    pub fn range_height(&self, start: usize, end: usize) -> f32 {
        let left = Self::side_height(self.left_rows, start, end, self.empty_row);
        let right = Self::side_height(self.right_rows, start, end, self.empty_row);
        self.chrome + left.max(right)
    }
}

fn slice<'l, 'a>(list: &'l [MovementEntry<'a>], start: usize, end: usize) -> &'l [MovementEntry<'a>] {
    let start = start.min(list.len());
    &list[start..end.min(list.len())]
}

/// Split both lists into aligned chunks. Chunk `i` of the left list pairs with
/// chunk `i` of the right list and a chunk grows while both boxes fit its
/// budget. Every chunk holds at least one row and there is always at least
/// one chunk.
pub fn chunk_movements<'l, 'a>(
    left: &'l [MovementEntry<'a>],
    right: &'l [MovementEntry<'a>],
    layout: &ChunkLayout<'_>,
) -> Vec<MovementChunk<'l, 'a>> {
    let n = left.len().max(right.len());
    let mut chunks: Vec<MovementChunk<'l, 'a>> = Vec::new();
    let mut start = 0;
    loop {
        let budget = if chunks.is_empty() {
            layout.first_budget
        } else {
            layout.page_budget
        };
        let mut end = start;
        while end < n {
            if end > start && layout.range_height(start, end + 1) > budget + FIT_EPSILON {
                break;
            }
            end += 1;
        }
        chunks.push(MovementChunk {
            start,
            left: slice(left, start, end),
            right: slice(right, start, end),
            height: layout.range_height(start, end),
            is_last: false,
        });
        start = end;
        if start >= n {
            break;
        }
    }
    if let Some(last) = chunks.last_mut() {
        last.is_last = true;
    }
    chunks
}

fn row_style() -> TextStyle {
    TextStyle::regular(8.5)
}

fn title_style() -> TextStyle {
    TextStyle::bold(9.5)
}

fn entry_label(entry: &MovementEntry<'_>) -> String {
    if entry.movement.id.is_empty() {
        entry.item_id.to_string()
    } else {
        format!("{} ({})", entry.movement.id, entry.item_id)
    }
}

fn closing(list: &MovementList<'_>, is_last: bool) -> (String, TextStyle) {
    if is_last {
        let text = format!(
            "Subtotal: {} ({} del total)",
            money(list.subtotal),
            percent(list.percentage_of_grand_total)
        );
        (text, TextStyle::bold(8.5))
    } else {
        (CONTINUES.to_string(), row_style().with_color(MUTED))
    }
}

struct Metrics {
    col_w: f32,
    id_w: f32,
    amount_w: f32,
    title_h: f32,
    closing_h: f32,
    empty_h: f32,
    left_rows: Vec<f32>,
    right_rows: Vec<f32>,
}

impl Metrics {
    fn new(flow: &FlowContext, left: &MovementList<'_>, right: &MovementList<'_>, width: f32) -> Self {
        let col_w = (width - COLUMN_GAP) / 2.0;
        let inner_w = col_w - 2.0 * PAD;
        let id_w = inner_w * 0.45;
        let amount_w = inner_w * 0.33;
        let pct_w = inner_w - id_w - amount_w;
        let style = row_style();

        let rows = |list: &MovementList<'_>| -> Vec<f32> {
            list.movements
                .iter()
                .map(|entry| {
                    let id = flow.measure_text(&entry_label(entry), id_w, style);
                    let amount = flow.measure_text(&money(entry.movement.monto), amount_w, style);
                    let pct = flow.measure_text(&percent(entry.percentage), pct_w, style);
                    id.max(amount).max(pct) + 2.0 * ROW_PAD
                })
                .collect()
        };
        let title_h = [left, right]
            .iter()
            .map(|l| flow.measure_text(l.kind.label(), inner_w, title_style()))
            .fold(0.0f32, f32::max);
        // the box reserves room for whichever closing line is tallest
        let closing_h = [(left, true), (right, true), (left, false)]
            .iter()
            .map(|&(l, last)| {
                let (text, style) = closing(l, last);
                flow.measure_text(&text, inner_w, style)
            })
            .fold(0.0f32, f32::max);

        Self {
            col_w,
            id_w,
            amount_w,
            title_h: title_h + 2.0 * ROW_PAD,
            closing_h: closing_h + 2.0 * ROW_PAD,
            empty_h: flow.measure_text(EMPTY_CHUNK, inner_w, style) + 2.0 * ROW_PAD,
            left_rows: rows(left),
            right_rows: rows(right),
        }
    }

    fn chrome(&self) -> f32 {
        self.title_h + self.closing_h + 2.0 * PAD
    }

    fn layout(&self, first_budget: f32, page_budget: f32) -> ChunkLayout<'_> {
        ChunkLayout {
            left_rows: &self.left_rows,
            right_rows: &self.right_rows,
            chrome: self.chrome(),
            empty_row: self.empty_h,
            first_budget,
            page_budget,
        }
    }

    /// Smallest first chunk: the chrome plus one row of each side.
    fn lead_height(&self) -> f32 {
        self.layout(0.0, 0.0).range_height(0, 1)
    }
}

/// Height the first chunk needs at minimum, for keeping a heading with it.
pub fn lead_height(flow: &FlowContext, left: &MovementList<'_>, right: &MovementList<'_>, width: f32) -> f32 {
    Metrics::new(flow, left, right, width).lead_height()
}

/// Chunks as they would be drawn from the current cursor: the first one takes
/// what is left of the page, later ones a whole page each.
pub fn plan_movement_chunks<'l, 'a>(
    flow: &FlowContext,
    left: &'l MovementList<'a>,
    right: &'l MovementList<'a>,
    width: f32,
) -> Vec<MovementChunk<'l, 'a>> {
    let m = Metrics::new(flow, left, right, width);
    chunk_movements(
        &left.movements,
        &right.movements,
        &m.layout(flow.remaining(), flow.page_capacity()),
    )
}

struct Side<'s, 'a> {
    list: &'s MovementList<'a>,
    rows: &'s [MovementEntry<'a>],
    heights: &'s [f32],
}

fn draw_column(canvas: &mut Canvas, m: &Metrics, x: f32, height: f32, side: Side<'_, '_>, is_last: bool) {
    let top = canvas.cursor();
    canvas.stroke_rounded_rect(x, top - height, m.col_w, height, 4.0, BORDER, 0.75);

    let inner_x = x + PAD;
    let inner_w = m.col_w - 2.0 * PAD;
    let mut y = top - PAD;

    canvas.text_block(inner_x, y - ROW_PAD, inner_w, side.list.kind.label(), title_style(), Align::Left);
    y -= m.title_h;
    canvas.hline(inner_x, inner_x + inner_w, y, BORDER, 0.5);

    let style = row_style();
    if side.rows.is_empty() {
        canvas.text_block(
            inner_x,
            y - ROW_PAD,
            inner_w,
            EMPTY_CHUNK,
            style.with_color(MUTED),
            Align::Left,
        );
    }
    let pct_w = inner_w - m.id_w - m.amount_w;
    for (entry, row_h) in side.rows.iter().zip(side.heights) {
        canvas.text_block(inner_x, y - ROW_PAD, m.id_w, &entry_label(entry), style, Align::Left);
        canvas.text_block(
            inner_x + m.id_w,
            y - ROW_PAD,
            m.amount_w,
            &money(entry.movement.monto),
            style,
            Align::Right,
        );
        canvas.text_block(
            inner_x + m.id_w + m.amount_w,
            y - ROW_PAD,
            pct_w,
            &percent(entry.percentage),
            style,
            Align::Right,
        );
        y -= row_h;
    }

    // closing line sits at the bottom of the box
    let closing_top = top - height + PAD + m.closing_h;
    canvas.hline(inner_x, inner_x + inner_w, closing_top, BORDER, 0.5);
    let (text, closing_style) = closing(side.list, is_last);
    canvas.text_block(inner_x, closing_top - ROW_PAD, inner_w, &text, closing_style, Align::Right);
}

/// Draw both lists as two equal-width boxes per chunk, one chunk per page.
/// Returns the number of chunks drawn.
pub fn render_movement_columns(
    flow: &mut FlowContext,
    left: &MovementList<'_>,
    right: &MovementList<'_>,
    x: f32,
    width: f32,
) -> usize {
    let m = Metrics::new(flow, left, right, width);
    flow.ensure_space(m.lead_height());
    let layout = m.layout(flow.remaining(), flow.page_capacity());
    let chunks = chunk_movements(&left.movements, &right.movements, &layout);

    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            flow.new_page();
        }
        let canvas = flow.canvas();
        let rows = |list: &MovementList<'_>, len: usize| {
            let start = chunk.start.min(list.movements.len());
            start..start + len
        };
        let left_side = Side {
            list: left,
            rows: chunk.left,
            heights: &m.left_rows[rows(left, chunk.left.len())],
        };
        let right_side = Side {
            list: right,
            rows: chunk.right,
            heights: &m.right_rows[rows(right, chunk.right.len())],
        };
        draw_column(canvas, &m, x, chunk.height, left_side, chunk.is_last);
        draw_column(canvas, &m, x + m.col_w + COLUMN_GAP, chunk.height, right_side, chunk.is_last);
        canvas.advance(chunk.height);
    }
    log::debug!(
        "movement columns: {} + {} entries in {} chunk(s)",
        left.movements.len(),
        right.movements.len(),
        chunks.len()
    );
    chunks.len()
}
