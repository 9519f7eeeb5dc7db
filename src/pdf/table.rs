use crate::model::Severity;

use super::flow::{Align, Canvas, FlowContext, TextStyle};

const CELL_PAD_X: f32 = 4.0;
const CELL_PAD_Y: f32 = 3.0;
/// Space reserved in an alert cell for the severity dot.
const ICON_W: f32 = 9.0;
const GRID: [u8; 3] = [0xD1, 0xD5, 0xDB];

pub struct Column {
    pub label: String,
    pub width: f32,
    pub align: Align,
}

impl Column {
    pub fn new(label: impl Into<String>, width: f32, align: Align) -> Self {
        Self {
            label: label.into(),
            width,
            align,
        }
    }
}

/// Cell content, resolved when the row is built.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Text(String),
    Alert { text: String, severity: Severity },
}

impl Cell {
    pub fn text(&self) -> &str {
        match self {
            Cell::Text(t) | Cell::Alert { text: t, .. } => t,
        }
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

#[derive(Clone, Debug, Default)]
pub struct Row {
    pub cells: Vec<Cell>,
    pub shading: Option<[u8; 3]>,
    pub bold: bool,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            ..Default::default()
        }
    }

    pub fn shaded(mut self, color: [u8; 3]) -> Self {
        self.shading = Some(color);
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    pub font_size: f32,
    pub header_fill: [u8; 3],
}

/// What drawing a table did to the flow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableStats {
    pub header_draws: usize,
    pub pages_started: usize,
}

fn severity_color(severity: Severity) -> Option<[u8; 3]> {
    match severity {
        Severity::Critical => Some([0xDC, 0x26, 0x26]),
        Severity::Warning => Some([0xF5, 0x9E, 0x0B]),
        Severity::Info => Some([0x3B, 0x82, 0xF6]),
        Severity::Unknown => None,
    }
}

impl Table {
    fn cell_style(&self, bold: bool) -> TextStyle {
        if bold {
            TextStyle::bold(self.font_size)
        } else {
            TextStyle::regular(self.font_size)
        }
    }

    fn text_width(column: &Column, cell: &Cell) -> f32 {
        let icon = match cell {
            Cell::Alert { severity, .. } if severity_color(*severity).is_some() => ICON_W,
            _ => 0.0,
        };
        (column.width - 2.0 * CELL_PAD_X - icon).max(1.0)
    }

    pub fn width(&self) -> f32 {
        self.columns.iter().map(|c| c.width).sum()
    }

    pub fn header_height(&self, flow: &FlowContext) -> f32 {
        let style = self.cell_style(true);
        self.columns
            .iter()
            .map(|c| flow.measure_text(&c.label, (c.width - 2.0 * CELL_PAD_X).max(1.0), style))
            .fold(0.0f32, f32::max)
            + 2.0 * CELL_PAD_Y
    }

    /// Tallest wrapped cell plus padding.
    pub fn row_height(&self, flow: &FlowContext, row: &Row) -> f32 {
        let style = self.cell_style(row.bold);
        self.columns
            .iter()
            .zip(&row.cells)
            .map(|(col, cell)| flow.measure_text(cell.text(), Self::text_width(col, cell), style))
            .fold(0.0f32, f32::max)
            + 2.0 * CELL_PAD_Y
    }

    fn draw_header(&self, canvas: &mut Canvas, x: f32, h: f32) {
        let top = canvas.cursor();
        let style = self.cell_style(true).with_color([0xFF, 0xFF, 0xFF]);
        canvas.fill_rect(x, top - h, self.width(), h, self.header_fill);
        let mut cx = x;
        for col in &self.columns {
            canvas.text_block(
                cx + CELL_PAD_X,
                top - CELL_PAD_Y,
                (col.width - 2.0 * CELL_PAD_X).max(1.0),
                &col.label,
                style,
                col.align,
            );
            cx += col.width;
        }
        canvas.advance(h);
    }

    fn draw_row(&self, canvas: &mut Canvas, x: f32, row: &Row, h: f32) {
        let top = canvas.cursor();
        let bottom = top - h;
        let style = self.cell_style(row.bold);
        if let Some(fill) = row.shading {
            canvas.fill_rect(x, bottom, self.width(), h, fill);
        }

        let mut cx = x;
        for (col, cell) in self.columns.iter().zip(&row.cells) {
            let mut text_x = cx + CELL_PAD_X;
            if let Cell::Alert { severity, .. } = cell
                && let Some(color) = severity_color(*severity)
            {
                let r = (self.font_size * 0.3).min(3.5);
                let cy = top - CELL_PAD_Y - canvas.line_height(style) / 2.0;
                canvas.fill_circle(text_x + r, cy, r, color);
                text_x += ICON_W;
            }
            canvas.text_block(
                text_x,
                top - CELL_PAD_Y,
                Self::text_width(col, cell),
                cell.text(),
                style,
                col.align,
            );
            cx += col.width;
        }
        canvas.hline(x, x + self.width(), bottom, GRID, 0.5);
        canvas.advance(h);
    }
}

/// Draw `table` at horizontal offset `x`, breaking between rows and repeating
/// the header at the top of every continuation page. Rows are never split.
pub fn render_table(flow: &mut FlowContext, table: &Table, x: f32) -> TableStats {
    let header_h = table.header_height(flow);
    let mut stats = TableStats::default();
    let mut header_on_page = false;

    let unknown_alerts = table
        .rows
        .iter()
        .flat_map(|r| &r.cells)
        .filter(|c| matches!(c, Cell::Alert { severity: Severity::Unknown, .. }))
        .count();
    if unknown_alerts > 0 {
        log::warn!("{unknown_alerts} alert cell(s) with unrecognized severity; drawing text without icon");
    }

    if table.rows.is_empty() {
        if flow.ensure_space(header_h) {
            stats.pages_started += 1;
        }
        table.draw_header(flow.canvas(), x, header_h);
        stats.header_draws += 1;
        return stats;
    }

    for (ri, row) in table.rows.iter().enumerate() {
        let row_h = table.row_height(flow, row);
        let needed = if header_on_page {
            row_h
        } else {
            header_h + row_h
        };
        if flow.ensure_space(needed) {
            stats.pages_started += 1;
            header_on_page = false;
        }
        if !header_on_page {
            table.draw_header(flow.canvas(), x, header_h);
            stats.header_draws += 1;
            header_on_page = true;
        }
        log::debug!(
            "TABLE row={} row_h={:.2} page={} cursor={:.2}",
            ri,
            row_h,
            flow.page_count(),
            flow.cursor()
        );
        table.draw_row(flow.canvas(), x, row, row_h);
    }
    stats
}
