//! Flow context: a drawing surface with a cursor that moves down the page
//! and starts new pages when a block would cross the bottom margin.
//!
//! Coordinates are PDF user space (origin bottom-left, y grows upward). The
//! cursor is the y of the top of the free slot; drawing a block of height `h`
//! moves it to `cursor - h`.

use pdf_writer::{Content, Name, Str};

use crate::fonts::Fonts;

/// Tolerance for float error when a block fits exactly.
const FIT_EPSILON: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub bold: bool,
    pub color: [u8; 3],
}

impl TextStyle {
    pub const fn regular(size: f32) -> Self {
        Self {
            size,
            bold: false,
            color: [0x1F, 0x29, 0x37],
        }
    }

    pub const fn bold(size: f32) -> Self {
        Self {
            size,
            bold: true,
            color: [0x1F, 0x29, 0x37],
        }
    }

    pub const fn with_color(self, color: [u8; 3]) -> Self {
        Self { color, ..self }
    }
}

/// Page size and margins in points. The margins delimit the flowing content;
/// recurring chrome is drawn inside them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
}

impl PageGeometry {
    /// US Letter with 40pt side margins.
    pub fn letter() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
            margin_top: 48.0,
            margin_bottom: 48.0,
            margin_left: 40.0,
            margin_right: 40.0,
        }
    }

    pub fn content_top(&self) -> f32 {
        self.height - self.margin_top
    }

    pub fn content_bottom(&self) -> f32 {
        self.margin_bottom
    }

    pub fn content_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }

    pub fn content_height(&self) -> f32 {
        self.content_top() - self.content_bottom()
    }
}

pub(crate) fn rgb(content: &mut Content, [r, g, b]: [u8; 3], stroke: bool) {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    if stroke {
        content.set_stroke_rgb(r, g, b);
    } else {
        content.set_fill_rgb(r, g, b);
    }
}

/// The page currently being drawn, plus the fonts used to measure and show text.
pub struct Canvas {
    content: Content,
    fonts: Fonts,
    geometry: PageGeometry,
    cursor: f32,
    page_index: usize,
}

impl Canvas {
    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn cursor(&self) -> f32 {
        self.cursor
    }

    /// Move the cursor down by `h` after drawing a block.
    pub fn advance(&mut self, h: f32) {
        self.cursor -= h;
    }

    /// Zero-based index of the page being drawn.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub(crate) fn content(&mut self) -> &mut Content {
        &mut self.content
    }

    pub fn line_height(&self, style: TextStyle) -> f32 {
        style.size * self.fonts.get(style.bold).line_h_ratio
    }

    pub fn text_width(&self, text: &str, style: TextStyle) -> f32 {
        self.fonts.get(style.bold).text_width(text, style.size)
    }

    /// Greedy word wrap. Explicit newlines start new lines; a word wider than
    /// `max_width` is broken between characters. Always yields at least one line.
    pub fn wrap_text(&self, text: &str, max_width: f32, style: TextStyle) -> Vec<String> {
        let font = self.fonts.get(style.bold);
        let space_w = font.space_width(style.size);
        let mut lines = Vec::new();

        for paragraph in text.split('\n') {
            let mut current = String::new();
            let mut current_w = 0.0f32;

            for word in paragraph.split_whitespace() {
                let ww = font.text_width(word, style.size);

                if ww > max_width {
                    if !current.is_empty() {
                        lines.push(std::mem::take(&mut current));
                    }
                    current_w = 0.0;
                    for ch in word.chars() {
                        let cw = font.text_width(ch.encode_utf8(&mut [0; 4]), style.size);
                        if !current.is_empty() && current_w + cw > max_width {
                            lines.push(std::mem::take(&mut current));
                            current_w = 0.0;
                        }
                        current.push(ch);
                        current_w += cw;
                    }
                    continue;
                }

                let proposed = if current.is_empty() {
                    ww
                } else {
                    current_w + space_w + ww
                };
                if !current.is_empty() && proposed > max_width {
                    lines.push(std::mem::replace(&mut current, word.to_string()));
                    current_w = ww;
                } else {
                    if !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(word);
                    current_w = proposed;
                }
            }
            lines.push(current);
        }
        lines
    }

    /// Height `text` occupies when wrapped at `width`.
    pub fn measure_text(&self, text: &str, width: f32, style: TextStyle) -> f32 {
        self.wrap_text(text, width, style).len() as f32 * self.line_height(style)
    }

    /// Show a single line with its baseline at `baseline_y`.
    pub fn text(&mut self, x: f32, baseline_y: f32, text: &str, style: TextStyle) {
        if text.is_empty() {
            return;
        }
        let bytes = self.fonts.get_mut(style.bold).encode(text);
        let pdf_name = self.fonts.get(style.bold).pdf_name;
        rgb(&mut self.content, style.color, false);
        self.content.begin_text();
        self.content.set_font(Name(pdf_name.as_bytes()), style.size);
        self.content.next_line(x, baseline_y);
        self.content.show(Str(&bytes));
        self.content.end_text();
    }

    /// Wrap and draw `text` inside `[x, x + width]` starting at `top`.
    /// Returns the height used.
    pub fn text_block(
        &mut self,
        x: f32,
        top: f32,
        width: f32,
        text: &str,
        style: TextStyle,
        align: Align,
    ) -> f32 {
        let lines = self.wrap_text(text, width, style);
        let line_h = self.line_height(style);
        let ascent = style.size * self.fonts.get(style.bold).ascender_ratio;
        for (i, line) in lines.iter().enumerate() {
            let line_w = self.text_width(line, style);
            let line_x = match align {
                Align::Left => x,
                Align::Center => x + (width - line_w) / 2.0,
                Align::Right => x + width - line_w,
            };
            let baseline = top - i as f32 * line_h - ascent - (line_h - style.size) / 2.0;
            self.text(line_x, baseline, line, style);
        }
        lines.len() as f32 * line_h
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: [u8; 3]) {
        self.content.save_state();
        rgb(&mut self.content, color, false);
        self.content.rect(x, y, w, h);
        self.content.fill_nonzero();
        self.content.restore_state();
    }

    pub fn hline(&mut self, x1: f32, x2: f32, y: f32, color: [u8; 3], line_width: f32) {
        self.content.save_state();
        rgb(&mut self.content, color, true);
        self.content.set_line_width(line_width);
        self.content.move_to(x1, y);
        self.content.line_to(x2, y);
        self.content.stroke();
        self.content.restore_state();
    }

    /// Append a rounded-rectangle path (not painted).
    pub(crate) fn rounded_rect_path(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32) {
        let r = r.min(w / 2.0).min(h / 2.0).max(0.0);
        let k = r * 0.552_284_8;
        let c = &mut self.content;
        c.move_to(x + r, y);
        c.line_to(x + w - r, y);
        c.cubic_to(x + w - r + k, y, x + w, y + r - k, x + w, y + r);
        c.line_to(x + w, y + h - r);
        c.cubic_to(x + w, y + h - r + k, x + w - r + k, y + h, x + w - r, y + h);
        c.line_to(x + r, y + h);
        c.cubic_to(x + r - k, y + h, x, y + h - r + k, x, y + h - r);
        c.line_to(x, y + r);
        c.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
        c.close_path();
    }

    pub fn fill_rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32, color: [u8; 3]) {
        self.content.save_state();
        rgb(&mut self.content, color, false);
        self.rounded_rect_path(x, y, w, h, r);
        self.content.fill_nonzero();
        self.content.restore_state();
    }

    pub fn stroke_rounded_rect(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        r: f32,
        color: [u8; 3],
        line_width: f32,
    ) {
        self.content.save_state();
        rgb(&mut self.content, color, true);
        self.content.set_line_width(line_width);
        self.rounded_rect_path(x, y, w, h, r);
        self.content.stroke();
        self.content.restore_state();
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, r: f32, color: [u8; 3]) {
        self.fill_rounded_rect(cx - r, cy - r, 2.0 * r, 2.0 * r, r, color);
    }

    /// Paint a registered image XObject into the given box.
    pub fn image(&mut self, pdf_name: &str, x: f32, y: f32, w: f32, h: f32) {
        self.content.save_state();
        self.content.transform([w, 0.0, 0.0, h, x, y]);
        self.content.x_object(Name(pdf_name.as_bytes()));
        self.content.restore_state();
    }
}

/// Per-page setup, run whenever a page begins (letterhead and other chrome).
pub type PageHook = Box<dyn Fn(&mut Canvas)>;

pub struct FlowContext {
    canvas: Canvas,
    hooks: Vec<PageHook>,
    finished: Vec<Content>,
    page_start: f32,
}

impl FlowContext {
    pub fn new(geometry: PageGeometry, fonts: Fonts) -> Self {
        let top = geometry.content_top();
        Self {
            canvas: Canvas {
                content: Content::new(),
                fonts,
                geometry,
                cursor: top,
                page_index: 0,
            },
            hooks: Vec::new(),
            finished: Vec::new(),
            page_start: top,
        }
    }

    /// Register a page hook. It runs on the current page right away and on
    /// every page started afterwards, in registration order.
    pub fn on_new_page(&mut self, hook: PageHook) {
        let was_at_top = self.at_page_top();
        hook(&mut self.canvas);
        if was_at_top {
            self.page_start = self.canvas.cursor;
        }
        self.hooks.push(hook);
    }

    pub fn canvas(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.canvas.geometry
    }

    pub fn cursor(&self) -> f32 {
        self.canvas.cursor
    }

    pub fn page_count(&self) -> usize {
        self.finished.len() + 1
    }

    /// Nothing has been placed on the current page since it began.
    pub fn at_page_top(&self) -> bool {
        (self.canvas.cursor - self.page_start).abs() < 0.5
    }

    /// Space left between the cursor and the bottom margin.
    pub fn remaining(&self) -> f32 {
        (self.canvas.cursor - self.canvas.geometry.content_bottom()).max(0.0)
    }

    /// Usable height of a fresh page once the page hooks have run.
    pub fn page_capacity(&self) -> f32 {
        self.page_start - self.canvas.geometry.content_bottom()
    }

    pub fn measure_text(&self, text: &str, width: f32, style: TextStyle) -> f32 {
        self.canvas.measure_text(text, width, style)
    }

    /// Make room for a block of `required` height. Starts a new page when the
    /// block would cross the bottom margin and returns whether it did. A block
    /// taller than a whole page is drawn where it is rather than looping.
    pub fn ensure_space(&mut self, required: f32) -> bool {
        let bottom = self.canvas.geometry.content_bottom();
        if self.canvas.cursor - required >= bottom - FIT_EPSILON {
            return false;
        }
        if self.at_page_top() {
            log::debug!(
                "block of {required:.1}pt exceeds page capacity {:.1}pt; drawing in place",
                self.page_capacity()
            );
            return false;
        }
        self.new_page();
        true
    }

    pub fn new_page(&mut self) {
        log::debug!(
            "page break after page {} (cursor {:.1})",
            self.canvas.page_index + 1,
            self.canvas.cursor
        );
        self.finished
            .push(std::mem::replace(&mut self.canvas.content, Content::new()));
        self.canvas.page_index += 1;
        self.canvas.cursor = self.canvas.geometry.content_top();
        for hook in &self.hooks {
            hook(&mut self.canvas);
        }
        self.page_start = self.canvas.cursor;
    }

    /// Vertical spacing between blocks. Suppressed at the top of a page and
    /// never pushes the cursor below the bottom margin.
    pub fn gap(&mut self, h: f32) {
        if self.at_page_top() {
            return;
        }
        let bottom = self.canvas.geometry.content_bottom();
        self.canvas.cursor = (self.canvas.cursor - h).max(bottom);
    }

    /// Draw on every page after layout, when the page total is known. The
    /// stamp receives the one-based page number and the total.
    pub fn stamp_pages(&mut self, stamp: impl Fn(&mut Canvas, usize, usize)) {
        let total = self.page_count();
        let current_index = self.canvas.page_index;
        let current_cursor = self.canvas.cursor;
        for i in 0..self.finished.len() {
            std::mem::swap(&mut self.canvas.content, &mut self.finished[i]);
            self.canvas.page_index = i;
            stamp(&mut self.canvas, i + 1, total);
            std::mem::swap(&mut self.canvas.content, &mut self.finished[i]);
        }
        self.canvas.page_index = current_index;
        stamp(&mut self.canvas, total, total);
        self.canvas.cursor = current_cursor;
    }

    pub(crate) fn finish(mut self) -> (Vec<Content>, Fonts) {
        self.finished.push(self.canvas.content);
        (self.finished, self.canvas.fonts)
    }
}
