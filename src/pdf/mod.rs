pub mod bar;
pub mod compose;
pub mod flow;
pub(crate) mod images;
pub mod movements;
pub mod observations;
pub mod table;

use chrono::{Datelike, NaiveDate};
use pdf_writer::{Date, Filter, Name, Pdf, Rect, Ref, TextStr};

use crate::aggregate::{build_group_hierarchy, grand_totals};
use crate::error::{Error, Result};
use crate::fonts::Fonts;
use crate::model::{Branding, Customization, Summary};

use compose::{ReportData, Section, company_name, compose, report_title};
use flow::{Align, Canvas, FlowContext, PageGeometry, TextStyle};
use images::{LetterheadImage, embed_image};

/// Distance from the paper edge to the recurring chrome.
const CHROME_MARGIN: f32 = 28.0;
const HEADER_BAND: f32 = 20.0;
const FOOTER_BAND: f32 = 20.0;
const BAND_GAP: f32 = 10.0;
const MAX_TOP_LETTERHEAD: f32 = 72.0;
const MAX_BOTTOM_LETTERHEAD: f32 = 48.0;
const MUTED: [u8; 3] = [0x6B, 0x72, 0x80];
const RULE: [u8; 3] = [0xD1, 0xD5, 0xDB];

/// Letterhead images resolved by the engine, shared by every compilation.
#[derive(Clone, Default)]
pub(crate) struct Letterhead {
    pub(crate) top: Option<LetterheadImage>,
    pub(crate) bottom: Option<LetterheadImage>,
}

pub(crate) struct Rendered {
    pub(crate) pdf: Vec<u8>,
    pub(crate) page_count: usize,
    pub(crate) sections: Vec<Section>,
}

/// Box `(x, y, w, h)` for an image fitted into `[x, x + max_w]` with at most
/// `max_h` height, anchored at `top` and horizontally centred.
fn fit_image(img: &LetterheadImage, x: f32, top: f32, max_w: f32, max_h: f32) -> (f32, f32, f32, f32) {
    let mut w = max_w;
    let mut h = img.height_for_width(w);
    if h > max_h && h > 0.0 {
        w *= max_h / h;
        h = max_h;
    }
    (x + (max_w - w) / 2.0, top - h, w, h)
}

fn page_geometry(branding: &Branding, letterhead: &Letterhead) -> PageGeometry {
    let mut g = PageGeometry::letter();
    let width = g.content_width();

    let top_band = match &letterhead.top {
        Some(img) => img.height_for_width(width).min(MAX_TOP_LETTERHEAD),
        None if !branding.header_text.trim().is_empty() || !branding.company_name.trim().is_empty() => {
            HEADER_BAND
        }
        None => 0.0,
    };
    let bottom_band = letterhead
        .bottom
        .as_ref()
        .map(|img| img.height_for_width(width).min(MAX_BOTTOM_LETTERHEAD) + 4.0)
        .unwrap_or(0.0);

    g.margin_top = g.margin_top.max(CHROME_MARGIN + top_band + BAND_GAP);
    g.margin_bottom = CHROME_MARGIN + FOOTER_BAND + bottom_band + BAND_GAP;
    g
}

/// Letterhead and running header drawn at the start of every page.
fn chrome_hook(branding: &Branding, letterhead: &Letterhead) -> flow::PageHook {
    let company = branding.company_name.trim().to_string();
    let header_text = branding.header_text.trim().to_string();
    let accent = branding.colors.accent;
    let top = letterhead.top.clone();
    let bottom = letterhead.bottom.clone();

    Box::new(move |canvas: &mut Canvas| {
        let g = *canvas.geometry();
        let x = g.margin_left;
        let width = g.content_width();
        let band_top = g.height - CHROME_MARGIN;

        if let Some(img) = &top {
            let (ix, iy, iw, ih) = fit_image(img, x, band_top, width, MAX_TOP_LETTERHEAD);
            canvas.image(img.pdf_name, ix, iy, iw, ih);
        } else if !company.is_empty() || !header_text.is_empty() {
            let half = width / 2.0;
            canvas.text_block(x, band_top, half, &company, TextStyle::bold(9.0), Align::Left);
            canvas.text_block(
                x + half,
                band_top,
                half,
                &header_text,
                TextStyle::regular(8.0).with_color(MUTED),
                Align::Right,
            );
            canvas.hline(x, x + width, band_top - HEADER_BAND + 4.0, accent, 0.75);
        }

        if let Some(img) = &bottom {
            let band_bottom = CHROME_MARGIN + FOOTER_BAND;
            let max_h = MAX_BOTTOM_LETTERHEAD;
            let fitted_h = img.height_for_width(width).min(max_h);
            let (ix, iy, iw, ih) = fit_image(img, x, band_bottom + fitted_h, width, max_h);
            canvas.image(img.pdf_name, ix, iy, iw, ih);
        }
    })
}

fn stamp_footer(canvas: &mut Canvas, footer_text: &str, page: usize, total: usize) {
    let g = *canvas.geometry();
    let x = g.margin_left;
    let width = g.content_width();
    let top = CHROME_MARGIN + FOOTER_BAND - 4.0;
    let style = TextStyle::regular(8.0).with_color(MUTED);

    canvas.hline(x, x + width, top + 2.0, RULE, 0.5);
    let label = format!("Página {page} de {total}");
    let label_w = canvas.text_width(&label, style) + 4.0;
    if !footer_text.is_empty() {
        canvas.text_block(x, top, (width - label_w).max(0.0), footer_text, style, Align::Left);
    }
    canvas.text_block(x + width - label_w, top, label_w, &label, style, Align::Right);
}

pub(crate) fn render(
    summary: &Summary,
    branding: &Branding,
    customization: &Customization,
    fonts: Fonts,
    letterhead: &Letterhead,
) -> Result<Rendered> {
    let t0 = std::time::Instant::now();

    let generated_at: NaiveDate = customization
        .generated_at
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let data = ReportData {
        summary,
        groups: build_group_hierarchy(summary),
        grand: grand_totals(summary),
        generated_at,
    };
    let t_aggregate = t0.elapsed();

    let geometry = page_geometry(branding, letterhead);
    let mut flow = FlowContext::new(geometry, fonts);
    flow.on_new_page(chrome_hook(branding, letterhead));
    let sections = compose(&mut flow, &data, branding, customization);

    let footer_text = branding.footer_text.trim().to_string();
    flow.stamp_pages(|canvas, page, total| stamp_footer(canvas, &footer_text, page, total));
    let page_count = flow.page_count();
    let (contents, fonts) = flow.finish();
    let t_layout = t0.elapsed();

    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();
    let info_id = alloc();

    let font_pairs = fonts.write(&mut pdf, &mut alloc);

    let mut image_xobjects: Vec<(&'static str, Ref)> = Vec::new();
    for img in [&letterhead.top, &letterhead.bottom].into_iter().flatten() {
        let Some(xobj_ref) = embed_image(img, &mut pdf, &mut alloc) else {
            return Err(Error::Serialization(format!(
                "letterhead image {} could not be embedded",
                img.pdf_name
            )));
        };
        image_xobjects.push((img.pdf_name, xobj_ref));
    }
    let t_resources = t0.elapsed();

    let n = contents.len();
    let page_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
    let content_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();

    for (i, c) in contents.into_iter().enumerate() {
        let raw = c.finish();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
        pdf.stream(content_ids[i], &compressed).filter(Filter::FlateDecode);
    }

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(n as i32);

    for i in 0..n {
        let mut page = pdf.page(page_ids[i]);
        page.media_box(Rect::new(0.0, 0.0, geometry.width, geometry.height))
            .parent(pages_id)
            .contents(content_ids[i]);
        let mut resources = page.resources();
        {
            let mut fonts = resources.fonts();
            for (name, font_ref) in &font_pairs {
                fonts.pair(Name(name.as_bytes()), *font_ref);
            }
        }
        if !image_xobjects.is_empty() {
            let mut xobjects = resources.x_objects();
            for (name, xobj_ref) in &image_xobjects {
                xobjects.pair(Name(name.as_bytes()), *xobj_ref);
            }
        }
    }

    let title = report_title(summary, customization);
    let author = company_name(summary, branding);
    {
        let mut info = pdf.document_info(info_id);
        info.title(TextStr(&title));
        if !author.is_empty() {
            info.author(TextStr(author));
        }
        info.creator(TextStr("consumo-pdf"));
        info.producer(TextStr(concat!("consumo-pdf ", env!("CARGO_PKG_VERSION"))));
        info.creation_date(
            Date::new(generated_at.year().clamp(0, 9999) as u16)
                .month(generated_at.month() as u8)
                .day(generated_at.day() as u8),
        );
    }
    let t_assembly = t0.elapsed();

    log::info!(
        "Render phases: aggregate={:.1}ms, layout={:.1}ms, resources={:.1}ms, assembly={:.1}ms ({} page(s), {} group(s))",
        t_aggregate.as_secs_f64() * 1000.0,
        (t_layout - t_aggregate).as_secs_f64() * 1000.0,
        (t_resources - t_layout).as_secs_f64() * 1000.0,
        (t_assembly - t_resources).as_secs_f64() * 1000.0,
        page_count,
        data.groups.len(),
    );

    Ok(Rendered {
        pdf: pdf.finish(),
        page_count,
        sections,
    })
}
