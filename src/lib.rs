pub mod aggregate;
mod error;
mod fonts;
pub mod format;
pub mod model;
pub mod pdf;

pub use error::{Error, ErrorKind, Result};
pub use fonts::Fonts;
pub use model::{Branding, Customization, Summary};
pub use pdf::compose::Section;

use std::io::Write;
use std::path::Path;
use std::time::Instant;

use fonts::{FontSources, font_path_from_env, load_font_file};
use pdf::Letterhead;
use pdf::images::load_letterhead;

/// A finished document.
#[derive(Debug)]
pub struct Report {
    pub pdf: Vec<u8>,
    pub page_count: usize,
    /// Sections in the order they were emitted.
    pub sections: Vec<Section>,
}

impl Report {
    pub fn write_to(&self, mut out: impl Write) -> Result<()> {
        out.write_all(&self.pdf)?;
        out.flush()?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.pdf)?;
        Ok(())
    }

    pub fn has_section(&self, section: Section) -> bool {
        self.sections.contains(&section)
    }
}

/// Resources resolved once and shared by every compilation: font files and
/// letterhead images. An `Engine` is `Send + Sync`; compilations running in
/// parallel share nothing mutable.
#[derive(Clone, Default)]
pub struct Engine {
    fonts: FontSources,
    letterhead: Letterhead,
}

fn resolve_font(configured: Option<&Path>, bold: bool) -> Result<Option<std::sync::Arc<fonts::FontData>>> {
    match configured.map(Path::to_path_buf).or_else(|| font_path_from_env(bold)) {
        Some(path) => load_font_file(&path).map(Some),
        None => Ok(None),
    }
}

impl Engine {
    /// Load the fonts and letterhead named by `branding`. Fonts fall back to
    /// `CONSUMO_PDF_FONT` / `CONSUMO_PDF_FONT_BOLD`, then to built-in
    /// Helvetica. A configured font that cannot be loaded is an
    /// [`Error::BackendUnavailable`]; a broken letterhead is only skipped.
    pub fn new(branding: &Branding) -> Result<Self> {
        let t0 = Instant::now();
        let fonts = FontSources {
            regular: resolve_font(branding.font_regular.as_deref(), false)?,
            bold: resolve_font(branding.font_bold.as_deref(), true)?,
        };
        let letterhead = Letterhead {
            top: branding
                .letterhead_top
                .as_deref()
                .and_then(|p| load_letterhead(p, "LhTop")),
            bottom: branding
                .letterhead_bottom
                .as_deref()
                .and_then(|p| load_letterhead(p, "LhBottom")),
        };
        log::info!(
            "Engine ready in {:.1}ms (embedded fonts: {}, letterhead: top={} bottom={})",
            t0.elapsed().as_secs_f64() * 1000.0,
            fonts.regular.is_some() || fonts.bold.is_some(),
            letterhead.top.is_some(),
            letterhead.bottom.is_some(),
        );
        Ok(Self { fonts, letterhead })
    }

    /// Engine using the built-in Helvetica faces and no letterhead.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Compile one report. Inputs are only read.
    pub fn compile(
        &self,
        summary: &Summary,
        branding: &Branding,
        customization: &Customization,
    ) -> Result<Report> {
        let t0 = Instant::now();
        let fonts = Fonts::from_sources(&self.fonts);
        let rendered = pdf::render(summary, branding, customization, fonts, &self.letterhead)?;
        log::info!(
            "Compiled report: {} item(s), {} page(s), {} bytes in {:.1}ms",
            summary.items.len(),
            rendered.page_count,
            rendered.pdf.len(),
            t0.elapsed().as_secs_f64() * 1000.0,
        );
        Ok(Report {
            pdf: rendered.pdf,
            page_count: rendered.page_count,
            sections: rendered.sections,
        })
    }

    /// Parse a JSON summary and compile it.
    pub fn compile_json(
        &self,
        summary_json: &[u8],
        branding: &Branding,
        customization: &Customization,
    ) -> Result<Report> {
        let summary: Summary = serde_json::from_slice(summary_json)?;
        self.compile(&summary, branding, customization)
    }
}

/// One-shot compilation with a fresh [`Engine`].
pub fn compile_report(
    summary: &Summary,
    branding: &Branding,
    customization: &Customization,
) -> Result<Report> {
    Engine::new(branding)?.compile(summary, branding, customization)
}
