use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use pdf_writer::{Name, Pdf, Rect, Ref, Str};
use ttf_parser::Face;

use crate::error::Error;

/// A font file mapped into memory once per [`crate::Engine`] and shared by
/// every compilation.
pub(crate) struct FontData {
    name: String,
    data: Mmap,
    face_index: u32,
}

impl FontData {
    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, self.face_index).ok()
    }
}

fn is_font_collection(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ttc") || e.eq_ignore_ascii_case("otc"))
}

/// Open, map and validate a TrueType/OpenType file. Any failure means the
/// configured text backend is unusable.
pub(crate) fn load_font_file(path: &Path) -> Result<Arc<FontData>, Error> {
    let unavailable = |source: Box<dyn std::error::Error + Send + Sync>| Error::BackendUnavailable {
        component: format!("font {}", path.display()),
        source,
    };

    let file = std::fs::File::open(path).map_err(|e| unavailable(Box::new(e)))?;
    let data = unsafe { Mmap::map(&file) }.map_err(|e| unavailable(Box::new(e)))?;
    let face_index = 0;
    if is_font_collection(path) && ttf_parser::fonts_in_collection(&data).unwrap_or(0) == 0 {
        return Err(unavailable("empty font collection".into()));
    }
    let face = Face::parse(&data, face_index).map_err(|e| unavailable(Box::new(e)))?;
    let name = face
        .names()
        .into_iter()
        .find(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME && n.is_unicode())
        .and_then(|n| n.to_string())
        .unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Embedded")
                .to_string()
        });
    drop(face);

    log::debug!("load_font_file: {} ({name})", path.display());
    Ok(Arc::new(FontData {
        name: name.replace(' ', ""),
        data,
        face_index,
    }))
}

/// Font path from the environment, used when branding names none.
pub(crate) fn font_path_from_env(bold: bool) -> Option<PathBuf> {
    let var = if bold {
        "CONSUMO_PDF_FONT_BOLD"
    } else {
        "CONSUMO_PDF_FONT"
    };
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Windows-1252 (WinAnsi) byte to Unicode char mapping.
/// Bytes 0x80-0x9F are remapped; all others map directly to their Unicode codepoint.
fn winansi_to_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        _ => byte as char,
    }
}

/// Map a single Unicode char to its WinAnsi byte, or 0 if unmappable.
fn char_to_winansi(c: char) -> u8 {
    match c as u32 {
        0x0020..=0x007F => c as u8,
        0x00A0..=0x00FF => c as u8,
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => 0,
    }
}

/// Approximate Helvetica widths at 1000 units/em for WinAnsi chars 32..=255.
fn helvetica_widths() -> Vec<f32> {
    (32u8..=255u8)
        .map(|b| match b {
            32 => 278.0,                          // space
            33..=47 => 333.0,                     // punctuation
            48..=57 => 556.0,                     // digits
            58..=64 => 333.0,                     // more punctuation
            73 | 74 => 278.0,                     // I J (narrow uppercase)
            77 => 833.0,                          // M (wide)
            65..=90 => 667.0,                     // uppercase A-Z (average)
            91..=96 => 333.0,                     // brackets etc.
            102 | 105 | 106 | 108 | 116 => 278.0, // narrow lowercase: f i j l t
            109 | 119 => 833.0,                   // m w (wide)
            97..=122 => 556.0,                    // lowercase a-z (average)
            _ => 556.0,
        })
        .collect()
}

/// Helvetica-Bold runs wider on letters; digits keep the same advance.
fn helvetica_bold_widths() -> Vec<f32> {
    (32u8..=255u8)
        .map(|b| match b {
            32 => 278.0,
            33..=47 => 333.0,
            48..=57 => 556.0,
            58..=64 => 333.0,
            73 => 278.0,
            74 => 556.0,
            77 => 833.0,
            65..=90 => 722.0,
            91..=96 => 333.0,
            105 | 106 | 108 => 278.0,
            102 | 116 => 333.0,
            109 => 889.0,
            119 => 778.0,
            97..=122 => 611.0,
            _ => 611.0,
        })
        .collect()
}

/// Characters whose metrics are cached for an embedded font: the WinAnsi
/// repertoire plus Latin Extended-A and general punctuation.
fn cached_chars() -> impl Iterator<Item = char> {
    (32u8..=255u8)
        .map(winansi_to_char)
        .chain((0x0100u32..=0x017F).filter_map(char::from_u32))
        .chain((0x2010u32..=0x2030).filter_map(char::from_u32))
}

struct TrueTypeState {
    data: Arc<FontData>,
    glyphs: HashMap<char, (u16, f32)>,
    fallback_width: f32,
    remapper: subsetter::GlyphRemapper,
    /// new gid -> (char, width in 1000-units), for /W and ToUnicode
    used: BTreeMap<u16, (char, f32)>,
}

enum FontKind {
    Builtin {
        base_font: &'static [u8],
        widths_1000: Vec<f32>,
    },
    TrueType(Box<TrueTypeState>),
}

pub struct FontEntry {
    pub(crate) pdf_name: &'static str,
    kind: FontKind,
    pub(crate) line_h_ratio: f32,
    pub(crate) ascender_ratio: f32,
}

impl FontEntry {
    fn builtin(pdf_name: &'static str, bold: bool) -> Self {
        let (base_font, widths_1000): (&'static [u8], _) = if bold {
            (&b"Helvetica-Bold"[..], helvetica_bold_widths())
        } else {
            (&b"Helvetica"[..], helvetica_widths())
        };
        Self {
            pdf_name,
            kind: FontKind::Builtin {
                base_font,
                widths_1000,
            },
            line_h_ratio: 1.15,
            ascender_ratio: 0.718,
        }
    }

    fn truetype(pdf_name: &'static str, data: Arc<FontData>) -> Self {
        let Some(face) = data.face() else {
            // load_font_file already validated the face; stay usable regardless
            log::warn!("Font {} failed to re-parse — using Helvetica", data.name);
            return Self::builtin(pdf_name, false);
        };
        let units = face.units_per_em() as f32;
        let glyphs: HashMap<char, (u16, f32)> = cached_chars()
            .filter_map(|ch| {
                let gid = face.glyph_index(ch)?;
                let adv = face.glyph_hor_advance(gid).unwrap_or(0);
                Some((ch, (gid.0, adv as f32 / units * 1000.0)))
            })
            .collect();
        let fallback_width = glyphs.get(&'0').map(|g| g.1).unwrap_or(556.0);
        let line_gap = face.line_gap() as f32;
        let line_h_ratio = (face.ascender() as f32 - face.descender() as f32 + line_gap) / units;
        let ascender_ratio = face.ascender() as f32 / units;
        drop(face);

        Self {
            pdf_name,
            kind: FontKind::TrueType(Box::new(TrueTypeState {
                data,
                glyphs,
                fallback_width,
                remapper: subsetter::GlyphRemapper::new(),
                used: BTreeMap::new(),
            })),
            line_h_ratio,
            ascender_ratio,
        }
    }

    /// Width of a single character in 1000-units.
    pub(crate) fn char_width_1000(&self, ch: char) -> f32 {
        match &self.kind {
            FontKind::Builtin { widths_1000, .. } => {
                let byte = char_to_winansi(ch);
                if byte >= 32 {
                    widths_1000[(byte - 32) as usize]
                } else {
                    widths_1000[('?' as u8 - 32) as usize]
                }
            }
            FontKind::TrueType(tt) => tt
                .glyphs
                .get(&ch)
                .map(|g| g.1)
                .unwrap_or(tt.fallback_width),
        }
    }

    pub(crate) fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars()
            .map(|ch| self.char_width_1000(ch) * font_size / 1000.0)
            .sum()
    }

    pub(crate) fn space_width(&self, font_size: f32) -> f32 {
        self.char_width_1000(' ') * font_size / 1000.0
    }

    /// Bytes for a `Tj` operand. Embedded fonts record every glyph shown so the
    /// subset written at assembly contains exactly what the pages use.
    pub(crate) fn encode(&mut self, text: &str) -> Vec<u8> {
        match &mut self.kind {
            FontKind::Builtin { .. } => text
                .chars()
                .map(|c| match char_to_winansi(c) {
                    0 => b'?',
                    b => b,
                })
                .collect(),
            FontKind::TrueType(tt) => {
                let mut out = Vec::with_capacity(text.len() * 2);
                for ch in text.chars() {
                    let new_gid = match tt.glyphs.get(&ch).copied() {
                        Some((gid, width)) => {
                            let new_gid = tt.remapper.remap(gid);
                            tt.used.entry(new_gid).or_insert((ch, width));
                            new_gid
                        }
                        None => 0,
                    };
                    out.extend_from_slice(&new_gid.to_be_bytes());
                }
                out
            }
        }
    }

    /// Write the font dictionary (and, for embedded fonts, the subset program).
    pub(crate) fn write(&self, pdf: &mut Pdf, alloc: &mut impl FnMut() -> Ref) -> Ref {
        let font_ref = alloc();
        match &self.kind {
            FontKind::Builtin { base_font, .. } => {
                pdf.type1_font(font_ref)
                    .base_font(Name(base_font))
                    .encoding_predefined(Name(b"WinAnsiEncoding"));
            }
            FontKind::TrueType(tt) => embed_truetype(pdf, font_ref, tt, alloc),
        }
        font_ref
    }
}

/// Embed a TrueType/OpenType font as a CIDFont (Type0 composite) with Identity-H encoding.
/// The font data is subsetted to the glyphs the document used.
fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    tt: &TrueTypeState,
    alloc: &mut impl FnMut() -> Ref,
) {
    let font_name = tt.data.name.as_str();
    let (bbox, ascent, descent, cap_height) = match tt.data.face() {
        Some(face) => {
            let units = face.units_per_em() as f32;
            let bb = face.global_bounding_box();
            (
                Rect::new(
                    bb.x_min as f32 / units * 1000.0,
                    bb.y_min as f32 / units * 1000.0,
                    bb.x_max as f32 / units * 1000.0,
                    bb.y_max as f32 / units * 1000.0,
                ),
                face.ascender() as f32 / units * 1000.0,
                face.descender() as f32 / units * 1000.0,
                face.capital_height()
                    .map(|h| h as f32 / units * 1000.0)
                    .unwrap_or(700.0),
            )
        }
        None => (Rect::new(0.0, -200.0, 1000.0, 900.0), 800.0, -200.0, 700.0),
    };

    let subset_data = subsetter::subset(&tt.data.data, tt.data.face_index, &tt.remapper)
        .unwrap_or_else(|e| {
            log::warn!("Font subsetting failed for {font_name}: {e} — embedding full font");
            tt.data.data.to_vec()
        });

    let descriptor_ref = alloc();
    let data_ref = alloc();
    let cid_font_ref = alloc();
    let tounicode_ref = alloc();

    let data_len = i32::try_from(subset_data.len()).unwrap_or(i32::MAX);
    pdf.stream(data_ref, &subset_data)
        .pair(Name(b"Length1"), data_len);

    pdf.font_descriptor(descriptor_ref)
        .name(Name(font_name.as_bytes()))
        .flags(pdf_writer::types::FontFlags::NON_SYMBOLIC)
        .bbox(bbox)
        .italic_angle(0.0)
        .ascent(ascent)
        .descent(descent)
        .cap_height(cap_height)
        .stem_v(80.0)
        .font_file2(data_ref);

    let system_info = pdf_writer::types::SystemInfo {
        registry: Str(b"Adobe"),
        ordering: Str(b"Identity"),
        supplement: 0,
    };
    {
        let mut cid = pdf.cid_font(cid_font_ref);
        cid.subtype(pdf_writer::types::CidFontType::Type2);
        cid.base_font(Name(font_name.as_bytes()));
        cid.system_info(system_info);
        cid.font_descriptor(descriptor_ref);
        cid.default_width(0.0);
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
        if !tt.used.is_empty() {
            let mut w = cid.widths();
            for (&gid, &(_, width)) in &tt.used {
                w.consecutive(gid, [width]);
            }
        }
    }

    let cmap_name = format!("{font_name}-UTF16");
    let mut cmap = pdf_writer::types::UnicodeCmap::new(
        Name(cmap_name.as_bytes()),
        pdf_writer::types::SystemInfo {
            registry: Str(b"Adobe"),
            ordering: Str(b"Identity"),
            supplement: 0,
        },
    );
    for (&gid, &(ch, _)) in &tt.used {
        cmap.pair(gid, ch);
    }
    let cmap_data = cmap.finish();
    pdf.stream(tounicode_ref, cmap_data.as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(font_name.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_font_ref)
        .to_unicode(tounicode_ref);
}

/// Font sources resolved once by the engine.
#[derive(Clone, Default)]
pub(crate) struct FontSources {
    pub(crate) regular: Option<Arc<FontData>>,
    pub(crate) bold: Option<Arc<FontData>>,
}

/// The regular and bold faces used by one compilation.
pub struct Fonts {
    regular: FontEntry,
    bold: FontEntry,
}

impl Fonts {
    /// Built-in Helvetica / Helvetica-Bold; no font files needed.
    pub fn builtin() -> Self {
        Self {
            regular: FontEntry::builtin("F1", false),
            bold: FontEntry::builtin("F2", true),
        }
    }

    pub(crate) fn from_sources(sources: &FontSources) -> Self {
        let regular = match &sources.regular {
            Some(data) => FontEntry::truetype("F1", data.clone()),
            None => FontEntry::builtin("F1", false),
        };
        // A regular face without a bold companion is reused for bold text.
        let bold = match (&sources.bold, &sources.regular) {
            (Some(data), _) | (None, Some(data)) => FontEntry::truetype("F2", data.clone()),
            (None, None) => FontEntry::builtin("F2", true),
        };
        Self { regular, bold }
    }

    pub(crate) fn get(&self, bold: bool) -> &FontEntry {
        if bold { &self.bold } else { &self.regular }
    }

    pub(crate) fn get_mut(&mut self, bold: bool) -> &mut FontEntry {
        if bold { &mut self.bold } else { &mut self.regular }
    }

    /// Writes both fonts and returns `(resource name, ref)` pairs for page resources.
    pub(crate) fn write(
        &self,
        pdf: &mut Pdf,
        alloc: &mut impl FnMut() -> Ref,
    ) -> Vec<(&'static str, Ref)> {
        [&self.regular, &self.bold]
            .into_iter()
            .map(|entry| (entry.pdf_name, entry.write(pdf, alloc)))
            .collect()
    }
}
