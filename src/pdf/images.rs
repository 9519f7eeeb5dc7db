use std::path::Path;

use pdf_writer::{Filter, Pdf, Ref};

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum ImageFormat {
    Jpeg,
    Png,
}

/// A decoded letterhead image ready to be embedded as an XObject.
#[derive(Clone)]
pub(crate) struct LetterheadImage {
    pub(crate) pdf_name: &'static str,
    data: Vec<u8>,
    format: ImageFormat,
    pub(crate) pixel_width: u32,
    pub(crate) pixel_height: u32,
}

impl LetterheadImage {
    /// Display height when scaled to `width`, keeping the aspect ratio.
    pub(crate) fn height_for_width(&self, width: f32) -> f32 {
        if self.pixel_width == 0 {
            return 0.0;
        }
        width * self.pixel_height as f32 / self.pixel_width as f32
    }
}

/// Load a letterhead image. Unreadable or undecodable files are logged and
/// skipped: the document is still produced, without that decoration.
pub(crate) fn load_letterhead(path: &Path, pdf_name: &'static str) -> Option<LetterheadImage> {
    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) => {
            log::warn!("Letterhead {} unreadable: {e} — skipping", path.display());
            return None;
        }
    };
    let format = match image::guess_format(&data) {
        Ok(image::ImageFormat::Jpeg) => ImageFormat::Jpeg,
        Ok(image::ImageFormat::Png) => ImageFormat::Png,
        Ok(other) => {
            log::warn!("Letterhead {} has unsupported format {other:?} — skipping", path.display());
            return None;
        }
        Err(e) => {
            log::warn!("Letterhead {} not an image: {e} — skipping", path.display());
            return None;
        }
    };
    let decoded = match image::load_from_memory(&data) {
        Ok(img) => img,
        Err(e) => {
            log::warn!("Letterhead {} failed to decode: {e} — skipping", path.display());
            return None;
        }
    };
    Some(LetterheadImage {
        pdf_name,
        pixel_width: decoded.width(),
        pixel_height: decoded.height(),
        data,
        format,
    })
}

/// Write the image XObject. JPEG data is passed through; PNG is decoded to
/// RGB with an optional alpha soft mask.
pub(crate) fn embed_image(
    img: &LetterheadImage,
    pdf: &mut Pdf,
    alloc: &mut impl FnMut() -> Ref,
) -> Option<Ref> {
    let xobj_ref = alloc();
    match img.format {
        ImageFormat::Jpeg => {
            let gray = image::load_from_memory(&img.data)
                .map(|d| d.color().channel_count() == 1)
                .unwrap_or(false);
            let mut xobj = pdf.image_xobject(xobj_ref, &img.data);
            xobj.filter(Filter::DctDecode);
            xobj.width(img.pixel_width as i32);
            xobj.height(img.pixel_height as i32);
            if gray {
                xobj.color_space().device_gray();
            } else {
                xobj.color_space().device_rgb();
            }
            xobj.bits_per_component(8);
        }
        ImageFormat::Png => {
            let decoded = match image::load_from_memory_with_format(&img.data, image::ImageFormat::Png) {
                Ok(d) => d,
                Err(e) => {
                    log::warn!("Letterhead {} failed to decode at embed: {e}", img.pdf_name);
                    return None;
                }
            };
            let rgba: image::RgbaImage = decoded.to_rgba8();
            let (w, h) = (rgba.width(), rgba.height());
            let has_alpha = rgba.pixels().any(|p| p.0[3] < 255);

            let rgb_data: Vec<u8> = rgba
                .pixels()
                .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
                .collect();
            let compressed_rgb = miniz_oxide::deflate::compress_to_vec_zlib(&rgb_data, 6);

            let smask_ref = if has_alpha {
                let alpha_data: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
                let compressed_alpha = miniz_oxide::deflate::compress_to_vec_zlib(&alpha_data, 6);
                let mask_ref = alloc();
                let mut mask = pdf.image_xobject(mask_ref, &compressed_alpha);
                mask.filter(Filter::FlateDecode);
                mask.width(w as i32);
                mask.height(h as i32);
                mask.color_space().device_gray();
                mask.bits_per_component(8);
                Some(mask_ref)
            } else {
                None
            };

            let mut xobj = pdf.image_xobject(xobj_ref, &compressed_rgb);
            xobj.filter(Filter::FlateDecode);
            xobj.width(w as i32);
            xobj.height(h as i32);
            xobj.color_space().device_rgb();
            xobj.bits_per_component(8);
            if let Some(mask_ref) = smask_ref {
                xobj.s_mask(mask_ref);
            }
        }
    }
    Some(xobj_ref)
}
