use std::io::Cursor;

use base64::Engine;
use image::{DynamicImage, RgbaImage};

use crate::parser::backend::{RawImage, RawMask};
use crate::PdfError;

/// Images narrower or shorter than this many pixels are bullets or icons,
/// never diagrams.
pub const MIN_IMAGE_DIMENSION: u32 = 30;

// ---------------------------------------------------------------------------
// Pixel formats
// ---------------------------------------------------------------------------

/// Pixel layout of an image's decoded samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelFormat {
    /// Interleaved RGB with a matching alpha plane from the soft mask.
    Rgba,
    /// Interleaved 8-bit RGB, no alpha.
    Rgb,
    /// A JPEG payload; decoded with the `image` crate and classified again.
    Jpeg,
    Unsupported(String),
}

/// Classify a raw image by colour space, depth, and remaining filter.
pub fn pixel_format(raw: &RawImage) -> PixelFormat {
    match raw.filter.as_deref() {
        None => {}
        Some("DCTDecode") => return PixelFormat::Jpeg,
        Some(other) => return PixelFormat::Unsupported(other.to_string()),
    }

    let color_space = raw.color_space.as_deref().unwrap_or("none");
    if color_space != "DeviceRGB" || raw.bits_per_component != 8 {
        return PixelFormat::Unsupported(format!(
            "{} at {} bits per component",
            color_space, raw.bits_per_component
        ));
    }

    match &raw.soft_mask {
        Some(mask) if mask_matches(mask, raw.width, raw.height) => PixelFormat::Rgba,
        _ => PixelFormat::Rgb,
    }
}

fn mask_matches(mask: &RawMask, width: u32, height: u32) -> bool {
    mask.bits_per_component == 8
        && mask.width == width
        && mask.height == height
        && mask.data.len() == width as usize * height as usize
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a raw image into an RGBA bitmap.
///
/// Returns `Ok(None)` for pixel formats this pipeline does not handle and for
/// images smaller than [`MIN_IMAGE_DIMENSION`]; both are skipped silently.
/// Returns an error when the samples do not match the declared geometry.
pub fn decode_rgba(raw: &RawImage) -> Result<Option<RgbaImage>, PdfError> {
    let bitmap = match pixel_format(raw) {
        PixelFormat::Rgba => {
            let mask = raw.soft_mask.as_ref().map(|m| m.data.as_slice()).unwrap_or(&[]);
            Some(rgb_with_alpha(raw, mask)?)
        }
        PixelFormat::Rgb => Some(rgb_with_alpha(raw, &[])?),
        PixelFormat::Jpeg => decode_jpeg(raw)?,
        PixelFormat::Unsupported(_) => None,
    };

    Ok(bitmap.filter(|b| b.width() >= MIN_IMAGE_DIMENSION && b.height() >= MIN_IMAGE_DIMENSION))
}

/// Interleave RGB samples with an alpha plane. An empty plane means fully
/// opaque.
fn rgb_with_alpha(raw: &RawImage, alpha: &[u8]) -> Result<RgbaImage, PdfError> {
    let pixel_count = raw.width as usize * raw.height as usize;
    if raw.data.len() < pixel_count * 3 {
        return Err(PdfError::Image(format!(
            "{}: expected {} RGB bytes, got {}",
            raw.name,
            pixel_count * 3,
            raw.data.len()
        )));
    }

    let mut rgba = Vec::with_capacity(pixel_count * 4);
    for (i, px) in raw.data.chunks_exact(3).take(pixel_count).enumerate() {
        rgba.extend_from_slice(px);
        rgba.push(alpha.get(i).copied().unwrap_or(u8::MAX));
    }

    RgbaImage::from_raw(raw.width, raw.height, rgba)
        .ok_or_else(|| PdfError::Image(format!("{}: cannot build RGBA buffer", raw.name)))
}

/// Decode a JPEG payload. RGB results get an opaque alpha channel; any other
/// decoded layout is unsupported.
fn decode_jpeg(raw: &RawImage) -> Result<Option<RgbaImage>, PdfError> {
    let decoded = image::load_from_memory_with_format(&raw.data, image::ImageFormat::Jpeg)
        .map_err(|e| PdfError::Image(format!("{}: JPEG decode failed: {}", raw.name, e)))?;

    match decoded {
        DynamicImage::ImageRgb8(rgb) => Ok(Some(DynamicImage::ImageRgb8(rgb).to_rgba8())),
        DynamicImage::ImageRgba8(rgba) => Ok(Some(rgba)),
        _ => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode an RGBA bitmap as a PNG `data:` URL, consuming the bitmap.
pub fn to_data_url(bitmap: RgbaImage) -> Result<String, PdfError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(bitmap)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PdfError::Image(format!("PNG encode failed: {}", e)))?;

    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&buf)
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_image(width: u32, height: u32) -> RawImage {
        RawImage {
            name: "Im1".to_string(),
            width,
            height,
            bits_per_component: 8,
            color_space: Some("DeviceRGB".to_string()),
            filter: None,
            data: vec![10; (width * height * 3) as usize],
            soft_mask: None,
        }
    }

    #[test]
    fn test_rgb_gets_opaque_alpha() {
        let raw = rgb_image(32, 32);
        assert_eq!(pixel_format(&raw), PixelFormat::Rgb);

        let bitmap = decode_rgba(&raw).unwrap().unwrap();
        assert_eq!(bitmap.dimensions(), (32, 32));
        assert!(bitmap.pixels().all(|p| p.0 == [10, 10, 10, 255]));
    }

    #[test]
    fn test_soft_mask_is_copied_as_alpha() {
        let mut raw = rgb_image(30, 30);
        raw.soft_mask = Some(RawMask {
            width: 30,
            height: 30,
            bits_per_component: 8,
            data: vec![77; 900],
        });
        assert_eq!(pixel_format(&raw), PixelFormat::Rgba);

        let bitmap = decode_rgba(&raw).unwrap().unwrap();
        assert!(bitmap.pixels().all(|p| p.0[3] == 77));
    }

    #[test]
    fn test_mismatched_mask_falls_back_to_rgb() {
        let mut raw = rgb_image(30, 30);
        raw.soft_mask = Some(RawMask {
            width: 15,
            height: 15,
            bits_per_component: 8,
            data: vec![0; 225],
        });
        assert_eq!(pixel_format(&raw), PixelFormat::Rgb);
    }

    #[test]
    fn test_gray_is_unsupported() {
        let mut raw = rgb_image(40, 40);
        raw.color_space = Some("DeviceGray".to_string());
        raw.data = vec![0; 1600];
        assert!(matches!(pixel_format(&raw), PixelFormat::Unsupported(_)));
        assert!(decode_rgba(&raw).unwrap().is_none());
    }

    #[test]
    fn test_cmyk_and_sub_byte_are_unsupported() {
        let mut cmyk = rgb_image(40, 40);
        cmyk.color_space = Some("DeviceCMYK".to_string());
        assert!(matches!(pixel_format(&cmyk), PixelFormat::Unsupported(_)));

        let mut packed = rgb_image(40, 40);
        packed.bits_per_component = 1;
        assert!(matches!(pixel_format(&packed), PixelFormat::Unsupported(_)));
    }

    #[test]
    fn test_ccitt_filter_is_unsupported() {
        let mut raw = rgb_image(40, 40);
        raw.filter = Some("CCITTFaxDecode".to_string());
        assert!(decode_rgba(&raw).unwrap().is_none());
    }

    #[test]
    fn test_icon_sized_images_are_rejected() {
        assert!(decode_rgba(&rgb_image(29, 100)).unwrap().is_none());
        assert!(decode_rgba(&rgb_image(100, 29)).unwrap().is_none());
        assert!(decode_rgba(&rgb_image(30, 30)).unwrap().is_some());
    }

    #[test]
    fn test_short_buffer_is_an_error() {
        let mut raw = rgb_image(40, 40);
        raw.data.truncate(100);
        assert!(matches!(decode_rgba(&raw), Err(PdfError::Image(_))));
    }

    #[test]
    fn test_jpeg_round_trips_through_decoder() {
        let source = image::RgbImage::from_pixel(48, 48, image::Rgb([200, 100, 50]));
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(source)
            .write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();

        let raw = RawImage {
            filter: Some("DCTDecode".to_string()),
            data: jpeg,
            ..rgb_image(48, 48)
        };
        let bitmap = decode_rgba(&raw).unwrap().unwrap();
        assert_eq!(bitmap.dimensions(), (48, 48));
        assert!(bitmap.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn test_corrupt_jpeg_is_an_error() {
        let raw = RawImage {
            filter: Some("DCTDecode".to_string()),
            data: vec![0xFF, 0xD8, 0x00, 0x01],
            ..rgb_image(48, 48)
        };
        assert!(matches!(decode_rgba(&raw), Err(PdfError::Image(_))));
    }

    #[test]
    fn test_data_url_is_png() {
        let bitmap = decode_rgba(&rgb_image(30, 30)).unwrap().unwrap();
        let url = to_data_url(bitmap).unwrap();
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }
}
