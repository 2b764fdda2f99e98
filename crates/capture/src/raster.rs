//! Raster decoding and re-encoding

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::DynamicImage;

use figdiff_common::{BoundingBox, Dimensions, Error, Result, TextBox};

use crate::script::CssRect;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Decode a `data:image/png;base64,` URL into PNG bytes
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let encoded = data_url.strip_prefix(PNG_DATA_URL_PREFIX).ok_or_else(|| {
        let head: String = data_url.chars().take(32).collect();
        Error::UnsupportedFormat(format!("expected a PNG data URL, got {:?}", head))
    })?;
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::Validation(format!("capture payload is not valid base64: {}", e)))
}

/// Pixel size of encoded image bytes
pub fn dimensions_of(bytes: &[u8]) -> Result<Dimensions> {
    let img = image::load_from_memory(bytes)?;
    Ok(Dimensions::new(img.width(), img.height()))
}

/// Re-encode `img` as PNG with the strongest deflate setting
pub fn encode_png_best(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    let encoder = PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive);
    img.write_with_encoder(encoder)?;
    Ok(out.into_inner())
}

/// Re-encode PNG bytes, keeping the original when it is already smaller
pub fn recompress_png(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;
    let recompressed = encode_png_best(&img)?;
    if recompressed.len() < bytes.len() {
        Ok(recompressed)
    } else {
        Ok(bytes.to_vec())
    }
}

/// Convert CSS-pixel text rectangles into raster pixels, clamped to `bounds`
pub fn scale_text_boxes(rects: &[CssRect], scale: f64, bounds: Dimensions) -> Vec<TextBox> {
    rects
        .iter()
        .filter_map(|r| {
            let x = (r.x * scale).floor().max(0.0) as u32;
            let y = (r.y * scale).floor().max(0.0) as u32;
            if x >= bounds.width || y >= bounds.height {
                return None;
            }
            let right = ((r.x + r.width) * scale).ceil().max(0.0) as u32;
            let bottom = ((r.y + r.height) * scale).ceil().max(0.0) as u32;
            let right = right.min(bounds.width);
            let bottom = bottom.min(bounds.height);
            if right <= x || bottom <= y {
                return None;
            }
            Some(BoundingBox {
                x,
                y,
                width: right - x,
                height: bottom - y,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use test_case::test_case;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_data_url() {
        let bytes = png_bytes(6, 3);
        let url = format!("{}{}", PNG_DATA_URL_PREFIX, STANDARD.encode(&bytes));
        let decoded = decode_data_url(&url).unwrap();
        assert_eq!(decoded, bytes);
        assert_eq!(dimensions_of(&decoded).unwrap(), Dimensions::new(6, 3));
    }

    #[test_case("data:image/jpeg;base64,AAAA", "format" ; "jpeg payload")]
    #[test_case("", "format" ; "empty payload")]
    #[test_case("data:image/png;base64,@@@", "validation" ; "bad base64")]
    fn test_decode_rejects(url: &str, error_type: &str) {
        let err = decode_data_url(url).unwrap_err();
        assert_eq!(err.error_type(), error_type);
    }

    #[test]
    fn test_recompress_keeps_dimensions() {
        let bytes = png_bytes(64, 64);
        let out = recompress_png(&bytes).unwrap();
        assert!(out.len() <= bytes.len());
        assert_eq!(dimensions_of(&out).unwrap(), Dimensions::new(64, 64));
    }

    #[test]
    fn test_scale_text_boxes() {
        let rects = [
            CssRect { x: 2.0, y: 1.0, width: 10.0, height: 5.0 },
            CssRect { x: 500.0, y: 0.0, width: 10.0, height: 5.0 },
        ];
        let boxes = scale_text_boxes(&rects, 3.0, Dimensions::new(60, 30));
        assert_eq!(boxes, vec![BoundingBox { x: 6, y: 3, width: 30, height: 15 }]);
    }
}
