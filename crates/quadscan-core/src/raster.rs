//! Raster I/O on top of `image`.
//!
//! Every raster in the pipeline is an 8-bit RGB buffer (`height x width x 3`,
//! row-major, RGB channel order).

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, ImageReader, RgbImage};

use crate::geometry::CropRect;

/// Decoded 3-channel raster.
pub type Raster = RgbImage;

#[derive(thiserror::Error, Debug)]
pub enum RasterError {
    #[error("failed to read image '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
}

/// Read and decode an image file. The format is sniffed from the content, so
/// scratch files without a meaningful extension still decode.
pub fn open_raster(path: impl AsRef<Path>) -> Result<Raster, RasterError> {
    let path = path.as_ref();
    let io_err = |source| RasterError::Io {
        path: path.display().to_string(),
        source,
    };
    let reader = ImageReader::open(path)
        .map_err(io_err)?
        .with_guessed_format()
        .map_err(io_err)?;
    Ok(reader.decode()?.to_rgb8())
}

/// Decode an in-memory encoded image.
pub fn decode_raster(bytes: &[u8]) -> Result<Raster, RasterError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Copy the pixels covered by `rect`, clamped to the raster.
///
/// Returns `None` when the clamped rectangle is empty.
pub fn crop(raster: &Raster, rect: &CropRect) -> Option<Raster> {
    let clamped = CropRect {
        x0: rect.x0.max(0),
        y0: rect.y0.max(0),
        x1: rect.x1.min(raster.width() as i64),
        y1: rect.y1.min(raster.height() as i64),
    };
    if clamped.is_degenerate() {
        return None;
    }
    let view = image::imageops::crop_imm(
        raster,
        clamped.x0 as u32,
        clamped.y0 as u32,
        clamped.width(),
        clamped.height(),
    );
    Some(view.to_image())
}

pub fn to_gray(raster: &Raster) -> GrayImage {
    image::imageops::grayscale(raster)
}

/// Encode as baseline JPEG with the given quality (1..=100).
pub fn encode_jpeg(raster: &Raster, quality: u8) -> Result<Vec<u8>, RasterError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(raster)
        .map_err(RasterError::Encode)?;
    Ok(buf)
}

/// Write a raster to disk; the format follows the file extension.
pub fn write_raster(raster: &Raster, path: impl AsRef<Path>) -> Result<(), RasterError> {
    raster.save(path.as_ref()).map_err(RasterError::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(w: u32, h: u32) -> Raster {
        RgbImage::from_fn(w, h, |x, y| Rgb([x as u8, y as u8, 7]))
    }

    #[test]
    fn crop_copies_exact_region() {
        let img = gradient(20, 10);
        let out = crop(
            &img,
            &CropRect {
                x0: 2,
                y0: 3,
                x1: 6,
                y1: 5,
            },
        )
        .expect("crop");
        assert_eq!(out.dimensions(), (4, 2));
        assert_eq!(out.get_pixel(0, 0), &Rgb([2, 3, 7]));
        assert_eq!(out.get_pixel(3, 1), &Rgb([5, 4, 7]));
    }

    #[test]
    fn crop_clamps_to_raster_and_rejects_outside() {
        let img = gradient(8, 8);
        let out = crop(
            &img,
            &CropRect {
                x0: -3,
                y0: 6,
                x1: 4,
                y1: 20,
            },
        )
        .expect("crop");
        assert_eq!(out.dimensions(), (4, 2));

        let outside = CropRect {
            x0: 9,
            y0: 0,
            x1: 12,
            y1: 4,
        };
        assert!(crop(&img, &outside).is_none());
    }

    #[test]
    fn jpeg_round_trip_keeps_dimensions() {
        let img = gradient(16, 12);
        let bytes = encode_jpeg(&img, 85).expect("encode");
        let back = decode_raster(&bytes).expect("decode");
        assert_eq!(back.dimensions(), (16, 12));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(
            decode_raster(b"definitely not an image"),
            Err(RasterError::Decode(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = open_raster("/nonexistent/quadscan/missing.png").unwrap_err();
        assert!(err.to_string().contains("missing.png"));
    }
}
