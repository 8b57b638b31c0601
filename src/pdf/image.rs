use image::{ImageFormat, ImageReader};
use std::io::Cursor;

use crate::error::{OcrError, Result};

/// Header information for one background image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Reads the header of `bytes` without decoding pixel data.
pub fn probe_image(index: usize, bytes: &[u8]) -> Result<ImageInfo> {
    let invalid = |reason: String| OcrError::ImageFormat { index, reason };
    if bytes.is_empty() {
        return Err(invalid("empty image data".to_string()));
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| invalid(err.to_string()))?;
    let format = reader
        .format()
        .ok_or_else(|| invalid("unrecognized image format".to_string()))?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|err| invalid(err.to_string()))?;
    if width == 0 || height == 0 {
        return Err(invalid(format!("image has no pixels ({}x{})", width, height)));
    }

    Ok(ImageInfo {
        format,
        width,
        height,
    })
}

/// Probes every image, failing on the first one that is not a raster image.
pub fn validate_images<I: AsRef<[u8]>>(images: &[I]) -> Result<Vec<ImageInfo>> {
    images
        .iter()
        .enumerate()
        .map(|(index, bytes)| probe_image(index, bytes.as_ref()))
        .collect()
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([240, 240, 240]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}
