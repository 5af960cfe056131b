//! PNG encoding for slice exports

use base64::Engine;
use image::ImageEncoder;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("pixel buffer is {actual} bytes, expected {expected} for {width}x{height} RGBA8")]
    Size {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),
}

/// Encode tightly packed RGBA8 pixels as PNG
pub fn encode_png(width: u32, height: u32, rgba: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(EncodeError::Size {
            width,
            height,
            expected,
            actual: rgba.len(),
        });
    }

    let mut png_data = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_data);
    encoder.write_image(rgba, width, height, image::ExtendedColorType::Rgba8)?;
    Ok(png_data)
}

/// [`encode_png`] followed by standard base64
pub fn encode_png_base64(width: u32, height: u32, rgba: &[u8]) -> Result<String, EncodeError> {
    let png_data = encode_png(width, height, rgba)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(&png_data))
}
