//! QR symbol decoding for captured or on-disk images.
//!
//! One detection pass per image: the pixels are reduced to luma, grids
//! are located once, and the first grid that decodes wins. There are no
//! retries with rotations or filters. Decoding touches no disk or
//! network, so the same bytes always give the same answer.

use std::path::Path;

use image::RgbaImage;

use crate::errors::{OtpVaultError, Result};

/// Decode the first QR symbol in `image`.
pub fn decode(image: &RgbaImage) -> Result<String> {
    decode_rgba(image.width(), image.height(), image.as_raw())
}

/// Decode the first QR symbol in a raw RGBA8 buffer.
///
/// A buffer whose length does not match `width * height * 4` holds
/// nothing decodable.
pub fn decode_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<String> {
    let (w, h) = (width as usize, height as usize);
    let expected = w.checked_mul(h).and_then(|n| n.checked_mul(4));
    if w == 0 || h == 0 || expected != Some(rgba.len()) {
        tracing::debug!(width, height, len = rgba.len(), "rgba buffer size mismatch");
        return Err(OtpVaultError::DecodeNotFound);
    }

    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| {
        let i = (y * w + x) * 4;
        luma(rgba[i], rgba[i + 1], rgba[i + 2], rgba[i + 3])
    });

    let grids = prepared.detect_grids();
    tracing::debug!(grids = grids.len(), "qr detection pass");

    grids
        .iter()
        .find_map(|grid| grid.decode().ok().map(|(_, content)| content))
        .ok_or(OtpVaultError::DecodeNotFound)
}

/// Load a PNG or JPEG from disk and decode it.
pub fn decode_file(path: &Path) -> Result<String> {
    let image = image::open(path)
        .map_err(|e| OtpVaultError::ImageError(format!("{}: {e}", path.display())))?;
    decode(&image.to_rgba8())
}

/// Decode an encoded image (PNG or JPEG bytes) held in memory.
pub fn decode_bytes(bytes: &[u8]) -> Result<String> {
    let image =
        image::load_from_memory(bytes).map_err(|e| OtpVaultError::ImageError(e.to_string()))?;
    decode(&image.to_rgba8())
}

/// Rec. 601 luma, composited over white so transparent pixels read as
/// background.
fn luma(r: u8, g: u8, b: u8, a: u8) -> u8 {
    let y = (u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114) / 1000;
    let a = u32::from(a);
    ((y * a + 255 * (255 - a)) / 255) as u8
}
