//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;

use image::{Rgba, RgbaImage};
use otpvault::config::Settings;
use qrcode::{Color, QrCode};

/// Argon2 cost low enough for tests.
pub fn fast_settings() -> Settings {
    Settings {
        argon2_memory_kib: 8_192,
        argon2_iterations: 1,
        argon2_parallelism: 1,
        ..Settings::default()
    }
}

/// The same fast parameters as an `otpvault.toml` in `data_dir`.
pub fn write_fast_config(data_dir: &Path) {
    std::fs::create_dir_all(data_dir).unwrap();
    std::fs::write(
        data_dir.join("otpvault.toml"),
        "argon2_memory_kib = 8192\nargon2_iterations = 1\nargon2_parallelism = 1\n",
    )
    .unwrap();
}

/// Render `text` as a QR symbol: 6 px modules, 4 module quiet zone.
pub fn render_qr(text: &str) -> RgbaImage {
    const MODULE_PX: u32 = 6;
    const QUIET_ZONE: u32 = 4;

    let code = QrCode::new(text.as_bytes()).unwrap();
    let width = code.width() as u32;
    let colors = code.to_colors();
    let size = (width + QUIET_ZONE * 2) * MODULE_PX;

    RgbaImage::from_fn(size, size, |px, py| {
        let (mx, my) = (px / MODULE_PX, py / MODULE_PX);
        let inside = (QUIET_ZONE..QUIET_ZONE + width).contains(&mx)
            && (QUIET_ZONE..QUIET_ZONE + width).contains(&my);
        if inside && colors[((my - QUIET_ZONE) * width + (mx - QUIET_ZONE)) as usize] == Color::Dark
        {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    })
}

/// Render `text` to a PNG at `path`.
pub fn write_qr_png(path: &Path, text: &str) {
    render_qr(text).save(path).unwrap();
}
