use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageBuffer, ImageFormat, RgbaImage};
use qrcode::types::QrError;
use qrcode::{Color, EcLevel, QrCode};
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::options::{QrOptions, RenderOptions};

/// Pixels per module when the requested width is too small for the symbol.
pub const FALLBACK_SCALE: u32 = 4;

/// Largest image side the rasteriser will allocate, in pixels.
pub const MAX_SIDE: u32 = 4096;

/// MIME type of every exported image.
pub const PNG_MIME: &str = "image/png";

/*---- Rasterisation ----*/

/// Encodes `value` and rasterises it into an RGBA image.
///
/// The output depends only on `value` and `options`: the same inputs always
/// produce the same pixels.
///
/// # Errors
///
/// Returns [`Error::Capacity`] if `value` does not fit in a version 40 symbol,
/// and [`Error::InvalidSize`] if width and margin overflow or need an image
/// wider than [`MAX_SIDE`].
///
/// # Example
///
/// ```rust
/// use qirust_surface::helper::render_image;
/// use qirust_surface::options::RenderOptions;
///
/// let img = render_image("Hello, World!", &RenderOptions::for_size(200)).unwrap();
/// assert_eq!(img.dimensions(), (200, 200));
/// ```
pub fn render_image(value: &str, options: &RenderOptions) -> Result<RgbaImage> {
    let code = encode_symbol(value)?;
    rasterize(&code, options)
}

fn encode_symbol(value: &str) -> Result<QrCode> {
    QrCode::with_error_correction_level(value, EcLevel::M).map_err(|err| match err {
        QrError::DataTooLong => Error::Capacity { len: value.len() },
        other => other.into(),
    })
}

// Draws the module matrix with a quiet zone of `margin` modules. When the
// requested width can hold the symbol the image is exactly `width` wide and
// modules are scaled fractionally; otherwise each module is FALLBACK_SCALE px.
fn rasterize(code: &QrCode, options: &RenderOptions) -> Result<RgbaImage> {
    let invalid = || Error::InvalidSize {
        width: options.width,
        margin: options.margin,
    };
    let modules = code.width() as u32;
    let span = options
        .margin
        .checked_mul(2)
        .and_then(|quiet| quiet.checked_add(modules))
        .ok_or_else(invalid)?;
    let (side, scale) = if options.width >= span {
        (options.width, options.width as f64 / span as f64)
    } else {
        let side = span.checked_mul(FALLBACK_SCALE).ok_or_else(invalid)?;
        (side, FALLBACK_SCALE as f64)
    };
    if side > MAX_SIDE {
        return Err(invalid());
    }
    let scaled_margin = options.margin as f64 * scale;
    let inner_end = side as f64 - scaled_margin;
    let last = code.width() - 1;

    let mut img = ImageBuffer::new(side, side);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let (px, py) = (x as f64, y as f64);
        let inside = px >= scaled_margin && py >= scaled_margin && px < inner_end && py < inner_end;
        *pixel = if inside {
            let qx = (((px - scaled_margin) / scale) as usize).min(last);
            let qy = (((py - scaled_margin) / scale) as usize).min(last);
            if code[(qx, qy)] == Color::Dark {
                options.dark
            } else {
                options.light
            }
        } else {
            options.light
        };
    }

    Ok(img)
}

/*---- Export encodings ----*/

/// Encodes an image as PNG bytes.
pub fn png_bytes(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Wraps PNG bytes in a self-contained `data:` URL.
pub fn data_url(png: &[u8]) -> String {
    format!("data:{};base64,{}", PNG_MIME, STANDARD.encode(png))
}

/// Encodes `value` straight to PNG bytes.
pub fn encode_png(value: &str, options: &RenderOptions) -> Result<Vec<u8>> {
    png_bytes(&render_image(value, options)?)
}

/*---- Standalone encoders ----*/

/// Generates a QR code PNG for `value` and returns it as a data URL.
///
/// Each call encodes from scratch; nothing is cached between calls.
///
/// # Example
///
/// ```rust
/// use qirust_surface::helper::to_data_url;
/// use qirust_surface::options::QrOptions;
///
/// # #[tokio::main]
/// # async fn main() {
/// let url = to_data_url("hello", &QrOptions::default()).await.unwrap();
/// assert!(url.starts_with("data:image/png;base64,"));
/// # }
/// ```
pub async fn to_data_url(value: &str, options: &QrOptions) -> Result<String> {
    let png = to_buffer(value, options).await?;
    Ok(data_url(&png))
}

/// Generates a QR code PNG for `value` and returns the raw bytes.
pub async fn to_buffer(value: &str, options: &QrOptions) -> Result<Vec<u8>> {
    let options = options.resolve()?;
    let value = value.to_owned();
    tokio::task::spawn_blocking(move || encode_png(&value, &options)).await?
}

// Tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DEFAULT_SIZE;
    use image::Rgba;
    use pretty_assertions::assert_eq;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    // Reads the module grid back out of an image by sampling module centres.
    fn sample_modules(img: &RgbaImage, modules: u32, margin: u32) -> Vec<bool> {
        let scale = img.width() as f64 / (modules + 2 * margin) as f64;
        let mut grid = Vec::with_capacity((modules * modules) as usize);
        for qy in 0..modules {
            for qx in 0..modules {
                let x = ((margin as f64 + qx as f64 + 0.5) * scale) as u32;
                let y = ((margin as f64 + qy as f64 + 0.5) * scale) as u32;
                grid.push(*img.get_pixel(x, y) == BLACK);
            }
        }
        grid
    }

    fn expected_modules(value: &str) -> (u32, Vec<bool>) {
        let code = QrCode::with_error_correction_level(value, EcLevel::M).unwrap();
        let width = code.width() as u32;
        let grid = code.to_colors().into_iter().map(|c| c == Color::Dark).collect();
        (width, grid)
    }

    #[test]
    fn test_render_image_dimensions() {
        let img = render_image("Hello, world!", &RenderOptions::for_size(200)).unwrap();
        assert_eq!(img.dimensions(), (200, 200));

        let img = render_image("Hello, world!", &RenderOptions::for_size(400)).unwrap();
        assert_eq!(img.dimensions(), (400, 400));
    }

    #[test]
    fn test_small_width_falls_back_to_fixed_scale() {
        let opts = RenderOptions::for_size(10);
        let img = render_image("1", &opts).unwrap();
        // Version 1 is 21 modules, plus a 2 module margin on each side.
        assert_eq!(img.dimensions(), (25 * FALLBACK_SCALE, 25 * FALLBACK_SCALE));
    }

    #[test]
    fn test_oversized_margin_is_rejected() {
        let opts = RenderOptions {
            margin: u32::MAX,
            ..RenderOptions::for_size(200)
        };
        match render_image("hello", &opts) {
            Err(Error::InvalidSize { width, margin }) => {
                assert_eq!((width, margin), (200, u32::MAX));
            }
            other => panic!("expected size error, got {:?}", other.map(|i| i.dimensions())),
        }

        // Fits in u32 but needs a fallback image wider than MAX_SIDE.
        let opts = RenderOptions {
            margin: 1000,
            ..RenderOptions::for_size(200)
        };
        assert!(matches!(render_image("hello", &opts), Err(Error::InvalidSize { .. })));
    }

    #[test]
    fn test_oversized_width_is_rejected() {
        let opts = RenderOptions::for_size(MAX_SIDE + 1);
        assert!(matches!(render_image("hello", &opts), Err(Error::InvalidSize { .. })));

        let img = render_image("hello", &RenderOptions::for_size(MAX_SIDE)).unwrap();
        assert_eq!(img.dimensions(), (MAX_SIDE, MAX_SIDE));
    }

    #[tokio::test]
    async fn test_to_buffer_zero_width_uses_default() {
        let bytes = to_buffer("hello", &QrOptions::default().width(0)).await.unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (DEFAULT_SIZE, DEFAULT_SIZE));
    }

    #[tokio::test]
    async fn test_to_buffer_reports_size_error() {
        let result = to_buffer("hello", &QrOptions::default().margin(u32::MAX)).await;
        assert!(matches!(result, Err(Error::InvalidSize { .. })));
    }

    #[test]
    fn test_margin_is_light() {
        let img = render_image("margin", &RenderOptions::for_size(200)).unwrap();
        assert_eq!(*img.get_pixel(0, 0), WHITE);
        assert_eq!(*img.get_pixel(199, 199), WHITE);
        assert_eq!(*img.get_pixel(5, 100), WHITE);
    }

    #[test]
    fn test_modules_match_encoded_value() {
        let value = "https://example.com";
        let img = render_image(value, &RenderOptions::for_size(200)).unwrap();
        let (modules, expected) = expected_modules(value);
        assert_eq!(sample_modules(&img, modules, 2), expected);
    }

    #[test]
    fn test_custom_colors() {
        let opts = QrOptions::default().dark("#ff0000").light("#00ff00").resolve().unwrap();
        let img = render_image("colors", &opts).unwrap();
        assert_eq!(*img.get_pixel(0, 0), Rgba([0, 255, 0, 255]));
        assert!(img.pixels().any(|p| *p == Rgba([255, 0, 0, 255])));
        assert!(img.pixels().all(|p| *p == Rgba([255, 0, 0, 255]) || *p == Rgba([0, 255, 0, 255])));
    }

    #[test]
    fn test_render_is_deterministic() {
        let opts = RenderOptions::for_size(256);
        let a = render_image("same input", &opts).unwrap();
        let b = render_image("same input", &opts).unwrap();
        assert!(a.as_raw() == b.as_raw());
    }

    #[test]
    fn test_capacity_error() {
        let value = "x".repeat(5000);
        match render_image(&value, &RenderOptions::default()) {
            Err(Error::Capacity { len }) => assert_eq!(len, 5000),
            other => panic!("expected capacity error, got {:?}", other.map(|i| i.dimensions())),
        }
    }

    #[tokio::test]
    async fn test_to_data_url_is_stable_per_value() {
        let opts = QrOptions::default();
        let first = to_data_url("hello", &opts).await.unwrap();
        let second = to_data_url("hello", &opts).await.unwrap();
        let other = to_data_url("world", &opts).await.unwrap();

        assert!(first.starts_with("data:image/png;base64,"));
        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn test_to_buffer_is_png() {
        let png = to_buffer("hello", &QrOptions::default().width(300)).await.unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (300, 300));
    }

    #[tokio::test]
    async fn test_to_buffer_rejects_bad_color() {
        let result = to_buffer("hello", &QrOptions::default().dark("nope")).await;
        assert!(matches!(result, Err(Error::InvalidColor(_))));
    }
}
