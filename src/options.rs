//! Rendering options.
//!
//! [`QrOptions`] is what hosts pass in: every field is optional and may be
//! deserialized from JSON or any other serde format. [`QrOptions::resolve`]
//! turns it into a fully populated [`RenderOptions`] with parsed colours,
//! which is what the rasteriser consumes.

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Side length, in pixels, used when no width is given.
pub const DEFAULT_SIZE: u32 = 200;

/// Quiet zone around the symbol, in modules.
pub const DEFAULT_MARGIN: u32 = 2;

pub const DEFAULT_DARK: &str = "#000000";
pub const DEFAULT_LIGHT: &str = "#FFFFFF";

/// Host-facing colour settings. Omitted colours fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorOptions {
    pub dark: Option<String>,
    pub light: Option<String>,
}

/// Host-facing encoder options.
///
/// # Example
///
/// ```rust
/// use qirust_surface::options::QrOptions;
///
/// let opts = QrOptions::default().width(320).margin(4);
/// let resolved = opts.resolve().unwrap();
/// assert_eq!(resolved.width, 320);
/// assert_eq!(resolved.margin, 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrOptions {
    pub width: Option<u32>,
    pub margin: Option<u32>,
    pub color: Option<ColorOptions>,
}

impl QrOptions {
    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn margin(mut self, margin: u32) -> Self {
        self.margin = Some(margin);
        self
    }

    pub fn dark(mut self, dark: impl Into<String>) -> Self {
        self.color.get_or_insert_with(ColorOptions::default).dark = Some(dark.into());
        self
    }

    pub fn light(mut self, light: impl Into<String>) -> Self {
        self.color.get_or_insert_with(ColorOptions::default).light = Some(light.into());
        self
    }

    /// Fills in defaults for every omitted field and parses the colours.
    /// A width or margin of `0` counts as omitted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidColor`] if either colour is not a hex colour.
    pub fn resolve(&self) -> Result<RenderOptions> {
        let color = self.color.clone().unwrap_or_default();
        Ok(RenderOptions {
            width: self.width.filter(|w| *w > 0).unwrap_or(DEFAULT_SIZE),
            margin: self.margin.filter(|m| *m > 0).unwrap_or(DEFAULT_MARGIN),
            dark: parse_hex_color(color.dark.as_deref().unwrap_or(DEFAULT_DARK))?,
            light: parse_hex_color(color.light.as_deref().unwrap_or(DEFAULT_LIGHT))?,
        })
    }
}

/// Fully resolved options used by the rasteriser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Requested image side length in pixels.
    pub width: u32,
    /// Quiet zone in modules.
    pub margin: u32,
    pub dark: Rgba<u8>,
    pub light: Rgba<u8>,
}

impl RenderOptions {
    /// The fixed options of the interactive path: black on white, margin 2.
    pub fn for_size(size: u32) -> Self {
        Self {
            width: size,
            ..Self::default()
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_SIZE,
            margin: DEFAULT_MARGIN,
            dark: Rgba([0, 0, 0, 255]),
            light: Rgba([255, 255, 255, 255]),
        }
    }
}

/// Parses `#RGB`, `#RGBA`, `#RRGGBB` or `#RRGGBBAA` (the `#` is optional).
///
/// # Example
///
/// ```rust
/// use image::Rgba;
/// use qirust_surface::options::parse_hex_color;
///
/// assert_eq!(parse_hex_color("#f80").unwrap(), Rgba([0xff, 0x88, 0x00, 0xff]));
/// ```
pub fn parse_hex_color(hex: &str) -> Result<Rgba<u8>> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidColor(hex.to_string()));
    }

    let mut expanded: String = match digits.len() {
        3 | 4 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => digits.to_string(),
        _ => return Err(Error::InvalidColor(hex.to_string())),
    };
    if expanded.len() == 6 {
        expanded.push_str("ff");
    }

    let mut rgba = [0u8; 4];
    for (i, channel) in rgba.iter_mut().enumerate() {
        *channel = u8::from_str_radix(&expanded[i * 2..i * 2 + 2], 16)
            .map_err(|_| Error::InvalidColor(hex.to_string()))?;
    }
    Ok(Rgba(rgba))
}
