//! The drawable surface and the slot it is mounted into.
//!
//! A [`Surface`] is a pixel buffer that stays blank until the first paint. A
//! [`SurfaceHandle`] is the mount point shared between the host, which mounts
//! and unmounts the surface, and the renderer, which paints onto it. Paints
//! and reads only happen while a surface is mounted.

use image::RgbaImage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::helper::png_bytes;

/// A pixel-addressable target holding the last painted image.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    pixels: Option<RgbaImage>,
}

impl Surface {
    /// Creates a blank surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` until something has been painted.
    pub fn is_blank(&self) -> bool {
        self.pixels.is_none()
    }

    /// Replaces the surface contents. The surface takes the image's size.
    pub fn paint(&mut self, image: RgbaImage) {
        self.pixels = Some(image);
    }

    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.pixels.as_ref()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.pixels.as_ref().map(|img| img.dimensions())
    }

    /// Encodes the current pixels as PNG. `None` for a blank surface.
    pub fn to_png(&self) -> Result<Option<Vec<u8>>> {
        self.pixels.as_ref().map(png_bytes).transpose()
    }
}

/// Shared mount slot for a [`Surface`].
///
/// Cloning the handle shares the slot, so the host can keep a clone to mount
/// the surface while the renderer owns the original.
///
/// # Example
///
/// ```rust
/// use qirust_surface::surface::SurfaceHandle;
///
/// let handle = SurfaceHandle::unmounted();
/// assert!(!handle.is_mounted());
/// handle.mount();
/// assert!(handle.is_mounted());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SurfaceHandle {
    slot: Arc<Mutex<Option<Surface>>>,
}

impl SurfaceHandle {
    /// A handle whose surface has not been mounted yet.
    pub fn unmounted() -> Self {
        Self::default()
    }

    /// A handle with a blank surface already mounted.
    pub fn mounted() -> Self {
        let handle = Self::default();
        handle.mount();
        handle
    }

    /// Mounts a blank surface. Mounting twice keeps the existing surface.
    pub fn mount(&self) {
        self.lock().get_or_insert_with(Surface::new);
    }

    /// Detaches the surface and hands it back.
    pub fn unmount(&self) -> Option<Surface> {
        self.lock().take()
    }

    pub fn is_mounted(&self) -> bool {
        self.lock().is_some()
    }

    /// Runs `f` against the mounted surface, or returns `None` if unmounted.
    pub fn with_surface<R>(&self, f: impl FnOnce(&mut Surface) -> R) -> Option<R> {
        self.lock().as_mut().map(f)
    }

    /// A copy of the current pixels, if mounted and painted.
    pub fn snapshot(&self) -> Option<RgbaImage> {
        self.lock().as_ref().and_then(|s| s.pixels().cloned())
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.lock().as_ref().and_then(Surface::dimensions)
    }

    // A panic while painting leaves the pixels whole, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Option<Surface>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
