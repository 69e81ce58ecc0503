//! # qirust-surface
//!
//! A Rust library for rendering QR codes onto a pixel surface and exporting them.
//!
//! `qirust-surface` keeps a drawable surface in sync with a text value and a size, repainting
//! whenever either changes. Rendered codes can be saved as PNG files or handed to the host's share
//! sheet, with the clipboard as a fallback. Standalone encoders produce PNG bytes or a data URL
//! without any surface at all.
//!
//! ## Features
//!
//! - Async render lifecycle with `Idle`, `Loading`, `Ready` and `Failed` states.
//! - Stale renders are dropped: the newest request always wins.
//! - Bounded wait for the surface to be mounted, with an explicit error when it never is.
//! - Download as `qr-code-<timestamp>.png`, share natively or copy to the clipboard.
//! - Custom width, margin and colours for the standalone encoders.
//!
//! ## Installation
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! qirust-surface = "0.1" # Replace with the latest version
//! ```
//!
//! ## Example
//!
//! Render onto a surface and save it:
//!
//! ```rust
//! use qirust_surface::{RenderRequest, Renderer, RendererConfig, SurfaceHandle};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let surface = SurfaceHandle::mounted();
//! let renderer = Renderer::builder(surface)
//!     .config(RendererConfig::default().with_download_dir(std::env::temp_dir()))
//!     .on_generated(|| println!("QR code ready"))
//!     .on_error(|err| eprintln!("QR code failed: {}", err))
//!     .build();
//!
//! if let Some(render) = renderer.update(RenderRequest::new("https://example.com").size(300)) {
//!     render.await.unwrap();
//! }
//! let saved = renderer.download();
//! assert!(saved.is_some());
//! # }
//! ```
//!
//! Encode without a surface:
//!
//! ```rust
//! use qirust_surface::{helper::to_data_url, QrOptions};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let url = to_data_url("Hello, World!", &QrOptions::default().dark("#1e3a8a")).await.unwrap();
//! assert!(url.starts_with("data:image/png;base64,"));
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`render`]: The renderer and its lifecycle.
//! - [`actions`]: Download and Share buttons over a renderer.
//! - [`helper`]: Rasterisation and the standalone encoders.
//! - [`share`]: Share payloads and platform capability detection.
//! - [`surface`]: The drawable surface and its mount slot.
//! - [`options`]: Encoder options and colour parsing.

pub mod actions;
pub mod error;
pub mod helper;
pub mod options;
pub mod render;
pub mod share;
pub mod surface;

pub use actions::{Action, ActionSurface, ActionView};
pub use error::{Error, Result};
pub use options::{QrOptions, RenderOptions};
pub use render::{RenderOutcome, RenderRequest, RenderState, Renderer, RendererConfig, RetryPolicy};
pub use share::{Platform, ShareCapability};
pub use surface::{Surface, SurfaceHandle};
