//! The render lifecycle.
//!
//! A [`Renderer`] repaints its surface whenever the requested value or size
//! changes. Each request takes a new generation number; only the newest
//! generation may touch the surface, the state or the callbacks, so a slow
//! render that finishes after a newer one is dropped instead of painting
//! stale pixels.
//!
//! Failures never escape an operation. They are logged and handed to the
//! `on_error` callback when one is set.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::RgbaImage;
use log::{debug, info, warn};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::helper::{png_bytes, render_image};
use crate::options::{RenderOptions, DEFAULT_SIZE};
use crate::share::{Platform, ShareCapability, SharePayload};
use crate::surface::{Surface, SurfaceHandle};

/// What to draw. Two requests with the same value and size draw the same thing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub value: String,
    /// Side length in pixels.
    pub size: u32,
}

impl RenderRequest {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            size: DEFAULT_SIZE,
        }
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }
}

/// Where the renderer is in its lifecycle.
#[derive(Debug, Clone, Default)]
pub enum RenderState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(Arc<Error>),
}

impl RenderState {
    pub fn is_loading(&self) -> bool {
        matches!(self, RenderState::Loading)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, RenderState::Ready)
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            RenderState::Failed(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// How a single render cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Painted,
    Failed,
    /// A newer request took over; nothing was applied.
    Superseded,
}

/// Bounded polling for the surface to be mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            delay: Duration::from_millis(100),
        }
    }
}

/// Renderer configuration.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use qirust_surface::render::{RendererConfig, RetryPolicy};
///
/// let cfg = RendererConfig::default()
///     .with_download_dir("exports")
///     .with_retry(RetryPolicy { max_attempts: 5, delay: Duration::from_millis(20) });
/// assert_eq!(cfg.retry.max_attempts, 5);
/// ```
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Pause before the first look at the surface.
    pub mount_delay: Duration,
    pub retry: RetryPolicy,
    /// Where `download()` writes its files.
    pub download_dir: PathBuf,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mount_delay: Duration::from_millis(10),
            retry: RetryPolicy::default(),
            download_dir: PathBuf::from("generated"),
        }
    }
}

impl RendererConfig {
    pub fn with_mount_delay(mut self, delay: Duration) -> Self {
        self.mount_delay = delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }
}

/// Turns a value into pixels. Completion order across calls is not guaranteed.
#[async_trait]
pub trait Painter: Send + Sync {
    async fn paint(&self, value: &str, options: &RenderOptions) -> Result<RgbaImage>;
}

/// The QR encoder, run on tokio's blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrPainter;

#[async_trait]
impl Painter for QrPainter {
    async fn paint(&self, value: &str, options: &RenderOptions) -> Result<RgbaImage> {
        let value = value.to_owned();
        let options = *options;
        tokio::task::spawn_blocking(move || render_image(&value, &options)).await?
    }
}

pub type GeneratedCallback = Arc<dyn Fn() + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&Error) + Send + Sync>;

/// Name of a downloaded file, e.g. `qr-code-1700000000000.png`.
pub fn download_file_name(at: DateTime<Utc>) -> String {
    format!("qr-code-{}.png", at.timestamp_millis())
}

pub struct RendererBuilder {
    surface: SurfaceHandle,
    config: RendererConfig,
    platform: Platform,
    painter: Arc<dyn Painter>,
    on_generated: Option<GeneratedCallback>,
    on_error: Option<ErrorCallback>,
}

impl RendererBuilder {
    pub fn config(mut self, config: RendererConfig) -> Self {
        self.config = config;
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn painter(mut self, painter: Arc<dyn Painter>) -> Self {
        self.painter = painter;
        self
    }

    pub fn on_generated(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_generated = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Renderer {
        let (state, _) = watch::channel(RenderState::Idle);
        Renderer {
            inner: Arc::new(Inner {
                surface: self.surface,
                config: self.config,
                platform: self.platform,
                painter: self.painter,
                on_generated: self.on_generated,
                on_error: self.on_error,
                state,
                generation: AtomicU64::new(0),
                requested: Mutex::new(None),
            }),
        }
    }
}

/// Paints QR codes onto a surface and exports them.
///
/// Cloning is cheap; clones share the surface, state and generation counter.
/// [`Renderer::update`] spawns onto the current tokio runtime.
///
/// # Example
///
/// ```rust
/// use qirust_surface::render::{RenderOutcome, RenderRequest, Renderer};
/// use qirust_surface::surface::SurfaceHandle;
///
/// # #[tokio::main]
/// # async fn main() {
/// let renderer = Renderer::new(SurfaceHandle::mounted());
/// let outcome = renderer.render(RenderRequest::new("https://example.com")).await;
/// assert_eq!(outcome, RenderOutcome::Painted);
/// assert_eq!(renderer.surface().dimensions(), Some((200, 200)));
/// # }
/// ```
#[derive(Clone)]
pub struct Renderer {
    inner: Arc<Inner>,
}

struct Inner {
    surface: SurfaceHandle,
    config: RendererConfig,
    platform: Platform,
    painter: Arc<dyn Painter>,
    on_generated: Option<GeneratedCallback>,
    on_error: Option<ErrorCallback>,
    state: watch::Sender<RenderState>,
    generation: AtomicU64,
    requested: Mutex<Option<RenderRequest>>,
}

impl Renderer {
    pub fn new(surface: SurfaceHandle) -> Self {
        Self::builder(surface).build()
    }

    pub fn builder(surface: SurfaceHandle) -> RendererBuilder {
        RendererBuilder {
            surface,
            config: RendererConfig::default(),
            platform: Platform::default(),
            painter: Arc::new(QrPainter),
            on_generated: None,
            on_error: None,
        }
    }

    /*---- Lifecycle ----*/

    /// Starts a render if `request` differs from the last one.
    ///
    /// The state switches to `Loading` before this returns. Returns `None`
    /// when the request is unchanged and nothing was started.
    pub fn update(&self, request: RenderRequest) -> Option<JoinHandle<RenderOutcome>> {
        let generation = {
            let mut requested = self.inner.requested.lock().unwrap_or_else(PoisonError::into_inner);
            if requested.as_ref() == Some(&request) {
                return None;
            }
            *requested = Some(request.clone());
            self.begin()
        };
        let renderer = self.clone();
        Some(tokio::spawn(async move { renderer.run(generation, request).await }))
    }

    /// Runs one render cycle in place, whether or not the request changed.
    pub async fn render(&self, request: RenderRequest) -> RenderOutcome {
        let generation = {
            let mut requested = self.inner.requested.lock().unwrap_or_else(PoisonError::into_inner);
            *requested = Some(request.clone());
            self.begin()
        };
        self.run(generation, request).await
    }

    // Callers hold the `requested` lock, so the newest generation always
    // belongs to the stored request. Bumping inside the watch lock keeps an
    // older render from overwriting `Loading` after the bump.
    fn begin(&self) -> u64 {
        let mut generation = 0;
        self.inner.state.send_modify(|state| {
            generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = RenderState::Loading;
        });
        generation
    }

    async fn run(&self, generation: u64, request: RenderRequest) -> RenderOutcome {
        debug!(
            "Render #{} started: {} bytes at {}px",
            generation,
            request.value.len(),
            request.size
        );
        match self.paint(generation, &request).await {
            Ok(true) => {
                debug!("Render #{} painted", generation);
                if let Some(on_generated) = &self.inner.on_generated {
                    on_generated();
                }
                RenderOutcome::Painted
            }
            Ok(false) => {
                debug!("Render #{} superseded, result dropped", generation);
                RenderOutcome::Superseded
            }
            Err(err) => self.fail(generation, err),
        }
    }

    async fn paint(&self, generation: u64, request: &RenderRequest) -> Result<bool> {
        self.wait_for_surface(generation).await?;
        if !self.is_current(generation) {
            return Ok(false);
        }

        let options = RenderOptions::for_size(request.size);
        let image = self.inner.painter.paint(&request.value, &options).await?;

        self.inner
            .surface
            .with_surface(|surface| self.commit(generation, surface, image))
            .ok_or(Error::SurfaceDetached)
    }

    async fn wait_for_surface(&self, generation: u64) -> Result<()> {
        let RendererConfig { mount_delay, retry, .. } = &self.inner.config;
        tokio::time::sleep(*mount_delay).await;

        let attempts = retry.max_attempts.max(1);
        for attempt in 1..=attempts {
            // A superseded render stops waiting; paint() then drops it.
            if self.inner.surface.is_mounted() || !self.is_current(generation) {
                return Ok(());
            }
            if attempt < attempts {
                debug!(
                    "Surface not mounted (attempt {}/{}), retrying in {:?}",
                    attempt, attempts, retry.delay
                );
                tokio::time::sleep(retry.delay).await;
            }
        }
        Err(Error::SurfaceUnavailable { attempts })
    }

    // Runs under the surface lock so a newer generation always paints last.
    fn commit(&self, generation: u64, surface: &mut Surface, image: RgbaImage) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        surface.paint(image);
        self.set_state(generation, RenderState::Ready)
    }

    fn fail(&self, generation: u64, err: Error) -> RenderOutcome {
        let err = Arc::new(err);
        if !self.set_state(generation, RenderState::Failed(err.clone())) {
            debug!("Render #{} failed after being superseded: {}", generation, err);
            return RenderOutcome::Superseded;
        }
        self.report(&err);
        RenderOutcome::Failed
    }

    fn set_state(&self, generation: u64, next: RenderState) -> bool {
        self.inner.state.send_if_modified(|state| {
            if self.is_current(generation) {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
    }

    fn report(&self, err: &Error) {
        warn!("QR code error: {}", err);
        if let Some(on_error) = &self.inner.on_error {
            on_error(err);
        }
    }

    /*---- Exports ----*/

    /// Saves the painted code as `qr-code-<unix-millis>.png` in the download
    /// directory and returns its path.
    ///
    /// Does nothing and returns `None` when the surface is unmounted or has
    /// not been painted. Write failures go to `on_error`.
    pub fn download(&self) -> Option<PathBuf> {
        match self.try_download() {
            Ok(path) => path,
            Err(err) => {
                self.report(&err);
                None
            }
        }
    }

    fn try_download(&self) -> Result<Option<PathBuf>> {
        let Some(image) = self.inner.surface.snapshot() else {
            debug!("Nothing painted yet, download skipped");
            return Ok(None);
        };
        let png = png_bytes(&image)?;

        let dir = &self.inner.config.download_dir;
        fs::create_dir_all(dir)?;
        let path = dir.join(download_file_name(Utc::now()));
        fs::write(&path, png)?;

        info!("Saved QR code to {}", path.display());
        Ok(Some(path))
    }

    /// Shares the painted code through native share, falling back to the
    /// clipboard. Returns the route taken.
    ///
    /// Returns `None` when nothing is painted or the share failed; failures
    /// go to `on_error`.
    pub async fn share(&self) -> Option<ShareCapability> {
        match self.try_share().await {
            Ok(capability) => capability,
            Err(err) => {
                self.report(&err);
                None
            }
        }
    }

    async fn try_share(&self) -> Result<Option<ShareCapability>> {
        let Some(image) = self.inner.surface.snapshot() else {
            debug!("Nothing painted yet, share skipped");
            return Ok(None);
        };
        let png = tokio::task::spawn_blocking(move || png_bytes(&image)).await??;

        let payload = SharePayload::qr_code(png);
        let capability = self.inner.platform.detect(&payload);
        self.inner.platform.dispatch(capability, payload).await?;

        info!("Shared QR code via {:?}", capability);
        Ok(Some(capability))
    }

    /*---- Accessors ----*/

    pub fn state(&self) -> RenderState {
        self.inner.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    /// A receiver that sees every state change.
    pub fn subscribe(&self) -> watch::Receiver<RenderState> {
        self.inner.state.subscribe()
    }

    pub fn surface(&self) -> &SurfaceHandle {
        &self.inner.surface
    }

    /// Generation of the most recent request; 0 before the first.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Option<RenderRequest> {
        self.inner.requested.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
