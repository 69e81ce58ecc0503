//! The action surface: a rendered code plus Download and Share buttons.
//!
//! This layer only composes. It reads the renderer's state to decide what to
//! show, and its buttons call the renderer's exports before notifying the
//! host. Notifications are fire-and-forget.

use image::RgbaImage;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::render::{RenderOutcome, RenderRequest, Renderer};
use crate::share::ShareCapability;

pub type NotifyCallback = Arc<dyn Fn() + Send + Sync>;

/// A button on the action surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Download,
    Share,
}

impl Action {
    pub fn label(self) -> &'static str {
        match self {
            Action::Download => "Download",
            Action::Share => "Share",
        }
    }
}

/// A snapshot of what the action surface shows.
#[derive(Debug, Clone)]
pub struct ActionView {
    /// Current surface pixels, if painted.
    pub surface: Option<RgbaImage>,
    /// Host styling, passed through untouched.
    pub class_name: String,
    /// Surface drawn at reduced opacity.
    pub dimmed: bool,
    /// Busy indicator drawn over the surface.
    pub busy: bool,
    /// Buttons to draw, in order.
    pub actions: Vec<Action>,
}

/// Composes a [`Renderer`] with a busy indicator and export buttons.
///
/// # Example
///
/// ```rust
/// use qirust_surface::actions::{Action, ActionSurface};
/// use qirust_surface::render::{RenderRequest, Renderer};
/// use qirust_surface::surface::SurfaceHandle;
///
/// # #[tokio::main]
/// # async fn main() {
/// let actions = ActionSurface::new(Renderer::new(SurfaceHandle::mounted()));
/// actions.update(RenderRequest::new("hi")).unwrap().await.unwrap();
/// assert_eq!(actions.view().actions, vec![Action::Download, Action::Share]);
/// # }
/// ```
#[derive(Clone)]
pub struct ActionSurface {
    renderer: Renderer,
    show_actions: bool,
    class_name: String,
    on_download: Option<NotifyCallback>,
    on_share: Option<NotifyCallback>,
}

impl ActionSurface {
    pub fn new(renderer: Renderer) -> Self {
        Self {
            renderer,
            show_actions: true,
            class_name: String::new(),
            on_download: None,
            on_share: None,
        }
    }

    pub fn show_actions(mut self, show: bool) -> Self {
        self.show_actions = show;
        self
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    pub fn on_download(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_download = Some(Arc::new(f));
        self
    }

    pub fn on_share(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_share = Some(Arc::new(f));
        self
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Forwards a new value/size to the renderer.
    pub fn update(&self, request: RenderRequest) -> Option<JoinHandle<RenderOutcome>> {
        self.renderer.update(request)
    }

    pub fn view(&self) -> ActionView {
        let loading = self.renderer.is_loading();
        let actions = if self.show_actions && !loading {
            vec![Action::Download, Action::Share]
        } else {
            Vec::new()
        };

        ActionView {
            surface: self.renderer.surface().snapshot(),
            class_name: self.class_name.clone(),
            dimmed: loading,
            busy: loading,
            actions,
        }
    }

    /// Download button: saves the code, then notifies the host.
    pub fn download(&self) -> Option<PathBuf> {
        let path = self.renderer.download();
        if let Some(on_download) = &self.on_download {
            on_download();
        }
        path
    }

    /// Share button: starts the share without waiting for it, then notifies
    /// the host.
    pub fn share(&self) -> JoinHandle<Option<ShareCapability>> {
        let renderer = self.renderer.clone();
        let task = tokio::spawn(async move { renderer.share().await });
        if let Some(on_share) = &self.on_share {
            on_share();
        }
        task
    }

    /// Dispatches a button press.
    pub fn press(&self, action: Action) {
        match action {
            Action::Download => {
                self.download();
            }
            Action::Share => {
                self.share();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{RendererConfig, RetryPolicy};
    use crate::surface::SurfaceHandle;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn renderer(surface: SurfaceHandle) -> Renderer {
        let config = RendererConfig::default()
            .with_mount_delay(Duration::ZERO)
            .with_retry(RetryPolicy {
                max_attempts: 200,
                delay: Duration::from_millis(5),
            })
            .with_download_dir(std::env::temp_dir().join(format!("qirust-actions-{}", uuid::Uuid::new_v4())));
        Renderer::builder(surface).config(config).build()
    }

    #[test]
    fn test_labels() {
        assert_eq!(Action::Download.label(), "Download");
        assert_eq!(Action::Share.label(), "Share");
    }

    #[tokio::test]
    async fn test_buttons_hidden_while_loading() {
        let surface = SurfaceHandle::unmounted();
        let actions = ActionSurface::new(renderer(surface.clone())).class_name("card");

        let handle = actions.update(RenderRequest::new("busy")).unwrap();
        let view = actions.view();
        assert!(view.busy);
        assert!(view.dimmed);
        assert!(view.actions.is_empty());
        assert!(view.surface.is_none());
        assert_eq!(view.class_name, "card");

        surface.mount();
        handle.await.unwrap();

        let view = actions.view();
        assert!(!view.busy);
        assert_eq!(view.actions, vec![Action::Download, Action::Share]);
        assert_eq!(view.surface.map(|img| img.dimensions()), Some((200, 200)));
    }

    #[tokio::test]
    async fn test_show_actions_false() {
        let actions = ActionSurface::new(renderer(SurfaceHandle::mounted())).show_actions(false);
        actions.update(RenderRequest::new("quiet")).unwrap().await.unwrap();
        assert!(actions.view().actions.is_empty());
        assert!(actions.renderer().state().is_ready());
        assert_eq!(actions.renderer().requested(), Some(RenderRequest::new("quiet")));
    }

    #[tokio::test]
    async fn test_buttons_notify_host() {
        let downloads = Arc::new(AtomicUsize::new(0));
        let shares = Arc::new(AtomicUsize::new(0));
        let (d, s) = (downloads.clone(), shares.clone());

        let actions = ActionSurface::new(renderer(SurfaceHandle::mounted()))
            .on_download(move || {
                d.fetch_add(1, Ordering::SeqCst);
            })
            .on_share(move || {
                s.fetch_add(1, Ordering::SeqCst);
            });
        actions.update(RenderRequest::new("notify")).unwrap().await.unwrap();

        let path = actions.download().unwrap();
        assert!(path.exists());
        assert_eq!(downloads.load(Ordering::SeqCst), 1);

        // No share facilities: the share fails, the host is still notified.
        let shared = actions.share().await.unwrap();
        assert_eq!(shared, None);
        assert_eq!(shares.load(Ordering::SeqCst), 1);

        actions.press(Action::Download);
        assert_eq!(downloads.load(Ordering::SeqCst), 2);

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }
}
