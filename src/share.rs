//! Sharing a rendered code through the host platform.
//!
//! Hosts expose what they can do through the [`NativeShare`] and
//! [`Clipboard`] traits and collect them in a [`Platform`].
//! [`Platform::detect`] picks the route for a payload and
//! [`Platform::dispatch`] carries it out.

use async_trait::async_trait;
use log::debug;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Error, Result};
use crate::helper::PNG_MIME;

pub const SHARE_TITLE: &str = "QR Code";
pub const SHARE_TEXT: &str = "Check out this QR code";
pub const SHARE_FILE_NAME: &str = "qr-code.png";

/// A file attached to a share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Everything handed to a native share sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePayload {
    pub files: Vec<ShareFile>,
    pub title: String,
    pub text: String,
}

impl SharePayload {
    /// The standard payload for a rendered code: one PNG plus a fixed title and text.
    pub fn qr_code(png: Vec<u8>) -> Self {
        Self {
            files: vec![ShareFile {
                name: SHARE_FILE_NAME.to_string(),
                mime: PNG_MIME.to_string(),
                bytes: png,
            }],
            title: SHARE_TITLE.to_string(),
            text: SHARE_TEXT.to_string(),
        }
    }

    /// The first PNG file, used for the clipboard route.
    fn image(&self) -> Option<&ShareFile> {
        self.files.iter().find(|f| f.mime == PNG_MIME)
    }
}

/// A native share sheet.
#[async_trait]
pub trait NativeShare: Send + Sync {
    /// Whether the share sheet accepts file payloads like this one.
    fn can_share(&self, payload: &SharePayload) -> bool;

    async fn share(&self, payload: SharePayload) -> Result<()>;
}

/// The system clipboard.
#[async_trait]
pub trait Clipboard: Send + Sync {
    /// Whether data of `mime` can be written.
    fn supports(&self, mime: &str) -> bool;

    async fn write(&self, mime: &str, bytes: Vec<u8>) -> Result<()>;
}

/// The route a share takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareCapability {
    NativeShare,
    ClipboardFallback,
    Unsupported,
}

/// The sharing facilities the host provides.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use qirust_surface::share::{MemoryClipboard, Platform, ShareCapability, SharePayload};
///
/// let platform = Platform::new().with_clipboard(Arc::new(MemoryClipboard::new()));
/// let payload = SharePayload::qr_code(vec![1, 2, 3]);
/// assert_eq!(platform.detect(&payload), ShareCapability::ClipboardFallback);
/// ```
#[derive(Clone, Default)]
pub struct Platform {
    native: Option<Arc<dyn NativeShare>>,
    clipboard: Option<Arc<dyn Clipboard>>,
}

impl Platform {
    /// A platform with no sharing facilities.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_native_share(mut self, native: Arc<dyn NativeShare>) -> Self {
        self.native = Some(native);
        self
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    /// Picks native share when it accepts the payload, the clipboard when it
    /// takes PNG images, and [`ShareCapability::Unsupported`] otherwise.
    pub fn detect(&self, payload: &SharePayload) -> ShareCapability {
        if let Some(native) = &self.native {
            if native.can_share(payload) {
                return ShareCapability::NativeShare;
            }
        }
        match &self.clipboard {
            Some(clipboard) if clipboard.supports(PNG_MIME) => ShareCapability::ClipboardFallback,
            _ => ShareCapability::Unsupported,
        }
    }

    /// Sends `payload` down the route `capability` names.
    ///
    /// # Errors
    ///
    /// [`Error::ExportUnsupported`] when there is no route, otherwise whatever
    /// the platform reports.
    pub async fn dispatch(&self, capability: ShareCapability, payload: SharePayload) -> Result<()> {
        match (capability, &self.native, &self.clipboard) {
            (ShareCapability::NativeShare, Some(native), _) => {
                debug!("Sharing {} file(s) through the native share sheet", payload.files.len());
                native.share(payload).await
            }
            (ShareCapability::ClipboardFallback, _, Some(clipboard)) => {
                let image = payload.image().ok_or(Error::ExportUnsupported)?;
                debug!("Writing {} bytes of {} to the clipboard", image.bytes.len(), image.mime);
                clipboard.write(&image.mime, image.bytes.clone()).await
            }
            _ => Err(Error::ExportUnsupported),
        }
    }
}

/// An in-process clipboard holding the last written item.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<(String, Vec<u8>)>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// The MIME type and bytes of the last write.
    pub fn contents(&self) -> Option<(String, Vec<u8>)> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    fn supports(&self, _mime: &str) -> bool {
        true
    }

    async fn write(&self, mime: &str, bytes: Vec<u8>) -> Result<()> {
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = Some((mime.to_string(), bytes));
        Ok(())
    }
}
