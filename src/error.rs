//! Error types for rendering and exporting QR codes.

use thiserror::Error;

/// Result type alias for surface operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering or exporting a QR code
#[derive(Error, Debug)]
pub enum Error {
    /// The text does not fit in any symbol version
    #[error("Data too long for a QR code: {len} bytes")]
    Capacity { len: usize },

    /// The drawable surface was never mounted
    #[error("Surface not mounted after {attempts} attempts")]
    SurfaceUnavailable { attempts: u32 },

    /// The surface was unmounted while a render was in progress
    #[error("Surface unmounted before the render could be applied")]
    SurfaceDetached,

    /// Width and margin do not give a drawable image size
    #[error("Invalid image size: width {width}px with a {margin} module margin")]
    InvalidSize { width: u32, margin: u32 },

    /// Neither native sharing nor clipboard image writes are available
    #[error("Sharing is not supported on this platform")]
    ExportUnsupported,

    /// The platform rejected an export or a background task failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// A colour string could not be parsed
    #[error("Invalid hex color: {0}")]
    InvalidColor(String),

    /// Any other encoder failure
    #[error("QR code generation failed: {0}")]
    Encode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl From<qrcode::types::QrError> for Error {
    fn from(err: qrcode::types::QrError) -> Self {
        Error::Encode(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Transport(format!("Background task failed: {}", err))
    }
}
