//! Viewer-level error type.

use thiserror::Error;

use cloudlens_core::CloudlensError;
use cloudlens_render::{RenderError, ScreenshotError};

/// Errors surfaced by the viewer entry points.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// Data model error: bad response, size mismatch, I/O.
    #[error(transparent)]
    Data(#[from] CloudlensError),

    /// GPU setup or frame error.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Frame capture or image encoding error.
    #[error("screenshot error: {0}")]
    Screenshot(#[from] ScreenshotError),

    /// The window could not be created.
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    /// The window event loop could not be created or exited abnormally.
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

/// A specialized Result type for viewer operations.
pub type Result<T> = std::result::Result<T, ViewerError>;
