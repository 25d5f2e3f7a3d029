//! Errors raised while bringing up a GPU backend
//!
//! Misuse of GPU objects is a programming error and aborts through the
//! checking macros. The only recoverable failures are those of backend
//! creation, which depend on configuration and the host.

use thiserror::Error;

use crate::core::config::BackendKind;
use crate::gpu::pixel_format::PixelFormat;

/// GPU backend creation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// The backend is not available in this build
    #[error("GPU backend {0:?} is not supported")]
    UnsupportedBackend(BackendKind),

    /// The main window cannot be created with this size
    #[error("Invalid window size {width}x{height}")]
    InvalidWindowSize {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// The main window cannot use this format for its colour buffer
    #[error("Unsupported window format {0:?}")]
    UnsupportedWindowFormat(PixelFormat),
}
