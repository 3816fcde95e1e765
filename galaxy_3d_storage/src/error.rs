//! Error types for the Galaxy3D storage layer
//!
//! Most storage operations recover locally (invalid handles, compile failures,
//! out-of-range surface indices are logged and turned into no-ops). The error
//! type below is what surfaces when an operation genuinely cannot complete,
//! typically a GPU allocation failure reported by the graphics device.

use std::fmt;

/// Result type for Galaxy3D storage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Galaxy3D storage errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (graphics device, shader compiler)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource description (bad size, wrong format, ...)
    InvalidResource(String),

    /// Handle is unknown, freed, or of the wrong resource kind
    InvalidHandle(String),

    /// Shader source failed to compile
    ShaderCompilation(String),

    /// Initialization failed (engine, subsystems)
    InitializationFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InvalidHandle(msg) => write!(f, "Invalid handle: {}", msg),
            Error::ShaderCompilation(msg) => write!(f, "Shader compilation failed: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an ERROR message and build a `BackendError` from it
///
/// # Example
///
/// ```ignore
/// let err = engine_err!("galaxy3d::Mesh", "surface {} out of range", index);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::galaxy3d::Error::BackendError(message)
    }};
}

/// Log an ERROR message and return early with a `BackendError`
///
/// # Example
///
/// ```ignore
/// engine_bail!("galaxy3d::Texture", "texture size {}x{} exceeds limit", w, h);
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
