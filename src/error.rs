//! Global error handling for flattree
//!
//! This module provides a centralized error type that can represent errors
//! from all modules in the project.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Global error type for flattree operations
#[derive(Error, Debug)]
pub enum FlatTreeError {
    /// File system errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// File system errors tied to a specific path
    #[error("IO error at {}: {source}", path.display())]
    IoAt {
        /// Path being accessed when the error occurred
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Malformed document, permission string or rule file
    #[error("Parse error: {0}")]
    Parse(String),

    /// No rule file in any ancestor directory
    #[error("Not found: {0}")]
    NotFound(String),

    /// A document key could not be computed or is unsafe
    #[error("Path error: {0}")]
    Path(String),

    /// A glob pattern failed to compile
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Why compilation failed
        reason: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Specialized Result type for flattree operations
pub type Result<T> = std::result::Result<T, FlatTreeError>;

/// Creates a FlatTreeError with a formatted message
#[macro_export]
macro_rules! error {
    ($error_type:ident, $($arg:tt)*) => {
        $crate::error::FlatTreeError::$error_type(format!($($arg)*))
    };
}

/// Returns an error result with a formatted message
#[macro_export]
macro_rules! bail {
    ($error_type:ident, $($arg:tt)*) => {
        return Err($crate::error!($error_type, $($arg)*))
    };
}

/// Ensures a condition is true, otherwise returns an error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error_type:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($error_type, $($arg)*)
        }
    };
}

/// Extension trait for attaching the offending path to I/O errors
pub trait IoResultExt<T> {
    /// Wrap an `io::Error` together with the path that produced it
    fn with_path(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, io::Error> {
    fn with_path(self, path: &Path) -> Result<T> {
        self.map_err(|source| FlatTreeError::IoAt {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl From<walkdir::Error> for FlatTreeError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(Path::to_path_buf).unwrap_or_default();
        FlatTreeError::IoAt {
            path,
            source: err.into(),
        }
    }
}

impl FlatTreeError {
    /// Whether this error means "rule files absent everywhere"
    pub fn is_not_found(&self) -> bool {
        matches!(self, FlatTreeError::NotFound(_))
    }
}

// Allow converting FlatTreeError to io::Error so main can return io::Result
impl From<FlatTreeError> for io::Error {
    fn from(err: FlatTreeError) -> Self {
        match err {
            FlatTreeError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}
