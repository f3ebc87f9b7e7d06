//! Error types for bintr.
//!
//! Only structural faults travel through [`Error`]. Operational outcomes such
//! as a failed state change or a rejected handler registration are reported
//! as `bool` returns and logged where they happen.

use thiserror::Error;

/// Result type alias using bintr's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bintr operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A ghost pad or link referenced a static pad that does not exist.
    #[error("pad '{pad}' not found on '{element}'")]
    PadNotFound {
        /// Name of the pad that was looked up.
        pad: String,
        /// Element or component the pad was expected on.
        element: String,
    },

    /// A pad with the same name is already registered.
    #[error("pad '{pad}' already exists on '{element}'")]
    DuplicatePad {
        /// Name of the duplicate pad.
        pad: String,
        /// Owning element or component.
        element: String,
    },

    /// Element construction or element-level failure.
    #[error("element error: {0}")]
    Element(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (batch dump, config parsing).
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl Error {
    /// Shorthand for a missing pad.
    pub fn pad_not_found(pad: impl Into<String>, element: impl Into<String>) -> Self {
        Error::PadNotFound {
            pad: pad.into(),
            element: element.into(),
        }
    }

    /// Whether this error describes a broken graph structure.
    ///
    /// Structural errors leave the object in a state that must be corrected
    /// before further use.
    pub fn is_structural(&self) -> bool {
        matches!(self, Error::PadNotFound { .. } | Error::DuplicatePad { .. })
    }
}
