//! Error types for the label layout engine
//!
//! The solver itself never fails: detectors and passes report tagged
//! [`Reason`](crate::Reason) values instead. `LayoutError` covers the fallible
//! edges around it: configuration validation, label document parsing and I/O.
//!
//! # Examples
//!
//! ```
//! use labelkit_layout::{LabelDocument, LayoutError};
//!
//! match LabelDocument::from_json("{ not json") {
//!     Ok(_) => unreachable!(),
//!     Err(LayoutError::Json(e)) => log::warn!("bad document: {e}"),
//!     Err(e) => log::warn!("other error: {e}"),
//! }
//! ```

use thiserror::Error;

/// Errors raised outside the steady-state solving loop.
#[derive(Error, Debug)]
pub enum LayoutError {
    /// Invalid solver configuration
    ///
    /// Raised by [`SolverConfigBuilder::build`](crate::SolverConfigBuilder::build)
    /// when a threshold or cap is out of range.
    #[error("Invalid configuration: {reason}")]
    ConfigError {
        /// Description of what is invalid in the configuration
        reason: String,
    },

    /// The label document parsed but violates a data model invariant
    /// (duplicate ids, non-positive sizes, degenerate preview size).
    #[error("Invalid label document: {0}")]
    InvalidDocument(String),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LayoutError {
    /// Returns true if this error is a configuration error (user-fixable)
    #[inline]
    #[must_use = "this method returns a boolean, not modifying the error"]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError { .. })
    }

    /// Returns true if the label document was rejected
    #[inline]
    #[must_use = "this method returns a boolean, not modifying the error"]
    pub const fn is_document_error(&self) -> bool {
        matches!(self, Self::InvalidDocument(_) | Self::Json(_))
    }

    /// Returns true if this is an I/O error
    #[inline]
    #[must_use = "this method returns a boolean, not modifying the error"]
    pub const fn is_io_error(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Type alias for Result with `LayoutError`
pub type Result<T> = std::result::Result<T, LayoutError>;
