//! Unified error type for the loopcast application.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`]
//! and for the broadcast pipeline to tell a shutdown apart from a failed source.

use std::fmt;

use crate::media::TimeRange;

/// Unified error type covering all failure modes in loopcast.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "session").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The caller is not allowed to perform the request.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request or configuration data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe) could not be run or returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Media probing failed or returned unusable metadata.
    #[error("Probe error: {0}")]
    Probe(String),

    /// No usable source could be picked from the content library.
    #[error("Selection error: {0}")]
    Selection(String),

    /// A segment conversion exceeded its time budget.
    #[error("Conversion of {range} timed out")]
    ConversionTimeout {
        /// The slice of the source that was being converted.
        range: TimeRange,
    },

    /// A segment conversion failed.
    #[error("Conversion of {range} failed: {message}")]
    Conversion {
        /// The slice of the source that was being converted.
        range: TimeRange,
        /// Human-readable error description.
        message: String,
    },

    /// The operation was abandoned because shutdown was requested.
    #[error("Operation cancelled")]
    Cancelled,

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Forbidden(_) => 403,
            Error::Validation(_) => 400,
            Error::Io { .. } => 500,
            Error::Tool { .. } => 502,
            Error::Probe(_) => 422,
            Error::Selection(_) => 503,
            Error::ConversionTimeout { .. } => 504,
            Error::Conversion { .. } => 502,
            Error::Cancelled => 503,
            Error::Internal(_) => 500,
        }
    }

    /// Whether this error signals shutdown rather than a real failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Conversion`].
    pub fn conversion(range: TimeRange, message: impl Into<String>) -> Self {
        Error::Conversion {
            range,
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
