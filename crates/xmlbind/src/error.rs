//! Error types for marshaling and persistence.
//!
//! Errors fall into two groups. Document-level errors (structural mismatches,
//! missing files, I/O and parse faults) abort the whole call. Member-level
//! errors (conversion and accessor faults) are reported by
//! [`XmlBindError::is_recoverable`] and are absorbed by the walker under the
//! lenient failure policy.

// Variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::path::PathBuf;

use thiserror::Error;

pub use xmlbind_support::ConversionError;

/// Faults raised by accessor thunks.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccessError {
    #[error("member '{member}' of {type_name} is not readable")]
    NotReadable {
        type_name: &'static str,
        member: String,
    },

    #[error("{type_name} has no member named '{member}'")]
    UnknownMember {
        type_name: &'static str,
        member: String,
    },

    #[error("{type_name} has no method '{method}' taking {arity} argument(s)")]
    UnknownMethod {
        type_name: &'static str,
        method: String,
        arity: usize,
    },

    #[error("method '{method}' expects {expected} argument(s), got {actual}")]
    Arity {
        method: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("accessor for '{member}' expected a target of type {expected}")]
    TargetMismatch {
        expected: &'static str,
        member: &'static str,
    },

    #[error("{0}")]
    Failed(String),
}

impl AccessError {
    /// Shorthand for failures raised by computed members and methods.
    pub fn failed(message: impl Into<String>) -> Self {
        AccessError::Failed(message.into())
    }
}

/// The primary error type for the crate.
#[derive(Error, Debug)]
pub enum XmlBindError {
    /// The reader is not positioned on the expected element.
    #[error("expected element <{expected}> but found {found} at {path}")]
    ElementNameMismatch {
        expected: String,
        found: String,
        path: String,
    },

    /// A setter was requested for a member that cannot be written.
    #[error("member '{member}' of {type_name} has no setter")]
    NoSetter {
        type_name: &'static str,
        member: String,
    },

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file kept changing while it was being read.
    #[error("{} changed during each of {attempts} read attempts", .path.display())]
    StabilityFailure { path: PathBuf, attempts: u32 },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Access(#[from] AccessError),

    /// Content that the walker cannot place, such as markup inside a scalar.
    #[error("unexpected content at {path}: {detail}")]
    UnexpectedContent { path: String, detail: String },

    #[error("unexpected end of document while looking for <{expected}>")]
    UnexpectedEof { expected: String },

    #[error("malformed XML: {0}")]
    Malformed(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl XmlBindError {
    /// Whether this error is confined to a single member and may be absorbed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            XmlBindError::ElementNameMismatch { .. }
                | XmlBindError::NoSetter { .. }
                | XmlBindError::Conversion(_)
                | XmlBindError::Access(_)
                | XmlBindError::UnexpectedContent { .. }
        )
    }
}

/// Result type alias for marshaling and persistence operations.
pub type Result<T> = std::result::Result<T, XmlBindError>;
