//! Error types for the package crate.

use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur while reading a `.deb` archive or its control block.
#[derive(Error, Diagnostic, Debug)]
pub enum PackageError {
    #[error("Error while {action}: {source}")]
    #[diagnostic(code(debhub_package::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error("Failed to read package source: {0}")]
    #[diagnostic(
        code(debhub_package::source),
        help("The download was interrupted; it can be retried")
    )]
    Source(#[source] std::io::Error),

    #[error("Not an ar archive: {0}")]
    #[diagnostic(code(debhub_package::invalid_archive))]
    InvalidArchive(String),

    #[error("Unsupported package format version {0:?}")]
    #[diagnostic(
        code(debhub_package::unsupported_format),
        help("Only format version 2.0 is supported")
    )]
    UnsupportedFormat(String),

    #[error("Missing archive member: {0}")]
    #[diagnostic(
        code(debhub_package::missing_member),
        help("A package needs `debian-binary` followed by a control.tar[.gz|.xz|.bz2] member")
    )]
    MissingMember(String),

    #[error("Malformed control block: {0}")]
    #[diagnostic(code(debhub_package::malformed_control))]
    MalformedControl(String),
}

/// A specialized Result type for package operations.
pub type Result<T> = std::result::Result<T, PackageError>;

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    /// Adds context to an error, describing what action was being performed.
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            PackageError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
