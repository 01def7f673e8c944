//! Error types for debhub-core.

use debhub_config::ConfigError;
use debhub_dl::error::DownloadError;
use debhub_package::PackageError;
use debhub_utils::error::FileSystemError;
use miette::Diagnostic;
use thiserror::Error;

use crate::signing::SignError;

/// Request-level failures: anything that stops a whole index build or command.
#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(code(debhub::filesystem), help("Check file permissions and disk space"))]
    FileSystemError(#[from] FileSystemError),

    #[error("Error while {action}")]
    #[diagnostic(code(debhub::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to list releases: {0}")]
    #[diagnostic(
        code(debhub::release_source),
        help("Check the owner and repository names, or set GITHUB_TOKEN to raise the rate limit")
    )]
    ReleaseSource(#[source] DownloadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    PackageError(#[from] PackageError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Sign(#[from] SignError),

    #[error("Owner '{0}' is not allowed")]
    #[diagnostic(
        code(debhub::owner_not_allowed),
        help("Add the owner to `allowed_owners` in the configuration")
    )]
    OwnerNotAllowed(String),

    #[error("Thread pool error: {0}")]
    #[diagnostic(code(debhub::thread_pool))]
    ThreadPool(String),
}

/// Outcome of a failed package load.
///
/// Every caller waiting on the same load receives a copy, hence `Clone`. Only
/// [`LoadError::Transient`] is retried, after the configured cooldown.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Transient failure: {0}")]
    #[diagnostic(code(debhub::load::transient), help("The package will be retried shortly"))]
    Transient(String),

    #[error("Unsupported package format version {0:?}")]
    #[diagnostic(code(debhub::load::unsupported_format))]
    UnsupportedFormat(String),

    #[error("Missing archive member: {0}")]
    #[diagnostic(code(debhub::load::missing_member))]
    MissingMember(String),

    #[error("Not an ar archive: {0}")]
    #[diagnostic(code(debhub::load::invalid_archive))]
    InvalidArchive(String),

    #[error("Malformed control block: {0}")]
    #[diagnostic(code(debhub::load::malformed_control))]
    MalformedControl(String),

    #[error("Missing {0} from control")]
    #[diagnostic(code(debhub::load::missing_field))]
    MissingField(&'static str),

    #[error("Missing content validator for {0}")]
    #[diagnostic(
        code(debhub::load::missing_validator),
        help("The origin must send an ETag header")
    )]
    MissingValidator(String),
}

impl LoadError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LoadError::Transient(_))
    }
}

impl From<PackageError> for LoadError {
    fn from(err: PackageError) -> Self {
        match err {
            PackageError::Source(_) | PackageError::IoError { .. } => {
                LoadError::Transient(err.to_string())
            }
            PackageError::InvalidArchive(msg) => LoadError::InvalidArchive(msg),
            PackageError::UnsupportedFormat(version) => LoadError::UnsupportedFormat(version),
            PackageError::MissingMember(member) => LoadError::MissingMember(member),
            PackageError::MalformedControl(msg) => LoadError::MalformedControl(msg),
        }
    }
}

impl From<DownloadError> for LoadError {
    fn from(err: DownloadError) -> Self {
        LoadError::Transient(err.to_string())
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> CoreResult<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> CoreResult<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            CoreError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
