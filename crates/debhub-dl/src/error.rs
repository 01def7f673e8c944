use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DownloadError {
    #[error("Invalid URL: {url}")]
    #[diagnostic(code(debhub_dl::invalid_url))]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    #[diagnostic(
        code(debhub_dl::network),
        help("Check your internet connection or try again later")
    )]
    Network(#[from] Box<ureq::Error>),

    #[error("HTTP {status}: {url}")]
    #[diagnostic(code(debhub_dl::http_error))]
    HttpError { status: u16, url: String },

    #[error(transparent)]
    #[diagnostic(code(debhub_dl::io))]
    Io(#[from] std::io::Error),

    #[error("Invalid response from server")]
    #[diagnostic(code(debhub_dl::invalid_response))]
    InvalidResponse,
}

impl From<ureq::Error> for DownloadError {
    fn from(e: ureq::Error) -> Self {
        Self::Network(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_invalid_url() {
        let err = DownloadError::InvalidUrl {
            url: "invalid".to_string(),
            source: url::ParseError::RelativeUrlWithoutBase,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid URL"));
        assert!(msg.contains("invalid"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_download_error_http_error() {
        let err = DownloadError::HttpError {
            status: 500,
            url: "https://github.com/o/r/releases/download/v1/a.deb".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 500: https://github.com/o/r/releases/download/v1/a.deb"
        );
    }

    #[test]
    fn test_download_error_invalid_response() {
        assert_eq!(
            DownloadError::InvalidResponse.to_string(),
            "Invalid response from server"
        );
    }

    #[test]
    fn test_from_ureq_error() {
        let download_err: DownloadError = ureq::Error::ConnectionFailed.into();
        assert!(matches!(download_err, DownloadError::Network(_)));
    }
}
