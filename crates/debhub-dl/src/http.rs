use std::io::Read;

use tracing::debug;
use ureq::http::header::ETAG;
use url::Url;

use crate::{error::DownloadError, http_client::SHARED_AGENT};

/// An opened download: the origin's entity tag and a streaming body.
pub struct Download {
    pub etag: Option<String>,
    pub reader: Box<dyn Read + Send>,
}

pub struct Http;

impl Http {
    /// Issues a GET for `url` and returns the response body as a stream.
    ///
    /// Redirects are followed. Anything but a final `200 OK` is an error; the body is not read
    /// before this function returns.
    ///
    /// # Errors
    ///
    /// * [`DownloadError::InvalidUrl`] if `url` cannot be parsed.
    /// * [`DownloadError::HttpError`] for a non-200 final status.
    /// * [`DownloadError::Network`] for connection and protocol failures.
    pub fn open(url: &str) -> Result<Download, DownloadError> {
        Url::parse(url).map_err(|source| DownloadError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let resp = SHARED_AGENT.get(url).call().map_err(|err| match err {
            ureq::Error::StatusCode(status) => DownloadError::HttpError {
                status,
                url: url.to_string(),
            },
            other => other.into(),
        })?;

        if resp.status() != ureq::http::StatusCode::OK {
            return Err(DownloadError::HttpError {
                status: resp.status().as_u16(),
                url: url.to_string(),
            });
        }

        let etag = resp
            .headers()
            .get(ETAG)
            .and_then(|h| h.to_str().ok())
            .map(String::from);
        debug!(url, etag = etag.as_deref(), "opened download");

        Ok(Download {
            etag,
            reader: Box::new(resp.into_body().into_reader()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_invalid_url() {
        assert!(matches!(
            Http::open("not a url"),
            Err(DownloadError::InvalidUrl { .. })
        ));
    }
}
