use debhub_dl::{
    error::DownloadError,
    http::{Download, Http},
};

/// Where package archives are downloaded from.
///
/// `open` returns once the response headers are in; the body is only read by the caller, so
/// a cache hit on the returned entity tag costs no transfer.
pub trait Origin: Send + Sync {
    fn open(&self, url: &str) -> Result<Download, DownloadError>;
}

/// Origin backed by the shared HTTP agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpOrigin;

impl Origin for HttpOrigin {
    fn open(&self, url: &str) -> Result<Download, DownloadError> {
        Http::open(url)
    }
}

/// Turns an `ETag` header into a cache tag by stripping weak-validator markers and quotes.
///
/// Returns `None` when nothing is left.
pub fn cache_tag(etag: &str) -> Option<String> {
    let tag = etag.trim_matches(|c| matches!(c, 'W' | '/' | '"'));
    (!tag.is_empty()).then(|| tag.to_string())
}
