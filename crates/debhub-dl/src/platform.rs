use std::env;

use tracing::debug;
use ureq::http::header::{ACCEPT, AUTHORIZATION};

use crate::{error::DownloadError, http_client::SHARED_AGENT};

pub const PAGE_SIZE: usize = 100;

/// Builds the URL of one page of a paginated listing.
pub fn page_url(base: &str, path: &str, page: usize) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{base}{path}{separator}per_page={PAGE_SIZE}&page={page}")
}

/// Returns the first non-empty token found in `token_env`.
pub fn api_token(token_env: &[&str]) -> Option<String> {
    token_env
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|token| !token.trim().is_empty())
}

/// Fetches every page of a JSON array listing, stopping at the first short page.
pub fn fetch_paginated<T>(base: &str, path: &str, token_env: &[&str]) -> Result<Vec<T>, DownloadError>
where
    T: serde::de::DeserializeOwned,
{
    let token = api_token(token_env);
    let mut items = Vec::new();

    for page in 1.. {
        let url = page_url(base, path, page);
        let mut req = SHARED_AGENT
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &token {
            req = req.header(AUTHORIZATION, &format!("Bearer {token}"));
        }

        let mut resp = req.call().map_err(|err| match err {
            ureq::Error::StatusCode(status) => DownloadError::HttpError {
                status,
                url: url.clone(),
            },
            other => other.into(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::HttpError {
                status: status.as_u16(),
                url,
            });
        }

        let batch: Vec<T> = resp
            .body_mut()
            .read_json()
            .map_err(|_| DownloadError::InvalidResponse)?;
        let count = batch.len();
        debug!(url = url.as_str(), count, "fetched listing page");
        items.extend(batch);

        if count < PAGE_SIZE {
            break;
        }
    }

    Ok(items)
}
