use std::path::Path;

use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use scraper::Html;
use url::Url;

use super::codec;
use super::error::{FetchError, FetchErrorKind};
use super::model::Feed;
use super::negotiate::{check_media_type, parse_html};

const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Per-request knobs for [`fetch_url_with_params`].
///
/// Timeouts live on the `reqwest::Client` itself.
#[derive(Debug, Clone)]
pub struct FetchParams {
    /// Response bodies larger than this are rejected
    pub max_size: usize,
    /// Accepted media types, or `None` to accept anything
    pub allowed_media_types: Option<Vec<String>>,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_FEED_SIZE,
            allowed_media_types: None,
        }
    }
}

/// Fetches and decodes a remote feed with default parameters.
pub async fn fetch_url(client: &reqwest::Client, url: &str) -> Result<Feed, FetchError> {
    fetch_url_with_params(client, url, &FetchParams::default()).await
}

/// Fetches and decodes a remote feed, returning its items sorted by date.
///
/// # Errors
///
/// - [`FetchErrorKind::InvalidUrl`] - not an absolute http(s) URL
/// - [`FetchErrorKind::Network`] - connection, DNS, TLS or timeout failures
/// - [`FetchErrorKind::HttpStatus`] - non-2xx response
/// - [`FetchErrorKind::ContentType`] - media type outside `allowed_media_types`
/// - [`FetchErrorKind::ResponseTooLarge`] / [`FetchErrorKind::IncompleteResponse`]
/// - [`FetchErrorKind::Decode`] - malformed RSS/Atom
pub async fn fetch_url_with_params(
    client: &reqwest::Client,
    url: &str,
    params: &FetchParams,
) -> Result<Feed, FetchError> {
    let feed = fetch_url_inner(client, url, params)
        .await
        .map_err(|kind| FetchError::new(url, kind))?;
    tracing::debug!(source = %url, items = feed.items.len(), "Fetched feed");
    Ok(feed)
}

/// Reads and decodes a feed stored on the local filesystem.
pub async fn fetch_file(path: impl AsRef<Path>) -> Result<Feed, FetchError> {
    let path = path.as_ref();
    fetch_file_inner(path)
        .await
        .map_err(|kind| FetchError::new(path.display().to_string(), kind))
}

/// Fetches a raw document, returning its media type and body.
///
/// Only `200 OK` is accepted. 5xx responses classify as temporary.
pub async fn fetch_data(
    client: &reqwest::Client,
    url: &str,
    allowed_media_types: Option<&[&str]>,
) -> Result<(String, Vec<u8>), FetchError> {
    fetch_data_inner(client, url, allowed_media_types)
        .await
        .map_err(|kind| FetchError::new(url, kind))
}

/// Fetches an HTML page, honouring the charset it declares in `<head>`.
pub async fn fetch_html(client: &reqwest::Client, url: &str) -> Result<Html, FetchError> {
    const HTML: &[&str] = &["text/html"];

    let (_, bytes) = fetch_data_inner(client, url, Some(HTML))
        .await
        .map_err(|kind| FetchError::new(url, kind))?;
    parse_html(url, &bytes).map_err(|kind| FetchError::new(url, kind))
}

async fn fetch_url_inner(
    client: &reqwest::Client,
    url: &str,
    params: &FetchParams,
) -> Result<Feed, FetchErrorKind> {
    let url = validate_url(url)?;
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(FetchErrorKind::HttpStatus(response.status()));
    }

    if let Some(allowed) = &params.allowed_media_types {
        let allowed: Vec<&str> = allowed.iter().map(String::as_str).collect();
        check_media_type(content_type(&response), Some(allowed.as_slice()))?;
    }

    let bytes = read_limited_bytes(response, params.max_size).await?;
    let mut feed = codec::decode(&bytes)?;
    feed.sort_items();
    Ok(feed)
}

async fn fetch_file_inner(path: &Path) -> Result<Feed, FetchErrorKind> {
    let bytes = tokio::fs::read(path).await?;
    let mut feed = codec::decode(&bytes)?;
    feed.sort_items();
    Ok(feed)
}

async fn fetch_data_inner(
    client: &reqwest::Client,
    url: &str,
    allowed_media_types: Option<&[&str]>,
) -> Result<(String, Vec<u8>), FetchErrorKind> {
    let parsed = validate_url(url)?;
    let response = client.get(parsed).send().await?;

    if response.status() != StatusCode::OK {
        return Err(FetchErrorKind::HttpStatus(response.status()));
    }

    let media_type = check_media_type(content_type(&response), allowed_media_types)?;
    let bytes = read_limited_bytes(response, DEFAULT_MAX_FEED_SIZE).await?;
    Ok((media_type, bytes))
}

fn validate_url(url: &str) -> Result<Url, FetchErrorKind> {
    let parsed = Url::parse(url).map_err(|e| FetchErrorKind::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(FetchErrorKind::InvalidUrl(format!(
            "unsupported scheme {scheme} (only http/https allowed)"
        ))),
    }
}

fn content_type(response: &reqwest::Response) -> Option<&str> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchErrorKind> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchErrorKind::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchErrorKind::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchErrorKind::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
