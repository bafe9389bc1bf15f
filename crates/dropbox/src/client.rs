use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RANGE};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ApiError, DropboxError, Result};

const API_BASE: &str = "https://api.dropboxapi.com/2";
const CONTENT_BASE: &str = "https://content.dropboxapi.com/2";
const API_ARG_HEADER: &str = "Dropbox-API-Arg";
const API_RESULT_HEADER: &str = "Dropbox-API-Result";

/// HTTP client for a single Dropbox account.
#[derive(Clone)]
pub struct DropboxClient {
    http: reqwest::Client,
    access_token: String,
    api_base: String,
    content_base: String,
}

impl std::fmt::Debug for DropboxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropboxClient")
            .field("api_base", &self.api_base)
            .field("content_base", &self.content_base)
            .finish_non_exhaustive()
    }
}

/// Raw result of a content-download call.
#[derive(Debug)]
pub struct ContentDownload {
    pub api_result: String,
    pub content: bytes::Bytes,
    /// The server answered `206 Partial Content`, i.e. honoured the range.
    pub partial: bool,
}

impl DropboxClient {
    pub fn new(access_token: &str) -> Result<Self> {
        Self::build(access_token, HeaderMap::new())
    }

    fn build(access_token: &str, default_headers: HeaderMap) -> Result<Self> {
        if access_token.is_empty() {
            return Err(DropboxError::MissingToken);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .default_headers(default_headers)
            .build()
            .map_err(|source| DropboxError::Http {
                route: "client builder".into(),
                source,
            })?;
        Ok(Self {
            http,
            access_token: access_token.to_string(),
            api_base: API_BASE.to_string(),
            content_base: CONTENT_BASE.to_string(),
        })
    }

    /// Point the client at other endpoint roots (proxies, test servers).
    pub fn with_bases(mut self, api: &str, content: &str) -> Self {
        self.api_base = api.trim_end_matches('/').to_string();
        self.content_base = content.trim_end_matches('/').to_string();
        self
    }

    /// Open an independent client whose every request carries
    /// `Range: bytes=<offset>-<offset+size-1>`.
    ///
    /// The returned client owns its own connection pool and shares no state
    /// with `self`, so any number of range sessions may run concurrently.
    /// Its resources are released when it is dropped.
    pub fn range_session(&self, offset: u64, size: u64) -> Result<Self> {
        let range = range_header(offset, size)?;
        let mut headers = HeaderMap::new();
        headers.insert(
            RANGE,
            HeaderValue::from_str(&range)
                .map_err(|_| DropboxError::InvalidRange(range.clone()))?,
        );
        let session = Self::build(&self.access_token, headers)?;
        Ok(session.with_bases(&self.api_base, &self.content_base))
    }

    /// Call an RPC endpoint: `POST {api_base}/{route}` with a JSON body.
    pub async fn rpc<P: Serialize, R: DeserializeOwned>(
        &self,
        route: &str,
        params: &P,
    ) -> Result<R> {
        let url = format!("{}/{route}", self.api_base);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(params)
            .send()
            .await
            .map_err(|source| http_error(route, source))?;

        let body = Self::check(route, resp)
            .await?
            .text()
            .await
            .map_err(|source| http_error(route, source))?;
        debug!(route, "OK");
        decode(route, &body)
    }

    /// Call a content-upload endpoint: arguments travel in the
    /// `Dropbox-API-Arg` header and the body carries raw bytes.
    pub async fn content_upload<A: Serialize, R: DeserializeOwned>(
        &self,
        route: &str,
        arg: &A,
        data: Vec<u8>,
    ) -> Result<R> {
        let url = format!("{}/{route}", self.content_base);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header(API_ARG_HEADER, api_arg(route, arg)?)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|source| http_error(route, source))?;

        let body = Self::check(route, resp)
            .await?
            .text()
            .await
            .map_err(|source| http_error(route, source))?;
        debug!(route, "OK");
        decode(route, &body)
    }

    /// Call a content-download endpoint. The result metadata comes back in the
    /// `Dropbox-API-Result` header, the file bytes in the body.
    pub async fn content_download<A: Serialize>(
        &self,
        route: &str,
        arg: &A,
    ) -> Result<ContentDownload> {
        let url = format!("{}/{route}", self.content_base);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header(API_ARG_HEADER, api_arg(route, arg)?)
            .send()
            .await
            .map_err(|source| http_error(route, source))?;

        let resp = Self::check(route, resp).await?;
        let partial = resp.status() == StatusCode::PARTIAL_CONTENT;
        let api_result = resp
            .headers()
            .get(API_RESULT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| DropboxError::MissingApiResult {
                route: route.to_string(),
            })?;
        let content = resp.bytes().await.map_err(|source| http_error(route, source))?;
        debug!(route, bytes = content.len(), partial, "OK");
        Ok(ContentDownload {
            api_result,
            content,
            partial,
        })
    }

    async fn check(route: &str, resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(DropboxError::Api {
            route: route.to_string(),
            status,
            error: ApiError::from_body(&body),
        })
    }
}

/// Inclusive HTTP byte range covering `size` bytes from `offset`. Windows
/// reaching past `u64::MAX` end there, which reads to end of file.
pub fn range_header(offset: u64, size: u64) -> Result<String> {
    if size == 0 {
        return Err(DropboxError::InvalidRange(format!(
            "empty range at offset {offset}"
        )));
    }
    let last = offset.saturating_add(size - 1);
    Ok(format!("bytes={offset}-{last}"))
}

/// Serialise header arguments. HTTP header values must be plain ASCII, so
/// every non-ASCII character is written as a JSON `\uXXXX` escape.
fn api_arg<A: Serialize>(route: &str, arg: &A) -> Result<String> {
    let json = serde_json::to_string(arg).map_err(|source| DropboxError::Decode {
        route: route.to_string(),
        source,
    })?;
    Ok(ascii_escape(&json))
}

fn ascii_escape(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && c != '\x7f' {
            out.push(c);
            continue;
        }
        let mut units = [0u16; 2];
        for unit in c.encode_utf16(&mut units) {
            out.push_str(&format!("\\u{unit:04x}"));
        }
    }
    out
}

fn decode<R: DeserializeOwned>(route: &str, body: &str) -> Result<R> {
    // Some endpoints (upload_session/append_v2) answer with an empty body.
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|source| DropboxError::Decode {
        route: route.to_string(),
        source,
    })
}

fn http_error(route: &str, source: reqwest::Error) -> DropboxError {
    DropboxError::Http {
        route: route.to_string(),
        source,
    }
}
