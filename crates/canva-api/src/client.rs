//! Bearer-authenticated Connect API client

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use crate::error::{ApiErrorBody, Error, Result};

/// Public Connect REST base.
pub const DEFAULT_BASE_URL: &str = "https://api.canva.com/rest/v1";

/// Thin wrapper around a shared `reqwest::Client` that knows the API base
/// URL and applies a per-request timeout. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CanvaClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl CanvaClient {
    pub fn new(http: reqwest::Client, base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| Error::Decode(format!("invalid API base url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Decode(format!("API base url {base_url} cannot take a path")));
        }
        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    /// Base URL joined with percent-encoded path segments.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub(crate) fn request(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(token)
            .timeout(self.timeout)
    }

    /// Send and decode a JSON body, mapping non-2xx answers to provider
    /// errors.
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(format!("provider request failed: {e}")))?;
        decode_json(response).await
    }
}

pub(crate) async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::Http(format!("reading provider response: {e}")))?;

    if !status.is_success() {
        return Err(match serde_json::from_slice::<ApiErrorBody>(&bytes) {
            Ok(body) => Error::from_api(status.as_u16(), body),
            Err(_) => Error::Api {
                status: status.as_u16(),
                code: "unknown".into(),
                message: format!("provider returned {status}"),
            },
        });
    }

    serde_json::from_slice(&bytes).map_err(|e| Error::Decode(e.to_string()))
}
