// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Fetching of blob records from the blob explorer API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

/// User agent sent with every request to the blob explorer.
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Maximum number of characters of an error response body kept in [`FetchError`].
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Errors returned when fetching blob records.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The HTTP client could not be constructed.
    #[error("failed to build the http client")]
    Build(#[source] reqwest::Error),

    /// The API answered with a status other than `200 OK`.
    #[error("the blob api responded with status {status}: {body}")]
    UnexpectedStatus {
        /// The status of the response.
        status: StatusCode,
        /// The (possibly truncated) body of the response.
        body: String,
    },

    /// The request could not be sent, or the response could not be read.
    #[error("request to the blob api failed")]
    Request(#[source] reqwest::Error),

    /// The response body is not valid JSON.
    #[error("the blob api response is not valid json")]
    Decode(#[source] serde_json::Error),
}

/// A source of blob explorer payloads.
#[async_trait]
pub trait BlobSource: Send + Sync {
    /// Fetches the current list of blobs as an unparsed JSON document.
    async fn fetch(&self) -> Result<Value, FetchError>;
}

/// Fetches blob records over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBlobSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpBlobSource {
    /// Creates a source polling `url`, each request being aborted after `timeout`.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Build)?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl BlobSource for HttpBlobSource {
    async fn fetch(&self) -> Result<Value, FetchError> {
        tracing::debug!(url = %self.url, "fetching blobs");

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(FetchError::Request)?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = match response.text().await {
                Ok(body) => truncate(body),
                Err(error) => format!("couldn't decode response body; {error}"),
            };
            return Err(FetchError::UnexpectedStatus { status, body });
        }

        let bytes = response.bytes().await.map_err(FetchError::Request)?;
        serde_json::from_slice(&bytes).map_err(FetchError::Decode)
    }
}

fn truncate(mut body: String) -> String {
    if let Some((index, _)) = body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        body.truncate(index);
        body.push_str("...");
    }
    body
}
