//! HTTP key transport.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use url::Url;

use super::{KeyFetchError, KeySource};
use crate::config::MessagingConfig;

/// Fetches key documents by dereferencing `http(s)` kids.
///
/// Redirects are not followed and no request-derived headers are sent.
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpKeySource {
    pub fn new(config: &MessagingConfig) -> Result<Self, KeyFetchError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = config.key_fetch_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| KeyFetchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            max_bytes: config.max_key_bytes,
        })
    }

    fn parse_kid(kid: &str) -> Result<Url, KeyFetchError> {
        let url = Url::parse(kid).map_err(|e| KeyFetchError::InvalidUri(format!("{kid}: {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(KeyFetchError::InvalidUri(format!(
                "{kid}: scheme {scheme} is not dereferenceable"
            ))),
        }
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self, kid: &str) -> Result<Value, KeyFetchError> {
        let url = Self::parse_kid(kid)?;
        info!(event = "key_fetch", kid = %kid);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KeyFetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeyFetchError::Status(status.as_u16()));
        }

        if let Some(size) = response.content_length() {
            if size > self.max_bytes {
                return Err(KeyFetchError::TooLarge {
                    size,
                    max: self.max_bytes,
                });
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| KeyFetchError::Transport(e.to_string()))?;
        // content-length may be absent or wrong
        let size = body.len() as u64;
        if size > self.max_bytes {
            return Err(KeyFetchError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }

        serde_json::from_slice(&body).map_err(|e| KeyFetchError::Body(e.to_string()))
    }
}
