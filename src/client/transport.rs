//! Single-attempt HTTP transport.
//!
//! A [`Transport`] performs exactly one request and hands back the status,
//! headers and a streaming body. Retry and cancellation live a layer above, in
//! [`FetchClient`](super::FetchClient).

use crate::client::ClientConfig;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use http::{HeaderMap, Method};
use std::fmt;
use url::Url;

/// Incremental reader over a response body.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// One request as handed to a [`Transport`].
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// HTTP method
    pub method: Method,
    /// Target, already stripped of the routing prefix
    pub url: Url,
    /// Extra request headers
    pub headers: HeaderMap,
}

/// A response whose headers have arrived and whose body is still streaming.
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Reason phrase
    pub status_text: String,
    /// Response headers
    pub headers: HeaderMap,
    /// Body reader
    pub body: ByteStream,
}

impl FetchResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        super::is_success_status(self.status)
    }

    /// The declared body length, if the server sent one.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(http::header::CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .parse()
            .ok()
    }

    /// The error this response represents when it is not a success.
    pub fn to_error(&self) -> BridgeError {
        BridgeError::Http {
            status: self.status,
            status_text: self.status_text.clone(),
        }
    }
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Issues one network request.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send `request` and return once the response headers are in.
    async fn send(&self, request: FetchRequest) -> Result<FetchResponse>;
}

/// [`Transport`] backed by a reqwest client.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build the underlying client from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .user_agent(config.user_agent.clone());

        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        if !config.proxy_url.is_empty() {
            let proxy = reqwest::Proxy::all(&config.proxy_url)
                .map_err(|e| BridgeError::Config(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| BridgeError::Config(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: FetchRequest) -> Result<FetchResponse> {
        let response = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(BridgeError::from))
            .boxed();

        Ok(FetchResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn response_with(headers: HeaderMap) -> FetchResponse {
        FetchResponse {
            status: 200,
            status_text: "OK".into(),
            headers,
            body: stream::empty().boxed(),
        }
    }

    #[test]
    fn test_content_length() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_LENGTH, "42".parse().unwrap());
        assert_eq!(response_with(headers).content_length(), Some(42));
        assert_eq!(response_with(HeaderMap::new()).content_length(), None);
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(&ClientConfig::default()).is_ok());
    }
}
