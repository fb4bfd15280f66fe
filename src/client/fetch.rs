//! Retrying fetch.
//!
//! [`FetchClient`] performs one logical fetch: it sends the request through its
//! [`Transport`], and on a transient failure sleeps and tries again with an
//! exponentially growing delay.
//!
//! | Outcome of an attempt | Action |
//! |-----------------------|--------|
//! | 2xx | return the response |
//! | 429 or 5xx | retry while budget remains, then fail with the status |
//! | any other status | fail with the status, no retry |
//! | transport error | retry while budget remains, then return that error unchanged |
//! | cancellation | return it at once, no retry |
//!
//! Both the request and the backoff sleep race the caller's cancellation
//! signal, so a trip ends the fetch promptly.
//!
//! # Examples
//!
//! ```ignore
//! use fetch_bridge::client::{ClientConfig, FetchClient, FetchOptions};
//! use fetch_bridge::signal::CancellationSource;
//!
//! #[tokio::main]
//! async fn main() -> fetch_bridge::Result<()> {
//!     let client = FetchClient::new(ClientConfig::default())?;
//!     let signal = CancellationSource::new();
//!     let options = FetchOptions::new().with_signal(signal.clone());
//!
//!     let response = client.fetch("https://example.com/video.mp4", &options).await?;
//!     println!("Status: {}", response.status);
//!     Ok(())
//! }
//! ```

use crate::client::{Backoff, ClientConfig, FetchRequest, FetchResponse, HttpTransport, Transport};
use crate::error::Result;
use crate::signal::CancellationSource;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

/// Per-call request options.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// HTTP method, GET by default
    pub method: Method,
    /// Extra request headers
    pub headers: HeaderMap,
    /// Signal observed by the request and every backoff sleep
    pub signal: Option<CancellationSource>,
}

impl FetchOptions {
    /// GET with no extra headers and no signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `method` instead of GET.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a request header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Observe `signal`.
    pub fn with_signal(mut self, signal: CancellationSource) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// HTTP client with retry and cancellation.
///
/// Cheap to clone; clones share the transport and configuration.
#[derive(Clone)]
pub struct FetchClient {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl FetchClient {
    /// Create a client that talks HTTP through reqwest.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over a custom transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        FetchClient {
            transport,
            config: Arc::new(config),
        }
    }

    /// Fetch `url` with the configured retry budget and initial backoff.
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchResponse> {
        self.fetch_with_retries(
            url,
            options,
            self.config.max_retries,
            self.config.initial_backoff(),
        )
        .await
    }

    /// Fetch `url`, retrying transient failures up to `retries` times.
    ///
    /// The first retry waits `initial_backoff`; each following wait is the
    /// previous one times the configured multiplier.
    pub async fn fetch_with_retries(
        &self,
        url: &str,
        options: &FetchOptions,
        retries: u32,
        initial_backoff: Duration,
    ) -> Result<FetchResponse> {
        let target = Url::parse(url)?;
        let mut remaining = retries;
        let mut backoff = Backoff::new(initial_backoff, self.config.backoff_multiplier);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let request = FetchRequest {
                method: options.method.clone(),
                url: target.clone(),
                headers: options.headers.clone(),
            };

            let error = match self.send_once(request, options.signal.as_ref()).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => {
                    let error = response.to_error();
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    error
                }
                Err(error) if error.is_cancellation() => return Err(error),
                Err(error) => error,
            };

            if remaining == 0 {
                if self.config.enable_logging {
                    tracing::warn!(
                        "Request to {} failed after {} attempt(s): {}",
                        target,
                        attempt,
                        error
                    );
                }
                return Err(error);
            }

            let delay = backoff.next().unwrap_or(Duration::MAX);
            if self.config.enable_logging {
                tracing::warn!(
                    "Request to {} failed (attempt {}), retrying after {:?}: {}",
                    target,
                    attempt,
                    delay,
                    error
                );
            }
            self.wait(delay, options.signal.as_ref()).await?;
            remaining -= 1;
        }
    }

    async fn send_once(
        &self,
        request: FetchRequest,
        signal: Option<&CancellationSource>,
    ) -> Result<FetchResponse> {
        match signal {
            Some(signal) => signal.run_until_cancelled(self.transport.send(request)).await,
            None => self.transport.send(request).await,
        }
    }

    async fn wait(&self, delay: Duration, signal: Option<&CancellationSource>) -> Result<()> {
        match signal {
            Some(signal) => {
                signal
                    .run_until_cancelled(async {
                        sleep(delay).await;
                        Ok(())
                    })
                    .await
            }
            None => {
                sleep(delay).await;
                Ok(())
            }
        }
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
